use crate::identify::{filter_disc_info, Classifier, IdentifyError, IdentityResolver, Score};
use crate::index::{TitleIndex, TitleRecord, TitleType};
use crate::robot::DiscInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What to extract from a disc and what to call it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Absent when the disc could not be identified
    pub identity: Option<TitleRecord>,
    pub disc_info: DiscInfo,
    /// Titles to extract, best guess first
    pub rip_titles: Vec<Score>,
}

/// Filter, classify and resolve a disc in one go
#[derive(Debug, Clone)]
pub struct Identifier {
    classifier: Classifier,
    resolver: IdentityResolver,
}

impl Identifier {
    pub fn new(classifier: Classifier, index: Arc<dyn TitleIndex>) -> Self {
        Identifier {
            classifier,
            resolver: IdentityResolver::new(index),
        }
    }

    pub async fn make_plan(&self, disc_info: DiscInfo) -> Result<Plan, IdentifyError> {
        let titles = filter_disc_info(&disc_info);
        let mut rip_titles = self.classifier.likely_contents(&titles)?;
        let identity = self.resolver.resolve(&disc_info, &rip_titles).await?;

        // A movie is a single title. Discs carrying several cuts of the same
        // movie still only get the best guess.
        if identity
            .as_ref()
            .is_some_and(|record| record.title_type == TitleType::Movie)
        {
            rip_titles.truncate(1);
        }
        info!(
            "📋 Plan: {} title(s) for {}",
            rip_titles.len(),
            identity
                .as_ref()
                .map(|record| record.primary_title.as_str())
                .unwrap_or("unidentified disc")
        );

        Ok(Plan {
            identity,
            disc_info,
            rip_titles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::{StreamInfo, TitleInfo};
    use crate::test_support::{title_record, MockTitleIndex};

    fn feature(duration: &str) -> TitleInfo {
        let mut title = TitleInfo::default();
        title.info.duration = duration.to_string();
        title.info.chapter_count = "8".to_string();
        for kind in ["Video", "Audio"] {
            let mut stream = StreamInfo::default();
            stream.info.kind = kind.to_string();
            title.streams.push(stream);
        }
        title
    }

    fn disc(titles: Vec<TitleInfo>) -> DiscInfo {
        let mut disc = DiscInfo::default();
        disc.info.name = "Test Disc".to_string();
        disc.titles = titles;
        disc
    }

    #[tokio::test]
    async fn test_movie_plan_keeps_one_title() {
        let index = Arc::new(MockTitleIndex::new(vec![title_record("tt1", "movie", Some(100))]));
        let identifier = Identifier::new(Classifier::default(), index);

        // Two cuts of the same movie plus an extra without chapters
        let mut extra = TitleInfo::default();
        extra.info.duration = "0:03:00".to_string();
        let plan = identifier
            .make_plan(disc(vec![feature("1:40:00"), extra, feature("1:40:30")]))
            .await
            .unwrap();

        assert_eq!(plan.identity.map(|r| r.id), Some("tt1".to_string()));
        assert_eq!(plan.rip_titles.len(), 1);
        assert_eq!(plan.rip_titles[0].title_index, 2);
        assert_eq!(plan.disc_info.titles.len(), 3);
    }

    #[tokio::test]
    async fn test_episode_plan_keeps_every_episode() {
        let index = Arc::new(MockTitleIndex::new(vec![title_record(
            "tt2",
            "tvEpisode",
            Some(44),
        )]));
        let identifier = Identifier::new(Classifier::default(), index);

        let plan = identifier
            .make_plan(disc(vec![
                feature("0:44:00"),
                feature("0:43:00"),
                feature("0:44:10"),
            ]))
            .await
            .unwrap();

        assert_eq!(plan.identity.map(|r| r.id), Some("tt2".to_string()));
        let order: Vec<usize> = plan.rip_titles.iter().map(|s| s.title_index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[tokio::test]
    async fn test_unidentified_disc_keeps_all_candidates() {
        let index = Arc::new(MockTitleIndex::new(Vec::new()));
        let identifier = Identifier::new(Classifier::default(), index);

        let plan = identifier
            .make_plan(disc(vec![feature("1:40:00"), feature("1:50:00")]))
            .await
            .unwrap();
        assert!(plan.identity.is_none());
        assert_eq!(plan.rip_titles.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_disc_plan() {
        let index = Arc::new(MockTitleIndex::new(vec![title_record("tt1", "movie", Some(100))]));
        let identifier = Identifier::new(Classifier::default(), index.clone());

        let plan = identifier.make_plan(DiscInfo::default()).await.unwrap();
        assert!(plan.identity.is_none());
        assert!(plan.rip_titles.is_empty());
        assert!(index.queries().is_empty());
    }
}
