use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Search for {query:?} failed: {reason}")]
    Search { query: String, reason: String },
}

/// Classification of a metadata record, using the search service's own names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TitleType {
    Movie,
    /// Container record for a whole series
    TvSeries,
    /// One episode of a series
    TvEpisode,
    TvMiniSeries,
    TvMovie,
    Short,
    Video,
    Other(String),
}

impl TitleType {
    pub fn as_str(&self) -> &str {
        match self {
            TitleType::Movie => "movie",
            TitleType::TvSeries => "tvSeries",
            TitleType::TvEpisode => "tvEpisode",
            TitleType::TvMiniSeries => "tvMiniSeries",
            TitleType::TvMovie => "tvMovie",
            TitleType::Short => "short",
            TitleType::Video => "video",
            TitleType::Other(name) => name,
        }
    }
}

impl From<&str> for TitleType {
    fn from(name: &str) -> Self {
        match name {
            "movie" => TitleType::Movie,
            "tvSeries" => TitleType::TvSeries,
            "tvEpisode" => TitleType::TvEpisode,
            "tvMiniSeries" => TitleType::TvMiniSeries,
            "tvMovie" => TitleType::TvMovie,
            "short" => TitleType::Short,
            "video" => TitleType::Video,
            other => TitleType::Other(other.to_string()),
        }
    }
}

impl From<String> for TitleType {
    fn from(name: String) -> Self {
        TitleType::from(name.as_str())
    }
}

impl From<TitleType> for String {
    fn from(title_type: TitleType) -> Self {
        title_type.as_str().to_string()
    }
}

impl fmt::Display for TitleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate returned by the metadata search service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    /// Canonical id, e.g. `tt0111161`
    pub id: String,
    pub title_type: TitleType,
    pub primary_title: String,
    pub original_title: String,
    pub start_year: Option<i32>,
    pub runtime_minutes: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Metadata search service
///
/// Results arrive already ranked by the service. Implementations stop
/// producing once `cancel` fires or the receiver is dropped.
#[async_trait::async_trait]
pub trait TitleIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TitleRecord>, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_type_names() {
        assert_eq!(TitleType::from("tvSeries"), TitleType::TvSeries);
        assert_eq!(TitleType::from("movie").as_str(), "movie");
        assert_eq!(
            TitleType::from("videoGame"),
            TitleType::Other("videoGame".to_string())
        );
        assert_eq!(TitleType::Other("videoGame".to_string()).to_string(), "videoGame");
    }

    #[test]
    fn test_title_record_json() {
        let record: TitleRecord = serde_json::from_value(serde_json::json!({
            "id": "tt0000001",
            "title_type": "tvEpisode",
            "primary_title": "Pilot",
            "original_title": "Pilot",
            "start_year": 1999,
            "runtime_minutes": 22
        }))
        .unwrap();
        assert_eq!(record.title_type, TitleType::TvEpisode);
        assert!(record.genres.is_empty());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title_type"], "tvEpisode");
    }
}
