use crate::robot::{DiscInfo, TitleInfo};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One structural property of a title, weighted so that the weights never
/// overlap when summed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aspect {
    pub score: u32,
    pub description: &'static str,
}

const HAS_VIDEO: Aspect = Aspect {
    score: 0x80,
    description: "has at least 1 video stream",
};
const HAS_AUDIO: Aspect = Aspect {
    score: 0x40,
    description: "has at least 1 audio stream",
};
const HAS_SUBTITLES: Aspect = Aspect {
    score: 0x20,
    description: "has at least 1 subtitle stream",
};
const HAS_CHAPTERS: Aspect = Aspect {
    score: 0x10,
    description: "has chapters",
};

pub fn aspects_of(title: &TitleInfo) -> Vec<Aspect> {
    let has_kind = |kind: &str| title.streams.iter().any(|s| s.info.kind == kind);

    let mut aspects = Vec::new();
    if has_kind("Video") {
        aspects.push(HAS_VIDEO);
    }
    if has_kind("Audio") {
        aspects.push(HAS_AUDIO);
    }
    if has_kind("Subtitles") {
        aspects.push(HAS_SUBTITLES);
    }
    if !title.info.chapter_count.is_empty() {
        aspects.push(HAS_CHAPTERS);
    }
    aspects
}

pub fn score_aspects(aspects: &[Aspect]) -> u32 {
    aspects.iter().map(|a| a.score).sum()
}

/// Titles likely to hold a main feature, keyed by title index.
///
/// Every title scoring below the best score is dropped. Ties all survive,
/// which keeps every episode of a season.
pub fn filter_disc_info(disc: &DiscInfo) -> BTreeMap<usize, &TitleInfo> {
    let scores: Vec<u32> = disc
        .titles
        .iter()
        .map(|title| score_aspects(&aspects_of(title)))
        .collect();
    let max_score = scores.iter().copied().max().unwrap_or(0);

    disc.titles
        .iter()
        .zip(scores)
        .enumerate()
        .filter_map(|(index, (title, score))| {
            if score < max_score {
                debug!("Removing title {}, score {} < {}", index, score, max_score);
                None
            } else {
                Some((index, title))
            }
        })
        .collect()
}
