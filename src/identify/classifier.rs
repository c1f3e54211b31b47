use crate::identify::IdentifyError;
use crate::index::TitleType;
use crate::robot::TitleInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::time::Duration;
use tracing::{debug, info};

/// Gaussian model of runtimes, in minutes, for one kind of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub title_type: TitleType,
    pub mean: f64,
    pub stddev: f64,
}

impl Distribution {
    pub fn density(&self, minutes: f64) -> f64 {
        self.log_density(minutes).exp()
    }

    pub fn log_density(&self, minutes: f64) -> f64 {
        let z = (minutes - self.mean) / self.stddev;
        -z * z / 2.0 - self.stddev.ln() - (2.0 * PI).sqrt().ln()
    }
}

/// Classification of one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub title_index: usize,
    pub duration: Duration,
    pub title_type: TitleType,
    /// Highest density over lowest density. Larger means less ambiguous.
    pub likelihood: f64,
}

/// Parse an `h:mm:ss` duration. Hours are unbounded.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let mut parts = value.trim().split(':');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if hours.is_empty() || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !two_digits(minutes) || !two_digits(seconds) {
        return None;
    }

    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

/// Labels titles as movie-like or episode-like from their runtime
#[derive(Debug, Clone)]
pub struct Classifier {
    distributions: Vec<Distribution>,
}

impl Default for Classifier {
    /// Runtime distributions fit to the metadata service's catalogue
    fn default() -> Self {
        Classifier::new(vec![
            Distribution {
                title_type: TitleType::Movie,
                mean: 88.96,
                stddev: 27.35,
            },
            Distribution {
                title_type: TitleType::TvEpisode,
                mean: 39.04,
                stddev: 29.34,
            },
        ])
    }
}

impl Classifier {
    pub fn new(distributions: Vec<Distribution>) -> Self {
        Classifier { distributions }
    }

    pub fn distributions(&self) -> &[Distribution] {
        &self.distributions
    }

    /// Score every title, best guess first: longest duration, then highest
    /// likelihood, then lowest title index
    pub fn likely_contents(
        &self,
        titles: &BTreeMap<usize, &TitleInfo>,
    ) -> Result<Vec<Score>, IdentifyError> {
        if self.distributions.is_empty() {
            return Err(IdentifyError::NoDistributions);
        }

        let mut scores = Vec::with_capacity(titles.len());
        for (&title_index, title) in titles {
            let duration = parse_duration(&title.info.duration).ok_or_else(|| {
                IdentifyError::InvalidDuration {
                    title_index,
                    value: title.info.duration.clone(),
                }
            })?;
            scores.push(self.score(title_index, duration));
        }

        scores.sort_by(|a, b| {
            b.duration
                .cmp(&a.duration)
                .then_with(|| b.likelihood.total_cmp(&a.likelihood))
                .then_with(|| a.title_index.cmp(&b.title_index))
        });
        for score in &scores {
            info!(
                "Title {} likely {} (likelihood={:.3}) [{:?}]",
                score.title_index, score.title_type, score.likelihood, score.duration
            );
        }
        Ok(scores)
    }

    fn score(&self, title_index: usize, duration: Duration) -> Score {
        let minutes = duration.as_secs_f64() / 60.0;
        // Log space: both densities underflow to zero for very long titles
        let log_densities: Vec<(&Distribution, f64)> = self
            .distributions
            .iter()
            .map(|d| (d, d.log_density(minutes)))
            .collect();
        // Non-empty, checked by the caller
        let (best, max) = log_densities
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((&self.distributions[0], 0.0));
        let min = log_densities
            .iter()
            .map(|(_, log_density)| *log_density)
            .min_by(|a, b| a.total_cmp(b))
            .unwrap_or(max);
        debug!(
            "Title {}: {} log density {:.3}, lowest log density {:.3}",
            title_index, best.title_type, max, min
        );
        Score {
            title_index,
            duration,
            title_type: best.title_type.clone(),
            likelihood: (max - min).exp(),
        }
    }
}
