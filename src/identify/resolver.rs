use crate::identify::{IdentifyError, Score};
use crate::index::{TitleIndex, TitleRecord, TitleType};
use crate::robot::DiscInfo;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Minimum `shorter / longer` runtime ratio for a candidate to be accepted.
/// Tight enough to tell a remake from the original.
pub const RUNTIME_RATIO_THRESHOLD: f64 = 0.975;

/// Search query for a disc.
///
/// Uses the trimmed disc name, falling back to the volume label, with
/// underscores turned into spaces and the query syntax characters `:` and
/// `-` escaped.
pub fn build_query(disc: &DiscInfo) -> String {
    let name = disc.info.name.trim();
    let name = if name.is_empty() {
        disc.info.volume_name.as_str()
    } else {
        name
    };
    name.replace('_', " ")
        .replace(':', "\\:")
        .replace('-', "\\-")
}

/// Runtime similarity in `[0, 1]`, 1 meaning identical
fn runtime_ratio(candidate: &TitleRecord, best_guess: &Score) -> f64 {
    let candidate = f64::from(candidate.runtime_minutes.unwrap_or(0)) * 60.0;
    let guess = best_guess.duration.as_secs_f64();
    let (shorter, longer) = if candidate < guess {
        (candidate, guess)
    } else {
        (guess, candidate)
    };
    if longer == 0.0 {
        0.0
    } else {
        shorter / longer
    }
}

/// Resolves a classified disc to a single metadata record
#[derive(Clone)]
pub struct IdentityResolver {
    index: Arc<dyn TitleIndex>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("index", &"<dyn TitleIndex>")
            .finish()
    }
}

impl IdentityResolver {
    pub fn new(index: Arc<dyn TitleIndex>) -> Self {
        IdentityResolver { index }
    }

    /// First search result agreeing with the best-guess score, or `None`
    /// when the results run out. Candidates are taken in the order the index
    /// ranked them.
    pub async fn resolve(
        &self,
        disc: &DiscInfo,
        scores: &[Score],
    ) -> Result<Option<TitleRecord>, IdentifyError> {
        let Some(best_guess) = scores.first() else {
            info!("No candidate titles, skipping search");
            return Ok(None);
        };

        let query = build_query(disc);
        info!("🔍 Searching {:?}", query);

        let cancel = CancellationToken::new();
        // Stops the producer however this function returns
        let _stop_search = cancel.clone().drop_guard();
        let mut results = self.index.search(&query, cancel).await?;

        while let Some(candidate) = results.recv().await {
            if candidate.title_type == TitleType::TvSeries {
                debug!("Skipping {}: series container", candidate.id);
                continue;
            }
            if candidate.title_type != best_guess.title_type {
                debug!(
                    "Skipping {} (got {}, want {})",
                    candidate.id, candidate.title_type, best_guess.title_type
                );
                continue;
            }
            let ratio = runtime_ratio(&candidate, best_guess);
            if ratio > RUNTIME_RATIO_THRESHOLD {
                info!("✓ Found [{}] {}", candidate.id, candidate.primary_title);
                return Ok(Some(candidate));
            }
            debug!(
                "Skipping {} {:?}, bad runtime ratio {:.3}",
                candidate.id, candidate.primary_title, ratio
            );
        }

        info!("No match for {:?}", query);
        Ok(None)
    }
}
