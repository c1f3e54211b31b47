//! Deciding which titles on a disc are its main feature and what they are

mod aspects;
mod classifier;
mod plan;
mod resolver;

pub use aspects::{aspects_of, filter_disc_info, score_aspects, Aspect};
pub use classifier::{parse_duration, Classifier, Distribution, Score};
pub use plan::{Identifier, Plan};
pub use resolver::{build_query, IdentityResolver, RUNTIME_RATIO_THRESHOLD};

use crate::index::IndexError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("Title {title_index} has an unparsable duration {value:?}")]
    InvalidDuration { title_index: usize, value: String },
    #[error("No runtime distributions configured")]
    NoDistributions,
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}
