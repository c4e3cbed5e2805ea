// Scoring pipeline: ranking, validation, tie-breaking, outcomes, aggregation.

pub mod aggregate;
pub mod outcome;
pub mod rank;
pub mod special;
pub mod tiebreak;

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Category, CountryId, RatingId};

/// Everything that can go wrong in the scoring pipeline.
///
/// The first block is caller-facing: bad input, rejected outright, no
/// retry. `RatingWindowClosed` is checked before any state is read. The
/// `MissingActualRank` / `MissingOutcome` pair are internal consistency
/// errors — they mean the bulk pipeline was invoked out of order and are
/// logged as defects before propagating.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("{0} is not a valid point value (allowed: 1-8, 10, 12)")]
    InvalidPointValue(u8),

    #[error("special value {value} already awarded in category `{category}` (see rating {existing})")]
    SpecialPointsConflict {
        value: u8,
        category: Category,
        existing: RatingId,
    },

    #[error("invalid tie-break request: {0}")]
    InvalidTieBreak(String),

    #[error("rating {0} not found")]
    RatingNotFound(RatingId),

    #[error("player `{0}` not found")]
    PlayerNotFound(String),

    #[error("country with draw position {0} not found")]
    CountryNotFound(u32),

    #[error("invalid results file {path}: {message}")]
    InvalidResults { path: PathBuf, message: String },

    #[error("the rating window has closed; no further changes are accepted")]
    RatingWindowClosed,

    #[error("country {country_id} has no actual rank; import the results before computing outcomes")]
    MissingActualRank { country_id: CountryId },

    #[error("rating {rating_id} has no computed outcome; compute outcomes before aggregating")]
    MissingOutcome { rating_id: RatingId },
}
