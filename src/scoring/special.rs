// Special-points uniqueness: 10 and 12 may each be awarded at most once
// per category across all of one player's ratings.

use crate::model::{Category, Rating, RatingId, SPECIAL_POINT_VALUES};
use crate::scoring::ScoringError;

/// Reject a point allocation that would duplicate a special award.
///
/// `candidate` holds the values the edited rating is about to take; every
/// *other* rating of the same player is scanned per category. Reusing the
/// same special value in a different category is allowed. No side effects;
/// called before any rank recomputation.
pub fn validate_special_points(
    edited_id: RatingId,
    candidate: &[Option<u8>; 3],
    all_ratings: &[Rating],
) -> Result<(), ScoringError> {
    for category in Category::ALL {
        let Some(value) = candidate[category.index()] else {
            continue;
        };
        if !SPECIAL_POINT_VALUES.contains(&value) {
            continue;
        }
        for other in all_ratings {
            if other.id == edited_id {
                continue;
            }
            if other.point(category) == Some(value) {
                return Err(ScoringError::SpecialPointsConflict {
                    value,
                    category,
                    existing: other.id,
                });
            }
        }
    }
    Ok(())
}
