// Rating outcomes: rank deviation and the unique-exact-match bonus.

use crate::model::{Rating, RatingOutcome};
use crate::scoring::ScoringError;

/// Bonus award for a unique exact prediction of the given actual rank.
///
/// Negative values improve the score, since lower totals win. Correctly
/// calling the winner is worth far more than correctly calling 10th place;
/// exact matches below the top ten earn nothing.
pub fn bonus_for_rank(actual_rank: u32) -> i32 {
    match actual_rank {
        1 => -25,
        2 => -18,
        3 => -15,
        4 => -12,
        5 => -10,
        6 => -8,
        7 => -6,
        8 => -4,
        9 => -2,
        10 => -1,
        _ => 0,
    }
}

/// Score one rating against its country's actual rank.
///
/// Fails with `MissingActualRank` when results have not been imported for
/// the country — a pipeline-ordering defect, not user input. A rating whose
/// prediction was never completed is charged the maximum possible
/// deviation: `country_count` (N), with no bonus.
///
/// The bonus applies only to an exact match (difference 0) that no *other*
/// rating of the same player also predicts; two ratings aiming at the same
/// placement cancel each other's bonus.
pub fn compute_outcome(
    rating: &Rating,
    all_ratings: &[Rating],
    actual_rank: Option<u32>,
    country_count: u32,
) -> Result<RatingOutcome, ScoringError> {
    let actual = actual_rank.ok_or(ScoringError::MissingActualRank {
        country_id: rating.country_id,
    })?;

    let Some(predicted) = rating.prediction.predicted_rank() else {
        return Ok(RatingOutcome {
            rank_difference: country_count as i32,
            bonus_points: 0,
        });
    };

    let rank_difference = actual as i32 - predicted as i32;
    let bonus_points = if rank_difference == 0 {
        let shared = all_ratings.iter().any(|other| {
            other.id != rating.id && other.prediction.predicted_rank() == Some(actual)
        });
        if shared {
            0
        } else {
            bonus_for_rank(actual)
        }
    } else {
        0
    };

    Ok(RatingOutcome {
        rank_difference,
        bonus_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Prediction, RatingId};

    /// One player's rating with a fully resolved predicted rank.
    fn predicting(id: RatingId, predicted_rank: Option<u32>) -> Rating {
        Rating {
            id,
            player_id: 1,
            country_id: id,
            points: [None; 3],
            prediction: Prediction {
                total_given_points: predicted_rank.map(|_| 9),
                calculated_rank: predicted_rank,
                tie_break_demotion: predicted_rank.map(|_| 0),
                same_rank_count: predicted_rank.map(|_| 1),
            },
            outcome: None,
        }
    }

    #[test]
    fn difference_is_actual_minus_predicted() {
        let rating = predicting(1, Some(7));
        let outcome = compute_outcome(&rating, &[rating.clone()], Some(3), 26).unwrap();
        assert_eq!(outcome.rank_difference, -4);
        assert_eq!(outcome.bonus_points, 0);

        let outcome = compute_outcome(&rating, &[rating.clone()], Some(12), 26).unwrap();
        assert_eq!(outcome.rank_difference, 5);
        assert_eq!(outcome.bonus_points, 0);
    }

    #[test]
    fn unique_exact_match_earns_the_table_bonus() {
        // Actual rank 5, unique predicted rank 5 -> bonus -10, deviation 0.
        let rating = predicting(1, Some(5));
        let others = vec![rating.clone(), predicting(2, Some(3))];

        let outcome = compute_outcome(&rating, &others, Some(5), 26).unwrap();
        assert_eq!(outcome.rank_difference, 0);
        assert_eq!(outcome.bonus_points, -10);
    }

    #[test]
    fn shared_exact_match_earns_nothing() {
        // Two of the player's ratings both predict rank 5.
        let first = predicting(1, Some(5));
        let second = predicting(2, Some(5));
        let all = vec![first.clone(), second.clone()];

        let outcome = compute_outcome(&first, &all, Some(5), 26).unwrap();
        assert_eq!(outcome.rank_difference, 0);
        assert_eq!(outcome.bonus_points, 0);

        let outcome = compute_outcome(&second, &all, Some(5), 26).unwrap();
        assert_eq!(outcome.bonus_points, 0);
    }

    #[test]
    fn incomplete_prediction_pays_the_full_penalty() {
        let rating = predicting(1, None);
        let outcome = compute_outcome(&rating, &[rating.clone()], Some(1), 26).unwrap();
        assert_eq!(outcome.rank_difference, 26);
        assert_eq!(outcome.bonus_points, 0);
    }

    #[test]
    fn missing_actual_rank_is_a_pipeline_error() {
        let rating = predicting(1, Some(5));
        let err = compute_outcome(&rating, &[rating.clone()], None, 26).unwrap_err();
        assert!(matches!(err, ScoringError::MissingActualRank { country_id: 1 }));
    }

    #[test]
    fn bonus_table_matches_the_game_rules() {
        let expected = [
            (1, -25),
            (2, -18),
            (3, -15),
            (4, -12),
            (5, -10),
            (6, -8),
            (7, -6),
            (8, -4),
            (9, -2),
            (10, -1),
        ];
        for (rank, bonus) in expected {
            assert_eq!(bonus_for_rank(rank), bonus, "rank {rank}");
        }
        assert_eq!(bonus_for_rank(11), 0);
        assert_eq!(bonus_for_rank(26), 0);
    }

    #[test]
    fn exact_match_outside_top_ten_gets_zero_bonus_but_zero_deviation() {
        let rating = predicting(1, Some(14));
        let outcome = compute_outcome(&rating, &[rating.clone()], Some(14), 26).unwrap();
        assert_eq!(outcome.rank_difference, 0);
        assert_eq!(outcome.bonus_points, 0);
    }
}
