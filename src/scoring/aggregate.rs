// Player aggregation: per-player totals and the cross-player standings.

use crate::model::{PlayerGameResult, PlayerId, Rating};
use crate::scoring::rank::{assign_ranks, Direction};
use crate::scoring::ScoringError;

/// Sum a player's rating outcomes into a total score.
///
/// Total = Σ (bonus + |rank difference|) over every rating the player
/// owns. Fails with `MissingOutcome` if any rating has not been scored —
/// aggregation before outcome computation is a pipeline-ordering defect.
pub fn score_player(ratings: &[Rating]) -> Result<i64, ScoringError> {
    let mut total: i64 = 0;
    for rating in ratings {
        let outcome = rating
            .outcome
            .as_ref()
            .ok_or(ScoringError::MissingOutcome {
                rating_id: rating.id,
            })?;
        total += i64::from(outcome.bonus_points) + i64::from(outcome.rank_difference.abs());
    }
    Ok(total)
}

/// Assign final standings across all players: competition ranks ascending
/// by total (lower total wins), the same shared-rank/skip-ahead semantics
/// as prediction ranking.
pub fn rank_players(results: &mut [PlayerGameResult]) {
    let items: Vec<(PlayerId, Option<i64>)> = results
        .iter()
        .map(|r| (r.player_id, Some(r.total_points)))
        .collect();
    let ranks = assign_ranks(&items, Direction::Ascending);
    for result in results.iter_mut() {
        result.rank = ranks.get(&result.player_id).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Prediction, RatingId, RatingOutcome};

    fn scored_rating(id: RatingId, rank_difference: i32, bonus_points: i32) -> Rating {
        Rating {
            id,
            player_id: 1,
            country_id: id,
            points: [None; 3],
            prediction: Prediction::default(),
            outcome: Some(RatingOutcome {
                rank_difference,
                bonus_points,
            }),
        }
    }

    fn result(player_id: PlayerId, total_points: i64) -> PlayerGameResult {
        PlayerGameResult {
            player_id,
            player_name: format!("player {player_id}"),
            total_points,
            rank: None,
        }
    }

    #[test]
    fn total_sums_bonus_and_absolute_deviation() {
        let ratings = vec![
            scored_rating(1, -4, 0),  // |−4| = 4
            scored_rating(2, 0, -10), // exact unique match
            scored_rating(3, 26, 0),  // never completed
        ];
        assert_eq!(score_player(&ratings).unwrap(), 4 - 10 + 26);
    }

    #[test]
    fn empty_rating_set_scores_zero() {
        assert_eq!(score_player(&[]).unwrap(), 0);
    }

    #[test]
    fn missing_outcome_aborts_aggregation() {
        let mut ratings = vec![scored_rating(1, 2, 0)];
        ratings.push(Rating {
            outcome: None,
            ..scored_rating(2, 0, 0)
        });

        let err = score_player(&ratings).unwrap_err();
        assert!(matches!(err, ScoringError::MissingOutcome { rating_id: 2 }));
    }

    #[test]
    fn standings_rank_ascending_with_shared_ranks() {
        let mut results = vec![
            result(1, 87),
            result(2, 52),
            result(3, 52),
            result(4, 110),
        ];
        rank_players(&mut results);

        assert_eq!(results[1].rank, Some(1));
        assert_eq!(results[2].rank, Some(1));
        assert_eq!(results[0].rank, Some(3));
        assert_eq!(results[3].rank, Some(4));
    }

    #[test]
    fn standings_are_stable_across_reruns() {
        let mut first = vec![result(1, 40), result(2, 40), result(3, 12)];
        let mut second = first.clone();
        rank_players(&mut first);
        rank_players(&mut second);
        assert_eq!(first, second);
    }
}
