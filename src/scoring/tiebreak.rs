// Tie-break demotion: converts shared calculated ranks into fully-ordered
// predicted ranks.
//
// A tie group is the set of one player's predictions sharing a total (and
// therefore a calculated rank). Demotions 0..k-1 within a group of size k
// make `calculated_rank + demotion` unique. Groups are refreshed
// automatically when a submission moves a prediction between groups, and
// can be reordered explicitly by the player.

use std::collections::HashSet;

use crate::model::{Rating, RatingId};
use crate::scoring::ScoringError;

// ---------------------------------------------------------------------------
// Automatic refresh
// ---------------------------------------------------------------------------

/// Refresh the two tie groups affected by a total change: the group the
/// edited prediction left (`old_total`) and the group it entered
/// (`new_total`). A no-op when the total did not actually change.
///
/// The edited prediction's demotion and group size are cleared first, so
/// the old group is refreshed without it and the new group treats it as a
/// fresh entrant. Within a group, existing members keep their relative
/// order (sorted by current demotion); entrants with no demotion yet sort
/// ahead of them, absent-first, in their slice order.
pub fn refresh_after_total_change(
    ratings: &mut [Rating],
    edited_id: RatingId,
    old_total: Option<u16>,
    new_total: Option<u16>,
) {
    if old_total == new_total {
        return;
    }
    if let Some(edited) = ratings.iter_mut().find(|r| r.id == edited_id) {
        edited.prediction.tie_break_demotion = None;
        edited.prediction.same_rank_count = None;
    }
    refresh_group(ratings, old_total);
    refresh_group(ratings, new_total);
}

/// Reassign demotions within the group holding the given total. An absent
/// total is not a group. A single member gets demotion 0 and count 1; a
/// group of k gets demotions 0..k-1 in current-demotion order (absent
/// first, stable) and count k for every member.
fn refresh_group(ratings: &mut [Rating], total: Option<u16>) {
    let Some(total) = total else {
        return;
    };
    let mut members: Vec<usize> = ratings
        .iter()
        .enumerate()
        .filter(|(_, r)| r.prediction.total_given_points == Some(total))
        .map(|(i, _)| i)
        .collect();

    let size = members.len();
    if size == 0 {
        return;
    }

    // Option's ordering puts None before any Some, and the sort is stable,
    // so unresolved members lead in slice order.
    members.sort_by_key(|&i| ratings[i].prediction.tie_break_demotion);

    for (position, &i) in members.iter().enumerate() {
        ratings[i].prediction.tie_break_demotion = Some(position as u32);
        ratings[i].prediction.same_rank_count = Some(size as u32);
    }
}

// ---------------------------------------------------------------------------
// Manual resolution
// ---------------------------------------------------------------------------

/// Override a tie group's demotions with an explicit order.
///
/// The list must name at least two distinct predictions, all present in
/// `ratings` (one player's set), all sharing the same non-absent calculated
/// rank, and must cover the whole group (`same_rank_count` members). Each
/// named prediction is assigned its 0-based list position as demotion.
pub fn resolve_manual(ratings: &mut [Rating], ordered_ids: &[RatingId]) -> Result<(), ScoringError> {
    if ordered_ids.len() < 2 {
        return Err(ScoringError::InvalidTieBreak(
            "at least two predictions are required to break a tie".into(),
        ));
    }

    let distinct: HashSet<RatingId> = ordered_ids.iter().copied().collect();
    if distinct.len() != ordered_ids.len() {
        return Err(ScoringError::InvalidTieBreak(
            "duplicate prediction ids in the request".into(),
        ));
    }

    let mut indices = Vec::with_capacity(ordered_ids.len());
    for &id in ordered_ids {
        let index = ratings
            .iter()
            .position(|r| r.id == id)
            .ok_or(ScoringError::RatingNotFound(id))?;
        indices.push(index);
    }

    let group_rank = ratings[indices[0]]
        .prediction
        .calculated_rank
        .ok_or_else(|| {
            ScoringError::InvalidTieBreak("the named predictions are not ranked yet".into())
        })?;
    for &index in &indices[1..] {
        if ratings[index].prediction.calculated_rank != Some(group_rank) {
            return Err(ScoringError::InvalidTieBreak(
                "the named predictions do not share one calculated rank".into(),
            ));
        }
    }

    let group_size = ratings[indices[0]].prediction.same_rank_count.unwrap_or(0);
    if group_size as usize != ordered_ids.len() {
        return Err(ScoringError::InvalidTieBreak(format!(
            "the tie group holds {} predictions but {} were named",
            group_size,
            ordered_ids.len()
        )));
    }

    for (position, &index) in indices.iter().enumerate() {
        ratings[index].prediction.tie_break_demotion = Some(position as u32);
    }
    Ok(())
}
