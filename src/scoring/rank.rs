// Competition rank assignment: shared rank for ties, skip-ahead after them.
//
// Used twice with opposite directions — descending over one player's
// prediction totals, ascending over all players' final totals — so both
// places are guaranteed identical tie semantics.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Assign competition ranks to `(id, key)` pairs.
///
/// Items are stably sorted by key in the requested direction, with absent
/// keys after all present ones. Walking the sorted sequence, an item whose
/// key equals the previous item's key shares its rank; otherwise it takes
/// rank `i + 1` (1-based position). A tie of size k therefore makes the
/// next distinct rank jump by k: `1, 1, 3, 3, 3, 6`.
///
/// Items with an absent key are never ranked, and the walk stops at the
/// first absent key (everything after it is absent too, since absent sorts
/// last). Pure and deterministic; safe to call repeatedly.
pub fn assign_ranks<I, K>(items: &[(I, Option<K>)], direction: Direction) -> HashMap<I, u32>
where
    I: Copy + Eq + Hash,
    K: Ord + Copy,
{
    let mut sorted: Vec<&(I, Option<K>)> = items.iter().collect();
    sorted.sort_by(|a, b| match (&a.1, &b.1) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => match direction {
            Direction::Ascending => x.cmp(y),
            Direction::Descending => y.cmp(x),
        },
    });

    let mut ranks = HashMap::new();
    let mut previous: Option<(K, u32)> = None;
    for (i, (id, key)) in sorted.into_iter().enumerate() {
        let Some(key) = key else {
            break;
        };
        let rank = match previous {
            Some((prev_key, prev_rank)) if prev_key == *key => prev_rank,
            _ => i as u32 + 1,
        };
        ranks.insert(*id, rank);
        previous = Some((*key, rank));
    }
    ranks
}
