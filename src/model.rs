// Domain model: countries, players, ratings and their derived records.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type CountryId = i64;
pub type PlayerId = i64;
pub type RatingId = i64;

// ---------------------------------------------------------------------------
// Point vocabulary
// ---------------------------------------------------------------------------

/// The fixed set of point values a player may award in a category.
pub const POINT_VOCABULARY: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 10, 12];

/// The two highest values in the vocabulary. Each may be awarded at most
/// once per category across all of a player's ratings.
pub const SPECIAL_POINT_VALUES: &[u8] = &[10, 12];

/// The three judging categories a player scores every country in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Song,
    Performance,
    Show,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Song, Category::Performance, Category::Show];

    /// Index into a `[Option<u8>; 3]` points array.
    pub fn index(&self) -> usize {
        match self {
            Category::Song => 0,
            Category::Performance => 1,
            Category::Show => 2,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Category::Song => "song",
            Category::Performance => "performance",
            Category::Show => "show",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Contest entities
// ---------------------------------------------------------------------------

/// A participating country in the contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    /// Draw position, 1..N where N is the number of participants.
    pub number: u32,
    pub name: String,
    /// Final placement, 1..N. Absent until results are imported.
    pub actual_rank: Option<u32>,
}

/// The derived ranking state of one rating, recomputed on every point
/// submission. A separate value record so ranking code never reaches back
/// through the rating it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Sum of the three category values iff all three are present.
    pub total_given_points: Option<u16>,
    /// Shared competition rank among the owning player's predictions,
    /// descending by total. Absent while the total is absent.
    pub calculated_rank: Option<u32>,
    /// Offset that turns a shared calculated rank into a unique predicted
    /// rank. Absent until the tie group is resolved.
    pub tie_break_demotion: Option<u32>,
    /// Size of the tie group sharing this prediction's calculated rank.
    pub same_rank_count: Option<u32>,
}

impl Prediction {
    /// The player's final, fully-ordered guess for this country's placement:
    /// calculated rank plus demotion when both are present, the calculated
    /// rank alone otherwise, absent while unranked.
    pub fn predicted_rank(&self) -> Option<u32> {
        match (self.calculated_rank, self.tie_break_demotion) {
            (Some(rank), Some(demotion)) => Some(rank + demotion),
            (Some(rank), None) => Some(rank),
            (None, _) => None,
        }
    }
}

/// The scored outcome of one rating once actual results are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingOutcome {
    /// Actual rank minus predicted rank, or the full penalty (N) when the
    /// prediction was never completed.
    pub rank_difference: i32,
    /// Negative (score-improving) award for a unique exact match, zero
    /// otherwise.
    pub bonus_points: i32,
}

/// One player's judgment of one country. Created blank (one per country)
/// when the player registers; never deleted while the player exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub player_id: PlayerId,
    pub country_id: CountryId,
    /// Category values indexed by `Category::index()`. Each is absent or a
    /// member of `POINT_VOCABULARY`.
    pub points: [Option<u8>; 3],
    pub prediction: Prediction,
    pub outcome: Option<RatingOutcome>,
}

impl Rating {
    pub fn point(&self, category: Category) -> Option<u8> {
        self.points[category.index()]
    }

    /// Replace the category values and recompute the total. The total is
    /// present iff all three categories are present.
    pub fn apply_points(&mut self, points: [Option<u8>; 3]) {
        self.points = points;
        self.prediction.total_given_points = match points {
            [Some(a), Some(b), Some(c)] => Some(u16::from(a) + u16::from(b) + u16::from(c)),
            _ => None,
        };
    }
}

/// A player's aggregated score and final standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGameResult {
    pub player_id: PlayerId,
    pub player_name: String,
    /// Sum of `bonus_points + |rank_difference|` over every rating. Lower
    /// is better.
    pub total_points: i64,
    /// Shared competition rank across all players, ascending by total.
    pub rank: Option<u32>,
}
