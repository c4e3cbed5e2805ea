// Game engine: orchestrates submissions, tie-breaks, results and standings
// on top of the store and the scoring pipeline.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::db::Store;
use crate::model::{
    Country, PlayerGameResult, PlayerId, Rating, RatingId, RatingOutcome, POINT_VOCABULARY,
};
use crate::scoring::aggregate::{rank_players, score_player};
use crate::scoring::outcome::compute_outcome;
use crate::scoring::rank::{assign_ranks, Direction};
use crate::scoring::special::validate_special_points;
use crate::scoring::tiebreak::{refresh_after_total_change, resolve_manual};
use crate::scoring::ScoringError;

// ---------------------------------------------------------------------------
// Rating window
// ---------------------------------------------------------------------------

/// Gate on every state-changing player operation. The window either never
/// closes or closes at a fixed instant (the start of the live show);
/// submissions, registrations and tie-breaks are rejected from that instant
/// on. Results import and scoring are not gated.
#[derive(Debug, Clone, Copy)]
pub enum RatingWindow {
    AlwaysOpen,
    ClosesAt(DateTime<Utc>),
}

impl RatingWindow {
    pub fn from_config(config: &Config) -> Self {
        match config.voting_closes_at {
            Some(deadline) => RatingWindow::ClosesAt(deadline),
            None => RatingWindow::AlwaysOpen,
        }
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            RatingWindow::AlwaysOpen => true,
            RatingWindow::ClosesAt(deadline) => now < *deadline,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// CSV row in the lineup file: draw position and country name.
#[derive(Debug, Deserialize)]
struct LineupRecord {
    number: u32,
    name: String,
}

/// CSV row in the results file: draw position and final placement.
#[derive(Debug, Deserialize)]
struct ResultRecord {
    number: u32,
    rank: u32,
}

pub struct Engine {
    store: Store,
    window: RatingWindow,
}

impl Engine {
    pub fn new(store: Store, window: RatingWindow) -> Self {
        Self { store, window }
    }

    fn check_window(&self) -> Result<(), ScoringError> {
        if self.window.is_open() {
            Ok(())
        } else {
            Err(ScoringError::RatingWindowClosed)
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Import the contest lineup from a CSV file with `number,name` rows.
    /// Draw positions must form the exact sequence 1..N. Re-importing the
    /// same lineup is a no-op. Returns the number of countries inserted.
    pub fn import_countries(&self, path: &Path) -> Result<usize> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open lineup file {}", path.display()))?;

        let mut lineup = Vec::new();
        for record in reader.deserialize() {
            let record: LineupRecord = record
                .with_context(|| format!("malformed row in lineup file {}", path.display()))?;
            lineup.push((record.number, record.name));
        }

        if lineup.is_empty() {
            bail!("lineup file {} holds no countries", path.display());
        }
        let mut numbers: Vec<u32> = lineup.iter().map(|(n, _)| *n).collect();
        numbers.sort_unstable();
        let expected: Vec<u32> = (1..=lineup.len() as u32).collect();
        if numbers != expected {
            bail!(
                "lineup file {}: draw positions must be exactly 1..{}",
                path.display(),
                lineup.len()
            );
        }

        let inserted = self.store.import_countries(&lineup)?;
        info!(countries = lineup.len(), inserted, "lineup imported");
        Ok(inserted)
    }

    /// Register a player and their blank rating set, one rating per country.
    pub fn register_player(&self, name: &str) -> Result<PlayerId> {
        self.check_window()?;

        let name = name.trim();
        if name.is_empty() {
            bail!("player name must not be empty");
        }
        if self.store.country_count()? == 0 {
            bail!("no countries imported yet; import the lineup first");
        }
        if self.store.player_id_by_name(name)?.is_some() {
            bail!("player `{name}` is already registered");
        }

        let player_id = self.store.register_player(name)?;
        info!(player = name, player_id, "player registered");
        Ok(player_id)
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    /// Submit (or clear) a rating's category values. Validates the point
    /// vocabulary and the special-award uniqueness, then recomputes the
    /// owning player's calculated ranks and refreshes the two tie groups
    /// the change touches. Only ratings that actually changed are written
    /// back.
    pub fn submit_points(&self, rating_id: RatingId, points: [Option<u8>; 3]) -> Result<()> {
        self.check_window()?;

        for value in points.into_iter().flatten() {
            if !POINT_VOCABULARY.contains(&value) {
                return Err(ScoringError::InvalidPointValue(value).into());
            }
        }

        let player_id = self
            .store
            .player_id_for_rating(rating_id)?
            .ok_or(ScoringError::RatingNotFound(rating_id))?;
        let mut ratings = self.store.load_player_ratings(player_id)?;
        let before = ratings.clone();

        validate_special_points(rating_id, &points, &ratings)?;

        let edited = ratings
            .iter_mut()
            .find(|r| r.id == rating_id)
            .ok_or(ScoringError::RatingNotFound(rating_id))?;
        let old_total = edited.prediction.total_given_points;
        edited.apply_points(points);
        let new_total = edited.prediction.total_given_points;

        self.recompute_calculated_ranks(&mut ratings);
        refresh_after_total_change(&mut ratings, rating_id, old_total, new_total);

        self.persist_changed(&before, &ratings)?;
        debug!(rating_id, ?old_total, ?new_total, "points submitted");
        Ok(())
    }

    /// Shared competition ranks over one player's predictions, descending
    /// by total. Predictions without a total lose their rank.
    fn recompute_calculated_ranks(&self, ratings: &mut [Rating]) {
        let items: Vec<(RatingId, Option<u16>)> = ratings
            .iter()
            .map(|r| (r.id, r.prediction.total_given_points))
            .collect();
        let ranks = assign_ranks(&items, Direction::Descending);
        for rating in ratings.iter_mut() {
            rating.prediction.calculated_rank = ranks.get(&rating.id).copied();
        }
    }

    /// Apply a player's explicit ordering to one of their tie groups. All
    /// named ratings must belong to the same player and cover the group.
    pub fn resolve_tie_break(&self, ordered_ids: &[RatingId]) -> Result<()> {
        self.check_window()?;

        let first = *ordered_ids
            .first()
            .ok_or_else(|| ScoringError::InvalidTieBreak("no predictions named".into()))?;
        let player_id = self
            .store
            .player_id_for_rating(first)?
            .ok_or(ScoringError::RatingNotFound(first))?;

        let mut ratings = self.store.load_player_ratings(player_id)?;
        let before = ratings.clone();

        resolve_manual(&mut ratings, ordered_ids)?;

        self.persist_changed(&before, &ratings)?;
        info!(player_id, group = ordered_ids.len(), "tie break resolved");
        Ok(())
    }

    fn persist_changed(&self, before: &[Rating], after: &[Rating]) -> Result<()> {
        let changed: Vec<Rating> = after
            .iter()
            .filter(|rating| !before.contains(rating))
            .cloned()
            .collect();
        if !changed.is_empty() {
            self.store.persist_ratings(&changed)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Results and scoring
    // ------------------------------------------------------------------

    /// Import the final placements from a CSV file with `number,rank` rows.
    /// Every country must appear exactly once and the ranks must form the
    /// exact sequence 1..N. Re-importing overwrites the previous results.
    pub fn import_results(&self, path: &Path) -> Result<usize> {
        let invalid = |message: String| ScoringError::InvalidResults {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open results file {}", path.display()))?;

        let countries = self.store.load_countries()?;
        if countries.is_empty() {
            bail!("no countries imported yet; import the lineup first");
        }

        let mut ranks = Vec::new();
        let mut seen_numbers = HashSet::new();
        for record in reader.deserialize() {
            let record: ResultRecord = record
                .with_context(|| format!("malformed row in results file {}", path.display()))?;
            if !seen_numbers.insert(record.number) {
                return Err(invalid(format!(
                    "draw position {} listed more than once",
                    record.number
                ))
                .into());
            }
            let country = countries
                .iter()
                .find(|c| c.number == record.number)
                .ok_or(ScoringError::CountryNotFound(record.number))?;
            ranks.push((country.id, record.rank));
        }

        if ranks.len() != countries.len() {
            return Err(invalid(format!(
                "{} of {} countries have a placement",
                ranks.len(),
                countries.len()
            ))
            .into());
        }
        let mut placements: Vec<u32> = ranks.iter().map(|(_, r)| *r).collect();
        placements.sort_unstable();
        let expected: Vec<u32> = (1..=countries.len() as u32).collect();
        if placements != expected {
            return Err(invalid(format!(
                "placements must be exactly 1..{}",
                countries.len()
            ))
            .into());
        }

        self.store.set_actual_ranks(&ranks)?;
        info!(countries = ranks.len(), "results imported");
        Ok(ranks.len())
    }

    /// Score the whole game: compute every rating's outcome against the
    /// imported results, total each player, and assign the final standings.
    /// Idempotent — rerunning overwrites all outcomes and results. Returns
    /// the standings, best rank first.
    pub fn compute_game_results(&self) -> Result<Vec<PlayerGameResult>> {
        let actual_ranks = self.store.load_actual_ranks()?;
        let country_count = self.store.country_count()?;

        let mut results = Vec::new();
        for (player_id, player_name) in self.store.load_players()? {
            let mut ratings = self.store.load_player_ratings(player_id)?;

            let outcomes: Vec<RatingOutcome> = ratings
                .iter()
                .map(|rating| {
                    compute_outcome(
                        rating,
                        &ratings,
                        actual_ranks.get(&rating.country_id).copied(),
                        country_count,
                    )
                })
                .collect::<Result<_, _>>()
                .inspect_err(|e| error!(player = %player_name, "scoring failed: {e}"))?;
            for (rating, outcome) in ratings.iter_mut().zip(outcomes) {
                rating.outcome = Some(outcome);
            }
            self.store.persist_ratings(&ratings)?;

            let total_points = score_player(&ratings)
                .inspect_err(|e| error!(player = %player_name, "aggregation failed: {e}"))?;
            results.push(PlayerGameResult {
                player_id,
                player_name,
                total_points,
                rank: None,
            });
        }

        rank_players(&mut results);
        for result in &results {
            self.store.save_player_result(result)?;
        }
        info!(players = results.len(), "game results computed");

        self.store.load_standings()
    }

    /// The saved standings, best rank first. Empty until the game has been
    /// scored.
    pub fn standings(&self) -> Result<Vec<PlayerGameResult>> {
        self.store.load_standings()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// One player's ratings paired with their countries, in draw order.
    pub fn ratings_for(&self, player_name: &str) -> Result<Vec<(Country, Rating)>> {
        let player_id = self
            .store
            .player_id_by_name(player_name)?
            .ok_or_else(|| ScoringError::PlayerNotFound(player_name.to_string()))?;

        let countries = self.store.load_countries()?;
        let ratings = self.store.load_player_ratings(player_id)?;

        let mut paired = Vec::with_capacity(ratings.len());
        for rating in ratings {
            let country = countries
                .iter()
                .find(|c| c.id == rating.country_id)
                .cloned()
                .context("rating references a country that no longer exists")?;
            paired.push((country, rating));
        }
        Ok(paired)
    }
}
