// SQLite persistence for the game: countries, players, ratings, results.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{
    Country, CountryId, PlayerGameResult, PlayerId, Prediction, Rating, RatingId, RatingOutcome,
};

/// SQLite-backed store for the contest lineup, the registered players,
/// their ratings (points, prediction state, outcomes) and the final
/// standings.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS countries (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                number      INTEGER NOT NULL UNIQUE,
                name        TEXT NOT NULL UNIQUE,
                actual_rank INTEGER
            );

            CREATE TABLE IF NOT EXISTS players (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS ratings (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id          INTEGER NOT NULL REFERENCES players(id),
                country_id         INTEGER NOT NULL REFERENCES countries(id),
                song_points        INTEGER,
                performance_points INTEGER,
                show_points        INTEGER,
                total_given_points INTEGER,
                calculated_rank    INTEGER,
                tie_break_demotion INTEGER,
                same_rank_count    INTEGER,
                rank_difference    INTEGER,
                bonus_points       INTEGER,
                UNIQUE(player_id, country_id)
            );

            CREATE TABLE IF NOT EXISTS player_results (
                player_id    INTEGER PRIMARY KEY REFERENCES players(id),
                total_points INTEGER NOT NULL,
                rank         INTEGER
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Countries
    // ------------------------------------------------------------------

    /// Insert the contest lineup in one transaction. Each entry is
    /// (draw position, country name). Re-importing the same lineup is a
    /// no-op per row (INSERT OR IGNORE keyed on the draw position).
    pub fn import_countries(&self, lineup: &[(u32, String)]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin country import transaction")?;

        let mut inserted = 0;
        for (number, name) in lineup {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO countries (number, name) VALUES (?1, ?2)",
                    params![number, name],
                )
                .context("failed to insert country")?;
        }

        tx.commit().context("failed to commit country import")?;
        Ok(inserted)
    }

    /// Load the full lineup, ordered by draw position.
    pub fn load_countries(&self) -> Result<Vec<Country>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, number, name, actual_rank FROM countries ORDER BY number")
            .context("failed to prepare country query")?;

        let countries = stmt
            .query_map([], |row| {
                Ok(Country {
                    id: row.get(0)?,
                    number: row.get(1)?,
                    name: row.get(2)?,
                    actual_rank: row.get(3)?,
                })
            })
            .context("failed to query countries")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map country rows")?;

        Ok(countries)
    }

    /// Number of participating countries (the game's N).
    pub fn country_count(&self) -> Result<u32> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM countries", [], |row| row.get(0))
            .context("failed to count countries")?;
        Ok(count as u32)
    }

    /// Overwrite every country's actual rank in one transaction. Entries
    /// are (country id, actual rank); re-running with the same data is
    /// idempotent.
    pub fn set_actual_ranks(&self, ranks: &[(CountryId, u32)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin results transaction")?;

        for (country_id, rank) in ranks {
            tx.execute(
                "UPDATE countries SET actual_rank = ?2 WHERE id = ?1",
                params![country_id, rank],
            )
            .context("failed to set actual rank")?;
        }

        tx.commit().context("failed to commit results")?;
        Ok(())
    }

    /// Mapping country id -> actual rank, covering only countries whose
    /// rank is known.
    pub fn load_actual_ranks(&self) -> Result<HashMap<CountryId, u32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, actual_rank FROM countries WHERE actual_rank IS NOT NULL")
            .context("failed to prepare actual-rank query")?;

        let ranks = stmt
            .query_map([], |row| Ok((row.get::<_, CountryId>(0)?, row.get::<_, u32>(1)?)))
            .context("failed to query actual ranks")?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("failed to map actual-rank rows")?;

        Ok(ranks)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Register a player and create one blank rating per country, all in
    /// one transaction. Fails if the name is already taken.
    pub fn register_player(&self, name: &str) -> Result<PlayerId> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin registration transaction")?;

        tx.execute("INSERT INTO players (name) VALUES (?1)", params![name])
            .with_context(|| format!("failed to register player `{name}`"))?;
        let player_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO ratings (player_id, country_id)
             SELECT ?1, id FROM countries ORDER BY number",
            params![player_id],
        )
        .context("failed to create blank ratings")?;

        tx.commit().context("failed to commit registration")?;
        Ok(player_id)
    }

    /// Look up a player by name. Returns `None` if no such player exists.
    pub fn player_id_by_name(&self, name: &str) -> Result<Option<PlayerId>> {
        let conn = self.conn();
        let id = conn
            .query_row(
                "SELECT id FROM players WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up player")?;
        Ok(id)
    }

    /// All registered players, ordered by name.
    pub fn load_players(&self) -> Result<Vec<(PlayerId, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name FROM players ORDER BY name")
            .context("failed to prepare player query")?;

        let players = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;

        Ok(players)
    }

    // ------------------------------------------------------------------
    // Ratings
    // ------------------------------------------------------------------

    /// The player owning a rating. Returns `None` for an unknown rating id.
    pub fn player_id_for_rating(&self, rating_id: RatingId) -> Result<Option<PlayerId>> {
        let conn = self.conn();
        let id = conn
            .query_row(
                "SELECT player_id FROM ratings WHERE id = ?1",
                params![rating_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up rating owner")?;
        Ok(id)
    }

    /// Load one player's full rating set, ordered by the countries' draw
    /// positions. This is the exclusive working set a submission operates
    /// on.
    pub fn load_player_ratings(&self, player_id: PlayerId) -> Result<Vec<Rating>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.player_id, r.country_id,
                        r.song_points, r.performance_points, r.show_points,
                        r.total_given_points, r.calculated_rank,
                        r.tie_break_demotion, r.same_rank_count,
                        r.rank_difference, r.bonus_points
                 FROM ratings r
                 JOIN countries c ON c.id = r.country_id
                 WHERE r.player_id = ?1
                 ORDER BY c.number",
            )
            .context("failed to prepare rating query")?;

        let ratings = stmt
            .query_map(params![player_id], |row| {
                let rank_difference: Option<i32> = row.get(10)?;
                let bonus_points: Option<i32> = row.get(11)?;
                Ok(Rating {
                    id: row.get(0)?,
                    player_id: row.get(1)?,
                    country_id: row.get(2)?,
                    points: [row.get(3)?, row.get(4)?, row.get(5)?],
                    prediction: Prediction {
                        total_given_points: row.get(6)?,
                        calculated_rank: row.get(7)?,
                        tie_break_demotion: row.get(8)?,
                        same_rank_count: row.get(9)?,
                    },
                    outcome: rank_difference.map(|rank_difference| RatingOutcome {
                        rank_difference,
                        bonus_points: bonus_points.unwrap_or(0),
                    }),
                })
            })
            .context("failed to query ratings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map rating rows")?;

        Ok(ratings)
    }

    /// Persist every field of the given ratings in one transaction. The
    /// caller passes exactly the ratings whose prediction or outcome
    /// changed; rows are fully overwritten, so re-persisting is idempotent.
    pub fn persist_ratings(&self, ratings: &[Rating]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin rating transaction")?;

        for rating in ratings {
            tx.execute(
                "UPDATE ratings SET
                    song_points = ?2, performance_points = ?3, show_points = ?4,
                    total_given_points = ?5, calculated_rank = ?6,
                    tie_break_demotion = ?7, same_rank_count = ?8,
                    rank_difference = ?9, bonus_points = ?10
                 WHERE id = ?1",
                params![
                    rating.id,
                    rating.points[0],
                    rating.points[1],
                    rating.points[2],
                    rating.prediction.total_given_points,
                    rating.prediction.calculated_rank,
                    rating.prediction.tie_break_demotion,
                    rating.prediction.same_rank_count,
                    rating.outcome.map(|o| o.rank_difference),
                    rating.outcome.map(|o| o.bonus_points),
                ],
            )
            .context("failed to persist rating")?;
        }

        tx.commit().context("failed to commit ratings")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Player results
    // ------------------------------------------------------------------

    /// Store a player's total and rank. Uses INSERT OR REPLACE so re-running
    /// the bulk computation overwrites the previous standings.
    pub fn save_player_result(&self, result: &PlayerGameResult) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO player_results (player_id, total_points, rank)
             VALUES (?1, ?2, ?3)",
            params![result.player_id, result.total_points, result.rank],
        )
        .context("failed to save player result")?;
        Ok(())
    }

    /// Load the standings, best rank first (unranked players last, by name).
    pub fn load_standings(&self) -> Result<Vec<PlayerGameResult>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.name, pr.total_points, pr.rank
                 FROM player_results pr
                 JOIN players p ON p.id = pr.player_id
                 ORDER BY pr.rank IS NULL, pr.rank, p.name",
            )
            .context("failed to prepare standings query")?;

        let standings = stmt
            .query_map([], |row| {
                Ok(PlayerGameResult {
                    player_id: row.get(0)?,
                    player_name: row.get(1)?,
                    total_points: row.get(2)?,
                    rank: row.get(3)?,
                })
            })
            .context("failed to query standings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map standings rows")?;

        Ok(standings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a fresh in-memory store for each test.
    fn test_store() -> Store {
        Store::open(":memory:").expect("in-memory database should open")
    }

    /// Helper: a three-country lineup.
    fn small_lineup() -> Vec<(u32, String)> {
        vec![
            (1, "Sweden".to_string()),
            (2, "Finland".to_string()),
            (3, "Norway".to_string()),
        ]
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let store = test_store();
        let conn = store.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"countries".to_string()));
        assert!(tables.contains(&"players".to_string()));
        assert!(tables.contains(&"ratings".to_string()));
        assert!(tables.contains(&"player_results".to_string()));
    }

    // ------------------------------------------------------------------
    // Countries
    // ------------------------------------------------------------------

    #[test]
    fn import_and_load_countries() {
        let store = test_store();
        let inserted = store.import_countries(&small_lineup()).unwrap();
        assert_eq!(inserted, 3);

        let countries = store.load_countries().unwrap();
        assert_eq!(countries.len(), 3);
        assert_eq!(countries[0].number, 1);
        assert_eq!(countries[0].name, "Sweden");
        assert!(countries[0].actual_rank.is_none());
        assert_eq!(store.country_count().unwrap(), 3);
    }

    #[test]
    fn reimporting_countries_is_a_no_op() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let inserted = store.import_countries(&small_lineup()).unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.country_count().unwrap(), 3);
    }

    #[test]
    fn actual_ranks_round_trip() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let countries = store.load_countries().unwrap();

        let ranks: Vec<(CountryId, u32)> = countries
            .iter()
            .zip([2u32, 3, 1])
            .map(|(c, r)| (c.id, r))
            .collect();
        store.set_actual_ranks(&ranks).unwrap();

        let loaded = store.load_actual_ranks().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(&countries[0].id), Some(&2));
        assert_eq!(loaded.get(&countries[2].id), Some(&1));
    }

    #[test]
    fn actual_ranks_can_be_overwritten() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let countries = store.load_countries().unwrap();

        store.set_actual_ranks(&[(countries[0].id, 1)]).unwrap();
        store.set_actual_ranks(&[(countries[0].id, 3)]).unwrap();

        let loaded = store.load_actual_ranks().unwrap();
        assert_eq!(loaded.get(&countries[0].id), Some(&3));
    }

    // ------------------------------------------------------------------
    // Players and blank ratings
    // ------------------------------------------------------------------

    #[test]
    fn registration_creates_one_blank_rating_per_country() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();

        let player_id = store.register_player("alice").unwrap();
        let ratings = store.load_player_ratings(player_id).unwrap();

        assert_eq!(ratings.len(), 3);
        for rating in &ratings {
            assert_eq!(rating.player_id, player_id);
            assert_eq!(rating.points, [None; 3]);
            assert_eq!(rating.prediction, Prediction::default());
            assert!(rating.outcome.is_none());
        }
    }

    #[test]
    fn duplicate_player_name_is_rejected() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        store.register_player("alice").unwrap();
        assert!(store.register_player("alice").is_err());
    }

    #[test]
    fn player_lookup_by_name() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let id = store.register_player("alice").unwrap();

        assert_eq!(store.player_id_by_name("alice").unwrap(), Some(id));
        assert_eq!(store.player_id_by_name("bob").unwrap(), None);
    }

    #[test]
    fn load_players_ordered_by_name() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        store.register_player("carol").unwrap();
        store.register_player("alice").unwrap();

        let players = store.load_players().unwrap();
        let names: Vec<&str> = players.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    // ------------------------------------------------------------------
    // Ratings
    // ------------------------------------------------------------------

    #[test]
    fn rating_owner_lookup() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let player_id = store.register_player("alice").unwrap();
        let ratings = store.load_player_ratings(player_id).unwrap();

        assert_eq!(
            store.player_id_for_rating(ratings[0].id).unwrap(),
            Some(player_id)
        );
        assert_eq!(store.player_id_for_rating(9999).unwrap(), None);
    }

    #[test]
    fn persist_ratings_round_trip() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let player_id = store.register_player("alice").unwrap();
        let mut ratings = store.load_player_ratings(player_id).unwrap();

        ratings[0].apply_points([Some(12), Some(10), Some(8)]);
        ratings[0].prediction.calculated_rank = Some(1);
        ratings[0].prediction.tie_break_demotion = Some(0);
        ratings[0].prediction.same_rank_count = Some(1);
        ratings[0].outcome = Some(RatingOutcome {
            rank_difference: -2,
            bonus_points: 0,
        });

        store.persist_ratings(&ratings[..1]).unwrap();

        let reloaded = store.load_player_ratings(player_id).unwrap();
        assert_eq!(reloaded[0], ratings[0]);
        // Untouched ratings stay blank.
        assert_eq!(reloaded[1].points, [None; 3]);
    }

    #[test]
    fn persisting_cleared_fields_writes_nulls_back() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let player_id = store.register_player("alice").unwrap();
        let mut ratings = store.load_player_ratings(player_id).unwrap();

        ratings[0].apply_points([Some(1), Some(2), Some(3)]);
        ratings[0].prediction.calculated_rank = Some(1);
        store.persist_ratings(&ratings[..1]).unwrap();

        ratings[0].apply_points([Some(1), None, Some(3)]);
        ratings[0].prediction.calculated_rank = None;
        store.persist_ratings(&ratings[..1]).unwrap();

        let reloaded = store.load_player_ratings(player_id).unwrap();
        assert_eq!(reloaded[0].prediction.total_given_points, None);
        assert_eq!(reloaded[0].prediction.calculated_rank, None);
    }

    #[test]
    fn ratings_ordered_by_draw_position() {
        let store = test_store();
        store
            .import_countries(&[(2, "Finland".into()), (1, "Sweden".into())])
            .unwrap();
        let player_id = store.register_player("alice").unwrap();
        let ratings = store.load_player_ratings(player_id).unwrap();

        let countries = store.load_countries().unwrap();
        assert_eq!(ratings[0].country_id, countries[0].id); // Sweden, number 1
        assert_eq!(ratings[1].country_id, countries[1].id);
    }

    // ------------------------------------------------------------------
    // Player results
    // ------------------------------------------------------------------

    #[test]
    fn standings_round_trip_and_overwrite() {
        let store = test_store();
        store.import_countries(&small_lineup()).unwrap();
        let alice = store.register_player("alice").unwrap();
        let bob = store.register_player("bob").unwrap();

        store
            .save_player_result(&PlayerGameResult {
                player_id: alice,
                player_name: String::new(),
                total_points: 40,
                rank: Some(2),
            })
            .unwrap();
        store
            .save_player_result(&PlayerGameResult {
                player_id: bob,
                player_name: String::new(),
                total_points: 12,
                rank: Some(1),
            })
            .unwrap();

        let standings = store.load_standings().unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].player_name, "bob");
        assert_eq!(standings[0].rank, Some(1));
        assert_eq!(standings[1].player_name, "alice");
        assert_eq!(standings[1].total_points, 40);

        // Recomputation overwrites.
        store
            .save_player_result(&PlayerGameResult {
                player_id: alice,
                player_name: String::new(),
                total_points: 10,
                rank: Some(1),
            })
            .unwrap();
        let standings = store.load_standings().unwrap();
        assert_eq!(standings[0].player_name, "alice");
        assert_eq!(standings[0].total_points, 10);
    }

    #[test]
    fn foreign_keys_enforced() {
        let store = test_store();
        // Saving a result for a non-existent player should fail because
        // foreign_keys = ON.
        let result = store.save_player_result(&PlayerGameResult {
            player_id: 9999,
            player_name: String::new(),
            total_points: 0,
            rank: None,
        });
        assert!(result.is_err());
    }
}
