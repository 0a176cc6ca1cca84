//! Elo Ratings
//!
//! Ranked pair matches feed a small Elo database keyed by player token.
//! Mutation is synchronous; the caller persists the resulting document
//! through the store whenever a match is recorded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::world::PlayerId;
use crate::net::protocol::RatingsUpdate;
use crate::store::{Store, StoreError};

/// Starting rating for an unseen player.
pub const INITIAL_RATING: i32 = 1200;

/// K-factor for every recorded match.
const K_FACTOR: f64 = 32.0;

/// Ratings are clamped into this range after each update.
const RATING_FLOOR: i32 = 200;
const RATING_CEILING: i32 = 3000;

/// One player's entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    /// Current rating.
    pub rating: i32,
    /// Last seen display name.
    pub name: Option<String>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for RatingEntry {
    fn default() -> Self {
        RatingEntry {
            rating: INITIAL_RATING,
            name: None,
            updated_at: None,
        }
    }
}

/// The persisted document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RatingsDb {
    /// Entries keyed by player token.
    pub players: BTreeMap<String, RatingEntry>,
}

/// One leaderboard row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Player token.
    pub token: String,
    /// Current rating.
    pub rating: i32,
    /// Last seen display name.
    pub name: Option<String>,
}

/// In-memory ratings database bound to its store path.
#[derive(Debug)]
pub struct Ratings {
    path: PathBuf,
    db: RatingsDb,
}

fn elo_expected(ra: i32, rb: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(rb - ra) / 400.0))
}

impl Ratings {
    /// Load the database from the store, or start empty.
    pub async fn open(store: &Store) -> Result<Ratings, StoreError> {
        let path = store.dirs.ratings.join("ratings.json");
        let db = if store.exists(&path).await {
            store.read_json(&path).await.unwrap_or_default()
        } else {
            RatingsDb::default()
        };
        Ok(Ratings { path, db })
    }

    /// Where the document persists.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the document for persistence.
    pub fn document(&self) -> RatingsDb {
        self.db.clone()
    }

    fn ensure(&mut self, token: PlayerId) -> &mut RatingEntry {
        self.db.players.entry(token.to_string()).or_default()
    }

    /// Current rating for a token.
    pub fn get(&self, token: PlayerId) -> i32 {
        self.db
            .players
            .get(&token.to_string())
            .map_or(INITIAL_RATING, |e| e.rating)
    }

    /// Remember a player's display name.
    pub fn set_name(&mut self, token: PlayerId, name: &str) {
        let entry = self.ensure(token);
        entry.name = Some(name.to_string());
        entry.updated_at = Some(Utc::now());
    }

    /// Record a ranked pair result and return both new ratings. The caller
    /// persists [`Ratings::document`] afterwards.
    pub fn record_match(&mut self, a: PlayerId, b: PlayerId, winner: PlayerId) -> RatingsUpdate {
        let ra = self.get(a);
        let rb = self.get(b);
        let ea = elo_expected(ra, rb);
        let eb = elo_expected(rb, ra);
        let sa = if winner == a { 1.0 } else { 0.0 };
        let sb = if winner == b { 1.0 } else { 0.0 };

        let new_a = ((f64::from(ra) + K_FACTOR * (sa - ea)).round() as i32)
            .clamp(RATING_FLOOR, RATING_CEILING);
        let new_b = ((f64::from(rb) + K_FACTOR * (sb - eb)).round() as i32)
            .clamp(RATING_FLOOR, RATING_CEILING);

        let now = Utc::now();
        let entry = self.ensure(a);
        entry.rating = new_a;
        entry.updated_at = Some(now);
        let entry = self.ensure(b);
        entry.rating = new_b;
        entry.updated_at = Some(now);

        RatingsUpdate { a: new_a, b: new_b }
    }

    /// Top entries by rating.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .db
            .players
            .iter()
            .map(|(token, e)| LeaderboardEntry {
                token: token.clone(),
                rating: e.rating,
                name: e.name.clone(),
            })
            .collect();
        entries.sort_by(|x, y| y.rating.cmp(&x.rating));
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> Ratings {
        Ratings {
            path: PathBuf::from("ratings.json"),
            db: RatingsDb::default(),
        }
    }

    fn token(n: u128) -> PlayerId {
        PlayerId(uuid::Uuid::from_u128(n))
    }

    #[test]
    fn test_expected_score_symmetry() {
        assert!((elo_expected(1200, 1200) - 0.5).abs() < 1e-9);
        let e = elo_expected(1400, 1200);
        assert!((e + elo_expected(1200, 1400) - 1.0).abs() < 1e-9);
        assert!(e > 0.5);
    }

    #[test]
    fn test_even_match_transfers_half_k() {
        let mut ratings = scratch();
        let (a, b) = (token(1), token(2));
        let update = ratings.record_match(a, b, a);
        assert_eq!(update.a, 1216);
        assert_eq!(update.b, 1184);
        assert_eq!(ratings.get(a), 1216);
        assert_eq!(ratings.get(b), 1184);
    }

    #[test]
    fn test_upset_moves_more_points() {
        let mut ratings = scratch();
        let (fav, dog) = (token(1), token(2));
        ratings.ensure(fav).rating = 1600;
        ratings.ensure(dog).rating = 1200;
        let update = ratings.record_match(fav, dog, dog);
        assert!(update.b - 1200 > 16);
        assert_eq!(update.a - 1600, -(update.b - 1200));
    }

    #[test]
    fn test_ratings_clamped() {
        let mut ratings = scratch();
        let (a, b) = (token(1), token(2));
        ratings.ensure(a).rating = RATING_CEILING;
        ratings.ensure(b).rating = RATING_FLOOR;
        // The favorite winning cannot push past the ceiling, nor the
        // underdog below the floor.
        let update = ratings.record_match(a, b, a);
        assert_eq!(update.a, RATING_CEILING);
        assert_eq!(update.b, RATING_FLOOR);
    }

    #[test]
    fn test_leaderboard_sorted_and_limited() {
        let mut ratings = scratch();
        for i in 0..5 {
            ratings.ensure(token(i)).rating = 1000 + (i as i32) * 100;
        }
        let top = ratings.leaderboard(3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].rating, 1400);
        assert!(top[0].rating >= top[1].rating && top[1].rating >= top[2].rating);
    }

    #[tokio::test]
    async fn test_open_starts_empty_and_persists() {
        let root = std::env::temp_dir()
            .join("blast-arena-ratings-tests")
            .join(uuid::Uuid::new_v4().to_string());
        let store = Store::open(root).await.unwrap();
        let mut ratings = Ratings::open(&store).await.unwrap();
        assert_eq!(ratings.get(token(7)), INITIAL_RATING);

        ratings.record_match(token(7), token(8), token(7));
        store
            .write_json(&ratings.path().to_path_buf(), &ratings.document())
            .await
            .unwrap();

        let reloaded = Ratings::open(&store).await.unwrap();
        assert_eq!(reloaded.get(token(7)), 1216);
    }
}
