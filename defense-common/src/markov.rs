//! Read-only reader over the persisted Markov bigram model used by the
//! tarpit's fake-text generator.
//!
//! Relational schema: `words(id, word unique)` and
//! `sequences(p1, p2, next_id, freq, unique(p1,p2,next_id))`. Populated
//! offline; loaded once into memory at startup since it is read-only for
//! the lifetime of the process, then sampled from without further
//! round-trips to Postgres (the tarpit's generation loop samples the
//! model many times per request and cannot afford per-token queries).

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use sqlx::PgPool;

use crate::error::Result;

/// Reserved ID for the empty-token sentinel `(∅, ∅)`.
pub const EMPTY_TOKEN_ID: i64 = 1;

/// In-memory snapshot of the bigram→successor table, built once at
/// startup from Postgres.
#[derive(Debug, Default)]
pub struct MarkovModel {
    successors: HashMap<(i64, i64), Vec<(i64, i64)>>,
    words: HashMap<i64, String>,
}

impl MarkovModel {
    /// Build a model directly from parts, bypassing Postgres. Used by
    /// downstream crates to construct fixture models in tests.
    pub fn from_parts(
        successors: HashMap<(i64, i64), Vec<(i64, i64)>>,
        words: HashMap<i64, String>,
    ) -> Self {
        Self { successors, words }
    }

    pub fn word_text(&self, id: i64) -> Option<&str> {
        self.words.get(&id).map(String::as_str)
    }

    /// Sample a weighted-random successor for the bigram `(p1, p2)`.
    /// Returns `None` if no successor exists, at which point the caller
    /// restarts generation from `(EMPTY_TOKEN_ID, EMPTY_TOKEN_ID)`.
    pub fn sample_successor(&self, p1: i64, p2: i64, rng: &mut impl Rng) -> Option<i64> {
        let candidates = self.successors.get(&(p1, p2))?;
        pick_weighted(candidates, rng)
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }
}

#[derive(Clone)]
pub struct MarkovReader {
    pool: PgPool,
}

impl MarkovReader {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Load the full model into memory. Called once at startup.
    pub async fn load(&self) -> Result<Arc<MarkovModel>> {
        let word_rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, word FROM words").fetch_all(&self.pool).await?;
        let seq_rows: Vec<(i64, i64, i64, i64)> =
            sqlx::query_as("SELECT p1, p2, next_id, freq FROM sequences")
                .fetch_all(&self.pool)
                .await?;

        let words: HashMap<i64, String> = word_rows.into_iter().collect();
        let mut successors: HashMap<(i64, i64), Vec<(i64, i64)>> = HashMap::new();
        for (p1, p2, next_id, freq) in seq_rows {
            successors.entry((p1, p2)).or_default().push((next_id, freq));
        }

        Ok(Arc::new(MarkovModel { successors, words }))
    }
}

/// Weighted-random pick over `(id, freq)` candidates. Pure and unit
/// testable without a database.
fn pick_weighted(candidates: &[(i64, i64)], rng: &mut impl Rng) -> Option<i64> {
    let total: i64 = candidates.iter().map(|(_, freq)| (*freq).max(0)).sum();
    if total <= 0 || candidates.is_empty() {
        return None;
    }
    let mut pick = rng.gen_range(0..total);
    for (id, freq) in candidates {
        let freq = (*freq).max(0);
        if pick < freq {
            return Some(*id);
        }
        pick -= freq;
    }
    candidates.last().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model_with(successors: HashMap<(i64, i64), Vec<(i64, i64)>>) -> MarkovModel {
        MarkovModel {
            successors,
            words: HashMap::new(),
        }
    }

    #[test]
    fn test_pick_weighted_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_weighted(&[], &mut rng), None);
    }

    #[test]
    fn test_pick_weighted_single_candidate() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_weighted(&[(42, 5)], &mut rng), Some(42));
    }

    #[test]
    fn test_pick_weighted_deterministic_for_seed() {
        let candidates = vec![(1, 10), (2, 20), (3, 70)];
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        assert_eq!(
            pick_weighted(&candidates, &mut rng_a),
            pick_weighted(&candidates, &mut rng_b)
        );
    }

    #[test]
    fn test_pick_weighted_all_zero_freq() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_weighted(&[(1, 0), (2, 0)], &mut rng), None);
    }

    #[test]
    fn test_model_sample_missing_bigram_returns_none() {
        let model = model_with(HashMap::new());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.sample_successor(EMPTY_TOKEN_ID, EMPTY_TOKEN_ID, &mut rng), None);
    }

    #[test]
    fn test_model_sample_known_bigram() {
        let mut successors = HashMap::new();
        successors.insert((EMPTY_TOKEN_ID, EMPTY_TOKEN_ID), vec![(10, 1)]);
        let model = model_with(successors);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.sample_successor(EMPTY_TOKEN_ID, EMPTY_TOKEN_ID, &mut rng), Some(10));
    }
}
