//! Memoized analyses.
//!
//! The pipeline is deterministic, so an analysis can be reused for an
//! identical request. Entries are keyed by a hash of the serialized
//! request and expire after a fixed TTL.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::strategy::Analysis;
use crate::types::{GameInput, LeagueParameters, SharpFactor};

struct CacheEntry {
    analysis: Analysis,
    inserted_at: DateTime<Utc>,
}

/// In-memory TTL cache shared across batch workers.
pub struct AnalysisCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    ttl: Duration,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    game: &'a GameInput,
    factors: &'a [SharpFactor],
    params: &'a LeagueParameters,
}

/// Content hash of everything the analysis depends on.
pub fn content_key(game: &GameInput, factors: &[SharpFactor], params: &LeagueParameters) -> u64 {
    // Serializing plain data structs cannot fail; fall back to the id so a
    // failure only costs a cache miss.
    let bytes = serde_json::to_vec(&KeyMaterial { game, factors, params })
        .unwrap_or_else(|_| game.id.as_bytes().to_vec());
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: u64) -> Option<Analysis> {
        let entries = self.entries.lock().ok()?;
        entries.get(&key).and_then(|entry| {
            if Utc::now() - entry.inserted_at < self.ttl {
                Some(entry.analysis.clone())
            } else {
                None
            }
        })
    }

    pub fn insert(&self, key: u64, analysis: Analysis) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    analysis,
                    inserted_at: Utc::now(),
                },
            );
        }
    }

    /// Remove expired entries.
    pub fn evict_expired(&self) {
        let now = Utc::now();
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, entry| now - entry.inserted_at < self.ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::strategy::Analyzer;
    use crate::types::{FactorCategory, TeamSide};

    fn make_analysis() -> Analysis {
        Analyzer::new(EngineConfig::default())
            .analyze(&GameInput::sample(), &[], &LeagueParameters::default(), None)
            .unwrap()
    }

    #[test]
    fn test_key_is_stable_and_content_sensitive() {
        let game = GameInput::sample();
        let params = LeagueParameters::default();
        let a = content_key(&game, &[], &params);
        assert_eq!(a, content_key(&game.clone(), &[], &params.clone()));

        let mut moved = game.clone();
        moved.market.spread = -4.0;
        assert_ne!(a, content_key(&moved, &[], &params));

        let factors = vec![SharpFactor::spread("rest", FactorCategory::Structural, TeamSide::Home, 1.0)];
        assert_ne!(a, content_key(&game, &factors, &params));

        let stricter = LeagueParameters { min_ev_spread: 0.05, ..params };
        assert_ne!(a, content_key(&game, &[], &stricter));
    }

    #[test]
    fn test_insert_and_get() {
        let cache = AnalysisCache::new(Duration::minutes(5));
        assert!(cache.get(1).is_none());
        cache.insert(1, make_analysis());
        assert_eq!(cache.get(1).unwrap().game_id, GameInput::sample().id);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entries() {
        let cache = AnalysisCache::new(Duration::seconds(0));
        cache.insert(7, make_analysis());
        assert!(cache.get(7).is_none());
        cache.evict_expired();
        assert!(cache.is_empty());
    }
}
