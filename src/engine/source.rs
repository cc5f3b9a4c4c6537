//! Factor sources.
//!
//! Factor generation lives outside the engine; this is the seam it is
//! plugged into.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{GameInput, SharpFactor};

/// Abstraction over whatever produces sharp factors for a game.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactorSource: Send + Sync {
    /// Factors for one game. An empty list is a valid answer.
    async fn factors(&self, game: &GameInput) -> Result<Vec<SharpFactor>>;
}

/// Factors supplied up front, keyed by game id.
#[derive(Debug, Clone, Default)]
pub struct StaticFactors {
    by_game: HashMap<String, Vec<SharpFactor>>,
}

impl StaticFactors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, game_id: impl Into<String>, factors: Vec<SharpFactor>) {
        self.by_game.insert(game_id.into(), factors);
    }
}

#[async_trait]
impl FactorSource for StaticFactors {
    async fn factors(&self, game: &GameInput) -> Result<Vec<SharpFactor>> {
        Ok(self.by_game.get(&game.id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FactorCategory, TeamSide};

    #[tokio::test]
    async fn test_static_factors_by_game_id() {
        let game = GameInput::sample();
        let mut source = StaticFactors::new();
        source.insert(
            game.id.clone(),
            vec![SharpFactor::spread("rest", FactorCategory::Structural, TeamSide::Home, 1.0)],
        );
        assert_eq!(source.factors(&game).await.unwrap().len(), 1);

        let other = GameInput { id: "unknown".into(), ..game };
        assert!(source.factors(&other).await.unwrap().is_empty());
    }
}
