//! Batch runner.
//!
//! Evaluates many games concurrently on tokio's blocking pool. The
//! analyzer holds no mutable state, so workers share it through an `Arc`
//! with no locking; only the optional cache is synchronized.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{content_key, AnalysisCache};
use super::source::FactorSource;
use crate::config::AppConfig;
use crate::history::TrackRecord;
use crate::strategy::{Analysis, Analyzer};
use crate::types::{GameInput, LeagueParameters, SharpFactor, Sport};

/// One game plus its factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub game: GameInput,
    #[serde(default)]
    pub factors: Vec<SharpFactor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameReport {
    Analyzed(Box<Analysis>),
    Failed { game_id: String, error: String },
}

impl GameReport {
    pub fn game_id(&self) -> &str {
        match self {
            GameReport::Analyzed(a) => &a.game_id,
            GameReport::Failed { game_id, .. } => game_id,
        }
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            GameReport::Analyzed(a) => Some(a),
            GameReport::Failed { .. } => None,
        }
    }
}

/// Results in request order plus counts.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub games: usize,
    pub picks: usize,
    pub passes: usize,
    pub errors: usize,
    pub cache_hits: usize,
    pub results: Vec<GameReport>,
}

pub struct BatchRunner {
    analyzer: Arc<Analyzer>,
    leagues: Arc<HashMap<Sport, LeagueParameters>>,
    history: Option<Arc<TrackRecord>>,
    cache: Option<Arc<AnalysisCache>>,
    max_concurrency: usize,
}

impl BatchRunner {
    pub fn new(config: &AppConfig) -> Self {
        let leagues = Sport::ALL
            .iter()
            .map(|sport| (*sport, config.league_params(*sport)))
            .collect();
        let cache = (config.batch.cache_ttl_secs > 0).then(|| {
            let ttl = Duration::seconds(i64::try_from(config.batch.cache_ttl_secs).unwrap_or(i64::MAX));
            Arc::new(AnalysisCache::new(ttl))
        });
        Self {
            analyzer: Arc::new(Analyzer::new(config.engine.clone())),
            leagues: Arc::new(leagues),
            history: None,
            cache,
            max_concurrency: config.batch.max_concurrency.max(1),
        }
    }

    /// Grade picks against a track record.
    pub fn with_history(mut self, history: TrackRecord) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    pub fn cache(&self) -> Option<&AnalysisCache> {
        self.cache.as_deref()
    }

    fn params_for(&self, sport: Sport) -> LeagueParameters {
        self.leagues
            .get(&sport)
            .cloned()
            .unwrap_or_else(|| LeagueParameters::defaults_for(sport))
    }

    /// Analyze every request. Per-game errors are reported, never fatal.
    pub async fn run(&self, requests: Vec<AnalysisRequest>) -> BatchReport {
        let started_at = Utc::now();
        self.begin(requests.len());

        let outcomes: Vec<(GameReport, bool)> = stream::iter(requests)
            .map(|request| self.analyze_one(request))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        finish(started_at, outcomes)
    }

    /// Fetch factors for each game from `source`, then analyze. A game
    /// whose factors cannot be fetched is reported as failed in its place.
    pub async fn run_with_source(&self, games: Vec<GameInput>, source: &dyn FactorSource) -> BatchReport {
        let started_at = Utc::now();
        self.begin(games.len());

        let outcomes: Vec<(GameReport, bool)> = stream::iter(games)
            .map(|game| async move {
                match source.factors(&game).await {
                    Ok(factors) => self.analyze_one(AnalysisRequest { game, factors }).await,
                    Err(e) => {
                        warn!(game_id = %game.id, error = %e, "Factor source failed");
                        let report = GameReport::Failed {
                            game_id: game.id,
                            error: format!("factor source: {e:#}"),
                        };
                        (report, false)
                    }
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        finish(started_at, outcomes)
    }

    fn begin(&self, games: usize) {
        info!(games, concurrency = self.max_concurrency, "Starting batch");
        if let Some(cache) = &self.cache {
            cache.evict_expired();
        }
    }

    /// Returns the report and whether it came from the cache.
    async fn analyze_one(&self, request: AnalysisRequest) -> (GameReport, bool) {
        let params = self.params_for(request.game.sport);
        let key = self
            .cache
            .as_ref()
            .map(|_| content_key(&request.game, &request.factors, &params));

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(hit) = cache.get(key) {
                debug!(game_id = %request.game.id, "Cache hit");
                return (GameReport::Analyzed(Box::new(hit)), true);
            }
        }

        let game_id = request.game.id.clone();
        let analyzer = Arc::clone(&self.analyzer);
        let history = self.history.clone();
        let joined = tokio::task::spawn_blocking(move || {
            analyzer.analyze(&request.game, &request.factors, &params, history.as_deref())
        })
        .await;

        let report = match joined {
            Ok(Ok(analysis)) => {
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.insert(key, analysis.clone());
                }
                GameReport::Analyzed(Box::new(analysis))
            }
            Ok(Err(e)) => {
                warn!(game_id = %game_id, error = %e, "Analysis failed");
                GameReport::Failed { game_id, error: e.to_string() }
            }
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Analysis task panicked");
                GameReport::Failed { game_id, error: format!("task failed: {e}") }
            }
        };
        (report, false)
    }
}

fn finish(started_at: DateTime<Utc>, outcomes: Vec<(GameReport, bool)>) -> BatchReport {
    let cache_hits = outcomes.iter().filter(|(_, hit)| *hit).count();
    let results: Vec<GameReport> = outcomes.into_iter().map(|(report, _)| report).collect();
    let report = summarize(started_at, results, cache_hits);

    info!(
        games = report.games,
        picks = report.picks,
        passes = report.passes,
        errors = report.errors,
        cache_hits = report.cache_hits,
        "Batch complete"
    );
    report
}

fn summarize(started_at: DateTime<Utc>, results: Vec<GameReport>, cache_hits: usize) -> BatchReport {
    let (picks, passes, errors) = results.iter().fold((0, 0, 0), |(p, s, e), r| match r.analysis() {
        Some(a) if a.outcome.is_pick() => (p + 1, s, e),
        Some(_) => (p, s + 1, e),
        None => (p, s, e + 1),
    });
    BatchReport {
        started_at,
        finished_at: Utc::now(),
        games: results.len(),
        picks,
        passes,
        errors,
        cache_hits,
        results,
    }
}
