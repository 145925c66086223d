use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parses `"reddit=10,support=30"` style per-source override lists.
fn env_weight_map(key: &str) -> HashMap<String, f64> {
    let Ok(raw) = env::var(key) else {
        return HashMap::new();
    };
    let mut out = HashMap::new();
    for entry in raw.split(',') {
        let Some((source, value)) = entry.split_once('=') else {
            continue;
        };
        let source = source.trim().to_lowercase();
        if source.is_empty() {
            continue;
        }
        if let Ok(value) = value.trim().parse::<f64>() {
            if value.is_finite() && value > 0.0 {
                out.insert(source, value);
            }
        }
    }
    out
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    // Time-series store
    pub retention_days: i64,
    pub shard_count: usize,

    // Ingest pipeline
    pub ingest_queue: usize,

    // Statistics aggregator
    pub ewma_half_life_samples: f64,
    pub velocity_window: usize,
    pub trend_velocity_threshold: f64,
    pub trend_confirmations: u32,
    pub min_samples: u64,
    pub confidence_k: f64,
    pub source_confidence_k: HashMap<String, f64>,
    pub source_scale: HashMap<String, f64>,

    // Correlation engine
    pub correlation_interval_seconds: u64,
    pub correlation_window_days: i64,
    pub correlation_min_overlap: usize,
    pub correlation_max_lag_days: i64,

    // Predictive scorer
    pub predictor_interval_seconds: u64,
    pub spike_threshold: f64,
    pub spike_min_days: f64,
    pub spike_max_days: f64,
    pub predictor_confidence_floor: f64,
    pub predictor_fit_floor: f64,
    pub actionable_probability: f64,
    pub low_fit_probability_cap: f64,

    // Rule engine
    pub rules_interval_seconds: u64,
    pub rule_cooldown_seconds: i64,
    pub success_rate_window: usize,

    // Query API
    pub default_alert_limit: usize,
    pub source_stale_seconds: i64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            retention_days: env_parse("ENGINE_RETENTION_DAYS", 90i64).max(1),
            shard_count: env_parse("ENGINE_SHARD_COUNT", 16usize).max(1),
            ingest_queue: env_parse("ENGINE_INGEST_QUEUE", 4096usize).max(1),
            ewma_half_life_samples: env_parse("ENGINE_EWMA_HALF_LIFE_SAMPLES", 14.0f64).max(1.0),
            velocity_window: env_parse("ENGINE_VELOCITY_WINDOW", 5usize).max(2),
            trend_velocity_threshold: env_parse("ENGINE_TREND_VELOCITY_THRESHOLD", 1.0f64),
            trend_confirmations: env_parse("ENGINE_TREND_CONFIRMATIONS", 3u32).max(1),
            min_samples: env_parse("ENGINE_MIN_SAMPLES", 5u64).max(1),
            confidence_k: env_parse("ENGINE_CONFIDENCE_K", 20.0f64).max(1.0),
            source_confidence_k: env_weight_map("ENGINE_SOURCE_CONFIDENCE_K"),
            source_scale: env_weight_map("ENGINE_SOURCE_SCALE"),
            correlation_interval_seconds: env_parse("ENGINE_CORRELATION_INTERVAL_SECONDS", 300u64)
                .max(5),
            correlation_window_days: env_parse("ENGINE_CORRELATION_WINDOW_DAYS", 30i64).max(1),
            correlation_min_overlap: env_parse("ENGINE_CORRELATION_MIN_OVERLAP", 12usize).max(2),
            correlation_max_lag_days: env_parse("ENGINE_CORRELATION_MAX_LAG_DAYS", 7i64).max(0),
            predictor_interval_seconds: env_parse("ENGINE_PREDICTOR_INTERVAL_SECONDS", 600u64)
                .max(5),
            spike_threshold: env_parse("ENGINE_SPIKE_THRESHOLD", 90.0f64).clamp(1.0, 100.0),
            spike_min_days: env_parse("ENGINE_SPIKE_MIN_DAYS", 7.0f64).max(0.1),
            spike_max_days: env_parse("ENGINE_SPIKE_MAX_DAYS", 180.0f64).max(1.0),
            predictor_confidence_floor: env_parse("ENGINE_PREDICTOR_CONFIDENCE_FLOOR", 50.0f64)
                .clamp(0.0, 100.0),
            predictor_fit_floor: env_parse("ENGINE_PREDICTOR_FIT_FLOOR", 0.5f64).clamp(0.0, 1.0),
            actionable_probability: env_parse("ENGINE_ACTIONABLE_PROBABILITY", 70.0f64)
                .clamp(0.0, 100.0),
            low_fit_probability_cap: env_parse("ENGINE_LOW_FIT_PROBABILITY_CAP", 60.0f64)
                .clamp(0.0, 100.0),
            rules_interval_seconds: env_parse("ENGINE_RULES_INTERVAL_SECONDS", 60u64).max(1),
            rule_cooldown_seconds: env_parse("ENGINE_RULE_COOLDOWN_SECONDS", 3600i64).max(0),
            success_rate_window: env_parse("ENGINE_SUCCESS_RATE_WINDOW", 50usize).max(1),
            default_alert_limit: env_parse("ENGINE_DEFAULT_ALERT_LIMIT", 50usize).max(1),
            source_stale_seconds: env_parse("ENGINE_SOURCE_STALE_SECONDS", 21_600i64).max(60),
        }
    }

    /// Per-sample EWMA decay factor derived from the configured half-life.
    pub fn ewma_alpha(&self) -> f64 {
        1.0 - 0.5f64.powf(1.0 / self.ewma_half_life_samples)
    }

    pub fn confidence_k_for(&self, source: &str) -> f64 {
        self.source_confidence_k
            .get(&source.trim().to_lowercase())
            .copied()
            .unwrap_or(self.confidence_k)
    }

    pub fn scale_for(&self, source: &str) -> f64 {
        self.source_scale
            .get(&source.trim().to_lowercase())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn correlation_interval(&self) -> Duration {
        Duration::from_secs(self.correlation_interval_seconds)
    }

    pub fn predictor_interval(&self) -> Duration {
        Duration::from_secs(self.predictor_interval_seconds)
    }

    pub fn rules_interval(&self) -> Duration {
        Duration::from_secs(self.rules_interval_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            shard_count: 16,
            ingest_queue: 4096,
            ewma_half_life_samples: 14.0,
            velocity_window: 5,
            trend_velocity_threshold: 1.0,
            trend_confirmations: 3,
            min_samples: 5,
            confidence_k: 20.0,
            source_confidence_k: HashMap::new(),
            source_scale: HashMap::new(),
            correlation_interval_seconds: 300,
            correlation_window_days: 30,
            correlation_min_overlap: 12,
            correlation_max_lag_days: 7,
            predictor_interval_seconds: 600,
            spike_threshold: 90.0,
            spike_min_days: 7.0,
            spike_max_days: 180.0,
            predictor_confidence_floor: 50.0,
            predictor_fit_floor: 0.5,
            actionable_probability: 70.0,
            low_fit_probability_cap: 60.0,
            rules_interval_seconds: 60,
            rule_cooldown_seconds: 3600,
            success_rate_window: 50,
            default_alert_limit: 50,
            source_stale_seconds: 21_600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_alpha_matches_half_life() {
        let config = EngineConfig::default();
        let alpha = config.ewma_alpha();
        // After 14 samples a constant input's residual weight halves.
        let residual = (1.0 - alpha).powf(14.0);
        assert!((residual - 0.5).abs() < 1e-9);
    }

    #[test]
    fn per_source_overrides_fall_back_to_defaults() {
        let mut config = EngineConfig::default();
        config
            .source_confidence_k
            .insert("reddit".to_string(), 10.0);
        assert_eq!(config.confidence_k_for("Reddit"), 10.0);
        assert_eq!(config.confidence_k_for("twitter"), config.confidence_k);
        assert_eq!(config.scale_for("anything"), 1.0);
    }
}
