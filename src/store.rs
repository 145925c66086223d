use crate::error::IngestError;
use crate::model::{Observation, SignalId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

/// Append-only, bounded-retention observation history, partitioned into
/// shards by signal id so hot appends for different signals never contend.
/// Eviction runs opportunistically on append; reads copy the in-window
/// slice so they never observe a partially evicted window.
#[derive(Debug)]
pub struct TimeSeriesStore {
    shards: Vec<RwLock<Shard>>,
    retention: ChronoDuration,
}

#[derive(Debug, Default)]
struct Shard {
    series: HashMap<SignalId, Series>,
}

#[derive(Debug, Default)]
struct Series {
    observations: VecDeque<Observation>,
}

impl Series {
    fn insert(&mut self, observation: Observation) {
        // Common case: in-order arrival.
        match self.observations.back() {
            Some(last) if last.timestamp > observation.timestamp => {
                let idx = self
                    .observations
                    .partition_point(|existing| existing.timestamp <= observation.timestamp);
                self.observations.insert(idx, observation);
            }
            _ => self.observations.push_back(observation),
        }
    }

    fn evict_before(&mut self, floor: DateTime<Utc>) {
        while let Some(front) = self.observations.front() {
            if front.timestamp < floor {
                self.observations.pop_front();
            } else {
                break;
            }
        }
    }
}

impl TimeSeriesStore {
    pub fn new(retention_days: i64, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| RwLock::new(Shard::default())).collect(),
            retention: ChronoDuration::days(retention_days.max(1)),
        }
    }

    pub fn retention_floor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    fn shard_for(&self, signal_id: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        signal_id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Appends one observation, rejecting anything older than the retention
    /// floor. Amortized O(1): eviction only trims the stale prefix of the
    /// touched series.
    pub fn append(&self, observation: Observation, now: DateTime<Utc>) -> Result<(), IngestError> {
        let floor = self.retention_floor(now);
        if observation.timestamp < floor {
            return Err(IngestError::RejectedStale {
                timestamp: observation.timestamp,
                floor,
            });
        }

        let mut shard = self
            .shard_for(&observation.signal_id)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let series = shard
            .series
            .entry(observation.signal_id.clone())
            .or_default();
        series.insert(observation);
        series.evict_before(floor);
        Ok(())
    }

    /// Time-ordered owned snapshot of the observations within `duration`
    /// of `now`. Restartable: callers can iterate the returned buffer any
    /// number of times.
    pub fn window(
        &self,
        signal_id: &str,
        duration: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Vec<Observation> {
        let start = now - duration;
        let shard = self
            .shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(series) = shard.series.get(signal_id) else {
            return Vec::new();
        };
        series
            .observations
            .iter()
            .filter(|obs| obs.timestamp >= start && obs.timestamp <= now)
            .cloned()
            .collect()
    }

    pub fn len(&self, signal_id: &str) -> usize {
        let shard = self
            .shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shard
            .series
            .get(signal_id)
            .map(|series| series.observations.len())
            .unwrap_or(0)
    }

    pub fn signal_ids(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            out.extend(shard.series.keys().cloned());
        }
        out.sort();
        out
    }

    /// Median inter-observation gap in seconds; the signal's native
    /// cadence, used to pick correlation bucket widths.
    pub fn native_cadence_seconds(&self, signal_id: &str) -> Option<i64> {
        let shard = self
            .shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let series = shard.series.get(signal_id)?;
        if series.observations.len() < 2 {
            return None;
        }
        let mut gaps: Vec<i64> = series
            .observations
            .iter()
            .zip(series.observations.iter().skip(1))
            .map(|(a, b)| (b.timestamp - a.timestamp).num_seconds().max(1))
            .collect();
        gaps.sort_unstable();
        Some(gaps[gaps.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(signal_id: &str, ts: DateTime<Utc>, magnitude: f64) -> Observation {
        Observation {
            signal_id: signal_id.to_string(),
            source: "reddit".to_string(),
            timestamp: ts,
            magnitude,
            sentiment: 0.0,
        }
    }

    #[test]
    fn append_rejects_observations_older_than_retention_floor() {
        let store = TimeSeriesStore::new(90, 4);
        let now = Utc::now();
        let stale = obs("sig-a", now - ChronoDuration::days(91), 1.0);
        let err = store.append(stale, now).unwrap_err();
        assert!(matches!(err, IngestError::RejectedStale { .. }));
        assert_eq!(store.len("sig-a"), 0);
    }

    #[test]
    fn eviction_trims_oldest_first_on_append() {
        let store = TimeSeriesStore::new(90, 4);
        let start = Utc::now();
        store
            .append(obs("sig-a", start - ChronoDuration::days(89), 1.0), start)
            .unwrap();
        store
            .append(obs("sig-a", start - ChronoDuration::days(1), 2.0), start)
            .unwrap();
        assert_eq!(store.len("sig-a"), 2);

        // Two days later the first observation falls past the floor and is
        // evicted by the next append.
        let later = start + ChronoDuration::days(2);
        store
            .append(obs("sig-a", later - ChronoDuration::hours(1), 3.0), later)
            .unwrap();
        let window = store.window("sig-a", ChronoDuration::days(90), later);
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|o| o.magnitude > 1.0));
    }

    #[test]
    fn window_is_time_ordered_even_for_out_of_order_appends() {
        let store = TimeSeriesStore::new(90, 4);
        let now = Utc::now();
        store
            .append(obs("sig-a", now - ChronoDuration::hours(1), 2.0), now)
            .unwrap();
        store
            .append(obs("sig-a", now - ChronoDuration::hours(3), 1.0), now)
            .unwrap();
        store
            .append(obs("sig-a", now - ChronoDuration::minutes(5), 3.0), now)
            .unwrap();

        let window = store.window("sig-a", ChronoDuration::days(1), now);
        let magnitudes: Vec<f64> = window.iter().map(|o| o.magnitude).collect();
        assert_eq!(magnitudes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn native_cadence_is_median_gap() {
        let store = TimeSeriesStore::new(90, 4);
        let now = Utc::now();
        for hours in [10, 8, 6, 4, 2] {
            store
                .append(obs("sig-a", now - ChronoDuration::hours(hours), 1.0), now)
                .unwrap();
        }
        assert_eq!(store.native_cadence_seconds("sig-a"), Some(2 * 3600));
        assert_eq!(store.native_cadence_seconds("missing"), None);
    }
}
