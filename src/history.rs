use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::model::{EntityKey, EntityKind, Listed, Snapshot};

pub const HISTORY_CAPACITY: usize = 10;
pub const RATE_WINDOW_SECS: i64 = 20;

const TREND_MIN_HISTORY: usize = 3;
const TREND_RELATIVE_THRESHOLD: f64 = 0.05;
const CPU_TREND_FLOOR_MILLIS: f64 = 10.0;
const MEMORY_TREND_FLOOR_BYTES: f64 = 10.0 * 1024.0 * 1024.0;
const ACCELERATOR_TREND_FLOOR: f64 = 0.0;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Stable => "·",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MetricField {
    Cpu,
    Memory,
    Accelerators,
}

impl MetricField {
    fn floor(self) -> f64 {
        match self {
            Self::Cpu => CPU_TREND_FLOOR_MILLIS,
            Self::Memory => MEMORY_TREND_FLOOR_BYTES,
            Self::Accelerators => ACCELERATOR_TREND_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Counter {
    NetworkRx,
    NetworkTx,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCounters {
    pub cpu_millis: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub accelerators: u64,
    pub network_rx_bytes: Option<u64>,
    pub network_tx_bytes: Option<u64>,
    pub sampled_at: Option<DateTime<Utc>>,
}

impl EntityCounters {
    fn field(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::Cpu => self.cpu_millis.map(|value| value as f64),
            MetricField::Memory => self.memory_bytes.map(|value| value as f64),
            MetricField::Accelerators => Some(self.accelerators as f64),
        }
    }

    fn counter(&self, counter: Counter) -> Option<u64> {
        match counter {
            Counter::NetworkRx => self.network_rx_bytes,
            Counter::NetworkTx => self.network_tx_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Source refresh time, or the local clock when the source has none.
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub entities: HashMap<EntityKey, EntityCounters>,
}

impl MetricSnapshot {
    fn from_snapshot(
        snapshot: &Snapshot,
        timestamp: DateTime<Utc>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let mut entities = HashMap::with_capacity(snapshot.nodes.len() + snapshot.pods.len());
        for node in &snapshot.nodes {
            entities.insert(
                node.key(),
                EntityCounters {
                    cpu_millis: node.cpu_millis,
                    memory_bytes: node.memory_bytes,
                    accelerators: node.accelerators_allocated,
                    network_rx_bytes: node.network_rx_bytes,
                    network_tx_bytes: node.network_tx_bytes,
                    sampled_at: node.network_sampled_at,
                },
            );
        }
        for pod in &snapshot.pods {
            entities.insert(
                pod.key(),
                EntityCounters {
                    cpu_millis: pod.cpu_millis,
                    memory_bytes: pod.memory_bytes,
                    accelerators: pod.accelerators,
                    network_rx_bytes: pod.network_rx_bytes,
                    network_tx_bytes: pod.network_tx_bytes,
                    sampled_at: pod.network_sampled_at,
                },
            );
        }

        Self {
            timestamp,
            ingested_at,
            entities,
        }
    }
}

/// Fixed-capacity history of accepted snapshots. Only `ingest` mutates it;
/// every other method is a read-only projection.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    snapshots: VecDeque<MetricSnapshot>,
    last_accepted: Option<DateTime<Utc>>,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MetricsHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: VecDeque::with_capacity(capacity.max(1)),
            last_accepted: None,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }

    pub fn ingest(&mut self, snapshot: &Snapshot) -> bool {
        self.ingest_at(snapshot, Utc::now())
    }

    /// Appends `snapshot` unless its refresh time is not newer than the last
    /// accepted one. Returns whether it was accepted.
    pub fn ingest_at(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        let timestamp = snapshot.refreshed_at.unwrap_or(now);
        if let Some(last) = self.last_accepted
            && timestamp <= last
        {
            debug!(%timestamp, %last, "skipping snapshot that was already ingested");
            return false;
        }

        self.snapshots
            .push_back(MetricSnapshot::from_snapshot(snapshot, timestamp, now));
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.last_accepted = Some(timestamp);
        true
    }

    pub fn trend(&self, key: &EntityKey, field: MetricField, current: f64) -> Trend {
        if self.snapshots.len() < TREND_MIN_HISTORY {
            return Trend::Stable;
        }

        let older = self.snapshots.len() - 1;
        let values = self
            .snapshots
            .iter()
            .take(older)
            .filter_map(|snapshot| snapshot.entities.get(key))
            .filter_map(|counters| counters.field(field))
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Trend::Stable;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let threshold = (mean * TREND_RELATIVE_THRESHOLD).max(field.floor());
        if current > mean + threshold {
            Trend::Up
        } else if current < mean - threshold {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    /// Bytes per second for a monotonic counter, averaged over every valid
    /// pair between the newest sample and older samples inside the window.
    pub fn rate(&self, key: &EntityKey, counter: Counter) -> f64 {
        if self.snapshots.len() < 2 {
            return 0.0;
        }
        let Some(current) = self.snapshots.back() else {
            return 0.0;
        };
        let Some(current_counters) = current.entities.get(key) else {
            return 0.0;
        };
        let Some(current_value) = current_counters.counter(counter) else {
            return 0.0;
        };

        let mut rates = Vec::new();
        for candidate in self.snapshots.iter().rev().skip(1) {
            let age = current.timestamp - candidate.timestamp;
            if age.num_milliseconds() > RATE_WINDOW_SECS * 1_000 {
                break;
            }
            let Some(candidate_counters) = candidate.entities.get(key) else {
                continue;
            };
            let Some(candidate_value) = candidate_counters.counter(counter) else {
                continue;
            };
            if current_value <= candidate_value {
                continue;
            }

            let Some(elapsed) = elapsed_seconds(current, current_counters, candidate, candidate_counters)
            else {
                continue;
            };
            let delta = (current_value - candidate_value) as f64;
            rates.push(delta / elapsed);
        }

        if rates.is_empty() {
            return 0.0;
        }
        rates.iter().sum::<f64>() / rates.len() as f64
    }

    pub fn cluster_rate(&self, counter: Counter) -> f64 {
        let Some(current) = self.snapshots.back() else {
            return 0.0;
        };
        current
            .entities
            .keys()
            .filter(|key| key.kind == EntityKind::Node)
            .map(|key| self.rate(key, counter))
            .sum()
    }

    pub fn series(&self, key: &EntityKey, field: MetricField) -> Vec<f64> {
        self.snapshots
            .iter()
            .filter_map(|snapshot| snapshot.entities.get(key))
            .filter_map(|counters| counters.field(field))
            .collect()
    }

    pub fn cluster_series(&self, field: MetricField) -> Vec<f64> {
        self.snapshots
            .iter()
            .map(|snapshot| {
                snapshot
                    .entities
                    .iter()
                    .filter(|(key, _)| key.kind == EntityKind::Node)
                    .filter_map(|(_, counters)| counters.field(field))
                    .sum()
            })
            .collect()
    }
}

fn elapsed_seconds(
    current: &MetricSnapshot,
    current_counters: &EntityCounters,
    candidate: &MetricSnapshot,
    candidate_counters: &EntityCounters,
) -> Option<f64> {
    let sampled = match (current_counters.sampled_at, candidate_counters.sampled_at) {
        (Some(now), Some(then)) => seconds_between(then, now),
        _ => None,
    };
    sampled.or_else(|| seconds_between(candidate.ingested_at, current.ingested_at))
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Option<f64> {
    let millis = (later - earlier).num_milliseconds();
    if millis <= 0 {
        return None;
    }
    Some(millis as f64 / 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::{Counter, MetricField, MetricsHistory, Trend};
    use crate::model::{EntityKey, NodeInfo, PodInfo, Snapshot};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_default()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        base() + Duration::seconds(seconds)
    }

    fn node_snapshot(seconds: i64, cpu: u64, rx: u64) -> Snapshot {
        Snapshot {
            refreshed_at: Some(at(seconds)),
            nodes: vec![NodeInfo {
                name: "node-a".to_string(),
                ready: true,
                cpu_millis: Some(cpu),
                memory_bytes: Some(512 * 1024 * 1024),
                network_rx_bytes: Some(rx),
                network_tx_bytes: Some(rx / 2),
                network_sampled_at: Some(at(seconds)),
                ..NodeInfo::default()
            }],
            ..Snapshot::default()
        }
    }

    fn ingest_all(history: &mut MetricsHistory, snapshots: &[Snapshot]) {
        for snapshot in snapshots {
            let now = snapshot.refreshed_at.unwrap_or_else(base);
            assert!(history.ingest_at(snapshot, now));
        }
    }

    #[test]
    fn trend_is_stable_below_three_snapshots() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[node_snapshot(0, 10, 0), node_snapshot(5, 10, 0)],
        );
        let key = EntityKey::node("node-a");
        assert_eq!(history.trend(&key, MetricField::Cpu, 10_000.0), Trend::Stable);
        assert_eq!(history.trend(&key, MetricField::Cpu, 0.0), Trend::Stable);
    }

    #[test]
    fn trend_compares_current_against_older_mean() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[
                node_snapshot(0, 10, 0),
                node_snapshot(5, 10, 0),
                node_snapshot(10, 10, 0),
                node_snapshot(15, 10, 0),
                node_snapshot(20, 50, 0),
            ],
        );
        let key = EntityKey::node("node-a");

        assert_eq!(history.trend(&key, MetricField::Cpu, 50.0), Trend::Up);
        assert_eq!(history.trend(&key, MetricField::Cpu, 20.0), Trend::Stable);
        assert_eq!(history.trend(&key, MetricField::Cpu, 0.0), Trend::Stable);
    }

    #[test]
    fn trend_detects_drop_beyond_relative_threshold() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[
                node_snapshot(0, 2_000, 0),
                node_snapshot(5, 2_000, 0),
                node_snapshot(10, 2_000, 0),
            ],
        );
        let key = EntityKey::node("node-a");

        assert_eq!(history.trend(&key, MetricField::Cpu, 1_850.0), Trend::Down);
        assert_eq!(history.trend(&key, MetricField::Cpu, 1_950.0), Trend::Stable);
    }

    #[test]
    fn accelerator_trend_reacts_to_single_device_change() {
        let pod = |seconds: i64, accelerators: u64| Snapshot {
            refreshed_at: Some(at(seconds)),
            pods: vec![PodInfo {
                namespace: "ml".to_string(),
                name: "trainer".to_string(),
                accelerators,
                ..PodInfo::default()
            }],
            ..Snapshot::default()
        };
        let mut history = MetricsHistory::default();
        ingest_all(&mut history, &[pod(0, 4), pod(5, 4), pod(10, 5)]);

        let key = EntityKey::pod("ml", "trainer");
        assert_eq!(history.trend(&key, MetricField::Accelerators, 5.0), Trend::Up);
        assert_eq!(history.trend(&key, MetricField::Accelerators, 3.0), Trend::Down);
    }

    #[test]
    fn rate_skips_unchanged_counter_and_uses_older_pair() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[
                node_snapshot(0, 10, 1_000),
                node_snapshot(5, 10, 3_000),
                node_snapshot(10, 10, 3_000),
            ],
        );

        let rate = history.rate(&EntityKey::node("node-a"), Counter::NetworkRx);
        assert!((rate - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rate_averages_every_valid_pair_in_window() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[
                node_snapshot(0, 10, 0),
                node_snapshot(10, 10, 1_000),
                node_snapshot(20, 10, 4_000),
            ],
        );

        // 3000/10 and 4000/20
        let rate = history.rate(&EntityKey::node("node-a"), Counter::NetworkRx);
        assert!((rate - 250.0).abs() < 1e-9);
    }

    #[test]
    fn rate_ignores_counter_reset() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[node_snapshot(0, 10, 5_000), node_snapshot(10, 10, 1_000)],
        );

        assert_eq!(
            history.rate(&EntityKey::node("node-a"), Counter::NetworkRx),
            0.0
        );
    }

    #[test]
    fn rate_ignores_samples_outside_window() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[node_snapshot(0, 10, 0), node_snapshot(30, 10, 9_000)],
        );

        assert_eq!(
            history.rate(&EntityKey::node("node-a"), Counter::NetworkRx),
            0.0
        );
    }

    #[test]
    fn rate_window_edge_is_not_rounded_down() {
        let mut history = MetricsHistory::default();
        let mut late = node_snapshot(0, 10, 2_090);
        let sampled = at(0) + Duration::milliseconds(20_900);
        late.refreshed_at = Some(sampled);
        late.nodes[0].network_sampled_at = Some(sampled);
        ingest_all(&mut history, &[node_snapshot(0, 10, 0), late]);

        assert_eq!(
            history.rate(&EntityKey::node("node-a"), Counter::NetworkRx),
            0.0
        );
    }

    #[test]
    fn rate_falls_back_to_ingest_clock_without_sample_times() {
        let mut history = MetricsHistory::default();
        let mut first = node_snapshot(0, 10, 0);
        let mut second = node_snapshot(4, 10, 2_000);
        first.nodes[0].network_sampled_at = None;
        second.nodes[0].network_sampled_at = None;
        assert!(history.ingest_at(&first, at(0)));
        assert!(history.ingest_at(&second, at(8)));

        let rate = history.rate(&EntityKey::node("node-a"), Counter::NetworkRx);
        assert!((rate - 250.0).abs() < 1e-9);
    }

    #[test]
    fn cluster_rate_is_sum_of_node_rates() {
        let snapshot = |seconds: i64, a: u64, b: u64| {
            let mut snapshot = node_snapshot(seconds, 10, a);
            let mut other = snapshot.nodes[0].clone();
            other.name = "node-b".to_string();
            other.network_rx_bytes = Some(b);
            snapshot.nodes.push(other);
            snapshot
        };
        let mut history = MetricsHistory::default();
        ingest_all(&mut history, &[snapshot(0, 0, 0), snapshot(10, 1_000, 500)]);

        let per_node = history.rate(&EntityKey::node("node-a"), Counter::NetworkRx)
            + history.rate(&EntityKey::node("node-b"), Counter::NetworkRx);
        assert!((history.cluster_rate(Counter::NetworkRx) - per_node).abs() < 1e-9);
        assert!((per_node - 150.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_evicts_oldest_snapshot() {
        let mut history = MetricsHistory::default();
        let snapshots = (0..11)
            .map(|index| node_snapshot(index * 5, 100 + index as u64, 0))
            .collect::<Vec<_>>();
        ingest_all(&mut history, &snapshots);

        assert_eq!(history.len(), 10);
        let series = history.series(&EntityKey::node("node-a"), MetricField::Cpu);
        assert_eq!(series.first().copied(), Some(101.0));
        assert_eq!(series.last().copied(), Some(110.0));
    }

    #[test]
    fn duplicate_refresh_timestamp_is_not_ingested_twice() {
        let mut history = MetricsHistory::default();
        let snapshot = node_snapshot(0, 10, 0);
        assert!(history.ingest_at(&snapshot, at(0)));
        assert!(!history.ingest_at(&snapshot, at(2)));
        assert!(!history.ingest_at(&node_snapshot(-5, 10, 0), at(4)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn missing_source_timestamp_falls_back_to_local_clock() {
        let mut history = MetricsHistory::default();
        let mut snapshot = node_snapshot(0, 10, 0);
        snapshot.refreshed_at = None;
        assert!(history.ingest_at(&snapshot, at(1)));
        assert!(history.ingest_at(&snapshot, at(3)));
        assert!(!history.ingest_at(&snapshot, at(3)));
        assert_eq!(history.last_accepted(), Some(at(3)));
    }

    #[test]
    fn projections_do_not_mutate_history() {
        let mut history = MetricsHistory::default();
        ingest_all(
            &mut history,
            &[node_snapshot(0, 10, 0), node_snapshot(5, 20, 100)],
        );
        let key = EntityKey::node("node-a");
        let before = history.len();
        let _ = history.series(&key, MetricField::Cpu);
        let _ = history.cluster_series(MetricField::Memory);
        let _ = history.rate(&key, Counter::NetworkTx);
        assert_eq!(history.len(), before);
        assert_eq!(history.cluster_series(MetricField::Cpu), vec![10.0, 20.0]);
    }
}
