//! Memoization around the vector builder and frontier analyzer.
//!
//! Entries are keyed by a fingerprint of the event list and, for frontier
//! results, the objective list. Both pure functions are deterministic, so a
//! cached result is always equal to a fresh computation.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::{FrontierAnalysis, MetricEvent, ObjectiveSpec, RunMetricTable};
use crate::pareto::analyze_frontier;
use crate::vectors::build_run_metric_vectors;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

type AnalysisKey = (u64, String);

/// A bounded map that evicts the oldest insertion first.
#[derive(Debug)]
struct Bounded<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Hash + Eq + Clone, V: Clone> Bounded<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: K, value: V, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[derive(Debug)]
struct CacheInner {
    tables: Bounded<u64, Arc<RunMetricTable>>,
    analyses: Bounded<AnalysisKey, Arc<FrontierAnalysis>>,
}

/// Thread-safe, cloneable cache shared between request handlers.
#[derive(Clone, Debug)]
pub struct FrontierCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for FrontierCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl FrontierCache {
    /// `capacity` bounds each table; zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                tables: Bounded::new(),
                analyses: Bounded::new(),
            })),
            capacity,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of cached vector tables.
    pub fn len(&self) -> usize {
        self.lock().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.tables.clear();
        inner.analyses.clear();
    }

    /// Cached [`build_run_metric_vectors`].
    pub fn vectors(&self, events: &[MetricEvent]) -> Arc<RunMetricTable> {
        self.vectors_for(events_fingerprint(events), events)
    }

    fn vectors_for(&self, fingerprint: u64, events: &[MetricEvent]) -> Arc<RunMetricTable> {
        if let Some(table) = self.lock().tables.get(&fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint, "vector table cache hit");
            return table;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(build_run_metric_vectors(events));
        self.lock()
            .tables
            .insert(fingerprint, Arc::clone(&table), self.capacity);
        table
    }

    /// Cached vectors plus [`analyze_frontier`] over them.
    pub fn analyze(
        &self,
        events: &[MetricEvent],
        objectives: &[ObjectiveSpec],
    ) -> (Arc<RunMetricTable>, Arc<FrontierAnalysis>) {
        let fingerprint = events_fingerprint(events);
        let table = self.vectors_for(fingerprint, events);
        let key = (fingerprint, objectives_key(objectives));

        if let Some(analysis) = self.lock().analyses.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint, objectives = %key.1, "frontier cache hit");
            return (table, analysis);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let analysis = Arc::new(analyze_frontier(&table.vectors, objectives));
        self.lock()
            .analyses
            .insert(key, Arc::clone(&analysis), self.capacity);
        (table, analysis)
    }
}

/// Hash of every field of every event, floats by bit pattern.
pub fn events_fingerprint(events: &[MetricEvent]) -> u64 {
    let mut hasher = DefaultHasher::new();
    events.len().hash(&mut hasher);
    for event in events {
        event.id.hash(&mut hasher);
        event.key.hash(&mut hasher);
        event.value.map(f64::to_bits).hash(&mut hasher);
        event.run_id.hash(&mut hasher);
        event.created_at.hash(&mut hasher);
    }
    hasher.finish()
}

fn objectives_key(objectives: &[ObjectiveSpec]) -> String {
    objectives
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
