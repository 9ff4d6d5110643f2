//! The navigational data store.
//!
//! The store keeps the latest accepted value per key and a merged record per
//! AIS target. Values and AIS targets live behind two independent locks.
//! When both are needed the value lock is always taken first.
//!
//! Nothing runs in the background: stale entries are removed by the read
//! that finds them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::ais;
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::key::KeyRegistry;
use crate::model::{ais_key, AisEntry, Entry, RegisteredKey, SourceCategory, BASE_KEY_AIS};
use crate::query;

const STORE_OWNER: &str = "NavStore";

fn cutoff(now: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(period)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Concurrent store for current vessel state.
///
/// Share it between writer and reader tasks through an `Arc`.
pub struct NavStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    registry: KeyRegistry,
    values: Mutex<HashMap<String, Entry>>,
    ais: Mutex<BTreeMap<String, AisEntry>>,
    last_sources: Mutex<HashMap<SourceCategory, String>>,
}

impl NavStore {
    /// Create a store driven by the system clock.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Self {
            config,
            clock,
            registry: KeyRegistry::new(),
            values: Mutex::new(HashMap::new()),
            ais: Mutex::new(BTreeMap::new()),
            last_sources: Mutex::new(HashMap::new()),
        };
        store.register_internal_keys();
        store
    }

    fn register_internal_keys(&self) {
        // a fresh registry cannot conflict with these
        for (key, description) in [
            ("ais.count", "AIS count"),
            ("ais.entities.*", "AIS entities"),
        ] {
            if let Err(e) = self.registry.register(key, description, STORE_OWNER) {
                error!("failed to register internal key {}: {}", key, e);
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current time as seen by the store.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn expiry_period(&self) -> Duration {
        self.config.expiry_period()
    }

    pub fn ais_expiry_period(&self) -> Duration {
        self.config.ais_expiry_period()
    }

    /// Values written before this instant are stale.
    pub fn value_cutoff(&self) -> DateTime<Utc> {
        cutoff(self.clock.now(), self.expiry_period())
    }

    /// AIS targets updated before this instant are stale.
    pub fn ais_cutoff(&self) -> DateTime<Utc> {
        cutoff(self.clock.now(), self.ais_expiry_period())
    }

    // ========================================================================
    // Key Registry
    // ========================================================================

    /// Register an exact key or wildcard pattern owned by `owner`.
    pub fn register_key(&self, key: &str, description: &str, owner: &str) -> Result<()> {
        self.registry.register(key, description, owner)
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.registry.is_allowed(key)
    }

    pub fn registered_keys(&self) -> Vec<RegisteredKey> {
        self.registry.snapshot()
    }

    pub fn key_owner(&self, key: &str) -> Option<String> {
        self.registry.owner(key)
    }

    // ========================================================================
    // Value Store
    // ========================================================================

    /// Write a value.
    ///
    /// An object value is fanned out to `key.<field>` recursively. Every leaf
    /// is authorized and arbitrated on its own; a rejected leaf does not stop
    /// the others and the first rejection is returned after all were tried.
    pub fn set_value(&self, key: &str, value: Value, source: &str, priority: i32) -> Result<()> {
        match value {
            Value::Object(fields) => {
                let mut first_error = None;
                for (field, field_value) in fields {
                    let leaf = format!("{}.{}", key, field);
                    if let Err(e) = self.set_value(&leaf, field_value, source, priority) {
                        first_error.get_or_insert(e);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            scalar => self.set_leaf(key, scalar, source, priority),
        }
    }

    fn set_leaf(&self, key: &str, value: Value, source: &str, priority: i32) -> Result<()> {
        if !self.registry.is_allowed(key) {
            error!("key {} is not registered in store", key);
            return Err(StoreError::KeyNotAllowed(key.to_string()));
        }

        let now = self.clock.now();
        let cutoff = cutoff(now, self.expiry_period());
        let mut values = self.values.lock();
        if let Some(existing) = values.get(key) {
            // equal priority keeps the existing entry until it expires
            if !existing.is_older_than(cutoff) && existing.priority >= priority {
                debug!(
                    "keeping existing entry for {} (priority {} >= {})",
                    key, existing.priority, priority
                );
                return Ok(());
            }
        }
        values.insert(key.to_string(), Entry::new(value, now, source, priority));
        self.last_sources
            .lock()
            .insert(SourceCategory::for_key(key), source.to_string());
        Ok(())
    }

    /// Current scalar value of a key.
    ///
    /// Returns `None` for unknown keys, stale entries (which are dropped) and
    /// structured values.
    pub fn get_single_value(&self, key: &str) -> Option<Value> {
        let cutoff = self.value_cutoff();
        let mut values = self.values.lock();
        let entry = values.get(key)?;
        if entry.is_older_than(cutoff) {
            values.remove(key);
            debug!("removed expired entry {}", key);
            return None;
        }
        match &entry.value {
            Value::Object(_) => None,
            v => Some(v.clone()),
        }
    }

    /// Full entry of a key, stale entries included.
    pub fn get_entry(&self, key: &str) -> Option<Entry> {
        self.values.lock().get(key).cloned()
    }

    /// All values below `prefix`, nested by their dotted suffixes.
    ///
    /// `ais` is special: it returns `{entities: {...}, count: n}` from the AIS
    /// store. Stale entries found during the scan are removed.
    pub fn get_data_by_prefix(&self, prefix: &str) -> Result<Value> {
        if prefix == BASE_KEY_AIS {
            let entities = self.get_ais_map();
            let mut rt = Map::new();
            rt.insert("entities".to_string(), Value::Object(entities));
            rt.insert("count".to_string(), Value::from(self.get_ais_counter()));
            return Ok(Value::Object(rt));
        }

        let dotted = format!("{}.", prefix);
        let cutoff = self.value_cutoff();
        let mut values = self.values.lock();

        let before = values.len();
        values.retain(|key, entry| !(key.starts_with(&dotted) && entry.is_older_than(cutoff)));
        let removed = before - values.len();
        if removed > 0 {
            debug!("removed {} expired entries below {}", removed, prefix);
        }

        let rt = query::nest(
            values
                .iter()
                .filter_map(|(key, entry)| {
                    key.strip_prefix(&dotted)
                        .map(|suffix| (suffix, entry.value.clone()))
                }),
        );
        if let Err(e) = &rt {
            error!("error getting values with prefix {}: {}", prefix, e);
        }
        rt
    }

    /// Number of stored values, stale entries not yet evicted included.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Drop all values and AIS targets, e.g. after the system time was stepped.
    pub fn reset(&self) {
        let mut values = self.values.lock();
        let mut ais = self.ais.lock();
        values.clear();
        ais.clear();
        info!("store reset");
    }

    /// Last accepted writer for a category, empty if none.
    pub fn get_last_source(&self, category: SourceCategory) -> String {
        self.last_sources
            .lock()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    // ========================================================================
    // AIS Store
    // ========================================================================

    /// Merge an AIS report for `mmsi`, timestamped now.
    pub fn set_ais_value(&self, mmsi: &str, data: &Map<String, Value>, source: &str) {
        self.add_ais_item(mmsi, data, source, None);
    }

    /// Merge an AIS report with an explicit timestamp.
    ///
    /// `timestamp` is the time the report was received by a remote collector;
    /// `None` means now.
    pub fn add_ais_item(
        &self,
        mmsi: &str,
        data: &Map<String, Value>,
        source: &str,
        timestamp: Option<DateTime<Utc>>,
    ) {
        if !self.config.own_mmsi.is_empty() && self.config.own_mmsi == mmsi {
            debug!("omitting own AIS message mmsi {}", mmsi);
            return;
        }
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        let mut targets = self.ais.lock();
        let entry = targets
            .entry(ais_key(mmsi))
            .or_insert_with(|| AisEntry::new(mmsi, timestamp));
        ais::merge_report(entry, data, timestamp);
        self.last_sources
            .lock()
            .insert(SourceCategory::Ais, source.to_string());
    }

    /// Current AIS targets in key order. Stale targets are removed.
    pub fn get_ais_data(&self) -> Vec<Map<String, Value>> {
        self.collect_ais()
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Current AIS targets keyed by `ais.<mmsi>`. Stale targets are removed.
    pub fn get_ais_map(&self) -> Map<String, Value> {
        self.collect_ais()
            .into_iter()
            .map(|(key, value)| (key, Value::Object(value)))
            .collect()
    }

    fn collect_ais(&self) -> Vec<(String, Map<String, Value>)> {
        let cutoff = self.ais_cutoff();
        let mut targets = self.ais.lock();
        let before = targets.len();
        targets.retain(|_, entry| !entry.is_older_than(cutoff));
        if targets.len() < before {
            debug!("removed {} expired AIS targets", before - targets.len());
        }
        targets
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Raw number of stored AIS targets, not adjusted for expiry.
    pub fn get_ais_counter(&self) -> usize {
        self.ais.lock().len()
    }
}

impl std::fmt::Debug for NavStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavStore")
            .field("config", &self.config)
            .field("values", &self.len())
            .field("ais", &self.get_ais_counter())
            .finish()
    }
}

impl std::fmt::Display for NavStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "NavStore")?;
        let values = self.values.lock();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        for (idx, key) in keys.into_iter().enumerate() {
            let entry = &values[key];
            writeln!(
                f,
                "   ({:03}:{}){}={}",
                idx,
                entry.timestamp.format("%Y/%m/%d-%H:%M:%S"),
                key,
                entry.value
            )?;
        }
        Ok(())
    }
}
