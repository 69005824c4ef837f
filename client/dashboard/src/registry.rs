use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};

use crate::envelope::{MetricValue, TelemetryUpdate};

/// Latest known metrics for one device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState {
    metrics: BTreeMap<String, f64>,
    series: BTreeMap<String, Vec<f64>>,
    last_seen: DateTime<Local>,
}

impl DeviceState {
    fn new(last_seen: DateTime<Local>) -> Self {
        Self {
            metrics: BTreeMap::new(),
            series: BTreeMap::new(),
            last_seen,
        }
    }

    /// A key holds a number, a series, or nothing; writing one kind drops the other.
    fn merge(&mut self, name: String, value: MetricValue) {
        match value {
            MetricValue::Number(number) => {
                self.series.remove(&name);
                self.metrics.insert(name, number);
            }
            MetricValue::Series(values) => {
                self.metrics.remove(&name);
                self.series.insert(name, values);
            }
            MetricValue::Clear => {
                self.metrics.remove(&name);
                self.series.remove(&name);
            }
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn last_seen(&self) -> DateTime<Local> {
        self.last_seen
    }
}

/// Device id → state, iterated in first-seen order. Entries are never
/// removed; a metric key only disappears when an update clears it.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    order: Vec<String>,
    devices: HashMap<String, DeviceState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the update into the device entry, creating it if absent.
    /// Returns true when the device was not known before.
    pub fn apply(&mut self, update: TelemetryUpdate, observed_at: DateTime<Local>) -> bool {
        let TelemetryUpdate { device_id, metrics } = update;
        let created = !self.devices.contains_key(&device_id);
        if created {
            self.order.push(device_id.clone());
        }

        let state = self
            .devices
            .entry(device_id)
            .or_insert_with(|| DeviceState::new(observed_at));
        for (name, value) in metrics {
            state.merge(name, value);
        }
        state.last_seen = observed_at;
        created
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceState> {
        self.devices.get(device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceState)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.devices.get(id).map(|state| (id.as_str(), state)))
    }

    /// Owned copy of every entry in first-seen order, for one render pass.
    pub fn snapshot(&self) -> Vec<(String, DeviceState)> {
        self.iter()
            .map(|(id, state)| (id.to_string(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg_attr(not(feature = "gui"), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn update(device_id: &str, metrics: &[(&str, f64)]) -> TelemetryUpdate {
        TelemetryUpdate::numbers(device_id, metrics)
    }

    fn at(seconds: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn later_message_merges_instead_of_replacing() {
        let mut registry = Registry::new();
        registry.apply(update("M1", &[("cycle_time", 12.5), ("mold_temp", 180.2)]), at(0));
        registry.apply(update("M1", &[("cycle_time", 0.0)]), at(1));

        let state = registry.get("M1").unwrap();
        assert_eq!(state.metric("cycle_time"), Some(0.0));
        assert_eq!(state.metric("mold_temp"), Some(180.2));
        assert_eq!(state.last_seen(), at(1));
    }

    #[test]
    fn last_write_wins_per_key() {
        let mut registry = Registry::new();
        let sequence = [
            update("M1", &[("a", 1.0), ("b", 1.0)]),
            update("M1", &[("b", 2.0), ("c", 2.0)]),
            update("M1", &[("a", 3.0)]),
            update("M1", &[("c", 4.0)]),
        ];
        for (step, message) in sequence.into_iter().enumerate() {
            registry.apply(message, at(step as i64));
        }

        let state = registry.get("M1").unwrap();
        assert_eq!(state.metric("a"), Some(3.0));
        assert_eq!(state.metric("b"), Some(2.0));
        assert_eq!(state.metric("c"), Some(4.0));
        assert_eq!(state.metrics().len(), 3);
    }

    #[test]
    fn replaying_a_message_only_moves_last_seen() {
        let message = update("M1", &[("cycle_time", 12.5)]);
        let mut once = Registry::new();
        once.apply(message.clone(), at(0));

        let mut twice = Registry::new();
        twice.apply(message.clone(), at(0));
        assert!(!twice.apply(message, at(5)));

        let (once, twice) = (once.get("M1").unwrap(), twice.get("M1").unwrap());
        assert_eq!(once.metrics(), twice.metrics());
        assert_eq!(twice.last_seen(), at(5));
    }

    #[test]
    fn iteration_follows_first_seen_order() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.apply(update("QMC-01", &[("temp", 200.0)]), at(0)));
        assert!(registry.apply(update("IMM-01", &[("cycle_time", 30.0)]), at(1)));
        assert!(!registry.apply(update("QMC-01", &[("temp", 201.0)]), at(2)));
        assert!(registry.apply(update("CHILLER-01", &[]), at(3)));

        let ids: Vec<&str> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["QMC-01", "IMM-01", "CHILLER-01"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn clear_removes_key_and_series_replaces_number() {
        let mut registry = Registry::new();
        registry.apply(update("IMM-01", &[("cycle_time", 31.0), ("zone_temps", 200.0)]), at(0));

        let mut next = update("IMM-01", &[]);
        next.metrics.insert("cycle_time".to_string(), MetricValue::Clear);
        next.metrics
            .insert("zone_temps".to_string(), MetricValue::Series(vec![199.5, 230.0]));
        registry.apply(next, at(1));

        let state = registry.get("IMM-01").unwrap();
        assert_eq!(state.metric("cycle_time"), None);
        assert_eq!(state.metric("zone_temps"), None);
        assert_eq!(state.series("zone_temps"), Some(&[199.5, 230.0][..]));
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let mut registry = Registry::new();
        registry.apply(update("B", &[("cycle_time", 1.0)]), at(0));
        registry.apply(update("A", &[("cycle_time", 2.0)]), at(1));

        let snapshot = registry.snapshot();
        registry.apply(update("B", &[("cycle_time", 9.0)]), at(2));

        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(snapshot[0].1.metric("cycle_time"), Some(1.0));
    }
}
