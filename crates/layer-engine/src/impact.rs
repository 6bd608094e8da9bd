//! Alert impact detection.
//!
//! A forecast location is impacted by an alert when the alert's polygon
//! contains the location's center point. Under the default
//! [`ImpactPolicy::Accumulate`] impact state only ever grows during a
//! session: a location stays impacted after its alert expires until the
//! forecast layer is reloaded. [`ImpactPolicy::Recompute`] clears impact
//! state at the start of every alert pass instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use map_common::Coordinate;
use nws_client::{AlertFeature, AlertProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactPolicy {
    #[default]
    Accumulate,
    Recompute,
}

/// Impact state of one forecast feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub location_name: String,
    /// Map coordinates (EPSG:3857).
    pub center: Coordinate,
    pub impacted: bool,
    pub impacting_events: Vec<Arc<AlertProperties>>,
}

impl LocationRecord {
    pub fn new(location_name: impl Into<String>, center: Coordinate) -> Self {
        Self {
            location_name: location_name.into(),
            center,
            impacted: false,
            impacting_events: Vec::new(),
        }
    }

    fn has_alert(&self, id: &str) -> bool {
        self.impacting_events.iter().any(|a| a.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactEngine {
    policy: ImpactPolicy,
}

impl ImpactEngine {
    pub fn new(policy: ImpactPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ImpactPolicy {
        self.policy
    }

    /// Prepare records for a new alert-ingestion pass.
    pub fn start_pass<'a>(&self, records: impl IntoIterator<Item = &'a mut LocationRecord>) {
        if self.policy == ImpactPolicy::Recompute {
            for record in records {
                record.impacted = false;
                record.impacting_events.clear();
            }
        }
    }

    /// Test one alert against every record. Returns how many records became
    /// impacted for the first time.
    pub fn apply<'a>(
        &self,
        records: impl IntoIterator<Item = &'a mut LocationRecord>,
        alert: &AlertFeature,
    ) -> usize {
        let mut newly_impacted = 0;
        for record in records {
            if !alert.geometry.contains_point(record.center) {
                continue;
            }
            if record.has_alert(&alert.properties.id) {
                continue;
            }
            if !record.impacted {
                newly_impacted += 1;
            }
            record.impacting_events.push(alert.properties.clone());
            record.impacted = true;
            debug!(
                location = %record.location_name,
                event = %alert.properties.event,
                "Location impacted"
            );
        }
        if newly_impacted > 0 {
            metrics::counter!("impacted_locations_total").increment(newly_impacted as u64);
        }
        newly_impacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::from_lon_lat;
    use test_utils::fixtures::{alert_around, locations};

    fn record(spec: (&str, f64, f64)) -> LocationRecord {
        LocationRecord::new(spec.0, from_lon_lat(spec.2, spec.1))
    }

    #[test]
    fn test_contained_location_is_impacted() {
        let mut records = vec![record(locations::NEW_ORLEANS), record(locations::SEATTLE)];
        let alert = alert_around("a1", "Flood Warning", "Severe", -90.0, 30.0, 0.5);

        let engine = ImpactEngine::default();
        assert_eq!(engine.apply(records.iter_mut(), &alert), 1);
        assert!(records[0].impacted);
        assert_eq!(records[0].impacting_events.len(), 1);
        assert_eq!(records[0].impacting_events[0].event, "Flood Warning");
        assert!(!records[1].impacted);
    }

    #[test]
    fn test_same_alert_not_duplicated() {
        let mut records = vec![record(locations::NEW_ORLEANS)];
        let alert = alert_around("a1", "Flood Warning", "Severe", -90.0, 30.0, 0.5);
        let engine = ImpactEngine::default();
        engine.apply(records.iter_mut(), &alert);
        assert_eq!(engine.apply(records.iter_mut(), &alert), 0);
        assert_eq!(records[0].impacting_events.len(), 1);
    }

    #[test]
    fn test_accumulate_keeps_stale_impact() {
        let mut records = vec![record(locations::NEW_ORLEANS)];
        let engine = ImpactEngine::new(ImpactPolicy::Accumulate);
        engine.apply(
            records.iter_mut(),
            &alert_around("a1", "Flood Warning", "Severe", -90.0, 30.0, 0.5),
        );
        engine.start_pass(records.iter_mut());
        assert!(records[0].impacted);
        assert_eq!(records[0].impacting_events.len(), 1);
    }

    #[test]
    fn test_recompute_clears_on_new_pass() {
        let mut records = vec![record(locations::NEW_ORLEANS)];
        let engine = ImpactEngine::new(ImpactPolicy::Recompute);
        engine.apply(
            records.iter_mut(),
            &alert_around("a1", "Flood Warning", "Severe", -90.0, 30.0, 0.5),
        );
        engine.start_pass(records.iter_mut());
        assert!(!records[0].impacted);
        assert!(records[0].impacting_events.is_empty());
    }

    #[test]
    fn test_policy_parses_lowercase() {
        let policy: ImpactPolicy = serde_json::from_str("\"recompute\"").unwrap();
        assert_eq!(policy, ImpactPolicy::Recompute);
        assert_eq!(ImpactPolicy::default(), ImpactPolicy::Accumulate);
    }
}
