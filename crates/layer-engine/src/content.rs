//! Info-panel payloads for forecast locations and alert events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use map_common::to_lon_lat;
use nws_client::{AlertProperties, Forecast, Period};

use crate::impact::LocationRecord;

/// Expiry as shown on the panel, e.g. `May 01 at 9:30 PM UTC`.
pub fn format_expiry(at: DateTime<Utc>) -> String {
    at.format("%b %d at %-I:%M %p UTC").to_string()
}

/// Details of a clicked alert polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInfo {
    pub id: String,
    pub event: String,
    pub severity: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub area: Option<String>,
    pub expires: Option<String>,
}

impl EventInfo {
    pub fn from_alert(props: &AlertProperties) -> Self {
        Self {
            id: props.id.clone(),
            event: props.event.clone(),
            severity: props.severity.clone().unwrap_or_else(|| "Unknown".to_string()),
            headline: props.headline.clone(),
            description: props.description.clone(),
            instruction: props.instruction.clone(),
            area: props.area_desc.clone(),
            expires: props.expires.map(format_expiry),
        }
    }
}

/// Forecast of one location, split the way the panel shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastInfo {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// First hourly period.
    pub current: Option<Period>,
    /// Remaining hourly periods.
    pub hourly: Vec<Period>,
    /// Forecast periods starting today.
    pub daily: Vec<Period>,
    pub impacted: bool,
    pub impacting_events: Vec<EventInfo>,
}

impl ForecastInfo {
    pub fn build(
        name: &str,
        forecast: &Forecast,
        hourly: &Forecast,
        records: &[LocationRecord],
        today: NaiveDate,
    ) -> Self {
        let (longitude, latitude) = records
            .first()
            .map(|r| to_lon_lat(r.center))
            .unwrap_or_default();

        let mut hourly_periods = hourly.periods.iter().cloned();
        let current = hourly_periods.next();

        let mut impacting_events: Vec<EventInfo> = Vec::new();
        for record in records {
            for alert in &record.impacting_events {
                if !impacting_events.iter().any(|e| e.id == alert.id) {
                    impacting_events.push(EventInfo::from_alert(alert));
                }
            }
        }

        Self {
            name: name.to_string(),
            latitude,
            longitude,
            current,
            hourly: hourly_periods.collect(),
            daily: forecast
                .periods
                .iter()
                .filter(|p| p.start_time.date_naive() == today)
                .cloned()
                .collect(),
            impacted: records.iter().any(|r| r.impacted),
            impacting_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::from_lon_lat;
    use std::sync::Arc;
    use test_utils::fixtures::{alert_properties, forecast_at, hourly_forecast, reference_time};
    use test_utils::assert_coords_approx_eq;

    #[test]
    fn test_expiry_format() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 5, 1, 21, 30, 0).unwrap();
        assert_eq!(format_expiry(at), "May 01 at 9:30 PM UTC");
        let morning = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 12, 24, 0, 5, 0).unwrap();
        assert_eq!(format_expiry(morning), "Dec 24 at 12:05 AM UTC");
    }

    #[test]
    fn test_event_info_defaults_severity() {
        let mut props = alert_properties("x", "Special Weather Statement", None);
        props.expires = None;
        let info = EventInfo::from_alert(&props);
        assert_eq!(info.severity, "Unknown");
        assert!(info.expires.is_none());
    }

    #[test]
    fn test_forecast_info_split() {
        let forecast = forecast_at(-90.07, 29.95);
        let hourly = hourly_forecast(6);
        let mut record = LocationRecord::new("New Orleans", from_lon_lat(-90.07, 29.95));
        let alert = Arc::new(alert_properties("a1", "Flood Warning", Some("Severe")));
        record.impacted = true;
        record.impacting_events = vec![alert.clone(), alert];

        let info = ForecastInfo::build(
            "New Orleans",
            &forecast,
            &hourly,
            &[record],
            reference_time().date_naive(),
        );

        assert_eq!(info.current.as_ref().map(|p| p.number), Some(1));
        assert_eq!(info.hourly.len(), 5);
        // reference time is 15:00 UTC: "This Afternoon" and "Tonight" start today
        assert_eq!(info.daily.len(), 2);
        assert!(info.impacted);
        assert_eq!(info.impacting_events.len(), 1);
        assert_coords_approx_eq!((info.longitude, info.latitude), (-90.07, 29.95), 1e-9);
    }
}
