//! Farm telemetry: sensor nodes, alerts, and bird detection counts.
//!
//! Tools read farm state through [`FarmDataSource`] so the live database can
//! be swapped in without touching the tools. [`StaticFarmData`] is a
//! deterministic fixture used by the CLI demo and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sentinel_core::error::ToolError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeHealth {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A field-deployed detection/deterrent node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorNode {
    pub id: String,
    pub status: NodeStatus,
    /// Battery charge in percent
    pub battery: u8,
    pub health: NodeHealth,
    pub last_ping: DateTime<Utc>,
}

impl SensorNode {
    /// Inactive or reporting an error.
    pub fn is_offline(&self) -> bool {
        self.status == NodeStatus::Inactive || self.health == NodeHealth::Error
    }

    pub fn is_low_battery(&self) -> bool {
        self.health == NodeHealth::Warning
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Bird detections counted in one time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSample {
    /// Time of day, `HH:MM`
    pub time: String,
    pub detections: u32,
}

/// Read access to farm state.
#[async_trait]
pub trait FarmDataSource: Send + Sync {
    async fn nodes(&self) -> Result<Vec<SensorNode>, ToolError>;

    async fn alerts(&self) -> Result<Vec<Alert>, ToolError>;

    /// Detection counts for the last 24 hours, oldest first.
    async fn detection_frequency(&self) -> Result<Vec<DetectionSample>, ToolError>;

    /// The source's notion of "now" (decides which alerts are from today).
    fn now(&self) -> DateTime<Utc>;
}

/// The instant the bundled fixtures are anchored at.
pub fn reference_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 25, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Deterministic farm fixture: 24 nodes, 12 alerts, 12 detection samples.
#[derive(Debug, Clone)]
pub struct StaticFarmData {
    now: DateTime<Utc>,
    nodes: Vec<SensorNode>,
    alerts: Vec<Alert>,
    detections: Vec<DetectionSample>,
}

impl StaticFarmData {
    pub fn new() -> Self {
        Self::anchored_at(reference_instant())
    }

    /// Build the fixture with every timestamp relative to `now`.
    pub fn anchored_at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            nodes: fixture_nodes(now),
            alerts: fixture_alerts(now),
            detections: fixture_detections(),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<SensorNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = alerts;
        self
    }
}

impl Default for StaticFarmData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FarmDataSource for StaticFarmData {
    async fn nodes(&self) -> Result<Vec<SensorNode>, ToolError> {
        Ok(self.nodes.clone())
    }

    async fn alerts(&self) -> Result<Vec<Alert>, ToolError> {
        Ok(self.alerts.clone())
    }

    async fn detection_frequency(&self) -> Result<Vec<DetectionSample>, ToolError> {
        Ok(self.detections.clone())
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Every fifth node is switched off; nodes 10 and 20 also have a flat battery.
fn fixture_nodes(now: DateTime<Utc>) -> Vec<SensorNode> {
    (1u32..=24)
        .map(|i| {
            let status = if i % 5 == 0 {
                NodeStatus::Inactive
            } else {
                NodeStatus::Active
            };
            let battery = if i % 10 == 0 { 0 } else { (i * 37 % 101) as u8 };
            let health = match battery {
                0 => NodeHealth::Error,
                1..=19 => NodeHealth::Warning,
                _ => NodeHealth::Ok,
            };
            let ping_minutes = match status {
                NodeStatus::Active => i64::from(i * 7 % 60),
                NodeStatus::Inactive => i64::from(i * 53 % 1440),
            };
            SensorNode {
                id: format!("FS-N{i:03}"),
                status,
                battery,
                health,
                last_ping: now - Duration::minutes(ping_minutes),
            }
        })
        .collect()
}

fn fixture_alerts(now: DateTime<Utc>) -> Vec<Alert> {
    let photo = || Some("https://placehold.co/600x400.png".to_string());
    let table: [(&str, &str, Duration, Severity, Option<String>); 12] = [
        ("A001", "FS-N001", Duration::minutes(15), Severity::Low, None),
        ("A002", "FS-N002", Duration::hours(1), Severity::Medium, photo()),
        ("A003", "FS-N004", Duration::hours(3), Severity::High, None),
        ("A004", "FS-N001", Duration::days(1), Severity::Medium, None),
        ("A005", "FS-N003", Duration::days(1), Severity::Low, None),
        ("A006", "FS-N002", Duration::days(2), Severity::High, photo()),
        ("A007", "FS-N006", Duration::minutes(5), Severity::High, None),
        ("A008", "FS-N008", Duration::hours(8), Severity::Low, None),
        ("A009", "FS-N012", Duration::hours(12), Severity::Medium, photo()),
        ("A010", "FS-N015", Duration::days(3), Severity::High, None),
        ("A011", "FS-N007", Duration::days(4), Severity::Low, None),
        ("A012", "FS-N011", Duration::days(5), Severity::Medium, None),
    ];
    table
        .into_iter()
        .map(|(id, node_id, ago, severity, photo_url)| Alert {
            id: id.into(),
            node_id: node_id.into(),
            timestamp: now - ago,
            severity,
            photo_url,
        })
        .collect()
}

fn fixture_detections() -> Vec<DetectionSample> {
    [
        ("00:00", 5),
        ("02:00", 8),
        ("04:00", 15),
        ("06:00", 40),
        ("08:00", 60),
        ("10:00", 45),
        ("12:00", 30),
        ("14:00", 35),
        ("16:00", 55),
        ("18:00", 70),
        ("20:00", 25),
        ("22:00", 10),
    ]
    .into_iter()
    .map(|(time, detections)| DetectionSample {
        time: time.into(),
        detections,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_sizes() {
        let data = StaticFarmData::new();
        assert_eq!(data.nodes().await.unwrap().len(), 24);
        assert_eq!(data.alerts().await.unwrap().len(), 12);
        assert_eq!(data.detection_frequency().await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn fixture_node_health() {
        let nodes = StaticFarmData::new().nodes().await.unwrap();
        assert_eq!(nodes[0].id, "FS-N001");
        assert_eq!(nodes.iter().filter(|n| n.is_offline()).count(), 4);
        assert_eq!(nodes.iter().filter(|n| n.is_low_battery()).count(), 4);
        let n10 = nodes.iter().find(|n| n.id == "FS-N010").unwrap();
        assert_eq!(n10.health, NodeHealth::Error);
        assert_eq!(n10.status, NodeStatus::Inactive);
    }

    #[test]
    fn fixture_is_relative_to_anchor() {
        let now = reference_instant();
        let data = StaticFarmData::anchored_at(now);
        assert_eq!(data.now(), now);
        assert_eq!(data.alerts[6].timestamp, now - Duration::minutes(5));
        assert!(data.nodes.iter().all(|n| n.last_ping <= now));
    }

    #[test]
    fn serializes_like_the_dashboard_expects() {
        let node = &StaticFarmData::new().nodes[0];
        let json = serde_json::to_value(node).unwrap();
        assert_eq!(json["status"], "active");
        assert!(json.get("lastPing").is_some());
    }
}
