//! System status tool: node health and today's critical alerts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::error::ToolError;
use sentinel_core::schema::{self, Schema};
use sentinel_core::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::farm_data::{Alert, FarmDataSource, SensorNode, Severity};

pub const NAME: &str = "getSystemStatus";

/// Summary counts reported by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub offline_nodes: usize,
    pub low_battery_nodes: usize,
    pub critical_alerts_today: usize,
}

impl SystemStatus {
    /// Count offline and low-battery nodes, and high-severity alerts raised
    /// on the same UTC day as `now`.
    pub fn summarize(nodes: &[SensorNode], alerts: &[Alert], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            offline_nodes: nodes.iter().filter(|n| n.is_offline()).count(),
            low_battery_nodes: nodes.iter().filter(|n| n.is_low_battery()).count(),
            critical_alerts_today: alerts
                .iter()
                .filter(|a| a.severity == Severity::High && a.timestamp.date_naive() == today)
                .count(),
        }
    }
}

pub fn status_schema() -> Schema {
    schema::object()
        .field(
            "offlineNodes",
            schema::integer()
                .minimum(0.0)
                .describe("The number of nodes currently inactive or in an error state."),
        )
        .field(
            "lowBatteryNodes",
            schema::integer().minimum(0.0).describe("The number of nodes with low battery."),
        )
        .field(
            "criticalAlertsToday",
            schema::integer()
                .minimum(0.0)
                .describe("The number of \"high\" severity alerts for the current day."),
        )
        .into()
}

pub struct SystemStatusTool {
    farm: Arc<dyn FarmDataSource>,
    input: Schema,
    output: Schema,
}

impl SystemStatusTool {
    pub fn new(farm: Arc<dyn FarmDataSource>) -> Self {
        Self {
            farm,
            input: schema::object().into(),
            output: status_schema(),
        }
    }
}

#[async_trait]
impl Tool for SystemStatusTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Returns a summary of the farm's system status, including node health and recent critical alerts."
    }

    fn input_schema(&self) -> &Schema {
        &self.input
    }

    fn output_schema(&self) -> &Schema {
        &self.output
    }

    async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
        let (nodes, alerts) = futures::try_join!(self.farm.nodes(), self.farm.alerts())?;
        let status = SystemStatus::summarize(&nodes, &alerts, self.farm.now());
        serde_json::to_value(status).map_err(|e| ToolError::ExecutionFailed {
            tool: NAME.into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm_data::{NodeHealth, NodeStatus, StaticFarmData, reference_instant};
    use chrono::Duration;
    use serde_json::json;

    fn node(id: &str, status: NodeStatus, health: NodeHealth) -> SensorNode {
        SensorNode {
            id: id.into(),
            status,
            battery: 50,
            health,
            last_ping: reference_instant(),
        }
    }

    fn alert(id: &str, severity: Severity, timestamp: DateTime<Utc>) -> Alert {
        Alert {
            id: id.into(),
            node_id: "FS-N001".into(),
            timestamp,
            severity,
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn fixture_status() {
        let tool = SystemStatusTool::new(Arc::new(StaticFarmData::new()));
        let out = tool.call(json!({})).await.unwrap();
        assert_eq!(
            out,
            json!({"offlineNodes": 4, "lowBatteryNodes": 4, "criticalAlertsToday": 2})
        );
        assert!(tool.output_schema().validate(&out).is_ok());
    }

    #[test]
    fn offline_means_inactive_or_error() {
        let nodes = vec![
            node("a", NodeStatus::Active, NodeHealth::Ok),
            node("b", NodeStatus::Inactive, NodeHealth::Ok),
            node("c", NodeStatus::Active, NodeHealth::Error),
            node("d", NodeStatus::Inactive, NodeHealth::Error),
            node("e", NodeStatus::Active, NodeHealth::Warning),
        ];
        let status = SystemStatus::summarize(&nodes, &[], reference_instant());
        assert_eq!(status.offline_nodes, 3);
        assert_eq!(status.low_battery_nodes, 1);
    }

    #[test]
    fn only_todays_high_alerts_are_critical() {
        let now = reference_instant();
        let alerts = vec![
            alert("1", Severity::High, now - Duration::hours(11)),
            alert("2", Severity::High, now - Duration::hours(13)),
            alert("3", Severity::Medium, now),
            alert("4", Severity::High, now + Duration::hours(11)),
        ];
        let status = SystemStatus::summarize(&[], &alerts, now);
        assert_eq!(status.critical_alerts_today, 2);
    }

    #[test]
    fn empty_farm_reports_zeroes() {
        let status = SystemStatus::summarize(&[], &[], reference_instant());
        assert_eq!(
            status,
            SystemStatus {
                offline_nodes: 0,
                low_battery_nodes: 0,
                critical_alerts_today: 0
            }
        );
    }
}
