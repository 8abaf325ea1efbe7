//! Request/response message types for the engine's exposed interface.
//!
//! The UI layer talks to the engine in tagged-action request messages and
//! flat success/message responses, one in-flight response per request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alarm::AlarmInfo;
use crate::store::{PunchDirection, ScheduledTask};

/// A request from the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EngineRequest {
    ScheduleTask {
        direction: PunchDirection,
        due_at: DateTime<Utc>,
    },
    CancelTask {
        id: String,
    },
    GetScheduledTasks,
    /// The user just clocked in successfully.
    ClockInSuccess,
    /// The user just clocked out successfully.
    ClockOutSuccess,
    /// The user clocked out; figures are the last scraped attendance data.
    EarlyClockOut {
        effective_minutes: u32,
        gross_minutes: u32,
    },
    DebugAlarms,
}

/// A scheduled task together with its live alarm time, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: ScheduledTask,
    /// When the matching alarm will actually fire, if still armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Snapshot of armed alarms and relevant storage for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub current_time: DateTime<Utc>,
    pub alarms: Vec<AlarmInfo>,
    pub storage: BTreeMap<String, Value>,
}

/// Flat response to any [`EngineRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            remaining_minutes: None,
            tasks: None,
            debug_info: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            remaining_minutes: None,
            tasks: None,
            debug_info: None,
        }
    }

    pub fn with_remaining(mut self, minutes: u32) -> Self {
        self.remaining_minutes = Some(minutes);
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskView>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_debug(mut self, debug_info: DebugInfo) -> Self {
        self.debug_info = Some(debug_info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_serializes_with_action_tag() {
        let req = EngineRequest::EarlyClockOut {
            effective_minutes: 282,
            gross_minutes: 358,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "earlyClockOut");
        assert_eq!(json["effective_minutes"], 282);

        let back: EngineRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(back, EngineRequest::EarlyClockOut { .. }));
    }

    #[test]
    fn test_unit_request_round_trip() {
        let json = serde_json::json!({"action": "getScheduledTasks"});
        let req: EngineRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(req, EngineRequest::GetScheduledTasks));
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let resp = ActionResponse::ok("done");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("remaining_minutes"));
        assert!(!json.contains("tasks"));
        assert!(!json.contains("debug_info"));
    }

    #[test]
    fn test_response_builders() {
        let resp = ActionResponse::ok("early departure").with_remaining(198);
        assert!(resp.success);
        assert_eq!(resp.remaining_minutes, Some(198));

        let resp = ActionResponse::err("no portal page");
        assert!(!resp.success);
    }

    #[test]
    fn test_task_view_flattens_task() {
        let created = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2025, 6, 2, 17, 0, 0).unwrap();
        let view = TaskView {
            task: ScheduledTask::manual(PunchDirection::Out, due, created),
            scheduled_for: Some(due),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["kind"], "manual_punch");
        assert!(json["scheduled_for"].is_string());
    }
}
