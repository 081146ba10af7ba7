use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::domain::{
    value_to_millis, RequestStatus, Role, CONVERSATION_FIELD, CREATED_AT_FIELD, STATUS_FIELD,
};

const MINUTE_MS: f64 = 60_000.0;
const HOUR_MS: f64 = 3_600_000.0;

/// Average admin response time, rounded to the coarsest fitting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum ResponseTime {
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl ResponseTime {
    pub fn from_average_millis(average: f64) -> Self {
        let minutes = (average / MINUTE_MS).round();
        if minutes < 60.0 {
            return Self::Minutes(minutes as u64);
        }
        let hours = (average / HOUR_MS).round();
        if hours < 24.0 {
            return Self::Hours(hours as u64);
        }
        Self::Days((hours / 24.0).round() as u64)
    }
}

impl fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(value) => write!(f, "{value} דקות"),
            Self::Hours(value) => write!(f, "{value} שעות"),
            Self::Days(value) => write!(f, "{value} ימים"),
        }
    }
}

/// Dashboard counters over the request collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStatistics {
    pub total: usize,
    /// Open and in-progress requests.
    pub open: usize,
    pub closed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response: Option<ResponseTime>,
}

impl RequestStatistics {
    pub fn from_records(records: &[Value]) -> Self {
        let mut open = 0;
        let mut closed = 0;
        for record in records {
            match RequestStatus::normalize(record.get(STATUS_FIELD)) {
                RequestStatus::Closed => closed += 1,
                RequestStatus::Open | RequestStatus::InProgress => open += 1,
            }
        }

        let delays: Vec<i64> = records.iter().filter_map(first_admin_reply_delay).collect();
        let average_response = if delays.is_empty() {
            None
        } else {
            let total: f64 = delays.iter().map(|ms| *ms as f64).sum();
            Some(ResponseTime::from_average_millis(total / delays.len() as f64))
        };

        Self {
            total: records.len(),
            open,
            closed,
            average_response,
        }
    }

    pub fn average_response_label(&self) -> String {
        self.average_response
            .map_or_else(|| "N/A".to_string(), |time| time.to_string())
    }
}

/// Milliseconds between creation and the earliest admin message sent after it.
fn first_admin_reply_delay(record: &Value) -> Option<i64> {
    let created = record.get(CREATED_AT_FIELD).and_then(value_to_millis)?;
    let conversation = record.get(CONVERSATION_FIELD)?.as_array()?;

    conversation
        .iter()
        .filter(|message| message.get("sender").and_then(Value::as_str) == Some(Role::Admin.label()))
        .filter_map(|message| message.get("timestamp").and_then(value_to_millis))
        .filter(|sent| *sent > created)
        .min()
        .map(|sent| sent - created)
}
