//! JSON protocol spoken with provider binaries over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::calendar_source::RemoteCalendarRef;
use crate::event::{ExternalCalendar, ExternalEvent};

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CheckAccount,
    ListCalendars,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Request sent to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent back by a provider.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Where on the provider a command applies.
#[derive(Debug, Serialize, Deserialize)]
pub struct Target {
    pub account_id: String,
    pub calendar_id: String,
}

impl From<&RemoteCalendarRef> for Target {
    fn from(calendar: &RemoteCalendarRef) -> Self {
        Target {
            account_id: calendar.account_id.clone(),
            calendar_id: calendar.calendar_id.clone(),
        }
    }
}

/// Ask whether the provider still holds usable credentials for an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckAccount {
    pub account_id: String,
}

impl ProviderCommand for CheckAccount {
    type Response = bool;
    fn command() -> Command {
        Command::CheckAccount
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCalendars {
    pub account_id: String,
}

impl ProviderCommand for ListCalendars {
    type Response = Vec<ExternalCalendar>;
    fn command() -> Command {
        Command::ListCalendars
    }
}

/// List events within a time range (RFC 3339 bounds).
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(flatten)]
    pub target: Target,
    pub time_min: String,
    pub time_max: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<ExternalEvent>;
    fn command() -> Command {
        Command::ListEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub target: Target,
    pub event: ExternalEvent,
}

impl ProviderCommand for CreateEvent {
    type Response = ExternalEvent;
    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(flatten)]
    pub target: Target,
    pub event: ExternalEvent,
}

impl ProviderCommand for UpdateEvent {
    type Response = ExternalEvent;
    fn command() -> Command {
        Command::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    #[serde(flatten)]
    pub target: Target,
    pub event_id: String,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let cmd = DeleteEvent {
            target: Target {
                account_id: "me@example.com".to_string(),
                calendar_id: "primary".to_string(),
            },
            event_id: "ev1".to_string(),
        };
        let request = Request {
            command: DeleteEvent::command(),
            params: serde_json::to_value(cmd).unwrap(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["command"], "delete_event");
        assert_eq!(json["params"]["account_id"], "me@example.com");
        assert_eq!(json["params"]["calendar_id"], "primary");
        assert_eq!(json["params"]["event_id"], "ev1");
    }

    #[test]
    fn test_error_response_parses() {
        let raw = r#"{"status":"error","error":"token expired"}"#;
        let response: Response<Vec<ExternalEvent>> = serde_json::from_str(raw).unwrap();
        match response {
            Response::Error { error } => assert_eq!(error, "token expired"),
            Response::Success { .. } => panic!("expected error response"),
        }
    }
}
