//! WebSocket wire protocol.
//!
//! Inbound frames name an event and a counter id, either as an object
//! (`{"event":"increment","id":"ctr_1"}`) or as a two-element array
//! (`["increment","ctr_1"]`). Outbound frames are [`ServerMessage`]s tagged
//! by `event`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tally_core::{Counter, CounterId, CounterUpdate, Mutation};

/// What an inbound frame asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Mutate(Mutation),
    Subscribe,
    Unsubscribe,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mutate(m) => m.event_name(),
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Self::Subscribe),
            "unsubscribe" => Ok(Self::Unsubscribe),
            other => other
                .parse::<Mutation>()
                .map(Self::Mutate)
                .map_err(|e| ProtocolError::UnknownEvent(e.0)),
        }
    }
}

/// A parsed, validated inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub counter_id: CounterId,
}

/// Why an inbound frame was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("frame must be an object or an [event, id] array")]
    InvalidShape,

    #[error("missing event name")]
    MissingEvent,

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("missing or empty counter id")]
    MissingId,

    #[error("binary frames are not supported")]
    BinaryFrame,
}

impl ProtocolError {
    /// Error code sent in the `error` frame.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::InvalidShape | Self::MissingEvent | Self::BinaryFrame => "INVALID_EVENT",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::MissingId => "INVALID_ID",
        }
    }
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<InboundEvent, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    let (event, id) = match &value {
        Value::Object(map) => (map.get("event"), map.get("id").or_else(|| map.get("counterId"))),
        Value::Array(items) => (items.first(), items.get(1)),
        _ => return Err(ProtocolError::InvalidShape),
    };

    let kind = event
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingEvent)?
        .parse::<EventKind>()?;
    let counter_id = id.and_then(counter_id_from).ok_or(ProtocolError::MissingId)?;

    Ok(InboundEvent { kind, counter_id })
}

fn counter_id_from(value: &Value) -> Option<CounterId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(CounterId::from_raw(s.as_str())),
        Value::Number(n) => Some(CounterId::from_raw(n.to_string())),
        _ => None,
    }
}

/// Body of an `error` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Server → client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Post-mutation partial snapshot, fanned out to recipients.
    CounterUpdated {
        #[serde(rename = "counterId")]
        counter_id: CounterId,
        data: CounterUpdate,
    },
    /// Full record, sent to a connection that subscribed.
    CounterSnapshot {
        #[serde(rename = "counterId")]
        counter_id: CounterId,
        data: Counter,
    },
    /// Rejected frame or unresolved id, sent to the initiating connection only.
    Error { data: ErrorBody },
}

impl ServerMessage {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::Error {
            data: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn protocol_error(err: &ProtocolError) -> Self {
        Self::error(err.code(), err.to_string())
    }

    pub fn not_found(id: &CounterId) -> Self {
        Self::error("COUNTER_NOT_FOUND", format!("counter not found: {id}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_object_frame() {
        let ev = parse_inbound(r#"{"event":"increment","id":"ctr_1"}"#).unwrap();
        assert_eq!(ev.kind, EventKind::Mutate(Mutation::Increment));
        assert_eq!(ev.counter_id.as_str(), "ctr_1");
    }

    #[test]
    fn parses_array_frame() {
        let ev = parse_inbound(r#"["firstLoad","abc"]"#).unwrap();
        assert_eq!(ev.kind, EventKind::Mutate(Mutation::FirstLoad));
        assert_eq!(ev.counter_id.as_str(), "abc");
    }

    #[test]
    fn accepts_counter_id_alias_and_numeric_ids() {
        let ev = parse_inbound(r#"{"event":"regret","counterId":42}"#).unwrap();
        assert_eq!(ev.counter_id.as_str(), "42");
    }

    #[test]
    fn parses_every_event_name() {
        for (name, kind) in [
            ("increment", EventKind::Mutate(Mutation::Increment)),
            ("reset", EventKind::Mutate(Mutation::Reset)),
            ("firstLoad", EventKind::Mutate(Mutation::FirstLoad)),
            ("regret", EventKind::Mutate(Mutation::Regret)),
            ("subscribe", EventKind::Subscribe),
            ("unsubscribe", EventKind::Unsubscribe),
        ] {
            let ev = parse_inbound(&json!({"event": name, "id": "x"}).to_string()).unwrap();
            assert_eq!(ev.kind, kind);
            assert_eq!(ev.kind.name(), name);
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        let cases = [
            ("not json", "INVALID_JSON"),
            ("42", "INVALID_EVENT"),
            (r#"{"id":"x"}"#, "INVALID_EVENT"),
            (r#"{"event":7,"id":"x"}"#, "INVALID_EVENT"),
            (r#"{"event":"decrement","id":"x"}"#, "UNKNOWN_EVENT"),
            (r#"{"event":"increment"}"#, "INVALID_ID"),
            (r#"{"event":"increment","id":""}"#, "INVALID_ID"),
            (r#"{"event":"regret","id":"   "}"#, "INVALID_ID"),
            (r#"["reset", "\t\n"]"#, "INVALID_ID"),
            (r#"{"event":"increment","id":null}"#, "INVALID_ID"),
            (r#"["reset"]"#, "INVALID_ID"),
            ("[]", "INVALID_EVENT"),
        ];
        for (frame, code) in cases {
            let err = parse_inbound(frame).unwrap_err();
            assert_eq!(err.code(), code, "frame {frame}: {err}");
        }
    }

    #[test]
    fn event_names_are_case_sensitive() {
        let err = parse_inbound(r#"{"event":"Increment","id":"x"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEvent("Increment".into()));
    }

    #[test]
    fn counter_updated_envelope() {
        let counter = Counter {
            all_time_high: 6,
            count: 6,
            player_count: 2,
            ..Counter::new(CounterId::from_raw("c1"))
        };
        let msg = ServerMessage::CounterUpdated {
            counter_id: counter.id.clone(),
            data: CounterUpdate::project(Mutation::Increment, &counter),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "counterUpdated",
                "counterId": "c1",
                "data": {"count": 6, "allTimeHigh": 6, "playerCount": 2}
            })
        );
    }

    #[test]
    fn snapshot_envelope_carries_full_record() {
        let counter = Counter::new(CounterId::from_raw("c2"));
        let msg = ServerMessage::CounterSnapshot {
            counter_id: counter.id.clone(),
            data: counter,
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["event"], "counterSnapshot");
        assert_eq!(v["data"]["id"], "c2");
        assert_eq!(v["data"]["resetCount"], 0);
        assert_eq!(v["data"]["regretCount"], 0);
    }

    #[test]
    fn error_envelope() {
        let v = serde_json::to_value(ServerMessage::not_found(&CounterId::from_raw("gone"))).unwrap();
        assert_eq!(
            v,
            json!({"event": "error", "data": {"code": "COUNTER_NOT_FOUND", "message": "counter not found: gone"}})
        );
        assert!(v.get("counterId").is_none());
    }
}
