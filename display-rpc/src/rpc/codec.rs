use display_constants::protocol::{DEFAULT_ERROR_NAME, ERROR_EVENT, READY_EVENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Outbound call, serialised as `{method}` or `{method, value}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Request {
    pub fn new(method: &str, value: Option<Value>) -> Self {
        Self {
            method: method.to_string(),
            value,
        }
    }

    /// Wire form of the request.
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Payload exactly as the messaging substrate delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Text(String),
    Structured(Value),
}

/// Inbound message: `{event, data}` or `{method, value}`. Every field is
/// optional; an undecodable payload yields the empty envelope.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Remote failure carried by an `error` event.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    pub method: Option<String>,
    pub name: String,
    pub message: String,
}

impl Envelope {
    /// Event name, ignoring empty strings.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref().filter(|name| !name.is_empty())
    }

    /// Reply method name, ignoring empty strings.
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.event_name().is_none() && self.method_name().is_none()
    }

    pub fn is_ready(&self) -> bool {
        self.event_name() == Some(READY_EVENT)
    }

    /// Failure details when this is an `error` event.
    pub fn failure(&self) -> Option<RemoteFailure> {
        if self.event_name() != Some(ERROR_EVENT) {
            return None;
        }

        let data = self.data.as_ref();
        let field = |key: &str| {
            data.and_then(|data| data.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Some(RemoteFailure {
            method: field("method").filter(|method| !method.is_empty()),
            name: field("name").unwrap_or_else(|| DEFAULT_ERROR_NAME.to_string()),
            message: field("message").unwrap_or_default(),
        })
    }

    /// Failure reported against the readiness handshake itself.
    pub fn ready_failure(&self) -> Option<RemoteFailure> {
        self.failure()
            .filter(|failure| failure.method.as_deref() == Some(READY_EVENT))
    }

    /// Event payload, `null` when absent.
    pub fn payload(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }

    /// Reply value, `null` when absent.
    pub fn reply_value(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

/// Decode an inbound payload without ever failing. Text is parsed as JSON;
/// structured values pass through.
pub fn decode(raw: RawMessage) -> Envelope {
    let value = match raw {
        RawMessage::Structured(value) => value,
        RawMessage::Text(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "Could not parse message data");
                return Envelope::default();
            }
        },
    };

    match serde_json::from_value::<Envelope>(value) {
        Ok(envelope) => envelope,
        Err(error) => {
            debug!(%error, "Ignoring message that is not an envelope");
            Envelope::default()
        }
    }
}

/// Build the outbound message for `method`; `value` is omitted when `None`.
pub fn encode(method: &str, value: Option<Value>) -> Result<Value, serde_json::Error> {
    Request::new(method, value).into_value()
}
