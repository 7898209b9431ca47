// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event payloads and their wire serialization.
//!
//! JSON events are objects with a required `event` member and optional
//! `time`, `host`, `index`, `sourcetype` and `source` metadata. Raw events are
//! opaque lines of text.

use crate::config::InputType;
use crate::errors::HecError;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Something the caller wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    /// Converts any serializable value into a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HecError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(line: String) -> Self {
        Self::Raw(line)
    }
}

impl From<&str> for Payload {
    fn from(line: &str) -> Self {
        Self::Raw(line.to_string())
    }
}

impl TryFrom<&HecEvent> for Payload {
    type Error = HecError;

    fn try_from(event: &HecEvent) -> Result<Self, Self::Error> {
        Self::json(event)
    }
}

/// Typed form of a JSON collector event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HecEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub event: Value,
}

impl HecEvent {
    #[must_use]
    pub fn new(event: impl Into<Value>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }
}

/// Turns payloads into the strings that go into a batch.
#[derive(Debug, Clone)]
pub struct EventSerializer {
    input_type: InputType,
    host: String,
    pop_null_fields: bool,
}

impl EventSerializer {
    #[must_use]
    pub fn new(input_type: InputType, host: String, pop_null_fields: bool) -> Self {
        Self {
            input_type,
            host,
            pop_null_fields,
        }
    }

    /// Serializes one event.
    ///
    /// In JSON mode a missing `time` is filled from `event_time`, or from the
    /// clock when no time was given, and a missing `host` from the configured
    /// host. An existing `time` member always wins. Raw text submitted to a
    /// JSON collector is wrapped as `{"event": text}`.
    ///
    /// In raw mode the payload is stringified and a trailing newline appended
    /// when absent.
    pub fn serialize(&self, payload: Payload, event_time: Option<f64>) -> Result<String, HecError> {
        match self.input_type {
            InputType::Json => self.serialize_json(payload, event_time),
            InputType::Raw => Ok(serialize_raw(payload)),
        }
    }

    fn serialize_json(&self, payload: Payload, event_time: Option<f64>) -> Result<String, HecError> {
        let mut object = match payload {
            Payload::Json(Value::Object(object)) => object,
            Payload::Json(other) => {
                return Err(HecError::InvalidPayload(format!(
                    "JSON events must be objects, got {}",
                    json_type_name(&other)
                )))
            }
            Payload::Raw(text) => {
                let mut object = Map::new();
                object.insert("event".to_string(), Value::String(text));
                object
            }
        };

        if !object.contains_key("event") {
            return Err(HecError::InvalidPayload(
                "JSON events require an 'event' member".to_string(),
            ));
        }

        if !object.contains_key("time") {
            let time = match event_time {
                Some(time) => time,
                None => now_epoch_secs(),
            };
            object.insert("time".to_string(), epoch_value(time)?);
        }

        if !object.contains_key("host") {
            object.insert("host".to_string(), Value::String(self.host.clone()));
        }

        if self.pop_null_fields {
            if let Some(Value::Object(event)) = object.get_mut("event") {
                event.retain(|_, v| is_truthy(v));
            }
        }

        Ok(serde_json::to_string(&Value::Object(object))?)
    }
}

fn serialize_raw(payload: Payload) -> String {
    let mut line = match payload {
        Payload::Raw(text) => text,
        Payload::Json(Value::String(text)) => text,
        Payload::Json(other) => other.to_string(),
    };
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

/// Current time in epoch seconds with millisecond precision.
#[must_use]
pub fn now_epoch_secs() -> f64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    millis as f64 / 1000.0
}

fn epoch_value(time: f64) -> Result<Value, HecError> {
    let rounded = (time * 1000.0).round() / 1000.0;
    Number::from_f64(rounded)
        .map(Value::Number)
        .ok_or_else(|| HecError::InvalidPayload(format!("Invalid event time {time}")))
}

// Empty strings, zero, false, null and empty collections are all dropped.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
