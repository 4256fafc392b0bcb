/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! GELF 1.1 encoding of [`LogRecord`]s.
//!
//! Every relay variant goes through [`GelfEncoder::encode`]; there is exactly one place that
//! knows the field emission order, the type-directed value rules and the collision policy.

use crate::observability::events;
use crate::record::{
    FieldValue, LogRecord, FIELD_FULL_MESSAGE, FIELD_LEVEL, FIELD_MESSAGE, FIELD_SOURCE,
    FIELD_TIMESTAMP,
};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::error::Error;
use std::fmt::{self, Display, Formatter, UpperExp};
use tracing::{debug, trace};

pub const GELF_VERSION: &str = "1.1";
pub const FORWARDER_CLUSTER_ID: &str = "_forwarder_cluster_id";
pub const FORWARDER_NODE_ID: &str = "_forwarder_node_id";

const KEY_VERSION: &str = "version";
const KEY_HOST: &str = "host";
const KEY_SHORT_MESSAGE: &str = "short_message";
const KEY_FULL_MESSAGE: &str = "full_message";
const KEY_TIMESTAMP: &str = "timestamp";
const KEY_LEVEL: &str = "level";

const COMPONENT: &str = "gelf_encoder";
const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Which record key the `level` value is read from.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    /// Re-reads the already consumed `timestamp` key, so `level` is never emitted by the
    /// level step and a record's `level` field is passed through as a custom field.
    /// Byte-compatible with existing GELF NATS outputs.
    #[default]
    TimestampKey,
    /// Consumes the dedicated `level` key and coerces it to an integer. Integers and
    /// decimals keep the low 32 bits of their integer part; floats saturate.
    LevelKey,
}

impl LevelSource {
    fn key(self) -> &'static str {
        match self {
            LevelSource::TimestampKey => FIELD_TIMESTAMP,
            LevelSource::LevelKey => FIELD_LEVEL,
        }
    }
}

/// Identity of the relaying node, appended to every encoded record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForwarderContext {
    pub cluster_id: String,
    pub node_id: String,
}

impl ForwarderContext {
    pub fn new(cluster_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            node_id: node_id.into(),
        }
    }
}

/// Encoding failures. The record is not published when any of these occur.
#[derive(Debug)]
pub enum EncodeError {
    MissingField(&'static str),
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    Serialization(serde_json::Error),
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MissingField(field) => {
                write!(f, "record has no `{field}` field")
            }
            EncodeError::InvalidFieldType {
                field,
                expected,
                found,
            } => write!(
                f,
                "record field `{field}` must be a {expected} but is a {found}"
            ),
            EncodeError::Serialization(err) => write!(f, "unable to serialize GELF message: {err}"),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EncodeError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Serialization(err)
    }
}

/// One JSON value in the flat GELF object.
enum GelfValue<'a> {
    Str(&'a str),
    Bool(bool),
    Integer(i64),
    Literal(Box<RawValue>),
    Null,
}

impl Serialize for GelfValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GelfValue::Str(value) => serializer.serialize_str(value),
            GelfValue::Bool(value) => serializer.serialize_bool(*value),
            GelfValue::Integer(value) => serializer.serialize_i64(*value),
            GelfValue::Literal(value) => value.serialize(serializer),
            GelfValue::Null => serializer.serialize_unit(),
        }
    }
}

///
/// [`GelfEncoder`] turns a [`LogRecord`] into one compact GELF 1.1 JSON object.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use nats_relay::{ForwarderContext, GelfEncoder, LogRecord};
///
/// let record = LogRecord::from_fields([
///     ("message", "TEST".into()),
///     ("source", "example.org".into()),
///     ("timestamp", Utc.with_ymd_and_hms(2016, 9, 5, 11, 0, 0).unwrap().into()),
///     ("facility", nats_relay::FieldValue::from("demo")),
/// ]);
/// let context = ForwarderContext::new("cluster-a", "node-1");
///
/// let bytes = GelfEncoder::default().encode(&record, &context).unwrap();
/// assert_eq!(
///     String::from_utf8(bytes).unwrap(),
///     r#"{"version":"1.1","host":"example.org","short_message":"TEST","timestamp":1.4730732E9,"facility":"demo","_forwarder_cluster_id":"cluster-a","_forwarder_node_id":"node-1"}"#
/// );
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct GelfEncoder {
    level_source: LevelSource,
}

impl GelfEncoder {
    pub fn new(level_source: LevelSource) -> Self {
        Self { level_source }
    }

    pub fn level_source(&self) -> LevelSource {
        self.level_source
    }

    /// Encodes `record`, substituting the current UTC time for a missing timestamp.
    pub fn encode(
        &self,
        record: &LogRecord,
        context: &ForwarderContext,
    ) -> Result<Vec<u8>, EncodeError> {
        self.encode_at(record, context, Utc::now())
    }

    /// Encodes `record`, substituting `now` for a missing timestamp.
    pub fn encode_at(
        &self,
        record: &LogRecord,
        context: &ForwarderContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut fields = record.fields().clone();
        let mut emitted: Vec<&'static str> = Vec::with_capacity(8);

        let host = take_string(fields.remove(FIELD_SOURCE), FIELD_SOURCE)?
            .ok_or(EncodeError::MissingField(FIELD_SOURCE))?;
        let short_message = take_string(fields.remove(FIELD_MESSAGE), FIELD_MESSAGE)?
            .ok_or(EncodeError::MissingField(FIELD_MESSAGE))?;
        let full_message = take_string(fields.remove(FIELD_FULL_MESSAGE), FIELD_FULL_MESSAGE)?;

        let timestamp = match fields.remove(FIELD_TIMESTAMP) {
            Some(FieldValue::Timestamp(timestamp)) => timestamp,
            _ => now,
        };
        let level = fields
            .remove(self.level_source.key())
            .and_then(extract_level);

        let mut buffer = Vec::with_capacity(INITIAL_BUFFER_CAPACITY);
        {
            let mut serializer = serde_json::Serializer::new(&mut buffer);
            let mut object = serializer.serialize_map(None)?;

            object.serialize_entry(KEY_VERSION, &GelfValue::Str(GELF_VERSION))?;
            emitted.push(KEY_VERSION);
            object.serialize_entry(KEY_HOST, &GelfValue::Str(&host))?;
            emitted.push(KEY_HOST);
            object.serialize_entry(KEY_SHORT_MESSAGE, &GelfValue::Str(&short_message))?;
            emitted.push(KEY_SHORT_MESSAGE);

            if let Some(full_message) = full_message.as_deref() {
                object.serialize_entry(KEY_FULL_MESSAGE, &GelfValue::Str(full_message))?;
                emitted.push(KEY_FULL_MESSAGE);
            }

            object.serialize_entry(KEY_TIMESTAMP, &epoch_seconds(timestamp)?)?;
            emitted.push(KEY_TIMESTAMP);

            if let Some(level) = level {
                object.serialize_entry(KEY_LEVEL, &GelfValue::Integer(i64::from(level)))?;
                emitted.push(KEY_LEVEL);
            }

            for (key, value) in fields.iter() {
                let reserved = emitted.iter().any(|emitted_key| *emitted_key == key);
                if reserved || key == FORWARDER_CLUSTER_ID || key == FORWARDER_NODE_ID {
                    debug!(
                        event = events::ENCODER_FIELD_COLLISION,
                        component = COMPONENT,
                        field = key,
                        "skipping custom field that collides with a reserved GELF key"
                    );
                    continue;
                }

                let Some(value) = custom_value(value)? else {
                    trace!(
                        event = events::ENCODER_FIELD_UNSUPPORTED,
                        component = COMPONENT,
                        field = key,
                        value_type = value.type_name(),
                        "skipping custom field of unsupported type"
                    );
                    continue;
                };
                object.serialize_entry(key, &value)?;
            }

            object.serialize_entry(FORWARDER_CLUSTER_ID, &GelfValue::Str(&context.cluster_id))?;
            object.serialize_entry(FORWARDER_NODE_ID, &GelfValue::Str(&context.node_id))?;
            object.end()?;
        }

        Ok(buffer)
    }
}

fn take_string(
    value: Option<FieldValue>,
    field: &'static str,
) -> Result<Option<String>, EncodeError> {
    match value {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::String(value)) => Ok(Some(value)),
        Some(other) => Err(EncodeError::InvalidFieldType {
            field,
            expected: "string",
            found: other.type_name(),
        }),
    }
}

/// Integer severity for `level`, narrowing numbers the way JVM-based GELF producers do.
fn extract_level(raw: FieldValue) -> Option<i32> {
    match raw {
        FieldValue::Int(value) => Some(value),
        FieldValue::Long(value) => Some(value as i32),
        FieldValue::Float(value) => Some(value as i32),
        FieldValue::Double(value) => Some(value as i32),
        FieldValue::Decimal(value) => Some(value.to_i32_wrapping()),
        FieldValue::String(value) => match value.parse::<i32>() {
            Ok(level) => Some(level),
            Err(err) => {
                debug!(
                    event = events::ENCODER_LEVEL_INVALID,
                    component = COMPONENT,
                    level = value.as_str(),
                    err = %err,
                    "invalid message level"
                );
                None
            }
        },
        other => {
            debug!(
                event = events::ENCODER_LEVEL_INVALID,
                component = COMPONENT,
                value_type = other.type_name(),
                "invalid message level"
            );
            None
        }
    }
}

fn custom_value(value: &FieldValue) -> Result<Option<GelfValue<'_>>, EncodeError> {
    let value = match value {
        FieldValue::String(value) => GelfValue::Str(value),
        FieldValue::Bool(value) => GelfValue::Bool(*value),
        FieldValue::Int(value) => GelfValue::Integer(i64::from(*value)),
        FieldValue::Long(value) => GelfValue::Integer(*value),
        FieldValue::Float(value) => float_value(*value, f64::from(value.abs()))?,
        FieldValue::Double(value) => float_value(*value, value.abs())?,
        FieldValue::Decimal(value) => {
            GelfValue::Literal(RawValue::from_string(value.as_str().to_string())?)
        }
        FieldValue::Null => GelfValue::Null,
        FieldValue::Timestamp(_) => return Ok(None),
    };
    Ok(Some(value))
}

fn epoch_seconds(timestamp: DateTime<Utc>) -> Result<GelfValue<'static>, EncodeError> {
    let seconds = timestamp.timestamp_millis() as f64 / 1000.0;
    float_value(seconds, seconds.abs())
}

fn float_value<T>(value: T, magnitude: f64) -> Result<GelfValue<'static>, EncodeError>
where
    T: Display + UpperExp,
{
    if !magnitude.is_finite() {
        return Ok(GelfValue::Null);
    }
    Ok(GelfValue::Literal(RawValue::from_string(canonical_float(
        value, magnitude,
    ))?))
}

/// Shortest round-trip digits, always with a fraction, and `E` notation outside `[1e-3, 1e7)`.
fn canonical_float<T>(value: T, magnitude: f64) -> String
where
    T: Display + UpperExp,
{
    if magnitude >= 1e7 || (magnitude != 0.0 && magnitude < 1e-3) {
        let rendered = format!("{value:E}");
        match rendered.split_once('E') {
            Some((mantissa, exponent)) if !mantissa.contains('.') => {
                format!("{mantissa}.0E{exponent}")
            }
            _ => rendered,
        }
    } else {
        let rendered = value.to_string();
        if rendered.contains('.') {
            rendered
        } else {
            format!("{rendered}.0")
        }
    }
}
