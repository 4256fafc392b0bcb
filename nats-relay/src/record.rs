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

//! Typed log record model handed to the relay by the upstream pipeline.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub const FIELD_ID: &str = "_id";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_FULL_MESSAGE: &str = "full_message";
pub const FIELD_SOURCE: &str = "source";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_LEVEL: &str = "level";

/// Arbitrary-precision decimal kept as its validated JSON number literal.
///
/// ```
/// use nats_relay::Decimal;
///
/// let big: Decimal = "42424242424242424242".parse().unwrap();
/// assert_eq!(big.as_str(), "42424242424242424242");
/// assert!("4.2.4".parse::<Decimal>().is_err());
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Decimal(String);

impl Decimal {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Nearest `f64`, used for numeric coercion only; serialization keeps the literal.
    pub fn to_f64(&self) -> f64 {
        self.0.parse::<f64>().unwrap_or(f64::NAN)
    }

    /// Integer part, truncated toward zero, reduced to its low 32 bits in two's complement.
    pub fn to_i32_wrapping(&self) -> i32 {
        let (negative, unsigned) = match self.0.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, self.0.as_str()),
        };
        let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
            Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().unwrap_or(0)),
            None => (unsigned, 0),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        // Past 32 appended zeros the low 32 bits are all zero.
        let available = integer.len() + fraction.len() + 32;
        let kept = usize::try_from((integer.len() as i64).saturating_add(exponent))
            .unwrap_or(0)
            .min(available);
        let magnitude = integer
            .bytes()
            .chain(fraction.bytes())
            .chain(std::iter::repeat(b'0'))
            .take(kept)
            .fold(0u32, |acc, digit| acc.wrapping_mul(10).wrapping_add(u32::from(digit - b'0')));

        let bits = if negative {
            magnitude.wrapping_neg()
        } else {
            magnitude
        };
        bits as i32
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected decimal literal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidDecimal(pub String);

impl Display for InvalidDecimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal literal: {:?}", self.0)
    }
}

impl Error for InvalidDecimal {}

impl FromStr for Decimal {
    type Err = InvalidDecimal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim();
        match serde_json::from_str::<serde_json::Number>(literal) {
            Ok(_) => Ok(Decimal(literal.to_string())),
            Err(_) => Err(InvalidDecimal(s.to_string())),
        }
    }
}

macro_rules! decimal_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Decimal {
                fn from(value: $t) -> Self {
                    Decimal(value.to_string())
                }
            }
        )*
    };
}

decimal_from_integer!(i64, u64, i128, u128);

/// Closed set of value types a record field can carry.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    Null,
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Long(_) => "long",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Null => "null",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// Field bag with unique names, iterated in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field. A replaced field keeps its original position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

///
/// [`LogRecord`] is a log message with a handful of well-known fields and an open set of
/// additional ones.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use nats_relay::{FieldValue, LogRecord};
///
/// let mut record = LogRecord::new("disk full", "db-01", Utc::now());
/// record.add_field("facility", "storage");
/// record.add_field("level", 3);
///
/// assert_eq!(record.message(), Some("disk full"));
/// assert_eq!(record.source(), Some("db-01"));
/// assert!(record.id().is_some());
/// assert_eq!(record.field("level"), Some(&FieldValue::Int(3)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    fields: Fields,
}

impl LogRecord {
    /// Creates a record with a fresh `_id`, the message, the source host and the timestamp.
    pub fn new(
        message: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut fields = Fields::new();
        fields.insert(FIELD_ID, Uuid::new_v4().hyphenated().to_string());
        fields.insert(FIELD_MESSAGE, message.into());
        fields.insert(FIELD_SOURCE, source.into());
        fields.insert(FIELD_TIMESTAMP, timestamp);
        Self { fields }
    }

    /// Creates a record from an already assembled field bag, keeping its order.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn add_field(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> &mut Self {
        self.fields.insert(key, value);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn id(&self) -> Option<&str> {
        self.field(FIELD_ID).and_then(FieldValue::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.field(FIELD_MESSAGE).and_then(FieldValue::as_str)
    }

    pub fn full_message(&self) -> Option<&str> {
        self.field(FIELD_FULL_MESSAGE).and_then(FieldValue::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.field(FIELD_SOURCE).and_then(FieldValue::as_str)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.field(FIELD_TIMESTAMP) {
            Some(FieldValue::Timestamp(timestamp)) => Some(*timestamp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Decimal, FieldValue, Fields, LogRecord, FIELD_ID, FIELD_TIMESTAMP};
    use chrono::{TimeZone, Utc};

    #[test]
    fn insert_replaces_in_place() {
        let mut fields: Fields = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();

        assert_eq!(fields.insert("b", "two"), Some(FieldValue::Int(2)));

        let keys: Vec<&str> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(fields.get("b"), Some(&FieldValue::from("two")));
    }

    #[test]
    fn remove_keeps_order_of_remaining_fields() {
        let mut fields: Fields = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();

        assert_eq!(fields.remove("a"), Some(FieldValue::Int(1)));
        assert_eq!(fields.remove("a"), None);

        let keys: Vec<&str> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn new_record_carries_well_known_fields() {
        let timestamp = Utc.with_ymd_and_hms(2016, 9, 5, 11, 0, 0).unwrap();
        let record = LogRecord::new("TEST", "integration.test", timestamp);

        assert_eq!(record.message(), Some("TEST"));
        assert_eq!(record.source(), Some("integration.test"));
        assert_eq!(record.timestamp(), Some(timestamp));
        assert_eq!(record.id().map(str::len), Some(36));
        assert_eq!(record.full_message(), None);

        let keys: Vec<&str> = record.fields().iter().map(|(key, _)| key).collect();
        assert_eq!(keys.first(), Some(&FIELD_ID));
        assert_eq!(keys.last(), Some(&FIELD_TIMESTAMP));
    }

    #[test]
    fn timestamp_accessor_ignores_untyped_values() {
        let record = LogRecord::from_fields([("timestamp", "2016-09-05T11:00:00Z")]);

        assert_eq!(record.timestamp(), None);
    }

    #[test]
    fn decimal_accepts_json_number_literals_only() {
        assert!("42424242424242424242".parse::<Decimal>().is_ok());
        assert!("-0.000123".parse::<Decimal>().is_ok());
        assert!("1E+3".parse::<Decimal>().is_ok());
        assert_eq!(" 12.5 ".parse::<Decimal>().unwrap().as_str(), "12.5");

        assert!("".parse::<Decimal>().is_err());
        assert!("12,5".parse::<Decimal>().is_err());
        assert!("NaN".parse::<Decimal>().is_err());
        assert!("0x10".parse::<Decimal>().is_err());
    }

    #[test]
    fn decimal_from_wide_integers() {
        let decimal = Decimal::from(42424242424242424242u128);

        assert_eq!(decimal.as_str(), "42424242424242424242");
        assert_eq!(decimal.to_f64(), 42424242424242424242f64);
    }

    #[test]
    fn decimal_narrows_to_the_low_bits_of_its_integer_part() {
        let cases = [
            ("42.9", 42),
            ("-42.9", -42),
            ("-0.5", 0),
            ("0", 0),
            ("2147483647", i32::MAX),
            ("2147483648", i32::MIN),
            ("4294967301", 5),
            ("-4294967301", -5),
            ("42424242424242424242", 42424242424242424242u128 as u32 as i32),
            ("1.5E3", 1500),
            ("12e-1", 1),
            ("125e-3", 0),
            ("1e40", 0),
            ("3e+2", 300),
        ];

        for (literal, expected) in cases {
            let decimal: Decimal = literal.parse().unwrap();
            assert_eq!(decimal.to_i32_wrapping(), expected, "{literal}");
        }
    }
}
