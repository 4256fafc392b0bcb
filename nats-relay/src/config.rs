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

//! Relay configuration as read from a JSON5 document, and the connection snapshot built
//! from it.

use crate::channel_set::{parse_server_uris, ChannelSet, SeparatorPolicy, DEFAULT_SERVER_URI};
use crate::encoder::LevelSource;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OUTBOUND_CHANNEL: &str = "graylog";
pub const DEFAULT_CONNECTION_NAME: &str = "graylog";
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_RECONNECT: u32 = 60;
pub const DEFAULT_MAX_PINGS_OUT: u32 = 2;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 120_000;
pub const DEFAULT_DISCOVER_PREFIX: &str = "_STAN.discover";
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_PUB_ACKS_IN_FLIGHT: u32 = 16_384;

/// Failures while loading or validating relay configuration.
#[derive(Debug)]
pub enum ConfigurationError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(json5::Error),
    MissingValue(&'static str),
    InvalidValue { key: &'static str, reason: String },
    EmptyChannelSet,
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::Io { path, source } => {
                write!(f, "unable to read config file {}: {source}", path.display())
            }
            ConfigurationError::Parse(err) => write!(f, "unable to parse config: {err}"),
            ConfigurationError::MissingValue(key) => write!(f, "`{key}` is required"),
            ConfigurationError::InvalidValue { key, reason } => {
                write!(f, "invalid value for `{key}`: {reason}")
            }
            ConfigurationError::EmptyChannelSet => {
                write!(f, "no channels configured after parsing `channels`")
            }
        }
    }
}

impl Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigurationError::Io { source, .. } => Some(source),
            ConfigurationError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Which side of the bus a relay serves; decides the `channels` default.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayRole {
    Inbound,
    Outbound,
}

///
/// [`RelayConfig`] holds the recognised relay settings. Unknown keys are rejected.
///
/// # Examples
///
/// ```
/// use nats_relay::{RelayConfig, RelayRole};
///
/// let config = RelayConfig::from_json5_str(r#"{
///     server_uris: "nats://a:4222\nnats://b:4222",
///     channels: "logs\naudit",
///     connection_timeout: 500,
/// }"#).unwrap();
///
/// let connection = config.connection_config().unwrap();
/// assert_eq!(connection.servers, vec!["nats://a:4222", "nats://b:4222"]);
/// assert_eq!(connection.connection_timeout.as_millis(), 500);
///
/// let channels = config.channel_set(RelayRole::Inbound).unwrap();
/// assert_eq!(channels.iter().collect::<Vec<_>>(), vec!["audit", "logs"]);
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    #[serde(default = "default_server_uris")]
    pub server_uris: String,
    #[serde(default)]
    pub channels: Option<String>,
    #[serde(default)]
    pub channel_separator: SeparatorPolicy,
    #[serde(default = "default_connection_name")]
    pub connection_name: String,
    #[serde(default = "default_connection_timeout", deserialize_with = "whole_number")]
    pub connection_timeout: u64,
    #[serde(default = "default_max_reconnect", deserialize_with = "whole_number")]
    pub max_reconnect: u32,
    #[serde(default = "default_max_pings_out", deserialize_with = "whole_number")]
    pub max_pings_out: u32,
    #[serde(default = "default_ping_interval", deserialize_with = "whole_number")]
    pub ping_interval: u64,
    #[serde(default)]
    pub no_randomize: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub pedantic: bool,
    #[serde(default)]
    pub level_source: LevelSource,
    #[serde(default)]
    pub streaming: Option<StreamingSettings>,
}

/// Streaming session settings; present only for the streaming relay variants.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StreamingSettings {
    pub cluster_id: String,
    pub client_id: String,
    #[serde(default = "default_discover_prefix")]
    pub discover_prefix: String,
    #[serde(default = "default_ack_timeout", deserialize_with = "whole_number")]
    pub ack_timeout: u64,
    #[serde(default = "default_max_pub_acks_in_flight", deserialize_with = "whole_number")]
    pub max_pub_acks_in_flight: u32,
}

impl StreamingSettings {
    pub fn new(cluster_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            client_id: client_id.into(),
            discover_prefix: default_discover_prefix(),
            ack_timeout: default_ack_timeout(),
            max_pub_acks_in_flight: default_max_pub_acks_in_flight(),
        }
    }
}

/// Reads a non-negative whole number into `T`. Negative, fractional and out-of-range
/// values are parse errors instead of being cast.
fn whole_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    struct WholeNumber;

    impl Visitor<'_> for WholeNumber {
        type Value = u64;

        fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a non-negative whole number")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<u64, E> {
            if value.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&value) {
                Ok(value as u64)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(value), &self))
            }
        }
    }

    let value = deserializer.deserialize_any(WholeNumber)?;
    let unexpected = de::Unexpected::Unsigned(value);
    T::try_from(value).map_err(|_| de::Error::invalid_value(unexpected, &"a value in range"))
}

fn default_server_uris() -> String {
    DEFAULT_SERVER_URI.to_string()
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION_NAME.to_string()
}

fn default_connection_timeout() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_max_reconnect() -> u32 {
    DEFAULT_MAX_RECONNECT
}

fn default_max_pings_out() -> u32 {
    DEFAULT_MAX_PINGS_OUT
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_discover_prefix() -> String {
    DEFAULT_DISCOVER_PREFIX.to_string()
}

fn default_ack_timeout() -> u64 {
    DEFAULT_ACK_TIMEOUT_MS
}

fn default_max_pub_acks_in_flight() -> u32 {
    DEFAULT_MAX_PUB_ACKS_IN_FLIGHT
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_uris: default_server_uris(),
            channels: None,
            channel_separator: SeparatorPolicy::default(),
            connection_name: default_connection_name(),
            connection_timeout: default_connection_timeout(),
            max_reconnect: default_max_reconnect(),
            max_pings_out: default_max_pings_out(),
            ping_interval: default_ping_interval(),
            no_randomize: false,
            verbose: false,
            pedantic: false,
            level_source: LevelSource::default(),
            streaming: None,
        }
    }
}

impl RelayConfig {
    /// Parses and validates a JSON5 document.
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigurationError> {
        let config: RelayConfig = json5::from_str(contents).map_err(ConfigurationError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5_str(&contents)
    }

    /// Replaces the channel list, keeping every other setting.
    pub fn with_channels(mut self, channels: impl Into<String>) -> Self {
        self.channels = Some(channels.into());
        self
    }

    pub fn with_streaming(mut self, streaming: StreamingSettings) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Checks every value that does not depend on the relay role.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("connection_timeout", self.connection_timeout)?;
        require_positive("max_reconnect", u64::from(self.max_reconnect))?;
        require_positive("max_pings_out", u64::from(self.max_pings_out))?;
        require_positive("ping_interval", self.ping_interval)?;
        require_non_empty("connection_name", &self.connection_name)?;

        if let Some(streaming) = &self.streaming {
            require_non_empty("streaming.cluster_id", &streaming.cluster_id)?;
            require_non_empty("streaming.client_id", &streaming.client_id)?;
            require_non_empty("streaming.discover_prefix", &streaming.discover_prefix)?;
            require_positive("streaming.ack_timeout", streaming.ack_timeout)?;
            require_positive(
                "streaming.max_pub_acks_in_flight",
                u64::from(streaming.max_pub_acks_in_flight),
            )?;
        }
        Ok(())
    }

    /// Resolves the channel set for `role`. Inbound relays must name their channels;
    /// outbound relays fall back to [`DEFAULT_OUTBOUND_CHANNEL`].
    pub fn channel_set(&self, role: RelayRole) -> Result<ChannelSet, ConfigurationError> {
        let raw = match (&self.channels, role) {
            (Some(channels), _) => channels.as_str(),
            (None, RelayRole::Outbound) => DEFAULT_OUTBOUND_CHANNEL,
            (None, RelayRole::Inbound) => return Err(ConfigurationError::MissingValue("channels")),
        };

        let channels = ChannelSet::parse(raw, self.channel_separator);
        if channels.is_empty() {
            return Err(ConfigurationError::EmptyChannelSet);
        }
        Ok(channels)
    }

    /// Builds the immutable connection snapshot handed to the bus connectors.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigurationError> {
        self.validate()?;

        Ok(ConnectionConfig {
            servers: parse_server_uris(&self.server_uris),
            connection_name: self.connection_name.clone(),
            connection_timeout: Duration::from_millis(self.connection_timeout),
            max_reconnect: self.max_reconnect,
            max_pings_out: self.max_pings_out,
            ping_interval: Duration::from_millis(self.ping_interval),
            no_randomize: self.no_randomize,
            pedantic: self.pedantic,
            verbose: self.verbose,
            streaming: self.streaming.as_ref().map(|streaming| StreamingConfig {
                cluster_id: streaming.cluster_id.clone(),
                client_id: streaming.client_id.clone(),
                discover_prefix: streaming.discover_prefix.clone(),
                ack_timeout: Duration::from_millis(streaming.ack_timeout),
                max_pub_acks_in_flight: streaming.max_pub_acks_in_flight,
            }),
        })
    }
}

fn require_positive(key: &'static str, value: u64) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::InvalidValue {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::MissingValue(key));
    }
    Ok(())
}

/// Immutable snapshot of everything needed to open a bus connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionConfig {
    pub servers: Vec<String>,
    pub connection_name: String,
    pub connection_timeout: Duration,
    pub max_reconnect: u32,
    pub max_pings_out: u32,
    pub ping_interval: Duration,
    pub no_randomize: bool,
    /// Strict protocol checking.
    pub pedantic: bool,
    /// Require an acknowledgement from the server for every protocol message.
    pub verbose: bool,
    pub streaming: Option<StreamingConfig>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamingConfig {
    pub cluster_id: String,
    pub client_id: String,
    pub discover_prefix: String,
    pub ack_timeout: Duration,
    pub max_pub_acks_in_flight: u32,
}

#[cfg(test)]
mod tests {
    use super::{ConfigurationError, RelayConfig, RelayRole, StreamingSettings};
    use crate::{LevelSource, SeparatorPolicy};
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RelayConfig::from_json5_str("{}").unwrap();

        assert_eq!(config, RelayConfig::default());

        let connection = config.connection_config().unwrap();
        assert_eq!(connection.servers, vec!["nats://localhost:4222".to_string()]);
        assert_eq!(connection.connection_name, "graylog");
        assert_eq!(connection.connection_timeout, Duration::from_millis(2_000));
        assert_eq!(connection.max_reconnect, 60);
        assert_eq!(connection.max_pings_out, 2);
        assert_eq!(connection.ping_interval, Duration::from_millis(120_000));
        assert!(!connection.no_randomize && !connection.pedantic && !connection.verbose);
        assert!(connection.streaming.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RelayConfig::from_json5_str("{ require_protocol_acks: 5 }").unwrap_err();

        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = RelayConfig::from_json5_str("{ ping_interval: 0 }").unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::InvalidValue {
                key: "ping_interval",
                ..
            }
        ));
    }

    #[test]
    fn negative_values_fail_to_parse() {
        for document in [
            "{ max_reconnect: -1 }",
            "{ connection_timeout: -2000 }",
            "{ streaming: { cluster_id: \"c\", client_id: \"r\", ack_timeout: -1 } }",
        ] {
            let err = RelayConfig::from_json5_str(document).unwrap_err();

            assert!(matches!(err, ConfigurationError::Parse(_)), "{document}");
        }
    }

    #[test]
    fn fractional_values_fail_to_parse() {
        for document in ["{ connection_timeout: 2.7 }", "{ max_pings_out: 0.5 }"] {
            let err = RelayConfig::from_json5_str(document).unwrap_err();

            assert!(matches!(err, ConfigurationError::Parse(_)), "{document}");
        }
    }

    #[test]
    fn out_of_range_values_fail_to_parse() {
        let err = RelayConfig::from_json5_str("{ max_reconnect: 4294967296 }").unwrap_err();

        assert!(matches!(err, ConfigurationError::Parse(_)));

        let config = RelayConfig::from_json5_str("{ max_reconnect: 4294967295 }").unwrap();
        assert_eq!(config.max_reconnect, u32::MAX);
    }

    #[test]
    fn inbound_channels_are_required() {
        let config = RelayConfig::default();

        assert!(matches!(
            config.channel_set(RelayRole::Inbound),
            Err(ConfigurationError::MissingValue("channels"))
        ));
        let outbound = config.channel_set(RelayRole::Outbound).unwrap();
        assert_eq!(outbound.iter().collect::<Vec<_>>(), vec!["graylog"]);
    }

    #[test]
    fn blank_channel_list_is_an_empty_set_error() {
        let config = RelayConfig::default().with_channels(" \n \n");

        assert!(matches!(
            config.channel_set(RelayRole::Outbound),
            Err(ConfigurationError::EmptyChannelSet)
        ));
    }

    #[test]
    fn comma_separator_policy_is_honoured() {
        let config = RelayConfig::from_json5_str(
            r#"{ channels: "a, b,a", channel_separator: "comma", level_source: "level_key" }"#,
        )
        .unwrap();

        assert_eq!(config.channel_separator, SeparatorPolicy::Comma);
        assert_eq!(config.level_source, LevelSource::LevelKey);
        assert_eq!(
            config
                .channel_set(RelayRole::Inbound)
                .unwrap()
                .iter()
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn streaming_section_fills_defaults() {
        let config = RelayConfig::from_json5_str(
            r#"{
                streaming: { cluster_id: "test-cluster", client_id: "relay-1", ack_timeout: 1000 },
            }"#,
        )
        .unwrap();

        let streaming = config.connection_config().unwrap().streaming.unwrap();
        assert_eq!(streaming.cluster_id, "test-cluster");
        assert_eq!(streaming.client_id, "relay-1");
        assert_eq!(streaming.discover_prefix, "_STAN.discover");
        assert_eq!(streaming.ack_timeout, Duration::from_millis(1_000));
        assert_eq!(streaming.max_pub_acks_in_flight, 16_384);
    }

    #[test]
    fn streaming_requires_identifiers() {
        let config = RelayConfig::default().with_streaming(StreamingSettings::new("cluster", " "));

        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingValue("streaming.client_id"))
        ));

        let err = RelayConfig::from_json5_str(r#"{ streaming: { client_id: "x" } }"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RelayConfig::from_file("/nonexistent/relay.json5").unwrap_err();

        assert!(matches!(err, ConfigurationError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/relay.json5"));
    }
}
