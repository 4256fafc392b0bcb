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

//! Outbound side: GELF-encoded log records published to bus channels.

use crate::bus::{BusError, BusErrorCode};
use crate::channel_set::ChannelSet;
use crate::config::{ConfigurationError, RelayConfig, RelayRole};
use crate::connection::{Connection, ConnectionError, ConnectionManager};
use crate::encoder::{EncodeError, ForwarderContext, GelfEncoder};
use crate::observability::{events, fields};
use crate::record::LogRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "outbound_relay";

/// Failures of [`OutboundRelay::write`] and [`OutboundRelay::write_batch`].
#[derive(Debug)]
pub enum WriteError {
    Encode(EncodeError),
    Publish { channel: String, cause: BusError },
    NotRunning,
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Encode(err) => write!(f, "unable to encode record: {err}"),
            WriteError::Publish { channel, cause } => {
                write!(f, "unable to publish to channel {channel}: {cause}")
            }
            WriteError::NotRunning => write!(f, "outbound relay is not running"),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WriteError::Encode(err) => Some(err),
            WriteError::Publish { cause, .. } => Some(cause),
            WriteError::NotRunning => None,
        }
    }
}

/// Failures of [`OutboundRelay::start`].
#[derive(Debug)]
pub enum StartError {
    Configuration(ConfigurationError),
    Connection(ConnectionError),
}

impl Display for StartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Configuration(err) => write!(f, "invalid outbound configuration: {err}"),
            StartError::Connection(err) => write!(f, "unable to connect: {err}"),
        }
    }
}

impl Error for StartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StartError::Configuration(err) => Some(err),
            StartError::Connection(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for StartError {
    fn from(err: ConfigurationError) -> Self {
        StartError::Configuration(err)
    }
}

///
/// [`OutboundRelay`] encodes each record once and publishes the bytes to every channel.
///
/// Plain and streaming connections share this type; the connection decides which leg
/// carries the traffic.
pub struct OutboundRelay {
    connection: Connection,
    channels: ChannelSet,
    encoder: GelfEncoder,
    context: ForwarderContext,
}

impl OutboundRelay {
    /// Opens a connection for `config` and returns a running relay.
    pub async fn start(
        config: &RelayConfig,
        manager: &ConnectionManager,
        context: ForwarderContext,
    ) -> Result<Self, StartError> {
        let channels = config.channel_set(RelayRole::Outbound)?;
        let connection_config = config.connection_config()?;

        let connection = match manager.open(&connection_config).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(
                    event = events::OUTBOUND_START_FAILED,
                    component = COMPONENT,
                    connection_name = %connection_config.connection_name,
                    err = %err,
                    "unable to start outbound relay"
                );
                return Err(StartError::Connection(err));
            }
        };

        info!(
            event = events::OUTBOUND_START_OK,
            component = COMPONENT,
            connection_name = connection.name(),
            channels = %fields::format_channels(&channels),
            streaming = connection.is_streaming(),
            "outbound relay running"
        );
        Ok(Self::new(
            connection,
            channels,
            GelfEncoder::new(config.level_source),
            context,
        ))
    }

    pub fn new(
        connection: Connection,
        channels: ChannelSet,
        encoder: GelfEncoder,
        context: ForwarderContext,
    ) -> Self {
        Self {
            connection,
            channels,
            encoder,
            context,
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn encoder(&self) -> &GelfEncoder {
        &self.encoder
    }

    pub fn is_running(&self) -> bool {
        self.connection.is_open()
    }

    pub fn is_streaming(&self) -> bool {
        self.connection.is_streaming()
    }

    /// Encodes `record` and publishes it to every channel in set order. The first failing
    /// channel ends the write; earlier channels keep the message.
    pub async fn write(&self, record: &LogRecord) -> Result<(), WriteError> {
        if !self.connection.is_open() {
            debug!(
                event = events::OUTBOUND_WRITE_REJECTED,
                component = COMPONENT,
                connection_name = self.connection.name(),
                reason = fields::REASON_NOT_RUNNING,
                "refusing write on stopped relay"
            );
            return Err(WriteError::NotRunning);
        }

        let msg_id = record.id().unwrap_or(fields::NONE);
        let payload = self.encoder.encode(record, &self.context).map_err(|err| {
            warn!(
                event = events::OUTBOUND_ENCODE_FAILED,
                component = COMPONENT,
                connection_name = self.connection.name(),
                msg_id,
                err = %err,
                "unable to encode record"
            );
            WriteError::Encode(err)
        })?;

        for channel in self.channels.iter() {
            if let Err(cause) = self.connection.publish(channel, &payload).await {
                if cause.code() == BusErrorCode::Closed && !self.connection.is_open() {
                    return Err(WriteError::NotRunning);
                }
                warn!(
                    event = events::OUTBOUND_PUBLISH_FAILED,
                    component = COMPONENT,
                    connection_name = self.connection.name(),
                    channel,
                    msg_id,
                    err = %cause,
                    "unable to publish record"
                );
                return Err(WriteError::Publish {
                    channel: channel.to_string(),
                    cause,
                });
            }

            if tracing::enabled!(Level::TRACE) {
                tracing::trace!(
                    event = events::OUTBOUND_PUBLISH_OK,
                    component = COMPONENT,
                    connection_name = self.connection.name(),
                    channel,
                    msg_id,
                    payload_len = payload.len(),
                    "published record"
                );
            }
        }
        Ok(())
    }

    /// Writes `records` in order, stopping at the first failure.
    pub async fn write_batch(&self, records: &[LogRecord]) -> Result<(), WriteError> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Closes the connection, streaming leg first. Repeated calls are no-ops.
    pub async fn stop(&self) {
        if self.connection.close().await {
            info!(
                event = events::OUTBOUND_STOP,
                component = COMPONENT,
                connection_name = self.connection.name(),
                "outbound relay stopped"
            );
        }
    }
}
