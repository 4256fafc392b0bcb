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

//! Bus connection lifecycle: opening the plain and streaming legs, and closing them.

use crate::bus::{
    BusConnection, BusConnector, BusError, BusErrorCode, MessageHandler, StreamingConnector,
    Subscription,
};
use crate::config::ConnectionConfig;
use crate::observability::{events, fields};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "connection_manager";

const STATE_OPEN: u8 = 0;
const STATE_CLOSED: u8 = 1;

/// The two layers a connection can consist of.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionLeg {
    Nats,
    Streaming,
}

impl ConnectionLeg {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionLeg::Nats => fields::LEG_NATS,
            ConnectionLeg::Streaming => fields::LEG_STREAMING,
        }
    }
}

impl Display for ConnectionLeg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures while opening a connection.
#[derive(Debug)]
pub enum ConnectionError {
    Connect { leg: ConnectionLeg, cause: BusError },
    TimedOut { leg: ConnectionLeg, after: Duration },
    StreamingUnavailable,
}

impl ConnectionError {
    pub fn leg(&self) -> ConnectionLeg {
        match self {
            ConnectionError::Connect { leg, .. } | ConnectionError::TimedOut { leg, .. } => *leg,
            ConnectionError::StreamingUnavailable => ConnectionLeg::Streaming,
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Connect { leg, cause } => {
                write!(f, "unable to open {leg} connection: {cause}")
            }
            ConnectionError::TimedOut { leg, after } => {
                write!(f, "{leg} connection not established within {after:?}")
            }
            ConnectionError::StreamingUnavailable => write!(
                f,
                "streaming settings configured but no streaming connector available"
            ),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectionError::Connect { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

///
/// [`ConnectionManager`] opens [`Connection`]s through the plugged-in bus client.
///
/// A streaming leg is opened on top of the plain leg whenever the configuration carries
/// streaming settings. Both steps share the configured connection timeout.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn BusConnector>,
    streaming_connector: Option<Arc<dyn StreamingConnector>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn BusConnector>) -> Self {
        Self {
            connector,
            streaming_connector: None,
        }
    }

    pub fn with_streaming(mut self, streaming_connector: Arc<dyn StreamingConnector>) -> Self {
        self.streaming_connector = Some(streaming_connector);
        self
    }

    pub fn supports_streaming(&self) -> bool {
        self.streaming_connector.is_some()
    }

    pub async fn open(&self, config: &ConnectionConfig) -> Result<Connection, ConnectionError> {
        let servers = fields::format_servers(&config.servers);
        info!(
            event = events::CONNECTION_OPEN_START,
            component = COMPONENT,
            connection_name = %config.connection_name,
            servers = %servers,
            streaming = config.streaming.is_some(),
            "opening bus connection"
        );

        let streaming_connector = match (&config.streaming, &self.streaming_connector) {
            (Some(streaming_config), Some(connector)) => Some((streaming_config, connector)),
            (Some(_), None) => {
                warn!(
                    event = events::CONNECTION_OPEN_FAILED,
                    component = COMPONENT,
                    connection_name = %config.connection_name,
                    leg = fields::LEG_STREAMING,
                    "streaming connection requested without a streaming connector"
                );
                return Err(ConnectionError::StreamingUnavailable);
            }
            (None, _) => None,
        };

        let plain = bounded_connect(
            ConnectionLeg::Nats,
            &config.connection_name,
            config.connection_timeout,
            self.connector.connect(config),
        )
        .await?;

        let streaming = match streaming_connector {
            Some((streaming_config, connector)) => {
                let connecting = connector.connect(streaming_config, plain.clone());
                match bounded_connect(
                    ConnectionLeg::Streaming,
                    &config.connection_name,
                    config.connection_timeout,
                    connecting,
                )
                .await
                {
                    Ok(streaming) => Some(streaming),
                    Err(err) => {
                        if let Err(close_err) = plain.close().await {
                            warn!(
                                event = events::CONNECTION_ROLLBACK_CLOSE_FAILED,
                                component = COMPONENT,
                                connection_name = %config.connection_name,
                                leg = fields::LEG_NATS,
                                err = %close_err,
                                "unable to close plain connection after streaming failure"
                            );
                        }
                        return Err(err);
                    }
                }
            }
            None => None,
        };

        info!(
            event = events::CONNECTION_OPEN_OK,
            component = COMPONENT,
            connection_name = %config.connection_name,
            servers = %servers,
            streaming = streaming.is_some(),
            "bus connection established"
        );
        Ok(Connection::new(config.connection_name.clone(), plain, streaming))
    }
}

async fn bounded_connect<F>(
    leg: ConnectionLeg,
    connection_name: &str,
    limit: Duration,
    connecting: F,
) -> Result<Arc<dyn BusConnection>, ConnectionError>
where
    F: Future<Output = Result<Arc<dyn BusConnection>, BusError>>,
{
    match tokio::time::timeout(limit, connecting).await {
        Ok(Ok(connection)) => Ok(connection),
        Ok(Err(cause)) => {
            warn!(
                event = events::CONNECTION_OPEN_FAILED,
                component = COMPONENT,
                connection_name,
                leg = leg.as_str(),
                err = %cause,
                "unable to open bus connection"
            );
            Err(ConnectionError::Connect { leg, cause })
        }
        Err(_) => {
            warn!(
                event = events::CONNECTION_OPEN_TIMED_OUT,
                component = COMPONENT,
                connection_name,
                leg = leg.as_str(),
                timeout_ms = limit.as_millis() as u64,
                "bus connection attempt timed out"
            );
            Err(ConnectionError::TimedOut { leg, after: limit })
        }
    }
}

struct ConnectionInner {
    name: String,
    plain: Arc<dyn BusConnection>,
    streaming: Option<Arc<dyn BusConnection>>,
    state: AtomicU8,
}

///
/// [`Connection`] is an open bus connection, optionally carrying a streaming leg.
///
/// Publishing and subscribing go through the streaming leg when there is one. Clones
/// share the same underlying legs and the same open/closed state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new(
        name: impl Into<String>,
        plain: Arc<dyn BusConnection>,
        streaming: Option<Arc<dyn BusConnection>>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                name: name.into(),
                plain,
                streaming,
                state: AtomicU8::new(STATE_OPEN),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == STATE_OPEN
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.is_some()
    }

    fn active_leg(&self) -> Result<&Arc<dyn BusConnection>, BusError> {
        if !self.is_open() {
            return Err(BusError::fail_with_code(
                BusErrorCode::Closed,
                format!("connection {} is closed", self.inner.name),
            ));
        }
        Ok(self.inner.streaming.as_ref().unwrap_or(&self.inner.plain))
    }

    pub async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        self.active_leg()?.publish(channel, payload).await
    }

    pub async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, BusError> {
        self.active_leg()?.subscribe(channel, handler).await
    }

    /// Closes the streaming leg, then the plain leg. Close failures are logged only.
    ///
    /// Returns `false` when the connection had already been closed.
    pub async fn close(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                event = events::CONNECTION_CLOSE_SKIPPED,
                component = COMPONENT,
                connection_name = %self.inner.name,
                reason = fields::REASON_ALREADY_CLOSED,
                "connection already closed"
            );
            return false;
        }

        info!(
            event = events::CONNECTION_CLOSE_START,
            component = COMPONENT,
            connection_name = %self.inner.name,
            "closing bus connection"
        );
        if let Some(streaming) = &self.inner.streaming {
            close_leg(&self.inner.name, ConnectionLeg::Streaming, streaming).await;
        }
        close_leg(&self.inner.name, ConnectionLeg::Nats, &self.inner.plain).await;
        true
    }
}

async fn close_leg(
    connection_name: &str,
    leg: ConnectionLeg,
    connection: &Arc<dyn BusConnection>,
) {
    match connection.close().await {
        Ok(()) => debug!(
            event = events::CONNECTION_CLOSE_OK,
            component = COMPONENT,
            connection_name,
            leg = leg.as_str(),
            "connection leg closed"
        ),
        Err(err) => warn!(
            event = events::CONNECTION_CLOSE_FAILED,
            component = COMPONENT,
            connection_name,
            leg = leg.as_str(),
            err = %err,
            "unable to close connection leg"
        ),
    }
}
