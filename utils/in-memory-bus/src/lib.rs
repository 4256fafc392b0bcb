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

//! In-process bus for `nats-relay`.
//!
//! Every channel is a tokio broadcast channel; every subscription runs its own dispatch
//! task. Published payloads are recorded so tests can inspect exactly what left a relay,
//! and connect/subscribe/publish/close failures can be injected per bus.

mod connection;

pub use connection::InMemoryConnection;

use async_trait::async_trait;
use nats_relay::{
    BusConnection, BusConnector, BusError, BusErrorCode, ConnectionConfig, ConnectionLeg,
    StreamingConfig, StreamingConnector,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::sync::Notify;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A payload published through one of the bus connections.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishedMessage {
    pub leg: ConnectionLeg,
    pub channel: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ConnectMode {
    Accept,
    Refuse(BusErrorCode),
    Hang,
}

pub(crate) struct BusState {
    capacity: usize,
    pub(crate) channels: Mutex<HashMap<String, Sender<Vec<u8>>>>,
    pub(crate) published: Mutex<Vec<PublishedMessage>>,
    pub(crate) failing_subscribe: Mutex<HashSet<String>>,
    pub(crate) failing_publish: Mutex<HashSet<String>>,
    pub(crate) fail_close: AtomicBool,
    pub(crate) closed_legs: Mutex<Vec<ConnectionLeg>>,
    plain_mode: Mutex<ConnectMode>,
    streaming_mode: Mutex<ConnectMode>,
    connection_configs: Mutex<Vec<ConnectionConfig>>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl BusState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            failing_subscribe: Mutex::new(HashSet::new()),
            failing_publish: Mutex::new(HashSet::new()),
            fail_close: AtomicBool::new(false),
            closed_legs: Mutex::new(Vec::new()),
            plain_mode: Mutex::new(ConnectMode::Accept),
            streaming_mode: Mutex::new(ConnectMode::Accept),
            connection_configs: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    pub(crate) fn subscribe(&self, channel: &str) -> Receiver<Vec<u8>> {
        lock(&self.channels)
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Fans `payload` out to the current subscribers of `channel`, returning their number.
    pub(crate) fn dispatch(&self, channel: &str, payload: Vec<u8>) -> usize {
        let channels = lock(&self.channels);
        let Some(sender) = channels.get(channel) else {
            return 0;
        };
        let receivers = sender.receiver_count();
        if receivers == 0 {
            return 0;
        }

        self.in_flight.fetch_add(receivers, Ordering::AcqRel);
        match sender.send(payload) {
            Ok(delivered) => delivered,
            Err(_) => {
                self.complete(receivers);
                0
            }
        }
    }

    pub(crate) fn complete(&self, count: usize) {
        if count > 0 && self.in_flight.fetch_sub(count, Ordering::AcqRel) == count {
            self.idle.notify_waiters();
        }
    }
}

async fn open_leg(
    state: &Arc<BusState>,
    mode: ConnectMode,
    leg: ConnectionLeg,
    target: String,
) -> Result<Arc<dyn BusConnection>, BusError> {
    match mode {
        ConnectMode::Accept => {
            let connection: Arc<dyn BusConnection> =
                Arc::new(InMemoryConnection::new(state.clone(), leg));
            Ok(connection)
        }
        ConnectMode::Refuse(code) => Err(BusError::fail_with_code(
            code,
            format!("unable to open {leg} connection to {target}"),
        )),
        ConnectMode::Hang => std::future::pending().await,
    }
}

///
/// [`InMemoryBus`] is a process-local message bus. Clones share the same channels.
///
/// # Examples
///
/// ```
/// use in_memory_bus::InMemoryBus;
/// use nats_relay::{ConnectionManager, RelayConfig};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let bus = InMemoryBus::new();
/// let manager = ConnectionManager::new(bus.connector());
/// let config = RelayConfig::default().connection_config().unwrap();
///
/// let connection = manager.open(&config).await.unwrap();
/// connection.publish("graylog", b"{}").await.unwrap();
///
/// assert_eq!(bus.published_on("graylog"), vec![b"{}".to_vec()]);
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<BusState>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus whose channels buffer up to `capacity` payloads per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(BusState::new(capacity.max(1))),
        }
    }

    pub fn connector(&self) -> Arc<InMemoryConnector> {
        Arc::new(InMemoryConnector {
            state: self.state.clone(),
        })
    }

    pub fn streaming_connector(&self) -> Arc<InMemoryStreamingConnector> {
        Arc::new(InMemoryStreamingConnector {
            state: self.state.clone(),
        })
    }

    pub fn refuse_connections(&self, code: BusErrorCode) {
        *lock(&self.state.plain_mode) = ConnectMode::Refuse(code);
    }

    /// Plain connects never complete; the caller's timeout decides.
    pub fn hang_connections(&self) {
        *lock(&self.state.plain_mode) = ConnectMode::Hang;
    }

    pub fn accept_connections(&self) {
        *lock(&self.state.plain_mode) = ConnectMode::Accept;
    }

    pub fn refuse_streaming(&self, code: BusErrorCode) {
        *lock(&self.state.streaming_mode) = ConnectMode::Refuse(code);
    }

    pub fn hang_streaming(&self) {
        *lock(&self.state.streaming_mode) = ConnectMode::Hang;
    }

    pub fn fail_subscribe(&self, channel: &str) {
        lock(&self.state.failing_subscribe).insert(channel.to_string());
    }

    pub fn fail_publish(&self, channel: &str) {
        lock(&self.state.failing_publish).insert(channel.to_string());
    }

    /// Connection closes still take effect but report an error.
    pub fn fail_close(&self) {
        self.state.fail_close.store(true, Ordering::Release);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.state.published).clone()
    }

    pub fn published_on(&self, channel: &str) -> Vec<Vec<u8>> {
        lock(&self.state.published)
            .iter()
            .filter(|message| message.channel == channel)
            .map(|message| message.payload.clone())
            .collect()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        lock(&self.state.channels)
            .get(channel)
            .map(Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Legs in the order they were closed.
    pub fn closed_legs(&self) -> Vec<ConnectionLeg> {
        lock(&self.state.closed_legs).clone()
    }

    /// Every configuration a plain connect was attempted with.
    pub fn connection_configs(&self) -> Vec<ConnectionConfig> {
        lock(&self.state.connection_configs).clone()
    }

    /// Delivers `payload` as if an external producer published it; not recorded.
    pub fn inject(&self, channel: &str, payload: &[u8]) -> usize {
        self.state.dispatch(channel, payload.to_vec())
    }

    /// Waits until every dispatched payload has been handed to its subscriber.
    pub async fn flush(&self) {
        loop {
            let idle = self.state.idle.notified();
            if self.state.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Opens plain in-memory connections.
pub struct InMemoryConnector {
    state: Arc<BusState>,
}

#[async_trait]
impl BusConnector for InMemoryConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BusConnection>, BusError> {
        lock(&self.state.connection_configs).push(config.clone());
        if config.servers.is_empty() {
            return Err(BusError::fail_with_code(
                BusErrorCode::InvalidArgument,
                "no servers configured",
            ));
        }

        let mode = *lock(&self.state.plain_mode);
        open_leg(&self.state, mode, ConnectionLeg::Nats, config.servers.join(",")).await
    }
}

/// Opens in-memory streaming sessions.
pub struct InMemoryStreamingConnector {
    state: Arc<BusState>,
}

#[async_trait]
impl StreamingConnector for InMemoryStreamingConnector {
    async fn connect(
        &self,
        config: &StreamingConfig,
        _connection: Arc<dyn BusConnection>,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        if config.cluster_id.is_empty() || config.client_id.is_empty() {
            return Err(BusError::fail_with_code(
                BusErrorCode::InvalidArgument,
                "cluster id and client id are required",
            ));
        }

        let mode = *lock(&self.state.streaming_mode);
        let target = format!("{}/{}", config.cluster_id, config.client_id);
        open_leg(&self.state, mode, ConnectionLeg::Streaming, target).await
    }
}
