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

//! Mock bus legs shared by the unit tests of this crate.

use crate::bus::{
    BusConnection, BusConnector, BusError, BusErrorCode, MessageHandler, StreamingConnector,
    Subscription,
};
use crate::config::{ConnectionConfig, RelayConfig, StreamingConfig};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn connection_config() -> ConnectionConfig {
    let mut config = RelayConfig::default()
        .connection_config()
        .expect("default config is valid");
    config.connection_timeout = Duration::from_millis(200);
    config
}

pub(crate) fn streaming_connection_config() -> ConnectionConfig {
    let mut config = connection_config();
    config.streaming = Some(StreamingConfig {
        cluster_id: "test-cluster".to_string(),
        client_id: "relay-test".to_string(),
        discover_prefix: "_STAN.discover".to_string(),
        ack_timeout: Duration::from_secs(30),
        max_pub_acks_in_flight: 16_384,
    });
    config
}

pub(crate) struct MockConnection {
    name: String,
    log: EventLog,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    handlers: Mutex<Vec<(String, Arc<dyn MessageHandler>)>>,
    failing_channels: Mutex<HashSet<String>>,
    fail_close: AtomicBool,
    close_calls: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Self::with_log(name, Arc::new(Mutex::new(Vec::new())))
    }

    pub(crate) fn with_log(name: &str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log,
            published: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            failing_channels: Mutex::new(HashSet::new()),
            fail_close: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        })
    }

    /// Subscribing to or publishing on `channel` fails from now on.
    pub(crate) fn fail_channel(&self, channel: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel.to_string());
    }

    pub(crate) fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub(crate) fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    pub(crate) fn subscribed_channels(&self) -> Vec<String> {
        self.handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Hands `payload` to every handler subscribed to `channel`.
    pub(crate) async fn deliver(&self, channel: &str, payload: &[u8]) {
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .filter(|(subscribed, _)| subscribed == channel)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler.on_receive(channel, payload.to_vec()).await;
        }
    }

    fn is_failing(&self, channel: &str) -> bool {
        self.failing_channels.lock().unwrap().contains(channel)
    }
}

#[async_trait]
impl BusConnection for MockConnection {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        if self.is_failing(channel) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Rejected,
                format!("publish to {channel} rejected"),
            ));
        }
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, BusError> {
        if self.is_failing(channel) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Rejected,
                format!("subscription to {channel} rejected"),
            ));
        }
        self.handlers
            .lock()
            .unwrap()
            .push((channel.to_string(), handler));
        Ok(Box::new(MockSubscription {
            channel: channel.to_string(),
            log: self.log.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("close:{}", self.name));
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Internal,
                "close failed",
            ));
        }
        Ok(())
    }
}

struct MockSubscription {
    channel: String,
    log: EventLog,
}

#[async_trait]
impl Subscription for MockSubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn close(&self) -> Result<(), BusError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("unsubscribe:{}", self.channel));
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub(crate) enum ConnectBehavior {
    Succeed,
    Fail(BusErrorCode),
    Hang,
    /// Succeeds after the given delay.
    Delay(Duration),
}

pub(crate) struct MockConnector {
    connection: Arc<MockConnection>,
    behavior: ConnectBehavior,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new(connection: Arc<MockConnection>, behavior: ConnectBehavior) -> Arc<Self> {
        Arc::new(Self {
            connection,
            behavior,
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

async fn connect_with(
    behavior: ConnectBehavior,
    connection: &Arc<MockConnection>,
) -> Result<Arc<dyn BusConnection>, BusError> {
    match behavior {
        ConnectBehavior::Succeed => {
            let connection: Arc<dyn BusConnection> = connection.clone();
            Ok(connection)
        }
        ConnectBehavior::Fail(code) => Err(BusError::fail_with_code(code, "connect refused")),
        ConnectBehavior::Hang => std::future::pending().await,
        ConnectBehavior::Delay(delay) => {
            tokio::time::sleep(delay).await;
            let connection: Arc<dyn BusConnection> = connection.clone();
            Ok(connection)
        }
    }
}

#[async_trait]
impl BusConnector for MockConnector {
    async fn connect(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        connect_with(self.behavior, &self.connection).await
    }
}

pub(crate) struct MockStreamingConnector {
    connection: Arc<MockConnection>,
    behavior: ConnectBehavior,
}

impl MockStreamingConnector {
    pub(crate) fn new(connection: Arc<MockConnection>, behavior: ConnectBehavior) -> Arc<Self> {
        Arc::new(Self {
            connection,
            behavior,
        })
    }
}

#[async_trait]
impl StreamingConnector for MockStreamingConnector {
    async fn connect(
        &self,
        _config: &StreamingConfig,
        _connection: Arc<dyn BusConnection>,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        connect_with(self.behavior, &self.connection).await
    }
}
