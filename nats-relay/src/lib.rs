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

//! # nats-relay
//!
//! `nats-relay` bridges a log pipeline and a NATS-style publish/subscribe bus in both
//! directions:
//!
//! * [`InboundRelay`] subscribes to a set of channels and hands every payload, untouched,
//!   to a [`RawMessageConsumer`];
//! * [`OutboundRelay`] encodes [`LogRecord`]s as compact GELF 1.1 JSON through
//!   [`GelfEncoder`] and publishes them to a set of channels.
//!
//! The bus client itself is plugged in through [`BusConnector`] and, for acknowledged
//! streaming sessions, [`StreamingConnector`]. Connections are opened by a
//! [`ConnectionManager`] from a [`RelayConfig`].
//!
//! ## Loopback
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use chrono::Utc;
//! use in_memory_bus::InMemoryBus;
//! use nats_relay::{
//!     ConnectionManager, ForwarderContext, InboundRelay, LogRecord, OutboundRelay, RawMessage,
//!     RelayConfig,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let bus = InMemoryBus::new();
//! let manager = ConnectionManager::new(bus.connector());
//! let config = RelayConfig::from_json5_str(r#"{ channels: "graylog" }"#).unwrap();
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = received.clone();
//! let inbound = InboundRelay::new(config.clone(), manager.clone()).unwrap();
//! inbound
//!     .launch(Arc::new(move |message: RawMessage| {
//!         sink.lock().unwrap().push(message.into_payload())
//!     }))
//!     .await
//!     .unwrap();
//!
//! let context = ForwarderContext::new("cluster-a", "node-1");
//! let outbound = OutboundRelay::start(&config, &manager, context).await.unwrap();
//! outbound
//!     .write(&LogRecord::new("disk full", "db-01", Utc::now()))
//!     .await
//!     .unwrap();
//!
//! bus.flush().await;
//! assert_eq!(received.lock().unwrap().len(), 1);
//!
//! outbound.stop().await;
//! inbound.stop().await;
//! # });
//! ```

mod bus;
mod channel_set;
mod config;
mod connection;
mod encoder;
mod inbound;
mod outbound;
mod record;

#[doc(hidden)]
pub mod observability;

#[cfg(test)]
mod test_support;

pub use bus::{
    BusConnection, BusConnector, BusError, BusErrorCode, MessageHandler, StreamingConnector,
    Subscription,
};
pub use channel_set::{parse_server_uris, ChannelSet, SeparatorPolicy, DEFAULT_SERVER_URI};
pub use config::{
    ConfigurationError, ConnectionConfig, RelayConfig, RelayRole, StreamingConfig,
    StreamingSettings, DEFAULT_OUTBOUND_CHANNEL,
};
pub use connection::{Connection, ConnectionError, ConnectionLeg, ConnectionManager};
pub use encoder::{
    EncodeError, ForwarderContext, GelfEncoder, LevelSource, FORWARDER_CLUSTER_ID,
    FORWARDER_NODE_ID, GELF_VERSION,
};
pub use inbound::raw_message::{RawMessage, RawMessageConsumer};
pub use inbound::relay::{InboundRelay, LaunchError, LaunchReport, RelayState, SubscribeOutcome};
pub use outbound::{OutboundRelay, StartError, WriteError};
pub use record::{
    Decimal, FieldValue, Fields, InvalidDecimal, LogRecord, FIELD_FULL_MESSAGE, FIELD_ID,
    FIELD_LEVEL, FIELD_MESSAGE, FIELD_SOURCE, FIELD_TIMESTAMP,
};
