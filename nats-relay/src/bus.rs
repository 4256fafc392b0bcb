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

//! Seams to the messaging bus client.
//!
//! The relay never speaks the bus wire protocol itself. A client library is plugged in
//! through [`BusConnector`] (plain connections) and optionally [`StreamingConnector`]
//! (an acknowledged streaming session layered on top of a plain connection).

use crate::config::{ConnectionConfig, StreamingConfig};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Failure classes reported by a bus client.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BusErrorCode {
    Unreachable,
    Timeout,
    Rejected,
    InvalidArgument,
    Closed,
    Internal,
}

impl Display for BusErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusErrorCode::Unreachable => "UNREACHABLE",
            BusErrorCode::Timeout => "TIMEOUT",
            BusErrorCode::Rejected => "REJECTED",
            BusErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            BusErrorCode::Closed => "CLOSED",
            BusErrorCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Failure reported by a bus client operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BusError {
    code: BusErrorCode,
    message: String,
}

impl BusError {
    pub fn fail_with_code(code: BusErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> BusErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for BusError {}

/// Receives the payloads delivered on one subscription.
///
/// Invoked on the bus client's tasks, possibly concurrently for different subscriptions.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_receive(&self, channel: &str, payload: Vec<u8>);
}

/// An active subscription. Dropping it without [`Subscription::close`] leaves the bus side
/// registered until the connection closes.
#[async_trait]
pub trait Subscription: Send + Sync {
    fn channel(&self) -> &str;

    async fn close(&self) -> Result<(), BusError>;
}

/// One leg of a bus connection: a plain client connection or a streaming session.
#[async_trait]
pub trait BusConnection: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError>;

    async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, BusError>;

    async fn close(&self) -> Result<(), BusError>;
}

/// Opens plain bus connections.
#[async_trait]
pub trait BusConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn BusConnection>, BusError>;
}

/// Opens streaming sessions on top of an already open plain connection.
#[async_trait]
pub trait StreamingConnector: Send + Sync {
    async fn connect(
        &self,
        config: &StreamingConfig,
        connection: Arc<dyn BusConnection>,
    ) -> Result<Arc<dyn BusConnection>, BusError>;
}
