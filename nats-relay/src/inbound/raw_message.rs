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

//! Unparsed inbound payloads and the downstream consumer they are handed to.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Bytes exactly as received on a channel, tagged with a relay-assigned id and arrival time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawMessage {
    id: Uuid,
    channel: String,
    received_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            received_at: Utc::now(),
            payload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Downstream processor of inbound payloads.
///
/// Called from the bus client's tasks and possibly from several of them at once.
pub trait RawMessageConsumer: Send + Sync {
    fn process(&self, message: RawMessage);
}

impl<F> RawMessageConsumer for F
where
    F: Fn(RawMessage) + Send + Sync,
{
    fn process(&self, message: RawMessage) {
        self(message)
    }
}
