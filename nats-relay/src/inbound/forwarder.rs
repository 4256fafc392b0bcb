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

use crate::bus::MessageHandler;
use crate::inbound::raw_message::{RawMessage, RawMessageConsumer};
use crate::observability::events;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, Level};

const COMPONENT: &str = "inbound_forwarder";

/// Subscription handler wrapping every payload into a [`RawMessage`] for the consumer.
#[derive(Clone)]
pub(crate) struct RawMessageForwarder {
    connection_name: Arc<str>,
    consumer: Arc<dyn RawMessageConsumer>,
}

impl RawMessageForwarder {
    pub(crate) fn new(connection_name: &str, consumer: Arc<dyn RawMessageConsumer>) -> Self {
        Self {
            connection_name: Arc::from(connection_name),
            consumer,
        }
    }
}

#[async_trait]
impl MessageHandler for RawMessageForwarder {
    async fn on_receive(&self, channel: &str, payload: Vec<u8>) {
        let message = RawMessage::new(channel, payload);

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::INBOUND_RECEIVE,
                component = COMPONENT,
                connection_name = &*self.connection_name,
                channel,
                msg_id = %message.id(),
                payload_len = message.payload().len(),
                "forwarding inbound payload"
            );
        }

        self.consumer.process(message);
    }
}
