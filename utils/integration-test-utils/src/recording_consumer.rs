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

use nats_relay::{RawMessage, RawMessageConsumer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Consumer that keeps every inbound message and lets tests wait for arrivals.
#[derive(Clone, Default)]
pub struct RecordingConsumer {
    message_store: Arc<Mutex<Vec<RawMessage>>>,
    arrived: Arc<Notify>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Vec<RawMessage>> {
        self.message_store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn messages(&self) -> Vec<RawMessage> {
        self.store().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.store()
            .iter()
            .map(|message| message.payload().to_vec())
            .collect()
    }

    pub fn payloads_from(&self, channel: &str) -> Vec<Vec<u8>> {
        self.store()
            .iter()
            .filter(|message| message.channel() == channel)
            .map(|message| message.payload().to_vec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    /// Waits until at least `count` messages arrived. Returns `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let arrived = self.arrived.notified();
                if self.len() >= count {
                    return;
                }
                arrived.await;
            }
        })
        .await
        .is_ok()
    }
}

impl RawMessageConsumer for RecordingConsumer {
    fn process(&self, message: RawMessage) {
        debug!(
            channel = message.channel(),
            payload_len = message.payload().len(),
            "recording consumer received message"
        );
        self.store().push(message);
        self.arrived.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::RecordingConsumer;
    use nats_relay::{RawMessage, RawMessageConsumer};
    use std::time::Duration;

    #[tokio::test]
    async fn wait_for_sees_messages_from_other_tasks() {
        let consumer = RecordingConsumer::new();
        let producer = consumer.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.process(RawMessage::new("logs", b"a".to_vec()));
            producer.process(RawMessage::new("audit", b"b".to_vec()));
        });

        assert!(consumer.wait_for(2, Duration::from_secs(5)).await);
        handle.await.unwrap();
        assert_eq!(consumer.payloads_from("audit"), vec![b"b".to_vec()]);
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let consumer = RecordingConsumer::new();

        assert!(!consumer.wait_for(1, Duration::from_millis(20)).await);
        assert!(consumer.is_empty());
    }
}
