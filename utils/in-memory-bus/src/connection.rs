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

use crate::{lock, BusState, PublishedMessage};
use async_trait::async_trait;
use nats_relay::{
    BusConnection, BusError, BusErrorCode, ConnectionLeg, MessageHandler, Subscription,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const COMPONENT: &str = "in_memory_connection";

/// One leg of an in-memory connection. Closing it ends every subscription made through it.
pub struct InMemoryConnection {
    state: Arc<BusState>,
    leg: ConnectionLeg,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl InMemoryConnection {
    pub(crate) fn new(state: Arc<BusState>, leg: ConnectionLeg) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state,
            leg,
            closed: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn leg(&self) -> ConnectionLeg {
        self.leg
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::fail_with_code(
                BusErrorCode::Closed,
                format!("{} connection is closed", self.leg),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BusConnection for InMemoryConnection {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        self.ensure_open()?;
        if lock(&self.state.failing_publish).contains(channel) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Rejected,
                format!("publish to {channel} rejected"),
            ));
        }

        lock(&self.state.published).push(PublishedMessage {
            leg: self.leg,
            channel: channel.to_string(),
            payload: payload.to_vec(),
        });
        self.state.dispatch(channel, payload.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, BusError> {
        self.ensure_open()?;
        if lock(&self.state.failing_subscribe).contains(channel) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Rejected,
                format!("subscription to {channel} rejected"),
            ));
        }

        let receiver = self.state.subscribe(channel);
        let (stop, stop_receiver) = watch::channel(false);
        let task = tokio::spawn(dispatch_loop(
            self.state.clone(),
            channel.to_string(),
            receiver,
            handler,
            stop_receiver,
            self.shutdown.subscribe(),
        ));

        debug!(
            component = COMPONENT,
            leg = self.leg.as_str(),
            channel,
            "subscription registered"
        );
        Ok(Box::new(InMemorySubscription {
            channel: channel.to_string(),
            stop,
            task: Mutex::new(Some(task)),
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.send_replace(true);
        lock(&self.state.closed_legs).push(self.leg);

        if self.state.fail_close.load(Ordering::Acquire) {
            return Err(BusError::fail_with_code(
                BusErrorCode::Internal,
                format!("{} connection did not close cleanly", self.leg),
            ));
        }
        Ok(())
    }
}

struct InMemorySubscription {
    channel: String,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn close(&self) -> Result<(), BusError> {
        self.stop.send_replace(true);
        let task = lock(&self.task).take();
        if let Some(task) = task {
            task.await.map_err(|err| {
                BusError::fail_with_code(
                    BusErrorCode::Internal,
                    format!("dispatch task failed: {err}"),
                )
            })?;
        }
        Ok(())
    }
}

async fn dispatch_loop(
    state: Arc<BusState>,
    channel: String,
    mut receiver: Receiver<Vec<u8>>,
    handler: Arc<dyn MessageHandler>,
    mut stop: watch::Receiver<bool>,
    mut connection_shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = connection_shutdown.changed() => break,
            received = receiver.recv() => match received {
                Ok(payload) => {
                    handler.on_receive(&channel, payload).await;
                    state.complete(1);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        component = COMPONENT,
                        channel = channel.as_str(),
                        skipped,
                        "subscriber lagged behind, payloads dropped"
                    );
                    state.complete(skipped as usize);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Undelivered payloads still count as in flight until drained. Holding the channel
    // table keeps publishers from sending to this receiver before it is dropped.
    let _channels = lock(&state.channels);
    loop {
        match receiver.try_recv() {
            Ok(_) => state.complete(1),
            Err(TryRecvError::Lagged(skipped)) => state.complete(skipped as usize),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    drop(receiver);
}
