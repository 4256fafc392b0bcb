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

//! Inbound relay lifecycle: connect, subscribe every channel, forward, tear down.

use crate::bus::{BusError, MessageHandler, Subscription};
use crate::channel_set::ChannelSet;
use crate::config::{ConfigurationError, ConnectionConfig, RelayConfig, RelayRole};
use crate::connection::{Connection, ConnectionError, ConnectionManager};
use crate::inbound::forwarder::RawMessageForwarder;
use crate::inbound::raw_message::RawMessageConsumer;
use crate::observability::{events, fields};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "inbound_relay";

/// Lifecycle of an [`InboundRelay`]. Only `Idle` accepts a launch; `Stopped` is final.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayState {
    Idle,
    Launching,
    Running,
    Stopping,
    Stopped,
}

impl RelayState {
    fn as_u8(self) -> u8 {
        match self {
            RelayState::Idle => 0,
            RelayState::Launching => 1,
            RelayState::Running => 2,
            RelayState::Stopping => 3,
            RelayState::Stopped => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RelayState::Idle,
            1 => RelayState::Launching,
            2 => RelayState::Running,
            3 => RelayState::Stopping,
            _ => RelayState::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::Idle => "idle",
            RelayState::Launching => "launching",
            RelayState::Running => "running",
            RelayState::Stopping => "stopping",
            RelayState::Stopped => "stopped",
        }
    }
}

impl Display for RelayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of subscribing one channel during launch.
#[derive(Debug)]
pub enum SubscribeOutcome {
    Subscribed { channel: String },
    Failed { channel: String, cause: BusError },
}

impl SubscribeOutcome {
    pub fn channel(&self) -> &str {
        match self {
            SubscribeOutcome::Subscribed { channel } | SubscribeOutcome::Failed { channel, .. } => {
                channel
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscribeOutcome::Subscribed { .. })
    }
}

/// Per-channel outcomes of a successful launch, in channel set order.
#[derive(Debug)]
pub struct LaunchReport {
    outcomes: Vec<SubscribeOutcome>,
}

impl LaunchReport {
    pub fn outcomes(&self) -> &[SubscribeOutcome] {
        &self.outcomes
    }

    pub fn subscribed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_subscribed())
            .map(SubscribeOutcome::channel)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BusError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SubscribeOutcome::Failed { channel, cause } => Some((channel.as_str(), cause)),
            SubscribeOutcome::Subscribed { .. } => None,
        })
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscribed().count()
    }

    /// `true` when the relay runs without a single working subscription.
    pub fn all_failed(&self) -> bool {
        self.active_subscriptions() == 0
    }
}

/// Failures of [`InboundRelay::launch`].
#[derive(Debug)]
pub enum LaunchError {
    InvalidState(RelayState),
    Connection(ConnectionError),
    /// `stop()` was called before the launch completed; everything it opened is closed.
    Cancelled,
}

impl Display for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::InvalidState(state) => {
                write!(f, "relay can only be launched when idle, current state: {state}")
            }
            LaunchError::Connection(err) => write!(f, "unable to connect: {err}"),
            LaunchError::Cancelled => write!(f, "relay was stopped while launching"),
        }
    }
}

impl Error for LaunchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LaunchError::Connection(err) => Some(err),
            LaunchError::InvalidState(_) | LaunchError::Cancelled => None,
        }
    }
}

struct ActiveRelay {
    connection: Connection,
    subscriptions: Vec<Box<dyn Subscription>>,
}

///
/// [`InboundRelay`] subscribes to every configured channel and hands each received payload
/// to a [`RawMessageConsumer`].
///
/// A channel that cannot be subscribed does not abort the launch; the failure is logged
/// and reported in the [`LaunchReport`].
pub struct InboundRelay {
    connection_config: ConnectionConfig,
    channels: ChannelSet,
    manager: ConnectionManager,
    state: AtomicU8,
    active: tokio::sync::Mutex<Option<ActiveRelay>>,
}

impl InboundRelay {
    pub fn new(
        config: RelayConfig,
        manager: ConnectionManager,
    ) -> Result<Self, ConfigurationError> {
        let channels = config.channel_set(RelayRole::Inbound)?;
        let connection_config = config.connection_config()?;

        Ok(Self {
            connection_config,
            channels,
            manager,
            state: AtomicU8::new(RelayState::Idle.as_u8()),
            active: tokio::sync::Mutex::new(None),
        })
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn state(&self) -> RelayState {
        RelayState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RelayState::Running
    }

    fn transition(&self, from: RelayState, to: RelayState) -> Result<(), RelayState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(RelayState::from_u8)
    }

    pub async fn launch(
        &self,
        consumer: Arc<dyn RawMessageConsumer>,
    ) -> Result<LaunchReport, LaunchError> {
        // Held for the whole launch so a concurrent stop() can wait for it to unwind.
        let mut active_slot = self.active.lock().await;
        self.transition(RelayState::Idle, RelayState::Launching)
            .map_err(LaunchError::InvalidState)?;

        let connection_name = self.connection_config.connection_name.as_str();
        let channels = fields::format_channels(&self.channels);
        info!(
            event = events::INBOUND_LAUNCH_START,
            component = COMPONENT,
            connection_name,
            channels = %channels,
            "launching inbound relay"
        );

        let connection = match self.manager.open(&self.connection_config).await {
            Ok(connection) => connection,
            Err(err) => {
                if self.transition(RelayState::Launching, RelayState::Idle).is_err() {
                    self.state.store(RelayState::Stopped.as_u8(), Ordering::Release);
                }
                warn!(
                    event = events::INBOUND_LAUNCH_FAILED,
                    component = COMPONENT,
                    connection_name,
                    err = %err,
                    "unable to launch inbound relay"
                );
                return Err(LaunchError::Connection(err));
            }
        };

        let forwarder: Arc<dyn MessageHandler> =
            Arc::new(RawMessageForwarder::new(connection_name, consumer));
        let mut subscriptions = Vec::with_capacity(self.channels.len());
        let mut outcomes = Vec::with_capacity(self.channels.len());

        for channel in self.channels.iter() {
            match connection.subscribe(channel, forwarder.clone()).await {
                Ok(subscription) => {
                    debug!(
                        event = events::INBOUND_SUBSCRIBE_OK,
                        component = COMPONENT,
                        connection_name,
                        channel,
                        "subscribed to channel"
                    );
                    subscriptions.push(subscription);
                    outcomes.push(SubscribeOutcome::Subscribed {
                        channel: channel.to_string(),
                    });
                }
                Err(cause) => {
                    warn!(
                        event = events::INBOUND_SUBSCRIBE_FAILED,
                        component = COMPONENT,
                        connection_name,
                        channel,
                        err = %cause,
                        "unable to subscribe to channel"
                    );
                    outcomes.push(SubscribeOutcome::Failed {
                        channel: channel.to_string(),
                        cause,
                    });
                }
            }
        }

        let active = ActiveRelay {
            connection,
            subscriptions,
        };
        if self.transition(RelayState::Launching, RelayState::Running).is_err() {
            info!(
                event = events::INBOUND_LAUNCH_CANCELLED,
                component = COMPONENT,
                connection_name,
                "inbound relay stopped while launching"
            );
            release(connection_name, active).await;
            self.state.store(RelayState::Stopped.as_u8(), Ordering::Release);
            return Err(LaunchError::Cancelled);
        }

        let active_subscriptions = active.subscriptions.len();
        if active_subscriptions == 0 {
            warn!(
                event = events::INBOUND_NO_ACTIVE_SUBSCRIPTIONS,
                component = COMPONENT,
                connection_name,
                channels = %channels,
                "inbound relay running without any active subscription"
            );
        }
        *active_slot = Some(active);

        info!(
            event = events::INBOUND_LAUNCH_OK,
            component = COMPONENT,
            connection_name,
            active_subscriptions,
            failed_subscriptions = outcomes.len() - active_subscriptions,
            "inbound relay running"
        );
        Ok(LaunchReport { outcomes })
    }

    /// Closes every subscription, then the connection. Never fails; repeated calls and
    /// calls on an idle relay are no-ops. A stop during launch waits for the launch to
    /// release what it opened.
    pub async fn stop(&self) {
        let connection_name = self.connection_config.connection_name.as_str();
        loop {
            match self.state() {
                RelayState::Running => {
                    if self.transition(RelayState::Running, RelayState::Stopping).is_ok() {
                        break;
                    }
                }
                RelayState::Launching => {
                    if self.transition(RelayState::Launching, RelayState::Stopping).is_ok() {
                        info!(
                            event = events::INBOUND_STOP_DEFERRED,
                            component = COMPONENT,
                            connection_name,
                            "inbound relay launching, stop handed over to the launch"
                        );
                        let _launch_finished = self.active.lock().await;
                        return;
                    }
                }
                state => {
                    debug!(
                        event = events::INBOUND_STOP_SKIPPED,
                        component = COMPONENT,
                        connection_name,
                        state = state.as_str(),
                        reason = fields::REASON_NOT_RUNNING,
                        "inbound relay not running"
                    );
                    return;
                }
            }
        }

        info!(
            event = events::INBOUND_STOP_START,
            component = COMPONENT,
            connection_name,
            "stopping inbound relay"
        );

        if let Some(active) = self.active.lock().await.take() {
            release(connection_name, active).await;
        }

        self.state.store(RelayState::Stopped.as_u8(), Ordering::Release);
        info!(
            event = events::INBOUND_STOP_OK,
            component = COMPONENT,
            connection_name,
            "inbound relay stopped"
        );
    }
}

async fn release(connection_name: &str, active: ActiveRelay) {
    for subscription in active.subscriptions {
        match subscription.close().await {
            Ok(()) => debug!(
                event = events::INBOUND_UNSUBSCRIBE_OK,
                component = COMPONENT,
                connection_name,
                channel = subscription.channel(),
                "subscription closed"
            ),
            Err(err) => warn!(
                event = events::INBOUND_UNSUBSCRIBE_FAILED,
                component = COMPONENT,
                connection_name,
                channel = subscription.channel(),
                err = %err,
                "unable to close subscription"
            ),
        }
    }
    active.connection.close().await;
}

#[cfg(test)]
mod tests {
    use super::{InboundRelay, LaunchError, RelayState};
    use crate::bus::BusErrorCode;
    use crate::config::{ConfigurationError, RelayConfig};
    use crate::connection::ConnectionManager;
    use crate::inbound::raw_message::{RawMessage, RawMessageConsumer};
    use crate::test_support::{ConnectBehavior, MockConnection, MockConnector};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingConsumer {
        received: Mutex<Vec<RawMessage>>,
    }

    impl RawMessageConsumer for CollectingConsumer {
        fn process(&self, message: RawMessage) {
            self.received.lock().unwrap().push(message);
        }
    }

    impl CollectingConsumer {
        fn payloads(&self) -> Vec<(String, Vec<u8>)> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .map(|message| (message.channel().to_string(), message.payload().to_vec()))
                .collect()
        }
    }

    fn relay_over(connection: Arc<MockConnection>, behavior: ConnectBehavior) -> InboundRelay {
        let config = RelayConfig::default().with_channels("alerts\naudit\nlogs");
        let manager = ConnectionManager::new(MockConnector::new(connection, behavior));
        InboundRelay::new(config, manager).unwrap()
    }

    #[test]
    fn channels_are_required() {
        let manager = ConnectionManager::new(MockConnector::new(
            MockConnection::new("nats"),
            ConnectBehavior::Succeed,
        ));

        let err = InboundRelay::new(RelayConfig::default(), manager)
            .err()
            .unwrap();

        assert!(matches!(err, ConfigurationError::MissingValue("channels")));
    }

    #[tokio::test]
    async fn forwards_payloads_from_every_channel() {
        let bus = MockConnection::new("nats");
        let relay = relay_over(bus.clone(), ConnectBehavior::Succeed);
        let consumer = Arc::new(CollectingConsumer::default());

        let report = relay.launch(consumer.clone()).await.unwrap();

        assert_eq!(relay.state(), RelayState::Running);
        assert_eq!(
            report.subscribed().collect::<Vec<_>>(),
            vec!["alerts", "audit", "logs"]
        );
        assert_eq!(bus.subscribed_channels(), vec!["alerts", "audit", "logs"]);

        bus.deliver("logs", b"\x00raw bytes\xff").await;
        bus.deliver("alerts", b"").await;

        assert_eq!(
            consumer.payloads(),
            vec![
                ("logs".to_string(), b"\x00raw bytes\xff".to_vec()),
                ("alerts".to_string(), Vec::new()),
            ]
        );
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_abort_launch() {
        let bus = MockConnection::new("nats");
        bus.fail_channel("audit");
        let relay = relay_over(bus.clone(), ConnectBehavior::Succeed);
        let consumer = Arc::new(CollectingConsumer::default());

        let report = relay.launch(consumer.clone()).await.unwrap();

        assert!(relay.is_running());
        assert_eq!(report.active_subscriptions(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "audit");
        assert_eq!(failures[0].1.code(), BusErrorCode::Rejected);

        bus.deliver("logs", b"still flowing").await;
        assert_eq!(consumer.payloads().len(), 1);
    }

    #[tokio::test]
    async fn all_channels_failing_still_launches() {
        let bus = MockConnection::new("nats");
        for channel in ["alerts", "audit", "logs"] {
            bus.fail_channel(channel);
        }
        let relay = relay_over(bus, ConnectBehavior::Succeed);

        let report = relay
            .launch(Arc::new(CollectingConsumer::default()))
            .await
            .unwrap();

        assert!(report.all_failed());
        assert_eq!(report.outcomes().len(), 3);
        assert_eq!(relay.state(), RelayState::Running);
    }

    #[tokio::test]
    async fn connection_failure_returns_to_idle() {
        let relay = relay_over(
            MockConnection::new("nats"),
            ConnectBehavior::Fail(BusErrorCode::Unreachable),
        );

        let err = relay
            .launch(Arc::new(CollectingConsumer::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Connection(_)));
        assert_eq!(relay.state(), RelayState::Idle);
        assert!(!relay.is_running());
    }

    #[tokio::test]
    async fn second_launch_is_rejected() {
        let relay = relay_over(MockConnection::new("nats"), ConnectBehavior::Succeed);
        let consumer = Arc::new(CollectingConsumer::default());
        relay.launch(consumer.clone()).await.unwrap();

        let err = relay.launch(consumer).await.unwrap_err();

        assert!(matches!(err, LaunchError::InvalidState(RelayState::Running)));
    }

    #[tokio::test]
    async fn stop_closes_subscriptions_then_connection() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = MockConnection::with_log("nats", log.clone());
        let relay = relay_over(bus.clone(), ConnectBehavior::Succeed);
        let consumer = Arc::new(CollectingConsumer::default());
        relay.launch(consumer.clone()).await.unwrap();

        relay.stop().await;
        relay.stop().await;

        assert_eq!(relay.state(), RelayState::Stopped);
        assert!(!relay.is_running());
        assert_eq!(bus.close_calls(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "unsubscribe:alerts".to_string(),
                "unsubscribe:audit".to_string(),
                "unsubscribe:logs".to_string(),
                "close:nats".to_string(),
            ]
        );

        let err = relay.launch(consumer).await.unwrap_err();
        assert!(matches!(err, LaunchError::InvalidState(RelayState::Stopped)));
    }

    #[tokio::test]
    async fn stop_during_launch_releases_everything_the_launch_opened() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = MockConnection::with_log("nats", log.clone());
        let relay = Arc::new(relay_over(
            bus.clone(),
            ConnectBehavior::Delay(Duration::from_millis(100)),
        ));

        let launching = relay.clone();
        let launch = tokio::spawn(async move {
            launching
                .launch(Arc::new(CollectingConsumer::default()))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(relay.state(), RelayState::Launching);

        relay.stop().await;

        assert_eq!(relay.state(), RelayState::Stopped);
        assert!(!relay.is_running());
        assert_eq!(bus.close_calls(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "unsubscribe:alerts".to_string(),
                "unsubscribe:audit".to_string(),
                "unsubscribe:logs".to_string(),
                "close:nats".to_string(),
            ]
        );
        assert!(matches!(
            launch.await.unwrap(),
            Err(LaunchError::Cancelled)
        ));

        relay.stop().await;
        assert_eq!(bus.close_calls(), 1);
    }

    #[tokio::test]
    async fn stop_before_launch_is_a_no_op() {
        let bus = MockConnection::new("nats");
        let relay = relay_over(bus.clone(), ConnectBehavior::Succeed);

        relay.stop().await;

        assert_eq!(relay.state(), RelayState::Idle);
        assert_eq!(bus.close_calls(), 0);
    }
}
