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

mod support;

use in_memory_bus::InMemoryBus;
use integration_test_utils::{relay_config, RecordingConsumer};
use nats_relay::{
    BusErrorCode, ConnectionError, ConnectionLeg, InboundRelay, LaunchError, RelayState,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn failing_channel_does_not_block_the_others() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    bus.fail_subscribe("audit");
    let relay =
        InboundRelay::new(relay_config("logs\naudit\nalerts"), support::plain_manager(&bus))
            .unwrap();
    let consumer = RecordingConsumer::new();

    let report = relay.launch(Arc::new(consumer.clone())).await.unwrap();

    assert_eq!(relay.state(), RelayState::Running);
    assert_eq!(report.subscribed().collect::<Vec<_>>(), vec!["alerts", "logs"]);
    assert_eq!(
        report
            .failures()
            .map(|(channel, cause)| (channel, cause.code()))
            .collect::<Vec<_>>(),
        vec![("audit", BusErrorCode::Rejected)]
    );

    bus.inject("logs", b"from logs");
    bus.inject("alerts", b"from alerts");
    bus.inject("audit", b"never delivered");

    assert!(consumer.wait_for(2, support::DELIVERY_TIMEOUT).await);
    bus.flush().await;
    assert_eq!(consumer.len(), 2);
    assert_eq!(consumer.payloads_from("logs"), vec![b"from logs".to_vec()]);
    assert_eq!(consumer.payloads_from("alerts"), vec![b"from alerts".to_vec()]);

    relay.stop().await;
}

#[tokio::test]
async fn payload_bytes_reach_the_consumer_untouched() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    let relay = InboundRelay::new(relay_config("raw"), support::plain_manager(&bus)).unwrap();
    let consumer = RecordingConsumer::new();
    relay.launch(Arc::new(consumer.clone())).await.unwrap();

    let payload: Vec<u8> = (0..=255u8).collect();
    bus.inject("raw", &payload);

    assert!(consumer.wait_for(1, support::DELIVERY_TIMEOUT).await);
    let messages = consumer.messages();
    assert_eq!(messages[0].payload(), payload.as_slice());
    assert_eq!(messages[0].channel(), "raw");

    relay.stop().await;
}

#[tokio::test]
async fn every_payload_is_forwarded_exactly_once() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    let relay =
        InboundRelay::new(relay_config("a\nb\nc\nd"), support::plain_manager(&bus)).unwrap();
    let consumer = RecordingConsumer::new();
    relay.launch(Arc::new(consumer.clone())).await.unwrap();

    for sequence in 0..50 {
        for channel in ["a", "b", "c", "d"] {
            bus.inject(channel, format!("{channel}-{sequence}").as_bytes());
        }
    }

    assert!(consumer.wait_for(200, support::DELIVERY_TIMEOUT).await);
    bus.flush().await;
    assert_eq!(consumer.len(), 200);
    for channel in ["a", "b", "c", "d"] {
        let expected: Vec<Vec<u8>> = (0..50)
            .map(|sequence| format!("{channel}-{sequence}").into_bytes())
            .collect();
        assert_eq!(consumer.payloads_from(channel), expected);
    }

    relay.stop().await;
}

#[tokio::test]
async fn streaming_variant_subscribes_through_streaming_leg() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    let relay = InboundRelay::new(
        support::streaming_config("logs", "inbound-1"),
        support::streaming_manager(&bus),
    )
    .unwrap();
    let consumer = RecordingConsumer::new();

    relay.launch(Arc::new(consumer.clone())).await.unwrap();
    bus.inject("logs", b"acked");
    assert!(consumer.wait_for(1, support::DELIVERY_TIMEOUT).await);

    relay.stop().await;

    assert_eq!(
        bus.closed_legs(),
        vec![ConnectionLeg::Streaming, ConnectionLeg::Nats]
    );
    assert_eq!(bus.subscriber_count("logs"), 0);
}

#[tokio::test]
async fn connect_timeout_leaves_relay_idle_and_retryable() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    bus.hang_connections();
    let mut config = relay_config("logs");
    config.connection_timeout = 30;
    let relay = InboundRelay::new(config, support::plain_manager(&bus)).unwrap();
    let consumer = RecordingConsumer::new();

    let err = relay
        .launch(Arc::new(consumer.clone()))
        .await
        .unwrap_err();
    match err {
        LaunchError::Connection(ConnectionError::TimedOut { leg, after }) => {
            assert_eq!(leg, ConnectionLeg::Nats);
            assert_eq!(after, Duration::from_millis(30));
        }
        other => panic!("unexpected launch error: {other}"),
    }
    assert_eq!(relay.state(), RelayState::Idle);
    assert!(!relay.is_running());

    bus.accept_connections();
    relay.launch(Arc::new(consumer)).await.unwrap();
    assert!(relay.is_running());

    relay.stop().await;
}

#[tokio::test]
async fn streaming_failure_closes_plain_leg() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    bus.refuse_streaming(BusErrorCode::Unreachable);
    let relay = InboundRelay::new(
        support::streaming_config("logs", "inbound-2"),
        support::streaming_manager(&bus),
    )
    .unwrap();

    let err = relay
        .launch(Arc::new(RecordingConsumer::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LaunchError::Connection(ConnectionError::Connect {
            leg: ConnectionLeg::Streaming,
            ..
        })
    ));
    assert_eq!(bus.closed_legs(), vec![ConnectionLeg::Nats]);
    assert_eq!(relay.state(), RelayState::Idle);
}

#[tokio::test]
async fn stop_twice_is_harmless() {
    integration_test_utils::init_logging();

    let bus = InMemoryBus::new();
    bus.fail_close();
    let relay = InboundRelay::new(relay_config("logs"), support::plain_manager(&bus)).unwrap();
    relay
        .launch(Arc::new(RecordingConsumer::new()))
        .await
        .unwrap();
    assert_eq!(bus.subscriber_count("logs"), 1);

    relay.stop().await;
    relay.stop().await;

    assert!(!relay.is_running());
    assert_eq!(relay.state(), RelayState::Stopped);
    assert_eq!(bus.subscriber_count("logs"), 0);
    assert_eq!(bus.closed_legs(), vec![ConnectionLeg::Nats]);
}
