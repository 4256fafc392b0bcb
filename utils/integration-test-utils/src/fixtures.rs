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

use chrono::{TimeZone, Utc};
use nats_relay::{Decimal, FieldValue, ForwarderContext, LogRecord, RelayConfig};

/// GELF bytes expected for [`reference_record`] under [`reference_context`].
pub const REFERENCE_GELF: &str = concat!(
    r#"{"version":"1.1","host":"integration.test","short_message":"TEST","#,
    r#""timestamp":1.4730732E9,"big_decimal":42424242424242424242,"string":"foobar","#,
    r#""bool":true,"level":5,"double":23.42,"float":23.42,"int":42,"long":4242424242,"#,
    r#""_id":"061b5ed0-734a-11e6-8e18-6c4008b8fc28","facility":"IntegrationTest","#,
    r#""_forwarder_cluster_id":"GRAYLOG-CLUSTER-ID","_forwarder_node_id":"GRAYLOG-NODE-ID"}"#
);

pub fn reference_context() -> ForwarderContext {
    ForwarderContext::new("GRAYLOG-CLUSTER-ID", "GRAYLOG-NODE-ID")
}

/// Record covering every supported custom field type, in the reference key order.
pub fn reference_record() -> LogRecord {
    let timestamp = Utc
        .with_ymd_and_hms(2016, 9, 5, 11, 0, 0)
        .single()
        .expect("reference timestamp is unambiguous");

    LogRecord::from_fields([
        ("message", FieldValue::from("TEST")),
        ("source", FieldValue::from("integration.test")),
        ("timestamp", FieldValue::from(timestamp)),
        (
            "big_decimal",
            FieldValue::from(Decimal::from(42424242424242424242u128)),
        ),
        ("string", FieldValue::from("foobar")),
        ("bool", FieldValue::from(true)),
        ("level", FieldValue::from(5)),
        ("double", FieldValue::from(23.42f64)),
        ("float", FieldValue::from(23.42f32)),
        ("int", FieldValue::from(42)),
        ("long", FieldValue::from(4242424242i64)),
        (
            "_id",
            FieldValue::from("061b5ed0-734a-11e6-8e18-6c4008b8fc28"),
        ),
        ("facility", FieldValue::from("IntegrationTest")),
    ])
}

/// Minimal valid record whose message carries `sequence`.
pub fn numbered_record(sequence: usize) -> LogRecord {
    LogRecord::new(format!("message-{sequence}"), "integration.test", Utc::now())
        .with_field("sequence", sequence as i64)
}

/// Relay configuration for `channels` with a short connect timeout.
pub fn relay_config(channels: &str) -> RelayConfig {
    RelayConfig {
        connection_timeout: 250,
        ..RelayConfig::default()
    }
    .with_channels(channels)
}
