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

//! Canonical structured event names used across `nats-relay`.

// Connection lifecycle events.
pub const CONNECTION_OPEN_START: &str = "connection_open_start";
pub const CONNECTION_OPEN_OK: &str = "connection_open_ok";
pub const CONNECTION_OPEN_FAILED: &str = "connection_open_failed";
pub const CONNECTION_OPEN_TIMED_OUT: &str = "connection_open_timed_out";
pub const CONNECTION_ROLLBACK_CLOSE_FAILED: &str = "connection_rollback_close_failed";
pub const CONNECTION_CLOSE_START: &str = "connection_close_start";
pub const CONNECTION_CLOSE_OK: &str = "connection_close_ok";
pub const CONNECTION_CLOSE_FAILED: &str = "connection_close_failed";
pub const CONNECTION_CLOSE_SKIPPED: &str = "connection_close_skipped";

// Inbound relay events.
pub const INBOUND_LAUNCH_START: &str = "inbound_launch_start";
pub const INBOUND_LAUNCH_OK: &str = "inbound_launch_ok";
pub const INBOUND_LAUNCH_FAILED: &str = "inbound_launch_failed";
pub const INBOUND_LAUNCH_CANCELLED: &str = "inbound_launch_cancelled";
pub const INBOUND_SUBSCRIBE_OK: &str = "inbound_subscribe_ok";
pub const INBOUND_SUBSCRIBE_FAILED: &str = "inbound_subscribe_failed";
pub const INBOUND_NO_ACTIVE_SUBSCRIPTIONS: &str = "inbound_no_active_subscriptions";
pub const INBOUND_RECEIVE: &str = "inbound_receive";
pub const INBOUND_UNSUBSCRIBE_OK: &str = "inbound_unsubscribe_ok";
pub const INBOUND_UNSUBSCRIBE_FAILED: &str = "inbound_unsubscribe_failed";
pub const INBOUND_STOP_START: &str = "inbound_stop_start";
pub const INBOUND_STOP_OK: &str = "inbound_stop_ok";
pub const INBOUND_STOP_SKIPPED: &str = "inbound_stop_skipped";
pub const INBOUND_STOP_DEFERRED: &str = "inbound_stop_deferred";

// Outbound relay events.
pub const OUTBOUND_START_OK: &str = "outbound_start_ok";
pub const OUTBOUND_START_FAILED: &str = "outbound_start_failed";
pub const OUTBOUND_PUBLISH_OK: &str = "outbound_publish_ok";
pub const OUTBOUND_PUBLISH_FAILED: &str = "outbound_publish_failed";
pub const OUTBOUND_ENCODE_FAILED: &str = "outbound_encode_failed";
pub const OUTBOUND_WRITE_REJECTED: &str = "outbound_write_rejected";
pub const OUTBOUND_STOP: &str = "outbound_stop";

// Encoder diagnostics.
pub const ENCODER_LEVEL_INVALID: &str = "encoder_level_invalid";
pub const ENCODER_FIELD_COLLISION: &str = "encoder_field_collision";
pub const ENCODER_FIELD_UNSUPPORTED: &str = "encoder_field_unsupported";
