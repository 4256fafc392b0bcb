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

//! Canonical structured field keys and value-format helpers.

use crate::ChannelSet;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const CONNECTION_NAME: &str = "connection_name";
pub const LEG: &str = "leg";
pub const SERVERS: &str = "servers";
pub const CHANNEL: &str = "channel";
pub const CHANNELS: &str = "channels";
pub const MSG_ID: &str = "msg_id";
pub const PAYLOAD_LEN: &str = "payload_len";
pub const FIELD: &str = "field";
pub const ERR: &str = "err";
pub const REASON: &str = "reason";

pub const NONE: &str = "none";
pub const LEG_NATS: &str = "nats";
pub const LEG_STREAMING: &str = "streaming";
pub const REASON_ALREADY_CLOSED: &str = "already_closed";
pub const REASON_NOT_RUNNING: &str = "not_running";

/// Renders a channel set as a single comma separated log value.
pub fn format_channels(channels: &ChannelSet) -> String {
    if channels.is_empty() {
        return NONE.to_string();
    }
    channels.iter().collect::<Vec<_>>().join(",")
}

/// Renders a server list as a single comma separated log value.
pub fn format_servers(servers: &[String]) -> String {
    if servers.is_empty() {
        return NONE.to_string();
    }
    servers.join(",")
}
