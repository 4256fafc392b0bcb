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

//! Channel and server list parsing for the relay configuration strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_SERVER_URI: &str = "nats://localhost:4222";

/// How a raw channel configuration string is split into names.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorPolicy {
    /// One channel per line.
    #[default]
    Newline,
    /// Comma separated, as accepted by older configurations.
    Comma,
}

impl SeparatorPolicy {
    pub fn separator(self) -> char {
        match self {
            SeparatorPolicy::Newline => '\n',
            SeparatorPolicy::Comma => ',',
        }
    }
}

///
/// [`ChannelSet`] is the immutable set of channel names a relay subscribes or publishes to.
///
/// Entries are trimmed, never empty and never duplicated. Iteration is in lexicographic order.
///
/// # Examples
///
/// ```
/// use nats_relay::{ChannelSet, SeparatorPolicy};
///
/// let channels = ChannelSet::parse(" logs\n\naudit \nlogs\n", SeparatorPolicy::Newline);
///
/// assert_eq!(channels.len(), 2);
/// assert_eq!(channels.iter().collect::<Vec<_>>(), vec!["audit", "logs"]);
///
/// let legacy = ChannelSet::parse("logs, audit,,", SeparatorPolicy::Comma);
/// assert_eq!(legacy, channels);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelSet {
    channels: BTreeSet<String>,
}

impl ChannelSet {
    pub fn parse(raw: &str, policy: SeparatorPolicy) -> Self {
        let channels = raw
            .split(policy.separator())
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .map(str::to_string)
            .collect();

        Self { channels }
    }

    /// Renders the set back into a configuration string using the policy's separator.
    pub fn join(&self, policy: SeparatorPolicy) -> String {
        let separator = policy.separator().to_string();
        self.channels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&separator)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChannelSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

/// Splits a newline-delimited server list, keeping the configured order.
///
/// Falls back to [`DEFAULT_SERVER_URI`] when nothing usable is configured.
pub fn parse_server_uris(raw: &str) -> Vec<String> {
    let mut servers: Vec<String> = Vec::new();
    for server in raw.split('\n').map(str::trim) {
        if !server.is_empty() && !servers.iter().any(|known| known == server) {
            servers.push(server.to_string());
        }
    }

    if servers.is_empty() {
        servers.push(DEFAULT_SERVER_URI.to_string());
    }
    servers
}
