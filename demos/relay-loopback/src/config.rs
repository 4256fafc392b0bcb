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

use nats_relay::{ForwarderContext, RelayConfig};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) relay: RelayConfig,
    pub(crate) forwarder: ForwarderConfig,
    #[serde(default = "default_record_count")]
    pub(crate) record_count: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ForwarderConfig {
    pub(crate) cluster_id: String,
    pub(crate) node_id: String,
}

impl ForwarderConfig {
    pub(crate) fn context(&self) -> ForwarderContext {
        ForwarderContext::new(self.cluster_id.clone(), self.node_id.clone())
    }
}

fn default_record_count() -> usize {
    3
}
