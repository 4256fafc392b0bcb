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

mod fixtures;
pub use fixtures::{
    numbered_record, reference_context, reference_record, relay_config, REFERENCE_GELF,
};
mod recording_consumer;
pub use recording_consumer::RecordingConsumer;

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
