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

//! Observability contract for `nats-relay`.
//!
//! Event names and field keys are stable identifiers for log-based diagnostics.
//! Library code only emits `tracing` events; subscriber setup belongs to binaries and tests.

pub mod events;
pub mod fields;
