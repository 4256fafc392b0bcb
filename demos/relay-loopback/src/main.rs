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

mod config;

use crate::config::Config;
use chrono::Utc;
use clap::Parser;
use in_memory_bus::InMemoryBus;
use nats_relay::{
    ConfigurationError, ConnectionManager, InboundRelay, LaunchError, LogRecord, OutboundRelay,
    RawMessage, StartError, WriteError,
};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command()]
struct LoopbackArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
    /// Overrides the number of records written from the config file.
    #[arg(short, long)]
    records: Option<usize>,
}

#[derive(Debug)]
enum LoopbackError {
    Config(String),
    Inbound(LaunchError),
    Outbound(StartError),
    Write(WriteError),
}

impl fmt::Display for LoopbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopbackError::Config(reason) => write!(f, "invalid configuration: {reason}"),
            LoopbackError::Inbound(err) => write!(f, "inbound relay failed to launch: {err}"),
            LoopbackError::Outbound(err) => write!(f, "outbound relay failed to start: {err}"),
            LoopbackError::Write(err) => write!(f, "unable to relay record: {err}"),
        }
    }
}

impl std::error::Error for LoopbackError {}

impl From<ConfigurationError> for LoopbackError {
    fn from(err: ConfigurationError) -> Self {
        LoopbackError::Config(err.to_string())
    }
}

fn print_message(message: RawMessage) {
    println!(
        "[{}] {} {}",
        message.received_at().to_rfc3339(),
        message.channel(),
        String::from_utf8_lossy(message.payload())
    );
}

#[tokio::main]
async fn main() -> Result<(), LoopbackError> {
    let _ = tracing_subscriber::fmt::try_init();

    info!("Started relay-loopback");

    let args = LoopbackArgs::parse();
    let contents = std::fs::read_to_string(&args.config).map_err(|e| {
        LoopbackError::Config(format!("unable to read {}: {e}", args.config))
    })?;
    let config: Config = json5::from_str(&contents)
        .map_err(|e| LoopbackError::Config(format!("unable to parse {}: {e}", args.config)))?;
    config.relay.validate()?;
    let record_count = args.records.unwrap_or(config.record_count);

    let bus = InMemoryBus::new();
    let mut manager = ConnectionManager::new(bus.connector());
    if config.relay.streaming.is_some() {
        manager = manager.with_streaming(bus.streaming_connector());
    }

    let inbound = InboundRelay::new(config.relay.clone(), manager.clone())?;
    let report = inbound
        .launch(Arc::new(print_message))
        .await
        .map_err(LoopbackError::Inbound)?;
    for (channel, cause) in report.failures() {
        warn!("Not listening on {channel}: {cause}");
    }

    let outbound = match OutboundRelay::start(&config.relay, &manager, config.forwarder.context())
        .await
    {
        Ok(outbound) => outbound,
        Err(err) => {
            inbound.stop().await;
            return Err(LoopbackError::Outbound(err));
        }
    };

    let source = config.relay.connection_name.clone();
    let mut written = 0;
    for sequence in 0..record_count {
        let record = LogRecord::new(
            format!("loopback record {sequence}"),
            source.as_str(),
            Utc::now(),
        )
        .with_field("sequence", sequence as i64)
        .with_field("level", 6);
        if let Err(err) = outbound.write(&record).await {
            outbound.stop().await;
            inbound.stop().await;
            return Err(LoopbackError::Write(err));
        }
        written += 1;
    }

    bus.flush().await;
    outbound.stop().await;
    inbound.stop().await;

    info!(
        written,
        channels = outbound.channels().len(),
        "relay-loopback finished"
    );
    Ok(())
}
