use in_memory_bus::InMemoryBus;
use nats_relay::{ConnectionManager, RelayConfig, StreamingSettings};
use std::time::Duration;

pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn plain_manager(bus: &InMemoryBus) -> ConnectionManager {
    ConnectionManager::new(bus.connector())
}

#[allow(dead_code)]
pub(crate) fn streaming_manager(bus: &InMemoryBus) -> ConnectionManager {
    ConnectionManager::new(bus.connector()).with_streaming(bus.streaming_connector())
}

#[allow(dead_code)]
pub(crate) fn streaming_config(channels: &str, client_id: &str) -> RelayConfig {
    integration_test_utils::relay_config(channels)
        .with_streaming(StreamingSettings::new("test-cluster", client_id))
}

#[allow(dead_code)]
pub(crate) fn decode(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload).expect("relay output should be valid JSON")
}
