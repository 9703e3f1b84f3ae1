// Shared helpers for unit and integration tests.

use crate::config::HarnessConfig;
use crate::mock::{MockOptions, MockSandbox};
use std::time::Duration;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Info).try_init();
}

/// Default two-chain config with short relay polling.
pub fn mock_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.polling.max_polls = 20;
    config.polling.blocks_per_poll = 1;
    config.scenario_timeout = Duration::from_secs(30);
    config
}

pub fn mock_sandbox() -> MockSandbox {
    MockSandbox::new()
}

/// Sandbox whose relayer runs but never delivers.
pub fn stalled_sandbox() -> MockSandbox {
    MockSandbox::with_options(MockOptions { relayer_stalled: true, ..MockOptions::default() })
}
