// Runs against real `junod` nodes and `rly`. Needs two local chains with
// funded faucet keys and the contract artifacts under `contracts/`:
//
//   XSWAP_CONFIG=harness.json cargo test --test live_sandbox_test -- --ignored

use std::sync::Arc;
use xswap_harness::cli::CliSandbox;
use xswap_harness::config::HarnessConfig;
use xswap_harness::scenario::{run_cross_chain_swap, RelayMode, ScenarioState};
use xswap_harness::test_utils::init_logs;

fn live_config() -> HarnessConfig {
    match std::env::var("XSWAP_CONFIG") {
        Ok(path) => HarnessConfig::from_json_file(path).expect("XSWAP_CONFIG is not a valid harness config"),
        Err(_) => HarnessConfig::default(),
    }
}

#[tokio::test]
#[ignore]
async fn live_direct_injection_swap() {
    init_logs();
    let config = live_config();
    let sandbox = CliSandbox::new(config.gas_limit);
    let report = run_cross_chain_swap(Arc::new(sandbox), &config, RelayMode::DirectInjection).await.unwrap();
    assert_eq!(report.final_state, ScenarioState::SwapAcknowledged);
    assert!(report.amount_received() > 0);
}

#[tokio::test]
#[ignore]
async fn live_relayed_swap() {
    init_logs();
    let config = live_config().with_relayer();
    let sandbox = CliSandbox::new(config.gas_limit);
    let mode = RelayMode::relayer(&config.polling);
    let report = run_cross_chain_swap(Arc::new(sandbox), &config, mode).await.unwrap();
    assert_eq!(report.final_state, ScenarioState::SwapAcknowledged);
}
