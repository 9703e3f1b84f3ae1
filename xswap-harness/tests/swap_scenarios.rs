// End-to-end swap scenarios against the in-memory network.

use std::sync::Arc;
use xswap_harness::config::HarnessConfig;
use xswap_harness::scenario::{run_cross_chain_swap, run_local_swap, RelayMode, ScenarioState};
use xswap_harness::test_utils::{init_logs, mock_config, mock_sandbox};
use xswap_harness::HarnessError;

#[tokio::test]
async fn local_swap_follows_the_volatile_curve() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let report = run_local_swap(Arc::new(sandbox), &HarnessConfig::single_chain()).await.unwrap();

    assert_eq!(report.chain_id, "juno-1");
    assert_eq!(report.pool_before, (10_000, 10_000));
    assert_eq!(report.amount_in, 100);
    assert_eq!(report.amount_out, 99);
    assert!(report.amount_out <= report.pool_before.1);
    assert!(network.is_released("juno-1").unwrap());
}

#[tokio::test]
async fn local_swap_uses_only_the_first_chain() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let report = run_local_swap(Arc::new(sandbox), &mock_config()).await.unwrap();

    assert_eq!(report.amount_out, 99);
    assert!(network.is_released("juno-1").unwrap());
    assert!(!network.is_released("juno-2").unwrap_or(false));
}

#[tokio::test]
async fn direct_injection_swap_completes() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let report = run_cross_chain_swap(Arc::new(sandbox), &mock_config(), RelayMode::DirectInjection).await.unwrap();

    assert_eq!(report.final_state, ScenarioState::SwapAcknowledged);
    assert_eq!(report.source_chain, "juno-1");
    assert_eq!(report.destination_chain, "juno-2");
    assert_eq!(report.channels.source, report.channels.destination);
    assert_eq!(report.ack.as_ref().map(|a| a.as_str()), Some("AA=="));
    assert!(!report.packet.as_str().is_empty());
    assert_eq!(report.amount_sent, 100);
    assert!(report.amount_received() > 0);
    assert!(report.amount_received() < 10_000);

    // nothing was relayed by the network itself
    assert_eq!(network.delivered_packets().unwrap(), 0);
    assert!(network.is_released("juno-1").unwrap());
    assert!(network.is_released("juno-2").unwrap());
}

#[tokio::test]
async fn relayer_swap_is_delivered_and_acknowledged() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let config = mock_config();
    let mode = RelayMode::relayer(&config.polling);
    let report = run_cross_chain_swap(Arc::new(sandbox), &config, mode).await.unwrap();

    assert_eq!(report.final_state, ScenarioState::SwapAcknowledged);
    assert_eq!(report.channels.source, "channel-0");
    assert_eq!(report.channels.destination, "channel-0");
    assert!(report.ack.is_none());
    assert!(report.amount_received() > 0);
    assert_eq!(network.delivered_packets().unwrap(), 1);
    assert_eq!(network.delivered_acks().unwrap(), 1);
    assert!(!network.relayer_running().unwrap());
}

#[tokio::test]
async fn both_relay_modes_deliver_the_same_amount() {
    init_logs();
    let config = mock_config();
    let direct = run_cross_chain_swap(Arc::new(mock_sandbox()), &config, RelayMode::DirectInjection).await.unwrap();
    let relayed =
        run_cross_chain_swap(Arc::new(mock_sandbox()), &config, RelayMode::relayer(&config.polling)).await.unwrap();
    assert_eq!(direct.amount_received(), relayed.amount_received());
}

#[tokio::test]
async fn repeated_runs_produce_identical_coordinates() {
    init_logs();
    let config = mock_config();
    let first = run_cross_chain_swap(Arc::new(mock_sandbox()), &config, RelayMode::DirectInjection).await.unwrap();
    let second = run_cross_chain_swap(Arc::new(mock_sandbox()), &config, RelayMode::DirectInjection).await.unwrap();

    assert_eq!(first.source_vault, second.source_vault);
    assert_eq!(first.destination_vault, second.destination_vault);
    assert_eq!(first.packet, second.packet);
    assert_eq!(first.ack, second.ack);
}

#[tokio::test]
async fn unreachable_min_out_is_reported_as_a_rejected_swap() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let mut config = mock_config();
    config.swap.min_out = "1000000".to_string();
    let err = run_cross_chain_swap(Arc::new(sandbox), &config, RelayMode::DirectInjection).await.unwrap_err();

    match &err {
        HarnessError::Transition { from, to, .. } => {
            assert_eq!(*from, ScenarioState::SwapInitiated);
            assert_eq!(*to, ScenarioState::PacketRelayed);
        }
        other => panic!("expected a failed transition, got {:?}", other),
    }
    match err.root() {
        HarnessError::SwapRejected { chain_id, txhash, ack } => {
            assert_eq!(chain_id, "juno-2");
            assert!(!txhash.is_empty());
            assert_eq!(ack.as_deref(), Some("AQ=="));
        }
        other => panic!("expected SwapRejected, got {:?}", other),
    }
    assert!(network.is_released("juno-2").unwrap());
}
