// Failure paths: stalled relays, deadlines, ordering and connection errors.

use std::sync::Arc;
use std::time::Duration;
use xswap_harness::address::encode_address;
use xswap_harness::chain::{ChainNode, SandboxProvider};
use xswap_harness::config::{HarnessConfig, InterfaceKind};
use xswap_harness::deploy::{query_cw20_balance, set_allowance};
use xswap_harness::environment::EnvironmentBuilder;
use xswap_harness::messages::VaultExecuteMsg;
use xswap_harness::mock::{MockOptions, MockSandbox};
use xswap_harness::response;
use xswap_harness::scenario::driver::{deploy_side, deploy_vault};
use xswap_harness::scenario::{run_cross_chain_swap, RelayMode, ScenarioContext, ScenarioState};
use xswap_harness::test_utils::{init_logs, mock_config, mock_sandbox, stalled_sandbox};
use xswap_harness::HarnessError;

#[tokio::test]
async fn stalled_relayer_times_out_polling() {
    init_logs();
    let sandbox = stalled_sandbox();
    let network = sandbox.network().clone();
    let config = mock_config();
    let err =
        run_cross_chain_swap(Arc::new(sandbox), &config, RelayMode::relayer(&config.polling)).await.unwrap_err();

    match &err {
        HarnessError::Transition { from, to, .. } => {
            assert_eq!(*from, ScenarioState::SwapInitiated);
            assert_eq!(*to, ScenarioState::PacketRelayed);
        }
        other => panic!("expected a failed transition, got {:?}", other),
    }
    match err.root() {
        HarnessError::RelayTimeout { chain_id, polls, blocks_per_poll } => {
            assert_eq!(chain_id, "juno-2");
            assert_eq!(*polls, 20);
            assert_eq!(*blocks_per_poll, 1);
        }
        other => panic!("expected RelayTimeout, got {:?}", other),
    }
    // torn down despite the failure
    assert!(network.is_released("juno-1").unwrap());
    assert!(!network.relayer_running().unwrap());
}

#[tokio::test]
async fn slow_blocks_hit_the_scenario_deadline() {
    init_logs();
    let sandbox = MockSandbox::with_options(MockOptions {
        relayer_stalled: true,
        block_time: Duration::from_millis(50),
        ..MockOptions::default()
    });
    let network = sandbox.network().clone();
    let mut config = mock_config();
    config.scenario_timeout = Duration::from_millis(300);

    let err =
        run_cross_chain_swap(Arc::new(sandbox), &config, RelayMode::relayer(&config.polling)).await.unwrap_err();
    assert!(matches!(err, HarnessError::ScenarioTimeout(d) if d == Duration::from_millis(300)));
    assert!(network.is_released("juno-2").unwrap());
}

#[tokio::test]
async fn relay_resumes_once_the_relayer_unstalls() {
    init_logs();
    let sandbox = stalled_sandbox();
    let network = sandbox.network().clone();
    let config = mock_config().with_relayer();
    let interchain = EnvironmentBuilder::new(Arc::new(sandbox)).build(&config).await.unwrap();

    let mut ctx = ScenarioContext::new(&interchain, &config, RelayMode::relayer(&config.polling)).unwrap();
    ctx.deploy_contracts().await.unwrap();
    ctx.deploy_vaults().await.unwrap();
    ctx.establish_connections().await.unwrap();
    ctx.initiate_swap().await.unwrap();

    let err = ctx.relay_packet().await.unwrap_err();
    assert!(matches!(err.root(), HarnessError::RelayTimeout { .. }));
    assert_eq!(ctx.state(), ScenarioState::SwapInitiated);

    network.set_relayer_stalled(false).unwrap();
    ctx.relay_packet().await.unwrap();
    ctx.acknowledge().await.unwrap();
    assert_eq!(ctx.state(), ScenarioState::SwapAcknowledged);

    let (env, side) = ctx.source().unwrap();
    assert_eq!(network.open_escrows(env.chain_id(), side.vault().unwrap()).unwrap(), 0);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn acknowledgement_waits_for_the_relayer() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let config = mock_config().with_relayer();
    let interchain = EnvironmentBuilder::new(Arc::new(sandbox)).build(&config).await.unwrap();

    let mut ctx = ScenarioContext::new(&interchain, &config, RelayMode::relayer(&config.polling)).unwrap();
    ctx.deploy_contracts().await.unwrap();
    ctx.deploy_vaults().await.unwrap();
    ctx.establish_connections().await.unwrap();
    ctx.initiate_swap().await.unwrap();
    ctx.relay_packet().await.unwrap();

    network.set_relayer_stalled(true).unwrap();
    let err = ctx.acknowledge().await.unwrap_err();
    match err.root() {
        HarnessError::RelayTimeout { chain_id, polls, .. } => {
            assert_eq!(chain_id, "juno-1");
            assert_eq!(*polls, 20);
        }
        other => panic!("expected RelayTimeout, got {:?}", other),
    }
    assert_eq!(ctx.state(), ScenarioState::PacketRelayed);
    assert_eq!(network.delivered_acks().unwrap(), 0);
    let (env, side) = ctx.source().unwrap();
    let (src_chain_id, src_vault) = (env.chain_id().to_string(), side.vault().unwrap().to_string());
    assert_eq!(network.open_escrows(&src_chain_id, &src_vault).unwrap(), 1);

    network.set_relayer_stalled(false).unwrap();
    ctx.acknowledge().await.unwrap();
    assert_eq!(ctx.state(), ScenarioState::SwapAcknowledged);
    assert_eq!(network.delivered_acks().unwrap(), 1);
    assert_eq!(network.open_escrows(&src_chain_id, &src_vault).unwrap(), 0);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn steps_must_run_in_order() {
    init_logs();
    let config = mock_config();
    let interchain = EnvironmentBuilder::new(Arc::new(mock_sandbox())).build(&config).await.unwrap();
    let mut ctx = ScenarioContext::new(&interchain, &config, RelayMode::DirectInjection).unwrap();

    match ctx.initiate_swap().await.unwrap_err() {
        HarnessError::InvalidTransition { from, to } => {
            assert_eq!(from, ScenarioState::Init);
            assert_eq!(to, ScenarioState::SwapInitiated);
        }
        other => panic!("expected InvalidTransition, got {:?}", other),
    }

    ctx.deploy_contracts().await.unwrap();
    ctx.deploy_vaults().await.unwrap();
    assert!(matches!(ctx.initiate_swap().await, Err(HarnessError::InvalidTransition { .. })));
    assert!(matches!(ctx.deploy_vaults().await, Err(HarnessError::InvalidTransition { .. })));
    assert_eq!(ctx.state(), ScenarioState::VaultDeployed);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn one_way_connection_is_rejected() {
    init_logs();
    let config = mock_config();
    let interchain = EnvironmentBuilder::new(Arc::new(mock_sandbox())).build(&config).await.unwrap();
    let mut ctx = ScenarioContext::new(&interchain, &config, RelayMode::DirectInjection).unwrap();
    ctx.deploy_contracts().await.unwrap();
    ctx.deploy_vaults().await.unwrap();

    let tx = ctx.connect(0, 1).await.unwrap();
    assert!(tx.is_committed());
    assert_eq!(ctx.connections().len(), 1);

    let err = ctx.confirm_connections().await.unwrap_err();
    assert!(matches!(err.root(), HarnessError::AsymmetricConnection { .. }));
    assert_eq!(ctx.state(), ScenarioState::VaultDeployed);

    ctx.connect(1, 0).await.unwrap();
    ctx.confirm_connections().await.unwrap();
    assert_eq!(ctx.state(), ScenarioState::ConnectionsEstablished);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn sending_over_an_unconnected_channel_fails_the_transaction() {
    init_logs();
    let sandbox = mock_sandbox();
    let network = sandbox.network().clone();
    let config = mock_config();
    let interchain = EnvironmentBuilder::new(Arc::new(sandbox)).build(&config).await.unwrap();
    let mut ctx = ScenarioContext::new(&interchain, &config, RelayMode::DirectInjection).unwrap();
    ctx.deploy_contracts().await.unwrap();
    ctx.deploy_vaults().await.unwrap();

    let (env, side) = ctx.source().unwrap();
    let (_, remote) = ctx.destination().unwrap();
    let swapper = env.swapper().unwrap();
    let msg = VaultExecuteMsg::SendAsset {
        channel_id: "channel-unknown".to_string(),
        to_vault: encode_address(remote.vault().unwrap()).unwrap(),
        to_account: encode_address(&swapper.address).unwrap(),
        from_asset: side.token(0).unwrap().address.clone(),
        to_asset_index: 0,
        amount: 100,
        min_out: "0".to_string(),
        fallback_account: swapper.address.clone(),
        calldata: String::new(),
    };
    let err = response::execute(env.node.as_ref(), &swapper.key_name, side.vault().unwrap(), &msg, &env.fees)
        .await
        .unwrap_err();
    match err {
        HarnessError::TransactionFailed { code, codespace, raw_log, .. } => {
            assert_eq!(code, 5);
            assert_eq!(codespace, "wasm");
            assert!(raw_log.contains("not connected"));
        }
        other => panic!("expected TransactionFailed, got {:?}", other),
    }
    assert_eq!(network.open_escrows(env.chain_id(), side.vault().unwrap()).unwrap(), 0);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn factory_allowances_accumulate() {
    init_logs();
    let mut config = HarnessConfig::single_chain();
    config.vault.balances = vec![15_000, 15_000];
    let interchain = EnvironmentBuilder::new(Arc::new(mock_sandbox())).build(&config).await.unwrap();
    let env = interchain.chain(0).unwrap();
    let gov = env.governance().unwrap();

    let mut side = deploy_side(env, 0, &config, InterfaceKind::ProofOfAuthority).await.unwrap();
    // a single 10_000 grant from deploy_vault would not cover 15_000
    for token in &side.tokens {
        set_allowance(env.node.as_ref(), &gov.key_name, &token.address, &side.factory.address, 10_000, &env.fees)
            .await
            .unwrap();
    }
    let vault = deploy_vault(env, &side, &config).await.unwrap();
    side.vault = Some(vault.clone());

    let held = query_cw20_balance(env.node.as_ref(), &side.token(0).unwrap().address, &vault).await.unwrap();
    assert_eq!(held, 15_000);
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn ibc_side_needs_an_interface_with_a_port() {
    init_logs();
    let mut config = HarnessConfig::single_chain();
    config.artifacts.interface_ibc = config.artifacts.interface_poa.clone();
    let interchain = EnvironmentBuilder::new(Arc::new(mock_sandbox())).build(&config).await.unwrap();
    let env = interchain.chain(0).unwrap();

    let err = deploy_side(env, 0, &config, InterfaceKind::Ibc).await.unwrap_err();
    assert!(matches!(err, HarnessError::Setup(ref reason) if reason.contains("no IBC port")));
    deploy_side(env, 0, &HarnessConfig::single_chain(), InterfaceKind::Ibc).await.unwrap();
    interchain.teardown().await.unwrap();
}

#[tokio::test]
async fn low_gas_limit_fails_vault_deployment() {
    init_logs();
    let mut config = mock_config();
    config.gas_limit = 1_000;
    let err = run_cross_chain_swap(Arc::new(mock_sandbox()), &config, RelayMode::DirectInjection).await.unwrap_err();
    match err.root() {
        HarnessError::TransactionFailed { code, .. } => assert_eq!(*code, 11),
        other => panic!("expected TransactionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn released_sandbox_cannot_be_reused() {
    init_logs();
    let sandbox = mock_sandbox();
    let chain = sandbox.provision(&Default::default(), 0).await.unwrap();
    sandbox.release(chain.as_ref()).await.unwrap();
    assert!(matches!(chain.height().await, Err(HarnessError::Setup(_))));
}
