use super::types::{
    AckPayload, ChannelPair, ConnectionSet, CrossChainSwapReport, LocalSwapReport, PacketPayload, RelayMode,
    ScenarioState, SideDeployment, SwapIntent, VaultConnection,
};
use crate::address::encode_address;
use crate::chain::SandboxProvider;
use crate::config::{HarnessConfig, InterfaceKind, DEFAULT_CHANNEL_ID};
use crate::deploy::{deploy_contract, query_cw20_balance, set_allowance, store_code, transfer_tokens};
use crate::environment::{ChainEnvironment, EnvironmentBuilder, Interchain};
use crate::error::{HarnessError, Result};
use crate::messages::{
    Cw20Coin, Cw20InstantiateMsg, FactoryExecuteMsg, FactoryInstantiateMsg, InterfaceExecuteMsg,
    InterfaceInstantiateMsg, MinterResponse, VaultExecuteMsg,
};
use crate::response::{self, coordinates, TransactionResponse};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{error::Elapsed, timeout};

/// Deploys the full contract set on one chain.
pub async fn deploy_side(
    env: &ChainEnvironment,
    chain_index: usize,
    config: &HarnessConfig,
    interface_kind: InterfaceKind,
) -> Result<SideDeployment> {
    let node = env.node.as_ref();
    let gov = env.governance()?;
    let artifacts = &config.artifacts;

    let factory = deploy_contract(node, &gov.key_name, &artifacts.factory, &FactoryInstantiateMsg::default()).await?;
    let interface =
        deploy_contract(node, &gov.key_name, artifacts.interface(interface_kind), &InterfaceInstantiateMsg::default())
            .await?;

    if interface_kind == InterfaceKind::Ibc {
        // the relayer can only deliver to an interface bound to a port
        let info = node.contract_info(&interface.address).await?;
        if info.ibc_port_id.is_empty() {
            return Err(HarnessError::Setup(format!(
                "[{}] interface {} has no IBC port bound",
                env.chain_id(),
                interface.address
            )));
        }
        log::info!("[{}] interface port: {}", env.chain_id(), info.ibc_port_id);
    }

    let mut tokens = Vec::with_capacity(config.tokens.len());
    for token in &config.tokens {
        let init = Cw20InstantiateMsg {
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            initial_balances: vec![Cw20Coin { address: gov.address.clone(), amount: token.initial_supply }],
            mint: Some(MinterResponse { minter: gov.address.clone(), cap: None }),
        };
        tokens.push(deploy_contract(node, &gov.key_name, &artifacts.cw20, &init).await?);
    }

    let vault_code_id = store_code(node, &gov.key_name, &artifacts.vault_volatile).await?;

    Ok(SideDeployment {
        chain_index,
        factory,
        interface,
        interface_kind,
        tokens,
        vault_code_id,
        vault: None,
    })
}

/// Approves the factory for each asset and deploys a vault through it.
/// Returns the vault address read from the deployment transaction.
pub async fn deploy_vault(env: &ChainEnvironment, side: &SideDeployment, config: &HarnessConfig) -> Result<String> {
    let node = env.node.as_ref();
    let gov = env.governance()?;

    for token in &side.tokens {
        set_allowance(node, &gov.key_name, &token.address, &side.factory.address, config.vault.factory_allowance, &env.fees)
            .await?;
    }

    let msg = FactoryExecuteMsg::DeployVault {
        vault_code_id: side.vault_code_id,
        assets: side.tokens.iter().map(|t| t.address.clone()).collect(),
        assets_balances: config.vault.balances.clone(),
        weights: config.vault.weights.clone(),
        amplification: config.vault.amplification.clone(),
        vault_fee: config.vault.vault_fee.clone(),
        name: config.vault.name.clone(),
        symbol: config.vault.symbol.clone(),
        chain_interface: Some(side.interface.address.clone()),
    };
    let tx = response::execute(node, &gov.key_name, &side.factory.address, &msg, &env.fees).await?;
    let vault = tx.extract_at(coordinates::VAULT_ADDRESS)?.to_string();
    log::info!("[{}] vault deployed at {} (tx {})", env.chain_id(), vault, tx.txhash);
    Ok(vault)
}

/// Explicit state of one scenario run. Every step checks it is the next
/// transition, and a failing step leaves the state where it was.
pub struct ScenarioContext<'a> {
    interchain: &'a Interchain,
    config: &'a HarnessConfig,
    mode: RelayMode,
    state: ScenarioState,
    // environment indices of the sending and receiving chain
    source: usize,
    destination: usize,
    channels: ChannelPair,
    sides: Vec<SideDeployment>,
    connections: ConnectionSet,
    packet: Option<PacketPayload>,
    ack: Option<AckPayload>,
    recipient_balance_before: u128,
}

impl<'a> ScenarioContext<'a> {
    /// Source and destination are the relayer's path ends when one is
    /// running, otherwise chains 0 and 1 (the same chain on a single-chain
    /// interchain).
    pub fn new(interchain: &'a Interchain, config: &'a HarnessConfig, mode: RelayMode) -> Result<Self> {
        let (source, destination, channels) = match (&mode, &interchain.relayer) {
            (RelayMode::Relayer { .. }, Some(link)) => (
                link.chains.0,
                link.chains.1,
                ChannelPair {
                    source: link.channels.0.channel_id.clone(),
                    destination: link.channels.1.channel_id.clone(),
                },
            ),
            (RelayMode::Relayer { .. }, None) => {
                return Err(HarnessError::Setup("relayer mode needs a relayer path".to_string()))
            }
            (RelayMode::DirectInjection, _) => {
                let destination = if interchain.environments.len() > 1 { 1 } else { 0 };
                (0, destination, ChannelPair::shared(&config.swap.channel_id))
            }
        };
        interchain.chain(source)?;
        interchain.chain(destination)?;

        Ok(ScenarioContext {
            interchain,
            config,
            mode,
            state: ScenarioState::Init,
            source,
            destination,
            channels,
            sides: Vec::new(),
            connections: ConnectionSet::default(),
            packet: None,
            ack: None,
            recipient_balance_before: 0,
        })
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn channels(&self) -> &ChannelPair {
        &self.channels
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn packet(&self) -> Option<&PacketPayload> {
        self.packet.as_ref()
    }

    pub fn ack(&self) -> Option<&AckPayload> {
        self.ack.as_ref()
    }

    pub fn source(&self) -> Result<(&'a ChainEnvironment, &SideDeployment)> {
        self.side(self.source)
    }

    pub fn destination(&self) -> Result<(&'a ChainEnvironment, &SideDeployment)> {
        self.side(self.destination)
    }

    fn side(&self, index: usize) -> Result<(&'a ChainEnvironment, &SideDeployment)> {
        let env = self.interchain.chain(index)?;
        let side = self
            .sides
            .iter()
            .find(|s| s.chain_index == index)
            .ok_or_else(|| HarnessError::Setup(format!("nothing deployed on {}", env.chain_id())))?;
        Ok((env, side))
    }

    fn side_mut(&mut self, index: usize) -> Result<&mut SideDeployment> {
        self.sides
            .iter_mut()
            .find(|s| s.chain_index == index)
            .ok_or_else(|| HarnessError::Setup(format!("nothing deployed on chain #{}", index)))
    }

    fn distinct_sides(&self) -> Vec<usize> {
        if self.source == self.destination {
            vec![self.source]
        } else {
            vec![self.source, self.destination]
        }
    }

    fn require_state(&self, expected: ScenarioState, attempted: ScenarioState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HarnessError::InvalidTransition { from: self.state, to: attempted })
        }
    }

    /// Runs `step` as the transition to `to`.
    async fn advance<T, F>(&mut self, to: ScenarioState, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.state.next() != Some(to) {
            return Err(HarnessError::InvalidTransition { from: self.state, to });
        }
        let from = self.state;
        log::info!("Scenario: {:?} -> {:?}", from, to);
        match step.await {
            Ok(value) => {
                self.state = to;
                Ok(value)
            }
            Err(source) => {
                log::warn!("Scenario: {:?} -> {:?} failed: {}", from, to, source);
                Err(HarnessError::Transition { from, to, source: Box::new(source) })
            }
        }
    }

    /// Deploys factory, interface, tokens and vault code on each side, the
    /// two sides concurrently.
    pub async fn deploy_contracts(&mut self) -> Result<()> {
        let kind = self.mode.interface_kind();
        let (interchain, config) = (self.interchain, self.config);
        let indices = self.distinct_sides();

        let step = async move {
            match indices.as_slice() {
                [only] => {
                    let side = deploy_side(interchain.chain(*only)?, *only, config, kind).await?;
                    Ok::<_, HarnessError>(vec![side])
                }
                [a, b] => {
                    let (env_a, env_b) = (interchain.chain(*a)?, interchain.chain(*b)?);
                    let (side_a, side_b) =
                        futures::try_join!(deploy_side(env_a, *a, config, kind), deploy_side(env_b, *b, config, kind))?;
                    Ok(vec![side_a, side_b])
                }
                _ => Err(HarnessError::Setup("scenario spans one or two chains".to_string())),
            }
        };
        self.sides = self.advance(ScenarioState::FactoryDeployed, step).await?;
        Ok(())
    }

    pub async fn deploy_vaults(&mut self) -> Result<()> {
        self.require_state(ScenarioState::FactoryDeployed, ScenarioState::VaultDeployed)?;
        let config = self.config;
        let mut targets = Vec::new();
        for index in self.distinct_sides() {
            let (env, side) = self.side(index)?;
            targets.push((index, env, side.clone()));
        }

        let step = async move {
            let mut vaults = Vec::with_capacity(targets.len());
            for (index, env, side) in &targets {
                vaults.push((*index, deploy_vault(env, side, config).await?));
            }
            Ok::<_, HarnessError>(vaults)
        };
        for (index, vault) in self.advance(ScenarioState::VaultDeployed, step).await? {
            self.side_mut(index)?.vault = Some(vault);
        }
        Ok(())
    }

    /// Registers one direction of the vault connection without changing
    /// state. `establish_connections` does both.
    pub async fn connect(&mut self, from: usize, to: usize) -> Result<TransactionResponse> {
        self.require_state(ScenarioState::VaultDeployed, ScenarioState::ConnectionsEstablished)?;
        let channel_id = if from == self.source { &self.channels.source } else { &self.channels.destination };
        let (env, side) = self.side(from)?;
        let remote = encode_address(self.side(to)?.1.vault()?)?;
        let vault = side.vault()?.to_string();

        let msg = VaultExecuteMsg::SetConnection { channel_id: channel_id.clone(), to_vault: remote.clone(), state: true };
        let tx = response::execute(env.node.as_ref(), &env.governance()?.key_name, &vault, &msg, &env.fees).await?;
        log::info!("[{}] {} connected to {} over {}", env.chain_id(), vault, remote, channel_id);

        let connection = VaultConnection { from_vault: vault, channel_id: channel_id.clone(), to_vault: remote, enabled: true };
        self.connections.register(connection);
        Ok(tx)
    }

    /// Connects both vaults to each other and requires the pair to be
    /// symmetric.
    pub async fn establish_connections(&mut self) -> Result<()> {
        self.require_state(ScenarioState::VaultDeployed, ScenarioState::ConnectionsEstablished)?;
        let (source, destination) = (self.source, self.destination);
        let connected = match self.connect(source, destination).await {
            Ok(_) => self.connect(destination, source).await.map(|_| ()),
            Err(e) => Err(e),
        };
        let checked = connected.and_then(|()| self.check_symmetric());
        self.advance(ScenarioState::ConnectionsEstablished, async move { checked }).await
    }

    /// Moves to `ConnectionsEstablished` after directions were registered
    /// with [`ScenarioContext::connect`].
    pub async fn confirm_connections(&mut self) -> Result<()> {
        let checked = self.check_symmetric();
        self.advance(ScenarioState::ConnectionsEstablished, async move { checked }).await
    }

    fn check_symmetric(&self) -> Result<()> {
        let source_vault = self.source()?.1.vault()?;
        let destination_vault = self.destination()?.1.vault()?;
        self.connections.require_symmetric(
            source_vault,
            &self.channels.source,
            destination_vault,
            &self.channels.destination,
        )
    }

    /// Funds the source swapper, approves the vault and sends the swap.
    pub async fn initiate_swap(&mut self) -> Result<()> {
        self.require_state(ScenarioState::ConnectionsEstablished, ScenarioState::SwapInitiated)?;
        let (config, channels) = (self.config, self.channels.clone());
        let (src_env, src) = self.source()?;
        let (dst_env, dst) = self.destination()?;
        let (src, dst) = (src.clone(), dst.clone());
        let source_check = self.check_symmetric();

        let step = async move {
            source_check?;
            let node = src_env.node.as_ref();
            let (gov, swapper) = (src_env.governance()?, src_env.swapper()?);
            let recipient = dst_env.swapper()?;
            let from_asset = src.token(config.swap.from_asset_index)?.address.clone();
            let to_asset = dst.token(config.swap.to_asset_index as usize)?.address.clone();
            let vault = src.vault()?;
            let amount = config.swap.amount;

            transfer_tokens(node, &gov.key_name, &from_asset, &swapper.address, amount, &src_env.fees).await?;
            set_allowance(node, &swapper.key_name, &from_asset, vault, amount, &src_env.fees).await?;
            let before = query_cw20_balance(dst_env.node.as_ref(), &to_asset, &recipient.address).await?;

            let intent = SwapIntent {
                from_asset,
                to_asset_index: config.swap.to_asset_index,
                amount,
                min_out: config.swap.min_out.clone(),
                to_account: encode_address(&recipient.address)?,
                fallback_account: swapper.address.clone(),
            };
            let msg = intent.into_message(&channels.source, encode_address(dst.vault()?)?, &config.swap.calldata);
            let tx = response::execute(node, &swapper.key_name, vault, &msg, &src_env.fees).await?;
            let packet = PacketPayload::new(tx.extract_at(coordinates::PACKET_DATA)?);
            log::info!("[{}] swap of {} sent in tx {}", src_env.chain_id(), amount, tx.txhash);
            Ok::<_, HarnessError>((packet, before))
        };
        let (packet, before) = self.advance(ScenarioState::SwapInitiated, step).await?;
        self.packet = Some(packet);
        self.recipient_balance_before = before;
        Ok(())
    }

    /// Gets the packet to the destination: submitted by hand under direct
    /// injection, otherwise waits for the relayer by polling the recipient's
    /// balance. Either way the recipient must end up credited.
    pub async fn relay_packet(&mut self) -> Result<()> {
        self.require_state(ScenarioState::SwapInitiated, ScenarioState::PacketRelayed)?;
        let (config, mode, channels) = (self.config, self.mode, self.channels.clone());
        let packet = self.packet.clone();
        let before = self.recipient_balance_before;
        let (dst_env, dst) = self.destination()?;
        let dst = dst.clone();

        let step = async move {
            let packet = packet.ok_or_else(|| HarnessError::Setup("no packet captured".to_string()))?;
            match mode {
                RelayMode::DirectInjection => {
                    let msg = InterfaceExecuteMsg::IbcPacketReceive {
                        data: packet.as_str().to_string(),
                        channel_id: channels.destination.clone(),
                    };
                    let gov = dst_env.governance()?;
                    let tx =
                        response::execute(dst_env.node.as_ref(), &gov.key_name, &dst.interface.address, &msg, &dst_env.fees)
                            .await?;
                    // A rejected swap still commits; only the recipient's balance tells.
                    let token = dst.token(config.swap.to_asset_index as usize)?;
                    let recipient = dst_env.swapper()?;
                    let balance = query_cw20_balance(dst_env.node.as_ref(), &token.address, &recipient.address).await?;
                    if balance == before {
                        return Err(HarnessError::SwapRejected {
                            chain_id: dst_env.chain_id().to_string(),
                            txhash: tx.txhash.clone(),
                            ack: tx.find_attribute("wasm", "ack").ok().map(str::to_string),
                        });
                    }
                    let ack = AckPayload::new(tx.extract_at(coordinates::PACKET_ACK)?);
                    log::info!("[{}] packet injected in tx {}, ack {}", dst_env.chain_id(), tx.txhash, ack);
                    Ok::<_, HarnessError>(Some(ack))
                }
                RelayMode::Relayer { max_polls, blocks_per_poll } => {
                    let token = dst.token(config.swap.to_asset_index as usize)?;
                    let recipient = dst_env.swapper()?;
                    for poll in 1..=max_polls {
                        dst_env.node.wait_for_blocks(blocks_per_poll).await?;
                        let balance = query_cw20_balance(dst_env.node.as_ref(), &token.address, &recipient.address).await?;
                        if balance != before {
                            log::info!("[{}] packet relayed after {} polls", dst_env.chain_id(), poll);
                            return Ok(None);
                        }
                    }
                    Err(HarnessError::RelayTimeout {
                        chain_id: dst_env.chain_id().to_string(),
                        polls: max_polls,
                        blocks_per_poll,
                    })
                }
            }
        };
        self.ack = self.advance(ScenarioState::PacketRelayed, step).await?;
        Ok(())
    }

    /// Closes the swap on the source chain. With a relayer, flushes pending
    /// acknowledgements and waits until none is left on the source channel.
    pub async fn acknowledge(&mut self) -> Result<()> {
        self.require_state(ScenarioState::PacketRelayed, ScenarioState::SwapAcknowledged)?;
        let (mode, channels) = (self.mode, self.channels.clone());
        let (packet, ack) = (self.packet.clone(), self.ack.clone());
        let interchain = self.interchain;
        let relayer = interchain.relayer.as_ref();
        let (src_env, src) = self.source()?;
        let interface = src.interface.address.clone();

        let step = async move {
            match mode {
                RelayMode::DirectInjection => {
                    let packet = packet.ok_or_else(|| HarnessError::Setup("no packet captured".to_string()))?;
                    let ack = ack.ok_or_else(|| HarnessError::Setup("no acknowledgement captured".to_string()))?;
                    let msg = InterfaceExecuteMsg::IbcPacketAck {
                        data: packet.as_str().to_string(),
                        response: ack.as_str().to_string(),
                        channel_id: channels.source.clone(),
                    };
                    let gov = src_env.governance()?;
                    let tx = response::execute(src_env.node.as_ref(), &gov.key_name, &interface, &msg, &src_env.fees).await?;
                    log::info!("[{}] ack submitted in tx {}", src_env.chain_id(), tx.txhash);
                    Ok::<_, HarnessError>(())
                }
                RelayMode::Relayer { max_polls, blocks_per_poll } => {
                    let link = relayer.ok_or_else(|| HarnessError::Setup("relayer mode needs a relayer path".to_string()))?;
                    link.relayer.flush_acknowledgements(&link.path, &channels.source).await?;
                    for poll in 1..=max_polls {
                        let pending = link.relayer.unrelayed_acknowledgements(&link.path, &channels.source).await?;
                        if pending == 0 {
                            log::info!("[{}] acknowledgement relayed after {} polls", src_env.chain_id(), poll);
                            return Ok(());
                        }
                        src_env.node.wait_for_blocks(blocks_per_poll).await?;
                    }
                    Err(HarnessError::RelayTimeout {
                        chain_id: src_env.chain_id().to_string(),
                        polls: max_polls,
                        blocks_per_poll,
                    })
                }
            }
        };
        self.advance(ScenarioState::SwapAcknowledged, step).await
    }

    /// Swaps `amount` of the first asset for the second inside the source
    /// vault. Needs deployed vaults and does not advance the state.
    pub async fn local_swap(&self, amount: u128) -> Result<LocalSwapReport> {
        if self.state < ScenarioState::VaultDeployed {
            return Err(HarnessError::InvalidTransition { from: self.state, to: ScenarioState::VaultDeployed });
        }
        let (env, side) = self.source()?;
        let node = env.node.as_ref();
        let (gov, swapper) = (env.governance()?, env.swapper()?);
        let vault = side.vault()?;
        let from_asset = side.token(0)?.address.clone();
        let to_asset = side.token(1)?.address.clone();

        let pool_before =
            (query_cw20_balance(node, &from_asset, vault).await?, query_cw20_balance(node, &to_asset, vault).await?);
        transfer_tokens(node, &gov.key_name, &from_asset, &swapper.address, amount, &env.fees).await?;
        set_allowance(node, &swapper.key_name, &from_asset, vault, amount, &env.fees).await?;
        let before = query_cw20_balance(node, &to_asset, &swapper.address).await?;

        let msg = VaultExecuteMsg::LocalSwap { from_asset: from_asset.clone(), to_asset: to_asset.clone(), amount, min_out: 0 };
        let tx = response::execute(node, &swapper.key_name, vault, &msg, &env.fees).await?;
        let after = query_cw20_balance(node, &to_asset, &swapper.address).await?;
        log::info!("[{}] local swap {} -> {} in tx {}", env.chain_id(), amount, after.saturating_sub(before), tx.txhash);

        Ok(LocalSwapReport {
            chain_id: env.chain_id().to_string(),
            vault: vault.to_string(),
            from_asset,
            to_asset,
            pool_before,
            amount_in: amount,
            amount_out: after.saturating_sub(before),
        })
    }

    pub async fn report(&self) -> Result<CrossChainSwapReport> {
        let (src_env, src) = self.source()?;
        let (dst_env, dst) = self.destination()?;
        let token = dst.token(self.config.swap.to_asset_index as usize)?;
        let recipient = dst_env.swapper()?;
        let after = query_cw20_balance(dst_env.node.as_ref(), &token.address, &recipient.address).await?;

        Ok(CrossChainSwapReport {
            relay_mode: self.mode,
            source_chain: src_env.chain_id().to_string(),
            destination_chain: dst_env.chain_id().to_string(),
            channels: self.channels.clone(),
            source_vault: src.vault()?.to_string(),
            destination_vault: dst.vault()?.to_string(),
            packet: self.packet.clone().ok_or_else(|| HarnessError::Setup("no packet captured".to_string()))?,
            ack: self.ack.clone(),
            amount_sent: self.config.swap.amount,
            recipient_balance_before: self.recipient_balance_before,
            recipient_balance_after: after,
            final_state: self.state,
        })
    }
}

/// Tears the interchain down whatever the scenario outcome and maps an
/// elapsed deadline to [`HarnessError::ScenarioTimeout`].
async fn conclude<T>(
    interchain: Interchain,
    deadline: Duration,
    outcome: std::result::Result<Result<T>, Elapsed>,
) -> Result<T> {
    let teardown = interchain.teardown().await;
    match outcome {
        Err(_) => {
            log::warn!("Scenario exceeded {:?}", deadline);
            Err(HarnessError::ScenarioTimeout(deadline))
        }
        Ok(result) => {
            let value = result?;
            teardown?;
            Ok(value)
        }
    }
}

async fn cross_chain_steps(
    interchain: &Interchain,
    config: &HarnessConfig,
    mode: RelayMode,
) -> Result<CrossChainSwapReport> {
    let mut ctx = ScenarioContext::new(interchain, config, mode)?;
    ctx.deploy_contracts().await?;
    ctx.deploy_vaults().await?;
    ctx.establish_connections().await?;
    ctx.initiate_swap().await?;
    ctx.relay_packet().await?;
    ctx.acknowledge().await?;
    ctx.report().await
}

async fn local_swap_steps(interchain: &Interchain, config: &HarnessConfig) -> Result<LocalSwapReport> {
    let mut ctx = ScenarioContext::new(interchain, config, RelayMode::DirectInjection)?;
    ctx.deploy_contracts().await?;
    ctx.deploy_vaults().await?;
    ctx.local_swap(config.swap.amount).await
}

/// Swap from chain A to chain B and back-acknowledge, through every state.
/// Setup is not counted against `scenario_timeout`; teardown always runs.
pub async fn run_cross_chain_swap(
    provider: Arc<dyn SandboxProvider>,
    config: &HarnessConfig,
    mode: RelayMode,
) -> Result<CrossChainSwapReport> {
    let mut config = config.clone();
    match mode {
        RelayMode::Relayer { .. } if config.relayer.is_none() => config = config.with_relayer(),
        RelayMode::DirectInjection if config.swap.channel_id.is_empty() => {
            config.swap.channel_id = DEFAULT_CHANNEL_ID.to_string()
        }
        _ => {}
    }
    if config.chains.len() < 2 {
        return Err(HarnessError::Config("a cross-chain swap needs two chains".to_string()));
    }

    let interchain = EnvironmentBuilder::new(provider).build(&config).await?;
    let outcome = timeout(config.scenario_timeout, cross_chain_steps(&interchain, &config, mode)).await;
    conclude(interchain, config.scenario_timeout, outcome).await
}

/// Single-chain swap through one vault.
pub async fn run_local_swap(provider: Arc<dyn SandboxProvider>, config: &HarnessConfig) -> Result<LocalSwapReport> {
    let mut config = config.clone();
    config.chains.truncate(1);
    config.relayer = None;

    let interchain = EnvironmentBuilder::new(provider).build(&config).await?;
    let outcome = timeout(config.scenario_timeout, local_swap_steps(&interchain, &config)).await;
    conclude(interchain, config.scenario_timeout, outcome).await
}
