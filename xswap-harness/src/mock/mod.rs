// In-memory chain framework used by the tests: chains, accounts, the
// contract set and a relayer with configurable latency.

pub mod chain;
mod contracts;
pub mod relayer;

pub use chain::MockChain;
pub use relayer::MockRelayer;

use crate::chain::{ChainConfig, ChainNode, FeeConfig, FundedAccount, Relayer, SandboxProvider};
use crate::config::{ChainSpec, InterfaceKind, RelayerSpec};
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use chain::{derive_address, ChainState, OutboundPacket};
use contracts::ContractState;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const MSG_RECV_PACKET: &str = "/ibc.core.channel.v1.MsgRecvPacket";
const MSG_ACKNOWLEDGEMENT: &str = "/ibc.core.channel.v1.MsgAcknowledgement";

#[derive(Clone, Debug)]
pub struct MockOptions {
    /// Blocks between a packet (or ack) being picked up and delivered.
    pub relay_delay_blocks: u64,
    /// Relayer runs but never delivers anything.
    pub relayer_stalled: bool,
    /// Wall-clock time per block in `wait_for_blocks`.
    pub block_time: Duration,
}

impl Default for MockOptions {
    fn default() -> Self {
        MockOptions { relay_delay_blocks: 3, relayer_stalled: false, block_time: Duration::ZERO }
    }
}

#[derive(Clone, Debug)]
struct Link {
    path: String,
    a: (String, String),
    b: (String, String),
}

impl Link {
    /// Chain and channel on the other side of `(chain_id, channel_id)`.
    fn counterparty(&self, chain_id: &str, channel_id: &str) -> Option<&(String, String)> {
        if self.a.0 == chain_id && self.a.1 == channel_id {
            Some(&self.b)
        } else if self.b.0 == chain_id && self.b.1 == channel_id {
            Some(&self.a)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct InFlight {
    source_chain: String,
    packet: OutboundPacket,
    ready_at: u64,
}

#[derive(Debug)]
struct PendingAck {
    chain_id: String,
    channel_id: String,
    data: String,
    ack: String,
    ready_at: u64,
}

#[derive(Default)]
pub(crate) struct NetworkState {
    chains: BTreeMap<String, ChainState>,
    released: BTreeSet<String>,
    links: Vec<Link>,
    running: BTreeSet<String>,
    in_flight: Vec<InFlight>,
    pending_acks: Vec<PendingAck>,
    // blocks waited on any chain; relay latency is measured against this
    blocks: u64,
    delivered_packets: u64,
    delivered_acks: u64,
    options: MockOptions,
}

fn ibc_interface(chain: &ChainState) -> Option<String> {
    chain.contracts.iter().find_map(|(address, contract)| match &contract.state {
        ContractState::Interface(iface) if iface.kind == InterfaceKind::Ibc => Some(address.clone()),
        _ => None,
    })
}

fn relayer_fees() -> FeeConfig {
    FeeConfig { gas_limit: 1_000_000, gas_prices: String::new() }
}

impl NetworkState {
    fn relay(&mut self) {
        if self.running.is_empty() || self.options.relayer_stalled {
            return;
        }
        let now = self.blocks;
        let delay = self.options.relay_delay_blocks;

        for (chain_id, chain) in self.chains.iter_mut() {
            for packet in chain.outbox.drain(..) {
                log::debug!("[MockRelayer] picked up packet on {}/{}", chain_id, packet.channel_id);
                self.in_flight.push(InFlight { source_chain: chain_id.clone(), packet, ready_at: now + delay });
            }
        }

        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.in_flight).into_iter().partition(|f| f.ready_at <= now);
        self.in_flight = waiting;
        for flight in ready {
            self.deliver_packet(flight, now + delay);
        }

        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending_acks).into_iter().partition(|a| a.ready_at <= now);
        self.pending_acks = waiting;
        for ack in ready {
            self.deliver_ack(ack);
        }
    }

    fn deliver_packet(&mut self, flight: InFlight, ack_ready_at: u64) {
        let Some((dest_chain, dest_channel)) = self
            .links
            .iter()
            .find_map(|l| l.counterparty(&flight.source_chain, &flight.packet.channel_id))
            .cloned()
        else {
            log::warn!(
                "[MockRelayer] no link for {}/{}; dropping packet",
                flight.source_chain,
                flight.packet.channel_id
            );
            return;
        };
        let Some(dest) = self.chains.get_mut(&dest_chain) else {
            return;
        };
        let Some(interface) = ibc_interface(dest) else {
            log::warn!("[MockRelayer] {} has no IBC interface bound; dropping packet", dest_chain);
            return;
        };

        let relayer = derive_address(&dest.config.bech32_prefix, "relayer", 38);
        let mut ack = String::new();
        dest.submit(&relayer, MSG_RECV_PACKET, &relayer_fees(), |state, em| {
            ack = contracts::deliver_packet(state, em, &interface, &dest_channel, &flight.packet.data);
            Ok(())
        });
        self.delivered_packets += 1;
        log::info!("[MockRelayer] delivered packet {}/{} -> {}/{}", flight.source_chain, flight.packet.channel_id, dest_chain, dest_channel);

        self.pending_acks.push(PendingAck {
            chain_id: flight.source_chain,
            channel_id: flight.packet.channel_id,
            data: flight.packet.data,
            ack,
            ready_at: ack_ready_at,
        });
    }

    fn deliver_ack(&mut self, pending: PendingAck) {
        let Some(source) = self.chains.get_mut(&pending.chain_id) else {
            return;
        };
        let Some(interface) = ibc_interface(source) else {
            return;
        };
        let relayer = derive_address(&source.config.bech32_prefix, "relayer", 38);
        let tx = source.submit(&relayer, MSG_ACKNOWLEDGEMENT, &relayer_fees(), |state, em| {
            contracts::deliver_ack(state, em, &interface, &pending.channel_id, &pending.data, &pending.ack)
        });
        if tx.is_committed() {
            self.delivered_acks += 1;
            log::info!("[MockRelayer] acknowledged packet on {}/{}", pending.chain_id, pending.channel_id);
        } else {
            log::warn!("[MockRelayer] ack on {}/{} failed: {}", pending.chain_id, pending.channel_id, tx.raw_log);
        }
    }
}

/// Shared state of every mock chain and the relayer. Lock scopes never span
/// an await.
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new(options: MockOptions) -> Self {
        MockNetwork { state: Arc::new(Mutex::new(NetworkState { options, ..Default::default() })) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, NetworkState>> {
        self.state.lock().map_err(|_| HarnessError::Setup("mock network state poisoned".to_string()))
    }

    pub(crate) fn with_chain<R>(&self, chain_id: &str, f: impl FnOnce(&mut ChainState) -> Result<R>) -> Result<R> {
        let mut state = self.lock()?;
        if state.released.contains(chain_id) {
            return Err(HarnessError::Setup(format!("chain {} has been released", chain_id)));
        }
        let chain = state
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| HarnessError::Setup(format!("unknown chain {}", chain_id)))?;
        f(chain)
    }

    fn block_time(&self) -> Result<Duration> {
        Ok(self.lock()?.options.block_time)
    }

    /// Produces `blocks` empty blocks on `chain_id` and lets the relayer act.
    fn advance(&self, chain_id: &str, blocks: u64) -> Result<()> {
        let mut state = self.lock()?;
        state
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| HarnessError::Setup(format!("unknown chain {}", chain_id)))?
            .height += blocks;
        state.blocks += blocks;
        state.relay();
        Ok(())
    }

    fn add_chain(&self, config: ChainConfig) -> Result<()> {
        let mut state = self.lock()?;
        if state.chains.contains_key(&config.chain_id) && !state.released.contains(&config.chain_id) {
            return Err(HarnessError::Setup(format!("chain {} already provisioned", config.chain_id)));
        }
        state.released.remove(&config.chain_id);
        state.chains.insert(config.chain_id.clone(), ChainState::new(config));
        Ok(())
    }

    pub fn set_relayer_stalled(&self, stalled: bool) -> Result<()> {
        self.lock()?.options.relayer_stalled = stalled;
        Ok(())
    }

    pub fn delivered_packets(&self) -> Result<u64> {
        Ok(self.lock()?.delivered_packets)
    }

    pub fn delivered_acks(&self) -> Result<u64> {
        Ok(self.lock()?.delivered_acks)
    }

    pub fn is_released(&self, chain_id: &str) -> Result<bool> {
        Ok(self.lock()?.released.contains(chain_id))
    }

    pub fn relayer_running(&self) -> Result<bool> {
        Ok(!self.lock()?.running.is_empty())
    }

    /// Swaps sent from `vault` that have not been acknowledged yet.
    pub fn open_escrows(&self, chain_id: &str, vault: &str) -> Result<usize> {
        self.with_chain(chain_id, |chain| contracts::open_escrows(chain, vault).map_err(HarnessError::Query))
    }
}

/// Sandbox provider over a [`MockNetwork`].
#[derive(Clone, Default)]
pub struct MockSandbox {
    network: MockNetwork,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::with_options(MockOptions::default())
    }

    pub fn with_options(options: MockOptions) -> Self {
        MockSandbox { network: MockNetwork::new(options) }
    }

    pub fn network(&self) -> &MockNetwork {
        &self.network
    }
}

#[async_trait]
impl SandboxProvider for MockSandbox {
    async fn provision(&self, spec: &ChainSpec, index: usize) -> Result<Arc<dyn ChainNode>> {
        if spec.num_validators == 0 {
            return Err(HarnessError::Setup(format!("{} needs at least one validator", spec.chain_id(index))));
        }
        let config = ChainConfig {
            chain_id: spec.chain_id(index),
            bin: spec.bin.clone(),
            denom: spec.denom.clone(),
            bech32_prefix: spec.bech32_prefix.clone(),
            gas_prices: spec.gas_prices.clone(),
            rpc_address: format!("mock://{}", spec.chain_id(index)),
            home_dir: PathBuf::from(format!("/mock/{}", spec.chain_id(index))),
        };
        self.network.add_chain(config.clone())?;
        log::info!(
            "[MockSandbox] provisioned {} {} ({} validators, {} full nodes)",
            config.chain_id,
            spec.version,
            spec.num_validators,
            spec.num_full_nodes
        );
        Ok(Arc::new(MockChain::new(self.network.clone(), config)))
    }

    async fn fund_user(&self, chain: &dyn ChainNode, key_name: &str, amount: u128) -> Result<FundedAccount> {
        self.network.with_chain(&chain.config().chain_id, |state| {
            if state.keys.contains_key(key_name) {
                return Err(HarnessError::Setup(format!("key {} already exists", key_name)));
            }
            let address = state.user_address(key_name);
            state.keys.insert(key_name.to_string(), address.clone());
            *state.bank.entry(address.clone()).or_insert(0) += amount;
            Ok(FundedAccount { key_name: key_name.to_string(), address, initial_balance: amount })
        })
    }

    fn relayer(&self, _spec: &RelayerSpec) -> Result<Arc<dyn Relayer>> {
        Ok(Arc::new(MockRelayer::new(self.network.clone())))
    }

    async fn release(&self, chain: &dyn ChainNode) -> Result<()> {
        let chain_id = &chain.config().chain_id;
        self.network.lock()?.released.insert(chain_id.clone());
        log::info!("[MockSandbox] released {}", chain_id);
        Ok(())
    }
}
