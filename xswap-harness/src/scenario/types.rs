use crate::address::{encode_address, EncodedAddress};
use crate::chain::CodeId;
use crate::config::{InterfaceKind, PollingConfig};
use crate::deploy::DeployedContract;
use crate::error::{HarnessError, Result};
use crate::messages::VaultExecuteMsg;
use std::fmt;

/// Progress of a cross-chain swap scenario. States are only entered in
/// declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScenarioState {
    Init,
    FactoryDeployed,
    VaultDeployed,
    ConnectionsEstablished,
    SwapInitiated,
    PacketRelayed,
    SwapAcknowledged,
}

impl ScenarioState {
    pub fn next(self) -> Option<Self> {
        use ScenarioState::*;
        match self {
            Init => Some(FactoryDeployed),
            FactoryDeployed => Some(VaultDeployed),
            VaultDeployed => Some(ConnectionsEstablished),
            ConnectionsEstablished => Some(SwapInitiated),
            SwapInitiated => Some(PacketRelayed),
            PacketRelayed => Some(SwapAcknowledged),
            SwapAcknowledged => None,
        }
    }
}

/// How a sent packet reaches the destination chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayMode {
    /// The interface owner submits the packet and its acknowledgement by hand.
    DirectInjection,
    /// A running relayer delivers; the destination balance is polled.
    Relayer { max_polls: u32, blocks_per_poll: u64 },
}

impl RelayMode {
    pub fn relayer(polling: &PollingConfig) -> Self {
        RelayMode::Relayer { max_polls: polling.max_polls, blocks_per_poll: polling.blocks_per_poll }
    }

    pub fn interface_kind(&self) -> InterfaceKind {
        match self {
            RelayMode::DirectInjection => InterfaceKind::ProofOfAuthority,
            RelayMode::Relayer { .. } => InterfaceKind::Ibc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultConnection {
    pub from_vault: String,
    pub channel_id: String,
    pub to_vault: EncodedAddress,
    pub enabled: bool,
}

/// Connections registered by committed `set_connection` transactions, one
/// entry per direction.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSet {
    connections: Vec<VaultConnection>,
}

impl ConnectionSet {
    pub fn register(&mut self, connection: VaultConnection) {
        self.connections
            .retain(|c| !(c.from_vault == connection.from_vault && c.channel_id == connection.channel_id && c.to_vault == connection.to_vault));
        self.connections.push(connection);
    }

    pub fn is_enabled(&self, from_vault: &str, channel_id: &str, to_vault: &EncodedAddress) -> bool {
        self.connections
            .iter()
            .any(|c| c.enabled && c.from_vault == from_vault && c.channel_id == channel_id && &c.to_vault == to_vault)
    }

    /// Both `a -> b` over `a_channel` and `b -> a` over `b_channel` must be
    /// enabled.
    pub fn require_symmetric(&self, a: &str, a_channel: &str, b: &str, b_channel: &str) -> Result<()> {
        let forward = self.is_enabled(a, a_channel, &encode_address(b)?);
        let backward = self.is_enabled(b, b_channel, &encode_address(a)?);
        if forward && backward {
            Ok(())
        } else {
            let channel_id = if forward { b_channel } else { a_channel };
            Err(HarnessError::AsymmetricConnection { channel_id: channel_id.to_string() })
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapIntent {
    pub from_asset: String,
    pub to_asset_index: u8,
    pub amount: u128,
    pub min_out: String,
    pub to_account: EncodedAddress,
    pub fallback_account: String,
}

impl SwapIntent {
    pub fn into_message(self, channel_id: &str, to_vault: EncodedAddress, calldata: &str) -> VaultExecuteMsg {
        VaultExecuteMsg::SendAsset {
            channel_id: channel_id.to_string(),
            to_vault,
            to_account: self.to_account,
            from_asset: self.from_asset,
            to_asset_index: self.to_asset_index,
            amount: self.amount,
            min_out: self.min_out,
            fallback_account: self.fallback_account,
            calldata: calldata.to_string(),
        }
    }
}

macro_rules! opaque_payload {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                $name(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_payload!(PacketPayload);
opaque_payload!(AckPayload);

/// Contracts deployed on one chain.
#[derive(Clone, Debug)]
pub struct SideDeployment {
    pub chain_index: usize,
    pub factory: DeployedContract,
    pub interface: DeployedContract,
    pub interface_kind: InterfaceKind,
    pub tokens: Vec<DeployedContract>,
    pub vault_code_id: CodeId,
    pub vault: Option<String>,
}

impl SideDeployment {
    pub fn vault(&self) -> Result<&str> {
        self.vault
            .as_deref()
            .ok_or_else(|| HarnessError::Setup(format!("no vault deployed on chain #{}", self.chain_index)))
    }

    pub fn token(&self, index: usize) -> Result<&DeployedContract> {
        self.tokens
            .get(index)
            .ok_or_else(|| HarnessError::Setup(format!("no token #{} on chain #{}", index, self.chain_index)))
    }
}

/// Channel id each vault uses for the connection. Both are the same string
/// under direct injection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPair {
    pub source: String,
    pub destination: String,
}

impl ChannelPair {
    pub fn shared(channel_id: &str) -> Self {
        ChannelPair { source: channel_id.to_string(), destination: channel_id.to_string() }
    }
}

#[derive(Clone, Debug)]
pub struct CrossChainSwapReport {
    pub relay_mode: RelayMode,
    pub source_chain: String,
    pub destination_chain: String,
    pub channels: ChannelPair,
    pub source_vault: String,
    pub destination_vault: String,
    pub packet: PacketPayload,
    /// Only observed under direct injection.
    pub ack: Option<AckPayload>,
    pub amount_sent: u128,
    pub recipient_balance_before: u128,
    pub recipient_balance_after: u128,
    pub final_state: ScenarioState,
}

impl CrossChainSwapReport {
    pub fn amount_received(&self) -> u128 {
        self.recipient_balance_after.saturating_sub(self.recipient_balance_before)
    }
}

#[derive(Clone, Debug)]
pub struct LocalSwapReport {
    pub chain_id: String,
    pub vault: String,
    pub from_asset: String,
    pub to_asset: String,
    /// Vault holdings of (from, to) before the swap.
    pub pool_before: (u128, u128),
    pub amount_in: u128,
    pub amount_out: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT_A: &str = "juno1b5f0d3e9c1a2b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9";
    const VAULT_B: &str = "juno1c6e1e4fad2b3c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f90a";

    fn connection(from: &str, channel: &str, to: &str) -> VaultConnection {
        VaultConnection {
            from_vault: from.into(),
            channel_id: channel.into(),
            to_vault: encode_address(to).unwrap(),
            enabled: true,
        }
    }

    #[test]
    fn states_advance_in_order() {
        let mut state = ScenarioState::Init;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(state, ScenarioState::SwapAcknowledged);
    }

    #[test]
    fn one_direction_is_not_enough() {
        let mut set = ConnectionSet::default();
        set.register(connection(VAULT_A, "channel-0", VAULT_B));
        match set.require_symmetric(VAULT_A, "channel-0", VAULT_B, "channel-1") {
            Err(HarnessError::AsymmetricConnection { channel_id }) => assert_eq!(channel_id, "channel-1"),
            other => panic!("expected AsymmetricConnection, got {:?}", other),
        }

        set.register(connection(VAULT_B, "channel-1", VAULT_A));
        set.require_symmetric(VAULT_A, "channel-0", VAULT_B, "channel-1").unwrap();
    }

    #[test]
    fn disabling_replaces_the_earlier_entry() {
        let mut set = ConnectionSet::default();
        set.register(connection(VAULT_A, "c", VAULT_B));
        set.register(VaultConnection { enabled: false, ..connection(VAULT_A, "c", VAULT_B) });
        assert_eq!(set.len(), 1);
        assert!(!set.is_enabled(VAULT_A, "c", &encode_address(VAULT_B).unwrap()));
    }

    #[test]
    fn relay_mode_selects_interface() {
        assert_eq!(RelayMode::DirectInjection.interface_kind(), InterfaceKind::ProofOfAuthority);
        let mode = RelayMode::relayer(&PollingConfig::default());
        assert_eq!(mode, RelayMode::Relayer { max_polls: 100, blocks_per_poll: 2 });
        assert_eq!(mode.interface_kind(), InterfaceKind::Ibc);
    }
}
