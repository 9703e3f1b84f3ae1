// Seam to the chain-test framework: sandboxes, nodes and the relayer.
// The CLI implementations live in `cli`, the in-memory ones in `mock`.

use crate::config::{ChainSpec, RelayerSpec};
use crate::error::Result;
use crate::response::TransactionResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CodeId = u64;

/// Static description of one running chain, as reported by the framework.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub bin: String,
    pub denom: String,
    pub bech32_prefix: String,
    pub gas_prices: String,
    pub rpc_address: String,
    pub home_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeConfig {
    pub gas_limit: u64,
    pub gas_prices: String,
}

impl FeeConfig {
    pub fn for_chain(config: &ChainConfig, gas_limit: u64) -> Self {
        FeeConfig { gas_limit, gas_prices: config.gas_prices.clone() }
    }
}

/// `query wasm contract` output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(default)]
    pub code_id: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub ibc_port_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub chain_id: String,
    pub channel_id: String,
    pub port_id: String,
    #[serde(default)]
    pub counterparty_channel_id: String,
    #[serde(default)]
    pub state: String,
}

/// A key in the chain's test keyring holding an initial balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundedAccount {
    pub key_name: String,
    pub address: String,
    pub initial_balance: u128,
}

/// One running chain node. `signer` is a key name or address known to the
/// node's test keyring.
#[async_trait]
pub trait ChainNode: Send + Sync {
    fn config(&self) -> &ChainConfig;

    async fn store_contract(&self, signer: &str, artifact: &Path) -> Result<CodeId>;

    /// Returns the new contract's address.
    async fn instantiate_contract(
        &self,
        signer: &str,
        code_id: CodeId,
        init_msg: &str,
        label: &str,
        with_admin: bool,
    ) -> Result<String>;

    /// Submits in block-inclusion mode. A non-zero result code is returned as
    /// a response, not an error; see [`crate::response::execute`].
    async fn execute(&self, signer: &str, contract: &str, msg: &str, fees: &FeeConfig)
        -> Result<TransactionResponse>;

    /// Smart query; returns the `data` member of the CLI output.
    async fn query_smart(&self, contract: &str, msg: &str) -> Result<serde_json::Value>;

    async fn contract_info(&self, contract: &str) -> Result<ContractInfo>;

    async fn height(&self) -> Result<u64>;

    async fn wait_for_blocks(&self, blocks: u64) -> Result<()>;
}

#[async_trait]
pub trait Relayer: Send + Sync {
    /// Creates clients, connection and channel for `path`.
    async fn link(&self, path: &str, chain_a: &ChainConfig, chain_b: &ChainConfig) -> Result<()>;

    async fn get_channels(&self, chain_id: &str) -> Result<Vec<ChannelInfo>>;

    async fn start(&self, path: &str) -> Result<()>;

    /// Relays acknowledgements still pending on `channel_id`.
    async fn flush_acknowledgements(&self, path: &str, channel_id: &str) -> Result<()>;

    /// Acknowledgements on `channel_id` written on either end of `path` but
    /// not yet relayed back.
    async fn unrelayed_acknowledgements(&self, path: &str, channel_id: &str) -> Result<usize>;

    async fn stop(&self) -> Result<()>;
}

/// Provisions sandboxes and accounts. Node lifecycle and networking belong
/// to the implementation.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn provision(&self, spec: &ChainSpec, index: usize) -> Result<Arc<dyn ChainNode>>;

    async fn fund_user(&self, chain: &dyn ChainNode, key_name: &str, amount: u128) -> Result<FundedAccount>;

    fn relayer(&self, spec: &RelayerSpec) -> Result<Arc<dyn Relayer>>;

    async fn release(&self, chain: &dyn ChainNode) -> Result<()>;
}
