use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHANNEL_ID: &str = "00000000000000000000000000000001";

/// One chain sandbox to bring up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSpec {
    pub name: String,
    pub version: String,
    /// Derived from `name` and position when absent.
    pub chain_id: Option<String>,
    pub bin: String,
    pub denom: String,
    pub bech32_prefix: String,
    pub gas_prices: String,
    pub num_validators: usize,
    pub num_full_nodes: usize,
    // Used by the CLI provider, which attaches to already running nodes
    pub rpc_address: String,
    pub home_dir: PathBuf,
    pub faucet_key: String,
}

impl Default for ChainSpec {
    fn default() -> Self {
        ChainSpec {
            name: "juno".to_string(),
            version: "v15.0.0".to_string(),
            chain_id: None,
            bin: "junod".to_string(),
            denom: "ujuno".to_string(),
            bech32_prefix: "juno".to_string(),
            gas_prices: "0.0uatom".to_string(),
            num_validators: 1,
            num_full_nodes: 1,
            rpc_address: "http://localhost:26657".to_string(),
            home_dir: PathBuf::from(".juno"),
            faucet_key: "faucet".to_string(),
        }
    }
}

impl ChainSpec {
    pub fn chain_id(&self, index: usize) -> String {
        self.chain_id.clone().unwrap_or_else(|| format!("{}-{}", self.name, index + 1))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerSpec {
    pub path: String,
    pub bin: String,
    pub home_dir: Option<PathBuf>,
    /// Indices into `HarnessConfig::chains`.
    pub chains: (usize, usize),
}

impl Default for RelayerSpec {
    fn default() -> Self {
        RelayerSpec {
            path: "junoA-junoB-demo".to_string(),
            bin: "rly".to_string(),
            home_dir: None,
            chains: (0, 1),
        }
    }
}

/// Which cross-chain interface contract carries packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    /// Packets are injected by the interface owner.
    ProofOfAuthority,
    /// Packets travel over an IBC channel and need a running relayer.
    Ibc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractArtifacts {
    pub factory: PathBuf,
    pub interface_poa: PathBuf,
    pub interface_ibc: PathBuf,
    pub cw20: PathBuf,
    pub vault_volatile: PathBuf,
}

impl ContractArtifacts {
    pub fn interface(&self, kind: InterfaceKind) -> &Path {
        match kind {
            InterfaceKind::ProofOfAuthority => &self.interface_poa,
            InterfaceKind::Ibc => &self.interface_ibc,
        }
    }
}

impl Default for ContractArtifacts {
    fn default() -> Self {
        ContractArtifacts {
            factory: PathBuf::from("contracts/catalyst_factory.wasm"),
            interface_poa: PathBuf::from("contracts/catalyst_ibc_interface_poa.wasm"),
            interface_ibc: PathBuf::from("contracts/catalyst_ibc_interface.wasm"),
            cw20: PathBuf::from("contracts/cw20_base.wasm"),
            vault_volatile: PathBuf::from("contracts/catalyst_vault_volatile.wasm"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_supply: u128,
}

impl TokenSpec {
    pub fn new(name: &str, symbol: &str) -> Self {
        TokenSpec { name: name.to_string(), symbol: symbol.to_string(), decimals: 6, initial_supply: 100_000_000 }
    }
}

/// Parameters passed to the factory's `deploy_vault`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultParams {
    pub balances: Vec<u128>,
    pub weights: Vec<u128>,
    pub amplification: String,
    pub vault_fee: String,
    pub name: String,
    pub symbol: String,
    /// Allowance granted to the factory per asset before deployment.
    pub factory_allowance: u128,
}

impl Default for VaultParams {
    fn default() -> Self {
        VaultParams {
            balances: vec![10_000, 10_000],
            weights: vec![1, 1],
            amplification: "1000000000000000000".to_string(),
            vault_fee: "0".to_string(),
            name: "POOL".to_string(),
            symbol: "POOL".to_string(),
            factory_allowance: 10_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapParams {
    pub channel_id: String,
    pub amount: u128,
    pub min_out: String,
    pub from_asset_index: usize,
    pub to_asset_index: u8,
    pub calldata: String,
}

impl Default for SwapParams {
    fn default() -> Self {
        SwapParams {
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            amount: 100,
            min_out: "0".to_string(),
            from_asset_index: 0,
            to_asset_index: 0,
            calldata: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_polls: u32,
    pub blocks_per_poll: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig { max_polls: 100, blocks_per_poll: 2 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub chains: Vec<ChainSpec>,
    pub relayer: Option<RelayerSpec>,
    pub users_per_chain: usize,
    pub fund_amount: u128,
    pub gas_limit: u64,
    pub artifacts: ContractArtifacts,
    pub tokens: Vec<TokenSpec>,
    pub vault: VaultParams,
    pub swap: SwapParams,
    pub polling: PollingConfig,
    #[serde(with = "humantime_serde")]
    pub scenario_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            chains: vec![ChainSpec::default(), ChainSpec::default()],
            relayer: None,
            // governance + swapper
            users_per_chain: 2,
            fund_amount: 10_000_000,
            gas_limit: 50_000_000,
            artifacts: ContractArtifacts::default(),
            tokens: vec![TokenSpec::new("TokenA", "TTA"), TokenSpec::new("TokenB", "TTB")],
            vault: VaultParams::default(),
            swap: SwapParams::default(),
            polling: PollingConfig::default(),
            scenario_timeout: Duration::from_secs(600),
            log_dir: None,
        }
    }
}

impl HarnessConfig {
    pub fn single_chain() -> Self {
        HarnessConfig { chains: vec![ChainSpec::default()], ..Default::default() }
    }

    pub fn with_relayer(mut self) -> Self {
        self.relayer = Some(RelayerSpec::default());
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: HarnessConfig = serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(HarnessError::Config("at least one chain is required".to_string()));
        }
        if self.users_per_chain < 2 {
            return Err(HarnessError::Config("scenarios need a governance and a swapper account per chain".to_string()));
        }
        if self.tokens.len() < 2 {
            return Err(HarnessError::Config("a vault needs at least two assets".to_string()));
        }
        if self.vault.balances.len() != self.tokens.len() || self.vault.weights.len() != self.tokens.len() {
            return Err(HarnessError::Config(format!(
                "{} tokens but {} vault balances and {} weights",
                self.tokens.len(),
                self.vault.balances.len(),
                self.vault.weights.len()
            )));
        }
        if self.swap.from_asset_index >= self.tokens.len() || self.swap.to_asset_index as usize >= self.tokens.len() {
            return Err(HarnessError::Config("swap asset index out of range".to_string()));
        }
        if let Some(relayer) = &self.relayer {
            let (a, b) = relayer.chains;
            if a == b || a >= self.chains.len() || b >= self.chains.len() {
                return Err(HarnessError::Config(format!("relayer path must join two distinct chains, got {:?}", relayer.chains)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains[0].name, "juno");
        assert_eq!(config.chains[0].version, "v15.0.0");
        assert_eq!(config.chains[0].gas_prices, "0.0uatom");
        assert_eq!(config.fund_amount, 10_000_000);
        assert_eq!(config.gas_limit, 50_000_000);
        assert_eq!(config.polling, PollingConfig { max_polls: 100, blocks_per_poll: 2 });
        assert_eq!(config.swap.channel_id, DEFAULT_CHANNEL_ID);
        assert_eq!(config.tokens[1].symbol, "TTB");
        assert!(config.relayer.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn derives_chain_ids_from_position() {
        let spec = ChainSpec::default();
        assert_eq!(spec.chain_id(0), "juno-1");
        assert_eq!(spec.chain_id(1), "juno-2");
        let named = ChainSpec { chain_id: Some("uni-6".into()), ..Default::default() };
        assert_eq!(named.chain_id(3), "uni-6");
    }

    #[test]
    fn loads_partial_json_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "chains": [{{"name": "wasmd", "bin": "wasmd", "bech32_prefix": "wasm"}}, {{"name": "wasmd", "bin": "wasmd"}}],
                "relayer": {{"path": "a-b"}},
                "polling": {{"max_polls": 5}},
                "scenario_timeout": "2m 30s"
            }}"#
        )
        .unwrap();

        let config = HarnessConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.chains[0].bech32_prefix, "wasm");
        assert_eq!(config.chains[1].bech32_prefix, "juno");
        assert_eq!(config.relayer.as_ref().unwrap().path, "a-b");
        assert_eq!(config.relayer.as_ref().unwrap().chains, (0, 1));
        assert_eq!(config.polling.max_polls, 5);
        assert_eq!(config.polling.blocks_per_poll, 2);
        assert_eq!(config.scenario_timeout, Duration::from_secs(150));
    }

    #[test]
    fn rejects_relayer_on_single_chain() {
        let config = HarnessConfig::single_chain().with_relayer();
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn rejects_mismatched_vault_params() {
        let mut config = HarnessConfig::default();
        config.vault.weights.push(1);
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }
}
