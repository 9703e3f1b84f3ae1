// Framework implementation over the chain daemon and relayer binaries.
// Nodes are expected to be running already; provisioning attaches to them.

use crate::chain::{
    ChainConfig, ChainNode, ChannelInfo, CodeId, ContractInfo, FeeConfig, FundedAccount, Relayer, SandboxProvider,
};
use crate::config::{ChainSpec, RelayerSpec};
use crate::error::{HarnessError, Result};
use crate::response::TransactionResponse;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};

const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

async fn run(bin: &str, args: &[String]) -> Result<Vec<u8>> {
    let mut cmd = Command::new(bin);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

    log::debug!("Executing command: {} {}", bin, args.join(" "));

    let output = cmd
        .output()
        .await
        .map_err(|e| HarnessError::Setup(format!("failed to execute {}: {}", bin, e)))?;

    if !output.status.success() {
        return Err(HarnessError::Command {
            command: format!("{} {}", bin, args.first().map(String::as_str).unwrap_or_default()),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[derive(Deserialize)]
struct SmartQueryOutput {
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct ContractOutput {
    contract_info: ContractInfo,
}

#[derive(Deserialize)]
struct ContractsByCodeOutput {
    #[serde(default)]
    contracts: Vec<String>,
}

#[derive(Deserialize)]
struct StatusOutput {
    #[serde(alias = "SyncInfo")]
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct KeyOutput {
    address: String,
}

/// One chain reached through its daemon binary.
#[derive(Debug, Clone)]
pub struct CliChain {
    config: ChainConfig,
}

impl CliChain {
    pub fn new(config: ChainConfig) -> Self {
        CliChain { config }
    }

    fn node_flags(&self) -> Vec<String> {
        vec!["--node".into(), self.config.rpc_address.clone(), "--output".into(), "json".into()]
    }

    fn tx_flags(&self, signer: &str, fees: &FeeConfig) -> Vec<String> {
        let mut flags = strings(["--keyring-backend", "test"]);
        flags.extend(self.node_flags());
        flags.extend([
            "--from".into(),
            signer.to_string(),
            "--gas".into(),
            fees.gas_limit.to_string(),
            "--gas-prices".into(),
            fees.gas_prices.clone(),
            "--home".into(),
            self.config.home_dir.display().to_string(),
            "--chain-id".into(),
            self.config.chain_id.clone(),
            "-b".into(),
            "block".into(),
            "-y".into(),
        ]);
        flags
    }

    async fn tx(&self, context: &str, mut args: Vec<String>, signer: &str, fees: &FeeConfig) -> Result<TransactionResponse> {
        args.extend(self.tx_flags(signer, fees));
        let stdout = run(&self.config.bin, &args).await?;
        TransactionResponse::from_json(context, &stdout)
    }

    // Store and instantiate have no caller-supplied fees.
    fn deploy_fees(&self) -> FeeConfig {
        FeeConfig::for_chain(&self.config, 50_000_000)
    }

    pub async fn list_contracts_by_code(&self, code_id: CodeId) -> Result<Vec<String>> {
        let mut args = strings(["query", "wasm", "list-contract-by-code"]);
        args.push(code_id.to_string());
        args.extend(self.node_flags());
        let stdout = run(&self.config.bin, &args).await?;
        let parsed: ContractsByCodeOutput =
            serde_json::from_slice(&stdout).map_err(|e| HarnessError::malformed("list-contract-by-code", e))?;
        Ok(parsed.contracts)
    }
}

#[async_trait]
impl ChainNode for CliChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    async fn store_contract(&self, signer: &str, artifact: &Path) -> Result<CodeId> {
        let args = vec!["tx".into(), "wasm".into(), "store".into(), artifact.display().to_string()];
        let tx = self.tx("store", args, signer, &self.deploy_fees()).await?.into_committed()?;
        let code_id = tx.find_attribute("store_code", "code_id")?;
        code_id
            .parse()
            .map_err(|_| HarnessError::Query(format!("non-numeric code id `{}` in tx {}", code_id, tx.txhash)))
    }

    async fn instantiate_contract(
        &self,
        signer: &str,
        code_id: CodeId,
        init_msg: &str,
        label: &str,
        with_admin: bool,
    ) -> Result<String> {
        let mut args = vec![
            "tx".into(),
            "wasm".into(),
            "instantiate".into(),
            code_id.to_string(),
            init_msg.to_string(),
            "--label".into(),
            label.to_string(),
        ];
        if with_admin {
            args.extend(["--admin".to_string(), signer.to_string()]);
        } else {
            args.push("--no-admin".into());
        }
        let tx = self.tx("instantiate", args, signer, &self.deploy_fees()).await?.into_committed()?;
        match tx.find_attribute("instantiate", "_contract_address") {
            Ok(address) => Ok(address.to_string()),
            Err(e) => {
                log::warn!("tx {}: {}; falling back to list-contract-by-code", tx.txhash, e);
                self.list_contracts_by_code(code_id).await?.pop().ok_or(e)
            }
        }
    }

    async fn execute(&self, signer: &str, contract: &str, msg: &str, fees: &FeeConfig) -> Result<TransactionResponse> {
        let args = vec!["tx".into(), "wasm".into(), "execute".into(), contract.to_string(), msg.to_string()];
        self.tx("execute", args, signer, fees).await
    }

    async fn query_smart(&self, contract: &str, msg: &str) -> Result<serde_json::Value> {
        let mut args = strings(["query", "wasm", "contract-state", "smart"]);
        args.extend([contract.to_string(), msg.to_string()]);
        args.extend(self.node_flags());
        let stdout = run(&self.config.bin, &args)
            .await
            .map_err(|e| HarnessError::Query(format!("{} on {}: {}", msg, contract, e)))?;
        let parsed: SmartQueryOutput =
            serde_json::from_slice(&stdout).map_err(|e| HarnessError::malformed("contract-state smart", e))?;
        Ok(parsed.data)
    }

    async fn contract_info(&self, contract: &str) -> Result<ContractInfo> {
        let mut args = strings(["query", "wasm", "contract"]);
        args.push(contract.to_string());
        args.extend(self.node_flags());
        let stdout = run(&self.config.bin, &args).await?;
        let parsed: ContractOutput =
            serde_json::from_slice(&stdout).map_err(|e| HarnessError::malformed("query wasm contract", e))?;
        Ok(parsed.contract_info)
    }

    async fn height(&self) -> Result<u64> {
        let args = vec!["status".into(), "--node".into(), self.config.rpc_address.clone()];
        let stdout = run(&self.config.bin, &args).await?;
        let status: StatusOutput = serde_json::from_slice(&stdout).map_err(|e| HarnessError::malformed("status", e))?;
        status
            .sync_info
            .latest_block_height
            .parse()
            .map_err(|_| HarnessError::Query(format!("bad height `{}`", status.sync_info.latest_block_height)))
    }

    async fn wait_for_blocks(&self, blocks: u64) -> Result<()> {
        let target = self.height().await? + blocks;
        while self.height().await? < target {
            tokio::time::sleep(BLOCK_POLL_INTERVAL).await;
        }
        Ok(())
    }
}

pub struct CliSandbox {
    gas_limit: u64,
    // chain id -> faucet key funding new users
    faucets: Mutex<HashMap<String, String>>,
}

impl CliSandbox {
    pub fn new(gas_limit: u64) -> Self {
        CliSandbox { gas_limit, faucets: Mutex::new(HashMap::new()) }
    }

    fn faucet_for(&self, chain_id: &str) -> Result<String> {
        let faucets = self.faucets.lock().map_err(|_| HarnessError::Setup("faucet registry poisoned".into()))?;
        faucets
            .get(chain_id)
            .cloned()
            .ok_or_else(|| HarnessError::Setup(format!("chain {} was not provisioned by this sandbox", chain_id)))
    }
}

#[async_trait]
impl SandboxProvider for CliSandbox {
    async fn provision(&self, spec: &ChainSpec, index: usize) -> Result<Arc<dyn ChainNode>> {
        let config = ChainConfig {
            chain_id: spec.chain_id(index),
            bin: spec.bin.clone(),
            denom: spec.denom.clone(),
            bech32_prefix: spec.bech32_prefix.clone(),
            gas_prices: spec.gas_prices.clone(),
            rpc_address: spec.rpc_address.clone(),
            home_dir: spec.home_dir.clone(),
        };
        let chain = CliChain::new(config);
        let height = chain
            .height()
            .await
            .map_err(|e| HarnessError::Setup(format!("{} ({}) unreachable: {}", spec.chain_id(index), spec.rpc_address, e)))?;
        log::info!(
            "Attached to {} {} at height {} ({} validators, {} full nodes)",
            spec.chain_id(index),
            spec.version,
            height,
            spec.num_validators,
            spec.num_full_nodes
        );

        self.faucets
            .lock()
            .map_err(|_| HarnessError::Setup("faucet registry poisoned".into()))?
            .insert(spec.chain_id(index), spec.faucet_key.clone());
        Ok(Arc::new(chain))
    }

    async fn fund_user(&self, chain: &dyn ChainNode, key_name: &str, amount: u128) -> Result<FundedAccount> {
        let config = chain.config();
        let faucet = self.faucet_for(&config.chain_id)?;

        let args = vec![
            "keys".into(),
            "add".into(),
            key_name.to_string(),
            "--keyring-backend".into(),
            "test".into(),
            "--home".into(),
            config.home_dir.display().to_string(),
            "--output".into(),
            "json".into(),
        ];
        let stdout = run(&config.bin, &args).await?;
        let key: KeyOutput = serde_json::from_slice(&stdout).map_err(|e| HarnessError::malformed("keys add", e))?;

        let cli = CliChain::new(config.clone());
        let send = vec![
            "tx".into(),
            "bank".into(),
            "send".into(),
            faucet.clone(),
            key.address.clone(),
            format!("{}{}", amount, config.denom),
        ];
        let fees = FeeConfig::for_chain(config, self.gas_limit);
        cli.tx("bank send", send, &faucet, &fees).await?.into_committed()?;

        log::info!("[{}] funded {} ({}) with {}{}", config.chain_id, key_name, key.address, amount, config.denom);
        Ok(FundedAccount { key_name: key_name.to_string(), address: key.address, initial_balance: amount })
    }

    fn relayer(&self, spec: &RelayerSpec) -> Result<Arc<dyn Relayer>> {
        Ok(Arc::new(CliRelayer::new(spec.bin.clone(), spec.home_dir.clone())))
    }

    async fn release(&self, chain: &dyn ChainNode) -> Result<()> {
        // Nodes are external; only forget the faucet.
        if let Ok(mut faucets) = self.faucets.lock() {
            faucets.remove(&chain.config().chain_id);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RlyCounterparty {
    #[serde(default)]
    channel_id: String,
}

#[derive(Deserialize)]
struct RlyChannel {
    #[serde(default)]
    state: String,
    channel_id: String,
    port_id: String,
    counterparty: Option<RlyCounterparty>,
}

/// `rly q unrelayed-acks` output: pending sequences per path end.
#[derive(Deserialize)]
struct RlyUnrelayed {
    #[serde(default)]
    src: Vec<u64>,
    #[serde(default)]
    dst: Vec<u64>,
}

fn parse_unrelayed(stdout: &[u8]) -> Result<usize> {
    let raw: RlyUnrelayed =
        serde_json::from_slice(stdout).map_err(|e| HarnessError::malformed("rly q unrelayed-acks", e))?;
    Ok(raw.src.len() + raw.dst.len())
}

/// Relayer driven through the `rly` binary. `start` keeps the child process
/// until `stop`.
pub struct CliRelayer {
    bin: String,
    home: Option<PathBuf>,
    process: tokio::sync::Mutex<Option<Child>>,
}

impl CliRelayer {
    pub fn new(bin: String, home: Option<PathBuf>) -> Self {
        CliRelayer { bin, home, process: tokio::sync::Mutex::new(None) }
    }

    fn with_home(&self, mut args: Vec<String>) -> Vec<String> {
        if let Some(home) = &self.home {
            args.extend(["--home".to_string(), home.display().to_string()]);
        }
        args
    }
}

fn parse_channels(chain_id: &str, stdout: &[u8]) -> Result<Vec<ChannelInfo>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let raw: RlyChannel =
                serde_json::from_str(line).map_err(|e| HarnessError::malformed("rly q channels", e))?;
            Ok(ChannelInfo {
                chain_id: chain_id.to_string(),
                channel_id: raw.channel_id,
                port_id: raw.port_id,
                counterparty_channel_id: raw.counterparty.map(|c| c.channel_id).unwrap_or_default(),
                state: raw.state,
            })
        })
        .collect()
}

#[async_trait]
impl Relayer for CliRelayer {
    async fn link(&self, path: &str, chain_a: &ChainConfig, chain_b: &ChainConfig) -> Result<()> {
        log::info!("Linking {} <-> {} over path {}", chain_a.chain_id, chain_b.chain_id, path);
        run(&self.bin, &self.with_home(strings(["tx", "link", path]))).await?;
        Ok(())
    }

    async fn get_channels(&self, chain_id: &str) -> Result<Vec<ChannelInfo>> {
        let stdout = run(&self.bin, &self.with_home(strings(["q", "channels", chain_id]))).await?;
        parse_channels(chain_id, &stdout)
    }

    async fn start(&self, path: &str) -> Result<()> {
        let mut guard = self.process.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let child = Command::new(&self.bin)
            .args(self.with_home(strings(["start", path])))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarnessError::Setup(format!("failed to start relayer: {}", e)))?;
        log::info!("Relayer started on {} (pid {:?})", path, child.id());
        *guard = Some(child);
        Ok(())
    }

    async fn flush_acknowledgements(&self, path: &str, channel_id: &str) -> Result<()> {
        run(&self.bin, &self.with_home(strings(["tx", "flush", path, channel_id]))).await?;
        Ok(())
    }

    async fn unrelayed_acknowledgements(&self, path: &str, channel_id: &str) -> Result<usize> {
        let stdout = run(&self.bin, &self.with_home(strings(["q", "unrelayed-acks", path, channel_id]))).await?;
        parse_unrelayed(&stdout)
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut child) = self.process.lock().await.take() {
            child.kill().await?;
            log::info!("Relayer stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn juno() -> CliChain {
        CliChain::new(ChainConfig {
            chain_id: "juno-1".into(),
            bin: "junod".into(),
            denom: "ujuno".into(),
            bech32_prefix: "juno".into(),
            gas_prices: "0.0uatom".into(),
            rpc_address: "http://localhost:26657".into(),
            home_dir: PathBuf::from("/var/cosmos-chain/juno-1"),
        })
    }

    #[test]
    fn tx_flags_match_block_inclusion_mode() {
        let fees = FeeConfig { gas_limit: 50_000_000, gas_prices: "0.0uatom".into() };
        let flags = juno().tx_flags("swapper", &fees).join(" ");
        assert_eq!(
            flags,
            "--keyring-backend test --node http://localhost:26657 --output json --from swapper \
             --gas 50000000 --gas-prices 0.0uatom --home /var/cosmos-chain/juno-1 --chain-id juno-1 -b block -y"
        );
    }

    #[test]
    fn parses_one_channel_per_line() {
        let out = br#"{"state":"STATE_OPEN","ordering":"ORDER_UNORDERED","counterparty":{"port_id":"wasm.juno1b","channel_id":"channel-3"},"port_id":"wasm.juno1a","channel_id":"channel-0"}

{"state":"STATE_INIT","port_id":"transfer","channel_id":"channel-1"}
"#;
        let channels = parse_channels("juno-1", out).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].channel_id, "channel-0");
        assert_eq!(channels[0].counterparty_channel_id, "channel-3");
        assert_eq!(channels[1].counterparty_channel_id, "");
    }

    #[test]
    fn counts_unrelayed_acks_on_both_ends() {
        assert_eq!(parse_unrelayed(br#"{"src":[4,5],"dst":[9]}"#).unwrap(), 3);
        assert_eq!(parse_unrelayed(br#"{"src":[],"dst":[]}"#).unwrap(), 0);
        assert_eq!(parse_unrelayed(b"{}").unwrap(), 0);
        assert!(matches!(parse_unrelayed(b"no path found"), Err(HarnessError::MalformedResponse { .. })));
    }

    #[test]
    fn status_accepts_both_casings() {
        let upper: StatusOutput = serde_json::from_str(r#"{"SyncInfo":{"latest_block_height":"42"}}"#).unwrap();
        let lower: StatusOutput = serde_json::from_str(r#"{"sync_info":{"latest_block_height":"7"}}"#).unwrap();
        assert_eq!(upper.sync_info.latest_block_height, "42");
        assert_eq!(lower.sync_info.latest_block_height, "7");
    }

    #[tokio::test]
    async fn missing_binary_is_a_setup_error() {
        let err = run("definitely-not-a-chain-daemon", &strings(["status"])).await.unwrap_err();
        assert!(matches!(err, HarnessError::Setup(_)));
    }
}
