use super::contracts::{self, CodeKind, Contract, ContractState, Emitter};
use super::MockNetwork;
use crate::chain::{ChainConfig, ChainNode, CodeId, ContractInfo, FeeConfig};
use crate::error::{HarnessError, Result};
use crate::response::{TransactionResponse, TxLog};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const USER_ADDRESS_HEX: usize = 38;
const CONTRACT_ADDRESS_HEX: usize = 58;
const MIN_GAS_LIMIT: u64 = 100_000;

const MSG_STORE: &str = "/cosmwasm.wasm.v1.MsgStoreCode";
const MSG_INSTANTIATE: &str = "/cosmwasm.wasm.v1.MsgInstantiateContract";
const MSG_EXECUTE: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

pub(crate) fn derive_address(prefix: &str, seed: &str, hex_len: usize) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("{}1{}", prefix, &digest[..hex_len])
}

/// Wall-clock time of `blocks` blocks, saturating instead of wrapping.
fn wait_time(block_time: Duration, blocks: u64) -> Duration {
    block_time.saturating_mul(u32::try_from(blocks).unwrap_or(u32::MAX))
}

#[derive(Clone, Debug)]
pub(crate) struct OutboundPacket {
    pub channel_id: String,
    pub data: String,
}

/// Full state of one simulated chain. Cloned as a snapshot before every
/// transaction and restored if the transaction fails.
#[derive(Clone, Debug)]
pub(crate) struct ChainState {
    pub config: ChainConfig,
    pub height: u64,
    // key name -> address
    pub keys: BTreeMap<String, String>,
    pub bank: BTreeMap<String, u128>,
    pub codes: BTreeMap<CodeId, CodeKind>,
    pub contracts: BTreeMap<String, Contract>,
    pub outbox: Vec<OutboundPacket>,
    instances: u64,
    tx_count: u64,
}

impl ChainState {
    pub(crate) fn new(config: ChainConfig) -> Self {
        ChainState {
            config,
            height: 1,
            keys: BTreeMap::new(),
            bank: BTreeMap::new(),
            codes: BTreeMap::new(),
            contracts: BTreeMap::new(),
            outbox: Vec::new(),
            instances: 0,
            tx_count: 0,
        }
    }

    pub(crate) fn user_address(&self, key_name: &str) -> String {
        derive_address(&self.config.bech32_prefix, &format!("{}/{}", self.config.chain_id, key_name), USER_ADDRESS_HEX)
    }

    pub(crate) fn new_contract_address(&mut self, code_id: CodeId) -> String {
        self.instances += 1;
        let seed = format!("{}/{}/{}", self.config.chain_id, code_id, self.instances);
        derive_address(&self.config.bech32_prefix, &seed, CONTRACT_ADDRESS_HEX)
    }

    /// Key name or address to address, as the CLI's `--from` does.
    fn resolve(&self, signer: &str) -> Result<String> {
        if let Some(address) = self.keys.get(signer) {
            return Ok(address.clone());
        }
        if self.keys.values().any(|a| a == signer) {
            return Ok(signer.to_string());
        }
        Err(HarnessError::Command {
            command: format!("{} tx wasm", self.config.bin),
            status: "exit status: 1".to_string(),
            stderr: format!("{}.info: key not found", signer),
        })
    }

    /// Runs `f` as one transaction in a new block. Any error reverts the
    /// state changes of `f` and yields a non-zero result code.
    pub(crate) fn submit<F>(&mut self, sender: &str, action: &str, fees: &FeeConfig, f: F) -> TransactionResponse
    where
        F: FnOnce(&mut ChainState, &mut Emitter) -> contracts::ContractResult<()>,
    {
        self.height += 1;
        self.tx_count += 1;
        let txhash = hex::encode_upper(Sha256::digest(format!("{}/{}", self.config.chain_id, self.tx_count)));
        let height = self.height;

        if fees.gas_limit < MIN_GAS_LIMIT {
            return TransactionResponse {
                height,
                txhash,
                codespace: "sdk".to_string(),
                code: 11,
                raw_log: format!("out of gas in location: wasm; gasWanted: {}", fees.gas_limit),
                ..Default::default()
            };
        }

        let snapshot = self.clone();
        let mut emitter = Emitter::default();
        match f(self, &mut emitter) {
            Ok(()) => {
                let logs =
                    vec![TxLog { msg_index: 0, log: String::new(), events: emitter.into_events(action, sender) }];
                TransactionResponse {
                    height,
                    txhash,
                    raw_log: serde_json::to_string(&logs).unwrap_or_default(),
                    logs,
                    ..Default::default()
                }
            }
            Err(reason) => {
                log::debug!("[{}] tx {} reverted: {}", self.config.chain_id, txhash, reason);
                *self = snapshot;
                TransactionResponse {
                    height,
                    txhash,
                    codespace: "wasm".to_string(),
                    code: 5,
                    raw_log: format!(
                        "failed to execute message; message index: 0: {}: execute wasm contract failed",
                        reason
                    ),
                    ..Default::default()
                }
            }
        }
    }
}

/// A chain of the mock network. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct MockChain {
    network: MockNetwork,
    config: ChainConfig,
}

impl MockChain {
    pub(crate) fn new(network: MockNetwork, config: ChainConfig) -> Self {
        MockChain { network, config }
    }

    fn deploy_fees(&self) -> FeeConfig {
        FeeConfig::for_chain(&self.config, MIN_GAS_LIMIT * 100)
    }
}

#[async_trait]
impl ChainNode for MockChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    async fn store_contract(&self, signer: &str, artifact: &Path) -> Result<CodeId> {
        let kind = CodeKind::from_artifact(artifact)
            .ok_or_else(|| HarnessError::Setup(format!("{}: no such file or directory", artifact.display())))?;
        let fees = self.deploy_fees();
        self.network.with_chain(&self.config.chain_id, |chain| {
            let sender = chain.resolve(signer)?;
            let code_id = chain.codes.keys().next_back().map_or(1, |last| last + 1);
            let tx = chain.submit(&sender, MSG_STORE, &fees, |state, em| {
                state.codes.insert(code_id, kind);
                em.store(code_id);
                Ok(())
            });
            tx.into_committed()?;
            Ok(code_id)
        })
    }

    async fn instantiate_contract(
        &self,
        signer: &str,
        code_id: CodeId,
        init_msg: &str,
        label: &str,
        with_admin: bool,
    ) -> Result<String> {
        let fees = self.deploy_fees();
        self.network.with_chain(&self.config.chain_id, |chain| {
            let sender = chain.resolve(signer)?;
            let admin = with_admin.then(|| sender.clone());
            let mut address = None;
            let tx = chain.submit(&sender, MSG_INSTANTIATE, &fees, |state, em| {
                address = Some(contracts::instantiate(state, em, &sender, code_id, init_msg, label, admin)?);
                Ok(())
            });
            tx.into_committed()?;
            address.ok_or_else(|| HarnessError::MissingAttribute {
                event_type: "instantiate".to_string(),
                key: "_contract_address".to_string(),
            })
        })
    }

    async fn execute(&self, signer: &str, contract: &str, msg: &str, fees: &FeeConfig) -> Result<TransactionResponse> {
        self.network.with_chain(&self.config.chain_id, |chain| {
            let sender = chain.resolve(signer)?;
            Ok(chain.submit(&sender, MSG_EXECUTE, fees, |state, em| {
                contracts::execute(state, em, &sender, contract, msg)
            }))
        })
    }

    async fn query_smart(&self, contract: &str, msg: &str) -> Result<serde_json::Value> {
        self.network.with_chain(&self.config.chain_id, |chain| {
            contracts::query(chain, contract, msg)
                .map_err(|reason| HarnessError::Query(format!("{} on {}: {}", msg, contract, reason)))
        })
    }

    async fn contract_info(&self, contract: &str) -> Result<ContractInfo> {
        self.network.with_chain(&self.config.chain_id, |chain| {
            let found = chain
                .contracts
                .get(contract)
                .ok_or_else(|| HarnessError::Query(format!("contract {}: not found", contract)))?;
            let ibc_port_id = match &found.state {
                ContractState::Interface(iface) => iface.port_id.clone(),
                _ => String::new(),
            };
            Ok(ContractInfo {
                code_id: found.code_id.to_string(),
                creator: found.creator.clone(),
                admin: found.admin.clone().unwrap_or_default(),
                label: found.label.clone(),
                ibc_port_id,
            })
        })
    }

    async fn height(&self) -> Result<u64> {
        self.network.with_chain(&self.config.chain_id, |chain| Ok(chain.height))
    }

    async fn wait_for_blocks(&self, blocks: u64) -> Result<()> {
        let block_time = self.network.block_time()?;
        if !block_time.is_zero() {
            tokio::time::sleep(wait_time(block_time, blocks)).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.network.advance(&self.config.chain_id, blocks)
    }
}
