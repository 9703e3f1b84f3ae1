//! Decoding of `--output json` transaction results and positional access to
//! their log trees.
//!
//! Values threaded between scenario steps (vault address, packet payload,
//! acknowledgement) are read from fixed `[log][event][attribute]` positions.
//! Those positions are a contract with the deployed contracts' event emission
//! order, see [`coordinates`].

use crate::chain::{ChainNode, FeeConfig};
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    #[serde(default, deserialize_with = "number_or_string")]
    pub msg_index: u64,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(default, deserialize_with = "number_or_string")]
    pub height: u64,
    pub txhash: String,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default)]
    pub logs: Vec<TxLog>,
}

/// Named position of a value inside a transaction's log tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventCoordinate {
    pub log: usize,
    pub event: usize,
    pub attribute: usize,
    /// Attribute key the deployed contracts emit at this position. Checked on
    /// extraction so a reordered schema fails loudly instead of returning a
    /// neighbouring value.
    pub key: Option<&'static str>,
}

pub mod coordinates {
    use super::EventCoordinate;

    /// `deploy_vault` on the factory: the `wasm-deploy-vault` event, after
    /// `_contract_address`, `vault_code_id`, `chain_interface`, `deployer`.
    pub const VAULT_ADDRESS: EventCoordinate =
        EventCoordinate { log: 0, event: 5, attribute: 4, key: Some("vault_address") };

    /// `send_asset` on the vault: the merged `wasm` event, following the
    /// cw20 `transfer_from` attributes and the interface's `action` and
    /// `channel_id`.
    pub const PACKET_DATA: EventCoordinate =
        EventCoordinate { log: 0, event: 2, attribute: 9, key: Some("data") };

    /// `i_b_c_packet_receive` on the interface: the merged `wasm` event,
    /// following the cw20 `transfer` attributes and the interface's `action`.
    pub const PACKET_ACK: EventCoordinate =
        EventCoordinate { log: 0, event: 3, attribute: 7, key: Some("ack") };
}

impl TransactionResponse {
    pub fn from_json(context: &str, raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| HarnessError::malformed(context, e))
    }

    pub fn is_committed(&self) -> bool {
        self.code == 0
    }

    /// Turns a non-zero result code into [`HarnessError::TransactionFailed`].
    pub fn into_committed(self) -> Result<Self> {
        if self.is_committed() {
            Ok(self)
        } else {
            Err(HarnessError::TransactionFailed {
                txhash: self.txhash,
                code: self.code,
                codespace: self.codespace,
                raw_log: self.raw_log,
            })
        }
    }

    pub fn extract(&self, log: usize, event: usize, attribute: usize) -> Result<&str> {
        self.attribute_at(log, event, attribute)
            .map(|attr| attr.value.as_str())
            .ok_or(HarnessError::MissingField { log, event, attribute, expected_key: None })
    }

    pub fn extract_at(&self, at: EventCoordinate) -> Result<&str> {
        let missing = || HarnessError::MissingField {
            log: at.log,
            event: at.event,
            attribute: at.attribute,
            expected_key: at.key.map(str::to_string),
        };
        let attr = self.attribute_at(at.log, at.event, at.attribute).ok_or_else(missing)?;
        match at.key {
            Some(key) if attr.key != key => {
                log::warn!(
                    "tx {}: expected `{}` at {:?}, found `{}`; event schema has changed",
                    self.txhash,
                    key,
                    at,
                    attr.key
                );
                Err(missing())
            }
            _ => Ok(attr.value.as_str()),
        }
    }

    pub fn find_event(&self, kind: &str) -> Option<&Event> {
        self.logs.iter().flat_map(|l| l.events.iter()).find(|e| e.kind == kind)
    }

    pub fn find_attribute(&self, kind: &str, key: &str) -> Result<&str> {
        self.find_event(kind)
            .and_then(|e| e.attributes.iter().find(|a| a.key == key))
            .map(|a| a.value.as_str())
            .ok_or_else(|| HarnessError::MissingAttribute { event_type: kind.to_string(), key: key.to_string() })
    }

    fn attribute_at(&self, log: usize, event: usize, attribute: usize) -> Option<&Attribute> {
        self.logs.get(log)?.events.get(event)?.attributes.get(attribute)
    }
}

/// Serializes `msg`, submits it as a wasm execute and waits for inclusion.
/// Only committed transactions are returned.
pub async fn execute<M: Serialize + ?Sized>(
    chain: &dyn ChainNode,
    signer: &str,
    contract: &str,
    msg: &M,
    fees: &FeeConfig,
) -> Result<TransactionResponse> {
    let msg = serde_json::to_string(msg).map_err(|e| HarnessError::malformed("execute message", e))?;
    log::debug!("[{}] {} -> {}: {}", chain.config().chain_id, signer, contract, msg);
    let response = chain.execute(signer, contract, &msg, fees).await?;
    log::debug!("[{}] tx {} at height {} code {}", chain.config().chain_id, response.txhash, response.height, response.code);
    response.into_committed()
}

// Cosmos CLIs print heights as strings, the mock chain writes numbers.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.is_empty() => Ok(0),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
