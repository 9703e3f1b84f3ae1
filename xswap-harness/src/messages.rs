//! JSON message surface of the deployed contracts. Field names follow the
//! contracts' serde schemas; amounts travel as decimal strings.

use crate::address::EncodedAddress;
use crate::chain::CodeId;
use serde::{Deserialize, Serialize};

pub mod amount {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

mod amounts {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[u128], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| v.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u128>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|raw| raw.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

// --- Instantiate ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryInstantiateMsg {
    pub default_governance_fee_share: String,
}

impl Default for FactoryInstantiateMsg {
    fn default() -> Self {
        FactoryInstantiateMsg { default_governance_fee_share: "0".to_string() }
    }
}

/// Both interface variants take an empty object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInstantiateMsg {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cw20Coin {
    pub address: String,
    #[serde(with = "amount")]
    pub amount: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterResponse {
    pub minter: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_amount")]
    pub cap: Option<u128>,
}

mod optional_amount {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| raw.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cw20InstantiateMsg {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_balances: Vec<Cw20Coin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<MinterResponse>,
}

// --- Execute ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryExecuteMsg {
    DeployVault {
        vault_code_id: CodeId,
        assets: Vec<String>,
        #[serde(with = "amounts")]
        assets_balances: Vec<u128>,
        #[serde(with = "amounts")]
        weights: Vec<u128>,
        amplification: String,
        vault_fee: String,
        name: String,
        symbol: String,
        chain_interface: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultExecuteMsg {
    SetConnection {
        channel_id: String,
        to_vault: EncodedAddress,
        state: bool,
    },
    SendAsset {
        channel_id: String,
        to_vault: EncodedAddress,
        to_account: EncodedAddress,
        from_asset: String,
        to_asset_index: u8,
        #[serde(with = "amount")]
        amount: u128,
        min_out: String,
        fallback_account: String,
        calldata: String,
    },
    LocalSwap {
        from_asset: String,
        to_asset: String,
        #[serde(with = "amount")]
        amount: u128,
        #[serde(with = "amount")]
        min_out: u128,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceExecuteMsg {
    #[serde(rename = "i_b_c_packet_receive")]
    IbcPacketReceive { data: String, channel_id: String },
    #[serde(rename = "i_b_c_packet_ack")]
    IbcPacketAck { data: String, response: String, channel_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20ExecuteMsg {
    Transfer {
        recipient: String,
        #[serde(with = "amount")]
        amount: u128,
    },
    IncreaseAllowance {
        spender: String,
        #[serde(with = "amount")]
        amount: u128,
    },
}

// --- Query ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20QueryMsg {
    Balance { address: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(with = "amount")]
    pub balance: u128,
}
