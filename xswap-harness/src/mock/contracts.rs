// In-memory stand-ins for the cw20, factory, vault and interface contracts.
// They accept the same JSON messages as the deployed wasm and emit events in
// the same order, so positional extraction behaves as it does on a chain.

use super::chain::{ChainState, OutboundPacket};
use crate::address::{decode_address, encode_address};
use crate::chain::CodeId;
use crate::config::InterfaceKind;
use crate::messages::{
    amount, BalanceResponse, Cw20ExecuteMsg, Cw20InstantiateMsg, Cw20QueryMsg, FactoryExecuteMsg,
    FactoryInstantiateMsg, InterfaceExecuteMsg, InterfaceInstantiateMsg, VaultExecuteMsg,
};
use crate::response::{Attribute, Event};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub(crate) type ContractResult<T> = std::result::Result<T, String>;

pub(crate) fn ack_success() -> String {
    STANDARD.encode([0u8])
}

pub(crate) fn ack_failure() -> String {
    STANDARD.encode([1u8])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CodeKind {
    Cw20,
    Factory,
    Interface(InterfaceKind),
    Vault,
}

impl CodeKind {
    pub(crate) fn from_artifact(artifact: &Path) -> Option<Self> {
        match artifact.file_stem()?.to_str()? {
            "cw20_base" => Some(CodeKind::Cw20),
            "catalyst_factory" => Some(CodeKind::Factory),
            "catalyst_ibc_interface_poa" => Some(CodeKind::Interface(InterfaceKind::ProofOfAuthority)),
            "catalyst_ibc_interface" => Some(CodeKind::Interface(InterfaceKind::Ibc)),
            "catalyst_vault_volatile" => Some(CodeKind::Vault),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Contract {
    pub code_id: CodeId,
    pub creator: String,
    pub admin: Option<String>,
    pub label: String,
    pub state: ContractState,
}

#[derive(Clone, Debug)]
pub(crate) enum ContractState {
    Cw20(Cw20State),
    Factory,
    Interface(InterfaceState),
    Vault(VaultState),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Cw20State {
    pub balances: BTreeMap<String, u128>,
    // (owner, spender)
    pub allowances: BTreeMap<(String, String), u128>,
}

#[derive(Clone, Debug)]
pub(crate) struct InterfaceState {
    pub kind: InterfaceKind,
    pub owner: String,
    pub port_id: String,
}

#[derive(Clone, Debug)]
pub(crate) struct Escrow {
    asset: String,
    amount: u128,
    fallback: String,
}

#[derive(Clone, Debug)]
pub(crate) struct VaultState {
    deployer: String,
    interface: Option<String>,
    assets: Vec<String>,
    weights: Vec<u128>,
    // (channel id, encoded remote vault)
    connections: BTreeSet<(String, String)>,
    // keyed by packet data
    escrows: BTreeMap<String, Escrow>,
    nonce: u64,
}

/// Wire format of the swap packet. Opaque to the harness.
#[derive(Debug, Serialize, Deserialize)]
struct SwapPacket {
    from_vault: String,
    to_vault: String,
    to_account: String,
    to_asset_index: u8,
    units: f64,
    min_out: String,
    from_asset: String,
    #[serde(with = "amount")]
    from_amount: u128,
    nonce: u64,
}

impl SwapPacket {
    fn decode(data: &str) -> ContractResult<Self> {
        let raw = STANDARD.decode(data).map_err(|e| format!("invalid packet encoding: {}", e))?;
        serde_json::from_slice(&raw).map_err(|e| format!("invalid packet: {}", e))
    }

    fn encode(&self) -> ContractResult<String> {
        serde_json::to_vec(self).map(|raw| STANDARD.encode(raw)).map_err(|e| e.to_string())
    }
}

/// Collects events in emission order. Like the SDK, events of one type are
/// merged and the result is ordered by type.
#[derive(Default)]
pub(crate) struct Emitter {
    events: Vec<Event>,
}

impl Emitter {
    fn push(&mut self, kind: String, attrs: Vec<(&str, String)>) {
        self.events.push(Event {
            kind,
            attributes: attrs.into_iter().map(|(key, value)| Attribute { key: key.to_string(), value }).collect(),
        });
    }

    fn tagged(contract: &str, mut attrs: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        attrs.insert(0, ("_contract_address", contract.to_string()));
        attrs
    }

    pub(crate) fn execute(&mut self, contract: &str) {
        self.push("execute".into(), vec![("_contract_address", contract.to_string())]);
    }

    pub(crate) fn instantiate(&mut self, contract: &str, code_id: CodeId) {
        self.push(
            "instantiate".into(),
            vec![("_contract_address", contract.to_string()), ("code_id", code_id.to_string())],
        );
    }

    pub(crate) fn reply(&mut self, contract: &str) {
        self.push("reply".into(), vec![("_contract_address", contract.to_string())]);
    }

    pub(crate) fn wasm(&mut self, contract: &str, attrs: Vec<(&'static str, String)>) {
        self.push("wasm".into(), Self::tagged(contract, attrs));
    }

    pub(crate) fn custom(&mut self, contract: &str, name: &str, attrs: Vec<(&'static str, String)>) {
        self.push(format!("wasm-{}", name), Self::tagged(contract, attrs));
    }

    pub(crate) fn store(&mut self, code_id: CodeId) {
        self.push("store_code".into(), vec![("code_id", code_id.to_string())]);
    }

    fn extend(&mut self, other: Emitter) {
        self.events.extend(other.events);
    }

    pub(crate) fn into_events(self, action: &str, sender: &str) -> Vec<Event> {
        let mut merged: Vec<Event> = Vec::new();
        let message = Event {
            kind: "message".into(),
            attributes: vec![
                Attribute { key: "action".into(), value: action.to_string() },
                Attribute { key: "module".into(), value: "wasm".into() },
                Attribute { key: "sender".into(), value: sender.to_string() },
            ],
        };
        for event in std::iter::once(message).chain(self.events) {
            match merged.iter_mut().find(|e| e.kind == event.kind) {
                Some(existing) => existing.attributes.extend(event.attributes),
                None => merged.push(event),
            }
        }
        merged.sort_by(|a, b| a.kind.cmp(&b.kind));
        merged
    }
}

fn parse<T: DeserializeOwned>(msg: &str, type_name: &str) -> ContractResult<T> {
    serde_json::from_str(msg).map_err(|e| format!("Error parsing into type {}: {}", type_name, e))
}

fn contract<'a>(state: &'a ChainState, address: &str) -> ContractResult<&'a Contract> {
    state.contracts.get(address).ok_or_else(|| format!("contract {}: not found", address))
}

fn cw20_mut<'a>(state: &'a mut ChainState, token: &str) -> ContractResult<&'a mut Cw20State> {
    match state.contracts.get_mut(token).map(|c| &mut c.state) {
        Some(ContractState::Cw20(cw20)) => Ok(cw20),
        _ => Err(format!("{} is not a cw20 token", token)),
    }
}

fn vault_ref<'a>(state: &'a ChainState, vault: &str) -> ContractResult<&'a VaultState> {
    match &contract(state, vault)?.state {
        ContractState::Vault(v) => Ok(v),
        _ => Err(format!("{} is not a vault", vault)),
    }
}

fn vault_mut<'a>(state: &'a mut ChainState, vault: &str) -> ContractResult<&'a mut VaultState> {
    match state.contracts.get_mut(vault).map(|c| &mut c.state) {
        Some(ContractState::Vault(v)) => Ok(v),
        _ => Err(format!("{} is not a vault", vault)),
    }
}

fn interface_ref<'a>(state: &'a ChainState, interface: &str) -> ContractResult<&'a InterfaceState> {
    match &contract(state, interface)?.state {
        ContractState::Interface(i) => Ok(i),
        _ => Err(format!("{} is not a chain interface", interface)),
    }
}

pub(crate) fn cw20_balance(state: &ChainState, token: &str, address: &str) -> ContractResult<u128> {
    match &contract(state, token)?.state {
        ContractState::Cw20(cw20) => Ok(cw20.balances.get(address).copied().unwrap_or(0)),
        _ => Err(format!("{} is not a cw20 token", token)),
    }
}

fn move_balance(cw20: &mut Cw20State, from: &str, to: &str, amount: u128) -> ContractResult<()> {
    let available = cw20.balances.get(from).copied().unwrap_or(0);
    let remaining = available
        .checked_sub(amount)
        .ok_or_else(|| format!("Overflow: Cannot Sub with {} and {}", available, amount))?;
    cw20.balances.insert(from.to_string(), remaining);
    *cw20.balances.entry(to.to_string()).or_insert(0) += amount;
    Ok(())
}

fn cw20_transfer(
    state: &mut ChainState,
    em: &mut Emitter,
    token: &str,
    from: &str,
    to: &str,
    amount: u128,
) -> ContractResult<()> {
    move_balance(cw20_mut(state, token)?, from, to, amount)?;
    em.wasm(
        token,
        vec![("action", "transfer".into()), ("from", from.into()), ("to", to.into()), ("amount", amount.to_string())],
    );
    Ok(())
}

fn cw20_transfer_from(
    state: &mut ChainState,
    em: &mut Emitter,
    token: &str,
    owner: &str,
    to: &str,
    spender: &str,
    amount: u128,
) -> ContractResult<()> {
    let cw20 = cw20_mut(state, token)?;
    let key = (owner.to_string(), spender.to_string());
    let allowance = cw20.allowances.get(&key).copied().unwrap_or(0);
    if allowance < amount {
        return Err("No allowance for this account".to_string());
    }
    cw20.allowances.insert(key, allowance - amount);
    move_balance(cw20, owner, to, amount)?;
    em.wasm(
        token,
        vec![
            ("action", "transfer_from".into()),
            ("from", owner.into()),
            ("to", to.into()),
            ("by", spender.into()),
            ("amount", amount.to_string()),
        ],
    );
    Ok(())
}

pub(crate) fn instantiate(
    state: &mut ChainState,
    em: &mut Emitter,
    sender: &str,
    code_id: CodeId,
    init_msg: &str,
    label: &str,
    admin: Option<String>,
) -> ContractResult<String> {
    let kind = *state.codes.get(&code_id).ok_or_else(|| format!("no such code: {}", code_id))?;
    let address = state.new_contract_address(code_id);

    let contract_state = match kind {
        CodeKind::Cw20 => {
            let msg: Cw20InstantiateMsg = parse(init_msg, "cw20_base::msg::InstantiateMsg")?;
            let mut cw20 = Cw20State::default();
            for coin in msg.initial_balances {
                *cw20.balances.entry(coin.address).or_insert(0) += coin.amount;
            }
            ContractState::Cw20(cw20)
        }
        CodeKind::Factory => {
            let _: FactoryInstantiateMsg = parse(init_msg, "catalyst_factory::msg::InstantiateMsg")?;
            ContractState::Factory
        }
        CodeKind::Interface(kind) => {
            let _: InterfaceInstantiateMsg = parse(init_msg, "catalyst_ibc_interface::msg::InstantiateMsg")?;
            let port_id = match kind {
                InterfaceKind::Ibc => format!("wasm.{}", address),
                InterfaceKind::ProofOfAuthority => String::new(),
            };
            ContractState::Interface(InterfaceState { kind, owner: sender.to_string(), port_id })
        }
        CodeKind::Vault => return Err("vaults are instantiated through a factory".to_string()),
    };

    em.instantiate(&address, code_id);
    state.contracts.insert(
        address.clone(),
        Contract { code_id, creator: sender.to_string(), admin, label: label.to_string(), state: contract_state },
    );
    Ok(address)
}

fn kind_of(state: &ChainState, address: &str) -> ContractResult<CodeKind> {
    Ok(match &contract(state, address)?.state {
        ContractState::Cw20(_) => CodeKind::Cw20,
        ContractState::Factory => CodeKind::Factory,
        ContractState::Interface(iface) => CodeKind::Interface(iface.kind),
        ContractState::Vault(_) => CodeKind::Vault,
    })
}

pub(crate) fn execute(
    state: &mut ChainState,
    em: &mut Emitter,
    sender: &str,
    address: &str,
    msg: &str,
) -> ContractResult<()> {
    let kind = kind_of(state, address)?;
    em.execute(address);
    match kind {
        CodeKind::Cw20 => {
            let msg: Cw20ExecuteMsg = parse(msg, "cw20::msg::ExecuteMsg")?;
            match msg {
                Cw20ExecuteMsg::Transfer { recipient, amount } => {
                    cw20_transfer(state, em, address, sender, &recipient, amount)
                }
                Cw20ExecuteMsg::IncreaseAllowance { spender, amount } => {
                    let cw20 = cw20_mut(state, address)?;
                    *cw20.allowances.entry((sender.to_string(), spender.clone())).or_insert(0) += amount;
                    em.wasm(
                        address,
                        vec![
                            ("action", "increase_allowance".into()),
                            ("owner", sender.into()),
                            ("spender", spender),
                            ("amount", amount.to_string()),
                        ],
                    );
                    Ok(())
                }
            }
        }
        CodeKind::Factory => {
            let msg: FactoryExecuteMsg = parse(msg, "catalyst_factory::msg::ExecuteMsg")?;
            match msg {
                FactoryExecuteMsg::DeployVault {
                    vault_code_id,
                    assets,
                    assets_balances,
                    weights,
                    chain_interface,
                    ..
                } => deploy_vault(state, em, address, sender, vault_code_id, assets, assets_balances, weights, chain_interface),
            }
        }
        CodeKind::Vault => {
            let msg: VaultExecuteMsg = parse(msg, "catalyst_vault::msg::ExecuteMsg")?;
            match msg {
                VaultExecuteMsg::SetConnection { channel_id, to_vault, state: enabled } => {
                    let vault = vault_mut(state, address)?;
                    if vault.deployer != sender {
                        return Err("Unauthorized".to_string());
                    }
                    decode_address(to_vault.as_str()).map_err(|e| e.to_string())?;
                    let key = (channel_id.clone(), to_vault.as_str().to_string());
                    if enabled {
                        vault.connections.insert(key);
                    } else {
                        vault.connections.remove(&key);
                    }
                    em.custom(
                        address,
                        "set-connection",
                        vec![("channel_id", channel_id), ("to_vault", to_vault.to_string()), ("state", enabled.to_string())],
                    );
                    Ok(())
                }
                VaultExecuteMsg::LocalSwap { from_asset, to_asset, amount, min_out } => {
                    local_swap(state, em, address, sender, &from_asset, &to_asset, amount, min_out)
                }
                VaultExecuteMsg::SendAsset {
                    channel_id,
                    to_vault,
                    to_account,
                    from_asset,
                    to_asset_index,
                    amount,
                    min_out,
                    fallback_account,
                    ..
                } => {
                    decode_address(to_account.as_str()).map_err(|e| e.to_string())?;
                    let packet = SwapPacket {
                        from_vault: address.to_string(),
                        to_vault: to_vault.as_str().to_string(),
                        to_account: to_account.as_str().to_string(),
                        to_asset_index,
                        units: 0.0,
                        min_out,
                        from_asset,
                        from_amount: amount,
                        nonce: 0,
                    };
                    send_asset(state, em, address, sender, &channel_id, packet, fallback_account)
                }
            }
        }
        CodeKind::Interface(kind) => {
            let msg: InterfaceExecuteMsg = parse(msg, "catalyst_ibc_interface::msg::ExecuteMsg")?;
            match kind {
                InterfaceKind::Ibc => return Err("Unauthorized: packets are delivered by the IBC module".to_string()),
                InterfaceKind::ProofOfAuthority if interface_ref(state, address)?.owner != sender => {
                    return Err("Unauthorized".to_string())
                }
                InterfaceKind::ProofOfAuthority => {}
            }
            match msg {
                InterfaceExecuteMsg::IbcPacketReceive { data, channel_id } => {
                    deliver_packet(state, em, address, &channel_id, &data);
                    Ok(())
                }
                InterfaceExecuteMsg::IbcPacketAck { data, response, channel_id } => {
                    deliver_ack(state, em, address, &channel_id, &data, &response)
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn deploy_vault(
    state: &mut ChainState,
    em: &mut Emitter,
    factory: &str,
    sender: &str,
    vault_code_id: CodeId,
    assets: Vec<String>,
    balances: Vec<u128>,
    weights: Vec<u128>,
    chain_interface: Option<String>,
) -> ContractResult<()> {
    if state.codes.get(&vault_code_id) != Some(&CodeKind::Vault) {
        return Err(format!("code {} is not a vault", vault_code_id));
    }
    if assets.is_empty() || assets.len() != balances.len() || assets.len() != weights.len() {
        return Err("Invalid asset, balance or weight count".to_string());
    }
    if let Some(iface) = &chain_interface {
        interface_ref(state, iface)?;
    }

    let vault = state.new_contract_address(vault_code_id);
    state.contracts.insert(
        vault.clone(),
        Contract {
            code_id: vault_code_id,
            creator: factory.to_string(),
            admin: Some(sender.to_string()),
            label: "catalyst_vault_volatile".to_string(),
            state: ContractState::Vault(VaultState {
                deployer: sender.to_string(),
                interface: chain_interface.clone(),
                assets: assets.clone(),
                weights,
                connections: BTreeSet::new(),
                escrows: BTreeMap::new(),
                nonce: 0,
            }),
        },
    );
    em.instantiate(&vault, vault_code_id);

    for (asset, balance) in assets.iter().zip(balances) {
        em.execute(asset);
        cw20_transfer_from(state, em, asset, sender, &vault, factory, balance)?;
    }

    em.reply(factory);
    em.custom(
        factory,
        "deploy-vault",
        vec![
            ("vault_code_id", vault_code_id.to_string()),
            ("chain_interface", chain_interface.unwrap_or_default()),
            ("deployer", sender.to_string()),
            ("vault_address", vault),
        ],
    );
    Ok(())
}

fn asset_index(vault: &VaultState, asset: &str) -> ContractResult<usize> {
    vault.assets.iter().position(|a| a == asset).ok_or_else(|| format!("Invalid asset {}", asset))
}

/// Output of a volatile pool swap: `B * (1 - (A / (A + x))^(wA / wB))`.
pub(crate) fn volatile_out(from_balance: u128, to_balance: u128, from_weight: u128, to_weight: u128, amount: u128) -> u128 {
    if from_balance == 0 || amount == 0 {
        return 0;
    }
    let a = from_balance as f64;
    let b = to_balance as f64;
    let exponent = from_weight as f64 / to_weight as f64;
    (b * (1.0 - (a / (a + amount as f64)).powf(exponent))).floor() as u128
}

#[allow(clippy::too_many_arguments)]
fn local_swap(
    state: &mut ChainState,
    em: &mut Emitter,
    vault_addr: &str,
    sender: &str,
    from_asset: &str,
    to_asset: &str,
    amount: u128,
    min_out: u128,
) -> ContractResult<()> {
    let vault = vault_ref(state, vault_addr)?;
    let (from, to) = (asset_index(vault, from_asset)?, asset_index(vault, to_asset)?);
    let (from_weight, to_weight) = (vault.weights[from], vault.weights[to]);

    let out = volatile_out(
        cw20_balance(state, from_asset, vault_addr)?,
        cw20_balance(state, to_asset, vault_addr)?,
        from_weight,
        to_weight,
        amount,
    );
    if out < min_out {
        return Err(format!("Swap min output not reached: {} < {}", out, min_out));
    }

    em.execute(from_asset);
    cw20_transfer_from(state, em, from_asset, sender, vault_addr, vault_addr, amount)?;
    em.execute(to_asset);
    cw20_transfer(state, em, to_asset, vault_addr, sender, out)?;
    em.custom(
        vault_addr,
        "local-swap",
        vec![("account", sender.to_string()), ("to_amount", out.to_string())],
    );
    Ok(())
}

fn send_asset(
    state: &mut ChainState,
    em: &mut Emitter,
    vault_addr: &str,
    sender: &str,
    channel_id: &str,
    mut packet: SwapPacket,
    fallback: String,
) -> ContractResult<()> {
    let vault = vault_ref(state, vault_addr)?;
    if !vault.connections.contains(&(channel_id.to_string(), packet.to_vault.clone())) {
        return Err("Vault not connected".to_string());
    }
    let interface = vault.interface.clone().ok_or("Vault has no chain interface")?;
    let weight = vault.weights[asset_index(vault, &packet.from_asset)?];

    let balance = cw20_balance(state, &packet.from_asset, vault_addr)?;
    if balance == 0 {
        return Err("Vault holds no balance of the source asset".to_string());
    }
    packet.units = weight as f64 * ((balance + packet.from_amount) as f64 / balance as f64).ln();

    em.execute(&packet.from_asset);
    cw20_transfer_from(state, em, &packet.from_asset, sender, vault_addr, vault_addr, packet.from_amount)?;

    let vault = vault_mut(state, vault_addr)?;
    vault.nonce += 1;
    packet.nonce = vault.nonce;
    let data = packet.encode()?;
    vault.escrows.insert(
        data.clone(),
        Escrow { asset: packet.from_asset.clone(), amount: packet.from_amount, fallback },
    );

    em.execute(&interface);
    let iface = interface_ref(state, &interface)?;
    if iface.kind == InterfaceKind::Ibc {
        state.outbox.push(OutboundPacket { channel_id: channel_id.to_string(), data: data.clone() });
    }
    let timeout = (state.height + 1000).to_string();
    em.wasm(
        &interface,
        vec![
            ("action", "ibc_send".into()),
            ("channel_id", channel_id.to_string()),
            ("data", data),
            ("timeout", timeout),
        ],
    );
    em.custom(
        vault_addr,
        "send-asset",
        vec![
            ("channel_id", channel_id.to_string()),
            ("to_vault", packet.to_vault),
            ("from_amount", packet.from_amount.to_string()),
            ("units", packet.units.to_string()),
        ],
    );
    Ok(())
}

fn receive_asset(state: &mut ChainState, em: &mut Emitter, channel_id: &str, data: &str) -> ContractResult<()> {
    let packet = SwapPacket::decode(data)?;
    let vault_addr = decode_address(&packet.to_vault).map_err(|e| e.to_string())?;
    let from_vault = encode_address(&packet.from_vault).map_err(|e| e.to_string())?;
    let to_account = decode_address(&packet.to_account).map_err(|e| e.to_string())?;
    let min_out: u128 = packet.min_out.parse().map_err(|_| format!("invalid min_out {}", packet.min_out))?;

    em.execute(&vault_addr);
    let vault = vault_ref(state, &vault_addr)?;
    if !vault.connections.contains(&(channel_id.to_string(), from_vault.as_str().to_string())) {
        return Err("Vault not connected".to_string());
    }
    let index = packet.to_asset_index as usize;
    let to_asset = vault.assets.get(index).cloned().ok_or("Invalid asset index")?;
    let weight = vault.weights[index] as f64;

    let balance = cw20_balance(state, &to_asset, &vault_addr)? as f64;
    let out = (balance * (1.0 - (-packet.units / weight).exp())).floor() as u128;
    if out < min_out {
        return Err(format!("Swap min output not reached: {} < {}", out, min_out));
    }

    em.execute(&to_asset);
    cw20_transfer(state, em, &to_asset, &vault_addr, &to_account, out)?;
    em.custom(
        &vault_addr,
        "receive-asset",
        vec![("channel_id", channel_id.to_string()), ("to_account", to_account), ("to_amount", out.to_string())],
    );
    Ok(())
}

/// Runs the destination side of a swap packet and returns the
/// acknowledgement. A rejected swap is reverted and acknowledged as a
/// failure rather than failing the transaction.
pub(crate) fn deliver_packet(
    state: &mut ChainState,
    em: &mut Emitter,
    interface: &str,
    channel_id: &str,
    data: &str,
) -> String {
    let snapshot = state.clone();
    let mut sub = Emitter::default();
    let ack = match receive_asset(state, &mut sub, channel_id, data) {
        Ok(()) => {
            em.extend(sub);
            ack_success()
        }
        Err(reason) => {
            log::debug!("[{}] packet on {} rejected: {}", state.config.chain_id, channel_id, reason);
            *state = snapshot;
            ack_failure()
        }
    };
    em.reply(interface);
    em.wasm(interface, vec![("action", "ibc_receive".into()), ("ack", ack.clone())]);
    ack
}

/// Releases the escrow of an acknowledged packet, refunding the fallback
/// account when the destination rejected the swap.
pub(crate) fn deliver_ack(
    state: &mut ChainState,
    em: &mut Emitter,
    interface: &str,
    channel_id: &str,
    data: &str,
    response: &str,
) -> ContractResult<()> {
    em.wasm(interface, vec![("action", "ibc_ack".into())]);
    let packet = SwapPacket::decode(data)?;
    em.execute(&packet.from_vault);
    let escrow = vault_mut(state, &packet.from_vault)?
        .escrows
        .remove(data)
        .ok_or("No escrow for this packet")?;

    if response == ack_success() {
        em.custom(
            &packet.from_vault,
            "send-asset-success",
            vec![("channel_id", channel_id.to_string()), ("amount", escrow.amount.to_string())],
        );
    } else {
        em.execute(&escrow.asset);
        cw20_transfer(state, em, &escrow.asset, &packet.from_vault, &escrow.fallback, escrow.amount)?;
        em.custom(
            &packet.from_vault,
            "send-asset-failure",
            vec![("channel_id", channel_id.to_string()), ("amount", escrow.amount.to_string())],
        );
    }
    Ok(())
}

pub(crate) fn query(state: &ChainState, address: &str, msg: &str) -> ContractResult<serde_json::Value> {
    match kind_of(state, address)? {
        CodeKind::Cw20 => {
            let msg: Cw20QueryMsg = parse(msg, "cw20::msg::QueryMsg")?;
            match msg {
                Cw20QueryMsg::Balance { address: holder } => {
                    let balance = cw20_balance(state, address, &holder)?;
                    serde_json::to_value(BalanceResponse { balance }).map_err(|e| e.to_string())
                }
            }
        }
        _ => Err(format!("unsupported query on {}", address)),
    }
}

/// Escrows still waiting for an acknowledgement.
pub(crate) fn open_escrows(state: &ChainState, vault: &str) -> ContractResult<usize> {
    Ok(vault_ref(state, vault)?.escrows.len())
}
