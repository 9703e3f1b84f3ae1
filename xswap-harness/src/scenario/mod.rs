//! Scripted swap scenarios: deploy, connect, send, relay, acknowledge.

pub mod driver;
pub mod types;

pub use driver::{run_cross_chain_swap, run_local_swap, ScenarioContext};
pub use types::{
    AckPayload, ChannelPair, ConnectionSet, CrossChainSwapReport, LocalSwapReport, PacketPayload, RelayMode,
    ScenarioState, SideDeployment, SwapIntent, VaultConnection,
};
