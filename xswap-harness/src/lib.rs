//! Test harness for cross-chain vault swaps between CosmWasm chains:
//! environment setup, contract deployment, vault connections, packet relay
//! and acknowledgement, against local sandboxes or the in-memory mock.

pub mod address;
pub mod chain;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod environment;
pub mod error;
pub mod logging;
pub mod messages;
pub mod mock;
pub mod response;
pub mod scenario;

pub mod test_utils;

pub use chain::{ChainNode, Relayer, SandboxProvider};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use scenario::{run_cross_chain_swap, run_local_swap, RelayMode, ScenarioState};
