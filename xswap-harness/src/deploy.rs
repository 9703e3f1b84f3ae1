use crate::chain::{ChainNode, CodeId, FeeConfig};
use crate::error::{HarnessError, Result};
use crate::messages::{BalanceResponse, Cw20ExecuteMsg, Cw20QueryMsg};
use crate::response::{self, TransactionResponse};
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub code_id: CodeId,
    pub address: String,
    pub chain_id: String,
}

fn artifact_name(artifact: &Path) -> String {
    artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.display().to_string())
}

/// Stores `artifact` and instantiates it with `signer` as admin.
pub async fn deploy_contract<M: Serialize + ?Sized>(
    chain: &dyn ChainNode,
    signer: &str,
    artifact: &Path,
    init_msg: &M,
) -> Result<DeployedContract> {
    let name = artifact_name(artifact);
    let chain_id = chain.config().chain_id.clone();

    let deployed = async {
        let init_msg =
            serde_json::to_string(init_msg).map_err(|e| HarnessError::malformed("instantiate message", e))?;
        let code_id = chain.store_contract(signer, artifact).await?;
        let address = chain.instantiate_contract(signer, code_id, &init_msg, &name, true).await?;
        Ok::<_, HarnessError>(DeployedContract { code_id, address, chain_id: chain_id.clone() })
    }
    .await
    .map_err(|e| HarnessError::deployment(&name, e))?;

    log::info!("[{}] deployed {} code {} at {}", chain_id, name, deployed.code_id, deployed.address);
    Ok(deployed)
}

/// Uploads code without instantiating it; vaults are instantiated by the
/// factory.
pub async fn store_code(chain: &dyn ChainNode, signer: &str, artifact: &Path) -> Result<CodeId> {
    let name = artifact_name(artifact);
    let code_id = chain
        .store_contract(signer, artifact)
        .await
        .map_err(|e| HarnessError::deployment(&name, e))?;
    log::info!("[{}] stored {} as code {}", chain.config().chain_id, name, code_id);
    Ok(code_id)
}

/// Adds `amount` to `spender`'s cw20 allowance over `owner`'s balance.
/// Grants accumulate.
pub async fn set_allowance(
    chain: &dyn ChainNode,
    owner: &str,
    token: &str,
    spender: &str,
    amount: u128,
    fees: &FeeConfig,
) -> Result<TransactionResponse> {
    let msg = Cw20ExecuteMsg::IncreaseAllowance { spender: spender.to_string(), amount };
    let tx = response::execute(chain, owner, token, &msg, fees).await?;
    log::debug!("[{}] allowance +{} on {} for {}", chain.config().chain_id, amount, token, spender);
    Ok(tx)
}

pub async fn transfer_tokens(
    chain: &dyn ChainNode,
    from: &str,
    token: &str,
    recipient: &str,
    amount: u128,
    fees: &FeeConfig,
) -> Result<TransactionResponse> {
    let msg = Cw20ExecuteMsg::Transfer { recipient: recipient.to_string(), amount };
    response::execute(chain, from, token, &msg, fees).await
}

pub async fn query_cw20_balance(chain: &dyn ChainNode, token: &str, address: &str) -> Result<u128> {
    let msg = serde_json::to_string(&Cw20QueryMsg::Balance { address: address.to_string() })
        .map_err(|e| HarnessError::malformed("balance query", e))?;
    let data = chain.query_smart(token, &msg).await?;
    let balance: BalanceResponse =
        serde_json::from_value(data).map_err(|e| HarnessError::malformed("balance query", e))?;
    Ok(balance.balance)
}
