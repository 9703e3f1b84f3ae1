use crate::chain::{ChainConfig, ChainNode, ChannelInfo, FeeConfig, FundedAccount, Relayer, SandboxProvider};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use std::sync::Arc;

/// Key names given to the funded accounts of each chain, in order.
pub const USER_KEYS: [&str; 2] = ["governance", "swapper"];

pub struct ChainEnvironment {
    pub node: Arc<dyn ChainNode>,
    pub users: Vec<FundedAccount>,
    pub fees: FeeConfig,
}

impl ChainEnvironment {
    pub fn config(&self) -> &ChainConfig {
        self.node.config()
    }

    pub fn chain_id(&self) -> &str {
        &self.node.config().chain_id
    }

    /// First funded account; deploys and administers the contracts.
    pub fn governance(&self) -> Result<&FundedAccount> {
        self.user(0)
    }

    pub fn swapper(&self) -> Result<&FundedAccount> {
        self.user(1)
    }

    pub fn user(&self, index: usize) -> Result<&FundedAccount> {
        self.users
            .get(index)
            .ok_or_else(|| HarnessError::Setup(format!("{} has no funded user #{}", self.chain_id(), index)))
    }
}

pub struct RelayerLink {
    pub relayer: Arc<dyn Relayer>,
    pub path: String,
    /// Indices into `Interchain::environments` of the linked pair.
    pub chains: (usize, usize),
    /// Open channel on each side, in `chains` order.
    pub channels: (ChannelInfo, ChannelInfo),
}

/// Everything the builder brought up. Call [`Interchain::teardown`] when done.
pub struct Interchain {
    pub environments: Vec<ChainEnvironment>,
    pub relayer: Option<RelayerLink>,
    provider: Arc<dyn SandboxProvider>,
}

impl Interchain {
    pub fn chain(&self, index: usize) -> Result<&ChainEnvironment> {
        self.environments
            .get(index)
            .ok_or_else(|| HarnessError::Setup(format!("no chain at index {}", index)))
    }

    /// Stops the relayer and releases every sandbox. Keeps going past
    /// failures and returns the first one.
    pub async fn teardown(&self) -> Result<()> {
        let mut first_error = None;
        if let Some(link) = &self.relayer {
            if let Err(e) = link.relayer.stop().await {
                log::warn!("failed to stop relayer on {}: {}", link.path, e);
                first_error.get_or_insert(e);
            }
        }
        for env in &self.environments {
            if let Err(e) = self.provider.release(env.node.as_ref()).await {
                log::warn!("failed to release {}: {}", env.chain_id(), e);
                first_error.get_or_insert(e);
            }
        }
        log::info!("Interchain torn down ({} chains)", self.environments.len());
        first_error.map_or(Ok(()), Err)
    }
}

pub struct EnvironmentBuilder {
    provider: Arc<dyn SandboxProvider>,
}

impl EnvironmentBuilder {
    pub fn new(provider: Arc<dyn SandboxProvider>) -> Self {
        EnvironmentBuilder { provider }
    }

    pub async fn build(&self, config: &HarnessConfig) -> Result<Interchain> {
        config.validate()?;
        if config.relayer.is_some() && config.chains.len() != 2 {
            return Err(HarnessError::Setup(format!(
                "a relayer path joins exactly two chains, {} configured",
                config.chains.len()
            )));
        }

        let mut interchain = Interchain {
            environments: Vec::with_capacity(config.chains.len()),
            relayer: None,
            provider: self.provider.clone(),
        };
        if let Err(e) = self.bring_up(&mut interchain, config).await {
            // Leave nothing running behind a failed build.
            if let Err(cleanup) = interchain.teardown().await {
                log::warn!("cleanup after failed build: {}", cleanup);
            }
            return Err(e);
        }
        Ok(interchain)
    }

    /// Each node joins `interchain` as soon as it is provisioned, so a
    /// teardown after any later failure reaches it.
    async fn bring_up(&self, interchain: &mut Interchain, config: &HarnessConfig) -> Result<()> {
        for (index, spec) in config.chains.iter().enumerate() {
            let node = self.provider.provision(spec, index).await?;
            let fees = FeeConfig::for_chain(node.config(), config.gas_limit);
            interchain.environments.push(ChainEnvironment { node, users: Vec::new(), fees });
            let env = interchain
                .environments
                .last_mut()
                .ok_or_else(|| HarnessError::Setup("chain vanished during setup".to_string()))?;

            for user in 0..config.users_per_chain {
                let key = USER_KEYS.get(user).map(|k| k.to_string()).unwrap_or_else(|| format!("user{}", user));
                let funded = self.provider.fund_user(env.node.as_ref(), &key, config.fund_amount).await?;
                env.users.push(funded);
            }
            log::info!("Chain {} ready with {} funded users", env.chain_id(), env.users.len());
        }

        if let Some(spec) = &config.relayer {
            let link = self.link(interchain, spec).await?;
            interchain.relayer = Some(link);
        }
        Ok(())
    }

    async fn link(&self, interchain: &Interchain, spec: &crate::config::RelayerSpec) -> Result<RelayerLink> {
        let (a, b) = spec.chains;
        let (env_a, env_b) = (interchain.chain(a)?, interchain.chain(b)?);
        let relayer = self.provider.relayer(spec)?;

        relayer.link(&spec.path, env_a.config(), env_b.config()).await?;
        let channels = (
            first_channel(relayer.as_ref(), env_a.chain_id()).await?,
            first_channel(relayer.as_ref(), env_b.chain_id()).await?,
        );
        relayer.start(&spec.path).await?;
        log::info!(
            "Relayer up on {}: {}/{} <-> {}/{}",
            spec.path,
            env_a.chain_id(),
            channels.0.channel_id,
            env_b.chain_id(),
            channels.1.channel_id
        );
        Ok(RelayerLink { relayer, path: spec.path.clone(), chains: (a, b), channels })
    }
}

async fn first_channel(relayer: &dyn Relayer, chain_id: &str) -> Result<ChannelInfo> {
    relayer
        .get_channels(chain_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| HarnessError::NoChannelEstablished { chain_id: chain_id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainConfig, ChannelInfo};
    use crate::config::ChainSpec;
    use crate::mock::MockSandbox;
    use async_trait::async_trait;

    #[tokio::test]
    async fn builds_two_funded_chains() {
        let sandbox = MockSandbox::new();
        let interchain = EnvironmentBuilder::new(Arc::new(sandbox)).build(&HarnessConfig::default()).await.unwrap();

        assert_eq!(interchain.environments.len(), 2);
        for env in &interchain.environments {
            assert_eq!(env.users.len(), 2);
            assert_eq!(env.governance().unwrap().key_name, "governance");
            assert_eq!(env.swapper().unwrap().initial_balance, 10_000_000);
            assert_eq!(env.fees.gas_limit, 50_000_000);
        }
        assert!(interchain.relayer.is_none());
    }

    #[tokio::test]
    async fn starts_relayer_with_resolved_channels() {
        let sandbox = MockSandbox::new();
        let network = sandbox.network().clone();
        let interchain =
            EnvironmentBuilder::new(Arc::new(sandbox)).build(&HarnessConfig::default().with_relayer()).await.unwrap();

        let link = interchain.relayer.as_ref().unwrap();
        assert_eq!(link.path, "junoA-junoB-demo");
        assert_eq!(link.channels.0.chain_id, "juno-1");
        assert_eq!(link.channels.1.chain_id, "juno-2");
        assert!(network.relayer_running().unwrap());

        interchain.teardown().await.unwrap();
        assert!(!network.relayer_running().unwrap());
        assert!(network.is_released("juno-1").unwrap());
        assert!(network.is_released("juno-2").unwrap());
    }

    #[tokio::test]
    async fn relayer_needs_exactly_two_chains() {
        let mut config = HarnessConfig::default().with_relayer();
        config.chains.push(ChainSpec::default());
        let err = EnvironmentBuilder::new(Arc::new(MockSandbox::new())).build(&config).await.err().unwrap();
        assert!(matches!(err, HarnessError::Setup(_)));
    }

    struct ChannelLessRelayer;

    #[async_trait]
    impl Relayer for ChannelLessRelayer {
        async fn link(&self, _: &str, _: &ChainConfig, _: &ChainConfig) -> Result<()> {
            Ok(())
        }
        async fn get_channels(&self, _: &str) -> Result<Vec<ChannelInfo>> {
            Ok(Vec::new())
        }
        async fn start(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn flush_acknowledgements(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn unrelayed_acknowledgements(&self, _: &str, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    struct ChannelLessSandbox(MockSandbox);

    #[async_trait]
    impl SandboxProvider for ChannelLessSandbox {
        async fn provision(&self, spec: &ChainSpec, index: usize) -> Result<Arc<dyn ChainNode>> {
            self.0.provision(spec, index).await
        }
        async fn fund_user(&self, chain: &dyn ChainNode, key_name: &str, amount: u128) -> Result<FundedAccount> {
            self.0.fund_user(chain, key_name, amount).await
        }
        fn relayer(&self, _: &crate::config::RelayerSpec) -> Result<Arc<dyn Relayer>> {
            Ok(Arc::new(ChannelLessRelayer))
        }
        async fn release(&self, chain: &dyn ChainNode) -> Result<()> {
            self.0.release(chain).await
        }
    }

    #[tokio::test]
    async fn missing_channel_is_reported_and_sandboxes_released() {
        let inner = MockSandbox::new();
        let network = inner.network().clone();
        let config = HarnessConfig::default().with_relayer();
        let err = EnvironmentBuilder::new(Arc::new(ChannelLessSandbox(inner))).build(&config).await.err().unwrap();

        match err {
            HarnessError::NoChannelEstablished { chain_id } => assert_eq!(chain_id, "juno-1"),
            other => panic!("expected NoChannelEstablished, got {:?}", other),
        }
        assert!(network.is_released("juno-1").unwrap());
    }

    /// Runs dry when asked to fund anything on `juno-2`.
    struct DryFaucetSandbox(MockSandbox);

    #[async_trait]
    impl SandboxProvider for DryFaucetSandbox {
        async fn provision(&self, spec: &ChainSpec, index: usize) -> Result<Arc<dyn ChainNode>> {
            self.0.provision(spec, index).await
        }
        async fn fund_user(&self, chain: &dyn ChainNode, key_name: &str, amount: u128) -> Result<FundedAccount> {
            if chain.config().chain_id == "juno-2" {
                return Err(HarnessError::Setup("faucet empty".to_string()));
            }
            self.0.fund_user(chain, key_name, amount).await
        }
        fn relayer(&self, spec: &crate::config::RelayerSpec) -> Result<Arc<dyn Relayer>> {
            self.0.relayer(spec)
        }
        async fn release(&self, chain: &dyn ChainNode) -> Result<()> {
            self.0.release(chain).await
        }
    }

    #[tokio::test]
    async fn failed_funding_releases_every_provisioned_chain() {
        let inner = MockSandbox::new();
        let network = inner.network().clone();
        let err = EnvironmentBuilder::new(Arc::new(DryFaucetSandbox(inner)))
            .build(&HarnessConfig::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, HarnessError::Setup(ref reason) if reason == "faucet empty"));
        assert!(network.is_released("juno-1").unwrap());
        assert!(network.is_released("juno-2").unwrap());
    }
}
