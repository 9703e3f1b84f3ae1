use super::{Link, MockNetwork};
use crate::chain::{ChainConfig, ChannelInfo, Relayer};
use crate::error::{HarnessError, Result};
use async_trait::async_trait;

/// Relayer over the mock network. Packets move only while it is started and
/// some chain is producing blocks.
#[derive(Clone)]
pub struct MockRelayer {
    network: MockNetwork,
}

impl MockRelayer {
    pub fn new(network: MockNetwork) -> Self {
        MockRelayer { network }
    }
}

#[async_trait]
impl Relayer for MockRelayer {
    async fn link(&self, path: &str, chain_a: &ChainConfig, chain_b: &ChainConfig) -> Result<()> {
        let mut state = self.network.lock()?;
        for chain_id in [&chain_a.chain_id, &chain_b.chain_id] {
            if !state.chains.contains_key(chain_id.as_str()) {
                return Err(HarnessError::Setup(format!("cannot link unknown chain {}", chain_id)));
            }
        }
        if state.links.iter().any(|l| l.path == path) {
            return Err(HarnessError::Setup(format!("path {} already linked", path)));
        }

        let next_channel = |chain_id: &str| {
            let used = state.links.iter().filter(|l| l.a.0 == chain_id || l.b.0 == chain_id).count();
            format!("channel-{}", used)
        };
        let link = Link {
            path: path.to_string(),
            a: (chain_a.chain_id.clone(), next_channel(&chain_a.chain_id)),
            b: (chain_b.chain_id.clone(), next_channel(&chain_b.chain_id)),
        };
        log::info!("[MockRelayer] linked {}: {}/{} <-> {}/{}", path, link.a.0, link.a.1, link.b.0, link.b.1);
        state.links.push(link);
        Ok(())
    }

    async fn get_channels(&self, chain_id: &str) -> Result<Vec<ChannelInfo>> {
        let state = self.network.lock()?;
        Ok(state
            .links
            .iter()
            .filter_map(|l| {
                let (local, remote) = if l.a.0 == chain_id {
                    (&l.a, &l.b)
                } else if l.b.0 == chain_id {
                    (&l.b, &l.a)
                } else {
                    return None;
                };
                Some(ChannelInfo {
                    chain_id: chain_id.to_string(),
                    channel_id: local.1.clone(),
                    port_id: "wasm".to_string(),
                    counterparty_channel_id: remote.1.clone(),
                    state: "STATE_OPEN".to_string(),
                })
            })
            .collect())
    }

    async fn start(&self, path: &str) -> Result<()> {
        let mut state = self.network.lock()?;
        if !state.links.iter().any(|l| l.path == path) {
            return Err(HarnessError::Setup(format!("path {} is not linked", path)));
        }
        state.running.insert(path.to_string());
        log::info!("[MockRelayer] started on {}", path);
        Ok(())
    }

    async fn flush_acknowledgements(&self, path: &str, channel_id: &str) -> Result<()> {
        let mut state = self.network.lock()?;
        if state.options.relayer_stalled {
            return Ok(());
        }
        let link = state
            .links
            .iter()
            .find(|l| l.path == path)
            .cloned()
            .ok_or_else(|| HarnessError::Setup(format!("path {} is not linked", path)))?;

        let on_path = |chain_id: &str, channel: &str| {
            (link.a.0 == chain_id && link.a.1 == channel) || (link.b.0 == chain_id && link.b.1 == channel)
        };
        let (flush, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending_acks)
            .into_iter()
            .partition(|a| a.channel_id == channel_id && on_path(&a.chain_id, &a.channel_id));
        state.pending_acks = keep;
        for ack in flush {
            state.deliver_ack(ack);
        }
        Ok(())
    }

    async fn unrelayed_acknowledgements(&self, path: &str, channel_id: &str) -> Result<usize> {
        let state = self.network.lock()?;
        let link = state
            .links
            .iter()
            .find(|l| l.path == path)
            .ok_or_else(|| HarnessError::Setup(format!("path {} is not linked", path)))?;
        Ok(state
            .pending_acks
            .iter()
            .filter(|a| a.channel_id == channel_id && link.counterparty(&a.chain_id, &a.channel_id).is_some())
            .count())
    }

    async fn stop(&self) -> Result<()> {
        self.network.lock()?.running.clear();
        log::info!("[MockRelayer] stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SandboxProvider;
    use crate::config::ChainSpec;
    use crate::mock::MockSandbox;

    #[tokio::test]
    async fn link_assigns_one_channel_per_side() {
        let sandbox = MockSandbox::new();
        let a = sandbox.provision(&ChainSpec::default(), 0).await.unwrap();
        let b = sandbox.provision(&ChainSpec::default(), 1).await.unwrap();
        let relayer = MockRelayer::new(sandbox.network().clone());

        relayer.link("junoA-junoB-demo", a.config(), b.config()).await.unwrap();
        let channels = relayer.get_channels("juno-1").await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_id, "channel-0");
        assert_eq!(channels[0].counterparty_channel_id, "channel-0");
        assert!(relayer.get_channels("juno-3").await.unwrap().is_empty());

        assert!(relayer.link("junoA-junoB-demo", a.config(), b.config()).await.is_err());
    }

    #[tokio::test]
    async fn start_requires_a_linked_path() {
        let sandbox = MockSandbox::new();
        let relayer = MockRelayer::new(sandbox.network().clone());
        assert!(matches!(relayer.start("missing").await, Err(HarnessError::Setup(_))));
        assert!(!sandbox.network().relayer_running().unwrap());
    }
}
