use std::sync::Arc;
use std::time::Duration;

use ports::secondary::plugin_chain_port::PluginChainPort;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps the chained CNI plugin installed for the lifetime of the agent.
///
/// Install is retried until it succeeds, readiness is signalled exactly
/// once, and the chain is re-checked periodically since other CNI agents
/// may rewrite the config. Cleanup runs when the token is cancelled.
pub struct PluginChainService {
    chain: Arc<dyn PluginChainPort>,
    recheck: Duration,
}

impl PluginChainService {
    pub fn new(chain: Arc<dyn PluginChainPort>, recheck: Duration) -> Self {
        Self { chain, recheck }
    }

    async fn install_until_ready(&self, cancel_token: &CancellationToken) -> bool {
        loop {
            match self.chain.install().await {
                Ok(()) => return true,
                Err(e) => warn!(error = %e, "plugin chain install failed, retrying"),
            }
            tokio::select! {
                () = cancel_token.cancelled() => return false,
                () = tokio::time::sleep(self.recheck) => {}
            }
        }
    }

    pub async fn run(self, ready: oneshot::Sender<()>, cancel_token: CancellationToken) {
        if self.install_until_ready(&cancel_token).await {
            info!("plugin chain installed");
            let _ = ready.send(());

            let mut ticker = tokio::time::interval(self.recheck);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => break,
                    _ = ticker.tick() => match self.chain.is_installed() {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!("plugin dropped from chain, reinstalling");
                            if let Err(e) = self.chain.install().await {
                                warn!(error = %e, "plugin chain reinstall failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "plugin chain check failed"),
                    },
                }
            }
        }

        if let Err(e) = self.chain.cleanup().await {
            error!(error = %e, "plugin chain cleanup failed");
        } else {
            info!("plugin chain cleaned up");
        }
    }
}
