use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    error::SweepError,
    ledger::{retry::RetryingLedger, rpc_client::RpcLedgerClient, LedgerClient},
    registry::RegistryStore,
    rpc::get_rpc_client,
    signer::KeypairUtil,
};

/// Dependency bundle passed into each pipeline stage. One instance per
/// process replaces the global singletons the stages would otherwise reach
/// for; tests swap in mock ledgers and in-memory registries freely.
pub struct SweepContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub registry: Arc<dyn RegistryStore>,
    pub config: Config,
}

impl SweepContext {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        registry: Arc<dyn RegistryStore>,
        config: Config,
    ) -> Self {
        Self { ledger, registry, config }
    }

    /// Production wiring: RPC ledger client behind the read-retry wrapper,
    /// signing with the configured authority key.
    pub fn connect(registry: Arc<dyn RegistryStore>, config: Config) -> Result<Self, SweepError> {
        config.validate()?;

        let authority = KeypairUtil::from_private_key_string(&config.sweep.authority_key)?;
        let rpc = get_rpc_client(
            &config.sweep.rpc_url,
            Duration::from_secs(config.sweep.rpc_timeout_secs),
        );
        let inner: Arc<dyn LedgerClient> =
            Arc::new(RpcLedgerClient::new(rpc, Arc::new(authority)));
        let ledger: Arc<dyn LedgerClient> = Arc::new(RetryingLedger::new(
            inner,
            config.sweep.max_read_retries,
            Duration::from_millis(config.sweep.read_retry_base_ms),
        ));

        Ok(Self { ledger, registry, config })
    }
}
