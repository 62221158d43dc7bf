use std::{sync::Arc, time::Duration};

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;

/// Confirmed commitment: the detector re-verifies everything anyway, and
/// waiting for finalized would double every read in the pipeline.
pub fn get_rpc_client(rpc_url: &str, timeout: Duration) -> Arc<RpcClient> {
    Arc::new(RpcClient::new_with_timeout_and_commitment(
        rpc_url.to_string(),
        timeout,
        CommitmentConfig::confirmed(),
    ))
}
