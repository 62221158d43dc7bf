use std::{sync::Arc, time::Duration};

use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;

use super::{AccountSnapshot, LedgerClient, TokenAccountData};
use crate::error::SweepError;

/// Wraps a ledger client with bounded exponential backoff on the read path.
/// `submit_close` passes through exactly once: retrying a submission after an
/// ambiguous failure risks closing twice what should close once.
pub struct RetryingLedger {
    inner: Arc<dyn LedgerClient>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingLedger {
    pub fn new(inner: Arc<dyn LedgerClient>, max_retries: u32, base_delay: Duration) -> Self {
        Self { inner, max_retries: max_retries.max(1), base_delay }
    }

    async fn with_retries<T, F, Fut>(&self, mut call: F) -> Result<T, SweepError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, SweepError>>,
    {
        let mut last_error = None;
        let mut delay = self.base_delay;

        for attempt in 0..self.max_retries {
            match call().await {
                Ok(value) => return Ok(value),
                // Only transport-level failures are worth retrying.
                Err(e @ SweepError::RpcError(_)) => {
                    last_error = Some(e);
                    if attempt < self.max_retries - 1 {
                        sleep(delay).await;
                        delay *= 2;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| SweepError::InternalServerError("Ledger read failed".to_string())))
    }
}

#[async_trait::async_trait]
impl LedgerClient for RetryingLedger {
    fn authority(&self) -> Pubkey {
        self.inner.authority()
    }

    async fn fetch_account_info(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AccountSnapshot>, SweepError> {
        self.with_retries(|| self.inner.fetch_account_info(address)).await
    }

    async fn fetch_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<TokenAccountData>, SweepError> {
        self.with_retries(|| self.inner.fetch_token_account(address)).await
    }

    async fn fetch_owned_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountData>, SweepError> {
        self.with_retries(|| self.inner.fetch_owned_token_accounts(owner)).await
    }

    async fn fetch_created_accounts(&self, signature: &str) -> Result<Vec<Pubkey>, SweepError> {
        self.with_retries(|| self.inner.fetch_created_accounts(signature)).await
    }

    async fn submit_close(
        &self,
        account: &TokenAccountData,
        destination: &Pubkey,
    ) -> Result<String, SweepError> {
        self.inner.submit_close(account, destination).await
    }
}
