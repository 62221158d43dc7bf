pub mod retry;
pub mod rpc_client;

use async_trait::async_trait;
use mockall::automock;
use solana_sdk::pubkey::Pubkey;

use crate::error::SweepError;

/// Raw account state as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub lamports: u64,
    pub owning_program: Pubkey,
}

/// Decoded SPL token account state, either token program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountData {
    pub pubkey: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub lamports: u64,
    pub program_id: Pubkey,
}

/// Ledger access consumed by every pipeline stage. Reads are side-effect
/// free; `submit_close` is the single write path and is never retried.
#[automock]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Public key of the operator authority this client signs with.
    fn authority(&self) -> Pubkey;

    /// Returns `None` when the account does not exist on-chain.
    async fn fetch_account_info(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AccountSnapshot>, SweepError>;

    /// Returns `None` when the account does not exist. Errors if the account
    /// exists but is not a token account of either token program.
    async fn fetch_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<TokenAccountData>, SweepError>;

    /// All token accounts whose owner field equals `owner`, both programs.
    async fn fetch_owned_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountData>, SweepError>;

    /// Addresses created by the transaction with the given signature
    /// (create / initialize-account variants, including inner instructions).
    async fn fetch_created_accounts(&self, signature: &str) -> Result<Vec<Pubkey>, SweepError>;

    /// Builds, signs, submits and confirms a close-account instruction that
    /// sends the account's lamports to `destination`. Returns the signature.
    async fn submit_close(
        &self,
        account: &TokenAccountData,
        destination: &Pubkey,
    ) -> Result<String, SweepError>;
}

pub fn is_token_program(program_id: &Pubkey) -> bool {
    *program_id == spl_token_interface::id() || *program_id == spl_token_2022_interface::id()
}
