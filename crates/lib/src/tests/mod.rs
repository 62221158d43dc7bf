//! Shared fixtures for unit tests across the crate.

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;

use crate::{
    config::{Config, SweepConfig},
    detector::{DetectionReason, DetectionResult},
    ledger::TokenAccountData,
    registry::{AccountKind, AccountStatus, TrackedAccount},
};

/// Valid, fully resolved config. Delays are collapsed to 1ms so batch tests
/// do not sleep for real.
pub fn test_config() -> Config {
    Config {
        sweep: SweepConfig {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            rpc_timeout_secs: 90,
            treasury: Pubkey::new_unique().to_string(),
            authority_key: "authority.json".to_string(),
            dry_run_default: true,
            min_inactive_days: 30,
            cooldown_hours: 24,
            inter_tx_delay_ms: 1,
            max_read_retries: 3,
            read_retry_base_ms: 1,
            registry_path: "sweep_registry.json".to_string(),
            history_path: "sweep_history.csv".to_string(),
        },
    }
}

/// Tracked token account with a fixed, human-readable address. Registry tests
/// use these; anything that parses the address needs [`tracked_token_account`].
pub fn tracked_account(address: &str, status: AccountStatus, rent_lamports: u64) -> TrackedAccount {
    let now = Utc::now();
    TrackedAccount {
        address: address.to_string(),
        kind: AccountKind::TokenAccount,
        owner: Pubkey::new_unique().to_string(),
        mint: Some(Pubkey::new_unique().to_string()),
        rent_lamports,
        sponsor_signature: Some("5ponsorSig".to_string()),
        created_at: now,
        last_checked_at: now,
        last_activity_at: None,
        status,
    }
}

/// Tracked token account whose address is a real pubkey.
pub fn tracked_token_account(status: AccountStatus, rent_lamports: u64) -> TrackedAccount {
    tracked_account(&Pubkey::new_unique().to_string(), status, rent_lamports)
}

/// Live token account state as the ledger client would return it.
pub fn token_account(pubkey: Pubkey, amount: u64, lamports: u64) -> TokenAccountData {
    TokenAccountData {
        pubkey,
        mint: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        amount,
        lamports,
        program_id: spl_token_interface::id(),
    }
}

/// Verified zero-balance verdict for the given account.
pub fn safe_detection(account: &TrackedAccount) -> DetectionResult {
    DetectionResult {
        account: account.clone(),
        reason: DetectionReason::ZeroBalance,
        reclaimable_lamports: account.rent_lamports,
        safe: true,
        note: "Token balance is zero".to_string(),
    }
}
