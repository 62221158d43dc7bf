pub mod file;
pub mod memory;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::RegistryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    TokenAccount,
    AssociatedTokenAccount,
    ProgramDerivedAddress,
    Unknown,
}

impl AccountKind {
    /// Only token-style accounts are closable through the reclaim path.
    pub fn is_token(&self) -> bool {
        matches!(self, AccountKind::TokenAccount | AccountKind::AssociatedTokenAccount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Reclaimable,
    Reclaimed,
    Protected,
}

/// One row per on-chain account being monitored, keyed by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAccount {
    pub address: String,
    pub kind: AccountKind,
    pub owner: String,
    pub mint: Option<String>,
    pub rent_lamports: u64,
    pub sponsor_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub status: AccountStatus,
}

/// Re-scanning an already-tracked address refreshes mutable fields in place.
/// Identity fields (`address`, `created_at`, the original sponsor reference)
/// survive, and `protected` is sticky: only an explicit whitelist removal may
/// clear it, never a scan.
pub fn merge_tracked(existing: &TrackedAccount, incoming: TrackedAccount) -> TrackedAccount {
    TrackedAccount {
        address: existing.address.clone(),
        kind: incoming.kind,
        owner: incoming.owner,
        mint: incoming.mint.or_else(|| existing.mint.clone()),
        rent_lamports: incoming.rent_lamports,
        sponsor_signature: existing
            .sponsor_signature
            .clone()
            .or(incoming.sponsor_signature),
        created_at: existing.created_at,
        last_checked_at: incoming.last_checked_at,
        last_activity_at: incoming.last_activity_at.or(existing.last_activity_at),
        status: if existing.status == AccountStatus::Protected {
            AccountStatus::Protected
        } else {
            incoming.status
        },
    }
}

/// Append-only audit record for a reclaim that reached execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReclaimHistoryEntry {
    pub address: String,
    pub amount_lamports: u64,
    pub signature: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Whitelist row. Presence of a row is the "protected" signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionEntry {
    pub address: String,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

/// Multi-tenant extension: a named operator identity. At most one operator
/// holds the default flag at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    pub signer_key: String,
    pub treasury: String,
    pub is_default: bool,
}
