use async_trait::async_trait;
use mockall::automock;

use super::{AccountStatus, Operator, ProtectionEntry, ReclaimHistoryEntry, TrackedAccount};
use crate::error::SweepError;

/// Persistence consumed by every pipeline stage. Any storage technology that
/// can satisfy these query shapes is substitutable; the pipeline never sees
/// anything more specific than this trait.
#[automock]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert, or refresh mutable fields of, the row keyed by the account's
    /// address. Never duplicates a row.
    async fn upsert_account(&self, account: TrackedAccount) -> Result<(), SweepError>;

    async fn get_account(&self, address: &str) -> Result<Option<TrackedAccount>, SweepError>;

    async fn list_accounts(&self) -> Result<Vec<TrackedAccount>, SweepError>;

    async fn list_accounts_by_status(
        &self,
        status: AccountStatus,
    ) -> Result<Vec<TrackedAccount>, SweepError>;

    /// Atomic status + rent update, also bumping the last-checked time.
    /// Fails with `RegistryError` if the address is not tracked.
    async fn update_account_state(
        &self,
        address: &str,
        status: AccountStatus,
        rent_lamports: u64,
    ) -> Result<(), SweepError>;

    /// Append-only. Entries are never updated or deleted.
    async fn append_history(&self, entry: ReclaimHistoryEntry) -> Result<(), SweepError>;

    async fn list_history(&self) -> Result<Vec<ReclaimHistoryEntry>, SweepError>;

    async fn is_protected(&self, address: &str) -> Result<bool, SweepError>;

    async fn add_protection(&self, entry: ProtectionEntry) -> Result<(), SweepError>;

    /// Returns whether a protection row existed for the address.
    async fn remove_protection(&self, address: &str) -> Result<bool, SweepError>;

    async fn list_protected(&self) -> Result<Vec<ProtectionEntry>, SweepError>;

    /// Insert or replace an operator by name. Setting `is_default` clears the
    /// flag on every other operator in the same write.
    async fn upsert_operator(&self, operator: Operator) -> Result<(), SweepError>;

    async fn default_operator(&self) -> Result<Option<Operator>, SweepError>;

    async fn list_operators(&self) -> Result<Vec<Operator>, SweepError>;
}
