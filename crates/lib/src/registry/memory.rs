use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{
    merge_tracked, AccountStatus, Operator, ProtectionEntry, ReclaimHistoryEntry, RegistryStore,
    TrackedAccount,
};
use crate::error::SweepError;

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, TrackedAccount>,
    protections: HashMap<String, ProtectionEntry>,
    operators: HashMap<String, Operator>,
    history: Vec<ReclaimHistoryEntry>,
}

/// In-memory registry for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, SweepError> {
        self.inner
            .lock()
            .map_err(|e| SweepError::RegistryError(format!("Failed to lock registry: {e}")))
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn upsert_account(&self, account: TrackedAccount) -> Result<(), SweepError> {
        let mut inner = self.lock()?;
        let merged = match inner.accounts.get(&account.address) {
            Some(existing) => merge_tracked(existing, account),
            None => account,
        };
        inner.accounts.insert(merged.address.clone(), merged);
        Ok(())
    }

    async fn get_account(&self, address: &str) -> Result<Option<TrackedAccount>, SweepError> {
        Ok(self.lock()?.accounts.get(address).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<TrackedAccount>, SweepError> {
        Ok(self.lock()?.accounts.values().cloned().collect())
    }

    async fn list_accounts_by_status(
        &self,
        status: AccountStatus,
    ) -> Result<Vec<TrackedAccount>, SweepError> {
        Ok(self.lock()?.accounts.values().filter(|a| a.status == status).cloned().collect())
    }

    async fn update_account_state(
        &self,
        address: &str,
        status: AccountStatus,
        rent_lamports: u64,
    ) -> Result<(), SweepError> {
        let mut inner = self.lock()?;
        let account = inner
            .accounts
            .get_mut(address)
            .ok_or_else(|| SweepError::RegistryError(format!("Account {address} not tracked")))?;
        account.status = status;
        account.rent_lamports = rent_lamports;
        account.last_checked_at = chrono::Utc::now();
        Ok(())
    }

    async fn append_history(&self, entry: ReclaimHistoryEntry) -> Result<(), SweepError> {
        self.lock()?.history.push(entry);
        Ok(())
    }

    async fn list_history(&self) -> Result<Vec<ReclaimHistoryEntry>, SweepError> {
        Ok(self.lock()?.history.clone())
    }

    async fn is_protected(&self, address: &str) -> Result<bool, SweepError> {
        Ok(self.lock()?.protections.contains_key(address))
    }

    async fn add_protection(&self, entry: ProtectionEntry) -> Result<(), SweepError> {
        self.lock()?.protections.insert(entry.address.clone(), entry);
        Ok(())
    }

    async fn remove_protection(&self, address: &str) -> Result<bool, SweepError> {
        Ok(self.lock()?.protections.remove(address).is_some())
    }

    async fn list_protected(&self) -> Result<Vec<ProtectionEntry>, SweepError> {
        Ok(self.lock()?.protections.values().cloned().collect())
    }

    async fn upsert_operator(&self, operator: Operator) -> Result<(), SweepError> {
        let mut inner = self.lock()?;
        if operator.is_default {
            for existing in inner.operators.values_mut() {
                existing.is_default = false;
            }
        }
        inner.operators.insert(operator.name.clone(), operator);
        Ok(())
    }

    async fn default_operator(&self) -> Result<Option<Operator>, SweepError> {
        Ok(self.lock()?.operators.values().find(|o| o.is_default).cloned())
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, SweepError> {
        Ok(self.lock()?.operators.values().cloned().collect())
    }
}
