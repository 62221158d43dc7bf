use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    merge_tracked, AccountStatus, Operator, ProtectionEntry, ReclaimHistoryEntry, RegistryStore,
    TrackedAccount,
};
use crate::error::SweepError;

#[derive(Default, Serialize, Deserialize)]
struct RegistryData {
    accounts: HashMap<String, TrackedAccount>,
    protections: HashMap<String, ProtectionEntry>,
    operators: HashMap<String, Operator>,
}

/// File-backed registry: a JSON snapshot for mutable rows and an append-only
/// CSV file for the audit history. The history file is only ever opened in
/// append mode; nothing in this store can rewrite an entry once written.
pub struct FileRegistry {
    data_path: PathBuf,
    history_path: PathBuf,
    data: Mutex<RegistryData>,
}

impl FileRegistry {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        data_path: P,
        history_path: Q,
    ) -> Result<Self, SweepError> {
        let data_path = data_path.as_ref().to_path_buf();
        let data = if data_path.exists() {
            let raw = fs::read_to_string(&data_path)?;
            serde_json::from_str(&raw)
                .map_err(|e| SweepError::RegistryError(format!("Corrupt registry file: {e}")))?
        } else {
            RegistryData::default()
        };

        Ok(Self {
            data_path,
            history_path: history_path.as_ref().to_path_buf(),
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryData>, SweepError> {
        self.data
            .lock()
            .map_err(|e| SweepError::RegistryError(format!("Failed to lock registry: {e}")))
    }

    fn save(&self, data: &RegistryData) -> Result<(), SweepError> {
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.data_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for FileRegistry {
    async fn upsert_account(&self, account: TrackedAccount) -> Result<(), SweepError> {
        let mut data = self.lock()?;
        let merged = match data.accounts.get(&account.address) {
            Some(existing) => merge_tracked(existing, account),
            None => account,
        };
        data.accounts.insert(merged.address.clone(), merged);
        self.save(&data)
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
        let mut data = self.lock()?;
        let account = data
            .accounts
            .get_mut(address)
            .ok_or_else(|| SweepError::RegistryError(format!("Account {address} not tracked")))?;
        account.status = status;
        account.rent_lamports = rent_lamports;
        account.last_checked_at = chrono::Utc::now();
        self.save(&data)
    }

    async fn append_history(&self, entry: ReclaimHistoryEntry) -> Result<(), SweepError> {
        // Hold the lock so concurrent appends cannot interleave rows.
        let _data = self.lock()?;
        let file_exists = self.history_path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&self.history_path)?;

        let mut writer = csv::WriterBuilder::new().has_headers(!file_exists).from_writer(file);
        writer.serialize(&entry)?;
        writer
            .flush()
            .map_err(|e| SweepError::RegistryError(format!("Failed to flush history: {e}")))?;
        Ok(())
    }

    async fn list_history(&self) -> Result<Vec<ReclaimHistoryEntry>, SweepError> {
        if !self.history_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.history_path)?;
        let mut reader = csv::Reader::from_reader(file);
        let mut entries = Vec::new();
        for result in reader.deserialize() {
            entries.push(result?);
        }
        Ok(entries)
    }

    async fn is_protected(&self, address: &str) -> Result<bool, SweepError> {
        Ok(self.lock()?.protections.contains_key(address))
    }

    async fn add_protection(&self, entry: ProtectionEntry) -> Result<(), SweepError> {
        let mut data = self.lock()?;
        data.protections.insert(entry.address.clone(), entry);
        self.save(&data)
    }

    async fn remove_protection(&self, address: &str) -> Result<bool, SweepError> {
        let mut data = self.lock()?;
        let removed = data.protections.remove(address).is_some();
        if removed {
            self.save(&data)?;
        }
        Ok(removed)
    }

    async fn list_protected(&self) -> Result<Vec<ProtectionEntry>, SweepError> {
        Ok(self.lock()?.protections.values().cloned().collect())
    }

    async fn upsert_operator(&self, operator: Operator) -> Result<(), SweepError> {
        let mut data = self.lock()?;
        if operator.is_default {
            for existing in data.operators.values_mut() {
                existing.is_default = false;
            }
        }
        data.operators.insert(operator.name.clone(), operator);
        self.save(&data)
    }

    async fn default_operator(&self) -> Result<Option<Operator>, SweepError> {
        Ok(self.lock()?.operators.values().find(|o| o.is_default).cloned())
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, SweepError> {
        Ok(self.lock()?.operators.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::tracked_account;

    fn open_registry(dir: &tempfile::TempDir) -> FileRegistry {
        FileRegistry::open(dir.path().join("registry.json"), dir.path().join("history.csv"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accounts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = open_registry(&dir);
            registry
                .upsert_account(tracked_account("addr1", AccountStatus::Active, 1_500_000))
                .await
                .unwrap();
        }

        let registry = open_registry(&dir);
        let account = registry.get_account("addr1").await.unwrap().unwrap();
        assert_eq!(account.rent_lamports, 1_500_000);
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_history_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let entry = |address: &str| ReclaimHistoryEntry {
            address: address.to_string(),
            amount_lamports: 2_039_280,
            signature: "sig".to_string(),
            reason: "zero_balance".to_string(),
            timestamp: chrono::Utc::now(),
        };

        {
            let registry = open_registry(&dir);
            registry.append_history(entry("addr1")).await.unwrap();
        }
        let registry = open_registry(&dir);
        registry.append_history(entry("addr2")).await.unwrap();

        let history = registry.list_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].address, "addr1");
        assert_eq!(history[1].address, "addr2");
    }

    #[tokio::test]
    async fn test_missing_history_file_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);
        assert!(registry.list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_registry_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("registry.json");
        fs::write(&data_path, "{ not json").unwrap();

        let result = FileRegistry::open(&data_path, dir.path().join("history.csv"));
        assert!(matches!(result, Err(SweepError::RegistryError(_))));
    }

    #[tokio::test]
    async fn test_protection_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = open_registry(&dir);
            registry
                .add_protection(ProtectionEntry {
                    address: "addr1".to_string(),
                    reason: "treasury ATA".to_string(),
                    added_at: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }

        let registry = open_registry(&dir);
        assert!(registry.is_protected("addr1").await.unwrap());
    }
}
