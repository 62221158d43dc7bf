use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account_interface::address::get_associated_token_address_with_program_id;

use crate::{
    context::SweepContext,
    error::SweepError,
    ledger::{is_token_program, AccountSnapshot, TokenAccountData},
    registry::{AccountKind, AccountStatus, TrackedAccount},
};

/// Aggregate result of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Accounts examined on-chain.
    pub scanned: usize,
    /// Rows inserted or refreshed in the registry.
    pub tracked: usize,
    /// Accounts observed with a zero token balance.
    pub reclaimable: usize,
    /// Rent held by those zero-balance accounts.
    pub reclaimable_lamports: u64,
}

/// Populates and refreshes the registry from ledger truth. Scans only read
/// the chain; the registry is the single thing they mutate.
pub struct Scanner {
    ctx: Arc<SweepContext>,
}

impl Scanner {
    pub fn new(ctx: Arc<SweepContext>) -> Self {
        Self { ctx }
    }

    /// Enumerates every token account owned by the operator and upserts a
    /// registry row per account. A failure on one account is logged and
    /// skipped; the scan always makes whatever progress it can.
    pub async fn scan_owned_accounts(&self) -> Result<ScanSummary, SweepError> {
        let owner = self.ctx.ledger.authority();
        let accounts = self.ctx.ledger.fetch_owned_token_accounts(&owner).await?;

        let mut summary = ScanSummary { scanned: accounts.len(), ..Default::default() };

        for account in accounts {
            let tracked = tracked_from_token_account(&account, None);
            let is_reclaimable = account.amount == 0;

            match self.ctx.registry.upsert_account(tracked).await {
                Ok(()) => {
                    summary.tracked += 1;
                    if is_reclaimable {
                        summary.reclaimable += 1;
                        summary.reclaimable_lamports += account.lamports;
                    }
                }
                Err(e) => {
                    tracing::warn!(account = %account.pubkey, error = %e, "Failed to track scanned account");
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            reclaimable = summary.reclaimable,
            lamports = summary.reclaimable_lamports,
            "Owned-account scan complete"
        );
        Ok(summary)
    }

    /// Tracks only accounts created by the given sponsorship transactions.
    /// Idempotent: addresses already tracked are left untouched.
    pub async fn scan_from_signatures(
        &self,
        signatures: &[String],
    ) -> Result<ScanSummary, SweepError> {
        let mut summary = ScanSummary::default();

        for signature in signatures {
            let created = match self.ctx.ledger.fetch_created_accounts(signature).await {
                Ok(created) => created,
                Err(e) => {
                    tracing::warn!(%signature, error = %e, "Failed to inspect sponsoring transaction");
                    continue;
                }
            };

            for address in created {
                summary.scanned += 1;
                match self.track_created_account(&address, signature).await {
                    Ok(true) => summary.tracked += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(account = %address, error = %e, "Failed to track sponsored account");
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Registers one account by address. No-op when already tracked; fails
    /// with `AccountNotFound` if the address does not exist on-chain.
    pub async fn track_single_account(
        &self,
        address: &str,
        sponsor_signature: Option<String>,
    ) -> Result<TrackedAccount, SweepError> {
        if let Some(existing) = self.ctx.registry.get_account(address).await? {
            return Ok(existing);
        }

        let pubkey = Pubkey::from_str(address)
            .map_err(|e| SweepError::ValidationError(format!("Invalid address {address}: {e}")))?;

        let snapshot = self
            .ctx
            .ledger
            .fetch_account_info(&pubkey)
            .await?
            .ok_or_else(|| SweepError::AccountNotFound(address.to_string()))?;

        let tracked = self.build_tracked(&pubkey, &snapshot, sponsor_signature).await?;
        self.ctx.registry.upsert_account(tracked.clone()).await?;
        Ok(tracked)
    }

    /// Returns whether a new row was inserted.
    async fn track_created_account(
        &self,
        address: &Pubkey,
        signature: &str,
    ) -> Result<bool, SweepError> {
        let address_str = address.to_string();
        if self.ctx.registry.get_account(&address_str).await?.is_some() {
            return Ok(false);
        }

        let Some(snapshot) = self.ctx.ledger.fetch_account_info(address).await? else {
            tracing::warn!(account = %address, "Created account no longer exists; skipping");
            return Ok(false);
        };

        let tracked =
            self.build_tracked(address, &snapshot, Some(signature.to_string())).await?;
        self.ctx.registry.upsert_account(tracked).await?;
        Ok(true)
    }

    async fn build_tracked(
        &self,
        address: &Pubkey,
        snapshot: &AccountSnapshot,
        sponsor_signature: Option<String>,
    ) -> Result<TrackedAccount, SweepError> {
        if is_token_program(&snapshot.owning_program) {
            let token = self
                .ctx
                .ledger
                .fetch_token_account(address)
                .await?
                .ok_or_else(|| SweepError::AccountNotFound(address.to_string()))?;
            Ok(tracked_from_token_account(&token, sponsor_signature))
        } else {
            let kind = if address.is_on_curve() {
                AccountKind::Unknown
            } else {
                AccountKind::ProgramDerivedAddress
            };
            let now = Utc::now();
            Ok(TrackedAccount {
                address: address.to_string(),
                kind,
                owner: snapshot.owning_program.to_string(),
                mint: None,
                rent_lamports: snapshot.lamports,
                sponsor_signature,
                created_at: now,
                last_checked_at: now,
                last_activity_at: None,
                status: AccountStatus::Active,
            })
        }
    }
}

/// Distinguishes plain token accounts from associated token accounts by
/// re-deriving the canonical ATA address.
pub fn classify_token_kind(account: &TokenAccountData) -> AccountKind {
    let derived = get_associated_token_address_with_program_id(
        &account.owner,
        &account.mint,
        &account.program_id,
    );
    if derived == account.pubkey {
        AccountKind::AssociatedTokenAccount
    } else {
        AccountKind::TokenAccount
    }
}

fn tracked_from_token_account(
    account: &TokenAccountData,
    sponsor_signature: Option<String>,
) -> TrackedAccount {
    let now = Utc::now();
    TrackedAccount {
        address: account.pubkey.to_string(),
        kind: classify_token_kind(account),
        owner: account.owner.to_string(),
        mint: Some(account.mint.to_string()),
        rent_lamports: account.lamports,
        sponsor_signature,
        created_at: now,
        last_checked_at: now,
        // A funded observation counts as activity. Once the account drains,
        // re-scans stop refreshing this and the inactivity clock runs from
        // the last funded sighting.
        last_activity_at: if account.amount > 0 { Some(now) } else { None },
        status: if account.amount == 0 {
            AccountStatus::Reclaimable
        } else {
            AccountStatus::Active
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::MockLedgerClient,
        registry::{memory::InMemoryRegistry, RegistryStore},
        tests::{test_config, token_account},
    };

    fn context(ledger: MockLedgerClient, registry: Arc<InMemoryRegistry>) -> Arc<SweepContext> {
        Arc::new(SweepContext::new(Arc::new(ledger), registry, test_config()))
    }

    #[tokio::test]
    async fn test_scan_owned_accounts_classifies_by_balance() {
        let registry = Arc::new(InMemoryRegistry::new());
        let owner = Pubkey::new_unique();
        let empty = token_account(Pubkey::new_unique(), 0, 2_039_280);
        let funded = token_account(Pubkey::new_unique(), 500, 2_039_280);
        let empty_address = empty.pubkey.to_string();
        let funded_address = funded.pubkey.to_string();

        let mut ledger = MockLedgerClient::new();
        ledger.expect_authority().return_const(owner);
        ledger
            .expect_fetch_owned_token_accounts()
            .returning(move |_| Ok(vec![empty.clone(), funded.clone()]));

        let scanner = Scanner::new(context(ledger, registry.clone()));
        let summary = scanner.scan_owned_accounts().await.unwrap();

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.tracked, 2);
        assert_eq!(summary.reclaimable, 1);
        assert_eq!(summary.reclaimable_lamports, 2_039_280);

        let empty_row = registry.get_account(&empty_address).await.unwrap().unwrap();
        assert_eq!(empty_row.status, AccountStatus::Reclaimable);
        let funded_row = registry.get_account(&funded_address).await.unwrap().unwrap();
        assert_eq!(funded_row.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_rescan_updates_row_in_place() {
        let registry = Arc::new(InMemoryRegistry::new());
        let owner = Pubkey::new_unique();
        let pubkey = Pubkey::new_unique();
        let address = pubkey.to_string();

        let funded = token_account(pubkey, 1_000, 2_039_280);
        let mut ledger = MockLedgerClient::new();
        ledger.expect_authority().return_const(owner);
        let mut drained = token_account(pubkey, 0, 2_039_280);
        drained.mint = funded.mint;
        let mut calls = vec![vec![funded.clone()], vec![drained]].into_iter();
        ledger
            .expect_fetch_owned_token_accounts()
            .times(2)
            .returning(move |_| Ok(calls.next().unwrap()));

        let scanner = Scanner::new(context(ledger, registry.clone()));
        scanner.scan_owned_accounts().await.unwrap();

        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Active);

        scanner.scan_owned_accounts().await.unwrap();

        let accounts = registry.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1, "re-scan must not duplicate the row");
        assert_eq!(accounts[0].status, AccountStatus::Reclaimable);
    }

    #[tokio::test]
    async fn test_scan_records_activity_for_funded_accounts_only() {
        let registry = Arc::new(InMemoryRegistry::new());
        let owner = Pubkey::new_unique();
        let pubkey = Pubkey::new_unique();
        let address = pubkey.to_string();
        let empty = token_account(Pubkey::new_unique(), 0, 2_039_280);
        let empty_address = empty.pubkey.to_string();

        let funded = token_account(pubkey, 300, 2_039_280);
        let mut drained = token_account(pubkey, 0, 2_039_280);
        drained.mint = funded.mint;

        let mut ledger = MockLedgerClient::new();
        ledger.expect_authority().return_const(owner);
        let mut calls =
            vec![vec![funded, empty.clone()], vec![drained, empty]].into_iter();
        ledger
            .expect_fetch_owned_token_accounts()
            .times(2)
            .returning(move |_| Ok(calls.next().unwrap()));

        let scanner = Scanner::new(context(ledger, registry.clone()));
        scanner.scan_owned_accounts().await.unwrap();

        let row = registry.get_account(&address).await.unwrap().unwrap();
        let funded_sighting = row.last_activity_at.expect("funded observation is activity");
        let empty_row = registry.get_account(&empty_address).await.unwrap().unwrap();
        assert!(empty_row.last_activity_at.is_none());

        // Draining the account keeps the last funded sighting for the
        // inactivity clock instead of clearing it.
        scanner.scan_owned_accounts().await.unwrap();
        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.last_activity_at, Some(funded_sighting));
    }

    #[tokio::test]
    async fn test_track_single_account_is_idempotent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let pubkey = Pubkey::new_unique();
        let address = pubkey.to_string();
        let account = token_account(pubkey, 0, 2_039_280);

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().times(1).returning(|_| {
            Ok(Some(AccountSnapshot {
                lamports: 2_039_280,
                owning_program: spl_token_interface::id(),
            }))
        });
        ledger.expect_fetch_token_account().times(1).returning(move |_| Ok(Some(account.clone())));

        let scanner = Scanner::new(context(ledger, registry.clone()));
        scanner.track_single_account(&address, None).await.unwrap();
        // Second call must not hit the ledger at all (times(1) above).
        scanner.track_single_account(&address, None).await.unwrap();

        assert_eq!(registry.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_track_single_account_missing_on_chain() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().returning(|_| Ok(None));

        let scanner = Scanner::new(context(ledger, registry));
        let result =
            scanner.track_single_account(&Pubkey::new_unique().to_string(), None).await;
        assert!(matches!(result, Err(SweepError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_scan_from_signatures_tags_sponsor_and_skips_tracked() {
        let registry = Arc::new(InMemoryRegistry::new());
        let created = Pubkey::new_unique();
        let address = created.to_string();
        let account = token_account(created, 0, 2_039_280);

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_fetch_created_accounts()
            .returning(move |_| Ok(vec![created]));
        ledger.expect_fetch_account_info().times(1).returning(|_| {
            Ok(Some(AccountSnapshot {
                lamports: 2_039_280,
                owning_program: spl_token_interface::id(),
            }))
        });
        ledger.expect_fetch_token_account().times(1).returning(move |_| Ok(Some(account.clone())));

        let scanner = Scanner::new(context(ledger, registry.clone()));
        let signatures = vec!["5igSponsor".to_string()];

        let summary = scanner.scan_from_signatures(&signatures).await.unwrap();
        assert_eq!(summary.tracked, 1);

        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.sponsor_signature.as_deref(), Some("5igSponsor"));

        // Re-running the same signature inserts nothing new.
        let summary = scanner.scan_from_signatures(&signatures).await.unwrap();
        assert_eq!(summary.tracked, 0);
        assert_eq!(registry.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_from_signatures_tolerates_bad_signature() {
        let registry = Arc::new(InMemoryRegistry::new());
        let created = Pubkey::new_unique();
        let account = token_account(created, 0, 2_039_280);

        let mut ledger = MockLedgerClient::new();
        let mut responses = vec![
            Err(SweepError::RpcError("not found".to_string())),
            Ok(vec![created]),
        ]
        .into_iter();
        ledger.expect_fetch_created_accounts().times(2).returning(move |_| responses.next().unwrap());
        ledger.expect_fetch_account_info().returning(|_| {
            Ok(Some(AccountSnapshot {
                lamports: 2_039_280,
                owning_program: spl_token_interface::id(),
            }))
        });
        ledger.expect_fetch_token_account().returning(move |_| Ok(Some(account.clone())));

        let scanner = Scanner::new(context(ledger, registry));
        let summary = scanner
            .scan_from_signatures(&["bad".to_string(), "good".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.tracked, 1);
    }

    #[test]
    fn test_classify_token_kind_detects_ata() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let program_id = spl_token_interface::id();
        let ata = get_associated_token_address_with_program_id(&owner, &mint, &program_id);

        let mut account = token_account(ata, 0, 2_039_280);
        account.owner = owner;
        account.mint = mint;
        assert_eq!(classify_token_kind(&account), AccountKind::AssociatedTokenAccount);

        let mut plain = token_account(Pubkey::new_unique(), 0, 2_039_280);
        plain.owner = owner;
        plain.mint = mint;
        assert_eq!(classify_token_kind(&plain), AccountKind::TokenAccount);
    }
}
