use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use solana_sdk::pubkey::Pubkey;

use crate::{
    context::SweepContext,
    error::SweepError,
    ledger::{AccountSnapshot, TokenAccountData},
    registry::{AccountStatus, TrackedAccount},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionReason {
    Closed,
    ZeroBalance,
    Inactive,
}

impl std::fmt::Display for DetectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionReason::Closed => write!(f, "closed"),
            DetectionReason::ZeroBalance => write!(f, "zero_balance"),
            DetectionReason::Inactive => write!(f, "inactive"),
        }
    }
}

/// Per-account verdict. `safe` asserts that an automated close cannot destroy
/// user value; it is true only for verified zero balance or on-chain absence.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub account: TrackedAccount,
    pub reason: DetectionReason,
    pub reclaimable_lamports: u64,
    pub safe: bool,
    pub note: String,
}

/// Current chain state for one tracked account, as fetched by the detector.
#[derive(Debug, Clone)]
pub struct LiveAccountState {
    pub snapshot: Option<AccountSnapshot>,
    pub token: Option<TokenAccountData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Closed { reclaimable_lamports: u64 },
    ZeroBalance { rent_lamports: u64 },
    Inactive { rent_lamports: u64 },
    Active { rent_lamports: u64 },
}

/// Pure classification rule, kept free of registry access so it can be tested
/// against synthetic states. Gates are ordered; the first match wins:
/// absence, then verified zero balance, then the inactivity threshold.
pub fn classify(
    tracked: &TrackedAccount,
    live: &LiveAccountState,
    now: DateTime<Utc>,
    min_inactive_days: u64,
) -> Classification {
    let Some(snapshot) = &live.snapshot else {
        // Closed by any party; the reclaimable amount is whatever rent we
        // last recorded before the account vanished.
        return Classification::Closed { reclaimable_lamports: tracked.rent_lamports };
    };

    if tracked.kind.is_token() {
        match &live.token {
            Some(token) if token.amount == 0 => {
                return Classification::ZeroBalance { rent_lamports: token.lamports };
            }
            Some(_) => {}
            // Existed when the raw snapshot was taken, gone by the time the
            // token fetch ran. Treat as closed.
            None => {
                return Classification::Closed { reclaimable_lamports: tracked.rent_lamports };
            }
        }
    }

    if let Some(last_activity) = tracked.last_activity_at {
        if now - last_activity > Duration::days(min_inactive_days as i64) {
            return Classification::Inactive { rent_lamports: snapshot.lamports };
        }
    }

    Classification::Active { rent_lamports: snapshot.lamports }
}

/// Re-examines tracked accounts against current chain state. The registry's
/// cached status is a hint only; every verdict here is derived from a fresh
/// ledger read, and the registry row is refreshed as a documented side effect.
pub struct Detector {
    ctx: Arc<SweepContext>,
}

impl Detector {
    pub fn new(ctx: Arc<SweepContext>) -> Self {
        Self { ctx }
    }

    /// `None` means "nothing to report": untracked (caller error), protected
    /// (whitelist always wins), or simply still active.
    pub async fn check_account(
        &self,
        address: &str,
    ) -> Result<Option<DetectionResult>, SweepError> {
        let Some(tracked) = self.ctx.registry.get_account(address).await? else {
            tracing::warn!(%address, "Asked to check an account that is not tracked");
            return Ok(None);
        };

        if tracked.status == AccountStatus::Protected
            || self.ctx.registry.is_protected(address).await?
        {
            return Ok(None);
        }

        let pubkey = Pubkey::from_str(address)
            .map_err(|e| SweepError::ValidationError(format!("Invalid address {address}: {e}")))?;

        let snapshot = self.ctx.ledger.fetch_account_info(&pubkey).await?;
        let token = if snapshot.is_some() && tracked.kind.is_token() {
            self.ctx.ledger.fetch_token_account(&pubkey).await?
        } else {
            None
        };

        let live = LiveAccountState { snapshot, token };
        let classification =
            classify(&tracked, &live, Utc::now(), self.ctx.config.sweep.min_inactive_days);

        match classification {
            Classification::Closed { reclaimable_lamports } => {
                self.ctx
                    .registry
                    .update_account_state(address, AccountStatus::Reclaimed, 0)
                    .await?;
                let mut account = tracked;
                account.status = AccountStatus::Reclaimed;
                account.rent_lamports = 0;
                Ok(Some(DetectionResult {
                    account,
                    reason: DetectionReason::Closed,
                    reclaimable_lamports,
                    safe: true,
                    note: format!(
                        "Account no longer exists on-chain; {reclaimable_lamports} lamports were recorded before closure"
                    ),
                }))
            }
            Classification::ZeroBalance { rent_lamports } => {
                self.ctx
                    .registry
                    .update_account_state(address, AccountStatus::Reclaimable, rent_lamports)
                    .await?;
                let mut account = tracked;
                account.status = AccountStatus::Reclaimable;
                account.rent_lamports = rent_lamports;
                Ok(Some(DetectionResult {
                    account,
                    reason: DetectionReason::ZeroBalance,
                    reclaimable_lamports: rent_lamports,
                    safe: true,
                    note: format!(
                        "Token balance is zero; {rent_lamports} lamports of rent are reclaimable"
                    ),
                }))
            }
            Classification::Inactive { rent_lamports } => {
                // Balance is non-zero or unknown: never safe, manual review only.
                self.ctx
                    .registry
                    .update_account_state(address, tracked.status, rent_lamports)
                    .await?;
                let mut account = tracked;
                account.rent_lamports = rent_lamports;
                Ok(Some(DetectionResult {
                    account,
                    reason: DetectionReason::Inactive,
                    reclaimable_lamports: rent_lamports,
                    safe: false,
                    note: format!(
                        "No activity past the {} day threshold; review manually",
                        self.ctx.config.sweep.min_inactive_days
                    ),
                }))
            }
            Classification::Active { rent_lamports } => {
                self.ctx
                    .registry
                    .update_account_state(address, AccountStatus::Active, rent_lamports)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Checks every tracked account not already reclaimed or protected.
    /// Per-account failures are logged and skipped so one bad read cannot
    /// hide every other candidate.
    pub async fn find_all_reclaimable(&self) -> Result<Vec<DetectionResult>, SweepError> {
        let accounts = self.ctx.registry.list_accounts().await?;
        let mut results = Vec::new();

        for account in accounts {
            if matches!(account.status, AccountStatus::Reclaimed | AccountStatus::Protected) {
                continue;
            }
            match self.check_account(&account.address).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(address = %account.address, error = %e, "Detection failed; skipping account");
                }
            }
        }

        Ok(results)
    }

    /// The only feed the automated reclaimer consumes.
    pub async fn find_safe_reclaimable(&self) -> Result<Vec<DetectionResult>, SweepError> {
        let mut results = self.find_all_reclaimable().await?;
        results.retain(|r| r.safe);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::MockLedgerClient,
        registry::{memory::InMemoryRegistry, AccountKind, RegistryStore},
        tests::{test_config, token_account, tracked_token_account},
    };
    use crate::constant::MIN_BALANCE_FOR_RENT_EXEMPTION;

    fn context(
        ledger: MockLedgerClient,
        registry: Arc<InMemoryRegistry>,
    ) -> Arc<SweepContext> {
        Arc::new(SweepContext::new(Arc::new(ledger), registry, test_config()))
    }

    fn snapshot(lamports: u64) -> AccountSnapshot {
        AccountSnapshot { lamports, owning_program: spl_token_interface::id() }
    }

    #[tokio::test]
    async fn test_zero_balance_account_is_safe_reclaimable() {
        let registry = Arc::new(InMemoryRegistry::new());
        let tracked = tracked_token_account(AccountStatus::Active, 1_000_000);
        let address = tracked.address.clone();
        registry.upsert_account(tracked).await.unwrap();

        let pubkey = Pubkey::from_str(&address).unwrap();
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_fetch_account_info()
            .returning(move |_| Ok(Some(snapshot(MIN_BALANCE_FOR_RENT_EXEMPTION))));
        ledger.expect_fetch_token_account().returning(move |_| {
            Ok(Some(token_account(pubkey, 0, MIN_BALANCE_FOR_RENT_EXEMPTION)))
        });

        let detector = Detector::new(context(ledger, registry.clone()));
        let result = detector.check_account(&address).await.unwrap().unwrap();

        assert_eq!(result.reason, DetectionReason::ZeroBalance);
        assert!(result.safe);
        assert_eq!(result.reclaimable_lamports, MIN_BALANCE_FOR_RENT_EXEMPTION);

        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Reclaimable);
        assert_eq!(row.rent_lamports, MIN_BALANCE_FOR_RENT_EXEMPTION);
    }

    #[tokio::test]
    async fn test_closed_account_reports_last_known_rent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let tracked = tracked_token_account(AccountStatus::Active, 1_500_000);
        let address = tracked.address.clone();
        registry.upsert_account(tracked).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().returning(|_| Ok(None));

        let detector = Detector::new(context(ledger, registry.clone()));
        let result = detector.check_account(&address).await.unwrap().unwrap();

        assert_eq!(result.reason, DetectionReason::Closed);
        assert!(result.safe);
        assert_eq!(result.reclaimable_lamports, 1_500_000);

        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Reclaimed);
        assert_eq!(row.rent_lamports, 0);
    }

    #[tokio::test]
    async fn test_protected_account_is_skipped_without_ledger_calls() {
        let registry = Arc::new(InMemoryRegistry::new());
        let tracked = tracked_token_account(AccountStatus::Active, 5_000_000);
        let address = tracked.address.clone();
        registry.upsert_account(tracked).await.unwrap();
        registry
            .add_protection(crate::registry::ProtectionEntry {
                address: address.clone(),
                reason: "operational wallet".to_string(),
                added_at: Utc::now(),
            })
            .await
            .unwrap();

        // No expectations set: any ledger call would panic the mock.
        let ledger = MockLedgerClient::new();
        let detector = Detector::new(context(ledger, registry));

        let result = detector.check_account(&address).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_untracked_account_returns_none() {
        let registry = Arc::new(InMemoryRegistry::new());
        let ledger = MockLedgerClient::new();
        let detector = Detector::new(context(ledger, registry));

        let address = Pubkey::new_unique().to_string();
        assert!(detector.check_account(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_funded_account_with_balance_is_never_safe() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut tracked = tracked_token_account(AccountStatus::Active, 2_039_280);
        tracked.last_activity_at = Some(Utc::now() - Duration::days(90));
        let address = tracked.address.clone();
        registry.upsert_account(tracked).await.unwrap();

        let pubkey = Pubkey::from_str(&address).unwrap();
        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().returning(|_| Ok(Some(snapshot(2_039_280))));
        ledger
            .expect_fetch_token_account()
            .returning(move |_| Ok(Some(token_account(pubkey, 750, 2_039_280))));

        let detector = Detector::new(context(ledger, registry));
        let result = detector.check_account(&address).await.unwrap().unwrap();

        assert_eq!(result.reason, DetectionReason::Inactive);
        assert!(!result.safe);
    }

    #[tokio::test]
    async fn test_recently_active_funded_account_reports_nothing() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut tracked = tracked_token_account(AccountStatus::Reclaimable, 2_039_280);
        tracked.last_activity_at = Some(Utc::now() - Duration::days(2));
        let address = tracked.address.clone();
        registry.upsert_account(tracked).await.unwrap();

        let pubkey = Pubkey::from_str(&address).unwrap();
        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().returning(|_| Ok(Some(snapshot(2_039_280))));
        ledger
            .expect_fetch_token_account()
            .returning(move |_| Ok(Some(token_account(pubkey, 10, 2_039_280))));

        let detector = Detector::new(context(ledger, registry.clone()));
        assert!(detector.check_account(&address).await.unwrap().is_none());

        // Cached "reclaimable" hint was corrected against live state.
        let row = registry.get_account(&address).await.unwrap().unwrap();
        assert_eq!(row.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_find_all_reclaimable_survives_per_account_errors() {
        let registry = Arc::new(InMemoryRegistry::new());
        let failing = tracked_token_account(AccountStatus::Active, 1_000_000);
        let closed = tracked_token_account(AccountStatus::Active, 1_500_000);
        let failing_address = failing.address.clone();
        registry.upsert_account(failing).await.unwrap();
        registry.upsert_account(closed).await.unwrap();

        let failing_pubkey = Pubkey::from_str(&failing_address).unwrap();
        let mut ledger = MockLedgerClient::new();
        ledger.expect_fetch_account_info().returning(move |pubkey| {
            if *pubkey == failing_pubkey {
                Err(SweepError::RpcError("node unavailable".to_string()))
            } else {
                Ok(None)
            }
        });

        let detector = Detector::new(context(ledger, registry));
        let results = detector.find_all_reclaimable().await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reason, DetectionReason::Closed);
    }

    #[test]
    fn test_classify_inactive_is_gated_by_threshold() {
        let mut tracked = tracked_token_account(AccountStatus::Active, 2_000_000);
        tracked.last_activity_at = Some(Utc::now() - Duration::days(10));
        let pubkey = Pubkey::from_str(&tracked.address).unwrap();
        let live = LiveAccountState {
            snapshot: Some(snapshot(2_000_000)),
            token: Some(token_account(pubkey, 42, 2_000_000)),
        };

        assert_eq!(
            classify(&tracked, &live, Utc::now(), 30),
            Classification::Active { rent_lamports: 2_000_000 }
        );
        assert_eq!(
            classify(&tracked, &live, Utc::now(), 7),
            Classification::Inactive { rent_lamports: 2_000_000 }
        );
    }

    #[test]
    fn test_classify_token_vanished_between_reads_counts_as_closed() {
        let tracked = tracked_token_account(AccountStatus::Active, 900_000);
        let live = LiveAccountState { snapshot: Some(snapshot(900_000)), token: None };

        assert_eq!(
            classify(&tracked, &live, Utc::now(), 30),
            Classification::Closed { reclaimable_lamports: 900_000 }
        );
    }

    #[test]
    fn test_classify_non_token_kind_skips_balance_gate() {
        let mut tracked = tracked_token_account(AccountStatus::Active, 1_200_000);
        tracked.kind = AccountKind::ProgramDerivedAddress;
        tracked.last_activity_at = None;
        let live = LiveAccountState { snapshot: Some(snapshot(1_200_000)), token: None };

        assert_eq!(
            classify(&tracked, &live, Utc::now(), 30),
            Classification::Active { rent_lamports: 1_200_000 }
        );
    }
}
