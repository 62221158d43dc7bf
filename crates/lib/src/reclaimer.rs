use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;

use crate::{
    constant::DRY_RUN_SIGNATURE,
    context::SweepContext,
    detector::DetectionResult,
    error::SweepError,
    registry::{AccountStatus, ReclaimHistoryEntry},
};

#[derive(Debug, Clone, Default)]
pub struct ReclaimOptions {
    /// Overrides the configured dry-run default for this invocation.
    pub dry_run: Option<bool>,
    /// Processes at most this many detections, in input order.
    pub max_accounts: Option<usize>,
}

/// Per-account execution result. Failures are data, never panics or aborts.
#[derive(Debug, Clone)]
pub struct ReclaimOutcome {
    pub address: String,
    pub success: bool,
    pub amount_reclaimed: u64,
    pub signature: Option<String>,
    pub dry_run: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ReclaimOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_reclaimed_lamports: u64,
}

/// Read-side preview of what a safe batch would reclaim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimPreview {
    pub accounts: usize,
    pub total_lamports: u64,
}

/// Executes closes. Detector output is advisory: the ledger can drift between
/// detection and execution, so every gate here re-checks live state.
pub struct Reclaimer {
    ctx: Arc<SweepContext>,
}

impl Reclaimer {
    pub fn new(ctx: Arc<SweepContext>) -> Self {
        Self { ctx }
    }

    pub async fn reclaim_one(
        &self,
        detection: &DetectionResult,
        options: &ReclaimOptions,
    ) -> ReclaimOutcome {
        let address = detection.account.address.clone();
        match self.try_reclaim(detection, options).await {
            Ok(outcome) => outcome,
            Err(e) => failure(&address, e.to_string()),
        }
    }

    async fn try_reclaim(
        &self,
        detection: &DetectionResult,
        options: &ReclaimOptions,
    ) -> Result<ReclaimOutcome, SweepError> {
        let address = &detection.account.address;

        if !detection.safe {
            return Ok(failure(address, "marked unsafe; manual review required".to_string()));
        }

        if self.ctx.registry.is_protected(address).await? {
            return Ok(failure(address, "account is protected".to_string()));
        }

        if !detection.account.kind.is_token() {
            return Ok(failure(
                address,
                format!("unsupported kind {:?}; only token accounts are closable", detection.account.kind),
            ));
        }

        let pubkey = Pubkey::from_str(address)
            .map_err(|e| SweepError::ValidationError(format!("Invalid address {address}: {e}")))?;

        let Some(live) = self.ctx.ledger.fetch_token_account(&pubkey).await? else {
            // Closed by someone else since detection. The rent is already
            // back in circulation, just not through this audit trail.
            self.ctx
                .registry
                .update_account_state(address, AccountStatus::Reclaimed, 0)
                .await?;
            return Ok(ReclaimOutcome {
                address: address.clone(),
                success: true,
                amount_reclaimed: 0,
                signature: None,
                dry_run: false,
                error: Some("already closed on-chain".to_string()),
            });
        };

        if live.amount != 0 {
            return Ok(failure(
                address,
                format!("balance no longer zero: live amount is {}", live.amount),
            ));
        }

        let authority = self.ctx.ledger.authority();
        if live.owner != authority {
            return Ok(failure(
                address,
                format!("authority mismatch: account owner is {}, signer is {authority}", live.owner),
            ));
        }

        let dry_run = options.dry_run.unwrap_or(self.ctx.config.sweep.dry_run_default);
        if dry_run {
            tracing::info!(%address, lamports = live.lamports, "Dry run; close not submitted");
            return Ok(ReclaimOutcome {
                address: address.clone(),
                success: true,
                amount_reclaimed: live.lamports,
                signature: Some(DRY_RUN_SIGNATURE.to_string()),
                dry_run: true,
                error: None,
            });
        }

        let treasury = self.ctx.config.treasury_pubkey()?;
        match self.ctx.ledger.submit_close(&live, &treasury).await {
            Ok(signature) => {
                self.ctx
                    .registry
                    .update_account_state(address, AccountStatus::Reclaimed, 0)
                    .await?;
                self.ctx
                    .registry
                    .append_history(ReclaimHistoryEntry {
                        address: address.clone(),
                        amount_lamports: live.lamports,
                        signature: signature.clone(),
                        reason: detection.reason.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await?;
                tracing::info!(%address, lamports = live.lamports, %signature, "Account closed");
                Ok(ReclaimOutcome {
                    address: address.clone(),
                    success: true,
                    amount_reclaimed: live.lamports,
                    signature: Some(signature),
                    dry_run: false,
                    error: None,
                })
            }
            // No registry or audit mutation for failed sends; the account
            // stays eligible for a future attempt.
            Err(e) => Ok(failure(address, e.to_string())),
        }
    }

    /// Strictly sequential: one close in flight at a time, with a fixed
    /// pause after each confirmed close to respect RPC rate limits. One bad
    /// account never aborts the batch.
    pub async fn batch_reclaim(
        &self,
        detections: &[DetectionResult],
        options: &ReclaimOptions,
    ) -> BatchSummary {
        let limit = options.max_accounts.unwrap_or(detections.len());
        let delay = Duration::from_millis(self.ctx.config.sweep.inter_tx_delay_ms);

        let mut summary = BatchSummary::default();

        for detection in detections.iter().take(limit) {
            let outcome = self.reclaim_one(detection, options).await;

            if outcome.success {
                summary.succeeded += 1;
                summary.total_reclaimed_lamports += outcome.amount_reclaimed;
            } else {
                summary.failed += 1;
            }

            let submitted = outcome.success && !outcome.dry_run && outcome.signature.is_some();
            summary.outcomes.push(outcome);

            if submitted {
                sleep(delay).await;
            }
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            lamports = summary.total_reclaimed_lamports,
            "Batch reclaim complete"
        );
        summary
    }

    /// Pure summary of the safe subset; touches neither ledger nor registry.
    pub fn preview_reclaim(detections: &[DetectionResult]) -> ReclaimPreview {
        let safe: Vec<_> = detections.iter().filter(|d| d.safe).collect();
        ReclaimPreview {
            accounts: safe.len(),
            total_lamports: safe.iter().map(|d| d.reclaimable_lamports).sum(),
        }
    }
}

fn failure(address: &str, error: String) -> ReclaimOutcome {
    ReclaimOutcome {
        address: address.to_string(),
        success: false,
        amount_reclaimed: 0,
        signature: None,
        dry_run: false,
        error: Some(error),
    }
}
