use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    context::SweepContext,
    detector::{DetectionResult, Detector},
    error::SweepError,
    reclaimer::{BatchSummary, ReclaimOptions, ReclaimPreview, Reclaimer},
    registry::{ProtectionEntry, ReclaimHistoryEntry, TrackedAccount},
    scanner::{ScanSummary, Scanner},
};

/// Rolled-up view over the registry and audit history, for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub tracked_accounts: usize,
    pub pending: ReclaimPreview,
    pub reclaimed_total_lamports: u64,
    pub reclaimed_last_30d_lamports: u64,
    pub reclaim_count: usize,
}

/// Single entry point the CLI talks to. Each call wires the pipeline stage it
/// needs from the shared context; nothing here holds state of its own.
pub struct SweepService {
    ctx: Arc<SweepContext>,
}

impl SweepService {
    pub fn new(ctx: Arc<SweepContext>) -> Self {
        Self { ctx }
    }

    pub async fn scan(&self) -> Result<ScanSummary, SweepError> {
        Scanner::new(self.ctx.clone()).scan_owned_accounts().await
    }

    pub async fn scan_signatures(&self, signatures: &[String]) -> Result<ScanSummary, SweepError> {
        Scanner::new(self.ctx.clone()).scan_from_signatures(signatures).await
    }

    pub async fn track(
        &self,
        address: &str,
        sponsor_signature: Option<String>,
    ) -> Result<TrackedAccount, SweepError> {
        Scanner::new(self.ctx.clone()).track_single_account(address, sponsor_signature).await
    }

    /// Re-checks the given addresses, or every tracked account when none are
    /// given. Includes unsafe verdicts; callers decide what to surface.
    pub async fn check(
        &self,
        addresses: &[String],
    ) -> Result<Vec<DetectionResult>, SweepError> {
        let detector = Detector::new(self.ctx.clone());
        if addresses.is_empty() {
            return detector.find_all_reclaimable().await;
        }

        let mut results = Vec::new();
        for address in addresses {
            if let Some(result) = detector.check_account(address).await? {
                results.push(result);
            }
        }
        Ok(results)
    }

    pub async fn check_safe(&self) -> Result<Vec<DetectionResult>, SweepError> {
        Detector::new(self.ctx.clone()).find_safe_reclaimable().await
    }

    pub async fn reclaim(
        &self,
        detections: &[DetectionResult],
        options: &ReclaimOptions,
    ) -> BatchSummary {
        Reclaimer::new(self.ctx.clone()).batch_reclaim(detections, options).await
    }

    pub async fn accounts(&self) -> Result<Vec<TrackedAccount>, SweepError> {
        self.ctx.registry.list_accounts().await
    }

    pub async fn history(&self) -> Result<Vec<ReclaimHistoryEntry>, SweepError> {
        self.ctx.registry.list_history().await
    }

    /// Pending figures come from a fresh detection pass; reclaimed figures
    /// come from the audit history and never shrink.
    pub async fn summary(&self) -> Result<SweepSummary, SweepError> {
        let tracked_accounts = self.ctx.registry.list_accounts().await?.len();
        let detections = Detector::new(self.ctx.clone()).find_all_reclaimable().await?;
        let pending = Reclaimer::preview_reclaim(&detections);

        let history = self.ctx.registry.list_history().await?;
        let cutoff = Utc::now() - Duration::days(30);
        let reclaimed_total_lamports = history.iter().map(|e| e.amount_lamports).sum();
        let reclaimed_last_30d_lamports = history
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .map(|e| e.amount_lamports)
            .sum();

        Ok(SweepSummary {
            tracked_accounts,
            pending,
            reclaimed_total_lamports,
            reclaimed_last_30d_lamports,
            reclaim_count: history.len(),
        })
    }

    pub async fn protect(&self, address: &str, reason: &str) -> Result<(), SweepError> {
        self.ctx
            .registry
            .add_protection(ProtectionEntry {
                address: address.to_string(),
                reason: reason.to_string(),
                added_at: Utc::now(),
            })
            .await?;
        tracing::info!(%address, %reason, "Address protected from reclaim");
        Ok(())
    }

    pub async fn unprotect(&self, address: &str) -> Result<bool, SweepError> {
        let removed = self.ctx.registry.remove_protection(address).await?;
        if removed {
            tracing::info!(%address, "Protection removed");
        }
        Ok(removed)
    }

    pub async fn protections(&self) -> Result<Vec<ProtectionEntry>, SweepError> {
        self.ctx.registry.list_protected().await
    }
}
