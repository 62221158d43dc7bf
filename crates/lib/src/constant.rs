pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
pub const MIN_BALANCE_FOR_RENT_EXEMPTION: u64 = 2_039_280;

// Detection
pub const DEFAULT_MIN_INACTIVE_DAYS: u64 = 30;
// Reserved: read from config but not applied by any gate yet.
pub const DEFAULT_COOLDOWN_HOURS: u64 = 24;

// Reclaim execution
pub const DEFAULT_INTER_TX_DELAY_MS: u64 = 500;
pub const DRY_RUN_SIGNATURE: &str = "DRY-RUN";

// Ledger read retries (writes are never retried)
pub const DEFAULT_MAX_READ_RETRIES: u32 = 3;
pub const DEFAULT_READ_RETRY_BASE_MS: u64 = 250;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 90;

// Registry defaults
pub const DEFAULT_REGISTRY_PATH: &str = "sweep_registry.json";
pub const DEFAULT_HISTORY_PATH: &str = "sweep_history.csv";

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
