mod args;

use std::{str::FromStr, sync::Arc};

use args::{GlobalArgs, LoggingFormat};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use sweep_lib::{
    constant::lamports_to_sol,
    reclaimer::ReclaimOptions,
    registry::file::FileRegistry,
    Config, ConfigOverrides, SweepContext, SweepError, SweepService,
};

#[derive(Subcommand)]
enum Commands {
    /// Scan the operator wallet for token accounts and track them
    Scan {
        /// Track only accounts created by these sponsoring transactions
        #[arg(long = "from-signature")]
        from_signatures: Vec<String>,
    },
    /// Track a single account by address
    Track {
        /// Account address to track
        address: String,

        /// Sponsoring transaction signature, if known
        #[arg(long)]
        sponsor: Option<String>,
    },
    /// Re-check tracked accounts against live chain state
    Check {
        /// Addresses to check (default: every tracked account)
        addresses: Vec<String>,

        /// Report only verdicts that are safe to reclaim automatically
        #[arg(long, default_value_t = false)]
        safe_only: bool,
    },
    /// Close verified-empty accounts and sweep their rent to the treasury
    Reclaim {
        /// Perform the reclamation (default is dry-run)
        #[arg(long, default_value_t = false)]
        execute: bool,

        /// Close at most this many accounts in one run
        #[arg(long)]
        max_accounts: Option<usize>,
    },
    /// Show tracked totals, pending rent and reclaim history figures
    Summary,
    /// List every tracked account
    Accounts,
    /// Show the reclaim audit history
    History,
    /// Manage the protection whitelist
    Protect {
        #[command(subcommand)]
        protect_command: ProtectCommands,
    },
    /// Run detect-and-reclaim repeatedly on a fixed interval
    Watch {
        /// Time between passes, e.g. "30s", "10m", "1h"
        #[arg(long, default_value = "10m")]
        interval: humantime::Duration,

        /// Perform reclamations (default is dry-run passes)
        #[arg(long, default_value_t = false)]
        execute: bool,
    },
}

#[derive(Subcommand)]
enum ProtectCommands {
    /// Exempt an address from reclaim forever
    Add {
        /// Address to protect
        address: String,

        /// Why this address must never be closed
        #[arg(long, default_value = "manually protected")]
        reason: String,
    },
    /// Remove an address from the whitelist
    Remove {
        /// Address to unprotect
        address: String,
    },
    /// List protected addresses
    List,
}

#[derive(Parser)]
#[command(author, version, about = "Sweep - Solana rent reclaim pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[tokio::main]
async fn main() -> Result<(), SweepError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    setup_logging(&cli.global_args.logging_format);

    let config = Config::load_config(&cli.global_args.config).unwrap_or_else(|e| {
        print_error(&format!("Failed to load config: {e}"));
        std::process::exit(1);
    });
    let config = config.apply_overrides(ConfigOverrides {
        rpc_url: cli.global_args.rpc_url.clone(),
        ..Default::default()
    });

    let registry = Arc::new(
        FileRegistry::open(&config.sweep.registry_path, &config.sweep.history_path)
            .unwrap_or_else(|e| {
                print_error(&format!("Failed to open registry: {e}"));
                std::process::exit(1);
            }),
    );

    let ctx = SweepContext::connect(registry, config).unwrap_or_else(|e| {
        print_error(&format!("Failed to connect: {e}"));
        std::process::exit(1);
    });
    let service = SweepService::new(Arc::new(ctx));
    let json = cli.global_args.json;

    match cli.command {
        Commands::Scan { from_signatures } => {
            let summary = if from_signatures.is_empty() {
                service.scan().await?
            } else {
                service.scan_signatures(&from_signatures).await?
            };
            println!(
                "Scanned {} accounts, tracking {} ({} reclaimable, {:.4} SOL)",
                summary.scanned,
                summary.tracked,
                summary.reclaimable,
                lamports_to_sol(summary.reclaimable_lamports)
            );
        }
        Commands::Track { address, sponsor } => {
            validate_address(&address);
            let tracked = service.track(&address, sponsor).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tracked)?);
            } else {
                println!(
                    "Tracking {} ({:?}, {:?}, {:.4} SOL rent)",
                    tracked.address,
                    tracked.kind,
                    tracked.status,
                    lamports_to_sol(tracked.rent_lamports)
                );
            }
        }
        Commands::Check { addresses, safe_only } => {
            for address in &addresses {
                validate_address(address);
            }
            let mut results = if addresses.is_empty() && safe_only {
                service.check_safe().await?
            } else {
                service.check(&addresses).await?
            };
            if safe_only {
                results.retain(|r| r.safe);
            }

            if results.is_empty() {
                println!("Nothing to report.");
            }
            for result in &results {
                let marker = if result.safe { "SAFE" } else { "REVIEW" };
                println!(
                    "[{marker}] {} ({}): {:.4} SOL - {}",
                    result.account.address,
                    result.reason,
                    lamports_to_sol(result.reclaimable_lamports),
                    result.note
                );
            }
        }
        Commands::Reclaim { execute, max_accounts } => {
            let detections = service.check_safe().await?;
            if detections.is_empty() {
                println!("No safe reclaimable accounts found.");
                return Ok(());
            }

            let options = ReclaimOptions {
                dry_run: if execute { Some(false) } else { None },
                max_accounts,
            };
            let summary = service.reclaim(&detections, &options).await;

            for outcome in &summary.outcomes {
                match (&outcome.error, outcome.success) {
                    (None, _) => println!(
                        "{} {}: {:.4} SOL ({})",
                        if outcome.dry_run { "[dry-run]" } else { "Closed" },
                        outcome.address,
                        lamports_to_sol(outcome.amount_reclaimed),
                        outcome.signature.as_deref().unwrap_or("-")
                    ),
                    (Some(note), true) => println!("Skipped {}: {note}", outcome.address),
                    (Some(error), false) => println!("Failed {}: {error}", outcome.address),
                }
            }
            println!(
                "{} succeeded, {} failed, {:.4} SOL reclaimed",
                summary.succeeded,
                summary.failed,
                lamports_to_sol(summary.total_reclaimed_lamports)
            );
        }
        Commands::Summary => {
            let summary = service.summary().await?;
            println!("Tracked accounts:   {}", summary.tracked_accounts);
            println!(
                "Pending reclaim:    {} accounts ({:.4} SOL)",
                summary.pending.accounts,
                lamports_to_sol(summary.pending.total_lamports)
            );
            println!(
                "Reclaimed all-time: {} closes ({:.4} SOL)",
                summary.reclaim_count,
                lamports_to_sol(summary.reclaimed_total_lamports)
            );
            println!(
                "Reclaimed last 30d: {:.4} SOL",
                lamports_to_sol(summary.reclaimed_last_30d_lamports)
            );
        }
        Commands::Accounts => {
            let accounts = service.accounts().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else {
                for account in &accounts {
                    println!(
                        "{} {:?} {:?} {:.4} SOL",
                        account.address,
                        account.kind,
                        account.status,
                        lamports_to_sol(account.rent_lamports)
                    );
                }
                println!("{} accounts tracked", accounts.len());
            }
        }
        Commands::History => {
            let history = service.history().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for entry in &history {
                    println!(
                        "{} {} {:.4} SOL ({}) {}",
                        entry.timestamp,
                        entry.address,
                        lamports_to_sol(entry.amount_lamports),
                        entry.reason,
                        entry.signature
                    );
                }
                println!("{} reclaims recorded", history.len());
            }
        }
        Commands::Protect { protect_command } => match protect_command {
            ProtectCommands::Add { address, reason } => {
                validate_address(&address);
                service.protect(&address, &reason).await?;
                println!("Protected {address}");
            }
            ProtectCommands::Remove { address } => {
                if service.unprotect(&address).await? {
                    println!("Removed protection for {address}");
                } else {
                    println!("{address} was not protected");
                }
            }
            ProtectCommands::List => {
                let protections = service.protections().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&protections)?);
                } else {
                    for entry in &protections {
                        println!("{} ({}) since {}", entry.address, entry.reason, entry.added_at);
                    }
                    println!("{} addresses protected", protections.len());
                }
            }
        },
        Commands::Watch { interval, execute } => {
            let options = ReclaimOptions {
                dry_run: if execute { Some(false) } else { None },
                max_accounts: None,
            };
            tracing::info!(interval = %interval, execute, "Watch mode started");
            loop {
                if let Err(e) = service.scan().await {
                    tracing::warn!(error = %e, "Scan pass failed; detecting against known accounts");
                }
                match service.check_safe().await {
                    Ok(detections) if detections.is_empty() => {
                        tracing::info!("No safe reclaimable accounts");
                    }
                    Ok(detections) => {
                        let summary = service.reclaim(&detections, &options).await;
                        tracing::info!(
                            succeeded = summary.succeeded,
                            failed = summary.failed,
                            sol = lamports_to_sol(summary.total_reclaimed_lamports),
                            "Watch pass complete"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Watch pass failed; will retry next interval");
                    }
                }
                tokio::time::sleep(interval.into()).await;
            }
        }
    }

    Ok(())
}

fn validate_address(address: &str) {
    if Pubkey::from_str(address).is_err() {
        print_error(&format!("Invalid address: {address}"));
        std::process::exit(1);
    }
}

fn print_error(message: &str) {
    eprintln!("Error: {message}");
}

fn setup_logging(format: &LoggingFormat) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    match format {
        LoggingFormat::Standard => subscriber.init(),
        LoggingFormat::Json => subscriber.json().init(),
    }
}
