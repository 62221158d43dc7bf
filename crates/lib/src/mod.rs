pub mod config;
pub mod constant;
pub mod context;
pub mod detector;
pub mod error;
pub mod ledger;
pub mod reclaimer;
pub mod registry;
pub mod rpc;
pub mod scanner;
pub mod service;
pub mod signer;

pub use config::{Config, ConfigOverrides};
pub use context::SweepContext;
pub use error::SweepError;
pub use service::SweepService;

#[cfg(test)]
pub mod tests;
