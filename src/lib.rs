// Credit Union Data Explorer - Core Library
// Exposes all modules for the terminal browser, the HTTP server and tests

pub mod error;
pub mod config;
pub mod db;
pub mod models;
pub mod import;     // CSV sources → SQLite snapshot
pub mod dom;
pub mod runtime;    // Headless host: clock, timers, location, scroll
pub mod format;
pub mod router;
pub mod components;
pub mod pages;
pub mod app;

#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use app::{render_boot_failure, App, BOOT_FAILURE_MESSAGE};
pub use config::Config;
pub use db::{setup_snapshot_schema, Database, Row, Value};
pub use error::{AppError, Result};
pub use import::{import_snapshot, ImportReport, Source, SourcePaths, SNAPSHOT_FILE};
pub use models::{
    institution_profile, ranked_products, BrowseRow, Eligibility, Institution,
    InstitutionProfile, MembershipInfo, RankedProduct, SavingsProduct, WebPresence,
};
pub use router::{Cleanup, Params, Router};
pub use runtime::{Debouncer, Host, TaskHandle, HOME_ROUTE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
