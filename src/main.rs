// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use cu_data::{import_snapshot, Config, Source, SourcePaths};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "cu_data=info".into())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && args[1] == "import" {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        let config = Config::from_env();
        let source_dir = args.get(2).map(PathBuf::from).unwrap_or(config.source_dir.clone());
        run_import(&config, source_dir)?;
    } else {
        let config = Config::from_env();
        run_ui_mode(&config)?;
    }

    Ok(())
}

fn run_import(config: &Config, source_dir: PathBuf) -> Result<()> {
    println!("🗄️  Snapshot Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Check sources
    println!("\n📂 Checking sources in {}...", source_dir.display());
    let sources = SourcePaths::in_dir(&source_dir);
    sources.verify()?;
    for source in Source::ALL {
        println!("✓ {}: {}", source.label(), sources.path(source).display());
    }

    // 2. Build snapshot
    println!("\n💾 Building {}...", config.dataset_path.display());
    let report = import_snapshot(&sources, &config.dataset_path)
        .with_context(|| format!("building {}", config.dataset_path.display()))?;

    // 3. Summary
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Snapshot written: {}", report.output.display());
    println!("✓ Built at {}", report.built_at);
    for summary in &report.sources {
        println!("✓ {:<17} {:>7} rows  sha256 {}", summary.source.table(), summary.rows, &summary.sha256[..12]);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use cu_data::{App, Host};
    use std::fs::OpenOptions;
    use std::sync::Mutex;

    // Logs must never reach the terminal the browser draws on
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    println!("🖥️  Loading Credit Union Data...\n");

    if !config.dataset_path.exists() {
        eprintln!("❌ Snapshot not found at {}", config.dataset_path.display());
        eprintln!("   Run: cu-data import <source dir>");
        eprintln!("   to build it first.");
        std::process::exit(1);
    }

    let host = Host::new();
    let app = App::boot(&host, config)?;
    println!("✓ Loaded {}", config.dataset_path.display());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut browser = ui::Browser::new(app);
    ui::run_ui(&mut browser)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or serve it: cargo run --bin cu-server --features server");
    std::process::exit(1);
}
