// Credit Union Data Explorer - Web Server

use anyhow::{Context, Result};
use cu_data::server::{build_router, AppState};
use cu_data::{Config, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "cu_data=info".into()))
        .init();

    println!("🌐 Credit Union Data - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env();

    if !config.dataset_path.exists() {
        eprintln!("❌ Snapshot not found at {:?}", config.dataset_path);
        eprintln!("   Run: cargo run --release -- import <source dir>");
        eprintln!("   to build it first.");
        std::process::exit(1);
    }

    let db = Database::load(&config.dataset_path)
        .with_context(|| format!("loading {}", config.dataset_path.display()))?;
    println!("✓ Snapshot opened: {:?}", config.dataset_path);

    let port = config.port;
    let app = build_router(AppState::new(db, config));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "listening");

    println!("\n🚀 Server running on http://localhost:{}", port);
    println!("   API:    http://localhost:{}/api/hysa", port);
    println!("   Render: http://localhost:{}/render?hash=/browse", port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}
