use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use material_panel::config::{Cli, PanelConfig};
use material_panel::console::ConsoleUi;
use material_panel::session::PanelSession;
use material_panel::stdio::{StdioBridge, pump_host_frames, writer_loop};
use material_panel::telemetry::init_tracing;
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut cfg = PanelConfig::from_env();
    Cli::parse().apply(&mut cfg);
    init_tracing(&cfg.log_filter);

    info!(
        flush_window_ms = cfg.flush_window_ms,
        refresh_delay_ms = cfg.refresh_delay_ms,
        watchdog_period_ms = cfg.watchdog_period_ms,
        focus_debounce_ms = cfg.focus_debounce_ms,
        auto_confirm = cfg.auto_confirm,
        export_dir = %cfg.export_dir.display(),
        "starting material-panel"
    );

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let bridge = Arc::new(StdioBridge::new(tx));
    let ui = Arc::new(ConsoleUi::new(cfg.auto_confirm, cfg.export_dir.clone()));
    let session = PanelSession::new(&cfg, bridge.clone(), ui);

    let writer = tokio::spawn(writer_loop(rx, tokio::io::stdout()));
    let watchdog = session.start();

    let stdin = BufReader::new(tokio::io::stdin());
    let pumped = pump_host_frames(stdin, &session, &bridge).await;

    session.shutdown();
    watchdog.abort();
    bridge.close();

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "writer loop returned error"),
        Err(err) => warn!(error = %err, "writer task join failed"),
    }

    pumped.context("host channel failed")?;
    Ok(())
}
