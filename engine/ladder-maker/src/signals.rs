//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Listen for Ctrl+C and SIGTERM. The returned receiver flips to `true` on the first one.
pub fn setup_signal_handlers() -> Result<watch::Receiver<bool>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Handle Ctrl+C (SIGINT)
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {}", e);
            return;
        }

        info!("Ctrl+C signal received");
        let _ = ctrl_c_tx.send(true);
    });

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};

        let sigterm_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, sigterm_flag.clone())?;

        let sigterm_tx = shutdown_tx;
        tokio::spawn(async move {
            // Poll for signal
            loop {
                if sigterm_flag.load(Ordering::Relaxed) {
                    info!("SIGTERM signal received");
                    let _ = sigterm_tx.send(true);
                    break;
                }
                if sigterm_tx.is_closed() {
                    break;
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        });
    }

    Ok(shutdown_rx)
}
