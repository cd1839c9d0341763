use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use hotwired_core::{
    hardware::{create_driver, LineActuator},
    ipc::is_daemon_running as is_daemon_reachable,
    AppConfig, DaemonServer, ShutterService,
};

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("hotwired")
        .join("daemon.pid")
}

/// Check if daemon is running
fn is_daemon_running() -> Option<u32> {
    let pid_path = pid_file_path();
    if !pid_path.exists() {
        return None;
    }

    let mut file = fs::File::open(&pid_path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;

    let output = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .ok()?;
    if output.status.success() {
        return Some(pid);
    }

    // Process not running, clean up stale PID file
    let _ = fs::remove_file(&pid_path);
    None
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&pid_path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

/// Start the daemon in the foreground
pub async fn start(config: Arc<AppConfig>) -> Result<()> {
    if let Some(pid) = is_daemon_running() {
        println!("Daemon is already running (PID: {})", pid);
        return Ok(());
    }

    println!("Starting hotwired daemon...");

    let driver = create_driver(&config.hardware)?;
    let controller_config = config.controller_config();
    let actuator = LineActuator::new(driver, controller_config.pins, config.hardware.active_low);
    let (service, handle) = ShutterService::new(controller_config.clone(), actuator);

    service
        .configure_lines()
        .await
        .context("Failed to configure shutter lines")?;

    write_pid_file()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Setup signal handlers for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx_clone.send(true);
    });

    let service_task = tokio::spawn(service.run(shutdown_rx.clone()));
    let server = DaemonServer::new(handle, config.clone());

    println!(
        "Daemon started (PID: {}). Press Ctrl+C or run 'hotwired daemon stop' to stop.",
        std::process::id()
    );
    println!("  Backend: {}", config.hardware.backend);
    println!(
        "  Lines: up={} down={} my={}",
        controller_config.pins.up, controller_config.pins.down, controller_config.pins.preset
    );
    println!(
        "  Travel: {}s up, {}s down",
        config.shutter.movement_duration_up, config.shutter.movement_duration_down
    );
    println!("  Socket: {}", config.socket_path().display());

    // Serve requests until shutdown
    let served = server.run(shutdown_rx).await;
    if served.is_err() {
        // The service only watches the channel, so tell it explicitly
        let _ = shutdown_tx.send(true);
    }

    if let Err(e) = service_task.await {
        error!("Shutter service task failed: {}", e);
    }

    remove_pid_file();
    served?;
    println!("Daemon stopped.");

    Ok(())
}

/// Stop the daemon
pub async fn stop() -> Result<()> {
    match is_daemon_running() {
        Some(pid) => {
            println!("Stopping daemon (PID: {})...", pid);

            let output = std::process::Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .output()?;

            if output.status.success() {
                // Wait a moment for graceful shutdown
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

                if is_daemon_running().is_none() {
                    println!("Daemon stopped successfully.");
                } else {
                    let _ = std::process::Command::new("kill")
                        .arg("-9")
                        .arg(pid.to_string())
                        .output();
                    remove_pid_file();
                    println!("Daemon forcefully terminated.");
                }
            } else {
                println!("Failed to stop daemon. You may need to kill it manually: kill {}", pid);
            }
        }
        None => {
            println!("Daemon is not running.");
        }
    }

    Ok(())
}

/// Show daemon status
pub async fn status(config: &AppConfig) -> Result<()> {
    match is_daemon_running() {
        Some(pid) => {
            println!("Daemon is running (PID: {})", pid);
            println!("PID file: {}", pid_file_path().display());
            if is_daemon_reachable(&config.socket_path()).await {
                println!("Socket: {} (responding)", config.socket_path().display());
            } else {
                println!("Socket: {} (not responding)", config.socket_path().display());
            }
        }
        None => {
            println!("Daemon is not running.");
        }
    }

    Ok(())
}
