use anyhow::{bail, Result};

use hotwired_core::{ipc::is_daemon_running, AppConfig, DaemonClient, Position};

/// Send a target position to the daemon
pub async fn set(config: &AppConfig, position: i64, now: bool) -> Result<()> {
    let target = Position::new(position)?;

    let socket_path = config.socket_path();
    if !is_daemon_running(&socket_path).await {
        bail!("Daemon is not running. Start it with 'hotwired daemon start'.");
    }

    let client = DaemonClient::new(socket_path);
    client.set_target(position, now).await?;

    if now {
        let snapshot = client.snapshot().await?;
        println!(
            "Moving to {} (now at {}, {})",
            target, snapshot.current_position, snapshot.position_state
        );
    } else {
        println!("Target set to {}", target);
    }

    Ok(())
}
