use anyhow::{bail, Result};

use hotwired_core::{ipc::is_daemon_running, AppConfig, DaemonClient};

pub async fn run(config: &AppConfig) -> Result<()> {
    let socket_path = config.socket_path();
    if !is_daemon_running(&socket_path).await {
        bail!("Daemon is not running. Start it with 'hotwired daemon start'.");
    }

    let client = DaemonClient::new(socket_path);
    let status = client.status().await?;
    let info = client.accessory_info().await?;
    let shutter = &status.shutter;

    println!("{} ({} {}, serial {})", info.name, info.manufacturer, info.model, info.serial_number);
    println!("  Current position: {}", shutter.current_position);
    println!("  Target position:  {}", shutter.target_position);
    println!("  State:            {}", shutter.position_state);
    println!("  Last change:      {}", shutter.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Daemon up since {} ({}s)",
        status.started_at.format("%Y-%m-%d %H:%M"),
        status.uptime_secs
    );

    Ok(())
}
