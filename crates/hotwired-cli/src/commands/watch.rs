use anyhow::Result;

use hotwired_core::{AppConfig, DaemonClient, ShutterEvent};

/// Follow shutter events until the daemon goes away or Ctrl+C
pub async fn run(config: &AppConfig) -> Result<()> {
    let client = DaemonClient::new(config.socket_path());
    let snapshot = client.snapshot().await?;
    println!(
        "At {} (target {}, {})",
        snapshot.current_position, snapshot.target_position, snapshot.position_state
    );

    let mut events = client.subscribe().await?;
    loop {
        tokio::select! {
            event = events.next() => match event? {
                Some(event) => println!("{}", describe(&event)),
                None => {
                    println!("Daemon closed the connection.");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn describe(event: &ShutterEvent) -> String {
    match event {
        ShutterEvent::TargetChanged { target } => format!("target    -> {}", target),
        ShutterEvent::PositionChanged { position } => format!("position  -> {}", position),
        ShutterEvent::StateChanged { state } => format!("state     -> {}", state),
        ShutterEvent::MovementCompleted { position } => format!("completed at {}", position),
        ShutterEvent::ActuationFailed { line, message } => {
            format!("FAILED on {} line: {}", line, message)
        }
    }
}
