use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::screen_time::{
    run_command_executor, CommandExecutor, EnforcementEngine, EngineCore, EngineEvent,
    PlatformDevice, SystemClock,
};

use super::utils::open_store;

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);
const EVENT_QUEUE: usize = 64;

/// Run the engine in the foreground until Ctrl-C
pub fn run(config: &AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_daemon(config))
}

async fn run_daemon(config: &AppConfig) -> Result<()> {
    info!("Starting screen time enforcer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Tick every {}s, {}s countdown, lock action {:?}",
        config.engine.tick_interval_secs, config.engine.countdown_secs, config.enforcement.action
    );

    let store = open_store(config)?;
    let core = EngineCore::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(SystemClock),
        config.engine.settings(),
    );
    let (engine, commands) =
        EnforcementEngine::new(core, config.engine.tick_interval(), COUNTDOWN_STEP);
    let executor = CommandExecutor::new(config.enforcement.action, Arc::new(PlatformDevice));

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let engine_task = tokio::spawn(engine.run(events_rx));
    let executor_task = tokio::spawn(run_command_executor(executor, commands));
    let reader_task = tokio::spawn(async move {
        if let Err(e) = read_events(tokio::io::stdin(), events_tx).await {
            warn!("Event input failed: {:#}", e);
        }
    });

    println!("Reading events from stdin. Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    // Dropping the last event sender stops the engine, which flushes usage
    reader_task.abort();
    let _ = reader_task.await;

    engine_task.await.context("Engine task failed")?;
    executor_task.await.context("Executor task failed")?;

    Ok(())
}

/// Forward newline-delimited JSON events to the engine. Malformed lines are
/// logged and skipped.
pub async fn read_events<R>(reader: R, events: mpsc::Sender<EngineEvent>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        if line.trim().is_empty() {
            continue;
        }

        match EngineEvent::from_json_line(&line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Skipping malformed event {:?}: {}", line, e),
        }
    }

    info!("Event input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_events_skips_bad_lines() {
        let input = b"{\"type\":\"display_off\"}\n\
            \n\
            not json\n\
            {\"type\":\"launch_rockets\"}\n\
            {\"type\":\"profile_switch_requested\",\"profile_id\":2}\n";
        let (tx, mut rx) = mpsc::channel(8);

        read_events(&input[..], tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(EngineEvent::DisplayOff));
        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::ProfileSwitchRequested { profile_id: 2 })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_read_events_stops_when_engine_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = read_events(&b"{\"type\":\"display_on\"}\n"[..], tx).await;
        assert!(result.is_ok());
    }
}
