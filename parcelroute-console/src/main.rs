//! Terminal operator console for parcelroute: collection runs per route and shipment lifecycles.

mod app;
mod input;
mod logging;
mod seed;
mod ui;

use std::{
    env, fs, io,
    path::PathBuf,
    sync::Arc,
    time::{Duration as StdDuration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use parcelroute_core::{Actor, ServiceConfig, Shipment, ShipmentError, ShipmentService};
use parcelroute_store_memory::MemoryBackend;
use parcelroute_webhook::{HttpEvidenceStore, WebhookConfig, WebhookNotifier};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::{App, advance_target};
use crate::input::Action;

/// Console-only sections of the configuration file.
#[derive(Debug, Default, Deserialize)]
struct ConsoleFile {
    webhook: Option<WebhookConfig>,
}

fn load_config() -> Result<(ServiceConfig, ConsoleFile)> {
    let Some(path) = env::args().nth(1).map(PathBuf::from) else {
        return Ok((ServiceConfig::sample(), ConsoleFile::default()));
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    let config = ServiceConfig::from_toml_str(&raw)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    let console: ConsoleFile = toml::from_str(&raw)
        .with_context(|| format!("reading [webhook] from {}", path.display()))?;
    Ok((config, console))
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = env::var_os("PARCELROUTE_LOG")
        .map_or_else(|| PathBuf::from(logging::DEFAULT_LOG_FILE), PathBuf::from);
    logging::init(&log_path)?;

    let (config, console) = load_config()?;
    let poll_interval = config.console.poll_interval();
    let compiled = config.compile()?;

    // Adapters: memory stores, optionally HTTP notifications and evidence
    let backend = MemoryBackend::new();
    let mut collaborators = backend.collaborators();
    let mut delivery: Option<JoinHandle<()>> = None;
    if let Some(webhook) = &console.webhook {
        let client = webhook.client()?;
        let (notifier, handle) = WebhookNotifier::spawn(client.clone(), &webhook.notify_url)?;
        collaborators.notifier = Arc::new(notifier);
        collaborators.evidence = Arc::new(HttpEvidenceStore::new(client, &webhook.evidence_url)?);
        delivery = Some(handle);
        info!(notify_url = %webhook.notify_url, "webhook delivery enabled");
    }
    let service = Arc::new(ShipmentService::new(compiled, collaborators));

    let operator = Actor::Operator {
        name: env::var("PARCELROUTE_OPERATOR").unwrap_or_else(|_| "console".to_owned()),
    };

    let published = service.publish_routes().await?;
    let seeded = seed::seed(&service, &operator).await?;
    info!(published, seeded, "console ready");

    // App state
    let app = App::new(Arc::clone(&service), operator, poll_interval);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(handle) = delivery {
        handle.abort();
    }
    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        if app.needs_refresh() {
            refresh(terminal, &mut app).await?;
        }

        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::Refresh => refresh(terminal, &mut app).await?,
                Action::Advance => {
                    let Some(shipment) = app.selected.clone() else {
                        app.error_message = Some("Select a shipment first".into());
                        continue;
                    };
                    let policy = app.service.config().machine.policy();
                    let next = match advance_target(&shipment, policy) {
                        Ok(next) => next,
                        Err(message) => {
                            app.info_message = None;
                            app.error_message = Some(message);
                            continue;
                        }
                    };

                    let res = app
                        .service
                        .transition(&shipment.id, &app.operator, next, None)
                        .await;
                    apply_change(&mut app, res, &format!("Moved to {}", next.label()));
                }
                Action::Cancel => {
                    let Some(shipment) = app.selected.clone() else {
                        app.error_message = Some("Select a shipment first".into());
                        continue;
                    };

                    let res = app
                        .service
                        .cancel(
                            &shipment.id,
                            &app.operator,
                            Some("cancelled from the console".to_owned()),
                        )
                        .await;
                    apply_change(&mut app, res, "Shipment cancelled");
                }
            }
        }
    }

    Ok(())
}

async fn refresh(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    app.is_loading = true;
    terminal.draw(|frame| ui::draw(frame, app))?;

    let res = app.service.collection_view().await;

    app.is_loading = false;
    match res {
        Ok(view) => {
            app.apply_view(view);
            app.error_message = None;
        }
        Err(err) => {
            // Keep the previous view and retry on the next poll.
            app.last_refresh = Some(Instant::now());
            warn!(error = %err, "collection view failed");
            app.error_message = Some(format!("Failed to load collection runs: {err}"));
        }
    }
    Ok(())
}

fn apply_change(
    app: &mut App,
    res: Result<Shipment, ShipmentError>,
    success: &str,
) {
    match res {
        Ok(updated) => {
            app.replace_selected(updated);
            app.error_message = None;
            app.info_message = Some(success.to_owned());
            // Pick up regrouping on the next loop turn.
            app.last_refresh = None;
        }
        Err(err) => {
            app.info_message = None;
            app.error_message = Some(format!("Update failed: {err}"));
        }
    }
}
