mod app;
mod cli;
mod config;
mod history;
mod input;
mod k8s;
mod logs;
mod model;
mod provider;
mod timer;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand, AsyncResult, Event as AppEvent};
use chrono::Utc;
use clap::Parser;
use cli::CliArgs;
use config::RuntimeConfigWatcher;
use crossterm::event::{
    Event as TermEvent, EventStream, KeyEventKind, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use k8s::{KubeGateway, ProcessRunner};
use model::Snapshot;
use provider::{Collaborators, CommandRunner, CoreError, ResourceInspector, write_export};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use timer::TimerSupervisor;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use ui::HeaderContext;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum TimerKey {
    LogRefresh,
}

#[derive(Debug)]
enum LoopMessage {
    Snapshot(Result<Snapshot, CoreError>),
    Async(AsyncResult),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }

    let gateway = Arc::new(KubeGateway::connect(Duration::from_millis(args.cache_ms)).await?);
    let header = HeaderContext {
        context: gateway.context().to_string(),
        cluster: gateway.cluster().to_string(),
    };
    let collaborators = Collaborators {
        data: gateway.clone(),
        logs: gateway.clone(),
        inspector: Some(gateway.clone() as Arc<dyn ResourceInspector>),
        commands: Some(Arc::new(ProcessRunner) as Arc<dyn CommandRunner>),
    };

    let mut app = App::new(collaborators.capabilities(), args.initial_namespace());
    let mut watcher = RuntimeConfigWatcher::discover();
    match watcher.load_current() {
        Ok(config) => {
            if let Some(source) = config.source.as_deref() {
                info!(%source, "runtime config loaded");
            }
            app.set_custom_actions(config.actions);
        }
        Err(error) => warn!(error = %format!("{error:#}"), "runtime config ignored"),
    }

    run(&mut app, collaborators, watcher, &header, &args).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder.with_writer(Mutex::new(file)).try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

async fn run(
    app: &mut App,
    collaborators: Collaborators,
    watcher: RuntimeConfigWatcher,
    header: &HeaderContext,
    args: &CliArgs,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, collaborators, watcher, header, args).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Runs the side effects the controller asks for as detached tasks.
struct Runtime {
    collaborators: Collaborators,
    tx: mpsc::UnboundedSender<LoopMessage>,
    timers: TimerSupervisor<TimerKey, LoopMessage>,
    tail_lines: i64,
    snapshot_in_flight: bool,
}

impl Runtime {
    fn request_snapshot(&mut self, force: bool) {
        if self.snapshot_in_flight && !force {
            debug!("snapshot fetch still running; tick skipped");
            return;
        }
        self.snapshot_in_flight = true;

        let data = self.collaborators.data.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if force && let Err(error) = data.force_refresh().await {
                warn!(%error, "cache invalidation failed");
            }
            let result = match timeout(SNAPSHOT_TIMEOUT, data.get_snapshot()).await {
                Ok(result) => result,
                Err(_) => Err(CoreError::DataFetch(format!(
                    "snapshot timed out after {}s",
                    SNAPSHOT_TIMEOUT.as_secs()
                ))),
            };
            let _ = tx.send(LoopMessage::Snapshot(result));
        });
    }

    fn execute(&mut self, command: AppCommand) {
        match command {
            AppCommand::None => {}
            AppCommand::ForceRefresh => self.request_snapshot(true),
            AppCommand::FetchLogs(request) => {
                let logs = self.collaborators.logs.clone();
                let tx = self.tx.clone();
                let tail_lines = self.tail_lines;
                tokio::spawn(async move {
                    let result = logs.fetch_log(&request.target, tail_lines).await;
                    let _ = tx.send(LoopMessage::Async(AsyncResult::Logs {
                        target: request.target,
                        result,
                    }));
                });
            }
            AppCommand::ScheduleLogRefresh {
                target,
                generation,
                after,
            } => {
                self.timers.schedule(
                    TimerKey::LogRefresh,
                    after,
                    LoopMessage::Async(AsyncResult::LogTick { target, generation }),
                );
                debug!(pending = self.timers.pending(), "log refresh scheduled");
            }
            AppCommand::RunAction(request) => {
                let collaborators = self.collaborators.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = collaborators.run_action(&request.kind).await;
                    let _ = tx.send(LoopMessage::Async(AsyncResult::CommandOutput {
                        request_id: request.request_id,
                        title: request.title,
                        result,
                    }));
                });
            }
            AppCommand::Export(request) => {
                let tx = self.tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = std::env::current_dir()
                        .map_err(|error| CoreError::Export(error.to_string()))
                        .and_then(|dir| write_export(&request, &dir, Utc::now()));
                    let _ = tx.send(LoopMessage::Async(AsyncResult::Exported { result }));
                });
            }
        }
    }
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    collaborators: Collaborators,
    mut watcher: RuntimeConfigWatcher,
    header: &HeaderContext,
    args: &CliArgs,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<LoopMessage>();
    let mut runtime = Runtime {
        collaborators,
        timers: TimerSupervisor::new(tx.clone()),
        tx,
        tail_lines: args.tail_lines,
        snapshot_in_flight: false,
    };

    let size = terminal.size().context("failed to read terminal size")?;
    app.apply(AppEvent::Resize {
        width: size.width,
        height: size.height,
    });
    runtime.request_snapshot(false);

    let mut reader = EventStream::new();
    let mut ticker = interval(Duration::from_millis(args.refresh_interval_ms()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app, header))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!(?action, "input");
                            let command = app.apply(AppEvent::Input(action));
                            runtime.execute(command);
                        }
                    }
                    Some(Ok(TermEvent::Resize(width, height))) => {
                        app.apply(AppEvent::Resize { width, height });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "terminal event error");
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                runtime.request_snapshot(false);
                match watcher.reload_if_changed() {
                    Ok(Some(config)) => {
                        info!(source = ?config.source, "runtime config reloaded");
                        app.set_custom_actions(config.actions);
                    }
                    Ok(None) => {}
                    Err(error) => warn!(error = %format!("{error:#}"), "runtime config reload failed"),
                }
            }
            Some(message) = rx.recv() => {
                let command = match message {
                    LoopMessage::Snapshot(result) => {
                        runtime.snapshot_in_flight = false;
                        app.apply(AppEvent::SnapshotArrived(result))
                    }
                    LoopMessage::Async(result) => app.apply(AppEvent::AsyncResult(result)),
                };
                runtime.execute(command);
            }
        }

        if !app.logs_mode() {
            runtime.timers.cancel(&TimerKey::LogRefresh);
        }
    }

    runtime.timers.cancel_all();
    Ok(())
}
