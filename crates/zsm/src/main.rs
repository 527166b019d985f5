mod app;
mod config;
mod error;
mod kill;
mod layout;
mod repo;
mod runtime;
mod theme;
mod ui;
mod view;

use anyhow::{Context, Result};
use app::{App, AppEvent};
use clap::Parser;
use config::{load_config, which_cmd, Config};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use repo::{SessionRepository, ZmxRepository};
use runtime::EffectRunner;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use theme::Theme;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(
    name = "zsm",
    about = "Terminal dashboard for zmx sessions",
    disable_version_flag = true
)]
struct Cli {
    /// Print version information and exit
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn version_line() -> String {
    format!(
        "zsm {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("ZSM_COMMIT").unwrap_or("none"),
        option_env!("ZSM_BUILD_DATE").unwrap_or("unknown"),
    )
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_line());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config();
    init_logging(&config);

    let Some(tool_path) = which_cmd(&config.tool) else {
        eprintln!("Error: {} not found in PATH", config.tool);
        return Ok(ExitCode::from(1));
    };
    info!(tool = %tool_path.display(), "starting");

    let repo: Arc<dyn SessionRepository> = Arc::new(ZmxRepository::new(
        tool_path.clone(),
        config.tool.clone(),
        config.preview_timeout,
        config.command_timeout,
    ));
    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let runner = EffectRunner::new(repo, tx, config.poll_interval);
    let mut app = App::new(&config);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, &runner, &mut rx).await;
    restore_terminal(&mut terminal)?;

    if let Err(err) = result {
        error!(error = %err, "event loop failed");
        eprintln!("zsm: {err:#}");
        return Ok(ExitCode::from(1));
    }

    match app.attach_target.take() {
        Some(name) => attach(&config, &tool_path, &name),
        None => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = config.log_file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| eprintln!("zsm: cannot open log file {}: {err}", path.display()))
            .ok()
    });
    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("leaving alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    runner: &EffectRunner,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let theme = Theme::default();
    let mut events = EventStream::new();

    let (width, height) = crossterm::terminal::size().context("reading terminal size")?;
    runner.run_all(app.handle(AppEvent::Resized { width, height }));
    runner.run_all(app.startup());

    while !app.should_quit {
        terminal.draw(|f| ui::render(f, app, &theme))?;
        let event = tokio::select! {
            Some(event) = rx.recv() => event,
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => AppEvent::Key(key),
                Some(Ok(Event::Resize(width, height))) => AppEvent::Resized { width, height },
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err).context("reading terminal events"),
                None => break,
            },
        };
        runner.run_all(app.handle(event));
    }
    Ok(())
}

/// Hands the terminal over to `<tool> attach <name>`.
#[cfg(unix)]
fn attach(config: &Config, tool_path: &Path, name: &str) -> Result<ExitCode> {
    use std::os::unix::process::CommandExt;

    info!(session = %name, "attaching");
    let err = std::process::Command::new(tool_path)
        .args(["attach", name])
        .exec();
    Err(err).with_context(|| format!("exec {}", config.attach_command(name)))
}

#[cfg(not(unix))]
fn attach(config: &Config, tool_path: &Path, name: &str) -> Result<ExitCode> {
    use tracing::warn;

    info!(session = %name, "attaching");
    let status = std::process::Command::new(tool_path)
        .args(["attach", name])
        .status()
        .with_context(|| format!("run {}", config.attach_command(name)))?;
    let code = status.code().unwrap_or(1);
    if code != 0 {
        warn!(code, "attach exited with failure");
    }
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
