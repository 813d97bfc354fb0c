use std::io::{self, Stdout};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mailpeek_core::SearchField;
use mailpeek_mail::{ImapConnector, fetch_latest};

mod browse_mod;
mod cli;
mod config_mod;
mod keymap_mod;
mod layout_mod;
mod render_mod;
mod widgets_mod;

use crate::browse_mod::{AppEvent, Browser, Intent};
use crate::cli::{Cli, CliCommand};
use crate::config_mod::{LoadedConfig, init_config, load_config, xdg_state_dir};
use crate::keymap_mod::KeyMap;
use crate::render_mod::draw;

const LOG_ENV: &str = "MAILPEEK_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    if let Some(CliCommand::Init(cmd)) = cli.command {
        let path = init_config(cmd.force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let (mut config, path) = match load_config()? {
        LoadedConfig::Ready { config, path } => (config, path),
        LoadedConfig::TemplateWritten(path) => {
            println!(
                "Created {}. Add your IMAP credentials there and run mailpeek again.",
                path.display()
            );
            return Ok(());
        }
    };
    if let Some(limit) = cli.limit {
        config.limit = limit.max(1);
    }
    if let Some(raw) = cli.field.as_deref() {
        config.field =
            SearchField::parse(raw).ok_or_else(|| anyhow!("unknown search field {:?}", raw))?;
    }
    let keys = Arc::new(
        KeyMap::with_overrides(&config.keys)
            .with_context(|| format!("invalid [keys] in {}", path.display()))?,
    );
    info!(
        config = %path.display(),
        limit = config.limit,
        field = ?config.field,
        "starting"
    );

    let connector = ImapConnector::new(config.imap.clone())?;
    eprintln!(
        "Fetching up to {} messages from {}...",
        config.limit, config.imap.host
    );
    let rt = tokio::runtime::Runtime::new()?;
    let messages = rt
        .block_on(fetch_latest(connector, config.limit))
        .context("failed to load inbox")?;
    drop(rt);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;
    let browser = Browser::new(
        messages,
        keys,
        config.policy,
        config.field,
        size.width,
        size.height,
    );

    let res = run_app(&mut terminal, browser);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut browser: Browser) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, &browser))?;

        let event = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
            Event::Resize(width, height) => AppEvent::Resize { width, height },
            _ => continue,
        };
        let (next, intent) = browser.update(event);
        browser = next;
        if intent == Intent::Quit {
            info!("quit");
            return Ok(());
        }
    }
}

/// File logging, off unless `MAILPEEK_LOG` is set. Stdout belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
    let raw = std::env::var(LOG_ENV).ok()?;
    let directive = match raw.trim() {
        "" | "0" => return None,
        "1" => "debug",
        other => other,
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("debug"));
    let dir = xdg_state_dir().join("mailpeek");
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(&dir, "mailpeek.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
