use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod document;
mod error;
mod highlights;
mod models;
mod services;
mod session;
mod storage;
mod tracker;
mod tui;

use app::App;
use config::Config;
use document::Document;
use error::{AppError, Result};
use highlights::HighlightEngine;
use models::Article;
use services::ContentClient;
use session::{open_preferences, ReadingSession, SessionContext, SessionOptions};
use storage::Storage;
use tui::{article_viewport, draw, handle_key_event, handle_mouse_event};

const USAGE: &str = "usage: folio <article.json | URL>\n       folio --export <article-id>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    init_logging(&config);

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let storage = Storage::select(&config.storage_backends, &config.storage_locations()).await;
    let preferences = open_preferences(&config.preferences_path()).await;

    // Headless export: print the snapshot and exit
    if args.len() >= 3 && args[1] == "--export" {
        let (ctx, _notices) =
            SessionContext::new(&args[2], storage, preferences, SessionOptions::from(&config));
        let export = HighlightEngine::new(ctx).export_highlights().await?;
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    let Some(source) = args.get(1).filter(|a| !a.starts_with('-')) else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let client = ContentClient::new()?;
    let value = client
        .load_json(source)
        .await
        .ok_or_else(|| AppError::Document(format!("could not load {source}")))?;
    let article = Article::from_json(value, source)?;
    let document = Document::from_article(&article);
    let title = article.title.clone().unwrap_or_else(|| article.id.clone());

    let (ctx, notices) =
        SessionContext::new(&article.id, storage, preferences, SessionOptions::from(&config));
    let session = ReadingSession::init(ctx, notices, document).await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let (width, height) = article_viewport(Rect::new(0, 0, size.width, size.height));
    let mut app = App::new(session, title, config.export_dir.clone(), width, height).await;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Final save before the terminal goes away
    app.session.cleanup().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

/// The TUI owns stdout, so logs go to a file in the data directory when possible.
fn init_logging(config: &Config) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());

    let file = std::fs::create_dir_all(&config.data_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())
    });

    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        let size = terminal.size()?;
        let (width, height) = article_viewport(Rect::new(0, 0, size.width, size.height));
        app.resize(width, height);
        app.poll_notices();

        terminal.draw(|frame| draw(frame, app))?;

        // Poll for events with timeout so the timer and notices keep updating
        if event::poll(Duration::from_millis(100))? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    handle_key_event(key, app.input_mode())
                }
                Event::Mouse(mouse) => handle_mouse_event(mouse, app.input_mode()),
                Event::FocusGained => {
                    app.set_focus(true);
                    None
                }
                Event::FocusLost => {
                    app.set_focus(false);
                    None
                }
                _ => None,
            };

            if let Some(action) = action {
                let should_quit = app.handle_action(action).await?;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}
