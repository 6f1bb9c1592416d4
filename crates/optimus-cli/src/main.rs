//! Optimus CLI - Terminal console for the operations agent.
//!
//! This is the entry point for the `optimus` binary.

mod app;
mod markdown;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use optimus_core::{find_model_option, ModelOption};
use optimus_stream::{AgentClient, AgentTransport, ClientConfig, OneShotTransport, SessionController};
use futures::{Stream, StreamExt as _};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use app::{App, HEALTH_INTERVAL};

/// Optimus CLI - Chat with the operations agent and watch it work.
#[derive(Parser, Debug)]
#[command(name = "optimus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the agent API.
    #[arg(
        long,
        env = "OPTIMUS_API_BASE",
        default_value = "http://localhost:8000/api/v1"
    )]
    api_base: String,

    /// Model id to start with (gpt-5, gemini-2.5-flash).
    #[arg(long, env = "OPTIMUS_MODEL", default_value = "gpt-5")]
    model: String,

    /// Upper bound for one agent run, in seconds.
    #[arg(long, env = "OPTIMUS_REQUEST_TIMEOUT", default_value = "300")]
    request_timeout_secs: u64,

    /// Connection timeout, in seconds.
    #[arg(long, default_value = "5")]
    connect_timeout_secs: u64,

    /// Rows from the bottom that still count as following the chat.
    #[arg(long, default_value = "3")]
    follow_threshold: u32,

    /// Use the one-shot query endpoint instead of streaming.
    #[arg(long, default_value = "false")]
    no_stream: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Spinner and redraw cadence while nothing else happens.
const TICK_RATE: Duration = Duration::from_millis(80);

const DEBUG_FILTER: &str = "optimus_cli=debug,optimus_stream=debug,warn";

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let default = if args.debug { DEBUG_FILTER } else { "warn" };

    if let Some(path) = &args.log_file {
        let file = File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
            )
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter(DEBUG_FILTER)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    init_tracing(&args)?;

    let config = ClientConfig {
        api_base: args.api_base.clone(),
        request_timeout_secs: args.request_timeout_secs,
        connect_timeout_secs: args.connect_timeout_secs,
        ..ClientConfig::default()
    };
    let client = AgentClient::new(&config)?;

    let (model, model_warning) = match ModelOption::by_id(&args.model) {
        Ok(model) => (model, None),
        Err(e) => {
            let fallback = find_model_option(&args.model);
            tracing::warn!(error = %e, fallback = fallback.id, "unknown model");
            (fallback, Some(format!("{e}, using {}", fallback.label)))
        }
    };

    let transport: Arc<dyn AgentTransport> = if args.no_stream {
        Arc::new(OneShotTransport::new(client.clone()))
    } else {
        Arc::new(client.clone())
    };
    let controller = SessionController::new(transport, config.channel_capacity);

    // Background health check
    let (health_tx, health_rx) = mpsc::channel::<bool>(4);
    let health_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_INTERVAL);
        loop {
            interval.tick().await;
            if health_tx.send(client.health().await).await.is_err() {
                break;
            }
        }
    });

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new(controller, config.base_url(), model, args.follow_threshold);
    if let Some(warning) = model_warning {
        app.set_status(warning);
    }

    // Run the event loop
    let result = run_event_loop(&mut terminal, &mut app, EventStream::new(), health_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    health_task.abort();
    result
}

/// Main event loop.
///
/// Terminal input, session updates, health results and the redraw tick each
/// have their own branch. Input is polled first so a busy stream can never
/// hold back Esc or scrolling.
async fn run_event_loop<B, E>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut events: E,
    mut health_rx: mpsc::Receiver<bool>,
) -> anyhow::Result<()>
where
    B: Backend,
    E: Stream<Item = io::Result<Event>> + Unpin,
{
    let mut ticker = tokio::time::interval(TICK_RATE);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        app.on_frame();
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            biased;

            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => handle_input(app, event),
                Some(Err(e)) => return Err(e.into()),
                None => app.should_quit = true,
            },

            _ = ticker.tick() => app.tick_animation(),

            Some(update) = app.next_update() => app.handle_update(update),

            Some(healthy) = health_rx.recv() => {
                if app.connected != Some(healthy) {
                    tracing::debug!(healthy, "backend reachability changed");
                }
                app.connected = Some(healthy);
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.cancel_streaming();
    Ok(())
}

/// Handle terminal events.
fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle a key press.
///
/// Typing always goes to the input line; everything else is a function
/// key or a Ctrl chord.
fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c' | 'q') if ctrl => app.should_quit = true,
        KeyCode::Esc => {
            if !app.cancel_streaming() {
                app.clear_error();
            }
        }
        KeyCode::Enter => app.submit(),
        KeyCode::PageUp => app.scroll_chat_up(10),
        KeyCode::PageDown => app.scroll_chat_down(10),
        KeyCode::End => app.jump_to_latest(),
        KeyCode::F(2) => app.cycle_model(),
        KeyCode::F(3) => app.prefill_example(),
        KeyCode::Char('t') if ctrl => app.toggle_timeline(),
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(_) if ctrl => {}
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt as _;
    use optimus_stream::{AgentQueryRequest, ByteStream};

    use super::*;

    struct Silent;

    #[async_trait]
    impl AgentTransport for Silent {
        async fn open_stream(
            &self,
            _request: &AgentQueryRequest,
        ) -> optimus_stream::Result<ByteStream> {
            Ok(futures::stream::pending().boxed())
        }
    }

    /// Streams thought steps without end.
    struct Flood;

    const THOUGHT: &str = "data: {\"type\":\"agent_step\",\"step\":{\"node\":\"agent\",\"label\":\"thinking\",\"kind\":\"thought\",\"messages\":[]}}\n\n";

    #[async_trait]
    impl AgentTransport for Flood {
        async fn open_stream(
            &self,
            _request: &AgentQueryRequest,
        ) -> optimus_stream::Result<ByteStream> {
            Ok(futures::stream::repeat_with(|| Ok(bytes::Bytes::from_static(THOUGHT.as_bytes())))
                .boxed())
        }
    }

    fn app() -> App {
        let controller = SessionController::new(Arc::new(Silent), 16);
        App::new(controller, "http://localhost:8000/api/v1", find_model_option("gpt-5"), 3)
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_key(app, KeyEvent::new(code, modifiers));
    }

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["optimus"]).unwrap();
        assert_eq!(args.model, "gpt-5");
        assert_eq!(args.follow_threshold, 3);
        assert_eq!(args.request_timeout_secs, 300);
        assert!(!args.no_stream);
        assert!(args.log_file.is_none());
    }

    #[test]
    fn typing_and_ctrl_chords() {
        let mut app = app();
        for c in "hi there".chars() {
            press(&mut app, KeyCode::Char(c), KeyModifiers::NONE);
        }
        press(&mut app, KeyCode::Char('w'), KeyModifiers::CONTROL);
        assert_eq!(app.input, "hi ");

        press(&mut app, KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(app.input, "hi ");

        press(&mut app, KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[test]
    fn esc_clears_error_when_idle() {
        let mut app = app();
        app.set_error("boom");
        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.error_message.is_none());
    }

    #[tokio::test]
    async fn esc_cancels_running_session() {
        let mut app = app();
        app.input = "status of order 7".to_string();
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.is_streaming());

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(!app.is_streaming());
        assert_eq!(app.status_message.as_deref(), Some("Cancelled"));
    }

    #[test]
    fn function_keys() {
        let mut app = app();
        press(&mut app, KeyCode::F(3), KeyModifiers::NONE);
        assert_eq!(app.input, app::EXAMPLE_QUERY);

        press(&mut app, KeyCode::F(2), KeyModifiers::NONE);
        assert_eq!(app.model.id, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn keys_are_read_while_updates_keep_arriving() {
        let controller = SessionController::new(Arc::new(Flood), 16);
        let mut app = App::new(
            controller,
            "http://localhost:8000/api/v1",
            find_model_option("gpt-5"),
            3,
        );
        app.input = "status of order 7".to_string();
        app.submit();
        // Let the update channel fill up before the loop starts.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let keys = futures::stream::iter([
            Ok::<_, io::Error>(Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))),
            Ok(Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL))),
        ])
        .chain(futures::stream::pending());
        let (_health_tx, health_rx) = mpsc::channel(1);
        let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(80, 24)).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_event_loop(&mut terminal, &mut app, keys, health_rx),
        )
        .await
        .expect("input was starved by session updates")
        .unwrap();

        assert!(app.should_quit);
        assert_eq!(
            app.session().unwrap().state,
            optimus_stream::SessionState::Aborted
        );
        assert_eq!(app.controller().transcript().len(), 1);
    }
}
