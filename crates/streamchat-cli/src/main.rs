//! streamchat terminal client.
//!
//! This is the entry point for the `schat` binary.

mod app;
mod auth_form;
mod config;
mod input;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use streamchat_auth::{AuthClient, AuthConfig};
use streamchat_core::AccessToken;
use streamchat_store::{ConversationStore, HttpStore};
use streamchat_stream::{Dialer, StreamConfig, StreamEvent, WsDialer};

use app::{App, AppEvent, Focus, InputMode, Screen, StoreFactory};
use auth_form::AuthForm;
use config::ClientConfig;
use input::LineEditor;

/// streamchat terminal client.
#[derive(Parser, Debug)]
#[command(name = "schat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API base URL.
    #[arg(long, env = "STREAMCHAT_API", default_value = "http://127.0.0.1:8000")]
    api: String,

    /// WebSocket base URL. Derived from the API URL when omitted.
    #[arg(long, env = "STREAMCHAT_WS")]
    ws: Option<String>,

    /// Email to log in with.
    #[arg(long, env = "STREAMCHAT_EMAIL")]
    email: Option<String>,

    /// Password to log in with.
    #[arg(long, env = "STREAMCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Existing access token; skips the login form when given with --email.
    #[arg(long, env = "STREAMCHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Watchdog poll interval in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Silence after which a streamed answer is considered complete, in milliseconds.
    #[arg(long)]
    idle_threshold_ms: Option<u64>,

    /// Delay before retrying a send made while disconnected, in milliseconds.
    #[arg(long)]
    send_retry_delay_ms: Option<u64>,

    /// Timeout for login and registration requests, in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut stream = StreamConfig::default();
    if let Some(ms) = args.poll_interval_ms {
        stream.poll_interval_ms = ms;
    }
    if let Some(ms) = args.idle_threshold_ms {
        stream.idle_threshold_ms = ms;
    }
    if let Some(ms) = args.send_retry_delay_ms {
        stream.send_retry_delay_ms = ms;
    }
    let config = ClientConfig::resolve(
        &args.api,
        args.ws.as_deref(),
        stream,
        Duration::from_secs(args.request_timeout_secs),
    )?;
    tracing::info!(api = %config.api_base, ws = %config.ws_base, "Starting");

    let credentials = AuthClient::new(AuthConfig {
        base_url: config.api_base.clone(),
        request_timeout_seconds: config.request_timeout.as_secs(),
    })?;
    let api_base = config.api_base.clone();
    let make_store: StoreFactory = Box::new(move |token| {
        let store = HttpStore::new(api_base.clone(), token)?;
        Ok(Arc::new(store) as Arc<dyn ConversationStore>)
    });
    let dialer = WsDialer::new(&config.ws_base)?;

    let (mut app, mut stream_events, mut app_events) =
        App::new(Arc::new(credentials), make_store, dialer, config.stream);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    auto_login(&mut app, &args).await;

    let result =
        run_event_loop(&mut terminal, &mut app, &mut stream_events, &mut app_events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Logs go to a file or stderr, and only when asked for, so the TUI stays intact.
fn init_tracing(args: &Args) -> anyhow::Result<()> {
    if !args.debug && args.log_file.is_none() {
        return Ok(());
    }
    let default = if args.debug {
        "streamchat=debug,warn"
    } else {
        "streamchat=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if let Some(path) = &args.log_file {
        let file = File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

/// Skip the form when credentials were given on the command line.
async fn auto_login<D: Dialer>(app: &mut App<D>, args: &Args) {
    let Some(email) = args.email.clone() else {
        return;
    };

    if let Some(token) = &args.token {
        if let Err(e) = app.start_session(email.clone(), AccessToken::new(token.clone())) {
            tracing::warn!(error = %e, "Token login failed");
            let mut form = AuthForm::login(Some(email.as_str()));
            form.message = Some(format!("Token rejected: {e}"));
            app.screen = Screen::Auth(form);
        }
        return;
    }

    let mut form = AuthForm::login(Some(email.as_str()));
    if let Some(password) = &args.password {
        *form.focused_editor() = LineEditor::with_text(password.as_str());
        app.screen = Screen::Auth(form);
        app.submit_auth().await;
    } else {
        app.screen = Screen::Auth(form);
    }
}

/// Main event loop.
///
/// Stream events redraw immediately so answers appear as they arrive.
async fn run_event_loop<D: Dialer>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<D>,
    stream_events: &mut mpsc::UnboundedReceiver<StreamEvent>,
    app_events: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        app.tick_animation();
        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.is_streaming() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::ZERO).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt).await;
                    }
                }
            }

            Some(event) = stream_events.recv() => {
                if app.handle_stream_event(event).needs_redraw() {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            Some(event) = app_events.recv() => {
                app.handle_app_event(event);
            }

            now = app.watchdog_tick() => {
                app.on_watchdog(now);
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.disconnect();
    Ok(())
}

/// Handle a terminal event.
async fn handle_input<D: Dialer>(app: &mut App<D>, event: Event) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                app.should_quit = true;
                return;
            }
            if matches!(app.screen, Screen::Auth(_)) {
                handle_auth_key(app, key).await;
            } else {
                handle_chat_key(app, key);
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_up(3),
            MouseEventKind::ScrollDown => app.scroll_down(3),
            _ => {}
        },
        _ => {}
    }
}

// =============================================================================
// Auth screen
// =============================================================================

async fn handle_auth_key<D: Dialer>(app: &mut App<D>, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.submit_auth().await;
            return;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        _ => {}
    }

    let Screen::Auth(form) = &mut app.screen else {
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.prev_field(),
        KeyCode::F(2) => form.toggle_mode(),
        code => edit_line(form.focused_editor(), code, key.modifiers),
    }
}

// =============================================================================
// Chat screen
// =============================================================================

/// Unified input model:
/// - Up/Down always move through conversations
/// - Typing goes to the message input
/// - Esc toggles command mode, where single keys act on conversations
fn handle_chat_key<D: Dialer>(app: &mut App<D>, key: KeyEvent) {
    match app.input_mode {
        InputMode::Normal => {}
        InputMode::ConfirmDelete => {
            handle_confirm_delete(app, key.code);
            return;
        }
        InputMode::NewConversation | InputMode::Upload => {
            handle_prompt(app, key);
            return;
        }
    }

    match key.code {
        KeyCode::Esc => {
            if app.error_message.is_some() {
                app.clear_error();
            } else {
                app.command_mode = !app.command_mode;
            }
            return;
        }
        KeyCode::Tab => {
            app.focus = app.focus.next();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(10);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(10);
            return;
        }
        KeyCode::Up => {
            app.select_prev();
            return;
        }
        KeyCode::Down => {
            app.select_next();
            return;
        }
        _ => {}
    }

    if app.command_mode {
        handle_command(app, key.code);
    } else {
        handle_typing(app, key);
    }
}

fn handle_command<D: Dialer>(app: &mut App<D>, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('n') => app.open_dialog(InputMode::NewConversation),
        KeyCode::Char('d') => {
            if app.selected_conversation().is_some() {
                app.open_dialog(InputMode::ConfirmDelete);
            }
        }
        KeyCode::Char('u') => app.open_dialog(InputMode::Upload),
        KeyCode::Char('r') => app.reconnect(),
        KeyCode::Char('l') => app.logout(),
        KeyCode::Char('o') => app.open_selected(),
        KeyCode::Char('j') => app.scroll_down(1),
        KeyCode::Char('k') => app.scroll_up(1),
        KeyCode::Enter => app.command_mode = false,
        _ => {}
    }
}

fn handle_typing<D: Dialer>(app: &mut App<D>, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        if !app.input.is_empty() {
            app.submit_message();
        } else if app.focus == Focus::Conversations || app.current_conversation() != app.selected_conversation() {
            app.open_selected();
            app.focus = Focus::Chat;
        } else if !app.is_connected() {
            app.reconnect();
        }
        return;
    }
    edit_line(&mut app.input, key.code, key.modifiers);
}

fn handle_prompt<D: Dialer>(app: &mut App<D>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_dialog(),
        KeyCode::Enter => {
            let text = app.dialog.take();
            let mode = app.input_mode;
            app.close_dialog();
            match mode {
                InputMode::NewConversation => app.create_conversation(&text),
                InputMode::Upload => app.start_upload(&text),
                InputMode::Normal | InputMode::ConfirmDelete => {}
            }
        }
        code => edit_line(&mut app.dialog, code, key.modifiers),
    }
}

fn handle_confirm_delete<D: Dialer>(app: &mut App<D>, code: KeyCode) {
    match code {
        KeyCode::Char('y' | 'Y') => {
            app.close_dialog();
            app.delete_selected();
        }
        KeyCode::Char('n' | 'N') | KeyCode::Esc => app.close_dialog(),
        _ => {}
    }
}

/// Line editing keys shared by every text field.
fn edit_line(editor: &mut LineEditor, code: KeyCode, modifiers: KeyModifiers) {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('a') if ctrl => editor.home(),
        KeyCode::Char('e') if ctrl => editor.end(),
        KeyCode::Char('u') if ctrl => editor.clear(),
        KeyCode::Char('w') if ctrl => editor.delete_word(),
        KeyCode::Char(c) => editor.insert(c),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete(),
        KeyCode::Left => editor.left(),
        KeyCode::Right => editor.right(),
        KeyCode::Home => editor.home(),
        KeyCode::End => editor.end(),
        _ => {}
    }
}
