/// Ratatui-based TUI for codesplice.
///
/// Architecture:
///   main task:  event loop — crossterm keyboard events + mpsc UiEvent drain
///   edit task:  tokio::spawn — owns the conversation while a request runs,
///               hands it back through UiEvent::EditFinished
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  buffer (tui-textarea, Min(0))                 │
///   ├────────────────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   │  message / key hints (1 line)                  │
///   └────────────────────────────────────────────────┘
///
/// Only one command runs at a time: while an edit is in flight every key
/// except Ctrl+Q is ignored.
pub mod overlays;
pub mod render;

use std::io;

use anyhow::Result;
use crossterm::{
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tui_textarea::TextArea;

use crate::client::ChatClient;
use crate::config::ResolvedConfig;
use crate::controller::{Controller, EditKind, EditOutcome, PendingEdit};
use crate::conversation::Conversation;
use crate::error::CommandError;
use crate::picker::{BrowseState, FileBrowser, PARENT_ENTRY};

// ── UiEvent — results delivered back to the event loop ───────────────────────

pub enum UiEvent {
    /// A model request finished (successfully or not)
    EditFinished(EditOutcome<ChatClient>),
    /// The edit task panicked or was cancelled; its conversation is gone
    EditAborted(String),
}

// ── Mode — TUI modal state ────────────────────────────────────────────────────

pub enum Mode {
    Editing,
    /// Instruction dialog for a pending edit
    Prompt(PromptDialog),
    /// Switch-file dialog
    Picker(FileBrowser),
    /// A model request is in flight
    Waiting,
}

pub struct PromptDialog {
    pub pending: PendingEdit,
    pub input: TextArea<'static>,
}

impl PromptDialog {
    fn new(pending: PendingEdit) -> Self {
        let mut input = TextArea::default();
        input.set_cursor_line_style(ratatui::style::Style::default());
        input.set_placeholder_text("describe the change, Enter to send");
        Self { pending, input }
    }

    fn title(&self) -> &'static str {
        match self.pending.kind {
            EditKind::WholeFile => " Generate into file ",
            EditKind::Selection => " Rewrite selection ",
        }
    }

    fn instruction(&self) -> String {
        self.input.lines().join("\n")
    }
}

// ── Status line ───────────────────────────────────────────────────────────────

pub struct Status {
    pub text: String,
    pub error: bool,
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub controller: Controller<ChatClient>,
    pub mode: Mode,
    pub status: Option<Status>,
    pub profile: String,
    pub model: String,
    /// Kept to rebuild the conversation if an edit task is lost
    pub resolved: ResolvedConfig,
    /// Incremented every 120ms while Waiting for spinner animation
    pub spinner_tick: u32,
}

impl AppState {
    pub fn new(controller: Controller<ChatClient>, resolved: &ResolvedConfig) -> Self {
        Self {
            controller,
            mode: Mode::Editing,
            status: None,
            profile: resolved.profile_name.clone(),
            model: resolved.model.clone(),
            resolved: resolved.clone(),
            spinner_tick: 0,
        }
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status { text: text.into(), error: false });
    }

    /// Every failure ends up here: logged with its kind, shown in the status bar.
    fn report(&mut self, err: CommandError) {
        match &err {
            CommandError::UserCancelled => tracing::debug!("dialog cancelled"),
            _ => tracing::warn!(kind = err.kind(), error = %err, "command failed"),
        }
        let error = !matches!(err, CommandError::UserCancelled);
        self.status = Some(Status { text: err.to_string(), error });
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::EditFinished(outcome) => {
                self.mode = Mode::Editing;
                match self.controller.finish_edit(outcome) {
                    Ok(()) => {
                        let at = chrono::Local::now().format("%H:%M:%S");
                        self.info(format!("✓ edit applied {at}"));
                    }
                    Err(e) => self.report(e),
                }
            }
            UiEvent::EditAborted(reason) => {
                self.mode = Mode::Editing;
                self.recover_conversation();
                self.report(CommandError::TaskFailed { reason });
            }
        }
    }

    /// Reload the conversation from its session file, the last state that
    /// was persisted before the lost request.
    fn recover_conversation(&mut self) {
        let reopened = ChatClient::from_config(&self.resolved)
            .map_err(|e| e.to_string())
            .and_then(|client| {
                Conversation::initialize(&self.resolved.instructions, &self.resolved.session, client)
                    .map_err(|e| e.to_string())
            });
        match reopened {
            Ok(conversation) => {
                tracing::info!(turns = conversation.log().len(), "conversation reloaded");
                self.controller.restore_conversation(conversation);
            }
            Err(e) => tracing::error!(error = %e, "could not reload conversation; edits stay disabled"),
        }
    }
}

/// Wait for an edit task and turn its end, clean or not, into a UiEvent.
async fn join_edit(handle: JoinHandle<EditOutcome<ChatClient>>) -> UiEvent {
    match handle.await {
        Ok(outcome) => UiEvent::EditFinished(outcome),
        Err(e) => {
            tracing::error!(error = %e, "edit task did not finish");
            UiEvent::EditAborted(e.to_string())
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

fn resume_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen, EnableBracketedPaste)?;
    terminal.clear()?;
    Ok(())
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(controller: Controller<ChatClient>, resolved: ResolvedConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        tracing::error!(%info, "panic");
        orig_hook(info);
    }));

    let mut state = AppState::new(controller, &resolved);
    let result = event_loop(&mut terminal, &mut state).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    state.info("Ctrl+G generate · Ctrl+R rewrite selection · Ctrl+O open · Ctrl+S save · Ctrl+Q quit");
    terminal.draw(|f| render::draw(f, state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if matches!(state.mode, Mode::Waiting) {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, state))?;
                }
            }

            // ── Results from edit tasks ───────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                if matches!(ev, UiEvent::EditAborted(_)) {
                    // A panicking task ran the panic hook, which left the alternate screen
                    resume_terminal(terminal)?;
                }
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, state))?;
            }

            // ── Keyboard/paste/resize events ──────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        let keep = handle_key(key, state, &ui_tx);
                        if !keep { break; }
                    }
                    Event::Paste(text) => handle_paste(&text, state),
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, state))?;
            }
        }
    }

    tracing::info!("quit");
    Ok(())
}

// ── Key handling ──────────────────────────────────────────────────────────────

/// Returns false when the editor should exit.
fn handle_key(key: KeyEvent, state: &mut AppState, ui_tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    // Ctrl+Q quits from anywhere, immediately, without saving
    if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('q') {
        return false;
    }

    let mode = std::mem::replace(&mut state.mode, Mode::Editing);
    let next = match mode {
        Mode::Waiting => Mode::Waiting,
        Mode::Prompt(dialog) => handle_prompt_key(key, dialog, state, ui_tx),
        Mode::Picker(browser) => handle_picker_key(key, browser, state),
        Mode::Editing => handle_editing_key(key, state),
    };
    state.mode = next;
    true
}

fn handle_editing_key(key: KeyEvent, state: &mut AppState) -> Mode {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('s')) => {
            match state.controller.save() {
                Ok(path) => {
                    let msg = format!("saved {}", path.display());
                    state.info(msg);
                }
                Err(e) => state.report(e),
            }
            Mode::Editing
        }
        (KeyModifiers::CONTROL, KeyCode::Char('o')) => match state.controller.begin_switch() {
            Ok(browser) => Mode::Picker(browser),
            Err(e) => {
                state.report(e);
                Mode::Editing
            }
        },
        (KeyModifiers::CONTROL, KeyCode::Char('g')) => open_prompt(EditKind::WholeFile, state),
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => open_prompt(EditKind::Selection, state),
        (KeyModifiers::CONTROL, KeyCode::Char('z')) => {
            state.controller.editor.undo();
            Mode::Editing
        }
        (KeyModifiers::CONTROL, KeyCode::Char('y')) => {
            state.controller.editor.redo();
            Mode::Editing
        }
        _ => {
            state.controller.editor.input(key);
            Mode::Editing
        }
    }
}

fn open_prompt(kind: EditKind, state: &mut AppState) -> Mode {
    match state.controller.begin_edit(kind) {
        Ok(pending) => Mode::Prompt(PromptDialog::new(pending)),
        Err(e) => {
            state.report(e);
            Mode::Editing
        }
    }
}

fn handle_prompt_key(
    key: KeyEvent,
    mut dialog: PromptDialog,
    state: &mut AppState,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) -> Mode {
    let instruction = match key.code {
        KeyCode::Esc => None,
        KeyCode::Enter if key.modifiers.is_empty() => Some(dialog.instruction()),
        _ => {
            dialog.input.input(key);
            return Mode::Prompt(dialog);
        }
    };

    match state.controller.submit_edit(dialog.pending, instruction) {
        Ok(job) => {
            state.spinner_tick = 0;
            state.status = None;
            let tx = ui_tx.clone();
            let handle = tokio::spawn(job.run());
            tokio::spawn(async move {
                let _ = tx.send(join_edit(handle).await);
            });
            Mode::Waiting
        }
        Err(e) => {
            state.report(e);
            Mode::Editing
        }
    }
}

fn handle_picker_key(key: KeyEvent, mut browser: FileBrowser, state: &mut AppState) -> Mode {
    let step = match key.code {
        KeyCode::Esc => browser.cancel(),
        KeyCode::Up | KeyCode::Char('k') => {
            browser.move_up();
            return Mode::Picker(browser);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            browser.move_down();
            return Mode::Picker(browser);
        }
        KeyCode::Enter => match browser.confirm() {
            Ok(step) => step,
            Err(e) => {
                let dir = browser.dir().to_path_buf();
                state.report(CommandError::io(dir, e));
                return Mode::Picker(browser);
            }
        },
        KeyCode::Backspace | KeyCode::Left => match browser.select(PARENT_ENTRY) {
            Ok(step) => step,
            Err(e) => {
                let dir = browser.dir().to_path_buf();
                state.report(CommandError::io(dir, e));
                return Mode::Picker(browser);
            }
        },
        _ => return Mode::Picker(browser),
    };

    if matches!(step, BrowseState::Browsing(_)) {
        return Mode::Picker(browser);
    }
    match state.controller.finish_switch(step) {
        Ok(_) => {
            let msg = format!("opened {}", state.controller.active_path().display());
            state.info(msg);
        }
        Err(e) => state.report(e),
    }
    Mode::Editing
}

fn handle_paste(text: &str, state: &mut AppState) {
    match &mut state.mode {
        Mode::Editing => state.controller.editor.insert_at_cursor(text),
        Mode::Prompt(dialog) => {
            dialog.input.insert_str(text);
        }
        Mode::Picker(_) | Mode::Waiting => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
