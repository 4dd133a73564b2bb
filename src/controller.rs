/// Interaction controller — the four editor commands.
///
/// Save, Switch File, Whole-File Edit and Selection Edit, expressed over an
/// explicit state struct. The TUI maps keys and dialogs onto these calls; an
/// edit is split into begin / submit / run / finish so the model request can
/// run as its own task while the event loop keeps drawing.
///
/// While a request is in flight the conversation is owned by that task, which
/// is also what blocks a second edit from being dispatched.
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::client::CompletionClient;
use crate::conversation::Conversation;
use crate::editor::BufferEditor;
use crate::error::{AskError, CommandError};
use crate::picker::{BrowseState, FileBrowser};

pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "here is the code: {code}, and here is the user prompt: {prompt}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    WholeFile,
    Selection,
}

/// Where the generated text lands once the model answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    /// Insert at this offset; nothing is removed.
    Insert(usize),
    /// Delete exactly this span, then insert at its start.
    Replace(Range<usize>),
}

/// An edit whose instruction dialog is open.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub kind: EditKind,
    target: EditTarget,
    selected: String,
    context: String,
}

/// A request ready to run; owns the conversation until it finishes.
pub struct EditJob<C> {
    conversation: Conversation<C>,
    target: EditTarget,
    prompt: String,
    context: String,
}

pub struct EditOutcome<C> {
    conversation: Conversation<C>,
    target: EditTarget,
    result: Result<String, AskError>,
}

impl<C: CompletionClient> EditJob<C> {
    pub async fn run(mut self) -> EditOutcome<C> {
        self.conversation.set_file_context(self.context);
        let result = self.conversation.ask(&self.prompt).await;
        EditOutcome {
            conversation: self.conversation,
            target: self.target,
            result,
        }
    }
}

pub struct Controller<C> {
    pub editor: BufferEditor,
    active_path: PathBuf,
    conversation: Option<Conversation<C>>,
    prompt_template: String,
}

impl<C: CompletionClient> Controller<C> {
    pub fn new(
        text: &str,
        active_path: PathBuf,
        conversation: Conversation<C>,
        prompt_template: String,
    ) -> Self {
        Self {
            editor: BufferEditor::new(text),
            active_path,
            conversation: Some(conversation),
            prompt_template,
        }
    }

    /// Open `path` for editing. A file that does not exist yet starts empty.
    pub fn open(
        path: &Path,
        conversation: Conversation<C>,
        prompt_template: String,
    ) -> Result<Self, CommandError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "new file");
                String::new()
            }
            Err(e) => return Err(CommandError::io(path, e)),
        };
        Ok(Self::new(&text, path.to_path_buf(), conversation, prompt_template))
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.is_none()
    }

    pub fn conversation(&self) -> Option<&Conversation<C>> {
        self.conversation.as_ref()
    }

    // ── Save ──────────────────────────────────────────────────────────────────

    pub fn save(&self) -> Result<&Path, CommandError> {
        std::fs::write(&self.active_path, self.editor.text())
            .map_err(|e| CommandError::io(&self.active_path, e))?;
        tracing::info!(path = %self.active_path.display(), "saved");
        Ok(&self.active_path)
    }

    // ── Switch file ───────────────────────────────────────────────────────────

    /// Open the file picker in the active file's directory.
    pub fn begin_switch(&self) -> Result<FileBrowser, CommandError> {
        let dir = self
            .active_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        FileBrowser::open(dir).map_err(|e| CommandError::io(dir, e))
    }

    /// Act on a terminal picker state. `Browsing` is not terminal and is
    /// returned unchanged as `Ok(false)`.
    pub fn finish_switch(&mut self, state: BrowseState) -> Result<bool, CommandError> {
        match state {
            BrowseState::Browsing(_) => Ok(false),
            BrowseState::Cancelled => Err(CommandError::UserCancelled),
            BrowseState::Chosen(path) => {
                self.switch_to(&path)?;
                Ok(true)
            }
        }
    }

    /// Replace the buffer with `path`'s content. On a read failure nothing
    /// changes.
    pub fn switch_to(&mut self, path: &Path) -> Result<(), CommandError> {
        let text = std::fs::read_to_string(path).map_err(|e| CommandError::io(path, e))?;
        self.editor.set_text(&text);
        self.active_path = path.to_path_buf();
        tracing::info!(path = %path.display(), "switched file");
        Ok(())
    }

    // ── Edits ─────────────────────────────────────────────────────────────────

    /// Capture what the edit will operate on, before the instruction dialog
    /// opens. Nothing is mutated.
    pub fn begin_edit(&self, kind: EditKind) -> Result<PendingEdit, CommandError> {
        if self.is_busy() {
            return Err(CommandError::Busy);
        }
        let context = self.editor.text();
        let (target, selected) = match kind {
            EditKind::WholeFile => (EditTarget::Insert(self.editor.cursor_offset()), String::new()),
            EditKind::Selection => {
                let range = self.editor.selection_range().ok_or(CommandError::NoSelection)?;
                let selected = self.editor.slice(range.clone());
                (EditTarget::Replace(range), selected)
            }
        };
        Ok(PendingEdit { kind, target, selected, context })
    }

    /// Turn the dialog result into a runnable job. `None` means the dialog
    /// was dismissed; the pending edit is dropped and nothing changes.
    pub fn submit_edit(
        &mut self,
        pending: PendingEdit,
        instruction: Option<String>,
    ) -> Result<EditJob<C>, CommandError> {
        let instruction = instruction.ok_or(CommandError::UserCancelled)?;
        let conversation = self.conversation.take().ok_or(CommandError::Busy)?;
        let prompt = render_prompt(&self.prompt_template, &pending.selected, &instruction);
        tracing::info!(kind = ?pending.kind, target = ?pending.target, "edit requested");
        Ok(EditJob {
            conversation,
            target: pending.target,
            prompt,
            context: pending.context,
        })
    }

    /// Take the conversation back and splice the response into the buffer.
    pub fn finish_edit(&mut self, outcome: EditOutcome<C>) -> Result<(), CommandError> {
        self.conversation = Some(outcome.conversation);
        let text = outcome.result?;
        match outcome.target {
            EditTarget::Insert(at) => {
                self.editor.move_to_offset(at);
                self.editor.insert_at_cursor(&text);
            }
            EditTarget::Replace(range) => {
                self.editor.replace_range(range, &text);
            }
        }
        self.editor.clear_selection();
        Ok(())
    }

    /// Hand back a conversation after the task that owned it was lost.
    pub fn restore_conversation(&mut self, conversation: Conversation<C>) {
        self.conversation = Some(conversation);
    }

    /// Begin, submit, run and finish in one go.
    #[cfg(test)]
    pub async fn edit(&mut self, kind: EditKind, instruction: Option<String>) -> Result<(), CommandError> {
        let pending = self.begin_edit(kind)?;
        let job = self.submit_edit(pending, instruction)?;
        let outcome = job.run().await;
        self.finish_edit(outcome)
    }
}

/// Fill `{code}` and `{prompt}` in one pass, so placeholder-looking text inside
/// the code is never substituted.
pub fn render_prompt(template: &str, code: &str, prompt: &str) -> String {
    let mut out = String::with_capacity(template.len() + code.len() + prompt.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{code}") {
            out.push_str(code);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{prompt}") {
            out.push_str(prompt);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{Reply, ScriptedClient};
    use crate::error::EmptyCompletion;
    use crate::session::{Role, Turn};

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("instructions.txt"), "rules").unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn controller(&self, text: &str, client: ScriptedClient) -> Controller<ScriptedClient> {
            let conv = Conversation::initialize(
                &self.path("instructions.txt"),
                &self.path("history.json"),
                client,
            )
            .unwrap();
            std::fs::write(self.path("main.py"), text).unwrap();
            Controller::open(&self.path("main.py"), conv, DEFAULT_PROMPT_TEMPLATE.to_string())
                .unwrap()
        }
    }

    fn log_len(c: &Controller<ScriptedClient>) -> usize {
        c.conversation().unwrap().log().len()
    }

    #[test]
    fn test_render_prompt() {
        assert_eq!(
            render_prompt(DEFAULT_PROMPT_TEMPLATE, "x = 1", "rename x"),
            "here is the code: x = 1, and here is the user prompt: rename x"
        );
        assert_eq!(render_prompt("{prompt}|{code}", "{prompt}", "p"), "p|{prompt}");
        assert_eq!(render_prompt("{other} {code", "c", "p"), "{other} {code");
    }

    #[tokio::test]
    async fn test_selection_edit_replaces_span() {
        let fx = Fixture::new();
        let mut c = fx.controller("abcXYZdef", ScriptedClient::content("123"));
        c.editor.select(3..6);

        c.edit(EditKind::Selection, Some("digits".into())).await.unwrap();

        assert_eq!(c.editor.text(), "abc123def");
        assert_eq!(c.editor.selection_range(), None);
        assert!(!c.is_busy());
        assert_eq!(log_len(&c), 3);
    }

    #[tokio::test]
    async fn test_selection_edit_request_shape() {
        let fx = Fixture::new();
        let mut c = fx.controller("abcXYZdef", ScriptedClient::content("123"));
        c.editor.select(3..6);
        c.edit(EditKind::Selection, Some("digits".into())).await.unwrap();

        let conv = c.conversation().unwrap();
        let logged = &conv.log().turns()[1];
        assert_eq!(
            *logged,
            Turn::user("here is the code: XYZ, and here is the user prompt: digits")
        );
        // The outgoing request carried the whole buffer in front of the prompt
        let sent = last_sent(&c);
        assert_eq!(sent.role, Role::User);
        assert!(sent.content.starts_with("abcXYZdef here is the code: XYZ"));
    }

    fn last_sent(c: &Controller<ScriptedClient>) -> Turn {
        let turns = c.conversation().unwrap().client().last_request();
        turns.last().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_selection_edit_with_cursor_before_selection() {
        let fx = Fixture::new();
        let mut c = fx.controller("abcXYZdef", ScriptedClient::content("123"));
        c.editor.select(3..6);
        let pending = c.begin_edit(EditKind::Selection).unwrap();
        c.editor.move_to_offset(0);

        let job = c.submit_edit(pending, Some("x".into())).unwrap();
        let outcome = job.run().await;
        c.finish_edit(outcome).unwrap();
        assert_eq!(c.editor.text(), "abc123def");
    }

    #[tokio::test]
    async fn test_selection_edit_requires_selection() {
        let fx = Fixture::new();
        let c = fx.controller("abc", ScriptedClient::content("x"));
        assert!(matches!(c.begin_edit(EditKind::Selection), Err(CommandError::NoSelection)));
    }

    #[tokio::test]
    async fn test_whole_file_edit_inserts_at_cursor() {
        let fx = Fixture::new();
        let mut c = fx.controller("def a():\n    pass\n", ScriptedClient::content("# header\n"));
        c.editor.move_to_offset(0);

        c.edit(EditKind::WholeFile, Some("add a header".into())).await.unwrap();

        assert_eq!(c.editor.text(), "# header\ndef a():\n    pass\n");
        let logged = &c.conversation().unwrap().log().turns()[1];
        assert_eq!(logged.content, "here is the code: , and here is the user prompt: add a header");
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_buffer_and_log() {
        let fx = Fixture::new();
        let mut c = fx.controller(
            "abcXYZdef",
            ScriptedClient::replying([Reply::Empty(EmptyCompletion::NoContent)]),
        );
        c.editor.select(3..6);

        let err = c.edit(EditKind::Selection, Some("x".into())).await.unwrap_err();
        assert_eq!(err.kind(), "empty_completion");
        assert_eq!(c.editor.text(), "abcXYZdef");
        assert_eq!(log_len(&c), 1);
        assert!(!c.is_busy(), "conversation returned after failure");
    }

    #[tokio::test]
    async fn test_cancelled_dialogs_change_nothing() {
        let fx = Fixture::new();
        let mut c = fx.controller("abcXYZdef", ScriptedClient::content("never"));
        c.editor.select(3..6);
        let text = c.editor.text();
        let cursor = c.editor.cursor_offset();

        for kind in [EditKind::Selection, EditKind::WholeFile] {
            let pending = c.begin_edit(kind).unwrap();
            let err = c.submit_edit(pending, None).err().unwrap();
            assert!(matches!(err, CommandError::UserCancelled));
        }

        let browser = c.begin_switch().unwrap();
        let err = c.finish_switch(browser.cancel()).unwrap_err();
        assert!(matches!(err, CommandError::UserCancelled));

        assert_eq!(c.editor.text(), text);
        assert_eq!(c.editor.cursor_offset(), cursor);
        assert_eq!(log_len(&c), 1);
        assert_eq!(c.active_path(), fx.path("main.py").as_path());
        assert!(!fx.path("history.json").exists());
    }

    #[tokio::test]
    async fn test_busy_while_job_in_flight() {
        let fx = Fixture::new();
        let mut c = fx.controller("abc", ScriptedClient::content("x"));
        let pending = c.begin_edit(EditKind::WholeFile).unwrap();
        let job = c.submit_edit(pending, Some("go".into())).unwrap();

        assert!(c.is_busy());
        assert!(matches!(c.begin_edit(EditKind::WholeFile), Err(CommandError::Busy)));

        c.finish_edit(job.run().await).unwrap();
        assert!(!c.is_busy());
    }

    #[test]
    fn test_switch_file_walk() {
        let fx = Fixture::new();
        let work = fx.path("work");
        std::fs::create_dir_all(work.join("sub")).unwrap();
        std::fs::write(work.join("a.py"), "print('a')\n").unwrap();
        let conv = Conversation::initialize(
            &fx.path("instructions.txt"),
            &fx.path("history.json"),
            ScriptedClient::default(),
        )
        .unwrap();
        let mut c = Controller::open(&work.join("start.py"), conv, DEFAULT_PROMPT_TEMPLATE.into()).unwrap();
        assert_eq!(c.editor.text(), "");

        let mut browser = c.begin_switch().unwrap();
        let names: Vec<&str> = browser.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["..", "sub", "a.py"]);

        let up = browser.select("..").unwrap();
        assert_eq!(up, BrowseState::Browsing(fx.dir.path().to_path_buf()));
        assert!(!c.finish_switch(up).unwrap());

        browser.select("work").unwrap();
        let down = browser.select("sub").unwrap();
        assert_eq!(down, BrowseState::Browsing(work.join("sub")));

        browser.select("..").unwrap();
        let chosen = browser.select("a.py").unwrap();
        assert!(c.finish_switch(chosen).unwrap());
        assert_eq!(c.active_path(), work.join("a.py").as_path());
        assert!(c.active_path().is_absolute());
        assert_eq!(c.editor.text(), "print('a')\n");
    }

    #[test]
    fn test_save_writes_buffer() {
        let fx = Fixture::new();
        let mut c = fx.controller("old", ScriptedClient::default());
        c.editor.set_text("new text\n");
        c.save().unwrap();
        assert_eq!(std::fs::read_to_string(fx.path("main.py")).unwrap(), "new text\n");
    }

    #[test]
    fn test_save_failure_is_io() {
        let fx = Fixture::new();
        let c = fx.controller("x", ScriptedClient::default());
        std::fs::remove_file(fx.path("main.py")).unwrap();
        std::fs::create_dir(fx.path("main.py")).unwrap();
        assert!(matches!(c.save(), Err(CommandError::Io { .. })));
    }

    #[test]
    fn test_switch_to_missing_file_keeps_buffer() {
        let fx = Fixture::new();
        let mut c = fx.controller("keep", ScriptedClient::default());
        assert!(c.switch_to(&fx.path("missing.py")).is_err());
        assert_eq!(c.editor.text(), "keep");
        assert_eq!(c.active_path(), fx.path("main.py").as_path());
    }
}
