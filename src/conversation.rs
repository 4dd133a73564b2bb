/// Conversation manager — owns the session log and talks to the model.
///
/// The log stores the raw prompt of every user turn; the outgoing request
/// additionally carries the current file context in front of the prompt.
/// That keeps the same file content from piling up in history while still
/// giving the model fresh context on each call.
use std::path::{Path, PathBuf};

use crate::client::CompletionClient;
use crate::error::{AskError, SessionError};
use crate::session::{self, SessionLog, Turn};

pub struct Conversation<C> {
    client: C,
    log: SessionLog,
    session_path: PathBuf,
    file_context: Option<String>,
    last_response: String,
}

impl<C: CompletionClient> Conversation<C> {
    /// Resume the session at `session_path` if one exists, otherwise seed a
    /// fresh log with the instructions read from `instructions_path`.
    pub fn initialize(
        instructions_path: &Path,
        session_path: &Path,
        client: C,
    ) -> Result<Self, SessionError> {
        let log = if session::exists(session_path) {
            let log = session::load(session_path)?;
            tracing::info!(path = %session_path.display(), turns = log.len(), "resumed session");
            log
        } else {
            let instructions = std::fs::read_to_string(instructions_path)
                .map_err(|e| SessionError::io(instructions_path, e))?;
            tracing::info!(path = %instructions_path.display(), "new session from instructions");
            SessionLog::seeded(instructions)
        };

        Ok(Self {
            client,
            log,
            session_path: session_path.to_path_buf(),
            file_context: None,
            last_response: String::new(),
        })
    }

    pub fn set_file_context(&mut self, text: impl Into<String>) {
        self.file_context = Some(text.into());
    }

    /// Read `path` and attach its content as the file context.
    pub fn load_file_context(&mut self, path: &Path) -> Result<(), SessionError> {
        let text = std::fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
        self.set_file_context(text);
        Ok(())
    }

    /// Send `prompt` (with file context) and record the exchange.
    ///
    /// On any failure the log is exactly as it was before the call.
    pub async fn ask(&mut self, prompt: &str) -> Result<String, AskError> {
        let context = self.file_context.as_deref().unwrap_or("");
        let outgoing = format!("{context} {prompt}").trim().to_string();

        let mut request = self.log.turns().to_vec();
        request.push(Turn::user(outgoing));

        let reply = match self.client.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "completion failed; log unchanged");
                return Err(e.into());
            }
        };

        let before = self.log.len();
        self.log.push(Turn::user(prompt));
        self.log.push(reply.clone());

        if let Err(e) = session::save(&self.log, &self.session_path) {
            self.log.truncate(before);
            tracing::error!(error = %e, "could not persist session; exchange rolled back");
            return Err(e.into());
        }

        self.last_response = reply.content;
        Ok(self.last_response.clone())
    }

    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    pub fn write_last_response(&self, path: &Path) -> Result<(), SessionError> {
        std::fs::write(path, &self.last_response).map_err(|e| SessionError::io(path, e))
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{Reply, ScriptedClient};
    use crate::error::EmptyCompletion;
    use crate::session::Role;

    struct Fixture {
        _dir: tempfile::TempDir,
        instructions: PathBuf,
        session: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let instructions = dir.path().join("instructions.txt");
        std::fs::write(&instructions, "Only generate python code.").unwrap();
        let session = dir.path().join("history.json");
        Fixture { instructions, session, _dir: dir }
    }

    #[test]
    fn test_initialize_seeds_system_turn() {
        let fx = fixture();
        let conv = Conversation::initialize(&fx.instructions, &fx.session, ScriptedClient::default())
            .unwrap();
        assert_eq!(conv.log().turns(), &[Turn::system("Only generate python code.")]);
        assert_eq!(conv.last_response(), "");
    }

    #[test]
    fn test_initialize_resumes_existing_session() {
        let fx = fixture();
        let mut prior = SessionLog::seeded("old rules");
        prior.push(Turn::user("a"));
        prior.push(Turn::assistant("b"));
        session::save(&prior, &fx.session).unwrap();

        let conv = Conversation::initialize(&fx.instructions, &fx.session, ScriptedClient::default())
            .unwrap();
        assert_eq!(conv.log(), &prior);
        assert_eq!(conv.log().turns()[0].content, "old rules");
    }

    #[test]
    fn test_initialize_missing_instructions_is_io() {
        let fx = fixture();
        std::fs::remove_file(&fx.instructions).unwrap();
        let err = Conversation::initialize(&fx.instructions, &fx.session, ScriptedClient::default())
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Io { .. }));
    }

    #[test]
    fn test_initialize_corrupt_session() {
        let fx = fixture();
        std::fs::write(&fx.session, "garbage").unwrap();
        let err = Conversation::initialize(&fx.instructions, &fx.session, ScriptedClient::default())
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_ask_appends_raw_prompt_and_reply() {
        let fx = fixture();
        let mut conv = Conversation::initialize(
            &fx.instructions,
            &fx.session,
            ScriptedClient::content("def f(): pass"),
        )
        .unwrap();

        let out = conv.ask("write f").await.unwrap();
        assert_eq!(out, "def f(): pass");
        assert_eq!(conv.last_response(), "def f(): pass");

        let turns = conv.log().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("write f"));
        assert_eq!(turns[2], Turn::assistant("def f(): pass"));

        // Persisted
        assert_eq!(session::load(&fx.session).unwrap(), *conv.log());
    }

    #[tokio::test]
    async fn test_ask_sends_context_but_logs_raw_prompt() {
        let fx = fixture();
        let mut conv = Conversation::initialize(
            &fx.instructions,
            &fx.session,
            ScriptedClient::content("ok"),
        )
        .unwrap();
        conv.set_file_context("import os");
        conv.ask("add main").await.unwrap();

        let sent = conv.client.last_request();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1], Turn::user("import os add main"));
        assert_eq!(conv.log().turns()[1], Turn::user("add main"));
    }

    #[tokio::test]
    async fn test_ask_without_context_trims() {
        let fx = fixture();
        let mut conv = Conversation::initialize(
            &fx.instructions,
            &fx.session,
            ScriptedClient::content("ok"),
        )
        .unwrap();
        conv.set_file_context("");
        conv.ask("  hi ").await.unwrap();
        assert_eq!(conv.client.last_request()[1].content, "hi");
    }

    #[tokio::test]
    async fn test_ask_failures_leave_log_unchanged() {
        for kind in [EmptyCompletion::NoChoices, EmptyCompletion::NoMessage, EmptyCompletion::NoContent] {
            let fx = fixture();
            let mut conv = Conversation::initialize(
                &fx.instructions,
                &fx.session,
                ScriptedClient::replying([Reply::Empty(kind)]),
            )
            .unwrap();

            let err = conv.ask("anything").await.unwrap_err();
            assert_eq!(err.empty_kind(), Some(kind));
            assert_eq!(conv.log().len(), 1);
            assert_eq!(conv.last_response(), "");
            assert!(!session::exists(&fx.session), "nothing persisted on failure");
        }
    }

    #[tokio::test]
    async fn test_ask_rolls_back_when_persist_fails() {
        let fx = fixture();
        // A regular file where the session's parent directory should be
        let blocker = fx.session.with_file_name("blocker");
        std::fs::write(&blocker, "").unwrap();
        let session_path = blocker.join("history.json");

        let mut conv = Conversation::initialize(
            &fx.instructions,
            &session_path,
            ScriptedClient::content("lost"),
        )
        .unwrap();
        let err = conv.ask("p").await.unwrap_err();
        assert!(matches!(err, AskError::Session(SessionError::Io { .. })));
        assert_eq!(conv.log().len(), 1);
        assert_eq!(conv.last_response(), "");
    }

    #[tokio::test]
    async fn test_successive_asks_alternate() {
        let fx = fixture();
        let mut conv = Conversation::initialize(
            &fx.instructions,
            &fx.session,
            ScriptedClient::replying([Reply::Content("one".into()), Reply::Content("two".into())]),
        )
        .unwrap();
        conv.ask("first").await.unwrap();
        conv.ask("second").await.unwrap();

        let roles: Vec<Role> = conv.log().turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        // The second request carries the whole history
        assert_eq!(conv.client.last_request().len(), 4);
    }

    #[tokio::test]
    async fn test_write_last_response_and_load_context() {
        let fx = fixture();
        let ctx = fx.session.with_file_name("ctx.py");
        std::fs::write(&ctx, "x = 1").unwrap();

        let mut conv = Conversation::initialize(
            &fx.instructions,
            &fx.session,
            ScriptedClient::content("x = 2"),
        )
        .unwrap();
        conv.load_file_context(&ctx).unwrap();
        conv.ask("bump").await.unwrap();
        assert_eq!(conv.client.last_request()[1].content, "x = 1 bump");

        let out = fx.session.with_file_name("out.py");
        conv.write_last_response(&out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "x = 2");
    }
}
