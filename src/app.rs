use tokio::task::JoinHandle;

use crate::history::{ChatMessage, FileStore, HistoryStore, Role};
use crate::ollama::{BackendError, OllamaClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub cursor: usize, // char index into input
    pub loading: bool,
    pub turn: Option<JoinHandle<Result<String, BackendError>>>,

    // Scroll state
    pub scroll: u16,
    pub chat_height: u16, // inner chat area, updated during render
    pub total_lines: u16,
    pub stick_to_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend
    pub ollama: OllamaClient,
    pub model: String,
    pub store: FileStore,
}

impl App {
    pub fn new(ollama: OllamaClient, model: String, store: FileStore) -> Self {
        let messages = store.load();
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            messages,
            input: String::new(),
            cursor: 0,
            loading: false,
            turn: None,
            scroll: 0,
            chat_height: 0,
            total_lines: 0,
            stick_to_bottom: true,
            animation_frame: 0,
            ollama,
            model,
            store,
        }
    }

    /// Submit the current input as a new turn. Refused while a turn is
    /// already in flight or when the input is blank.
    pub fn submit(&mut self) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() || self.turn.is_some() {
            return;
        }

        self.messages.push(ChatMessage::user(prompt.clone()));
        self.persist();

        self.input.clear();
        self.cursor = 0;
        self.loading = true;
        self.stick_to_bottom = true;

        let ollama = self.ollama.clone();
        let model = self.model.clone();
        self.turn = Some(tokio::spawn(async move {
            ollama.generate(&model, &prompt).await
        }));
    }

    /// Called on every tick: if the in-flight turn finished, fold its result
    /// into the transcript. A backend failure becomes an assistant message
    /// carrying the error text rather than an error surfaced to the render
    /// path.
    pub async fn poll_turn(&mut self) {
        let finished = matches!(&self.turn, Some(task) if task.is_finished());
        if !finished {
            return;
        }

        let Some(task) = self.turn.take() else {
            return;
        };
        let message = match task.await {
            Ok(Ok(response)) => ChatMessage::assistant(response),
            Ok(Err(err)) => ChatMessage::assistant(format!("An error occurred: {err}")),
            Err(err) => ChatMessage::assistant(format!("An error occurred: {err}")),
        };

        self.messages.push(message);
        self.loading = false;
        self.stick_to_bottom = true;
        self.persist();
    }

    /// Toggle the thinking section on the most recent assistant message that
    /// has one.
    pub fn toggle_thinking(&mut self) {
        if let Some(msg) = self
            .messages
            .iter_mut()
            .rev()
            .find(|msg| msg.role == Role::Assistant && msg.has_thinking())
        {
            msg.thinking_visible = !msg.thinking_visible;
            self.stick_to_bottom = true;
        }
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
        self.scroll = 0;
        self.stick_to_bottom = true;
        self.store.clear();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.messages) {
            tracing::warn!(%err, "failed to save chat history");
        }
    }

    // Scrolling

    pub fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_sub(amount);
        self.stick_to_bottom = false;
    }

    pub fn scroll_down(&mut self, amount: u16) {
        self.scroll = (self.scroll + amount).min(self.max_scroll());
        self.stick_to_bottom = self.scroll == self.max_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.stick_to_bottom = true;
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn app_in(dir: &tempfile::TempDir) -> App {
        App::new(
            OllamaClient::new("http://127.0.0.1:9"),
            "test-model".to_string(),
            FileStore::new(dir.path().join("history.json")),
        )
    }

    #[tokio::test]
    async fn test_submit_pushes_user_message_and_spawns_turn() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.input = "  2+2?  ".to_string();
        app.submit();

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, Role::User);
        assert_eq!(app.messages[0].visible, "2+2?");
        assert!(app.loading);
        assert!(app.turn.is_some());
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.input = "   ".to_string();
        app.submit();

        assert!(app.messages.is_empty());
        assert!(app.turn.is_none());
    }

    #[tokio::test]
    async fn test_second_submit_refused_while_turn_pending() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.input = "first".to_string();
        app.submit();
        app.input = "second".to_string();
        app.submit();

        // Only the first prompt made it into the transcript.
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].visible, "first");
    }

    #[tokio::test]
    async fn test_failed_turn_becomes_error_message() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        // Client points at the discard port, so the turn fails fast.
        app.input = "hello".to_string();
        app.submit();

        let task = app.turn.as_ref().unwrap();
        while !task.is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        app.poll_turn().await;

        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, Role::Assistant);
        assert!(app.messages[1].visible.starts_with("An error occurred:"));
        assert!(!app.loading);
        assert!(app.turn.is_none());
    }

    #[tokio::test]
    async fn test_toggle_thinking_targets_latest_assistant_message() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.messages
            .push(ChatMessage::assistant("<think>a</think>one"));
        app.messages.push(ChatMessage::assistant("plain answer"));
        app.messages
            .push(ChatMessage::assistant("<think>b</think>two"));

        app.toggle_thinking();
        assert!(app.messages[2].thinking_visible);
        assert!(!app.messages[0].thinking_visible);

        app.toggle_thinking();
        assert!(!app.messages[2].thinking_visible);
    }

    #[tokio::test]
    async fn test_clear_history_empties_store() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.messages.push(ChatMessage::user("hi"));
        app.store.save(&app.messages).unwrap();
        app.clear_history();

        assert!(app.messages.is_empty());
        assert!(app.store.load().is_empty());
    }
}
