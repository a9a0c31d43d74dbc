//! Client state owned by a single controller: session, transcript, form and
//! status. Every mutation goes through `AppState` on the controlling task.

use crate::input::InputBuffer;
use crate::render;
use crate::stream::StreamError;
use crate::transcript::{Entry, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Connecting,
    Ready,
    Failed,
    Thinking,
}

impl Status {
    pub fn text(self) -> &'static str {
        match self {
            Status::Connecting => "Connecting…",
            Status::Ready => "Agent ready",
            Status::Failed => "Session failed",
            Status::Thinking => "Thinking…",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Prompt,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormElement {
    pub kind: ElementKind,
    pub disabled: bool,
}

/// Prompt editor plus submit control, disabled as a unit.
#[derive(Debug, Default)]
pub struct Form {
    prompt: InputBuffer,
    disabled: bool,
}

impl Form {
    pub fn elements(&self) -> [FormElement; 2] {
        [
            FormElement {
                kind: ElementKind::Prompt,
                disabled: self.disabled,
            },
            FormElement {
                kind: ElementKind::Submit,
                disabled: self.disabled,
            },
        ]
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn prompt(&self) -> &InputBuffer {
        &self.prompt
    }

    /// `None` while disabled, so nothing can be typed mid-stream.
    pub fn prompt_mut(&mut self) -> Option<&mut InputBuffer> {
        if self.disabled {
            None
        } else {
            Some(&mut self.prompt)
        }
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}

/// An accepted prompt, ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug)]
pub struct AppState {
    session_id: Option<String>,
    engine: Option<String>,
    transcript: Transcript,
    status: Status,
    form: Form,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            session_id: None,
            engine: None,
            transcript: Transcript::new(),
            status: Status::Connecting,
            form: Form::default(),
        }
    }

    pub fn session_ready(&mut self, session_id: String, engine: Option<String>) {
        self.session_id = Some(session_id);
        self.engine = engine;
        self.status = Status::Ready;
    }

    pub fn session_failed(&mut self) {
        self.session_id = None;
        self.status = Status::Failed;
    }

    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_busy(&self) -> bool {
        self.form.is_disabled()
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Idle -> busy. Returns `None`, touching nothing, when the prompt is
    /// blank, there is no session, or a stream is already in flight.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.form.is_disabled() {
            return None;
        }
        let message = self.form.prompt.text().trim().to_string();
        if message.is_empty() {
            return None;
        }
        let session_id = self.session_id.clone()?;

        self.form.set_disabled(true);
        self.status = Status::Thinking;
        self.transcript.push(Entry::user(message.clone()));

        Some(Submission {
            session_id,
            message,
        })
    }

    pub fn apply(&mut self, entry: Entry) {
        self.transcript.push(entry);
    }

    /// Busy -> idle, recording a failure entry first when the stream failed.
    pub fn settle(&mut self, outcome: &Result<(), StreamError>) {
        match outcome {
            Ok(()) => tracing::debug!("submission completed"),
            Err(err) => {
                tracing::warn!(%err, "submission failed");
                self.transcript.push(Entry::failure(&err.to_string()));
            }
        }
        self.form.prompt.clear();
        self.form.set_disabled(false);
        self.status = Status::Ready;
    }

    pub fn render_html(&self) -> String {
        render::render_transcript(self.transcript.entries())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    fn ready_with_prompt(text: &str) -> AppState {
        let mut state = AppState::new();
        state.session_ready("session-1".into(), None);
        state.form_mut().prompt_mut().unwrap().set_text(text);
        state
    }

    #[test]
    fn starts_connecting_with_placeholder() {
        let state = AppState::new();
        assert_eq!(state.status().text(), "Connecting…");
        assert_eq!(state.render_html(), render::EMPTY_PLACEHOLDER);
    }

    #[test]
    fn submit_moves_to_busy_and_appends_user_turn() {
        let mut state = ready_with_prompt("  build a parser \n");
        let submission = state.submit().unwrap();

        assert_eq!(submission.session_id, "session-1");
        assert_eq!(submission.message, "build a parser");
        assert_eq!(state.status(), Status::Thinking);
        assert_eq!(state.transcript().entries(), [Entry::user("build a parser")]);
    }

    #[test]
    fn every_form_element_is_disabled_while_in_flight() {
        let mut state = ready_with_prompt("hello");
        state.submit().unwrap();

        assert!(state.is_busy());
        assert!(state.form().elements().iter().all(|e| e.disabled));
        assert!(state.form_mut().prompt_mut().is_none());
        assert_eq!(state.submit(), None);
        assert_eq!(state.transcript().len(), 1);
    }

    #[test]
    fn blank_prompt_is_ignored() {
        let mut state = ready_with_prompt("  \n\t ");
        assert_eq!(state.submit(), None);
        assert!(state.transcript().is_empty());
        assert!(!state.is_busy());
        assert_eq!(state.status(), Status::Ready);
    }

    #[test]
    fn submit_without_session_is_silently_ignored() {
        let mut state = AppState::new();
        state.session_failed();
        state.form_mut().prompt_mut().unwrap().set_text("hello");

        assert_eq!(state.submit(), None);
        assert!(state.transcript().is_empty());
        assert_eq!(state.status().text(), "Session failed");
        assert_eq!(state.form().prompt().text(), "hello");
    }

    #[test]
    fn success_returns_to_idle_and_clears_prompt() {
        let mut state = ready_with_prompt("hello");
        state.submit().unwrap();
        state.apply(Entry::assistant("plan", "planner"));
        state.apply(Entry::assistant("done", "summary"));
        state.settle(&Ok(()));

        assert!(!state.is_busy());
        assert!(state.form().elements().iter().all(|e| !e.disabled));
        assert!(state.form().prompt().is_empty());
        assert_eq!(state.status().text(), "Agent ready");
        assert_eq!(state.transcript().len(), 3);
    }

    #[test]
    fn failure_appends_error_entry_then_idles() {
        let mut state = ready_with_prompt("hello");
        state.submit().unwrap();
        state.settle(&Err(StreamError::Interrupted));

        let last = state.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Agent failed: Stream interrupted");
        assert_eq!(last.label(), "Agent · Error");
        assert!(state.form().prompt().is_empty());
        assert!(!state.is_busy());
    }

    #[test]
    fn agent_error_message_is_carried_into_the_entry() {
        let mut state = ready_with_prompt("hello");
        state.submit().unwrap();
        state.settle(&Err(StreamError::Agent("quota exceeded".into())));

        assert_eq!(
            state.transcript().last().map(|e| e.content.as_str()),
            Some("Agent failed: quota exceeded")
        );
        assert!(state.render_html().contains("<h3>Agent · Error</h3>"));
    }
}
