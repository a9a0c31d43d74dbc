use crate::protocol::{STAGE_COMPLETE, STAGE_ERROR, StagePayload};

pub const STAGE_SUMMARY: &str = "summary";
pub const STAGE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One rendered turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub role: Role,
    pub content: String,
    pub stage: Option<String>,
}

impl Entry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            stage: None,
        }
    }

    pub fn assistant(content: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            stage: Some(stage.into()),
        }
    }

    pub fn from_payload(payload: StagePayload) -> Self {
        let stage = display_stage(payload.stage.as_deref());
        Self::assistant(payload.content, stage)
    }

    pub fn failure(message: &str) -> Self {
        Self::assistant(format!("Agent failed: {}", message), STAGE_ERROR)
    }

    pub fn label(&self) -> &'static str {
        match self.role {
            Role::User => "You",
            Role::Assistant => stage_label(self.stage.as_deref()),
        }
    }
}

/// Maps a wire stage to the stage shown in the transcript.
pub fn display_stage(stage: Option<&str>) -> &str {
    match stage {
        Some(STAGE_COMPLETE) => STAGE_SUMMARY,
        None | Some("") => STAGE_ASSISTANT,
        Some(other) => other,
    }
}

pub fn stage_label(stage: Option<&str>) -> &'static str {
    match stage {
        Some("planner") => "Agent · Planner",
        Some("coder") => "Agent · Coder",
        Some("reviewer") => "Agent · Reviewer",
        Some(STAGE_SUMMARY) => "Agent · Summary",
        Some(STAGE_ERROR) => "Agent · Error",
        _ => "Agent",
    }
}

/// Append-only, insertion-ordered list of entries.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }
}
