use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreateResponse {
    pub session_id: String,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub available_engines: Vec<String>,
}

/// One `data:` frame of the agent stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePayload {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

impl StagePayload {
    #[cfg(test)]
    pub fn new(stage: &str, content: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.to_string()),
            content: content.into(),
            headline: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage.as_deref() == Some(STAGE_COMPLETE)
    }

    pub fn is_error(&self) -> bool {
        self.stage.as_deref() == Some(STAGE_ERROR)
    }
}

pub const STAGE_COMPLETE: &str = "complete";
pub const STAGE_ERROR: &str = "error";
