use serde::{Deserialize, Serialize};

/// A disclosure request. Position within a session's request list is the
/// request index used by analyses, overrides and final determinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpraRequest {
    pub text: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CpraRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_id: None,
            description: None,
        }
    }

    pub fn with_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl std::fmt::Display for CpraRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREVIEW: usize = 100;
        if self.text.chars().count() > PREVIEW {
            let head: String = self.text.chars().take(PREVIEW).collect();
            write!(f, "{head}...")
        } else {
            f.write_str(&self.text)
        }
    }
}
