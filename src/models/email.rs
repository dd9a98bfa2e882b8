use serde::{Deserialize, Serialize};

/// An email as handed over by the parsing collaborator.
///
/// `display_text` is sent to the model verbatim; nothing here re-parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub display_text: String,
}

impl Email {
    pub fn new(message_id: Option<&str>, display_text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.map(str::to_string),
            subject: None,
            display_text: display_text.into(),
        }
    }
}

/// Session-wide document identity.
///
/// Produced only by [`EmailId::assign`], so every map in a session is keyed
/// by the same scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(String);

impl EmailId {
    /// The trimmed message id when present and non-empty, else `email_{ordinal}`
    /// where `ordinal` is the zero-based processing position.
    pub fn assign(email: &Email, ordinal: usize) -> Self {
        match email.message_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Self(id.to_string()),
            _ => Self(format!("email_{ordinal}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl From<&str> for EmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
