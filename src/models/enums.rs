use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid enum value for {field}: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(ConfidenceLevel {
    High => "high",
    Medium => "medium",
    Low => "low",
});

impl ConfidenceLevel {
    /// Case-insensitive match against the three levels. Anything else is `None`;
    /// callers decide whether that is a rejection.
    pub fn parse_loose(s: &str) -> Option<Self> {
        s.trim().to_ascii_lowercase().parse().ok()
    }
}

str_enum!(ReviewStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});

str_enum!(ExemptionCategory {
    AttorneyClient => "attorney_client",
    Personnel => "personnel",
    Deliberative => "deliberative",
});

impl ExemptionCategory {
    /// Fixed order used for prompts, merge and logs.
    pub fn all() -> &'static [ExemptionCategory] {
        &[Self::AttorneyClient, Self::Personnel, Self::Deliberative]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AttorneyClient => "Attorney-Client",
            Self::Personnel => "Personnel",
            Self::Deliberative => "Deliberative",
        }
    }

    /// Justification used when the category applies but no model reasoning exists.
    pub fn default_justification(&self) -> &'static str {
        match self {
            Self::AttorneyClient => "Attorney-client privilege applies",
            Self::Personnel => "Personnel records exemption applies",
            Self::Deliberative => "Deliberative process exemption applies",
        }
    }
}
