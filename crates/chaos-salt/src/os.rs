use std::fmt;

use serde_json::Value;

/// Grain holding the operating system family of a minion.
pub const OS_GRAIN: &str = "kernel";

/// Operating system family as reported by the `kernel` grain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Windows,
    Unsupported(String),
}

impl OsFamily {
    pub fn from_grain(value: &Value) -> Self {
        match value {
            Value::String(s) if s == "Linux" => Self::Linux,
            Value::String(s) if s == "Windows" => Self::Windows,
            Value::String(s) => Self::Unsupported(s.clone()),
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn script_kind(&self) -> Option<ScriptKind> {
        match self {
            Self::Linux => Some(ScriptKind::Shell),
            Self::Windows => Some(ScriptKind::PowerShell),
            Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Windows => write!(f, "Windows"),
            Self::Unsupported(os) => write!(f, "{os}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Shell,
    PowerShell,
}

impl ScriptKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Shell => "sh",
            Self::PowerShell => "ps1",
        }
    }
}
