//! Permission domain entities
//!
//! Only "always" decisions are remembered. One-shot answers apply to the
//! call that asked and are forgotten immediately.

use serde::{Deserialize, Serialize};

/// Key of a remembered decision: one tool on one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub server: String,
    pub tool: String,
}

impl PermissionKey {
    pub fn new(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
        }
    }

    /// Stable textual form `server/tool`.
    ///
    /// Server names never contain `/`, so the first `/` splits the key.
    pub fn encode(&self) -> String {
        format!("{}/{}", self.server, self.tool)
    }

    pub fn decode(encoded: &str) -> Option<Self> {
        let (server, tool) = encoded.split_once('/')?;
        if server.is_empty() || tool.is_empty() {
            return None;
        }
        Some(Self::new(server, tool))
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.server, self.tool)
    }
}

/// A remembered decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    AllowAlways,
    RejectAlways,
}

impl PermissionDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowAlways => "allow_always",
            Self::RejectAlways => "reject_always",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "allow_always" => Some(Self::AllowAlways),
            "reject_always" => Some(Self::RejectAlways),
            _ => None,
        }
    }

    pub fn allows(self) -> bool {
        matches!(self, Self::AllowAlways)
    }
}

impl std::fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remembered decision with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub server_name: String,
    pub tool_name: String,
    pub decision: PermissionDecision,
}

impl PermissionRecord {
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.server_name, &self.tool_name)
    }
}

/// An option offered to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOption {
    AllowOnce,
    AllowAlways,
    RejectOnce,
    RejectAlways,
}

impl PermissionOption {
    /// The four options, in the order they are presented.
    pub const ALL: [PermissionOption; 4] = [
        Self::AllowOnce,
        Self::AllowAlways,
        Self::RejectOnce,
        Self::RejectAlways,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::AllowOnce => "Allow once",
            Self::AllowAlways => "Always allow",
            Self::RejectOnce => "Reject once",
            Self::RejectAlways => "Always reject",
        }
    }
}

/// What the arbiter answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Selected(PermissionOption),
    /// The request was withdrawn before an answer
    Cancelled,
}

impl PermissionOutcome {
    pub fn allows(self) -> bool {
        matches!(
            self,
            Self::Selected(PermissionOption::AllowOnce | PermissionOption::AllowAlways)
        )
    }

    /// The decision to remember, if any.
    pub fn remembered(self) -> Option<PermissionDecision> {
        match self {
            Self::Selected(PermissionOption::AllowAlways) => Some(PermissionDecision::AllowAlways),
            Self::Selected(PermissionOption::RejectAlways) => Some(PermissionDecision::RejectAlways),
            _ => None,
        }
    }
}

/// Gate-wide policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Consult the store, then ask
    #[default]
    Ask,
    /// Allow everything without asking
    AllowAll,
    /// Deny everything without asking
    DenyAll,
}

/// Where a gate decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Store,
    Arbiter,
    Policy,
    Cancelled,
    ArbiterError,
}

/// The gate's verdict for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allow: bool,
    /// Decision was persisted as an "always" rule
    pub remember: bool,
    pub source: DecisionSource,
}

impl GateDecision {
    pub fn from_store(decision: PermissionDecision) -> Self {
        Self {
            allow: decision.allows(),
            remember: true,
            source: DecisionSource::Store,
        }
    }

    pub fn denied(source: DecisionSource) -> Self {
        Self {
            allow: false,
            remember: false,
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.source == DecisionSource::Cancelled
    }
}
