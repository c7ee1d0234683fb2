use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::id_string;
use super::time;
use super::validate::ValidationError;

/// Id of the synthesized default primary agent.
pub const PRIMARY_AGENT_ID: &str = "openclaw-primary";
pub const PRIMARY_AGENT_NAME: &str = "OpenClaw";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Primary,
    Subagent,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Subagent => "subagent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "subagent" => Some(Self::Subagent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Idle,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "idle" => Some(Self::Idle),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentType,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub last_active: NaiveDateTime,
}

impl Agent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(())
    }

    /// The default primary agent, synthesized when a registry snapshot
    /// carries none. Exactly one primary must exist after every load.
    pub fn default_primary(now: NaiveDateTime) -> Self {
        Self {
            id: PRIMARY_AGENT_ID.to_string(),
            name: PRIMARY_AGENT_NAME.to_string(),
            kind: AgentType::Primary,
            status: AgentStatus::Active,
            capabilities: vec![
                "task-management".to_string(),
                "code-generation".to_string(),
                "research".to_string(),
                "analysis".to_string(),
            ],
            last_active: now,
        }
    }
}

/// Caller input for registering a subagent.
#[derive(Debug, Clone, Default)]
pub struct AgentDraft {
    pub name: String,
    pub status: Option<AgentStatus>,
    pub capabilities: Vec<String>,
}

/// Partial agent update, shallow-merged.
#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub status: Option<AgentStatus>,
    pub capabilities: Option<Vec<String>>,
    pub last_active: Option<NaiveDateTime>,
}

/// Agent as it appears in the registry snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAgent {
    pub id: Option<Value>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub last_active: Option<String>,
}

impl RawAgent {
    pub fn normalize(self, now: NaiveDateTime) -> Result<Agent, ValidationError> {
        let id = self
            .id
            .as_ref()
            .and_then(id_string)
            .ok_or(ValidationError::MissingField("id"))?;

        let kind = match self.kind.as_deref() {
            None | Some("") => AgentType::Subagent,
            Some(k) => {
                AgentType::parse(k).ok_or_else(|| ValidationError::UnknownAgentType(k.to_string()))?
            }
        };
        let status = match self.status.as_deref() {
            None | Some("") => AgentStatus::Idle,
            Some(s) => {
                AgentStatus::parse(s).ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))?
            }
        };

        let agent = Agent {
            id,
            name: self.name.unwrap_or_default(),
            kind,
            status,
            capabilities: self.capabilities.unwrap_or_default(),
            last_active: self
                .last_active
                .as_deref()
                .and_then(time::parse_instant)
                .unwrap_or(now),
        };
        agent.validate()?;
        Ok(agent)
    }
}
