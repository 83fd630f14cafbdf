use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

pub const PROBIOT: &str = "probiot";
pub const W3A: &str = "w3a";
pub const LEO: &str = "leo";
pub const GROOT: &str = "groot";
pub const NERVOZNYAK: &str = "nervoznyak";

/// Which assistant configuration the backend should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentType {
    Probiot,
    W3a,
    Leo,
    Groot,
    Nervoznyak,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::Probiot,
        AgentType::W3a,
        AgentType::Leo,
        AgentType::Groot,
        AgentType::Nervoznyak,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AgentType::Probiot => PROBIOT,
            AgentType::W3a => W3A,
            AgentType::Leo => LEO,
            AgentType::Groot => GROOT,
            AgentType::Nervoznyak => NERVOZNYAK,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            PROBIOT => Ok(AgentType::Probiot),
            W3A => Ok(AgentType::W3a),
            LEO => Ok(AgentType::Leo),
            GROOT => Ok(AgentType::Groot),
            NERVOZNYAK => Ok(AgentType::Nervoznyak),
            _ => Err(ConfigError::UnknownAgent(s.to_string())),
        }
    }
}

pub fn resolve_agent_variant(raw: &str) -> Result<AgentType, ConfigError> {
    raw.parse()
}
