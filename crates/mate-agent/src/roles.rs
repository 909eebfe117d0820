//! Reasoning role names shared by the dispatch layer and the relay.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Routing role; its assistant text never becomes the final answer.
    Supervisor,
    Planner,
    TaskManager,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Supervisor => "supervisor",
            AgentRole::Planner => "planner",
            AgentRole::TaskManager => "task_manager",
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "supervisor" => Ok(AgentRole::Supervisor),
            "planner" => Ok(AgentRole::Planner),
            "task_manager" => Ok(AgentRole::TaskManager),
            other => Err(format!(
                "invalid agent role '{other}'. valid values: supervisor, planner, task_manager"
            )),
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `name` identifies the supervisory routing role. Substring and
/// case-insensitive because dispatch frameworks decorate the bare role name.
pub fn is_routing_name(name: &str) -> bool {
    name.to_lowercase().contains(AgentRole::Supervisor.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        assert_eq!(AgentRole::TaskManager.as_str(), "task_manager");
        assert_eq!("planner".parse::<AgentRole>(), Ok(AgentRole::Planner));
        assert!("manager".parse::<AgentRole>().is_err());
    }

    #[test]
    fn routing_name_matches_decorated_supervisor() {
        assert!(is_routing_name("supervisor"));
        assert!(is_routing_name("Graph Supervisor"));
        assert!(!is_routing_name("planner"));
        assert!(!is_routing_name("task_manager"));
    }
}
