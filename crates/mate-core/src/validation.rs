//! Validation for TaskMate configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for AppConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.storage.tasks_path.as_os_str().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "storage.tasks_path.empty",
                message: "tasks_path must not be empty".to_string(),
            });
        }

        if self.storage.checkpoint_path.as_os_str().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "storage.checkpoint_path.empty",
                message: "checkpoint_path must not be empty".to_string(),
            });
        }

        if self.web.bind.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "web.bind.empty",
                message: "web bind address must not be empty".to_string(),
            });
        } else if self.web.bind.parse::<SocketAddr>().is_err() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "web.bind.invalid",
                message: format!("web bind address '{}' is not host:port", self.web.bind),
            });
        }

        issues
    }
}
