//! WorkflowDescription - workflow type の登録情報

use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_task_list: Option<String>,
    #[serde(default)]
    pub default_task_priority: i32,
    /// Seconds.
    #[serde(default)]
    pub default_execution_start_to_close_timeout: Option<u64>,
    /// Seconds.
    #[serde(default)]
    pub default_task_start_to_close_timeout: Option<u64>,
    #[serde(default)]
    pub default_child_policy: Option<String>,
}

impl WorkflowDescription {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            default_task_list: None,
            default_task_priority: 0,
            default_execution_start_to_close_timeout: None,
            default_task_start_to_close_timeout: None,
            default_child_policy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.default_task_list = Some(task_list.into());
        self
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if self.version.trim().is_empty() {
            return Err(DefinitionError::EmptyVersion(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_version_are_required() {
        assert!(WorkflowDescription::new("Transcode", "1.0").validate().is_ok());
        assert!(matches!(
            WorkflowDescription::new("", "1.0").validate(),
            Err(DefinitionError::EmptyName)
        ));
        assert!(matches!(
            WorkflowDescription::new("Transcode", "  ").validate(),
            Err(DefinitionError::EmptyVersion(name)) if name == "Transcode"
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let description: WorkflowDescription = serde_json::from_str(
            r#"{ "name": "Transcode", "version": "2.0", "default_task_list": "media" }"#,
        )
        .unwrap();
        assert_eq!(description.default_task_list.as_deref(), Some("media"));
        assert_eq!(description.default_task_priority, 0);
        assert!(description.description.is_none());
    }
}
