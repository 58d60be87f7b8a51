use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

use crate::model::{EntityKey, Snapshot, ViewState};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("data fetch failed: {0}")]
    DataFetch(String),
    #[error("log fetch failed: {0}")]
    LogFetch(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("export failed: {0}")]
    Export(String),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct LogTarget {
    pub entity: EntityKey,
    pub container: Option<String>,
}

impl LogTarget {
    pub fn label(&self) -> String {
        match &self.container {
            Some(container) => format!("{} [{container}]", self.entity.id),
            None => self.entity.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LogRequest {
    pub target: LogTarget,
    pub generation: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandInvocation {
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ActionKind {
    Describe(EntityKey),
    Yaml(EntityKey),
    Command(CommandInvocation),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ActionRequest {
    pub request_id: u64,
    pub title: String,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub view: ViewState,
    pub rows: serde_json::Value,
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_snapshot(&self) -> Result<Snapshot, CoreError>;

    async fn force_refresh(&self) -> Result<(), CoreError>;
}

#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_log(&self, target: &LogTarget, tail_lines: i64) -> Result<String, CoreError>;
}

#[async_trait]
pub trait ResourceInspector: Send + Sync {
    async fn describe(&self, key: &EntityKey) -> Result<String, CoreError>;

    async fn yaml(&self, key: &EntityKey) -> Result<String, CoreError>;

    /// Whether `describe` can work in this environment.
    fn supports_describe(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &CommandInvocation) -> Result<String, CoreError>;
}

/// Optional operations the configured collaborators support, probed once.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Capabilities {
    pub describe: bool,
    pub yaml: bool,
    pub commands: bool,
}

impl Capabilities {
    pub fn supports(&self, kind: &ActionKind) -> bool {
        match kind {
            ActionKind::Describe(_) => self.describe,
            ActionKind::Yaml(_) => self.yaml,
            ActionKind::Command(_) => self.commands,
        }
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub data: Arc<dyn DataProvider>,
    pub logs: Arc<dyn LogSource>,
    pub inspector: Option<Arc<dyn ResourceInspector>>,
    pub commands: Option<Arc<dyn CommandRunner>>,
}

impl Collaborators {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            describe: self
                .inspector
                .as_ref()
                .is_some_and(|inspector| inspector.supports_describe()),
            yaml: self.inspector.is_some(),
            commands: self.commands.is_some(),
        }
    }

    pub async fn run_action(&self, kind: &ActionKind) -> Result<String, CoreError> {
        match kind {
            ActionKind::Describe(key) => match &self.inspector {
                Some(inspector) if inspector.supports_describe() => inspector.describe(key).await,
                _ => Err(CoreError::UnsupportedOperation(format!("describe {key}"))),
            },
            ActionKind::Yaml(key) => match &self.inspector {
                Some(inspector) => inspector.yaml(key).await,
                None => Err(CoreError::UnsupportedOperation(format!("yaml {key}"))),
            },
            ActionKind::Command(invocation) => match &self.commands {
                Some(runner) => runner.run(invocation).await,
                None => Err(CoreError::UnsupportedOperation(invocation.display())),
            },
        }
    }
}

pub fn export_file_name(view: ViewState, at: DateTime<Utc>) -> String {
    format!(
        "vcdash-{}-{}.json",
        view.title().to_ascii_lowercase(),
        at.format("%Y%m%d-%H%M%S")
    )
}

pub fn write_export(
    request: &ExportRequest,
    dir: &Path,
    at: DateTime<Utc>,
) -> Result<PathBuf, CoreError> {
    let path = dir.join(export_file_name(request.view, at));
    let body = serde_json::to_string_pretty(&request.rows)
        .map_err(|err| CoreError::Export(err.to_string()))?;
    std::fs::write(&path, body)
        .map_err(|err| CoreError::Export(format!("{}: {err}", path.display())))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{
        ActionKind, Capabilities, Collaborators, CommandInvocation, CoreError, DataProvider,
        ExportRequest, LogSource, LogTarget, ResourceInspector, export_file_name, write_export,
    };
    use crate::model::{EntityKey, Snapshot, ViewState};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::{sync::Arc, time::Duration};

    struct StaticData;

    #[async_trait]
    impl DataProvider for StaticData {
        async fn get_snapshot(&self) -> Result<Snapshot, CoreError> {
            Ok(Snapshot::default())
        }

        async fn force_refresh(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[async_trait]
    impl LogSource for StaticData {
        async fn fetch_log(&self, target: &LogTarget, _: i64) -> Result<String, CoreError> {
            Ok(target.label())
        }
    }

    struct YamlOnly;

    #[async_trait]
    impl ResourceInspector for YamlOnly {
        async fn describe(&self, _: &EntityKey) -> Result<String, CoreError> {
            Ok(String::new())
        }

        async fn yaml(&self, key: &EntityKey) -> Result<String, CoreError> {
            Ok(format!("name: {}", key.name()))
        }

        fn supports_describe(&self) -> bool {
            false
        }
    }

    fn collaborators(inspector: bool) -> Collaborators {
        Collaborators {
            data: Arc::new(StaticData),
            logs: Arc::new(StaticData),
            inspector: inspector.then(|| Arc::new(YamlOnly) as Arc<dyn ResourceInspector>),
            commands: None,
        }
    }

    #[test]
    fn capabilities_reflect_configured_collaborators() {
        assert_eq!(collaborators(false).capabilities(), Capabilities::default());
        assert_eq!(
            collaborators(true).capabilities(),
            Capabilities {
                describe: false,
                yaml: true,
                commands: false,
            }
        );
    }

    #[tokio::test]
    async fn missing_capability_yields_unsupported_operation() {
        let collaborators = collaborators(true);
        let key = EntityKey::pod("ml", "trainer");

        let yaml = collaborators.run_action(&ActionKind::Yaml(key.clone())).await;
        assert_eq!(yaml, Ok("name: trainer".to_string()));

        let describe = collaborators.run_action(&ActionKind::Describe(key)).await;
        assert!(matches!(describe, Err(CoreError::UnsupportedOperation(_))));

        let command = collaborators
            .run_action(&ActionKind::Command(CommandInvocation {
                program: "echo".to_string(),
                args: vec!["hi".to_string()],
                timeout: Duration::from_secs(1),
            }))
            .await;
        assert_eq!(
            command,
            Err(CoreError::UnsupportedOperation("echo hi".to_string()))
        );
    }

    #[test]
    fn export_writes_pretty_json_named_after_view() {
        let at = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 5, 7)
            .single()
            .unwrap_or_default();
        assert_eq!(
            export_file_name(ViewState::Pods, at),
            "vcdash-pods-20260301-090507.json"
        );

        let dir = std::env::temp_dir().join(format!("vcdash-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let request = ExportRequest {
            view: ViewState::Nodes,
            rows: serde_json::json!([{ "name": "node-a" }]),
        };
        let path = write_export(&request, &dir, at).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"name\": \"node-a\""));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
