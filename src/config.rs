use crate::model::{EntityKey, EntityKind};
use crate::provider::CommandInvocation;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::warn;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CustomAction {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub description: String,
    /// Empty means every kind.
    pub kinds: Vec<EntityKind>,
    pub timeout_secs: u64,
}

impl CustomAction {
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn invocation(&self, key: &EntityKey) -> CommandInvocation {
        let namespace = key.namespace().unwrap_or("");
        let substitute = |raw: &str| {
            raw.replace("{namespace}", namespace)
                .replace("{name}", key.name())
                .replace("{kind}", key.kind.kubectl_resource())
        };
        CommandInvocation {
            program: substitute(&self.command),
            args: self.args.iter().map(|arg| substitute(arg)).collect(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigSnapshot {
    pub source: Option<String>,
    pub actions: Vec<CustomAction>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct VcdashConfigFile {
    #[serde(default)]
    actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ActionSpec {
    name: String,
    #[serde(default, alias = "cmd", alias = "run")]
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    kinds: Vec<String>,
    #[serde(
        default = "default_action_timeout_secs",
        alias = "timeout",
        alias = "timeout_s"
    )]
    timeout_secs: u64,
}

impl RuntimeConfigWatcher {
    pub fn discover() -> Self {
        Self::with_path(discover_config_path())
    }

    pub fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<RuntimeConfigSnapshot> {
        let Some(path) = self.path.clone() else {
            return Ok(RuntimeConfigSnapshot::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read runtime config {}", path.display()))?;
        let actions = parse_actions(&raw)
            .with_context(|| format!("failed to parse runtime config {}", path.display()))?;
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());

        Ok(RuntimeConfigSnapshot {
            source: Some(path.display().to_string()),
            actions,
        })
    }

    pub fn reload_if_changed(&mut self) -> Result<Option<RuntimeConfigSnapshot>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(RuntimeConfigSnapshot::default()));
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn parse_actions(raw: &str) -> Result<Vec<CustomAction>> {
    let parsed: VcdashConfigFile = if raw.trim().is_empty() {
        VcdashConfigFile::default()
    } else {
        serde_yaml::from_str(raw)?
    };

    let actions = parsed
        .actions
        .into_iter()
        .filter(|spec| {
            let usable = !spec.name.trim().is_empty() && !spec.command.trim().is_empty();
            if !usable {
                warn!(name = %spec.name, "skipping action without name or command");
            }
            usable
        })
        .map(|spec| CustomAction {
            kinds: spec
                .kinds
                .iter()
                .filter_map(|token| {
                    let kind = EntityKind::from_token(token);
                    if kind.is_none() {
                        warn!(action = %spec.name, kind = %token, "unknown resource kind in action");
                    }
                    kind
                })
                .collect(),
            name: spec.name,
            command: spec.command,
            args: spec.args,
            description: spec.description,
            timeout_secs: spec.timeout_secs,
        })
        .collect();
    Ok(actions)
}

fn default_action_timeout_secs() -> u64 {
    20
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("VCDASH_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("vcdash.yaml"),
        PathBuf::from("vcdash.yml"),
        PathBuf::from(".vcdash.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/vcdash/config.yaml"),
            PathBuf::from(&home).join(".config/vcdash/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
