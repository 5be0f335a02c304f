//! Plan files: the caller-supplied list of items and their blockers.
//!
//! A plan is a list of `{id, blocked_by: [id...]}` records, optionally with a
//! display `title` and the shell `command` the CLI executor runs. The format
//! is picked from the file extension:
//!
//! | Extension        | Format |
//! |------------------|--------|
//! | `.json`          | JSON   |
//! | `.yaml` / `.yml` | YAML   |
//! | `.toml`          | TOML (`[[items]]` tables) |
//!
//! `blockedBy` is accepted as an alias for `blocked_by`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::SequencerConfig;
use crate::error::SequenceError;
use crate::model::item::BlockingEdge;
use crate::sequencer::Sequencer;

/// Serialization format of a plan file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
    Toml,
}

impl PlanFormat {
    /// Pick the format from a path's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or unsupported extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some(other) => bail!("unsupported plan extension '.{other}' for {}", path.display()),
            None => bail!("plan file {} has no extension", path.display()),
        }
    }
}

/// One work item as written in a plan file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, alias = "blockedBy")]
    pub blocked_by: Vec<String>,
}

impl PlanItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            command: None,
            blocked_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn blocked_by<I, S>(mut self, blockers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_by = blockers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Title if present, otherwise the id.
    #[must_use]
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// The full input to one sequencing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

impl Plan {
    #[must_use]
    pub const fn new(items: Vec<PlanItem>) -> Self {
        Self { items }
    }

    /// Parse plan text in the given format.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserializer error.
    pub fn parse(text: &str, format: PlanFormat) -> Result<Self> {
        let plan: Self = match format {
            PlanFormat::Json => serde_json::from_str(text)?,
            PlanFormat::Yaml => serde_yaml::from_str(text)?,
            PlanFormat::Toml => toml::from_str(text)?,
        };
        Ok(plan)
    }

    /// Item ids in file order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }

    /// One [`BlockingEdge`] per `blocked_by` entry, in file order.
    #[must_use]
    pub fn edges(&self) -> Vec<BlockingEdge> {
        self.items
            .iter()
            .flat_map(|item| {
                item.blocked_by
                    .iter()
                    .map(move |blocker| BlockingEdge::new(blocker.clone(), item.id.clone()))
            })
            .collect()
    }

    /// Index items by id. Later duplicates are ignored here; the graph store
    /// rejects them on load.
    #[must_use]
    pub fn by_id(&self) -> BTreeMap<&str, &PlanItem> {
        let mut index = BTreeMap::new();
        for item in &self.items {
            index.entry(item.id.as_str()).or_insert(item);
        }
        index
    }

    /// Validate the plan and build a sequencer for it.
    ///
    /// # Errors
    ///
    /// Any structural error from [`crate::graph::GraphStore::load`], or
    /// `InvalidConfig`.
    pub fn to_sequencer(&self, config: &SequencerConfig) -> Result<Sequencer, SequenceError> {
        Sequencer::load(self.ids(), &self.edges(), config)
    }
}

/// Read and parse a plan file, choosing the format from its extension.
///
/// # Errors
///
/// Returns an error if the extension is unsupported, or the file cannot be
/// read or parsed.
#[instrument]
pub fn load_plan(path: &Path) -> Result<Plan> {
    let format = PlanFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let plan = Plan::parse(&content, format)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!(items = plan.items.len(), "plan parsed");
    Ok(plan)
}
