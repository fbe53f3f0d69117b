//! Catalog types and the read-only catalog source trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CatalogError;

/// Pipeline stage an agent operates in. Display order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Targeting,
    Origination,
    Progression,
    Growth,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Targeting,
        Stage::Origination,
        Stage::Progression,
        Stage::Growth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Targeting => "targeting",
            Stage::Origination => "origination",
            Stage::Progression => "progression",
            Stage::Growth => "growth",
        }
    }

    /// Parse a wire-format stage key.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "targeting" => Some(Stage::Targeting),
            "origination" => Some(Stage::Origination),
            "progression" => Some(Stage::Progression),
            "growth" => Some(Stage::Growth),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent listed in the catalog. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub stage: Stage,
}

/// Immutable stage → agent listing, fetched once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogIndex {
    by_stage: BTreeMap<Stage, Vec<Agent>>,
}

impl CatalogIndex {
    /// Build an index from already-staged agents. Agents keep their order
    /// within each stage.
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let mut by_stage: BTreeMap<Stage, Vec<Agent>> = BTreeMap::new();
        for agent in agents {
            by_stage.entry(agent.stage).or_default().push(agent);
        }
        Self { by_stage }
    }

    /// An index with no agents, used when the catalog service is down.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Agents for one stage, in response order.
    pub fn agents_for(&self, stage: Stage) -> &[Agent] {
        self.by_stage.get(&stage).map_or(&[], Vec::as_slice)
    }

    /// All agents in stage order.
    pub fn all(&self) -> impl Iterator<Item = &Agent> {
        Stage::ALL
            .iter()
            .flat_map(|stage| self.agents_for(*stage).iter())
    }

    /// Look up an agent by id.
    pub fn find(&self, id: &str) -> Option<&Agent> {
        self.all().find(|agent| agent.id == id)
    }

    pub fn len(&self) -> usize {
        self.by_stage.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stage.values().all(Vec::is_empty)
    }
}

/// Read-only source of the agent catalog. One fetch, no side effects.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full stage-grouped catalog.
    async fn fetch(&self) -> Result<CatalogIndex, CatalogError>;

    /// The name of this catalog source implementation.
    fn name(&self) -> &str;
}
