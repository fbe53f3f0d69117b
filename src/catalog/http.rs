//! HTTP catalog source backed by the catalog service's `/agents` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::traits::{Agent, CatalogIndex, CatalogSource, Stage};
use crate::error::CatalogError;

/// Wire shape of one agent record. The stage is the grouping key, not a
/// field on the record.
#[derive(Debug, Deserialize)]
struct AgentRecord {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// Catalog source over `GET {base_url}/agents`.
pub struct HttpCatalogSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalogSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Decode a `/agents` response body into an index.
///
/// Unknown stage keys are skipped with a warning rather than failing the
/// fetch; a body that does not decode at all is malformed.
pub fn decode_catalog(body: &str) -> Result<CatalogIndex, CatalogError> {
    let groups: HashMap<String, Vec<AgentRecord>> =
        serde_json::from_str(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    let mut agents = Vec::new();
    for stage in Stage::ALL {
        if let Some(records) = groups.get(stage.as_str()) {
            for record in records {
                agents.push(Agent {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    description: record.description.clone(),
                    stage,
                });
            }
        }
    }

    for key in groups.keys() {
        if Stage::parse(key).is_none() {
            tracing::warn!(stage = %key, "skipping unknown stage in catalog response");
        }
    }

    Ok(CatalogIndex::from_agents(agents))
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<CatalogIndex, CatalogError> {
        let url = format!("{}/agents", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        decode_catalog(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
