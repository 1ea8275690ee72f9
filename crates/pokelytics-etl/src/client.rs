//! PokeAPI client (extract stage)
//!
//! One creature costs three sequential requests: the creature itself, its
//! species, and the species' evolution chain. A fixed delay follows each of
//! the first two successful calls to pace the next one.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{EtlError, Result};
use crate::lineage;
use crate::models::RawRecord;
use crate::pipeline::RecordSource;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceRef {
    #[serde(default)]
    url: Option<String>,
}

impl ResourceRef {
    fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Deserialize)]
struct AbilitySlot {
    ability: NamedResource,
}

#[derive(Debug, Deserialize)]
struct MoveSlot {
    #[serde(rename = "move")]
    learned: NamedResource,
}

#[derive(Debug, Deserialize)]
struct StatSlot {
    stat: NamedResource,
    base_stat: i64,
}

#[derive(Debug, Deserialize)]
struct CreatureResponse {
    id: i64,
    name: String,
    types: Vec<TypeSlot>,
    abilities: Vec<AbilitySlot>,
    moves: Vec<MoveSlot>,
    stats: Vec<StatSlot>,
    #[serde(default)]
    species: Option<ResourceRef>,
}

#[derive(Debug, Deserialize)]
struct SpeciesResponse {
    #[serde(default)]
    evolution_chain: Option<ResourceRef>,
}

#[derive(Debug, Deserialize)]
struct EvolutionChainResponse {
    #[serde(default)]
    chain: Option<serde_json::Value>,
}

impl CreatureResponse {
    fn into_raw(self, lineage: Vec<String>) -> RawRecord {
        let is_evolved = lineage::is_evolved(&self.name, &lineage);
        // Later duplicates overwrite earlier ones.
        let stats: BTreeMap<String, i64> = self
            .stats
            .into_iter()
            .map(|slot| (slot.stat.name, slot.base_stat))
            .collect();

        RawRecord {
            id: self.id,
            name: self.name,
            types: self.types.into_iter().map(|slot| slot.kind.name).collect(),
            abilities: self.abilities.into_iter().map(|slot| slot.ability.name).collect(),
            moves: self.moves.into_iter().map(|slot| slot.learned.name).collect(),
            stats,
            lineage,
            is_evolved,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the creature, species and evolution-chain resources
pub struct PokeApiClient {
    client: Client,
    api: ApiConfig,
}

impl PokeApiClient {
    pub fn new(api: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(api.request_timeout())
            .user_agent(concat!("pokelytics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, api })
    }

    /// Fetch one creature with its evolution lineage.
    ///
    /// Non-positive ids fail with `InvalidInput` before any request is made.
    /// Every other failure is `FetchFailed`.
    pub async fn fetch(&self, id: i64) -> Result<RawRecord> {
        if id <= 0 {
            return Err(EtlError::InvalidInput(format!(
                "creature id must be a positive integer, got {}",
                id
            )));
        }

        let creature: CreatureResponse = self.get_json(&self.api.entity_url(id)).await?;
        self.pause().await;

        let species_url = creature
            .species
            .as_ref()
            .and_then(ResourceRef::url)
            .ok_or_else(|| EtlError::fetch(format!("creature {} has no species reference", id)))?;
        let species: SpeciesResponse = self.get_json(species_url).await?;
        self.pause().await;

        let chain_url = species
            .evolution_chain
            .as_ref()
            .and_then(ResourceRef::url)
            .ok_or_else(|| {
                EtlError::fetch(format!("species of creature {} has no evolution chain", id))
            })?;
        let evolution: EvolutionChainResponse = self.get_json(chain_url).await?;

        let lineage = evolution
            .chain
            .as_ref()
            .map(lineage::flatten_chain)
            .unwrap_or_default();

        let record = creature.into_raw(lineage);
        debug!(
            id = record.id,
            name = %record.name,
            lineage_len = record.lineage.len(),
            is_evolved = record.is_evolved,
            "Extracted creature"
        );

        Ok(record)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| EtlError::fetch(format!("GET {}: {}", url, e)))?;

        response
            .json::<T>()
            .await
            .map_err(|e| EtlError::fetch(format!("GET {}: unreadable body: {}", url, e)))
    }

    async fn pause(&self) {
        let delay = self.api.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RecordSource for PokeApiClient {
    async fn fetch(&self, id: i64) -> Result<RawRecord> {
        PokeApiClient::fetch(self, id).await
    }
}
