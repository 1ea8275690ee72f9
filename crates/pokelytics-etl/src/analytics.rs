//! Dashboard analytics over the stored creatures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EtlError;
use crate::store::{CountSeries, Store};

/// Abilities shown in the frequency graph.
pub const TOP_ABILITIES: i64 = 10;

/// Moves shown in the frequency graph.
pub const TOP_MOVES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Radar,
    Pie,
    Bar,
}

/// One dashboard graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsGraph {
    PokemonStats,
    TypeDistribution,
    AbilitiesFrequency,
    MovesFrequency,
    EvolutionDistribution,
    TypeCombination,
}

impl AnalyticsGraph {
    pub const ALL: [AnalyticsGraph; 6] = [
        AnalyticsGraph::PokemonStats,
        AnalyticsGraph::TypeDistribution,
        AnalyticsGraph::AbilitiesFrequency,
        AnalyticsGraph::MovesFrequency,
        AnalyticsGraph::EvolutionDistribution,
        AnalyticsGraph::TypeCombination,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsGraph::PokemonStats => "pokemon_stats",
            AnalyticsGraph::TypeDistribution => "type_distribution",
            AnalyticsGraph::AbilitiesFrequency => "abilities_frequency",
            AnalyticsGraph::MovesFrequency => "moves_frequency",
            AnalyticsGraph::EvolutionDistribution => "evolution_distribution",
            AnalyticsGraph::TypeCombination => "type_combination",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalyticsGraph::PokemonStats => "Average Pokemon Stats",
            AnalyticsGraph::TypeDistribution => "Pokemon Type Distribution",
            AnalyticsGraph::AbilitiesFrequency => "Top 10 Most Common Abilities",
            AnalyticsGraph::MovesFrequency => "Top 15 Most Common Moves",
            AnalyticsGraph::EvolutionDistribution => "Evolution Status Distribution",
            AnalyticsGraph::TypeCombination => "Type Combination Distribution",
        }
    }

    pub fn chart_kind(&self) -> ChartKind {
        match self {
            AnalyticsGraph::PokemonStats => ChartKind::Radar,
            AnalyticsGraph::TypeDistribution | AnalyticsGraph::EvolutionDistribution => {
                ChartKind::Pie
            },
            AnalyticsGraph::AbilitiesFrequency
            | AnalyticsGraph::MovesFrequency
            | AnalyticsGraph::TypeCombination => ChartKind::Bar,
        }
    }
}

impl fmt::Display for AnalyticsGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalyticsGraph {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        AnalyticsGraph::ALL
            .into_iter()
            .find(|graph| graph.name() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = AnalyticsGraph::ALL.iter().map(|g| g.name()).collect();
                EtlError::InvalidInput(format!(
                    "unknown graph '{}', expected one of: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Graph data: averages for the stats radar, counts (highest first) for
/// everything else
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphData {
    Averages(BTreeMap<String, f64>),
    Counts(CountSeries),
}

impl GraphData {
    pub fn len(&self) -> usize {
        match self {
            GraphData::Averages(data) => data.len(),
            GraphData::Counts(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphReport {
    pub title: String,
    pub chart: ChartKind,
    pub data: GraphData,
}

/// Build one graph. Query failures produce empty data.
pub async fn graph(store: &Store, graph: AnalyticsGraph) -> GraphReport {
    let data = match graph {
        AnalyticsGraph::PokemonStats => GraphData::Averages(store.average_stats().await),
        AnalyticsGraph::TypeDistribution => GraphData::Counts(store.type_distribution().await),
        AnalyticsGraph::AbilitiesFrequency => {
            GraphData::Counts(store.ability_frequency(TOP_ABILITIES).await)
        },
        AnalyticsGraph::MovesFrequency => GraphData::Counts(store.move_frequency(TOP_MOVES).await),
        AnalyticsGraph::EvolutionDistribution => {
            GraphData::Counts(store.evolution_distribution().await)
        },
        AnalyticsGraph::TypeCombination => {
            GraphData::Counts(store.type_combination_distribution().await)
        },
    };

    GraphReport {
        title: graph.title().to_string(),
        chart: graph.chart_kind(),
        data,
    }
}

/// Build every graph, keyed by graph name.
pub async fn generate(store: &Store) -> BTreeMap<String, GraphReport> {
    let mut report = BTreeMap::new();
    for kind in AnalyticsGraph::ALL {
        report.insert(kind.name().to_string(), graph(store, kind).await);
    }
    report
}
