//! SQLite storage (load stage) and read-side helpers
//!
//! The store owns the nine-table schema and every write. A record is written
//! in one transaction using insert-if-absent statements, so persisting the
//! same record twice leaves the database unchanged after the first call and
//! a failed write leaves no trace.

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{EtlError, Result};
use crate::models::ShapedRecord;
use crate::pipeline::{RecordSink, SinkConnector};

/// Table name and DDL, in creation order (lookups before junctions).
pub const SCHEMA: [(&str, &str); 9] = [
    (
        "pokemon",
        r#"
        CREATE TABLE IF NOT EXISTS pokemon (
            id INTEGER PRIMARY KEY CHECK (id > 0),
            name TEXT UNIQUE NOT NULL,
            is_evolved BOOLEAN NOT NULL
        )
        "#,
    ),
    ("types", "CREATE TABLE IF NOT EXISTS types (name TEXT PRIMARY KEY)"),
    ("abilities", "CREATE TABLE IF NOT EXISTS abilities (name TEXT PRIMARY KEY)"),
    ("moves", "CREATE TABLE IF NOT EXISTS moves (name TEXT PRIMARY KEY)"),
    ("stats", "CREATE TABLE IF NOT EXISTS stats (name TEXT PRIMARY KEY)"),
    (
        "pokemon_types",
        r#"
        CREATE TABLE IF NOT EXISTS pokemon_types (
            pokemon_id INTEGER NOT NULL,
            type_name TEXT NOT NULL,
            PRIMARY KEY (pokemon_id, type_name),
            FOREIGN KEY (pokemon_id) REFERENCES pokemon (id),
            FOREIGN KEY (type_name) REFERENCES types (name)
        )
        "#,
    ),
    (
        "pokemon_abilities",
        r#"
        CREATE TABLE IF NOT EXISTS pokemon_abilities (
            pokemon_id INTEGER NOT NULL,
            ability_name TEXT NOT NULL,
            PRIMARY KEY (pokemon_id, ability_name),
            FOREIGN KEY (pokemon_id) REFERENCES pokemon (id),
            FOREIGN KEY (ability_name) REFERENCES abilities (name)
        )
        "#,
    ),
    (
        "pokemon_moves",
        r#"
        CREATE TABLE IF NOT EXISTS pokemon_moves (
            pokemon_id INTEGER NOT NULL,
            move_name TEXT NOT NULL,
            PRIMARY KEY (pokemon_id, move_name),
            FOREIGN KEY (pokemon_id) REFERENCES pokemon (id),
            FOREIGN KEY (move_name) REFERENCES moves (name)
        )
        "#,
    ),
    (
        "pokemon_stats",
        r#"
        CREATE TABLE IF NOT EXISTS pokemon_stats (
            pokemon_id INTEGER NOT NULL,
            stat_name TEXT NOT NULL,
            base_stat INTEGER NOT NULL,
            PRIMARY KEY (pokemon_id, stat_name),
            FOREIGN KEY (pokemon_id) REFERENCES pokemon (id),
            FOREIGN KEY (stat_name) REFERENCES stats (name)
        )
        "#,
    ),
];

/// Row count of every table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub pokemon: i64,
    pub types: i64,
    pub abilities: i64,
    pub moves: i64,
    pub stats: i64,
    pub pokemon_types: i64,
    pub pokemon_abilities: i64,
    pub pokemon_moves: i64,
    pub pokemon_stats: i64,
}

impl TableCounts {
    pub fn total(&self) -> i64 {
        self.pokemon
            + self.types
            + self.abilities
            + self.moves
            + self.stats
            + self.pokemon_types
            + self.pokemon_abilities
            + self.pokemon_moves
            + self.pokemon_stats
    }
}

/// Optional criteria for [`Store::filter_creatures`]; unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureFilter {
    pub is_evolved: Option<bool>,
    pub type_name: Option<String>,
    pub hp_min: Option<i64>,
    pub attack_min: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureSummary {
    pub name: String,
    pub hp: Option<i64>,
}

/// Label and count pairs in query order, highest count first.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSeries(Vec<(String, i64)>);

impl CountSeries {
    pub fn get(&self, label: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, i64)>> for CountSeries {
    fn from(rows: Vec<(String, i64)>) -> Self {
        Self(rows)
    }
}

impl Serialize for CountSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

/// Handle on the SQLite database
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    location: String,
}

impl Store {
    /// Open (creating if needed) the database file at `location` with
    /// foreign-key enforcement on.
    pub async fn connect(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(EtlError::ConnectFailed("database location is empty".to_string()));
        }

        let options = SqliteConnectOptions::new()
            .filename(location)
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection: the pipeline is strictly sequential.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| EtlError::ConnectFailed(format!("{}: {}", location, e)))?;

        debug!(location, "Connected to store");

        Ok(Self {
            pool,
            location: location.to_string(),
        })
    }

    /// Create all nine tables if absent, in one transaction.
    pub async fn ensure_schema(&self) -> Result<()> {
        let schema_err = |e: sqlx::Error| EtlError::SchemaFailed(e.to_string());
        let mut tx = self.pool.begin().await.map_err(schema_err)?;

        for (table, ddl) in SCHEMA {
            if let Err(e) = sqlx::query(ddl).execute(&mut *tx).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Schema rollback failed");
                }
                return Err(EtlError::SchemaFailed(format!("{}: {}", table, e)));
            }
        }

        tx.commit().await.map_err(schema_err)?;
        debug!(tables = SCHEMA.len(), "Schema ready");
        Ok(())
    }

    /// Write one shaped record across the schema atomically.
    ///
    /// Existing rows win: duplicate keys are skipped, never updated.
    pub async fn persist(&self, record: &ShapedRecord) -> Result<()> {
        let persist_err = |e: sqlx::Error| {
            EtlError::PersistFailed(format!("creature {}: {}", record.id(), e))
        };
        let mut tx = self.pool.begin().await.map_err(persist_err)?;

        match write_record(&mut tx, record).await {
            Ok(()) => tx.commit().await.map_err(persist_err),
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(id = record.id(), error = %rollback, "Rollback failed");
                }
                Err(persist_err(e))
            },
        }
    }

    /// Close the underlying connection.
    pub async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!(location = %self.location, "Database connection closed");
        Ok(())
    }

    pub async fn counts(&self) -> Result<TableCounts> {
        let mut counts = TableCounts::default();
        for (table, _) in SCHEMA {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| EtlError::Query(format!("count {}: {}", table, e)))?;

            let slot = match table {
                "pokemon" => &mut counts.pokemon,
                "types" => &mut counts.types,
                "abilities" => &mut counts.abilities,
                "moves" => &mut counts.moves,
                "stats" => &mut counts.stats,
                "pokemon_types" => &mut counts.pokemon_types,
                "pokemon_abilities" => &mut counts.pokemon_abilities,
                "pokemon_moves" => &mut counts.pokemon_moves,
                _ => &mut counts.pokemon_stats,
            };
            *slot = count;
        }
        Ok(counts)
    }

    // ========================================================================
    // Listing and filtering
    // ========================================================================

    /// All creature names ordered by id; empty on query failure.
    pub async fn list_names(&self) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM pokemon ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Listing creatures failed");
                Vec::new()
            })
    }

    /// Creatures matching every set criterion, ordered by id; empty on query
    /// failure.
    pub async fn filter_creatures(&self, filter: &CreatureFilter) -> Vec<CreatureSummary> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT p.name AS name, hp.base_stat AS hp
            FROM pokemon p
            LEFT JOIN pokemon_stats hp ON hp.pokemon_id = p.id AND hp.stat_name = 'hp'
            LEFT JOIN pokemon_stats atk ON atk.pokemon_id = p.id AND atk.stat_name = 'attack'
            WHERE 1 = 1
            "#,
        );

        if let Some(is_evolved) = filter.is_evolved {
            query.push(" AND p.is_evolved = ").push_bind(is_evolved);
        }
        if let Some(type_name) = &filter.type_name {
            query
                .push(" AND EXISTS (SELECT 1 FROM pokemon_types t WHERE t.pokemon_id = p.id AND t.type_name = ")
                .push_bind(type_name.clone())
                .push(")");
        }
        if let Some(hp_min) = filter.hp_min {
            query.push(" AND hp.base_stat >= ").push_bind(hp_min);
        }
        if let Some(attack_min) = filter.attack_min {
            query.push(" AND atk.base_stat >= ").push_bind(attack_min);
        }
        query.push(" ORDER BY p.id");

        query
            .build_query_as::<(String, Option<i64>)>()
            .fetch_all(&self.pool)
            .await
            .map(|rows| {
                rows.into_iter()
                    .map(|(name, hp)| CreatureSummary { name, hp })
                    .collect()
            })
            .unwrap_or_else(|e| {
                warn!(error = %e, "Filtering creatures failed");
                Vec::new()
            })
    }

    // ========================================================================
    // Aggregations (one grouped query each; empty result on failure)
    // ========================================================================

    /// Average base value per stat, rounded to two decimals.
    pub async fn average_stats(&self) -> BTreeMap<String, f64> {
        sqlx::query_as::<_, (String, f64)>(
            "SELECT stat_name, ROUND(AVG(base_stat), 2) FROM pokemon_stats GROUP BY stat_name",
        )
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().collect())
        .unwrap_or_else(|e| {
            warn!(query = "average_stats", error = %e, "Aggregation failed");
            BTreeMap::new()
        })
    }

    /// Number of creatures per type.
    pub async fn type_distribution(&self) -> CountSeries {
        self.count_series(
            "type_distribution",
            r#"
            SELECT type_name, COUNT(DISTINCT pokemon_id) AS count
            FROM pokemon_types
            GROUP BY type_name
            ORDER BY count DESC, type_name
            "#,
            None,
        )
        .await
    }

    /// The `top_n` most common abilities.
    pub async fn ability_frequency(&self, top_n: i64) -> CountSeries {
        self.count_series(
            "ability_frequency",
            r#"
            SELECT ability_name, COUNT(DISTINCT pokemon_id) AS count
            FROM pokemon_abilities
            GROUP BY ability_name
            ORDER BY count DESC, ability_name
            LIMIT ?1
            "#,
            Some(top_n),
        )
        .await
    }

    /// The `top_n` most common moves.
    pub async fn move_frequency(&self, top_n: i64) -> CountSeries {
        self.count_series(
            "move_frequency",
            r#"
            SELECT move_name, COUNT(DISTINCT pokemon_id) AS count
            FROM pokemon_moves
            GROUP BY move_name
            ORDER BY count DESC, move_name
            LIMIT ?1
            "#,
            Some(top_n),
        )
        .await
    }

    /// Evolved vs. not evolved.
    pub async fn evolution_distribution(&self) -> CountSeries {
        self.count_series(
            "evolution_distribution",
            r#"
            SELECT CASE WHEN is_evolved = 1 THEN 'Evolved' ELSE 'Not Evolved' END AS status,
                   COUNT(*) AS count
            FROM pokemon
            GROUP BY status
            ORDER BY count DESC, status
            "#,
            None,
        )
        .await
    }

    /// Single-, dual- and multi-type creature counts.
    pub async fn type_combination_distribution(&self) -> CountSeries {
        self.count_series(
            "type_combination_distribution",
            r#"
            SELECT CASE
                       WHEN type_count = 1 THEN 'Single Type'
                       WHEN type_count = 2 THEN 'Dual Type'
                       ELSE 'Multi Type'
                   END AS combination,
                   COUNT(*) AS count
            FROM (
                SELECT pokemon_id, COUNT(*) AS type_count
                FROM pokemon_types
                GROUP BY pokemon_id
            )
            GROUP BY combination
            ORDER BY count DESC, combination
            "#,
            None,
        )
        .await
    }

    async fn count_series(&self, label: &str, sql: &str, limit: Option<i64>) -> CountSeries {
        let mut query = sqlx::query_as::<_, (String, i64)>(sql);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        match query.fetch_all(&self.pool).await {
            Ok(rows) => CountSeries::from(rows),
            Err(e) => {
                warn!(query = label, error = %e, "Aggregation failed");
                CountSeries::default()
            },
        }
    }
}

async fn write_record(
    conn: &mut SqliteConnection,
    record: &ShapedRecord,
) -> std::result::Result<(), sqlx::Error> {
    let id = record.id();

    // 1. Lookup tables
    for name in &record.types {
        insert_name(conn, "INSERT OR IGNORE INTO types (name) VALUES (?1)", name).await?;
    }
    for name in &record.abilities {
        insert_name(conn, "INSERT OR IGNORE INTO abilities (name) VALUES (?1)", name).await?;
    }
    for name in &record.moves {
        insert_name(conn, "INSERT OR IGNORE INTO moves (name) VALUES (?1)", name).await?;
    }
    for stat in &record.stats {
        insert_name(conn, "INSERT OR IGNORE INTO stats (name) VALUES (?1)", &stat.stat_name).await?;
    }

    // 2. Entity row. Only key conflicts are skipped; the id CHECK still fails.
    sqlx::query(
        "INSERT INTO pokemon (id, name, is_evolved) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
    )
    .bind(id)
    .bind(record.name())
    .bind(record.main.is_evolved)
    .execute(&mut *conn)
    .await?;

    // 3. Junction tables
    for name in &record.types {
        insert_link(
            conn,
            "INSERT OR IGNORE INTO pokemon_types (pokemon_id, type_name) VALUES (?1, ?2)",
            id,
            name,
        )
        .await?;
    }
    for name in &record.abilities {
        insert_link(
            conn,
            "INSERT OR IGNORE INTO pokemon_abilities (pokemon_id, ability_name) VALUES (?1, ?2)",
            id,
            name,
        )
        .await?;
    }
    for name in &record.moves {
        insert_link(
            conn,
            "INSERT OR IGNORE INTO pokemon_moves (pokemon_id, move_name) VALUES (?1, ?2)",
            id,
            name,
        )
        .await?;
    }
    for stat in &record.stats {
        sqlx::query(
            "INSERT OR IGNORE INTO pokemon_stats (pokemon_id, stat_name, base_stat) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(&stat.stat_name)
        .bind(stat.base_value)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_name(
    conn: &mut SqliteConnection,
    sql: &str,
    name: &str,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(sql).bind(name).execute(&mut *conn).await?;
    Ok(())
}

async fn insert_link(
    conn: &mut SqliteConnection,
    sql: &str,
    id: i64,
    name: &str,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(sql).bind(id).bind(name).execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl RecordSink for Store {
    async fn ensure_schema(&self) -> Result<()> {
        Store::ensure_schema(self).await
    }

    async fn persist(&self, record: &ShapedRecord) -> Result<()> {
        Store::persist(self, record).await
    }

    async fn close(&self) -> Result<()> {
        Store::close(self).await
    }
}

/// Opens a [`Store`] at a fixed location
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    location: String,
}

impl SqliteConnector {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

#[async_trait]
impl SinkConnector for SqliteConnector {
    type Sink = Store;

    async fn connect(&self) -> Result<Store> {
        Store::connect(&self.location).await
    }
}
