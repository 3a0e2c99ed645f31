use crate::config::DatabaseConfig;
use crate::core::{Page, PageSource};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_table_prefix;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use std::time::Duration;

/// "User viewed a product" in WP Activity Log.
pub const DEFAULT_EVENT_ID: i64 = 9073;

/// Narrows which activity-log occurrences are exported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub event_id: Option<i64>,
    /// Only occurrences created after this Unix timestamp.
    pub since: Option<i64>,
    /// Numeric user id or a `user_login`.
    pub user: Option<String>,
}

/// Absolute start of a "last N days" window ending at `now` (Unix seconds).
pub fn window_start(days: u32, now: i64) -> i64 {
    now - i64::from(days) * 86_400
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bind {
    Int(i64),
    Text(String),
}

/// Pages over the WP Activity Log occurrence table with `LIMIT`/`OFFSET`.
pub struct MySqlActivitySource {
    pool: MySqlPool,
    prefix: String,
    filter: ActivityFilter,
    has_metadata: bool,
    database: String,
}

impl MySqlActivitySource {
    pub async fn connect(
        db: &DatabaseConfig,
        filter: ActivityFilter,
        timeout: Duration,
    ) -> Result<Self> {
        validate_table_prefix("DATABASE_TABLE_PREFIX", &db.table_prefix)?;

        let options = MySqlConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.name);
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        let occurrences = format!("{}wsal_occurrences", db.table_prefix);
        if !table_exists(&pool, &occurrences).await? {
            return Err(EtlError::ConfigError {
                message: format!(
                    "table {} not found in database {}; check DATABASE_TABLE_PREFIX",
                    occurrences, db.name
                ),
            });
        }
        let has_metadata = table_exists(&pool, &format!("{}wsal_metadata", db.table_prefix)).await?;
        if !has_metadata {
            tracing::warn!("⚠️ {}wsal_metadata not found; details will be empty", db.table_prefix);
        }

        Ok(Self {
            pool,
            prefix: db.table_prefix.clone(),
            filter,
            has_metadata,
            database: format!("mysql://{}/{}", db.host, db.name),
        })
    }

    async fn metadata_for(&self, occurrence_id: i64) -> Result<Map<String, Value>> {
        let mut metadata = Map::new();
        if !self.has_metadata {
            return Ok(metadata);
        }

        let sql = format!(
            "SELECT CAST(name AS CHAR) AS name, CAST(value AS CHAR) AS value \
             FROM `{}wsal_metadata` WHERE occurrence_id = ?",
            self.prefix
        );
        let rows = sqlx::query(&sql)
            .bind(occurrence_id)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let name: Option<String> = row.try_get("name")?;
            let value: Option<String> = row.try_get("value")?;
            if let Some(name) = name {
                metadata.insert(name, Value::String(value.unwrap_or_default()));
            }
        }
        Ok(metadata)
    }
}

async fn table_exists(pool: &MySqlPool, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = ?",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Builds the paged occurrence query; `LIMIT ? OFFSET ?` are always the last two binds.
fn occurrence_query(prefix: &str, filter: &ActivityFilter) -> (String, Vec<Bind>) {
    let mut sql = format!(
        "SELECT CAST(o.id AS SIGNED) AS id, CAST(o.alert_id AS SIGNED) AS alert_id, \
         CAST(o.created_on AS CHAR) AS created_on, \
         CAST(u.user_login AS CHAR) AS user_login, CAST(u.user_email AS CHAR) AS user_email \
         FROM `{p}wsal_occurrences` o LEFT JOIN `{p}users` u ON o.user_id = u.ID",
        p = prefix
    );

    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    // A fixed cutoff; a moving one would shift OFFSET pages between runs.
    if let Some(since) = filter.since {
        clauses.push("o.created_on > ?");
        binds.push(Bind::Int(since));
    }
    if let Some(event_id) = filter.event_id {
        clauses.push("o.alert_id = ?");
        binds.push(Bind::Int(event_id));
    }
    if let Some(user) = &filter.user {
        match user.parse::<i64>() {
            Ok(user_id) => {
                clauses.push("o.user_id = ?");
                binds.push(Bind::Int(user_id));
            }
            Err(_) => {
                clauses.push("u.user_login = ?");
                binds.push(Bind::Text(user.clone()));
            }
        }
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    // Stable order so OFFSET paging lines up across resumed runs.
    sql.push_str(" ORDER BY o.id ASC LIMIT ? OFFSET ?");

    (sql, binds)
}

#[async_trait]
impl PageSource for MySqlActivitySource {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page> {
        let (sql, binds) = occurrence_query(&self.prefix, &self.filter);
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        tracing::debug!("Executing activity query (page {}, offset {})", page, offset);

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Bind::Int(value) => query.bind(value),
                Bind::Text(value) => query.bind(value),
            };
        }
        let rows = query
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let alert_id: i64 = row.try_get("alert_id")?;
            let created_on: Option<String> = row.try_get("created_on")?;
            let user_login: Option<String> = row.try_get("user_login")?;
            let user_email: Option<String> = row.try_get("user_email")?;
            let metadata = self.metadata_for(id).await?;

            records.push(json!({
                "id": id,
                "alert_id": alert_id,
                "created_on": created_on,
                "user_login": user_login,
                "user_email": user_email,
                "metadata": metadata,
            }));
        }

        Ok(Page::from_records(records, page_size))
    }

    fn describe(&self) -> String {
        self.database.clone()
    }
}
