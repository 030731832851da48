//! SQL implementation of `ChannelRepository`.
//!
//! Gateway versions differ in which columns `channels` has. The repository
//! reads the live column list once and only selects or writes columns that
//! both the table and [`Channel`] know about.

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Row};
use tokio::sync::OnceCell;

use chanops_core::repository::channel::ChannelRepository;
use chanops_types::channel::{Channel, ChannelFilter};
use chanops_types::error::RepositoryError;

use super::dialect::{Backend, ValueKind};
use super::pool::{DatabasePool, query_error};
use super::table::list_columns;

const TABLE: &str = "channels";

/// Every column the tool knows, with its value kind. Order is the column
/// order of the gateway schema.
const KNOWN_COLUMNS: &[(&str, ValueKind)] = &[
    ("id", ValueKind::Int),
    ("type", ValueKind::Int),
    ("key", ValueKind::Text),
    ("open_ai_organization", ValueKind::Text),
    ("test_model", ValueKind::Text),
    ("status", ValueKind::Int),
    ("name", ValueKind::Text),
    ("weight", ValueKind::Int),
    ("created_time", ValueKind::Int),
    ("test_time", ValueKind::Int),
    ("response_time", ValueKind::Int),
    ("base_url", ValueKind::Text),
    ("other", ValueKind::Text),
    ("balance", ValueKind::Float),
    ("balance_updated_time", ValueKind::Int),
    ("models", ValueKind::Text),
    ("group", ValueKind::Text),
    ("used_quota", ValueKind::Int),
    ("model_mapping", ValueKind::Text),
    ("status_code_mapping", ValueKind::Text),
    ("priority", ValueKind::Int),
    ("auto_ban", ValueKind::Int),
    ("other_info", ValueKind::Text),
    ("tag", ValueKind::Text),
    ("setting", ValueKind::Text),
    ("param_override", ValueKind::Text),
    ("channel_info", ValueKind::Text),
];

/// One column value on its way to or from the database.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

pub struct SqlChannelRepository {
    pool: DatabasePool,
    columns: OnceCell<Vec<(&'static str, ValueKind)>>,
}

impl SqlChannelRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            columns: OnceCell::new(),
        }
    }

    fn backend(&self) -> Backend {
        self.pool.backend
    }

    /// Known columns present in the live table, discovered on first use.
    async fn columns(&self) -> Result<&[(&'static str, ValueKind)], RepositoryError> {
        let columns = self
            .columns
            .get_or_try_init(|| async {
                let live = list_columns(&self.pool, TABLE).await?;
                if live.is_empty() {
                    return Err(RepositoryError::Query(format!("table '{TABLE}' not found")));
                }
                let present: Vec<(&'static str, ValueKind)> = KNOWN_COLUMNS
                    .iter()
                    .filter(|(name, _)| live.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
                    .copied()
                    .collect();
                tracing::debug!(columns = present.len(), "discovered channel columns");
                Ok(present)
            })
            .await?;
        Ok(columns.as_slice())
    }

    fn select_list(&self, columns: &[(&'static str, ValueKind)]) -> String {
        let backend = self.backend();
        columns
            .iter()
            .map(|(name, kind)| backend.cast(&backend.quote(name), *kind))
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn select(
        &self,
        where_clause: &str,
        params: Vec<FieldValue>,
        suffix: &str,
    ) -> Result<Vec<Channel>, RepositoryError> {
        let columns = self.columns().await?;
        let sql = format!(
            "SELECT {} FROM {} {where_clause} ORDER BY {} {suffix}",
            self.select_list(columns),
            self.backend().quote(TABLE),
            self.backend().quote("id"),
        );
        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind(query, param);
        }
        let rows = query.fetch_all(&self.pool.pool).await.map_err(query_error)?;
        rows.iter().map(|row| channel_from_row(row, columns)).collect()
    }
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: FieldValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        FieldValue::Int(v) => query.bind(v),
        FieldValue::Float(v) => query.bind(v),
        FieldValue::Text(v) => query.bind(v),
    }
}

fn channel_from_row(row: &AnyRow, columns: &[(&'static str, ValueKind)]) -> Result<Channel, RepositoryError> {
    let mut channel = Channel::default();
    for (i, (name, kind)) in columns.iter().enumerate() {
        let value = match kind {
            ValueKind::Int => FieldValue::Int(row.try_get(i).map_err(query_error)?),
            ValueKind::Float => FieldValue::Float(row.try_get(i).map_err(query_error)?),
            ValueKind::Text => FieldValue::Text(row.try_get(i).map_err(query_error)?),
        };
        assign(&mut channel, name, value);
    }
    Ok(channel)
}

fn int(v: FieldValue) -> Option<i64> {
    match v {
        FieldValue::Int(v) => v,
        _ => None,
    }
}

fn text(v: FieldValue) -> Option<String> {
    match v {
        FieldValue::Text(v) => v,
        _ => None,
    }
}

/// Store a column value into the matching `Channel` field.
fn assign(channel: &mut Channel, column: &str, value: FieldValue) {
    match column {
        "id" => channel.id = int(value).unwrap_or_default(),
        "type" => channel.channel_type = int(value).unwrap_or_default(),
        "key" => channel.key = text(value).unwrap_or_default(),
        "open_ai_organization" => channel.openai_organization = text(value),
        "test_model" => channel.test_model = text(value),
        "status" => channel.status = int(value).unwrap_or_default(),
        "name" => channel.name = text(value).unwrap_or_default(),
        "weight" => channel.weight = int(value),
        "created_time" => channel.created_time = int(value).unwrap_or_default(),
        "test_time" => channel.test_time = int(value).unwrap_or_default(),
        "response_time" => channel.response_time = int(value).unwrap_or_default(),
        "base_url" => channel.base_url = text(value),
        "other" => channel.other = text(value).unwrap_or_default(),
        "balance" => {
            if let FieldValue::Float(v) = value {
                channel.balance = v.unwrap_or_default();
            }
        }
        "balance_updated_time" => channel.balance_updated_time = int(value).unwrap_or_default(),
        "models" => channel.models = text(value).unwrap_or_default(),
        "group" => channel.group = text(value).unwrap_or_default(),
        "used_quota" => channel.used_quota = int(value).unwrap_or_default(),
        "model_mapping" => channel.model_mapping = text(value),
        "status_code_mapping" => channel.status_code_mapping = text(value),
        "priority" => channel.priority = int(value),
        "auto_ban" => channel.auto_ban = int(value),
        "other_info" => channel.other_info = text(value).unwrap_or_default(),
        "tag" => channel.tag = text(value),
        "setting" => channel.setting = text(value),
        "param_override" => channel.param_override = text(value),
        "channel_info" => channel.channel_info = parse_channel_info(text(value)),
        _ => {}
    }
}

/// Read a `Channel` field as the value written to `column`.
fn field(channel: &Channel, column: &str) -> FieldValue {
    match column {
        "id" => FieldValue::Int(Some(channel.id)),
        "type" => FieldValue::Int(Some(channel.channel_type)),
        "key" => FieldValue::Text(Some(channel.key.clone())),
        "open_ai_organization" => FieldValue::Text(channel.openai_organization.clone()),
        "test_model" => FieldValue::Text(channel.test_model.clone()),
        "status" => FieldValue::Int(Some(channel.status)),
        "name" => FieldValue::Text(Some(channel.name.clone())),
        "weight" => FieldValue::Int(channel.weight),
        "created_time" => FieldValue::Int(Some(channel.created_time)),
        "test_time" => FieldValue::Int(Some(channel.test_time)),
        "response_time" => FieldValue::Int(Some(channel.response_time)),
        "base_url" => FieldValue::Text(channel.base_url.clone()),
        "other" => FieldValue::Text(Some(channel.other.clone())),
        "balance" => FieldValue::Float(Some(channel.balance)),
        "balance_updated_time" => FieldValue::Int(Some(channel.balance_updated_time)),
        "models" => FieldValue::Text(Some(channel.models.clone())),
        "group" => FieldValue::Text(Some(channel.group.clone())),
        "used_quota" => FieldValue::Int(Some(channel.used_quota)),
        "model_mapping" => FieldValue::Text(channel.model_mapping.clone()),
        "status_code_mapping" => FieldValue::Text(channel.status_code_mapping.clone()),
        "priority" => FieldValue::Int(channel.priority),
        "auto_ban" => FieldValue::Int(channel.auto_ban),
        "other_info" => FieldValue::Text(Some(channel.other_info.clone())),
        "tag" => FieldValue::Text(channel.tag.clone()),
        "setting" => FieldValue::Text(channel.setting.clone()),
        "param_override" => FieldValue::Text(channel.param_override.clone()),
        "channel_info" => FieldValue::Text(Some(channel_info_text(&channel.channel_info))),
        _ => FieldValue::Text(None),
    }
}

/// `channel_info` is a JSON column; text that isn't JSON is kept as a string.
fn parse_channel_info(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Null,
        Some(s) if s.trim().is_empty() => serde_json::Value::Null,
        Some(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
    }
}

fn channel_info_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "{}".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ChannelRepository for SqlChannelRepository {
    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, RepositoryError> {
        let backend = self.backend();
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(id) = filter.id {
            params.push(FieldValue::Int(Some(id)));
            clauses.push(format!("{} = {}", backend.quote("id"), backend.placeholder(params.len())));
        }
        if !filter.types.is_empty() {
            let mut slots = Vec::new();
            for ty in &filter.types {
                params.push(FieldValue::Int(Some(*ty)));
                slots.push(backend.placeholder(params.len()));
            }
            clauses.push(format!("{} IN ({})", backend.quote("type"), slots.join(", ")));
        }
        if let Some(status) = filter.status {
            params.push(FieldValue::Int(Some(status)));
            clauses.push(format!("{} = {}", backend.quote("status"), backend.placeholder(params.len())));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        self.select(&where_clause, params, "").await
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.backend().quote(TABLE));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool.pool)
            .await
            .map_err(query_error)?;
        row.try_get::<i64, _>(0).map_err(query_error)
    }

    async fn find_existing(&self, name: &str, id: i64) -> Result<Option<Channel>, RepositoryError> {
        let backend = self.backend();
        let where_clause = format!(
            "WHERE {name_col} = {p1} OR ({id_col} = {p2} AND {id_col} > 0)",
            name_col = backend.quote("name"),
            id_col = backend.quote("id"),
            p1 = backend.placeholder(1),
            p2 = backend.placeholder(2),
        );
        let params = vec![FieldValue::Text(Some(name.to_string())), FieldValue::Int(Some(id))];
        Ok(self
            .select(&where_clause, params, "LIMIT 1")
            .await?
            .into_iter()
            .next())
    }

    async fn insert(&self, channel: &Channel, keep_id: bool) -> Result<i64, RepositoryError> {
        let backend = self.backend();
        let columns: Vec<&str> = self
            .columns()
            .await?
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| keep_id || *name != "id")
            .collect();

        let names: Vec<String> = columns.iter().map(|c| backend.quote(c)).collect();
        let slots: Vec<String> = (1..=columns.len()).map(|n| backend.placeholder(n)).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            backend.quote(TABLE),
            names.join(", "),
            slots.join(", ")
        );
        if backend.supports_returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(&backend.cast(&backend.quote("id"), ValueKind::Int));
        }

        let mut query = sqlx::query(&sql);
        for column in &columns {
            query = bind(query, field(channel, column));
        }

        let id = if backend.supports_returning() {
            let row = query.fetch_one(&self.pool.pool).await.map_err(query_error)?;
            row.try_get::<i64, _>(0).map_err(query_error)?
        } else {
            let result = query.execute(&self.pool.pool).await.map_err(query_error)?;
            match result.last_insert_id() {
                Some(id) => id,
                None if keep_id => channel.id,
                None => return Err(RepositoryError::Query("insert returned no id".to_string())),
            }
        };
        tracing::debug!(channel_id = id, name = %channel.name, "inserted channel");
        Ok(id)
    }

    async fn update(&self, channel: &Channel) -> Result<(), RepositoryError> {
        let backend = self.backend();
        let columns: Vec<&str> = self
            .columns()
            .await?
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| *name != "id")
            .collect();

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", backend.quote(c), backend.placeholder(i + 1)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            backend.quote(TABLE),
            assignments.join(", "),
            backend.quote("id"),
            backend.placeholder(columns.len() + 1)
        );

        let mut query = sqlx::query(&sql);
        for column in &columns {
            query = bind(query, field(channel, column));
        }
        let result = query
            .bind(channel.id)
            .execute(&self.pool.pool)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let sql = format!("DELETE FROM {}", self.backend().quote(TABLE));
        let result = sqlx::query(&sql)
            .execute(&self.pool.pool)
            .await
            .map_err(query_error)?;
        tracing::info!(rows = result.rows_affected(), "deleted all channels");
        Ok(result.rows_affected())
    }

    async fn update_key(&self, id: i64, key: &str, status: Option<i64>) -> Result<(), RepositoryError> {
        let backend = self.backend();
        let mut sets = vec![format!("{} = {}", backend.quote("key"), backend.placeholder(1))];
        if status.is_some() {
            sets.push(format!("{} = {}", backend.quote("status"), backend.placeholder(2)));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            backend.quote(TABLE),
            sets.join(", "),
            backend.quote("id"),
            backend.placeholder(sets.len() + 1)
        );

        let mut query = sqlx::query(&sql).bind(key.to_string());
        if let Some(status) = status {
            query = query.bind(status);
        }
        let result = query
            .bind(id)
            .execute(&self.pool.pool)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_models(&self, id: i64, models: &str) -> Result<(), RepositoryError> {
        let backend = self.backend();
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            backend.quote(TABLE),
            backend.quote("models"),
            backend.placeholder(1),
            backend.quote("id"),
            backend.placeholder(2)
        );
        let result = sqlx::query(&sql)
            .bind(models.to_string())
            .bind(id)
            .execute(&self.pool.pool)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
