use std::collections::HashSet;
use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::cache::RecordCache;
use crate::config;
use crate::filter::{BoundParam, FilterData, FilterError, FilterOrder, FilterOrderInfo, FilterWhere, SortDirection};
use crate::model::{ColumnType, RecordDefinition};
use crate::schema::SchemaDefinition;

use super::{validate_create, validate_update, CrudError};

const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Page of list results plus the unpaginated total.
#[derive(Debug)]
pub struct ListResult {
    pub items: Vec<Value>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Value ready to be bound into a Postgres query with its SQL type.
#[derive(Debug, Clone)]
enum BindValue {
    Uuid(Uuid),
    Text(String),
    Int(i64),
    Dec(Decimal),
    Bool(bool),
    Ts(DateTime<Utc>),
    Null(ColumnType),
}

/// Generic persistence for one schema. All six operations run against
/// the table derived by the model factory; records travel as JSON both
/// ways via `row_to_json`.
pub struct CrudService {
    schema: Arc<SchemaDefinition>,
    definition: Arc<RecordDefinition>,
    pool: PgPool,
    cache: Arc<RecordCache>,
    filter_columns: HashSet<String>,
}

impl CrudService {
    pub fn new(
        schema: Arc<SchemaDefinition>,
        definition: Arc<RecordDefinition>,
        pool: PgPool,
        cache: Arc<RecordCache>,
    ) -> Self {
        let filter_columns = definition.column_names().map(str::to_string).collect();
        Self { schema, definition, pool, cache, filter_columns }
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub async fn create(&self, payload: &Map<String, Value>) -> Result<Value, CrudError> {
        let normalized = validate_create(&self.schema, payload)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut columns = vec!["id", "created_at", "updated_at"];
        let mut binds = vec![BindValue::Uuid(id), BindValue::Ts(now), BindValue::Ts(now)];
        for (name, value) in &normalized {
            columns.push(name.as_str());
            binds.push(self.to_bind(name, value)?);
        }

        let column_list: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let placeholders: Vec<String> = (1..=binds.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "WITH ins AS (INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *) \
             SELECT row_to_json(ins) AS record FROM ins",
            self.definition.table_name,
            column_list.join(", "),
            placeholders.join(", ")
        );

        let row = self.run_fetch_one(&sql, &binds).await.map_err(map_write_error)?;
        let record: Value = row.try_get("record").map_err(CrudError::Database)?;
        tracing::info!(schema = %self.schema.name, %id, "record created");
        // Fresh id: token 0 inserts unless a delete already raced past us.
        self.cache.put(&self.schema.name, id, record.clone(), 0).await;
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<Value, CrudError> {
        if let Some(record) = self.cache.get(&self.schema.name, id).await {
            return Ok(record);
        }

        let token = self.cache.read_token(&self.schema.name, id).await;
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM \"{}\" t WHERE \"id\" = $1",
            self.definition.table_name
        );
        let binds = [BindValue::Uuid(id)];
        let row = self.fetch_optional_with_retry(&sql, &binds).await?;
        let row = row.ok_or_else(|| self.not_found(id))?;
        let record: Value = row.try_get("record").map_err(CrudError::Database)?;
        self.cache.put(&self.schema.name, id, record.clone(), token).await;
        Ok(record)
    }

    pub async fn update(&self, id: Uuid, payload: &Map<String, Value>) -> Result<Value, CrudError> {
        let normalized = validate_update(&self.schema, payload)?;

        let mut binds = Vec::with_capacity(normalized.len() + 2);
        let mut assignments = Vec::with_capacity(normalized.len() + 1);
        for (name, value) in &normalized {
            binds.push(self.to_bind(name, value)?);
            assignments.push(format!("\"{}\" = ${}", name, binds.len()));
        }
        binds.push(BindValue::Ts(Utc::now()));
        assignments.push(format!("\"updated_at\" = ${}", binds.len()));
        binds.push(BindValue::Uuid(id));

        let sql = format!(
            "WITH upd AS (UPDATE \"{}\" SET {} WHERE \"id\" = ${} RETURNING *) \
             SELECT row_to_json(upd) AS record FROM upd",
            self.definition.table_name,
            assignments.join(", "),
            binds.len()
        );

        let row = self.run_fetch_optional(&sql, &binds).await.map_err(map_write_error)?;
        let row = row.ok_or_else(|| self.not_found(id))?;
        let record: Value = row.try_get("record").map_err(CrudError::Database)?;
        tracing::info!(schema = %self.schema.name, %id, "record updated");
        // Invalidate only; the next read repopulates under its own token.
        self.cache.invalidate(&self.schema.name, id).await;
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CrudError> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"id\" = $1 RETURNING \"id\"",
            self.definition.table_name
        );
        let binds = [BindValue::Uuid(id)];
        let row = self.run_fetch_optional(&sql, &binds).await.map_err(map_write_error)?;
        if row.is_none() {
            return Err(self.not_found(id));
        }
        tracing::info!(schema = %self.schema.name, %id, "record deleted");
        self.cache.invalidate(&self.schema.name, id).await;
        Ok(())
    }

    pub async fn list(&self, filter: &FilterData) -> Result<ListResult, CrudError> {
        let api = &config::config().api;
        let limit = filter.limit.unwrap_or(api.default_page_size);
        if limit < 1 || limit > api.max_page_size {
            return Err(CrudError::InvalidPagination(format!(
                "limit must be between 1 and {}",
                api.max_page_size
            )));
        }
        let offset = filter.offset.unwrap_or(0);
        if offset < 0 {
            return Err(CrudError::InvalidPagination("offset must not be negative".to_string()));
        }

        let where_data = filter.where_clause.clone().unwrap_or(Value::Null);
        let compiled = FilterWhere::generate(&where_data, &self.filter_columns, 0)?;
        let mut order = match &filter.order {
            Some(order) => FilterOrder::validate_and_parse(order, &self.filter_columns)?,
            None => vec![],
        };
        if order.is_empty() {
            // Stable default ordering: creation time, id as tiebreaker.
            order = vec![
                FilterOrderInfo { column: "created_at".to_string(), sort: SortDirection::Asc },
                FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc },
            ];
        }

        let mut binds = self.convert_params(&compiled.params)?;
        let total = self.count_where(&compiled.clause, &binds).await?;

        let limit_placeholder = binds.len() + 1;
        let offset_placeholder = binds.len() + 2;
        binds.push(BindValue::Int(limit));
        binds.push(BindValue::Int(offset));
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM \"{}\" t WHERE {} {} LIMIT ${} OFFSET ${}",
            self.definition.table_name,
            compiled.clause,
            FilterOrder::generate(&order),
            limit_placeholder,
            offset_placeholder
        );

        let rows = self.fetch_all_with_retry(&sql, &binds).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row.try_get::<Value, _>("record").map_err(CrudError::Database)?);
        }
        Ok(ListResult { items, total, limit, offset })
    }

    pub async fn count(&self, filter: &FilterData) -> Result<i64, CrudError> {
        let where_data = filter.where_clause.clone().unwrap_or(Value::Null);
        let compiled = FilterWhere::generate(&where_data, &self.filter_columns, 0)?;
        let binds = self.convert_params(&compiled.params)?;
        self.count_where(&compiled.clause, &binds).await
    }

    async fn count_where(&self, clause: &str, binds: &[BindValue]) -> Result<i64, CrudError> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM \"{}\" WHERE {}",
            self.definition.table_name, clause
        );
        let row = self.fetch_one_with_retry(&sql, binds).await?;
        row.try_get("total").map_err(CrudError::Database)
    }

    fn not_found(&self, id: Uuid) -> CrudError {
        CrudError::NotFound { schema: self.schema.name.clone(), id }
    }

    fn convert_params(&self, params: &[BoundParam]) -> Result<Vec<BindValue>, CrudError> {
        params.iter().map(|p| self.to_bind(&p.column, &p.value)).collect()
    }

    /// Converts a JSON value to a bind value using the column's storage
    /// type. Mismatches surface as filter errors since record payloads
    /// are validated before they reach this point.
    fn to_bind(&self, column: &str, value: &Value) -> Result<BindValue, CrudError> {
        let column_type = self
            .definition
            .column(column)
            .map(|c| c.column_type)
            .ok_or_else(|| CrudError::Filter(FilterError::UnknownColumn(column.to_string())))?;

        if value.is_null() {
            return Ok(BindValue::Null(column_type));
        }

        let mismatch = || {
            CrudError::Filter(FilterError::InvalidOperatorData(format!(
                "value for column {} does not match its type",
                column
            )))
        };

        match column_type {
            ColumnType::Uuid => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Uuid::parse_str(s).map(BindValue::Uuid).map_err(|_| mismatch())
            }
            ColumnType::Varchar(_) | ColumnType::Text => {
                value.as_str().map(|s| BindValue::Text(s.to_string())).ok_or_else(mismatch)
            }
            ColumnType::BigInt => value.as_i64().map(BindValue::Int).ok_or_else(mismatch),
            ColumnType::Numeric { .. } => {
                let parsed = match value {
                    Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                    Value::String(s) => Decimal::from_str(s).ok(),
                    _ => None,
                };
                parsed.map(BindValue::Dec).ok_or_else(mismatch)
            }
            ColumnType::Boolean => value.as_bool().map(BindValue::Bool).ok_or_else(mismatch),
            ColumnType::TimestampTz => {
                let s = value.as_str().ok_or_else(mismatch)?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| BindValue::Ts(dt.with_timezone(&Utc)))
                    .map_err(|_| mismatch())
            }
        }
    }

    async fn run_fetch_one(&self, sql: &str, binds: &[BindValue]) -> Result<PgRow, sqlx::Error> {
        bind_all(sqlx::query(sql), binds).fetch_one(&self.pool).await
    }

    async fn run_fetch_optional(
        &self,
        sql: &str,
        binds: &[BindValue],
    ) -> Result<Option<PgRow>, sqlx::Error> {
        bind_all(sqlx::query(sql), binds).fetch_optional(&self.pool).await
    }

    async fn run_fetch_all(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<PgRow>, sqlx::Error> {
        bind_all(sqlx::query(sql), binds).fetch_all(&self.pool).await
    }

    async fn fetch_one_with_retry(&self, sql: &str, binds: &[BindValue]) -> Result<PgRow, CrudError> {
        match self.run_fetch_one(sql, binds).await {
            Err(e) if is_transient(&e) => {
                tracing::warn!(schema = %self.schema.name, error = %e, "read failed, retrying once");
                tokio::time::sleep(READ_RETRY_DELAY).await;
                self.run_fetch_one(sql, binds).await.map_err(CrudError::Database)
            }
            other => other.map_err(CrudError::Database),
        }
    }

    async fn fetch_optional_with_retry(
        &self,
        sql: &str,
        binds: &[BindValue],
    ) -> Result<Option<PgRow>, CrudError> {
        match self.run_fetch_optional(sql, binds).await {
            Err(e) if is_transient(&e) => {
                tracing::warn!(schema = %self.schema.name, error = %e, "read failed, retrying once");
                tokio::time::sleep(READ_RETRY_DELAY).await;
                self.run_fetch_optional(sql, binds).await.map_err(CrudError::Database)
            }
            other => other.map_err(CrudError::Database),
        }
    }

    async fn fetch_all_with_retry(
        &self,
        sql: &str,
        binds: &[BindValue],
    ) -> Result<Vec<PgRow>, CrudError> {
        match self.run_fetch_all(sql, binds).await {
            Err(e) if is_transient(&e) => {
                tracing::warn!(schema = %self.schema.name, error = %e, "read failed, retrying once");
                tokio::time::sleep(READ_RETRY_DELAY).await;
                self.run_fetch_all(sql, binds).await.map_err(CrudError::Database)
            }
            other => other.map_err(CrudError::Database),
        }
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_all<'q>(mut q: PgQuery<'q>, binds: &'q [BindValue]) -> PgQuery<'q> {
    for bind in binds {
        q = match bind {
            BindValue::Uuid(v) => q.bind(v),
            BindValue::Text(v) => q.bind(v),
            BindValue::Int(v) => q.bind(v),
            BindValue::Dec(v) => q.bind(v),
            BindValue::Bool(v) => q.bind(v),
            BindValue::Ts(v) => q.bind(v),
            BindValue::Null(column_type) => match column_type {
                ColumnType::Uuid => q.bind(None::<Uuid>),
                ColumnType::Varchar(_) | ColumnType::Text => q.bind(None::<String>),
                ColumnType::BigInt => q.bind(None::<i64>),
                ColumnType::Numeric { .. } => q.bind(None::<Decimal>),
                ColumnType::Boolean => q.bind(None::<bool>),
                ColumnType::TimestampTz => q.bind(None::<DateTime<Utc>>),
            },
        };
    }
    q
}

/// Transient connection-level failures worth one retry on reads.
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
}

/// Unique and check violations become conflicts; everything else is a
/// plain database error.
fn map_write_error(err: sqlx::Error) -> CrudError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if code.starts_with("23") {
                return CrudError::Constraint(db_err.message().to_string());
            }
        }
    }
    CrudError::Database(err)
}
