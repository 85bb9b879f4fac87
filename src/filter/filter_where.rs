use std::collections::HashSet;

use serde_json::Value;

use super::error::FilterError;
use super::types::{BoundParam, FilterOp, FilterWhereInfo, SqlResult};

/// Compiles a JSON `where` clause into a parameterized SQL predicate.
///
/// Every column reference is checked against the set of columns the
/// target table actually has, so a filter can never probe outside its
/// own schema. Values always travel as bind parameters.
pub struct FilterWhere<'a> {
    allowed_columns: &'a HashSet<String>,
    param_values: Vec<BoundParam>,
    param_index: usize,
}

enum Condition {
    Field(FilterWhereInfo),
    Group(String),
}

impl<'a> FilterWhere<'a> {
    pub fn generate(
        where_data: &Value,
        allowed_columns: &'a HashSet<String>,
        starting_param_index: usize,
    ) -> Result<SqlResult, FilterError> {
        let mut builder = Self {
            allowed_columns,
            param_values: vec![],
            param_index: starting_param_index,
        };
        let conditions = builder.parse_where_data(where_data)?;

        let mut sql_parts = Vec::new();
        for condition in &conditions {
            match condition {
                Condition::Field(info) => sql_parts.push(builder.build_sql_condition(info)?),
                Condition::Group(sql) => sql_parts.push(sql.clone()),
            }
        }
        let clause = if sql_parts.is_empty() {
            "1=1".to_string()
        } else {
            sql_parts.join(" AND ")
        };
        Ok(SqlResult { clause, params: builder.param_values })
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<Vec<Condition>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut conditions = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(self.parse_logical_operator(key, value)?);
                    } else {
                        conditions.extend(self.parse_field_condition(key, value)?);
                    }
                }
                Ok(conditions)
            }
            _ => Err(FilterError::InvalidWhereClause(
                "WHERE must be a JSON object".to_string(),
            )),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                if arr.is_empty() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} requires a non-empty array",
                        op
                    )));
                }
                let mut sql_parts = Vec::new();
                for v in arr {
                    let sub = Self::generate(v, self.allowed_columns, self.param_index)?;
                    self.param_index += sub.params.len();
                    self.param_values.extend(sub.params);
                    sql_parts.push(format!("({})", sub.clause));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(Condition::Group(sql_parts.join(joiner)))
            }
            "$not" => {
                let sub = Self::generate(value, self.allowed_columns, self.param_index)?;
                self.param_index += sub.params.len();
                self.param_values.extend(sub.params);
                Ok(Condition::Group(format!("NOT ({})", sub.clause)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        if !self.allowed_columns.contains(field) {
            return Err(FilterError::UnknownColumn(field.to_string()));
        }
        let mut conditions = Vec::new();
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                conditions.push(Condition::Field(FilterWhereInfo {
                    column: field.to_string(),
                    operator,
                    data: op_val.clone(),
                }));
            }
        } else {
            // Implicit equality: { field: value }
            conditions.push(Condition::Field(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }));
        }
        Ok(conditions)
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = condition.column.as_str();
        let quoted = format!("\"{}\"", column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NULL", quoted))
                } else {
                    Ok(format!("{} = {}", quoted, self.param(column, condition.data.clone())))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NOT NULL", quoted))
                } else {
                    Ok(format!("{} <> {}", quoted, self.param(column, condition.data.clone())))
                }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::Lt => Ok(format!("{} < {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::ILike => Ok(format!("{} ILIKE {}", quoted, self.param(column, condition.data.clone()))),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() {
                        return Ok("1=0".to_string());
                    }
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(column, v.clone())).collect();
                    Ok(format!("{} IN ({})", quoted, params.join(", ")))
                } else {
                    Err(FilterError::InvalidOperatorData("$in requires an array".to_string()))
                }
            }
            FilterOp::Between => {
                if let Value::Array(values) = &condition.data {
                    if values.len() != 2 {
                        return Err(FilterError::InvalidOperatorData(
                            "$between requires exactly 2 values".to_string(),
                        ));
                    }
                    Ok(format!(
                        "{} BETWEEN {} AND {}",
                        quoted,
                        self.param(column, values[0].clone()),
                        self.param(column, values[1].clone())
                    ))
                } else {
                    Err(FilterError::InvalidOperatorData(
                        "$between requires an array with 2 values".to_string(),
                    ))
                }
            }
        }
    }

    fn param(&mut self, column: &str, value: Value) -> String {
        self.param_values.push(BoundParam { column: column.to_string(), value });
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
