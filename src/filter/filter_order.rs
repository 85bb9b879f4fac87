use std::collections::HashSet;

use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};

/// Parses `order` specs into validated column/direction pairs.
///
/// Accepts three shapes: `"name desc"`, `["name desc", "price"]`, or
/// `{ "name": "desc", "price": "asc" }`.
pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(
        order: &Value,
        allowed_columns: &HashSet<String>,
    ) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        _ => {
                            return Err(FilterError::InvalidOrder(
                                "order array entries must be strings".to_string(),
                            ))
                        }
                    }
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (column, dir) in obj {
                    let sort = Self::parse_direction(dir.as_str().unwrap_or("asc"))?;
                    out.push(FilterOrderInfo { column: column.clone(), sort });
                }
                out
            }
            _ => {
                return Err(FilterError::InvalidOrder(
                    "order must be a string, array, or object".to_string(),
                ))
            }
        };
        for info in &infos {
            if !allowed_columns.contains(&info.column) {
                return Err(FilterError::UnknownColumn(info.column.clone()));
            }
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(column) = it.next() {
                let sort = match it.next() {
                    Some(dir) => Self::parse_direction(dir)?,
                    None => SortDirection::Asc,
                };
                if it.next().is_some() {
                    return Err(FilterError::InvalidOrder(format!(
                        "unparseable order token: {}",
                        trimmed
                    )));
                }
                out.push(FilterOrderInfo { column: column.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOrder(format!("unknown sort direction: {}", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn string_form() {
        let cols = columns(&["created_at", "name"]);
        let infos =
            FilterOrder::validate_and_parse(&json!("created_at desc, name"), &cols).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].sort, SortDirection::Desc);
        assert_eq!(infos[1].sort, SortDirection::Asc);
    }

    #[test]
    fn object_form() {
        let cols = columns(&["price"]);
        let infos = FilterOrder::validate_and_parse(&json!({"price": "desc"}), &cols).unwrap();
        assert_eq!(infos, vec![FilterOrderInfo { column: "price".to_string(), sort: SortDirection::Desc }]);
    }

    #[test]
    fn unknown_column_rejected() {
        let cols = columns(&["name"]);
        let err = FilterOrder::validate_and_parse(&json!("bogus desc"), &cols).unwrap_err();
        assert!(matches!(err, FilterError::UnknownColumn(c) if c == "bogus"));
    }

    #[test]
    fn bad_direction_rejected() {
        let cols = columns(&["name"]);
        let err = FilterOrder::validate_and_parse(&json!("name sideways"), &cols).unwrap_err();
        assert!(matches!(err, FilterError::InvalidOrder(_)));
    }

    #[test]
    fn generates_order_by_clause() {
        let infos = vec![
            FilterOrderInfo { column: "created_at".to_string(), sort: SortDirection::Desc },
            FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc },
        ];
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"created_at\" DESC, \"id\" ASC");
    }

    #[test]
    fn empty_spec_generates_nothing() {
        assert_eq!(FilterOrder::generate(&[]), "");
    }
}
