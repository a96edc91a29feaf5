//! List query semantics: pagination, sorting, equality filters, and the response meta.

use crate::error::AppError;
use crate::model::ModelDef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

/// Exact-match filter on one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort: Vec<Sort>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            page: 1,
            limit: DEFAULT_LIMIT,
            sort: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl ListQuery {
    pub fn with_limit(limit: u32) -> Self {
        ListQuery {
            limit: limit.clamp(1, MAX_LIMIT),
            ..Default::default()
        }
    }

    /// Parse `page`, `limit`, `sort` ("name asc,id desc") and `where` (JSON) query params.
    /// Columns are checked against `model`.
    pub fn from_params(
        model: &ModelDef,
        params: &HashMap<String, String>,
        default_limit: u32,
    ) -> Result<Self, AppError> {
        let mut q = ListQuery::with_limit(default_limit);
        if let Some(p) = params.get("page") {
            q.page = p
                .parse::<u32>()
                .map_err(|_| AppError::BadRequest("page must be a positive integer".into()))?
                .max(1);
        }
        if let Some(l) = params.get("limit") {
            q.limit = l
                .parse::<u32>()
                .map_err(|_| AppError::BadRequest("limit must be a positive integer".into()))?
                .clamp(1, MAX_LIMIT);
        }
        if let Some(s) = params.get("sort") {
            q.sort = parse_sort(model, s)?;
        }
        if let Some(w) = params.get("where") {
            q.filters = parse_where(model, w)?;
        }
        Ok(q)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

fn parse_sort(model: &ModelDef, s: &str) -> Result<Vec<Sort>, AppError> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut words = part.split_whitespace();
        let column = words.next().unwrap_or_default();
        let direction = match words.next().map(str::to_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(AppError::BadRequest(format!("invalid sort direction: {}", other))),
        };
        if !model.has_column(column) {
            return Err(AppError::BadRequest(format!("cannot sort by unknown column: {}", column)));
        }
        out.push(Sort {
            column: column.to_string(),
            direction,
        });
    }
    Ok(out)
}

fn parse_where(model: &ModelDef, w: &str) -> Result<Vec<Filter>, AppError> {
    let value: Value =
        serde_json::from_str(w).map_err(|e| AppError::BadRequest(format!("where must be JSON: {}", e)))?;
    let objects = match value {
        Value::Object(m) => vec![m],
        Value::Array(items) => items
            .into_iter()
            .map(|i| match i {
                Value::Object(m) => Ok(m),
                _ => Err(AppError::BadRequest("where list entries must be objects".into())),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(AppError::BadRequest("where must be an object or a list of objects".into())),
    };
    let mut out = Vec::new();
    for obj in objects {
        for (column, value) in obj {
            if !model.has_column(&column) {
                return Err(AppError::BadRequest(format!("cannot filter by unknown column: {}", column)));
            }
            if value.is_object() || value.is_array() {
                return Err(AppError::BadRequest(format!(
                    "unsupported filter expression on {}",
                    column
                )));
            }
            out.push(Filter { column, value });
        }
    }
    Ok(out)
}

/// One page of records plus the unpaginated total.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
}

/// A page together with the query that produced it, after any hook rewrites.
#[derive(Clone, Debug)]
pub struct Listing {
    pub query: ListQuery,
    pub page: Page,
}

impl Listing {
    pub fn meta(&self) -> Meta {
        Meta::new(&self.query, self.page.total)
    }
}

/// Pagination meta of a list response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
    pub records: u64,
}

impl Meta {
    pub fn new(query: &ListQuery, records: u64) -> Self {
        let limit = u64::from(query.limit.max(1));
        Meta {
            page: query.page,
            limit: query.limit,
            pages: records.div_ceil(limit),
            records,
        }
    }
}
