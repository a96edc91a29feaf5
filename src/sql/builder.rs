//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and relation statements from model metadata.

use crate::model::{ModelDef, RelationshipDescriptor, Secondary};
use crate::query::{Filter, ListQuery, SortDirection};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from model metadata).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(s) => format!("{}.{}", quoted(s), quoted(table)),
        None => quoted(table),
    }
}

fn model_table(model: &ModelDef) -> String {
    qualified_table(model.schema.as_deref(), &model.table)
}

fn secondary_table(sec: &Secondary) -> String {
    qualified_table(sec.schema.as_deref(), &sec.table)
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder for a value bound to `column` of `model`, cast to the column type.
    /// Nulls bind as untyped text, so they are always cast.
    fn placeholder(&mut self, model: &ModelDef, column: &str, v: Value) -> String {
        let is_null = v.is_null();
        let n = self.push_param(v);
        match model.get_column(column).map(|c| c.pg_type.as_str()) {
            Some(t) if is_null || needs_cast(t) => format!("${}::{}", n, t),
            _ => format!("${}", n),
        }
    }
}

/// Text-bound values need a cast for these column types.
fn needs_cast(pg_type: &str) -> bool {
    let lower = pg_type.to_lowercase();
    lower.contains("uuid")
        || lower.starts_with("timestamp")
        || lower == "date"
        || lower.starts_with("json")
        || pg_type.contains('.')
}

/// SELECT list with `alias.` prefix; custom enums and numerics come back as text.
fn select_column_list(model: &ModelDef, alias: &str) -> String {
    model
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.pg_type.contains('.') || c.pg_type.eq_ignore_ascii_case("numeric") {
                format!("{}.{}::text AS {}", alias, q, q)
            } else {
                format!("{}.{}", alias, q)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, model: &ModelDef, alias: &str, filters: &[Filter], mut parts: Vec<String>) -> String {
    for f in filters {
        if !model.has_column(&f.column) {
            continue;
        }
        if f.value.is_null() {
            parts.push(format!("{}.{} IS NULL", alias, quoted(&f.column)));
            continue;
        }
        let ph = q.placeholder(model, &f.column, f.value.clone());
        parts.push(format!("{}.{} = {}", alias, quoted(&f.column), ph));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(model: &ModelDef, alias: &str, query: &ListQuery) -> String {
    let mut parts: Vec<String> = query
        .sort
        .iter()
        .filter(|s| model.has_column(&s.column))
        .map(|s| {
            let dir = match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{}.{} {}", alias, quoted(&s.column), dir)
        })
        .collect();
    parts.push(format!("{}.{}", alias, quoted(&model.primary_key)));
    format!(" ORDER BY {}", parts.join(", "))
}

fn page_clause(query: &ListQuery) -> String {
    format!(" LIMIT {} OFFSET {}", query.limit, query.offset())
}

/// SELECT by primary key.
pub fn select_by_id(model: &ModelDef, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "SELECT {} FROM {} t WHERE t.{} = {}",
        select_column_list(model, "t"),
        model_table(model),
        quoted(&model.primary_key),
        ph
    );
    q
}

/// One page of rows plus `COUNT(*) OVER ()` as `__total` for pagination meta.
pub fn select_page(model: &ModelDef, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, "t", &query.filters, Vec::new());
    q.sql = format!(
        "SELECT {}, COUNT(*) OVER () AS \"__total\" FROM {} t{}{}{}",
        select_column_list(model, "t"),
        model_table(model),
        where_sql,
        order_clause(model, "t", query),
        page_clause(query)
    );
    q
}

/// Unpaginated count, used when a page comes back empty and the window total is unavailable.
pub fn count(model: &ModelDef, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, "t", filters, Vec::new());
    q.sql = format!("SELECT COUNT(*) FROM {} t{}", model_table(model), where_sql);
    q
}

/// Subquery yielding the owner's `local_column` for the record with primary key `$n`.
fn owner_key_subquery(q: &mut QueryBuf, model: &ModelDef, rel: &RelationshipDescriptor, id: &Value) -> String {
    let ph = q.placeholder(model, &model.primary_key, id.clone());
    format!(
        "SELECT o.{} FROM {} o WHERE o.{} = {}",
        quoted(&rel.local_column),
        model_table(model),
        quoted(&model.primary_key),
        ph
    )
}

/// Condition restricting target rows (alias `t`) to those related to record `id`.
fn related_condition(q: &mut QueryBuf, model: &ModelDef, rel: &RelationshipDescriptor, id: &Value) -> String {
    let owner_key = owner_key_subquery(q, model, rel, id);
    match &rel.secondary {
        None => format!("t.{} IN ({})", quoted(&rel.remote_column), owner_key),
        Some(sec) => format!(
            "t.{} IN (SELECT s.{} FROM {} s WHERE s.{} IN ({}))",
            quoted(&rel.remote_column),
            quoted(&sec.remote_column),
            secondary_table(sec),
            quoted(&sec.local_column),
            owner_key
        ),
    }
}

/// Rows of the relationship target related to record `id`, paginated like `select_page`.
pub fn select_related(model: &ModelDef, rel: &RelationshipDescriptor, id: &Value, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = &rel.target;
    let link = related_condition(&mut q, model, rel, id);
    let where_sql = where_clause(&mut q, target, "t", &query.filters, vec![link]);
    q.sql = format!(
        "SELECT {}, COUNT(*) OVER () AS \"__total\" FROM {} t{}{}{}",
        select_column_list(target, "t"),
        model_table(target),
        where_sql,
        order_clause(target, "t", query),
        page_clause(query)
    );
    q
}

/// Unpaginated count behind `select_related`.
pub fn count_related(model: &ModelDef, rel: &RelationshipDescriptor, id: &Value, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let link = related_condition(&mut q, model, rel, id);
    let where_sql = where_clause(&mut q, &rel.target, "t", filters, vec![link]);
    q.sql = format!("SELECT COUNT(*) FROM {} t{}", model_table(&rel.target), where_sql);
    q
}

/// INSERT columns present in `values`; omitted columns fall back to DB defaults.
pub fn insert(model: &ModelDef, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let Some(v) = values.get(&c.name) else { continue };
        if v.is_null() && c.has_default {
            continue;
        }
        placeholders.push(q.placeholder(model, &c.name, v.clone()));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(model, model_table(model).as_str());
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", model_table(model), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            model_table(model),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only known, non-key columns present in `values`.
pub fn update(model: &ModelDef, id: &Value, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &model.columns {
        if c.name == model.primary_key {
            continue;
        }
        let Some(v) = values.get(&c.name) else { continue };
        let rhs = q.placeholder(model, &c.name, v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return select_by_id(model, id);
    }
    let id_ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        model_table(model),
        sets.join(", "),
        quoted(&model.primary_key),
        id_ph,
        select_column_list(model, model_table(model).as_str())
    );
    q
}

/// DELETE by id, returning the deleted row.
pub fn delete(model: &ModelDef, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, &model.primary_key, id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        model_table(model),
        quoted(&model.primary_key),
        ph,
        select_column_list(model, model_table(model).as_str())
    );
    q
}

/// One-to-many: detach target rows pointing at the owner that are not in `ids`.
pub fn detach_one_to_many(model: &ModelDef, rel: &RelationshipDescriptor, id: &Value, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = &rel.target;
    let owner_key = owner_key_subquery(&mut q, model, rel, id);
    let mut sql = format!(
        "UPDATE {} SET {} = NULL WHERE {} IN ({})",
        model_table(target),
        quoted(&rel.remote_column),
        quoted(&rel.remote_column),
        owner_key
    );
    if !ids.is_empty() {
        let phs: Vec<String> = ids
            .iter()
            .map(|v| q.placeholder(target, &target.primary_key, v.clone()))
            .collect();
        sql.push_str(&format!(" AND {} NOT IN ({})", quoted(&target.primary_key), phs.join(", ")));
    }
    q.sql = sql;
    q
}

/// One-to-many: point the target rows in `ids` at the owner. Caller skips this when `ids` is empty.
pub fn attach_one_to_many(model: &ModelDef, rel: &RelationshipDescriptor, id: &Value, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = &rel.target;
    let owner_key = owner_key_subquery(&mut q, model, rel, id);
    let phs: Vec<String> = ids
        .iter()
        .map(|v| q.placeholder(target, &target.primary_key, v.clone()))
        .collect();
    q.sql = format!(
        "UPDATE {} SET {} = ({}) WHERE {} IN ({})",
        model_table(target),
        quoted(&rel.remote_column),
        owner_key,
        quoted(&target.primary_key),
        phs.join(", ")
    );
    q
}

/// Many-to-many: remove every join row of the owner.
pub fn clear_secondary(model: &ModelDef, rel: &RelationshipDescriptor, sec: &Secondary, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let owner_key = owner_key_subquery(&mut q, model, rel, id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        secondary_table(sec),
        quoted(&sec.local_column),
        owner_key
    );
    q
}

/// Many-to-many: insert one join row per target primary key in `ids`. Caller skips this when `ids` is empty.
pub fn fill_secondary(
    model: &ModelDef,
    rel: &RelationshipDescriptor,
    sec: &Secondary,
    id: &Value,
    ids: &[Value],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = &rel.target;
    let owner_key = owner_key_subquery(&mut q, model, rel, id);
    let phs: Vec<String> = ids
        .iter()
        .map(|v| q.placeholder(target, &target.primary_key, v.clone()))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}, {}) SELECT ({}), t.{} FROM {} t WHERE t.{} IN ({})",
        secondary_table(sec),
        quoted(&sec.local_column),
        quoted(&sec.remote_column),
        owner_key,
        quoted(&rel.remote_column),
        model_table(target),
        quoted(&target.primary_key),
        phs.join(", ")
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, ColumnDef};
    use crate::query::Sort;
    use serde_json::json;
    use std::sync::Arc;

    fn group() -> ModelDef {
        ModelDef::new("Group", "groups", "id")
            .in_schema("app")
            .column(ColumnDef::new("id", "uuid").not_null().with_default())
            .column(ColumnDef::new("name", "text"))
    }

    fn user() -> ModelDef {
        ModelDef::new("User", "users", "id")
            .in_schema("app")
            .column(ColumnDef::new("id", "bigint").not_null().with_default())
            .column(ColumnDef::new("group_id", "uuid"))
    }

    fn users_rel() -> RelationshipDescriptor {
        RelationshipDescriptor {
            name: "users".into(),
            cardinality: Cardinality::OneToMany,
            target: Arc::new(user()),
            local_column: "id".into(),
            remote_column: "group_id".into(),
            secondary: None,
        }
    }

    #[test]
    fn select_page_filters_sorts_and_paginates() {
        let mut query = ListQuery::default();
        query.page = 2;
        query.sort = vec![Sort { column: "name".into(), direction: SortDirection::Desc }];
        query.filters = vec![Filter { column: "name".into(), value: json!("Elves") }];
        let q = select_page(&group(), &query);
        assert_eq!(
            q.sql,
            "SELECT t.\"id\", t.\"name\", COUNT(*) OVER () AS \"__total\" FROM \"app\".\"groups\" t \
             WHERE t.\"name\" = $1 ORDER BY t.\"name\" DESC, t.\"id\" LIMIT 10 OFFSET 10"
        );
        assert_eq!(q.params, vec![json!("Elves")]);
    }

    #[test]
    fn uuid_keys_are_cast() {
        let q = select_by_id(&group(), &json!("0f8fad5b-d9cb-469f-a165-70867728950e"));
        assert!(q.sql.ends_with("WHERE t.\"id\" = $1::uuid"));
    }

    #[test]
    fn insert_skips_missing_columns() {
        let values = json!({"name": "Orcs"});
        let q = insert(&group(), values.as_object().unwrap());
        assert!(q.sql.starts_with("INSERT INTO \"app\".\"groups\" (\"name\") VALUES ($1) RETURNING"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn related_select_goes_through_owner_key() {
        let q = select_related(&group(), &users_rel(), &json!("g"), &ListQuery::default());
        assert!(q.sql.contains(
            "WHERE t.\"group_id\" IN (SELECT o.\"id\" FROM \"app\".\"groups\" o WHERE o.\"id\" = $1::uuid)"
        ));
    }

    #[test]
    fn related_count_shares_the_owner_filter() {
        let filters = vec![Filter { column: "group_id".into(), value: json!("g") }];
        let q = count_related(&group(), &users_rel(), &json!("g"), &filters);
        assert!(q.sql.starts_with("SELECT COUNT(*) FROM \"app\".\"users\" t WHERE t.\"group_id\" IN (SELECT o.\"id\""));
        assert!(!q.sql.contains("LIMIT"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn attach_binds_target_keys_after_owner() {
        let q = attach_one_to_many(&group(), &users_rel(), &json!("g"), &[json!(1), json!(2)]);
        assert!(q.sql.ends_with("WHERE \"id\" IN ($2, $3)"));
        assert_eq!(q.params.len(), 3);
    }
}
