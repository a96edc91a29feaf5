//! In-process adapter: tables as vectors of JSON rows behind a lock. For tests and demos.

use crate::adapter::Adapter;
use crate::error::AppError;
use crate::id::IdType;
use crate::model::{Cardinality, ModelDef, RelationshipDescriptor};
use crate::query::{Filter, ListQuery, Page, Sort, SortDirection};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryAdapter {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Row>>>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::Conflict("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Row>>>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::Conflict("memory store lock poisoned".into()))
    }

    /// Number of rows currently stored in `table` (unqualified or "schema.table").
    pub fn row_count(&self, table: &str) -> usize {
        self.read().map(|t| t.get(table).map(Vec::len).unwrap_or(0)).unwrap_or(0)
    }
}

fn table_key(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(s) => format!("{}.{}", s, table),
        None => table.to_string(),
    }
}

fn model_key(model: &ModelDef) -> String {
    table_key(model.schema.as_deref(), &model.table)
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::String(s), Value::String(t)) => s == t || s.replace('-', "") == t.replace('-', ""),
        _ => a == b,
    }
}

fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(n), Value::Number(m)) => n
            .as_f64()
            .partial_cmp(&m.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(s), Value::String(t)) => s.cmp(t),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| value_eq(field(row, &f.column), &f.value))
}

fn sort_rows(rows: &mut [Row], sort: &[Sort], pk: &str) {
    rows.sort_by(|a, b| {
        for s in sort {
            let ord = value_cmp(field(a, &s.column), field(b, &s.column));
            let ord = match s.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        value_cmp(field(a, pk), field(b, pk))
    });
}

fn paginate(mut rows: Vec<Row>, query: &ListQuery, pk: &str) -> Page {
    rows.retain(|r| matches(r, &query.filters));
    sort_rows(&mut rows, &query.sort, pk);
    let total = rows.len() as u64;
    let rows = rows
        .into_iter()
        .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
        .take(query.limit as usize)
        .map(Value::Object)
        .collect();
    Page { rows, total }
}

fn generate_id(model: &ModelDef, rows: &[Row]) -> Result<Value, AppError> {
    match model.id_type() {
        IdType::Uuid => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
        IdType::Int => {
            let max = rows
                .iter()
                .filter_map(|r| r.get(&model.primary_key).and_then(Value::as_i64))
                .max()
                .unwrap_or(0);
            Ok(Value::Number((max + 1).into()))
        }
        IdType::Str => Err(AppError::Validation(format!("{} is required", model.primary_key))),
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, model: &ModelDef, values: &Map<String, Value>) -> Result<Value, AppError> {
        let mut tables = self.write()?;
        let rows = tables.entry(model_key(model)).or_default();
        let id = match values.get(&model.primary_key) {
            Some(v) if !v.is_null() => v.clone(),
            _ => generate_id(model, rows)?,
        };
        if rows.iter().any(|r| value_eq(field(r, &model.primary_key), &id)) {
            return Err(AppError::Conflict(format!("{} {} already exists", model.name, id)));
        }
        let mut row = Row::new();
        for c in &model.columns {
            let v = values.get(&c.name).cloned().unwrap_or(Value::Null);
            row.insert(c.name.clone(), v);
        }
        row.insert(model.primary_key.clone(), id);
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn fetch_one(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError> {
        let tables = self.read()?;
        Ok(tables
            .get(&model_key(model))
            .and_then(|rows| rows.iter().find(|r| value_eq(field(r, &model.primary_key), id)))
            .cloned()
            .map(Value::Object))
    }

    async fn fetch_page(&self, model: &ModelDef, query: &ListQuery) -> Result<Page, AppError> {
        let rows = self.read()?.get(&model_key(model)).cloned().unwrap_or_default();
        Ok(paginate(rows, query, &model.primary_key))
    }

    async fn update(
        &self,
        model: &ModelDef,
        id: &Value,
        values: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let mut tables = self.write()?;
        let Some(row) = tables
            .get_mut(&model_key(model))
            .and_then(|rows| rows.iter_mut().find(|r| value_eq(field(r, &model.primary_key), id)))
        else {
            return Ok(None);
        };
        for (k, v) in values {
            if *k != model.primary_key && model.has_column(k) {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError> {
        let mut tables = self.write()?;
        let Some(rows) = tables.get_mut(&model_key(model)) else {
            return Ok(None);
        };
        let pos = rows.iter().position(|r| value_eq(field(r, &model.primary_key), id));
        Ok(pos.map(|i| Value::Object(rows.remove(i))))
    }

    async fn fetch_related(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        query: &ListQuery,
    ) -> Result<Page, AppError> {
        let record = self
            .fetch_one(model, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", model.name, id)))?;
        let local = record.get(&rel.local_column).cloned().unwrap_or(Value::Null);
        if local.is_null() {
            return Ok(Page::default());
        }
        let tables = self.read()?;
        let target = &rel.target;
        let candidates = tables.get(&model_key(target)).cloned().unwrap_or_default();
        let related: Vec<Row> = match &rel.secondary {
            None => candidates
                .into_iter()
                .filter(|r| value_eq(field(r, &rel.remote_column), &local))
                .collect(),
            Some(sec) => {
                let keys: Vec<Value> = tables
                    .get(&table_key(sec.schema.as_deref(), &sec.table))
                    .map(|rows| {
                        rows.iter()
                            .filter(|r| value_eq(field(r, &sec.local_column), &local))
                            .map(|r| field(r, &sec.remote_column).clone())
                            .collect()
                    })
                    .unwrap_or_default();
                candidates
                    .into_iter()
                    .filter(|r| keys.iter().any(|k| value_eq(field(r, &rel.remote_column), k)))
                    .collect()
            }
        };
        Ok(paginate(related, query, &target.primary_key))
    }

    async fn set_relations(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        ids: &[Value],
    ) -> Result<(), AppError> {
        let record = self
            .fetch_one(model, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", model.name, id)))?;
        let local = record.get(&rel.local_column).cloned().unwrap_or(Value::Null);
        let target = &rel.target;
        let mut tables = self.write()?;
        let target_rows = tables.entry(model_key(target)).or_default();
        let mut remote_keys = Vec::with_capacity(ids.len());
        for wanted in ids {
            let row = target_rows
                .iter()
                .find(|r| value_eq(field(r, &target.primary_key), wanted))
                .ok_or_else(|| AppError::Validation(format!("unknown {} id {}", target.name, wanted)))?;
            remote_keys.push(field(row, &rel.remote_column).clone());
        }
        match (rel.cardinality, &rel.secondary) {
            (Cardinality::OneToMany, _) => {
                for row in target_rows.iter_mut() {
                    let selected = ids.iter().any(|w| value_eq(field(row, &target.primary_key), w));
                    if selected {
                        row.insert(rel.remote_column.clone(), local.clone());
                    } else if value_eq(field(row, &rel.remote_column), &local) {
                        row.insert(rel.remote_column.clone(), Value::Null);
                    }
                }
            }
            (Cardinality::ManyToMany, Some(sec)) => {
                let join = tables.entry(table_key(sec.schema.as_deref(), &sec.table)).or_default();
                join.retain(|r| !value_eq(field(r, &sec.local_column), &local));
                for key in remote_keys {
                    let mut row = Row::new();
                    row.insert(sec.local_column.clone(), local.clone());
                    row.insert(sec.remote_column.clone(), key);
                    join.push(row);
                }
            }
            _ => {
                return Err(AppError::BadRequest(format!(
                    "relationship '{}' is not a collection",
                    rel.name
                )))
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, ModelCatalog, RelationshipDef, RelationshipInspector, Secondary};
    use serde_json::json;
    use std::sync::Arc;

    fn catalog() -> ModelCatalog {
        let mut c = ModelCatalog::new();
        c.add_model(
            ModelDef::new("Group", "groups", "id")
                .column(ColumnDef::new("id", "integer"))
                .column(ColumnDef::new("name", "text")),
        )
        .unwrap();
        c.add_model(
            ModelDef::new("User", "users", "id")
                .column(ColumnDef::new("id", "integer"))
                .column(ColumnDef::new("name", "text"))
                .column(ColumnDef::new("group_id", "integer")),
        )
        .unwrap();
        c.relationship(RelationshipDef {
            model: "Group".into(),
            name: "users".into(),
            target: "User".into(),
            cardinality: Cardinality::OneToMany,
            local_column: "id".into(),
            remote_column: "group_id".into(),
            secondary: None,
        });
        c.relationship(RelationshipDef {
            model: "User".into(),
            name: "groups".into(),
            target: "Group".into(),
            cardinality: Cardinality::ManyToMany,
            local_column: "id".into(),
            remote_column: "id".into(),
            secondary: Some(Secondary {
                schema: None,
                table: "user_groups".into(),
                local_column: "user_id".into(),
                remote_column: "group_id".into(),
            }),
        });
        c.configure().unwrap();
        c
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_generates_integer_ids_and_lists_sorted() {
        let c = catalog();
        let group: Arc<ModelDef> = c.model("Group").unwrap();
        let db = MemoryAdapter::new();
        db.insert(&group, &obj(json!({"name": "Orcs"}))).await.unwrap();
        let elves = db.insert(&group, &obj(json!({"name": "Elves"}))).await.unwrap();
        assert_eq!(elves["id"], json!(2));

        let mut q = ListQuery::default();
        q.sort = vec![Sort { column: "name".into(), direction: SortDirection::Asc }];
        let page = db.fetch_page(&group, &q).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.rows[0]["name"], json!("Elves"));

        q.filters = vec![Filter { column: "name".into(), value: json!("Orcs") }];
        let page = db.fetch_page(&group, &q).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn duplicate_key_conflicts() {
        let c = catalog();
        let group = c.model("Group").unwrap();
        let db = MemoryAdapter::new();
        db.insert(&group, &obj(json!({"id": 1, "name": "a"}))).await.unwrap();
        let err = db.insert(&group, &obj(json!({"id": 1, "name": "b"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn one_to_many_set_and_fetch() {
        let c = catalog();
        let group = c.model("Group").unwrap();
        let user = c.model("User").unwrap();
        let rel = c.inspect("Group").into_iter().find(|r| r.name == "users").unwrap();
        let db = MemoryAdapter::new();
        db.insert(&group, &obj(json!({"name": "Elves"}))).await.unwrap();
        for name in ["a", "b", "c"] {
            db.insert(&user, &obj(json!({ "name": name }))).await.unwrap();
        }
        db.set_relations(&group, &rel, &json!(1), &[json!(1), json!(3)]).await.unwrap();
        let page = db.fetch_related(&group, &rel, &json!(1), &ListQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        let past_end = ListQuery { page: 5, ..ListQuery::default() };
        let page = db.fetch_related(&group, &rel, &json!(1), &past_end).await.unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 2);

        db.set_relations(&group, &rel, &json!(1), &[json!(2)]).await.unwrap();
        let page = db.fetch_related(&group, &rel, &json!(1), &ListQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0]["name"], json!("b"));
    }

    #[tokio::test]
    async fn many_to_many_replaces_join_rows() {
        let c = catalog();
        let group = c.model("Group").unwrap();
        let user = c.model("User").unwrap();
        let rel = c.inspect("User").into_iter().find(|r| r.name == "groups").unwrap();
        let db = MemoryAdapter::new();
        for name in ["x", "y"] {
            db.insert(&group, &obj(json!({ "name": name }))).await.unwrap();
        }
        db.insert(&user, &obj(json!({"name": "u"}))).await.unwrap();
        db.set_relations(&user, &rel, &json!(1), &[json!(1), json!(2)]).await.unwrap();
        assert_eq!(db.row_count("user_groups"), 2);
        db.set_relations(&user, &rel, &json!(1), &[json!(2)]).await.unwrap();
        assert_eq!(db.row_count("user_groups"), 1);
        let page = db.fetch_related(&user, &rel, &json!(1), &ListQuery::default()).await.unwrap();
        assert_eq!(page.rows[0]["name"], json!("y"));

        let err = db.set_relations(&user, &rel, &json!(1), &[json!(99)]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
