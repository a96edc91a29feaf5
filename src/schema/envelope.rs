//! Request and response envelopes keyed by the resource's singular or plural name.

use crate::error::AppError;
use crate::links::LinkBuilder;
use crate::schema::SchemaDef;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Anything a linked record can be derived from: a JSON object, a map, or a database row.
pub trait RecordSource {
    /// The record as a column → value map, or None when this is not record-like.
    fn to_record(&self) -> Option<Map<String, Value>>;
}

impl RecordSource for Value {
    fn to_record(&self) -> Option<Map<String, Value>> {
        self.as_object().cloned()
    }
}

impl RecordSource for Map<String, Value> {
    fn to_record(&self) -> Option<Map<String, Value>> {
        Some(self.clone())
    }
}

impl RecordSource for sqlx::postgres::PgRow {
    fn to_record(&self) -> Option<Map<String, Value>> {
        match crate::adapter::row_to_json(self) {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn to_record(&self) -> Option<Map<String, Value>> {
        (**self).to_record()
    }
}

/// Turns raw records into response records with embedded `links`.
#[derive(Clone, Debug)]
pub struct LinkedRecordBuilder {
    schema: SchemaDef,
    links: LinkBuilder,
    primary_key: String,
}

impl LinkedRecordBuilder {
    pub fn new(schema: SchemaDef, links: LinkBuilder, primary_key: impl Into<String>) -> Self {
        LinkedRecordBuilder {
            schema,
            links,
            primary_key: primary_key.into(),
        }
    }

    pub fn schema(&self) -> &SchemaDef {
        &self.schema
    }

    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    /// Response fields of `record` plus `links` computed from its primary key.
    /// A record without a primary key value gets `links: null`.
    pub fn build(&self, record: &Map<String, Value>) -> Value {
        let mut out = self.schema.project(record);
        let links = match record.get(&self.primary_key) {
            Some(id) if !id.is_null() => {
                Value::Object(self.links.build(id).into_iter().map(|(k, v)| (k, Value::String(v))).collect())
            }
            _ => Value::Null,
        };
        out.insert("links".to_string(), links);
        Value::Object(out)
    }
}

/// Construction input for a single envelope.
#[derive(Clone, Debug)]
pub enum EnvelopeInput<R> {
    /// An already-built nested record, used verbatim.
    FromBuilt(Value),
    /// A raw record to derive the linked record from.
    FromRaw(R),
    Empty,
}

impl<R> EnvelopeInput<R> {
    /// Resolve loose arguments: a pre-built value wins over `data`; nothing yields `Empty`.
    pub fn from_args(built: Option<Value>, data: Option<R>) -> Self {
        match (built, data) {
            (Some(b), _) => EnvelopeInput::FromBuilt(b),
            (None, Some(d)) => EnvelopeInput::FromRaw(d),
            (None, None) => EnvelopeInput::Empty,
        }
    }
}

/// `{"<singular>": {...} | null}`
#[derive(Clone, Debug, PartialEq)]
pub struct SingleResponse {
    pub key: String,
    pub record: Option<Value>,
}

impl Serialize for SingleResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.record)?;
        map.end()
    }
}

#[derive(Clone, Debug)]
pub struct SingleEnvelope {
    name: String,
    key: String,
    linked: Arc<LinkedRecordBuilder>,
}

impl SingleEnvelope {
    pub fn new(name: impl Into<String>, key: impl Into<String>, linked: Arc<LinkedRecordBuilder>) -> Self {
        SingleEnvelope {
            name: name.into(),
            key: key.into(),
            linked,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Never fails: non-record raw input yields a null record.
    pub fn build<R: RecordSource>(&self, input: EnvelopeInput<R>) -> SingleResponse {
        let record = match input {
            EnvelopeInput::FromBuilt(v) => Some(v),
            EnvelopeInput::FromRaw(raw) => raw.to_record().map(|r| self.linked.build(&r)),
            EnvelopeInput::Empty => None,
        };
        SingleResponse {
            key: self.key.clone(),
            record,
        }
    }
}

/// Construction input for a list envelope.
#[derive(Clone, Debug)]
pub enum ManyInput<R> {
    FromBuilt(Vec<Value>),
    FromRaw(Vec<R>),
}

/// `{"<plural>": [...], "meta": {...}}`
#[derive(Clone, Debug, PartialEq)]
pub struct ManyResponse {
    pub key: String,
    pub records: Vec<Value>,
    pub meta: Value,
}

impl Serialize for ManyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.key, &self.records)?;
        map.serialize_entry("meta", &self.meta)?;
        map.end()
    }
}

#[derive(Clone, Debug)]
pub struct ManyEnvelope {
    name: String,
    key: String,
    linked: Arc<LinkedRecordBuilder>,
}

impl ManyEnvelope {
    pub fn new(name: impl Into<String>, key: impl Into<String>, linked: Arc<LinkedRecordBuilder>) -> Self {
        ManyEnvelope {
            name: name.into(),
            key: key.into(),
            linked,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw records are linked one by one in input order; `meta` is passed through unchanged.
    pub fn build<R: RecordSource>(&self, input: ManyInput<R>, meta: Value) -> ManyResponse {
        let records = match input {
            ManyInput::FromBuilt(v) => v,
            ManyInput::FromRaw(rows) => rows
                .iter()
                .filter_map(|r| {
                    let rec = r.to_record();
                    if rec.is_none() {
                        tracing::warn!(envelope = %self.name, "skipping non-record list element");
                    }
                    rec
                })
                .map(|r| self.linked.build(&r))
                .collect(),
        };
        ManyResponse {
            key: self.key.clone(),
            records,
            meta,
        }
    }
}

/// A validated create/update body, split into column values and relation assignments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutationPayload {
    pub fields: Map<String, Value>,
    /// (relationship name, foreign ids) for every relation setter supplied with a list.
    pub relations: Vec<(String, Vec<Value>)>,
}

/// `{"<singular>": {...proxy fields...}}`
#[derive(Clone, Debug)]
pub struct RequestEnvelope {
    name: String,
    key: String,
    proxy: SchemaDef,
    setters: Vec<String>,
}

impl RequestEnvelope {
    pub fn new(name: impl Into<String>, key: impl Into<String>, proxy: SchemaDef, setters: Vec<String>) -> Self {
        RequestEnvelope {
            name: name.into(),
            key: key.into(),
            proxy,
            setters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn proxy(&self) -> &SchemaDef {
        &self.proxy
    }

    pub fn parse(&self, body: &Value) -> Result<MutationPayload, AppError> {
        let inner = body
            .as_object()
            .and_then(|o| o.get(&self.key))
            .ok_or_else(|| AppError::Validation(format!("{} is required", self.key)))?;
        let mut fields = self.proxy.validate(inner)?;
        let mut relations = Vec::new();
        for name in &self.setters {
            match fields.remove(name) {
                Some(Value::Array(ids)) => relations.push((name.clone(), ids)),
                Some(_) | None => {}
            }
        }
        Ok(MutationPayload { fields, relations })
    }
}
