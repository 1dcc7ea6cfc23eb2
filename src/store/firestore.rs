use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::RequestBuilder;
use serde_json::{Map, Value, json};

use super::{Direction, Document, DocumentStore, FieldValue, Fields, OrderBy, auto_id};
use crate::config::FirebaseConfig;
use crate::http_client::{http_client, read_success_body};
use crate::identity::TokenSource;

/// Cloud Firestore over its REST surface, authenticated as the signed-in user.
pub struct FirestoreStore {
    endpoint: String,
    root: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl FirestoreStore {
    pub fn new(
        endpoint: impl Into<String>,
        project_id: &str,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            root: format!("projects/{project_id}/databases/(default)/documents"),
            tokens,
        }
    }

    pub fn from_config(
        config: &FirebaseConfig,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Option<Self> {
        let project_id = config.project_id.as_deref()?;
        Some(Self::new(config.firestore_url.clone(), project_id, tokens))
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.root)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.tokens.as_ref().and_then(|t| t.id_token()) {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn commit(&self, write: Value) -> Result<()> {
        let client = http_client()?;
        let url = format!("{}/{}:commit", self.endpoint, self.root);
        let req = client.post(&url).json(&json!({ "writes": [write] }));
        let resp = self
            .authorize(req)
            .send()
            .context("firestore commit request failed")?;
        read_success_body(resp)?;
        Ok(())
    }

    fn set_write(&self, collection: &str, id: &str, fields: Fields, mode: WriteMode) -> Value {
        let (plain, transforms) = split_server_timestamps(fields);
        let mut write = Map::new();
        write.insert(
            "update".to_string(),
            json!({
                "name": self.document_name(collection, id),
                "fields": encode_fields(&plain),
            }),
        );
        if mode == WriteMode::Merge {
            let paths: Vec<&String> = plain.keys().collect();
            write.insert("updateMask".to_string(), json!({ "fieldPaths": paths }));
        }
        if !transforms.is_empty() {
            let transforms: Vec<Value> = transforms
                .iter()
                .map(|path| json!({ "fieldPath": path, "setToServerValue": "REQUEST_TIME" }))
                .collect();
            write.insert("updateTransforms".to_string(), Value::Array(transforms));
        }
        match mode {
            WriteMode::Create => {
                write.insert("currentDocument".to_string(), json!({ "exists": false }));
            }
            WriteMode::Merge => {
                write.insert("currentDocument".to_string(), json!({ "exists": true }));
            }
            WriteMode::Replace => {}
        }
        Value::Object(write)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Fails if the document exists.
    Create,
    /// Overwrites whatever is there.
    Replace,
    /// Touches only the given fields; fails if the document is missing.
    Merge,
}

impl DocumentStore for FirestoreStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let client = http_client()?;
        let url = format!("{}/{}", self.endpoint, self.document_name(collection, id));
        let resp = self
            .authorize(client.get(&url))
            .send()
            .context("firestore get request failed")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_success_body(resp)?;
        let value: Value = serde_json::from_str(&body).context("invalid firestore document")?;
        Ok(decode_document(&value))
    }

    fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = auto_id();
        let write = self.set_write(collection, &id, fields, WriteMode::Create);
        self.commit(write)?;
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let write = self.set_write(collection, id, fields, WriteMode::Replace);
        self.commit(write)
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let write = self.set_write(collection, id, fields, WriteMode::Merge);
        self.commit(write)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.commit(json!({ "delete": self.document_name(collection, id) }))
    }

    fn list_ordered(&self, collection: &str, order: &[OrderBy]) -> Result<Vec<Document>> {
        let client = http_client()?;
        let url = format!("{}/{}:runQuery", self.endpoint, self.root);
        let req = client.post(&url).json(&structured_query(collection, order));
        let resp = self
            .authorize(req)
            .send()
            .context("firestore query request failed")?;
        let body = read_success_body(resp)?;
        parse_run_query(&body)
    }
}

pub fn structured_query(collection: &str, order: &[OrderBy]) -> Value {
    let order_by: Vec<Value> = order
        .iter()
        .map(|o| {
            let direction = match o.direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            json!({ "field": { "fieldPath": o.field }, "direction": direction })
        })
        .collect();
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "orderBy": order_by,
        }
    })
}

fn split_server_timestamps(fields: Fields) -> (Fields, Vec<String>) {
    let mut plain = Fields::new();
    let mut transforms = Vec::new();
    for (k, v) in fields {
        if v == FieldValue::ServerTimestamp {
            transforms.push(k);
        } else {
            plain.insert(k, v);
        }
    }
    (plain, transforms)
}

pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null | FieldValue::ServerTimestamp => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => json!({ "timestampValue": ts.to_rfc3339() }),
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(map)
}

pub fn decode_value(value: &Value) -> Option<FieldValue> {
    let obj = value.as_object()?;
    if obj.contains_key("nullValue") {
        return Some(FieldValue::Null);
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Some(FieldValue::Bool(b));
    }
    if let Some(i) = obj.get("integerValue") {
        let parsed = match i {
            Value::String(s) => s.parse::<i64>().ok(),
            other => other.as_i64(),
        };
        return parsed.map(FieldValue::Integer);
    }
    if let Some(d) = obj.get("doubleValue").and_then(Value::as_f64) {
        return Some(FieldValue::Double(d));
    }
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Some(FieldValue::String(s.to_string()));
    }
    if let Some(ts) = obj.get("timestampValue").and_then(Value::as_str) {
        return DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc)));
    }
    None
}

pub fn decode_document(value: &Value) -> Option<Document> {
    let name = value.get("name")?.as_str()?;
    let id = name.rsplit('/').next()?.to_string();
    let mut fields = Fields::new();
    if let Some(map) = value.get("fields").and_then(Value::as_object) {
        for (k, v) in map {
            match decode_value(v) {
                Some(decoded) => {
                    fields.insert(k.clone(), decoded);
                }
                None => {
                    tracing::debug!(
                        target: "pitchside::store",
                        field = %k,
                        "skipping unsupported firestore value"
                    );
                }
            }
        }
    }
    Some(Document { id, fields })
}

pub fn parse_run_query(raw: &str) -> Result<Vec<Document>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let rows: Vec<Value> = serde_json::from_str(trimmed).context("invalid runQuery json")?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("document"))
        .filter_map(decode_document)
        .collect())
}
