//! Firestore client over the REST v1 API.
//!
//! Writes go through `documents:commit`, which applies a whole batch
//! atomically. Merge upserts carry an `updateMask` naming exactly the fields
//! being written so that other stored fields survive. Lookups go through
//! `documents:runQuery` with an AND of an equality filter on `category` and an
//! `ARRAY_CONTAINS` filter on `locationSearch`; Firestore needs the composite
//! index (category ASC, locationSearch CONTAINS) for that query.

use std::cell::RefCell;

use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::auth::{fetch_access_token, ServiceAccount};
use super::{DocumentStore, FieldValue, Fields, LocationQuery, StoreError, StoredDocument, WriteOp};
use crate::record::{Field, LOCATION_SEARCH_KEY};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const EMULATOR_TOKEN: &str = "owner";

enum Credentials {
    ServiceAccount(ServiceAccount),
    Emulator,
}

pub struct FirestoreStore {
    http: reqwest::blocking::Client,
    base_url: String,
    project_id: String,
    collection: String,
    credentials: Credentials,
    token: RefCell<Option<String>>,
}

impl FirestoreStore {
    /// Client for the hosted service, authenticated with a service account.
    pub fn new(account: ServiceAccount, project_id: String, collection: String) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id,
            collection,
            credentials: Credentials::ServiceAccount(account),
            token: RefCell::new(None),
        }
    }

    /// Client for a local emulator at `host` (e.g. "localhost:8080").
    pub fn emulator(host: &str, project_id: String, collection: String) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: format!("http://{}/v1", host.trim_end_matches('/')),
            project_id,
            collection,
            credentials: Credentials::Emulator,
            token: RefCell::new(None),
        }
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn documents_url(&self, action: &str) -> String {
        format!("{}/{}/documents:{}", self.base_url, self.database_path(), action)
    }

    fn document_name(&self, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), self.collection, id)
    }

    fn bearer(&self) -> Result<String, StoreError> {
        match &self.credentials {
            Credentials::Emulator => Ok(EMULATOR_TOKEN.to_string()),
            Credentials::ServiceAccount(account) => {
                if let Some(token) = self.token.borrow().as_ref() {
                    return Ok(token.clone());
                }
                let token = fetch_access_token(&self.http, account)?;
                *self.token.borrow_mut() = Some(token.clone());
                Ok(token)
            }
        }
    }

    fn post(&self, action: &str, body: &Value) -> Result<Value, StoreError> {
        let response = self
            .http
            .post(self.documents_url(action))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }
        serde_json::from_str(&text)
            .map_err(|err| StoreError::Decode(format!("{action} response: {err}")))
    }

    fn write_json(&self, write: &WriteOp) -> Value {
        match write {
            WriteOp::Upsert { id, fields } => json!({
                "update": {
                    "name": self.document_name(id),
                    "fields": encode_fields(fields),
                },
                "updateMask": { "fieldPaths": fields.keys().collect::<Vec<_>>() },
            }),
            WriteOp::Insert { fields } => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                json!({
                    "update": {
                        "name": self.document_name(&id),
                        "fields": encode_fields(fields),
                    },
                    "currentDocument": { "exists": false },
                })
            }
        }
    }
}

impl DocumentStore for FirestoreStore {
    fn commit(&self, writes: &[WriteOp]) -> Result<(), StoreError> {
        let body = json!({
            "writes": writes.iter().map(|w| self.write_json(w)).collect::<Vec<_>>(),
        });
        self.post("commit", &body)?;
        Ok(())
    }

    fn query(&self, query: &LocationQuery) -> Result<Vec<StoredDocument>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            {
                                "fieldFilter": {
                                    "field": { "fieldPath": Field::Category.key() },
                                    "op": "EQUAL",
                                    "value": { "stringValue": query.category },
                                }
                            },
                            {
                                "fieldFilter": {
                                    "field": { "fieldPath": LOCATION_SEARCH_KEY },
                                    "op": "ARRAY_CONTAINS",
                                    "value": { "stringValue": query.token },
                                }
                            }
                        ]
                    }
                },
                "limit": query.limit,
            }
        });

        let response = self.post("runQuery", &body)?;
        decode_query_response(&response)
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(map)
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Array(items) => json!({
            "arrayValue": {
                "values": items.iter().map(|s| json!({ "stringValue": s })).collect::<Vec<_>>()
            }
        }),
        FieldValue::Timestamp(ts) => json!({
            "timestampValue": ts.format(&Rfc3339).unwrap_or_default()
        }),
    }
}

fn decode_value(value: &Value) -> Option<FieldValue> {
    if let Some(s) = value.get("stringValue").and_then(Value::as_str) {
        return Some(FieldValue::String(s.to_string()));
    }
    if let Some(array) = value.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.get("stringValue").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        return Some(FieldValue::Array(items));
    }
    if let Some(ts) = value.get("timestampValue").and_then(Value::as_str) {
        return OffsetDateTime::parse(ts, &Rfc3339).ok().map(FieldValue::Timestamp);
    }
    None
}

/// Parse a `runQuery` response: a JSON array whose elements carry an optional
/// `document`. Elements without one (progress markers) are skipped.
pub fn decode_query_response(response: &Value) -> Result<Vec<StoredDocument>, StoreError> {
    let items = response
        .as_array()
        .ok_or_else(|| StoreError::Decode("runQuery response is not an array".to_string()))?;

    let mut docs = Vec::new();
    for item in items {
        let Some(document) = item.get("document") else {
            continue;
        };
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("document without name".to_string()))?;
        let id = name.rsplit('/').next().unwrap_or(name).to_string();

        let mut fields = Fields::new();
        if let Some(raw_fields) = document.get("fields").and_then(Value::as_object) {
            for (key, raw) in raw_fields {
                // Fields of other types (numbers, maps) are not part of a record.
                if let Some(value) = decode_value(raw) {
                    fields.insert(key.clone(), value);
                }
            }
        }
        docs.push(StoredDocument { id, fields });
    }
    Ok(docs)
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
