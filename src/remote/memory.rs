//! In-memory store with the same merge semantics as Firestore.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::{DocumentStore, FieldValue, Fields, LocationQuery, StoreError, StoredDocument, WriteOp};

#[derive(Default)]
pub struct MemoryStore {
    docs: RefCell<BTreeMap<String, Fields>>,
    commits: Cell<usize>,
    fail_on_commit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `n`th commit (zero-based) fails.
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on_commit: Some(n),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.docs.borrow().len()
    }

    pub fn commits(&self) -> usize {
        self.commits.get()
    }

    pub fn get(&self, id: &str) -> Option<Fields> {
        self.docs.borrow().get(id).cloned()
    }

    pub fn put(&self, id: &str, fields: Fields) {
        self.docs.borrow_mut().insert(id.to_string(), fields);
    }
}

impl DocumentStore for MemoryStore {
    fn commit(&self, writes: &[WriteOp]) -> Result<(), StoreError> {
        let attempt = self.commits.get();
        if self.fail_on_commit == Some(attempt) {
            return Err(StoreError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.commits.set(attempt + 1);

        let mut docs = self.docs.borrow_mut();
        for write in writes {
            match write {
                WriteOp::Upsert { id, fields } => {
                    let doc = docs.entry(id.clone()).or_default();
                    for (key, value) in fields {
                        doc.insert(key.clone(), value.clone());
                    }
                }
                WriteOp::Insert { fields } => {
                    let id = uuid::Uuid::new_v4().simple().to_string();
                    docs.insert(id, fields.clone());
                }
            }
        }
        Ok(())
    }

    fn query(&self, query: &LocationQuery) -> Result<Vec<StoredDocument>, StoreError> {
        let docs = self.docs.borrow();
        let hits = docs
            .iter()
            .filter(|(_, fields)| {
                fields.get("category").and_then(FieldValue::as_str) == Some(query.category.as_str())
            })
            .filter(|(_, fields)| match fields.get("locationSearch") {
                Some(FieldValue::Array(tokens)) => tokens.iter().any(|t| t == &query.token),
                _ => false,
            })
            .take(query.limit)
            .map(|(id, fields)| StoredDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        Ok(hits)
    }
}
