//! Document store abstraction and the Firestore client implementation.
//!
//! This module provides:
//! - `DocumentStore` trait for abstracting the hosted document database
//! - `FirestoreStore` implementation over the Firestore REST API
//! - Types for representing documents, field values and batched writes

pub mod auth;
pub mod firestore;
#[cfg(test)]
pub mod memory;

use std::collections::BTreeMap;

use thiserror::Error;
use time::OffsetDateTime;

/// A single stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Array(Vec<String>),
    Timestamp(OffsetDateTime),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Write `fields` into document `id`, keeping stored fields not named here.
    Upsert { id: String, fields: Fields },
    /// Create a new document under a store-chosen id.
    Insert { fields: Fields },
}

/// A document read back from the store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Fields,
}

impl StoredDocument {
    pub fn text(&self, key: &str) -> &str {
        self.fields.get(key).and_then(FieldValue::as_str).unwrap_or("")
    }
}

/// Category equality plus array membership on `locationSearch`.
#[derive(Debug, Clone)]
pub struct LocationQuery {
    pub category: String,
    pub token: String,
    pub limit: usize,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Trait for document store implementations
pub trait DocumentStore {
    /// Apply all writes atomically
    fn commit(&self, writes: &[WriteOp]) -> Result<(), StoreError>;

    /// Run a category + location token lookup
    fn query(&self, query: &LocationQuery) -> Result<Vec<StoredDocument>, StoreError>;
}
