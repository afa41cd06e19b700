//! Professional records as stored in the directory.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;
use time::OffsetDateTime;

use crate::remote::{FieldValue, Fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Category {
    Videographer,
    Influencer,
    Model,
    Editor,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Videographer => "videographer",
            Category::Influencer => "influencer",
            Category::Model => "model",
            Category::Editor => "editor",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    /// Parse from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "videographer" => Ok(Category::Videographer),
            "influencer" => Ok(Category::Influencer),
            "model" => Ok(Category::Model),
            "editor" => Ok(Category::Editor),
            _ => Err(format!("unknown category `{}`", s.trim())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every record field a spreadsheet column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    LeadId,
    CreatedAt,
    FormName,
    Platform,
    Category,
    MainRole,
    Name,
    Email,
    Phone,
    Location,
    Bio,
    Instagram,
    Tiktok,
    Youtube,
    Portfolio,
    Equipment,
    Experience,
    Followers,
}

impl Field {
    /// Name of the field in the stored document.
    pub fn key(&self) -> &'static str {
        match self {
            Field::LeadId => "leadId",
            Field::CreatedAt => "createdAt",
            Field::FormName => "formName",
            Field::Platform => "platform",
            Field::Category => "category",
            Field::MainRole => "role",
            Field::Name => "name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Location => "location",
            Field::Bio => "bio",
            Field::Instagram => "instagram",
            Field::Tiktok => "tiktok",
            Field::Youtube => "youtube",
            Field::Portfolio => "portfolio",
            Field::Equipment => "equipment",
            Field::Experience => "experience",
            Field::Followers => "followers",
        }
    }
}

impl Serialize for Field {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

pub const LOCATION_SEARCH_KEY: &str = "locationSearch";
pub const UPDATED_AT_KEY: &str = "updatedAt";

/// A record ready to be written.
///
/// `category`, `name` and `location` are always present; everything else in
/// `details` only exists when the source had a non-blank value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalRecord {
    #[serde(skip)]
    pub id: Option<String>,
    pub category: String,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location_search: Vec<String>,
    #[serde(flatten)]
    pub details: BTreeMap<Field, String>,
}

impl ProfessionalRecord {
    pub fn detail(&self, field: Field) -> Option<&str> {
        self.details.get(&field).map(String::as_str)
    }

    /// Convert to store fields, stamping `updatedAt`.
    pub fn to_fields(&self, updated_at: OffsetDateTime) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            Field::Category.key().to_string(),
            FieldValue::String(self.category.clone()),
        );
        fields.insert(Field::Name.key().to_string(), FieldValue::String(self.name.clone()));
        fields.insert(
            Field::Location.key().to_string(),
            FieldValue::String(self.location.clone()),
        );
        if !self.location_search.is_empty() {
            fields.insert(
                LOCATION_SEARCH_KEY.to_string(),
                FieldValue::Array(self.location_search.clone()),
            );
        }
        for (field, value) in &self.details {
            fields.insert(field.key().to_string(), FieldValue::String(value.clone()));
        }
        fields.insert(UPDATED_AT_KEY.to_string(), FieldValue::Timestamp(updated_at));
        fields
    }
}
