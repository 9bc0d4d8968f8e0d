//! Typed records the raw tree is decoded into, exactly once, before graph
//! construction. Field presence is kept as `Option` so the converter can tell
//! explicit attributes from defaults.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::graph::{AppInfo, BulkOperations, ExtraOperation};

#[derive(Debug, Deserialize)]
pub(crate) struct RawDocument {
    pub app: AppInfo,
    pub entities: Vec<RawEntity>,
    /// `generation_options`, `ui_hints`, `dto_policies` and friends.
    #[serde(flatten)]
    pub sections: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntity {
    pub name: String,
    pub table_name: Option<String>,
    pub description: Option<String>,
    pub audit: Option<bool>,
    pub soft_delete: Option<bool>,
    pub composite_primary_key: Option<Vec<String>>,
    pub indexes: Option<Vec<RawIndex>>,
    pub permissions: Option<IndexMap<String, Vec<String>>>,
    pub fields: Vec<RawField>,
    pub relationships: Option<Vec<RawRelationship>>,
    pub endpoints: Option<RawEndpoints>,
    pub seed: Option<Vec<Map<String, Value>>>,
    pub business_rules: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub primary: Option<bool>,
    pub auto_increment: Option<bool>,
    pub nullable: Option<bool>,
    pub unique: Option<bool>,
    pub default: Option<Value>,
    pub max_length: Option<u64>,
    pub precision: Option<u64>,
    pub scale: Option<u64>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub private: Option<bool>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    pub foreign_key: Option<RawForeignKey>,
    pub validation: Option<RawValidation>,
    pub frontend: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawForeignKey {
    pub references: String,
    pub on_delete: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawValidation {
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRelationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub name: Option<String>,
    pub local_field: Option<String>,
    pub remote_field: Option<String>,
    pub via: Option<String>,
    pub cascade: Option<String>,
    pub inverse: Option<String>,
    pub eager_load: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIndex {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub unique: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEndpoints {
    pub base_path: String,
    pub crud: Option<bool>,
    pub search: Option<RawSearch>,
    pub bulk: Option<BulkOperations>,
    pub extra: Option<IndexMap<String, ExtraOperation>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearch {
    pub fields: Option<Vec<String>>,
}
