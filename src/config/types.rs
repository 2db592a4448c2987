//! Raw config types matching the entity configuration JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s,
            ColumnTypeConfig::Parameterized { name, .. } => name,
        }
    }

    pub fn params(&self) -> &[u32] {
        match self {
            ColumnTypeConfig::Simple(_) => &[],
            ColumnTypeConfig::Parameterized { params, .. } => params.as_deref().unwrap_or(&[]),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Literal default applied when an insert omits the column.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
}

/// Foreign key from a child table (`from`) to a parent table (`to`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column: String,
    pub to_table_id: String,
    pub to_column: String,
    /// Relationship name on the parent side, e.g. "albums" on artists.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// Fields one representation (create/read/update/patch) accepts or exposes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    pub fields: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// What a PUT does with update fields the payload omits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Omitted fields are written as null.
    #[default]
    ReplaceAll,
    /// Omitted fields reject the request.
    RequireAll,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildConfig {
    /// Relationship id whose `to` side is this entity.
    pub relationship: String,
    /// Path segment under `/{id}/`; defaults to the child entity's path segment.
    #[serde(default)]
    pub path_segment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    #[serde(default)]
    pub create: Option<RoleConfig>,
    #[serde(default)]
    pub read: Option<RoleConfig>,
    #[serde(default)]
    pub update: Option<RoleConfig>,
    #[serde(default)]
    pub patch: Option<RoleConfig>,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    #[serde(default)]
    pub children: Vec<ChildConfig>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

/// All config types in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    #[serde(default)]
    pub api_entities: Vec<ApiEntityConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_accepts_both_shapes() {
        let simple: ColumnTypeConfig = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(simple.name(), "integer");
        assert!(simple.params().is_empty());

        let param: ColumnTypeConfig =
            serde_json::from_str(r#"{"name":"varchar","params":[120]}"#).unwrap();
        assert_eq!(param.name(), "varchar");
        assert_eq!(param.params(), &[120]);
    }

    #[test]
    fn api_entity_defaults() {
        let api: ApiEntityConfig =
            serde_json::from_str(r#"{"entity_id":"artists","path_segment":"artists"}"#).unwrap();
        assert_eq!(api.update_policy, UpdatePolicy::ReplaceAll);
        assert!(api.create.is_none());
        assert!(api.children.is_empty());

        let api: ApiEntityConfig = serde_json::from_str(
            r#"{"entity_id":"albums","path_segment":"albums","update_policy":"require_all"}"#,
        )
        .unwrap();
        assert_eq!(api.update_policy, UpdatePolicy::RequireAll);
    }
}
