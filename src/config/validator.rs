//! Config validation: referential integrity and API consistency.

use crate::config::loader::column_kind;
use crate::config::{ColumnKind, FullConfig, RoleConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut table_ids = HashSet::new();
    for t in &config.tables {
        if !table_ids.insert(t.id.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate table id: {}", t.id)));
        }
    }
    let columns_by_table: HashMap<&str, HashSet<&str>> = config
        .tables
        .iter()
        .map(|t| (t.id.as_str(), t.columns.iter().map(|c| c.name.as_str()).collect()))
        .collect();
    let pk_by_table: HashMap<&str, &str> = config
        .tables
        .iter()
        .map(|t| (t.id.as_str(), t.primary_key.as_str()))
        .collect();

    for t in &config.tables {
        for c in &t.columns {
            if column_kind(c.type_.name()).is_none() {
                return Err(ConfigError::Validation(format!(
                    "unknown column type '{}' for {}.{}",
                    c.type_.name(),
                    t.id,
                    c.name
                )));
            }
        }
        let pk = t
            .columns
            .iter()
            .find(|c| c.name == t.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            })?;
        if column_kind(pk.type_.name()) != Some(ColumnKind::Integer) {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            });
        }
        let table_columns = &columns_by_table[t.id.as_str()];
        for group in &t.unique {
            for col in group {
                if !table_columns.contains(col.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "column",
                        id: format!("{}.{}", t.id, col),
                    });
                }
            }
        }
    }

    for r in &config.relationships {
        let from_ok = columns_by_table
            .get(r.from_table_id.as_str())
            .is_some_and(|cols| cols.contains(r.from_column.as_str()));
        let to_ok = columns_by_table
            .get(r.to_table_id.as_str())
            .is_some_and(|cols| cols.contains(r.to_column.as_str()));
        if !from_ok || !to_ok {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        let Some(table_columns) = columns_by_table.get(api.entity_id.as_str()) else {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        };
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        let pk = pk_by_table[api.entity_id.as_str()];

        let roles: [(&'static str, Option<&RoleConfig>); 4] = [
            ("create", api.create.as_ref()),
            ("read", api.read.as_ref()),
            ("update", api.update.as_ref()),
            ("patch", api.patch.as_ref()),
        ];
        for (role, cfg) in roles {
            let Some(cfg) = cfg else { continue };
            let unknown = cfg
                .fields
                .iter()
                .find(|f| !table_columns.contains(f.as_str()))
                .or_else(|| cfg.required.iter().find(|r| !cfg.fields.contains(r)));
            if let Some(field) = unknown {
                return Err(ConfigError::UnknownField {
                    entity: api.path_segment.clone(),
                    role,
                    field: field.clone(),
                });
            }
            if matches!(role, "update" | "patch") && cfg.fields.iter().any(|f| f == pk) {
                return Err(ConfigError::Validation(format!(
                    "{} role of {} may not include the id field '{}'",
                    role, api.path_segment, pk
                )));
            }
        }
        for field in api.validation.keys() {
            if !table_columns.contains(field.as_str()) {
                return Err(ConfigError::UnknownField {
                    entity: api.path_segment.clone(),
                    role: "validation",
                    field: field.clone(),
                });
            }
        }

        let mut child_segments = HashSet::new();
        for child in &api.children {
            let invalid = |reason: &str| ConfigError::InvalidChild {
                entity: api.path_segment.clone(),
                relationship: child.relationship.clone(),
                reason: reason.to_string(),
            };
            let rel = config
                .relationships
                .iter()
                .find(|r| r.id == child.relationship)
                .ok_or_else(|| invalid("no such relationship"))?;
            if rel.to_table_id != api.entity_id || rel.to_column != pk {
                return Err(invalid("relationship does not reference this entity's id"));
            }
            let Some(child_api) = config
                .api_entities
                .iter()
                .find(|a| a.entity_id == rel.from_table_id)
            else {
                return Err(invalid("child table is not exposed as an entity"));
            };
            let segment = child.path_segment.as_deref().unwrap_or(child_api.path_segment.as_str());
            if !child_segments.insert(segment) {
                return Err(invalid(&format!("path segment '{}' is already used by another child", segment)));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "tables": [
                {"id": "artists", "name": "artists", "primary_key": "id", "columns": [
                    {"name": "id", "type": "integer", "nullable": false},
                    {"name": "name", "type": {"name": "varchar", "params": [120]}}
                ]},
                {"id": "albums", "name": "albums", "primary_key": "id", "columns": [
                    {"name": "id", "type": "integer", "nullable": false},
                    {"name": "title", "type": "text", "nullable": false},
                    {"name": "artist_id", "type": "integer", "nullable": false}
                ]}
            ],
            "relationships": [
                {"id": "album_artist", "from_table_id": "albums", "from_column": "artist_id",
                 "to_table_id": "artists", "to_column": "id", "name": "albums"}
            ],
            "api_entities": [
                {"entity_id": "artists", "path_segment": "artists",
                 "children": [{"relationship": "album_artist"}]},
                {"entity_id": "albums", "path_segment": "albums"}
            ]
        })
    }

    fn check(v: serde_json::Value) -> Result<(), ConfigError> {
        let config: FullConfig = serde_json::from_value(v).unwrap();
        validate(&config)
    }

    #[test]
    fn accepts_consistent_config() {
        check(base()).unwrap();
    }

    #[test]
    fn rejects_missing_id_field() {
        let mut v = base();
        v["tables"][0]["primary_key"] = json!("artist_id");
        assert!(matches!(check(v), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn rejects_non_integer_id_field() {
        let mut v = base();
        v["tables"][0]["columns"][0]["type"] = json!("text");
        assert!(matches!(check(v), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn rejects_child_without_relationship() {
        let mut v = base();
        v["api_entities"][1]["children"] = json!([{"relationship": "album_artist"}]);
        assert!(matches!(check(v), Err(ConfigError::InvalidChild { .. })));

        let mut v = base();
        v["api_entities"][0]["children"] = json!([{"relationship": "nope"}]);
        assert!(matches!(check(v), Err(ConfigError::InvalidChild { .. })));
    }

    #[test]
    fn rejects_unknown_role_field() {
        let mut v = base();
        v["api_entities"][1]["create"] = json!({"fields": ["title", "year"]});
        assert!(matches!(check(v), Err(ConfigError::UnknownField { role: "create", .. })));
    }

    #[test]
    fn rejects_id_in_patch_role() {
        let mut v = base();
        v["api_entities"][1]["patch"] = json!({"fields": ["id", "title"]});
        assert!(matches!(check(v), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_children_sharing_a_path_segment() {
        let mut v = base();
        v["tables"][1]["columns"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "producer_id", "type": "integer"}));
        v["relationships"].as_array_mut().unwrap().push(json!({
            "id": "album_producer", "from_table_id": "albums", "from_column": "producer_id",
            "to_table_id": "artists", "to_column": "id"
        }));
        v["api_entities"][0]["children"] = json!([
            {"relationship": "album_artist"},
            {"relationship": "album_producer"}
        ]);
        assert!(matches!(check(v.clone()), Err(ConfigError::InvalidChild { .. })));

        v["api_entities"][0]["children"][1]["path_segment"] = json!("produced");
        check(v).unwrap();
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut v = base();
        v["api_entities"][1]["path_segment"] = json!("artists");
        assert!(matches!(check(v), Err(ConfigError::DuplicatePathSegment(_))));
    }
}
