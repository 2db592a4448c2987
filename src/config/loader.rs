//! Load entity config from JSON and resolve it into descriptors.

use crate::config::resolved::{
    ChildRef, ColumnInfo, ColumnKind, EntityDescriptor, FieldRule, FieldSpec, ForeignKey, Registry, SchemaRole,
    TableSchema,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Read and parse a config document from disk. Does not resolve it.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build the registry from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<Registry, ConfigError> {
    validate(config)?;

    let tables_by_id: HashMap<&str, &TableConfig> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut tables: HashMap<&str, Arc<TableSchema>> = HashMap::new();
    for t in &config.tables {
        tables.insert(t.id.as_str(), Arc::new(resolve_table(t, config, &tables_by_id)));
    }

    let mut resolver = EntityResolver {
        config,
        tables: &tables,
        done: HashMap::new(),
        visiting: HashSet::new(),
    };
    let mut entities = Vec::with_capacity(config.api_entities.len());
    let mut entity_by_path = HashMap::new();
    for api in &config.api_entities {
        let entity = resolver.resolve(api)?;
        entity_by_path.insert(entity.path_segment.clone(), Arc::clone(&entity));
        entities.push(entity);
    }

    Ok(Registry {
        entities,
        entity_by_path,
        tables: config
            .tables
            .iter()
            .map(|t| Arc::clone(&tables[t.id.as_str()]))
            .collect(),
    })
}

fn resolve_table(t: &TableConfig, config: &FullConfig, tables_by_id: &HashMap<&str, &TableConfig>) -> TableSchema {
    let columns = t
        .columns
        .iter()
        .map(|c| {
            let name = c.type_.name().to_lowercase();
            let max_length = match name.as_str() {
                "varchar" | "character varying" | "char" => c.type_.params().first().copied(),
                _ => None,
            };
            ColumnInfo {
                name: c.name.clone(),
                kind: column_kind(&name).unwrap_or(ColumnKind::Text),
                pg_type: column_pg_type_name(&c.type_),
                nullable: c.nullable && c.name != t.primary_key,
                default: c.default.clone(),
                max_length,
            }
        })
        .collect();
    let foreign_keys = config
        .relationships
        .iter()
        .filter(|r| r.from_table_id == t.id)
        .filter_map(|r| {
            tables_by_id.get(r.to_table_id.as_str()).map(|to| ForeignKey {
                column: r.from_column.clone(),
                references_table: to.name.clone(),
                references_column: r.to_column.clone(),
            })
        })
        .collect();
    TableSchema {
        id: t.id.clone(),
        name: t.name.clone(),
        primary_key: t.primary_key.clone(),
        columns,
        unique: t.unique.clone(),
        foreign_keys,
    }
}

/// Resolves entities depth-first so each ChildRef holds its child's finished descriptor.
struct EntityResolver<'a> {
    config: &'a FullConfig,
    tables: &'a HashMap<&'a str, Arc<TableSchema>>,
    done: HashMap<String, Arc<EntityDescriptor>>,
    visiting: HashSet<String>,
}

impl EntityResolver<'_> {
    fn resolve(&mut self, api: &ApiEntityConfig) -> Result<Arc<EntityDescriptor>, ConfigError> {
        if let Some(done) = self.done.get(&api.path_segment) {
            return Ok(Arc::clone(done));
        }
        if !self.visiting.insert(api.path_segment.clone()) {
            return Err(ConfigError::CyclicChildren(api.path_segment.clone()));
        }

        let table = Arc::clone(&self.tables[api.entity_id.as_str()]);
        let id_field = table.primary_key.clone();
        let non_id: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.name != id_field)
            .map(|c| c.name.clone())
            .collect();
        let all: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();

        let create = build_role(&table, api, api.create.as_ref(), &non_id)?;
        let read = build_role(&table, api, api.read.as_ref(), &all)?;
        let update = build_role(&table, api, api.update.as_ref(), &non_id)?;
        let patch = build_role(&table, api, api.patch.as_ref(), &non_id)?;

        let config = self.config;
        let mut children = Vec::with_capacity(api.children.len());
        for child_cfg in &api.children {
            // validator guarantees both lookups succeed
            let Some(rel) = config.relationships.iter().find(|r| r.id == child_cfg.relationship) else {
                continue;
            };
            let Some(child_api) = config.api_entities.iter().find(|a| a.entity_id == rel.from_table_id) else {
                continue;
            };
            let child = self.resolve(child_api)?;
            children.push(ChildRef {
                relationship_name: rel.name.clone().unwrap_or_else(|| child.path_segment.clone()),
                foreign_key_field: rel.from_column.clone(),
                path_segment: child_cfg
                    .path_segment
                    .clone()
                    .unwrap_or_else(|| child.path_segment.clone()),
                child,
            });
        }

        let entity = Arc::new(EntityDescriptor {
            name: crate::naming::type_name(&api.path_segment),
            path_segment: api.path_segment.clone(),
            id_field,
            table,
            create,
            read,
            update,
            patch,
            update_policy: api.update_policy,
            children,
        });
        self.visiting.remove(&api.path_segment);
        self.done.insert(api.path_segment.clone(), Arc::clone(&entity));
        Ok(entity)
    }
}

fn build_role(
    table: &TableSchema,
    api: &ApiEntityConfig,
    cfg: Option<&RoleConfig>,
    default_fields: &[String],
) -> Result<SchemaRole, ConfigError> {
    let fields = cfg.map(|c| c.fields.as_slice()).unwrap_or(default_fields);
    let required: HashSet<&str> = cfg
        .map(|c| c.required.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut out = Vec::with_capacity(fields.len());
    for name in fields {
        let Some(col) = table.column(name) else {
            continue;
        };
        let rule = api.validation.get(name);
        out.push(FieldSpec {
            name: name.clone(),
            kind: col.kind,
            nullable: col.nullable,
            required: required.contains(name.as_str()) || rule.and_then(|r| r.required).unwrap_or(false),
            rule: build_rule(rule, col, &api.path_segment)?,
        });
    }
    Ok(SchemaRole { fields: out })
}

fn build_rule(rule: Option<&ValidationRule>, col: &ColumnInfo, entity: &str) -> Result<FieldRule, ConfigError> {
    let Some(rule) = rule else {
        return Ok(FieldRule {
            max_length: col.max_length,
            ..FieldRule::default()
        });
    };
    let pattern = rule
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| ConfigError::Validation(format!("invalid pattern for {}.{}: {}", entity, col.name, e)))?;
    Ok(FieldRule {
        format: rule.format.clone(),
        max_length: rule.max_length.or(col.max_length),
        min_length: rule.min_length,
        pattern,
        allowed: rule.allowed.clone(),
        minimum: rule.minimum,
        maximum: rule.maximum,
    })
}

/// Storage kind for a configured type name; None for unsupported types.
pub(crate) fn column_kind(type_name: &str) -> Option<ColumnKind> {
    Some(match type_name.to_lowercase().as_str() {
        "integer" | "int" | "int4" | "bigint" | "int8" | "smallint" | "int2" | "serial" | "bigserial" => {
            ColumnKind::Integer
        }
        "real" | "float4" | "double precision" | "float8" | "float" => ColumnKind::Float,
        "numeric" | "decimal" => ColumnKind::Numeric,
        "text" | "varchar" | "character varying" | "char" => ColumnKind::Text,
        "boolean" | "bool" => ColumnKind::Boolean,
        "timestamp" | "timestamptz" | "datetime" => ColumnKind::Timestamp,
        "date" => ColumnKind::Date,
        "json" | "jsonb" => ColumnKind::Json,
        _ => return None,
    })
}

fn column_pg_type_name(ty: &ColumnTypeConfig) -> String {
    let name = match ty.name().to_lowercase().as_str() {
        "int" | "int4" | "serial" => "integer".to_string(),
        "int8" | "bigserial" => "bigint".to_string(),
        "int2" => "smallint".to_string(),
        "float" | "float8" => "double precision".to_string(),
        "float4" => "real".to_string(),
        "decimal" => "numeric".to_string(),
        "datetime" => "timestamp".to_string(),
        "bool" => "boolean".to_string(),
        other => other.to_string(),
    };
    let params = ty.params();
    if params.is_empty() {
        name
    } else {
        let p: Vec<String> = params.iter().map(|n| n.to_string()).collect();
        format!("{}({})", name, p.join(","))
    }
}
