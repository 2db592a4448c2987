//! Request decoding from schema roles: shape, type and rule checks before the store is touched.

use crate::config::{ColumnKind, EntityDescriptor, FieldRule, FieldSpec, SchemaRole, UpdatePolicy};
use crate::error::AppError;
use crate::store::Record;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Create payload: every create-role field present is checked; missing required
    /// fields and missing NOT NULL fields without a default are rejected. Unknown keys are ignored.
    pub fn decode_create(entity: &EntityDescriptor, body: &Value) -> Result<Record, AppError> {
        let body = as_object(body)?;
        let mut out = Record::new();
        for field in &entity.create.fields {
            match body.get(&field.name) {
                Some(v) => {
                    check_field(field, v)?;
                    out.insert(field.name.clone(), v.clone());
                }
                None => {
                    let has_default = entity
                        .table
                        .column(&field.name)
                        .is_some_and(|c| c.default.is_some());
                    if field.required || (!field.nullable && !has_default) {
                        return Err(required(&field.name));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Full update payload under the entity's policy. `ReplaceAll` sets absent fields
    /// to null; `RequireAll` rejects them.
    pub fn decode_update(entity: &EntityDescriptor, body: &Value) -> Result<Record, AppError> {
        let body = as_object(body)?;
        let mut out = Record::new();
        for field in &entity.update.fields {
            let v = match body.get(&field.name) {
                Some(v) => v.clone(),
                None if entity.update_policy == UpdatePolicy::RequireAll || field.required => {
                    return Err(required(&field.name))
                }
                None => Value::Null,
            };
            check_field(field, &v)?;
            out.insert(field.name.clone(), v);
        }
        Ok(out)
    }

    /// Partial update: only fields explicitly present with a non-null value.
    pub fn decode_patch(entity: &EntityDescriptor, body: &Value) -> Result<Record, AppError> {
        let body = as_object(body)?;
        let mut out = Record::new();
        for field in &entity.patch.fields {
            let Some(v) = body.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            check_field(field, v)?;
            out.insert(field.name.clone(), v.clone());
        }
        Ok(out)
    }

    /// Restrict a stored row to the read role.
    pub fn project_read(role: &SchemaRole, row: &Record) -> Value {
        let mut out = serde_json::Map::with_capacity(role.fields.len());
        for name in role.field_names() {
            out.insert(name.to_string(), row.get(name).cloned().unwrap_or(Value::Null));
        }
        Value::Object(out)
    }
}

fn as_object(body: &Value) -> Result<&serde_json::Map<String, Value>, AppError> {
    body.as_object()
        .ok_or_else(|| AppError::Validation("request body must be a JSON object".into()))
}

fn required(name: &str) -> AppError {
    AppError::Validation(format!("{} is required", name))
}

fn check_field(field: &FieldSpec, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        if field.nullable {
            return Ok(());
        }
        return Err(AppError::Validation(format!("{} may not be null", field.name)));
    }
    if !kind_matches(field.kind, v) {
        return Err(AppError::Validation(format!(
            "{} must be {}",
            field.name,
            field.kind.describe()
        )));
    }
    validate_rule(&field.name, v, &field.rule)
}

fn kind_matches(kind: ColumnKind, v: &Value) -> bool {
    match kind {
        ColumnKind::Integer => v.is_i64(),
        ColumnKind::Float => v.is_number(),
        ColumnKind::Numeric => v.is_number() || v.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok()),
        ColumnKind::Text => v.is_string(),
        ColumnKind::Boolean => v.is_boolean(),
        ColumnKind::Timestamp => v.as_str().is_some_and(is_timestamp),
        ColumnKind::Date => v
            .as_str()
            .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        ColumnKind::Json => true,
    }
}

fn is_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

fn validate_rule(col: &str, v: &Value, rule: &FieldRule) -> Result<(), AppError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
        if let Some(re) = &rule.pattern {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    let n = v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()));
    if let Some(n) = n {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    if format.eq_ignore_ascii_case("email") {
        if let Some(s) = v.as_str() {
            let valid = s
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(AppError::Validation(format!("{} must be a valid email", col)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig, Registry};
    use serde_json::json;

    fn registry(update_policy: &str) -> Registry {
        let config: FullConfig = serde_json::from_value(json!({
            "tables": [{"id": "customers", "name": "customers", "primary_key": "id", "columns": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "first_name", "type": {"name": "varchar", "params": [10]}, "nullable": false},
                {"name": "email", "type": "text"},
                {"name": "support_rep_id", "type": "integer"},
                {"name": "credit", "type": {"name": "numeric", "params": [10, 2]}, "default": 0}
            ]}],
            "api_entities": [{
                "entity_id": "customers", "path_segment": "customers",
                "update_policy": update_policy,
                "validation": {"email": {"format": "email"}, "credit": {"minimum": 0}}
            }]
        }))
        .unwrap();
        resolve(&config).unwrap()
    }

    fn is_validation(r: Result<Record, AppError>) -> bool {
        matches!(r, Err(AppError::Validation(_)))
    }

    #[test]
    fn create_requires_non_null_without_default() {
        let reg = registry("replace_all");
        let e = reg.entity_by_path("customers").unwrap();
        assert!(is_validation(RequestValidator::decode_create(e, &json!({"email": "a@b.io"}))));
        let rec = RequestValidator::decode_create(e, &json!({"first_name": "Ana", "extra": 1})).unwrap();
        assert_eq!(rec.len(), 1);
        assert!(!rec.contains_key("extra"));
    }

    #[test]
    fn type_and_rule_checks() {
        let reg = registry("replace_all");
        let e = reg.entity_by_path("customers").unwrap();
        assert!(is_validation(RequestValidator::decode_create(e, &json!({"first_name": 5}))));
        assert!(is_validation(RequestValidator::decode_create(e, &json!({"first_name": "Maximiliana"}))));
        assert!(is_validation(RequestValidator::decode_create(
            e,
            &json!({"first_name": "Ana", "email": "nope"})
        )));
        assert!(is_validation(RequestValidator::decode_create(
            e,
            &json!({"first_name": "Ana", "credit": "-1.50"})
        )));
        RequestValidator::decode_create(e, &json!({"first_name": "Ana", "credit": "12.50"})).unwrap();
        assert!(is_validation(RequestValidator::decode_create(e, &json!([1, 2]))));
    }

    #[test]
    fn replace_all_nulls_absent_fields() {
        let reg = registry("replace_all");
        let e = reg.entity_by_path("customers").unwrap();
        let rec = RequestValidator::decode_update(e, &json!({"first_name": "Ana"})).unwrap();
        assert_eq!(rec["email"], Value::Null);
        assert_eq!(rec["support_rep_id"], Value::Null);
        // NOT NULL column left out of a full replace
        assert!(is_validation(RequestValidator::decode_update(e, &json!({"email": "a@b.io"}))));
    }

    #[test]
    fn require_all_rejects_missing_fields() {
        let reg = registry("require_all");
        let e = reg.entity_by_path("customers").unwrap();
        assert!(is_validation(RequestValidator::decode_update(e, &json!({"first_name": "Ana"}))));
        RequestValidator::decode_update(
            e,
            &json!({"first_name": "Ana", "email": null, "support_rep_id": 3, "credit": 1}),
        )
        .unwrap();
    }

    #[test]
    fn patch_skips_absent_and_null() {
        let reg = registry("replace_all");
        let e = reg.entity_by_path("customers").unwrap();
        let rec = RequestValidator::decode_patch(e, &json!({"email": null, "support_rep_id": 4})).unwrap();
        assert_eq!(rec.len(), 1);
        assert_eq!(rec["support_rep_id"], 4);
    }

    #[test]
    fn project_read_fills_missing_with_null() {
        let reg = registry("replace_all");
        let e = reg.entity_by_path("customers").unwrap();
        let mut row = Record::new();
        row.insert("id".into(), json!(1));
        row.insert("secret".into(), json!("x"));
        let v = RequestValidator::project_read(&e.read, &row);
        assert_eq!(v["id"], 1);
        assert_eq!(v["email"], Value::Null);
        assert!(v.get("secret").is_none());
    }
}
