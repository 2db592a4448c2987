//! OpenAPI 3 document built from the registry at startup, served at `/openapi.json`.

use crate::config::{ColumnKind, EntityDescriptor, Registry, SchemaRole};
use crate::state::AppState;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use utoipa::openapi::{
    content::ContentBuilder,
    info::InfoBuilder,
    path::{HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn, PathItem, PathsBuilder},
    request_body::RequestBodyBuilder,
    response::{Response, ResponseBuilder},
    schema::{
        ArrayBuilder, ComponentsBuilder, KnownFormat, ObjectBuilder, Ref, Schema, SchemaFormat, SchemaType, Type,
    },
    tag::TagBuilder,
    OpenApi, OpenApiBuilder, RefOr, Required,
};

fn object(o: ObjectBuilder) -> RefOr<Schema> {
    RefOr::T(Schema::Object(o.build()))
}

fn integer() -> RefOr<Schema> {
    object(ObjectBuilder::new().schema_type(Type::Integer))
}

fn kind_type(kind: ColumnKind) -> Type {
    match kind {
        ColumnKind::Integer => Type::Integer,
        ColumnKind::Float | ColumnKind::Numeric => Type::Number,
        ColumnKind::Text | ColumnKind::Timestamp | ColumnKind::Date => Type::String,
        ColumnKind::Boolean => Type::Boolean,
        ColumnKind::Json => Type::Object,
    }
}

fn kind_schema(kind: ColumnKind, nullable: bool) -> RefOr<Schema> {
    let mut o = if nullable {
        ObjectBuilder::new().schema_type(SchemaType::from_iter([kind_type(kind), Type::Null]))
    } else {
        ObjectBuilder::new().schema_type(kind_type(kind))
    };
    o = match kind {
        ColumnKind::Timestamp => o.format(Some(SchemaFormat::KnownFormat(KnownFormat::DateTime))),
        ColumnKind::Date => o.format(Some(SchemaFormat::KnownFormat(KnownFormat::Date))),
        _ => o,
    };
    object(o)
}

fn role_schema(role: &SchemaRole) -> RefOr<Schema> {
    let mut o = ObjectBuilder::new().schema_type(Type::Object);
    for f in &role.fields {
        o = o.property(&f.name, kind_schema(f.kind, f.nullable));
        if f.required {
            o = o.required(&f.name);
        }
    }
    object(o)
}

fn component(entity: &EntityDescriptor, suffix: &str) -> String {
    format!("{}{}", entity.name, suffix)
}

fn envelope_schema(inner: RefOr<Schema>) -> RefOr<Schema> {
    object(
        ObjectBuilder::new()
            .schema_type(Type::Object)
            .property("meta_data", object(ObjectBuilder::new().schema_type(Type::Object)))
            .property("response", inner)
            .required("meta_data")
            .required("response"),
    )
}

fn json_response(description: &str, schema: RefOr<Schema>) -> Response {
    ResponseBuilder::new()
        .description(description)
        .content("application/json", ContentBuilder::new().schema(Some(schema)).build())
        .build()
}

fn error_response(description: &str) -> Response {
    json_response(description, RefOr::Ref(Ref::from_schema_name("ErrorBody")))
}

fn json_body(schema_name: &str) -> utoipa::openapi::request_body::RequestBody {
    RequestBodyBuilder::new()
        .content(
            "application/json",
            ContentBuilder::new()
                .schema(Some(RefOr::Ref(Ref::from_schema_name(schema_name))))
                .build(),
        )
        .required(Some(Required::True))
        .build()
}

fn query_param(name: &str, description: &str) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .description(Some(description))
        .schema(Some(integer()))
        .build()
}

fn id_param() -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(integer()))
        .build()
}

fn operation(tag: &str, id: String, summary: String) -> OperationBuilder {
    OperationBuilder::new()
        .tag(tag)
        .operation_id(Some(id))
        .summary(Some(summary))
}

fn list_operation(tag: &str, id: String, summary: String, item: &str) -> Operation {
    operation(tag, id, summary)
        .parameter(query_param("offset", "rows to skip (default 0)"))
        .parameter(query_param("limit", "page size, 1..=1000 (default 10)"))
        .response(
            "200",
            json_response(
                "Page of rows",
                envelope_schema(RefOr::T(Schema::Array(
                    ArrayBuilder::new()
                        .items(RefOr::Ref(Ref::from_schema_name(item)))
                        .build(),
                ))),
            ),
        )
        .response("422", error_response("Invalid paging parameters"))
        .build()
}

/// Paths and schemas for every registered entity, tagged with its display tag.
pub fn build_openapi(registry: &Registry, prefix: &str) -> OpenApi {
    let mut paths = PathsBuilder::new();
    let mut components = ComponentsBuilder::new().schema(
        "ErrorBody",
        object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .property("detail", object(ObjectBuilder::new().schema_type(Type::String)))
                .property("code", object(ObjectBuilder::new().schema_type(Type::String)))
                .required("detail")
                .required("code"),
        ),
    );
    let mut tags = Vec::with_capacity(registry.entities.len());

    for entity in &registry.entities {
        let tag = entity.tag();
        let singular = entity.singular();
        let read = component(entity, "Read");
        let read_ref = || RefOr::Ref(Ref::from_schema_name(read.clone()));
        components = components
            .schema(component(entity, "Create"), role_schema(&entity.create))
            .schema(read.clone(), role_schema(&entity.read))
            .schema(component(entity, "Update"), role_schema(&entity.update))
            .schema(component(entity, "Patch"), role_schema(&entity.patch));
        tags.push(TagBuilder::new().name(tag.clone()).build());

        let collection = format!("{}/{}/", prefix, entity.path_segment);
        let item = format!("{}/{}/{{id}}", prefix, entity.path_segment);

        let create = operation(&tag, format!("create_{}", singular), format!("Create {}", singular))
            .request_body(Some(json_body(&component(entity, "Create"))))
            .response("201", json_response("Created", envelope_schema(read_ref())))
            .response("400", error_response("Constraint violation"))
            .response("422", error_response("Invalid payload"))
            .build();
        let list = list_operation(
            &tag,
            format!("list_{}", entity.path_segment),
            format!("List {}", entity.path_segment),
            &read,
        );
        paths = paths
            .path(&collection, PathItem::new(HttpMethod::Post, create))
            .path(&collection, PathItem::new(HttpMethod::Get, list));

        let get_op = operation(&tag, format!("get_{}", singular), format!("Get {}", singular))
            .parameter(id_param())
            .response("200", json_response("Found", envelope_schema(read_ref())))
            .response("404", error_response("Not found"))
            .build();
        let put_op = operation(&tag, format!("update_{}", singular), format!("Replace {}", singular))
            .parameter(id_param())
            .request_body(Some(json_body(&component(entity, "Update"))))
            .response("200", json_response("Updated", envelope_schema(read_ref())))
            .response("404", error_response("Not found"))
            .response("422", error_response("Invalid payload"))
            .build();
        let patch_op = operation(&tag, format!("patch_{}", singular), format!("Patch {}", singular))
            .parameter(id_param())
            .request_body(Some(json_body(&component(entity, "Patch"))))
            .response("200", json_response("Patched", envelope_schema(read_ref())))
            .response("404", error_response("Not found"))
            .response("422", error_response("Invalid payload"))
            .build();
        paths = paths
            .path(&item, PathItem::new(HttpMethod::Get, get_op))
            .path(&item, PathItem::new(HttpMethod::Put, put_op))
            .path(&item, PathItem::new(HttpMethod::Patch, patch_op));

        for child in &entity.children {
            let mut op = list_operation(
                &tag,
                format!("list_{}_{}", singular, child.path_segment),
                format!("List {} of {}", child.path_segment, singular),
                &component(&child.child, "Read"),
            );
            op.parameters.get_or_insert_with(Vec::new).insert(0, id_param());
            op.responses
                .responses
                .insert("404".into(), RefOr::T(error_response("Parent not found")));
            paths = paths.path(
                format!("{}/{}", item, child.path_segment),
                PathItem::new(HttpMethod::Get, op),
            );
        }
    }

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .paths(paths.build())
        .components(Some(components.build()))
        .tags(Some(tags))
        .build()
}

/// `GET /openapi.json`; the document is built once here and shared.
pub fn openapi_routes(registry: &Registry, prefix: &str) -> Router<AppState> {
    let doc = Arc::new(build_openapi(registry, prefix));
    Router::new().route(
        "/openapi.json",
        get(move || {
            let doc = Arc::clone(&doc);
            async move { Json(doc.as_ref().clone()) }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use serde_json::json;

    #[test]
    fn documents_every_generated_path() {
        let config: FullConfig = serde_json::from_value(json!({
            "tables": [
                {"id": "media_types", "name": "media_types", "primary_key": "id", "columns": [
                    {"name": "id", "type": "integer", "nullable": false},
                    {"name": "name", "type": "text"}
                ]},
                {"id": "tracks", "name": "tracks", "primary_key": "id", "columns": [
                    {"name": "id", "type": "integer", "nullable": false},
                    {"name": "media_type_id", "type": "integer", "nullable": false}
                ]}
            ],
            "relationships": [{"id": "track_media_type", "from_table_id": "tracks",
                "from_column": "media_type_id", "to_table_id": "media_types", "to_column": "id"}],
            "api_entities": [
                {"entity_id": "media_types", "path_segment": "media_types",
                 "children": [{"relationship": "track_media_type"}]},
                {"entity_id": "tracks", "path_segment": "tracks"}
            ]
        }))
        .unwrap();
        let doc = serde_json::to_value(build_openapi(&resolve(&config).unwrap(), "/api/v1")).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths["/api/v1/media_types/"]["post"].is_object());
        assert!(paths["/api/v1/media_types/"]["get"].is_object());
        assert!(paths["/api/v1/media_types/{id}"]["patch"].is_object());
        assert!(paths["/api/v1/media_types/{id}/tracks"]["get"]["responses"]["404"].is_object());
        assert_eq!(paths["/api/v1/media_types/{id}"]["get"]["tags"], json!(["Media Types"]));
        assert!(doc["components"]["schemas"]["MediaTypeRead"].is_object());
    }
}
