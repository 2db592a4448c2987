//! Entity CRUD routes built from the resolved registry.
//! Every route is registered once at startup by a factory that takes its own
//! descriptor, so each handler closes over exactly one entity.

use crate::config::{ChildRef, EntityDescriptor, Registry};
use crate::handlers::entity as handlers;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type Params = Query<HashMap<String, String>>;

/// `/{plural}` and `/{plural}/` (create, list), `/{plural}/:id` (get, put, patch),
/// and `/{plural}/:id/{child}` per child relation.
pub fn entity_routes(registry: &Registry) -> Router<AppState> {
    registry
        .entities
        .iter()
        .fold(Router::new(), |router, entity| router.merge(routes_for(Arc::clone(entity))))
}

fn routes_for(entity: Arc<EntityDescriptor>) -> Router<AppState> {
    let base = format!("/{}", entity.path_segment);
    let collection = collection_route(&entity);
    let mut router = Router::new()
        .route(&base, collection.clone())
        .route(&format!("{}/", base), collection)
        .route(&format!("{}/:id", base), item_route(&entity));
    for child in &entity.children {
        router = router.route(
            &format!("{}/:id/{}", base, child.path_segment),
            child_route(&entity, child),
        );
    }
    tracing::debug!(entity = %entity.name, path = %base, children = entity.children.len(), "registered routes");
    router
}

fn collection_route(entity: &Arc<EntityDescriptor>) -> MethodRouter<AppState> {
    let for_create = Arc::clone(entity);
    let for_list = Arc::clone(entity);
    post(
        move |State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>| async move {
            handlers::create(&state, &for_create, body).await
        },
    )
    .get(move |State(state): State<AppState>, params: Params| async move {
        handlers::list(&state, &for_list, params).await
    })
}

fn item_route(entity: &Arc<EntityDescriptor>) -> MethodRouter<AppState> {
    let for_read = Arc::clone(entity);
    let for_update = Arc::clone(entity);
    let for_patch = Arc::clone(entity);
    get(
        move |State(state): State<AppState>, id: Result<Path<i64>, PathRejection>| async move {
            handlers::read(&state, &for_read, id).await
        },
    )
    .put(
        move |State(state): State<AppState>,
              id: Result<Path<i64>, PathRejection>,
              body: Result<Json<Value>, JsonRejection>| async move {
            handlers::update(&state, &for_update, id, body).await
        },
    )
    .patch(
        move |State(state): State<AppState>,
              id: Result<Path<i64>, PathRejection>,
              body: Result<Json<Value>, JsonRejection>| async move {
            handlers::patch(&state, &for_patch, id, body).await
        },
    )
}

fn child_route(parent: &Arc<EntityDescriptor>, child: &ChildRef) -> MethodRouter<AppState> {
    let parent = Arc::clone(parent);
    let child = Arc::new(child.clone());
    get(
        move |State(state): State<AppState>, id: Result<Path<i64>, PathRejection>, params: Params| async move {
            handlers::list_children(&state, &parent, &child, id, params).await
        },
    )
}
