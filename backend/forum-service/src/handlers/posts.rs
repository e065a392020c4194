/// Post handlers - HTTP endpoints for post operations
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::models::SortOrder;
use crate::services::{CreatePost, EditPost};
use crate::state::AppState;

const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List posts (`top` by default)
pub async fn list_posts(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<ListPostsParams>,
) -> Result<HttpResponse> {
    let service = state.post_service();
    let order = SortOrder::from_param(query.order.as_deref());
    let limit = query
        .limit
        .unwrap_or_else(|| service.default_page_limit())
        .clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let posts = service
        .list_posts(viewer.user_id(), order, limit, offset)
        .await?;

    Ok(HttpResponse::Ok().json(posts))
}

pub async fn get_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state
        .post_service()
        .get_post(viewer.user_id(), *post_id)
        .await?;

    Ok(HttpResponse::Ok().json(post))
}

pub async fn create_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    req: web::Json<CreatePost>,
) -> Result<HttpResponse> {
    let post = state
        .post_service()
        .create_post(viewer.user_id(), req.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
    req: web::Json<EditPost>,
) -> Result<HttpResponse> {
    let post = state
        .post_service()
        .edit_post(viewer.user_id(), *post_id, req.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(post))
}

/// Delete a post along with its comments
pub async fn delete_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state
        .post_service()
        .delete_post(viewer.user_id(), *post_id)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
