/// Comment handlers - HTTP endpoints for comment operations
use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::OrderParams;
use crate::error::Result;
use crate::middleware::Viewer;
use crate::models::CommentNode;
use crate::services::CreateComment;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// Flat comment list of a post, oldest first
pub async fn list_comments(
    state: web::Data<AppState>,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let comments = state.tree_builder().flat_comments(*post_id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// Nested comment tree with the viewer's votes
pub async fn comment_tree(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
    query: web::Query<OrderParams>,
) -> Result<HttpResponse> {
    let tree = state
        .tree_builder()
        .build_tree(*post_id, viewer.user_id(), query.sort_order())
        .await?;

    forest_response(&tree)
}

/// Root comments only; `replies` is always empty
pub async fn root_comments(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
    query: web::Query<OrderParams>,
) -> Result<HttpResponse> {
    let roots = state
        .tree_builder()
        .root_comments(*post_id, viewer.user_id(), query.sort_order())
        .await?;

    forest_response(&roots)
}

fn forest_response(forest: &[CommentNode]) -> Result<HttpResponse> {
    let body = CommentNode::forest_json(forest)?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

pub async fn create_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
    req: web::Json<CreateComment>,
) -> Result<HttpResponse> {
    let comment = state
        .comment_service()
        .create_comment(viewer.user_id(), *post_id, req.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

pub async fn update_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    comment_id: web::Path<Uuid>,
    req: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    let comment = state
        .comment_service()
        .edit_comment(viewer.user_id(), *comment_id, &req.content)
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

/// Delete a comment and all of its replies
pub async fn delete_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    comment_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let deleted = state
        .comment_service()
        .delete_comment(viewer.user_id(), *comment_id)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": *comment_id,
        "deleted": deleted,
    })))
}
