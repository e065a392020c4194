/// Vote handlers - up/down votes on posts and comments
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::models::{VoteDirection, VoteTarget};
use crate::state::AppState;

async fn vote(
    state: web::Data<AppState>,
    viewer: Viewer,
    target: VoteTarget,
    direction: VoteDirection,
) -> Result<HttpResponse> {
    let summary = state
        .vote_service()
        .apply_vote(viewer.user_id(), target, direction)
        .await?;

    Ok(HttpResponse::Ok().json(summary))
}

pub async fn upvote_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    vote(state, viewer, VoteTarget::Post(*post_id), VoteDirection::Up).await
}

pub async fn downvote_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    vote(state, viewer, VoteTarget::Post(*post_id), VoteDirection::Down).await
}

pub async fn upvote_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    comment_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    vote(state, viewer, VoteTarget::Comment(*comment_id), VoteDirection::Up).await
}

pub async fn downvote_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    comment_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    vote(state, viewer, VoteTarget::Comment(*comment_id), VoteDirection::Down).await
}
