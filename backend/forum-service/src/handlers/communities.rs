use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::state::AppState;

pub async fn list_communities(state: web::Data<AppState>) -> Result<HttpResponse> {
    let communities = state.community_service().list_communities().await?;
    Ok(HttpResponse::Ok().json(communities))
}

pub async fn get_community(
    state: web::Data<AppState>,
    community_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let community = state.community_service().get_community(*community_id).await?;
    Ok(HttpResponse::Ok().json(community))
}

/// Posts of a community, newest first
pub async fn community_posts(
    state: web::Data<AppState>,
    viewer: Viewer,
    community_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let posts = state
        .community_service()
        .community_posts(viewer.user_id(), *community_id)
        .await?;

    Ok(HttpResponse::Ok().json(posts))
}

pub async fn subscribe(
    state: web::Data<AppState>,
    viewer: Viewer,
    community_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let subscription = state
        .community_service()
        .set_subscription(viewer.user_id(), *community_id, true)
        .await?;

    Ok(HttpResponse::Ok().json(subscription))
}

pub async fn unsubscribe(
    state: web::Data<AppState>,
    viewer: Viewer,
    community_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let subscription = state
        .community_service()
        .set_subscription(viewer.user_id(), *community_id, false)
        .await?;

    Ok(HttpResponse::Ok().json(subscription))
}
