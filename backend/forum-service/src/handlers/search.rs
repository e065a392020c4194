use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::services::SearchKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Search posts by title and/or comments by content
pub async fn search(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse> {
    let kind = SearchKind::from_param(query.kind.as_deref())?;
    let results = state
        .search_service()
        .search(
            viewer.user_id(),
            &query.q,
            kind,
            state.forum.default_page_limit,
        )
        .await?;

    Ok(HttpResponse::Ok().json(results))
}
