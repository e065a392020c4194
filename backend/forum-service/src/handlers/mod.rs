/// HTTP handlers for forum endpoints
///
/// This module contains handlers for:
/// - Posts: list, detail, create, edit, delete
/// - Comments: flat list, tree, root-only listing, create, edit, cascade delete
/// - Votes: up/down on posts and comments
/// - Communities and search
use actix_web::web;
use serde::Deserialize;

use crate::middleware::{ApiKeyAuthMiddleware, MetricsMiddleware};
use crate::models::SortOrder;

pub mod comments;
pub mod communities;
pub mod posts;
pub mod search;
pub mod votes;

/// `?order=top|new|old`; anything else reads as `top`
#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub order: Option<String>,
}

impl OrderParams {
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::from_param(self.order.as_deref())
    }
}

/// Register every `/api/v1` forum route
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(ApiKeyAuthMiddleware)
            .wrap(MetricsMiddleware)
            .service(
                web::scope("/posts")
                    .service(
                        web::resource("")
                            .route(web::get().to(posts::list_posts))
                            .route(web::post().to(posts::create_post)),
                    )
                    .service(
                        web::resource("/{post_id}")
                            .route(web::get().to(posts::get_post))
                            .route(web::patch().to(posts::update_post))
                            .route(web::delete().to(posts::delete_post)),
                    )
                    .route("/{post_id}/upvote", web::post().to(votes::upvote_post))
                    .route("/{post_id}/downvote", web::post().to(votes::downvote_post))
                    .service(
                        web::resource("/{post_id}/comments")
                            .route(web::get().to(comments::list_comments))
                            .route(web::post().to(comments::create_comment)),
                    )
                    .route(
                        "/{post_id}/comments/tree",
                        web::get().to(comments::comment_tree),
                    )
                    .route(
                        "/{post_id}/comments/root",
                        web::get().to(comments::root_comments),
                    ),
            )
            .service(
                web::scope("/comments")
                    .service(
                        web::resource("/{comment_id}")
                            .route(web::patch().to(comments::update_comment))
                            .route(web::delete().to(comments::delete_comment)),
                    )
                    .route("/{comment_id}/upvote", web::post().to(votes::upvote_comment))
                    .route(
                        "/{comment_id}/downvote",
                        web::post().to(votes::downvote_comment),
                    ),
            )
            .route("/search", web::get().to(search::search))
            .service(
                web::scope("/communities")
                    .route("", web::get().to(communities::list_communities))
                    .route("/{community_id}", web::get().to(communities::get_community))
                    .route(
                        "/{community_id}/posts",
                        web::get().to(communities::community_posts),
                    )
                    .service(
                        web::resource("/{community_id}/subscription")
                            .route(web::post().to(communities::subscribe))
                            .route(web::delete().to(communities::unsubscribe)),
                    ),
            ),
    );
}
