/// Forum Service Library
///
/// Posts, threaded comments, votes and communities for the forum platform.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and route registration
/// - `models`: Posts, comments, votes, ordering policy, comment tree nodes
/// - `services`: Tree builder, vote mutator, cascade deleter and the other use cases
/// - `db`: Storage traits with PostgreSQL and in-memory implementations
/// - `middleware`: API-key identity and request metrics
/// - `state`: Shared handles passed to handlers
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
