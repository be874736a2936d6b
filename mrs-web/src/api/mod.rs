//! HTTP API handlers for mrs-web

pub mod access;
pub mod actions;
pub mod ai;
pub mod auth;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod results;
pub mod sse;

pub use actions::action_routes;
pub use ai::ai_routes;
pub use auth::auth_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use projects::project_routes;
pub use results::results_routes;
pub use sse::event_stream;
