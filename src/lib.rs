// Microblog - blog-style publishing platform over axum + sqlx

// Application state and configuration
pub mod app_state;
pub mod config;

// Entity Store - relational persistence for users, groups, posts, comments, follows
pub mod models;
pub mod store;

// Query/Feed Engine - filtered, ordered, paginated post feeds
pub mod feed;

// Request principal - opaque identity resolved from the upstream auth layer
pub mod principal;

// HTTP surface - routers, read handlers, mutation handlers
pub mod forms;
pub mod handlers;

// Common utilities
pub mod data_seeder;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
