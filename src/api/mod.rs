//! HTTP API Handlers and Routes
//!
//! The REST surface of ee-scout, built on Axum.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research` - Plan and execute a research query
//! - `POST /api/plan` - Plan a query and return the task tree without running it
//!
//! ## Knowledge (`/api/entities`)
//! - `GET /api/entities/{key}` - Stored entity, incident relationships and
//!   classification history
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check with source and cache status

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
