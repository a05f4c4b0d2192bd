//! HTTP infrastructure module
//!
//! This module contains HTTP-related concerns: server, routes, handlers,
//! response formatting and filter utilities.

pub mod handlers;
pub mod rate_limit;
pub mod responses;
pub mod routes;
pub mod server;
pub mod utils;

pub use responses::ResponseFormatter;
pub use routes::RouteBuilder;
pub use server::HttpServer;
