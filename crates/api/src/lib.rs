//! HTTP API: routing, request/response mapping and the server binary's wiring.

pub mod app;
pub mod middleware;
