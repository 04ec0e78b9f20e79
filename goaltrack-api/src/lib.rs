/// GoalTrack API server library
///
/// Configuration, router, handlers and HTTP plumbing. The binary in
/// `main.rs` wires these together; integration tests drive the router
/// directly.

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod session;
pub mod uploads;
