/// GoalTrack shared library
///
/// Storage, entity models and authentication used by the API server.
///
/// # Modules
///
/// - [`store`]: wide-column keyspace trait, Postgres and in-memory backends,
///   and the timeout-bounded [`store::Store`] handle
/// - [`db`]: Postgres pool and migrations for the `postgres` backend
/// - [`models`]: users, goals and one-time tokens with their projection fan-out
/// - [`auth`]: password hashing, JWT sessions, middleware and ownership checks

pub mod auth;
pub mod db;
pub mod models;
pub mod store;
