/// API route handlers, one module per resource
///
/// - `health`: liveness and store connectivity
/// - `users`: registration, sessions and account management
/// - `goals`: goal CRUD and projections
/// - `banners`: banner image upload

pub mod banners;
pub mod goals;
pub mod health;
pub mod users;
