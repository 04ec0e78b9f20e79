/// HTTP middleware owned by the API crate
///
/// Session authentication lives in `goaltrack_shared::auth::middleware`.

pub mod security;
