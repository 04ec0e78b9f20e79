/// Banner image upload
///
/// `POST /api/goals/upload-banner` takes a multipart body with one `banner`
/// file field. The returned `url` is what clients store in a goal's
/// `banner` field.

use axum::{
    extract::{Multipart, State},
    Extension,
};
use goaltrack_shared::auth::middleware::AuthContext;
use tracing::debug;

use crate::{
    app::AppState,
    error::ApiResult,
    response::ApiResponse,
    uploads::{StoredBanner, UploadError},
};

/// Multipart field holding the image
pub const BANNER_FIELD: &str = "banner";

/// # Errors
///
/// - `400 Bad Request`: no `banner` field, non-image type, empty or oversized file
pub async fn upload_banner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<StoredBanner>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(BANNER_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let stored = state
            .banners
            .save(file_name.as_deref(), content_type.as_deref(), &bytes)
            .await?;

        debug!(user_id = %auth.user_id, url = %stored.url, "Banner uploaded");
        return Ok(ApiResponse::with_message("Banner uploaded successfully", stored));
    }

    Err(UploadError::Missing.into())
}
