//! Homepage and branch page editing, image uploads and generated images.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::instrument;

use salonhub_core::content::{BranchContent, HomepageContent};
use salonhub_core::{BranchId, Capability};

use crate::db::BranchRepository;
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::CurrentUser;
use crate::services::cloudinary::MAX_UPLOAD_BYTES;
use crate::services::{CloudinaryClient, Crop, GenerationOptions, ImageGenerationClient};
use crate::state::AppState;

/// Folder, below the root, holding branch page images.
const BRANCH_FOLDER: &str = "branches";

/// Multipart overhead allowed on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the content router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content/homepage", get(homepage).put(save_homepage))
        .route(
            "/api/content/branches/{id}",
            get(branch_page).put(save_branch_page),
        )
        .route(
            "/api/content/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + FORM_OVERHEAD_BYTES)),
        )
        .route("/api/content/images/url", get(image_url))
        .route("/api/content/images/{*public_id}", delete(delete_image))
        .route("/api/content/generate-image", post(generate_image))
}

fn cloudinary(state: &AppState) -> Result<&CloudinaryClient, AppError> {
    state
        .cloudinary()
        .ok_or_else(|| AppError::Unavailable("image hosting is not configured".to_string()))
}

fn image_generation(state: &AppState) -> Result<&ImageGenerationClient, AppError> {
    state
        .image_generation()
        .ok_or_else(|| AppError::Unavailable("image generation is not configured".to_string()))
}

/// Anyone who edits a page may upload images for it.
fn ensure_editor(user: &CurrentUser) -> Result<(), AppError> {
    if user.role.can(Capability::ManageHomepage) {
        Ok(())
    } else {
        user.require(Capability::ManageBranchContent)
    }
}

/// Folder, relative to the configured root, that bounds an editor's images.
///
/// `None` for homepage editors, who may use any folder. Branch-scoped
/// editors are held to `branches/{their branch}`, other branch content
/// editors to `branches`.
fn image_scope(user: &CurrentUser) -> Result<Option<String>, AppError> {
    ensure_editor(user)?;
    if user.role.can(Capability::ManageHomepage) {
        return Ok(None);
    }
    if !user.role.is_branch_scoped() {
        return Ok(Some(BRANCH_FOLDER.to_string()));
    }
    let branch = user
        .branch_id
        .ok_or_else(|| AppError::Forbidden("account has no branch".to_string()))?;
    Ok(Some(format!("{BRANCH_FOLDER}/{branch}")))
}

fn is_within(path: &str, scope: &str) -> bool {
    path.split('/').all(|segment| segment != "..")
        && (path == scope
            || path
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with('/')))
}

/// Upload folder for `requested`, defaulting to the editor's own scope.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if the folder is outside the editor's scope.
pub fn upload_folder(
    user: &CurrentUser,
    requested: Option<&str>,
) -> Result<Option<String>, AppError> {
    let requested = requested
        .map(|f| f.trim_matches('/'))
        .filter(|f| !f.is_empty());
    match (image_scope(user)?, requested) {
        (None, folder) => Ok(folder.map(ToOwned::to_owned)),
        (Some(scope), None) => Ok(Some(scope)),
        (Some(scope), Some(folder)) if is_within(folder, &scope) => Ok(Some(folder.to_owned())),
        (Some(_), Some(folder)) => Err(AppError::Forbidden(format!(
            "cannot store images in {folder}"
        ))),
    }
}

/// Fail unless `public_id`, stored under `root`, is within the editor's scope.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if the image belongs to another page.
pub fn ensure_image_in_scope(
    user: &CurrentUser,
    root: &str,
    public_id: &str,
) -> Result<(), AppError> {
    let Some(scope) = image_scope(user)? else {
        return Ok(());
    };
    let scope = format!("{}/{scope}", root.trim_matches('/'));
    if is_within(public_id.trim_start_matches('/'), &scope) && public_id != scope {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "image {public_id} belongs to another page"
        )))
    }
}

/// GET /api/content/homepage
async fn homepage(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<HomepageContent>, AppError> {
    user.require(Capability::ManageHomepage)?;
    let content = state.content().homepage().await?;
    Ok(Json(HomepageContent::clone(&content)))
}

/// PUT /api/content/homepage
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn save_homepage(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<HomepageContent>,
) -> Result<Json<HomepageContent>, AppError> {
    user.require(Capability::ManageHomepage)?;
    state.content().save_homepage(&body, user.id).await?;
    Ok(Json(body))
}

async fn ensure_branch_exists(state: &AppState, id: BranchId) -> Result<(), AppError> {
    BranchRepository::new(state.pool())
        .get(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("branch {id}")))
}

/// GET /api/content/branches/{id}
async fn branch_page(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> Result<Json<BranchContent>, AppError> {
    user.require(Capability::ManageBranchContent)?;
    user.ensure_branch(id)?;
    ensure_branch_exists(&state, id).await?;
    let content = state.content().branch_content(id).await?;
    Ok(Json(BranchContent::clone(&content)))
}

/// PUT /api/content/branches/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn save_branch_page(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    Json(mut body): Json<BranchContent>,
) -> Result<Json<BranchContent>, AppError> {
    user.require(Capability::ManageBranchContent)?;
    user.ensure_branch(id)?;
    ensure_branch_exists(&state, id).await?;

    body.branch_id = id;
    state.content().save_branch_content(&body, user.id).await?;
    Ok(Json(body))
}

/// Upload an image to the hosting provider.
///
/// Expects a `file` field and an optional `folder` field.
///
/// POST /api/content/images
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
async fn upload_image(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    image_scope(&user)?;
    let client = cloudinary(&state)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            "folder" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
                folder = crate::models::non_blank(Some(&text));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;
    let folder = upload_folder(&user, folder.as_deref())?;
    let uploaded = client.upload(bytes, &filename, folder.as_deref()).await?;
    tracing::info!(public_id = %uploaded.public_id, "Image uploaded");
    Ok((StatusCode::CREATED, Json(uploaded)).into_response())
}

/// Query for a resized delivery URL.
#[derive(Debug, Deserialize)]
pub struct ImageUrlQuery {
    pub public_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub crop: Crop,
}

/// Delivery URL for a resized image.
///
/// GET /api/content/images/url
async fn image_url(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ImageUrlQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    ensure_editor(&user)?;
    let url = cloudinary(&state)?.transformed_url(
        &query.public_id,
        query.width,
        query.height,
        query.crop,
    );
    Ok(Json(serde_json::json!({ "url": url })))
}

/// DELETE /api/content/images/{public_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_image(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let client = cloudinary(&state)?;
    ensure_image_in_scope(&user, client.folder(), &public_id)?;
    client.destroy(&public_id).await?;
    tracing::info!(%public_id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Body of an image generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub options: GenerationOptions,
    /// Store the result with the hosting provider instead of returning it.
    #[serde(default)]
    pub upload: bool,
    #[serde(default)]
    pub folder: Option<String>,
}

/// File extension for a generated image's content type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Generate an image from a prompt.
///
/// Returns the image itself, or the uploaded image when `upload` is set.
///
/// POST /api/content/generate-image
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn generate_image(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<GenerateImageRequest>,
) -> Result<Response, AppError> {
    let folder = upload_folder(&user, body.folder.as_deref())?;
    let generator = image_generation(&state)?;
    let uploader = if body.upload {
        Some(cloudinary(&state)?)
    } else {
        None
    };

    let image = generator.generate(&body.prompt, &body.options).await?;

    let Some(uploader) = uploader else {
        return Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response());
    };

    let filename = format!("generated.{}", extension_for(&image.content_type));
    let uploaded = uploader
        .upload(image.bytes, &filename, folder.as_deref())
        .await?;
    tracing::info!(public_id = %uploaded.public_id, "Generated image uploaded");
    Ok((StatusCode::CREATED, Json(uploaded)).into_response())
}
