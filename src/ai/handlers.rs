use std::collections::HashMap;

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    gate::{self, Capability},
    state::AppState,
};

use super::{
    dto::{ArticleRequest, ContentResponse, ImageRequest, PromptRequest},
    services::{self, GenerationJob, Upload},
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn text_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/generate-article", post(generate_article))
        .route("/ai/generate-blog-title", post(generate_blog_title))
        .route("/ai/generate-image", post(generate_image))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/remove-image-background", post(remove_image_background))
        .route("/ai/remove-image-object", post(remove_image_object))
        .route("/ai/resume-review", post(resume_review))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn required_prompt(prompt: &str) -> AppResult<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt is required".into()));
    }
    Ok(prompt.to_string())
}

// Bodies are unpacked after the plan gate so a denied caller always sees 403.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(b)| b).map_err(AppError::from)
}

fn multipart_body(mp: Result<Multipart, MultipartRejection>) -> AppResult<Multipart> {
    mp.map_err(|e| AppError::Validation(e.body_text()))
}

fn respond(content: String) -> Json<ContentResponse> {
    Json(ContentResponse {
        success: true,
        content,
    })
}

/// Multipart body split into file parts and text parts.
#[derive(Default)]
struct Form {
    files: HashMap<String, Upload>,
    fields: HashMap<String, String>,
}

impl Form {
    async fn read(mut mp: Multipart) -> AppResult<Self> {
        let mut form = Form::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid upload: {e}")))?;
                form.files.insert(name, Upload { body, content_type });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    fn file(&mut self, name: &str, what: &str) -> AppResult<Upload> {
        self.files
            .remove(name)
            .filter(|u| !u.body.is_empty())
            .ok_or_else(|| AppError::Validation(format!("{what} is required")))
    }

    fn image(&mut self) -> AppResult<Upload> {
        let img = self.file("image", "Image")?;
        if !img.content_type.starts_with("image/") {
            return Err(AppError::Validation("Uploaded file must be an image".into()));
        }
        Ok(img)
    }
}

#[instrument(skip(state, user, body))]
pub async fn generate_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<ArticleRequest>, JsonRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::Article)?;
    let body = json_body(body)?;
    let job = GenerationJob::Article {
        prompt: required_prompt(&body.prompt)?,
        max_tokens: body.max_tokens(),
    };
    Ok(respond(services::run(state, user, job).await?))
}

#[instrument(skip(state, user, body))]
pub async fn generate_blog_title(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::BlogTitle)?;
    let body = json_body(body)?;
    let job = GenerationJob::BlogTitle {
        prompt: required_prompt(&body.prompt)?,
    };
    Ok(respond(services::run(state, user, job).await?))
}

#[instrument(skip(state, user, body))]
pub async fn generate_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<ImageRequest>, JsonRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::ImageGeneration)?;
    let body = json_body(body)?;
    let job = GenerationJob::Image {
        prompt: required_prompt(&body.prompt)?,
        publish: body.publish,
    };
    Ok(respond(services::run(state, user, job).await?))
}

#[instrument(skip(state, user, mp))]
pub async fn remove_image_background(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::BackgroundRemoval)?;
    let mut form = Form::read(multipart_body(mp)?).await?;
    let job = GenerationJob::RemoveBackground {
        image: form.image()?,
    };
    Ok(respond(services::run(state, user, job).await?))
}

#[instrument(skip(state, user, mp))]
pub async fn remove_image_object(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::ObjectRemoval)?;
    let mut form = Form::read(multipart_body(mp)?).await?;
    let image = form.image()?;
    let object = form
        .fields
        .get("object")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Object name is required".into()))?;
    let job = GenerationJob::RemoveObject { image, object };
    Ok(respond(services::run(state, user, job).await?))
}

#[instrument(skip(state, user, mp))]
pub async fn resume_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ContentResponse>> {
    gate::require(user.plan, Capability::ResumeReview)?;
    let mut form = Form::read(multipart_body(mp)?).await?;
    let resume = form.file("resume", "Resume")?;
    let job = GenerationJob::ResumeReview { pdf: resume.body };
    Ok(respond(services::run(state, user, job).await?))
}
