use std::future::Future;

use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    ai::provider::ProviderError,
    auth::repo_types::{Plan, User},
    creations::repo_types::{CreationType, NewCreation},
    error::{AppError, AppResult},
    state::AppState,
    storage::ext_from_mime,
};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const BLOG_TITLE_TOKENS: u32 = 100;
const RESUME_REVIEW_TOKENS: u32 = 1000;

pub struct Upload {
    pub body: Bytes,
    pub content_type: String,
}

/// One approved generation request.
pub enum GenerationJob {
    Article { prompt: String, max_tokens: u32 },
    BlogTitle { prompt: String },
    Image { prompt: String, publish: bool },
    RemoveBackground { image: Upload },
    RemoveObject { image: Upload, object: String },
    ResumeReview { pdf: Bytes },
}

/// Runs `fut` on its own task. A dropped request future (client went away)
/// does not cancel the provider call or the write that records it.
pub async fn detached<F, T>(fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("generation task failed: {e}")))?
}

/// Provider failures are logged in full and shown to the user generically.
fn upstream(e: ProviderError) -> AppError {
    error!(error = %e, "content provider failed");
    match e {
        ProviderError::Timeout => {
            AppError::Upstream("The AI provider took too long to respond. Please try again.".into())
        }
        _ => AppError::Upstream("Content generation failed. Please try again.".into()),
    }
}

async fn upload(state: &AppState, user_id: Uuid, img: Upload) -> AppResult<String> {
    let ext = ext_from_mime(&img.content_type).unwrap_or("bin");
    let key = format!("creations/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, img.body, &img.content_type)
        .await?;
    Ok(key)
}

/// Best-effort removal of an upload whose creation was never recorded.
async fn discard(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %e, %key, "orphaned upload left in storage");
    }
}

async fn extract_resume_text(pdf: Bytes) -> AppResult<String> {
    if pdf.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(
            "Resume file size exceeds allowed size (5MB).".into(),
        ));
    }
    // The parser can panic on hostile input; treat that like any unreadable file.
    let text = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|r| r)
    .map_err(|e| {
        warn!(error = %e, "unreadable resume pdf");
        AppError::Validation("Could not read the uploaded PDF.".into())
    })?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation("The uploaded PDF contains no text.".into()));
    }
    Ok(text)
}

pub fn resume_review_prompt(resume_text: &str) -> String {
    format!(
        "Review the following resume and provide constructive feedback on its strengths, \
         weaknesses, and areas for improvement. Resume Content:\n\n{resume_text}"
    )
}

/// Calls the provider, then records the result as a new creation owned by
/// `user`. Returns the creation content (text or URL).
pub async fn run(state: AppState, user: User, job: GenerationJob) -> AppResult<String> {
    detached(execute(state, user, job)).await
}

async fn execute(state: AppState, user: User, job: GenerationJob) -> AppResult<String> {
    let provider = state.provider.clone();
    // Object key of anything we uploaded, removed again if the insert fails.
    // Edits that fail at the provider remove their upload on the spot.
    let mut uploaded: Option<String> = None;

    let (prompt, content, kind, publish) = match job {
        GenerationJob::Article { prompt, max_tokens } => {
            let text = provider.complete(&prompt, max_tokens).await.map_err(upstream)?;
            (prompt, text, CreationType::Article, false)
        }
        GenerationJob::BlogTitle { prompt } => {
            let text = provider
                .complete(&prompt, BLOG_TITLE_TOKENS)
                .await
                .map_err(upstream)?;
            (prompt, text, CreationType::BlogTitle, false)
        }
        GenerationJob::Image { prompt, publish } => {
            let bytes = provider.generate_image(&prompt).await.map_err(upstream)?;
            let key = upload(
                &state,
                user.id,
                Upload {
                    body: bytes,
                    content_type: "image/jpeg".into(),
                },
            )
            .await?;
            let url = state.storage.public_url(&key);
            uploaded = Some(key);
            (prompt, url, CreationType::Image, publish)
        }
        GenerationJob::RemoveBackground { image } => {
            let key = upload(&state, user.id, image).await?;
            let source = state.storage.public_url(&key);
            let url = match provider.remove_background(&source).await {
                Ok(url) => url,
                Err(e) => {
                    discard(&state, &key).await;
                    return Err(upstream(e));
                }
            };
            uploaded = Some(key);
            ("Remove background from image".to_string(), url, CreationType::Image, false)
        }
        GenerationJob::RemoveObject { image, object } => {
            let key = upload(&state, user.id, image).await?;
            let source = state.storage.public_url(&key);
            let url = match provider.remove_object(&source, &object).await {
                Ok(url) => url,
                Err(e) => {
                    discard(&state, &key).await;
                    return Err(upstream(e));
                }
            };
            uploaded = Some(key);
            (format!("Removed {object} from image"), url, CreationType::Image, false)
        }
        GenerationJob::ResumeReview { pdf } => {
            let text = extract_resume_text(pdf).await?;
            let review = provider
                .complete(&resume_review_prompt(&text), RESUME_REVIEW_TOKENS)
                .await
                .map_err(upstream)?;
            (
                "Review the uploaded resume".to_string(),
                review,
                CreationType::ResumeReview,
                false,
            )
        }
    };

    let new = NewCreation {
        user_id: user.id,
        prompt,
        content,
        kind,
        publish,
    };
    let creation = match state.creations.insert(new).await {
        Ok(c) => c,
        Err(e) => {
            if let Some(key) = uploaded {
                discard(&state, &key).await;
            }
            return Err(e.into());
        }
    };

    if user.plan == Plan::Free {
        if let Err(e) = state.users.increment_free_usage(user.id).await {
            warn!(error = %e, user_id = %user.id, "free usage counter not updated");
        }
    }

    info!(user_id = %user.id, creation_id = creation.id, kind = %creation.kind, "creation recorded");
    Ok(creation.content)
}
