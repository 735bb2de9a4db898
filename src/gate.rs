//! Plan gate: which generation capabilities a plan may invoke.

use tracing::warn;

use crate::{auth::repo_types::Plan, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Article,
    BlogTitle,
    ImageGeneration,
    BackgroundRemoval,
    ObjectRemoval,
    ResumeReview,
}

impl Capability {
    pub fn is_free(&self) -> bool {
        matches!(self, Capability::Article | Capability::BlogTitle)
    }

    pub fn feature_name(&self) -> &'static str {
        match self {
            Capability::Article => "Article Writing",
            Capability::BlogTitle => "Blog Titles",
            Capability::ImageGeneration => "Image Generation",
            Capability::BackgroundRemoval => "Background Removal",
            Capability::ObjectRemoval => "Object Removal",
            Capability::ResumeReview => "Resume Review",
        }
    }
}

pub fn allows(plan: Plan, capability: Capability) -> bool {
    capability.is_free() || plan == Plan::Premium
}

/// `Forbidden` carries an upgrade message, distinct from `Unauthenticated`.
pub fn require(plan: Plan, capability: Capability) -> Result<(), AppError> {
    if allows(plan, capability) {
        return Ok(());
    }
    warn!(%plan, feature = capability.feature_name(), "plan gate denied");
    Err(AppError::Forbidden(format!(
        "{} is only available for Premium users. Upgrade your plan to unlock it.",
        capability.feature_name()
    )))
}
