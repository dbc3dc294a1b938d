//! Generation submission.
//!
//! [`GenerationOrchestrator`] is a two-state machine ({idle, submitting})
//! that turns form state into one gateway call. On success it performs
//! exactly two effects, in order:
//!
//! 1. publish the returned [`Generation`] as the current result;
//! 2. invalidate the [`HISTORY_TAG`] cache tag.
//!
//! On failure it performs neither. There is no status polling after
//! submission: the returned record is what gets displayed, even while it
//! is still `pending` or `generating`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spritegen_cache::{MutationOutcome, OperationCache};
use spritegen_client::{ApiError, GenerationGateway};
use spritegen_core::generation::{ensure_image_bytes, GenerationForm};
use spritegen_core::types::{Generation, UploadResponse};
use tokio::sync::watch;

use crate::error::AppResult;
use crate::history::HISTORY_TAG;

/// Mutation name under which submissions are tracked.
pub const GENERATE_MUTATION: &str = "generate";

/// Mutation name under which reference uploads are tracked.
pub const UPLOAD_MUTATION: &str = "upload-reference";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
}

/// Result of a submit attempt that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The request succeeded and the record is now the current result.
    Published(Generation),
    /// Another submission was already in flight; nothing was sent.
    Busy,
}

/// Turns a [`GenerationForm`] into one generation request at a time.
///
/// Shared through [`AppContext::orchestrator`](crate::AppContext::orchestrator)
/// so every surface sees the same submitting state and current result.
pub struct GenerationOrchestrator {
    gateway: Arc<dyn GenerationGateway>,
    cache: OperationCache<ApiError>,
    submitting: AtomicBool,
    current: watch::Sender<Option<Generation>>,
}

impl GenerationOrchestrator {
    pub fn new(gateway: Arc<dyn GenerationGateway>, cache: OperationCache<ApiError>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            gateway,
            cache,
            submitting: AtomicBool::new(false),
            current,
        }
    }

    pub fn state(&self) -> SubmissionState {
        if self.submitting.load(Ordering::Acquire) {
            SubmissionState::Submitting
        } else {
            SubmissionState::Idle
        }
    }

    /// Whether the submit control should be enabled for `form`.
    pub fn can_submit(&self, form: &GenerationForm) -> bool {
        self.state() == SubmissionState::Idle && form.can_submit()
    }

    /// Submit the form.
    ///
    /// - While another submission is pending this is a refusal
    ///   ([`SubmitOutcome::Busy`]), not an error.
    /// - A blank prompt or missing model fails with
    ///   [`AppError::Validation`](crate::AppError::Validation) before any
    ///   network call.
    /// - Gateway failures are returned as-is; the current result and the
    ///   history cache are left untouched.
    pub async fn submit(&self, form: &GenerationForm) -> AppResult<SubmitOutcome> {
        let Some(_guard) = SubmittingGuard::claim(&self.submitting) else {
            tracing::debug!("Submission refused: another one is pending");
            return Ok(SubmitOutcome::Busy);
        };

        let request = form.build_request()?;
        tracing::info!(
            model = request.model(),
            sprite_sheet = request.is_sprite_sheet(),
            "Submitting generation"
        );

        let gateway = Arc::clone(&self.gateway);
        let outcome = self
            .cache
            .mutate(GENERATE_MUTATION, async move { gateway.submit(&request).await })
            .await;

        match outcome {
            MutationOutcome::Success(generation) => {
                tracing::info!(
                    generation_id = %generation.id,
                    status = %generation.status,
                    "Generation returned"
                );
                self.current.send_replace(Some(generation.clone()));
                self.cache.invalidate(HISTORY_TAG);
                Ok(SubmitOutcome::Published(generation))
            }
            MutationOutcome::Failure(err) => {
                tracing::warn!(error = %err, "Generation failed");
                Err(err.into())
            }
        }
    }

    /// Upload a reference image so the server keeps a copy.
    ///
    /// Non-image bytes are rejected locally.
    pub async fn upload_reference(&self, bytes: Vec<u8>, filename: &str) -> AppResult<UploadResponse> {
        ensure_image_bytes(&bytes)?;
        let gateway = Arc::clone(&self.gateway);
        let filename_owned = filename.to_string();
        let uploaded = self
            .cache
            .mutate(UPLOAD_MUTATION, async move {
                gateway.upload_reference(bytes, &filename_owned).await
            })
            .await
            .into_result()?;
        tracing::info!(path = %uploaded.path, "Reference image uploaded");
        Ok(uploaded)
    }

    /// The most recently published result.
    pub fn current_result(&self) -> Option<Generation> {
        self.current.borrow().clone()
    }

    /// Follow published results.
    pub fn watch_result(&self) -> watch::Receiver<Option<Generation>> {
        self.current.subscribe()
    }

    pub fn clear_result(&self) {
        self.current.send_replace(None);
    }
}

/// Holds the submitting flag; releasing it on drop returns the machine
/// to idle even if the submit future is abandoned.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl<'a> SubmittingGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
