//! Session state and the synthesis orchestrator.
//!
//! A [`Session`] owns every transient entity of one user session and
//! sequences the optional style-analysis call and the main synthesis call
//! against a pluggable backend. All methods take `&mut self`; together with
//! the status guard this gives at-most-one-in-flight without any locking.

use crate::backend::{SynthesisBackend, SynthesisRequest};
use crate::credential::CredentialChain;
use crate::error::{ArchiError, Result};
use crate::prompt;
use crate::types::{
    ImageRole, ImageSize, RenderMode, RenderResult, SynthesisParameters, UploadedImage,
};

/// Orchestrator status. Terminal re-entry is always to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// No request in flight.
    #[default]
    Idle,
    /// The preliminary style-DNA call is in flight.
    AnalyzingStyle,
    /// The main synthesis call is in flight.
    Rendering,
}

/// What happened to a trigger.
///
/// Triggers arriving while a request is in flight are ignored, not queued;
/// `Ignored` is also returned when a non-fatal step (style analysis) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call ran and its effect was applied.
    Completed,
    /// The trigger was a no-op.
    Ignored,
}

/// One user session: uploaded images, mode, sliders, result, status.
pub struct Session {
    backend: Box<dyn SynthesisBackend>,
    credentials: CredentialChain,
    mode: RenderMode,
    params: SynthesisParameters,
    style_image: Option<UploadedImage>,
    lineart_image: Option<UploadedImage>,
    style_analysis: Option<String>,
    result: Option<RenderResult>,
    status: Status,
}

impl Session {
    /// Creates a session in plan mode with default sliders.
    pub fn new(backend: Box<dyn SynthesisBackend>, credentials: CredentialChain) -> Self {
        let mode = RenderMode::default();
        Self {
            backend,
            credentials,
            mode,
            params: SynthesisParameters::defaults_for(mode),
            style_image: None,
            lineart_image: None,
            style_analysis: None,
            result: None,
            status: Status::Idle,
        }
    }

    /// Switches render mode. A hard reset: both images, the result, the
    /// analysis text and the status are cleared and sliders return to the
    /// new mode's defaults. The credential chain is untouched.
    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        self.params = SynthesisParameters::defaults_for(mode);
        self.style_image = None;
        self.lineart_image = None;
        self.style_analysis = None;
        self.result = None;
        self.status = Status::Idle;
    }

    /// Replaces the style-reference image. Supersedes any prior reference,
    /// clears the stale analysis text and any existing result.
    pub fn upload_style_reference(&mut self, bytes: Vec<u8>) -> Result<()> {
        if !self.mode.uses_style_reference() {
            return Err(ArchiError::InvalidRequest(
                "enhance mode takes no style reference".into(),
            ));
        }
        let image = UploadedImage::from_bytes(ImageRole::StyleReference, bytes)?;
        self.style_image = Some(image);
        self.style_analysis = None;
        self.result = None;
        Ok(())
    }

    /// Replaces the lineart image (flattened onto white at upload time).
    /// Supersedes any prior lineart and clears any existing result.
    pub fn upload_lineart(&mut self, bytes: Vec<u8>) -> Result<()> {
        let image = UploadedImage::from_bytes(ImageRole::Lineart, bytes)?;
        self.lineart_image = Some(image);
        self.result = None;
        Ok(())
    }

    /// Replaces the sliders. The parameter set must belong to the current
    /// mode; values are clamped to [0, 100] on write, so even a literal
    /// built around the clamping constructors is stored in range.
    pub fn set_parameters(&mut self, params: SynthesisParameters) -> Result<()> {
        if !params.matches_mode(self.mode) {
            return Err(ArchiError::InvalidRequest(format!(
                "parameter set does not belong to {} mode",
                self.mode
            )));
        }
        self.params = params.clamped();
        Ok(())
    }

    /// Runs the preliminary style-DNA call for the uploaded reference.
    ///
    /// Non-fatal by design: on any failure the analysis text simply stays
    /// empty and the composer proceeds without it. Triggers while a call is
    /// in flight, in enhance mode, or without a reference image are ignored.
    pub async fn analyze_style(&mut self) -> Outcome {
        if self.status != Status::Idle {
            tracing::debug!(status = ?self.status, "style analysis ignored while busy");
            return Outcome::Ignored;
        }
        if !self.mode.uses_style_reference() {
            return Outcome::Ignored;
        }
        let Some(style) = self.style_image.clone() else {
            return Outcome::Ignored;
        };
        let Some(credential) = self.credentials.resolve() else {
            tracing::warn!("style analysis skipped: no credential available");
            return Outcome::Ignored;
        };

        self.status = Status::AnalyzingStyle;
        let outcome = self.backend.analyze_style(&credential, &style).await;
        self.status = Status::Idle;

        match outcome {
            Ok(text) => {
                self.style_analysis = Some(text);
                Outcome::Completed
            }
            Err(e) => {
                tracing::warn!("style analysis failed, proceeding without it: {e}");
                Outcome::Ignored
            }
        }
    }

    /// Dispatches the main synthesis call.
    ///
    /// A trigger while the status is not idle is an ignored no-op. The
    /// lineart image must be present, and a style reference too unless the
    /// mode is enhance. The credential is resolved before any network
    /// traffic; a miss surfaces [`ArchiError::CredentialMissing`] without a
    /// call. On failure the previous result is left untouched.
    pub async fn synthesize(&mut self, size: ImageSize, seed: Option<u64>) -> Result<Outcome> {
        if self.status != Status::Idle {
            tracing::debug!(status = ?self.status, "synthesis trigger ignored while busy");
            return Ok(Outcome::Ignored);
        }

        let Some(lineart) = self.lineart_image.clone() else {
            return Err(ArchiError::InvalidRequest("no lineart image uploaded".into()));
        };
        if self.mode.uses_style_reference() && self.style_image.is_none() {
            return Err(ArchiError::InvalidRequest(
                "no style reference uploaded".into(),
            ));
        }

        let Some(credential) = self.credentials.resolve() else {
            return Err(ArchiError::CredentialMissing);
        };

        let parts = prompt::compose(
            self.mode,
            &self.params,
            &lineart,
            self.style_image.as_ref(),
            self.style_analysis.as_deref(),
        );
        let request = SynthesisRequest {
            parts,
            aspect_ratio: lineart.ratio,
            image_size: size,
            seed,
        };

        self.status = Status::Rendering;
        let outcome = self.backend.synthesize(&credential, &request).await;
        self.status = Status::Idle;

        match outcome {
            Ok(image) => {
                self.result = Some(RenderResult::new(image.data, image.format));
                Ok(Outcome::Completed)
            }
            Err(e) => {
                tracing::warn!(class = ?e.class(), "synthesis failed: {e}");
                Err(e)
            }
        }
    }

    /// Current orchestrator status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Current render mode.
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Current sliders.
    pub fn parameters(&self) -> &SynthesisParameters {
        &self.params
    }

    /// The uploaded style reference, if any.
    pub fn style_image(&self) -> Option<&UploadedImage> {
        self.style_image.as_ref()
    }

    /// The uploaded (flattened) lineart, if any.
    pub fn lineart_image(&self) -> Option<&UploadedImage> {
        self.lineart_image.as_ref()
    }

    /// The style-DNA text from the last successful analysis, if any.
    pub fn style_analysis(&self) -> Option<&str> {
        self.style_analysis.as_deref()
    }

    /// The last successful render, if any.
    pub fn result(&self) -> Option<&RenderResult> {
        self.result.as_ref()
    }

    /// The credential chain, for save/clear and picker access.
    pub fn credentials(&self) -> &CredentialChain {
        &self.credentials
    }

    /// Mutable access to the credential chain.
    pub fn credentials_mut(&mut self) -> &mut CredentialChain {
        &mut self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SynthesizedImage;
    use crate::credential::CredentialStore;
    use crate::error::FailureClass;
    use crate::types::ImageFormat;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockBackend {
        synth_calls: AtomicUsize,
        analyze_calls: AtomicUsize,
        // taken on the next synthesize call
        fail_synthesis: Mutex<Option<ArchiError>>,
        fail_analysis: Mutex<Option<ArchiError>>,
    }

    impl MockBackend {
        fn failing_synthesis(err: ArchiError) -> Self {
            Self {
                fail_synthesis: Mutex::new(Some(err)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SynthesisBackend for Arc<MockBackend> {
        async fn synthesize(
            &self,
            _credential: &str,
            _request: &SynthesisRequest,
        ) -> Result<SynthesizedImage> {
            self.synth_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_synthesis.lock().unwrap().take() {
                return Err(err);
            }
            Ok(SynthesizedImage {
                data: vec![9, 9, 9],
                format: ImageFormat::Png,
            })
        }

        async fn analyze_style(
            &self,
            _credential: &str,
            _image: &UploadedImage,
        ) -> Result<String> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_analysis.lock().unwrap().take() {
                return Err(err);
            }
            Ok("pale terrazzo and warm brass".to_string())
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    /// Chain with a stored credential; the tempdir must outlive the chain.
    fn chain_with_credential(dir: &tempfile::TempDir) -> CredentialChain {
        let store = CredentialStore::new(dir.path().join("credential"));
        store.save("test-credential").unwrap();
        CredentialChain::new()
            .with_store(store)
            .with_env_var("ARCHILOGIC_TEST_UNSET_VAR")
    }

    fn empty_chain(dir: &tempfile::TempDir) -> CredentialChain {
        CredentialChain::new()
            .with_store(CredentialStore::new(dir.path().join("credential")))
            .with_env_var("ARCHILOGIC_TEST_UNSET_VAR")
    }

    fn session_with(backend: Arc<MockBackend>, chain: CredentialChain) -> Session {
        Session::new(Box::new(backend), chain)
    }

    #[tokio::test]
    async fn test_full_plan_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));

        session.upload_lineart(png_bytes(192, 108)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();
        assert_eq!(session.analyze_style().await, Outcome::Completed);
        assert_eq!(
            session.style_analysis(),
            Some("pale terrazzo and warm brass")
        );

        let outcome = session.synthesize(ImageSize::K2, None).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.status(), Status::Idle);
        assert_eq!(session.result().unwrap().data, vec![9, 9, 9]);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_while_busy_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();

        session.status = Status::Rendering;
        let outcome = session.synthesize(ImageSize::K1, None).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 0);

        assert_eq!(session.analyze_style().await, Outcome::Ignored);
        assert_eq!(backend.analyze_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_lineart_rejected_without_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.set_mode(RenderMode::Enhance);

        let err = session.synthesize(ImageSize::K1, None).await.unwrap_err();
        assert!(matches!(err, ArchiError::InvalidRequest(_)));
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_style_reference_rejected_in_plan_mode() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();

        let err = session.synthesize(ImageSize::K1, None).await.unwrap_err();
        assert!(matches!(err, ArchiError::InvalidRequest(_)));
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enhance_mode_needs_no_style_reference() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.set_mode(RenderMode::Enhance);
        session.upload_lineart(png_bytes(100, 100)).unwrap();

        let outcome = session.synthesize(ImageSize::K1, None).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_blocks_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), empty_chain(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();

        let err = session.synthesize(ImageSize::K1, None).await.unwrap_err();
        assert!(matches!(err, ArchiError::CredentialMissing));
        assert_eq!(backend.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_credential_rejection_preserves_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();
        session.synthesize(ImageSize::K1, None).await.unwrap();
        let first = session.result().unwrap().data.clone();

        *backend.fail_synthesis.lock().unwrap() = Some(ArchiError::Credential(
            "billing account is not enabled".into(),
        ));
        let err = session.synthesize(ImageSize::K1, None).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Credential);
        assert!(err.is_credential());

        assert_eq!(session.status(), Status::Idle);
        assert_eq!(session.result().unwrap().data, first);
    }

    #[tokio::test]
    async fn test_transient_failure_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::failing_synthesis(ArchiError::Api {
            status: 500,
            message: "internal".into(),
        }));
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();

        let err = session.synthesize(ImageSize::K1, None).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::TransientOrUnknown);
        assert_eq!(session.status(), Status::Idle);
        assert!(session.result().is_none());
    }

    #[tokio::test]
    async fn test_analysis_failure_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        *backend.fail_analysis.lock().unwrap() = Some(ArchiError::Api {
            status: 503,
            message: "overloaded".into(),
        });
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();

        assert_eq!(session.analyze_style().await, Outcome::Ignored);
        assert!(session.style_analysis().is_none());
        assert_eq!(session.status(), Status::Idle);

        // synthesis still proceeds with an empty analysis
        let outcome = session.synthesize(ImageSize::K1, None).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn test_mode_switch_is_hard_reset() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();
        session.analyze_style().await;
        session.synthesize(ImageSize::K1, None).await.unwrap();

        session.set_mode(RenderMode::Enhance);
        assert!(session.style_image().is_none());
        assert!(session.lineart_image().is_none());
        assert!(session.result().is_none());
        assert!(session.style_analysis().is_none());
        assert_eq!(session.status(), Status::Idle);
        assert_eq!(
            *session.parameters(),
            SynthesisParameters::defaults_for(RenderMode::Enhance)
        );
        // credential chain survives the reset
        assert!(session.credentials().resolve().is_some());
    }

    #[tokio::test]
    async fn test_new_upload_clears_result() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();
        session.synthesize(ImageSize::K1, None).await.unwrap();
        assert!(session.result().is_some());

        session.upload_lineart(png_bytes(200, 100)).unwrap();
        assert!(session.result().is_none());
        // the new upload superseded the old one
        assert_eq!(session.lineart_image().unwrap().width, 200);
    }

    #[tokio::test]
    async fn test_style_upload_rejected_in_enhance_mode() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend, chain_with_credential(&dir));
        session.set_mode(RenderMode::Enhance);

        let err = session.upload_style_reference(png_bytes(64, 64)).unwrap_err();
        assert!(matches!(err, ArchiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_corrupt_upload_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend, chain_with_credential(&dir));
        session.upload_lineart(png_bytes(100, 100)).unwrap();

        let err = session.upload_lineart(b"corrupt".to_vec()).unwrap_err();
        assert_eq!(err.class(), FailureClass::Decode);
        // prior lineart still present
        assert_eq!(session.lineart_image().unwrap().width, 100);
    }

    #[tokio::test]
    async fn test_parameter_set_must_match_mode() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend, chain_with_credential(&dir));

        let err = session
            .set_parameters(SynthesisParameters::enhance(1, 2, 3, 4))
            .unwrap_err();
        assert!(matches!(err, ArchiError::InvalidRequest(_)));

        session
            .set_parameters(SynthesisParameters::blend(70))
            .unwrap();
        assert_eq!(
            *session.parameters(),
            SynthesisParameters::Blend { weight: 70 }
        );
    }

    #[tokio::test]
    async fn test_literal_parameters_stored_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let mut session = session_with(backend.clone(), chain_with_credential(&dir));

        // bypass the clamping constructor with a direct literal
        session
            .set_parameters(SynthesisParameters::Blend { weight: 255 })
            .unwrap();
        assert_eq!(
            *session.parameters(),
            SynthesisParameters::Blend { weight: 100 }
        );

        // the composed instruction carries the clamped value
        session.upload_lineart(png_bytes(100, 100)).unwrap();
        session.upload_style_reference(png_bytes(64, 64)).unwrap();
        let parts = prompt::compose(
            session.mode(),
            session.parameters(),
            session.lineart_image().unwrap(),
            session.style_image(),
            None,
        );
        let instruction = parts
            .iter()
            .filter_map(|p| match p {
                crate::prompt::Part::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .last()
            .unwrap();
        assert!(instruction.contains("100%"));
        assert!(!instruction.contains("255%"));
    }
}
