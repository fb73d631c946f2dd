#![warn(missing_docs)]
//! Archi-Logic core - CAD lineart to rendered architectural images.
//!
//! This crate is the portable engine behind the Archi-Logic front end: it
//! takes a CAD line drawing and an optional style-reference image, builds a
//! deterministic prompt, and dispatches it to a generative-image backend,
//! preserving the drawing's geometry while transferring the reference's
//! material and color character.
//!
//! # Quick Start
//!
//! ```no_run
//! use archilogic::{CredentialChain, GeminiBackend, ImageSize, Session};
//!
//! #[tokio::main]
//! async fn main() -> archilogic::Result<()> {
//!     let backend = GeminiBackend::builder().build();
//!     let mut session = Session::new(Box::new(backend), CredentialChain::new());
//!
//!     session.upload_lineart(std::fs::read("plan.png")?)?;
//!     session.upload_style_reference(std::fs::read("reference.jpg")?)?;
//!     session.analyze_style().await;
//!
//!     session.synthesize(ImageSize::K2, None).await?;
//!     if let Some(result) = session.result() {
//!         result.save("rendered.png")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! Data flows one way per request: upload, flatten lineart onto white,
//! classify the aspect ratio, compose the prompt parts, dispatch, unwrap
//! the returned image. The [`Session`] serializes requests; a trigger
//! while one is in flight is ignored, never queued.

pub mod backend;
pub mod credential;
mod error;
pub mod lineart;
pub mod prompt;
mod ratio;
pub mod session;
mod types;

pub use backend::{GeminiBackend, GeminiBackendBuilder, GeminiModel, SynthesisBackend};
pub use backend::{SynthesisRequest, SynthesizedImage};
pub use credential::{CredentialChain, CredentialPicker, CredentialStore};
pub use error::{ArchiError, FailureClass, Result};
pub use prompt::Part;
pub use ratio::AspectRatio;
pub use session::{Outcome, Session, Status};
pub use types::{
    ImageFormat, ImageRole, ImageSize, RenderMode, RenderResult, SynthesisParameters,
    UploadedImage,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::{GeminiBackend, SynthesisBackend};
    pub use crate::credential::CredentialChain;
    pub use crate::error::{ArchiError, FailureClass, Result};
    pub use crate::session::{Outcome, Session, Status};
    pub use crate::types::{ImageSize, RenderMode, SynthesisParameters};
}
