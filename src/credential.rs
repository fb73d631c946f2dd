//! Credential storage and resolution.
//!
//! A credential is an opaque string resolved by strict priority: the
//! user-saved value in the local store, then a host-environment variable.
//! A host-provided interactive picker is the acquisition mechanism of last
//! resort; after its `request_credential()` completes, the chain simply
//! re-resolves.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Environment variable consulted when no stored credential exists.
pub const DEFAULT_ENV_VAR: &str = "GOOGLE_API_KEY";

/// File-backed persistence for the single credential string.
///
/// Read at session start, written on explicit user save, removed on
/// explicit user clear. Nothing else is ever persisted.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Places the store under the platform config directory.
    pub fn discover() -> Option<Self> {
        let dir = dirs::config_dir()?;
        Some(Self::new(dir.join("archilogic").join("credential")))
    }

    /// Reads the stored credential, if any.
    pub fn load(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Saves the credential, creating parent directories as needed.
    pub fn save(&self, credential: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, credential)?;
        Ok(())
    }

    /// Removes the stored credential. A missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A host-provided interactive credential picker.
///
/// The single pluggable entry point for host-integration flows; once
/// `request_credential()` resolves, the credential is expected to be
/// reachable through the store or the environment.
#[async_trait]
pub trait CredentialPicker: Send + Sync {
    /// Returns true if the host believes a credential is available.
    fn has_credential(&self) -> bool;

    /// Runs the host's interactive acquisition flow to completion.
    async fn request_credential(&self) -> Result<()>;
}

/// Priority-ordered credential resolution.
pub struct CredentialChain {
    store: Option<CredentialStore>,
    env_var: String,
    picker: Option<Box<dyn CredentialPicker>>,
}

impl CredentialChain {
    /// Creates a chain with the discovered store, the default environment
    /// variable, and no picker.
    pub fn new() -> Self {
        Self {
            store: CredentialStore::discover(),
            env_var: DEFAULT_ENV_VAR.to_string(),
            picker: None,
        }
    }

    /// Replaces the backing store.
    pub fn with_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Creates a chain with no backing store (environment/picker only).
    pub fn without_store(mut self) -> Self {
        self.store = None;
        self
    }

    /// Changes the environment variable consulted as the second source.
    pub fn with_env_var(mut self, var: impl Into<String>) -> Self {
        self.env_var = var.into();
        self
    }

    /// Attaches a host picker.
    pub fn with_picker(mut self, picker: Box<dyn CredentialPicker>) -> Self {
        self.picker = Some(picker);
        self
    }

    /// Resolves the credential by priority: store, then environment.
    /// Returns `None` when neither source yields a non-empty value.
    pub fn resolve(&self) -> Option<String> {
        if let Some(stored) = self.store.as_ref().and_then(CredentialStore::load) {
            return Some(stored);
        }
        std::env::var(&self.env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns true if a picker is attached and reports availability.
    pub fn picker_available(&self) -> bool {
        self.picker.as_ref().is_some_and(|p| p.has_credential())
    }

    /// Resolves, falling back to the interactive picker flow on a miss.
    pub async fn acquire(&self) -> Result<Option<String>> {
        if let Some(credential) = self.resolve() {
            return Ok(Some(credential));
        }
        if let Some(picker) = &self.picker {
            picker.request_credential().await?;
            return Ok(self.resolve());
        }
        Ok(None)
    }

    /// Saves a user-entered credential into the store, if one is attached.
    pub fn save(&self, credential: &str) -> Result<()> {
        match &self.store {
            Some(store) => store.save(credential),
            None => Ok(()),
        }
    }

    /// Clears the stored credential, if a store is attached.
    pub fn clear(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.clear(),
            None => Ok(()),
        }
    }
}

impl Default for CredentialChain {
    fn default() -> Self {
        Self::new()
    }
}
