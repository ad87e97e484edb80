//! Serialized access to the single build engine.
//!
//! The gateway owns at most one engine, created on first demand. Every
//! operation, including that first construction, holds one mutex for its whole
//! duration, so the engine never sees overlapping calls.
//!
//! An engine that panics, or whose process breaks, is dropped; the next
//! operation builds a fresh one.

use crate::config::PobPaths;
use crate::engine::{BuildEngine, BuildSource, EngineFactory, EngineFailure};
use crate::error::{Error, Result};
use base64::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// An engine has been constructed.
    pub running: bool,
    /// Why the engine cannot be constructed, if it cannot.
    pub import_error: Option<String>,
}

pub struct EngineGateway {
    factory: Box<dyn EngineFactory>,
    install: PathBuf,
    data: PathBuf,
    default_build: Option<PathBuf>,
    engine: Mutex<Option<Box<dyn BuildEngine>>>,
    /// Mirrors `engine.is_some()` so status never waits on a slow call.
    running: AtomicBool,
}

impl EngineGateway {
    /// Nothing is constructed until the first operation needs the engine.
    pub fn new(paths: &PobPaths, factory: impl EngineFactory + 'static) -> Self {
        EngineGateway {
            factory: Box::new(factory),
            install: paths.install.clone(),
            data: paths.data.clone(),
            default_build: paths.default_build.clone(),
            engine: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            running: self.running.load(Ordering::Acquire),
            import_error: self.factory.unavailable_reason(),
        }
    }

    /// Construct the engine if it does not exist yet.
    ///
    /// A failed construction leaves nothing behind; the next call retries.
    pub fn ensure(&self) -> Result<()> {
        let mut guard = self.lock();
        self.ensure_locked(&mut guard)?;
        Ok(())
    }

    /// Load a build from a path or an encoded payload.
    ///
    /// An empty source loads the configured default build.
    pub fn load_build(&self, source: &str) -> Result<()> {
        let source = source.trim();
        let source = if source.is_empty() {
            let default = self.default_build.as_ref().ok_or_else(|| {
                Error::Configuration("No build given and no default build configured".into())
            })?;
            BuildSource::Path(default.clone())
        } else {
            decode_build_source(source)
        };

        let mut guard = self.lock();
        let engine = self.ensure_locked(&mut guard)?;

        match &source {
            BuildSource::Path(path) => tracing::info!(path = %path.display(), "Loading build"),
            BuildSource::Content(xml) => {
                tracing::info!(bytes = xml.len(), "Loading build from payload")
            }
        }

        let result = engine.load_build(&source);
        self.settle(&mut guard, result)
    }

    /// Evaluate equipping `item` against the loaded build.
    ///
    /// Invalid item text is rejected before the engine is touched. An empty
    /// report is [`Error::EmptyResult`].
    pub fn evaluate_item_impact(&self, item: Option<&str>) -> Result<String> {
        let item = validate_item_text(item)?;

        let mut guard = self.lock();
        let engine = self.ensure_locked(&mut guard)?;

        let result = engine.item_impact_html(item);
        let html = self.settle(&mut guard, result)?;
        if html.is_empty() {
            return Err(Error::EmptyResult(
                "PoB returned no output for this item".into(),
            ));
        }
        Ok(html)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn BuildEngine>>> {
        self.engine.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("PoB engine panicked during a previous call, discarding it");
            let mut guard = poisoned.into_inner();
            self.discard(&mut guard);
            self.engine.clear_poison();
            guard
        })
    }

    fn discard(&self, slot: &mut Option<Box<dyn BuildEngine>>) {
        *slot = None;
        self.running.store(false, Ordering::Release);
    }

    /// Map an engine outcome, dropping the engine if it can no longer be used.
    fn settle<T>(
        &self,
        slot: &mut Option<Box<dyn BuildEngine>>,
        result: std::result::Result<T, EngineFailure>,
    ) -> Result<T> {
        result.map_err(|failure| {
            if failure.breaks_engine() {
                tracing::warn!(status = %failure.status, "Discarding PoB engine");
                self.discard(slot);
            }
            engine_error(failure)
        })
    }

    fn ensure_locked<'g>(
        &self,
        slot: &'g mut Option<Box<dyn BuildEngine>>,
    ) -> Result<&'g mut Box<dyn BuildEngine>> {
        if let Some(reason) = self.factory.unavailable_reason() {
            return Err(Error::Configuration(format!(
                "PoB engine unavailable: {}",
                reason
            )));
        }

        let engine = match slot.take() {
            Some(engine) => engine,
            None => {
                tracing::info!(
                    install = %self.install.display(),
                    data = %self.data.display(),
                    "Starting PoB engine"
                );
                let engine = self
                    .factory
                    .create(&self.install, &self.data)
                    .map_err(engine_error)?;
                self.running.store(true, Ordering::Release);
                engine
            }
        };
        Ok(slot.insert(engine))
    }
}

fn engine_error(failure: EngineFailure) -> Error {
    tracing::warn!(status = %failure.status, "PoB engine failure: {}", failure.message);
    Error::Engine {
        status: failure.status,
        message: failure.message,
    }
}

/// Interpret a load source: base64 that decodes to NUL-free UTF-8 is build
/// content, anything else is a path.
pub fn decode_build_source(source: &str) -> BuildSource {
    BASE64_STANDARD
        .decode(source)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|text| !text.contains('\0'))
        .map(BuildSource::Content)
        .unwrap_or_else(|| BuildSource::Path(PathBuf::from(source)))
}

/// Reject missing, blank and `null` item text.
pub fn validate_item_text(item: Option<&str>) -> Result<&str> {
    match item {
        Some(text) if !text.trim().is_empty() && !text.trim().eq_ignore_ascii_case("null") => {
            Ok(text)
        }
        _ => Err(Error::InvalidInput("Empty or invalid item text".into())),
    }
}
