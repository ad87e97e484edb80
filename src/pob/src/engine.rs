//! Seam between the gateway and the external build-analysis engine.

use std::fmt;
use std::path::{Path, PathBuf};

/// The engine process could not be started or stopped answering.
pub const STATUS_PROCESS: &str = "process";
/// The engine answered with something that is not a reply.
pub const STATUS_PROTOCOL: &str = "protocol";

/// What a load request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    /// Build XML decoded from an encoded payload.
    Content(String),
    /// Path to a build file on disk.
    Path(PathBuf),
}

/// Failure reported by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub status: String,
    pub message: String,
}

impl EngineFailure {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        EngineFailure {
            status: status.into(),
            message: message.into(),
        }
    }

    /// The engine can no longer be trusted to pair replies with requests and
    /// must be replaced.
    pub fn breaks_engine(&self) -> bool {
        self.status == STATUS_PROCESS || self.status == STATUS_PROTOCOL
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for EngineFailure {}

/// One loaded build's analysis state.
///
/// Implementations are driven by [`crate::EngineGateway`], which guarantees
/// that no two calls overlap.
pub trait BuildEngine: Send {
    /// Replace the currently loaded build.
    fn load_build(&mut self, source: &BuildSource) -> Result<(), EngineFailure>;

    /// HTML report of the stat changes from equipping `item` on the current
    /// build. May be empty when the engine has nothing to say.
    fn item_impact_html(&mut self, item: &str) -> Result<String, EngineFailure>;
}

/// Builds the engine on first demand.
pub trait EngineFactory: Send + Sync {
    /// Why the engine cannot be created at all, if it cannot.
    ///
    /// Checked before every construction attempt and reported by status.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    fn create(&self, install: &Path, data: &Path) -> Result<Box<dyn BuildEngine>, EngineFailure>;
}

impl<F> EngineFactory for F
where
    F: Fn(&Path, &Path) -> Result<Box<dyn BuildEngine>, EngineFailure> + Send + Sync,
{
    fn create(&self, install: &Path, data: &Path) -> Result<Box<dyn BuildEngine>, EngineFailure> {
        self(install, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl BuildEngine for Echo {
        fn load_build(&mut self, _source: &BuildSource) -> Result<(), EngineFailure> {
            Ok(())
        }

        fn item_impact_html(&mut self, item: &str) -> Result<String, EngineFailure> {
            Ok(format!("<p>{}</p>", item))
        }
    }

    #[test]
    fn test_closure_factory() {
        let factory = |install: &Path, _data: &Path| -> Result<Box<dyn BuildEngine>, EngineFailure> {
            if install.as_os_str().is_empty() {
                return Err(EngineFailure::new("init", "no install root"));
            }
            Ok(Box::new(Echo))
        };

        assert!(factory.unavailable_reason().is_none());
        let mut engine = factory
            .create(Path::new("/opt/pob"), Path::new("/opt/pob"))
            .unwrap();
        assert_eq!(engine.item_impact_html("Ring").unwrap(), "<p>Ring</p>");

        let err = factory.create(Path::new(""), Path::new("")).err().unwrap();
        assert_eq!(err.to_string(), "init: no install root");
    }
}
