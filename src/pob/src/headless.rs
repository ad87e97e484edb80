//! Child-process adapter for a headless Path of Building.
//!
//! The engine runs as `<launcher> <bridge script>` with the working-data root
//! as its current directory. Requests and responses are single-line JSON
//! objects on stdin/stdout:
//!
//! ```text
//! -> {"cmd":"load_build","path":"/builds/Deadeye.xml"}
//! -> {"cmd":"load_build","xml":"<PathOfBuilding>...</PathOfBuilding>"}
//! <- {"ok":true}
//! -> {"cmd":"item_impact","item":"Rarity: Rare\n..."}
//! <- {"ok":true,"html":"<span>...</span>"}
//! <- {"ok":false,"status":"load","message":"..."}
//! ```
//!
//! Lines on stdout that are not JSON objects are engine logging and are
//! skipped. stderr is inherited so the engine's own logging ends up next to ours.

use crate::config::PobPaths;
use crate::engine::{
    BuildEngine, BuildSource, EngineFactory, EngineFailure, STATUS_PROCESS, STATUS_PROTOCOL,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

#[derive(Debug, Serialize)]
struct Request<'a> {
    cmd: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xml: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<&'a str>,
}

impl<'a> Request<'a> {
    fn load(source: &'a BuildSource) -> Self {
        let (path, xml) = match source {
            BuildSource::Path(path) => (path.to_str(), None),
            BuildSource::Content(xml) => (None, Some(xml.as_str())),
        };
        Request {
            cmd: "load_build",
            path,
            xml,
            item: None,
        }
    }

    fn item_impact(item: &'a str) -> Self {
        Request {
            cmd: "item_impact",
            path: None,
            xml: None,
            item: Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Response {
    fn into_result(self) -> Result<Option<String>, EngineFailure> {
        if self.ok {
            return Ok(self.html);
        }
        Err(EngineFailure::new(
            self.status.unwrap_or_else(|| "error".to_string()),
            self.message.unwrap_or_default(),
        ))
    }
}

pub struct HeadlessEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl HeadlessEngine {
    pub fn spawn(
        launcher: &str,
        script: &Path,
        install: &Path,
        data: &Path,
    ) -> Result<Self, EngineFailure> {
        let mut child = Command::new(launcher)
            .arg(script)
            .current_dir(data)
            .env("POB_INSTALL", install)
            .env("POB_PATH", data)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                EngineFailure::new(
                    STATUS_PROCESS,
                    format!("Failed to start {} {}: {}", launcher, script.display(), e),
                )
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(EngineFailure::new(STATUS_PROCESS, "Engine pipes unavailable"));
        };

        tracing::debug!(pid = child.id(), "Spawned headless PoB");

        Ok(HeadlessEngine {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn request(&mut self, request: &Request<'_>) -> Result<Option<String>, EngineFailure> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| EngineFailure::new(STATUS_PROTOCOL, e.to_string()))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| EngineFailure::new(STATUS_PROCESS, format!("Engine stdin: {}", e)))?;

        // The engine may print its own chatter on stdout; only JSON objects
        // are replies.
        let mut reply = String::new();
        loop {
            reply.clear();
            let read = self.stdout.read_line(&mut reply).map_err(|e| {
                EngineFailure::new(STATUS_PROCESS, format!("Engine stdout: {}", e))
            })?;
            if read == 0 {
                return Err(EngineFailure::new(STATUS_PROCESS, "Engine exited"));
            }
            if reply.trim_start().starts_with('{') {
                break;
            }
            tracing::debug!(target: "pob::engine", "{}", reply.trim_end());
        }

        let response: Response = serde_json::from_str(reply.trim_end()).map_err(|e| {
            EngineFailure::new(STATUS_PROTOCOL, format!("Bad engine reply: {}", e))
        })?;
        response.into_result()
    }
}

impl BuildEngine for HeadlessEngine {
    fn load_build(&mut self, source: &BuildSource) -> Result<(), EngineFailure> {
        if let BuildSource::Path(path) = source {
            if path.to_str().is_none() {
                return Err(EngineFailure::new(
                    "load",
                    format!("Build path is not valid UTF-8: {}", path.display()),
                ));
            }
        }
        self.request(&Request::load(source)).map(|_| ())
    }

    fn item_impact_html(&mut self, item: &str) -> Result<String, EngineFailure> {
        Ok(self
            .request(&Request::item_impact(item))?
            .unwrap_or_default())
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl std::fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessEngine")
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

/// Spawns [`HeadlessEngine`]s from configured paths.
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    launcher: String,
    script: PathBuf,
    install: PathBuf,
}

impl HeadlessFactory {
    pub fn new(paths: &PobPaths) -> Self {
        HeadlessFactory {
            launcher: paths.launcher.clone(),
            script: paths.bridge_script.clone(),
            install: paths.install.clone(),
        }
    }
}

impl EngineFactory for HeadlessFactory {
    fn unavailable_reason(&self) -> Option<String> {
        if !self.install.is_dir() {
            return Some(format!("PoB install not found: {}", self.install.display()));
        }
        if !self.script.is_file() {
            return Some(format!("Bridge script not found: {}", self.script.display()));
        }
        None
    }

    fn create(&self, install: &Path, data: &Path) -> Result<Box<dyn BuildEngine>, EngineFailure> {
        let engine = HeadlessEngine::spawn(&self.launcher, &self.script, install, data)?;
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_request_shapes() {
        let source = BuildSource::Path(PathBuf::from("/builds/a.xml"));
        let json = serde_json::to_string(&Request::load(&source)).unwrap();
        assert_eq!(json, r#"{"cmd":"load_build","path":"/builds/a.xml"}"#);

        let source = BuildSource::Content("<PathOfBuilding/>".into());
        let json = serde_json::to_string(&Request::load(&source)).unwrap();
        assert_eq!(json, r#"{"cmd":"load_build","xml":"<PathOfBuilding/>"}"#);

        let json = serde_json::to_string(&Request::item_impact("Ring\nRare")).unwrap();
        assert_eq!(json, r#"{"cmd":"item_impact","item":"Ring\nRare"}"#);
    }

    #[test]
    fn test_response_into_result() {
        let ok: Response = serde_json::from_str(r#"{"ok":true,"html":"<b>x</b>"}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().as_deref(), Some("<b>x</b>"));

        let failed: Response =
            serde_json::from_str(r#"{"ok":false,"status":"load","message":"bad xml"}"#).unwrap();
        assert_eq!(
            failed.into_result().unwrap_err(),
            EngineFailure::new("load", "bad xml")
        );

        let bare: Response = serde_json::from_str(r#"{"ok":false}"#).unwrap();
        assert_eq!(bare.into_result().unwrap_err().status, "error");
    }

    #[test]
    fn test_unavailable_reason() {
        let dir = tempfile::tempdir().unwrap();

        let missing = PobPaths::from_install(dir.path().join("nope"));
        let reason = HeadlessFactory::new(&missing).unavailable_reason().unwrap();
        assert!(reason.contains("PoB install not found"));

        let no_script = PobPaths::from_install(dir.path());
        let reason = HeadlessFactory::new(&no_script).unavailable_reason().unwrap();
        assert!(reason.contains("Bridge script not found"));

        fs::write(&no_script.bridge_script, "-- bridge").unwrap();
        assert!(HeadlessFactory::new(&no_script).unavailable_reason().is_none());
    }

    #[test]
    fn test_spawn_missing_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let err = HeadlessEngine::spawn(
            "definitely-not-a-real-launcher-binary",
            &dir.path().join("bridge.lua"),
            dir.path(),
            dir.path(),
        )
        .unwrap_err();
        assert_eq!(err.status, STATUS_PROCESS);
    }

    #[cfg(unix)]
    const FAKE_BRIDGE: &str = r#"while IFS= read -r line; do
  case "$line" in
    *item_impact*) echo '{"ok":true,"html":"<b>+12 Life</b>"}' ;;
    *broken*) echo '{"ok":false,"status":"load","message":"bad build"}' ;;
    *) echo '{"ok":true}' ;;
  esac
done
"#;

    #[cfg(unix)]
    fn fake_paths(script: &str) -> (tempfile::TempDir, PobPaths) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = PobPaths::from_install(dir.path());
        paths.launcher = "sh".to_string();
        paths.bridge_script = dir.path().join("bridge.sh");
        fs::write(&paths.bridge_script, script).unwrap();
        (dir, paths)
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_with_fake_bridge() {
        let (_dir, paths) = fake_paths(FAKE_BRIDGE);
        let factory = HeadlessFactory::new(&paths);
        assert!(factory.unavailable_reason().is_none());

        let mut engine = factory.create(&paths.install, &paths.data).unwrap();
        engine
            .load_build(&BuildSource::Path(PathBuf::from("/builds/a.xml")))
            .unwrap();
        assert_eq!(engine.item_impact_html("Ring").unwrap(), "<b>+12 Life</b>");

        let err = engine
            .load_build(&BuildSource::Path(PathBuf::from("/builds/broken.xml")))
            .unwrap_err();
        assert_eq!(err, EngineFailure::new("load", "bad build"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_chatter_does_not_shift_replies() {
        let script = r#"echo 'Loading build...'
n=0
while IFS= read -r line; do
  n=$((n + 1))
  echo "  Calculating item $n"
  echo "{\"ok\":true,\"html\":\"reply-$n\"}"
done
"#;
        let (_dir, paths) = fake_paths(script);
        let mut engine = HeadlessFactory::new(&paths)
            .create(&paths.install, &paths.data)
            .unwrap();

        assert_eq!(engine.item_impact_html("Item A").unwrap(), "reply-1");
        assert_eq!(engine.item_impact_html("Item B").unwrap(), "reply-2");
        assert_eq!(engine.item_impact_html("Item C").unwrap(), "reply-3");
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_reply_is_fatal() {
        let (_dir, paths) = fake_paths("read -r line\necho '{\"ok\": tru'\ncat >/dev/null\n");
        let mut engine = HeadlessFactory::new(&paths)
            .create(&paths.install, &paths.data)
            .unwrap();

        let err = engine.item_impact_html("Ring").unwrap_err();
        assert_eq!(err.status, STATUS_PROTOCOL);
        assert!(err.breaks_engine());
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_bridge_is_process_failure() {
        let (_dir, paths) = fake_paths("exit 0\n");
        let mut engine = HeadlessFactory::new(&paths)
            .create(&paths.install, &paths.data)
            .unwrap();

        let err = engine.item_impact_html("Ring").unwrap_err();
        assert_eq!(err.status, STATUS_PROCESS);
        assert!(err.breaks_engine());
    }
}
