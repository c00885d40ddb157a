use std::path::{Path, PathBuf};
use std::sync::Arc;

use domain::common::error::DomainError;
use ports::secondary::PortFuture;
use ports::secondary::program_loader_port::{LoadOutcome, ProgramLoaderPort};
use tracing::{info, warn};

use crate::net::command::CommandRunner;

/// Where the toolchain is looked up, in order.
pub const BPFTOOL_SEARCH_PATHS: &[&str] = &["/usr/local/bin/bpftool", "/usr/sbin/bpftool"];

/// Marker in `bpftool version` output requiring `--legacy` on load.
const LEGACY_MARKER: &str = "libbpf_strict";

/// Loads the kernel program bundle with `bpftool prog loadall`, pinning
/// programs and maps under one bpffs directory.
pub struct BpftoolLoader {
    runner: Arc<dyn CommandRunner>,
    prog_path: PathBuf,
    pin_dir: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl BpftoolLoader {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        prog_path: impl Into<PathBuf>,
        pin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            prog_path: prog_path.into(),
            pin_dir: pin_dir.into(),
            search_paths: BPFTOOL_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    fn locate(&self) -> Result<&Path, DomainError> {
        self.search_paths
            .iter()
            .find(|p| p.is_file())
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                DomainError::ToolchainMissing(format!(
                    "bpftool not found in {:?}",
                    self.search_paths
                ))
            })
    }

    /// A failed version probe loads without `--legacy`; only a vanished
    /// toolchain is an error.
    async fn needs_legacy(&self, bpftool: &str) -> Result<bool, DomainError> {
        match self.runner.run(bpftool, &["version".to_string()]).await {
            Ok(version) => Ok(version.stdout.contains(LEGACY_MARKER)),
            Err(DomainError::ToolchainMissing(m)) => Err(DomainError::ToolchainMissing(m)),
            Err(e) => {
                warn!(error = %e, "bpftool version probe failed, loading without --legacy");
                Ok(false)
            }
        }
    }
}

impl ProgramLoaderPort for BpftoolLoader {
    fn load(&self) -> PortFuture<'_, LoadOutcome> {
        Box::pin(async move {
            if self.pin_dir.exists() {
                info!(pin_dir = %self.pin_dir.display(), "programs already pinned, skipping load");
                return Ok(LoadOutcome::AlreadyPinned);
            }

            let bpftool = self.locate()?.to_string_lossy().into_owned();

            let pin_dir = self.pin_dir.to_string_lossy().into_owned();
            let mut args = vec![
                "prog".to_string(),
                "loadall".to_string(),
                self.prog_path.to_string_lossy().into_owned(),
                pin_dir.clone(),
                "pinmaps".to_string(),
                pin_dir,
            ];
            if self.needs_legacy(&bpftool).await? {
                args.push("--legacy".to_string());
            }

            let output = match self.runner.run(&bpftool, &args).await {
                Ok(output) => output,
                Err(DomainError::ToolchainMissing(m)) => {
                    return Err(DomainError::ToolchainMissing(m));
                }
                Err(e) => return Ok(LoadOutcome::Failed(e.to_string())),
            };
            if output.success {
                info!(prog = %self.prog_path.display(), "program bundle loaded and pinned");
                Ok(LoadOutcome::Loaded)
            } else {
                let reason = output.stderr.trim().to_string();
                warn!(prog = %self.prog_path.display(), reason, "program bundle load failed");
                Ok(LoadOutcome::Failed(reason))
            }
        })
    }

    fn unload(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            match tokio::fs::remove_dir_all(&self.pin_dir).await {
                Ok(()) => {
                    info!(pin_dir = %self.pin_dir.display(), "pinned programs removed");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(DomainError::EngineError(format!(
                    "remove {}: {e}",
                    self.pin_dir.display()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::command::fake::RecordingRunner;

    struct Fixture {
        _dir: tempfile::TempDir,
        bpftool: PathBuf,
        pin_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let bpftool = dir.path().join("bpftool");
        std::fs::write(&bpftool, "").unwrap();
        let pin_dir = dir.path().join("bpf/fsm");
        Fixture {
            bpftool,
            pin_dir,
            _dir: dir,
        }
    }

    fn loader(runner: Arc<RecordingRunner>, fx: &Fixture) -> BpftoolLoader {
        BpftoolLoader::new(runner, "/app/xnet.kern.o", &fx.pin_dir)
            .with_search_paths(vec![PathBuf::from("/nonexistent/bpftool"), fx.bpftool.clone()])
    }

    #[tokio::test]
    async fn missing_toolchain_is_error() {
        let fx = fixture();
        let l = loader(Arc::new(RecordingRunner::default()), &fx)
            .with_search_paths(vec![PathBuf::from("/nonexistent/bpftool")]);
        assert!(matches!(l.load().await, Err(DomainError::ToolchainMissing(_))));
    }

    #[tokio::test]
    async fn existing_pin_dir_skips_load() {
        let fx = fixture();
        std::fs::create_dir_all(&fx.pin_dir).unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let outcome = loader(runner.clone(), &fx).load().await.unwrap();
        assert_eq!(outcome, LoadOutcome::AlreadyPinned);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_pin_dir_needs_no_toolchain() {
        let fx = fixture();
        std::fs::create_dir_all(&fx.pin_dir).unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let l = loader(runner.clone(), &fx)
            .with_search_paths(vec![PathBuf::from("/nonexistent/bpftool")]);
        assert_eq!(l.load().await.unwrap(), LoadOutcome::AlreadyPinned);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_version_probe_still_loads() {
        let fx = fixture();
        let runner = Arc::new(RecordingRunner::default());
        runner.error_on(" version", "bpftool timed out after 4s");
        let outcome = loader(runner.clone(), &fx).load().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].contains("prog loadall"));
        assert!(!calls[1].contains("--legacy"));
    }

    #[tokio::test]
    async fn legacy_marker_adds_flag() {
        let fx = fixture();
        let runner = Arc::new(RecordingRunner::default());
        runner.stdout_on(" version", "bpftool v7.0.0\nfeatures: libbpf_strict, skeletons\n");
        let outcome = loader(runner.clone(), &fx).load().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].contains("prog loadall /app/xnet.kern.o"));
        assert!(calls[1].contains("pinmaps"));
        assert!(calls[1].ends_with("--legacy"));
    }

    #[tokio::test]
    async fn failed_load_is_reported_not_raised() {
        let fx = fixture();
        let runner = Arc::new(RecordingRunner::default());
        runner.fail_on("loadall", "libbpf: failed to load object");
        let outcome = loader(runner.clone(), &fx).load().await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Failed("libbpf: failed to load object".to_string())
        );
        assert!(!runner.calls()[1].contains("--legacy"));
    }

    #[tokio::test]
    async fn unload_removes_pin_dir_and_tolerates_absence() {
        let fx = fixture();
        std::fs::create_dir_all(fx.pin_dir.join("nested")).unwrap();
        let l = loader(Arc::new(RecordingRunner::default()), &fx);
        l.unload().await.unwrap();
        assert!(!fx.pin_dir.exists());
        l.unload().await.unwrap();
    }
}
