//! Temp-file custodian.
//!
//! `TempDirGuard` owns a single per-job temp directory. Every intermediate
//! artifact the preparer produces lives under it. `Drop` guarantees the
//! directory and everything in it is removed on every exit path — success,
//! error return, early `?`, or panic unwind.

use std::path::{Path, PathBuf};

pub struct TempDirGuard {
    dir: PathBuf,
}

impl TempDirGuard {
    /// Create a fresh, empty temp directory for `job_id` under the system
    /// temp area.
    pub fn new(job_id: &str) -> std::io::Result<Self> {
        let dir = std::env::temp_dir()
            .join("transcribe-core")
            .join(job_id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.dir.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!(
                path = %self.dir.display(),
                error = %e,
                "custodian: best-effort cleanup failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_removed_on_drop() {
        let path;
        {
            let guard = TempDirGuard::new("custodian-test-drop").unwrap();
            path = guard.path().to_path_buf();
            std::fs::write(guard.join("segment_000.mp3"), b"fake audio").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn directory_is_removed_even_on_early_return() {
        fn do_work(job_id: &str) -> Result<(), String> {
            let guard = TempDirGuard::new(job_id).map_err(|e| e.to_string())?;
            std::fs::write(guard.join("original.mp3"), b"x").map_err(|e| e.to_string())?;
            Err("simulated failure mid-pipeline".to_string())
        }

        let job_id = "custodian-test-early-return";
        let _ = do_work(job_id);

        let path = std::env::temp_dir().join("transcribe-core").join(job_id);
        assert!(!path.exists());
    }

    #[test]
    fn nested_segment_files_are_all_removed() {
        let path;
        {
            let guard = TempDirGuard::new("custodian-test-segments").unwrap();
            path = guard.path().to_path_buf();
            for i in 0..3 {
                std::fs::write(guard.join(format!("segment_{:03}.mp3", i)), b"x").unwrap();
            }
        }
        assert!(!path.exists());
    }
}
