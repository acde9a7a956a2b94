//! Scratch workspaces for external tool invocations.
//!
//! External engines read and write files, while jobs hold their content in
//! memory. A [`Workspace`] stages the job's bytes as an input file inside a
//! private temporary directory, hands out output paths next to it, and reads
//! the produced file back. The directory is removed when the workspace is
//! dropped, on success and on failure alike.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding one tool run's input and outputs.
///
/// # Example
///
/// ```no_run
/// use ff_av::Workspace;
///
/// # async fn example(bytes: Vec<u8>) -> ff_core::Result<()> {
/// let ws = Workspace::stage(&bytes, "mp4").await?;
/// let out = ws.output("webm");
/// // ... run ffmpeg with ws.input() -> out ...
/// let converted = ws.read_output(&out).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
}

impl Workspace {
    /// Create a workspace and write `bytes` to `input.<ext>` inside it.
    pub async fn stage(bytes: &[u8], ext: &str) -> ff_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("fileforge-")
            .tempdir()
            .map_err(|e| ff_core::Error::Internal(format!("failed to create temp dir: {e}")))?;

        let input_path = temp_dir.path().join(file_name("input", ext));
        tokio::fs::write(&input_path, bytes).await?;

        Ok(Self {
            temp_dir,
            input_path,
        })
    }

    /// The staged input file.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Path for an output file with the given extension.
    pub fn output(&self, ext: &str) -> PathBuf {
        self.temp_dir.path().join(file_name("output", ext))
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named temporary file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Read a produced file back into memory.
    ///
    /// # Errors
    ///
    /// Returns [`ff_core::Error::Tool`] if the file is missing or empty,
    /// which is how engines that exit 0 without writing anything fail.
    pub async fn read_output(&self, path: &Path) -> ff_core::Result<Vec<u8>> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ff_core::Error::tool(
                "workspace",
                format!("output file {} not produced: {e}", display_name(path)),
            )
        })?;

        if bytes.is_empty() {
            return Err(ff_core::Error::tool(
                "workspace",
                format!("output file {} is empty", display_name(path)),
            ));
        }

        Ok(bytes)
    }
}

fn file_name(stem: &str, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_writes_input() {
        let ws = Workspace::stage(b"hello", "txt").await.unwrap();
        assert!(ws.input().starts_with(ws.temp_dir()));
        assert_eq!(ws.input().file_name().unwrap(), "input.txt");
        assert_eq!(std::fs::read(ws.input()).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn output_paths_inside_workspace() {
        let ws = Workspace::stage(b"x", ".mp4").await.unwrap();
        let out = ws.output("webm");
        assert!(out.starts_with(ws.temp_dir()));
        assert_eq!(out.file_name().unwrap(), "output.webm");
        assert_eq!(ws.input().file_name().unwrap(), "input.mp4");
    }

    #[tokio::test]
    async fn temp_file_inside_workspace() {
        let ws = Workspace::stage(b"x", "pdf").await.unwrap();
        let tf = ws.temp_file("palette.png");
        assert!(tf.starts_with(ws.temp_dir()));
    }

    #[tokio::test]
    async fn read_output_roundtrip() {
        let ws = Workspace::stage(b"in", "bin").await.unwrap();
        let out = ws.output("bin");
        tokio::fs::write(&out, b"processed").await.unwrap();
        assert_eq!(ws.read_output(&out).await.unwrap(), b"processed");
    }

    #[tokio::test]
    async fn read_output_missing_or_empty_fails() {
        let ws = Workspace::stage(b"in", "bin").await.unwrap();
        let missing = ws.read_output(&ws.output("pdf")).await.unwrap_err();
        assert!(missing.to_string().contains("not produced"));

        let empty = ws.output("txt");
        tokio::fs::write(&empty, b"").await.unwrap();
        let err = ws.read_output(&empty).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn directory_removed_on_drop() {
        let ws = Workspace::stage(b"in", "bin").await.unwrap();
        let dir = ws.temp_dir().to_path_buf();
        assert!(dir.exists());
        drop(ws);
        assert!(!dir.exists());
    }
}
