//! # ff-av
//!
//! External tool plumbing for the media adapters.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe, pdf2docx and soffice.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Scratch workspaces** ([`Workspace`]) -- a temporary directory that
//!   stages input bytes for a tool and is removed on every exit path.

pub mod command;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
