//! Document adapter: PDF, Word, plain text, RTF and office formats.
//!
//! Text, DOCX and PDF conversions between each other run in-process
//! (`lopdf`, `zip`, `quick-xml`). PDF to DOCX goes through `pdf2docx`, and
//! legacy or office sources go through a headless LibreOffice (`soffice`).
//! Both engines are resolved when the adapter is built; a conversion that
//! needs a missing engine fails at once with
//! [`ff_core::Error::AdapterUnavailable`].

mod docx;
mod pdf;

use std::sync::Arc;

use async_trait::async_trait;
use ff_av::{ToolCommand, ToolConfig, ToolRegistry, Workspace};

use super::{
    unsupported_format, unsupported_operation, MediaAdapter, MediaInput, MediaMetadata, Operation,
    ProcessingResult,
};

/// Source families the adapter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Pdf,
    Docx,
    Text,
    /// `.doc` and `.rtf`, readable only through soffice.
    Legacy,
    /// Spreadsheets and presentations, exportable to PDF through soffice.
    Office,
}

fn kind_of(mime: &str) -> Option<DocKind> {
    match mime {
        "application/pdf" => Some(DocKind::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(DocKind::Docx)
        }
        "text/plain" => Some(DocKind::Text),
        "application/msword" | "application/rtf" => Some(DocKind::Legacy),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/vnd.ms-excel"
        | "application/vnd.ms-powerpoint" => Some(DocKind::Office),
        _ => None,
    }
}

fn conversions_for(kind: DocKind) -> &'static [&'static str] {
    match kind {
        DocKind::Pdf => &["txt", "docx"],
        DocKind::Docx => &["pdf", "txt"],
        DocKind::Text => &["pdf", "docx"],
        DocKind::Legacy => &["pdf", "docx", "txt"],
        DocKind::Office => &["pdf"],
    }
}

pub struct DocumentAdapter {
    pdf2docx: Option<ToolConfig>,
    soffice: Option<ToolConfig>,
}

impl DocumentAdapter {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        let pdf2docx = tools.get("pdf2docx").cloned();
        let soffice = tools.get("soffice").cloned();
        if pdf2docx.is_none() {
            tracing::debug!("pdf2docx not found; PDF to DOCX conversion disabled");
        }
        if soffice.is_none() {
            tracing::debug!("soffice not found; office format conversion disabled");
        }
        Self { pdf2docx, soffice }
    }

    fn engine<'a>(tool: &'a Option<ToolConfig>, name: &str) -> ff_core::Result<&'a ToolConfig> {
        tool.as_ref().ok_or_else(|| {
            ff_core::Error::unavailable(name, format!("{name} is not installed or not in PATH"))
        })
    }

    async fn pdf_to_docx(&self, input: &MediaInput) -> ff_core::Result<Vec<u8>> {
        let tool = Self::engine(&self.pdf2docx, "pdf2docx")?;
        let ws = Workspace::stage(&input.bytes, "pdf").await?;
        let out = ws.output("docx");

        ToolCommand::for_tool(tool)
            .arg("convert")
            .arg(ws.input())
            .arg(&out)
            .run()
            .await?;

        ws.read_output(&out).await
    }

    async fn office_convert(&self, input: &MediaInput, format: &str) -> ff_core::Result<Vec<u8>> {
        let tool = Self::engine(&self.soffice, "soffice")?;
        let ws = Workspace::stage(&input.bytes, input.extension()).await?;
        let out_dir = ws.temp_file("out");
        let profile = format!(
            "-env:UserInstallation=file://{}",
            ws.temp_file("profile").display()
        );
        let filter = if format == "txt" { "txt:Text" } else { format };

        ToolCommand::for_tool(tool)
            .arg("--headless")
            .arg(&profile)
            .args(["--convert-to", filter, "--outdir"])
            .arg(&out_dir)
            .arg(ws.input())
            .run()
            .await?;

        let stem = ws
            .input()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".into());
        ws.read_output(&out_dir.join(format!("{stem}.{format}"))).await
    }
}

/// Run an in-process conversion on the blocking pool.
async fn native<F>(operation: &'static str, f: F) -> ff_core::Result<Vec<u8>>
where
    F: FnOnce() -> Result<Vec<u8>, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ff_core::Error::transform(operation, format!("worker panicked: {e}")))?
        .map_err(|e| ff_core::Error::transform(operation, e))
}

#[async_trait]
impl MediaAdapter for DocumentAdapter {
    fn name(&self) -> &'static str {
        "document"
    }

    fn supports(&self, mime: &str) -> bool {
        kind_of(mime).is_some()
    }

    fn conversions(&self, mime: &str) -> Vec<&'static str> {
        kind_of(mime)
            .map(|k| conversions_for(k).to_vec())
            .unwrap_or_default()
    }

    fn operations(&self, mime: &str) -> Vec<&'static str> {
        if kind_of(mime) == Some(DocKind::Pdf) {
            vec!["compress"]
        } else {
            Vec::new()
        }
    }

    async fn process(&self, input: &MediaInput) -> ff_core::Result<ProcessingResult> {
        let pages = if kind_of(input.mime_type()) == Some(DocKind::Pdf) {
            pdf::page_count(&input.bytes)
        } else {
            None
        };

        Ok(ProcessingResult {
            mime_type: input.mime_type().to_string(),
            size: input.bytes.len() as u64,
            metadata: MediaMetadata {
                format: Some(input.extension().to_string()),
                pages,
                available_conversions: Some(
                    self.conversions(input.mime_type())
                        .into_iter()
                        .map(String::from)
                        .collect(),
                ),
                ..Default::default()
            },
        })
    }

    async fn manipulate(&self, input: &MediaInput, op: &Operation) -> ff_core::Result<Vec<u8>> {
        let mime = input.mime_type();
        let Some(kind) = kind_of(mime) else {
            return Err(unsupported_operation(self.name(), op, mime));
        };

        match op {
            Operation::Convert { format, .. } => {
                let format = format.to_ascii_lowercase();
                if !conversions_for(kind).contains(&format.as_str()) {
                    return Err(unsupported_format(&format, mime));
                }
                let bytes = input.bytes.clone();

                match (kind, format.as_str()) {
                    (DocKind::Text, "pdf") => {
                        native("convert", move || {
                            pdf::text_to_pdf(&String::from_utf8_lossy(&bytes))
                        })
                        .await
                    }
                    (DocKind::Text, "docx") => {
                        native("convert", move || {
                            docx::text_to_docx(&String::from_utf8_lossy(&bytes))
                        })
                        .await
                    }
                    (DocKind::Docx, "txt") => {
                        native("convert", move || {
                            docx::docx_to_text(&bytes).map(String::into_bytes)
                        })
                        .await
                    }
                    (DocKind::Docx, "pdf") => {
                        native("convert", move || {
                            pdf::text_to_pdf(&docx::docx_to_text(&bytes)?)
                        })
                        .await
                    }
                    (DocKind::Pdf, "txt") => {
                        native("convert", move || {
                            pdf::pdf_to_text(&bytes).map(String::into_bytes)
                        })
                        .await
                    }
                    (DocKind::Pdf, "docx") => self.pdf_to_docx(input).await,
                    (DocKind::Legacy | DocKind::Office, target) => {
                        self.office_convert(input, target).await
                    }
                    _ => Err(unsupported_format(&format, mime)),
                }
            }
            Operation::Compress { .. } if kind == DocKind::Pdf => {
                let bytes = input.bytes.clone();
                native("compress", move || pdf::compress(&bytes)).await
            }
            _ => Err(unsupported_operation(self.name(), op, mime)),
        }
    }
}
