//! Audio and video adapter driving `ffprobe` and `ffmpeg`.
//!
//! The adapter claims every `video/*` and `audio/*` type whether or not the
//! tools are installed. Without ffprobe, `process` degrades to an opaque
//! result; without ffmpeg, every `manipulate` call fails with
//! [`ff_core::Error::AdapterUnavailable`].

use std::sync::Arc;

use async_trait::async_trait;
use ff_av::{ToolCommand, ToolRegistry, Workspace};
use ff_core::config::ConversionConfig;
use serde_json::Value;

use super::{
    unsupported_format, unsupported_operation, MediaAdapter, MediaInput, MediaMetadata, Operation,
    ProcessingResult,
};

const VIDEO_CONVERSIONS: &[&str] = &["mp4", "webm", "gif", "mp3"];
const AUDIO_CONVERSIONS: &[&str] = &["mp3", "wav", "ogg"];

const VIDEO_OPERATIONS: &[&str] = &["trim", "extract-audio", "compress"];
const AUDIO_OPERATIONS: &[&str] = &["trim", "compress"];

pub struct AvAdapter {
    tools: Arc<ToolRegistry>,
    video_crf: u32,
    audio_bitrate: String,
}

impl AvAdapter {
    pub fn new(tools: Arc<ToolRegistry>, conversion: &ConversionConfig) -> Self {
        Self {
            tools,
            video_crf: conversion.video_crf,
            audio_bitrate: conversion.audio_bitrate.clone(),
        }
    }

    async fn probe(&self, input: &MediaInput) -> ff_core::Result<MediaMetadata> {
        let ffprobe = self.tools.require("ffprobe")?;
        let ws = Workspace::stage(&input.bytes, input.extension()).await?;

        let output = ToolCommand::for_tool(ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(ws.input())
            .run()
            .await?;

        let json: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| ff_core::Error::tool("ffprobe", format!("invalid JSON output: {e}")))?;
        Ok(parse_probe(&json))
    }

    /// ffmpeg arguments that encode into `format`, placed after the input.
    fn encode_args(&self, format: &str) -> Vec<String> {
        let crf = self.video_crf.to_string();
        let bitrate = self.audio_bitrate.clone();
        let args: Vec<&str> = match format {
            "mp4" => vec![
                "-c:v", "libx264", "-preset", "veryfast", "-crf", &crf, "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-b:a", &bitrate, "-movflags", "+faststart",
            ],
            "webm" => vec![
                "-c:v", "libvpx-vp9", "-crf", &crf, "-b:v", "0", "-c:a", "libopus", "-b:a",
                &bitrate,
            ],
            "gif" => vec!["-vf", "fps=10,scale=320:-1:flags=lanczos", "-an", "-loop", "0"],
            "mp3" => vec!["-vn", "-c:a", "libmp3lame", "-b:a", &bitrate],
            "wav" => vec!["-vn", "-c:a", "pcm_s16le"],
            "ogg" => vec!["-vn", "-c:a", "libvorbis", "-b:a", &bitrate],
            _ => vec![],
        };
        args.into_iter().map(String::from).collect()
    }

    /// Stage the input, run ffmpeg with `before_input` and `after_input`
    /// arguments, and read back `output.<out_ext>`.
    async fn ffmpeg(
        &self,
        input: &MediaInput,
        before_input: &[String],
        after_input: &[String],
        out_ext: &str,
    ) -> ff_core::Result<Vec<u8>> {
        let ffmpeg = self.tools.require("ffmpeg")?;
        let ws = Workspace::stage(&input.bytes, input.extension()).await?;
        let out = ws.output(out_ext);

        ToolCommand::for_tool(ffmpeg)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(before_input)
            .arg("-i")
            .arg(ws.input())
            .args(after_input)
            .arg(&out)
            .run()
            .await?;

        ws.read_output(&out).await
    }
}

fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

fn parse_probe(json: &Value) -> MediaMetadata {
    let streams = json["streams"].as_array().cloned().unwrap_or_default();
    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"));

    MediaMetadata {
        width: video
            .and_then(|s| s["width"].as_u64())
            .and_then(|w| u32::try_from(w).ok()),
        height: video
            .and_then(|s| s["height"].as_u64())
            .and_then(|h| u32::try_from(h).ok()),
        format: json["format"]["format_name"].as_str().map(String::from),
        duration: json["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok()),
        ..Default::default()
    }
}

fn secs(value: f64) -> String {
    format!("{value:.3}")
}

#[async_trait]
impl MediaAdapter for AvAdapter {
    fn name(&self) -> &'static str {
        "av"
    }

    fn supports(&self, mime: &str) -> bool {
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn conversions(&self, mime: &str) -> Vec<&'static str> {
        if is_video(mime) {
            VIDEO_CONVERSIONS.to_vec()
        } else if mime.starts_with("audio/") {
            AUDIO_CONVERSIONS.to_vec()
        } else {
            Vec::new()
        }
    }

    fn operations(&self, mime: &str) -> Vec<&'static str> {
        if is_video(mime) {
            VIDEO_OPERATIONS.to_vec()
        } else if mime.starts_with("audio/") {
            AUDIO_OPERATIONS.to_vec()
        } else {
            Vec::new()
        }
    }

    async fn process(&self, input: &MediaInput) -> ff_core::Result<ProcessingResult> {
        match self.probe(input).await {
            Ok(metadata) => Ok(ProcessingResult {
                mime_type: input.mime_type().to_string(),
                size: input.bytes.len() as u64,
                metadata,
            }),
            Err(e) => {
                tracing::warn!(mime = input.mime_type(), "Media probe failed, reporting opaque result: {e}");
                Ok(ProcessingResult::opaque(input.bytes.len()))
            }
        }
    }

    async fn manipulate(&self, input: &MediaInput, op: &Operation) -> ff_core::Result<Vec<u8>> {
        let mime = input.mime_type();
        match op {
            Operation::Convert { format, .. } => {
                let format = format.to_ascii_lowercase();
                if !self.conversions(mime).contains(&format.as_str()) {
                    return Err(unsupported_format(&format, mime));
                }
                let args = self.encode_args(&format);
                self.ffmpeg(input, &[], &args, &format).await
            }
            Operation::Trim { start, end } => {
                if !(start.is_finite() && end.is_finite()) || *start < 0.0 || end <= start {
                    return Err(ff_core::Error::Validation(format!(
                        "invalid trim range {start}..{end}"
                    )));
                }
                let before = vec!["-ss".to_string(), secs(*start)];
                let after = vec!["-t".to_string(), secs(end - start)];
                self.ffmpeg(input, &before, &after, input.extension()).await
            }
            Operation::ExtractAudio if is_video(mime) => {
                let args = self.encode_args("mp3");
                self.ffmpeg(input, &[], &args, "mp3").await
            }
            Operation::Compress { .. } => {
                let ext = input.extension().to_string();
                let args = if is_video(mime) {
                    vec!["-crf".to_string(), self.video_crf.to_string()]
                } else {
                    vec!["-b:a".to_string(), self.audio_bitrate.clone()]
                };
                self.ffmpeg(input, &[], &args, &ext).await
            }
            Operation::ExtractAudio | Operation::Resize { .. } | Operation::Rotate { .. } => {
                Err(unsupported_operation(self.name(), op, mime))
            }
        }
    }
}
