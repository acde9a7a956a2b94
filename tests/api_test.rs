//! HTTP-level tests for upload, status, conversion and download.

mod common;

use common::{mp4_header, png, TestHarness};
use ff_core::config::Config;
use serde_json::Value;

#[tokio::test]
async fn png_upload_then_convert_to_webp() {
    let h = TestHarness::start().await;

    let resp = h.upload("photo.png", png(10, 10)).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["fileType"], "image");
    let id = body["jobId"].as_str().unwrap().to_string();

    let job = h.wait_for_terminal(&id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["fileType"], "image");
    assert_eq!(job["file"]["mimeType"], "image/png");
    assert_eq!(job["result"]["metadata"]["width"], 10);
    assert_eq!(job["result"]["metadata"]["height"], 10);
    assert_eq!(job["result"]["url"], format!("/api/media/download/{id}"));
    assert!(job.get("error").is_none());
    let formats: Vec<&str> = job["manipulationOptions"]["conversions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["format"].as_str())
        .collect();
    assert!(formats.contains(&"webp"));
    assert!(!formats.contains(&"png"));

    let resp = h.convert(&id, "webp").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/webp");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"photo.webp\""
    );
    let converted = resp.bytes().await.unwrap();
    assert_eq!(&converted[..4], b"RIFF");
    assert_eq!(&converted[8..12], b"WEBP");

    let job: Value = h.status(&id).await.json().await.unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["file"]["originalName"], "photo.webp");
    assert_eq!(job["file"]["mimeType"], "image/webp");
    assert_eq!(job["result"]["mimeType"], "image/webp");
    assert_eq!(job["result"]["size"], converted.len());

    let resp = h.download(&id).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/webp");
    assert_eq!(resp.bytes().await.unwrap(), converted);
}

#[tokio::test]
async fn resize_operation_shrinks_the_image() {
    let h = TestHarness::start().await;
    let id = h.upload_ok("wide.png", png(40, 20)).await;
    h.wait_for_terminal(&id).await;

    let resp = h
        .manipulate(
            &id,
            serde_json::json!({ "operation": "resize", "maxWidth": 10, "maxHeight": 10 }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"wide.png\""
    );
    let resized = image::load_from_memory(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!((resized.width(), resized.height()), (10, 5));

    let job: Value = h.status(&id).await.json().await.unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["metadata"]["width"], 10);
    assert_eq!(job["result"]["metadata"]["height"], 5);
}

#[tokio::test]
async fn operation_not_offered_is_422() {
    let h = TestHarness::start().await;
    let id = h.upload_ok("photo.png", png(4, 4)).await;
    let before = h.wait_for_terminal(&id).await;

    let resp = h
        .manipulate(&id, serde_json::json!({ "operation": "trim", "start": 0.0, "end": 1.0 }))
        .await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unsupported");
    assert!(body["details"].as_str().unwrap().contains("trim"));

    let after: Value = h.status(&id).await.json().await.unwrap();
    assert_eq!(after["file"], before["file"]);
    assert_eq!(after["updatedAt"], before["updatedAt"]);
}

#[tokio::test]
async fn unsupported_format_is_422_and_job_is_untouched() {
    let h = TestHarness::start().await;
    let id = h.upload_ok("photo.png", png(8, 8)).await;
    let before = h.wait_for_terminal(&id).await;

    let resp = h.convert(&id, "mp3").await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unsupported");

    let after: Value = h.status(&id).await.json().await.unwrap();
    assert_eq!(after["status"], "completed");
    assert_eq!(after["result"], before["result"]);
    assert_eq!(after["file"], before["file"]);
    assert_eq!(after["updatedAt"], before["updatedAt"]);
}

#[tokio::test]
async fn unknown_jobs_are_404() {
    let h = TestHarness::start().await;

    assert_eq!(h.status("999").await.status(), 404);
    assert_eq!(h.download("999").await.status(), 404);
    assert_eq!(h.convert("999", "png").await.status(), 404);
    assert_eq!(h.status("not-an-id").await.status(), 404);

    let body: Value = h.status("999").await.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn rejected_uploads_create_no_job() {
    let mut config = Config::default();
    config.limits.max_upload_bytes = 1024;
    let h = TestHarness::with_config(config).await;

    let resp = h.upload("blob.bin", vec![0u8, 1, 2, 3, 0, 5, 6, 7]).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));

    let big = "line of text\n".repeat(200).into_bytes();
    let resp = h.upload("big.txt", big).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("File size exceeds limit"));

    let resp = h
        .client
        .post(h.url("/api/upload"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert!(h.ctx.engine.store().is_empty());
}

#[tokio::test]
async fn failed_conversion_keeps_payload_and_blocks_download() {
    let h = TestHarness::start().await;
    let id = h.upload_ok("clip.mp4", mp4_header()).await;
    let job = h.wait_for_terminal(&id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["fileType"], "video");

    // No ffmpeg in the harness.
    let resp = h.convert(&id, "webm").await;
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Conversion failed");
    assert_eq!(body["code"], "adapter_unavailable");
    assert!(body["details"].as_str().unwrap().contains("ffmpeg"));

    let job: Value = h.status(&id).await.json().await.unwrap();
    assert_eq!(job["status"], "failed");
    assert!(job["error"].as_str().is_some());
    assert!(job.get("result").is_none());
    assert_eq!(job["file"]["originalName"], "clip.mp4");
    assert_eq!(job["file"]["size"], mp4_header().len());

    let resp = h.download(&id).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("File not available"));
}

#[tokio::test]
async fn youtube_quality_needs_a_youtube_job() {
    let h = TestHarness::start().await;
    let id = h.upload_ok("photo.png", png(4, 4)).await;
    h.wait_for_terminal(&id).await;

    let resp = h
        .client
        .post(h.url(&format!("/api/media/youtube-quality/{id}")))
        .json(&serde_json::json!({ "quality": "720p" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Could not extract video ID"));
}

#[tokio::test]
async fn health_and_tools() {
    let h = TestHarness::start().await;

    let health: Value = h
        .client
        .get(h.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let tools: Value = h
        .client
        .get(h.url("/api/admin/tools"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = tools.as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "ffmpeg"));
    assert!(tools.iter().all(|t| t["available"] == false));
}
