//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] with no external tools,
//! serves the router on a random port, and drives it with `reqwest`.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ff_av::ToolRegistry;
use ff_core::config::Config;
use ff_server::context::AppContext;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    cancel: CancellationToken,
}

impl TestHarness {
    /// Serve the default configuration.
    pub async fn start() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Serve a custom configuration on a random port.
    pub async fn with_config(config: Config) -> Self {
        let ctx = AppContext::with_tools(config, Arc::new(ToolRegistry::empty()))
            .expect("failed to build app context");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = CancellationToken::new();
        tokio::spawn(ff_server::serve(listener, ctx.clone(), cancel.clone()));

        Self {
            ctx,
            addr,
            client: reqwest::Client::new(),
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a multipart upload with the file under the `file` field.
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .expect("upload request failed")
    }

    /// POST a URL ingest.
    pub async fn upload_url(&self, url: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/upload"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .expect("url upload request failed")
    }

    /// Upload and return the new job id.
    pub async fn upload_ok(&self, name: &str, bytes: Vec<u8>) -> String {
        let resp = self.upload(name, bytes).await;
        assert_eq!(resp.status(), 200, "upload of {name} rejected");
        let body: Value = resp.json().await.unwrap();
        body["jobId"].as_str().expect("jobId missing").to_string()
    }

    pub async fn status(&self, job_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/media/status/{job_id}")))
            .send()
            .await
            .expect("status request failed")
    }

    pub async fn convert(&self, job_id: &str, format: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/media/convert/{job_id}")))
            .json(&serde_json::json!({ "format": format }))
            .send()
            .await
            .expect("convert request failed")
    }

    /// Send an operation body such as `{"operation": "rotate", "angle": 90}`.
    pub async fn manipulate(&self, job_id: &str, operation: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/media/convert/{job_id}")))
            .json(&operation)
            .send()
            .await
            .expect("manipulate request failed")
    }

    pub async fn download(&self, job_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/media/download/{job_id}")))
            .send()
            .await
            .expect("download request failed")
    }

    /// Poll the status endpoint until the job is completed or failed.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job: Value = self.status(job_id).await.json().await.unwrap();
            if matches!(job["status"].as_str(), Some("completed" | "failed")) {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {job_id} did not finish: {job}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A solid-color PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("failed to encode png");
    out.into_inner()
}

/// The smallest buffer the classifier accepts as MP4: a lone `ftyp` box.
pub fn mp4_header() -> Vec<u8> {
    let mut bytes = vec![0, 0, 0, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0, 0, 2, 0]);
    bytes.extend_from_slice(b"isomiso2");
    bytes.extend_from_slice(&[0u8; 40]);
    bytes
}
