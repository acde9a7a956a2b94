//! Application context shared by every route handler via axum state.

use std::sync::Arc;

use ff_av::ToolRegistry;
use ff_core::config::Config;
use ff_core::events::EventBus;
use ff_fetch::{DownloaderRegistry, HttpFetcher, YouTubeDownloader};
use ff_jobs::JobEngine;
use ff_media::AdapterRegistry;

/// Cheaply cloneable: every field is an `Arc` or wraps them.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable configuration snapshot.
    pub config: Arc<Config>,
    /// Job store plus the processing and conversion pipeline.
    pub engine: JobEngine,
    /// External tool registry, reported by `/api/admin/tools`.
    pub tools: Arc<ToolRegistry>,
    /// Broadcast event bus for SSE.
    pub events: Arc<EventBus>,
}

impl AppContext {
    /// Discover tools from `PATH` and the config overrides, then wire up
    /// the adapters, downloaders and the job engine.
    pub fn new(config: Config) -> ff_core::Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        Self::with_tools(config, tools)
    }

    pub fn with_tools(config: Config, tools: Arc<ToolRegistry>) -> ff_core::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(
            &config.downloads,
            config.limits.max_upload_bytes,
        )?);
        let youtube = Arc::new(YouTubeDownloader::new(Arc::clone(&fetcher)));
        let downloaders = Arc::new(DownloaderRegistry::with_youtube(
            fetcher,
            Arc::clone(&youtube),
        ));
        let adapters = Arc::new(AdapterRegistry::with_defaults(
            Arc::clone(&tools),
            &config.conversion,
        ));
        let events = Arc::new(EventBus::default());
        let engine = JobEngine::new(adapters, downloaders, youtube, Arc::clone(&events), &config);

        Ok(Self {
            config: Arc::new(config),
            engine,
            tools,
            events,
        })
    }
}
