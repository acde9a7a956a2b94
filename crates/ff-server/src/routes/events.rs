//! Server-Sent Events (SSE) handler.
//!
//! Subscribes to the [`ff_core::events::EventBus`], optionally filters by
//! job, replays recent events for late joiners, and sends keepalive
//! heartbeats.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use ff_core::events::Event as JobEvent;
use ff_core::JobId;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

use crate::context::AppContext;

const REPLAY_EVENTS: usize = 50;
const HEARTBEAT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only stream events for this job.
    pub job_id: Option<JobId>,
}

/// GET /api/events -- SSE stream of job events.
pub async fn events_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<EventsQuery>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let job_filter = params.job_id;

    let recent = ctx.events.recent_events(REPLAY_EVENTS);
    let mut rx = ctx.events.subscribe();

    let stream = async_stream::stream! {
        for event in recent.into_iter().rev() {
            if let Some(sse) = to_sse(&event, job_filter) {
                yield Ok(sse);
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT);

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Some(sse) = to_sse(&event, job_filter) {
                                yield Ok(sse);
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!("SSE client lagged by {n} events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default()
                        .event("heartbeat")
                        .data(r#"{"type":"heartbeat"}"#));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("ping"))
}

fn matches_job(event: &JobEvent, filter: Option<JobId>) -> bool {
    filter.is_none_or(|id| event.payload.job_id() == id)
}

fn to_sse(event: &JobEvent, filter: Option<JobId>) -> Option<Event> {
    if !matches_job(event, filter) {
        return None;
    }
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().id(event.seq.to_string()).data(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_core::events::{EventBus, EventPayload};

    #[test]
    fn filters_by_job() {
        let bus = EventBus::default();
        let a: JobId = "1".parse().unwrap();
        let b: JobId = "2".parse().unwrap();
        bus.broadcast(EventPayload::JobStarted { job_id: a });
        bus.broadcast(EventPayload::JobStarted { job_id: b });

        let events = bus.recent_events(10);
        assert_eq!(events.iter().filter(|e| matches_job(e, Some(a))).count(), 1);
        assert_eq!(events.iter().filter(|e| matches_job(e, None)).count(), 2);
    }
}
