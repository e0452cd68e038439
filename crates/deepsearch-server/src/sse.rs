//! SSE transport for pipeline events.
//!
//! Frames a `PipelineEvent` stream as SSE: each event carries `{type, data,
//! timestamp}`, matching the tagged-union shape from the data model plus a
//! wall-clock stamp added at the transport boundary.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use deepsearch_core::model::PipelineEvent;

pub fn pipeline_sse<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = PipelineEvent> + Send + 'static,
{
    let framed = stream.map(|event| {
        let mut value = serde_json::to_value(&event).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(object) = value.as_object_mut() {
            object.insert("timestamp".to_string(), serde_json::json!(chrono::Utc::now().to_rfc3339()));
        }
        Ok(Event::default().data(value.to_string()))
    });

    Sse::new(framed).keep_alive(KeepAlive::default())
}
