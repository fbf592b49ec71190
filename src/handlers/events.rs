use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::services::auth;
use crate::state::AppState;

// GET /api/events — live booking event stream
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, Response> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    {
        let db = state.db.lock().unwrap();
        auth::authenticate_token(&db, token).map_err(|_| AppError::Unauthorized.into_response())?;
    }

    let rx = state.events_tx.subscribe();

    // Events are fire-and-forget; a lagged subscriber just misses them
    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event.booking).unwrap_or_default();
            Some(Ok::<_, Infallible>(Event::default().data(data).event(event.kind)))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let merged = StreamExt::merge(live_stream, keepalive_stream);

    Ok(Sse::new(merged))
}
