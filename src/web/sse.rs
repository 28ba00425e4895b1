//! Server-Sent Events for real-time pose updates

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::rig::AvatarPose;
use crate::AppState;

/// Create an SSE stream of the local pose, one event per frame
pub fn create_pose_stream(
    app_state: Arc<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app_state.subscribe_pose();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(pose) => Some(Ok(pose_to_event(&pose))),
        // Lagged receivers skip to the newest pose
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn pose_to_event(pose: &AvatarPose) -> Event {
    Event::default().event("pose").data(pose.to_wire().to_string())
}

