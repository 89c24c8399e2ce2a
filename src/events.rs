use crate::carousel::CarouselSnapshot;
use crate::slides::{ticker_text, SlideItem};
use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error};

/// Updates pushed to connected displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DisplayEvent {
    /// The visible carousel window changed
    Carousel(CarouselSnapshot),
    /// Once a second, when a clock is configured
    Clock { time: String },
    /// A new sponsor list was resolved
    Sponsors {
        ticker: String,
        items: Vec<SlideItem>,
    },
}

impl DisplayEvent {
    /// SSE event name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DisplayEvent::Carousel(_) => "carousel",
            DisplayEvent::Clock { .. } => "clock",
            DisplayEvent::Sponsors { .. } => "sponsors",
        }
    }

    fn to_sse(&self) -> Event {
        Event::default()
            .event(self.name())
            .json_data(self)
            .unwrap_or_else(|e| {
                error!("Failed to serialize display event for SSE: {e}");
                Event::default().event(self.name()).data("Error")
            })
    }
}

/// Stream display events to a browser.
///
/// A new subscriber first receives the current carousel window and sponsor list.
/// The stream ends when the server shuts down or the client goes away.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let mut events = state.events.subscribe();
    let shutdown = state.shutdown_token.clone();

    match state.carousel_snapshot() {
        Ok(snapshot) => {
            let _ = tx.send(DisplayEvent::Carousel(snapshot));
        }
        Err(e) => error!("Failed to read carousel for new subscriber: {e}"),
    }
    match state.sponsors() {
        Ok(items) => {
            let _ = tx.send(DisplayEvent::Sponsors {
                ticker: ticker_text(&items),
                items,
            });
        }
        Err(e) => error!("Failed to read sponsors for new subscriber: {e}"),
    }

    tokio::spawn(async move {
        debug!("Display subscribed to events");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break; // client disconnected
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Display subscriber lagged, skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("Display event forwarding stopped");
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event: DisplayEvent| Ok(event.to_sse()));
    Sse::new(stream).keep_alive(KeepAlive::default())
}
