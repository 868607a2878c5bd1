use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::sync::Notification;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for redraws and selection upkeep
  Tick,
  /// Outcome reported by a cache or mutation task
  Notice(Notification),
}

/// Event handler that merges terminal input, a tick timer and sync notifications
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal polling blocks, so keep it off the async workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let evt = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(_) => continue,
          Err(e) => {
            tracing::warn!(error = %e, "Failed to read terminal event");
            continue;
          }
        }
      } else {
        Event::Tick
      };
      if input_tx.send(evt).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Forward notifications into the event stream
  pub fn forward(&self, mut notices: mpsc::UnboundedReceiver<Notification>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while let Some(notice) = notices.recv().await {
        if tx.send(Event::Notice(notice)).is_err() {
          break;
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
