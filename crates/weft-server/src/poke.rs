//! Best-effort, coalesced change notifications.
//!
//! A poke tells connected clients that a push committed and a pull is worth
//! doing. Pokes are rate-limited to one per window and may be lost;
//! correctness is carried by cookie-based pull, never by poke delivery.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use tokio::sync::broadcast;

pub struct PokeHandle {
  tx:        broadcast::Sender<()>,
  throttled: AtomicBool,
  window:    Duration,
}

impl PokeHandle {
  pub fn new(window: Duration) -> Self {
    let (tx, _) = broadcast::channel(8);
    Self {
      tx,
      throttled: AtomicBool::new(false),
      window,
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<()> {
    self.tx.subscribe()
  }

  /// Notify subscribers after the throttle window. Pokes landing inside an
  /// open window coalesce into the pending one.
  pub fn poke(self: &Arc<Self>) {
    if self.throttled.swap(true, Ordering::SeqCst) {
      return;
    }
    let handle = Arc::clone(self);
    tokio::spawn(async move {
      tokio::time::sleep(handle.window).await;
      let _ = handle.tx.send(());
      handle.throttled.store(false, Ordering::SeqCst);
    });
  }
}
