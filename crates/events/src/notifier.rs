//! The publish seam between state changes and their transport.

use crate::bus::{EventBus, UpdateEvent};

/// One-way sink for state-change events.
///
/// Publishing never fails and never blocks; implementations drop events
/// nobody is listening for.
pub trait UpdateNotifier: Send + Sync {
    fn publish(&self, event: UpdateEvent);
}

impl UpdateNotifier for EventBus {
    fn publish(&self, event: UpdateEvent) {
        self.send(event);
    }
}

/// Notifier that discards every event. Used where no listeners exist,
/// such as the standalone worker binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl UpdateNotifier for NullNotifier {
    fn publish(&self, _event: UpdateEvent) {}
}
