//! Typed notifications published by the grid components.
//!
//! Every component gets an `Rc<EventBus>` at construction and publishes
//! through it; the surrounding UI (sidebar, status bar, page controller)
//! subscribes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::models::{CollectKey, MediaId, SortKey};
use crate::render::Rect;

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    SelectionChanged {
        selected: Vec<MediaId>,
        focused: Option<MediaId>,
    },
    SortChanged(SortKey),
    CollectChanged(CollectKey),
    StatusTextChanged(String),
    /// A region of the screen, in canvas coordinates, needs repainting.
    RepaintRequested(Rect),
}

/// Callback type for grid notifications.
pub type EventCallback = Box<dyn Fn(&GridEvent)>;

/// Single-threaded observer list.
///
/// Subscribers must not subscribe from inside a callback.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<Vec<EventCallback>>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&GridEvent) + 'static,
    {
        self.subscribers.borrow_mut().push(Box::new(callback));
    }

    pub fn publish(&self, event: GridEvent) {
        for callback in self.subscribers.borrow().iter() {
            callback(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Test helper: records every published event.
#[cfg(test)]
pub(crate) fn recording_bus() -> (Rc<EventBus>, Rc<RefCell<Vec<GridEvent>>>) {
    let bus = EventBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    (bus, log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        for _ in 0..3 {
            let count = Rc::clone(&count);
            bus.subscribe(move |_| *count.borrow_mut() += 1);
        }
        bus.publish(GridEvent::StatusTextChanged("0 files".into()));
        assert_eq!(*count.borrow(), 3);
    }
}
