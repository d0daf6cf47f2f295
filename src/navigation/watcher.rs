use crate::navigation::NavigationSnapshot;
use tokio::sync::watch;

/// Observes a single field of the navigation snapshot
///
/// Only changes of the selected field wake the watcher. Values published
/// before the watcher was created are not replayed.
pub struct FieldWatcher<T> {
    rx: watch::Receiver<NavigationSnapshot>,
    select: fn(&NavigationSnapshot) -> T,
    last: T,
}

impl<T: Clone + PartialEq> FieldWatcher<T> {
    pub(crate) fn new(mut rx: watch::Receiver<NavigationSnapshot>, select: fn(&NavigationSnapshot) -> T) -> Self {
        let last = select(&rx.borrow_and_update());
        Self { rx, select, last }
    }

    /// Latest value of the field
    pub fn current(&self) -> T {
        (self.select)(&self.rx.borrow())
    }

    /// Wait for the field to change; `None` once the controller is gone
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let value = (self.select)(&self.rx.borrow_and_update());
            if value != self.last {
                self.last = value.clone();
                return Some(value);
            }
        }
    }
}
