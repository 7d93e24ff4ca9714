use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Transport,
    Source,
    Preview,
    Sink,
}

/// Counts the transports and devices currently held open, so teardown can be verified
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    counts: Arc<[AtomicUsize; 4]>,
}

impl ResourceTracker {
    pub fn new() -> ResourceTracker {
        ResourceTracker::default()
    }

    /// Wraps an opened resource so it is counted until dropped
    pub fn track<T>(&self, kind: ResourceKind, resource: T) -> Tracked<T> {
        self.counts[index(kind)].fetch_add(1, Ordering::SeqCst);
        Tracked {
            resource,
            kind,
            tracker: self.clone(),
        }
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.counts[index(kind)].load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|x| x.load(Ordering::SeqCst)).sum()
    }
}

fn index(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Transport => 0,
        ResourceKind::Source => 1,
        ResourceKind::Preview => 2,
        ResourceKind::Sink => 3,
    }
}

/// A resource counted by a [`ResourceTracker`] for as long as it lives
pub struct Tracked<T> {
    resource: T,
    kind: ResourceKind,
    tracker: ResourceTracker,
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.resource
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.tracker.counts[index(self.kind)].fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_resource_lifetimes() {
        let tracker = ResourceTracker::new();
        let transport = tracker.track(ResourceKind::Transport, 5_u8);
        let sink = tracker.track(ResourceKind::Sink, "sink");

        assert_eq!(*transport, 5);
        assert_eq!(tracker.count(ResourceKind::Transport), 1);
        assert_eq!(tracker.total(), 2);

        drop(transport);
        assert_eq!(tracker.count(ResourceKind::Transport), 0);

        drop(sink);
        assert_eq!(tracker.total(), 0);
    }
}
