use std::collections::{HashSet, VecDeque};

use super::checkpoint::FrontierSnapshot;

/// Live traversal state of a crawl: the FIFO of URLs awaiting a fetch, the
/// set of URLs ever queued, and the set of confirmed same-domain discoveries.
///
/// Invariants: a URL enters `queue` at most once over the crawl's lifetime
/// (guarded by `visited`), every queued URL is visited, and
/// `discovered ⊆ visited`.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    visited: HashSet<String>,
    discovered: HashSet<String>,
}

impl Frontier {
    /// Fresh frontier holding only the seed.
    pub fn seeded(url: &str) -> Self {
        let mut frontier = Self::default();
        frontier.enqueue_if_new(url);
        frontier
    }

    /// Rebuilds the frontier from a loaded checkpoint.
    pub fn restore(snapshot: FrontierSnapshot) -> Self {
        Self {
            queue: snapshot.queue.into(),
            visited: snapshot.visited.into_iter().collect(),
            discovered: snapshot.discovered.into_iter().collect(),
        }
    }

    /// Queues `url` unless it was ever queued before. Returns whether the URL
    /// was new.
    pub fn enqueue_if_new(&mut self, url: &str) -> bool {
        if self.visited.contains(url) {
            return false;
        }
        self.visited.insert(url.to_owned());
        self.queue.push_back(url.to_owned());
        true
    }

    /// Records `url` as emitted to the output sink. Returns true the first
    /// time, telling the caller to write it.
    pub fn mark_discovered(&mut self, url: &str) -> bool {
        debug_assert!(self.visited.contains(url));
        if self.discovered.contains(url) {
            return false;
        }
        self.discovered.insert(url.to_owned());
        true
    }

    /// Head of the queue, or `None` when the crawl is exhausted.
    pub fn pop_next(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Puts an already-visited URL back at the head of the queue. Used when a
    /// fetch was aborted by cancellation so the URL survives into the next run.
    pub(crate) fn requeue_front(&mut self, url: String) {
        debug_assert!(self.visited.contains(&url));
        self.queue.push_front(url);
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn discovered_len(&self) -> usize {
        self.discovered.len()
    }

    /// Durable snapshot of the current state.
    pub fn snapshot(&self) -> FrontierSnapshot {
        self.snapshot_with_pending(&VecDeque::new())
    }

    /// Durable snapshot with `pending` (dispatched but unfetched URLs) put
    /// back at the head of the queue, so a checkpoint never loses a URL that
    /// is in flight when the process dies.
    pub fn snapshot_with_pending(&self, pending: &VecDeque<String>) -> FrontierSnapshot {
        let queue = pending.iter().chain(self.queue.iter()).cloned().collect();
        FrontierSnapshot::new(
            queue,
            self.visited.iter().cloned().collect(),
            self.discovered.iter().cloned().collect(),
        )
    }
}
