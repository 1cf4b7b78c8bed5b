use std::sync::{Arc, Barrier};

/// A group of cooperating writers, one per rank.
///
/// The writers never lock anything themselves; the controller's barrier is what orders the
/// ranks' writes to shared files.
pub trait Controller: Send + Sync {
    /// Index of this rank, below [`Controller::size`].
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Blocks until every rank has reached the barrier.
    fn barrier(&self);
}

/// A single rank working alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalController;

impl Controller for LocalController {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}
}

/// Ranks running as threads of one process.
#[derive(Debug, Clone)]
pub struct ThreadController {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
}

impl ThreadController {
    /// One controller per rank of a group of `size` ranks.
    pub fn group(size: usize) -> Vec<ThreadController> {
        let barrier = Arc::new(Barrier::new(size));
        (0..size)
            .map(|rank| ThreadController {
                rank,
                size,
                barrier: barrier.clone(),
            })
            .collect()
    }
}

impl Controller for ThreadController {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}
