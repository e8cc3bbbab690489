use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared, cooperatively polled cancellation flag.
///
/// Cloning the token yields a handle to the same flag. Long running work (meshing,
/// generation) checks [`CancellationToken::is_cancelled`] between bounded units of
/// work and abandons its partial output once the flag is raised.
///
/// # Examples
/// ```
/// use voxel_stream::core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
/// assert!(!worker_view.is_cancelled());
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag for every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`CancellationToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
