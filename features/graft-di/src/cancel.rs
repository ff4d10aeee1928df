use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Cooperative cancellation shared between the caller and a running resolution
///
/// Checked between injectors and before every key, so a cancelled batch stops
/// within one resolution step. A token may also carry a deadline, after which
/// it reads as cancelled without anyone flipping the shared flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// Marker returned by operations that observed a cancelled token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that counts as cancelled once `timeout` elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Token that observes this one and additionally expires after `timeout`
    ///
    /// This token is left untouched, so it can be reused once the child expired.
    /// Cancelling the child cancels this token too, since they share the flag.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        Self {
            cancelled: self.cancelled.clone(),
            deadline: match (self.deadline, deadline) {
                (Some(ours), Some(theirs)) => Some(ours.min(theirs)),
                (ours, theirs) => ours.or(theirs),
            },
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.is_expired()
    }

    /// Whether the deadline passed, regardless of the shared flag
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub(crate) fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use std::thread::sleep;

    use super::*;

    #[rstest]
    fn clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert_eq!(observer.check(), Ok(()));

        token.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(observer.check(), Err(Cancelled));
    }

    #[rstest]
    fn timeout_cancels_eventually() {
        let token = CancelToken::with_timeout(Duration::from_millis(5));
        sleep(Duration::from_millis(20));
        assert!(token.is_cancelled());
        assert!(token.is_expired());
    }

    #[rstest]
    fn expired_children_leave_the_parent_usable() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::ZERO);

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert_eq!(parent.check(), Ok(()));
    }

    #[rstest]
    fn children_observe_the_parent() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(!child.is_expired());
    }

    #[rstest]
    fn children_keep_the_earlier_deadline() {
        let parent = CancelToken::with_timeout(Duration::ZERO);
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(child.is_expired());
    }
}
