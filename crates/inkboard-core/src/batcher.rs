//! Frame update batcher: coalesces per-sample mutations into one per frame.

use std::fmt;

/// Single-slot debouncer bound to the display refresh.
///
/// `schedule` overwrites any pending callback, so only the last one
/// scheduled within a frame runs. Callbacks take the target by `&mut` at
/// execution time, so they always see the state as of that frame.
pub struct FrameBatcher<T> {
    pending: Option<Box<dyn FnOnce(&mut T)>>,
    /// Number of frame callbacks requested from the host.
    requests: u64,
    /// Number of callbacks actually applied.
    applied: u64,
}

impl<T> Default for FrameBatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FrameBatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBatcher")
            .field("pending", &self.pending.is_some())
            .field("requests", &self.requests)
            .field("applied", &self.applied)
            .finish()
    }
}

impl<T> FrameBatcher<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            requests: 0,
            applied: 0,
        }
    }

    /// Replace the pending callback. Returns true when this call registered
    /// a new frame request (nothing was pending before).
    pub fn schedule(&mut self, update: impl FnOnce(&mut T) + 'static) -> bool {
        let fresh = self.pending.is_none();
        if fresh {
            self.requests += 1;
        }
        self.pending = Some(Box::new(update));
        fresh
    }

    /// Drop the pending callback without running it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run the pending callback, if any. Called from the frame callback.
    pub fn run_frame(&mut self, target: &mut T) -> bool {
        match self.pending.take() {
            Some(update) => {
                update(target);
                self.applied += 1;
                true
            }
            None => false,
        }
    }

    /// Run the pending callback synchronously, outside a frame.
    pub fn flush(&mut self, target: &mut T) -> bool {
        self.run_frame(target)
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// Decides whether a host tick counts as a frame for the batcher.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSource {
    /// Every tick is a display refresh.
    DisplayRefresh,
    /// No native refresh callback; fire at most once per `period_ms`.
    Interval { period_ms: f64, last_ms: Option<f64> },
}

impl Default for FrameSource {
    fn default() -> Self {
        FrameSource::DisplayRefresh
    }
}

impl FrameSource {
    pub fn interval(period_ms: f64) -> Self {
        FrameSource::Interval {
            period_ms,
            last_ms: None,
        }
    }

    /// Whether the tick at `now_ms` should run the frame work.
    pub fn should_fire(&mut self, now_ms: f64) -> bool {
        match self {
            FrameSource::DisplayRefresh => true,
            FrameSource::Interval { period_ms, last_ms } => {
                let due = last_ms.is_none_or(|last| now_ms - last >= *period_ms);
                if due {
                    *last_ms = Some(now_ms);
                }
                due
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_last_scheduled_update_applies() {
        let mut batcher: FrameBatcher<Vec<i32>> = FrameBatcher::new();
        let mut target = Vec::new();
        assert!(batcher.schedule(|v| v.push(1)));
        assert!(!batcher.schedule(|v| v.push(2)));
        assert!(!batcher.schedule(|v| v.push(3)));
        assert_eq!(batcher.requests(), 1);

        assert!(batcher.run_frame(&mut target));
        assert_eq!(target, vec![3]);
        assert!(!batcher.run_frame(&mut target));
        assert_eq!(batcher.applied(), 1);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut batcher: FrameBatcher<i32> = FrameBatcher::new();
        let mut target = 0;
        batcher.schedule(|t| *t = 5);
        assert!(batcher.cancel());
        assert!(!batcher.is_pending());
        assert!(!batcher.flush(&mut target));
        assert_eq!(target, 0);
    }

    #[test]
    fn test_callback_sees_state_at_execution() {
        let mut batcher: FrameBatcher<i32> = FrameBatcher::new();
        let mut target = 1;
        batcher.schedule(|t| *t *= 10);
        target += 1;
        batcher.flush(&mut target);
        assert_eq!(target, 20);
    }

    #[test]
    fn test_new_request_after_frame() {
        let mut batcher: FrameBatcher<i32> = FrameBatcher::new();
        let mut target = 0;
        batcher.schedule(|t| *t += 1);
        batcher.run_frame(&mut target);
        assert!(batcher.schedule(|t| *t += 1));
        assert_eq!(batcher.requests(), 2);
    }

    #[test]
    fn test_interval_source() {
        let mut source = FrameSource::interval(16.0);
        assert!(source.should_fire(0.0));
        assert!(!source.should_fire(10.0));
        assert!(source.should_fire(16.0));
        assert!(!source.should_fire(20.0));

        let mut display = FrameSource::default();
        assert!(display.should_fire(0.0));
        assert!(display.should_fire(0.1));
    }
}
