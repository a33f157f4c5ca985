//! Scheduling services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the scheduling
//! contracts defined in `weft-core`: an [`IdleScheduler`] that records
//! frame requests behind an atomic flag (optionally waking an event
//! loop), an [`IdleSlice`] that meters a time budget with
//! [`std::time::Instant`], and a [`Driver`] that pumps a renderer until
//! it goes idle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use weft_core::{FrameScheduler, HostAdapter, HostError, Renderer, TimeSlice};

/// Frame scheduler that latches requests until the driver polls them.
pub struct IdleScheduler {
    frame_requested: AtomicBool,
    waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl IdleScheduler {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a new frame is requested, so
    /// an event loop parked on the host can be nudged.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap() = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap() = None;
    }

    fn wake(&self) {
        let waker = self.waker.read().unwrap().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for IdleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleScheduler")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl FrameScheduler for IdleScheduler {
    fn request_frame(&self) {
        self.frame_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// One cooperative time slice: a budget measured from the moment the
/// slice is created. The render loop reads [`TimeSlice::remaining`]
/// after every unit of work.
#[derive(Debug, Clone)]
pub struct IdleSlice {
    start: Instant,
    budget: Duration,
}

impl IdleSlice {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }
}

impl Default for IdleSlice {
    /// A frame-ish default budget in the spirit of browser idle
    /// callbacks.
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl TimeSlice for IdleSlice {
    fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }
}

/// Convenience bundle: owns the scheduler and repeatedly hands the
/// renderer fresh slices, honoring the engine's continuous-polling
/// contract.
#[derive(Clone)]
pub struct Driver {
    scheduler: Arc<IdleScheduler>,
    budget: Duration,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            scheduler: Arc::new(IdleScheduler::default()),
            budget: Duration::from_millis(10),
        }
    }

    pub fn with_budget(budget: Duration) -> Self {
        Self {
            scheduler: Arc::new(IdleScheduler::default()),
            budget,
        }
    }

    /// The scheduler to construct a renderer with.
    pub fn scheduler(&self) -> Arc<IdleScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Whether the engine has asked to be invoked since the last poll.
    pub fn take_frame_request(&self) -> bool {
        self.scheduler.take_frame_request()
    }

    /// Invokes the work loop with fresh slices until the renderer
    /// reports no pending work, then drains the trailing frame request
    /// the polling contract leaves behind.
    pub fn pump_until_idle<H: HostAdapter>(
        &self,
        renderer: &mut Renderer<H>,
    ) -> Result<(), HostError> {
        while renderer.has_pending_work() {
            renderer.work_loop(&IdleSlice::new(self.budget))?;
            log::trace!("driver: slice finished, pending={}", renderer.has_pending_work());
        }
        let _ = self.scheduler.take_frame_request();
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("scheduler", &self.scheduler)
            .field("budget", &self.budget)
            .finish()
    }
}
