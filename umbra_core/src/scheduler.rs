// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame callback scheduling on the UI thread.
//!
//! [`FrameScheduler`] multiplexes one platform vsync source (a
//! [`FrameDriver`]) across any number of one-shot callbacks, grouped into
//! totally ordered [`FrameClass`]es. Each tick runs every due callback,
//! class by class; a callback posted while its own class is running waits
//! for the next tick, so a callback that re-posts itself runs exactly once
//! per frame.
//!
//! The driver is only asked for a frame while callbacks are queued. Posting
//! into an idle scheduler arms it; a tick that drains everything leaves it
//! disarmed until the next post.
//!
//! The scheduler lives on the UI thread, like the platform choreographers it
//! fronts. Everything that needs to reach it from another thread goes
//! through the operation queue instead; nothing here is `Send`.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Ticket for a posted callback, usable to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    class: FrameClass,
    id: u64,
}

/// A one-shot frame callback. Receives the tick's frame time.
pub type FrameCallback = Box<dyn FnOnce(Instant)>;

/// Source of frame ticks, typically the platform vsync hook.
///
/// [`request_frame`](Self::request_frame) asks for exactly one future call
/// to [`FrameScheduler::run_frame`]. The scheduler never requests a frame it
/// has already requested and not yet received.
pub trait FrameDriver {
    /// Asks the platform for one frame tick.
    fn request_frame(&self);
}

/// Execution order within one frame tick.
///
/// Classes run in declaration order, every callback of one class before any
/// of the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameClass {
    /// Instrumentation markers; first so they bracket the real work.
    Marker,
    /// Mount-queue dispatch: sealed batches flush here.
    Dispatch,
    /// Animation steps, after dispatch so they see this frame's mutations.
    Animation,
    /// Script timers.
    Timers,
    /// Everything that can wait until the frame's real work is done.
    Idle,
}

impl FrameClass {
    /// All classes, in execution order.
    pub const ALL: [Self; 5] = [
        Self::Marker,
        Self::Dispatch,
        Self::Animation,
        Self::Timers,
        Self::Idle,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Marker => 0,
            Self::Dispatch => 1,
            Self::Animation => 2,
            Self::Timers => 3,
            Self::Idle => 4,
        }
    }
}

struct Entry {
    id: u64,
    callback: FrameCallback,
}

struct Inner {
    classes: [Vec<Entry>; FrameClass::ALL.len()],
    next_id: u64,
    armed: bool,
}

/// Per-class one-shot frame callbacks over a single [`FrameDriver`].
pub struct FrameScheduler {
    inner: Mutex<Inner>,
    driver: Arc<dyn FrameDriver>,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FrameScheduler")
            .field("pending", &inner.classes.iter().map(Vec::len).sum::<usize>())
            .field("armed", &inner.armed)
            .finish_non_exhaustive()
    }
}

impl FrameScheduler {
    /// Creates an idle scheduler over `driver`.
    #[must_use]
    pub fn new(driver: Arc<dyn FrameDriver>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                classes: std::array::from_fn(|_| Vec::new()),
                next_id: 0,
                armed: false,
            }),
            driver,
        }
    }

    /// Posts a one-shot callback, arming the driver if the scheduler was
    /// idle. Callbacks posted during a tick run on the *next* tick.
    pub fn post_frame_callback(&self, class: FrameClass, callback: FrameCallback) -> CallbackHandle {
        let (handle, arm) = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.classes[class.index()].push(Entry { id, callback });
            let arm = !inner.armed;
            inner.armed = true;
            (CallbackHandle { class, id }, arm)
        };
        // Outside the lock: the driver may tick synchronously.
        if arm {
            self.driver.request_frame();
        }
        handle
    }

    /// Cancels a posted callback. Returns whether it was still queued.
    ///
    /// A frame already requested for it still arrives; an empty tick is
    /// cheaper than tracking un-requests.
    pub fn remove_frame_callback(&self, handle: CallbackHandle) -> bool {
        let mut inner = self.inner.lock();
        let entries = &mut inner.classes[handle.class.index()];
        let before = entries.len();
        entries.retain(|entry| entry.id != handle.id);
        entries.len() != before
    }

    /// Callbacks currently queued across all classes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().classes.iter().map(Vec::len).sum()
    }

    /// Whether a frame has been requested and not yet run.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Runs one frame tick: every callback queued before the tick, in class
    /// order, with `frame_time` as their shared timestamp.
    ///
    /// Callbacks run outside the lock, so they may post (for the next tick)
    /// or cancel freely.
    pub fn run_frame(&self, frame_time: Instant) {
        // Ids are handed out monotonically, so everything queued before the
        // tick sits below this watermark. A post during the tick gets an id
        // at or above it and waits, even if an older entry was cancelled.
        let due_below = {
            let mut inner = self.inner.lock();
            inner.armed = false;
            inner.next_id
        };
        for class in FrameClass::ALL {
            let slot = class.index();
            loop {
                let entry = {
                    let mut inner = self.inner.lock();
                    let due = inner.classes[slot]
                        .first()
                        .is_some_and(|entry| entry.id < due_below);
                    if !due {
                        break;
                    }
                    inner.classes[slot].remove(0)
                };
                (entry.callback)(frame_time);
            }
        }
        // Anything still queued was posted during the tick and armed
        // itself; arm here only for a waiting queue that somehow is not.
        let arm = {
            let mut inner = self.inner.lock();
            let waiting = inner.classes.iter().any(|entries| !entries.is_empty());
            let arm = waiting && !inner.armed;
            if arm {
                inner.armed = true;
            }
            arm
        };
        if arm {
            self.driver.request_frame();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingDriver {
        requests: AtomicU32,
    }

    impl CountingDriver {
        fn requests(&self) -> u32 {
            self.requests.load(Ordering::Relaxed)
        }
    }

    impl FrameDriver for CountingDriver {
        fn request_frame(&self) {
            self.requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn scheduler() -> (FrameScheduler, Arc<CountingDriver>) {
        let driver = Arc::new(CountingDriver::default());
        (FrameScheduler::new(driver.clone()), driver)
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> FrameCallback {
        let log = Rc::clone(log);
        Box::new(move |_| log.borrow_mut().push(label))
    }

    #[test]
    fn classes_run_in_declaration_order() {
        let (scheduler, _) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.post_frame_callback(FrameClass::Idle, recorder(&log, "idle"));
        scheduler.post_frame_callback(FrameClass::Timers, recorder(&log, "timers"));
        scheduler.post_frame_callback(FrameClass::Dispatch, recorder(&log, "dispatch"));
        scheduler.post_frame_callback(FrameClass::Animation, recorder(&log, "animation"));
        scheduler.post_frame_callback(FrameClass::Marker, recorder(&log, "marker"));
        scheduler.run_frame(Instant::now());
        assert_eq!(
            *log.borrow(),
            ["marker", "dispatch", "animation", "timers", "idle"]
        );
    }

    #[test]
    fn callbacks_are_one_shot() {
        let (scheduler, _) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.post_frame_callback(FrameClass::Timers, recorder(&log, "once"));
        scheduler.run_frame(Instant::now());
        scheduler.run_frame(Instant::now());
        assert_eq!(*log.borrow(), ["once"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn posting_arms_the_driver_once() {
        let (scheduler, driver) = scheduler();
        scheduler.post_frame_callback(FrameClass::Timers, Box::new(|_| {}));
        scheduler.post_frame_callback(FrameClass::Timers, Box::new(|_| {}));
        assert_eq!(driver.requests(), 1, "second post piggybacks");
        assert!(scheduler.is_armed());
        scheduler.run_frame(Instant::now());
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn reposts_defer_to_the_next_tick() {
        let (scheduler, driver) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Rc::new(scheduler);
        let again = {
            let log = Rc::clone(&log);
            let scheduler = Rc::clone(&scheduler);
            Box::new(move |_: Instant| {
                log.borrow_mut().push("first");
                let log = Rc::clone(&log);
                scheduler.post_frame_callback(
                    FrameClass::Animation,
                    Box::new(move |_| log.borrow_mut().push("second")),
                );
            })
        };
        scheduler.post_frame_callback(FrameClass::Animation, again);
        scheduler.run_frame(Instant::now());
        assert_eq!(*log.borrow(), ["first"], "the re-post waits a tick");
        assert_eq!(driver.requests(), 2, "the re-post re-armed the driver");
        scheduler.run_frame(Instant::now());
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn removal_cancels_a_queued_callback() {
        let (scheduler, _) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        let keep = scheduler.post_frame_callback(FrameClass::Timers, recorder(&log, "keep"));
        let drop = scheduler.post_frame_callback(FrameClass::Timers, recorder(&log, "drop"));
        assert!(scheduler.remove_frame_callback(drop));
        assert!(!scheduler.remove_frame_callback(drop), "already removed");
        scheduler.run_frame(Instant::now());
        assert_eq!(*log.borrow(), ["keep"]);
        assert!(!scheduler.remove_frame_callback(keep), "already ran");
    }

    #[test]
    fn cancelling_a_queued_callback_does_not_admit_a_new_post() {
        let (scheduler, _) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Rc::new(scheduler);
        let cancelled: Rc<RefCell<Option<CallbackHandle>>> = Rc::new(RefCell::new(None));
        let first = {
            let log = Rc::clone(&log);
            let scheduler = Rc::clone(&scheduler);
            let cancelled = Rc::clone(&cancelled);
            Box::new(move |_: Instant| {
                log.borrow_mut().push("first");
                let handle = cancelled.borrow_mut().take().unwrap();
                assert!(scheduler.remove_frame_callback(handle));
                let log = Rc::clone(&log);
                scheduler.post_frame_callback(
                    FrameClass::Timers,
                    Box::new(move |_| log.borrow_mut().push("late")),
                );
            })
        };
        scheduler.post_frame_callback(FrameClass::Timers, first);
        *cancelled.borrow_mut() =
            Some(scheduler.post_frame_callback(FrameClass::Timers, recorder(&log, "second")));
        scheduler.run_frame(Instant::now());
        // The cancel freed a slot this tick, but the new post still waits.
        assert_eq!(*log.borrow(), ["first"]);
        scheduler.run_frame(Instant::now());
        assert_eq!(*log.borrow(), ["first", "late"]);
    }

    #[test]
    fn callbacks_share_the_frame_time() {
        let (scheduler, _) = scheduler();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let seen = Rc::clone(&seen);
            scheduler
                .post_frame_callback(FrameClass::Idle, Box::new(move |t| seen.borrow_mut().push(t)));
        }
        let tick = Instant::now();
        scheduler.run_frame(tick);
        assert_eq!(*seen.borrow(), [tick, tick, tick]);
    }
}
