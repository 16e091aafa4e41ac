// Headless host: the single-threaded run loop pages live in
//
// Stands in for the browser window. One virtual clock drives timers and
// animation frames; `advance` delivers everything that falls due, in
// (due, id) order. Location fragment, history entries, hash-change
// listeners and scroll position live here too. Callbacks never run while
// the host is borrowed, so they may schedule or cancel freely.

use crate::dom::{Document, ElementRef};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Animation-frame cadence in milliseconds
pub const FRAME_MS: f64 = 16.0;

/// Default location fragment when none is set
pub const HOME_ROUTE: &str = "/hysa";

enum Callback {
    Timer(Box<dyn FnOnce()>),
    Frame(Box<dyn FnOnce(f64)>),
}

struct Task {
    id: u64,
    due: f64,
    callback: Callback,
}

struct Scheduler {
    now: f64,
    next_id: u64,
    tasks: Vec<Task>,
}

struct History {
    entries: Vec<String>,
    index: usize,
}

struct HostInner {
    scheduler: RefCell<Scheduler>,
    history: RefCell<History>,
    hash_listeners: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
    next_listener: Cell<u64>,
    scroll_y: Cell<u32>,
    document: Document,
}

/// Cloneable handle to the host
#[derive(Clone)]
pub struct Host(Rc<HostInner>);

/// Cancellable handle for a scheduled timer or frame
///
/// `cancel` is idempotent and harmless after the task has run.
pub struct TaskHandle {
    id: u64,
    host: Weak<HostInner>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        if let Some(inner) = self.host.upgrade() {
            inner.scheduler.borrow_mut().tasks.retain(|t| t.id != self.id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.host
            .upgrade()
            .map(|inner| inner.scheduler.borrow().tasks.iter().any(|t| t.id == self.id))
            .unwrap_or(false)
    }
}

impl Host {
    pub fn new() -> Self {
        Self::with_hash("")
    }

    /// Host whose location starts at `hash` (deep link)
    pub fn with_hash(hash: &str) -> Self {
        Host(Rc::new(HostInner {
            scheduler: RefCell::new(Scheduler {
                now: 0.0,
                next_id: 1,
                tasks: Vec::new(),
            }),
            history: RefCell::new(History {
                entries: vec![normalize_hash(hash)],
                index: 0,
            }),
            hash_listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            scroll_y: Cell::new(0),
            document: Document::new(),
        }))
    }

    pub fn document(&self) -> &Document {
        &self.0.document
    }

    // ========================================================================
    // CLOCK & SCHEDULING
    // ========================================================================

    pub fn now(&self) -> f64 {
        self.0.scheduler.borrow().now
    }

    pub fn set_timeout<F>(&self, delay_ms: f64, callback: F) -> TaskHandle
    where
        F: FnOnce() + 'static,
    {
        self.schedule(delay_ms.max(0.0), Callback::Timer(Box::new(callback)))
    }

    /// Run `callback` on the next frame with the frame timestamp
    pub fn request_animation_frame<F>(&self, callback: F) -> TaskHandle
    where
        F: FnOnce(f64) + 'static,
    {
        self.schedule(FRAME_MS, Callback::Frame(Box::new(callback)))
    }

    fn schedule(&self, delay_ms: f64, callback: Callback) -> TaskHandle {
        let mut sched = self.0.scheduler.borrow_mut();
        let id = sched.next_id;
        sched.next_id += 1;
        let due = sched.now + delay_ms;
        sched.tasks.push(Task { id, due, callback });

        TaskHandle {
            id,
            host: Rc::downgrade(&self.0),
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.0.scheduler.borrow().tasks.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.0
            .scheduler
            .borrow()
            .tasks
            .iter()
            .filter(|t| matches!(t.callback, Callback::Frame(_)))
            .count()
    }

    /// Move the clock forward by `ms`, running everything that falls due
    pub fn advance(&self, ms: f64) {
        let target = self.now() + ms.max(0.0);

        while let Some(task) = self.take_next_due(target) {
            let at = self.now();
            match task.callback {
                Callback::Timer(cb) => cb(),
                Callback::Frame(cb) => cb(at),
            }
        }

        self.0.scheduler.borrow_mut().now = target;
    }

    /// Advance until nothing is scheduled, giving up after `limit_ms`
    pub fn run_until_idle(&self, limit_ms: f64) {
        let deadline = self.now() + limit_ms;

        while self.now() < deadline {
            let next_due = {
                let sched = self.0.scheduler.borrow();
                sched.tasks.iter().map(|t| t.due).fold(None, |acc: Option<f64>, d| {
                    Some(acc.map_or(d, |a| a.min(d)))
                })
            };
            match next_due {
                Some(due) => self.advance((due - self.now()).max(0.0).min(deadline - self.now())),
                None => break,
            }
        }
    }

    fn take_next_due(&self, target: f64) -> Option<Task> {
        let mut sched = self.0.scheduler.borrow_mut();

        let mut best: Option<usize> = None;
        for (i, task) in sched.tasks.iter().enumerate() {
            if task.due > target {
                continue;
            }
            best = match best {
                Some(b) => {
                    let cur = &sched.tasks[b];
                    if (task.due, task.id) < (cur.due, cur.id) {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
                None => Some(i),
            };
        }

        let index = best?;
        let task = sched.tasks.remove(index);
        if task.due > sched.now {
            sched.now = task.due;
        }
        Some(task)
    }

    /// Fire `animationend` on `element` once `duration_ms` has elapsed
    pub fn play_animation(&self, element: &ElementRef, duration_ms: f64) -> TaskHandle {
        let element = element.clone();
        self.set_timeout(duration_ms, move || {
            element.dispatch("animationend");
        })
    }

    // ========================================================================
    // LOCATION & HISTORY
    // ========================================================================

    /// Current fragment without the leading `#`
    pub fn hash(&self) -> String {
        let history = self.0.history.borrow();
        history.entries[history.index].clone()
    }

    /// Push a new history entry; listeners hear about it on the next tick
    pub fn set_hash(&self, hash: &str) {
        let hash = normalize_hash(hash);
        {
            let mut history = self.0.history.borrow_mut();
            if history.entries[history.index] == hash {
                return;
            }
            let keep = history.index + 1;
            history.entries.truncate(keep);
            history.entries.push(hash);
            history.index += 1;
        }
        self.queue_hash_change();
    }

    /// Rewrite the current entry without notifying anyone
    pub fn replace_state(&self, hash: &str) {
        let mut history = self.0.history.borrow_mut();
        let index = history.index;
        history.entries[index] = normalize_hash(hash);
    }

    pub fn back(&self) -> bool {
        let moved = {
            let mut history = self.0.history.borrow_mut();
            if history.index == 0 {
                false
            } else {
                history.index -= 1;
                true
            }
        };
        if moved {
            self.queue_hash_change();
        }
        moved
    }

    pub fn forward(&self) -> bool {
        let moved = {
            let mut history = self.0.history.borrow_mut();
            if history.index + 1 >= history.entries.len() {
                false
            } else {
                history.index += 1;
                true
            }
        };
        if moved {
            self.queue_hash_change();
        }
        moved
    }

    pub fn history_len(&self) -> usize {
        self.0.history.borrow().entries.len()
    }

    pub fn on_hash_change<F>(&self, listener: F) -> u64
    where
        F: Fn() + 'static,
    {
        let id = self.0.next_listener.get();
        self.0.next_listener.set(id + 1);
        self.0
            .hash_listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn remove_hash_listener(&self, id: u64) {
        self.0.hash_listeners.borrow_mut().retain(|(l, _)| *l != id);
    }

    pub fn hash_listener_count(&self) -> usize {
        self.0.hash_listeners.borrow().len()
    }

    fn queue_hash_change(&self) {
        let host = self.clone();
        self.set_timeout(0.0, move || host.fire_hash_change());
    }

    fn fire_hash_change(&self) {
        debug!("hashchange → #{}", self.hash());
        let listeners: Vec<Rc<dyn Fn()>> = self
            .0
            .hash_listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    // ========================================================================
    // VIEWPORT
    // ========================================================================

    pub fn scroll_to(&self, y: u32) {
        self.0.scroll_y.set(y);
    }

    pub fn scroll_y(&self) -> u32 {
        self.0.scroll_y.get()
    }

    /// Drop every pending task, hash listener and mounted node
    ///
    /// Closures held by tasks and listeners keep clones of the host; this
    /// breaks those cycles so a finished session can be freed.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut self.0.scheduler.borrow_mut().tasks);
        let listeners = std::mem::take(&mut *self.0.hash_listeners.borrow_mut());
        let nodes = self.0.document.body().children();
        self.0.document.body().clear();
        drop((tasks, listeners, nodes));
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_hash(hash: &str) -> String {
    hash.strip_prefix('#').unwrap_or(hash).to_string()
}

// ============================================================================
// DEBOUNCE
// ============================================================================

/// Collapses bursts of calls into one, `delay_ms` after the last
pub struct Debouncer {
    host: Host,
    delay_ms: f64,
    pending: RefCell<Option<TaskHandle>>,
}

impl Debouncer {
    pub fn new(host: &Host, delay_ms: f64) -> Self {
        Self {
            host: host.clone(),
            delay_ms,
            pending: RefCell::new(None),
        }
    }

    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();
        let handle = self.host.set_timeout(self.delay_ms, callback);
        *self.pending.borrow_mut() = Some(handle);
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            handle.cancel();
        }
    }
}
