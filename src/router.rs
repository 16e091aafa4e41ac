// Hash-fragment router
//
// Owns the one mutable "current page" slot: the cleanup returned by the
// mounted handler. Navigation runs the previous cleanup, plays the exit
// transition on a host timer, clears the mount point and hands it to the
// next handler.

use crate::dom::{ElementRef, Event};
use crate::runtime::{Host, TaskHandle, HOME_ROUTE};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error};

/// Delay between the exit class going on and the mount point clearing
pub const EXIT_DELAY_MS: f64 = 150.0;
/// Length of the enter animation; `animationend` fires after it
pub const ENTER_ANIMATION_MS: f64 = 300.0;

pub const EXIT_CLASS: &str = "page-exit";
pub const ENTER_CLASS: &str = "page-enter";
pub const CATCH_ALL: &str = "*";

/// Merged path and query parameters handed to a page
pub type Params = BTreeMap<String, String>;

/// Teardown returned by a page; may be run any number of times
#[derive(Clone)]
pub struct Cleanup(Rc<dyn Fn()>);

impl Cleanup {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Cleanup(Rc::new(f))
    }

    pub fn run(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

pub type RouteHandler = Rc<dyn Fn(&ElementRef, &Params) -> anyhow::Result<Option<Cleanup>>>;
pub type ErrorHook = Rc<dyn Fn(&anyhow::Error)>;

// ============================================================================
// PATTERNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// `/browse`, `/detail/:charter_number` or the catch-all `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    CatchAll,
    Path { raw: String, segments: Vec<Segment> },
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == CATCH_ALL {
            return RoutePattern::CatchAll;
        }

        let segments = pattern
            .split('/')
            .map(|part| match part.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(part.to_string()),
            })
            .collect();

        RoutePattern::Path {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            RoutePattern::CatchAll => CATCH_ALL,
            RoutePattern::Path { raw, .. } => raw,
        }
    }

    pub fn is_literal(&self) -> bool {
        match self {
            RoutePattern::CatchAll => false,
            RoutePattern::Path { segments, .. } => {
                segments.iter().all(|s| matches!(s, Segment::Literal(_)))
            }
        }
    }

    /// Bind parameters when segment counts agree and every literal matches
    pub fn matches(&self, path: &str) -> Option<Params> {
        let segments = match self {
            RoutePattern::CatchAll => return None,
            RoutePattern::Path { segments, .. } => segments,
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in segments.iter().zip(parts) {
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
            }
        }
        Some(params)
    }
}

// ============================================================================
// FRAGMENT PARSING
// ============================================================================

/// Split a fragment into path and decoded query pairs
///
/// An empty fragment means the home route.
pub fn parse_hash(raw: &str) -> (String, Vec<(String, String)>) {
    let hash = raw.strip_prefix('#').unwrap_or(raw);
    let hash = if hash.is_empty() { HOME_ROUTE } else { hash };

    match hash.split_once('?') {
        Some((path, qs)) => (path.to_string(), parse_query(qs)),
        None => (hash.to_string(), Vec::new()),
    }
}

pub fn parse_query(qs: &str) -> Vec<(String, String)> {
    qs.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}

/// `[("q", "golden 1")]` → `q=golden%201`
pub fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// ROUTER
// ============================================================================

struct RouteEntry {
    pattern: RoutePattern,
    handler: RouteHandler,
}

enum Resolved {
    Route(RouteHandler, Params),
    CatchAll(RouteHandler),
    Nothing,
}

struct RouterState {
    routes: Vec<RouteEntry>,
    catch_all: Option<RouteHandler>,
    cleanup: Option<Cleanup>,
    pending: Option<TaskHandle>,
    /// `animationend` timer of the page currently entering
    entering: Option<TaskHandle>,
    generation: u64,
    on_error: Option<ErrorHook>,
    listener: Option<u64>,
}

#[derive(Clone)]
pub struct Router {
    host: Host,
    mount: ElementRef,
    state: Rc<RefCell<RouterState>>,
}

impl Router {
    pub fn new(host: &Host, mount: &ElementRef) -> Self {
        Self {
            host: host.clone(),
            mount: mount.clone(),
            state: Rc::new(RefCell::new(RouterState {
                routes: Vec::new(),
                catch_all: None,
                cleanup: None,
                pending: None,
                entering: None,
                generation: 0,
                on_error: None,
                listener: None,
            })),
        }
    }

    /// Register `handler` for `pattern`; registering a pattern twice replaces it
    pub fn register<F>(&self, pattern: &str, handler: F)
    where
        F: Fn(&ElementRef, &Params) -> anyhow::Result<Option<Cleanup>> + 'static,
    {
        let handler: RouteHandler = Rc::new(handler);
        let pattern = RoutePattern::parse(pattern);
        let mut state = self.state.borrow_mut();

        if pattern == RoutePattern::CatchAll {
            state.catch_all = Some(handler);
            return;
        }

        match state.routes.iter_mut().find(|r| r.pattern == pattern) {
            Some(entry) => entry.handler = handler,
            None => state.routes.push(RouteEntry { pattern, handler }),
        }
    }

    /// Where handler failures go; the app installs its failure screen here
    pub fn set_error_handler<F>(&self, hook: F)
    where
        F: Fn(&anyhow::Error) + 'static,
    {
        self.state.borrow_mut().on_error = Some(Rc::new(hook));
    }

    /// A hook pages call for failures raised after their initial render
    ///
    /// Resolves the installed error handler at call time and does nothing
    /// once the router is gone.
    pub fn error_reporter(&self) -> ErrorHook {
        let state: Weak<RefCell<RouterState>> = Rc::downgrade(&self.state);
        Rc::new(move |err: &anyhow::Error| {
            let Some(state) = state.upgrade() else {
                return;
            };
            error!("page event failed: {:#}", err);
            let hook = state.borrow().on_error.clone();
            if let Some(hook) = hook {
                hook(err);
            }
        })
    }

    /// Listen for fragment changes and route the current location once
    pub fn start(&self) {
        if self.state.borrow().listener.is_none() {
            let router = self.clone();
            let id = self.host.on_hash_change(move || router.handle_route());
            self.state.borrow_mut().listener = Some(id);
        }
        self.handle_route();
    }

    pub fn stop(&self) {
        if let Some(id) = self.state.borrow_mut().listener.take() {
            self.host.remove_hash_listener(id);
        }
        if let Some(pending) = self.state.borrow_mut().pending.take() {
            pending.cancel();
        }
        self.cancel_enter();
        let cleanup = self.state.borrow_mut().cleanup.take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }

    pub fn navigate(&self, hash: &str) {
        self.host.set_hash(hash);
    }

    /// Resolve a path to its handler and path parameters
    fn resolve(&self, path: &str) -> Resolved {
        let state = self.state.borrow();

        if let Some(entry) = state
            .routes
            .iter()
            .find(|r| r.pattern.is_literal() && r.pattern.raw() == path)
        {
            return Resolved::Route(entry.handler.clone(), Params::new());
        }

        for entry in &state.routes {
            if let Some(params) = entry.pattern.matches(path) {
                return Resolved::Route(entry.handler.clone(), params);
            }
        }

        match &state.catch_all {
            Some(handler) => Resolved::CatchAll(handler.clone()),
            None => Resolved::Nothing,
        }
    }

    /// Effective parameters for a fragment, without navigating
    pub fn params_for(&self, hash: &str) -> Option<Params> {
        let (path, query) = parse_hash(hash);
        match self.resolve(&path) {
            Resolved::Route(_, mut params) => {
                params.extend(query);
                Some(params)
            }
            Resolved::CatchAll(_) => Some(Params::new()),
            Resolved::Nothing => None,
        }
    }

    /// Route the current location
    ///
    /// A navigation that arrives while a previous transition is still in its
    /// exit delay interrupts it: the pending timer is cancelled and the
    /// generation bump makes any straggler a no-op.
    pub fn handle_route(&self) {
        let raw = self.host.hash();
        let (path, query) = parse_hash(&raw);
        let resolved = self.resolve(&path);
        debug!("route → {}", path);

        let (previous, generation) = {
            let mut state = self.state.borrow_mut();
            if let Some(pending) = state.pending.take() {
                debug!("interrupting pending transition");
                pending.cancel();
            }
            state.generation += 1;
            (state.cleanup.take(), state.generation)
        };
        self.cancel_enter();

        if let Some(cleanup) = previous {
            cleanup.run();
        }

        self.mount.add_class(EXIT_CLASS);

        let router = self.clone();
        let handle = self.host.set_timeout(EXIT_DELAY_MS, move || {
            router.finish_transition(generation, resolved, query);
        });
        self.state.borrow_mut().pending = Some(handle);
    }

    fn finish_transition(&self, generation: u64, resolved: Resolved, query: Vec<(String, String)>) {
        {
            let mut state = self.state.borrow_mut();
            if state.generation != generation {
                return;
            }
            state.pending = None;
        }

        self.mount.clear();
        self.mount.remove_class(EXIT_CLASS);

        let outcome = match resolved {
            Resolved::Route(handler, mut params) => {
                // Query values win over path values
                params.extend(query);
                Some(handler(&self.mount, &params))
            }
            Resolved::CatchAll(handler) => Some(handler(&self.mount, &Params::new())),
            Resolved::Nothing => None,
        };

        match outcome {
            Some(Ok(cleanup)) => self.state.borrow_mut().cleanup = cleanup,
            Some(Err(err)) => self.report(&err),
            None => debug!("no route matched and no catch-all registered"),
        }

        self.mount.add_class(ENTER_CLASS);
        self.mount.add_listener_once(
            "animationend",
            Rc::new(|e: &Event| e.target().remove_class(ENTER_CLASS)),
        );
        let entering = self.host.play_animation(&self.mount, ENTER_ANIMATION_MS);
        self.state.borrow_mut().entering = Some(entering);
        self.host.scroll_to(0);
    }

    /// Drop an unfinished enter animation along with its class
    fn cancel_enter(&self) {
        let entering = self.state.borrow_mut().entering.take();
        if let Some(entering) = entering {
            entering.cancel();
            self.mount.remove_class(ENTER_CLASS);
        }
    }

    fn report(&self, err: &anyhow::Error) {
        error!("page failed to render: {:#}", err);
        let hook = self.state.borrow().on_error.clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }

    pub fn has_cleanup(&self) -> bool {
        self.state.borrow().cleanup.is_some()
    }

    pub fn is_transitioning(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    pub fn is_entering(&self) -> bool {
        self.state
            .borrow()
            .entering
            .as_ref()
            .map_or(false, TaskHandle::is_pending)
    }
}
