// Display formatting helpers

use crate::dom::ElementRef;
use crate::runtime::{Host, TaskHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Words kept lower-case inside a title
const SMALL_WORDS: [&str; 11] = ["of", "the", "and", "in", "for", "to", "at", "by", "a", "an", "or"];

/// Class added once a count-up lands on its target
pub const COUNTED_CLASS: &str = "apy-counted";

/// Convert ALL CAPS registry names to Title Case
///
/// The first word is always capitalized, even when it is a small word.
pub fn title_case(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 || !SMALL_WORDS.contains(&word) {
                capitalize(word)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper-case the first character only
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 1234567 → "1,234,567"
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// "4.50%" → 4.5; anything unparseable counts as zero
pub fn parse_apy(apy: &str) -> f64 {
    apy.replace('%', "").trim().parse().unwrap_or(0.0)
}

pub fn format_apy(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

// ============================================================================
// COUNT-UP ANIMATION
// ============================================================================

struct CountUp {
    host: Host,
    element: ElementRef,
    target: f64,
    duration_ms: f64,
    start: f64,
    frame: RefCell<Option<TaskHandle>>,
    cancelled: Cell<bool>,
    finished: Cell<bool>,
}

impl CountUp {
    fn schedule(this: &Rc<Self>) {
        let next = this.clone();
        let handle = this
            .host
            .request_animation_frame(move |now| CountUp::tick(&next, now));
        *this.frame.borrow_mut() = Some(handle);
    }

    fn tick(this: &Rc<Self>, now: f64) {
        if this.cancelled.get() {
            return;
        }

        let progress = if this.duration_ms <= 0.0 {
            1.0
        } else {
            ((now - this.start) / this.duration_ms).clamp(0.0, 1.0)
        };

        if progress < 1.0 {
            let shown = this.target * ease_out_cubic(progress);
            this.element.set_text(&format_apy(shown));
            CountUp::schedule(this);
        } else {
            this.element.set_text(&format_apy(this.target));
            this.element.add_class(COUNTED_CLASS);
            this.finished.set(true);
            this.frame.borrow_mut().take();
        }
    }
}

/// Cancellation handle returned by `count_up`
pub struct CountUpHandle(Rc<CountUp>);

impl CountUpHandle {
    /// Stop scheduling frames; safe to call repeatedly and after completion
    pub fn cancel(&self) {
        self.0.cancelled.set(true);
        if let Some(handle) = self.0.frame.borrow_mut().take() {
            handle.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.0.finished.get()
    }
}

/// Animate `element` from 0 to `target` percent with an ease-out-cubic curve
pub fn count_up(host: &Host, element: &ElementRef, target: f64, duration_ms: f64) -> CountUpHandle {
    let state = Rc::new(CountUp {
        host: host.clone(),
        element: element.clone(),
        target,
        duration_ms,
        start: host.now(),
        frame: RefCell::new(None),
        cancelled: Cell::new(false),
        finished: Cell::new(false),
    });
    CountUp::schedule(&state);
    CountUpHandle(state)
}
