// Search and filter bar for the browse page

use crate::children;
use crate::components::pill::filter_pill;
use crate::dom::{el, text_el, Attr, Child, ElementRef, Event, WeakElementRef};
use crate::models::Eligibility;
use crate::runtime::{Debouncer, Host};
use std::rc::Rc;

pub const SEARCH_DEBOUNCE_MS: f64 = 250.0;

const ELIGIBILITY_OPTIONS: [&str; 3] = ["all", "open", "limited"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EligibilityFilter {
    #[default]
    All,
    Only(Eligibility),
}

impl EligibilityFilter {
    /// Anything other than `open`/`limited` means no restriction
    pub fn parse(s: &str) -> Self {
        match Eligibility::parse(s) {
            Some(e) => EligibilityFilter::Only(e),
            None => EligibilityFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityFilter::All => "all",
            EligibilityFilter::Only(e) => e.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filters {
    /// Trimmed free-text search
    pub q: String,
    /// Exact state code; empty means all states
    pub state: String,
    pub eligibility: EligibilityFilter,
}

/// Weak handles to the inputs, so listeners never own their own subtree
#[derive(Clone)]
struct FilterInputs {
    search: WeakElementRef,
    state: WeakElementRef,
    pills: Vec<WeakElementRef>,
}

impl FilterInputs {
    fn read(&self) -> Filters {
        let q = self
            .search
            .upgrade()
            .map(|input| input.value().trim().to_string())
            .unwrap_or_default();
        let state = self
            .state
            .upgrade()
            .map(|select| select.value())
            .unwrap_or_default();
        let eligibility = self
            .pills
            .iter()
            .filter_map(WeakElementRef::upgrade)
            .find(|pill| pill.has_class("pill--active"))
            .and_then(|pill| pill.data("eligibility"))
            .map(|value| EligibilityFilter::parse(&value))
            .unwrap_or_default();

        Filters { q, state, eligibility }
    }

    fn activate(&self, chosen: &ElementRef) {
        for pill in self.pills.iter().filter_map(WeakElementRef::upgrade) {
            pill.toggle_class("pill--active", pill.ptr_eq(chosen));
        }
    }
}

pub struct SearchBar {
    pub element: ElementRef,
    inputs: FilterInputs,
    debouncer: Rc<Debouncer>,
}

impl SearchBar {
    /// `states` fills the dropdown; `on_filter` hears every filter change
    pub fn new(host: &Host, states: &[String], initial: &Filters, on_filter: Rc<dyn Fn(Filters)>) -> Self {
        let search_input = el(
            "input",
            vec![
                Attr::class("search-input"),
                Attr::attr("type", "text"),
                Attr::attr("placeholder", "Search credit unions by name or charter #..."),
                Attr::attr("value", initial.q.as_str()),
            ],
            vec![],
        );

        let search_wrap = el(
            "div",
            vec![Attr::class("search-wrap")],
            children![text_el("span", "search-wrap__icon", "⌕"), &search_input],
        );

        let mut options: Vec<Child> = vec![el(
            "option",
            vec![Attr::attr("value", ""), Attr::text("All States")],
            vec![],
        )
        .into()];
        for state in states {
            options.push(
                el(
                    "option",
                    vec![
                        Attr::attr("value", state.as_str()),
                        Attr::optional("selected", (*state == initial.state).then(|| "true".to_string())),
                        Attr::text(state.as_str()),
                    ],
                    vec![],
                )
                .into(),
            );
        }
        let known_state = states.iter().any(|s| *s == initial.state);
        let state_select = el(
            "select",
            vec![
                Attr::class("select"),
                Attr::attr("value", if known_state { initial.state.as_str() } else { "" }),
            ],
            options,
        );

        let pills: Vec<ElementRef> = ELIGIBILITY_OPTIONS
            .iter()
            .map(|opt| filter_pill(opt, *opt == initial.eligibility.as_str()))
            .collect();

        let inputs = FilterInputs {
            search: search_input.downgrade(),
            state: state_select.downgrade(),
            pills: pills.iter().map(ElementRef::downgrade).collect(),
        };

        let mut eligibility_children: Vec<Child> = vec![el(
            "span",
            vec![
                Attr::class("text-xs text-muted"),
                Attr::style([("margin-right", "0.25rem")]),
                Attr::text("Eligibility:"),
            ],
            vec![],
        )
        .into()];
        for pill in &pills {
            let (inputs, on_filter) = (inputs.clone(), on_filter.clone());
            pill.add_listener(
                "click",
                Rc::new(move |event: &Event| {
                    inputs.activate(event.target());
                    on_filter(inputs.read());
                }),
            );
            eligibility_children.push(pill.into());
        }

        let debouncer = Rc::new(Debouncer::new(host, SEARCH_DEBOUNCE_MS));
        {
            let (inputs, on_filter, debouncer) = (inputs.clone(), on_filter.clone(), debouncer.clone());
            search_input.add_listener(
                "input",
                Rc::new(move |_: &Event| {
                    let (inputs, on_filter) = (inputs.clone(), on_filter.clone());
                    debouncer.call(move || on_filter(inputs.read()));
                }),
            );
        }
        {
            let (inputs, on_filter) = (inputs.clone(), on_filter.clone());
            state_select.add_listener("change", Rc::new(move |_: &Event| on_filter(inputs.read())));
        }

        let element = el(
            "div",
            vec![Attr::class("browse-filters")],
            children![
                search_wrap,
                state_select,
                el("div", vec![Attr::class("browse-eligibility")], eligibility_children),
            ],
        );

        Self {
            element,
            inputs,
            debouncer,
        }
    }

    /// Current filter values as shown in the controls
    pub fn filters(&self) -> Filters {
        self.inputs.read()
    }

    /// Drop a search that is still waiting out the debounce
    pub fn cancel_pending(&self) {
        self.debouncer.cancel();
    }
}
