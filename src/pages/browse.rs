// Browse: filterable, sortable, paginated listing of every institution
//
// Count and data queries come from the same pure builder so the totals and
// the visible rows can never disagree. The location is replaced, never
// pushed, on every change so filter tweaks do not pile up in history.

use crate::children;
use crate::components::pagination::create_pagination;
use crate::components::search::{EligibilityFilter, Filters, SearchBar};
use crate::components::table::{create_mobile_cards, create_table, Sort, SortColumn, SortDirection};
use crate::db::Value;
use crate::dom::{el, mount, text_el, Attr, ElementRef};
use crate::format::format_number;
use crate::models::BrowseRow;
use crate::pages::PageContext;
use crate::router::{encode_query, Cleanup, Params};
use anyhow::Context;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::debug;

pub const PAGE_SIZE: i64 = 50;

const STATES_CACHE_KEY: &str = "browse:states";

// ============================================================================
// QUERY BUILDING
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Build the listing query (or its `COUNT(*) AS count` twin)
///
/// Filter values are always bound; the only interpolated identifiers come
/// from the `SortColumn` whitelist.
pub fn build_query(filters: &Filters, sort: Sort, page: u32, count_only: bool) -> BuiltQuery {
    let select = if count_only {
        "SELECT COUNT(*) AS count"
    } else {
        "SELECT n.charter_number, n.name, n.city, n.state,
                (w.url IS NOT NULL) AS has_website,
                (m.charter_number IS NOT NULL) AS has_membership,
                (h.charter_number IS NOT NULL) AS has_hysa"
    };

    let mut sql = format!(
        "{}
        FROM institutions n
        LEFT JOIN web_presence w ON n.charter_number = w.charter_number
        LEFT JOIN membership m ON n.charter_number = m.charter_number
        LEFT JOIN (SELECT DISTINCT charter_number FROM savings_products) h
            ON n.charter_number = h.charter_number",
        select
    );

    let mut conditions: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !filters.q.is_empty() {
        conditions.push("(n.name LIKE ? OR CAST(n.charter_number AS TEXT) LIKE ?)");
        let pattern = format!("%{}%", filters.q);
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern));
    }

    if !filters.state.is_empty() {
        conditions.push("n.state = ?");
        params.push(Value::Text(filters.state.clone()));
    }

    if let EligibilityFilter::Only(eligibility) = filters.eligibility {
        conditions.push("m.eligibility = ?");
        params.push(Value::from(eligibility.as_str()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    if !count_only {
        let offset = (page.max(1) as i64 - 1) * PAGE_SIZE;
        sql.push_str(&format!(
            " ORDER BY {} {} LIMIT {} OFFSET {}",
            sort.column.order_expr(),
            sort.direction.sql(),
            PAGE_SIZE,
            offset
        ));
    }

    BuiltQuery { sql, params }
}

/// `/browse?…` for the given state; defaults are left out
pub fn browse_hash(filters: &Filters, sort: Sort, page: u32) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if !filters.q.is_empty() {
        pairs.push(("q", filters.q.clone()));
    }
    if !filters.state.is_empty() {
        pairs.push(("state", filters.state.clone()));
    }
    if filters.eligibility != EligibilityFilter::All {
        pairs.push(("eligibility", filters.eligibility.as_str().to_string()));
    }
    if page > 1 {
        pairs.push(("page", page.to_string()));
    }
    if sort.column != SortColumn::default() {
        pairs.push(("sort", sort.column.key().to_string()));
    }
    if sort.direction == SortDirection::Desc {
        pairs.push(("dir", sort.direction.as_str().to_string()));
    }

    let qs = encode_query(&pairs);
    if qs.is_empty() {
        "/browse".to_string()
    } else {
        format!("/browse?{}", qs)
    }
}

/// Filters, sort and page requested by the route parameters
pub fn initial_state(params: &Params) -> (Filters, Sort, u32) {
    let get = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

    let filters = Filters {
        q: get("q").trim().to_string(),
        state: get("state").to_string(),
        eligibility: EligibilityFilter::parse(get("eligibility")),
    };
    let sort = Sort {
        column: SortColumn::parse(get("sort")),
        direction: SortDirection::parse(get("dir")),
    };
    let page = get("page").parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1);

    (filters, sort, page)
}

// ============================================================================
// PAGE
// ============================================================================

struct BrowsePage {
    ctx: PageContext,
    page: Cell<u32>,
    sort: Cell<Sort>,
    search: SearchBar,
    results_info: ElementRef,
    table_wrap: ElementRef,
    cards_wrap: ElementRef,
    pagination_wrap: ElementRef,
}

impl BrowsePage {
    fn on_filter(self: &Rc<Self>, filters: Filters) {
        self.page.set(1);
        self.refresh(&filters);
    }

    fn on_sort(self: &Rc<Self>, column: SortColumn) {
        self.sort.set(self.sort.get().toggled(column));
        self.refresh(&self.search.filters());
    }

    fn on_page(self: &Rc<Self>, page: u32) {
        self.page.set(page);
        self.refresh(&self.search.filters());
        self.ctx.host.scroll_to(0);
    }

    /// Event-time re-render; failures go to the app's error hook
    fn refresh(self: &Rc<Self>, filters: &Filters) {
        if let Err(err) = self.render_results(filters) {
            self.ctx.report(&err);
        }
    }

    fn render_results(self: &Rc<Self>, filters: &Filters) -> anyhow::Result<()> {
        let db = &self.ctx.db;
        let sort = self.sort.get();

        let count = build_query(filters, sort, self.page.get(), true);
        let total = db
            .scalar_count(&count.sql, &count.params)
            .context("counting browse results")?;
        let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE) as u32;

        if total_pages > 0 && self.page.get() > total_pages {
            self.page.set(total_pages);
        }
        let page = self.page.get();

        let data = build_query(filters, sort, page, false);
        let rows: Vec<BrowseRow> = db
            .query(&data.sql, &data.params)
            .context("loading browse page")?
            .iter()
            .map(BrowseRow::from_row)
            .collect();
        debug!("browse: page {} of {}, {} rows of {}", page, total_pages, rows.len(), total);

        let start = (page as i64 - 1) * PAGE_SIZE + 1;
        let end = (page as i64 * PAGE_SIZE).min(total);
        let info = if total > 0 {
            format!("Showing {}–{} of {}", format_number(start), format_number(end), format_number(total))
        } else {
            "No results found".to_string()
        };
        let info = if filters.eligibility != EligibilityFilter::All {
            let covered = db.scalar_count("SELECT COUNT(*) AS count FROM membership", &[])?;
            format!(
                "{} (filtering by membership data: {} CUs have eligibility info)",
                info,
                format_number(covered)
            )
        } else {
            info
        };
        self.results_info.set_text(&info);

        let weak = Rc::downgrade(self);
        self.table_wrap.clear();
        self.table_wrap.append_child(&create_table(
            &self.ctx.host,
            &rows,
            sort,
            Rc::new(move |column: SortColumn| {
                if let Some(page) = weak.upgrade() {
                    page.on_sort(column);
                }
            }),
        ));

        self.cards_wrap.clear();
        self.cards_wrap
            .append_child(&create_mobile_cards(&self.ctx.host, &rows));

        let weak = Rc::downgrade(self);
        self.pagination_wrap.clear();
        self.pagination_wrap.append_child(&create_pagination(
            page,
            total_pages,
            total,
            Rc::new(move |p: u32| {
                if let Some(page) = weak.upgrade() {
                    page.on_page(p);
                }
            }),
        ));

        self.ctx
            .host
            .replace_state(&browse_hash(filters, sort, page));
        Ok(())
    }
}

pub fn render(ctx: &PageContext, container: &ElementRef, params: &Params) -> anyhow::Result<Option<Cleanup>> {
    let (initial, sort, page) = initial_state(params);

    let states: Vec<String> = ctx
        .db
        .cached_query(
            STATES_CACHE_KEY,
            "SELECT DISTINCT state FROM institutions WHERE state IS NOT NULL ORDER BY state",
            &[],
        )
        .context("loading state list")?
        .iter()
        .map(|row| row.text_or_empty("state"))
        .collect();

    let browse = Rc::new_cyclic(|weak: &Weak<BrowsePage>| {
        let weak = weak.clone();
        let search = SearchBar::new(
            &ctx.host,
            &states,
            &initial,
            Rc::new(move |filters: Filters| {
                if let Some(page) = weak.upgrade() {
                    page.on_filter(filters);
                }
            }),
        );

        BrowsePage {
            ctx: ctx.clone(),
            page: Cell::new(page),
            sort: Cell::new(sort),
            search,
            results_info: el("div", vec![Attr::class("browse-results-info")], vec![]),
            table_wrap: el("div", vec![Attr::class("browse-table-wrap")], vec![]),
            cards_wrap: el("div", vec![], vec![]),
            pagination_wrap: el("div", vec![], vec![]),
        }
    });

    let header = el(
        "div",
        vec![Attr::class("browse-header reveal")],
        children![text_el("h1", "browse-header__title", "Browse Credit Unions")],
    );
    let wrap = el(
        "div",
        vec![Attr::class("container")],
        children![
            header,
            &browse.search.element,
            &browse.results_info,
            &browse.table_wrap,
            &browse.cards_wrap,
            &browse.pagination_wrap,
        ],
    );
    mount(container, children![wrap]);

    browse.render_results(&browse.search.filters())?;

    Ok(Some(Cleanup::new(move || browse.search.cancel_pending())))
}
