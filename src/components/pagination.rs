// Pagination controls

use crate::dom::{el, text_el, Attr, ElementRef};
use std::rc::Rc;

/// Pages are shown in full up to this many
const FULL_RANGE_LIMIT: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

/// Compressed page list: first, last, current ± 1, ellipses across gaps
pub fn pagination_range(current: u32, total: u32) -> Vec<PageItem> {
    if total <= FULL_RANGE_LIMIT {
        return (1..=total).map(PageItem::Page).collect();
    }

    let mut pages = vec![PageItem::Page(1)];

    if current > 3 {
        pages.push(PageItem::Ellipsis);
    }

    let start = current.saturating_sub(1).max(2);
    let end = (current + 1).min(total - 1);
    pages.extend((start..=end).map(PageItem::Page));

    if current + 2 < total {
        pages.push(PageItem::Ellipsis);
    }

    pages.push(PageItem::Page(total));
    pages
}

fn page_button(label: &str, class: &str, disabled: bool, target: Option<u32>, on_page: &Rc<dyn Fn(u32)>) -> ElementRef {
    let mut attrs = vec![
        Attr::class(class),
        Attr::optional("disabled", disabled.then(|| "true".to_string())),
        Attr::text(label),
    ];
    if let Some(page) = target {
        let on_page = on_page.clone();
        attrs.push(Attr::on("onClick", move |_| on_page(page)));
    }
    el("button", attrs, vec![])
}

pub fn create_pagination(
    current: u32,
    total_pages: u32,
    total_rows: i64,
    on_page: Rc<dyn Fn(u32)>,
) -> ElementRef {
    let info = text_el("span", "pagination__info", format!("{} results", total_rows));

    if total_pages <= 1 {
        return el("div", vec![Attr::class("pagination")], vec![info.into()]);
    }

    let mut items = Vec::new();

    let prev = (current > 1).then(|| current - 1);
    items.push(page_button("←", "pagination__btn", prev.is_none(), prev, &on_page));

    for item in pagination_range(current, total_pages) {
        items.push(match item {
            PageItem::Ellipsis => text_el("span", "pagination__info", "…"),
            PageItem::Page(p) => {
                let class = if p == current {
                    "pagination__btn pagination__btn--active"
                } else {
                    "pagination__btn"
                };
                page_button(&p.to_string(), class, false, Some(p), &on_page)
            }
        });
    }

    let next = (current < total_pages).then(|| current + 1);
    items.push(page_button("→", "pagination__btn", next.is_none(), next, &on_page));
    items.push(info);

    el(
        "div",
        vec![Attr::class("pagination")],
        items.into_iter().map(Into::into).collect(),
    )
}
