// Institution detail: website, savings product and membership sections

use crate::children;
use crate::components::pill::eligibility_pill;
use crate::dom::{el, mount, text_el, Attr, Child, ElementRef};
use crate::format::title_case;
use crate::models::{institution_profile, MembershipInfo, SavingsProduct};
use crate::pages::PageContext;
use crate::router::{Cleanup, Params};
use anyhow::Context;

fn external_link(url: &str, label: &str) -> ElementRef {
    el(
        "a",
        vec![
            Attr::class("ext-link"),
            Attr::attr("href", url),
            Attr::attr("target", "_blank"),
            Attr::attr("rel", "noopener"),
            Attr::text(label),
        ],
        vec![],
    )
}

fn section(delay_ms: u32, title: &str, body: Vec<Child>) -> ElementRef {
    let mut nodes = children![text_el("div", "detail-section__title", title)];
    nodes.extend(body);
    el(
        "div",
        vec![
            Attr::class("detail-section reveal"),
            Attr::style([("animation-delay", format!("{}ms", delay_ms))]),
        ],
        nodes,
    )
}

fn empty_state(delay_ms: u32, message: &str) -> ElementRef {
    el(
        "div",
        vec![
            Attr::class("empty-state reveal"),
            Attr::style([("animation-delay", format!("{}ms", delay_ms))]),
            Attr::text(message),
        ],
        vec![],
    )
}

fn detail_row(label: &str, value: Option<&str>, mono: bool) -> ElementRef {
    let value_class = if mono {
        "detail-section__value mono"
    } else {
        "detail-section__value"
    };
    el(
        "div",
        vec![Attr::class("detail-section__row")],
        children![
            text_el("span", "detail-section__label", label),
            text_el("span", value_class, value.unwrap_or_default()),
        ],
    )
}

fn savings_section(product: &SavingsProduct) -> ElementRef {
    let link = product.url.as_deref().map(|url| {
        el(
            "div",
            vec![Attr::style([("margin-top", "1rem")])],
            children![external_link(url, "View product page →")],
        )
    });

    section(
        150,
        "High-Yield Savings Account",
        children![
            text_el("div", "detail-section__apy mono", product.apy.as_str()),
            detail_row("Product", product.product.as_deref(), false),
            detail_row("Min Balance", product.min_balance.as_deref(), true),
            detail_row("Max Balance", product.max_balance.as_deref(), true),
            detail_row("Last Updated", product.last_updated.as_deref(), true),
            link,
        ],
    )
}

fn membership_section(membership: &MembershipInfo) -> ElementRef {
    let pill = el(
        "div",
        vec![Attr::style([("margin-bottom", "0.75rem")])],
        children![eligibility_pill(membership.eligibility)],
    );
    let field = membership
        .field
        .as_deref()
        .map(|text| text_el("div", "detail-membership-text", text));
    let link = membership.url.as_deref().map(|url| {
        el(
            "div",
            vec![Attr::style([("margin-top", "1rem")])],
            children![external_link(url, "Membership info →")],
        )
    });
    let notes = membership.notes.as_deref().map(|notes| {
        el(
            "div",
            vec![
                Attr::class("text-sm text-muted"),
                Attr::style([("margin-top", "0.75rem"), ("font-style", "italic")]),
                Attr::text(notes),
            ],
            vec![],
        )
    });

    section(200, "Membership", children![pill, field, link, notes])
}

pub fn render(ctx: &PageContext, container: &ElementRef, params: &Params) -> anyhow::Result<Option<Cleanup>> {
    let charter = params
        .get("charter_number")
        .or_else(|| params.get("id"))
        .map(String::as_str)
        .unwrap_or_default();

    let back = el(
        "a",
        vec![
            Attr::class("detail-back"),
            Attr::attr("href", "#/browse"),
            Attr::text("← Back to Browse"),
        ],
        vec![],
    );

    let profile = institution_profile(&ctx.db, charter)
        .with_context(|| format!("loading charter #{}", charter))?;

    let profile = match profile {
        Some(profile) => profile,
        None => {
            let missing = el(
                "div",
                vec![Attr::class("not-found"), Attr::style([("margin-top", "4rem")])],
                children![
                    text_el("div", "not-found__code", "?"),
                    text_el(
                        "div",
                        "not-found__message",
                        format!("No credit union found with charter #{}", charter),
                    ),
                ],
            );
            let wrap = el("div", vec![Attr::class("container")], children![back, missing]);
            mount(container, children![wrap]);
            return Ok(None);
        }
    };

    let institution = &profile.institution;
    let header = el(
        "div",
        vec![Attr::class("detail-header reveal")],
        children![
            text_el("div", "detail-charter mono", format!("CHARTER #{}", institution.charter_number)),
            text_el("h1", "detail-name", title_case(&institution.name)),
            text_el(
                "div",
                "detail-location",
                format!(
                    "{}, {}",
                    title_case(institution.city.as_deref().unwrap_or_default()),
                    institution.state.as_deref().unwrap_or_default()
                ),
            ),
        ],
    );

    let website = profile
        .web_presence
        .as_ref()
        .and_then(|w| w.url.as_deref())
        .map(|url| section(100, "Website", children![external_link(url, url)]))
        .unwrap_or_else(|| empty_state(100, "No website data available"));

    let savings = profile
        .savings_product
        .as_ref()
        .map(savings_section)
        .unwrap_or_else(|| empty_state(150, "No HYSA data available"));

    let membership = profile
        .membership
        .as_ref()
        .map(membership_section)
        .unwrap_or_else(|| empty_state(200, "No membership data available"));

    let grid = el(
        "div",
        vec![Attr::class("detail-grid")],
        children![
            el("div", vec![Attr::class("flex flex-col gap-6")], children![website, membership]),
            el("div", vec![Attr::class("flex flex-col gap-6")], children![savings]),
        ],
    );

    let wrap = el("div", vec![Attr::class("container")], children![back, header, grid]);
    mount(container, children![wrap]);

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_database;
    use crate::runtime::Host;
    use std::rc::Rc;

    fn open(pairs: &[(&str, &str)]) -> ElementRef {
        let host = Host::new();
        let ctx = PageContext::new(&host, Rc::new(sample_database()));
        let app = host.document().app();
        let params: Params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(render(&ctx, &app, &params).unwrap().is_none());
        app
    }

    fn texts(app: &ElementRef, class: &str) -> Vec<String> {
        app.find_by_class(class).iter().map(|e| e.text_content()).collect()
    }

    #[test]
    fn test_full_profile() {
        let app = open(&[("charter_number", "2")]);

        assert_eq!(texts(&app, "detail-charter"), vec!["CHARTER #2"]);
        assert_eq!(texts(&app, "detail-name"), vec!["Golden 1 Credit Union"]);
        assert_eq!(texts(&app, "detail-location"), vec!["Sacramento, CA"]);
        assert_eq!(texts(&app, "detail-section__apy"), vec!["4.25%"]);
        assert_eq!(texts(&app, "pill--open"), vec!["Open"]);
        assert_eq!(
            texts(&app, "detail-section__title"),
            vec!["Website", "Membership", "High-Yield Savings Account"]
        );
        assert!(app.find_by_class("empty-state").is_empty());
    }

    #[test]
    fn test_missing_sections_get_placeholders() {
        let app = open(&[("charter_number", "6")]);

        assert_eq!(
            texts(&app, "empty-state"),
            vec![
                "No website data available",
                "No membership data available",
                "No HYSA data available",
            ]
        );
    }

    #[test]
    fn test_id_parameter_is_accepted() {
        let app = open(&[("id", "3")]);
        assert_eq!(texts(&app, "detail-charter"), vec!["CHARTER #3"]);
    }

    #[test]
    fn test_unknown_charter_is_in_page_not_found() {
        let app = open(&[("charter_number", "99999")]);

        assert_eq!(texts(&app, "not-found__code"), vec!["?"]);
        assert_eq!(
            texts(&app, "not-found__message"),
            vec!["No credit union found with charter #99999"]
        );
        assert_eq!(texts(&app, "detail-back"), vec!["← Back to Browse"]);
    }

    #[test]
    fn test_markup_in_charter_stays_text() {
        let app = open(&[("charter_number", "<b>1</b>")]);
        assert!(app.to_html().contains("charter #&lt;b&gt;1&lt;/b&gt;"));
        assert!(app.find_by_tag("b").is_empty());
    }
}
