// HYSA dashboard: hero, stats strip and the APY leaderboard

use crate::children;
use crate::components::card::hysa_card;
use crate::dom::{el, mount, text_el, Attr, Child, ElementRef};
use crate::format::format_number;
use crate::models::ranked_products;
use crate::pages::PageContext;
use crate::router::{Cleanup, Params};
use anyhow::Context;
use tracing::debug;

fn stat(value: String, label: &str) -> ElementRef {
    el(
        "div",
        vec![Attr::class("stats-strip__item")],
        children![
            text_el("span", "stats-strip__value", value),
            text_el("span", "stats-strip__label", label),
        ],
    )
}

pub fn render(ctx: &PageContext, container: &ElementRef, _params: &Params) -> anyhow::Result<Option<Cleanup>> {
    let db = &ctx.db;

    let products = ranked_products(db).context("loading savings products")?;
    let institutions = db.scalar_count("SELECT COUNT(*) AS count FROM institutions", &[])?;
    let states = db.scalar_count("SELECT COUNT(DISTINCT state) AS count FROM institutions", &[])?;
    debug!("dashboard: {} products across {} institutions", products.len(), institutions);

    let last_updated = products
        .first()
        .and_then(|top| top.savings.last_updated.clone())
        .unwrap_or_else(|| "N/A".to_string());

    let hero = el(
        "div",
        vec![Attr::class("hysa-hero reveal")],
        children![
            text_el("h1", "hysa-hero__title", "High-Yield Savings Rates"),
            text_el(
                "p",
                "hysa-hero__subtitle",
                "Credit union HYSA products ranked by annual percentage yield.",
            ),
            text_el("div", "hysa-hero__updated", format!("Last updated {}", last_updated)),
        ],
    );

    let stats = el(
        "div",
        vec![
            Attr::class("stats-strip reveal"),
            Attr::style([("animation-delay", "100ms")]),
        ],
        children![
            stat(format_number(institutions), "Credit Unions Tracked"),
            stat(products.len().to_string(), "HYSA Products"),
            stat(states.to_string(), "States & Territories"),
        ],
    );

    let mut cards: Vec<Child> = Vec::with_capacity(products.len());
    let mut cleanups: Vec<Cleanup> = Vec::with_capacity(products.len());
    for product in &products {
        let card = hysa_card(&ctx.host, product);
        cards.push(card.element.into());
        cleanups.push(card.cleanup);
    }
    let leaderboard = el("div", vec![Attr::class("hysa-leaderboard reveal-stagger")], cards);

    let wrap = el("div", vec![Attr::class("container")], children![hero, stats, leaderboard]);
    mount(container, children![wrap]);

    Ok(Some(Cleanup::new(move || {
        for cleanup in &cleanups {
            cleanup.run();
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::fixtures::sample_database;
    use crate::runtime::Host;
    use std::rc::Rc;

    fn render_into(db: Database) -> (Host, ElementRef, Option<Cleanup>) {
        let host = Host::new();
        let ctx = PageContext::new(&host, Rc::new(db));
        let container = host.document().app();
        let cleanup = render(&ctx, &container, &Params::new()).unwrap();
        (host, container, cleanup)
    }

    #[test]
    fn test_dashboard_content() {
        let (_host, app, _) = render_into(sample_database());

        let values: Vec<String> = app
            .find_by_class("stats-strip__value")
            .iter()
            .map(|v| v.text_content())
            .collect();
        assert_eq!(values, vec!["6", "3", "3"]);

        let ranks: Vec<String> = app
            .find_by_class("hysa-card__rank")
            .iter()
            .map(|r| r.text_content())
            .collect();
        assert_eq!(ranks, vec!["#1", "#2", "#3"]);

        assert_eq!(
            app.find_by_class("hysa-hero__updated")[0].text_content(),
            "Last updated 2025-01-15"
        );
    }

    #[test]
    fn test_empty_snapshot_shows_na() {
        let (_host, app, _) = render_into(crate::fixtures::bulk_database(0));
        assert_eq!(
            app.find_by_class("hysa-hero__updated")[0].text_content(),
            "Last updated N/A"
        );
        assert!(app.find_by_class("hysa-card").is_empty());
    }

    #[test]
    fn test_cards_count_up_to_their_apy() {
        let (host, app, _) = render_into(sample_database());
        host.advance(2_000.0);

        let apys: Vec<String> = app
            .find_by_class("hysa-card__apy")
            .iter()
            .map(|a| a.text_content())
            .collect();
        assert_eq!(apys, vec!["5.00%", "4.25%", "3.10%"]);
    }

    #[test]
    fn test_cleanup_twice_leaves_nothing_scheduled() {
        let (host, _app, cleanup) = render_into(sample_database());
        host.advance(120.0);

        let cleanup = cleanup.unwrap();
        cleanup.run();
        cleanup.run();

        assert_eq!(host.pending_tasks(), 0);
    }

    #[test]
    fn test_uninitialized_gateway_fails() {
        let host = Host::new();
        let ctx = PageContext::new(&host, Rc::new(Database::uninitialized()));
        let err = render(&ctx, &host.document().app(), &Params::new()).unwrap_err();
        assert!(format!("{:#}", err).contains("Database not initialized"));
    }
}
