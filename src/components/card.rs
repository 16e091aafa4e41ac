// HYSA leaderboard card

use crate::children;
use crate::dom::{el, text_el, Attr, ElementRef};
use crate::format::{count_up, title_case, CountUpHandle};
use crate::models::RankedProduct;
use crate::router::Cleanup;
use crate::runtime::Host;
use std::cell::RefCell;
use std::rc::Rc;

/// Delay between consecutive cards starting their count-up
pub const STAGGER_MS: f64 = 80.0;
pub const COUNT_UP_MS: f64 = 800.0;

pub struct HysaCard {
    pub element: ElementRef,
    /// Cancels the staggered start and any running count-up
    pub cleanup: Cleanup,
}

pub fn hysa_card(host: &Host, data: &RankedProduct) -> HysaCard {
    let product = &data.savings;
    let apy = product.apy_value();

    let apy_el = text_el("div", "hysa-card__apy mono", "0.00%");

    let info = el(
        "div",
        vec![],
        children![
            text_el("div", "hysa-card__name", title_case(&data.name)),
            text_el(
                "div",
                "hysa-card__meta",
                format!(
                    "{}, {}",
                    title_case(data.city.as_deref().unwrap_or_default()),
                    data.state.as_deref().unwrap_or_default()
                ),
            ),
            text_el("div", "hysa-card__product", product.product.clone().unwrap_or_default()),
            text_el(
                "div",
                "hysa-card__balance mono",
                format!(
                    "{} – {}",
                    product.min_balance.as_deref().unwrap_or_default(),
                    product.max_balance.as_deref().unwrap_or_default()
                ),
            ),
        ],
    );

    let product_link = product.url.as_ref().map(|url| {
        el(
            "a",
            vec![
                Attr::class("hysa-card__link"),
                Attr::attr("href", url.as_str()),
                Attr::attr("target", "_blank"),
                Attr::attr("rel", "noopener"),
                Attr::text("View product →"),
            ],
            vec![],
        )
    });

    let links = el(
        "div",
        vec![Attr::style([("text-align", "right"), ("align-self", "start")])],
        children![
            &apy_el,
            product_link,
            el(
                "a",
                vec![
                    Attr::class("hysa-card__link"),
                    Attr::attr("href", format!("#/detail/{}", product.charter_number)),
                    Attr::style([("display", "block"), ("margin-top", "0.5rem")]),
                    Attr::text("CU details →"),
                ],
                vec![],
            ),
        ],
    );

    let card = el(
        "div",
        vec![Attr::class("hysa-card")],
        children![
            text_el("div", "hysa-card__rank mono", format!("#{}", data.rank)),
            info,
            links,
        ],
    );

    let running: Rc<RefCell<Option<CountUpHandle>>> = Rc::new(RefCell::new(None));
    let start = {
        let (animator, running) = (host.clone(), running.clone());
        host.set_timeout(data.rank as f64 * STAGGER_MS, move || {
            *running.borrow_mut() = Some(count_up(&animator, &apy_el, apy, COUNT_UP_MS));
        })
    };

    let cleanup = Cleanup::new(move || {
        start.cancel();
        if let Some(handle) = running.borrow().as_ref() {
            handle.cancel();
        }
    });

    HysaCard {
        element: card,
        cleanup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_database;
    use crate::format::COUNTED_CLASS;
    use crate::models::ranked_products;

    #[test]
    fn test_card_content() {
        let host = Host::new();
        let ranked = ranked_products(&sample_database()).unwrap();

        let card = hysa_card(&host, &ranked[0]);
        let html = card.element.to_html();

        assert!(html.contains("#1"));
        assert!(html.contains("Schoolsfirst Federal Credit Union"));
        assert!(html.contains("Tustin, CA"));
        assert!(html.contains("$0 – $5,000"));
        assert!(html.contains("href=\"#/detail/3\""));
        assert!(html.contains("https://cu3.example/savings"));
    }

    #[test]
    fn test_count_up_starts_after_rank_stagger() {
        let host = Host::new();
        let ranked = ranked_products(&sample_database()).unwrap();
        let card = hysa_card(&host, &ranked[1]);
        let apy = card.element.find_by_class("hysa-card__apy")[0].clone();

        host.advance(150.0);
        assert_eq!(apy.text_content(), "0.00%");
        assert_eq!(host.pending_frames(), 0);

        host.advance(10.0 + COUNT_UP_MS + 100.0);
        assert_eq!(apy.text_content(), "4.25%");
        assert!(apy.has_class(COUNTED_CLASS));
    }

    #[test]
    fn test_cleanup_cancels_everything() {
        let host = Host::new();
        let ranked = ranked_products(&sample_database()).unwrap();

        // One card never started, one mid-animation
        let waiting = hysa_card(&host, &ranked[2]);
        let running = hysa_card(&host, &ranked[0]);
        host.advance(200.0);

        running.cleanup.run();
        waiting.cleanup.run();
        running.cleanup.run();

        assert_eq!(host.pending_tasks(), 0);
    }
}
