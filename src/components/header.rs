// Site header: logo and primary navigation

use crate::children;
use crate::dom::{el, Attr, ElementRef};
use crate::runtime::{Host, HOME_ROUTE};

pub const ACTIVE_CLASS: &str = "site-nav__link--active";

/// Header data key holding the live hash-change listener id
const LISTENER_KEY: &str = "hash-listener";

const NAV_LINKS: [(&str, &str); 2] = [("hysa", "HYSA Rates"), ("browse", "Browse CUs")];

/// Draw the header and keep the active link in sync with the fragment
///
/// Returns the hash-change listener id. Re-rendering drops the listener
/// installed by the previous render.
pub fn render_header(host: &Host) -> u64 {
    let header = host.document().header();
    if let Some(previous) = header.data(LISTENER_KEY).and_then(|id| id.parse().ok()) {
        host.remove_hash_listener(previous);
    }
    header.clear();

    let links: Vec<ElementRef> = NAV_LINKS
        .iter()
        .map(|(nav, label)| {
            el(
                "a",
                vec![
                    Attr::class("site-nav__link"),
                    Attr::attr("href", format!("#/{}", nav)),
                    Attr::data("nav", *nav),
                    Attr::text(*label),
                ],
                vec![],
            )
        })
        .collect();

    let inner = el(
        "div",
        vec![Attr::class("container site-header__inner")],
        children![
            el(
                "a",
                vec![Attr::class("site-header__logo"), Attr::attr("href", format!("#{}", HOME_ROUTE))],
                children!["Credit Union ", el("span", vec![Attr::text("Data")], vec![])],
            ),
            el(
                "nav",
                vec![Attr::class("site-nav")],
                links.iter().map(Into::into).collect(),
            ),
        ],
    );
    header.append_child(&inner);

    update_active_nav(host, &links);

    let watcher = host.clone();
    let id = host.on_hash_change(move || update_active_nav(&watcher, &links));
    header.set_data(LISTENER_KEY, &id.to_string());
    id
}

/// Highlight links whose route prefixes the current fragment
pub fn update_active_nav(host: &Host, links: &[ElementRef]) {
    let hash = host.hash();
    let hash = if hash.is_empty() { HOME_ROUTE.to_string() } else { hash };

    for link in links {
        let active = link
            .data("nav")
            .map(|nav| hash.starts_with(&format!("/{}", nav)))
            .unwrap_or(false);
        link.toggle_class(ACTIVE_CLASS, active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_navs(host: &Host) -> Vec<String> {
        host.document()
            .header()
            .find_by_class(ACTIVE_CLASS)
            .iter()
            .filter_map(|l| l.data("nav"))
            .collect()
    }

    #[test]
    fn test_home_route_is_active_by_default() {
        let host = Host::new();
        render_header(&host);

        assert_eq!(active_navs(&host), vec!["hysa"]);
        assert!(host.document().header().to_html().contains("Credit Union <span>Data</span>"));
    }

    #[test]
    fn test_active_link_follows_navigation() {
        let host = Host::with_hash("#/hysa");
        render_header(&host);

        host.set_hash("/browse?state=CA");
        host.advance(0.0);
        assert_eq!(active_navs(&host), vec!["browse"]);

        host.set_hash("/detail/5");
        host.advance(0.0);
        assert!(active_navs(&host).is_empty());
    }

    #[test]
    fn test_rerender_replaces_content() {
        let host = Host::new();
        render_header(&host);
        render_header(&host);
        assert_eq!(host.document().header().child_count(), 1);
    }

    #[test]
    fn test_rerender_keeps_one_listener() {
        let host = Host::with_hash("/hysa");
        let first = render_header(&host);
        let second = render_header(&host);
        render_header(&host);

        assert_ne!(first, second);
        assert_eq!(host.hash_listener_count(), 1);

        host.set_hash("/browse");
        host.advance(0.0);
        assert_eq!(active_navs(&host), vec!["browse"]);
    }
}
