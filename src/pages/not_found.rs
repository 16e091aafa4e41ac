use crate::children;
use crate::dom::{el, mount, text_el, Attr, ElementRef};
use crate::router::{Cleanup, Params};
use crate::runtime::HOME_ROUTE;

pub fn render(container: &ElementRef, _params: &Params) -> anyhow::Result<Option<Cleanup>> {
    let content = el(
        "div",
        vec![Attr::class("not-found reveal")],
        children![
            text_el("div", "not-found__code", "404"),
            text_el("div", "not-found__message", "This page does not exist."),
            el(
                "a",
                vec![
                    Attr::class("not-found__link"),
                    Attr::attr("href", format!("#{}", HOME_ROUTE)),
                    Attr::text("← Back to HYSA Dashboard"),
                ],
                vec![],
            ),
        ],
    );

    mount(container, children![el("div", vec![Attr::class("container")], children![content])]);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_links_home() {
        let app = el("main", vec![], vec![]);
        render(&app, &Params::new()).unwrap();

        assert_eq!(app.find_by_class("not-found__code")[0].text_content(), "404");
        assert_eq!(
            app.find_by_tag("a")[0].attr("href").as_deref(),
            Some("#/hysa")
        );
    }
}
