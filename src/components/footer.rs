use crate::children;
use crate::dom::{el, text_el, Attr, Document};

pub const PROJECT_URL: &str = "https://github.com/atsaloli/credit-union-datasets";

pub fn render_footer(document: &Document) {
    let footer = document.footer();
    footer.clear();

    let inner = el(
        "div",
        vec![Attr::class("container site-footer__inner")],
        children![
            text_el(
                "span",
                "site-footer__text",
                "Credit Union Data Project. Open source, community-driven data.",
            ),
            el(
                "div",
                vec![Attr::class("site-footer__links")],
                children![
                    el(
                        "a",
                        vec![
                            Attr::class("site-footer__link"),
                            Attr::attr("href", PROJECT_URL),
                            Attr::attr("target", "_blank"),
                            Attr::attr("rel", "noopener"),
                            Attr::text("GitHub"),
                        ],
                        vec![],
                    ),
                    text_el("span", "site-footer__link", "Data from NCUA"),
                ],
            ),
        ],
    );
    footer.append_child(&inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_links() {
        let document = Document::new();
        render_footer(&document);
        render_footer(&document);

        let footer = document.footer();
        assert_eq!(footer.child_count(), 1);
        assert_eq!(footer.find_by_tag("a")[0].attr("href").as_deref(), Some(PROJECT_URL));
        assert!(footer.text_content().contains("Data from NCUA"));
    }
}
