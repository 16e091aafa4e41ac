use crate::dom::{el, Attr, ElementRef};
use crate::format::capitalize;
use crate::models::Eligibility;

/// Eligibility badge; nothing when the category is unknown
pub fn eligibility_pill(eligibility: Option<Eligibility>) -> Option<ElementRef> {
    let eligibility = eligibility?;
    let class = match eligibility {
        Eligibility::Open => "pill pill--open",
        Eligibility::Limited => "pill pill--limited",
    };
    Some(el("span", vec![Attr::class(class), Attr::text(eligibility.label())], vec![]))
}

/// Toggle button used by the eligibility filter (`all`, `open`, `limited`)
pub fn filter_pill(option: &str, active: bool) -> ElementRef {
    let class = if active { "pill pill--active" } else { "pill" };
    el(
        "button",
        vec![
            Attr::class(class),
            Attr::data("eligibility", option),
            Attr::text(capitalize(option)),
        ],
        vec![],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_pill() {
        let open = eligibility_pill(Some(Eligibility::Open)).unwrap();
        assert_eq!(open.class_name(), "pill pill--open");
        assert_eq!(open.text_content(), "Open");

        let limited = eligibility_pill(Some(Eligibility::Limited)).unwrap();
        assert!(limited.has_class("pill--limited"));

        assert!(eligibility_pill(None).is_none());
    }

    #[test]
    fn test_filter_pill() {
        let pill = filter_pill("all", true);
        assert_eq!(pill.text_content(), "All");
        assert_eq!(pill.data("eligibility").as_deref(), Some("all"));
        assert!(pill.has_class("pill--active"));
        assert!(!filter_pill("open", false).has_class("pill--active"));
    }
}
