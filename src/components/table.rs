// Sortable browse table and its narrow-screen card list

use crate::children;
use crate::dom::{el, text_el, Attr, Child, ElementRef};
use crate::format::title_case;
use crate::models::BrowseRow;
use crate::runtime::Host;
use std::rc::Rc;

// ============================================================================
// SORTING
// ============================================================================

/// Sortable columns; the only identifiers ever interpolated into SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    CharterNumber,
    #[default]
    Name,
    City,
    State,
    HasWebsite,
    HasMembership,
    HasHysa,
}

impl SortColumn {
    pub const ALL: [SortColumn; 7] = [
        SortColumn::CharterNumber,
        SortColumn::Name,
        SortColumn::City,
        SortColumn::State,
        SortColumn::HasWebsite,
        SortColumn::HasMembership,
        SortColumn::HasHysa,
    ];

    /// Unknown keys fall back to `name`
    pub fn parse(key: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == key)
            .unwrap_or_default()
    }

    pub fn key(&self) -> &'static str {
        match self {
            SortColumn::CharterNumber => "charter_number",
            SortColumn::Name => "name",
            SortColumn::City => "city",
            SortColumn::State => "state",
            SortColumn::HasWebsite => "has_website",
            SortColumn::HasMembership => "has_membership",
            SortColumn::HasHysa => "has_hysa",
        }
    }

    /// ORDER BY expression; base columns carry the institutions alias
    pub fn order_expr(&self) -> String {
        match self {
            SortColumn::CharterNumber | SortColumn::Name | SortColumn::City | SortColumn::State => {
                format!("n.{}", self.key())
            }
            _ => self.key().to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::CharterNumber => "Charter #",
            SortColumn::Name => "Name",
            SortColumn::City => "City",
            SortColumn::State => "State",
            SortColumn::HasWebsite => "Web",
            SortColumn::HasMembership => "Membership",
            SortColumn::HasHysa => "HYSA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Only an exact `desc` sorts descending
    pub fn parse(s: &str) -> Self {
        if s == "desc" {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Sort {
    /// Clicking the sorted column flips direction; any other column starts ascending
    pub fn toggled(self, column: SortColumn) -> Self {
        if self.column == column {
            Sort {
                column,
                direction: self.direction.flipped(),
            }
        } else {
            Sort {
                column,
                direction: SortDirection::Asc,
            }
        }
    }
}

// ============================================================================
// VIEWS
// ============================================================================

fn dot(active: bool) -> ElementRef {
    let class = if active { "dot dot--active" } else { "dot" };
    el("span", vec![Attr::class(class)], vec![])
}

fn location(row: &BrowseRow) -> String {
    format!(
        "{}, {}",
        title_case(row.city.as_deref().unwrap_or_default()),
        row.state.as_deref().unwrap_or_default()
    )
}

fn navigate_on_click(host: &Host, row: &BrowseRow) -> Attr {
    let (host, hash) = (host.clone(), row.detail_hash());
    Attr::on("onClick", move |_| host.set_hash(&hash))
}

pub fn create_table(host: &Host, rows: &[BrowseRow], sort: Sort, on_sort: Rc<dyn Fn(SortColumn)>) -> ElementRef {
    let headings: Vec<Child> = SortColumn::ALL
        .into_iter()
        .map(|column| {
            let sorted = sort.column == column;
            let arrow = match (sorted, sort.direction) {
                (false, _) => " ↕",
                (true, SortDirection::Asc) => " ↑",
                (true, SortDirection::Desc) => " ↓",
            };
            let on_sort = on_sort.clone();
            el(
                "th",
                vec![
                    Attr::ClassName(sorted.then(|| "sorted".to_string())),
                    Attr::on("onClick", move |_| on_sort(column)),
                ],
                children![column.label(), text_el("span", "sort-arrow", arrow)],
            )
            .into()
        })
        .collect();

    let body_rows: Vec<Child> = rows
        .iter()
        .map(|row| {
            el(
                "tr",
                vec![navigate_on_click(host, row)],
                children![
                    text_el("td", "mono", row.charter_number.to_string()),
                    text_el("td", "font-medium", title_case(&row.name)),
                    el("td", vec![Attr::text(title_case(row.city.as_deref().unwrap_or_default()))], vec![]),
                    el("td", vec![Attr::text(row.state.clone().unwrap_or_default())], vec![]),
                    el("td", vec![], children![dot(row.has_website)]),
                    el("td", vec![], children![dot(row.has_membership)]),
                    el("td", vec![], children![dot(row.has_hysa)]),
                ],
            )
            .into()
        })
        .collect();

    el(
        "table",
        vec![Attr::class("data-table")],
        children![
            el("thead", vec![], children![el("tr", vec![], headings)]),
            el("tbody", vec![], body_rows),
        ],
    )
}

pub fn create_mobile_cards(host: &Host, rows: &[BrowseRow]) -> ElementRef {
    let cards: Vec<Child> = rows
        .iter()
        .map(|row| {
            el(
                "div",
                vec![Attr::class("browse-card"), navigate_on_click(host, row)],
                children![
                    text_el("div", "browse-card__name", title_case(&row.name)),
                    text_el("div", "browse-card__meta", location(row)),
                    text_el("div", "browse-card__charter mono", format!("#{}", row.charter_number)),
                    el(
                        "div",
                        vec![Attr::class("browse-card__dots")],
                        children![
                            dot(row.has_website),
                            text_el("span", "browse-card__dot-label", "Web"),
                            dot(row.has_membership),
                            text_el("span", "browse-card__dot-label", "Membership"),
                            dot(row.has_hysa),
                            text_el("span", "browse-card__dot-label", "HYSA"),
                        ],
                    ),
                ],
            )
            .into()
        })
        .collect();

    el("div", vec![Attr::class("browse-cards")], cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn rows() -> Vec<BrowseRow> {
        vec![
            BrowseRow {
                charter_number: 2,
                name: "GOLDEN 1 CREDIT UNION".into(),
                city: Some("SACRAMENTO".into()),
                state: Some("CA".into()),
                has_website: true,
                has_membership: true,
                has_hysa: false,
            },
            BrowseRow {
                charter_number: 6,
                name: "FIRST TECH FEDERAL CREDIT UNION".into(),
                city: None,
                state: None,
                has_website: false,
                has_membership: false,
                has_hysa: false,
            },
        ]
    }

    #[test]
    fn test_sort_column_whitelist() {
        assert_eq!(SortColumn::parse("city"), SortColumn::City);
        assert_eq!(SortColumn::parse("name; DROP TABLE institutions"), SortColumn::Name);
        assert_eq!(SortColumn::parse(""), SortColumn::Name);
        assert_eq!(SortColumn::State.order_expr(), "n.state");
        assert_eq!(SortColumn::HasHysa.order_expr(), "has_hysa");
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
    }

    #[test]
    fn test_sort_toggling() {
        let sort = Sort::default();
        let flipped = sort.toggled(SortColumn::Name);
        assert_eq!(flipped.direction, SortDirection::Desc);

        let other = flipped.toggled(SortColumn::State);
        assert_eq!(other, Sort { column: SortColumn::State, direction: SortDirection::Asc });
    }

    #[test]
    fn test_table_headings_and_rows() {
        let host = Host::new();
        let table = create_table(&host, &rows(), Sort::default(), Rc::new(|_: SortColumn| {}));

        let headings = table.find_by_tag("th");
        assert_eq!(headings.len(), 7);
        assert_eq!(headings[1].text_content(), "Name ↑");
        assert!(headings[1].has_class("sorted"));
        assert_eq!(headings[0].text_content(), "Charter # ↕");

        let body = table.find_by_tag("tbody")[0].clone();
        assert_eq!(body.child_count(), 2);
        assert_eq!(body.find_by_class("dot--active").len(), 2);
        assert!(table.to_html().contains("Golden 1 Credit Union"));
    }

    #[test]
    fn test_heading_click_reports_column() {
        let host = Host::new();
        let clicked = Rc::new(RefCell::new(None));
        let slot = clicked.clone();
        let table = create_table(
            &host,
            &rows(),
            Sort::default(),
            Rc::new(move |c: SortColumn| *slot.borrow_mut() = Some(c)),
        );

        table.find_by_tag("th")[3].dispatch("click");
        assert_eq!(*clicked.borrow(), Some(SortColumn::State));
    }

    #[test]
    fn test_row_click_navigates_to_detail() {
        let host = Host::new();
        let table = create_table(&host, &rows(), Sort::default(), Rc::new(|_: SortColumn| {}));

        let body = table.find_by_tag("tbody")[0].clone();
        body.child_elements()[1].dispatch("click");
        assert_eq!(host.hash(), "/detail/6");

        let cards = create_mobile_cards(&host, &rows());
        cards.child_elements()[0].dispatch("click");
        assert_eq!(host.hash(), "/detail/2");
    }

    #[test]
    fn test_mobile_card_handles_missing_location() {
        let host = Host::new();
        let cards = create_mobile_cards(&host, &rows());
        let meta = cards.find_by_class("browse-card__meta");
        assert_eq!(meta[0].text_content(), "Sacramento, CA");
        assert_eq!(meta[1].text_content(), ", ");
    }
}
