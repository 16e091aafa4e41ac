// Read projections of the snapshot entities
//
// Every entity hangs off an institution's charter number. Nothing here
// writes; the snapshot is immutable for the life of a session.

use crate::db::{Database, Row, Value};
use crate::error::Result;
use crate::format::parse_apy;
use serde::Serialize;

// ============================================================================
// ELIGIBILITY
// ============================================================================

/// Membership restriction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Eligibility {
    Open,
    Limited,
}

impl Eligibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Eligibility::Open),
            "limited" => Some(Eligibility::Limited),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::Open => "open",
            Eligibility::Limited => "limited",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Eligibility::Open => "Open",
            Eligibility::Limited => "Limited",
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Institution {
    pub charter_number: i64,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Institution {
    pub fn from_row(row: &Row) -> Self {
        Self {
            charter_number: row.int("charter_number").unwrap_or_default(),
            name: row.text_or_empty("name"),
            city: row.text("city"),
            state: row.text("state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsProduct {
    pub charter_number: i64,
    pub product: Option<String>,
    pub url: Option<String>,
    /// Percent string as stored, e.g. "4.50%"
    pub apy: String,
    pub min_balance: Option<String>,
    pub max_balance: Option<String>,
    pub last_updated: Option<String>,
}

impl SavingsProduct {
    pub fn from_row(row: &Row) -> Self {
        Self {
            charter_number: row.int("charter_number").unwrap_or_default(),
            product: row.text("product"),
            url: non_empty(row.text("url")),
            apy: row.text_or_empty("apy"),
            min_balance: row.text("min_balance"),
            max_balance: row.text("max_balance"),
            last_updated: row.text("last_updated"),
        }
    }

    pub fn apy_value(&self) -> f64 {
        parse_apy(&self.apy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebPresence {
    pub charter_number: i64,
    pub url: Option<String>,
    pub scraped_at: Option<String>,
}

impl WebPresence {
    pub fn from_row(row: &Row) -> Self {
        Self {
            charter_number: row.int("charter_number").unwrap_or_default(),
            url: non_empty(row.text("url")),
            scraped_at: row.text("scraped_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipInfo {
    pub charter_number: i64,
    pub eligibility: Option<Eligibility>,
    pub field: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub updated_at: Option<String>,
}

impl MembershipInfo {
    pub fn from_row(row: &Row) -> Self {
        Self {
            charter_number: row.int("charter_number").unwrap_or_default(),
            eligibility: row.text("eligibility").as_deref().and_then(Eligibility::parse),
            field: non_empty(row.text("field")),
            url: non_empty(row.text("url")),
            notes: non_empty(row.text("notes")),
            updated_at: row.text("updated_at"),
        }
    }
}

/// Savings product joined with its institution, as listed on the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedProduct {
    pub rank: usize,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub savings: SavingsProduct,
}

/// One line of the browse listing: the institution plus section flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowseRow {
    pub charter_number: i64,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub has_website: bool,
    pub has_membership: bool,
    pub has_hysa: bool,
}

impl BrowseRow {
    pub fn from_row(row: &Row) -> Self {
        Self {
            charter_number: row.int("charter_number").unwrap_or_default(),
            name: row.text_or_empty("name"),
            city: row.text("city"),
            state: row.text("state"),
            has_website: row.flag("has_website"),
            has_membership: row.flag("has_membership"),
            has_hysa: row.flag("has_hysa"),
        }
    }

    pub fn detail_hash(&self) -> String {
        format!("/detail/{}", self.charter_number)
    }
}

/// Everything the detail page shows for one institution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstitutionProfile {
    pub institution: Institution,
    pub web_presence: Option<WebPresence>,
    pub savings_product: Option<SavingsProduct>,
    pub membership: Option<MembershipInfo>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ============================================================================
// FETCHERS
// ============================================================================

pub const RANKED_PRODUCTS_SQL: &str = "SELECT h.*, n.name, n.city, n.state
    FROM savings_products h
    JOIN institutions n ON h.charter_number = n.charter_number
    ORDER BY CAST(REPLACE(h.apy, '%', '') AS REAL) DESC";

/// Savings products ordered by numeric APY, highest first
pub fn ranked_products(db: &Database) -> Result<Vec<RankedProduct>> {
    let rows = db.query(RANKED_PRODUCTS_SQL, &[])?;

    Ok(rows
        .iter()
        .enumerate()
        .map(|(i, row)| RankedProduct {
            rank: i + 1,
            name: row.text_or_empty("name"),
            city: row.text("city"),
            state: row.text("state"),
            savings: SavingsProduct::from_row(row),
        })
        .collect())
}

/// Charter numbers arrive as route text; numeric text binds as INTEGER
pub fn charter_param(raw: &str) -> Value {
    match raw.trim().parse::<i64>() {
        Ok(n) => Value::Integer(n),
        Err(_) => Value::Text(raw.to_string()),
    }
}

pub fn find_institution(db: &Database, charter: &str) -> Result<Option<Institution>> {
    let rows = db.query(
        "SELECT * FROM institutions WHERE charter_number = ?",
        &[charter_param(charter)],
    )?;
    Ok(rows.first().map(Institution::from_row))
}

/// Institution plus at most one row of each optional section
pub fn institution_profile(db: &Database, charter: &str) -> Result<Option<InstitutionProfile>> {
    let institution = match find_institution(db, charter)? {
        Some(i) => i,
        None => return Ok(None),
    };
    let key = [Value::Integer(institution.charter_number)];

    let web_presence = db
        .query("SELECT * FROM web_presence WHERE charter_number = ? LIMIT 1", &key)?
        .first()
        .map(WebPresence::from_row);
    let savings_product = db
        .query("SELECT * FROM savings_products WHERE charter_number = ? LIMIT 1", &key)?
        .first()
        .map(SavingsProduct::from_row);
    let membership = db
        .query("SELECT * FROM membership WHERE charter_number = ? LIMIT 1", &key)?
        .first()
        .map(MembershipInfo::from_row);

    Ok(Some(InstitutionProfile {
        institution,
        web_presence,
        savings_product,
        membership,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_database;

    #[test]
    fn test_ranked_products_sort_numerically() {
        let db = sample_database();

        let ranked = ranked_products(&db).unwrap();
        let apys: Vec<&str> = ranked.iter().map(|r| r.savings.apy.as_str()).collect();

        assert_eq!(apys, vec!["5.00%", "4.25%", "3.10%"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].name, "SCHOOLSFIRST FEDERAL CREDIT UNION");
    }

    #[test]
    fn test_profile_with_all_sections() {
        let db = sample_database();

        let profile = institution_profile(&db, "2").unwrap().unwrap();
        assert_eq!(profile.institution.state.as_deref(), Some("CA"));
        assert!(profile.web_presence.is_some());
        assert_eq!(profile.savings_product.unwrap().apy_value(), 4.25);
        assert_eq!(profile.membership.unwrap().eligibility, Some(Eligibility::Open));
    }

    #[test]
    fn test_profile_sections_are_independent() {
        let db = sample_database();

        let profile = institution_profile(&db, "6").unwrap().unwrap();
        assert!(profile.web_presence.is_none());
        assert!(profile.savings_product.is_none());
        assert!(profile.membership.is_none());
    }

    #[test]
    fn test_unknown_or_garbage_charter() {
        let db = sample_database();

        assert!(institution_profile(&db, "99999").unwrap().is_none());
        assert!(institution_profile(&db, "abc").unwrap().is_none());
    }

    #[test]
    fn test_eligibility_parse() {
        assert_eq!(Eligibility::parse("OPEN"), Some(Eligibility::Open));
        assert_eq!(Eligibility::parse(" limited "), Some(Eligibility::Limited));
        assert_eq!(Eligibility::parse(""), None);
        assert_eq!(Eligibility::parse("all"), None);
    }
}
