// Test fixtures: small in-memory snapshots

use crate::db::{setup_snapshot_schema, Database};
use rusqlite::{params, Connection};

/// Six institutions with a mix of optional sections
///
/// | charter | state | web | hysa  | membership |
/// |---------|-------|-----|-------|------------|
/// | 1       | VA    | yes | -     | limited    |
/// | 2       | CA    | yes | 4.25% | open       |
/// | 3       | CA    | -   | 5.00% | open       |
/// | 4       | IL    | yes | 3.10% | open       |
/// | 5       | CA    | -   | -     | limited    |
/// | 6       | CA    | -   | -     | -          |
pub fn sample_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_snapshot_schema(&conn).unwrap();

    let institutions = [
        (1, "NAVY FEDERAL CREDIT UNION", "VIENNA", "VA"),
        (2, "GOLDEN 1 CREDIT UNION", "SACRAMENTO", "CA"),
        (3, "SCHOOLSFIRST FEDERAL CREDIT UNION", "TUSTIN", "CA"),
        (4, "ALLIANT CREDIT UNION", "CHICAGO", "IL"),
        (5, "THE PEOPLE OF THE VALLEY CU", "FRESNO", "CA"),
        (6, "FIRST TECH FEDERAL CREDIT UNION", "SAN JOSE", "CA"),
    ];
    for (charter, name, city, state) in institutions {
        conn.execute(
            "INSERT INTO institutions VALUES (?1, ?2, ?3, ?4)",
            params![charter, name, city, state],
        )
        .unwrap();
    }

    let products = [
        (4, "High Rate Savings", "3.10%"),
        (2, "Ultimate Savings", "4.25%"),
        (3, "Promo Savings", "5.00%"),
    ];
    for (charter, product, apy) in products {
        conn.execute(
            "INSERT INTO savings_products VALUES (?1, ?2, ?3, ?4, '$0', '$5,000', '2025-01-15')",
            params![charter, product, format!("https://cu{}.example/savings", charter), apy],
        )
        .unwrap();
    }

    for charter in [1, 2, 4] {
        conn.execute(
            "INSERT INTO web_presence VALUES (?1, ?2, '2025-01-01T00:00:00Z')",
            params![charter, format!("https://cu{}.example", charter)],
        )
        .unwrap();
    }

    let membership = [
        (1, Some("limited"), "Military and DoD"),
        (2, Some("open"), "Anyone in California"),
        (3, Some("open"), "School employees and family"),
        (4, Some("open"), "Anyone via foundation donation"),
        (5, Some("limited"), "Residents of Fresno County"),
    ];
    for (charter, eligibility, field) in membership {
        conn.execute(
            "INSERT INTO membership VALUES (?1, ?2, ?3, NULL, '2025-01-01', NULL)",
            params![charter, eligibility, field],
        )
        .unwrap();
    }

    conn
}

pub fn sample_database() -> Database {
    Database::from_connection(sample_connection())
}

/// `count` institutions in CA with sequential charters, no optional rows
pub fn bulk_database(count: i64) -> Database {
    let conn = Connection::open_in_memory().unwrap();
    setup_snapshot_schema(&conn).unwrap();

    for charter in 1..=count {
        conn.execute(
            "INSERT INTO institutions VALUES (?1, ?2, 'CITY', 'CA')",
            params![charter, format!("CU NUMBER {:04}", charter)],
        )
        .unwrap();
    }

    Database::from_connection(conn)
}
