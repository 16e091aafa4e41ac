// Snapshot builder: four upstream CSV datasets → one SQLite file
//
// The datasets live in sibling checkouts under a source directory. Every
// source must exist before anything is written; the output file is rebuilt
// from scratch each run, and provenance (build time, per-source SHA-256,
// row counts) is recorded in `snapshot_meta`.

use crate::db::setup_snapshot_schema;
use crate::error::{AppError, Result};
use chrono::Utc;
use csv::ReaderBuilder;
use rusqlite::{params, Connection, Transaction};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SNAPSHOT_FILE: &str = "credit_unions.db";

// ============================================================================
// SOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Institutions,
    Websites,
    Membership,
    SavingsProducts,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Institutions,
        Source::Websites,
        Source::Membership,
        Source::SavingsProducts,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Source::Institutions => "NCUA",
            Source::Websites => "Websites",
            Source::Membership => "Membership",
            Source::SavingsProducts => "HYSA",
        }
    }

    /// Location inside the source directory
    pub fn relative_path(&self) -> &'static str {
        match self {
            Source::Institutions => {
                "credit-union-ncua/data/raw/ncua.gov/FederallyInsuredCreditUnions_2025q3.csv"
            }
            Source::Websites => "credit-union-websites/data/processed/scraped-websites.csv",
            Source::Membership => "credit-union-membership/data/membership.csv",
            Source::SavingsProducts => "credit-union-hysa/data/hysa.csv",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Source::Institutions => "institutions",
            Source::Websites => "web_presence",
            Source::Membership => "membership",
            Source::SavingsProducts => "savings_products",
        }
    }

    /// Source headers, in table column order after the charter
    fn columns(&self) -> &'static [&'static str] {
        match self {
            Source::Institutions => &[
                "Charter number",
                "Credit Union name",
                "City (Mailing address)",
                "State (Mailing address)",
            ],
            Source::Websites => &["charter_number", "website", "scraped_timestamp"],
            Source::Membership => &[
                "charter",
                "membership_eligibility",
                "membership_field",
                "membership_url",
                "timestamp",
                "membership_notes",
            ],
            Source::SavingsProducts => &[
                "charter_number",
                "product",
                "url",
                "apy",
                "min_balance",
                "max_balance",
                "last_updated",
            ],
        }
    }

    fn insert_sql(&self) -> &'static str {
        match self {
            Source::Institutions => "INSERT INTO institutions VALUES (?1, ?2, ?3, ?4)",
            Source::Websites => "INSERT INTO web_presence VALUES (?1, ?2, ?3)",
            Source::Membership => "INSERT INTO membership VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            Source::SavingsProducts => {
                "INSERT INTO savings_products VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            }
        }
    }
}

/// Resolved CSV locations for one import run
#[derive(Debug, Clone)]
pub struct SourcePaths {
    root: PathBuf,
}

impl SourcePaths {
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, source: Source) -> PathBuf {
        self.root.join(source.relative_path())
    }

    /// Every source must be present before anything is written
    pub fn verify(&self) -> Result<()> {
        for source in Source::ALL {
            let path = self.path(source);
            if !path.exists() {
                return Err(AppError::Import(format!(
                    "{} CSV not found at {}",
                    source.label(),
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source: Source,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub output: PathBuf,
    pub built_at: String,
    pub sources: Vec<SourceSummary>,
}

impl ImportReport {
    pub fn rows(&self, source: Source) -> usize {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.rows)
            .unwrap_or(0)
    }
}

/// Build a fresh snapshot at `output` from the CSVs under `sources`
pub fn import_snapshot(sources: &SourcePaths, output: &Path) -> Result<ImportReport> {
    sources.verify()?;

    if output.exists() {
        fs::remove_file(output)?;
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(output)?;
    setup_snapshot_schema(&conn)?;

    let built_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    let mut summaries = Vec::new();

    for source in Source::ALL {
        let path = sources.path(source);
        let records = read_columns(&path, source.columns())?;
        let rows = insert_records(&tx, source, &path, &records)?;
        let sha256 = sha256_file(&path)?;

        println!("  {}: {} rows loaded", source.table(), rows);
        info!(table = source.table(), rows, "imported {}", path.display());

        summaries.push(SourceSummary { source, rows, sha256 });
    }

    write_meta(&tx, &built_at, &summaries)?;
    tx.commit()?;

    Ok(ImportReport {
        output: output.to_path_buf(),
        built_at,
        sources: summaries,
    })
}

/// Header names compare with whitespace collapsed (NCUA headers wrap lines)
fn normalize_header(header: &str) -> String {
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull the named columns out of every record, in the order asked for
fn read_columns(path: &Path, columns: &[&str]) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let indices = columns
        .iter()
        .map(|wanted| {
            headers
                .iter()
                .position(|h| *h == normalize_header(wanted))
                .ok_or_else(|| {
                    AppError::Import(format!("missing column '{}' in {}", wanted, path.display()))
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(
            indices
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string())
                .collect(),
        );
    }
    Ok(records)
}

fn parse_charter(raw: &str, path: &Path, line: usize) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        AppError::Import(format!(
            "invalid charter number '{}' at {}:{}",
            raw,
            path.display(),
            line
        ))
    })
}

fn insert_records(tx: &Transaction, source: Source, path: &Path, records: &[Vec<String>]) -> Result<usize> {
    let mut stmt = tx.prepare(source.insert_sql())?;

    for (i, record) in records.iter().enumerate() {
        // +2: one-based lines plus the header row
        let charter = parse_charter(&record[0], path, i + 2)?;
        let rest = &record[1..];

        match source {
            Source::Institutions => stmt.execute(params![charter, rest[0], rest[1], rest[2]])?,
            Source::Websites => stmt.execute(params![charter, rest[0], rest[1]])?,
            Source::Membership => stmt.execute(params![
                charter,
                rest[0].trim().to_ascii_lowercase(),
                rest[1],
                rest[2],
                rest[3],
                rest[4]
            ])?,
            Source::SavingsProducts => {
                stmt.execute(params![charter, rest[0], rest[1], rest[2], rest[3], rest[4], rest[5]])?
            }
        };
    }

    Ok(records.len())
}

fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_meta(tx: &Transaction, built_at: &str, summaries: &[SourceSummary]) -> Result<()> {
    let mut stmt = tx.prepare("INSERT OR REPLACE INTO snapshot_meta (key, value) VALUES (?1, ?2)")?;
    stmt.execute(params!["built_at", built_at])?;

    for summary in summaries {
        let table = summary.source.table();
        stmt.execute(params![format!("sha256:{}", table), summary.sha256])?;
        stmt.execute(params![format!("rows:{}", table), summary.rows.to_string()])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{institution_profile, ranked_products, Eligibility};

    fn write_source(root: &Path, source: Source, body: &str) {
        let path = root.join(source.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn write_all_sources(root: &Path) {
        write_source(
            root,
            Source::Institutions,
            "Charter number,Credit Union name,\"City \n(Mailing address)\",State (Mailing address),Assets\n\
             227,NAVY FEDERAL CREDIT UNION,VIENNA,VA,1\n\
             1,GOLDEN 1 CREDIT UNION,SACRAMENTO,CA,2\n",
        );
        write_source(
            root,
            Source::Websites,
            "charter_number,website,scraped_timestamp\n227,https://navyfederal.org,2025-01-01T00:00:00Z\n",
        );
        write_source(
            root,
            Source::Membership,
            "charter,membership_eligibility,membership_field,membership_url,timestamp,membership_notes\n\
             1,Open,Anyone in California,https://golden1.com/join,2025-01-02,\n",
        );
        write_source(
            root,
            Source::SavingsProducts,
            "charter_number,product,url,apy,min_balance,max_balance,last_updated\n\
             1,Ultimate Savings,https://golden1.com/savings,4.50%,$0,\"$5,000\",2025-01-15\n",
        );
    }

    #[test]
    fn test_import_builds_loadable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_all_sources(dir.path());
        let output = dir.path().join("data").join(SNAPSHOT_FILE);

        let report = import_snapshot(&SourcePaths::in_dir(dir.path()), &output).unwrap();
        assert_eq!(report.rows(Source::Institutions), 2);
        assert_eq!(report.rows(Source::SavingsProducts), 1);
        assert_eq!(report.sources[0].sha256.len(), 64);

        let db = Database::load(&output).unwrap();
        let ranked = ranked_products(&db).unwrap();
        assert_eq!(ranked[0].name, "GOLDEN 1 CREDIT UNION");
        assert_eq!(ranked[0].savings.max_balance.as_deref(), Some("$5,000"));

        let profile = institution_profile(&db, "1").unwrap().unwrap();
        assert_eq!(profile.membership.unwrap().eligibility, Some(Eligibility::Open));
        assert!(profile.web_presence.is_none());

        let meta = db
            .query("SELECT value FROM snapshot_meta WHERE key = 'rows:institutions'", &[])
            .unwrap();
        assert_eq!(meta[0].text("value").as_deref(), Some("2"));
    }

    #[test]
    fn test_rebuild_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_all_sources(dir.path());
        let output = dir.path().join(SNAPSHOT_FILE);
        let sources = SourcePaths::in_dir(dir.path());

        import_snapshot(&sources, &output).unwrap();
        import_snapshot(&sources, &output).unwrap();

        let db = Database::load(&output).unwrap();
        let count = db
            .scalar_count("SELECT COUNT(*) AS count FROM institutions", &[])
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_missing_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_all_sources(dir.path());
        fs::remove_file(dir.path().join(Source::Membership.relative_path())).unwrap();
        let output = dir.path().join(SNAPSHOT_FILE);

        let err = import_snapshot(&SourcePaths::in_dir(dir.path()), &output).unwrap_err();
        assert!(err.to_string().contains("Membership CSV not found"));
        assert!(!output.exists());
    }

    #[test]
    fn test_bad_charter_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        write_all_sources(dir.path());
        write_source(
            dir.path(),
            Source::Websites,
            "charter_number,website,scraped_timestamp\n227,https://a.example,x\nabc,https://b.example,y\n",
        );

        let err = import_snapshot(&SourcePaths::in_dir(dir.path()), &dir.path().join("out.db")).unwrap_err();
        assert!(err.to_string().contains("invalid charter number 'abc'"));
        assert!(err.to_string().contains(":3"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_all_sources(dir.path());
        write_source(dir.path(), Source::SavingsProducts, "charter_number,product\n1,Savings\n");

        let err = import_snapshot(&SourcePaths::in_dir(dir.path()), &dir.path().join("out.db")).unwrap_err();
        assert!(err.to_string().contains("missing column 'url'"));
    }
}
