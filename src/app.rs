// Boot sequence: load the snapshot, draw the shell, register routes

use crate::children;
use crate::components::{render_footer, render_header, render_skeleton_cards};
use crate::config::Config;
use crate::db::Database;
use crate::dom::{el, text_el, Attr, ElementRef};
use crate::pages::{browse, detail, hysa, not_found, PageContext};
use crate::router::Router;
use crate::runtime::Host;
use std::fmt::Display;
use std::rc::Rc;
use tracing::{error, info};

pub const BOOT_FAILURE_MESSAGE: &str = "Failed to load the database. Please try refreshing.";

/// Skeleton cards shown while the snapshot loads
const SKELETON_CARDS: usize = 5;

/// A running explorer session bound to one host
pub struct App {
    host: Host,
    router: Router,
    db: Rc<Database>,
}

impl App {
    /// Load the configured snapshot and start routing
    ///
    /// On failure the mount point already shows the failure screen when
    /// this returns.
    pub fn boot(host: &Host, config: &Config) -> anyhow::Result<App> {
        let mount = host.document().app();
        render_skeleton_cards(&mount, SKELETON_CARDS);

        match Database::load(&config.dataset_path) {
            Ok(db) => Ok(App::start(host, db)),
            Err(err) => {
                error!("boot failed: {}", err);
                render_boot_failure(&mount, &err);
                Err(anyhow::Error::new(err).context("loading the snapshot"))
            }
        }
    }

    /// Start a session over an already-loaded gateway
    pub fn start(host: &Host, db: Database) -> App {
        let db = Rc::new(db);
        let mount = host.document().app();

        render_header(host);
        render_footer(host.document());

        let router = Router::new(host, &mount);
        let ctx = PageContext::new(host, db.clone()).with_error_reporter(router.error_reporter());

        let page = ctx.clone();
        router.register("/", move |m, p| hysa::render(&page, m, p));
        let page = ctx.clone();
        router.register("/hysa", move |m, p| hysa::render(&page, m, p));
        let page = ctx.clone();
        router.register("/browse", move |m, p| browse::render(&page, m, p));
        let page = ctx;
        router.register("/detail/:charter_number", move |m, p| detail::render(&page, m, p));
        router.register("*", not_found::render);

        let failure_mount = mount.downgrade();
        router.set_error_handler(move |err| {
            if let Some(mount) = failure_mount.upgrade() {
                render_boot_failure(&mount, &format!("{:#}", err));
            }
        });

        info!("routes registered; starting at #{}", host.hash());
        router.start();

        App {
            host: host.clone(),
            router,
            db,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Tear the session down: page cleanup, listeners, timers, nodes
    pub fn shutdown(&self) {
        self.router.stop();
        self.host.shutdown();
    }
}

/// Replace the mount point with the static failure display
pub fn render_boot_failure(mount: &ElementRef, reason: &dyn Display) {
    mount.clear();
    mount.append_child(&el(
        "div",
        vec![
            Attr::class("container"),
            Attr::style([("padding-top", "4rem"), ("text-align", "center")]),
        ],
        children![
            text_el("p", "text-secondary", BOOT_FAILURE_MESSAGE),
            el(
                "pre",
                vec![
                    Attr::class("mono text-xs text-muted"),
                    Attr::style([("margin-top", "1rem")]),
                    Attr::text(reason.to_string()),
                ],
                vec![],
            ),
        ],
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_connection, sample_database};
    use crate::router::EXIT_DELAY_MS;
    use rusqlite::backup::Backup;
    use rusqlite::{Connection, DatabaseName, OpenFlags};
    use std::time::Duration;

    fn settle(host: &Host) {
        host.run_until_idle(5_000.0);
    }

    #[test]
    fn test_boot_from_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credit_unions.db");
        sample_connection().backup(DatabaseName::Main, &path, None).unwrap();

        let host = Host::new();
        let config = Config {
            dataset_path: path,
            ..Config::default()
        };
        let app = App::boot(&host, &config).unwrap();

        // Skeleton stays up through the exit transition
        assert_eq!(host.document().app().find_by_class("skeleton").len(), 5);
        settle(&host);

        let mount = host.document().app();
        assert_eq!(mount.find_by_class("hysa-card").len(), 3);
        assert!(host.document().header().to_html().contains("site-nav__link--active"));
        assert!(host.document().footer().text_content().contains("NCUA"));
        assert!(app.database().is_initialized());
    }

    #[test]
    fn test_missing_snapshot_renders_failure() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::new();
        let config = Config {
            dataset_path: dir.path().join("nope.db"),
            ..Config::default()
        };

        assert!(App::boot(&host, &config).is_err());

        let mount = host.document().app();
        assert_eq!(mount.find_by_tag("p")[0].text_content(), BOOT_FAILURE_MESSAGE);
        assert!(mount.find_by_tag("pre")[0].text_content().contains("nope.db"));
        // No shell and no routing after a failed boot
        assert_eq!(host.document().header().child_count(), 0);
        assert_eq!(host.pending_tasks(), 0);
    }

    #[test]
    fn test_routes() {
        let host = Host::with_hash("#/detail/4");
        let app = App::start(&host, sample_database());
        settle(&host);
        assert_eq!(
            host.document().app().find_by_class("detail-name")[0].text_content(),
            "Alliant Credit Union"
        );

        app.router().navigate("/browse?state=IL");
        settle(&host);
        assert_eq!(
            host.document().app().find_by_class("browse-results-info")[0].text_content(),
            "Showing 1–1 of 1"
        );

        app.router().navigate("/");
        settle(&host);
        assert_eq!(host.document().app().find_by_class("hysa-card").len(), 3);

        app.router().navigate("/no/such/page");
        settle(&host);
        assert_eq!(
            host.document().app().find_by_class("not-found__code")[0].text_content(),
            "404"
        );
    }

    #[test]
    fn test_query_failure_reaches_failure_screen() {
        let host = Host::with_hash("/hysa");
        App::start(&host, Database::uninitialized());
        host.advance(EXIT_DELAY_MS);

        let mount = host.document().app();
        assert_eq!(mount.find_by_tag("p")[0].text_content(), BOOT_FAILURE_MESSAGE);
        assert!(mount.text_content().contains("Database not initialized"));
    }

    #[test]
    fn test_browse_event_failure_reaches_failure_screen() {
        let uri = "file:browse_event_failure?mode=memory&cache=shared";
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        let mut writer = Connection::open_with_flags(uri, flags).unwrap();
        Backup::new(&sample_connection(), &mut writer)
            .unwrap()
            .run_to_completion(64, Duration::ZERO, None)
            .unwrap();
        let reader = Connection::open_with_flags(uri, flags).unwrap();

        let host = Host::with_hash("/browse");
        let _app = App::start(&host, Database::from_connection(reader));
        settle(&host);
        let mount = host.document().app();
        assert_eq!(mount.find_by_class("browse-results-info").len(), 1);

        // Next re-query hits a table that is gone
        writer.execute_batch("DROP TABLE membership").unwrap();
        mount.find_by_tag("th")[0].dispatch("click");

        assert_eq!(mount.find_by_tag("p")[0].text_content(), BOOT_FAILURE_MESSAGE);
        assert!(mount.text_content().contains("counting browse results"));
        assert!(mount.find_by_class("browse-results-info").is_empty());
    }

    #[test]
    fn test_leaving_dashboard_stops_animations() {
        let host = Host::with_hash("/hysa");
        let app = App::start(&host, sample_database());
        host.advance(EXIT_DELAY_MS + 100.0);
        assert!(host.pending_frames() > 0);

        app.router().navigate("/detail/2");
        host.advance(0.0);
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let host = Host::with_hash("/browse");
        let app = App::start(&host, sample_database());
        settle(&host);

        app.shutdown();
        assert_eq!(host.pending_tasks(), 0);
        assert_eq!(host.document().body().child_count(), 0);
    }
}
