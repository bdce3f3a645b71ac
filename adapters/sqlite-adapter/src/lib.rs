//! sqlite-adapter — SQLite implementation of the LinkRepository port.
//!
//! Purpose
//! - Provide a lightweight, file-based store so the service keeps links and
//!   click counts across restarts.
//! - Implements the `LinkRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - `code` is the primary key, so a duplicate insert fails atomically with a
//!   constraint violation, reported as `RepoError::Conflict`.
//! - Clicks are bumped with a single `UPDATE ... SET clicks = clicks + 1`.
//! - The connection waits at most `busy_timeout` for a lock; past that the
//!   call fails with `RepoError::Backend`.
//! - Stores timestamps as seconds since UNIX_EPOCH.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{LinkRepository, OwnerId, RepoError, ShortCode, ShortLink};
use rusqlite::{params, Connection};

/// Lock wait used by [`SqliteRepo::new`].
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT code, target_url, clicks, created_at, owner FROM shortlinks";

/// SQLite-backed link repository.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepoError> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`SqliteRepo::new`] with an explicit lock wait bound.
    pub fn with_busy_timeout<P: AsRef<Path>>(
        path: P,
        busy_timeout: Duration,
    ) -> Result<Self, RepoError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(map_sqerr)?;
            }
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        conn.busy_timeout(busy_timeout).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepoError> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Backend("mutex poisoned".into()))
    }

    fn query_links(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ShortLink>, RepoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(map_sqerr)?;
        let mut rows = stmt.query(params).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_shortlink(row)?);
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), RepoError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS shortlinks (
            code TEXT PRIMARY KEY,
            target_url TEXT NOT NULL,
            clicks INTEGER NOT NULL DEFAULT 0 CHECK (clicks >= 0),
            created_at INTEGER NOT NULL,
            owner TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_shortlinks_owner ON shortlinks(owner);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> RepoError {
    RepoError::Backend(format!("sqlite error: {e}"))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation)
}

fn system_time_to_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

fn secs_to_system_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn row_to_shortlink(row: &rusqlite::Row) -> Result<ShortLink, RepoError> {
    let code: String = row.get(0).map_err(map_sqerr)?;
    let target_url: String = row.get(1).map_err(map_sqerr)?;
    let clicks: i64 = row.get(2).map_err(map_sqerr)?;
    let created_at: i64 = row.get(3).map_err(map_sqerr)?;
    let owner: Option<String> = row.get(4).map_err(map_sqerr)?;

    let owner = owner
        .map(OwnerId::new)
        .transpose()
        .map_err(|e| RepoError::Backend(format!("bad owner in db: {e}")))?;
    Ok(ShortLink {
        code: ShortCode::new(code),
        target_url,
        clicks: clicks.max(0) as u64,
        created_at: secs_to_system_time(created_at),
        owner,
    })
}

impl LinkRepository for SqliteRepo {
    fn find_by_code(&self, code: &ShortCode) -> Result<Option<ShortLink>, RepoError> {
        let sql = format!("{SELECT_COLUMNS} WHERE code = ?1");
        Ok(self
            .query_links(&sql, params![code.as_str()])?
            .into_iter()
            .next())
    }

    fn insert(&self, link: ShortLink) -> Result<(), RepoError> {
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO shortlinks(code, target_url, clicks, created_at, owner) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                link.code.as_str(),
                link.target_url,
                link.clicks as i64,
                system_time_to_secs(link.created_at),
                link.owner.as_ref().map(OwnerId::as_str),
            ],
        );
        match res {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(RepoError::Conflict),
            Err(e) => Err(map_sqerr(e)),
        }
    }

    fn increment_clicks(&self, code: &ShortCode) -> Result<(), RepoError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE shortlinks SET clicks = clicks + 1 WHERE code = ?1",
                params![code.as_str()],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(RepoError::Missing)
        } else {
            Ok(())
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1");
        self.query_links(&sql, params![limit as i64])
    }

    fn list_by_owner(&self, owner: &OwnerId, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE owner = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        self.query_links(&sql, params![owner.as_str(), limit as i64])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let repo = SqliteRepo::new(path).unwrap();
        (repo, dir)
    }

    fn mk_link(code: &str, secs: u64, owner: Option<&str>) -> ShortLink {
        ShortLink::new(
            ShortCode::new(code),
            format!("https://example.com/{code}"),
            UNIX_EPOCH + Duration::from_secs(secs),
            owner.map(|o| OwnerId::new(o).unwrap()),
        )
    }

    #[test]
    fn insert_find_roundtrip() {
        let (repo, _dir) = tmp_db();
        let link = mk_link("abc123", 42, Some("alice"));
        repo.insert(link.clone()).unwrap();
        let got = repo.find_by_code(&link.code).unwrap().unwrap();
        assert_eq!(got, link);
        assert_eq!(got.clicks, 0);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let (repo, _dir) = tmp_db();
        repo.insert(mk_link("AbC", 0, None)).unwrap();
        assert!(repo.find_by_code(&ShortCode::new("abc")).unwrap().is_none());
        // differently-cased codes are distinct rows
        repo.insert(mk_link("abc", 0, None)).unwrap();
    }

    #[test]
    fn insert_duplicate_conflict_keeps_original() {
        let (repo, _dir) = tmp_db();
        repo.insert(mk_link("dup", 0, None)).unwrap();
        let mut other = mk_link("dup", 1, Some("bob"));
        other.target_url = "https://other.example".into();
        assert_eq!(repo.insert(other).unwrap_err(), RepoError::Conflict);

        let got = repo.find_by_code(&ShortCode::new("dup")).unwrap().unwrap();
        assert_eq!(got.target_url, "https://example.com/dup");
        assert_eq!(repo.list(10).unwrap().len(), 1);
    }

    #[test]
    fn list_orders_and_limits() {
        let (repo, _dir) = tmp_db();
        for i in 0..5u64 {
            repo.insert(mk_link(&format!("k{i}"), i, None)).unwrap();
        }
        let items = repo.list(3).unwrap();
        assert_eq!(items.len(), 3);
        // First item should be the latest (i=4)
        assert_eq!(items[0].code.as_str(), "k4");
    }

    #[test]
    fn list_by_owner_works() {
        let (repo, _dir) = tmp_db();
        for i in 0..3 {
            repo.insert(mk_link(&format!("a{i}"), i, Some("alice"))).unwrap();
        }
        repo.insert(mk_link("b0", 0, Some("bob"))).unwrap();
        repo.insert(mk_link("p0", 0, None)).unwrap();

        let alice = OwnerId::new("alice").unwrap();
        let mine = repo.list_by_owner(&alice, 10).unwrap();
        assert_eq!(mine.len(), 3);
        assert_eq!(mine[0].code.as_str(), "a2");
        assert_eq!(repo.list_by_owner(&alice, 1).unwrap().len(), 1);
        assert_eq!(
            repo.list_by_owner(&OwnerId::new("bob").unwrap(), 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn increment_clicks_works() {
        let (repo, _dir) = tmp_db();
        let link = mk_link("clickme", 0, None);
        repo.insert(link.clone()).unwrap();

        // Increment 3 times
        repo.increment_clicks(&link.code).unwrap();
        repo.increment_clicks(&link.code).unwrap();
        repo.increment_clicks(&link.code).unwrap();

        let got = repo.find_by_code(&link.code).unwrap().unwrap();
        assert_eq!(got.clicks, 3);
        assert_eq!(
            repo.increment_clicks(&ShortCode::new("missing")).unwrap_err(),
            RepoError::Missing
        );
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (repo, _dir) = tmp_db();
        let repo = Arc::new(repo);
        repo.insert(mk_link("hot", 0, None)).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let repo = Arc::clone(&repo);
                s.spawn(move || {
                    for _ in 0..25 {
                        repo.increment_clicks(&ShortCode::new("hot")).unwrap();
                    }
                });
            }
        });
        let got = repo.find_by_code(&ShortCode::new("hot")).unwrap().unwrap();
        assert_eq!(got.clicks, 100);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("links.db");
        {
            let repo = SqliteRepo::new(&path).unwrap();
            repo.insert(mk_link("keep", 7, None)).unwrap();
            repo.increment_clicks(&ShortCode::new("keep")).unwrap();
        }
        let repo = SqliteRepo::new(&path).unwrap();
        let got = repo.find_by_code(&ShortCode::new("keep")).unwrap().unwrap();
        assert_eq!(got.clicks, 1);
        assert_eq!(got.created_at, UNIX_EPOCH + Duration::from_secs(7));
    }

    #[test]
    fn drives_the_link_service() {
        use domain::codegen::RandomCodeGenerator;
        use domain::service::LinkService;
        use domain::{CoreError, NewLink, SystemClock};

        let (repo, _dir) = tmp_db();
        let svc = LinkService::new(repo, RandomCodeGenerator::default(), SystemClock);
        let link = svc
            .create(NewLink::new("example.com/x").with_custom_code("abc123"))
            .unwrap();
        assert_eq!(link.target_url, "http://example.com/x");
        assert!(matches!(
            svc.create(NewLink::new("https://e").with_custom_code("abc123")),
            Err(CoreError::DuplicateCode(_))
        ));
        assert_eq!(svc.resolve(&link.code).unwrap(), "http://example.com/x");
        assert_eq!(svc.get(&link.code).unwrap().unwrap().clicks, 1);
    }
}
