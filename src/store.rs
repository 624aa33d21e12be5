use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::query::{predict_after, rank_recent};
use crate::retry::RetryPolicy;
use crate::storage::{Command, NewCommand};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS commands (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        command_text    TEXT NOT NULL,
        working_dir     TEXT NOT NULL,
        exit_status     INTEGER NOT NULL,
        timestamp       INTEGER NOT NULL,
        duration        INTEGER,
        git_branch      TEXT,
        git_repo        TEXT,
        source_app      TEXT,
        source_pid      INTEGER,
        source_active   INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_commands_timestamp ON commands(timestamp, id);
";

const COLUMNS: &str = "id, command_text, working_dir, exit_status, timestamp, duration, \
                       git_branch, git_repo, source_app, source_pid, source_active";

/// Handle on the history file.
///
/// A store opened over a missing file holds no connection: every read returns an
/// empty result and the first insert creates the file.
pub struct Store {
    path: PathBuf,
    conn: Option<Connection>,
    retry: RetryPolicy,
}

impl Store {
    /// Open an existing store. A missing file is reported as `NotFound`.
    pub fn open(path: impl AsRef<Path>, retry: RetryPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        }
        let conn = connect(&path, &retry, false)?;
        Ok(Self { path, conn: Some(conn), retry })
    }

    /// Like `open`, but "no history yet" becomes an empty store.
    pub fn open_or_empty(path: impl AsRef<Path>, retry: RetryPolicy) -> Result<Self> {
        match Self::open(path.as_ref(), retry.clone()) {
            Err(StoreError::NotFound { path }) => {
                debug!(path = %path.display(), "no history file, using empty store");
                Ok(Self { path, conn: None, retry })
            }
            other => other,
        }
    }

    /// Open for capture, creating the file and its parent directory when absent.
    pub fn open_or_create(path: impl AsRef<Path>, retry: RetryPolicy) -> Result<Self> {
        let mut store = Self::open_or_empty(path, retry)?;
        store.ensure_created()?;
        Ok(store)
    }

    pub fn is_empty_handle(&self) -> bool {
        self.conn.is_none()
    }

    fn ensure_created(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        debug!(path = %self.path.display(), "creating history store");
        self.conn = Some(connect(&self.path, &self.retry, true)?);
        Ok(())
    }

    /// Append a record and return its id.
    pub fn insert(&mut self, record: &NewCommand) -> Result<i64> {
        self.ensure_created()?;
        let Some(conn) = &self.conn else {
            return Err(StoreError::NotFound { path: self.path.clone() });
        };
        let id = self.retry.run(&self.path, || {
            conn.query_row(
                "INSERT INTO commands (command_text, working_dir, exit_status, timestamp, duration, \
                                       git_branch, git_repo, source_app, source_pid, source_active) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 RETURNING id",
                params![
                    record.command_text,
                    record.working_dir,
                    record.exit_status,
                    record.timestamp,
                    record.duration,
                    record.git_branch,
                    record.git_repo,
                    record.source_app,
                    record.source_pid,
                    record.source_active,
                ],
                |row| row.get::<_, i64>(0),
            )
        })?;
        debug!(id, "recorded command");
        Ok(id)
    }

    /// Set the duration of a finished command. Later calls overwrite earlier ones.
    pub fn set_duration(&self, id: i64, duration_ms: i64) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Err(StoreError::CommandNotFound(id));
        };
        let changed = self.retry.run(&self.path, || {
            conn.execute(
                "UPDATE commands SET duration = ?1 WHERE id = ?2",
                params![duration_ms, id],
            )
        })?;
        if changed == 0 {
            return Err(StoreError::CommandNotFound(id));
        }
        Ok(())
    }

    /// Every record, id ascending.
    pub fn scan_all(&self) -> Result<Vec<Command>> {
        self.select(&format!("SELECT {} FROM commands ORDER BY id ASC", COLUMNS), &[])
    }

    /// Most recent commands starting with `prefix`. `Some(0)` never touches the store.
    pub fn like_recent(&self, prefix: &str, limit: Option<usize>, filter: &Filter) -> Result<Vec<String>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.starts_with(prefix);
        conditions.scope(filter);
        conditions.hide_self(filter);
        let rows = self.select(
            &format!(
                "SELECT {} FROM commands{} ORDER BY timestamp DESC, id DESC{}",
                COLUMNS,
                conditions.where_sql(),
                limit_sql(limit, filter)
            ),
            &conditions.values,
        )?;
        Ok(rank_recent(&rows, prefix, limit, filter))
    }

    /// Commands that followed `prev_cmd` in history. An empty anchor matches nothing.
    ///
    /// Adjacency is global, so every record is read; filtering happens after pairing.
    pub fn like_recent_after(
        &self,
        prefix: &str,
        prev_cmd: &str,
        limit: Option<usize>,
        filter: &Filter,
    ) -> Result<Vec<String>> {
        if prev_cmd.is_empty() || limit == Some(0) {
            return Ok(Vec::new());
        }
        let rows = self.select(
            &format!("SELECT {} FROM commands ORDER BY timestamp ASC, id ASC", COLUMNS),
            &[],
        )?;
        Ok(predict_after(&rows, prefix, prev_cmd, limit, filter))
    }

    /// The `limit` most recent records, returned oldest first.
    pub fn list_commands(&self, limit: Option<usize>, filter: &Filter) -> Result<Vec<Command>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.scope(filter);
        conditions.hide_self(filter);
        let rows = self.select(
            &format!(
                "SELECT {} FROM commands{} ORDER BY id DESC{}",
                COLUMNS,
                conditions.where_sql(),
                limit_sql(limit, filter)
            ),
            &conditions.values,
        )?;
        let mut recent: Vec<Command> = rows
            .into_iter()
            .filter(|c| filter.matches(c))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        recent.reverse();
        Ok(recent)
    }

    /// Records with `start <= timestamp <= end`, newest first.
    pub fn list_commands_in_range(
        &self,
        start: i64,
        end: i64,
        limit: Option<usize>,
        filter: &Filter,
    ) -> Result<Vec<Command>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.push("timestamp >= ? AND timestamp <= ?", [Value::Integer(start), Value::Integer(end)]);
        conditions.scope(filter);
        conditions.hide_self(filter);
        let rows = self.select(
            &format!(
                "SELECT {} FROM commands{} ORDER BY timestamp DESC, id DESC{}",
                COLUMNS,
                conditions.where_sql(),
                limit_sql(limit, filter)
            ),
            &conditions.values,
        )?;
        Ok(rows
            .into_iter()
            .filter(|c| filter.matches(c))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Distinct `source_app` values, for completion hints.
    pub fn unique_source_apps(&self) -> Result<BTreeSet<String>> {
        let Some(conn) = &self.conn else {
            return Ok(BTreeSet::new());
        };
        self.retry.run(&self.path, || {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT source_app FROM commands WHERE source_app IS NOT NULL",
            )?;
            let apps = stmt.query_map([], |row| row.get::<_, String>(0))?;
            apps.collect::<rusqlite::Result<BTreeSet<String>>>()
        })
    }

    fn select(&self, sql: &str, values: &[Value]) -> Result<Vec<Command>> {
        let Some(conn) = &self.conn else {
            return Ok(Vec::new());
        };
        debug!(sql, "history query");
        self.retry.run(&self.path, || {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params_from_iter(values), command_from_row)?;
            rows.collect::<rusqlite::Result<Vec<Command>>>()
        })
    }
}

/// The parts of a `Filter` SQLite can evaluate. The exclude glob stays in Rust,
/// so `Filter::matches` still runs over whatever comes back.
#[derive(Default)]
struct Conditions {
    clauses: Vec<&'static str>,
    values: Vec<Value>,
}

impl Conditions {
    fn push<const N: usize>(&mut self, clause: &'static str, values: [Value; N]) {
        self.clauses.push(clause);
        self.values.extend(values);
    }

    /// Literal, case-sensitive prefix. `LIKE` would treat `%` and `_` as wildcards.
    fn starts_with(&mut self, prefix: &str) {
        if !prefix.is_empty() {
            self.push(
                "substr(command_text, 1, length(?)) = ?",
                [Value::Text(prefix.to_string()), Value::Text(prefix.to_string())],
            );
        }
    }

    fn scope(&mut self, filter: &Filter) {
        if let Some(dir) = &filter.working_dir {
            self.push("working_dir = ?", [Value::Text(dir.clone())]);
        }
        if let Some(session) = &filter.session {
            self.push("source_app = ?", [Value::Text(session.app.clone())]);
            if let Some(pid) = session.pid {
                self.push("source_pid = ?", [Value::Integer(pid)]);
            }
        }
    }

    fn hide_self(&mut self, filter: &Filter) {
        let own = &filter.self_invocation;
        if !own.include && !own.prefix.is_empty() {
            self.push(
                "substr(command_text, 1, length(?)) <> ?",
                [Value::Text(own.prefix.clone()), Value::Text(own.prefix.clone())],
            );
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// `LIMIT` is only safe in SQL when no row can still be dropped afterwards.
fn limit_sql(limit: Option<usize>, filter: &Filter) -> String {
    match (limit, &filter.exclude) {
        (Some(n), None) => format!(" LIMIT {}", n),
        _ => String::new(),
    }
}

fn connect(path: &Path, retry: &RetryPolicy, create: bool) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = retry.run(path, || Connection::open_with_flags(path, flags))?;
    // Contention is handled by RetryPolicy, not by SQLite's busy handler.
    retry.run(path, || conn.busy_timeout(Duration::ZERO))?;
    retry.run(path, || init_schema(&conn))?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // WAL keeps readers off the writer's lock.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.execute_batch(SCHEMA)
}

fn command_from_row(row: &Row<'_>) -> rusqlite::Result<Command> {
    Ok(Command {
        id: row.get(0)?,
        command_text: row.get(1)?,
        working_dir: row.get(2)?,
        exit_status: row.get(3)?,
        timestamp: row.get(4)?,
        duration: row.get(5)?,
        git_branch: row.get(6)?,
        git_repo: row.get(7)?,
        source_app: row.get(8)?,
        source_pid: row.get(9)?,
        source_active: row.get(10)?,
    })
}
