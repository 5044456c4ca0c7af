use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{PhaseKind, QualityLabel, SleepPhase, SleepSession};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| anyhow!("invalid date '{value}': {err}"))
}

fn label_from_str(value: &str) -> Result<QualityLabel> {
    match value {
        "Poor" => Ok(QualityLabel::Poor),
        "Fair" => Ok(QualityLabel::Fair),
        "Good" => Ok(QualityLabel::Good),
        "Excellent" => Ok(QualityLabel::Excellent),
        _ => Err(anyhow!("unknown quality label '{value}'")),
    }
}

fn kind_from_str(value: &str) -> Result<PhaseKind> {
    match value {
        "Light" => Ok(PhaseKind::Light),
        "Deep" => Ok(PhaseKind::Deep),
        "Awake" => Ok(PhaseKind::Awake),
        _ => Err(anyhow!("unknown phase kind '{value}'")),
    }
}

const SESSION_COLUMNS: &str = "id, date, started_at, stopped_at, duration_minutes, \
     quality_score, quality_label, movement_events, avg_sound_level, \
     alarm_triggered_at, alarm_did_trigger, alarm_window_minutes";

fn session_from_row(row: &Row<'_>) -> Result<SleepSession> {
    Ok(SleepSession {
        id: row.get::<_, String>(0)?,
        date: parse_date(&row.get::<_, String>(1)?)?,
        started_at: parse_datetime(&row.get::<_, String>(2)?)?,
        stopped_at: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        duration_minutes: row.get::<_, Option<i64>>(4)?,
        quality_score: u8::try_from(row.get::<_, i64>(5)?)
            .map_err(|_| anyhow!("quality score out of range"))?,
        quality_label: label_from_str(&row.get::<_, String>(6)?)?,
        movement_events: u32::try_from(row.get::<_, i64>(7)?)
            .map_err(|_| anyhow!("movement events out of range"))?,
        avg_sound_level: row.get::<_, f64>(8)?,
        phases: Default::default(),
        alarm_triggered_at: row
            .get::<_, Option<String>>(9)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        alarm_did_trigger: row.get::<_, i64>(10)? != 0,
        alarm_window_minutes: u32::try_from(row.get::<_, i64>(11)?)
            .map_err(|_| anyhow!("alarm window out of range"))?,
    })
}

fn load_phases(conn: &Connection, session: &mut SleepSession) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT kind, start_at, end_at FROM sleep_phases
         WHERE session_id = ?1
         ORDER BY start_at ASC",
    )?;

    let mut rows = stmt.query(params![session.id])?;
    while let Some(row) = rows.next()? {
        let phase = SleepPhase {
            kind: kind_from_str(&row.get::<_, String>(0)?)?,
            start: parse_datetime(&row.get::<_, String>(1)?)?,
            end: parse_datetime(&row.get::<_, String>(2)?)?,
        };
        session.phases.push(phase);
    }

    Ok(())
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("nocturne-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_session(&self, session: &SleepSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, date, started_at, stopped_at, duration_minutes,
                     quality_score, quality_label, movement_events, avg_sound_level,
                     alarm_triggered_at, alarm_did_trigger, alarm_window_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id,
                    record.date.to_string(),
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.duration_minutes,
                    i64::from(record.quality_score),
                    record.quality_label.as_str(),
                    i64::from(record.movement_events),
                    record.avg_sound_level,
                    record.alarm_triggered_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.alarm_did_trigger as i64,
                    i64::from(record.alarm_window_minutes),
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    /// Write the finalized outcome and phase partition in one transaction.
    pub async fn finalize_session(&self, session: &SleepSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open finalize transaction")?;

            tx.execute(
                "UPDATE sessions
                 SET stopped_at = ?1,
                     duration_minutes = ?2,
                     quality_score = ?3,
                     quality_label = ?4,
                     movement_events = ?5,
                     avg_sound_level = ?6,
                     alarm_triggered_at = ?7,
                     alarm_did_trigger = ?8
                 WHERE id = ?9",
                params![
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.duration_minutes,
                    i64::from(record.quality_score),
                    record.quality_label.as_str(),
                    i64::from(record.movement_events),
                    record.avg_sound_level,
                    record.alarm_triggered_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.alarm_did_trigger as i64,
                    record.id,
                ],
            )
            .with_context(|| "failed to finalize session")?;

            tx.execute(
                "DELETE FROM sleep_phases WHERE session_id = ?1",
                params![record.id],
            )
            .with_context(|| "failed to clear stale phases")?;

            for phase in record.phases.chronological() {
                tx.execute(
                    "INSERT INTO sleep_phases (session_id, kind, start_at, end_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.id,
                        phase.kind.as_str(),
                        phase.start.to_rfc3339(),
                        phase.end.to_rfc3339(),
                    ],
                )
                .with_context(|| "failed to insert sleep phase")?;
            }

            tx.commit().context("failed to commit finalization")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_alarm_triggered(
        &self,
        session_id: &str,
        triggered_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET alarm_triggered_at = ?1,
                     alarm_did_trigger = 1
                 WHERE id = ?2",
                params![triggered_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to mark alarm trigger")?;
            Ok(())
        })
        .await
    }

    /// The most recently started session without an end timestamp, if any.
    pub async fn get_active_session(&self) -> Result<Option<SleepSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE stopped_at IS NULL
                 ORDER BY started_at DESC
                 LIMIT 1",
            ))?;

            let mut rows = stmt.query([])?;
            if let Some(row) = rows.next()? {
                let mut session = session_from_row(row)?;
                load_phases(conn, &mut session)?;
                Ok(Some(session))
            } else {
                Ok(None)
            }
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SleepSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1",
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            if let Some(row) = rows.next()? {
                let mut session = session_from_row(row)?;
                load_phases(conn, &mut session)?;
                Ok(Some(session))
            } else {
                Ok(None)
            }
        })
        .await
    }

    /// Finalized sessions, newest first, for reporting collaborators.
    pub async fn list_sessions(&self) -> Result<Vec<SleepSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE stopped_at IS NOT NULL
                 ORDER BY started_at DESC",
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(session_from_row(row)?);
            }

            for session in &mut sessions {
                load_phases(conn, session)?;
            }

            Ok(sessions)
        })
        .await
    }
}
