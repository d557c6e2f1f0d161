//! Argument parsing and command execution.
//!
//! Every command produces a JSON value that `main` prints on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use strand_events::{
    ConnectionConfig, ConnectionPool, Event, EventToAdd, EventsRepository, IdempotencyKey,
    SqliteEventsRepository, StreamId, StreamToCreate, Version,
};
use strand_settings::StrandSettings;
use tracing::info;
use uuid::Uuid;

/// Append-only event store on `SQLite`.
#[derive(Parser, Debug)]
#[command(name = "strand", version, about)]
pub struct Cli {
    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Settings file (defaults to `~/.strand/settings.json`).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Store operations.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Create a stream at version 0.
    CreateStream {
        /// Stream ID (fresh UUID v7 if omitted).
        #[arg(long)]
        stream_id: Option<Uuid>,
        /// Idempotency key (fresh UUID v7 if omitted).
        #[arg(long)]
        idempotency_key: Option<Uuid>,
    },
    /// Append one JSON event to a stream.
    Append {
        /// Target stream.
        #[arg(long)]
        stream_id: Uuid,
        /// Version the stream is expected to be at.
        #[arg(long)]
        expected_version: u64,
        /// Event payload as JSON.
        #[arg(long)]
        payload: String,
        /// Idempotency key (fresh UUID v7 if omitted).
        #[arg(long)]
        idempotency_key: Option<Uuid>,
    },
    /// Show a stream.
    GetStream {
        /// Stream to show.
        #[arg(long)]
        stream_id: Uuid,
    },
    /// List the events of a stream.
    Events {
        /// Stream to list.
        #[arg(long)]
        stream_id: Uuid,
    },
}

/// Database path: `--db-path` if given, else the configured one.
pub fn resolve_db_path(cli_path: Option<&Path>, settings: &StrandSettings, home: &Path) -> PathBuf {
    cli_path.map_or_else(|| settings.database.resolve_path(home), Path::to_path_buf)
}

/// Open a migrated pool at `path`, creating the parent directory if needed.
pub fn open_pool(path: &Path, settings: &StrandSettings) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let config = ConnectionConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
        connection_timeout_ms: settings.database.connection_timeout_ms,
    };
    let pool = strand_events::new_file(&path.to_string_lossy(), &config)
        .with_context(|| format!("failed to open database: {}", path.display()))?;
    Ok(pool)
}

/// Execute `command` against `pool`.
pub async fn execute(pool: ConnectionPool, command: Command) -> Result<Value> {
    let applied = {
        let conn = pool.get().context("failed to check out a connection")?;
        strand_events::run_migrations(&conn).context("failed to migrate database")?
    };

    let repo = SqliteEventsRepository::from_pool(pool);
    match command {
        Command::Migrate => {
            info!(applied, "database migrated");
            Ok(json!({
                "applied": applied,
                "schemaVersion": strand_events::sqlite::migrations::latest_version(),
            }))
        }
        Command::CreateStream {
            stream_id,
            idempotency_key,
        } => {
            let generated = StreamToCreate::generate();
            let request = StreamToCreate {
                stream_id: stream_id.map_or(generated.stream_id, StreamId::from),
                idempotency_key: idempotency_key.map_or(generated.idempotency_key, IdempotencyKey::from),
            };
            let stream = repo.create_stream(request).await?;
            Ok(serde_json::to_value(stream)?)
        }
        Command::Append {
            stream_id,
            expected_version,
            payload,
            idempotency_key,
        } => {
            let payload: Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            let event = repo
                .add_event_to_stream(EventToAdd {
                    stream_id: StreamId::from(stream_id),
                    idempotency_key: idempotency_key
                        .map_or_else(IdempotencyKey::new_v7, IdempotencyKey::from),
                    expected_version: Version::new(expected_version),
                    payload: &payload,
                })
                .await?;
            Ok(event_json(&event))
        }
        Command::GetStream { stream_id } => {
            let stream = repo.get_stream(StreamId::from(stream_id)).await?;
            Ok(serde_json::to_value(stream)?)
        }
        Command::Events { stream_id } => {
            let events = repo.get_events(StreamId::from(stream_id)).await?;
            Ok(Value::Array(events.iter().map(event_json).collect()))
        }
    }
}

/// JSON view of an event. Non-JSON payloads are shown as lossy UTF-8 text.
pub fn event_json(event: &Event) -> Value {
    let payload = event
        .payload_json::<Value>()
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(event.payload()).into_owned()));
    json!({
        "streamId": event.stream_id(),
        "version": event.version(),
        "recordedAt": event.recorded_at().to_rfc3339_opts(SecondsFormat::Millis, true),
        "payload": payload,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;
    use strand_events::EventStoreError;

    use super::*;

    fn temp_pool() -> (tempfile::TempDir, ConnectionPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.db");
        let pool = open_pool(&path, &StrandSettings::default()).unwrap();
        (dir, pool)
    }

    #[test]
    fn parses_append() {
        let id = Uuid::now_v7();
        let cli = Cli::try_parse_from([
            "strand",
            "--db-path",
            "/tmp/x.db",
            "append",
            "--stream-id",
            &id.to_string(),
            "--expected-version",
            "3",
            "--payload",
            r#"{"a":1}"#,
        ])
        .unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
        assert_matches!(
            cli.command,
            Command::Append { stream_id, expected_version: 3, idempotency_key: None, .. }
                if stream_id == id
        );
    }

    #[test]
    fn rejects_malformed_stream_id() {
        assert!(Cli::try_parse_from(["strand", "get-stream", "--stream-id", "nope"]).is_err());
    }

    #[test]
    fn db_path_flag_wins_over_settings() {
        let settings = StrandSettings::default();
        let home = Path::new("/home/u/.strand");
        assert_eq!(
            resolve_db_path(Some(Path::new("/tmp/a.db")), &settings, home),
            PathBuf::from("/tmp/a.db")
        );
        assert_eq!(
            resolve_db_path(None, &settings, home),
            PathBuf::from("/home/u/.strand/events.db")
        );
    }

    #[tokio::test]
    async fn migrate_reports_schema_version() {
        let (_dir, pool) = temp_pool();
        let out = execute(pool.clone(), Command::Migrate).await.unwrap();
        assert_eq!(out["schemaVersion"], 1);
        let again = execute(pool, Command::Migrate).await.unwrap();
        assert_eq!(again["applied"], 0);
    }

    #[tokio::test]
    async fn create_append_list() {
        let (_dir, pool) = temp_pool();
        let stream_id = Uuid::now_v7();

        let stream = execute(
            pool.clone(),
            Command::CreateStream {
                stream_id: Some(stream_id),
                idempotency_key: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(stream["streamId"], stream_id.to_string());
        assert_eq!(stream["latestVersion"], 0);

        let event = execute(
            pool.clone(),
            Command::Append {
                stream_id,
                expected_version: 0,
                payload: r#"{"test":"success"}"#.to_string(),
                idempotency_key: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(event["version"], 1);
        assert_eq!(event["payload"]["test"], "success");

        let events = execute(pool, Command::Events { stream_id }).await.unwrap();
        assert_eq!(events.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_append_surfaces_store_error() {
        let (_dir, pool) = temp_pool();
        let stream_id = Uuid::now_v7();
        execute(
            pool.clone(),
            Command::CreateStream {
                stream_id: Some(stream_id),
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

        let err = execute(
            pool,
            Command::Append {
                stream_id,
                expected_version: 5,
                payload: "{}".to_string(),
                idempotency_key: None,
            },
        )
        .await
        .unwrap_err();
        assert_matches!(
            err.downcast_ref::<EventStoreError>(),
            Some(EventStoreError::VersionIncrementFailure { .. })
        );
    }

    #[tokio::test]
    async fn invalid_payload_rejected() {
        let (_dir, pool) = temp_pool();
        let err = execute(
            pool,
            Command::Append {
                stream_id: Uuid::now_v7(),
                expected_version: 0,
                payload: "{oops".to_string(),
                idempotency_key: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("payload is not valid JSON"));
    }
}
