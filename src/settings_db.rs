use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use crate::error_codes::CodedError;

pub const SETTINGS_DB_FILE_NAME: &str = "settings.db";
pub const PRIOR_SNAPSHOT_FILE_NAME: &str = "wow_lights_prior.json";
pub const CHANGED_SNAPSHOT_FILE_NAME: &str = "wow_lights_changed.json";

const BACKUP_SUFFIX_FORMAT: &str = ".%Y-%m-%d_%H-%M-%S";
const ROW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Directory where G Hub keeps `settings.db`.
pub fn default_settings_dir() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(path) = env::var_os("LOCALAPPDATA") {
            return Ok(PathBuf::from(path).join("LGHUB"));
        }
        bail!("unable to resolve %LOCALAPPDATA% for the G Hub settings directory");
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = env::var_os("HOME") {
            return Ok(PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("lghub"));
        }
        bail!("unable to resolve HOME for the G Hub settings directory");
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Err(anyhow!(CodedError::usage(
            "UNSUPPORTED_PLATFORM",
            format!(
                "G Hub is not available on {}; pass --db with an explicit settings.db path",
                env::consts::OS
            ),
        )))
    }
}

pub fn default_settings_db_path() -> Result<PathBuf> {
    Ok(default_settings_dir()?.join(SETTINGS_DB_FILE_NAME))
}

/// Copies the database next to itself with a timestamp suffix.
pub fn make_backup(db_path: &Path) -> Result<PathBuf> {
    let suffix = Local::now().format(BACKUP_SUFFIX_FORMAT).to_string();
    let mut backup = db_path.as_os_str().to_owned();
    backup.push(suffix);
    let backup = PathBuf::from(backup);

    fs::copy(db_path, &backup).with_context(|| {
        format!(
            "failed to back up {} to {}",
            db_path.display(),
            backup.display()
        )
    })?;
    tracing::info!(backup = %backup.display(), "backed up settings database");
    Ok(backup)
}

pub fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)
        .with_context(|| format!("failed to write settings snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote settings snapshot");
    Ok(())
}

/// The G Hub settings store: a `DATA` table of `(_id, _date_created, FILE)`
/// rows where the newest row holds the live JSON settings blob.
pub struct SettingsDb {
    path: PathBuf,
    connection: Connection,
}

impl SettingsDb {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(anyhow!(CodedError::storage(
                "SETTINGS_DB_NOT_FOUND",
                format!("settings database was not found at {}", path.display()),
            )
            .with_details(json!({ "path": path.display().to_string() }))));
        }
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open settings database {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            connection,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn latest_id(&self) -> Result<i64> {
        let latest: Option<i64> = self
            .connection
            .query_row("SELECT MAX(_id) FROM DATA", [], |row| row.get(0))
            .with_context(|| {
                format!("failed to read latest id from {}", self.path.display())
            })?;
        latest.ok_or_else(|| {
            anyhow!(CodedError::storage(
                "SETTINGS_DB_EMPTY",
                format!("settings database {} has no rows", self.path.display()),
            ))
        })
    }

    pub fn read_blob(&self, id: i64) -> Result<Vec<u8>> {
        let blob: Option<Vec<u8>> = self
            .connection
            .query_row("SELECT FILE FROM DATA WHERE _id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("failed to read settings blob {id}"))?;
        match blob {
            Some(blob) => {
                tracing::debug!(id, bytes = blob.len(), "read settings blob");
                Ok(blob)
            }
            None => bail!("settings row {id} does not exist"),
        }
    }

    pub fn replace_blob(&self, id: i64, blob: &[u8]) -> Result<()> {
        let created = Local::now().format(ROW_TIMESTAMP_FORMAT).to_string();
        self.connection
            .execute(
                "REPLACE INTO DATA (_id, _date_created, FILE) VALUES (?1, ?2, ?3)",
                params![id, created, blob],
            )
            .with_context(|| format!("failed to store settings blob {id}"))?;
        tracing::info!(id, bytes = blob.len(), "stored patched settings blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_db(path: &Path, rows: &[(i64, &[u8])]) {
        let connection = Connection::open(path).expect("db should open");
        connection
            .execute(
                "CREATE TABLE DATA (_id INTEGER PRIMARY KEY, _date_created TEXT, FILE BLOB)",
                [],
            )
            .expect("table should create");
        for (id, blob) in rows {
            connection
                .execute(
                    "INSERT INTO DATA (_id, _date_created, FILE) VALUES (?1, '2024-01-01 00:00:00', ?2)",
                    params![id, blob],
                )
                .expect("row should insert");
        }
    }

    #[test]
    fn reads_latest_row_and_replaces_it() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join(SETTINGS_DB_FILE_NAME);
        create_db(&path, &[(1, b"old".as_slice()), (7, b"{\"a\":1}".as_slice())]);

        let db = SettingsDb::open(&path).expect("db should open");
        let latest = db.latest_id().expect("latest id");
        assert_eq!(latest, 7);
        assert_eq!(db.read_blob(latest).expect("blob"), b"{\"a\":1}".to_vec());

        db.replace_blob(latest, b"{\"a\":2}").expect("replace");
        assert_eq!(db.read_blob(latest).expect("blob"), b"{\"a\":2}".to_vec());
        assert_eq!(db.read_blob(1).expect("blob"), b"old".to_vec());
        assert!(db.read_blob(99).is_err());
    }

    #[test]
    fn empty_table_has_no_latest_id() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join(SETTINGS_DB_FILE_NAME);
        create_db(&path, &[]);
        let db = SettingsDb::open(&path).expect("db should open");
        assert!(db.latest_id().is_err());
    }

    #[test]
    fn missing_database_is_reported() {
        let dir = tempdir().expect("tempdir should create");
        assert!(SettingsDb::open(&dir.path().join("absent.db")).is_err());
    }

    #[test]
    fn backup_copies_database_with_timestamp_suffix() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join(SETTINGS_DB_FILE_NAME);
        fs::write(&path, b"sqlite bytes").expect("db should write");

        let backup = make_backup(&path).expect("backup");
        let name = backup
            .file_name()
            .and_then(|name| name.to_str())
            .expect("backup name");
        assert!(name.starts_with("settings.db."), "unexpected backup {name}");
        assert_eq!(fs::read(&backup).expect("backup read"), b"sqlite bytes");
    }
}
