use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::geometry::RegionCoords;
use crate::patcher::{
    parse_document, patch_document, serialize_document, validate_document, PatchReport, Validation,
};
use crate::settings_db::{
    make_backup, write_snapshot, SettingsDb, CHANGED_SNAPSHOT_FILE_NAME, PRIOR_SNAPSHOT_FILE_NAME,
};

#[derive(Debug, Clone)]
pub struct PatchFileRequest {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub db_path: PathBuf,
    /// Where the prior/changed JSON snapshots go; defaults to the database directory.
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ApplySummary {
    pub row_id: i64,
    pub backup_path: PathBuf,
    pub prior_snapshot: PathBuf,
    pub changed_snapshot: PathBuf,
    pub report: PatchReport,
}

pub fn check_file(input: &Path) -> Result<Validation> {
    let bytes =
        fs::read(input).with_context(|| format!("failed to read settings {}", input.display()))?;
    let document = parse_document(&bytes)
        .with_context(|| format!("failed to load settings {}", input.display()))?;
    let validation = validate_document(&document)
        .with_context(|| format!("settings {} cannot be patched", input.display()))?;
    Ok(validation)
}

/// Patches a settings JSON file into `output`. Nothing is written when the
/// document does not qualify.
pub fn patch_file(request: &PatchFileRequest, coords: &RegionCoords) -> Result<PatchReport> {
    let bytes = fs::read(&request.input)
        .with_context(|| format!("failed to read settings {}", request.input.display()))?;
    let mut document = parse_document(&bytes)
        .with_context(|| format!("failed to load settings {}", request.input.display()))?;
    let report = patch_document(&mut document, coords)
        .with_context(|| format!("failed to patch settings {}", request.input.display()))?;
    let patched = serialize_document(&document)?;

    fs::write(&request.output, patched)
        .with_context(|| format!("failed to write {}", request.output.display()))?;
    Ok(report)
}

/// Full run against the G Hub settings database: back up, extract the newest
/// blob, patch it, and store it back only once patching has succeeded.
pub fn apply_to_database(request: &ApplyRequest, coords: &RegionCoords) -> Result<ApplySummary> {
    let db = SettingsDb::open(&request.db_path)?;
    let snapshot_dir = match &request.snapshot_dir {
        Some(dir) => dir.clone(),
        None => request
            .db_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    };

    let row_id = db.latest_id()?;
    let original = db.read_blob(row_id)?;
    let prior_snapshot = snapshot_dir.join(PRIOR_SNAPSHOT_FILE_NAME);
    write_snapshot(&prior_snapshot, &original)?;
    let backup_path = make_backup(db.path())?;

    let mut document = parse_document(&original)
        .with_context(|| format!("failed to load settings row {row_id}"))?;
    let report = patch_document(&mut document, coords)
        .with_context(|| format!("failed to patch settings row {row_id}"))?;
    let patched = serialize_document(&document)?;

    let changed_snapshot = snapshot_dir.join(CHANGED_SNAPSHOT_FILE_NAME);
    write_snapshot(&changed_snapshot, patched.as_bytes())?;
    db.replace_blob(row_id, patched.as_bytes())?;

    Ok(ApplySummary {
        row_id,
        backup_path,
        prior_snapshot,
        changed_snapshot,
        report,
    })
}
