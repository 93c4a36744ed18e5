use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db::DB_FILE_NAME;
use crate::store::{now_stamp, TABLES};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/confirmacion.sqlite3";
pub const BUNDLE_FORMAT: &str = "confirmacion-workspace-v1";
const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub row_counts: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn row_counts(conn: &Connection) -> anyhow::Result<Map<String, Value>> {
    let mut out = Map::new();
    for spec in TABLES {
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", spec.name), [], |r| r.get(0))
            .with_context(|| format!("failed to count {}", spec.name))?;
        out.insert(spec.name.to_string(), Value::from(n));
    }
    Ok(out)
}

/// Zip the workspace database with a manifest describing it.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    conn: &Connection,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let counts = row_counts(conn)?;
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": now_stamp(),
        "rowCounts": counts,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    tracing::info!(out = %out_path.display(), "workspace exported");
    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        row_counts: counts,
    })
}

/// Replace the workspace database with the one in `in_path`, either a bundle
/// or a bare SQLite file. The current database is only replaced once the
/// incoming one has been extracted and checked.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!("failed to create workspace {}", workspace_path.to_string_lossy())
    })?;
    let dst = workspace_path.join(DB_FILE_NAME);
    let tmp_dst = workspace_path.join(format!("{}.importing", DB_FILE_NAME));
    if tmp_dst.exists() {
        std::fs::remove_file(&tmp_dst).with_context(|| {
            format!("failed to remove stale import {}", tmp_dst.to_string_lossy())
        })?;
    }

    let detected = if is_zip_file(in_path)? {
        extract_bundle(in_path, &tmp_dst)?;
        BUNDLE_FORMAT
    } else {
        std::fs::copy(in_path, &tmp_dst).with_context(|| {
            format!("failed to copy sqlite backup from {}", in_path.to_string_lossy())
        })?;
        RAW_SQLITE_FORMAT
    };

    if let Err(e) = check_database(&tmp_dst) {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(e);
    }
    std::fs::rename(&tmp_dst, &dst)
        .with_context(|| format!("failed to move imported database to {}", dst.to_string_lossy()))?;

    tracing::info!(input = %in_path.display(), format = detected, "workspace imported");
    Ok(ImportSummary {
        bundle_format_detected: detected.to_string(),
    })
}

fn extract_bundle(in_path: &Path, tmp_dst: &Path) -> anyhow::Result<()> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest.get("format").and_then(|v| v.as_str()).unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut db_out = File::create(tmp_dst)
        .with_context(|| format!("failed to create temp database {}", tmp_dst.to_string_lossy()))?;
    let mut db_entry = archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?;
    std::io::copy(&mut db_entry, &mut db_out).context("failed to extract database entry")?;
    db_out.flush().context("failed to flush extracted database")?;
    Ok(())
}

/// The file must open as SQLite and carry the accounts table.
fn check_database(path: &Path) -> anyhow::Result<()> {
    let conn = Connection::open(path).context("imported file is not a SQLite database")?;
    let found: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'usuarios'",
            [],
            |r| r.get(0),
        )
        .context("imported file is not a SQLite database")?;
    if found == 0 {
        return Err(anyhow!("imported database is not a confirmación workspace"));
    }
    Ok(())
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    Ok(read == 4 && sig == [0x50, 0x4B, 0x03, 0x04])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("confirmacion-{}-{}", tag, uuid::Uuid::new_v4()))
    }

    #[test]
    fn bundle_round_trip_restores_rows() {
        let src = temp_dir("backup-src");
        let conn = open_db(&src).expect("open");
        conn.execute(
            "INSERT INTO usuarios(usuario, password_hash, rol) VALUES('admin', 'x', 'admin')",
            [],
        )
        .expect("insert");
        let bundle = src.join("out").join("respaldo.zip");
        let summary = export_workspace_bundle(&src, &conn, &bundle).expect("export");
        assert_eq!(summary.bundle_format, BUNDLE_FORMAT);
        assert_eq!(summary.row_counts["usuarios"], json!(1));

        let dst = temp_dir("backup-dst");
        let imported = import_workspace_bundle(&bundle, &dst).expect("import");
        assert_eq!(imported.bundle_format_detected, BUNDLE_FORMAT);
        let restored = open_db(&dst).expect("reopen");
        let n: i64 = restored
            .query_row("SELECT COUNT(*) FROM usuarios", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);
    }

    #[test]
    fn foreign_files_leave_the_workspace_alone() {
        let dst = temp_dir("backup-bad");
        let conn = open_db(&dst).expect("open");
        drop(conn);
        let junk = dst.join("junk.txt");
        std::fs::write(&junk, "not a database at all").expect("write");
        assert!(import_workspace_bundle(&junk, &dst).is_err());
        assert!(dst.join(DB_FILE_NAME).is_file());
        assert!(!dst.join(format!("{}.importing", DB_FILE_NAME)).exists());
    }
}
