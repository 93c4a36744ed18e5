use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::roster;

pub const DB_FILE_NAME: &str = "confirmacion.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS usuarios(
            usuario TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            rol TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS estudiantes(
            id TEXT PRIMARY KEY,
            grupo TEXT NOT NULL,
            nombre TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_estudiantes_grupo_sort ON estudiantes(grupo, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS catequistas(
            nombre TEXT PRIMARY KEY,
            grupo TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    // Session-keyed tables carry both key columns; only one is filled per
    // row depending on the workspace session scheme. NULLs never collide in
    // a UNIQUE index, so each scheme upserts against its own index.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS asistencias(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            fecha TEXT,
            estado TEXT NOT NULL CHECK(estado IN ('ausente', 'presente', 'justificado')),
            updated_at TEXT
        )",
        [],
    )?;
    ensure_catequesis_num(&conn, "asistencias")?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_asistencias_fecha
         ON asistencias(grupo, estudiante_id, fecha)",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_asistencias_num
         ON asistencias(grupo, estudiante_id, catequesis_num)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS asistencia_catequistas(
            catequista_nombre TEXT NOT NULL,
            grupo TEXT,
            fecha TEXT,
            estado TEXT NOT NULL CHECK(estado IN ('ausente', 'presente', 'justificado')),
            updated_at TEXT
        )",
        [],
    )?;
    ensure_catequesis_num(&conn, "asistencia_catequistas")?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_asistencia_catequistas_fecha
         ON asistencia_catequistas(catequista_nombre, fecha)",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_asistencia_catequistas_num
         ON asistencia_catequistas(catequista_nombre, catequesis_num)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documentos_entregados(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            documento_tipo TEXT NOT NULL,
            entregado INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id, documento_tipo)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cartas_entregadas(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            estudiante_nombre TEXT,
            entregada INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sabanas_entregadas(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            estudiante_nombre TEXT,
            entregado INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pagos_retiro(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            estudiante_nombre TEXT,
            monto_pagado INTEGER NOT NULL CHECK(monto_pagado >= 0),
            monto_requerido INTEGER NOT NULL,
            pagado INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pagos_catequistas(
            catequista_nombre TEXT NOT NULL UNIQUE,
            monto_pagado INTEGER NOT NULL CHECK(monto_pagado >= 0),
            monto_requerido INTEGER NOT NULL,
            pagado INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notas_estudiantes(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            notas TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contactos_estudiantes(
            grupo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            cedula TEXT,
            telefono TEXT,
            email TEXT,
            encargado TEXT,
            updated_at TEXT,
            UNIQUE(grupo, estudiante_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS gastos_confirmacion(
            id TEXT PRIMARY KEY,
            concepto TEXT NOT NULL,
            monto REAL NOT NULL,
            fecha TEXT NOT NULL,
            categoria TEXT NOT NULL,
            descripcion TEXT,
            pagado_por TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_gastos_fecha ON gastos_confirmacion(fecha)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ingresos_confirmacion(
            id TEXT PRIMARY KEY,
            origen TEXT NOT NULL,
            monto REAL NOT NULL,
            fecha TEXT NOT NULL,
            metodo TEXT NOT NULL,
            descripcion TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ingresos_fecha ON ingresos_confirmacion(fecha)",
        [],
    )?;

    seed_catechists(&conn)?;

    Ok(conn)
}

/// Workspaces created while attendance was date-keyed only have `fecha`.
fn ensure_catequesis_num(conn: &Connection, table: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, "catequesis_num")? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN catequesis_num INTEGER", table),
        [],
    )?;
    Ok(())
}

fn seed_catechists(conn: &Connection) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO catequistas(nombre, grupo, sort_order) VALUES(?, ?, ?)",
    )?;
    for (i, (nombre, grupo)) in roster::CATECHISTS.iter().enumerate() {
        stmt.execute((nombre, grupo, i as i64))?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
