// ==========================================
// SKD 套件追踪系统 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 幂等建表, 并写入六个生命周期事件类型
// ==========================================

use crate::domain::types::KitStatusCode;
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 都需要每个连接单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 状态事件、VIN 记录通过部分唯一索引保证"每套件每类型至多一条有效记录"与"有效 VIN 全局唯一"
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS kit_status_event_type (
            code TEXT PRIMARY KEY,
            sequence INTEGER NOT NULL UNIQUE,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS dealer (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS component (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS production_station (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sequence INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS component_station (
            component_code TEXT NOT NULL REFERENCES component(code),
            station_code TEXT NOT NULL REFERENCES production_station(code),
            PRIMARY KEY (component_code, station_code)
        );

        CREATE TABLE IF NOT EXISTS pcv (
            code TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS pcv_component (
            pcv_code TEXT NOT NULL REFERENCES pcv(code) ON DELETE CASCADE,
            component_code TEXT NOT NULL REFERENCES component(code),
            PRIMARY KEY (pcv_code, component_code)
        );

        CREATE TABLE IF NOT EXISTS lot (
            lot_no TEXT PRIMARY KEY,
            pcv_code TEXT NOT NULL REFERENCES pcv(code)
        );

        CREATE TABLE IF NOT EXISTS kit (
            kit_no TEXT PRIMARY KEY,
            lot_no TEXT NOT NULL REFERENCES lot(lot_no),
            vin TEXT,
            dealer_code TEXT REFERENCES dealer(code),
            revision INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_kit_lot ON kit(lot_no);

        CREATE TABLE IF NOT EXISTS kit_status_event (
            event_id TEXT PRIMARY KEY,
            kit_no TEXT NOT NULL REFERENCES kit(kit_no),
            event_code TEXT NOT NULL REFERENCES kit_status_event_type(code),
            event_date TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            removed_at TEXT,
            partner_ack_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_kit_status_event_active
            ON kit_status_event(kit_no, event_code) WHERE removed_at IS NULL;

        CREATE TABLE IF NOT EXISTS kit_vin (
            record_id TEXT PRIMARY KEY,
            kit_no TEXT NOT NULL REFERENCES kit(kit_no),
            vin TEXT NOT NULL,
            created_at TEXT NOT NULL,
            removed_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_kit_vin_active
            ON kit_vin(vin) WHERE removed_at IS NULL;

        CREATE TABLE IF NOT EXISTS kit_component (
            kit_component_id TEXT PRIMARY KEY,
            kit_no TEXT NOT NULL REFERENCES kit(kit_no),
            component_code TEXT NOT NULL REFERENCES component(code),
            station_code TEXT NOT NULL REFERENCES production_station(code),
            verified_at TEXT,
            UNIQUE (kit_no, component_code, station_code)
        );

        CREATE TABLE IF NOT EXISTS component_serial (
            serial_id TEXT PRIMARY KEY,
            kit_component_id TEXT NOT NULL REFERENCES kit_component(kit_component_id),
            serial1 TEXT NOT NULL,
            serial2 TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            removed_at TEXT
        );
        "#,
    )?;

    for (idx, code) in KitStatusCode::ALL.into_iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO kit_status_event_type (code, sequence, description) VALUES (?1, ?2, ?3)",
            params![code.to_db_str(), idx as i32 + 1, code.default_description()],
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
