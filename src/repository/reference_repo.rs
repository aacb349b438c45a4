// ==========================================
// SKD 套件追踪系统 - 参考数据仓储
// ==========================================
// 职责: 事件类型目录、车型配置(PCV)、组件、工位、组件-工位映射、批次、经销商
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::event_type::{EventType, EventTypeCatalog};
use crate::domain::reference::{
    Component, Dealer, Lot, ProductionStation, StationMappingEntry, StationMappingInput,
    VehicleProfile,
};
use crate::domain::types::KitStatusCode;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// 共享查询（事务内外复用, 调用方提供连接）
// ==========================================

pub(crate) fn load_event_type_catalog(conn: &Connection) -> RepositoryResult<EventTypeCatalog> {
    let mut stmt = conn.prepare(
        "SELECT code, sequence, description FROM kit_status_event_type ORDER BY sequence ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    let types = rows
        .into_iter()
        .map(|(code, sequence, description)| {
            let code = KitStatusCode::from_db_str(&code).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "kit_status_event_type.code".to_string(),
                    message: format!("未知事件类型: {}", code),
                }
            })?;
            Ok(EventType::new(code, sequence, &description))
        })
        .collect::<RepositoryResult<Vec<_>>>()?;

    Ok(EventTypeCatalog::new(types))
}

pub(crate) fn find_lot(conn: &Connection, lot_no: &str) -> RepositoryResult<Option<Lot>> {
    let lot = conn
        .query_row(
            "SELECT lot_no, pcv_code FROM lot WHERE lot_no = ?1",
            params![lot_no],
            |row| {
                Ok(Lot {
                    lot_no: row.get(0)?,
                    pcv_code: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(lot)
}

pub(crate) fn find_dealer(conn: &Connection, code: &str) -> RepositoryResult<Option<Dealer>> {
    let dealer = conn
        .query_row(
            "SELECT code, name FROM dealer WHERE code = ?1",
            params![code],
            |row| {
                Ok(Dealer {
                    code: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(dealer)
}

pub(crate) fn find_production_station(
    conn: &Connection,
    code: &str,
) -> RepositoryResult<Option<ProductionStation>> {
    let station = conn
        .query_row(
            "SELECT code, name, sequence FROM production_station WHERE code = ?1",
            params![code],
            |row| {
                Ok(ProductionStation {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    sequence: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(station)
}

pub(crate) fn find_vehicle_profile(
    conn: &Connection,
    code: &str,
) -> RepositoryResult<Option<VehicleProfile>> {
    let description: Option<String> = conn
        .query_row(
            "SELECT description FROM pcv WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )
        .optional()?;
    let Some(description) = description else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT component_code FROM pcv_component WHERE pcv_code = ?1 ORDER BY component_code ASC",
    )?;
    let required_component_codes = stmt
        .query_map(params![code], |row| row.get::<_, String>(0))?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(Some(VehicleProfile {
        code: code.to_string(),
        description,
        required_component_codes,
    }))
}

pub(crate) fn list_station_mappings(conn: &Connection) -> RepositoryResult<Vec<StationMappingEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT cs.component_code, cs.station_code, ps.sequence
        FROM component_station cs
        JOIN production_station ps ON ps.code = cs.station_code
        ORDER BY ps.sequence ASC, cs.component_code ASC
        "#,
    )?;
    let mappings = stmt
        .query_map([], |row| {
            Ok(StationMappingEntry {
                component_code: row.get(0)?,
                station_code: row.get(1)?,
                station_sequence: row.get(2)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(mappings)
}

fn find_missing_codes(conn: &Connection, table_sql: &str, codes: &[String]) -> RepositoryResult<Vec<String>> {
    let mut stmt = conn.prepare(table_sql)?;
    let mut missing = Vec::new();
    for code in codes {
        let exists = stmt
            .query_row(params![code], |_row| Ok(()))
            .optional()?
            .is_some();
        if !exists && !missing.contains(code) {
            missing.push(code.clone());
        }
    }
    Ok(missing)
}

// ==========================================
// ReferenceDataRepository
// ==========================================
pub struct ReferenceDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceDataRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 查询 =====

    pub fn load_event_type_catalog(&self) -> RepositoryResult<EventTypeCatalog> {
        let conn = self.get_conn()?;
        load_event_type_catalog(&conn)
    }

    pub fn find_lot(&self, lot_no: &str) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        find_lot(&conn, lot_no)
    }

    pub fn find_vehicle_profile(&self, code: &str) -> RepositoryResult<Option<VehicleProfile>> {
        let conn = self.get_conn()?;
        find_vehicle_profile(&conn, code)
    }

    pub fn list_dealers(&self) -> RepositoryResult<Vec<Dealer>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT code, name FROM dealer ORDER BY code ASC")?;
        let dealers = stmt
            .query_map([], |row| {
                Ok(Dealer {
                    code: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(dealers)
    }

    pub fn list_station_mappings(&self) -> RepositoryResult<Vec<StationMappingEntry>> {
        let conn = self.get_conn()?;
        list_station_mappings(&conn)
    }

    /// 输入中不存在于 component 表的代码（去重, 保持输入顺序）
    pub fn find_missing_component_codes(&self, codes: &[String]) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        find_missing_codes(&conn, "SELECT 1 FROM component WHERE code = ?1", codes)
    }

    /// 输入中不存在于 production_station 表的代码（去重, 保持输入顺序）
    pub fn find_missing_station_codes(&self, codes: &[String]) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        find_missing_codes(&conn, "SELECT 1 FROM production_station WHERE code = ?1", codes)
    }

    // ===== 维护 =====

    pub fn create_dealer(&self, dealer: &Dealer) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO dealer (code, name) VALUES (?1, ?2)",
            params![dealer.code, dealer.name],
        )?;
        Ok(())
    }

    pub fn create_component(&self, component: &Component) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO component (code, name) VALUES (?1, ?2)",
            params![component.code, component.name],
        )?;
        Ok(())
    }

    pub fn create_production_station(&self, station: &ProductionStation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO production_station (code, name, sequence) VALUES (?1, ?2, ?3)",
            params![station.code, station.name, station.sequence],
        )?;
        Ok(())
    }

    /// 创建车型配置及其所需组件（事务）
    pub fn create_vehicle_profile(&self, profile: &VehicleProfile) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO pcv (code, description) VALUES (?1, ?2)",
            params![profile.code, profile.description],
        )?;
        for component_code in &profile.required_component_codes {
            tx.execute(
                "INSERT OR IGNORE INTO pcv_component (pcv_code, component_code) VALUES (?1, ?2)",
                params![profile.code, component_code],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn create_lot(&self, lot: &Lot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO lot (lot_no, pcv_code) VALUES (?1, ?2)",
            params![lot.lot_no, lot.pcv_code],
        )?;
        Ok(())
    }

    /// 替换输入中各组件的全部映射（事务）
    ///
    /// 返回写入的映射条数
    pub fn replace_station_mappings(&self, mappings: &[StationMappingInput]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut component_codes: Vec<&str> = mappings.iter().map(|m| m.component_code.as_str()).collect();
        component_codes.sort_unstable();
        component_codes.dedup();
        for code in component_codes {
            tx.execute(
                "DELETE FROM component_station WHERE component_code = ?1",
                params![code],
            )?;
        }

        let mut written = 0;
        for mapping in mappings {
            written += tx.execute(
                "INSERT OR IGNORE INTO component_station (component_code, station_code) VALUES (?1, ?2)",
                params![mapping.component_code, mapping.station_code],
            )?;
        }

        tx.commit()?;
        Ok(written)
    }

    /// 删除全部映射, 返回删除条数
    pub fn remove_all_station_mappings(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let removed = conn.execute("DELETE FROM component_station", [])?;
        Ok(removed)
    }
}
