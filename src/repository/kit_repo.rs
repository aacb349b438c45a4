// ==========================================
// SKD 套件追踪系统 - 套件聚合仓储
// ==========================================
// 职责: 套件聚合的加载与保存（状态事件、VIN 历史、组件、扫码）
// 红线: Repository 不含业务逻辑
// 红线: 每个对外操作在一个事务中完成; 保存时校验并推进 kit.revision
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::event_type::EventTypeCatalog;
use crate::domain::kit::{ComponentSerial, Kit, KitComponent, KitHeader, StatusEvent, VinRecord};
use crate::domain::reference::{Dealer, Lot, ProductionStation, StationMappingEntry, VehicleProfile};
use crate::domain::types::{KitStatusCode, RecordState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reference_repo;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// KitRepository
// ==========================================
pub struct KitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl KitRepository {
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

    /// 在单个事务中执行操作
    ///
    /// 闭包返回 Err 时事务回滚（Transaction drop 即回滚）
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&KitStore<'_>) -> Result<T, E>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;
        let result = f(&KitStore { conn: &tx })?;
        tx.commit().map_err(RepositoryError::from)?;
        Ok(result)
    }

    /// 创建空套件（无事件、无组件）
    pub fn create_kit(&self, kit_no: &str, lot_no: &str) -> RepositoryResult<Kit> {
        let conn = self.get_conn()?;
        let kit = Kit::new(kit_no, lot_no);
        KitStore { conn: &conn }.insert_kit(&kit)?;
        Ok(kit)
    }

    pub fn find_kit(&self, kit_no: &str) -> RepositoryResult<Option<Kit>> {
        let conn = self.get_conn()?;
        KitStore { conn: &conn }.find_kit(kit_no)
    }

    pub fn list_kits_in_lot(&self, lot_no: &str) -> RepositoryResult<Vec<Kit>> {
        let conn = self.get_conn()?;
        KitStore { conn: &conn }.list_kits_in_lot(lot_no)
    }
}

// ==========================================
// KitStore - 绑定到单个连接/事务的数据访问
// ==========================================
pub struct KitStore<'c> {
    conn: &'c Connection,
}

impl<'c> KitStore<'c> {
    // ===== 参考数据 =====

    pub fn load_event_type_catalog(&self) -> RepositoryResult<EventTypeCatalog> {
        reference_repo::load_event_type_catalog(self.conn)
    }

    pub fn find_lot(&self, lot_no: &str) -> RepositoryResult<Option<Lot>> {
        reference_repo::find_lot(self.conn, lot_no)
    }

    pub fn find_dealer(&self, code: &str) -> RepositoryResult<Option<Dealer>> {
        reference_repo::find_dealer(self.conn, code)
    }

    pub fn find_production_station(&self, code: &str) -> RepositoryResult<Option<ProductionStation>> {
        reference_repo::find_production_station(self.conn, code)
    }

    pub fn find_vehicle_profile(&self, code: &str) -> RepositoryResult<Option<VehicleProfile>> {
        reference_repo::find_vehicle_profile(self.conn, code)
    }

    pub fn list_station_mappings(&self) -> RepositoryResult<Vec<StationMappingEntry>> {
        reference_repo::list_station_mappings(self.conn)
    }

    /// 全部有效 VIN: vin -> kit_no
    pub fn active_vin_holders(&self) -> RepositoryResult<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT vin, kit_no FROM kit_vin WHERE removed_at IS NULL")?;
        let holders = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<SqliteResult<HashMap<_, _>>>()?;
        Ok(holders)
    }

    // ===== 套件加载 =====

    pub fn find_kit(&self, kit_no: &str) -> RepositoryResult<Option<Kit>> {
        let header = self
            .conn
            .query_row(
                "SELECT kit_no, lot_no, vin, dealer_code, revision FROM kit WHERE kit_no = ?1",
                params![kit_no],
                map_header,
            )
            .optional()?;

        match header {
            Some(header) => self.load_aggregate(header).map(Some),
            None => Ok(None),
        }
    }

    pub fn list_kits_in_lot(&self, lot_no: &str) -> RepositoryResult<Vec<Kit>> {
        self.load_kits(
            "SELECT kit_no, lot_no, vin, dealer_code, revision FROM kit WHERE lot_no = ?1 ORDER BY kit_no ASC",
            params![lot_no],
        )
    }

    pub fn list_all_kits(&self) -> RepositoryResult<Vec<Kit>> {
        self.load_kits(
            "SELECT kit_no, lot_no, vin, dealer_code, revision FROM kit ORDER BY kit_no ASC",
            [],
        )
    }

    fn load_kits<P: rusqlite::Params>(&self, sql: &str, p: P) -> RepositoryResult<Vec<Kit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let headers = stmt
            .query_map(p, map_header)?
            .collect::<SqliteResult<Vec<_>>>()?;
        headers
            .into_iter()
            .map(|header| self.load_aggregate(header))
            .collect()
    }

    fn load_aggregate(&self, header: KitHeader) -> RepositoryResult<Kit> {
        let events = self.load_status_events(&header.kit_no)?;
        let vins = self.load_vin_history(&header.kit_no)?;
        let components = self.load_components(&header.kit_no)?;
        Ok(Kit::restore(header, components, events, vins))
    }

    fn load_status_events(&self, kit_no: &str) -> RepositoryResult<Vec<StatusEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT event_id, event_code, event_date, note, created_at, removed_at, partner_ack_at
            FROM kit_status_event
            WHERE kit_no = ?1
            ORDER BY rowid ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![kit_no], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, NaiveDateTime>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                    row.get::<_, Option<DateTime<Utc>>>(5)?,
                    row.get::<_, Option<DateTime<Utc>>>(6)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(event_id, code, event_date, note, created_at, removed_at, partner_ack_at)| {
                    let code = KitStatusCode::from_db_str(&code).ok_or_else(|| {
                        RepositoryError::FieldValueError {
                            field: "kit_status_event.event_code".to_string(),
                            message: format!("未知事件类型: {}", code),
                        }
                    })?;
                    Ok(StatusEvent {
                        event_id,
                        code,
                        event_date,
                        note,
                        created_at,
                        state: RecordState::from_removed_at(removed_at),
                        partner_ack_at,
                    })
                },
            )
            .collect()
    }

    fn load_vin_history(&self, kit_no: &str) -> RepositoryResult<Vec<VinRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, vin, created_at, removed_at FROM kit_vin WHERE kit_no = ?1 ORDER BY rowid ASC",
        )?;
        let records = stmt
            .query_map(params![kit_no], |row| {
                Ok(VinRecord {
                    record_id: row.get(0)?,
                    vin: row.get(1)?,
                    created_at: row.get(2)?,
                    state: RecordState::from_removed_at(row.get(3)?),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    fn load_components(&self, kit_no: &str) -> RepositoryResult<Vec<KitComponent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT kit_component_id, component_code, station_code, verified_at
            FROM kit_component
            WHERE kit_no = ?1
            ORDER BY rowid ASC
            "#,
        )?;
        let mut components = stmt
            .query_map(params![kit_no], |row| {
                Ok(KitComponent {
                    kit_component_id: row.get(0)?,
                    component_code: row.get(1)?,
                    station_code: row.get(2)?,
                    serials: Vec::new(),
                    verified_at: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut serial_stmt = self.conn.prepare(
            r#"
            SELECT serial_id, serial1, serial2, created_at, removed_at
            FROM component_serial
            WHERE kit_component_id = ?1
            ORDER BY rowid ASC
            "#,
        )?;
        for component in &mut components {
            component.serials = serial_stmt
                .query_map(params![component.kit_component_id], |row| {
                    Ok(ComponentSerial {
                        serial_id: row.get(0)?,
                        serial1: row.get(1)?,
                        serial2: row.get(2)?,
                        created_at: row.get(3)?,
                        state: RecordState::from_removed_at(row.get(4)?),
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
        }

        Ok(components)
    }

    // ===== 套件保存 =====

    pub fn insert_kit(&self, kit: &Kit) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT INTO kit (kit_no, lot_no, vin, dealer_code, revision) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kit.kit_no(),
                kit.lot_no(),
                kit.vin(),
                kit.dealer_code(),
                kit.revision()
            ],
        )?;
        Ok(())
    }

    /// 保存套件聚合（带乐观锁检查）
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配（其他操作已保存）
    /// - `RepositoryError::NotFound`: kit_no 不存在
    pub fn save_kit(&self, kit: &mut Kit) -> RepositoryResult<()> {
        let rows_affected = self.conn.execute(
            r#"UPDATE kit
               SET vin = ?1, dealer_code = ?2, revision = revision + 1
               WHERE kit_no = ?3 AND revision = ?4"#,
            params![kit.vin(), kit.dealer_code(), kit.kit_no(), kit.revision()],
        )?;

        if rows_affected == 0 {
            let actual: Option<i64> = self
                .conn
                .query_row(
                    "SELECT revision FROM kit WHERE kit_no = ?1",
                    params![kit.kit_no()],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    kit_no: kit.kit_no().to_string(),
                    expected: kit.revision(),
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "Kit".to_string(),
                    id: kit.kit_no().to_string(),
                },
            });
        }

        // 先软删除旧记录再插入新记录, 满足"每类型至多一条有效记录"的部分唯一索引
        for event in kit.status_events() {
            self.upsert_status_event(kit.kit_no(), event)?;
        }
        for record in kit.vin_history() {
            self.upsert_vin_record(kit.kit_no(), record)?;
        }
        self.save_components(kit)?;

        kit.mark_saved();
        Ok(())
    }

    fn upsert_status_event(&self, kit_no: &str, event: &StatusEvent) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO kit_status_event (
                event_id, kit_no, event_code, event_date, note, created_at, removed_at, partner_ack_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(event_id) DO UPDATE SET
                removed_at = excluded.removed_at,
                partner_ack_at = excluded.partner_ack_at
            "#,
            params![
                event.event_id,
                kit_no,
                event.code.to_db_str(),
                event.event_date,
                event.note,
                event.created_at,
                event.state.removed_at(),
                event.partner_ack_at,
            ],
        )?;
        Ok(())
    }

    fn upsert_vin_record(&self, kit_no: &str, record: &VinRecord) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO kit_vin (record_id, kit_no, vin, created_at, removed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(record_id) DO UPDATE SET
                removed_at = excluded.removed_at
            "#,
            params![
                record.record_id,
                kit_no,
                record.vin,
                record.created_at,
                record.state.removed_at(),
            ],
        )?;
        Ok(())
    }

    fn save_components(&self, kit: &Kit) -> RepositoryResult<()> {
        let kept: HashSet<&str> = kit
            .components()
            .iter()
            .map(|c| c.kit_component_id.as_str())
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT kit_component_id FROM kit_component WHERE kit_no = ?1")?;
        let stored = stmt
            .query_map(params![kit.kit_no()], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;

        for id in stored.iter().filter(|id| !kept.contains(id.as_str())) {
            self.conn.execute(
                "DELETE FROM kit_component WHERE kit_component_id = ?1",
                params![id],
            )?;
        }

        for component in kit.components() {
            self.conn.execute(
                r#"
                INSERT INTO kit_component (kit_component_id, kit_no, component_code, station_code, verified_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(kit_component_id) DO UPDATE SET
                    station_code = excluded.station_code,
                    verified_at = excluded.verified_at
                "#,
                params![
                    component.kit_component_id,
                    kit.kit_no(),
                    component.component_code,
                    component.station_code,
                    component.verified_at,
                ],
            )?;

            for serial in &component.serials {
                self.conn.execute(
                    r#"
                    INSERT INTO component_serial (serial_id, kit_component_id, serial1, serial2, created_at, removed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(serial_id) DO UPDATE SET
                        removed_at = excluded.removed_at
                    "#,
                    params![
                        serial.serial_id,
                        component.kit_component_id,
                        serial.serial1,
                        serial.serial2,
                        serial.created_at,
                        serial.state.removed_at(),
                    ],
                )?;
            }
        }

        Ok(())
    }
}

fn map_header(row: &rusqlite::Row) -> rusqlite::Result<KitHeader> {
    Ok(KitHeader {
        kit_no: row.get(0)?,
        lot_no: row.get(1)?,
        vin: row.get(2)?,
        dealer_code: row.get(3)?,
        revision: row.get(4)?,
    })
}
