//! Loading reference masters and authority documents from a YAML seed file.
//!
//! Masters are not managed by the engine, so a deployment fills them from a seed document.
//! Entries refer to one another by name (a test definition names its category, a link names
//! its room and doctor), and ids are generated when an entry does not carry one.
//!
//! ```yaml
//! departments:
//!   - name: Pathology
//!     code: PATH
//! rooms:
//!   - name: room 12
//! doctors:
//!   - name: Dr. Rao
//! roomDoctorLinks:
//!   - room: RM-12
//!     doctor: Dr. Rao
//! categories:
//!   - name: HAEMATOLOGY
//! testDefinitions:
//!   - name: CBC
//!     shortName: Complete Blood Count
//!     category: HAEMATOLOGY
//!     parameters:
//!       - name: Haemoglobin
//!         unit: g/dL
//! ```

use super::sqlite::{format_timestamp, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::masters::TestParameterDef;
use crate::reference::normalise_room_number;
use chrono::{DateTime, Utc};
use lab_uuid::RecordId;
use rusqlite::{params, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedSeed {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl NamedSeed {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            code: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoctorLink {
    pub room: String,
    pub doctor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSeed {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinitionSeed {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSeed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntrySeed {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub alias_name: String,
    #[serde(default)]
    pub category_head: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritySeed {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub receipt_no: String,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    /// Remaining document fields (`mode`, `patientType`, ...).
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

/// Full content of a seed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterSeed {
    pub patients: Vec<NamedSeed>,
    pub departments: Vec<NamedSeed>,
    pub doctors: Vec<NamedSeed>,
    pub rooms: Vec<NamedSeed>,
    pub room_doctor_links: Vec<RoomDoctorLink>,
    pub categories: Vec<NamedSeed>,
    pub category_heads: Vec<NamedSeed>,
    pub units: Vec<NamedSeed>,
    pub test_definitions: Vec<TestDefinitionSeed>,
    pub service_entries: Vec<ServiceEntrySeed>,
    pub invoices: Vec<AuthoritySeed>,
    pub registrations: Vec<AuthoritySeed>,
}

impl MasterSeed {
    /// Parses a seed document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SeedParse` if the YAML is malformed or does not fit the seed shape.
    pub fn from_yaml(text: &str) -> StoreResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Number of records written per master table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub patients: usize,
    pub departments: usize,
    pub doctors: usize,
    pub rooms: usize,
    pub room_doctor_links: usize,
    pub categories: usize,
    pub category_heads: usize,
    pub units: usize,
    pub test_definitions: usize,
    pub service_entries: usize,
    pub invoices: usize,
    pub registrations: usize,
}

/// Lower-cased name to id, for resolving references between seed entries.
type NameIndex = HashMap<String, RecordId>;

fn index_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn lookup(index: &NameIndex, kind: &str, name: &str) -> StoreResult<RecordId> {
    index
        .get(&index_key(name))
        .copied()
        .ok_or_else(|| StoreError::SeedEntry(format!("unknown {kind} '{name}'")))
}

fn insert_named(tx: &Transaction<'_>, table: &str, entries: &[NamedSeed]) -> StoreResult<NameIndex> {
    let sql = format!("INSERT OR REPLACE INTO {table} (id, name, code) VALUES (?1, ?2, ?3)");
    let mut stmt = tx.prepare(&sql)?;
    let mut index = NameIndex::new();

    for entry in entries {
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(StoreError::SeedEntry(format!("{table} entry without a name")));
        }
        let id = entry.id.unwrap_or_default();
        stmt.execute(params![id.to_string(), name, entry.code])?;
        index.insert(index_key(name), id);
    }

    Ok(index)
}

fn insert_labels(tx: &Transaction<'_>, table: &str, entries: &[NamedSeed]) -> StoreResult<NameIndex> {
    let sql = format!("INSERT OR REPLACE INTO {table} (id, name) VALUES (?1, ?2)");
    let mut stmt = tx.prepare(&sql)?;
    let mut index = NameIndex::new();

    for entry in entries {
        let id = entry.id.unwrap_or_default();
        stmt.execute(params![id.to_string(), entry.name.trim()])?;
        index.insert(index_key(&entry.name), id);
    }

    Ok(index)
}

fn insert_authority(
    tx: &Transaction<'_>,
    table: &str,
    entries: &[AuthoritySeed],
) -> StoreResult<usize> {
    for entry in entries {
        let id = entry.id.unwrap_or_default();
        let body = serde_json::to_string(&entry.body)?;
        match table {
            "invoices" => {
                tx.execute(
                    "INSERT OR REPLACE INTO invoices (id, receipt_no, body) VALUES (?1, ?2, ?3)",
                    params![id.to_string(), entry.receipt_no, body],
                )?;
            }
            _ => {
                tx.execute(
                    "INSERT OR REPLACE INTO registrations
                     (id, receipt_no, registration_no, registered_at, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id.to_string(),
                        entry.receipt_no,
                        entry.registration_no,
                        entry.registered_at.as_ref().map(format_timestamp),
                        body,
                    ],
                )?;
            }
        }
    }
    Ok(entries.len())
}

impl SqliteStore {
    /// Writes every entry of `seed` in a single transaction.
    ///
    /// Room names are stored in canonical form (`room 12` becomes `RM-12`). Entries carrying an
    /// id replace any existing record with that id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SeedEntry` if an entry names a room, doctor, category, category head
    /// or unit that the seed does not define. Nothing is written in that case.
    pub fn seed(&self, seed: &MasterSeed) -> StoreResult<SeedSummary> {
        let rooms = seed
            .rooms
            .iter()
            .map(|room| {
                let name = normalise_room_number(&room.name).ok_or_else(|| {
                    StoreError::SeedEntry(format!("invalid room number '{}'", room.name))
                })?;
                Ok(NamedSeed {
                    name,
                    ..room.clone()
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        insert_named(&tx, "patients", &seed.patients)?;
        insert_named(&tx, "departments", &seed.departments)?;
        let doctor_index = insert_named(&tx, "doctors", &seed.doctors)?;
        let room_index = insert_named(&tx, "rooms", &rooms)?;

        for link in &seed.room_doctor_links {
            let room_name = normalise_room_number(&link.room).unwrap_or_default();
            let room_id = lookup(&room_index, "room", &room_name)?;
            let doctor_id = lookup(&doctor_index, "doctor", &link.doctor)?;
            tx.execute(
                "INSERT OR IGNORE INTO room_doctor_links (room_id, doctor_id) VALUES (?1, ?2)",
                params![room_id.to_string(), doctor_id.to_string()],
            )?;
        }

        let category_index = insert_labels(&tx, "test_categories", &seed.categories)?;
        let head_index = insert_labels(&tx, "category_heads", &seed.category_heads)?;
        let unit_index = insert_labels(&tx, "units", &seed.units)?;

        for definition in &seed.test_definitions {
            let category_id = definition
                .category
                .as_deref()
                .map(|name| lookup(&category_index, "category", name))
                .transpose()?;
            let parameters = definition
                .parameters
                .iter()
                .map(|param| {
                    Ok(TestParameterDef {
                        id: param.id.unwrap_or_default(),
                        name: param.name.trim().to_string(),
                        unit_id: param
                            .unit
                            .as_deref()
                            .map(|unit| lookup(&unit_index, "unit", unit))
                            .transpose()?,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;

            tx.execute(
                "INSERT OR REPLACE INTO test_definitions
                 (id, name, short_name, category_id, parameters)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    definition.id.unwrap_or_default().to_string(),
                    definition.name.trim(),
                    definition.short_name.as_deref().map(str::trim),
                    category_id.map(|id| id.to_string()),
                    serde_json::to_string(&parameters)?,
                ],
            )?;
        }

        for entry in &seed.service_entries {
            let head_id = entry
                .category_head
                .as_deref()
                .map(|name| lookup(&head_index, "category head", name))
                .transpose()?;
            tx.execute(
                "INSERT OR REPLACE INTO service_entries (id, alias_name, category_head_id, price)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.id.unwrap_or_default().to_string(),
                    entry.alias_name.trim(),
                    head_id.map(|id| id.to_string()),
                    entry.price,
                ],
            )?;
        }

        let invoices = insert_authority(&tx, "invoices", &seed.invoices)?;
        let registrations = insert_authority(&tx, "registrations", &seed.registrations)?;

        tx.commit()?;

        let summary = SeedSummary {
            patients: seed.patients.len(),
            departments: seed.departments.len(),
            doctors: seed.doctors.len(),
            rooms: rooms.len(),
            room_doctor_links: seed.room_doctor_links.len(),
            categories: seed.categories.len(),
            category_heads: seed.category_heads.len(),
            units: seed.units.len(),
            test_definitions: seed.test_definitions.len(),
            service_entries: seed.service_entries.len(),
            invoices,
            registrations,
        };
        tracing::info!(?summary, "seeded master data");
        Ok(summary)
    }
}
