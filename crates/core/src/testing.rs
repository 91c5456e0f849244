//! Shared fixtures for unit tests.

use crate::assembler::{Actor, ReportEngine};
use crate::config::CoreConfig;
use crate::model::{
    CanonicalReport, PatientSnapshot, RawParameter, RawReportInput, RawTestLine,
    ReportStatus, ResolvedParameter, ResolvedTestLine,
};
use crate::store::{
    AuthoritySeed, MasterSeed, NamedSeed, ParameterSeed, RoomDoctorLink, ServiceEntrySeed,
    SqliteStore, TestDefinitionSeed,
};
use chrono::Utc;
use lab_types::PatientType;
use lab_uuid::RecordId;
use serde_json::json;
use std::sync::Arc;

fn authority(receipt: &str, mode: Option<&str>, registered_at: Option<&str>) -> AuthoritySeed {
    let mut body = serde_json::Map::new();
    if let Some(mode) = mode {
        body.insert("mode".into(), json!(mode));
    }
    AuthoritySeed {
        receipt_no: receipt.into(),
        registered_at: registered_at.map(|ts| ts.parse().expect("fixture timestamp")),
        body,
        ..Default::default()
    }
}

/// Master data shared by the resolver and assembler tests.
pub(crate) fn lab_seed() -> MasterSeed {
    MasterSeed {
        patients: vec![NamedSeed {
            code: Some("P-77".into()),
            ..NamedSeed::named("Asha Verma")
        }],
        departments: vec![NamedSeed {
            code: Some("PATH".into()),
            ..NamedSeed::named("Pathology")
        }],
        doctors: vec![NamedSeed::named("Dr. Rao")],
        rooms: vec![NamedSeed::named("12")],
        room_doctor_links: vec![RoomDoctorLink {
            room: "RM-12".into(),
            doctor: "Dr. Rao".into(),
        }],
        categories: ["HAEMATOLOGY", "BIOCHEMISTRY", "MICROBIOLOGY", "CLINICAL PATHOLOGY"]
            .into_iter()
            .map(NamedSeed::named)
            .collect(),
        category_heads: vec![NamedSeed::named("CLINICAL PATHOLOGY")],
        units: vec![NamedSeed::named("g/dL"), NamedSeed::named("mg/dL")],
        test_definitions: vec![
            TestDefinitionSeed {
                name: "CBC".into(),
                short_name: Some("Complete Blood Count".into()),
                category: Some("HAEMATOLOGY".into()),
                parameters: vec![
                    ParameterSeed {
                        id: None,
                        name: "Haemoglobin".into(),
                        unit: Some("g/dL".into()),
                    },
                    ParameterSeed {
                        id: None,
                        name: "Total WBC Count".into(),
                        unit: None,
                    },
                ],
                ..Default::default()
            },
            TestDefinitionSeed {
                name: "Liver Function Test".into(),
                short_name: Some("LFT".into()),
                category: Some("BIOCHEMISTRY".into()),
                ..Default::default()
            },
            TestDefinitionSeed {
                name: "S.Creatinine".into(),
                category: Some("BIOCHEMISTRY".into()),
                parameters: vec![ParameterSeed {
                    id: None,
                    name: "Creatinine".into(),
                    unit: Some("mg/dL".into()),
                }],
                ..Default::default()
            },
        ],
        service_entries: vec![ServiceEntrySeed {
            id: None,
            alias_name: "URINE R.E".into(),
            category_head: Some("CLINICAL PATHOLOGY".into()),
            price: Some(120.0),
        }],
        invoices: vec![authority("1024", Some("IPD"), None)],
        registrations: vec![
            authority("1024", None, Some("2025-03-10T09:00:00Z")),
            authority("500", Some("OPD"), Some("2025-03-11T10:00:00Z")),
        ],
    }
}

pub(crate) fn lab_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("in-memory store should open");
    store.seed(&lab_seed()).expect("fixture seed should load");
    store
}

pub(crate) fn engine() -> ReportEngine<SqliteStore> {
    ReportEngine::new(Arc::new(lab_store()), Arc::new(CoreConfig::default()))
}

pub(crate) fn actor() -> Actor {
    Actor::new("tech-1")
}

/// A valid submission for `receipt` with one CBC line.
pub(crate) fn submission(receipt: &str) -> RawReportInput {
    RawReportInput {
        receipt_no: Some(receipt.into()),
        patient: Some(PatientSnapshot {
            name: "Asha Verma".into(),
            age: Some("34".into()),
            gender: Some("F".into()),
            phone: Some("98450".into()),
            address: None,
        }),
        test_results: vec![RawTestLine {
            test_name: "CBC".into(),
            category: None,
            parameters: vec![RawParameter {
                name: "Haemoglobin".into(),
                value: Some("13.5".into()),
                unit: Some("g/dL".into()),
                normal_range: None,
            }],
        }],
        ..Default::default()
    }
}

/// A stored report built without the engine, for store and grouping tests.
pub(crate) fn sample_report(report_id: &str, sequence: u32, receipt: Option<&str>) -> CanonicalReport {
    let now = Utc::now();
    CanonicalReport {
        id: RecordId::new(),
        report_id: report_id.into(),
        report_year: 2025,
        sequence,
        receipt_no: receipt.map(str::to_string),
        registration_no: None,
        lab_yearly_no: None,
        lab_daily_no: None,
        patient_key: None,
        patient_ref: None,
        department_ref: None,
        doctor_ref: None,
        room_ref: None,
        invoice_ref: None,
        registration_ref: None,
        department: None,
        doctor: None,
        room: None,
        patient_type: PatientType::Opd,
        patient: PatientSnapshot {
            name: "Asha Verma".into(),
            age: Some("34".into()),
            gender: Some("F".into()),
            phone: Some("98450".into()),
            address: None,
        },
        test_results: vec![ResolvedTestLine {
            test_name: "CBC".into(),
            category: Some("HAEMATOLOGY".into()),
            parameters: vec![ResolvedParameter {
                name: "Haemoglobin".into(),
                value: Some("13.5".into()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        report_status: ReportStatus::Pending,
        unresolved: Vec::new(),
        imported: false,
        created_at: now,
        created_by: "tester".into(),
        updated_at: now,
        updated_by: None,
        is_edited: false,
        edit_history: Vec::new(),
    }
}
