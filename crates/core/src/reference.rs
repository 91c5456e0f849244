//! Linking loosely-typed identifiers (patient key, department, doctor, room) to masters.
//!
//! Strategies run in a fixed order and the first match wins: primary key (only when the input
//! already looks like one), then case-insensitive name, then case-insensitive code. There is no
//! scoring. A miss is not an error; the field simply stays without a reference.

use crate::constants::ROOM_NUMBER_PREFIX;
use crate::masters::{NamedMaster, NamedMasterKind};
use crate::model::{RawReportInput, UnresolvedField};
use crate::resolution::Resolution;
use crate::store::{MasterData, NamedLookup};
use lab_uuid::RecordId;

const ROOM_PREFIXES: &[&str] = &["ROOM", "RM", "R"];

fn is_room_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '.' | '#' | '_' | ':' | '/')
}

/// Normalises a room number to its canonical form (`RM-12`).
///
/// Accepts `12`, `012`, `rm12`, `RM-12`, `Room 12`, `r.12`. A `ROOM`/`RM`/`R` prefix is only
/// stripped when a number follows it, so `RADIOLOGY` stays `RM-RADIOLOGY`.
///
/// Returns `None` when nothing remains after stripping.
pub fn normalise_room_number(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let mut rest = upper.as_str();

    for prefix in ROOM_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            let after = stripped.trim_start_matches(is_room_separator);
            if after.starts_with(|c: char| c.is_ascii_digit()) {
                rest = after;
                break;
            }
        }
    }

    let body: String = rest.chars().filter(|c| !is_room_separator(*c)).collect();
    let trimmed = body.trim_start_matches('0');
    let number = match (trimmed.is_empty(), body.is_empty()) {
        (_, true) => return None,
        (true, false) => "0",
        (false, false) => trimmed,
    };

    Some(format!("{ROOM_NUMBER_PREFIX}{number}"))
}

/// References attached to a report by the reference resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceLinks {
    pub patient_ref: Option<RecordId>,
    pub department_ref: Option<RecordId>,
    pub doctor_ref: Option<RecordId>,
    pub room_ref: Option<RecordId>,
    pub unresolved: Vec<UnresolvedField>,
}

pub struct ReferenceResolver<'a, S> {
    store: &'a S,
}

impl<'a, S: MasterData> ReferenceResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolves one free-text or id-like key against a master.
    ///
    /// Room keys are normalised before the name lookup; the code lookup sees the raw text.
    pub fn resolve(&self, kind: NamedMasterKind, raw: &str) -> Resolution<NamedMaster> {
        let key = raw.trim();
        if key.is_empty() {
            return Resolution::Unresolved;
        }

        let name = match kind {
            NamedMasterKind::Room => normalise_room_number(key),
            _ => Some(key.to_string()),
        };

        self.by_id(kind, key)
            .or_else(|| match &name {
                Some(name) => self.lookup(kind, NamedLookup::Name(name)),
                None => Resolution::Unresolved,
            })
            .or_else(|| self.lookup(kind, NamedLookup::Code(key)))
    }

    /// Resolves a room and the doctor linked to it.
    pub fn resolve_room(&self, raw: &str) -> (Resolution<NamedMaster>, Resolution<NamedMaster>) {
        let room = self.resolve(NamedMasterKind::Room, raw);
        let doctor = match room.as_ref() {
            Some(room) => Resolution::from_lookup(self.store.doctor_for_room(room.id)),
            None => Resolution::Unresolved,
        };
        (room, doctor)
    }

    /// Resolves every reference field of a submission.
    ///
    /// An explicitly submitted doctor wins over the doctor linked to the room. Each submitted
    /// value that stays unlinked is listed in [`ReferenceLinks::unresolved`].
    pub fn resolve_links(&self, input: &RawReportInput) -> ReferenceLinks {
        let mut links = ReferenceLinks::default();

        if let Some(key) = input.patient_key.as_deref() {
            let patient = self.resolve(NamedMasterKind::Patient, key);
            links.unresolved.extend(patient.unresolved_field("patientKey"));
            links.patient_ref = patient.into_option().map(|p| p.id);
        }

        if let Some(department) = input.department.as_deref() {
            let department = self.resolve(NamedMasterKind::Department, department);
            links.unresolved.extend(department.unresolved_field("department"));
            links.department_ref = department.into_option().map(|d| d.id);
        }

        let mut room_doctor = None;
        if let Some(room) = input.room.as_deref() {
            let (room, doctor) = self.resolve_room(room);
            links.unresolved.extend(room.unresolved_field("room"));
            links.room_ref = room.into_option().map(|r| r.id);
            room_doctor = doctor.into_option().map(|d| d.id);
        }

        if let Some(doctor) = input.doctor.as_deref() {
            let doctor = self.resolve(NamedMasterKind::Doctor, doctor);
            if room_doctor.is_none() {
                links.unresolved.extend(doctor.unresolved_field("doctor"));
            }
            links.doctor_ref = doctor.into_option().map(|d| d.id);
        }
        links.doctor_ref = links.doctor_ref.or(room_doctor);

        links
    }

    fn by_id(&self, kind: NamedMasterKind, key: &str) -> Resolution<NamedMaster> {
        match RecordId::parse(key) {
            Ok(id) => self.lookup(kind, NamedLookup::Id(id)),
            Err(_) => Resolution::Unresolved,
        }
    }

    fn lookup(&self, kind: NamedMasterKind, lookup: NamedLookup<'_>) -> Resolution<NamedMaster> {
        Resolution::from_lookup(self.store.find_named(kind, lookup))
    }
}
