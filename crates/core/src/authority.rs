//! Deciding a report's patient type (OPD/IPD).
//!
//! Three sources can disagree: the invoice, the registration, and the value stored on the report.
//! Precedence is fixed, Invoice > Registration > stored value, and OPD is the default when none
//! of them holds a recognisable value. The same resolution runs on write and on every read, so a
//! stale stored value is corrected in responses without a write.

use crate::constants::AUTHORITY_MODE_FIELDS;
use crate::masters::AuthorityDocument;
use crate::resolution::Resolution;
use crate::store::AuthorityStore;
use lab_types::PatientType;
use lab_uuid::RecordId;
use serde::Serialize;

/// Where a patient type decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthoritySource {
    Invoice,
    Registration,
    Stored,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityDecision {
    pub value: PatientType,
    pub source: AuthoritySource,
    /// Invoice found for the receipt, whether or not it decided the value.
    pub invoice_ref: Option<RecordId>,
    /// Registration found for the receipt, whether or not it decided the value.
    pub registration_ref: Option<RecordId>,
}

/// First mode alias on `document` that normalises to OPD or IPD.
fn document_mode(document: &AuthorityDocument) -> Option<PatientType> {
    document
        .string_fields(AUTHORITY_MODE_FIELDS)
        .into_iter()
        .find_map(PatientType::normalise)
}

pub struct AuthorityResolver<'a, S> {
    store: &'a S,
}

impl<'a, S: AuthorityStore> AuthorityResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolves the patient type for a receipt.
    ///
    /// # Arguments
    ///
    /// * `receipt_no` - Receipt used to find the invoice and registration. Without one, only the
    ///   fallback is considered.
    /// * `fallback` - The report's own stored or submitted value.
    ///
    /// # Returns
    ///
    /// The decided value and its source. Never fails: a failed document lookup is logged and
    /// treated as a missing document.
    pub fn resolve(&self, receipt_no: Option<&str>, fallback: Option<&str>) -> AuthorityDecision {
        let (invoice, registration) = match receipt_no {
            Some(receipt) => (
                self.lookup(receipt, "invoice", |s| s.invoice_by_receipt(receipt)),
                self.lookup(receipt, "registration", |s| s.registration_by_receipt(receipt)),
            ),
            None => (None, None),
        };

        let (value, source) = if let Some(mode) = invoice.as_ref().and_then(document_mode) {
            (mode, AuthoritySource::Invoice)
        } else if let Some(mode) = registration.as_ref().and_then(document_mode) {
            (mode, AuthoritySource::Registration)
        } else if let Some(mode) = fallback.and_then(PatientType::normalise) {
            (mode, AuthoritySource::Stored)
        } else {
            (PatientType::default(), AuthoritySource::Default)
        };

        AuthorityDecision {
            value,
            source,
            invoice_ref: invoice.map(|d| d.id),
            registration_ref: registration.map(|d| d.id),
        }
    }

    fn lookup(
        &self,
        receipt_no: &str,
        kind: &str,
        find: impl FnOnce(&S) -> crate::error::StoreResult<Option<AuthorityDocument>>,
    ) -> Option<AuthorityDocument> {
        match Resolution::from_lookup(find(self.store)) {
            Resolution::Resolved(document) => Some(document),
            Resolution::Unresolved => None,
            Resolution::Failed(message) => {
                tracing::warn!(receipt_no, kind, error = %message,
                    "authority lookup failed, falling back");
                None
            }
        }
    }
}
