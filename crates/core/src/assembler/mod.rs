//! Report assembly: the write path (create, update, import, repair) and the read path (get,
//! by-receipt, listing).
//!
//! [`ReportEngine`] owns no state of its own beyond injected handles. Every call re-reads the
//! masters through the store it was given, so requests can run concurrently; correctness under
//! concurrent creates rests on the store's unique indexes.

mod create;
mod diff;
mod grouping;
mod listing;
mod lookup;
mod repair;
mod retry;
mod update;

pub use create::ImportRecord;
pub use diff::diff_tracked_fields;
pub use grouping::{group_rows, ReportGroup};
pub use listing::{DateFilter, ListQuery, ListedReport, Pagination, ReportPage};
pub use lookup::ExistsResult;
pub use repair::RepairSummary;
pub use retry::{retry_with, RetryDecision, RetryError};

use crate::authority::{AuthorityDecision, AuthorityResolver};
use crate::config::CoreConfig;
use crate::matcher::TestMatcher;
use crate::model::{CanonicalReport, RawReportInput, ResolvedTestLine, UnresolvedField};
use crate::reference::{ReferenceLinks, ReferenceResolver};
use crate::store::{AuthorityStore, CounterStore, MasterData, ReportStore};
use std::sync::Arc;

/// Everything the engine needs from storage.
pub trait ReportBackend: CounterStore + MasterData + AuthorityStore + ReportStore {}

impl<T> ReportBackend for T where T: CounterStore + MasterData + AuthorityStore + ReportStore {}

/// The authenticated caller, as supplied by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub tenant_id: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: None,
        }
    }
}

/// Output of one full resolution pass over a submission.
#[derive(Clone)]
struct Assembly {
    links: ReferenceLinks,
    test_results: Vec<ResolvedTestLine>,
    authority: AuthorityDecision,
    unresolved: Vec<UnresolvedField>,
}

pub struct ReportEngine<S> {
    store: Arc<S>,
    config: Arc<CoreConfig>,
}

impl<S> Clone for ReportEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ReportBackend> ReportEngine<S> {
    pub fn new(store: Arc<S>, config: Arc<CoreConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Runs the reference resolver, the test matcher (per line) and the authority resolver.
    ///
    /// Never fails: every step that cannot link a value leaves it empty and records why.
    fn assemble(&self, input: &RawReportInput) -> Assembly {
        let store = self.store.as_ref();

        let links = ReferenceResolver::new(store).resolve_links(input);

        let matcher = TestMatcher::new(store);
        let mut unresolved = links.unresolved.clone();
        let test_results = input
            .test_results
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let (resolved, missing) = matcher.resolve_line(index, line);
                unresolved.extend(missing);
                resolved
            })
            .collect();

        let authority = AuthorityResolver::new(store)
            .resolve(input.receipt_no.as_deref(), input.patient_type.as_deref());

        Assembly {
            links,
            test_results,
            authority,
            unresolved,
        }
    }

    /// Overwrites every submitted and resolved field of `report`.
    ///
    /// Identity (`id`, `report_id`, year, sequence) and audit fields are left to the caller.
    fn apply_assembly(report: &mut CanonicalReport, input: &RawReportInput, assembly: Assembly) {
        report.receipt_no = input.receipt_no.clone();
        report.registration_no = input.registration_no.clone();
        report.lab_yearly_no = input.lab_yearly_no.clone();
        report.lab_daily_no = input.lab_daily_no.clone();
        report.patient_key = input.patient_key.clone();
        report.patient = input.patient.clone().unwrap_or_default();
        report.department = input.department.clone();
        report.doctor = input.doctor.clone();
        report.room = input.room.clone();
        report.report_status = input.report_status.unwrap_or_default();

        report.patient_ref = assembly.links.patient_ref;
        report.department_ref = assembly.links.department_ref;
        report.doctor_ref = assembly.links.doctor_ref;
        report.room_ref = assembly.links.room_ref;
        report.invoice_ref = assembly.authority.invoice_ref;
        report.registration_ref = assembly.authority.registration_ref;
        report.patient_type = assembly.authority.value;
        report.test_results = assembly.test_results;
        report.unresolved = assembly.unresolved;
    }

    /// Replaces the stored patient type with the authority decision.
    fn apply_authority(&self, report: &mut CanonicalReport) -> AuthorityDecision {
        let decision = AuthorityResolver::new(self.store.as_ref()).resolve(
            report.receipt_no.as_deref(),
            Some(report.patient_type.as_str()),
        );
        report.patient_type = decision.value;
        decision
    }

    /// Inlines display names for every test line.
    fn populate(&self, report: &mut CanonicalReport) {
        let matcher = TestMatcher::new(self.store.as_ref());
        for line in &mut report.test_results {
            line.populated = Some(matcher.populate(line));
        }
    }
}
