//! Free-text test name matching.
//!
//! A submitted test line is resolved to a test definition, a category and a billing service
//! entry through a fixed cascade. Each step runs only if the previous ones found nothing:
//!
//! 1. exact, case-insensitive name or short name
//! 2. punctuation-tolerant pattern on name or short name
//! 3. prefix candidates on the first token, compared by [`compact_key`]
//! 4. punctuation-tolerant pattern on the service entry alias, category via its category head
//! 5. keyword table ([`keyword_category`])
//! 6. the submitted category text
//! 7. display name fill from the resolved category
//!
//! Candidates are always read in catalog order, so identical input and masters give identical
//! output.

mod keywords;
mod normalise;
mod parameters;

pub use keywords::keyword_category;
pub use normalise::{compact_key, first_token, loose_pattern, normalise_name, parameter_key};
pub use parameters::resolve_parameters;

use crate::constants::{CANDIDATE_LIMIT, GENERIC_CATEGORY_NAMES};
use crate::masters::{ServiceEntry, TestCategory, TestDefinition};
use crate::model::{
    PopulatedRefs, RawTestLine, ResolvedTestLine, UnresolvedField, UnresolvedReason,
};
use crate::resolution::Resolution;
use crate::store::MasterData;
use regex::Regex;

/// True when `display` carries no useful category name.
fn is_placeholder(display: Option<&str>) -> bool {
    match display {
        None => true,
        Some(text) => {
            let text = text.trim();
            text.is_empty()
                || GENERIC_CATEGORY_NAMES
                    .iter()
                    .any(|generic| generic.eq_ignore_ascii_case(text))
        }
    }
}

/// Remembers the first failed lookup of a cascade.
#[derive(Default)]
struct FailureLog(Option<String>);

impl FailureLog {
    fn note<T>(&mut self, resolution: &Resolution<T>) {
        if let (None, Resolution::Failed(message)) = (&self.0, resolution) {
            self.0 = Some(message.clone());
        }
    }
}

pub struct TestMatcher<'a, S> {
    store: &'a S,
}

impl<'a, S: MasterData> TestMatcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolves one submitted test line.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the line in the report, used to name the field when it stays
    ///   unresolved (`testResults[2]`).
    /// * `line` - The submitted line.
    ///
    /// # Returns
    ///
    /// The resolved line, plus an [`UnresolvedField`] when neither a definition nor a category
    /// could be attached. The submitted name and category text are always kept.
    pub fn resolve_line(
        &self,
        index: usize,
        line: &RawTestLine,
    ) -> (ResolvedTestLine, Option<UnresolvedField>) {
        let name = normalise_name(&line.test_name);
        let pattern = loose_pattern(&name);
        let mut failures = FailureLog::default();

        let definition = self.match_definition(&name, pattern.as_ref());
        failures.note(&definition);
        let definition = definition.into_option();

        let service = match (&definition, &pattern) {
            (None, Some(pattern)) => {
                Resolution::from_lookup(self.store.service_entry_matching(pattern))
            }
            _ => Resolution::Unresolved,
        };
        failures.note(&service);
        let service = service.into_option();

        let mut display = line
            .category
            .as_deref()
            .map(normalise_name)
            .filter(|c| !c.is_empty());

        let mut category = match (&definition, &service) {
            (Some(definition), _) => match definition.category_id {
                Some(id) => Resolution::from_lookup(self.store.category_by_id(id)),
                None => Resolution::Unresolved,
            },
            (None, Some(service)) => self.category_for_service(service),
            (None, None) => Resolution::Unresolved,
        };
        failures.note(&category);

        if !category.is_resolved() {
            if let Some(keyword) = keyword_category(&name) {
                category = Resolution::from_lookup(self.store.category_by_name(keyword));
                failures.note(&category);
                if is_placeholder(display.as_deref()) {
                    display = Some(keyword.to_string());
                }
            }
        }

        if !category.is_resolved() {
            if let Some(hint) = line.category.as_deref().filter(|h| !h.trim().is_empty()) {
                category = Resolution::from_lookup(self.store.category_by_name(hint));
                failures.note(&category);
            }
        }

        let category = category.into_option();
        if let Some(category) = &category {
            if is_placeholder(display.as_deref()) {
                display = Some(category.name.clone());
            }
        }

        let resolved = ResolvedTestLine {
            test_name: line.test_name.clone(),
            test_definition_ref: definition.as_ref().map(|d| d.id),
            category_ref: category.as_ref().map(|c| c.id),
            service_ref: service.as_ref().map(|s| s.id),
            category: display,
            parameters: resolve_parameters(definition.as_ref(), &line.parameters),
            populated: None,
        };

        let unresolved = resolved.is_unmatched().then(|| {
            let field = format!("testResults[{index}]");
            let reason = match failures.0 {
                Some(message) => {
                    tracing::warn!(field = %field, test_name = %line.test_name, error = %message,
                        "test lookup failed, leaving line unresolved");
                    UnresolvedReason::LookupFailed { message }
                }
                None => UnresolvedReason::NoMatch,
            };
            UnresolvedField { field, reason }
        });

        (resolved, unresolved)
    }

    /// Steps 1 to 3 of the cascade.
    fn match_definition(
        &self,
        name: &str,
        pattern: Option<&Regex>,
    ) -> Resolution<TestDefinition> {
        if name.is_empty() {
            return Resolution::Unresolved;
        }

        Resolution::from_lookup(self.store.test_definition_by_name(name))
            .or_else(|| match pattern {
                Some(pattern) => {
                    Resolution::from_lookup(self.store.test_definition_matching(pattern))
                }
                None => Resolution::Unresolved,
            })
            .or_else(|| self.match_candidates(name))
    }

    fn match_candidates(&self, name: &str) -> Resolution<TestDefinition> {
        let Some(token) = first_token(name) else {
            return Resolution::Unresolved;
        };
        let key = compact_key(name);

        let candidates = match self.store.test_definitions_with_prefix(token, CANDIDATE_LIMIT) {
            Ok(candidates) => candidates,
            Err(e) => return Resolution::Failed(e.to_string()),
        };

        candidates
            .into_iter()
            .find(|candidate| {
                compact_key(&candidate.name) == key
                    || candidate
                        .short_name
                        .as_deref()
                        .is_some_and(|short| compact_key(short) == key)
            })
            .map_or(Resolution::Unresolved, Resolution::Resolved)
    }

    /// Maps a service entry to a canonical category through its legacy category head.
    fn category_for_service(&self, service: &ServiceEntry) -> Resolution<TestCategory> {
        let Some(head_id) = service.category_head_id else {
            return Resolution::Unresolved;
        };

        match self.store.category_head_by_id(head_id) {
            Ok(Some(head)) => Resolution::from_lookup(self.store.category_by_name(&head.name)),
            Ok(None) => Resolution::Unresolved,
            Err(e) => Resolution::Failed(e.to_string()),
        }
    }

    /// Display names for the references of a stored line.
    ///
    /// Failed lookups are logged and leave the corresponding name empty.
    pub fn populate(&self, line: &ResolvedTestLine) -> PopulatedRefs {
        let definition = line
            .test_definition_ref
            .and_then(|id| logged(self.store.test_definition_by_id(id), "test definition"));
        let category = line
            .category_ref
            .and_then(|id| logged(self.store.category_by_id(id), "category"));
        let service = line
            .service_ref
            .and_then(|id| logged(self.store.service_entry_by_id(id), "service entry"));

        PopulatedRefs {
            test_definition_name: definition.map(|d| d.name),
            category_name: category.map(|c| c.name),
            service_name: service.as_ref().map(|s| s.alias_name.clone()),
            service_price: service.and_then(|s| s.price),
        }
    }
}

fn logged<T>(lookup: crate::error::StoreResult<Option<T>>, what: &str) -> Option<T> {
    lookup.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load {what} for populate");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::lab_store;

    fn raw(name: &str) -> RawTestLine {
        RawTestLine {
            test_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_loose_variants_resolve_to_same_definition_and_category() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (cbc, _) = matcher.resolve_line(0, &raw("CBC"));
        let (dotted, _) = matcher.resolve_line(0, &raw("C.B.C"));
        let (spaced, _) = matcher.resolve_line(0, &raw("C B C"));

        assert!(cbc.test_definition_ref.is_some());
        assert_eq!(cbc.test_definition_ref, dotted.test_definition_ref);
        assert_eq!(cbc.test_definition_ref, spaced.test_definition_ref);
        assert_eq!(cbc.category_ref, dotted.category_ref);
        assert_eq!(cbc.category_ref, spaced.category_ref);
        assert_eq!(dotted.category.as_deref(), Some("HAEMATOLOGY"));
        assert_eq!(dotted.test_name, "C.B.C");
    }

    #[test]
    fn test_exact_match_on_short_name() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, unresolved) = matcher.resolve_line(0, &raw("lft"));
        assert!(line.test_definition_ref.is_some());
        assert!(unresolved.is_none());
    }

    #[test]
    fn test_periods_and_spaces_inside_names_are_ignored() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, _) = matcher.resolve_line(0, &raw("S. Creatinine"));
        let (exact, _) = matcher.resolve_line(0, &raw("S.Creatinine"));
        assert!(line.test_definition_ref.is_some());
        assert_eq!(line.test_definition_ref, exact.test_definition_ref);
    }

    #[test]
    fn test_service_entry_resolves_category_through_head() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, unresolved) = matcher.resolve_line(0, &raw("Urine R.E"));
        assert!(line.test_definition_ref.is_none());
        assert!(line.service_ref.is_some());
        assert!(line.category_ref.is_some());
        assert_eq!(line.category.as_deref(), Some("CLINICAL PATHOLOGY"));
        assert!(unresolved.is_none());
    }

    #[test]
    fn test_keyword_fallback_without_catalog_entry() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, _) = matcher.resolve_line(0, &raw("MP CARD"));
        assert_eq!(line.category.as_deref(), Some("MICROBIOLOGY"));
        assert!(line.test_definition_ref.is_none());
        assert!(line.category_ref.is_some());
    }

    #[test]
    fn test_keyword_category_missing_from_masters_still_sets_display() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, unresolved) = matcher.resolve_line(3, &raw("Widal"));
        assert_eq!(line.category.as_deref(), Some("SEROLOGY"));
        assert!(line.category_ref.is_none());
        let unresolved = unresolved.expect("line should be reported unresolved");
        assert_eq!(unresolved.field, "testResults[3]");
        assert_eq!(unresolved.reason, UnresolvedReason::NoMatch);
    }

    #[test]
    fn test_explicit_category_hint_and_generic_display_fill() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let line = RawTestLine {
            test_name: "Custom Panel".into(),
            category: Some("biochemistry".into()),
            parameters: Vec::new(),
        };
        let (resolved, _) = matcher.resolve_line(0, &line);
        assert!(resolved.category_ref.is_some());
        assert_eq!(resolved.category.as_deref(), Some("biochemistry"));

        let generic = RawTestLine {
            test_name: "CBC".into(),
            category: Some("General".into()),
            parameters: Vec::new(),
        };
        let (resolved, _) = matcher.resolve_line(0, &generic);
        assert_eq!(resolved.category.as_deref(), Some("HAEMATOLOGY"));
    }

    #[test]
    fn test_unmatched_line_keeps_submitted_data() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let line = RawTestLine {
            test_name: "Mystery Assay".into(),
            category: Some("Special".into()),
            parameters: vec![crate::model::RawParameter {
                name: "Level".into(),
                value: Some("4".into()),
                ..Default::default()
            }],
        };
        let (resolved, unresolved) = matcher.resolve_line(0, &line);

        assert_eq!(resolved.test_name, "Mystery Assay");
        assert_eq!(resolved.category.as_deref(), Some("Special"));
        assert_eq!(resolved.parameters[0].value.as_deref(), Some("4"));
        assert!(unresolved.is_some());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        for name in ["CBC", "c.b.c", "MP CARD", "Urine R.E", "Nothing Known"] {
            let first = matcher.resolve_line(0, &raw(name));
            let second = matcher.resolve_line(0, &first.0.to_raw());
            assert_eq!(first, second, "{name:?} should resolve identically twice");
        }
    }

    #[test]
    fn test_parameters_attach_references() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let line = RawTestLine {
            test_name: "CBC".into(),
            category: None,
            parameters: vec![crate::model::RawParameter {
                name: "haemoglobin".into(),
                value: Some("13.1".into()),
                ..Default::default()
            }],
        };
        let (resolved, _) = matcher.resolve_line(0, &line);
        assert!(resolved.parameters[0].parameter_ref.is_some());
        assert!(resolved.parameters[0].unit_ref.is_some());
    }

    #[test]
    fn test_populate_inlines_display_names() {
        let store = lab_store();
        let matcher = TestMatcher::new(&store);

        let (line, _) = matcher.resolve_line(0, &raw("Urine R.E"));
        let populated = matcher.populate(&line);

        assert_eq!(populated.service_name.as_deref(), Some("URINE R.E"));
        assert_eq!(populated.service_price, Some(120.0));
        assert_eq!(populated.category_name.as_deref(), Some("CLINICAL PATHOLOGY"));
        assert!(populated.test_definition_name.is_none());
    }
}
