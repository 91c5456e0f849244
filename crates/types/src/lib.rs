//! Shared value types for the lab report engine.
//!
//! These types are used by the core engine, the REST API and the CLI, so they live in their own
//! small crate with no storage or transport dependencies.

use serde::{Deserialize, Serialize};

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Builds a `NonEmptyText` from an optional input, treating blank text as absent.
    pub fn from_optional(input: Option<&str>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Patient category of a report: out-patient or in-patient.
///
/// Upstream systems spell this field many ways ("OPD", "op", "In-Patient", ...). Use
/// [`PatientType::normalise`] to map free text onto the two canonical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PatientType {
    #[default]
    #[serde(rename = "OPD")]
    Opd,
    #[serde(rename = "IPD")]
    Ipd,
}

impl PatientType {
    /// Maps a free-text patient category onto `OPD` or `IPD`.
    ///
    /// The input is trimmed, upper-cased and stripped of anything that is not an ASCII letter, so
    /// `"o.p.d"`, `" Out-Patient "` and `"OPD"` all normalise to [`PatientType::Opd`].
    ///
    /// Returns `None` when the text does not name either category.
    pub fn normalise(raw: &str) -> Option<Self> {
        let letters: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match letters.as_str() {
            "OPD" | "OP" | "OUTPATIENT" => Some(Self::Opd),
            "IPD" | "IP" | "INPATIENT" => Some(Self::Ipd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opd => "OPD",
            Self::Ipd => "IPD",
        }
    }
}

impl std::fmt::Display for PatientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Jane Doe  ").expect("should accept non-empty text");
        assert_eq!(text.as_str(), "Jane Doe");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        let err = NonEmptyText::new("   ").expect_err("whitespace-only text should fail");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn test_non_empty_text_from_optional_treats_blank_as_none() {
        assert!(NonEmptyText::from_optional(None).is_none());
        assert!(NonEmptyText::from_optional(Some(" ")).is_none());
        assert_eq!(
            NonEmptyText::from_optional(Some("x")).map(NonEmptyText::into_string),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_non_empty_text_deserialize_rejects_empty() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_patient_type_normalise_variants() {
        assert_eq!(PatientType::normalise("OPD"), Some(PatientType::Opd));
        assert_eq!(PatientType::normalise(" o.p.d "), Some(PatientType::Opd));
        assert_eq!(PatientType::normalise("Out-Patient"), Some(PatientType::Opd));
        assert_eq!(PatientType::normalise("ipd"), Some(PatientType::Ipd));
        assert_eq!(PatientType::normalise("In Patient"), Some(PatientType::Ipd));
        assert_eq!(PatientType::normalise("emergency"), None);
        assert_eq!(PatientType::normalise(""), None);
    }

    #[test]
    fn test_patient_type_serialises_as_upper_case() {
        let json = serde_json::to_string(&PatientType::Ipd).expect("should serialise");
        assert_eq!(json, "\"IPD\"");
        let parsed: PatientType = serde_json::from_str("\"OPD\"").expect("should parse");
        assert_eq!(parsed, PatientType::Opd);
    }
}
