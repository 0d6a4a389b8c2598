//! Typed views of vendor records.
//!
//! Vendors spell the same field differently (`firstName` / `voornaam`); the
//! variants are folded into one field here, once, at ingestion. The raw
//! object is kept alongside for snapshots and task payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use hrsync_core::ImportKey;

use crate::dates::optional_date;

/// A decoded record with its key and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported<T> {
    pub key: ImportKey,
    pub record: T,
    pub raw: Map<String, Value>,
}

/// Identifiers arrive as strings or numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Employee record (personnel API).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    #[serde(deserialize_with = "id_string")]
    pub person_id: String,

    #[serde(default, alias = "voornaam")]
    pub first_name: Option<String>,

    #[serde(default, alias = "naam")]
    pub last_name: Option<String>,

    #[serde(default, alias = "geboortedatum", deserialize_with = "optional_date")]
    pub birth_date: Option<NaiveDate>,

    #[serde(default, alias = "geslacht")]
    pub gender: Option<String>,

    #[serde(
        default,
        alias = "pensioenDatum",
        alias = "pensioendatum",
        deserialize_with = "optional_date"
    )]
    pub pension_date: Option<NaiveDate>,

    #[serde(default)]
    pub email: Option<String>,

    /// Missing means active.
    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub is_overleden: Option<bool>,
}

impl EmployeeRecord {
    #[must_use]
    pub fn active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    #[must_use]
    pub fn deceased(&self) -> bool {
        self.is_overleden.unwrap_or(false)
    }

    /// Pension date on or before `today`.
    #[must_use]
    pub fn pension_reached(&self, today: NaiveDate) -> bool {
        self.pension_date.is_some_and(|d| d <= today)
    }

    /// Active with no disqualifying condition.
    #[must_use]
    pub fn is_eligible(&self, today: NaiveDate) -> bool {
        self.active() && !self.deceased() && !self.pension_reached(today)
    }

    #[must_use]
    pub fn should_deactivate(&self, today: NaiveDate) -> bool {
        !self.is_eligible(today)
    }

    /// `"Last, First"`, or whichever part exists.
    #[must_use]
    pub fn sort_name(&self) -> Option<String> {
        match (non_empty(&self.last_name), non_empty(&self.first_name)) {
            (Some(last), Some(first)) => Some(format!("{last}, {first}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
    }
}

/// Employee assignment record. One per function an employee holds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    #[serde(deserialize_with = "id_string")]
    pub person_id: String,

    #[serde(default, alias = "id", deserialize_with = "optional_id_string")]
    pub assignment_id: Option<String>,

    /// External role (function) code.
    #[serde(default)]
    pub ambt_code: Option<String>,

    /// Human-readable function name.
    #[serde(default)]
    pub ambt: Option<String>,

    #[serde(default, alias = "startDatum", deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, alias = "eindDatum", deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
}

impl AssignmentRecord {
    /// Trimmed role code, `None` when missing or blank.
    #[must_use]
    pub fn role_code(&self) -> Option<&str> {
        non_empty(&self.ambt_code)
    }

    /// Role display name, falling back to the code.
    #[must_use]
    pub fn role_name(&self) -> Option<&str> {
        non_empty(&self.ambt).or_else(|| self.role_code())
    }
}

/// Student registration record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistrationRecord {
    #[serde(rename = "persoonId", alias = "personId", deserialize_with = "id_string")]
    pub person_id: String,

    #[serde(rename = "regInstNr", default)]
    pub institution: Option<String>,

    #[serde(rename = "regStartDate", default, deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,

    #[serde(rename = "regEndDate", default, deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,

    #[serde(rename = "regGroupCode", default)]
    pub group_code: Option<String>,
}

/// Student record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "persoonId", alias = "personId", deserialize_with = "id_string")]
    pub person_id: String,

    #[serde(rename = "voornaam", alias = "firstName", default)]
    pub first_name: Option<String>,

    #[serde(rename = "naam", alias = "lastName", default)]
    pub last_name: Option<String>,

    #[serde(
        rename = "geboortedatum",
        alias = "birthDate",
        default,
        deserialize_with = "optional_date"
    )]
    pub birth_date: Option<NaiveDate>,

    #[serde(rename = "geslacht", alias = "gender", default)]
    pub gender: Option<String>,

    /// Class enrolments, kept opaque.
    #[serde(rename = "inschrKlassen", alias = "inschrklassen", default)]
    pub enrolments: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    #[test]
    fn test_employee_field_variants() {
        let english: EmployeeRecord = serde_json::from_value(json!({
            "personId": "p1", "firstName": "An", "lastName": "Peeters",
            "pensionDate": "2040-01-01T00:00:00"
        }))
        .unwrap();
        let dutch: EmployeeRecord = serde_json::from_value(json!({
            "personId": "p1", "voornaam": "An", "naam": "Peeters",
            "pensioendatum": "01-01-2040"
        }))
        .unwrap();

        assert_eq!(english.first_name, dutch.first_name);
        assert_eq!(english.last_name, dutch.last_name);
        assert_eq!(english.pension_date, dutch.pension_date);
        assert_eq!(english.sort_name().as_deref(), Some("Peeters, An"));
    }

    #[test]
    fn test_employee_eligibility() {
        let base = json!({"personId": 42});
        let record: EmployeeRecord = serde_json::from_value(base).unwrap();
        assert_eq!(record.person_id, "42");
        assert!(record.is_eligible(today()));

        let inactive: EmployeeRecord =
            serde_json::from_value(json!({"personId": "p", "isActive": false})).unwrap();
        assert!(inactive.should_deactivate(today()));

        let deceased: EmployeeRecord =
            serde_json::from_value(json!({"personId": "p", "isOverleden": true})).unwrap();
        assert!(deceased.should_deactivate(today()));

        let retired: EmployeeRecord =
            serde_json::from_value(json!({"personId": "p", "pensionDate": "2025-10-01"})).unwrap();
        assert!(retired.pension_reached(today()));
        assert!(!retired.is_eligible(today()));

        let unparseable: EmployeeRecord =
            serde_json::from_value(json!({"personId": "p", "pensionDate": "unknown"})).unwrap();
        assert!(unparseable.is_eligible(today()));
    }

    #[test]
    fn test_assignment_id_and_role_code() {
        let record: AssignmentRecord = serde_json::from_value(json!({
            "personId": "p1", "id": 7, "ambtCode": "  LKR ", "ambt": ""
        }))
        .unwrap();
        assert_eq!(record.assignment_id.as_deref(), Some("7"));
        assert_eq!(record.role_code(), Some("LKR"));
        assert_eq!(record.role_name(), Some("LKR"));

        let blank: AssignmentRecord =
            serde_json::from_value(json!({"personId": "p1", "ambtCode": ""})).unwrap();
        assert_eq!(blank.role_code(), None);
    }

    #[test]
    fn test_student_records() {
        let student: StudentRecord = serde_json::from_value(json!({
            "persoonId": "s1", "voornaam": "Lena", "geboortedatum": "2012-03-04T00:00:00",
            "inschrklassen": [{"klasCode": "1A"}]
        }))
        .unwrap();
        assert_eq!(student.first_name.as_deref(), Some("Lena"));
        assert_eq!(student.enrolments.len(), 1);
        assert!(student.birth_date.is_some());
    }
}
