// crates/users-conformance-core/src/validation/validation_tests.rs
// ============================================================================
// Module: Validation Prober Unit Tests
// Description: Case construction and status evaluation.
// Purpose: Pin the rejection contract without a remote API.
// Dependencies: users-conformance-core
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::ValidationCase;
use super::ValidationExpectationError;
use super::evaluate;
use crate::record::FieldDialect;
use crate::record::UserField;
use crate::transport::RawResponse;

fn response(status: u16) -> RawResponse {
    RawResponse {
        status,
        body: None,
    }
}

#[test]
fn every_required_field_has_a_case_plus_control() {
    let names: Vec<String> = ValidationCase::all().into_iter().map(ValidationCase::name).collect();
    assert_eq!(names, [
        "missing_name",
        "missing_email",
        "missing_password",
        "missing_is_admin",
        "complete_payload"
    ]);
}

#[test]
fn missing_case_payload_omits_only_that_field() {
    let case = ValidationCase::Missing(UserField::Email);
    let payload = case.template(5).payload_without(FieldDialect::Portuguese, Some(UserField::Email));
    let object = payload.as_object().unwrap();
    assert!(!object.contains_key("email"));
    assert!(object.contains_key("nome"));
    assert!(object.contains_key("password"));
    assert_eq!(object.get("administrador").and_then(|value| value.as_str()), Some("true"));
}

#[test]
fn case_templates_have_distinct_emails() {
    let emails: Vec<String> =
        ValidationCase::all().into_iter().map(|case| case.template(9).email).collect();
    let mut unique = emails.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), emails.len());
    assert_eq!(emails[0], "no-name9@example.com");
}

#[test]
fn rejection_statuses_pass_for_missing_fields() {
    let case = ValidationCase::Missing(UserField::Password);
    assert!(evaluate(case, &response(400)).is_ok());
    assert!(evaluate(case, &response(422)).is_ok());
}

#[test]
fn success_for_missing_field_is_acceptance() {
    let case = ValidationCase::Missing(UserField::Name);
    assert_eq!(evaluate(case, &response(201)), Err(ValidationExpectationError::Accepted {
        status: 201
    }));
}

#[test]
fn other_error_class_is_wrong_status() {
    let case = ValidationCase::Missing(UserField::IsAdmin);
    let err = evaluate(case, &response(500)).unwrap_err();
    assert_eq!(err.observed(), Some(500));
    assert_eq!(err.to_string(), "unexpected status 500, expected 400|422");
}

#[test]
fn control_requires_creation() {
    assert!(evaluate(ValidationCase::Control, &response(201)).is_ok());
    assert!(evaluate(ValidationCase::Control, &response(400)).is_err());
}
