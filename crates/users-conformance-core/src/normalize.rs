// crates/users-conformance-core/src/normalize.rs
// ============================================================================
// Module: Response Normalizer
// Description: Tolerant extraction of canonical user fields from raw JSON.
// Purpose: Absorb field-name and nesting drift between API environments.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The remote API does not commit to one response shape: identifiers arrive as
//! `_id` or `id`, names as `nome` or `name`, and records may be wrapped in
//! `usuario`, `user`, or `data`. Each canonical field is extracted by an
//! ordered list of JSON paths; the first path that yields a usable value wins.
//! Every rule is a pure function of the raw value, so the rules can be tested
//! in isolation against every known shape.
//!
//! Invariants:
//! - Rule order is fixed; adding an alias never changes which value an
//!   earlier alias selects.
//! - Normalizing an already-canonical record returns it unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::record::UserRecord;

// ============================================================================
// SECTION: Extraction Rules
// ============================================================================

/// A JSON path expressed as object keys, outermost first.
type FieldPath = &'static [&'static str];

/// Identifier aliases, in priority order.
const ID_PATHS: &[FieldPath] = &[&["_id"], &["id"], &["data", "_id"], &["_idUsuario"]];
/// Name aliases, in priority order.
const NAME_PATHS: &[FieldPath] = &[&["nome"], &["name"], &["nomeUsuario"]];
/// Email aliases.
const EMAIL_PATHS: &[FieldPath] = &[&["email"]];
/// Administrator flag aliases, in priority order.
const ADMIN_PATHS: &[FieldPath] = &[&["administrador"], &["isAdmin"], &["admin"]];
/// Bearer token aliases in a login response.
const TOKEN_PATHS: &[FieldPath] = &[&["authorization"], &["token"]];
/// Wrappers around a single user object, in priority order.
const USER_WRAPPERS: &[FieldPath] = &[&["usuario"], &["user"], &["data", "user"], &["data"]];
/// Wrappers around a user listing, in priority order.
const LIST_WRAPPERS: &[FieldPath] = &[&["usuarios"], &["users"], &["data"]];

/// Scheme prefix some login endpoints already put in front of the token.
const BEARER_PREFIX: &str = "bearer ";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Canonical field a normalization rule failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedField {
    /// Remote identifier.
    Id,
    /// Display name.
    Name,
    /// Email address.
    Email,
    /// Sequence of user records.
    List,
    /// Bearer token in a login response.
    Token,
}

impl NormalizedField {
    /// Returns the stable label for the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::List => "list",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for NormalizedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response matched none of the tolerated aliases for a required field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.field, .position))]
pub struct NormalizationError {
    /// Field that could not be extracted.
    pub field: NormalizedField,
    /// Position inside a listing, when the failing value was a list element.
    pub position: Option<usize>,
}

impl NormalizationError {
    /// Creates an error for a top-level value.
    #[must_use]
    pub const fn missing(field: NormalizedField) -> Self {
        Self {
            field,
            position: None,
        }
    }
}

/// Formats a [`NormalizationError`] message.
fn describe(field: &NormalizedField, position: &Option<usize>) -> String {
    match position {
        Some(index) => format!("listing entry {index} has no recognizable `{field}` field"),
        None => format!("response has no recognizable `{field}` field"),
    }
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Follows `path` through nested objects.
fn lookup<'a>(value: &'a Value, path: FieldPath) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Returns the first value produced by `accept` across `paths`.
fn first_match<'a, T>(
    value: &'a Value,
    paths: &[FieldPath],
    accept: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    paths.iter().find_map(|path| lookup(value, *path).and_then(&accept))
}

/// Accepts strings with at least one non-whitespace character, unchanged.
fn non_empty_text(value: &Value) -> Option<String> {
    value.as_str().filter(|text| !text.trim().is_empty()).map(ToString::to_string)
}

/// Accepts non-empty strings and numeric identifiers.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        other => non_empty_text(other),
    }
}

/// Accepts booleans and the strings `"true"` / `"false"`.
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) if text.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(text) if text.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

// ============================================================================
// SECTION: Field Extraction
// ============================================================================

/// Extracts the identifier: first of `_id`, `id`, `data._id`, `_idUsuario`.
#[must_use]
pub fn extract_id(value: &Value) -> Option<String> {
    first_match(value, ID_PATHS, identifier)
}

/// Extracts the name: first of `nome`, `name`, `nomeUsuario`.
#[must_use]
pub fn extract_name(value: &Value) -> Option<String> {
    first_match(value, NAME_PATHS, non_empty_text)
}

/// Extracts the email address.
#[must_use]
pub fn extract_email(value: &Value) -> Option<String> {
    first_match(value, EMAIL_PATHS, non_empty_text)
}

/// Extracts the admin flag: first of `administrador`, `isAdmin`, `admin`.
#[must_use]
pub fn extract_admin(value: &Value) -> Option<bool> {
    first_match(value, ADMIN_PATHS, flag)
}

/// Extracts a bearer token from a login response, without any scheme prefix.
#[must_use]
pub fn extract_token(value: &Value) -> Option<String> {
    let raw = first_match(value, TOKEN_PATHS, non_empty_text)?;
    let token = raw.trim_start();
    let token = match token.split_at_checked(BEARER_PREFIX.len()) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => rest,
        _ => token,
    }
    .trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// SECTION: Record Normalization
// ============================================================================

/// Unwraps one level of `usuario`, `user`, `data.user`, or `data` nesting.
///
/// Values without a recognised object wrapper are returned as-is.
#[must_use]
pub fn unwrap_user(value: &Value) -> &Value {
    first_match(value, USER_WRAPPERS, |inner| inner.is_object().then_some(inner)).unwrap_or(value)
}

/// Normalizes a single-user response into a [`UserRecord`].
///
/// The identifier is looked up on the unwrapped object first and then on the
/// raw payload, so `{ "_id": .., "usuario": { .. } }` is also accepted.
///
/// # Errors
///
/// Returns [`NormalizationError`] naming the first required field (`id`,
/// `name`, `email`) that no alias produced.
pub fn normalize_user(value: &Value) -> Result<UserRecord, NormalizationError> {
    let user = unwrap_user(value);
    let id = extract_id(user)
        .or_else(|| extract_id(value))
        .ok_or(NormalizationError::missing(NormalizedField::Id))?;
    let name = extract_name(user).ok_or(NormalizationError::missing(NormalizedField::Name))?;
    let email = extract_email(user).ok_or(NormalizationError::missing(NormalizedField::Email))?;
    let is_admin = extract_admin(user).unwrap_or(false);
    Ok(UserRecord {
        id,
        name,
        email,
        is_admin,
    })
}

/// Normalizes a listing response into records, preserving order.
///
/// # Errors
///
/// Returns [`NormalizationError`] with field `list` when no sequence is found,
/// or the element's missing field and position when an entry fails.
pub fn normalize_list(value: &Value) -> Result<Vec<UserRecord>, NormalizationError> {
    list_entries(value)?
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            normalize_user(entry).map_err(|err| NormalizationError {
                field: err.field,
                position: Some(index),
            })
        })
        .collect()
}

/// Returns the raw entries of a listing response: a bare array or the first
/// of `usuarios`, `users`, `data`.
///
/// # Errors
///
/// Returns [`NormalizationError`] with field `list` when no sequence is found.
pub fn list_entries(value: &Value) -> Result<&[Value], NormalizationError> {
    match value {
        Value::Array(entries) => Ok(entries),
        other => first_match(other, LIST_WRAPPERS, Value::as_array)
            .map(Vec::as_slice)
            .ok_or(NormalizationError::missing(NormalizedField::List)),
    }
}

/// Counts listing entries whose email equals `email`.
///
/// Entries are matched on email alone, so records of other users that lack
/// a name or id never affect the count.
///
/// # Errors
///
/// Returns [`NormalizationError`] with field `list` when no sequence is found.
pub fn count_email(value: &Value, email: &str) -> Result<usize, NormalizationError> {
    let entries = list_entries(value)?;
    Ok(entries
        .iter()
        .filter(|entry| extract_email(unwrap_user(entry)).is_some_and(|found| found == email))
        .count())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
