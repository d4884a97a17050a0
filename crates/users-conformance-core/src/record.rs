// crates/users-conformance-core/src/record.rs
// ============================================================================
// Module: User Records
// Description: Canonical user record and the template used to create users.
// Purpose: Give every check one shape-independent view of a remote user.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`UserRecord`] is the canonical record produced by the normalizer from any
//! tolerated response shape. [`UserTemplate`] is the user the lifecycle
//! scenario creates, and knows how to render itself in either field dialect
//! accepted by the remote API.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Canonical Record
// ============================================================================

/// Canonical, shape-independent user record.
///
/// # Invariants
/// - `id` is non-empty once the entity exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Remote identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address, unique across a listing.
    pub email: String,
    /// Administrator flag.
    pub is_admin: bool,
}

// ============================================================================
// SECTION: Field Dialects
// ============================================================================

/// Required user fields, named independently of the wire dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    /// Display name.
    Name,
    /// Email address.
    Email,
    /// Password.
    Password,
    /// Administrator flag.
    IsAdmin,
}

impl UserField {
    /// Every required field, in submission order.
    pub const ALL: [Self; 4] = [Self::Name, Self::Email, Self::Password, Self::IsAdmin];

    /// Returns the stable label for the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Password => "password",
            Self::IsAdmin => "is_admin",
        }
    }
}

/// Key naming convention used when writing payloads to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDialect {
    /// `nome` / `administrador` with the admin flag as a `"true"` string.
    #[default]
    Portuguese,
    /// `name` / `isAdmin` with the admin flag as a JSON boolean.
    English,
}

impl FieldDialect {
    /// Returns the wire key for `field` in this dialect.
    #[must_use]
    pub const fn key(self, field: UserField) -> &'static str {
        match (self, field) {
            (Self::Portuguese, UserField::Name) => "nome",
            (Self::English, UserField::Name) => "name",
            (_, UserField::Email) => "email",
            (_, UserField::Password) => "password",
            (Self::Portuguese, UserField::IsAdmin) => "administrador",
            (Self::English, UserField::IsAdmin) => "isAdmin",
        }
    }

    /// Encodes the admin flag the way this dialect expects it.
    #[must_use]
    pub fn admin_value(self, is_admin: bool) -> Value {
        match self {
            Self::Portuguese => Value::String(is_admin.to_string()),
            Self::English => Value::Bool(is_admin),
        }
    }
}

// ============================================================================
// SECTION: Template
// ============================================================================

/// User the lifecycle scenario creates, reads, updates and deletes.
#[derive(Clone, PartialEq, Eq)]
pub struct UserTemplate {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Password sent on create and update.
    pub password: String,
    /// Administrator flag.
    pub is_admin: bool,
}

impl std::fmt::Debug for UserTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTemplate")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

impl UserTemplate {
    /// Builds a template whose name and email are unique to `suffix`.
    #[must_use]
    pub fn unique(suffix: u128) -> Self {
        Self {
            name: format!("Teste Usuário {suffix}"),
            email: format!("teste{suffix}@example.com"),
            password: "Senha123!".to_string(),
            is_admin: true,
        }
    }

    /// Returns a copy with `marker` appended to the name.
    #[must_use]
    pub fn with_name_marker(&self, marker: &str) -> Self {
        Self {
            name: format!("{} {marker}", self.name),
            ..self.clone()
        }
    }

    /// Renders the full payload in `dialect`.
    #[must_use]
    pub fn payload(&self, dialect: FieldDialect) -> Value {
        self.payload_without(dialect, None)
    }

    /// Renders the payload in `dialect`, leaving out `omitted` when set.
    #[must_use]
    pub fn payload_without(&self, dialect: FieldDialect, omitted: Option<UserField>) -> Value {
        let mut body = Map::new();
        for field in UserField::ALL {
            if Some(field) == omitted {
                continue;
            }
            let value = match field {
                UserField::Name => Value::String(self.name.clone()),
                UserField::Email => Value::String(self.email.clone()),
                UserField::Password => Value::String(self.password.clone()),
                UserField::IsAdmin => dialect.admin_value(self.is_admin),
            };
            body.insert(dialect.key(field).to_string(), value);
        }
        Value::Object(body)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
