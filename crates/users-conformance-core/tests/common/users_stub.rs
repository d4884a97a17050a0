// crates/users-conformance-core/tests/common/users_stub.rs
// ============================================================================
// Module: Users API Stub
// Description: In-process users REST API served over HTTP by axum.
// Purpose: Exercise every check against each tolerated response shape.
// Dependencies: axum, serde_json, tokio
// ============================================================================

//! ## Overview
//! The stub keeps users in memory and answers in one of several response
//! shapes. Behaviour switches let tests break a single contract point (an
//! ignored update, a delete that keeps the user, validation turned off) and
//! confirm the matching check fails while the rest still pass.

use std::collections::BTreeMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::sleep;

use super::ADMIN_EMAIL;
use super::ADMIN_PASSWORD;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Response shape the stub answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Flat Portuguese records, `{quantidade, usuarios}` listings, message-only
    /// mutation responses, `400` for a missing user.
    Flat,
    /// Records wrapped in `usuario`, listings under `users` with wrapped
    /// entries, update echoes the record, `404` for a missing user.
    Wrapped,
    /// English records under `data`, bare-array listings, `204` mutations,
    /// `404` for a missing user.
    English,
}

/// Fixed-window limiter applied to authenticated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Listings allowed per window.
    pub limit: usize,
    /// Window length.
    pub window: Duration,
}

/// Stub behaviour switches.
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Users collection path.
    pub users_path: String,
    /// Response shape.
    pub shape: ResponseShape,
    /// Token issued on login.
    pub token: String,
    /// Reject incomplete create payloads.
    pub enforce_validation: bool,
    /// Require the issued bearer token on users routes.
    pub enforce_auth: bool,
    /// Throttle listings.
    pub rate_limit: Option<RateWindow>,
    /// Delay before answering a listing.
    pub list_delay: Duration,
    /// Answer updates with success but keep the old record.
    pub ignore_update: bool,
    /// Answer deletes with success but keep the record.
    pub ignore_delete: bool,
    /// Raw records of other users listed ahead of the stored ones.
    pub foreign_entries: Vec<Value>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            users_path: "/usuarios".to_string(),
            shape: ResponseShape::Flat,
            token: "stub-token".to_string(),
            enforce_validation: true,
            enforce_auth: true,
            rate_limit: None,
            list_delay: Duration::ZERO,
            ignore_update: false,
            ignore_delete: false,
            foreign_entries: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredUser {
    id: String,
    name: String,
    email: String,
    password: String,
    is_admin: bool,
}

#[derive(Debug)]
struct StubStore {
    users: BTreeMap<String, StoredUser>,
    next_id: u64,
    window_started: Instant,
    window_count: usize,
    throttled: usize,
}

#[derive(Clone)]
struct StubState {
    config: Arc<StubConfig>,
    store: Arc<Mutex<StubStore>>,
}

impl StubState {
    fn with_store<T>(&self, f: impl FnOnce(&mut StubStore) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle for a running stub; shuts the server down on drop.
pub struct UsersStubHandle {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
    state: StubState,
}

impl UsersStubHandle {
    /// Returns the stub base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the number of stored users.
    pub fn user_count(&self) -> usize {
        self.state.with_store(|store| store.users.len())
    }

    /// Returns true when a user with `email` is stored.
    pub fn has_email(&self, email: &str) -> bool {
        self.state.with_store(|store| store.users.values().any(|user| user.email == email))
    }

    /// Returns how many listings were throttled.
    pub fn throttled(&self) -> usize {
        self.state.with_store(|store| store.throttled)
    }
}

impl Drop for UsersStubHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the stub on an ephemeral port.
pub fn spawn_users_stub(config: StubConfig) -> Result<UsersStubHandle, String> {
    let listener = StdTcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("users stub bind failed: {err}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("users stub listener nonblocking failed: {err}"))?;
    let addr = listener.local_addr().map_err(|err| format!("users stub local addr failed: {err}"))?;
    let base_url = format!("http://{addr}");

    let users_path = config.users_path.clone();
    let state = StubState {
        config: Arc::new(config),
        store: Arc::new(Mutex::new(StubStore {
            users: BTreeMap::new(),
            next_id: 1,
            window_started: Instant::now(),
            window_count: 0,
            throttled: 0,
        })),
    };
    let app = Router::new()
        .route("/login", post(login))
        .route(&users_path, get(list_users).post(create_user))
        .route(&format!("{users_path}/{{id}}"), get(read_user).put(update_user).delete(delete_user))
        .with_state(state.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = thread::spawn(move || {
        let Ok(runtime) = Builder::new_current_thread().enable_all().build() else {
            return;
        };
        runtime.block_on(async move {
            let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                return;
            };
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
    });
    Ok(UsersStubHandle {
        base_url,
        shutdown: Some(shutdown_tx),
        join: Some(join),
        state,
    })
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn render_user(shape: ResponseShape, user: &StoredUser) -> Value {
    match shape {
        ResponseShape::Flat | ResponseShape::Wrapped => json!({
            "nome": user.name,
            "email": user.email,
            "password": user.password,
            "administrador": user.is_admin.to_string(),
            "_id": user.id,
        }),
        ResponseShape::English => json!({
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "isAdmin": user.is_admin,
        }),
    }
}

fn wrap_single(shape: ResponseShape, record: Value) -> Value {
    match shape {
        ResponseShape::Flat => record,
        ResponseShape::Wrapped => json!({ "usuario": record }),
        ResponseShape::English => json!({ "data": record }),
    }
}

fn missing_user(shape: ResponseShape) -> Response {
    match shape {
        ResponseShape::Flat => message(StatusCode::BAD_REQUEST, "Usuário não encontrado"),
        ResponseShape::Wrapped | ResponseShape::English => {
            message(StatusCode::NOT_FOUND, "user not found")
        }
    }
}

// ============================================================================
// SECTION: Guards
// ============================================================================

fn authorized(state: &StubState, headers: &HeaderMap) -> Result<(), Response> {
    if !state.config.enforce_auth {
        return Ok(());
    }
    let expected = format!("Bearer {}", state.config.token);
    let presented = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(message(
            StatusCode::UNAUTHORIZED,
            "Token de acesso ausente, inválido, expirado ou usuário do token não existe mais",
        ))
    }
}

fn admit_listing(state: &StubState) -> Result<(), Response> {
    let Some(window) = state.config.rate_limit else {
        return Ok(());
    };
    state.with_store(|store| {
        if store.window_started.elapsed() >= window.window {
            store.window_started = Instant::now();
            store.window_count = 0;
        }
        store.window_count += 1;
        if store.window_count > window.limit {
            store.throttled += 1;
            Err(message(StatusCode::TOO_MANY_REQUESTS, "Too many requests"))
        } else {
            Ok(())
        }
    })
}

// ============================================================================
// SECTION: Payload Parsing
// ============================================================================

struct NewUser {
    name: String,
    email: String,
    password: String,
    is_admin: bool,
}

fn text_field(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
}

fn parse_user(body: &Value, enforce: bool) -> Result<NewUser, (&'static str, &'static str)> {
    let name = text_field(body, &["nome", "name"]);
    let email = text_field(body, &["email"]);
    let password = text_field(body, &["password"]);
    let is_admin = match (body.get("administrador"), body.get("isAdmin")) {
        (Some(Value::String(text)), _) if text == "true" || text == "false" => Some(text == "true"),
        (_, Some(Value::Bool(flag))) => Some(*flag),
        _ => None,
    };
    if enforce {
        let name = name.ok_or(("nome", "nome é obrigatório"))?;
        let email = email.ok_or(("email", "email é obrigatório"))?;
        let password = password.ok_or(("password", "password é obrigatório"))?;
        let is_admin = is_admin.ok_or(("administrador", "administrador deve ser 'true' ou 'false'"))?;
        return Ok(NewUser {
            name,
            email,
            password,
            is_admin,
        });
    }
    Ok(NewUser {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
        is_admin: is_admin.unwrap_or(false),
    })
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

async fn login(State(state): State<StubState>, bytes: Bytes) -> Response {
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if email != Some(ADMIN_EMAIL) || password != Some(ADMIN_PASSWORD) {
        return message(StatusCode::UNAUTHORIZED, "Email e/ou senha inválidos");
    }
    let token = &state.config.token;
    let payload = match state.config.shape {
        ResponseShape::Flat | ResponseShape::Wrapped => json!({
            "message": "Login realizado com sucesso",
            "authorization": format!("Bearer {token}"),
        }),
        ResponseShape::English => json!({ "token": token }),
    };
    (StatusCode::OK, Json(payload)).into_response()
}

async fn list_users(State(state): State<StubState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorized(&state, &headers) {
        return response;
    }
    if let Err(response) = admit_listing(&state) {
        return response;
    }
    if !state.config.list_delay.is_zero() {
        sleep(state.config.list_delay).await;
    }
    let shape = state.config.shape;
    let mut records = state.config.foreign_entries.clone();
    records.extend(state.with_store(|store| {
        store.users.values().map(|user| render_user(shape, user)).collect::<Vec<_>>()
    }));
    let payload = match shape {
        ResponseShape::Flat => json!({ "quantidade": records.len(), "usuarios": records }),
        ResponseShape::Wrapped => {
            let wrapped: Vec<Value> =
                records.into_iter().map(|record| json!({ "usuario": record })).collect();
            json!({ "users": wrapped })
        }
        ResponseShape::English => Value::Array(records),
    };
    (StatusCode::OK, Json(payload)).into_response()
}

async fn create_user(State(state): State<StubState>, headers: HeaderMap, bytes: Bytes) -> Response {
    if let Err(response) = authorized(&state, &headers) {
        return response;
    }
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let user = match parse_user(&body, state.config.enforce_validation) {
        Ok(user) => user,
        Err((field, text)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ field: text }))).into_response();
        }
    };
    let shape = state.config.shape;
    state.with_store(|store| {
        if !user.email.is_empty() && store.users.values().any(|existing| existing.email == user.email)
        {
            return message(StatusCode::BAD_REQUEST, "Este email já está sendo usado");
        }
        let id = format!("stub{:04}", store.next_id);
        store.next_id += 1;
        let stored = StoredUser {
            id: id.clone(),
            name: user.name,
            email: user.email,
            password: user.password,
            is_admin: user.is_admin,
        };
        let payload = match shape {
            ResponseShape::Flat => json!({ "message": "Cadastro realizado com sucesso", "_id": id }),
            ResponseShape::Wrapped => json!({ "usuario": render_user(shape, &stored) }),
            ResponseShape::English => json!({ "data": { "user": render_user(shape, &stored) } }),
        };
        store.users.insert(id, stored);
        (StatusCode::CREATED, Json(payload)).into_response()
    })
}

async fn read_user(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authorized(&state, &headers) {
        return response;
    }
    let shape = state.config.shape;
    match state.with_store(|store| store.users.get(&id).cloned()) {
        Some(user) => (StatusCode::OK, Json(wrap_single(shape, render_user(shape, &user)))).into_response(),
        None => missing_user(shape),
    }
}

async fn update_user(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    bytes: Bytes,
) -> Response {
    if let Err(response) = authorized(&state, &headers) {
        return response;
    }
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let user = match parse_user(&body, true) {
        Ok(user) => user,
        Err((field, text)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ field: text }))).into_response();
        }
    };
    let shape = state.config.shape;
    let ignore = state.config.ignore_update;
    let updated = state.with_store(|store| {
        let stored = store.users.get_mut(&id)?;
        if !ignore {
            stored.name = user.name;
            stored.email = user.email;
            stored.password = user.password;
            stored.is_admin = user.is_admin;
        }
        Some(stored.clone())
    });
    let Some(updated) = updated else {
        return missing_user(shape);
    };
    match shape {
        ResponseShape::Flat => message(StatusCode::OK, "Registro alterado com sucesso"),
        ResponseShape::Wrapped => {
            (StatusCode::OK, Json(wrap_single(shape, render_user(shape, &updated)))).into_response()
        }
        ResponseShape::English => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn delete_user(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authorized(&state, &headers) {
        return response;
    }
    let ignore = state.config.ignore_delete;
    let removed = state.with_store(|store| {
        if ignore { store.users.contains_key(&id) } else { store.users.remove(&id).is_some() }
    });
    match (state.config.shape, removed) {
        (ResponseShape::English, true) => StatusCode::NO_CONTENT.into_response(),
        (_, true) => message(StatusCode::OK, "Registro excluído com sucesso"),
        (_, false) => message(StatusCode::OK, "Nenhum registro excluído"),
    }
}
