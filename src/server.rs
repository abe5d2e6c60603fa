//!
//! vitrina HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for the storefront.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Login/signup/logout endpoints backed by the session oracle.
//! - The access gate in front of the admin panel: the session cookie is
//!   resolved through the oracle exactly once per request, and any failure to
//!   positively confirm a session denies access (fail closed). The protected
//!   page route redirects to /login; protected JSON routes answer 401.
//! - Public catalog listing with per-product WhatsApp inquiry links.
//! - Catalog CRUD and image upload/serving for the admin panel.
//!
//! Every failure path is expressed as an `error::AppError` and rendered
//! through `error_response`, so status codes and body shape stay uniform.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::{get, post, delete}, Router, extract::{State, Path, Query}, Json};
use axum::body::Bytes;
use axum::response::{IntoResponse, Redirect, Response};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, error, warn};
use uuid::Uuid;
use anyhow::Context;

use crate::error::{AppError, AppResult};
use crate::identity::{LocalSessionOracle, Principal, SessionManager, SessionOracle, SignInRequest};
use crate::security::SecurityError;
use crate::storage::{CatalogError, NewProduct, SharedCatalog};
use crate::whatsapp;

const SESSION_COOKIE: &str = "vitrina_session";

/// Single generic credential failure message. Wrong email, wrong password and
/// oracle outage all render identically so nothing about the credential pair
/// can be enumerated.
pub const INVALID_CREDENTIALS: &str = "Credenciales inválidas. Acceso denegado.";

/// Shared server state injected into all handlers.
///
/// The session oracle is held as a trait object so tests can swap in a fake;
/// the `SessionManager` handle is kept alongside for the CSRF token lookup,
/// which is a transport concern rather than part of the oracle contract.
#[derive(Clone)]
pub struct AppState {
    pub catalog: SharedCatalog,
    pub oracle: Arc<dyn SessionOracle>,
    pub sessions: Arc<SessionManager>,
    pub whatsapp_number: String,
}

/// Start the vitrina HTTP server bound to the given port.
///
/// Sets up the catalog store under `data_root`, wires the local session
/// oracle, logs a startup inventory, and mounts all routes.
pub async fn run_with_config(http_port: u16, data_root: &str, whatsapp_number: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_root)
        .with_context(|| format!("Failed to create or access data root: {}", data_root))?;
    let catalog = SharedCatalog::new(data_root)
        .with_context(|| format!("While opening catalog under data root: {}", data_root))?;

    let sessions = Arc::new(SessionManager::default());
    let oracle: Arc<dyn SessionOracle> =
        Arc::new(LocalSessionOracle::new(data_root.to_string(), sessions.clone()));

    print_catalog_inventory(&catalog);
    if !std::path::Path::new(data_root).join("users.json").exists() {
        warn!("no admin users registered yet; POST /signup to create one");
    }

    let app_state = AppState {
        catalog,
        oracle,
        sessions,
        whatsapp_number: whatsapp_number.to_string(),
    };

    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full route table over the given state. Split out so tests can
/// mount the router without binding a socket.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "vitrina ok" }))
        .route("/catalog", get(public_catalog))
        .route("/images/{file}", get(serve_image))
        .route("/login", get(login_page).post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
        .route("/session", get(current_session))
        .route("/csrf", get(get_csrf))
        .route("/admin", get(admin_panel))
        .route("/admin/products", get(admin_list_products).post(admin_create_product))
        .route("/admin/products/{id}", delete(admin_delete_product))
        .route("/admin/images", post(admin_upload_image))
        .with_state(app_state)
}

/// Log the number of products found on disk at startup.
fn print_catalog_inventory(catalog: &SharedCatalog) {
    let guard = catalog.0.lock();
    match guard.list() {
        Ok(products) => {
            info!("Catalog loaded: {} product(s) under {}", products.len(), guard.root_path().display());
        }
        Err(e) => warn!("Could not read catalog at startup: {}", e),
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn get_token_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

/// The access gate. Resolves the session cookie through the oracle exactly
/// once. No cookie, no session, or a failing lookup all yield `None`; an
/// ambiguous auth state must never grant access.
pub fn resolve_session(oracle: &dyn SessionOracle, headers: &HeaderMap) -> Option<Principal> {
    let token = get_token_from_headers(headers)?;
    match oracle.current_session(&token) {
        Ok(opt) => opt,
        Err(e) => {
            error!("session lookup failed, denying access: {e}");
            None
        }
    }
}

/// Gate helper for protected JSON routes.
fn require_session(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    resolve_session(state.oracle.as_ref(), headers)
        .ok_or_else(|| AppError::auth("unauthorized", "session required"))
}

fn require_csrf(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let token = get_token_from_headers(headers);
    let provided = headers.get("x-csrf-token").and_then(|v| v.to_str().ok());
    if let (Some(token), Some(provided)) = (token, provided) {
        if state.sessions.csrf_for(&token).as_deref() == Some(provided) {
            return Ok(());
        }
    }
    Err(AppError::csrf("invalid_csrf", "invalid csrf"))
}

/// Render an application error as the uniform JSON error body.
fn error_response(e: AppError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": e.code_str(),"message": e.message()}))).into_response()
}

/// Map catalog failures onto the application error model. Anything that is
/// not a typed catalog error is a filesystem fault.
fn catalog_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<CatalogError>() {
        Some(CatalogError::MissingNameOrPrice) => {
            AppError::user("bad_input".to_string(), "Nombre y Precio son obligatorios".to_string())
        }
        Some(CatalogError::ProductNotFound(_)) => {
            AppError::not_found("not_found".to_string(), "producto no encontrado".to_string())
        }
        Some(CatalogError::ImageNotFound(_)) => {
            AppError::not_found("not_found".to_string(), "imagen no encontrada".to_string())
        }
        Some(CatalogError::InvalidImageName) => {
            AppError::user("bad_input".to_string(), "invalid image name".to_string())
        }
        None => {
            error!("catalog I/O failure: {e}");
            AppError::io("io_error".to_string(), e.to_string())
        }
    }
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, token)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

// ---------- public surface ----------

async fn public_catalog(State(state): State<AppState>) -> Response {
    let listed = {
        let guard = state.catalog.0.lock();
        guard.list()
    };
    match listed {
        Ok(products) => {
            let entries: Vec<serde_json::Value> = products
                .iter()
                .map(|p| {
                    let mut v = serde_json::to_value(p).unwrap_or_else(|_| json!({}));
                    if let Some(obj) = v.as_object_mut() {
                        obj.insert(
                            "whatsapp_url".into(),
                            json!(whatsapp::inquiry_link(&state.whatsapp_number, &p.name)),
                        );
                    }
                    v
                })
                .collect();
            (StatusCode::OK, Json(json!({"status":"ok","productos": entries}))).into_response()
        }
        Err(e) => error_response(catalog_error(e)),
    }
}

fn content_type_for(file: &str) -> &'static str {
    match std::path::Path::new(file).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

async fn serve_image(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let read = {
        let guard = state.catalog.0.lock();
        guard.read_image(&file)
    };
    match read {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type_for(&file))], bytes).into_response(),
        Err(e) => error_response(catalog_error(e)),
    }
}

// ---------- session oracle surface ----------

#[derive(Debug, Deserialize)]
struct LoginPayload { email: String, password: String }

#[derive(Debug, Deserialize)]
struct SignupPayload {
    email: String,
    password: String,
    #[serde(default)]
    confirm: bool,
}

async fn login_page() -> &'static str {
    "Acceso Restringido - Panel de Administración"
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    let req = SignInRequest { email: payload.email, password: payload.password };
    match state.oracle.sign_in(&req) {
        Ok(session) => {
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&session.token));
            (StatusCode::OK, headers, Json(json!({"status":"ok"}))).into_response()
        }
        Err(e) => {
            // Wrong email, wrong password and oracle failure all collapse into
            // one generic message; the detail only goes to the log.
            error!("login rejected: {e}");
            error_response(AppError::auth("invalid_credentials".to_string(), INVALID_CREDENTIALS.to_string()))
        }
    }
}

async fn signup(State(state): State<AppState>, Json(payload): Json<SignupPayload>) -> Response {
    if !payload.confirm {
        return error_response(AppError::user("confirmation_required", "signup requires confirm=true"));
    }
    match state.oracle.sign_up(payload.email.trim(), &payload.password) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok","message":"¡Usuario registrado! Intenta iniciar sesión ahora."}))).into_response(),
        Err(e) => match e.downcast_ref::<SecurityError>() {
            Some(SecurityError::UserExists(_)) => {
                error_response(AppError::conflict("conflict".to_string(), "Error de registro: el usuario ya existe.".to_string()))
            }
            Some(SecurityError::EmptyEmail) | Some(SecurityError::EmptyPassword) => {
                error_response(AppError::user("bad_input".to_string(), "email and password are required".to_string()))
            }
            None => {
                error!("signup failed: {e}");
                error_response(AppError::from(e))
            }
        },
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Require CSRF token
    if let Err(e) = require_csrf(&state, &headers) {
        return error_response(e);
    }
    if let Some(token) = get_token_from_headers(&headers) {
        state.oracle.sign_out(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response()
}

/// Current-session probe. Always answers 200; the session field is null when
/// no session can be confirmed.
async fn current_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match resolve_session(state.oracle.as_ref(), &headers) {
        Some(p) => (StatusCode::OK, Json(json!({"status":"ok","session": {"user": p.email}}))).into_response(),
        None => (StatusCode::OK, Json(json!({"status":"ok","session": null}))).into_response(),
    }
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Must be logged in to fetch the CSRF token
    if let Err(e) = require_session(&state, &headers) {
        return error_response(e);
    }
    let csrf = get_token_from_headers(&headers)
        .and_then(|token| state.sessions.csrf_for(&token));
    match csrf {
        Some(csrf) => (StatusCode::OK, Json(json!({"status":"ok","csrf": csrf}))).into_response(),
        None => error_response(AppError::internal("internal_error", "csrf not available")),
    }
}

// ---------- protected surface ----------

/// The protected page route. Unauthenticated visitors are sent to /login with
/// a 303 so the browser replaces the request rather than re-submitting it.
async fn admin_panel(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(principal) = resolve_session(state.oracle.as_ref(), &headers) else {
        return Redirect::to("/login").into_response();
    };
    let listed = {
        let guard = state.catalog.0.lock();
        guard.list()
    };
    match listed {
        Ok(products) => (StatusCode::OK, Json(json!({
            "status":"ok",
            "panel":"Panel de Administración",
            "user": principal.email,
            "productos": products,
        }))).into_response(),
        Err(e) => error_response(catalog_error(e)),
    }
}

async fn admin_list_products(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = require_session(&state, &headers) {
        return error_response(e);
    }
    let listed = {
        let guard = state.catalog.0.lock();
        guard.list()
    };
    match listed {
        Ok(products) => (StatusCode::OK, Json(json!({"status":"ok","productos": products}))).into_response(),
        Err(e) => error_response(catalog_error(e)),
    }
}

async fn admin_create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewProduct>,
) -> Response {
    if let Err(e) = require_session(&state, &headers).and_then(|_| require_csrf(&state, &headers)) {
        return error_response(e);
    }
    let inserted = {
        let guard = state.catalog.0.lock();
        guard.insert(payload)
    };
    match inserted {
        Ok(product) => (StatusCode::OK, Json(json!({"status":"ok","producto": product}))).into_response(),
        Err(e) => error_response(catalog_error(e)),
    }
}

async fn admin_delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(e) = require_session(&state, &headers).and_then(|_| require_csrf(&state, &headers)) {
        return error_response(e);
    }
    let deleted = {
        let guard = state.catalog.0.lock();
        guard.delete(id)
    };
    match deleted {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(e) => error_response(catalog_error(e)),
    }
}

#[derive(Debug, Deserialize)]
struct ImageQuery { name: String }

async fn admin_upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ImageQuery>,
    body: Bytes,
) -> Response {
    if let Err(e) = require_session(&state, &headers).and_then(|_| require_csrf(&state, &headers)) {
        return error_response(e);
    }
    if body.is_empty() {
        return error_response(AppError::user("bad_input", "empty upload"));
    }
    let stored = {
        let guard = state.catalog.0.lock();
        guard.store_image(&q.name, &body)
    };
    match stored {
        Ok(file) => {
            let url = format!("/images/{}", file);
            (StatusCode::OK, Json(json!({"status":"ok","file": file,"url": url}))).into_response()
        }
        Err(e) => error_response(catalog_error(e)),
    }
}
