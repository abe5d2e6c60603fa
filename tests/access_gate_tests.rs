//! Access gate tests: session presence, absence, and fail-closed behavior.
//! The gate is exercised against fake oracles implementing the same
//! capability contract as the real one.

use anyhow::{Result, anyhow};
use axum::http::{HeaderMap, HeaderValue};

use vitrina::identity::{Principal, Session, SessionOracle, SignInRequest};
use vitrina::server::resolve_session;

fn headers_with_session(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_str(&format!("vitrina_session={}", token)).unwrap(),
    );
    headers
}

/// Oracle that always confirms a session for any token.
struct AlwaysOracle;

impl SessionOracle for AlwaysOracle {
    fn current_session(&self, _token: &str) -> Result<Option<Principal>> {
        Ok(Some(Principal::new("a@b.com")))
    }
    fn sign_in(&self, _req: &SignInRequest) -> Result<Session> {
        Err(anyhow!("not used"))
    }
    fn sign_up(&self, _email: &str, _password: &str) -> Result<()> { Ok(()) }
    fn sign_out(&self, _token: &str) -> bool { false }
}

/// Oracle that never has a session.
struct EmptyOracle;

impl SessionOracle for EmptyOracle {
    fn current_session(&self, _token: &str) -> Result<Option<Principal>> { Ok(None) }
    fn sign_in(&self, _req: &SignInRequest) -> Result<Session> {
        Err(anyhow!("not used"))
    }
    fn sign_up(&self, _email: &str, _password: &str) -> Result<()> { Ok(()) }
    fn sign_out(&self, _token: &str) -> bool { false }
}

/// Oracle whose lookup itself fails, as in a service outage.
struct BrokenOracle;

impl SessionOracle for BrokenOracle {
    fn current_session(&self, _token: &str) -> Result<Option<Principal>> {
        Err(anyhow!("oracle unreachable"))
    }
    fn sign_in(&self, _req: &SignInRequest) -> Result<Session> {
        Err(anyhow!("oracle unreachable"))
    }
    fn sign_up(&self, _email: &str, _password: &str) -> Result<()> {
        Err(anyhow!("oracle unreachable"))
    }
    fn sign_out(&self, _token: &str) -> bool { false }
}

#[test]
fn gate_grants_when_session_present() {
    let headers = headers_with_session("tok");
    let p = resolve_session(&AlwaysOracle, &headers).expect("session expected");
    assert_eq!(p.email, "a@b.com");
}

#[test]
fn gate_denies_without_cookie() {
    // No cookie at all: the oracle is never consulted and access is denied.
    let headers = HeaderMap::new();
    assert!(resolve_session(&AlwaysOracle, &headers).is_none());
}

#[test]
fn gate_denies_when_no_session() {
    let headers = headers_with_session("tok");
    assert!(resolve_session(&EmptyOracle, &headers).is_none());
}

#[test]
fn gate_fails_closed_on_oracle_error() {
    // A failing lookup must behave exactly like an absent session.
    let headers = headers_with_session("tok");
    assert!(resolve_session(&BrokenOracle, &headers).is_none());
}

#[test]
fn gate_ignores_unrelated_cookies() {
    let mut headers = HeaderMap::new();
    headers.insert("cookie", HeaderValue::from_static("other=1; theme=dark"));
    assert!(resolve_session(&AlwaysOracle, &headers).is_none());
}

#[test]
fn gate_parses_session_cookie_among_others() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_static("theme=dark; vitrina_session=tok; lang=es"),
    );
    assert!(resolve_session(&AlwaysOracle, &headers).is_some());
}
