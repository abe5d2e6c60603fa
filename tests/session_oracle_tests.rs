//! Session oracle integration tests: sign-in, sign-up, sign-out, and session
//! lifecycle against the local credential store.

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use vitrina::identity::{LocalSessionOracle, SessionManager, SessionOracle, SignInRequest};

fn oracle_at(root: &str) -> LocalSessionOracle {
    LocalSessionOracle::new(root.to_string(), Arc::new(SessionManager::default()))
}

fn sign_in_req(email: &str, password: &str) -> SignInRequest {
    SignInRequest { email: email.into(), password: password.into() }
}

#[test]
fn sign_up_then_sign_in_issues_session() {
    let tmp = tempdir().unwrap();
    let oracle = oracle_at(tmp.path().to_str().unwrap());

    oracle.sign_up("admin@vhf.com", "s3cret").unwrap();
    let session = oracle.sign_in(&sign_in_req("admin@vhf.com", "s3cret")).unwrap();

    let p = oracle.current_session(&session.token).unwrap().expect("live session");
    assert_eq!(p.email, "admin@vhf.com");
}

#[test]
fn wrong_password_and_unknown_email_both_fail() {
    let tmp = tempdir().unwrap();
    let oracle = oracle_at(tmp.path().to_str().unwrap());
    oracle.sign_up("admin@vhf.com", "s3cret").unwrap();

    assert!(oracle.sign_in(&sign_in_req("admin@vhf.com", "wrong")).is_err());
    assert!(oracle.sign_in(&sign_in_req("nobody@vhf.com", "s3cret")).is_err());
}

#[test]
fn duplicate_sign_up_is_rejected() {
    let tmp = tempdir().unwrap();
    let oracle = oracle_at(tmp.path().to_str().unwrap());
    oracle.sign_up("admin@vhf.com", "one").unwrap();
    assert!(oracle.sign_up("admin@vhf.com", "two").is_err());
}

#[test]
fn sign_out_destroys_the_session() {
    let tmp = tempdir().unwrap();
    let oracle = oracle_at(tmp.path().to_str().unwrap());
    oracle.sign_up("admin@vhf.com", "s3cret").unwrap();

    let session = oracle.sign_in(&sign_in_req("admin@vhf.com", "s3cret")).unwrap();
    assert!(oracle.sign_out(&session.token));
    assert!(oracle.current_session(&session.token).unwrap().is_none());
    // token stays dead
    assert!(!oracle.sign_out(&session.token));
}

#[test]
fn expiry_collapses_into_absent_session() {
    let tmp = tempdir().unwrap();
    let sm = Arc::new(SessionManager::with_ttl(Duration::from_millis(0)));
    let oracle = LocalSessionOracle::new(tmp.path().to_str().unwrap().to_string(), sm);
    oracle.sign_up("admin@vhf.com", "s3cret").unwrap();

    let session = oracle.sign_in(&sign_in_req("admin@vhf.com", "s3cret")).unwrap();
    std::thread::sleep(Duration::from_millis(2));
    assert!(oracle.current_session(&session.token).unwrap().is_none());
}

#[test]
fn each_sign_in_issues_a_distinct_token() {
    let tmp = tempdir().unwrap();
    let oracle = oracle_at(tmp.path().to_str().unwrap());
    oracle.sign_up("admin@vhf.com", "s3cret").unwrap();

    let a = oracle.sign_in(&sign_in_req("admin@vhf.com", "s3cret")).unwrap();
    let b = oracle.sign_in(&sign_in_req("admin@vhf.com", "s3cret")).unwrap();
    assert_ne!(a.token, b.token);
    // both remain independently valid until signed out
    assert!(oracle.current_session(&a.token).unwrap().is_some());
    assert!(oracle.current_session(&b.token).unwrap().is_some());
    oracle.sign_out(&a.token);
    assert!(oracle.current_session(&a.token).unwrap().is_none());
    assert!(oracle.current_session(&b.token).unwrap().is_some());
}
