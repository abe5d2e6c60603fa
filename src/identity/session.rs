use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

/// An issued session. The token is the only thing handed to clients; it is an
/// opaque random string with no inspectable contents.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    csrf: String,
}

fn gen_id() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-memory session table with TTL expiry and explicit revocation.
///
/// All state is held on the instance so tests can run managers in isolation;
/// the server owns exactly one, shared behind an `Arc`.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    user_index: RwLock<HashMap<String, HashSet<String>>>,
    revoked: RwLock<HashSet<String>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::with_ttl(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
            user_index: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
        }
    }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let sid = gen_id();
        let token = gen_id();
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let entry = SessionEntry { session: sess.clone(), csrf: gen_id() };
        {
            let mut m = self.sessions.write();
            m.insert(token.clone(), entry);
        }
        {
            let mut uidx = self.user_index.write();
            let set = uidx.entry(principal.email.clone()).or_insert_with(HashSet::new);
            set.insert(token.clone());
        }
        tprintln!("session.issue user={} sid={} ttl_secs={}", principal.email, sid, self.ttl.as_secs());
        sess
    }

    /// Resolve a token to its principal, dropping it if expired.
    pub fn validate(&self, token: &str) -> Option<Principal> {
        if self.revoked.read().contains(token) { return None; }
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(ent) = map.get(token) {
                if ent.session.expires_at > now {
                    Some(ent.session.principal.clone())
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else { None }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    /// CSRF token bound to a live session, if any. Applies the same liveness
    /// rules as `validate`: revoked or expired tokens have no CSRF token.
    pub fn csrf_for(&self, token: &str) -> Option<String> {
        if self.revoked.read().contains(token) { return None; }
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(ent) = map.get(token) {
                if ent.session.expires_at > now {
                    Some(ent.csrf.clone())
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else { None }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let mut removed = false;
        if let Some(ent) = self.sessions.write().remove(token) {
            removed = true;
            let email = ent.session.principal.email;
            let mut idx = self.user_index.write();
            if let Some(set) = idx.get_mut(&email) { set.remove(token); }
            self.revoked.write().insert(token.to_string());
        }
        removed
    }

    /// Revoke every live session for a user. Returns the number removed.
    pub fn revoke_user(&self, email: &str) -> usize {
        let mut count = 0usize;
        if let Some(tokens) = self.user_index.read().get(email).cloned() {
            let mut s = self.sessions.write();
            let mut r = self.revoked.write();
            for t in tokens.iter() {
                if s.remove(t).is_some() { count += 1; }
                r.insert(t.clone());
            }
        }
        tprintln!("session.revoke user={} count={}", email, count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_validate() {
        let sm = SessionManager::default();
        let sess = sm.issue(Principal::new("a@b.com"));
        let p = sm.validate(&sess.token).expect("live session");
        assert_eq!(p.email, "a@b.com");
        assert!(sm.csrf_for(&sess.token).is_some());
    }

    #[test]
    fn unknown_token_is_absent() {
        let sm = SessionManager::default();
        assert!(sm.validate("no-such-token").is_none());
        assert!(sm.csrf_for("no-such-token").is_none());
    }

    #[test]
    fn expired_session_is_absent() {
        let sm = SessionManager::with_ttl(Duration::from_millis(0));
        let sess = sm.issue(Principal::new("a@b.com"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(sm.validate(&sess.token).is_none());
    }

    #[test]
    fn csrf_token_dies_with_the_session() {
        let sm = SessionManager::with_ttl(Duration::from_millis(0));
        let sess = sm.issue(Principal::new("a@b.com"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(sm.csrf_for(&sess.token).is_none());

        let sm = SessionManager::default();
        let sess = sm.issue(Principal::new("a@b.com"));
        assert!(sm.csrf_for(&sess.token).is_some());
        sm.logout(&sess.token);
        assert!(sm.csrf_for(&sess.token).is_none());
    }

    #[test]
    fn logout_revokes_token() {
        let sm = SessionManager::default();
        let sess = sm.issue(Principal::new("a@b.com"));
        assert!(sm.logout(&sess.token));
        assert!(sm.validate(&sess.token).is_none());
        // second logout is a no-op
        assert!(!sm.logout(&sess.token));
    }

    #[test]
    fn revoke_user_drops_all_sessions() {
        let sm = SessionManager::default();
        let s1 = sm.issue(Principal::new("a@b.com"));
        let s2 = sm.issue(Principal::new("a@b.com"));
        let other = sm.issue(Principal::new("c@d.com"));
        assert_eq!(sm.revoke_user("a@b.com"), 2);
        assert!(sm.validate(&s1.token).is_none());
        assert!(sm.validate(&s2.token).is_none());
        assert!(sm.validate(&other.token).is_some());
    }
}
