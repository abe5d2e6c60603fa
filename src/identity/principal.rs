use serde::{Deserialize, Serialize};

/// The authenticated identity a session proves. For this storefront every
/// authenticated user is an admin; there is no finer-grained role model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
}

impl Principal {
    pub fn new<S: Into<String>>(email: S) -> Self {
        Self { email: email.into() }
    }
}
