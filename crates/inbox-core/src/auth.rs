use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AuthError;

/// Who the identity provider says is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { email: String },
}

impl Identity {
    pub fn from_email(email: Option<&str>) -> Self {
        match email.map(str::trim) {
            Some(email) if !email.is_empty() => Identity::Authenticated {
                email: email.to_string(),
            },
            _ => Identity::Anonymous,
        }
    }
}

/// Proof that the allow-list gate passed. Only `AllowList::authorize` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    email: String,
}

impl Authorized {
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    emails: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let list = Self::new(cfg.allow());
        if list.is_empty() {
            warn!("auth.allow is empty; every identity will be refused");
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    #[tracing::instrument(skip(self))]
    pub fn authorize(&self, identity: &Identity) -> Result<Authorized, AuthError> {
        let Identity::Authenticated { email } = identity else {
            return Err(AuthError::Unauthenticated);
        };

        if !self.emails.contains(&normalize_email(email)) {
            return Err(AuthError::NotAllowed {
                email: email.clone(),
            });
        }

        debug!(email = %email, "identity allowed");
        Ok(Authorized {
            email: email.clone(),
        })
    }
}

/// Resolves the signed-in principal: explicit flag, then `INBOX_USER`, then `user.email`.
pub fn resolve_identity(flag: Option<&str>, cfg: &Config) -> Identity {
    if let Some(email) = flag {
        return Identity::from_email(Some(email));
    }
    if let Ok(email) = std::env::var("INBOX_USER") {
        return Identity::from_email(Some(&email));
    }
    Identity::from_email(cfg.user_email())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
