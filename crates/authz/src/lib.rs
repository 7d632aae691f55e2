//! Bearer token verification and role-based rights.
//!
//! A caller presents an HS256 access token whose `role` claim names a role
//! from configuration; the role expands to a set of rights, and routes
//! declare the rights they need as a [`Requirement`].

use std::collections::{HashMap, HashSet};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("expected an access token, got {0:?}")]
    WrongTokenType(TokenType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenType {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Access-token claims valid for `ttl` from now.
    pub fn access(sub: impl Into<String>, role: impl Into<String>, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            sub: sub.into(),
            role: role.into(),
            token_type: TokenType::Access,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        }
    }
}

/// What a route demands of the caller's rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    AllOf(&'static [&'static str]),
    AnyOf(&'static [&'static str]),
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: String,
    pub rights: HashSet<String>,
}

impl Principal {
    pub fn has(&self, right: &str) -> bool {
        self.rights.contains(right)
    }

    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        match requirement {
            Requirement::AllOf(rights) => rights.iter().all(|right| self.has(right)),
            Requirement::AnyOf(rights) => rights.iter().any(|right| self.has(right)),
        }
    }
}

/// Token verifier plus the role table.
pub struct Authz {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    roles: HashMap<String, HashSet<String>>,
}

impl Authz {
    pub fn new(secret: &str, roles: &HashMap<String, Vec<String>>) -> Self {
        let roles = roles
            .iter()
            .map(|(role, rights)| (role.clone(), rights.iter().cloned().collect()))
            .collect();

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            roles,
        }
    }

    /// Rights granted to `role`; unknown roles get none.
    pub fn rights_of(&self, role: &str) -> HashSet<String> {
        self.roles.get(role).cloned().unwrap_or_default()
    }

    /// Verify an access token and resolve the caller's rights.
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthzError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.token_type != TokenType::Access {
            return Err(AuthzError::WrongTokenType(claims.token_type));
        }

        let rights = self.rights_of(&claims.role);
        if rights.is_empty() {
            tracing::debug!(target: "bookshelf-authz", role = %claims.role, "role grants no rights");
        }

        Ok(Principal {
            subject: claims.sub,
            role: claims.role,
            rights,
        })
    }

    /// Sign `claims` with the configured secret.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthzError> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANAGE_BOOKS: &str = "manageBooks";
    const GET_USERS: &str = "getUsers";

    fn authz() -> Authz {
        let roles = HashMap::from([
            ("user".to_string(), vec![]),
            (
                "admin".to_string(),
                vec![GET_USERS.to_string(), MANAGE_BOOKS.to_string()],
            ),
            ("librarian".to_string(), vec![MANAGE_BOOKS.to_string()]),
        ]);
        Authz::new("test-secret", &roles)
    }

    #[test]
    fn access_token_resolves_role_rights() {
        let authz = authz();
        let token = authz
            .sign(&Claims::access("u-1", "admin", Duration::hours(1)))
            .unwrap();

        let principal = authz.authenticate(&token).unwrap();
        assert_eq!(principal.subject, "u-1");
        assert!(principal.has(MANAGE_BOOKS));
        assert!(principal.has(GET_USERS));
    }

    #[test]
    fn expired_token_is_rejected() {
        let authz = authz();
        let mut claims = Claims::access("u-1", "admin", Duration::hours(1));
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = authz.sign(&claims).unwrap();

        assert!(matches!(
            authz.authenticate(&token),
            Err(AuthzError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = Authz::new("other-secret", &HashMap::new());
        let token = other
            .sign(&Claims::access("u-1", "admin", Duration::hours(1)))
            .unwrap();

        assert!(authz().authenticate(&token).is_err());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let authz = authz();
        let mut claims = Claims::access("u-1", "admin", Duration::hours(1));
        claims.token_type = TokenType::Refresh;
        let token = authz.sign(&claims).unwrap();

        assert!(matches!(
            authz.authenticate(&token),
            Err(AuthzError::WrongTokenType(TokenType::Refresh))
        ));
    }

    #[test]
    fn unknown_role_has_no_rights() {
        let authz = authz();
        let token = authz
            .sign(&Claims::access("u-1", "ghost", Duration::hours(1)))
            .unwrap();

        let principal = authz.authenticate(&token).unwrap();
        assert!(principal.rights.is_empty());
    }

    #[test]
    fn requirement_matching() {
        let authz = authz();
        let librarian = Principal {
            subject: "u-2".into(),
            role: "librarian".into(),
            rights: authz.rights_of("librarian"),
        };
        let user = Principal {
            subject: "u-3".into(),
            role: "user".into(),
            rights: authz.rights_of("user"),
        };

        let read = Requirement::AnyOf(&[GET_USERS, MANAGE_BOOKS]);
        let both = Requirement::AllOf(&[GET_USERS, MANAGE_BOOKS]);

        assert!(librarian.satisfies(&read));
        assert!(!librarian.satisfies(&both));
        assert!(!user.satisfies(&read));
    }
}
