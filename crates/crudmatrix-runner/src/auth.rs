//! Bearer token authentication for the in-process views

use std::collections::HashMap;

use crate::http::Request;

/// What a token may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// Missing, malformed or unknown credentials
    Unauthenticated,
    /// Read-only credentials on a mutating method
    Forbidden,
}

impl Denied {
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
        }
    }

    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Authentication credentials were not provided or are invalid.",
            Self::Forbidden => "You do not have permission to perform this action.",
        }
    }
}

/// Static token table read from the `authorization: Bearer <token>` header.
#[derive(Debug, Clone, Default)]
pub struct TokenAuth {
    tokens: HashMap<String, Access>,
}

impl TokenAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, access: Access) -> Self {
        self.tokens.insert(token.into(), access);
        self
    }

    /// # Errors
    ///
    /// Returns the refusal reason when the request may not proceed.
    pub fn authorize(&self, request: &Request) -> Result<Access, Denied> {
        let token = request
            .header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(Denied::Unauthenticated)?;
        let access = *self.tokens.get(token).ok_or(Denied::Unauthenticated)?;
        if access == Access::ReadOnly && request.method.is_mutating() {
            return Err(Denied::Forbidden);
        }
        Ok(access)
    }
}
