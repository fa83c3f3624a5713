//! Request authentication
//!
//! A [`Gatekeeper`] checks inbound request headers and reports an outcome
//! carrying [`AttemptInfo`] either way. Gatekeepers compose with
//! [`AnyOf`]. An [`AuthProvider`] is the outbound counterpart, producing
//! the headers a peer's gatekeeper will accept.
//!
//! Provided gatekeepers:
//! - [`AllowAll`] / [`DenyAll`]
//! - [`AnyOf`], first success wins
//! - [`CredentialFile`], HTTP Basic against an htpasswd file
//! - [`HashedSecretHeader`], `X-Authorization: OrcOuterAuth <token>` with
//!   tokens from [`HashedSecretScheme`]

pub mod audit;
mod basic;
mod credential_file;
pub mod hashed_secret;
mod outer;
mod secrets;
mod types;

pub use basic::{AllowAll, AnyOf, DenyAll, ALLOW_ALL_ID, ANY_OF_ID, DENY_ALL_ID};
pub use credential_file::{
    htpasswd_gatekeeper, CredentialBackend, CredentialFile, CredentialFileError, HtpasswdFile,
};
pub use hashed_secret::{HashedSecretScheme, TokenError};
pub use outer::{
    Clock, HashedSecretHeader, HashedSecretProvider, OuterAuth, MAX_ATTEMPTS, OUTER_AUTH_HEADER,
    OUTER_AUTH_SCHEME,
};
pub use secrets::{load_secrets, SecretLoadError, SharedSecret};
pub use types::{
    AttemptInfo, AuthError, AuthProvider, AuthResult, AuthSuccess, Gatekeeper, RequestContext,
};
