//! Credential collaborators for the Roster account service.
//!
//! The request handlers never touch cryptography or mail transport
//! directly. They hold trait objects for four capabilities:
//!
//! | Capability | Trait | Provided implementation |
//! |---|---|---|
//! | bearer-token verification | [`TokenVerifier`] | [`JwtTokens`] (HS256) |
//! | password hashing | [`CredentialHasher`] | [`Argon2Hasher`] |
//! | verification codes | [`CodeGenerator`] | [`RandomCodeGenerator`] |
//! | verification mail | [`VerificationMailer`] | [`HttpMailer`], [`DisabledMailer`] |
//!
//! Tests substitute their own implementations for any of them.

mod code;
mod mail;
mod password;
mod token;

pub use code::{CodeError, CodeGenerator, RandomCodeGenerator};
pub use mail::{DisabledMailer, HttpMailer, MailError, VerificationMailer};
pub use password::{Argon2Hasher, CredentialHasher, HashError};
pub use token::{bearer_token, AuthError, Claims, JwtTokens, TokenVerifier};
