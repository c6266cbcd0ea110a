//! Backend authentication
//!
//! Credential bundle parsing and the per-turn bearer-token minting flow.

mod credentials;
mod minter;

pub use credentials::Credential;
pub use minter::{
    AccessToken, JwtBearerMinter, MockTokenMinter, TokenMinter, TOKEN_ENDPOINT,
};
