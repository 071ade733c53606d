//! Credential newtypes and the client's current-credential cell.

pub mod credential;
pub mod token;

pub use credential::*;
pub use token::*;
