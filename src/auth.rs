//! Identity-domain types, from app credentials to the installation tokens they unlock.

pub mod assertion;
pub mod credential;
pub mod id;
pub mod token;

pub use assertion::*;
pub use credential::*;
pub use id::*;
pub use token::{record::*, secret::*};
