//! # cr-directory
//!
//! Authenticates CodeReview users against an external directory (Active
//! Directory over LDAP) and keeps local accounts in step with it.
//!
//! - [`DirectoryClient`] is the seam: [`LdapDirectory`] talks to a real
//!   server, [`InMemoryDirectory`] stands in for one in tests and development.
//! - [`DirectoryBridge`] maps directory entries onto local users through
//!   `cr-db`, bounding every directory round trip with a timeout and never
//!   holding a database transaction while waiting on the network.

mod bridge;
mod client;
pub mod entry;
mod error;
mod fake;
mod ldap;

pub use bridge::DirectoryBridge;
pub use client::{DirectoryClient, DirectorySnapshot};
pub use entry::DirectoryEntry;
pub use error::{DirectoryError, LOGIN_UNAVAILABLE_MESSAGE};
pub use fake::{FakeUser, InMemoryDirectory};
pub use ldap::LdapDirectory;
