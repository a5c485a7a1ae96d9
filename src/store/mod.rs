//! Credential storage: the user record model and the store seam.

mod credential;
mod record;

pub use credential::{CredentialStore, JsonFileStore, MemoryCredentialStore, RecordMutation};
pub use record::{DeliveryMethod, IssuedCode, UserRecord};
