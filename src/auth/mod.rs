pub mod error;
pub mod registry;
pub mod types;


pub use error::AuthError;
pub use registry::KeyRegistry;
pub use types::{ApiKeyRecord, KeySnapshot, Tier};
