//! Tradepoint Infrastructure - Adapters
//!
//! Concrete implementations of the ports defined in the application layer:
//! the reqwest transport and the origin storage shared between tabs.

pub mod adapters;
pub mod serialization;
pub mod storage;

pub use adapters::ReqwestTransport;
pub use serialization::{SerializationError, from_json_bytes, to_json_stable};
pub use storage::{OriginStorage, TabStorage};
