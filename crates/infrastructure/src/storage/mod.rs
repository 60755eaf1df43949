//! Storage adapters.

mod origin;

pub use origin::{OriginStorage, TabStorage};
