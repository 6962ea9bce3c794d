// File: ./src/client/mod.rs
pub mod gateway;
pub mod lookup;

pub use gateway::{MemoryGateway, PersistenceGateway, RestGateway};
pub use lookup::{GenerativeLookupClient, LookupResponse, StatusLookup};
