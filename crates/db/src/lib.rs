pub mod connection;
pub mod restaurants;

pub use connection::{connect, connect_with_settings, DbPool};
pub use restaurants::{
    LookupCandidate, LookupError, RestaurantRecord, RestaurantRepository, SchemaMismatch,
};
