pub mod client;
#[cfg(feature = "memory")]
pub mod memory;
mod record;
pub mod store;

pub use client::DbClient;
pub use store::{DbError, Result, Store};
