pub mod assistant;
pub mod identity;
pub mod posts;
pub mod uploads;
