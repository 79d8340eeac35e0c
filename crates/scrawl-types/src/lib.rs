pub mod claims;
pub mod events;
pub mod store;
