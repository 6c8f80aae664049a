pub mod auth;
pub mod bridge;
pub mod connection;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod store;
pub mod typing;
