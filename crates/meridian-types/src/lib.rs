pub mod api;
pub mod channel;
pub mod connection;
pub mod events;
pub mod models;
