pub mod actor;
pub mod connection;
pub mod lobby;
pub mod registry;
