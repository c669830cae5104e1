pub mod connectivity;
pub mod database;
pub mod notifications;
pub mod offline;
pub mod transport;
