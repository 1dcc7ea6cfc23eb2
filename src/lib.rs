pub mod config;
pub mod http_client;
pub mod identity;
pub mod news;
pub mod router;
pub mod session;
pub mod sports_api;
pub mod state;
pub mod store;
pub mod worker;
