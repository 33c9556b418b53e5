pub mod atomic;
pub mod auth;
pub mod config_io;
pub mod generator;
pub mod http;
pub mod memory_store;
pub mod rest_store;
pub mod session_io;
pub mod store;
