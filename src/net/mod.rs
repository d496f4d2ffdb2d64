pub mod connection;
pub mod tcp;
