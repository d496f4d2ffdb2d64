pub mod common;
pub mod io;
pub mod net;
pub mod proto;
pub mod server;
