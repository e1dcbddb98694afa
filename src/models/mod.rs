pub mod directory;
pub mod server;
