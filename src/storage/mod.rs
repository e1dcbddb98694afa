pub mod memory;
pub mod snapshot;
