pub mod client;
pub mod memory;
