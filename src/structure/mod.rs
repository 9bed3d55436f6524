pub mod id;
pub mod index;
pub mod structure;
pub mod builder;
