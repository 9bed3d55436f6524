pub mod readers;
pub mod bulk;
