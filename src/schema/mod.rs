pub mod schema;
pub mod field;
pub mod naming;
