pub mod ast;
pub mod parser;
pub mod eval;
pub mod nodes;
pub mod expression_parser;
pub mod transformers;
pub mod sorting;
pub mod includes;
pub mod query;
pub mod command;
pub mod dialect;
pub mod compiler;
pub mod generator;
pub mod cache;
