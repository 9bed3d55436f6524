pub mod ddl;
pub mod synchronizer;
pub mod upserter;
