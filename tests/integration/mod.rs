//! Integration tests for querycsv.

pub mod export_test;
pub mod mysql_test;
