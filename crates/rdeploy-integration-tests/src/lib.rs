//! Test harness for end-to-end rdeploy delivery tests

pub mod receiver;
