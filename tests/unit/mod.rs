//! Unit tests exercising library pieces against the mocks

pub mod escrow_tests;
