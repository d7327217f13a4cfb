//! End-to-end tests of the scan pipeline against loopback services.

pub mod support;

mod pipeline;
