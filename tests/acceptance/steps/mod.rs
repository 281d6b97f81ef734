//! Cucumber step definitions for acceptance tests.

pub mod deployment;
