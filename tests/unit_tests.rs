//! Unit-level tests for public components, compiled as one test binary.

mod unit;
