//! Shared test fixtures for mznforge crates.
//!
//! - [`fake`] - shell scripts standing in for the `minizinc` executable
//! - [`knapsack`] - the 0/1 knapsack model, its data and expected output
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! mznforge-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use mznforge_test::fake::FakeSolver;
//! use mznforge_test::knapsack;
//! ```

pub mod fake;
pub mod knapsack;

pub use fake::FakeSolver;
