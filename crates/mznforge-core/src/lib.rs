//! mznforge Core - MiniZinc values and the dzn data codec
//!
//! This crate provides the data layer shared by the rest of mznforge:
//! - [`Value`] and [`Array`] for structured MiniZinc data
//! - [`Assignment`] for identifier-to-value bindings
//! - The [`dzn`] codec converting assignments to and from dzn text
//!
//! # Example
//!
//! ```
//! use mznforge_core::{decode, encode, Assignment, Value};
//!
//! let mut data = Assignment::new();
//! data.insert("n".to_string(), Value::Int(5));
//! data.insert("profit".to_string(), Value::from(vec![10i64, 3, 9, 4, 8]));
//!
//! let text = encode(&data).unwrap();
//! assert_eq!(text, "n = 5;\nprofit = [10, 3, 9, 4, 8];\n");
//! assert_eq!(decode(&text).unwrap(), data);
//! ```

pub mod dzn;
pub mod error;
pub mod value;

pub use dzn::{decode, decode_value, encode, encode_value, Decoder, Encoder};
pub use error::MalformedDataError;
pub use value::{Array, Assignment, IndexSet, Value, ValueKind};
