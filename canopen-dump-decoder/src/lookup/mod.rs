//! Lookup tables used while rendering
//!
//! Pure functions and tables that turn numeric protocol values into text:
//! SDO abort codes, emergency error codes, and the object dictionary type
//! hints that decide between string and hex rendering.

pub mod abort;
pub mod dictionary;
pub mod emcy;

// Re-export key types for convenience
pub use abort::sdo_abort_to_string;
pub use dictionary::{DataType, TypeDictionary};
pub use emcy::error_code_to_string;
