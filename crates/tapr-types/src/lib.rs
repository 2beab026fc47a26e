//! Foundation types for tapr.
//!
//! Every other tapr crate depends on `tapr-types`.
//!
//! # Key Types
//!
//! - [`Tx`]: random transaction identifier binding a push prepare to its
//!   body stream and log stream
//! - [`PathName`]: validated, store-relative destination name

pub mod error;
pub mod path;
pub mod tx;

pub use error::TypeError;
pub use path::PathName;
pub use tx::{Tx, TX_LEN};
