#![deny(missing_docs)]
//! Shared vocabulary for the repsync coordination core.
//!
//! Everything here is plain data: typed entity keys, the boxed write-factory
//! shape, the settlement enums the scheduler and coordinator speak, and the
//! small live-session domain types the workout app feeds through them. No
//! I/O, no runtime dependency.

pub mod error;
pub mod key;
pub mod outcome;
pub mod session;

pub use error::*;
pub use key::*;
pub use outcome::*;
pub use session::*;
