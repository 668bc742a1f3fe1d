//! Request building and checking.
//!
//! # Responsibility
//! - Describe queries as engine-independent data.
//! - Bind the expected result type to a request and check it before use.
//!
//! # Invariants
//! - Fetch paths only ever execute `RequestKind::Fetch` requests.

pub mod builder;
pub mod checker;
pub mod predicate;
pub mod request;
pub mod result;
