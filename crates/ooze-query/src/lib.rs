//! Ooze: a query engine over hardware-verification artifacts.
//!
//! Netlists, waveform dumps and text logs are parsed by independent
//! [`DataSource`]s and unified behind one typed object model:
//!
//! - [`QueryObject`]: typed record with an identity key and named fields
//! - [`QueryCollection`]: ordered result set with `select`, `filter` (`where`),
//!   `project`, `map`, `join` and the windowed `seq` sequence engine
//! - [`Ooze`]: the facade routing `select(Type...)` to attached sources and
//!   binding keyed objects to typed records
//!
//! Everything is in memory, single-threaded and eager: sources finish parsing
//! before they are attached and never change afterwards.

mod bind;
pub mod collection;
pub mod config;
pub mod error;
pub mod object;
pub mod predicate;
pub mod registry;
mod seq;
pub mod transaction;

pub use collection::{Element, QueryCollection, CHAIN};
pub use config::OozeConfig;
pub use error::{OozeError, Result};
pub use object::{QueryObject, QueryObjectBuilder, TypeTag, Value, OBJECT};
pub use predicate::{
    inside, like, resolve_source, source, source_of, Connectivity, FieldMatch, Fields, Inside,
    Like, Predicate, SourceOf, DEFAULT_SEPARATOR,
};
pub use registry::{DataSource, Ooze, TypeRegistry, Wiring};
pub use transaction::{Transaction, TransactionIds, TRANSACTION};
