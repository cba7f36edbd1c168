//! Fluent query builder and client for Elasticsearch-compatible engines.
//!
//! The crate layers a chainable query DSL over a thin HTTP transport:
//! clause builders accumulate a boolean where tree, terminal methods
//! assemble the request body and dispatch it through an injected
//! [`EngineClient`], and responses come back normalized as
//! [`SearchResult`] records. Index administration, scrolled iteration and
//! bulk writes share the same connection.
//!
//! ```no_run
//! use esquery::{Connection, IndexConfig, SearchConfig, SortOrder, TypeConfig};
//!
//! # async fn run() -> esquery::Result<()> {
//! let config = SearchConfig::new("articles", "post").with_index(
//!     "articles",
//!     IndexConfig::new(vec!["http://localhost:9200".to_string()])
//!         .with_type("post", TypeConfig::new().with_fields(vec!["title".into()])),
//! );
//! let connection = Connection::connect(config)?;
//!
//! let result = connection
//!     .query()
//!     .where_clause("views", ">=", 100)
//!     .where_eq("status", "published")
//!     .order_by("created_at", SortOrder::Desc)
//!     .paginate(0, 20)
//!     .search()
//!     .await?;
//!
//! for record in &result.records {
//!     println!("{record:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod clause;
mod client;
mod config;
mod error;
mod index;
mod merge;
mod query;
mod response;
mod scroll;

pub use bulk::{BulkAction, BulkOperation};
pub use clause::{like_pattern, BoolGroup, BoolSlot, Boolean, Clause, Operator, RangeSpec};
pub use client::{Connection, EngineClient, HttpEngine, SearchOptions};
pub use config::{IndexConfig, SearchConfig, TypeConfig};
pub use error::{EsError, Result};
pub use index::IndexManager;
pub use merge::merge;
pub use query::{MatchMode, MgetItem, Query, SortOrder, WhereTree};
pub use response::SearchResult;
pub use scroll::{ScrollPhase, ScrollState};

/// Common imports for applications using the builder.
pub mod prelude {
    pub use crate::{
        BoolSlot, Boolean, BulkOperation, Connection, EsError, IndexConfig, MatchMode, Query,
        Result, SearchConfig, SearchResult, SortOrder, TypeConfig,
    };
}
