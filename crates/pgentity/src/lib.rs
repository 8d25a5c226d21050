//! # pgentity
//!
//! Entity persistence for PostgreSQL: save, load, list and remove schemaless
//! entities described by declarative query objects.
//!
//! ## Features
//!
//! - **Query objects**: filters, `and$`/`or$` groups, comparison operators,
//!   sort, paging and projection, from JSON or a typed builder
//! - **Parameterized SQL**: every value is bound; identifiers are quoted
//! - **Column mapping**: identity or camelCase fields over snake_case columns
//! - **Schemaless entities**: structured fields stored as JSON with type hints
//! - **Transaction-friendly**: pass a transaction anywhere a `GenericClient` is expected
//!
//! ## Store
//!
//! ```ignore
//! use pgentity::{Entity, EntityName, Query, Store, StoreConfig};
//! use serde_json::json;
//!
//! let store = Store::connect(StoreConfig::new("postgres://localhost/shop"))?;
//! let fruit = EntityName::new("fruit");
//!
//! store.save(Entity::from_json(fruit.clone(), json!({"name": "pear", "price": 200})), &Query::new()).await?;
//!
//! let cheap = store
//!     .list(&fruit, &Query::from_json(&json!({"price": {"lt$": 250}, "sort$": {"price": -1}}))?)
//!     .await?;
//! ```
//!
//! ## Builders
//!
//! Statement builders are pure and can be used without a store:
//!
//! ```ignore
//! use pgentity::{BuildContext, Query, builder};
//!
//! let stmt = builder::select(&BuildContext::default(), "fruit", &Query::new().gte("price", 200))?;
//! assert_eq!(stmt.text, r#"SELECT * FROM "fruit" WHERE "price" >= $1"#);
//! ```

pub mod builder;
pub mod client;
pub mod codec;
pub mod compile;
pub mod config;
pub mod entity;
pub mod error;
pub mod ident;
pub mod naming;
pub mod query;
pub mod reconnect;
pub mod transaction;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;
#[cfg(feature = "pool")]
pub mod store;

pub use builder::{Statement, StatementKind};
pub use client::GenericClient;
pub use codec::{Codec, DEFAULT_TYPE_HINT_COLUMN};
pub use compile::{BuildContext, DEFAULT_LIST_LIMIT, Fragment, compile_where};
pub use config::StoreConfig;
pub use entity::{Entity, EntityName};
pub use error::{StoreError, StoreResult};
pub use ident::{Dialect, PlaceholderStyle, escape_literal};
pub use naming::{ColumnMapper, ColumnNaming, IdentityMapper, SnakeCaseMapper};
pub use query::{BoolOp, Clause, Comparison, Filter, NativeQuery, Pattern, Query, SortOrder};
pub use reconnect::Backoff;
pub use value::{Fields, Value};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_from, create_pool_with_config};
#[cfg(feature = "pool")]
pub use store::Store;

// Re-export tokio_postgres for convenience
pub use tokio_postgres;

#[doc(hidden)]
pub use tracing as __tracing;
