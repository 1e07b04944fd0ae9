#![deny(missing_docs)]
#![deny(warnings)]

//! # DynamoDB Fluent
//!
//! An expressive DynamoDB client: typed record marshaling and fluent,
//! placeholder-safe expressions on top of `aws-sdk-dynamodb`.
//!
//! ## Overview
//!
//! - Records describe their fields once with [`record!`]; the plan built from
//!   that description is cached per type and drives encoding, decoding and
//!   table creation.
//! - Expressions are written in the service's own language with `$` for
//!   attribute names, `?` for values and `'Quoted'` for literal names. The
//!   [`expr::Subber`] turns them into aliased expressions, escaping reserved
//!   words.
//! - Every request goes through a retry loop driven by the
//!   [`retry::RetryPolicy`] of the [`config::Config`].
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use dynamodb_fluent::db::Db;
//!
//! #[derive(Debug, Default)]
//! struct Message {
//!     user_id: i64,
//!     date: String,
//!     msg: String,
//!     count: i32,
//! }
//!
//! dynamodb_fluent::record! {
//!     Message {
//!         user_id: "UserID,hash",
//!         date: "Date,range",
//!         msg: "Msg",
//!         count: "Count,omitempty",
//!     }
//! }
//!
//! # async fn example(client: Client) -> dynamodb_fluent::Result<()> {
//! let db = Db::new(client);
//! let table = db.table("Messages");
//!
//! table
//!     .update_item("UserID", 613)
//!     .range("Date", "2019-01-01")
//!     .set("Msg", "hello")
//!     .add("Count", 1)
//!     .run()
//!     .await?;
//!
//! let recent: Vec<Message> = table
//!     .query("UserID", 613)
//!     .filter("'Count' > ?", &[&0])
//!     .all()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@codec`] and [`mod@plan`] - attribute value encoding
//! - [`mod@expr`] - expression compilation
//! - [`mod@read`], [`mod@write`] and [`mod@table`] - requests

pub mod attribute;
pub mod codec;
pub mod common;

/// Settings applied to every request of a [`db::Db`].
pub mod config;

/// Database and table handles.
pub mod db;

pub mod error;
pub mod expr;
mod macros;
pub mod plan;
pub mod read;
pub mod retry;
pub mod table;
pub mod write;

pub use error::{Error, Result};
