//! Shared request plumbing.
//!
//! This module provides the pieces used by both read and write requests:
//! primary keys, key conditions, consumed capacity tracking and projections.

/// Consumed capacity accounting.
pub mod capacity;

/// Key conditions for queries.
pub mod condition;

pub(crate) mod key;

use crate::{Result, expr::Subber};

/// Projection expression selecting `paths`, each escaped as a path.
pub(crate) fn projection(sub: &mut Subber, paths: &[&str]) -> Result<String> {
    let mut escaped = Vec::with_capacity(paths.len());
    for path in paths {
        escaped.push(sub.escape_path(path)?);
    }
    Ok(escaped.join(", "))
}

/// Sends a cloned fluent builder through the retry loop of `db`.
macro_rules! send_with_retry {
    ($db:expr, $builder:expr) => {{
        let builder = &$builder;
        $crate::retry::run($db.config().retry_policy(), move || async move {
            builder.clone().send().await.map_err($crate::Error::from)
        })
        .await
    }};
}

pub(crate) use send_with_retry;
