//! Transaction pass-through.
//!
//! Every store operation has an `*_in` variant taking any
//! [`GenericClient`](crate::GenericClient), so a transaction is just another
//! client. The [`transaction!`] macro handles begin/commit/rollback:
//!
//! ```ignore
//! let mut conn = store.pool().get().await?;
//! pgentity::transaction!(conn, tx, {
//!     let order = store.save_in(&tx, order, &Query::new()).await?;
//!     store.save_in(&tx, line.set("order_id", order.id().cloned()), &Query::new()).await?;
//!     Ok(order)
//! })?;
//!
//! // with an explicit isolation level
//! use pgentity::tokio_postgres::IsolationLevel;
//! pgentity::transaction!(conn, tx, isolation = IsolationLevel::Serializable, {
//!     store.remove_in(&tx, &name, &Query::new().all()).await?;
//!     Ok(())
//! })?;
//! ```
//!
//! Constraint violations reported at `COMMIT` (deferred constraints) surface
//! as the same classified errors as statement failures.

/// Runs the given block inside a database transaction.
///
/// The block must evaluate to `pgentity::StoreResult<T>`. It is committed on
/// `Ok(_)` and rolled back on `Err(_)`; a failed rollback is folded into the
/// returned error.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, isolation = $level:expr, $body:block) => {{
        let $tx = ($client)
            .build_transaction()
            .isolation_level($level)
            .start()
            .await
            .map_err(|e| $crate::StoreError::from_db_error("BEGIN", e))?;
        $crate::__finish_transaction!($tx, $body)
    }};
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err(|e| $crate::StoreError::from_db_error("BEGIN", e))?;
        $crate::__finish_transaction!($tx, $body)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __finish_transaction {
    ($tx:ident, $body:block) => {{
        let __pgentity_tx_body_result: $crate::StoreResult<_> = async { $body }.await;
        match __pgentity_tx_body_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err(|e| $crate::StoreError::from_db_error("COMMIT", e))?;
                Ok(value)
            }
            Err(error) => {
                $crate::__tracing::debug!(target: "pgentity.store", error = %error, "rolling back transaction");
                match $tx.rollback().await {
                    Ok(()) => Err(error),
                    Err(rollback_err) => Err($crate::StoreError::Other(format!(
                        "{error} (rollback failed: {rollback_err})"
                    ))),
                }
            }
        }
    }};
}
