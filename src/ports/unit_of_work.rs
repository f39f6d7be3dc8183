//! Transaction boundary port.
//!
//! A [`UnitOfWork`] opens a [`TransactionScope`]; the scope hands out the
//! repositories bound to its transaction and is consumed by `commit` or
//! `rollback`. Dropping a scope without committing rolls it back.
//!
//! ```ignore
//! let renewed = in_transaction(uow.as_ref(), move |repos| {
//!     Box::pin(async move {
//!         repos.orders().set_status(id, OrderStatus::Paid).await?;
//!         repos.pay_history().insert(id, now).await?;
//!         Ok::<_, OrderError>(())
//!     })
//! })
//! .await?;
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{OrderItemRepository, OrderRepository, PayHistoryRepository, Tlv2Repository};
use crate::domain::foundation::DomainError;

/// Repositories sharing one transaction.
pub trait RepositorySet: Send {
    fn orders(&mut self) -> &mut dyn OrderRepository;
    fn items(&mut self) -> &mut dyn OrderItemRepository;
    fn pay_history(&mut self) -> &mut dyn PayHistoryRepository;
    fn tlv2(&mut self) -> &mut dyn Tlv2Repository;
}

/// An open transaction.
#[async_trait]
pub trait TransactionScope: Send {
    fn repositories(&mut self) -> &mut dyn RepositorySet;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DomainError>;
}

/// Runs `work` in a new transaction; commits on `Ok`, rolls back on `Err`.
pub async fn in_transaction<T, E, F>(uow: &dyn UnitOfWork, work: F) -> Result<T, E>
where
    T: Send,
    E: From<DomainError> + Send,
    F: for<'t> FnOnce(&'t mut dyn RepositorySet) -> BoxFuture<'t, Result<T, E>> + Send,
{
    let mut scope = uow.begin().await?;

    let outcome = work(scope.repositories()).await;

    match outcome {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
