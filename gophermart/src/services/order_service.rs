//! Order intake (C4): upload and list, per §4.4 of the design.
use crate::{
    error::ApiError,
    luhn, shard,
    store::{CreateOrderOutcome, NewOrder, Store},
};
use model::OrderView;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new NEW order was inserted.
    Created,
    /// This exact user had already uploaded this number.
    AlreadyMine,
}

pub struct OrderService {
    store: Arc<dyn Store>,
    shard_count: u32,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, shard_count: u32) -> Self {
        Self { store, shard_count }
    }

    pub async fn upload(&self, user: &str, number: &str) -> Result<UploadOutcome, ApiError> {
        if number.is_empty() {
            return Err(ApiError::OrderNumberEmpty);
        }
        if !luhn::is_valid(number) {
            return Err(ApiError::OrderNumberInvalid);
        }

        let new_order = NewOrder {
            number: number.to_string(),
            owner: user.to_string(),
            key_hash: i64::from(shard::key_hash(number)),
            shard: shard::shard(number, self.shard_count) as i32,
        };

        match self.store.create_order(new_order).await? {
            CreateOrderOutcome::Created => Ok(UploadOutcome::Created),
            // Either a genuine conflict, or the benign race where two concurrent uploads of the
            // same new number both observed `order_exists = false`; either way the unique
            // constraint is the source of truth, so re-read and classify by owner.
            CreateOrderOutcome::AlreadyExists => self.classify_existing(user, number).await,
        }
    }

    async fn classify_existing(&self, user: &str, number: &str) -> Result<UploadOutcome, ApiError> {
        let order = self
            .store
            .find_order(number)
            .await?
            .ok_or_else(|| ApiError::Fatal(anyhow::anyhow!("order vanished after insert race")))?;
        if order.owner == user {
            Ok(UploadOutcome::AlreadyMine)
        } else {
            Err(ApiError::OwnedByOther)
        }
    }

    pub async fn list(&self, user: &str) -> Result<Vec<OrderView>, ApiError> {
        let orders = self.store.list_orders(user).await?;
        if orders.is_empty() {
            return Err(ApiError::NoOrders);
        }
        Ok(orders.iter().map(OrderView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;

    fn service() -> OrderService {
        OrderService::new(Arc::new(FakeStore::new()), shard::DEFAULT_SHARD_COUNT)
    }

    #[tokio::test]
    async fn empty_number_is_rejected() {
        let service = service();
        assert!(matches!(
            service.upload("alice", "").await,
            Err(ApiError::OrderNumberEmpty)
        ));
    }

    #[tokio::test]
    async fn luhn_invalid_number_is_rejected() {
        let service = service();
        assert!(matches!(
            service.upload("alice", "12345678902").await,
            Err(ApiError::OrderNumberInvalid)
        ));
    }

    #[tokio::test]
    async fn first_upload_is_created_second_is_already_mine() {
        let service = service();
        assert_eq!(
            service.upload("alice", "12345678903").await.unwrap(),
            UploadOutcome::Created
        );
        assert_eq!(
            service.upload("alice", "12345678903").await.unwrap(),
            UploadOutcome::AlreadyMine
        );
    }

    #[tokio::test]
    async fn upload_by_another_user_is_owned_by_other() {
        let service = service();
        service.upload("alice", "12345678903").await.unwrap();
        assert!(matches!(
            service.upload("bob", "12345678903").await,
            Err(ApiError::OwnedByOther)
        ));
    }

    #[tokio::test]
    async fn listing_with_no_orders_is_no_orders() {
        let service = service();
        assert!(matches!(service.list("alice").await, Err(ApiError::NoOrders)));
    }

    #[tokio::test]
    async fn listing_returns_uploaded_orders() {
        let service = service();
        service.upload("alice", "12345678903").await.unwrap();
        let orders = service.list("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].number, "12345678903");
    }
}
