//! Delivery completion and the metrics derived from it.

use chrono::{DateTime, Utc};

use super::Dispatcher;
use crate::metrics::{self, DeliveryRecord};
use crate::{Batch, Clock, CourierId, DispatchError, DispatchStore, OrderId, Packer};

impl<S, P, C> Dispatcher<S, P, C>
where
    S: DispatchStore,
    P: Packer,
    C: Clock,
{
    /// Record that the courier delivered an order.
    ///
    /// The delivery time is measured from the latest other completion in the
    /// same batch, or from the batch's creation for its first completion.
    /// Completing an already delivered order returns its identifier and
    /// changes nothing.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers,
    /// [`DispatchError::AssignmentNotFound`] when no batch of the courier
    /// holds the order, [`DispatchError::InvalidTime`] when `complete_time`
    /// precedes the measurement start, or a repository failure.
    pub fn complete(
        &self,
        courier_id: CourierId,
        order_id: OrderId,
        complete_time: DateTime<Utc>,
    ) -> Result<OrderId, DispatchError> {
        // Reconciliation holds the courier's lock while it releases orders.
        let _courier_guard = self.courier_locks.lock(&courier_id);
        self.require_courier(courier_id)?;
        let not_found = || DispatchError::AssignmentNotFound {
            courier_id,
            order_id,
        };
        let located = self
            .batch_holding(courier_id, order_id)?
            .ok_or_else(not_found)?;

        let _guard = self.completion_locks.lock(&(located.id, order_id));
        // The batch may have been reconciled while waiting for the lock.
        let batch = self
            .batch_holding(courier_id, order_id)?
            .filter(|current| current.id == located.id)
            .ok_or_else(not_found)?;
        let member = batch.order(order_id).ok_or_else(not_found)?;
        if member.is_complete() {
            log::debug!("order {order_id} was already completed");
            return Ok(order_id);
        }

        let marker = batch.completion_marker(order_id);
        let invalid = || DispatchError::InvalidTime {
            order_id,
            complete_time,
            marker,
        };
        if complete_time < marker {
            return Err(invalid());
        }
        let delivery_time = u64::try_from(complete_time.signed_duration_since(marker).num_seconds())
            .map_err(|_| invalid())?;
        self.store
            .record_completion(batch.id, order_id, complete_time, delivery_time)?;
        log::info!(
            "courier {courier_id} delivered order {order_id} in {delivery_time}s (batch {})",
            batch.id
        );
        Ok(order_id)
    }

    /// Rate the courier from every order they have delivered.
    ///
    /// Returns `None` when the courier has never completed an order.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers, or a
    /// repository failure.
    pub fn rating(&self, courier_id: CourierId) -> Result<Option<f64>, DispatchError> {
        self.require_courier(courier_id)?;
        let batches = self.store.batches(courier_id)?;
        let mut history = Vec::new();
        for member in batches.iter().flat_map(|batch| batch.orders.iter()) {
            let (Some(_), Some(delivery_time)) = (member.complete_time, member.delivery_time)
            else {
                continue;
            };
            let order = self.require_order(member.order_id)?;
            history.push(DeliveryRecord {
                region: order.region,
                delivery_time,
            });
        }
        Ok(metrics::rating(history))
    }

    /// Total reward of the courier's batches with at least one delivery.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers, or a
    /// repository failure.
    pub fn earnings(&self, courier_id: CourierId) -> Result<u64, DispatchError> {
        self.require_courier(courier_id)?;
        let batches = self.store.batches(courier_id)?;
        Ok(metrics::earnings(&batches))
    }

    fn batch_holding(
        &self,
        courier_id: CourierId,
        order_id: OrderId,
    ) -> Result<Option<Batch>, DispatchError> {
        Ok(self
            .store
            .batches(courier_id)?
            .into_iter()
            .find(|batch| batch.order(order_id).is_some()))
    }
}
