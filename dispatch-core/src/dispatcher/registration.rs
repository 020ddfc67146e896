//! Intake and maintenance of couriers and orders.

use std::collections::BTreeSet;

use super::{Dispatcher, ReconcileOutcome};
use crate::intake::check_registered;
use crate::{
    Clock, Courier, CourierDraft, CourierId, CourierUpdate, DispatchError, DispatchStore,
    EntityKind, FieldError, Order, OrderDraft, OrderId, Packer, Region, StoreError, TimeWindow,
};

/// A courier together with their current figures.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CourierReport {
    /// The courier's attributes.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub courier: Courier,
    /// Present once the courier has delivered at least one order.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub rating: Option<f64>,
    /// Rewards of batches with at least one delivery.
    pub earnings: u64,
}

/// Result of [`Dispatcher::update_courier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierUpdateOutcome {
    /// The courier as stored after the update.
    pub courier: Courier,
    /// What happened to the courier's open batch.
    pub reconciliation: ReconcileOutcome,
}

/// Regions and windows an entity refers to.
struct References<'a> {
    regions: Vec<&'a Region>,
    windows: Vec<&'a TimeWindow>,
}

impl<'a> References<'a> {
    fn of_courier(courier: &'a Courier) -> Self {
        Self {
            regions: courier.regions.iter().collect(),
            windows: courier.working_hours.iter().collect(),
        }
    }

    fn of_order(order: &'a Order) -> Self {
        Self {
            regions: vec![&order.region],
            windows: order.delivery_hours.iter().collect(),
        }
    }
}

/// Regions and windows already stored, consulted when auto-creation is off.
struct Registered {
    regions: BTreeSet<Region>,
    windows: BTreeSet<TimeWindow>,
}

impl Registered {
    fn check(&self, references: &References<'_>) -> Result<(), FieldError> {
        check_registered(
            references.regions.iter().copied(),
            references.windows.iter().copied(),
            &self.regions,
            &self.windows,
        )
    }
}

/// An insert that lost a race with another registration rejects the ids it
/// collided on.
fn rejected_when_stored(entity: EntityKind) -> impl FnOnce(StoreError) -> DispatchError {
    move |err| match err {
        StoreError::AlreadyStored { ids, .. } => {
            log::warn!("{entity} identifiers {ids:?} were stored concurrently");
            DispatchError::Rejected { entity, ids }
        }
        other => DispatchError::Store(other),
    }
}

impl<S, P, C> Dispatcher<S, P, C>
where
    S: DispatchStore,
    P: Packer,
    C: Clock,
{
    /// Validate and store new couriers, all or nothing.
    ///
    /// # Errors
    /// Returns [`DispatchError::Rejected`] listing every courier whose fields
    /// are invalid, whose identifier repeats or already exists, or which
    /// names an unregistered region or window while auto-creation is off.
    /// Nothing is stored in that case.
    pub fn register_couriers(
        &self,
        drafts: &[CourierDraft],
    ) -> Result<Vec<CourierId>, DispatchError> {
        let couriers = self.admit(
            EntityKind::Courier,
            drafts,
            |draft| draft.courier_id,
            |id| Ok(self.store.courier(id)?.is_some()),
            CourierDraft::validate,
            |courier| References::of_courier(courier),
        )?;
        self.register_references(couriers.iter().map(References::of_courier))?;
        self.store
            .save_couriers(&couriers)
            .map_err(rejected_when_stored(EntityKind::Courier))?;
        log::info!("registered {} couriers", couriers.len());
        Ok(couriers.iter().map(|courier| courier.id).collect())
    }

    /// Validate and store new orders, all or nothing.
    ///
    /// # Errors
    /// Returns [`DispatchError::Rejected`] under the same rules as
    /// [`Self::register_couriers`].
    pub fn register_orders(&self, drafts: &[OrderDraft]) -> Result<Vec<OrderId>, DispatchError> {
        let orders = self.admit(
            EntityKind::Order,
            drafts,
            |draft| draft.order_id,
            |id| Ok(self.store.order(id)?.is_some()),
            OrderDraft::validate,
            |order| References::of_order(order),
        )?;
        self.register_references(orders.iter().map(References::of_order))?;
        self.store
            .save_orders(&orders)
            .map_err(rejected_when_stored(EntityKind::Order))?;
        log::info!("registered {} orders", orders.len());
        Ok(orders.iter().map(|order| order.id).collect())
    }

    /// Change a courier's attributes and reconcile their open batch.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers,
    /// [`DispatchError::InvalidCourierUpdate`] for an invalid update, or a
    /// repository failure. An invalid update stores nothing.
    ///
    /// # Panics
    /// Panics when the packer returns a selection over capacity.
    pub fn update_courier(
        &self,
        courier_id: CourierId,
        update: &CourierUpdate,
    ) -> Result<CourierUpdateOutcome, DispatchError> {
        let _guard = self.courier_locks.lock(&courier_id);
        let current = self.require_courier(courier_id)?;
        let registered = self.registered()?;
        let updated = update
            .apply(&current)
            .and_then(|courier| {
                if let Some(known) = &registered {
                    known.check(&References::of_courier(&courier))?;
                }
                Ok(courier)
            })
            .map_err(|source| DispatchError::InvalidCourierUpdate { courier_id, source })?;

        self.register_references([References::of_courier(&updated)])?;
        self.store.replace_courier(&updated)?;
        log::info!("updated courier {courier_id}");
        let reconciliation = self.reconcile_locked(&updated)?;
        Ok(CourierUpdateOutcome {
            courier: updated,
            reconciliation,
        })
    }

    /// The courier's attributes with their rating and earnings.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers, or a
    /// repository failure.
    pub fn courier_report(&self, courier_id: CourierId) -> Result<CourierReport, DispatchError> {
        let courier = self.require_courier(courier_id)?;
        Ok(CourierReport {
            rating: self.rating(courier_id)?,
            earnings: self.earnings(courier_id)?,
            courier,
        })
    }

    /// Validate every draft, collecting the identifiers of rejected ones.
    fn admit<D, T>(
        &self,
        entity: EntityKind,
        drafts: &[D],
        id_of: impl Fn(&D) -> u64,
        exists: impl Fn(u64) -> Result<bool, StoreError>,
        build: impl Fn(&D) -> Result<T, FieldError>,
        references: impl for<'a> Fn(&'a T) -> References<'a>,
    ) -> Result<Vec<T>, DispatchError> {
        let registered = self.registered()?;
        let mut seen = BTreeSet::new();
        let mut accepted = Vec::with_capacity(drafts.len());
        let mut rejected = Vec::new();
        for draft in drafts {
            let id = id_of(draft);
            let duplicate = !seen.insert(id) || exists(id)?;
            let outcome = build(draft).and_then(|value| {
                if let Some(known) = &registered {
                    known.check(&references(&value))?;
                }
                Ok(value)
            });
            match outcome {
                Ok(_) if duplicate => {
                    log::debug!("{entity} {id} rejected: duplicate identifier");
                    rejected.push(id);
                }
                Ok(value) => accepted.push(value),
                Err(err) => {
                    log::debug!("{entity} {id} rejected: {err}");
                    rejected.push(id);
                }
            }
        }
        if rejected.is_empty() {
            Ok(accepted)
        } else {
            log::warn!("rejected {} of {} {entity} drafts", rejected.len(), drafts.len());
            Err(DispatchError::Rejected {
                entity,
                ids: rejected,
            })
        }
    }

    /// Without auto-creation, every referenced region and window must
    /// already be stored.
    fn registered(&self) -> Result<Option<Registered>, StoreError> {
        if self.config.allow_new_regions_and_windows {
            return Ok(None);
        }
        Ok(Some(Registered {
            regions: self.store.known_regions()?,
            windows: self.store.known_time_windows()?,
        }))
    }

    /// With auto-creation, upsert every referenced region and window.
    fn register_references<'a, I>(&self, references: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = References<'a>>,
    {
        if !self.config.allow_new_regions_and_windows {
            return Ok(());
        }
        let mut regions = BTreeSet::new();
        let mut windows = BTreeSet::new();
        for entry in references {
            regions.extend(entry.regions.into_iter().copied());
            windows.extend(entry.windows.into_iter().cloned());
        }
        self.store.upsert_regions(&regions)?;
        self.store.upsert_time_windows(&windows)
    }
}
