//! Capacity packing seam.
//!
//! A [`Packer`] chooses which candidate orders ride together in one batch.
//! The dispatcher owns the candidates and the capacity; implementations only
//! decide membership.

use std::collections::BTreeSet;

use crate::{Order, OrderId, Weight};

/// A candidate handed to a [`Packer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackItem {
    /// Order the item stands for.
    pub id: OrderId,
    /// Weight of the order.
    pub weight: Weight,
}

impl From<&Order> for PackItem {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            weight: order.weight,
        }
    }
}

/// Select a subset of items whose total weight stays within a capacity.
///
/// Implementations must be deterministic: identical input yields an
/// identical selection. Returned identifiers must be distinct members of
/// `items`. Packers must be `Send + Sync` so one instance can serve
/// concurrent dispatch calls.
///
/// # Examples
/// ```rust
/// use dispatch_core::{OrderId, PackItem, Packer, Weight};
///
/// struct FirstFit;
///
/// impl Packer for FirstFit {
///     fn pack(&self, items: &[PackItem], capacity: Weight) -> Vec<OrderId> {
///         let mut used = Weight::ZERO;
///         let mut chosen = Vec::new();
///         for item in items {
///             let next = used.saturating_add(item.weight);
///             if next <= capacity {
///                 used = next;
///                 chosen.push(item.id);
///             }
///         }
///         chosen
///     }
/// }
///
/// let items = [
///     PackItem { id: 1, weight: Weight::from_units(6) },
///     PackItem { id: 2, weight: Weight::from_units(6) },
/// ];
/// assert_eq!(FirstFit.pack(&items, Weight::from_units(10)), vec![1]);
/// ```
pub trait Packer: Send + Sync {
    /// Choose the identifiers of the items to keep.
    fn pack(&self, items: &[PackItem], capacity: Weight) -> Vec<OrderId>;
}

/// Check a packer's selection against the items it was offered.
///
/// # Panics
/// Panics when the selection exceeds `capacity`, repeats an identifier, or
/// names an item that was never offered. Any of these means the packer is
/// broken and continuing would corrupt assignments.
pub fn ensure_valid_selection(items: &[PackItem], selection: &[OrderId], capacity: Weight) {
    let mut seen = BTreeSet::new();
    let mut total = Weight::ZERO;
    for id in selection {
        assert!(seen.insert(*id), "packer selected order {id} twice");
        let Some(offered) = items.iter().find(|item| item.id == *id) else {
            panic!("packer selected order {id} that was not offered");
        };
        total = total.saturating_add(offered.weight);
    }
    assert!(
        total <= capacity,
        "packer selected {total} which exceeds capacity {capacity}"
    );
}
