//! Dynamic programming packer over weights in hundredths.
//!
//! The table cell for `(i, w)` is the heaviest load reachable with the first
//! `i` items inside capacity `w`. Only the previous row of loads is kept;
//! for every row the packer records whether item `i` changed the cell, which
//! is all the back-tracking step needs.

use dispatch_core::{OrderId, PackItem, Packer, Weight};

#[cfg(test)]
mod tests;

/// Exact 0/1 knapsack maximising the total selected weight.
///
/// Runs in `O(n·W)` time and space, where `W` is the capacity in hundredths.
/// Items are considered in the order given and an item is only taken when it
/// strictly improves the load, so identical input always yields an identical
/// selection. Items heavier than the capacity are never selected.
///
/// # Examples
/// ```
/// use dispatch_core::{PackItem, Packer, Weight};
/// use dispatch_packer::KnapsackPacker;
///
/// let items = [
///     PackItem { id: 1, weight: Weight::from_units(2) },
///     PackItem { id: 2, weight: Weight::from_units(3) },
///     PackItem { id: 3, weight: Weight::from_hundredths(750) },
///     PackItem { id: 4, weight: Weight::from_units(9) },
/// ];
/// let mut selected = KnapsackPacker::new().pack(&items, Weight::from_units(15));
/// selected.sort_unstable();
/// assert_eq!(selected, vec![1, 2, 4]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct KnapsackPacker;

impl KnapsackPacker {
    /// Construct the packer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Packer for KnapsackPacker {
    fn pack(&self, items: &[PackItem], capacity: Weight) -> Vec<OrderId> {
        let Ok(width) = usize::try_from(capacity.hundredths()) else {
            log::warn!("capacity {capacity} does not fit the packing table");
            return Vec::new();
        };
        if items.is_empty() || width == 0 {
            return Vec::new();
        }

        let (load, took) = fill(items, width);
        let selection = backtrack(items, &took, width);
        log::debug!(
            "packed {} of {} items for {} hundredths within {width}",
            selection.len(),
            items.len(),
            load
        );
        selection
    }
}

/// Hundredths as a table offset.
fn offset(weight: Weight) -> Option<usize> {
    usize::try_from(weight.hundredths()).ok()
}

/// Fill the table row by row.
///
/// Returns the best load for the full capacity and, per item, whether taking
/// it improved each capacity cell.
fn fill(items: &[PackItem], width: usize) -> (u32, Vec<Vec<bool>>) {
    let mut best = vec![0_u32; width + 1];
    let mut took = Vec::with_capacity(items.len());
    for item in items {
        let weight = item.weight.hundredths();
        let candidates: Vec<Option<u32>> = best
            .iter()
            .enumerate()
            .map(|(cell, &without)| {
                let rest = cell.checked_sub(offset(item.weight)?)?;
                let with = best.get(rest)?.saturating_add(weight);
                (with > without).then_some(with)
            })
            .collect();
        took.push(candidates.iter().map(Option::is_some).collect());
        for (slot, improved) in best.iter_mut().zip(candidates) {
            if let Some(load) = improved {
                *slot = load;
            }
        }
    }
    (best.last().copied().unwrap_or_default(), took)
}

/// Walk the rows from the last item back, collecting every item whose row
/// changed the current cell.
fn backtrack(items: &[PackItem], took: &[Vec<bool>], width: usize) -> Vec<OrderId> {
    let mut cell = width;
    let mut selection = Vec::new();
    for (item, row) in items.iter().zip(took).rev() {
        if !row.get(cell).copied().unwrap_or(false) {
            continue;
        }
        let Some(rest) = offset(item.weight).and_then(|weight| cell.checked_sub(weight)) else {
            log::warn!("packing table marked item {} beyond cell {cell}", item.id);
            continue;
        };
        selection.push(item.id);
        cell = rest;
    }
    selection.reverse();
    selection
}
