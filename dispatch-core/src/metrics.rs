//! Courier performance figures derived from completed deliveries.

use std::collections::BTreeMap;

use crate::{Batch, Region};

/// Regional averages at or above this many seconds yield a zero rating.
pub const RATING_HORIZON_SECS: u64 = 3_600;

/// Highest possible rating.
const MAX_RATING: u64 = 5;

/// Added before dividing so the quotient rounds half up.
const HALF_HORIZON_SECS: u64 = 1_800;

/// One delivered order as seen by the rating formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRecord {
    /// Region the order was delivered to.
    pub region: Region,
    /// Seconds the delivery took.
    pub delivery_time: u64,
}

/// Rate a courier from their delivery history.
///
/// Deliveries are grouped by region and averaged (truncated to whole
/// seconds). The fastest regional average `m` gives
/// `(3600 - min(m, 3600)) / 3600 * 5`, rounded to two decimal places.
/// Returns `None` when there are no deliveries.
///
/// # Examples
/// ```
/// use dispatch_core::{DeliveryRecord, Region, rating};
///
/// let x = Region::new(1)?;
/// let y = Region::new(2)?;
/// let history = [
///     DeliveryRecord { region: x, delivery_time: 600 },
///     DeliveryRecord { region: y, delivery_time: 200 },
/// ];
/// assert_eq!(rating(history), Some(4.72));
/// assert_eq!(rating([]), None);
/// # Ok::<(), dispatch_core::InvalidRegionCode>(())
/// ```
#[must_use]
pub fn rating<I>(deliveries: I) -> Option<f64>
where
    I: IntoIterator<Item = DeliveryRecord>,
{
    let mut per_region: BTreeMap<Region, (u64, u64)> = BTreeMap::new();
    for record in deliveries {
        let (total, count) = per_region.entry(record.region).or_default();
        *total = total.saturating_add(record.delivery_time);
        *count += 1;
    }
    let fastest = per_region
        .values()
        .filter_map(|(total, count)| total.checked_div(*count))
        .min()?;
    Some(rating_from_average(fastest))
}

#[expect(
    clippy::float_arithmetic,
    reason = "final conversion of an exact hundredths value to a decimal"
)]
fn rating_from_average(average_secs: u64) -> f64 {
    let remaining = RATING_HORIZON_SECS - average_secs.min(RATING_HORIZON_SECS);
    // Hundredths of a rating point, at most 500.
    let scaled = remaining * MAX_RATING * 100 + HALF_HORIZON_SECS;
    let hundredths = scaled
        .checked_div(RATING_HORIZON_SECS)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_default();
    f64::from(hundredths) / 100.0
}

/// Sum the rewards of batches with at least one delivered order.
///
/// A batch contributes its full reward once any member completes; batches
/// without completions contribute nothing.
#[must_use]
pub fn earnings<'a, I>(batches: I) -> u64
where
    I: IntoIterator<Item = &'a Batch>,
{
    batches
        .into_iter()
        .filter(|batch| batch.has_completion())
        .map(|batch| batch.expected_reward)
        .fold(0, u64::saturating_add)
}
