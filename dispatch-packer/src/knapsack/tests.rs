//! Tests for the `KnapsackPacker`.

use dispatch_core::ensure_valid_selection;
use rstest::rstest;

use super::*;

fn item(id: OrderId, hundredths: u32) -> PackItem {
    PackItem {
        id,
        weight: Weight::from_hundredths(hundredths),
    }
}

fn pack_sorted(items: &[PackItem], capacity: Weight) -> Vec<OrderId> {
    let mut selection = KnapsackPacker::new().pack(items, capacity);
    ensure_valid_selection(items, &selection, capacity);
    selection.sort_unstable();
    selection
}

#[rstest]
fn takes_heaviest_subset_within_capacity() {
    let items = [item(1, 200), item(2, 300), item(3, 750), item(4, 900)];
    assert_eq!(pack_sorted(&items, Weight::from_units(15)), vec![1, 2, 4]);
}

#[rstest]
#[case::no_items(Vec::new(), 1_500)]
#[case::zero_capacity(vec![item(1, 100)], 0)]
#[case::only_oversize(vec![item(1, 1_600), item(2, 5_000)], 1_500)]
fn selects_nothing(#[case] items: Vec<PackItem>, #[case] capacity: u32) {
    assert!(pack_sorted(&items, Weight::from_hundredths(capacity)).is_empty());
}

#[rstest]
fn skips_oversize_item_but_keeps_the_rest() {
    let items = [item(1, 1_600), item(2, 400), item(3, 500)];
    assert_eq!(pack_sorted(&items, Weight::from_units(15)), vec![2, 3]);
}

#[rstest]
fn exact_fit_takes_everything() {
    let items = [item(1, 250), item(2, 250), item(3, 500)];
    assert_eq!(pack_sorted(&items, Weight::from_units(10)), vec![1, 2, 3]);
}

#[rstest]
fn beats_greedy_by_weight() {
    // Heaviest-first would take 6 and stop at 6; the optimum is 5 + 5.
    let items = [item(1, 600), item(2, 500), item(3, 500)];
    assert_eq!(pack_sorted(&items, Weight::from_units(10)), vec![2, 3]);
}

#[rstest]
fn ties_resolve_to_earliest_items() {
    let items = [item(1, 500), item(2, 500), item(3, 500)];
    let first = KnapsackPacker::new().pack(&items, Weight::from_units(10));
    let second = KnapsackPacker::new().pack(&items, Weight::from_units(10));
    assert_eq!(first, vec![1, 2]);
    assert_eq!(first, second);
}

#[rstest]
fn handles_hundredth_precision() {
    let items = [item(1, 333), item(2, 334), item(3, 667)];
    assert_eq!(pack_sorted(&items, Weight::from_hundredths(1_000)), vec![1, 3]);
}
