//! Capacity packing for courier dispatch.
//!
//! This crate provides [`KnapsackPacker`], the default implementation of the
//! [`Packer`](dispatch_core::Packer) trait. It solves the 0/1 knapsack problem
//! in which each order's value is its own weight, so the chosen batch uses as
//! much of the courier's capacity as possible. Weights are whole hundredths,
//! which keeps the dynamic programming table exact.

#![forbid(unsafe_code)]

mod knapsack;

pub use knapsack::KnapsackPacker;
