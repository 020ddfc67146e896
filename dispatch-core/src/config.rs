//! Tunables passed into the [`Dispatcher`](crate::Dispatcher).

/// Default reward per unit of pay coefficient.
pub const DEFAULT_BASE_RATE: u64 = 500;

/// Explicit configuration for dispatch operations.
///
/// # Examples
/// ```
/// use dispatch_core::DispatchConfig;
///
/// let config = DispatchConfig {
///     allow_new_regions_and_windows: false,
///     ..DispatchConfig::default()
/// };
/// assert_eq!(config.base_rate, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DispatchConfig {
    /// Multiplied by the vehicle pay coefficient to fix a batch's reward.
    pub base_rate: u64,
    /// Create regions and time windows on first reference during intake.
    /// When disabled, intake rejects entities naming unknown ones.
    pub allow_new_regions_and_windows: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_rate: DEFAULT_BASE_RATE,
            allow_new_regions_and_windows: true,
        }
    }
}
