pub const SCALE_1E6: u128 = 1_000_000u128;
pub const INDEX_SCALE_1E18: u128 = 1_000_000_000_000_000_000u128; // 1e18
pub const SHARE_DECIMALS: u32 = 7;
pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;
// Per-second rate cap, 1e18 scale (~500% APY) to keep index math in range
pub const MAX_RATE_PER_SECOND: u128 = 5 * INDEX_SCALE_1E18 / SECONDS_PER_YEAR;
// Default liquidation discount: collateral priced 10% below oracle value
pub const DEFAULT_LIQUIDATION_DISCOUNT: u128 = 100_000u128;
