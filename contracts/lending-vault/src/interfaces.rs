#![allow(dead_code)]
use soroban_sdk::{Address, Bytes, Env, Vec};

/// Interest rate model boundary. `compute_interest_rate` may mutate model
/// state and rejects callers other than the vault; the `_view` twin is the
/// side-effect-free quote used on the accrual path.
#[soroban_sdk::contractclient(name = "RateModelClient")]
pub trait InterestRateModel {
    fn compute_interest_rate(env: Env, vault: Address, cash: u128, borrows: u128) -> u128;
    fn compute_interest_rate_view(env: Env, vault: Address, cash: u128, borrows: u128) -> u128;
}

/// Price oracle boundary: `amount` of `base` valued in `quote` units.
/// Declared in full even though the vault only consumes `get_quote`.
#[soroban_sdk::contractclient(name = "PriceOracleClient")]
pub trait PriceOracle {
    fn get_quote(env: Env, amount: u128, base: Address, quote: Address) -> u128;
    fn get_quotes(env: Env, amount: u128, base: Address, quote: Address) -> (u128, u128);
    fn get_tick(env: Env, amount: u128, base: Address, quote: Address) -> i64;
    fn get_ticks(env: Env, amount: u128, base: Address, quote: Address) -> (i64, i64);
}

/// The connector's registry surface. Only read top-level (preview paths);
/// operations receive the same facts through `OpContext` instead.
#[soroban_sdk::contractclient(name = "ConnectorClient")]
pub trait Connector {
    fn get_collaterals(env: Env, account: Address) -> Vec<Address>;
    fn get_controllers(env: Env, account: Address) -> Vec<Address>;
    fn is_collateral_enabled(env: Env, account: Address, vault: Address) -> bool;
    fn is_controller_enabled(env: Env, account: Address, vault: Address) -> bool;
}

/// Peer vault surface used to value and seize foreign collateral.
#[soroban_sdk::contractclient(name = "CollateralVaultClient")]
pub trait CollateralVault {
    fn balance(env: Env, account: Address) -> u128;
    fn convert_to_assets(env: Env, shares: u128) -> u128;
    fn convert_to_shares(env: Env, assets: u128) -> u128;
    fn asset(env: Env) -> Address;
}

#[soroban_sdk::contractclient(name = "FlashLoanReceiverClient")]
pub trait FlashLoanReceiver {
    fn on_flash_loan(env: Env, vault: Address, amount: u128, fee: u128, data: Bytes);
}
