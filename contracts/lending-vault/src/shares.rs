use soroban_sdk::Env;

use crate::helpers::{mul_div_ceil, mul_div_floor};
use crate::storage::{cash_balance, total_borrowed, total_shares};

/// Assets backing the share supply: cash plus everything currently lent
/// out, so a position's share value is unaffected by outstanding loans.
/// Degenerates to plain cash while nothing is borrowed.
pub fn total_assets(env: &Env) -> u128 {
    cash_balance(env).saturating_add(total_borrowed(env))
}

// Rounding favors the pool throughout: conversions that pay the caller
// round down, conversions that charge the caller round up. An empty (or
// fully written-off) vault converts 1:1.

pub fn to_shares_down(env: &Env, assets: u128) -> u128 {
    let supply = total_shares(env);
    let total = total_assets(env);
    if supply == 0 || total == 0 {
        return assets;
    }
    mul_div_floor(assets, supply, total)
}

pub fn to_shares_up(env: &Env, assets: u128) -> u128 {
    let supply = total_shares(env);
    let total = total_assets(env);
    if supply == 0 || total == 0 {
        return assets;
    }
    mul_div_ceil(assets, supply, total)
}

pub fn to_assets_down(env: &Env, shares: u128) -> u128 {
    let supply = total_shares(env);
    let total = total_assets(env);
    if supply == 0 || total == 0 {
        return shares;
    }
    mul_div_floor(shares, total, supply)
}

pub fn to_assets_up(env: &Env, shares: u128) -> u128 {
    let supply = total_shares(env);
    let total = total_assets(env);
    if supply == 0 || total == 0 {
        return shares;
    }
    mul_div_ceil(shares, total, supply)
}
