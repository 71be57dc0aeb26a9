use soroban_sdk::{Address, Env};

use crate::interest::{owed_of, write_debt_snapshot};
use crate::status;
use crate::storage::{set_total_borrowed, total_borrowed};

// Debt mutations always adjust the account snapshot and the aggregate
// together; a mismatch between the two is a logic error, not a runtime
// condition.

pub fn increase_debt(env: &Env, account: &Address, assets: u128) -> u128 {
    let owed = owed_of(env, account);
    let new_owed = owed
        .checked_add(assets)
        .unwrap_or_else(|| panic!("debt overflow"));
    write_debt_snapshot(env, account, new_owed);
    set_total_borrowed(env, total_borrowed(env).saturating_add(assets));
    new_owed
}

/// Reduce an account's debt by up to `assets`, returning the amount
/// actually retired. Hitting zero releases the controller relationship
/// and forgives the account's pending check.
pub fn decrease_debt(env: &Env, account: &Address, assets: u128) -> u128 {
    let owed = owed_of(env, account);
    if owed == 0 {
        return 0;
    }
    let amount = if assets > owed { owed } else { assets };
    let new_owed = owed - amount;
    write_debt_snapshot(env, account, new_owed);
    set_total_borrowed(env, total_borrowed(env).saturating_sub(amount));
    if new_owed == 0 {
        status::record_controller_release(env, account);
        status::record_forgiveness(env, account);
    }
    amount
}

/// Move debt between accounts; the aggregate is untouched.
pub fn move_debt(env: &Env, from: &Address, to: &Address, assets: u128) {
    let owed_from = owed_of(env, from);
    if assets > owed_from {
        panic!("exceeds debt");
    }
    let new_from = owed_from - assets;
    let owed_to = owed_of(env, to)
        .checked_add(assets)
        .unwrap_or_else(|| panic!("debt overflow"));
    write_debt_snapshot(env, from, new_from);
    write_debt_snapshot(env, to, owed_to);
    if new_from == 0 {
        status::record_controller_release(env, from);
        status::record_forgiveness(env, from);
    }
}
