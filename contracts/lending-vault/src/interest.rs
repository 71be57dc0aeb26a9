use soroban_sdk::{Address, Env};

use crate::constants::{INDEX_SCALE_1E18, MAX_RATE_PER_SECOND};
use crate::events::AccrueInterest;
use crate::helpers::{emit_external_call_failure, mul_div_floor, try_call_contract};
use crate::storage::*;

/// Advance the interest accumulator to the current ledger timestamp.
///
/// The per-second rate is quoted through the rate model's view entry via
/// the fallible helper: a model failure falls back to the last cached rate
/// and emits `ExternalCallFailed`, so accrual never blocks an unrelated
/// operation. The mutating model entry is reserved for the vault-status
/// path (`accrue_with_fresh_rate`).
pub fn accrue_interest(env: &Env) {
    bump_ledger_ttl(env);
    let last: u64 = env
        .storage()
        .persistent()
        .get(&DataKey::LastAccrualTime)
        .unwrap_or_else(|| env.ledger().timestamp());
    let now = env.ledger().timestamp();
    if now <= last {
        return;
    }
    let elapsed = (now - last) as u128;

    let rate = quote_rate_with_fallback(env);
    advance_index(env, rate, elapsed);

    env.storage()
        .persistent()
        .set(&DataKey::LastAccrualTime, &now);
}

/// Accrual used inside the vault-status check: the rate model's mutating
/// entry is given its once-per-batch chance to update internal state and
/// provide a fresh rate. Its failure is still recoverable — a broken
/// model must not wedge every batch that touched the vault — so the
/// cached rate is the fallback here too. The only call site that
/// propagates a model error is the `set_rate_model` probe.
pub fn accrue_with_fresh_rate(env: &Env) {
    bump_ledger_ttl(env);
    let model = rate_model(env);
    let args = (
        env.current_contract_address(),
        cash_balance(env),
        total_borrowed(env),
    );
    let rate = match try_call_contract::<u128, _>(env, &model, "compute_interest_rate", args) {
        Ok(rate) => {
            let rate = clamp_rate(rate);
            env.storage()
                .persistent()
                .set(&DataKey::InterestRate, &rate);
            rate
        }
        Err(err) => {
            emit_external_call_failure(env, &model, &err, true);
            env.storage()
                .persistent()
                .get(&DataKey::InterestRate)
                .unwrap_or(0u128)
        }
    };
    let last: u64 = env
        .storage()
        .persistent()
        .get(&DataKey::LastAccrualTime)
        .unwrap_or_else(|| env.ledger().timestamp());
    let now = env.ledger().timestamp();
    if now > last {
        advance_index(env, rate, (now - last) as u128);
        env.storage()
            .persistent()
            .set(&DataKey::LastAccrualTime, &now);
    }
}

fn advance_index(env: &Env, rate: u128, elapsed: u128) {
    let borrows = total_borrowed(env);
    let accumulator = interest_accumulator(env);
    if rate == 0 {
        return;
    }
    // growth factor for the window, 1e18 scale; the clamped rate keeps
    // rate * elapsed well inside u128 for any plausible window
    let growth = rate.saturating_mul(elapsed);
    let delta = mul_div_floor(accumulator, growth, INDEX_SCALE_1E18);
    let interest = mul_div_floor(borrows, growth, INDEX_SCALE_1E18);
    let new_accumulator = accumulator.saturating_add(delta);
    let new_borrows = borrows.saturating_add(interest);
    env.storage()
        .persistent()
        .set(&DataKey::InterestAccumulator, &new_accumulator);
    set_total_borrowed(env, new_borrows);
    AccrueInterest {
        interest_accrued: interest,
        interest_accumulator: new_accumulator,
        total_borrowed: new_borrows,
    }
    .publish(env);
}

fn quote_rate_with_fallback(env: &Env) -> u128 {
    let model = rate_model(env);
    let args = (
        env.current_contract_address(),
        cash_balance(env),
        total_borrowed(env),
    );
    match try_call_contract::<u128, _>(env, &model, "compute_interest_rate_view", args) {
        Ok(rate) => {
            let rate = clamp_rate(rate);
            env.storage()
                .persistent()
                .set(&DataKey::InterestRate, &rate);
            rate
        }
        Err(err) => {
            emit_external_call_failure(env, &model, &err, true);
            env.storage()
                .persistent()
                .get(&DataKey::InterestRate)
                .unwrap_or(0u128)
        }
    }
}

fn clamp_rate(rate: u128) -> u128 {
    if rate > MAX_RATE_PER_SECOND {
        MAX_RATE_PER_SECOND
    } else {
        rate
    }
}

/// Current debt of an account: principal scaled forward by the index.
/// Rounded down, matching the floored aggregate accrual, so the sum of
/// per-account debt stays within rounding tolerance of `TotalBorrowed`.
pub fn owed_of(env: &Env, account: &Address) -> u128 {
    bump_debt_snapshot_ttl(env, account);
    let snap: Option<DebtSnapshot> = env
        .storage()
        .persistent()
        .get(&DataKey::DebtSnapshots(account.clone()));
    let Some(snapshot) = snap else {
        return 0u128;
    };
    if snapshot.principal == 0 {
        return 0u128;
    }
    mul_div_floor(
        snapshot.principal,
        interest_accumulator(env),
        snapshot.interest_index,
    )
}

/// Re-base an account's debt snapshot to the current accumulator.
pub fn write_debt_snapshot(env: &Env, account: &Address, principal: u128) {
    if principal == 0 {
        env.storage()
            .persistent()
            .remove(&DataKey::DebtSnapshots(account.clone()));
        return;
    }
    let snap = DebtSnapshot {
        principal,
        interest_index: interest_accumulator(env),
    };
    env.storage()
        .persistent()
        .set(&DataKey::DebtSnapshots(account.clone()), &snap);
    bump_debt_snapshot_ttl(env, account);
}
