use soroban_sdk::{Address, Env, Symbol, Vec};

use crate::interest;
use crate::shares;
use crate::storage::*;

// Status-check gateway: the vault-side half of the deferred-check
// protocol. Operations record their obligations here; the connector
// drains and settles them once the batch has reached its final state.

pub fn hook_state(env: &Env) -> HookState {
    env.storage()
        .persistent()
        .get(&DataKey::HookState)
        .unwrap_or(HookState::Idle)
}

fn set_hook_state(env: &Env, state: HookState) {
    env.storage().persistent().set(&DataKey::HookState, &state);
}

pub fn require_not_checking(env: &Env) {
    if hook_state(env) == HookState::ChecksInProgress {
        panic!("checks in progress");
    }
}

/// Capture the pre-operation totals. Idempotent: only the first mutating
/// operation of a batch records the snapshot.
pub fn take_snapshot(env: &Env) {
    if env
        .storage()
        .persistent()
        .has(&DataKey::Snapshot)
    {
        return;
    }
    let snapshot = VaultSnapshot {
        supply: shares::to_assets_down(env, total_shares(env)),
        borrows: total_borrowed(env),
    };
    env.storage()
        .persistent()
        .set(&DataKey::Snapshot, &snapshot);
    set_hook_state(env, HookState::SnapshotTaken);
}

fn push_unique(env: &Env, key: DataKey, account: &Address) {
    let mut list: Vec<Address> = env
        .storage()
        .persistent()
        .get(&key)
        .unwrap_or_else(|| Vec::new(env));
    if !list.contains(account.clone()) {
        list.push_back(account.clone());
        env.storage().persistent().set(&key, &list);
    }
}

pub fn register_account_check(env: &Env, account: &Address) {
    push_unique(env, DataKey::PendingAccounts, account);
}

pub fn register_vault_check(env: &Env) {
    env.storage()
        .persistent()
        .set(&DataKey::PendingVaultCheck, &true);
}

/// Cancel an account's pending check without evaluation.
pub fn record_forgiveness(env: &Env, account: &Address) {
    let pending: Vec<Address> = env
        .storage()
        .persistent()
        .get(&DataKey::PendingAccounts)
        .unwrap_or_else(|| Vec::new(env));
    if pending.contains(account.clone()) {
        let mut kept = Vec::new(env);
        for a in pending.iter() {
            if a != *account {
                kept.push_back(a);
            }
        }
        env.storage()
            .persistent()
            .set(&DataKey::PendingAccounts, &kept);
    }
    push_unique(env, DataKey::ForgivenAccounts, account);
}

/// Note that the account's debt reached zero, so the connector should
/// drop this vault as its controller at flush.
pub fn record_controller_release(env: &Env, account: &Address) {
    push_unique(env, DataKey::ReleasedControllers, account);
}

pub fn record_control_request(env: &Env, request: ControlRequest) {
    let mut list: Vec<ControlRequest> = env
        .storage()
        .persistent()
        .get(&DataKey::ControlRequests)
        .unwrap_or_else(|| Vec::new(env));
    list.push_back(request);
    env.storage()
        .persistent()
        .set(&DataKey::ControlRequests, &list);
}

/// Hand the pending ledger to the connector and clear it. The snapshot is
/// left in place for `check_vault_status` to consume.
pub fn drain_pending_checks(env: &Env) -> CheckReport {
    let storage = env.storage().persistent();
    let report = CheckReport {
        vault_check: storage
            .get(&DataKey::PendingVaultCheck)
            .unwrap_or(false),
        accounts: storage
            .get(&DataKey::PendingAccounts)
            .unwrap_or_else(|| Vec::new(env)),
        released: storage
            .get(&DataKey::ReleasedControllers)
            .unwrap_or_else(|| Vec::new(env)),
        forgiven: storage
            .get(&DataKey::ForgivenAccounts)
            .unwrap_or_else(|| Vec::new(env)),
        controls: storage
            .get(&DataKey::ControlRequests)
            .unwrap_or_else(|| Vec::new(env)),
    };
    storage.remove(&DataKey::PendingVaultCheck);
    storage.remove(&DataKey::PendingAccounts);
    storage.remove(&DataKey::ReleasedControllers);
    storage.remove(&DataKey::ForgivenAccounts);
    storage.remove(&DataKey::ControlRequests);
    report
}

/// Evaluate the vault-level invariant against the batch snapshot.
///
/// A cap only fails the check when the tracked quantity ends above the cap
/// AND grew during the batch: shrinking an already-over-cap vault must
/// always be allowed.
pub fn check_vault_status(env: &Env) -> (bool, Symbol) {
    let snapshot: VaultSnapshot = env
        .storage()
        .persistent()
        .get(&DataKey::Snapshot)
        .unwrap_or_else(|| panic!("no snapshot"));
    set_hook_state(env, HookState::ChecksInProgress);

    // The one path entitled to a fresh, mutating rate-model quote.
    interest::accrue_with_fresh_rate(env);

    let supply_cap: u128 = env
        .storage()
        .persistent()
        .get(&DataKey::SupplyCap)
        .unwrap_or(0u128);
    let borrow_cap: u128 = env
        .storage()
        .persistent()
        .get(&DataKey::BorrowCap)
        .unwrap_or(0u128);
    let supply_now = shares::to_assets_down(env, total_shares(env));
    let borrows_now = total_borrowed(env);

    let result = if supply_cap > 0 && supply_now > supply_cap && supply_now > snapshot.supply {
        (false, Symbol::new(env, "supply_cap"))
    } else if borrow_cap > 0 && borrows_now > borrow_cap && borrows_now > snapshot.borrows {
        (false, Symbol::new(env, "borrow_cap"))
    } else {
        (true, Symbol::new(env, "ok"))
    };

    env.storage().persistent().remove(&DataKey::Snapshot);
    set_hook_state(env, HookState::Idle);
    result
}
