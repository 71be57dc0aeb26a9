use soroban_sdk::{contracttype, Address, Env, Vec};
use stellar_tokens::fungible::Base as TokenBase;

use crate::constants::INDEX_SCALE_1E18;

// Storage key types for the contract
#[contracttype]
pub enum DataKey {
    Connector,       // Address of the trusted connector
    UnderlyingAsset, // Address of the pooled asset token
    ReferenceAsset,  // Address quoting the oracle's unit of account
    Oracle,          // Address of the price oracle
    RateModel,       // Address of the interest rate model
    Admin,           // Address
    Initialized,     // bool flag to prevent re-initialization
    CashBalance,     // u128, assets the ledger actually holds
    TotalBorrowed,   // u128, owed across all accounts at the current index
    InterestAccumulator, // u128 (scaled 1e18), monotonic
    LastAccrualTime,     // u64
    InterestRate,        // u128 per-second rate (scaled 1e18), cached
    SupplyCap,           // u128, max convert_to_assets(total_shares); 0 disables
    BorrowCap,           // u128, max total borrowed; 0 disables
    FlashLoanFeeScaled,  // u128 (scaled 1e6), defaults 0
    LiquidationDiscountScaled, // u128 (scaled 1e6)
    CollateralFactor(Address), // u128 (scaled 1e6) per recognized collateral vault
    DebtSnapshots(Address),    // DebtSnapshot per account
    // Status-check gateway state
    HookState,           // HookState
    Snapshot,            // VaultSnapshot, at most one per batch
    PendingAccounts,     // Vec<Address>
    PendingVaultCheck,   // bool
    ReleasedControllers, // Vec<Address>
    ForgivenAccounts,    // Vec<Address>
    ControlRequests,     // Vec<ControlRequest>
}

const TTL_THRESHOLD: u32 = 100_000;
const TTL_EXTEND_TO: u32 = 200_000;

/// Debt principal scaled by the accumulator value at last touch.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebtSnapshot {
    pub principal: u128,
    pub interest_index: u128,
}

/// Per-operation context supplied by the connector: the effective account
/// and the registry facts the vault would otherwise have to query mid-call.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpContext {
    pub on_behalf_of: Address,
    pub controller_enabled: bool,
    pub collaterals: Vec<Address>,
}

/// Pre-operation capture of the vault totals, consumed at check time.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultSnapshot {
    pub supply: u128,
    pub borrows: u128,
}

/// Deferred cross-vault share seizure, executed by the connector at flush.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlRequest {
    pub collateral_vault: Address,
    pub from: Address,
    pub to: Address,
    pub shares: u128,
}

/// Everything the connector needs to settle a batch against this vault.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckReport {
    pub vault_check: bool,
    pub accounts: Vec<Address>,
    pub released: Vec<Address>,
    pub forgiven: Vec<Address>,
    pub controls: Vec<ControlRequest>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HookState {
    Idle,
    SnapshotTaken,
    ChecksInProgress,
}

pub fn ensure_initialized(env: &Env) -> Address {
    bump_core_ttl(env);
    if !env
        .storage()
        .persistent()
        .get::<_, bool>(&DataKey::Initialized)
        .unwrap_or(false)
    {
        panic!("not initialized");
    }
    env.storage()
        .persistent()
        .get(&DataKey::UnderlyingAsset)
        .expect("underlying asset missing")
}

pub fn require_connector_auth(env: &Env) {
    let connector: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Connector)
        .expect("connector not set");
    connector.require_auth();
}

pub fn require_admin(env: &Env) -> Address {
    let admin: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Admin)
        .expect("admin not set");
    admin.require_auth();
    admin
}

pub fn connector(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::Connector)
        .expect("connector not set")
}

pub fn oracle(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::Oracle)
        .expect("oracle not set")
}

pub fn rate_model(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::RateModel)
        .expect("rate model not set")
}

pub fn reference_asset(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::ReferenceAsset)
        .expect("reference asset missing")
}

pub fn cash_balance(env: &Env) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::CashBalance)
        .unwrap_or(0u128)
}

pub fn set_cash_balance(env: &Env, cash: u128) {
    env.storage().persistent().set(&DataKey::CashBalance, &cash);
}

pub fn total_borrowed(env: &Env) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::TotalBorrowed)
        .unwrap_or(0u128)
}

pub fn set_total_borrowed(env: &Env, borrows: u128) {
    env.storage()
        .persistent()
        .set(&DataKey::TotalBorrowed, &borrows);
}

pub fn interest_accumulator(env: &Env) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::InterestAccumulator)
        .unwrap_or(INDEX_SCALE_1E18)
}

pub fn collateral_factor(env: &Env, vault: &Address) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::CollateralFactor(vault.clone()))
        .unwrap_or(0u128)
}

pub fn share_balance(env: &Env, account: &Address) -> u128 {
    let bal = TokenBase::balance(env, account);
    if bal < 0 {
        panic!("negative shares");
    }
    bal as u128
}

pub fn total_shares(env: &Env) -> u128 {
    let supply = TokenBase::total_supply(env);
    if supply < 0 {
        panic!("negative supply");
    }
    supply as u128
}

pub fn bump_core_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::Admin) {
        persistent.extend_ttl(&DataKey::Admin, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Connector) {
        persistent.extend_ttl(&DataKey::Connector, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::UnderlyingAsset) {
        persistent.extend_ttl(&DataKey::UnderlyingAsset, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Initialized) {
        persistent.extend_ttl(&DataKey::Initialized, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

pub fn bump_ledger_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::CashBalance) {
        persistent.extend_ttl(&DataKey::CashBalance, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::TotalBorrowed) {
        persistent.extend_ttl(&DataKey::TotalBorrowed, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::InterestAccumulator) {
        persistent.extend_ttl(&DataKey::InterestAccumulator, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::LastAccrualTime) {
        persistent.extend_ttl(&DataKey::LastAccrualTime, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

pub fn bump_debt_snapshot_ttl(env: &Env, account: &Address) {
    let persistent = env.storage().persistent();
    let key = DataKey::DebtSnapshots(account.clone());
    if persistent.has(&key) {
        persistent.extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}
