#![no_std]
//! Test double for the external connector: collateral/controller
//! registries, typed batch execution against connected vaults, and the
//! end-of-batch flush that settles deferred status checks against final
//! state. Only the boundary the vaults consume is implemented; the real
//! connector's authentication and scheduling internals stay out of scope.

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, Symbol, Vec};

#[contracttype]
pub enum DataKey {
    Collaterals(Address),
    Controllers(Address),
}

// Wire-compatible mirrors of the vault's context/report types.

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpContext {
    pub on_behalf_of: Address,
    pub controller_enabled: bool,
    pub collaterals: Vec<Address>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlRequest {
    pub collateral_vault: Address,
    pub from: Address,
    pub to: Address,
    pub shares: u128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckReport {
    pub vault_check: bool,
    pub accounts: Vec<Address>,
    pub released: Vec<Address>,
    pub forgiven: Vec<Address>,
    pub controls: Vec<ControlRequest>,
}

/// One user-level operation against a connected vault.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VaultOp {
    Deposit(u128, Address),
    Mint(u128, Address),
    Withdraw(u128, Address),
    Redeem(u128, Address),
    Transfer(Address, u128),
    TransferFrom(Address, Address, u128),
    Approve(Address, u128),
    Borrow(u128, Address),
    Repay(u128, Address),
    Wind(u128),
    Unwind(u128),
    PullDebt(Address, u128),
    // violator, collateral vault, repay assets
    Liquidate(Address, Address, u128),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchItem {
    pub vault: Address,
    pub account: Address,
    pub op: VaultOp,
}

// Connector-facing surface of a connected vault.
#[soroban_sdk::contractclient(name = "VaultClient")]
pub trait ConnectedVault {
    fn deposit(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128;
    fn mint(env: Env, ctx: OpContext, shares: u128, receiver: Address) -> u128;
    fn withdraw(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128;
    fn redeem(env: Env, ctx: OpContext, shares: u128, receiver: Address) -> u128;
    fn transfer(env: Env, ctx: OpContext, to: Address, shares: u128);
    fn transfer_from(env: Env, ctx: OpContext, from: Address, to: Address, shares: u128);
    fn approve(env: Env, ctx: OpContext, spender: Address, shares: u128);
    fn borrow(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128;
    fn repay(env: Env, ctx: OpContext, assets: u128, obligor: Address) -> u128;
    fn wind(env: Env, ctx: OpContext, assets: u128) -> u128;
    fn unwind(env: Env, ctx: OpContext, assets: u128) -> u128;
    fn pull_debt(env: Env, ctx: OpContext, from: Address, assets: u128);
    fn liquidate(
        env: Env,
        ctx: OpContext,
        violator: Address,
        violator_collaterals: Vec<Address>,
        collateral_vault: Address,
        repay_assets: u128,
    ) -> u128;
    fn drain_pending_checks(env: Env) -> CheckReport;
    fn check_vault_status(env: Env) -> (bool, Symbol);
    fn check_account_status(env: Env, account: Address, collaterals: Vec<Address>)
        -> (bool, Symbol);
    fn seize_shares(env: Env, from: Address, to: Address, shares: u128);
}

#[contract]
pub struct MockConnector;

#[contractimpl]
impl MockConnector {
    // Registry surface

    pub fn enable_collateral(env: Env, account: Address, vault: Address) {
        account.require_auth();
        push_unique(&env, &DataKey::Collaterals(account), &vault);
    }

    pub fn disable_collateral(env: Env, account: Address, vault: Address) {
        account.require_auth();
        remove_entry(&env, &DataKey::Collaterals(account), &vault);
    }

    pub fn enable_controller(env: Env, account: Address, vault: Address) {
        account.require_auth();
        push_unique(&env, &DataKey::Controllers(account), &vault);
    }

    pub fn disable_controller(env: Env, account: Address, vault: Address) {
        account.require_auth();
        remove_entry(&env, &DataKey::Controllers(account), &vault);
    }

    pub fn get_collaterals(env: Env, account: Address) -> Vec<Address> {
        read_list(&env, &DataKey::Collaterals(account))
    }

    pub fn get_controllers(env: Env, account: Address) -> Vec<Address> {
        read_list(&env, &DataKey::Controllers(account))
    }

    pub fn is_collateral_enabled(env: Env, account: Address, vault: Address) -> bool {
        read_list(&env, &DataKey::Collaterals(account)).contains(vault)
    }

    pub fn is_controller_enabled(env: Env, account: Address, vault: Address) -> bool {
        read_list(&env, &DataKey::Controllers(account)).contains(vault)
    }

    // Execution surface

    pub fn execute(env: Env, caller: Address, item: BatchItem) {
        let mut items = Vec::new(&env);
        items.push_back(item);
        Self::batch(env, caller, items);
    }

    /// Run a batch of operations, then settle every deferred obligation
    /// against the final state. Any failed check unwinds the whole batch.
    pub fn batch(env: Env, caller: Address, items: Vec<BatchItem>) {
        caller.require_auth();
        let mut touched: Vec<Address> = Vec::new(&env);
        for item in items.iter() {
            if item.account != caller {
                panic!("not authorized for account");
            }
            if !touched.contains(item.vault.clone()) {
                touched.push_back(item.vault.clone());
            }
            dispatch(&env, &item);
        }
        flush(&env, &touched);
    }
}

fn read_list(env: &Env, key: &DataKey) -> Vec<Address> {
    env.storage()
        .persistent()
        .get(key)
        .unwrap_or_else(|| Vec::new(env))
}

fn push_unique(env: &Env, key: &DataKey, vault: &Address) {
    let mut list = read_list(env, key);
    if !list.contains(vault.clone()) {
        list.push_back(vault.clone());
        env.storage().persistent().set(key, &list);
    }
}

fn remove_entry(env: &Env, key: &DataKey, vault: &Address) {
    let list = read_list(env, key);
    let mut kept = Vec::new(env);
    for entry in list.iter() {
        if entry != *vault {
            kept.push_back(entry);
        }
    }
    env.storage().persistent().set(key, &kept);
}

fn build_ctx(env: &Env, account: &Address, vault: &Address) -> OpContext {
    let controllers = read_list(env, &DataKey::Controllers(account.clone()));
    OpContext {
        on_behalf_of: account.clone(),
        controller_enabled: controllers.contains(vault.clone()),
        collaterals: read_list(env, &DataKey::Collaterals(account.clone())),
    }
}

fn dispatch(env: &Env, item: &BatchItem) {
    let client = VaultClient::new(env, &item.vault);
    let ctx = build_ctx(env, &item.account, &item.vault);
    match item.op.clone() {
        VaultOp::Deposit(assets, receiver) => {
            client.deposit(&ctx, &assets, &receiver);
        }
        VaultOp::Mint(shares, receiver) => {
            client.mint(&ctx, &shares, &receiver);
        }
        VaultOp::Withdraw(assets, receiver) => {
            client.withdraw(&ctx, &assets, &receiver);
        }
        VaultOp::Redeem(shares, receiver) => {
            client.redeem(&ctx, &shares, &receiver);
        }
        VaultOp::Transfer(to, shares) => {
            client.transfer(&ctx, &to, &shares);
        }
        VaultOp::TransferFrom(from, to, shares) => {
            client.transfer_from(&ctx, &from, &to, &shares);
        }
        VaultOp::Approve(spender, shares) => {
            client.approve(&ctx, &spender, &shares);
        }
        VaultOp::Borrow(assets, receiver) => {
            client.borrow(&ctx, &assets, &receiver);
        }
        VaultOp::Repay(assets, obligor) => {
            client.repay(&ctx, &assets, &obligor);
        }
        VaultOp::Wind(assets) => {
            client.wind(&ctx, &assets);
        }
        VaultOp::Unwind(assets) => {
            client.unwind(&ctx, &assets);
        }
        VaultOp::PullDebt(from, assets) => {
            client.pull_debt(&ctx, &from, &assets);
        }
        VaultOp::Liquidate(violator, collateral_vault, repay_assets) => {
            let violator_collaterals =
                read_list(env, &DataKey::Collaterals(violator.clone()));
            client.liquidate(
                &ctx,
                &violator,
                &violator_collaterals,
                &collateral_vault,
                &repay_assets,
            );
        }
    }
}

/// Settle a completed batch: drain every touched vault, apply controller
/// releases, execute collateral-control requests, then evaluate account
/// and vault checks against final state.
fn flush(env: &Env, touched: &Vec<Address>) {
    let mut reports: Vec<CheckReport> = Vec::new(env);
    for vault in touched.iter() {
        reports.push_back(VaultClient::new(env, &vault).drain_pending_checks());
    }

    for i in 0..touched.len() {
        let vault = touched.get(i).unwrap();
        let report = reports.get(i).unwrap();
        for account in report.released.iter() {
            remove_entry(env, &DataKey::Controllers(account), &vault);
        }
    }

    for report in reports.iter() {
        for control in report.controls.iter() {
            VaultClient::new(env, &control.collateral_vault).seize_shares(
                &control.from,
                &control.to,
                &control.shares,
            );
        }
    }

    let mut forgiven: Vec<Address> = Vec::new(env);
    for report in reports.iter() {
        for account in report.forgiven.iter() {
            if !forgiven.contains(account.clone()) {
                forgiven.push_back(account);
            }
        }
    }
    let mut accounts: Vec<Address> = Vec::new(env);
    for report in reports.iter() {
        for account in report.accounts.iter() {
            if !accounts.contains(account.clone()) && !forgiven.contains(account.clone()) {
                accounts.push_back(account);
            }
        }
    }
    for account in accounts.iter() {
        let controllers = read_list(env, &DataKey::Controllers(account.clone()));
        if controllers.len() == 0 {
            continue;
        }
        if controllers.len() > 1 {
            panic!("multiple controllers");
        }
        let controller = controllers.get(0).unwrap();
        let collaterals = read_list(env, &DataKey::Collaterals(account.clone()));
        let (ok, _diag) =
            VaultClient::new(env, &controller).check_account_status(&account, &collaterals);
        if !ok {
            panic!("account status violation");
        }
    }

    for i in 0..touched.len() {
        let report = reports.get(i).unwrap();
        if report.vault_check {
            let vault = touched.get(i).unwrap();
            let (ok, _diag) = VaultClient::new(env, &vault).check_vault_status();
            if !ok {
                panic!("vault status violation");
            }
        }
    }
}
