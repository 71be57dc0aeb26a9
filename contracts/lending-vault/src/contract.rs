use soroban_sdk::{contract, contractimpl, token, Address, Bytes, Env, String, Symbol, Vec};
use stellar_tokens::fungible::burnable::emit_burn;
use stellar_tokens::fungible::{emit_transfer, Base as TokenBase};

use crate::constants::*;
use crate::debt;
use crate::events::*;
use crate::health;
use crate::helpers::{call_contract_or_panic, to_i128};
use crate::interest;
use crate::interfaces::{ConnectorClient, FlashLoanReceiverClient};
use crate::liquidation;
use crate::shares;
use crate::status;
use crate::storage::*;

#[contract]
pub struct LendingVault;

/// Guards shared by every connector-routed mutation: the vault must be
/// initialized, the caller must be the trusted connector, no check cycle
/// may be in progress, and interest is brought current before any state
/// is read. Returns the underlying asset address.
fn begin_operation(env: &Env) -> Address {
    let underlying = ensure_initialized(env);
    require_connector_auth(env);
    status::require_not_checking(env);
    interest::accrue_interest(env);
    underlying
}

#[contractimpl]
impl LendingVault {
    /// Wire the vault to its collaborators. The reference asset is the
    /// oracle's unit of account; share metadata follows the token standard.
    pub fn initialize(
        env: Env,
        admin: Address,
        connector: Address,
        asset: Address,
        oracle: Address,
        rate_model: Address,
        reference_asset: Address,
        name: String,
        symbol: String,
    ) {
        let storage = env.storage().persistent();
        if storage
            .get::<_, bool>(&DataKey::Initialized)
            .unwrap_or(false)
        {
            panic!("already initialized");
        }
        admin.require_auth();
        storage.set(&DataKey::Initialized, &true);
        storage.set(&DataKey::Admin, &admin);
        storage.set(&DataKey::Connector, &connector);
        storage.set(&DataKey::UnderlyingAsset, &asset);
        storage.set(&DataKey::Oracle, &oracle);
        storage.set(&DataKey::RateModel, &rate_model);
        storage.set(&DataKey::ReferenceAsset, &reference_asset);
        storage.set(&DataKey::CashBalance, &0u128);
        storage.set(&DataKey::TotalBorrowed, &0u128);
        storage.set(&DataKey::InterestAccumulator, &INDEX_SCALE_1E18);
        storage.set(&DataKey::LastAccrualTime, &env.ledger().timestamp());
        storage.set(&DataKey::InterestRate, &0u128);
        storage.set(&DataKey::SupplyCap, &0u128);
        storage.set(&DataKey::BorrowCap, &0u128);
        storage.set(&DataKey::FlashLoanFeeScaled, &0u128);
        storage.set(
            &DataKey::LiquidationDiscountScaled,
            &DEFAULT_LIQUIDATION_DISCOUNT,
        );
        TokenBase::set_metadata(&env, SHARE_DECIMALS, name, symbol);
    }

    // Pooled-asset operations (connector-routed)

    /// Deposit underlying assets for the effective account, minting shares
    /// to `receiver`. Shares round down.
    pub fn deposit(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        if assets == 0 {
            panic!("zero amount");
        }
        let shares = shares::to_shares_down(&env, assets);
        if shares == 0 {
            panic!("zero shares");
        }
        let account = ctx.on_behalf_of;
        token::Client::new(&env, &underlying).transfer(
            &account,
            &env.current_contract_address(),
            &to_i128(assets),
        );
        TokenBase::mint(&env, &receiver, to_i128(shares));
        set_cash_balance(&env, cash_balance(&env).saturating_add(assets));
        status::register_vault_check(&env);
        Deposit {
            account,
            owner: receiver,
            assets,
            shares,
        }
        .publish(&env);
        shares
    }

    /// Mint an exact number of shares; the asset cost rounds up.
    pub fn mint(env: Env, ctx: OpContext, shares: u128, receiver: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        if shares == 0 {
            panic!("zero amount");
        }
        let assets = shares::to_assets_up(&env, shares);
        if assets == 0 {
            panic!("zero assets");
        }
        let account = ctx.on_behalf_of;
        token::Client::new(&env, &underlying).transfer(
            &account,
            &env.current_contract_address(),
            &to_i128(assets),
        );
        TokenBase::mint(&env, &receiver, to_i128(shares));
        set_cash_balance(&env, cash_balance(&env).saturating_add(assets));
        status::register_vault_check(&env);
        Deposit {
            account,
            owner: receiver,
            assets,
            shares,
        }
        .publish(&env);
        assets
    }

    /// Withdraw an exact amount of assets from the effective account's
    /// shares; the share cost rounds up. Cannot remove assets the ledger
    /// does not actually hold.
    pub fn withdraw(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        if assets == 0 {
            panic!("zero amount");
        }
        let shares = shares::to_shares_up(&env, assets);
        let owner = ctx.on_behalf_of;
        if share_balance(&env, &owner) < shares {
            panic!("insufficient shares");
        }
        let cash = cash_balance(&env);
        if assets > cash {
            panic!("insufficient cash");
        }
        let burn = to_i128(shares);
        TokenBase::update(&env, Some(&owner), None, burn);
        emit_burn(&env, &owner, burn);
        set_cash_balance(&env, cash - assets);
        token::Client::new(&env, &underlying).transfer(
            &env.current_contract_address(),
            &receiver,
            &to_i128(assets),
        );
        status::register_account_check(&env, &owner);
        status::register_vault_check(&env);
        Withdraw {
            account: owner,
            receiver,
            assets,
            shares,
        }
        .publish(&env);
        shares
    }

    /// Redeem an exact number of shares; the asset payout rounds down.
    pub fn redeem(env: Env, ctx: OpContext, shares: u128, receiver: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        if shares == 0 {
            panic!("zero amount");
        }
        let assets = shares::to_assets_down(&env, shares);
        if assets == 0 {
            panic!("zero assets");
        }
        let owner = ctx.on_behalf_of;
        if share_balance(&env, &owner) < shares {
            panic!("insufficient shares");
        }
        let cash = cash_balance(&env);
        if assets > cash {
            panic!("insufficient cash");
        }
        let burn = to_i128(shares);
        TokenBase::update(&env, Some(&owner), None, burn);
        emit_burn(&env, &owner, burn);
        set_cash_balance(&env, cash - assets);
        token::Client::new(&env, &underlying).transfer(
            &env.current_contract_address(),
            &receiver,
            &to_i128(assets),
        );
        status::register_account_check(&env, &owner);
        status::register_vault_check(&env);
        Withdraw {
            account: owner,
            receiver,
            assets,
            shares,
        }
        .publish(&env);
        assets
    }

    /// Move shares between accounts. Registers a status check for the
    /// sender, whose collateral may back debt elsewhere.
    pub fn transfer(env: Env, ctx: OpContext, to: Address, shares: u128) {
        ensure_initialized(&env);
        require_connector_auth(&env);
        status::require_not_checking(&env);
        if shares == 0 {
            return;
        }
        let from = ctx.on_behalf_of;
        if share_balance(&env, &from) < shares {
            panic!("insufficient shares");
        }
        let amount = to_i128(shares);
        TokenBase::update(&env, Some(&from), Some(&to), amount);
        emit_transfer(&env, &from, &to, amount);
        status::register_account_check(&env, &from);
    }

    /// Allowance-funded share transfer; the effective account is the spender.
    pub fn transfer_from(env: Env, ctx: OpContext, from: Address, to: Address, shares: u128) {
        ensure_initialized(&env);
        require_connector_auth(&env);
        status::require_not_checking(&env);
        if shares == 0 {
            return;
        }
        let spender = ctx.on_behalf_of;
        if share_balance(&env, &from) < shares {
            panic!("insufficient shares");
        }
        TokenBase::transfer_from(&env, &spender, &from, &to, to_i128(shares));
        status::register_account_check(&env, &from);
    }

    pub fn approve(env: Env, ctx: OpContext, spender: Address, shares: u128) {
        ensure_initialized(&env);
        require_connector_auth(&env);
        status::require_not_checking(&env);
        TokenBase::approve(&env, &ctx.on_behalf_of, &spender, to_i128(shares), u32::MAX);
    }

    // Borrowing operations (connector-routed)

    /// Borrow underlying assets against the effective account's collateral.
    pub fn borrow(env: Env, ctx: OpContext, assets: u128, receiver: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        if assets == 0 {
            panic!("zero assets");
        }
        if !ctx.controller_enabled {
            panic!("controller disabled");
        }
        let account = ctx.on_behalf_of;
        let cash = cash_balance(&env);
        if assets > cash {
            panic!("insufficient cash");
        }
        let account_debt = debt::increase_debt(&env, &account, assets);
        set_cash_balance(&env, cash - assets);
        token::Client::new(&env, &underlying).transfer(
            &env.current_contract_address(),
            &receiver,
            &to_i128(assets),
        );
        status::register_account_check(&env, &account);
        status::register_vault_check(&env);
        Borrow {
            account,
            receiver,
            assets,
            account_debt,
            total_borrowed: total_borrowed(&env),
        }
        .publish(&env);
        account_debt
    }

    /// Repay `obligor`'s debt from the effective account's tokens, clamped
    /// to the amount owed. Returns the amount actually retired.
    pub fn repay(env: Env, ctx: OpContext, assets: u128, obligor: Address) -> u128 {
        let underlying = begin_operation(&env);
        status::take_snapshot(&env);
        let payer = ctx.on_behalf_of;
        let owed = interest::owed_of(&env, &obligor);
        if owed == 0 {
            return 0;
        }
        let actual = if assets > owed { owed } else { assets };
        if actual == 0 {
            return 0;
        }
        token::Client::new(&env, &underlying).transfer(
            &payer,
            &env.current_contract_address(),
            &to_i128(actual),
        );
        set_cash_balance(&env, cash_balance(&env).saturating_add(actual));
        debt::decrease_debt(&env, &obligor, actual);
        status::register_vault_check(&env);
        Repay {
            payer,
            obligor: obligor.clone(),
            assets: actual,
            account_debt: interest::owed_of(&env, &obligor),
            total_borrowed: total_borrowed(&env),
        }
        .publish(&env);
        actual
    }

    /// Borrow-and-deposit in one step: debt and shares are created
    /// together without any token movement.
    pub fn wind(env: Env, ctx: OpContext, assets: u128) -> u128 {
        begin_operation(&env);
        status::take_snapshot(&env);
        if assets == 0 {
            panic!("zero amount");
        }
        if !ctx.controller_enabled {
            panic!("controller disabled");
        }
        let account = ctx.on_behalf_of;
        let shares = shares::to_shares_down(&env, assets);
        if shares == 0 {
            panic!("zero shares");
        }
        TokenBase::mint(&env, &account, to_i128(shares));
        debt::increase_debt(&env, &account, assets);
        status::register_account_check(&env, &account);
        status::register_vault_check(&env);
        Wind {
            account,
            assets,
            shares,
        }
        .publish(&env);
        shares
    }

    /// Repay-and-withdraw in one step, clamped to the amount owed.
    pub fn unwind(env: Env, ctx: OpContext, assets: u128) -> u128 {
        begin_operation(&env);
        status::take_snapshot(&env);
        if assets == 0 {
            panic!("zero amount");
        }
        let account = ctx.on_behalf_of;
        let owed = interest::owed_of(&env, &account);
        if owed == 0 {
            return 0;
        }
        let actual = if assets > owed { owed } else { assets };
        let shares = shares::to_shares_up(&env, actual);
        if share_balance(&env, &account) < shares {
            panic!("insufficient shares");
        }
        let burn = to_i128(shares);
        TokenBase::update(&env, Some(&account), None, burn);
        emit_burn(&env, &account, burn);
        debt::decrease_debt(&env, &account, actual);
        status::register_account_check(&env, &account);
        status::register_vault_check(&env);
        Unwind {
            account,
            assets: actual,
            shares,
        }
        .publish(&env);
        actual
    }

    /// Assume debt from another account (the liquidation "pull debt"
    /// pattern, also usable voluntarily for refinancing).
    pub fn pull_debt(env: Env, ctx: OpContext, from: Address, assets: u128) {
        begin_operation(&env);
        if assets == 0 {
            panic!("zero amount");
        }
        if !ctx.controller_enabled {
            panic!("controller disabled");
        }
        let account = ctx.on_behalf_of;
        if account == from {
            panic!("self pull");
        }
        debt::move_debt(&env, &from, &account, assets);
        status::register_account_check(&env, &account);
        PullDebt {
            from,
            to: account,
            assets,
        }
        .publish(&env);
    }

    /// Liquidate an unhealthy account: move debt to the liquidator and
    /// seize discounted collateral shares from the violator.
    pub fn liquidate(
        env: Env,
        ctx: OpContext,
        violator: Address,
        violator_collaterals: Vec<Address>,
        collateral_vault: Address,
        repay_assets: u128,
    ) -> u128 {
        begin_operation(&env);
        status::take_snapshot(&env);
        let seized = liquidation::liquidate(
            &env,
            &ctx,
            &violator,
            &violator_collaterals,
            &collateral_vault,
            repay_assets,
        );
        status::register_vault_check(&env);
        seized
    }

    /// Uncollateralized same-call loan. The receiver callback must return
    /// the principal plus fee before this call unwinds.
    pub fn flash_loan(env: Env, receiver: Address, amount: u128, data: Bytes) {
        let underlying = ensure_initialized(&env);
        status::require_not_checking(&env);
        interest::accrue_interest(&env);
        if amount == 0 {
            panic!("zero amount");
        }
        if amount > cash_balance(&env) {
            panic!("insufficient cash");
        }
        let fee_scaled: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::FlashLoanFeeScaled)
            .unwrap_or(0u128);
        let fee = crate::helpers::mul_div_floor(amount, fee_scaled, SCALE_1E6);

        let token_client = token::Client::new(&env, &underlying);
        let this = env.current_contract_address();
        let balance_before = token_client.balance(&this);
        if balance_before < 0 {
            panic!("invalid cash state");
        }
        token_client.transfer(&this, &receiver, &to_i128(amount));

        FlashLoanReceiverClient::new(&env, &receiver).on_flash_loan(&this, &amount, &fee, &data);

        let balance_after = token_client.balance(&this);
        if balance_after < balance_before + to_i128(fee) {
            panic!("flash loan not repaid");
        }
        let fee_paid = (balance_after - balance_before) as u128;
        if fee_paid > 0 {
            set_cash_balance(&env, cash_balance(&env).saturating_add(fee_paid));
        }
        FlashLoan {
            receiver,
            amount,
            fee_paid,
        }
        .publish(&env);
    }

    // Status-check gateway (connector-facing)

    /// Hand the batch's pending obligations to the connector and clear
    /// them. Connector only.
    pub fn drain_pending_checks(env: Env) -> CheckReport {
        ensure_initialized(&env);
        require_connector_auth(&env);
        status::drain_pending_checks(&env)
    }

    /// Evaluate the vault-level invariant against the batch snapshot.
    /// Connector only; consumes the snapshot.
    pub fn check_vault_status(env: Env) -> (bool, Symbol) {
        ensure_initialized(&env);
        require_connector_auth(&env);
        status::check_vault_status(&env)
    }

    /// Solvency check for an account against an explicit collateral set.
    /// Read-only; callable by anyone as a check or a preview.
    pub fn check_account_status(
        env: Env,
        account: Address,
        collaterals: Vec<Address>,
    ) -> (bool, Symbol) {
        ensure_initialized(&env);
        health::check_account_status(&env, &account, &collaterals)
    }

    /// Preview helper resolving the collateral set from the connector.
    /// Intended for top-level (off-ledger or direct) callers.
    pub fn account_status(env: Env, account: Address) -> (bool, Symbol) {
        ensure_initialized(&env);
        let registry = ConnectorClient::new(&env, &connector(&env));
        let collaterals = registry.get_collaterals(&account);
        health::check_account_status(&env, &account, &collaterals)
    }

    /// Move collateral shares under connector authority; the only way
    /// another vault's liquidation can reach balances held here.
    pub fn seize_shares(env: Env, from: Address, to: Address, shares: u128) {
        ensure_initialized(&env);
        require_connector_auth(&env);
        if shares == 0 {
            panic!("zero amount");
        }
        if share_balance(&env, &from) < shares {
            panic!("seizure failed");
        }
        let amount = to_i128(shares);
        TokenBase::update(&env, Some(&from), Some(&to), amount);
        emit_transfer(&env, &from, &to, amount);
        SharesSeized { from, to, shares }.publish(&env);
    }

    // Admin

    /// Admin: set supply cap (0 disables).
    pub fn set_supply_cap(env: Env, cap: u128) {
        ensure_initialized(&env);
        require_admin(&env);
        env.storage().persistent().set(&DataKey::SupplyCap, &cap);
        NewSupplyCap { supply_cap: cap }.publish(&env);
    }

    /// Admin: set borrow cap (0 disables).
    pub fn set_borrow_cap(env: Env, cap: u128) {
        ensure_initialized(&env);
        require_admin(&env);
        env.storage().persistent().set(&DataKey::BorrowCap, &cap);
        NewBorrowCap { borrow_cap: cap }.publish(&env);
    }

    /// Admin: recognize a vault's shares as collateral at the given
    /// factor (0..=1e6). Setting this vault's own address enables
    /// self-collateralization.
    pub fn set_collateral_factor(env: Env, vault: Address, factor_scaled: u128) {
        ensure_initialized(&env);
        require_admin(&env);
        if factor_scaled > SCALE_1E6 {
            panic!("invalid collateral factor");
        }
        env.storage()
            .persistent()
            .set(&DataKey::CollateralFactor(vault.clone()), &factor_scaled);
        NewCollateralFactor {
            vault,
            factor_mantissa: factor_scaled,
        }
        .publish(&env);
    }

    /// Admin: set liquidation discount (0..<1e6).
    pub fn set_liquidation_discount(env: Env, discount_scaled: u128) {
        ensure_initialized(&env);
        require_admin(&env);
        if discount_scaled >= SCALE_1E6 {
            panic!("invalid discount");
        }
        env.storage()
            .persistent()
            .set(&DataKey::LiquidationDiscountScaled, &discount_scaled);
        NewLiquidationDiscount {
            discount_mantissa: discount_scaled,
        }
        .publish(&env);
    }

    /// Admin: set flash loan fee (0..=1e6, applied to principal).
    pub fn set_flash_loan_fee(env: Env, fee_scaled: u128) {
        ensure_initialized(&env);
        require_admin(&env);
        if fee_scaled > SCALE_1E6 {
            panic!("invalid flash fee");
        }
        env.storage()
            .persistent()
            .set(&DataKey::FlashLoanFeeScaled, &fee_scaled);
        NewFlashLoanFee {
            fee_mantissa: fee_scaled,
        }
        .publish(&env);
    }

    /// Admin: swap the interest rate model, probing its quote entry first.
    pub fn set_rate_model(env: Env, model: Address) {
        ensure_initialized(&env);
        require_admin(&env);
        let _: u128 = call_contract_or_panic(
            &env,
            &model,
            "compute_interest_rate_view",
            (env.current_contract_address(), 0u128, 0u128),
        );
        env.storage().persistent().set(&DataKey::RateModel, &model);
        NewRateModel { model }.publish(&env);
    }

    /// Admin: transfer admin to a new address.
    pub fn set_admin(env: Env, new_admin: Address) {
        ensure_initialized(&env);
        require_admin(&env);
        env.storage().persistent().set(&DataKey::Admin, &new_admin);
        NewAdmin { admin: new_admin }.publish(&env);
    }

    /// Admin: upgrade contract code.
    pub fn upgrade_wasm(env: Env, new_wasm_hash: soroban_sdk::BytesN<32>) {
        ensure_initialized(&env);
        require_admin(&env);
        env.deployer().update_current_contract_wasm(new_wasm_hash);
    }

    // Views

    pub fn asset(env: Env) -> Address {
        ensure_initialized(&env)
    }

    pub fn total_assets(env: Env) -> u128 {
        ensure_initialized(&env);
        shares::total_assets(&env)
    }

    pub fn total_shares(env: Env) -> u128 {
        ensure_initialized(&env);
        total_shares(&env)
    }

    pub fn balance(env: Env, account: Address) -> u128 {
        share_balance(&env, &account)
    }

    pub fn allowance(env: Env, owner: Address, spender: Address) -> u128 {
        let allowance = TokenBase::allowance(&env, &owner, &spender);
        if allowance < 0 {
            0
        } else {
            allowance as u128
        }
    }

    pub fn convert_to_shares(env: Env, assets: u128) -> u128 {
        ensure_initialized(&env);
        shares::to_shares_down(&env, assets)
    }

    pub fn convert_to_assets(env: Env, shares: u128) -> u128 {
        ensure_initialized(&env);
        shares::to_assets_down(&env, shares)
    }

    /// Largest withdrawal the owner could make right now: limited by the
    /// owner's shares and by the cash actually held.
    pub fn max_withdraw(env: Env, owner: Address) -> u128 {
        ensure_initialized(&env);
        let by_shares = shares::to_assets_down(&env, share_balance(&env, &owner));
        let cash = cash_balance(&env);
        if by_shares < cash {
            by_shares
        } else {
            cash
        }
    }

    pub fn max_redeem(env: Env, owner: Address) -> u128 {
        ensure_initialized(&env);
        let balance = share_balance(&env, &owner);
        let by_cash = shares::to_shares_down(&env, cash_balance(&env));
        if balance < by_cash {
            balance
        } else {
            by_cash
        }
    }

    /// Current debt of an account, interest included.
    pub fn debt_of(env: Env, account: Address) -> u128 {
        ensure_initialized(&env);
        interest::owed_of(&env, &account)
    }

    pub fn get_total_borrowed(env: Env) -> u128 {
        ensure_initialized(&env);
        total_borrowed(&env)
    }

    pub fn get_cash(env: Env) -> u128 {
        ensure_initialized(&env);
        cash_balance(&env)
    }

    pub fn get_interest_accumulator(env: Env) -> u128 {
        ensure_initialized(&env);
        interest_accumulator(&env)
    }

    pub fn get_interest_rate(env: Env) -> u128 {
        ensure_initialized(&env);
        env.storage()
            .persistent()
            .get(&DataKey::InterestRate)
            .unwrap_or(0u128)
    }

    pub fn get_collateral_factor(env: Env, vault: Address) -> u128 {
        ensure_initialized(&env);
        collateral_factor(&env, &vault)
    }

    pub fn get_liquidation_discount(env: Env) -> u128 {
        ensure_initialized(&env);
        env.storage()
            .persistent()
            .get(&DataKey::LiquidationDiscountScaled)
            .unwrap_or(0u128)
    }

    pub fn get_supply_cap(env: Env) -> u128 {
        ensure_initialized(&env);
        env.storage()
            .persistent()
            .get(&DataKey::SupplyCap)
            .unwrap_or(0u128)
    }

    pub fn get_borrow_cap(env: Env) -> u128 {
        ensure_initialized(&env);
        env.storage()
            .persistent()
            .get(&DataKey::BorrowCap)
            .unwrap_or(0u128)
    }

    pub fn get_admin(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::Admin)
            .expect("admin not set")
    }

    pub fn get_connector(env: Env) -> Address {
        connector(&env)
    }

    pub fn get_oracle(env: Env) -> Address {
        oracle(&env)
    }

    pub fn get_rate_model(env: Env) -> Address {
        rate_model(&env)
    }

    pub fn get_reference_asset(env: Env) -> Address {
        reference_asset(&env)
    }
}
