use soroban_sdk::{Address, Env, Vec};
use stellar_tokens::fungible::{emit_transfer, Base as TokenBase};

use crate::constants::SCALE_1E6;
use crate::debt;
use crate::events::{Liquidate, SharesSeized};
use crate::health;
use crate::helpers::{mul_div_floor, to_i128};
use crate::interest::owed_of;
use crate::interfaces::{CollateralVaultClient, PriceOracleClient};
use crate::shares;
use crate::status;
use crate::storage::*;

/// Shares of `collateral_vault` worth `repay_assets` of this vault's
/// underlying, with the collateral priced below oracle value by the
/// configured discount to compensate the liquidator.
fn compute_seize_shares(env: &Env, collateral_vault: &Address, repay_assets: u128) -> u128 {
    let oracle = PriceOracleClient::new(env, &oracle(env));
    let underlying: Address = env
        .storage()
        .persistent()
        .get(&DataKey::UnderlyingAsset)
        .expect("underlying asset missing");
    let reference = reference_asset(env);

    let repay_value = oracle.get_quote(&repay_assets, &underlying, &reference);
    let discount: u128 = env
        .storage()
        .persistent()
        .get(&DataKey::LiquidationDiscountScaled)
        .unwrap_or(0u128);
    let seize_value = mul_div_floor(repay_value, SCALE_1E6, SCALE_1E6 - discount);

    if *collateral_vault == env.current_contract_address() {
        let assets = oracle.get_quote(&seize_value, &reference, &underlying);
        shares::to_shares_down(env, assets)
    } else {
        let peer = CollateralVaultClient::new(env, collateral_vault);
        let assets = oracle.get_quote(&seize_value, &reference, &peer.asset());
        peer.convert_to_shares(&assets)
    }
}

/// Seize collateral from an unhealthy account, moving matching debt onto
/// the liquidator. Interest is already accrued and the snapshot taken by
/// the entry point.
pub fn liquidate(
    env: &Env,
    ctx: &OpContext,
    violator: &Address,
    violator_collaterals: &Vec<Address>,
    collateral_vault: &Address,
    repay_assets: u128,
) -> u128 {
    if repay_assets == 0 {
        panic!("zero amount");
    }
    if !ctx.controller_enabled {
        panic!("controller disabled");
    }
    let liquidator = &ctx.on_behalf_of;
    if liquidator == violator {
        panic!("self liquidation");
    }

    let (healthy, _) = health::check_account_status(env, violator, violator_collaterals);
    if healthy {
        panic!("violator healthy");
    }

    let owed = owed_of(env, violator);
    if repay_assets > owed {
        panic!("exceeds debt");
    }

    let mut seize_shares = compute_seize_shares(env, collateral_vault, repay_assets);
    let this = env.current_contract_address();
    let available = if *collateral_vault == this {
        share_balance(env, violator)
    } else {
        CollateralVaultClient::new(env, collateral_vault).balance(violator)
    };
    // Partial liquidation: never seize more than the violator holds.
    if seize_shares > available {
        seize_shares = available;
    }
    if seize_shares == 0 {
        panic!("zero shares");
    }

    // Debt transfer, not cash transfer: the pool's aggregate is untouched.
    debt::move_debt(env, violator, liquidator, repay_assets);

    // The violator may remain unhealthy after a partial liquidation; its
    // pending check is forgiven. The liquidator's own position is checked
    // at flush like any other.
    status::record_forgiveness(env, violator);
    status::register_account_check(env, liquidator);

    if *collateral_vault == this {
        let amount = to_i128(seize_shares);
        TokenBase::update(env, Some(violator), Some(liquidator), amount);
        emit_transfer(env, violator, liquidator, amount);
        SharesSeized {
            from: violator.clone(),
            to: liquidator.clone(),
            shares: seize_shares,
        }
        .publish(env);
    } else {
        // Foreign collateral can only move under connector authority; the
        // connector executes this request before settling checks.
        status::record_control_request(
            env,
            ControlRequest {
                collateral_vault: collateral_vault.clone(),
                from: violator.clone(),
                to: liquidator.clone(),
                shares: seize_shares,
            },
        );
    }

    Liquidate {
        liquidator: liquidator.clone(),
        violator: violator.clone(),
        collateral_vault: collateral_vault.clone(),
        repay_assets,
        seized_shares: seize_shares,
    }
    .publish(env);

    seize_shares
}
