use soroban_sdk::{Address, Env, Symbol, Vec};

use crate::constants::SCALE_1E6;
use crate::helpers::mul_div_floor;
use crate::interest::owed_of;
use crate::interfaces::{CollateralVaultClient, PriceOracleClient};
use crate::shares;
use crate::storage::*;

/// Evaluate an account's solvency against the passed collateral set.
///
/// Read-only: usable both as the flush-time check and as a side-effect
/// free preview. An account with no debt is trivially healthy. The
/// vault's own shares are valued locally; never through a self-call.
pub fn check_account_status(
    env: &Env,
    account: &Address,
    collaterals: &Vec<Address>,
) -> (bool, Symbol) {
    let owed = owed_of(env, account);
    if owed == 0 {
        return (true, Symbol::new(env, "ok"));
    }

    let oracle = PriceOracleClient::new(env, &oracle(env));
    let underlying: Address = env
        .storage()
        .persistent()
        .get(&DataKey::UnderlyingAsset)
        .expect("underlying asset missing");
    let reference = reference_asset(env);

    let debt_value = oracle.get_quote(&owed, &underlying, &reference);

    let this = env.current_contract_address();
    let mut collateral_value: u128 = 0;
    for vault in collaterals.iter() {
        let factor = collateral_factor(env, &vault);
        if factor == 0 {
            continue;
        }
        let (assets, asset_addr) = if vault == this {
            let balance = share_balance(env, account);
            (shares::to_assets_down(env, balance), underlying.clone())
        } else {
            let peer = CollateralVaultClient::new(env, &vault);
            let balance = peer.balance(account);
            (peer.convert_to_assets(&balance), peer.asset())
        };
        if assets == 0 {
            continue;
        }
        let value = oracle.get_quote(&assets, &asset_addr, &reference);
        let discounted = mul_div_floor(value, factor, SCALE_1E6);
        collateral_value = collateral_value.saturating_add(discounted);
    }

    if collateral_value >= debt_value {
        (true, Symbol::new(env, "ok"))
    } else {
        (false, Symbol::new(env, "unhealthy"))
    }
}
