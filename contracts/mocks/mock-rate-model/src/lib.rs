#![no_std]
//! Settable interest rate model for tests. The mutating entry rejects any
//! vault other than the configured one and counts its calls; the failure
//! switch makes both entries trap so the accrual fallback can be
//! exercised.

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env};

#[contracttype]
pub enum DataKey {
    Vault,
    RatePerSecond,
    Failing,
    Calls,
}

#[contract]
pub struct MockRateModel;

#[contractimpl]
impl MockRateModel {
    pub fn initialize(env: Env, vault: Address, rate_per_second: u128) {
        if env
            .storage()
            .persistent()
            .get::<_, Address>(&DataKey::Vault)
            .is_some()
        {
            panic!("already initialized");
        }
        env.storage().persistent().set(&DataKey::Vault, &vault);
        env.storage()
            .persistent()
            .set(&DataKey::RatePerSecond, &rate_per_second);
        env.storage().persistent().set(&DataKey::Failing, &false);
        env.storage().persistent().set(&DataKey::Calls, &0u32);
    }

    pub fn set_rate(env: Env, rate_per_second: u128) {
        env.storage()
            .persistent()
            .set(&DataKey::RatePerSecond, &rate_per_second);
    }

    pub fn set_failing(env: Env, failing: bool) {
        env.storage().persistent().set(&DataKey::Failing, &failing);
    }

    pub fn get_calls(env: Env) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::Calls)
            .unwrap_or(0u32)
    }

    pub fn compute_interest_rate(env: Env, vault: Address, _cash: u128, _borrows: u128) -> u128 {
        let configured: Address = env
            .storage()
            .persistent()
            .get(&DataKey::Vault)
            .expect("model not initialized");
        if vault != configured {
            panic!("unauthorized model caller");
        }
        if is_failing(&env) {
            panic!("model failure");
        }
        let calls = Self::get_calls(env.clone());
        env.storage()
            .persistent()
            .set(&DataKey::Calls, &(calls + 1));
        rate(&env)
    }

    pub fn compute_interest_rate_view(
        env: Env,
        _vault: Address,
        _cash: u128,
        _borrows: u128,
    ) -> u128 {
        if is_failing(&env) {
            panic!("model failure");
        }
        rate(&env)
    }
}

fn is_failing(env: &Env) -> bool {
    env.storage()
        .persistent()
        .get(&DataKey::Failing)
        .unwrap_or(false)
}

fn rate(env: &Env) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::RatePerSecond)
        .unwrap_or(0u128)
}
