#![no_std]
//! Settable price oracle for tests. Rates are quoted per unit of the base
//! asset, scaled 1e18; a configured pair answers the inverse direction
//! automatically.

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env};

const RATE_SCALE_1E18: u128 = 1_000_000_000_000_000_000u128;

#[contracttype]
pub enum DataKey {
    Rate(Address, Address),
}

#[contract]
pub struct MockOracle;

#[contractimpl]
impl MockOracle {
    /// Quote `amount` of `base` at `rate / 1e18` units of `quote`.
    pub fn set_rate(env: Env, base: Address, quote: Address, rate: u128) {
        env.storage()
            .persistent()
            .set(&DataKey::Rate(base, quote), &rate);
    }

    pub fn get_quote(env: Env, amount: u128, base: Address, quote: Address) -> u128 {
        if base == quote {
            return amount;
        }
        if let Some(rate) = env
            .storage()
            .persistent()
            .get::<_, u128>(&DataKey::Rate(base.clone(), quote.clone()))
        {
            return amount
                .checked_mul(rate)
                .expect("quote overflow")
                / RATE_SCALE_1E18;
        }
        if let Some(rate) = env
            .storage()
            .persistent()
            .get::<_, u128>(&DataKey::Rate(quote, base))
        {
            if rate == 0 {
                panic!("unsupported pair");
            }
            return amount
                .checked_mul(RATE_SCALE_1E18)
                .expect("quote overflow")
                / rate;
        }
        panic!("unsupported pair");
    }

    pub fn get_quotes(env: Env, amount: u128, base: Address, quote: Address) -> (u128, u128) {
        let out = Self::get_quote(env, amount, base, quote);
        (out, out)
    }
}
