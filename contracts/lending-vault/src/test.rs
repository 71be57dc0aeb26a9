#![cfg(test)]

use super::*;
use mock_connector::{BatchItem, MockConnector, MockConnectorClient, VaultOp};
use mock_oracle::{MockOracle, MockOracleClient};
use mock_rate_model::{MockRateModel, MockRateModelClient};
use soroban_sdk::testutils::{Address as _, Ledger};
use soroban_sdk::{
    contract, contractimpl, contracttype, token, Address, Bytes, Env, String, Vec,
};

use crate::constants::{INDEX_SCALE_1E18, SECONDS_PER_YEAR};

struct Protocol {
    admin: Address,
    connector: Address,
    oracle: Address,
    model_a: Address,
    model_b: Address,
    token_a: Address,
    token_b: Address,
    reference: Address,
    vault_a: Address,
    vault_b: Address,
}

fn create_test_token(env: &Env, admin: &Address) -> Address {
    env.register_stellar_asset_contract_v2(admin.clone())
        .address()
}

fn mint_token(env: &Env, token: &Address, to: &Address, amount: u128) {
    token::StellarAssetClient::new(env, token).mint(to, &(amount as i128));
}

fn token_balance(env: &Env, token: &Address, who: &Address) -> i128 {
    token::Client::new(env, token).balance(who)
}

/// Two vaults sharing one connector and oracle: vault A accepts its own
/// shares as collateral at 0.95, vault B counts A-shares at 0.50. TKA is
/// worth 1.00 reference units, TKB 0.01.
fn setup_protocol(env: &Env) -> Protocol {
    env.mock_all_auths();
    let admin = Address::generate(env);
    let token_a = create_test_token(env, &admin);
    let token_b = create_test_token(env, &admin);
    let reference = Address::generate(env);

    let connector = env.register(MockConnector, ());
    let oracle = env.register(MockOracle, ());

    let model_a = env.register(MockRateModel, ());
    let vault_a = env.register(LendingVault, ());
    MockRateModelClient::new(env, &model_a).initialize(&vault_a, &0u128);
    LendingVaultClient::new(env, &vault_a).initialize(
        &admin,
        &connector,
        &token_a,
        &oracle,
        &model_a,
        &reference,
        &String::from_str(env, "Pooled TKA"),
        &String::from_str(env, "pTKA"),
    );

    let model_b = env.register(MockRateModel, ());
    let vault_b = env.register(LendingVault, ());
    MockRateModelClient::new(env, &model_b).initialize(&vault_b, &0u128);
    LendingVaultClient::new(env, &vault_b).initialize(
        &admin,
        &connector,
        &token_b,
        &oracle,
        &model_b,
        &reference,
        &String::from_str(env, "Pooled TKB"),
        &String::from_str(env, "pTKB"),
    );

    let oracle_client = MockOracleClient::new(env, &oracle);
    oracle_client.set_rate(&token_a, &reference, &INDEX_SCALE_1E18);
    oracle_client.set_rate(&token_b, &reference, &(INDEX_SCALE_1E18 / 100));

    LendingVaultClient::new(env, &vault_a).set_collateral_factor(&vault_a, &950_000u128);
    LendingVaultClient::new(env, &vault_b).set_collateral_factor(&vault_a, &500_000u128);

    Protocol {
        admin,
        connector,
        oracle,
        model_a,
        model_b,
        token_a,
        token_b,
        reference,
        vault_a,
        vault_b,
    }
}

fn item(vault: &Address, account: &Address, op: VaultOp) -> BatchItem {
    BatchItem {
        vault: vault.clone(),
        account: account.clone(),
        op,
    }
}

fn run(env: &Env, p: &Protocol, account: &Address, vault: &Address, op: VaultOp) {
    MockConnectorClient::new(env, &p.connector).execute(account, &item(vault, account, op));
}

fn run_batch(env: &Env, p: &Protocol, account: &Address, items: Vec<BatchItem>) {
    MockConnectorClient::new(env, &p.connector).batch(account, &items);
}

/// Outside lender so vault B always has cash to borrow against.
fn seed_b_liquidity(env: &Env, p: &Protocol, amount: u128) -> Address {
    let lender = Address::generate(env);
    mint_token(env, &p.token_b, &lender, amount);
    run(
        env,
        p,
        &lender,
        &p.vault_b,
        VaultOp::Deposit(amount, lender.clone()),
    );
    lender
}

/// Account with `deposit` TKA supplied to vault A, enabled as collateral,
/// with vault B enabled as controller.
fn setup_borrower(env: &Env, p: &Protocol, deposit: u128) -> Address {
    let user = Address::generate(env);
    mint_token(env, &p.token_a, &user, deposit);
    run(
        env,
        p,
        &user,
        &p.vault_a,
        VaultOp::Deposit(deposit, user.clone()),
    );
    let connector = MockConnectorClient::new(env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_b);
    user
}

#[contracttype]
#[derive(Clone)]
enum ReceiverDataKey {
    Underlying,
}

#[contract]
pub struct FlashLoanRepayer;

#[contractimpl]
impl FlashLoanRepayer {
    pub fn configure(env: Env, underlying: Address) {
        env.storage()
            .persistent()
            .set(&ReceiverDataKey::Underlying, &underlying);
    }

    pub fn on_flash_loan(env: Env, vault: Address, amount: u128, fee: u128, _data: Bytes) {
        let token_address: Address = env
            .storage()
            .persistent()
            .get(&ReceiverDataKey::Underlying)
            .expect("underlying not set");
        token::Client::new(&env, &token_address).transfer(
            &env.current_contract_address(),
            &vault,
            &((amount + fee) as i128),
        );
    }
}

#[contract]
pub struct FlashLoanRenegade;

#[contractimpl]
impl FlashLoanRenegade {
    pub fn configure(env: Env, underlying: Address) {
        env.storage()
            .persistent()
            .set(&ReceiverDataKey::Underlying, &underlying);
    }

    pub fn on_flash_loan(env: Env, vault: Address, amount: u128, _fee: u128, _data: Bytes) {
        let token_address: Address = env
            .storage()
            .persistent()
            .get(&ReceiverDataKey::Underlying)
            .expect("underlying not set");
        token::Client::new(&env, &token_address).transfer(
            &env.current_contract_address(),
            &vault,
            &((amount - 1) as i128),
        );
    }
}

#[test]
fn test_initialize() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);

    assert_eq!(vault.asset(), p.token_a);
    assert_eq!(vault.total_assets(), 0u128);
    assert_eq!(vault.total_shares(), 0u128);
    assert_eq!(vault.get_cash(), 0u128);
    assert_eq!(vault.get_interest_accumulator(), INDEX_SCALE_1E18);
    assert_eq!(vault.get_admin(), p.admin);
    assert_eq!(vault.get_connector(), p.connector);
    assert_eq!(vault.get_oracle(), p.oracle);
    assert_eq!(vault.get_rate_model(), p.model_a);
    assert_eq!(vault.get_reference_asset(), p.reference);
    assert_eq!(vault.get_liquidation_discount(), 100_000u128);
    assert_eq!(vault.get_collateral_factor(&p.vault_a), 950_000u128);
}

#[test]
#[should_panic(expected = "already initialized")]
fn test_initialize_twice() {
    let env = Env::default();
    let p = setup_protocol(&env);
    LendingVaultClient::new(&env, &p.vault_a).initialize(
        &p.admin,
        &p.connector,
        &p.token_a,
        &p.oracle,
        &p.model_a,
        &p.reference,
        &String::from_str(&env, "Pooled TKA"),
        &String::from_str(&env, "pTKA"),
    );
}

#[test]
fn test_deposit_withdraw_exact_accounting() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);

    let user1 = Address::generate(&env);
    let user2 = Address::generate(&env);
    mint_token(&env, &p.token_a, &user1, 1000);
    mint_token(&env, &p.token_a, &user2, 1000);

    run(&env, &p, &user1, &p.vault_a, VaultOp::Deposit(200, user1.clone()));
    run(&env, &p, &user2, &p.vault_a, VaultOp::Deposit(150, user2.clone()));

    assert_eq!(vault.balance(&user1), 200u128);
    assert_eq!(vault.balance(&user2), 150u128);
    assert_eq!(vault.total_shares(), 350u128);
    assert_eq!(
        vault.total_shares(),
        vault.balance(&user1) + vault.balance(&user2)
    );
    assert_eq!(vault.total_assets(), 350u128);
    assert_eq!(token_balance(&env, &p.token_a, &p.vault_a), 350i128);
    assert_eq!(token_balance(&env, &p.token_a, &user1), 800i128);

    run(&env, &p, &user1, &p.vault_a, VaultOp::Withdraw(50, user1.clone()));
    assert_eq!(vault.balance(&user1), 150u128);
    assert_eq!(vault.total_assets(), 300u128);

    run(&env, &p, &user1, &p.vault_a, VaultOp::Withdraw(150, user1.clone()));
    run(&env, &p, &user2, &p.vault_a, VaultOp::Redeem(150, user2.clone()));

    // Sum of deposits minus sum of withdrawals, exactly.
    assert_eq!(vault.total_shares(), 0u128);
    assert_eq!(vault.total_assets(), 0u128);
    assert_eq!(token_balance(&env, &p.token_a, &user1), 1000i128);
    assert_eq!(token_balance(&env, &p.token_a, &user2), 1000i128);
}

#[test]
#[should_panic(expected = "zero amount")]
fn test_deposit_zero_amount() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let user = Address::generate(&env);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(0, user.clone()));
}

/// Drive the exchange rate well above 1:1 by letting a self-
/// collateralized borrow accrue a year of interest at the rate cap.
fn setup_appreciated_vault(env: &Env, p: &Protocol) -> Address {
    let user = Address::generate(env);
    mint_token(env, &p.token_a, &user, 1000);
    run(env, p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    let connector = MockConnectorClient::new(env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);
    run(env, p, &user, &p.vault_a, VaultOp::Borrow(50, user.clone()));

    let max_rate = 5 * INDEX_SCALE_1E18 / SECONDS_PER_YEAR;
    MockRateModelClient::new(env, &p.model_a).set_rate(&max_rate);
    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + SECONDS_PER_YEAR as u64);
    // Any debt-touching operation accrues first; repaying one unit does.
    run(env, p, &user, &p.vault_a, VaultOp::Repay(1, user.clone()));
    user
}

#[test]
fn test_round_trip_conversion_law() {
    let env = Env::default();
    let p = setup_protocol(&env);
    setup_appreciated_vault(&env, &p);
    let vault = LendingVaultClient::new(&env, &p.vault_a);

    assert!(vault.total_assets() > vault.total_shares());
    for x in [3u128, 77, 1_000, 123_456] {
        let shares = vault.convert_to_shares(&x);
        assert!(vault.convert_to_assets(&shares) <= x);
    }
    for y in [5u128, 99, 10_000] {
        let assets = vault.convert_to_assets(&y);
        assert!(vault.convert_to_shares(&assets) <= y);
    }
}

#[test]
#[should_panic(expected = "zero shares")]
fn test_deposit_rounding_to_zero_shares() {
    let env = Env::default();
    let p = setup_protocol(&env);
    setup_appreciated_vault(&env, &p);

    // One asset unit is now worth less than one share.
    let depositor = Address::generate(&env);
    mint_token(&env, &p.token_a, &depositor, 10);
    run(
        &env,
        &p,
        &depositor,
        &p.vault_a,
        VaultOp::Deposit(1, depositor.clone()),
    );
}

#[test]
fn test_interest_accumulator_monotonic() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let user = setup_appreciated_vault(&env, &p);
    let vault = LendingVaultClient::new(&env, &p.vault_a);

    let acc1 = vault.get_interest_accumulator();
    assert!(acc1 > INDEX_SCALE_1E18);

    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + 30 * 24 * 60 * 60);
    run(&env, &p, &user, &p.vault_a, VaultOp::Repay(1, user.clone()));
    let acc2 = vault.get_interest_accumulator();
    assert!(acc2 >= acc1);

    // A rate of zero still never moves the accumulator backwards.
    MockRateModelClient::new(&env, &p.model_a).set_rate(&0u128);
    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + 30 * 24 * 60 * 60);
    run(&env, &p, &user, &p.vault_a, VaultOp::Repay(1, user.clone()));
    let acc3 = vault.get_interest_accumulator();
    assert_eq!(acc3, acc2);
}

#[test]
fn test_total_borrowed_tracks_owed_sum() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);

    let user1 = setup_borrower(&env, &p, 100);
    let user2 = setup_borrower(&env, &p, 100);
    run(&env, &p, &user1, &p.vault_b, VaultOp::Borrow(2000, user1.clone()));
    run(&env, &p, &user2, &p.vault_b, VaultOp::Borrow(3000, user2.clone()));

    MockRateModelClient::new(&env, &p.model_b).set_rate(&1_000_000_000u128);
    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + 30 * 24 * 60 * 60);
    run(&env, &p, &user1, &p.vault_b, VaultOp::Repay(500, user1.clone()));

    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + 30 * 24 * 60 * 60);
    run(&env, &p, &user2, &p.vault_b, VaultOp::Borrow(100, user2.clone()));

    let sum = vault_b.debt_of(&user1) + vault_b.debt_of(&user2);
    let total = vault_b.get_total_borrowed();
    let drift = if sum > total { sum - total } else { total - sum };
    // One unit of rounding tolerance per borrowing account.
    assert!(drift <= 2, "drift {} exceeds tolerance", drift);
    assert!(vault_b.debt_of(&user1) > 1500);
    assert!(vault_b.debt_of(&user2) > 3100);
}

#[test]
fn test_account_unhealthy_after_price_drop() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);

    // 100 TKA collateral at factor 0.50 supports exactly 50 reference
    // units of debt; 5000 TKB at 0.01 sits right on the boundary.
    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(5000, user.clone()));

    let mut collaterals = Vec::new(&env);
    collaterals.push_back(p.vault_a.clone());
    let (healthy, _) = vault_b.check_account_status(&user, &collaterals);
    assert!(healthy);

    // TKA slips 10%: 90 * 0.50 = 45 < 50.
    MockOracleClient::new(&env, &p.oracle).set_rate(
        &p.token_a,
        &p.reference,
        &(INDEX_SCALE_1E18 * 9 / 10),
    );
    let (healthy, _) = vault_b.check_account_status(&user, &collaterals);
    assert!(!healthy);
    // The connector-resolved preview agrees.
    let (healthy, _) = vault_b.account_status(&user);
    assert!(!healthy);
}

#[test]
#[should_panic(expected = "account status violation")]
fn test_borrow_beyond_collateral_rejected() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let user = setup_borrower(&env, &p, 100);
    // 5100 TKB is worth 51 > 50 supported.
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(5100, user.clone()));
}

#[test]
#[should_panic(expected = "controller disabled")]
fn test_borrow_without_controller() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    MockConnectorClient::new(&env, &p.connector).enable_collateral(&user, &p.vault_a);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(100, user.clone()));
}

#[test]
#[should_panic(expected = "zero assets")]
fn test_borrow_zero() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(0, user.clone()));
}

#[test]
#[should_panic(expected = "vault status violation")]
fn test_supply_cap_blocks_growth() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 2000);

    vault.set_supply_cap(&1000u128);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(900, user.clone()));
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(200, user.clone()));
}

#[test]
fn test_supply_cap_allows_shrinking_when_over() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 2000);

    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(1100, user.clone()));
    vault.set_supply_cap(&1000u128);
    // Still above the cap afterwards, but the batch shrank the supply.
    run(&env, &p, &user, &p.vault_a, VaultOp::Withdraw(50, user.clone()));
    assert_eq!(vault.total_assets(), 1050u128);
}

#[test]
#[should_panic(expected = "vault status violation")]
fn test_borrow_cap_blocks_growth() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 500);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(500, user.clone()));
    let connector = MockConnectorClient::new(&env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);

    vault.set_borrow_cap(&100u128);
    run(&env, &p, &user, &p.vault_a, VaultOp::Borrow(150, user.clone()));
}

#[test]
fn test_borrow_cap_allows_repay_when_over() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 500);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(500, user.clone()));
    let connector = MockConnectorClient::new(&env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);

    run(&env, &p, &user, &p.vault_a, VaultOp::Borrow(90, user.clone()));
    vault.set_borrow_cap(&50u128);
    run(&env, &p, &user, &p.vault_a, VaultOp::Repay(10, user.clone()));
    assert_eq!(vault.get_total_borrowed(), 80u128);
}

#[test]
#[should_panic(expected = "insufficient cash")]
fn test_withdraw_cannot_exceed_cash() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    let connector = MockConnectorClient::new(&env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);
    run(&env, &p, &user, &p.vault_a, VaultOp::Borrow(60, user.clone()));

    // 40 cash left; the 100 shares cannot redeem past what is held.
    run(&env, &p, &user, &p.vault_a, VaultOp::Withdraw(50, user.clone()));
}

#[test]
fn test_max_withdraw_limited_by_cash() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    let connector = MockConnectorClient::new(&env, &p.connector);
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);
    run(&env, &p, &user, &p.vault_a, VaultOp::Borrow(60, user.clone()));

    assert_eq!(vault.max_withdraw(&user), 40u128);
    assert_eq!(vault.max_redeem(&user), 40u128);
}

#[test]
fn test_liquidation_moves_debt_and_collateral() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_a = LendingVaultClient::new(&env, &p.vault_a);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);
    let connector = MockConnectorClient::new(&env, &p.connector);

    let violator = setup_borrower(&env, &p, 100);
    run(
        &env,
        &p,
        &violator,
        &p.vault_b,
        VaultOp::Borrow(5000, violator.clone()),
    );

    // Liquidator keeps its own healthy position in A.
    let liquidator = setup_borrower(&env, &p, 100);

    // TKA slips to 0.90: violator collateral 100 * 0.9 * 0.5 = 45 < 50.
    MockOracleClient::new(&env, &p.oracle).set_rate(
        &p.token_a,
        &p.reference,
        &(INDEX_SCALE_1E18 * 9 / 10),
    );

    let shares_before = vault_a.total_shares();
    let borrowed_before = vault_b.get_total_borrowed();

    run(
        &env,
        &p,
        &liquidator,
        &p.vault_b,
        VaultOp::Liquidate(violator.clone(), p.vault_a.clone(), 2000),
    );

    // Debt moved, not created or destroyed.
    assert_eq!(vault_b.debt_of(&violator), 3000u128);
    assert_eq!(vault_b.debt_of(&liquidator), 2000u128);
    assert_eq!(vault_b.get_total_borrowed(), borrowed_before);

    // repay value 20, discount 10% -> seize value 22, at 0.90 -> 24 shares.
    assert_eq!(vault_a.balance(&violator), 76u128);
    assert_eq!(vault_a.balance(&liquidator), 124u128);
    // Ownership moved, nothing minted or burned.
    assert_eq!(vault_a.total_shares(), shares_before);

    // Violator still owes, so vault B stays its controller.
    assert_eq!(connector.get_controllers(&violator).len(), 1);
}

#[test]
#[should_panic(expected = "violator healthy")]
fn test_liquidate_healthy_account() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);

    let violator = setup_borrower(&env, &p, 100);
    run(
        &env,
        &p,
        &violator,
        &p.vault_b,
        VaultOp::Borrow(3000, violator.clone()),
    );
    let liquidator = setup_borrower(&env, &p, 100);
    run(
        &env,
        &p,
        &liquidator,
        &p.vault_b,
        VaultOp::Liquidate(violator.clone(), p.vault_a.clone(), 1000),
    );
}

#[test]
#[should_panic(expected = "zero amount")]
fn test_liquidate_zero_amount() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let violator = setup_borrower(&env, &p, 100);
    let liquidator = setup_borrower(&env, &p, 100);
    run(
        &env,
        &p,
        &liquidator,
        &p.vault_b,
        VaultOp::Liquidate(violator.clone(), p.vault_a.clone(), 0),
    );
}

#[test]
fn test_flash_loan_repaid_with_fee() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 500);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(500, user.clone()));

    vault.set_flash_loan_fee(&10_000u128); // 1%

    let receiver = env.register(FlashLoanRepayer, ());
    FlashLoanRepayerClient::new(&env, &receiver).configure(&p.token_a);
    mint_token(&env, &p.token_a, &receiver, 2);

    vault.flash_loan(&receiver, &200u128, &Bytes::new(&env));

    // Fee accrues to the pool.
    assert_eq!(vault.get_cash(), 502u128);
    assert_eq!(vault.total_assets(), 502u128);
    assert_eq!(token_balance(&env, &p.token_a, &p.vault_a), 502i128);
}

#[test]
#[should_panic(expected = "flash loan not repaid")]
fn test_flash_loan_not_repaid() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 500);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(500, user.clone()));

    let receiver = env.register(FlashLoanRenegade, ());
    FlashLoanRenegadeClient::new(&env, &receiver).configure(&p.token_a);

    vault.flash_loan(&receiver, &200u128, &Bytes::new(&env));
}

#[test]
fn test_deferred_checks_span_the_batch() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_a = LendingVaultClient::new(&env, &p.vault_a);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);
    let connector = MockConnectorClient::new(&env, &p.connector);

    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(3000, user.clone()));

    // Withdrawing 60 first leaves 40 * 0.5 = 20 backing a debt worth 30:
    // transiently unhealthy, but the repay in the same batch clears the
    // debt before any check is evaluated.
    let mut items = Vec::new(&env);
    items.push_back(item(&p.vault_a, &user, VaultOp::Withdraw(60, user.clone())));
    items.push_back(item(&p.vault_b, &user, VaultOp::Repay(3000, user.clone())));
    run_batch(&env, &p, &user, items);

    assert_eq!(vault_b.debt_of(&user), 0u128);
    assert_eq!(vault_a.balance(&user), 40u128);
    // Zero debt released the controller relationship.
    assert_eq!(connector.get_controllers(&user).len(), 0);
}

#[test]
#[should_panic(expected = "account status violation")]
fn test_deferred_check_fails_on_final_state() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);

    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(3000, user.clone()));

    // Same withdrawal without the repay: the final state is unhealthy.
    run(&env, &p, &user, &p.vault_a, VaultOp::Withdraw(60, user.clone()));
}

#[test]
fn test_wind_and_unwind() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let connector = MockConnectorClient::new(&env, &p.connector);

    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(50, user.clone()));
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);

    // Borrow-and-deposit with no token movement.
    run(&env, &p, &user, &p.vault_a, VaultOp::Wind(100));
    assert_eq!(vault.balance(&user), 150u128);
    assert_eq!(vault.debt_of(&user), 100u128);
    assert_eq!(vault.get_cash(), 50u128);
    assert_eq!(vault.total_assets(), 150u128);
    assert_eq!(token_balance(&env, &p.token_a, &p.vault_a), 50i128);

    // Unwind clamps to the amount owed and retires debt and shares.
    run(&env, &p, &user, &p.vault_a, VaultOp::Unwind(200));
    assert_eq!(vault.balance(&user), 50u128);
    assert_eq!(vault.debt_of(&user), 0u128);
    assert_eq!(vault.total_assets(), 50u128);
    assert_eq!(connector.get_controllers(&user).len(), 0);
}

#[test]
fn test_pull_debt_moves_obligation() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);
    let connector = MockConnectorClient::new(&env, &p.connector);

    let user1 = setup_borrower(&env, &p, 100);
    run(&env, &p, &user1, &p.vault_b, VaultOp::Borrow(1000, user1.clone()));

    let user2 = setup_borrower(&env, &p, 200);
    run(
        &env,
        &p,
        &user2,
        &p.vault_b,
        VaultOp::PullDebt(user1.clone(), 1000),
    );

    assert_eq!(vault_b.debt_of(&user1), 0u128);
    assert_eq!(vault_b.debt_of(&user2), 1000u128);
    assert_eq!(vault_b.get_total_borrowed(), 1000u128);
    // Source account cleared its debt; its controller was released.
    assert_eq!(connector.get_controllers(&user1).len(), 0);
    assert_eq!(connector.get_controllers(&user2).len(), 1);
}

#[test]
fn test_repay_clamps_and_releases_controller() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_b = LendingVaultClient::new(&env, &p.vault_b);
    let connector = MockConnectorClient::new(&env, &p.connector);

    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(2000, user.clone()));
    mint_token(&env, &p.token_b, &user, 1000);

    // Overpay attempt only settles what is owed.
    run(&env, &p, &user, &p.vault_b, VaultOp::Repay(3000, user.clone()));
    assert_eq!(vault_b.debt_of(&user), 0u128);
    assert_eq!(vault_b.get_total_borrowed(), 0u128);
    assert_eq!(token_balance(&env, &p.token_b, &user), 1000i128);
    assert_eq!(connector.get_controllers(&user).len(), 0);
}

#[test]
fn test_rate_model_failure_does_not_block_operations() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);
    let connector = MockConnectorClient::new(&env, &p.connector);
    let model = MockRateModelClient::new(&env, &p.model_a);

    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 1000);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    connector.enable_collateral(&user, &p.vault_a);
    connector.enable_controller(&user, &p.vault_a);

    // Cache a live rate (the flush quote stores it), then break the model.
    model.set_rate(&1_000_000_000_000u128);
    run(&env, &p, &user, &p.vault_a, VaultOp::Borrow(50, user.clone()));
    model.set_failing(&true);

    let now = env.ledger().timestamp();
    env.ledger().set_timestamp(now + 10 * 24 * 60 * 60);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(10, user.clone()));

    // Accrual proceeded on the cached rate instead of trapping.
    assert!(vault.get_interest_accumulator() > INDEX_SCALE_1E18);
    assert!(vault.debt_of(&user) > 50u128);
}

#[test]
fn test_mutating_rate_quote_runs_at_flush() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let model = MockRateModelClient::new(&env, &p.model_a);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);

    assert_eq!(model.get_calls(), 0u32);
    run(&env, &p, &user, &p.vault_a, VaultOp::Deposit(100, user.clone()));
    // Exactly one vault-status check per batch.
    assert_eq!(model.get_calls(), 1u32);
}

#[test]
fn test_transfer_with_debt_is_checked() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);
    let vault_a = LendingVaultClient::new(&env, &p.vault_a);

    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(3000, user.clone()));

    let friend = Address::generate(&env);
    // 80 * 0.5 = 40 still covers a debt worth 30.
    run(
        &env,
        &p,
        &user,
        &p.vault_a,
        VaultOp::Transfer(friend.clone(), 20),
    );
    assert_eq!(vault_a.balance(&user), 80u128);
    assert_eq!(vault_a.balance(&friend), 20u128);
}

#[test]
#[should_panic(expected = "account status violation")]
fn test_transfer_breaking_health_rejected() {
    let env = Env::default();
    let p = setup_protocol(&env);
    seed_b_liquidity(&env, &p, 1_000_000);

    let user = setup_borrower(&env, &p, 100);
    run(&env, &p, &user, &p.vault_b, VaultOp::Borrow(3000, user.clone()));

    let friend = Address::generate(&env);
    // 40 * 0.5 = 20 cannot back a debt worth 30.
    run(
        &env,
        &p,
        &user,
        &p.vault_a,
        VaultOp::Transfer(friend.clone(), 60),
    );
}

#[test]
fn test_approve_and_transfer_from() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let vault = LendingVaultClient::new(&env, &p.vault_a);

    let owner = Address::generate(&env);
    let spender = Address::generate(&env);
    mint_token(&env, &p.token_a, &owner, 100);
    run(&env, &p, &owner, &p.vault_a, VaultOp::Deposit(100, owner.clone()));

    run(
        &env,
        &p,
        &owner,
        &p.vault_a,
        VaultOp::Approve(spender.clone(), 50),
    );
    assert_eq!(vault.allowance(&owner, &spender), 50u128);

    run(
        &env,
        &p,
        &spender,
        &p.vault_a,
        VaultOp::TransferFrom(owner.clone(), spender.clone(), 50),
    );
    assert_eq!(vault.balance(&owner), 50u128);
    assert_eq!(vault.balance(&spender), 50u128);
    assert_eq!(vault.allowance(&owner, &spender), 0u128);
}

#[test]
#[should_panic]
fn test_mutations_require_connector() {
    let env = Env::default();
    let p = setup_protocol(&env);
    let user = Address::generate(&env);
    mint_token(&env, &p.token_a, &user, 100);

    // Bypassing the connector leaves its authorization unsatisfied.
    env.mock_auths(&[]);
    let ctx = OpContext {
        on_behalf_of: user.clone(),
        controller_enabled: false,
        collaterals: Vec::new(&env),
    };
    LendingVaultClient::new(&env, &p.vault_a).deposit(&ctx, &100u128, &user);
}

#[test]
#[should_panic]
fn test_cap_setter_requires_admin() {
    let env = Env::default();
    let p = setup_protocol(&env);
    // With no authorizations mocked, the stored admin cannot sign off.
    env.mock_auths(&[]);
    LendingVaultClient::new(&env, &p.vault_a).set_supply_cap(&1000u128);
}
