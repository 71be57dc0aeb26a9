use soroban_sdk::{contractevent, Address, Symbol};

/// Emitted when assets enter the pool and shares are minted.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Deposit {
    #[topic]
    pub account: Address,
    pub owner: Address,
    pub assets: u128,
    pub shares: u128,
}

/// Emitted when shares are burned and assets leave the pool.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Withdraw {
    #[topic]
    pub account: Address,
    pub receiver: Address,
    pub assets: u128,
    pub shares: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Borrow {
    #[topic]
    pub account: Address,
    pub receiver: Address,
    pub assets: u128,
    pub account_debt: u128,
    pub total_borrowed: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Repay {
    #[topic]
    pub payer: Address,
    #[topic]
    pub obligor: Address,
    pub assets: u128,
    pub account_debt: u128,
    pub total_borrowed: u128,
}

/// Borrow-and-deposit in one step: debt and shares created together.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wind {
    #[topic]
    pub account: Address,
    pub assets: u128,
    pub shares: u128,
}

/// Repay-and-withdraw in one step: debt and shares retired together.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Unwind {
    #[topic]
    pub account: Address,
    pub assets: u128,
    pub shares: u128,
}

/// Debt moved between accounts without touching the pool.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PullDebt {
    #[topic]
    pub from: Address,
    #[topic]
    pub to: Address,
    pub assets: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Liquidate {
    #[topic]
    pub liquidator: Address,
    #[topic]
    pub violator: Address,
    pub collateral_vault: Address,
    pub repay_assets: u128,
    pub seized_shares: u128,
}

/// Collateral shares moved out of an account under connector authority.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharesSeized {
    #[topic]
    pub from: Address,
    #[topic]
    pub to: Address,
    pub shares: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccrueInterest {
    pub interest_accrued: u128,
    pub interest_accumulator: u128,
    pub total_borrowed: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlashLoan {
    #[topic]
    pub receiver: Address,
    pub amount: u128,
    pub fee_paid: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewSupplyCap {
    pub supply_cap: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewBorrowCap {
    pub borrow_cap: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewCollateralFactor {
    #[topic]
    pub vault: Address,
    pub factor_mantissa: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewLiquidationDiscount {
    pub discount_mantissa: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewFlashLoanFee {
    pub fee_mantissa: u128,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewRateModel {
    #[topic]
    pub model: Address,
}

#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewAdmin {
    #[topic]
    pub admin: Address,
}

/// Records recoverable vs fatal external contract call failures.
#[contractevent]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExternalCallFailed {
    #[topic]
    pub contract: Address,
    #[topic]
    pub function: Symbol,
    pub recoverable: bool,
    pub failure_kind: u32,
}
