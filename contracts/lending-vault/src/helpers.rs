use soroban_sdk::{Address, Env, IntoVal, Symbol};

use crate::events::ExternalCallFailed;

/// a * b / denom rounded down. Factors are reduced by gcd with the
/// denominator before multiplying so that intermediate products stay in
/// u128 range for any realistic ledger amounts.
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> u128 {
    if denom == 0 {
        panic!("division by zero");
    }
    let (a, b, denom) = reduce(a, b, denom);
    let numerator = a.checked_mul(b).unwrap_or_else(|| panic!("math overflow"));
    numerator / denom
}

/// a * b / denom rounded up.
pub fn mul_div_ceil(a: u128, b: u128, denom: u128) -> u128 {
    if denom == 0 {
        panic!("division by zero");
    }
    let (ra, rb, rdenom) = reduce(a, b, denom);
    let numerator = ra
        .checked_mul(rb)
        .unwrap_or_else(|| panic!("math overflow"));
    let floor = numerator / rdenom;
    if numerator % rdenom == 0 {
        floor
    } else {
        floor + 1
    }
}

fn reduce(mut a: u128, mut b: u128, mut denom: u128) -> (u128, u128, u128) {
    let g1 = gcd_u128(a, denom);
    if g1 > 1 {
        a /= g1;
        denom /= g1;
    }
    let g2 = gcd_u128(b, denom);
    if g2 > 1 {
        b /= g2;
        denom /= g2;
    }
    (a, b, denom)
}

fn gcd_u128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

pub fn to_i128(amount: u128) -> i128 {
    if amount > i128::MAX as u128 {
        panic!("amount exceeds i128");
    }
    amount as i128
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CallErrorKind {
    ContractRevert,
    HostError,
}

impl CallErrorKind {
    pub fn as_code(&self) -> u32 {
        match self {
            CallErrorKind::ContractRevert => 0,
            CallErrorKind::HostError => 1,
        }
    }
}

pub(crate) struct CallError {
    pub function: Symbol,
    pub kind: CallErrorKind,
}

pub(crate) fn emit_external_call_failure(
    env: &Env,
    contract: &Address,
    error: &CallError,
    recoverable: bool,
) {
    ExternalCallFailed {
        contract: contract.clone(),
        function: error.function.clone(),
        recoverable,
        failure_kind: error.kind.as_code(),
    }
    .publish(env);
}

/// Invoke an external contract, surfacing failure as a value instead of
/// trapping. Used where a collaborator error must not abort the operation.
pub(crate) fn try_call_contract<T, A>(
    env: &Env,
    contract: &Address,
    func: &str,
    args: A,
) -> Result<T, CallError>
where
    T: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>,
    A: IntoVal<Env, soroban_sdk::Vec<soroban_sdk::Val>>,
{
    use soroban_sdk::{InvokeError, Val, Vec};
    let symbol = Symbol::new(env, func);
    let args_val: Vec<Val> = args.into_val(env);
    match env.try_invoke_contract::<T, InvokeError>(contract, &symbol, args_val) {
        Ok(Ok(val)) => Ok(val),
        Ok(Err(_)) => Err(CallError {
            function: symbol,
            kind: CallErrorKind::ContractRevert,
        }),
        Err(Ok(_)) | Err(Err(_)) => Err(CallError {
            function: symbol,
            kind: CallErrorKind::HostError,
        }),
    }
}

pub(crate) fn call_contract_or_panic<T, A>(
    env: &Env,
    contract: &Address,
    func: &str,
    args: A,
) -> T
where
    T: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>,
    A: IntoVal<Env, soroban_sdk::Vec<soroban_sdk::Val>>,
{
    match try_call_contract(env, contract, func, args) {
        Ok(val) => val,
        Err(err) => {
            emit_external_call_failure(env, contract, &err, false);
            panic!("{} call failed", func);
        }
    }
}
