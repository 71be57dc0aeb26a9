#![no_std]

mod constants;
mod contract;
mod debt;
mod events;
mod health;
mod helpers;
mod interest;
mod interfaces;
mod liquidation;
mod shares;
mod status;
mod storage;

pub use contract::{LendingVault, LendingVaultClient};
pub use storage::{CheckReport, ControlRequest, DebtSnapshot, HookState, OpContext, VaultSnapshot};

mod test;
