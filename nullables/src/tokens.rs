//! Nullable token economy — balances and escrow in memory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use dyad_external::{ExternalError, TokenEconomy};
use dyad_types::{TokenAmount, UserId};

/// One effective (non-duplicate) call, recorded in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenCall {
    Escrow { user: UserId, amount: TokenAmount, reference: String },
    Release { user: UserId, amount: TokenAmount, reference: String },
    Burn { amount: TokenAmount, reference: String },
}

#[derive(Debug, Default)]
struct State {
    balances: HashMap<UserId, TokenAmount>,
    escrowed: TokenAmount,
    burned: TokenAmount,
    seen: HashSet<String>,
    calls: Vec<TokenCall>,
    fail_next: Option<ExternalError>,
}

/// In-memory token economy. References are idempotency keys: a repeated
/// reference succeeds without moving funds again.
#[derive(Debug, Default)]
pub struct NullTokens {
    state: Mutex<State>,
}

impl NullTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&self, user: &UserId, amount: u128) {
        let mut state = self.state.lock().unwrap();
        let balance = state.balances.entry(user.clone()).or_default();
        *balance = TokenAmount::new(balance.raw() + amount);
    }

    pub fn balance(&self, user: &UserId) -> TokenAmount {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(user)
            .copied()
            .unwrap_or_default()
    }

    pub fn escrowed(&self) -> TokenAmount {
        self.state.lock().unwrap().escrowed
    }

    pub fn burned(&self) -> TokenAmount {
        self.state.lock().unwrap().burned
    }

    pub fn calls(&self) -> Vec<TokenCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Fail the next call (of any kind) with `error`.
    pub fn fail_next(&self, error: ExternalError) {
        self.state.lock().unwrap().fail_next = Some(error);
    }

    fn take_failure(state: &mut State) -> Result<(), ExternalError> {
        match state.fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl TokenEconomy for NullTokens {
    fn escrow(&self, user: &UserId, amount: TokenAmount, reference: &str) -> Result<(), ExternalError> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        if state.seen.contains(reference) {
            return Ok(());
        }
        let available = state.balances.get(user).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or(ExternalError::InsufficientFunds { needed: amount, available })?;
        state.balances.insert(user.clone(), remaining);
        state.escrowed = TokenAmount::new(state.escrowed.raw() + amount.raw());
        state.seen.insert(reference.to_string());
        state.calls.push(TokenCall::Escrow {
            user: user.clone(),
            amount,
            reference: reference.to_string(),
        });
        Ok(())
    }

    fn release(&self, user: &UserId, amount: TokenAmount, reference: &str) -> Result<(), ExternalError> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        if state.seen.contains(reference) {
            return Ok(());
        }
        let escrowed = state
            .escrowed
            .checked_sub(amount)
            .ok_or_else(|| ExternalError::Rejected(format!("escrow underflow releasing {amount}")))?;
        state.escrowed = escrowed;
        let balance = state.balances.entry(user.clone()).or_default();
        *balance = TokenAmount::new(balance.raw() + amount.raw());
        state.seen.insert(reference.to_string());
        state.calls.push(TokenCall::Release {
            user: user.clone(),
            amount,
            reference: reference.to_string(),
        });
        Ok(())
    }

    fn burn(&self, amount: TokenAmount, reference: &str) -> Result<(), ExternalError> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        if state.seen.contains(reference) {
            return Ok(());
        }
        let escrowed = state
            .escrowed
            .checked_sub(amount)
            .ok_or_else(|| ExternalError::Rejected(format!("escrow underflow burning {amount}")))?;
        state.escrowed = escrowed;
        state.burned = TokenAmount::new(state.burned.raw() + amount.raw());
        state.seen.insert(reference.to_string());
        state.calls.push(TokenCall::Burn {
            amount,
            reference: reference.to_string(),
        });
        Ok(())
    }
}
