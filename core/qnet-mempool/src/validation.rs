//! Transaction validation against account state before mempool admission.

use crate::errors::{MempoolError, MempoolResult};
use qnet_state::state::StateManager;
use qnet_state::transaction::Transaction;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub expected_nonce: Option<u64>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self { is_valid: true, errors: vec![], expected_nonce: None }
    }

    fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }
}

pub trait TxValidator: Send + Sync {
    fn validate(&self, tx: &Transaction) -> MempoolResult<ValidationResult>;
    fn validate_basic(&self, tx: &Transaction) -> ValidationResult;
}

/// Validates structure, gas, and nonce/balance against live account state.
pub struct DefaultValidator {
    state: Arc<StateManager>,
    min_gas_price: u64,
    max_tx_age: Duration,
}

impl DefaultValidator {
    pub fn new(state: Arc<StateManager>, min_gas_price: u64) -> Self {
        Self {
            state,
            min_gas_price,
            max_tx_age: Duration::from_secs(3_600),
        }
    }
}

impl TxValidator for DefaultValidator {
    fn validate(&self, tx: &Transaction) -> MempoolResult<ValidationResult> {
        let mut result = self.validate_basic(tx);
        if !result.is_valid {
            return Ok(result);
        }

        match self.state.get_account(&tx.from) {
            Some(account) => {
                result.expected_nonce = Some(account.nonce);
                if tx.nonce < account.nonce {
                    return Err(MempoolError::NonceTooLow { expected: account.nonce, got: tx.nonce });
                }
                let total_cost = tx.amount + tx.gas_price * tx.gas_limit;
                if account.balance < total_cost {
                    result.add_error(format!(
                        "insufficient balance: need {total_cost}, have {}",
                        account.balance
                    ));
                }
            }
            None => {
                if tx.nonce != 0 {
                    result.expected_nonce = Some(0);
                    result.add_error(format!("new account must start with nonce 0, got {}", tx.nonce));
                }
            }
        }
        Ok(result)
    }

    fn validate_basic(&self, tx: &Transaction) -> ValidationResult {
        let mut result = ValidationResult::success();

        if let Err(e) = tx.validate() {
            result.add_error(e.to_string());
            return result;
        }

        if tx.gas_price < self.min_gas_price {
            result.add_error(format!("gas price too low: minimum {}, got {}", self.min_gas_price, tx.gas_price));
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        if tx.timestamp > now + 300 {
            result.add_error("transaction timestamp too far in the future".to_string());
        } else if now > tx.timestamp && Duration::from_secs(now - tx.timestamp) > self.max_tx_age {
            result.add_error("transaction too old".to_string());
        }

        result
    }
}

/// Structural-only validator, for contexts with no account state to check
/// against (e.g. before a shard's `StateManager` is wired up).
pub struct SimpleValidator {
    min_gas_price: u64,
}

impl SimpleValidator {
    pub fn new(min_gas_price: u64) -> Self {
        Self { min_gas_price }
    }
}

impl TxValidator for SimpleValidator {
    fn validate(&self, tx: &Transaction) -> MempoolResult<ValidationResult> {
        Ok(self.validate_basic(tx))
    }

    fn validate_basic(&self, tx: &Transaction) -> ValidationResult {
        let mut result = ValidationResult::success();
        if tx.gas_price < self.min_gas_price {
            result.add_error(format!("gas price too low: minimum {}, got {}", self.min_gas_price, tx.gas_price));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_state::account::Account;
    use qnet_state::transaction::TransactionType;

    fn tx(from: &str, nonce: u64, amount: u64, gas_price: u64) -> Transaction {
        Transaction::new(
            from.into(),
            Some("recipient".into()),
            amount,
            nonce,
            gas_price,
            qnet_state::transaction::gas_limits::TRANSFER,
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
            None,
            TransactionType::Transfer { from: from.into(), to: "recipient".into(), amount },
        )
    }

    #[test]
    fn rejects_gas_price_below_minimum() {
        let validator = SimpleValidator::new(10);
        let result = validator.validate_basic(&tx("alice", 0, 100, 5));
        assert!(!result.is_valid);
    }

    #[test]
    fn rejects_stale_nonce_against_state() {
        let state = Arc::new(StateManager::new());
        state.update_account("alice".into(), {
            let mut acc = Account::with_balance("alice".into(), 1_000_000);
            acc.nonce = 5;
            acc
        });
        let validator = DefaultValidator::new(state, 1);
        let err = validator.validate(&tx("alice", 2, 100, 10)).unwrap_err();
        assert!(matches!(err, MempoolError::NonceTooLow { expected: 5, got: 2 }));
    }

    #[test]
    fn flags_insufficient_balance_without_erroring() {
        let state = Arc::new(StateManager::new());
        state.update_account("alice".into(), Account::with_balance("alice".into(), 10));
        let validator = DefaultValidator::new(state, 1);
        let result = validator.validate(&tx("alice", 0, 1_000, 1)).unwrap();
        assert!(!result.is_valid);
    }
}
