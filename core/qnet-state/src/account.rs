//! Account state: balance, nonce, and node-activation status.

use serde::{Deserialize, Serialize};

/// Account address type.
pub type Address = String;

/// Token amount type, denominated in the smallest QNC unit.
pub type Amount = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
pub enum NodeType {
    Light,
    Full,
    Super,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Light => "light",
            NodeType::Full => "full",
            NodeType::Super => "super",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
pub enum ActivationPhase {
    /// Phase 1 — activation paid by burning the external pre-launch token.
    Phase1,
    /// Phase 2 — activation paid by transferring QNC into Pool 3.
    Phase2,
}

/// An account in the blockchain's global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: u64,
    pub nonce: u64,
    pub is_node: bool,
    pub node_type: Option<NodeType>,
    pub activation_phase: Option<ActivationPhase>,

    /// Reputation score in `[0, 100]`, mirrored from the consensus reputation
    /// registry so state snapshots carry it without a cross-crate lookup.
    pub reputation: f64,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Account state (alias kept for call sites that predate the node-specific
/// fields being split out).
pub type AccountState = Account;

impl Default for Account {
    fn default() -> Self {
        Self {
            address: String::new(),
            balance: 0,
            nonce: 0,
            is_node: false,
            node_type: None,
            activation_phase: None,
            reputation: 0.0,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn with_balance(address: Address, balance: Amount) -> Self {
        Self {
            address,
            balance,
            ..Default::default()
        }
    }

    pub fn touch(&mut self, timestamp: u64) {
        if self.created_at == 0 {
            self.created_at = timestamp;
        }
        self.updated_at = timestamp;
    }

    pub fn is_node(&self) -> bool {
        self.is_node
    }

    pub fn node_type(&self) -> Option<NodeType> {
        self.node_type
    }

    /// Debit `amount` from this account, bumping the nonce. Callers are
    /// responsible for also debiting any gas/fee on top of `amount`.
    pub fn transfer_out(&mut self, amount: Amount) -> Result<(), String> {
        if self.balance < amount {
            return Err(format!(
                "insufficient balance: {} < {}",
                self.balance, amount
            ));
        }
        self.balance -= amount;
        self.nonce += 1;
        Ok(())
    }

    pub fn transfer_in(&mut self, amount: Amount) {
        self.balance += amount;
    }

    /// Mark this account as an activated node of `node_type`, activated
    /// under `phase`.
    pub fn activate_node(&mut self, node_type: NodeType, phase: ActivationPhase, timestamp: u64) {
        self.is_node = true;
        self.node_type = Some(node_type);
        self.activation_phase = Some(phase);
        self.touch(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_balance_and_bumps_nonce() {
        let mut account = Account::with_balance("addr-1".to_string(), 1000);

        assert!(account.transfer_out(500).is_ok());
        assert_eq!(account.balance, 500);
        assert_eq!(account.nonce, 1);

        assert!(account.transfer_out(600).is_err());
        assert_eq!(account.balance, 500);
        assert_eq!(account.nonce, 1);

        account.transfer_in(300);
        assert_eq!(account.balance, 800);
    }

    #[test]
    fn activation_sets_node_fields() {
        let mut account = Account::new("addr-2".to_string());
        assert!(!account.is_node());

        account.activate_node(NodeType::Light, ActivationPhase::Phase1, 1_700_000_000);

        assert!(account.is_node());
        assert_eq!(account.node_type(), Some(NodeType::Light));
        assert_eq!(account.activation_phase, Some(ActivationPhase::Phase1));
    }
}
