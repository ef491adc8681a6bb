//! Credit Ledger
//!
//! Per-user credit balances with atomic check-and-deduct. Every paid
//! generation action passes through here before the provider is reached, so
//! the balance check and the decrement happen in one critical section;
//! concurrent deductions for the same user can never both succeed against a
//! balance that only covers one.
//!
//! Accounts are created implicitly on first reference with a fixed starting
//! grant. The in-memory map stands in for the platform's persistence
//! collaborator; this type is the seam a durable row store would replace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Starting grant for newly created accounts
const DEFAULT_STARTING_CREDITS: u32 = 100;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u32, available: u32 },
}

pub type CreditResult<T> = Result<T, CreditError>;

// ============================================================================
// Account Types
// ============================================================================

/// A user's credit balance. Mutated only through the ledger's atomic
/// operations, never set directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    pub user_id: String,
    pub balance: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    fn new(user_id: &str, balance: u32) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One recorded deduction, kept for audit and dispute resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub action: String,
    pub amount: u32,
    pub balance_after: u32,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Credit Ledger
// ============================================================================

/// Shared, concurrency-safe credit accounting
pub struct CreditLedger {
    accounts: RwLock<HashMap<String, CreditAccount>>,
    audit: RwLock<Vec<AuditRecord>>,
    starting_credits: u32,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::with_starting_credits(DEFAULT_STARTING_CREDITS)
    }

    pub fn with_starting_credits(starting_credits: u32) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
            starting_credits,
        }
    }

    /// Return the user's account, creating it with the starting grant on
    /// first reference. Safe under concurrent first access: the entry is
    /// created at most once.
    pub async fn get_or_create(&self, user_id: &str) -> CreditAccount {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(user_id.to_string())
            .or_insert_with(|| {
                log::info!(
                    "created credit account for user {user_id} with {} credits",
                    self.starting_credits
                );
                CreditAccount::new(user_id, self.starting_credits)
            })
            .clone()
    }

    /// Current balance, creating the account if needed
    pub async fn balance(&self, user_id: &str) -> u32 {
        self.get_or_create(user_id).await.balance
    }

    /// Atomically verify the balance covers `amount` and deduct it.
    ///
    /// Check and decrement share one write-lock critical section, so
    /// same-user deductions serialize; a losing concurrent call observes the
    /// balance left by the winner. Returns the new balance on success.
    pub async fn check_and_deduct(
        &self,
        user_id: &str,
        amount: u32,
        action: &str,
    ) -> CreditResult<u32> {
        let new_balance = {
            let mut accounts = self.accounts.write().await;
            let account = accounts
                .entry(user_id.to_string())
                .or_insert_with(|| CreditAccount::new(user_id, self.starting_credits));

            if account.balance < amount {
                return Err(CreditError::InsufficientCredits {
                    required: amount,
                    available: account.balance,
                });
            }

            account.balance -= amount;
            account.updated_at = Utc::now();
            account.balance
        };

        log::info!(
            "deducted {amount} credits from user {user_id} for {action} (balance now {new_balance})"
        );
        self.audit.write().await.push(AuditRecord {
            user_id: user_id.to_string(),
            action: action.to_string(),
            amount,
            balance_after: new_balance,
            at: Utc::now(),
        });

        Ok(new_balance)
    }

    /// Add credits to the user's balance. Additive, never clamps, never
    /// fails; used by the payment-completion collaborator.
    pub async fn increment(&self, user_id: &str, amount: u32) -> u32 {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| CreditAccount::new(user_id, self.starting_credits));

        account.balance = account.balance.saturating_add(amount);
        account.updated_at = Utc::now();

        log::info!(
            "added {amount} credits to user {user_id} (balance now {})",
            account.balance
        );
        account.balance
    }

    /// Deduction history for one user, oldest first
    pub async fn audit_trail(&self, user_id: &str) -> Vec<AuditRecord> {
        self.audit
            .read()
            .await
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Drop all accounts and audit history (test harness use)
    pub async fn reset(&self) {
        self.accounts.write().await.clear();
        self.audit.write().await.clear();
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
