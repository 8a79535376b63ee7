use serde::{Deserialize, Serialize};

/// Role of the caller as resolved by the auth boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
    /// Internal actors (expiry sweeper, payment webhook) that bypass
    /// ownership checks.
    System,
}

/// The authenticated caller of an engine operation. Session issuance is
/// external; the engine only consumes the resolved identity for ownership
/// checks on mutating operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub account_id: String,
    pub role: Role,
}

impl Caller {
    pub fn customer(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            role: Role::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            account_id: "system".to_string(),
            role: Role::System,
        }
    }

    /// A reservation may only be mutated by its creator or an elevated role.
    pub fn may_act_on(&self, owner_account_id: &str) -> bool {
        match self.role {
            Role::Customer => self.account_id == owner_account_id,
            Role::Admin | Role::System => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_only_acts_on_own_reservations() {
        let caller = Caller::customer("acct-1");
        assert!(caller.may_act_on("acct-1"));
        assert!(!caller.may_act_on("acct-2"));
    }

    #[test]
    fn test_elevated_roles_bypass_ownership() {
        assert!(Caller::admin("ops").may_act_on("acct-2"));
        assert!(Caller::system().may_act_on("acct-2"));
    }
}
