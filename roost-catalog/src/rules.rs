use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roost_core::discount::{DiscountGrant, DiscountType, DiscountValidator};
use roost_core::EngineError;
use roost_shared::StayRange;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Authoring-side definition of a promotional code. How these are created
/// and administered is out of scope; this is the shape the validator
/// evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRule {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for PERCENT, minor units for FIXED.
    pub value: i64,
    pub max_discount_cap: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub min_subtotal: i64,
    /// None means any hotel / any room type.
    pub hotel_scope: Option<Uuid>,
    pub room_type_scope: Option<Uuid>,
    pub per_account_limit: Option<u32>,
    pub is_active: bool,
}

impl DiscountRule {
    pub fn percent(code: impl Into<String>, value_bps: i64) -> Self {
        Self {
            code: code.into(),
            discount_type: DiscountType::Percent,
            value: value_bps,
            max_discount_cap: None,
            valid_from: None,
            valid_until: None,
            min_subtotal: 0,
            hotel_scope: None,
            room_type_scope: None,
            per_account_limit: None,
            is_active: true,
        }
    }

    pub fn fixed(code: impl Into<String>, amount: i64) -> Self {
        Self {
            discount_type: DiscountType::Fixed,
            value: amount,
            ..Self::percent(code, 0)
        }
    }

    fn grant(&self) -> DiscountGrant {
        DiscountGrant {
            code: self.code.clone(),
            discount_type: self.discount_type,
            value: self.value,
            max_discount_cap: self.max_discount_cap,
        }
    }
}

/// In-memory discount validator standing in for the external service.
///
/// Usage is keyed by (code, account) and only recorded at confirmation, so
/// a code can sit on any number of open carts while still enforcing its
/// consumption cap.
pub struct StaticDiscountValidator {
    rules: HashMap<String, DiscountRule>,
    usage: RwLock<HashMap<(String, String), u32>>,
}

impl StaticDiscountValidator {
    pub fn new(rules: Vec<DiscountRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.code.clone(), r)).collect(),
            usage: RwLock::new(HashMap::new()),
        }
    }

    fn rejected(code: &str, reason: &str) -> EngineError {
        EngineError::DiscountRejected {
            code: code.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl DiscountValidator for StaticDiscountValidator {
    async fn validate(
        &self,
        code: &str,
        account_id: &str,
        hotel_id: Uuid,
        room_type_id: Uuid,
        subtotal: i64,
        _stay: StayRange,
    ) -> Result<DiscountGrant, EngineError> {
        let rule = self
            .rules
            .get(code)
            .ok_or_else(|| Self::rejected(code, "unknown code"))?;

        if !rule.is_active {
            return Err(Self::rejected(code, "code is not active"));
        }

        let now = Utc::now();
        if let Some(from) = rule.valid_from {
            if now < from {
                return Err(Self::rejected(code, "code is not yet valid"));
            }
        }
        if let Some(until) = rule.valid_until {
            if now >= until {
                return Err(Self::rejected(code, "code validity window has closed"));
            }
        }

        if let Some(scope) = rule.hotel_scope {
            if scope != hotel_id {
                return Err(Self::rejected(code, "code is not valid for this hotel"));
            }
        }
        if let Some(scope) = rule.room_type_scope {
            if scope != room_type_id {
                return Err(Self::rejected(code, "code is not valid for this room type"));
            }
        }

        if subtotal < rule.min_subtotal {
            return Err(Self::rejected(code, "subtotal below code minimum"));
        }

        if let Some(limit) = rule.per_account_limit {
            let usage = self.usage.read().await;
            let used = usage
                .get(&(code.to_string(), account_id.to_string()))
                .copied()
                .unwrap_or(0);
            if used >= limit {
                return Err(Self::rejected(code, "per-account usage limit reached"));
            }
        }

        Ok(rule.grant())
    }

    async fn record_usage(&self, code: &str, account_id: &str) -> Result<(), EngineError> {
        let mut usage = self.usage.write().await;
        *usage
            .entry((code.to_string(), account_id.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stay() -> StayRange {
        StayRange::new("2026-09-10".parse().unwrap(), "2026-09-12".parse().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_validates_active_code() {
        let validator =
            StaticDiscountValidator::new(vec![DiscountRule::percent("SAVE5", 500)]);
        let grant = validator
            .validate("SAVE5", "acct-1", Uuid::new_v4(), Uuid::new_v4(), 100_000, stay())
            .await
            .unwrap();
        assert_eq!(grant.discount_type, DiscountType::Percent);
        assert_eq!(grant.value, 500);
    }

    #[tokio::test]
    async fn test_rejects_below_minimum_subtotal() {
        let mut rule = DiscountRule::fixed("FLAT", 10_000);
        rule.min_subtotal = 50_000;
        let validator = StaticDiscountValidator::new(vec![rule]);

        let err = validator
            .validate("FLAT", "acct-1", Uuid::new_v4(), Uuid::new_v4(), 40_000, stay())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DiscountRejected { .. }));
    }

    #[tokio::test]
    async fn test_rejects_closed_window() {
        let mut rule = DiscountRule::percent("OLD", 500);
        rule.valid_until = Some(Utc::now() - Duration::days(1));
        let validator = StaticDiscountValidator::new(vec![rule]);

        assert!(validator
            .validate("OLD", "acct-1", Uuid::new_v4(), Uuid::new_v4(), 100_000, stay())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rejects_wrong_hotel_scope() {
        let hotel = Uuid::new_v4();
        let mut rule = DiscountRule::percent("LOCAL", 500);
        rule.hotel_scope = Some(hotel);
        let validator = StaticDiscountValidator::new(vec![rule]);

        assert!(validator
            .validate("LOCAL", "acct-1", hotel, Uuid::new_v4(), 100_000, stay())
            .await
            .is_ok());
        assert!(validator
            .validate("LOCAL", "acct-1", Uuid::new_v4(), Uuid::new_v4(), 100_000, stay())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_usage_cap_counts_recorded_usage_only() {
        let mut rule = DiscountRule::percent("ONCE", 500);
        rule.per_account_limit = Some(1);
        let validator = StaticDiscountValidator::new(vec![rule]);
        let hotel = Uuid::new_v4();
        let room = Uuid::new_v4();

        // Validating twice is fine; the cap counts consumptions.
        for _ in 0..2 {
            validator
                .validate("ONCE", "acct-1", hotel, room, 100_000, stay())
                .await
                .unwrap();
        }

        validator.record_usage("ONCE", "acct-1").await.unwrap();
        assert!(validator
            .validate("ONCE", "acct-1", hotel, room, 100_000, stay())
            .await
            .is_err());
        // A different account is unaffected.
        assert!(validator
            .validate("ONCE", "acct-2", hotel, room, 100_000, stay())
            .await
            .is_ok());
    }
}
