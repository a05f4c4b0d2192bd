//! Authenticated callers and the ownership rules applied to them

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::{AppError, AppResult};

/// Who a bearer token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    /// A customer acting on their own records; the subject is the customer id
    Customer,
    /// An internal job such as the collection batch or the expiry sweeper
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
    pub role: CallerRole,
}

impl Caller {
    pub fn customer(customer_id: Uuid) -> Self {
        Self {
            subject: customer_id.to_string(),
            role: CallerRole::Customer,
        }
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self {
            subject: name.into(),
            role: CallerRole::Service,
        }
    }

    pub fn is_service(&self) -> bool {
        self.role == CallerRole::Service
    }

    /// Customer id carried by a customer token
    pub fn customer_id(&self) -> Option<Uuid> {
        match self.role {
            CallerRole::Customer => Uuid::parse_str(&self.subject).ok(),
            CallerRole::Service => None,
        }
    }

    /// Internal operations accept service tokens only
    pub fn require_service(&self) -> AppResult<()> {
        if self.is_service() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{} is not a service caller", self.subject)))
        }
    }

    /// Services may act for any customer; customers only for themselves
    pub fn require_customer(&self, customer_id: Uuid) -> AppResult<()> {
        if self.is_service() || self.customer_id() == Some(customer_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} may not act for customer {}",
                self.subject, customer_id
            )))
        }
    }
}
