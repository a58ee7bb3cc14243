//! PaymentCustomer - link between an application user and a provider customer.

use serde::{Deserialize, Serialize};

use super::invoice::{Address, BillingDetails};
use super::provider::Provider;
use crate::domain::foundation::{CustomerId, UserId};

/// Provider-side customer owned by an application user.
///
/// Unique per `(user_id, provider)` and per `(provider, external_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCustomer {
    pub id: CustomerId,
    pub user_id: UserId,
    pub provider: Provider,
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub address: Option<Address>,
}

impl PaymentCustomer {
    pub fn new(user_id: UserId, provider: Provider, external_id: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            user_id,
            provider,
            external_id: external_id.into(),
            email: None,
            name: None,
            address: None,
        }
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Snapshot of the customer's billing details for an invoice.
    pub fn billing_details(&self) -> BillingDetails {
        BillingDetails {
            name: self.name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
        }
    }
}
