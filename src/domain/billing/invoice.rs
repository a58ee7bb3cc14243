//! Invoice aggregate, totals invariants and numbering.

use serde::{Deserialize, Serialize};

use super::customer::PaymentCustomer;
use super::provider::Provider;
use super::status::InvoiceStatus;
use super::transaction::Transaction;
use crate::domain::foundation::{
    Currency, CustomerId, InvoiceId, SubscriptionId, Timestamp, TransactionId, ValidationError,
};

/// Postal address captured on a billing snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Non-empty address lines, in print order.
    pub fn lines(&self) -> Vec<String> {
        let locality = [self.postal_code.as_deref(), self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        [self.line1.clone(), self.line2.clone(), Some(locality), self.country.clone()]
            .into_iter()
            .flatten()
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

/// Billing details copied onto an invoice when it is created.
///
/// Later changes to the customer never alter an issued invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
}

impl BillingDetails {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.address.is_none()
    }
}

/// One ordered invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub amount: i64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price: i64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            amount: quantity * unit_price,
        }
    }
}

/// Invoice money columns.
///
/// Invariants: `total = subtotal + tax - discount` and
/// `amount_due = total - amount_paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
    pub amount_paid: i64,
    pub amount_due: i64,
}

impl InvoiceTotals {
    /// Computes `total` and `amount_due` from their inputs.
    pub fn compute(subtotal: i64, tax: i64, discount: i64, amount_paid: i64) -> Self {
        let total = subtotal + tax - discount;
        Self {
            subtotal,
            tax,
            discount,
            total,
            amount_paid,
            amount_due: total - amount_paid,
        }
    }

    /// Builds totals from a provider invoice.
    ///
    /// A missing discount is derived from the reported total; a reported
    /// discount that disagrees with the total is rejected.
    pub fn from_provider(
        subtotal: i64,
        tax: i64,
        discount: Option<i64>,
        total: i64,
        amount_paid: i64,
    ) -> Result<Self, ValidationError> {
        let discount = discount.unwrap_or(subtotal + tax - total);
        let totals = Self::compute(subtotal, tax, discount, amount_paid);
        if totals.total != total {
            return Err(ValidationError::invalid_format(
                "total",
                format!(
                    "{} != subtotal {} + tax {} - discount {}",
                    total, subtotal, tax, discount
                ),
            ));
        }
        Ok(totals)
    }

    /// Verifies both standing invariants.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.total != self.subtotal + self.tax - self.discount {
            return Err(ValidationError::invalid_format(
                "total",
                "total must equal subtotal + tax - discount",
            ));
        }
        if self.amount_due != self.total - self.amount_paid {
            return Err(ValidationError::invalid_format(
                "amount_due",
                "amount_due must equal total - amount_paid",
            ));
        }
        Ok(())
    }
}

/// Invoice issued for a payment or adopted from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub transaction_id: Option<TransactionId>,
    pub number: String,
    pub provider: Provider,
    /// Provider invoice id; `None` for invoices derived locally.
    pub external_id: Option<String>,
    pub status: InvoiceStatus,
    pub totals: InvoiceTotals,
    pub currency: Currency,
    pub billing: BillingDetails,
    pub line_items: Vec<LineItem>,
    pub issued_at: Timestamp,
    pub due_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub document_path: Option<String>,
    pub document_generated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Invoice {
    /// Invoice number of the form `INV-YYYYMMDD-XXXXXXXX`.
    pub fn generate_number(id: InvoiceId, issued_at: Timestamp) -> String {
        let suffix = id.as_uuid().simple().to_string();
        format!("INV-{}-{}", issued_at.compact_date(), suffix[..8].to_uppercase())
    }

    /// Derives a paid, single-line invoice from a succeeded transaction.
    pub fn derive_from_transaction(
        transaction: &Transaction,
        customer: Option<&PaymentCustomer>,
        now: Timestamp,
    ) -> Self {
        let id = InvoiceId::new();
        let description = transaction
            .description
            .clone()
            .unwrap_or_else(|| format!("Payment {}", transaction.external_id));

        Self {
            id,
            customer_id: transaction.customer_id,
            subscription_id: transaction.subscription_id,
            transaction_id: Some(transaction.id),
            number: Self::generate_number(id, now),
            provider: transaction.provider,
            external_id: None,
            status: InvoiceStatus::Paid,
            totals: InvoiceTotals::compute(transaction.amount, 0, 0, transaction.amount),
            currency: transaction.currency.clone(),
            billing: customer.map(PaymentCustomer::billing_details).unwrap_or_default(),
            line_items: vec![LineItem::new(description, 1, transaction.amount)],
            issued_at: now,
            due_at: None,
            paid_at: Some(now),
            period_start: None,
            period_end: None,
            document_path: None,
            document_generated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_document(&self) -> bool {
        self.document_path.is_some()
    }

    /// Folds a newer provider view of this invoice into the stored row.
    ///
    /// Identity, creation time and document fields are preserved; an
    /// empty billing snapshot never erases the one already captured.
    pub fn absorb(&mut self, incoming: Invoice, now: Timestamp) {
        let billing = if incoming.billing.is_empty() {
            std::mem::take(&mut self.billing)
        } else {
            incoming.billing
        };

        *self = Invoice {
            id: self.id,
            customer_id: incoming.customer_id.or(self.customer_id),
            subscription_id: incoming.subscription_id.or(self.subscription_id),
            transaction_id: incoming.transaction_id.or(self.transaction_id),
            billing,
            document_path: self.document_path.take(),
            document_generated_at: self.document_generated_at,
            created_at: self.created_at,
            updated_at: now,
            ..incoming
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::status::PaymentStatus;
    use crate::domain::billing::transaction::sample_new_transaction;
    use crate::domain::foundation::UserId;
    use proptest::prelude::*;

    fn succeeded_transaction() -> Transaction {
        sample_new_transaction("pi_1", PaymentStatus::Succeeded)
            .into_transaction(TransactionId::new(), Timestamp::now())
    }

    #[test]
    fn derived_invoice_is_paid_with_single_line() {
        let tx = succeeded_transaction();
        let invoice = Invoice::derive_from_transaction(&tx, None, Timestamp::now());

        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.transaction_id, Some(tx.id));
        assert_eq!(invoice.line_items, vec![LineItem::new("Payment pi_1", 1, 2000)]);
        assert_eq!(invoice.totals.total, 2000);
        assert_eq!(invoice.totals.amount_due, 0);
        assert!(invoice.totals.check().is_ok());
        assert!(invoice.external_id.is_none());
    }

    #[test]
    fn derived_invoice_snapshots_customer_billing() {
        let tx = succeeded_transaction();
        let customer = PaymentCustomer::new(UserId::new("u1").unwrap(), Provider::Stripe, "cus_1")
            .with_contact("Ada", "ada@example.com");

        let invoice = Invoice::derive_from_transaction(&tx, Some(&customer), Timestamp::now());

        assert_eq!(invoice.billing.name.as_deref(), Some("Ada"));
        assert_eq!(invoice.billing.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn number_has_date_and_hex_suffix() {
        let issued = Timestamp::parse_rfc3339("2024-02-29T08:00:00Z").unwrap();
        let number = Invoice::generate_number(InvoiceId::new(), issued);

        assert!(number.starts_with("INV-20240229-"));
        let suffix = &number["INV-20240229-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn provider_totals_derive_missing_discount() {
        let totals = InvoiceTotals::from_provider(10_000, 800, None, 9_800, 9_800).unwrap();
        assert_eq!(totals.discount, 1_000);
        assert_eq!(totals.amount_due, 0);
    }

    #[test]
    fn provider_totals_reject_inconsistent_discount() {
        assert!(InvoiceTotals::from_provider(10_000, 0, Some(500), 10_000, 0).is_err());
    }

    #[test]
    fn absorb_keeps_document_and_identity() {
        let tx = succeeded_transaction();
        let now = Timestamp::now();
        let mut stored = Invoice::derive_from_transaction(&tx, None, now);
        stored.document_path = Some("invoices/a.md".to_string());
        stored.billing.name = Some("Ada".to_string());
        let id = stored.id;

        let mut incoming = Invoice::derive_from_transaction(&tx, None, now);
        incoming.external_id = Some("in_1".to_string());
        incoming.number = "A-0001".to_string();
        stored.absorb(incoming, now);

        assert_eq!(stored.id, id);
        assert_eq!(stored.external_id.as_deref(), Some("in_1"));
        assert_eq!(stored.number, "A-0001");
        assert_eq!(stored.document_path.as_deref(), Some("invoices/a.md"));
        assert_eq!(stored.billing.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn address_lines_skip_missing_parts() {
        let address = Address {
            line1: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            postal_code: Some("12345".to_string()),
            country: Some("US".to_string()),
            ..Default::default()
        };
        assert_eq!(address.lines(), vec!["1 Main St", "12345 Springfield", "US"]);
    }

    proptest! {
        #[test]
        fn computed_totals_always_satisfy_invariants(
            subtotal in 0i64..10_000_000,
            tax in 0i64..1_000_000,
            discount in 0i64..1_000_000,
            paid in 0i64..10_000_000,
        ) {
            let totals = InvoiceTotals::compute(subtotal, tax, discount, paid);
            prop_assert!(totals.check().is_ok());
        }

        #[test]
        fn provider_totals_without_discount_always_consistent(
            subtotal in 0i64..10_000_000,
            tax in 0i64..1_000_000,
            total in 0i64..11_000_000,
            paid in 0i64..11_000_000,
        ) {
            let totals = InvoiceTotals::from_provider(subtotal, tax, None, total, paid).unwrap();
            prop_assert_eq!(totals.total, total);
            prop_assert!(totals.check().is_ok());
        }
    }
}
