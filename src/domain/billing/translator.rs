//! Status translation from provider vocabularies to unified statuses.
//!
//! Translation is total: statuses missing from a provider's table fall back
//! to the least committal unified value (`pending`, `incomplete`, `open`)
//! rather than failing the webhook.

use super::provider::Provider;
use super::status::{InvoiceStatus, PaymentStatus, RefundStatus, SubscriptionStatus};

/// A unified status that can be derived from a provider status string.
pub trait UnifiedStatus: Sized + Copy {
    /// Value used when the provider status is not in the table.
    const FALLBACK: Self;

    /// Table lookup; `None` when the provider string is unmapped.
    fn lookup(provider: Provider, raw: &str) -> Option<Self>;
}

/// Translates a provider status string into a unified status.
pub fn translate<S: UnifiedStatus>(provider: Provider, raw: &str) -> S {
    let normalized = raw.trim();
    match S::lookup(provider, normalized) {
        Some(status) => status,
        None => {
            tracing::debug!(
                provider = %provider,
                status = %normalized,
                "Unmapped provider status, using fallback"
            );
            S::FALLBACK
        }
    }
}

impl UnifiedStatus for PaymentStatus {
    const FALLBACK: Self = PaymentStatus::Pending;

    fn lookup(provider: Provider, raw: &str) -> Option<Self> {
        use PaymentStatus::*;
        match provider {
            Provider::Stripe => match raw {
                "succeeded" => Some(Succeeded),
                "requires_payment_method" | "canceled" => Some(Failed),
                "processing" | "requires_action" | "requires_confirmation"
                | "requires_capture" => Some(Pending),
                _ => None,
            },
            Provider::PayPal => match raw.to_ascii_uppercase().as_str() {
                "COMPLETED" => Some(Succeeded),
                "DECLINED" | "FAILED" | "DENIED" => Some(Failed),
                "PENDING" => Some(Pending),
                // Refund state lives on refund rows; the capture itself succeeded.
                "REFUNDED" | "PARTIALLY_REFUNDED" => Some(Succeeded),
                _ => None,
            },
        }
    }
}

impl UnifiedStatus for SubscriptionStatus {
    const FALLBACK: Self = SubscriptionStatus::Incomplete;

    fn lookup(provider: Provider, raw: &str) -> Option<Self> {
        use SubscriptionStatus::*;
        match provider {
            Provider::Stripe => match raw {
                "incomplete" => Some(Incomplete),
                "incomplete_expired" => Some(IncompleteExpired),
                "trialing" => Some(Trialing),
                "active" => Some(Active),
                "past_due" => Some(PastDue),
                "canceled" => Some(Canceled),
                "unpaid" => Some(Unpaid),
                "paused" => Some(Paused),
                "expired" => Some(Expired),
                _ => None,
            },
            Provider::PayPal => match raw.to_ascii_uppercase().as_str() {
                "APPROVAL_PENDING" | "APPROVED" => Some(Incomplete),
                "ACTIVE" => Some(Active),
                "SUSPENDED" => Some(Paused),
                "CANCELLED" => Some(Canceled),
                "EXPIRED" => Some(Expired),
                _ => None,
            },
        }
    }
}

impl UnifiedStatus for RefundStatus {
    const FALLBACK: Self = RefundStatus::Pending;

    fn lookup(provider: Provider, raw: &str) -> Option<Self> {
        use RefundStatus::*;
        match provider {
            Provider::Stripe => match raw {
                "succeeded" => Some(Succeeded),
                "pending" | "requires_action" => Some(Pending),
                "failed" => Some(Failed),
                "canceled" => Some(Canceled),
                _ => None,
            },
            Provider::PayPal => match raw.to_ascii_uppercase().as_str() {
                "COMPLETED" => Some(Succeeded),
                "PENDING" => Some(Pending),
                "FAILED" => Some(Failed),
                "CANCELLED" => Some(Canceled),
                _ => None,
            },
        }
    }
}

impl UnifiedStatus for InvoiceStatus {
    const FALLBACK: Self = InvoiceStatus::Open;

    fn lookup(provider: Provider, raw: &str) -> Option<Self> {
        use InvoiceStatus::*;
        match provider {
            Provider::Stripe => match raw {
                "draft" => Some(Draft),
                "open" | "uncollectible" => Some(Open),
                "paid" => Some(Paid),
                "void" => Some(Void),
                _ => None,
            },
            Provider::PayPal => match raw.to_ascii_uppercase().as_str() {
                "DRAFT" => Some(Draft),
                "SENT" | "SCHEDULED" | "UNPAID" | "PARTIALLY_PAID" => Some(Open),
                "PAID" | "MARKED_AS_PAID" => Some(Paid),
                "CANCELLED" => Some(Void),
                _ => None,
            },
        }
    }
}
