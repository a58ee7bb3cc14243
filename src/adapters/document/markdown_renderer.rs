//! Built-in Markdown invoice renderer.
//!
//! Always available; the invoice pipeline falls back to it when no other
//! backend is configured or the configured one reports itself unavailable.

use async_trait::async_trait;

use crate::ports::{
    DocumentFormat, InvoiceDocumentData, InvoiceRenderer, RenderError, RenderedDocument,
};

/// Renders invoices as a single Markdown page.
///
/// ```text
/// # Invoice INV-20260105-1A2B3C4D
///
/// **Status:** paid | **Issued:** 2026-01-05 | **Currency:** USD
///
/// ## Bill To
/// ...
/// ## Items
/// | Description | Qty | Unit price | Amount |
/// ...
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarkdownInvoiceRenderer;

impl MarkdownInvoiceRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders the invoice to Markdown text.
    pub fn to_markdown(&self, data: &InvoiceDocumentData) -> String {
        let mut doc = format!("# Invoice {}\n\n", data.number);

        doc.push_str(&format!(
            "**Status:** {} | **Issued:** {} | **Currency:** {}\n",
            data.status, data.issued_on, data.currency
        ));
        if let Some(due) = &data.due_on {
            doc.push_str(&format!("\n**Due:** {}\n", due));
        }
        if let Some(paid) = &data.paid_on {
            doc.push_str(&format!("\n**Paid:** {}\n", paid));
        }
        doc.push('\n');

        doc.push_str(&self.bill_to_section(data));
        doc.push_str(&self.items_section(data));
        doc.push_str(&self.totals_section(data));

        doc
    }

    fn bill_to_section(&self, data: &InvoiceDocumentData) -> String {
        let billing = &data.billing;
        if billing.is_empty() {
            return String::new();
        }

        let mut section = String::from("## Bill To\n\n");
        if let Some(name) = &billing.name {
            section.push_str(&format!("{}  \n", escape_cell(name)));
        }
        if let Some(email) = &billing.email {
            section.push_str(&format!("{}  \n", email));
        }
        if let Some(address) = &billing.address {
            for line in address.lines() {
                section.push_str(&format!("{}  \n", escape_cell(&line)));
            }
        }
        section.push('\n');
        section
    }

    fn items_section(&self, data: &InvoiceDocumentData) -> String {
        let mut section = String::from("## Items\n\n");
        section.push_str("| Description | Qty | Unit price | Amount |\n");
        section.push_str("|-------------|----:|-----------:|-------:|\n");
        for line in &data.lines {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(&line.description),
                line.quantity,
                line.unit_price,
                line.amount
            ));
        }
        section.push('\n');
        section
    }

    fn totals_section(&self, data: &InvoiceDocumentData) -> String {
        let mut section = String::from("## Totals\n\n");
        section.push_str("| | |\n|---|---:|\n");
        section.push_str(&format!("| Subtotal | {} |\n", data.subtotal));
        if data.tax != zero_like(&data.tax) {
            section.push_str(&format!("| Tax | {} |\n", data.tax));
        }
        if data.discount != zero_like(&data.discount) {
            section.push_str(&format!("| Discount | -{} |\n", data.discount));
        }
        section.push_str(&format!("| **Total** | **{}** |\n", data.total));
        section.push_str(&format!("| Paid | {} |\n", data.amount_paid));
        section.push_str(&format!("| Amount due | {} |\n", data.amount_due));
        section
    }
}

/// "0", "0.00" or "0.000" depending on the currency exponent of `sample`.
fn zero_like(sample: &str) -> String {
    match sample.split_once('.') {
        Some((_, fraction)) => format!("0.{}", "0".repeat(fraction.len())),
        None => "0".to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[async_trait]
impl InvoiceRenderer for MarkdownInvoiceRenderer {
    async fn render(&self, data: &InvoiceDocumentData) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            format: DocumentFormat::Markdown,
            bytes: self.to_markdown(data).into_bytes(),
        })
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

#[cfg(test)]
pub(crate) fn sample_document_data() -> InvoiceDocumentData {
    use crate::domain::billing::{Address, BillingDetails};
    use crate::ports::DocumentLine;

    InvoiceDocumentData {
        number: "INV-20260105-1A2B3C4D".to_string(),
        status: "paid".to_string(),
        currency: "USD".to_string(),
        issued_on: "2026-01-05".to_string(),
        due_on: None,
        paid_on: Some("2026-01-05".to_string()),
        billing: BillingDetails {
            name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            address: Some(Address {
                line1: Some("12 St James's Square".to_string()),
                city: Some("London".to_string()),
                country: Some("GB".to_string()),
                ..Address::default()
            }),
        },
        lines: vec![DocumentLine {
            description: "Pro plan | monthly".to_string(),
            quantity: 1,
            unit_price: "20.00".to_string(),
            amount: "20.00".to_string(),
        }],
        subtotal: "20.00".to_string(),
        tax: "0.00".to_string(),
        discount: "0.00".to_string(),
        total: "20.00".to_string(),
        amount_paid: "20.00".to_string(),
        amount_due: "0.00".to_string(),
    }
}
