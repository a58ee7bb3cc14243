//! Document adapters - invoice rendering and storage.
//!
//! - `MarkdownInvoiceRenderer` - built-in renderer, always available
//! - `HtmlInvoiceRenderer` - pulldown-cmark HTML backend
//! - `LocalInvoiceDocumentStorage` - atomic local filesystem storage

mod html_renderer;
mod local_storage;
mod markdown_renderer;

pub use html_renderer::HtmlInvoiceRenderer;
pub use local_storage::LocalInvoiceDocumentStorage;
pub use markdown_renderer::MarkdownInvoiceRenderer;

#[cfg(test)]
pub(crate) use markdown_renderer::sample_document_data;
