//! HTML invoice renderer backed by pulldown-cmark.
//!
//! Renders the Markdown invoice and converts it to a standalone HTML page.

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};

use super::MarkdownInvoiceRenderer;
use crate::ports::{
    DocumentFormat, InvoiceDocumentData, InvoiceRenderer, RenderError, RenderedDocument,
};

#[derive(Debug, Clone)]
pub struct HtmlInvoiceRenderer {
    markdown: MarkdownInvoiceRenderer,
    include_default_css: bool,
}

impl Default for HtmlInvoiceRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlInvoiceRenderer {
    pub fn new() -> Self {
        Self {
            markdown: MarkdownInvoiceRenderer::new(),
            include_default_css: true,
        }
    }

    /// Disable the embedded stylesheet.
    pub fn without_default_css(mut self) -> Self {
        self.include_default_css = false;
        self
    }

    pub fn to_html(&self, data: &InvoiceDocumentData) -> String {
        let markdown = self.markdown.to_markdown(data);
        let parser = Parser::new_ext(&markdown, Options::ENABLE_TABLES);

        let mut body = String::new();
        html::push_html(&mut body, parser);

        self.wrap_html(body, &data.number)
    }

    fn wrap_html(&self, body: String, number: &str) -> String {
        let css = if self.include_default_css {
            DEFAULT_CSS
        } else {
            ""
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Invoice {number}</title>
    <style>
{css}
    </style>
</head>
<body>
    <article class="invoice">
{body}
    </article>
</body>
</html>"#,
            number = html_escape(number),
            css = css,
            body = body
        )
    }
}

#[async_trait]
impl InvoiceRenderer for HtmlInvoiceRenderer {
    async fn render(&self, data: &InvoiceDocumentData) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            format: DocumentFormat::Html,
            bytes: self.to_html(data).into_bytes(),
        })
    }

    fn name(&self) -> &'static str {
        "html"
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const DEFAULT_CSS: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif;
    font-size: 14px;
    color: #1f2937;
    max-width: 800px;
    margin: 0 auto;
    padding: 2rem;
}

h1 {
    font-size: 1.75rem;
    border-bottom: 2px solid #2563eb;
    padding-bottom: 0.5rem;
}

table {
    width: 100%;
    border-collapse: collapse;
    margin: 1em 0;
}

th, td {
    padding: 0.4rem 0.6rem;
    border: 1px solid #e5e7eb;
}

td:not(:first-child) {
    text-align: right;
}
"#;
