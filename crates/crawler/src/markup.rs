//! Conversion of README and LICENSE files to sanitized HTML

use crate::{CrawlerError, Result};
use pulldown_cmark::{html, Options, Parser};
use std::path::Path;

/// Converts a markup file into HTML that is safe to embed in a page
pub trait MarkupConverter: Send + Sync {
    fn convert_file(&self, path: &Path) -> Result<String>;
}

const MARKDOWN_EXTENSIONS: &[&str] = &["markdown", "mdown", "mkdn", "md"];

/// Renders Markdown files with pulldown-cmark and every other format as
/// preformatted text, then strips unsafe content with ammonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMarkupConverter;

impl HtmlMarkupConverter {
    pub fn convert_str(&self, text: &str, extension: Option<&str>) -> String {
        let is_markdown = extension
            .map(|ext| MARKDOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        let rendered = if is_markdown {
            let mut options = Options::empty();
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);

            let mut out = String::with_capacity(text.len() * 3 / 2);
            html::push_html(&mut out, Parser::new_ext(text, options));
            out
        } else {
            format!("<pre>{}</pre>", ammonia::clean_text(text))
        };

        ammonia::clean(&rendered)
    }
}

impl MarkupConverter for HtmlMarkupConverter {
    fn convert_file(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| CrawlerError::Markup(format!("{} is not valid UTF-8", path.display())))?;
        let extension = path.extension().and_then(|ext| ext.to_str());

        Ok(self.convert_str(&text, extension))
    }
}
