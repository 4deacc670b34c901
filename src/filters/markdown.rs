//! Markdown to HTML.
//!
//! Params:
//! - `smart_punctuation` (bool, default false): curly quotes, dashes, ellipses

use super::{Filter, FilterContext, FilterError, expect_text};
use crate::content::Content;
use crate::rep::Outcome;
use pulldown_cmark::{Options, Parser, html as md_html};

pub struct Markdown;

impl Filter for Markdown {
    fn run(
        &self,
        input: &Content,
        params: &toml::Table,
        _ctx: &FilterContext<'_>,
    ) -> Result<Outcome<Content>, FilterError> {
        let source = expect_text(input, "markdown")?;

        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        if params
            .get("smart_punctuation")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }

        let parser = Parser::new_ext(source, options);
        let mut html = String::with_capacity(source.len() * 3 / 2);
        md_html::push_html(&mut html, parser);
        Ok(Outcome::Ready(Content::Text(html)))
    }
}
