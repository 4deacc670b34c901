//! `{{ ... }}` substitution. Text to text.
//!
//! Expressions:
//!
//! | Expression | Value |
//! |------------|-------|
//! | `content` | the content being wrapped (the rep's current content) |
//! | `item.identifier`, `item.<attr>` | the item being compiled |
//! | `layout.<attr>` | the layout being rendered |
//! | `rep.name`, `rep.path` | the representation being compiled |
//! | `param.<key>` | filter params |
//! | `config.<key>` | site configuration |
//! | `compiled_content <identifier> [rep] [snapshot]` | another rep's compiled content |
//!
//! Missing attributes, params and config keys render as the empty string.
//! Anything else is an error. `compiled_content` on a rep that hasn't been
//! compiled yet makes the whole render `NotReady`.

use super::{Filter, FilterContext, FilterError, expect_text};
use crate::content::Content;
use crate::item::display_value;
use crate::rep::Outcome;

pub struct Template;

impl Filter for Template {
    fn run(
        &self,
        input: &Content,
        params: &toml::Table,
        ctx: &FilterContext<'_>,
    ) -> Result<Outcome<Content>, FilterError> {
        let source = expect_text(input, "template")?;
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                FilterError::Template(format!("unterminated tag at '{}'", preview(&rest[start..])))
            })?;
            match evaluate(after[..end].trim(), params, ctx)? {
                Outcome::Ready(value) => out.push_str(&value),
                Outcome::NotReady(id) => return Ok(Outcome::NotReady(id)),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(Outcome::Ready(Content::Text(out)))
    }
}

fn preview(s: &str) -> String {
    s.chars().take(20).collect()
}

fn evaluate(
    expr: &str,
    params: &toml::Table,
    ctx: &FilterContext<'_>,
) -> Result<Outcome<String>, FilterError> {
    let mut words = expr.split_whitespace();
    let head = words.next().unwrap_or_default();

    if head == "compiled_content" {
        let identifier = words.next().ok_or_else(|| {
            FilterError::Template("compiled_content needs an identifier".to_string())
        })?;
        let rep = words.next();
        let snapshot = words.next();
        if words.next().is_some() {
            return Err(FilterError::UnknownExpression(expr.to_string()));
        }
        return ctx.compiled_content(identifier, rep, snapshot);
    }
    if words.next().is_some() {
        return Err(FilterError::UnknownExpression(expr.to_string()));
    }

    let value = match head.split_once('.') {
        None if head == "content" => ctx
            .content
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| FilterError::BinaryContent(ctx.item.identifier.clone()))?,
        Some(("item", "identifier")) => ctx.item.identifier.clone(),
        Some(("item", key)) => ctx.item.attribute(key).map(display_value).unwrap_or_default(),
        Some(("layout", key)) => {
            let layout = ctx.layout.ok_or_else(|| {
                FilterError::Template(format!("'{head}' used outside a layout"))
            })?;
            layout.attribute(key).map(display_value).unwrap_or_default()
        }
        Some(("rep", "name")) => ctx.rep.to_string(),
        Some(("rep", "path")) => ctx.path.unwrap_or_default().to_string(),
        Some(("param", key)) => params.get(key).map(display_value).unwrap_or_default(),
        Some(("config", key)) => ctx.site.config.lookup(key).unwrap_or_default(),
        _ => return Err(FilterError::UnknownExpression(expr.to_string())),
    };
    Ok(Outcome::Ready(value))
}
