//! Prompt templates: Handlebars sources checked against the input
//! [`Schema`] of the prompt that owns them.
//!
//! Supported tags:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `{{path}}`, `{{{path}}}` | value at a dotted path, unescaped |
//! | `{{json path}}`, `{{{json path}}}` | pretty-printed JSON of the value |
//! | `{{#each path}}…{{/each}}` | body once per array element; `{{this}}`, `{{@index}}` |
//! | `{{#if path}}…{{else}}…{{/if}}` | body when the value is truthy |
//! | `{{media url=path}}` | a media reference (at most one, never inside `#each`) |
//!
//! Compilation walks the parsed element tree and rejects anything the
//! schema cannot back, so a validated input always renders.

use std::fmt;
use std::sync::Arc;

use handlebars::template::{HelperTemplate, Parameter, Template, TemplateElement};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TemplateError;
use crate::schema::Schema;

/// One part of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptPart {
    Text { text: String },
    /// A media reference; `url` is usually a `data:` URI.
    Media { url: String },
}

/// The output of rendering: text interleaved with media references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub parts: Vec<PromptPart>,
}

impl RenderedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text, merging with a preceding text part.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(PromptPart::Text { text: last }) = self.parts.last_mut() {
            last.push_str(text);
        } else {
            self.parts.push(PromptPart::Text {
                text: text.to_string(),
            });
        }
    }

    pub fn push_media(&mut self, url: impl Into<String>) {
        self.parts.push(PromptPart::Media { url: url.into() });
    }

    /// The text parts concatenated; media references are omitted.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text { text } => Some(text.as_str()),
                PromptPart::Media { .. } => None,
            })
            .collect()
    }

    pub fn media_urls(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::Media { url } => Some(url.as_str()),
            PromptPart::Text { .. } => None,
        })
    }
}

impl From<&str> for RenderedPrompt {
    fn from(text: &str) -> Self {
        let mut prompt = Self::new();
        prompt.push_text(text);
        prompt
    }
}

impl From<String> for RenderedPrompt {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

const TEMPLATE_NAME: &str = "prompt";

/// Brackets a media URL in rendered output. Input strings are scrubbed of
/// it before rendering, so every occurrence comes from the `media` helper.
const MEDIA_MARKER: char = '\u{FFFC}';

/// A compiled prompt template.
#[derive(Clone)]
pub struct PromptTemplate {
    source: String,
    registry: Arc<Handlebars<'static>>,
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate").field("source", &self.source).finish()
    }
}

impl PromptTemplate {
    /// Parse `source` and check it against the schema of the values it will
    /// be rendered with.
    pub fn compile(source: &str, schema: &Schema) -> Result<Self, TemplateError> {
        let template = Template::compile(source).map_err(|e| syntax(e.to_string()))?;
        let mut media = 0;
        check(&template.elements, schema, false, &mut media)?;

        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("json", Box::new(json_helper));
        registry.register_helper("media", Box::new(media_helper));
        registry.register_template(TEMPLATE_NAME, template);

        Ok(Self {
            source: source.to_string(),
            registry: Arc::new(registry),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against a value that passed the compile-time schema.
    pub fn render(&self, input: &Value) -> Result<RenderedPrompt, TemplateError> {
        let text = self
            .registry
            .render(TEMPLATE_NAME, &scrub(input))
            .map_err(|e| TemplateError::Render(e.to_string()))?;

        let mut out = RenderedPrompt::new();
        for (i, segment) in text.split(MEDIA_MARKER).enumerate() {
            if i % 2 == 1 {
                out.push_media(segment);
            } else {
                out.push_text(segment);
            }
        }
        Ok(out)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn json_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = h.param(0).map(|p| p.value()).unwrap_or(&Value::Null);
    out.write(&serde_json::to_string_pretty(value).unwrap_or_default())?;
    Ok(())
}

fn media_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    if let Some(Value::String(url)) = h.hash_get("url").map(|p| p.value()) {
        out.write(&format!("{MEDIA_MARKER}{url}{MEDIA_MARKER}"))?;
    }
    Ok(())
}

fn scrub(value: &Value) -> Value {
    match value {
        Value::String(s) if s.contains(MEDIA_MARKER) => Value::String(s.replace(MEDIA_MARKER, "")),
        Value::Array(items) => Value::Array(items.iter().map(scrub).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), scrub(v))).collect()),
        other => other.clone(),
    }
}

// ── Compile-time checks ───────────────────────────────────────────────────

fn syntax(message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        message: message.into(),
    }
}

/// Split a tag path into schema segments. A leading `this` is dropped, so
/// `this` alone is the empty path.
fn segments(raw: &str) -> Result<Vec<&str>, TemplateError> {
    let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let mut segments = Vec::new();
    for segment in raw.split('.') {
        if !valid(segment) {
            return Err(syntax(format!("invalid path '{raw}'")));
        }
        segments.push(segment);
    }
    if segments.first() == Some(&"this") {
        segments.remove(0);
    }
    Ok(segments)
}

fn path_of(param: Option<&Parameter>, helper: &str) -> Result<String, TemplateError> {
    param
        .and_then(Parameter::as_name)
        .map(str::to_string)
        .ok_or_else(|| syntax(format!("'{helper}' needs a path")))
}

fn resolve<'a>(scope: &'a Schema, raw: &str) -> Result<&'a Schema, TemplateError> {
    scope
        .resolve(segments(raw)?.as_slice())
        .ok_or_else(|| TemplateError::UnknownPath { path: raw.to_string() })
}

fn helper_name(h: &HelperTemplate) -> Result<&str, TemplateError> {
    h.name
        .as_name()
        .ok_or_else(|| syntax("subexpressions and literals are not supported"))
}

fn check(elements: &[TemplateElement], scope: &Schema, in_each: bool, media: &mut usize) -> Result<(), TemplateError> {
    for element in elements {
        match element {
            TemplateElement::RawString(_) | TemplateElement::Comment(_) => {}
            TemplateElement::Expression(h) | TemplateElement::HtmlExpression(h) => {
                check_expression(h, scope, in_each, media)?;
            }
            TemplateElement::HelperBlock(h) => check_block(h, scope, in_each, media)?,
            _ => return Err(syntax("partials and decorators are not supported")),
        }
    }
    Ok(())
}

fn check_expression(h: &HelperTemplate, scope: &Schema, in_each: bool, media: &mut usize) -> Result<(), TemplateError> {
    let name = helper_name(h)?;
    if h.params.is_empty() && h.hash.is_empty() {
        return match name {
            "@index" if in_each => Ok(()),
            "@index" => Err(TemplateError::IndexOutsideEach),
            other if other.starts_with('@') => Err(syntax(format!("unsupported variable '{other}'"))),
            other => resolve(scope, other).map(|_| ()),
        };
    }

    match name {
        "json" if h.params.len() == 1 && h.hash.is_empty() => {
            resolve(scope, &path_of(h.params.first(), "json")?)?;
        }
        "media" if h.params.is_empty() && h.hash.len() == 1 => {
            let path = path_of(h.hash.get("url"), "media url=")?;
            if in_each {
                return Err(TemplateError::MediaInEach { path });
            }
            if !matches!(resolve(scope, &path)?, Schema::String(_)) {
                return Err(TemplateError::MediaNotString { path });
            }
            *media += 1;
            if *media > 1 {
                return Err(TemplateError::MultipleMedia);
            }
        }
        "json" | "media" => return Err(syntax(format!("malformed '{name}' tag"))),
        other => return Err(syntax(format!("unknown helper '{other}'"))),
    }
    Ok(())
}

fn check_block(h: &HelperTemplate, scope: &Schema, in_each: bool, media: &mut usize) -> Result<(), TemplateError> {
    let name = helper_name(h)?;
    if h.params.len() != 1 || !h.hash.is_empty() {
        return Err(syntax(format!("'#{name}' takes exactly one path")));
    }
    let path = path_of(h.params.first(), name)?;
    let body = h.template.as_ref().map(|t| t.elements.as_slice()).unwrap_or_default();
    let inverse = h.inverse.as_ref().map(|t| t.elements.as_slice()).unwrap_or_default();

    match name {
        "each" => match resolve(scope, &path)? {
            Schema::Array(array) => check(body, &array.items, true, media)?,
            _ => return Err(TemplateError::NotAnArray { path }),
        },
        "if" => {
            resolve(scope, &path)?;
            check(body, scope, in_each, media)?;
        }
        other => return Err(syntax(format!("unknown block helper '{other}'"))),
    }
    check(inverse, scope, in_each, media)
}
