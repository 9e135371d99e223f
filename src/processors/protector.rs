//! Masking of spans that must survive translation untouched
//!
//! Fenced code, inline code, HTML tags and Markdown links are swapped for
//! placeholder tokens before the text goes to the model, and swapped back
//! afterwards.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").unwrap());
static LEFTOVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"__MASK_+(?:CODE_BLOCK|INLINE_CODE|HTML_TAG|LINK)_\d+__").unwrap()
});

const BASE_PREFIX: &str = "__MASK";

/// Kind of protected construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Fenced block, fences included
    CodeBlock,
    /// Backtick span
    InlineCode,
    /// Single HTML tag
    HtmlTag,
    /// Link or image target
    Link,
}

impl SpanKind {
    /// Masking order: earlier kinds swallow constructs nested inside them
    const ORDER: [SpanKind; 4] = [
        SpanKind::CodeBlock,
        SpanKind::InlineCode,
        SpanKind::HtmlTag,
        SpanKind::Link,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            SpanKind::CodeBlock => &CODE_BLOCK,
            SpanKind::InlineCode => &INLINE_CODE,
            SpanKind::HtmlTag => &HTML_TAG,
            SpanKind::Link => &LINK,
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanKind::CodeBlock => write!(f, "CODE_BLOCK"),
            SpanKind::InlineCode => write!(f, "INLINE_CODE"),
            SpanKind::HtmlTag => write!(f, "HTML_TAG"),
            SpanKind::Link => write!(f, "LINK"),
        }
    }
}

/// A placeholder and the text it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSpan {
    /// Placeholder written into the masked text
    pub token: String,
    /// Text the placeholder replaced
    pub original: String,
    /// Construct the span covers
    pub kind: SpanKind,
}

/// Document with protected spans replaced by tokens
#[derive(Debug, Clone)]
pub struct MaskedDocument {
    /// Text sent for translation
    pub text: String,
    /// Spans in masking order
    pub spans: Vec<ProtectedSpan>,
}

/// Result of restoring a masked document
#[derive(Debug, Clone)]
pub struct Restored {
    /// Text with every found token replaced by its original
    pub text: String,
    /// Tokens that were not found in the text
    pub missing: Vec<String>,
}

impl Restored {
    /// Whether every token came back
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Replace every protected span in `document` with a unique token
pub fn mask(document: &str) -> MaskedDocument {
    let mut prefix = BASE_PREFIX.to_string();
    while document.contains(&prefix) {
        prefix.push('_');
    }

    let mut text = document.to_string();
    let mut spans = Vec::new();
    let mut counter = 0usize;

    for kind in SpanKind::ORDER {
        text = kind
            .pattern()
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let token = format!("{}_{}_{}__", prefix, kind, counter);
                counter += 1;
                spans.push(ProtectedSpan {
                    token: token.clone(),
                    original: caps[0].to_string(),
                    kind,
                });
                token
            })
            .into_owned();
    }

    MaskedDocument { text, spans }
}

/// Put the original text back in place of every token
///
/// Spans are restored newest first because a later span's original text may
/// itself contain earlier tokens.
pub fn unmask(text: &str, spans: &[ProtectedSpan]) -> Restored {
    let mut restored = text.to_string();
    let mut missing = Vec::new();

    for span in spans.iter().rev() {
        if restored.contains(&span.token) {
            restored = restored.replacen(&span.token, &span.original, 1);
        } else {
            missing.push(span.token.clone());
        }
    }

    missing.reverse();
    Restored {
        text: restored,
        missing,
    }
}

/// Placeholder tokens that survived into `text`
pub fn find_leftover_placeholders(text: &str) -> Vec<String> {
    LEFTOVER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
