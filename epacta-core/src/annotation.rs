//! Epacta annotation parsing.
//!
//! An Epacta description is a single slash-delimited line:
//!
//! ```text
//! color / misal / leccionario / prefacio - plegaria / otros / otros ...
//! ```
//!
//! Fields are separated by `" / "` (with surrounding spaces) so that the
//! `://` of a URL in a trailing field never splits it. Trailing fields carry
//! keywords (exposition, flowers), bracketed alerts, links and free text.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::DEFAULT_LINK_TEXT;
use crate::metadata::{EpactaMetadata, Exposicion, ExternalLink};

const FIELD_SEPARATOR: &str = " / ";
const PREFACE_SEPARATOR: &str = " - ";

/// Trailing items start at this field index.
const FIRST_TRAILING_FIELD: usize = 4;

static FLOWERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)flo").expect("valid flowers regex"));
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid bracket regex"));
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("valid anchor regex")
});

/// Parse an event description into [`EpactaMetadata`].
///
/// Never fails: text that does not follow the convention produces a
/// partially or fully empty result.
pub fn parse(description: &str) -> EpactaMetadata {
    let normalized = description.replace("\r\n", " ").replace(['\r', '\n'], " ");
    let fields: Vec<&str> = normalized.split(FIELD_SEPARATOR).map(str::trim).collect();

    let mut metadata = EpactaMetadata::default();

    if let Some(color) = fields.first() {
        let mut color = color.to_string();
        // Removing one marker can splice a new one together ("fflolo").
        while FLOWERS.is_match(&color) {
            metadata.flores = Some(true);
            color = FLOWERS.replace_all(&color, "").into_owned();
        }
        metadata.color = non_empty(&color);
    }

    metadata.misal = fields.get(1).and_then(|f| non_empty(f));
    metadata.leccionario = fields.get(2).and_then(|f| non_empty(f));

    if let Some(preface) = fields.get(3) {
        let segments: Vec<&str> = preface.split(PREFACE_SEPARATOR).collect();
        match segments.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                metadata.plegaria = non_empty(last);
                metadata.prefacio = non_empty(&rest.join(PREFACE_SEPARATOR));
            }
            _ => metadata.prefacio = non_empty(preface),
        }
    }

    if fields.len() > FIRST_TRAILING_FIELD {
        let mut trailing = Trailing::default();
        for item in &fields[FIRST_TRAILING_FIELD..] {
            trailing.consume(item, &mut metadata);
        }
        metadata.alerts = Some(trailing.alerts);
        metadata.external_links = Some(trailing.links);
        metadata.otros = (!trailing.otros.is_empty()).then_some(trailing.otros);
    }

    metadata
}

#[derive(Default)]
struct Trailing {
    alerts: Vec<String>,
    links: Vec<ExternalLink>,
    otros: Vec<String>,
}

impl Trailing {
    fn consume(&mut self, item: &str, metadata: &mut EpactaMetadata) {
        let lower = item.to_lowercase();

        let keyword = if lower.contains("exsol") || lower.contains("exso") {
            metadata.exposicion = Some(Exposicion::Solemne);
            true
        } else if lower.contains("exsi") {
            metadata.exposicion = Some(Exposicion::Simple);
            true
        } else if lower.contains("flo") {
            metadata.flores = Some(true);
            true
        } else {
            false
        };

        // The whole item is the warning; its brackets are part of the wording.
        if !keyword && lower.contains("consagrar viril") {
            self.alerts.push(item.to_string());
            return;
        }

        for captures in BRACKETED.captures_iter(item) {
            let alert = captures[1].trim();
            if !alert.is_empty() {
                self.alerts.push(alert.to_string());
            }
        }

        if keyword {
            return;
        }

        let stripped = BRACKETED.replace_all(item, "");
        let stripped = stripped.trim();

        if let Some(captures) = ANCHOR.captures(stripped) {
            let text = captures[2].trim();
            self.links.push(ExternalLink {
                url: captures[1].trim().to_string(),
                text: if text.is_empty() {
                    DEFAULT_LINK_TEXT.to_string()
                } else {
                    text.to_string()
                },
            });
            return;
        }

        if !stripped.is_empty() {
            self.otros.push(stripped.to_string());
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
