//! Structured form of an Epacta annotation line.
//!
//! Every field is optional: a description that does not follow the
//! convention simply yields an (almost) empty value. The serialized shape is
//! what gets persisted in the `metadata` column and read back by the UI.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Parsed Epacta annotation attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpactaMetadata {
    /// Liturgical color code (e.g. "bl", "mo", "ro").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leccionario: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefacio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plegaria: Option<String>,

    /// Flowers allowed at the altar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flores: Option<bool>,

    /// Exposition of the Blessed Sacrament.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposicion: Option<Exposicion>,

    /// `None` when the line had no trailing fields at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_links: Option<Vec<ExternalLink>>,

    /// Leftover trailing items, inline markup (`<b>`, `<i>`, `<br>`) intact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otros: Option<Vec<String>>,
}

impl EpactaMetadata {
    /// True when nothing at all could be extracted.
    pub fn is_empty(&self) -> bool {
        *self == EpactaMetadata::default()
    }

    pub fn alerts(&self) -> &[String] {
        self.alerts.as_deref().unwrap_or_default()
    }

    pub fn external_links(&self) -> &[ExternalLink] {
        self.external_links.as_deref().unwrap_or_default()
    }

    pub fn otros(&self) -> &[String] {
        self.otros.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposicion {
    Simple,
    Solemne,
}

impl fmt::Display for Exposicion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposicion::Simple => write!(f, "Simple"),
            Exposicion::Solemne => write!(f, "Solemne"),
        }
    }
}

/// A link lifted out of an `<a href="...">` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: String,
    pub text: String,
}
