//! Font registry, family resolution, and text measurement using `ttf-parser`.
//!
//! Custom fonts are embedded as raw sfnt (or WOFF, transcoded on the way in)
//! and measured from real glyph advances. Requests that resolve to a builtin
//! backend family fall back to average-width heuristics, the same trade the
//! measurement layer has always made for metric-less fonts.

use std::collections::HashMap;

use crate::content::{FontStyle, FontWeight};
use crate::error::{Error, Result};
use crate::woff;

/// Combined weight + style variant. Weight and style resolve independently
/// and then collapse into one key, so bold italic is a single registry slot.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum VariantKey {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl VariantKey {
    pub fn from_style(weight: FontWeight, style: FontStyle) -> Self {
        match (weight, style) {
            (FontWeight::Normal, FontStyle::Normal) => VariantKey::Regular,
            (FontWeight::Bold, FontStyle::Normal) => VariantKey::Bold,
            (FontWeight::Normal, FontStyle::Italic) => VariantKey::Italic,
            (FontWeight::Bold, FontStyle::Italic) => VariantKey::BoldItalic,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, VariantKey::Bold | VariantKey::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, VariantKey::Italic | VariantKey::BoldItalic)
    }
}

/// Generic families with builtin backend counterparts.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Generic {
    Serif,
    SansSerif,
    Monospace,
}

/// What the resolver hands to the writer: enough to pick a concrete backend
/// font without the writer ever seeing the fallback list.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum FontHandle {
    /// A font embedded in this conversion's registry.
    Embedded { family: String, variant: VariantKey },
    /// A builtin backend family.
    Builtin { generic: Generic, variant: VariantKey },
    /// A family name passed through verbatim – the writer may know it from
    /// an earlier embedding.
    Named { family: String, variant: VariantKey },
}

impl FontHandle {
    pub fn variant(&self) -> VariantKey {
        match self {
            FontHandle::Embedded { variant, .. }
            | FontHandle::Builtin { variant, .. }
            | FontHandle::Named { variant, .. } => *variant,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct FontKey {
    /// Lowercased family name; lookups are case-insensitive.
    family: String,
    variant: VariantKey,
}

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw sfnt bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Registry of embedded fonts plus the resolution chain over it.
#[derive(Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed a raw TTF/OTF font under `family` for the given variant.
    pub fn embed(&mut self, family: &str, variant: VariantKey, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::FontFormat(format!("unparseable sfnt for {family:?}: {e}")))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(
            FontKey {
                family: family.to_ascii_lowercase(),
                variant,
            },
            data,
        );
        Ok(())
    }

    /// Embed a compressed webfont container, transcoding it to raw sfnt
    /// first. Raw sfnt bytes are accepted as-is so callers can feed either.
    pub fn embed_webfont(&mut self, family: &str, variant: VariantKey, bytes: &[u8]) -> Result<()> {
        let sfnt = if woff::is_woff(bytes) {
            woff::transcode(bytes)?
        } else {
            bytes.to_vec()
        };
        self.embed(family, variant, sfnt)
    }

    /// Resolve a comma-separated family fallback list to a concrete handle.
    ///
    /// Chain: embedded registry (case-insensitive) → generic alias table →
    /// first listed name verbatim → default serif.
    pub fn resolve(&self, family_list: &str, weight: FontWeight, style: FontStyle) -> FontHandle {
        let variant = VariantKey::from_style(weight, style);
        let names: Vec<&str> = family_list
            .split(',')
            .map(|n| n.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|n| !n.is_empty())
            .collect();

        for name in &names {
            let lower = name.to_ascii_lowercase();
            if self.lookup(&lower, variant).is_some() {
                return FontHandle::Embedded {
                    family: lower,
                    variant,
                };
            }
            if let Some(generic) = generic_alias(&lower) {
                return FontHandle::Builtin { generic, variant };
            }
        }

        match names.first() {
            Some(name) => FontHandle::Named {
                family: (*name).to_string(),
                variant,
            },
            None => FontHandle::Builtin {
                generic: Generic::Serif,
                variant,
            },
        }
    }

    /// Registry lookup with regular-variant fallback so an embedded family
    /// missing its bold face still resolves to the family.
    fn lookup(&self, family_lower: &str, variant: VariantKey) -> Option<&FontData> {
        let key = FontKey {
            family: family_lower.to_string(),
            variant,
        };
        self.fonts.get(&key).or_else(|| {
            self.fonts.get(&FontKey {
                family: family_lower.to_string(),
                variant: VariantKey::Regular,
            })
        })
    }

    /// Raw bytes for an embedded handle, for writer-side registration.
    pub fn font_bytes(&self, handle: &FontHandle) -> Option<&[u8]> {
        match handle {
            FontHandle::Embedded { family, variant } => {
                self.lookup(family, *variant).map(|d| d.bytes.as_slice())
            }
            _ => None,
        }
    }

    /// All embedded (family, variant) pairs, for bulk registration.
    pub fn embedded_keys(&self) -> Vec<(String, VariantKey)> {
        let mut keys: Vec<_> = self
            .fonts
            .keys()
            .map(|k| (k.family.clone(), k.variant))
            .collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        keys
    }

    /// Measure the width of `text` at `size` pt under the resolved handle.
    ///
    /// Embedded fonts sum real glyph advances; builtin and pass-through
    /// families use an average-character-width heuristic.
    pub fn measure(&self, text: &str, handle: &FontHandle, size: f32) -> f32 {
        if let FontHandle::Embedded { family, variant } = handle {
            if let Some(data) = self.lookup(family, *variant) {
                if let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) {
                    let scale = size / data.units_per_em;
                    let mut width = 0.0f32;
                    for ch in text.chars() {
                        match face.glyph_index(ch) {
                            Some(gid) => {
                                width += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
                            }
                            None => width += size * 0.5,
                        }
                    }
                    return width;
                }
            }
        }

        let avg = match handle {
            FontHandle::Builtin {
                generic: Generic::Monospace,
                ..
            } => 0.6,
            _ if handle.variant().is_bold() => 0.55,
            _ => 0.5,
        };
        text.chars().count() as f32 * size * avg
    }

    /// Ascender in pt for baseline placement; 0.75 em when no metrics exist.
    pub fn ascender(&self, handle: &FontHandle, size: f32) -> f32 {
        if let FontHandle::Embedded { family, variant } = handle {
            if let Some(data) = self.lookup(family, *variant) {
                return data.ascender * size / data.units_per_em;
            }
        }
        size * 0.75
    }
}

fn generic_alias(name: &str) -> Option<Generic> {
    match name {
        "serif" | "times" | "times new roman" | "georgia" => Some(Generic::Serif),
        "sans-serif" | "sans serif" | "helvetica" | "arial" | "verdana" => Some(Generic::SansSerif),
        "monospace" | "courier" | "courier new" => Some(Generic::Monospace),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mgr() -> FontManager {
        FontManager::new()
    }

    #[test]
    fn empty_list_falls_back_to_serif() {
        let handle = mgr().resolve("", FontWeight::Normal, FontStyle::Normal);
        assert_eq!(
            handle,
            FontHandle::Builtin {
                generic: Generic::Serif,
                variant: VariantKey::Regular
            }
        );
    }

    #[test]
    fn generic_aliases_resolve_to_builtins() {
        let m = mgr();
        let sans = m.resolve("Nope, sans-serif", FontWeight::Bold, FontStyle::Normal);
        assert_eq!(
            sans,
            FontHandle::Builtin {
                generic: Generic::SansSerif,
                variant: VariantKey::Bold
            }
        );
        let mono = m.resolve("Courier New", FontWeight::Normal, FontStyle::Italic);
        assert_eq!(
            mono,
            FontHandle::Builtin {
                generic: Generic::Monospace,
                variant: VariantKey::Italic
            }
        );
    }

    #[test]
    fn unknown_first_name_passes_through_verbatim() {
        let handle = mgr().resolve(
            "Custom Face, AlsoUnknown",
            FontWeight::Normal,
            FontStyle::Normal,
        );
        assert_eq!(
            handle,
            FontHandle::Named {
                family: "Custom Face".to_string(),
                variant: VariantKey::Regular
            }
        );
    }

    #[test]
    fn bold_italic_collapses_to_one_variant() {
        assert_eq!(
            VariantKey::from_style(FontWeight::Bold, FontStyle::Italic),
            VariantKey::BoldItalic
        );
    }

    #[test]
    fn heuristic_measurement() {
        let m = mgr();
        let serif = m.resolve("serif", FontWeight::Normal, FontStyle::Normal);
        let w = m.measure("Hello", &serif, 16.0);
        assert!((w - 40.0).abs() < 0.1, "5 chars × 16 × 0.5, got {w}");

        let mono = m.resolve("monospace", FontWeight::Normal, FontStyle::Normal);
        assert!(m.measure("Hello", &mono, 16.0) > w);
    }
}
