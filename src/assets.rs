//! Asset loading – decodes every image referenced by a tree before layout
//! starts, so all geometry is known before any page math runs.
//!
//! Each source settles independently: a failure is recorded per key and
//! surfaces later as a placeholder box, never as an aborted conversion. The
//! cache is keyed by source identity and safe to reuse when a conversion is
//! retried.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::content::{Content, ImageElement};
use crate::error::{Error, Result};

/// A decoded image with its intrinsic pixel dimensions.
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub px_width: u32,
    pub px_height: u32,
}

/// Per-source image cache with settled success-or-failure entries.
#[derive(Default)]
pub struct AssetStore {
    images: HashMap<String, std::result::Result<ImageAsset, String>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the tree and settle every image source that is not cached yet.
    pub fn preload(&mut self, nodes: &[Content]) {
        for node in nodes {
            match node {
                Content::Image(img) => {
                    if !self.images.contains_key(&img.src) {
                        let loaded = load_image(&img.src).map_err(|e| e.to_string());
                        if let Err(reason) = &loaded {
                            log::warn!("image {:?} failed to load: {reason}", img.src);
                        }
                        self.images.insert(img.src.clone(), loaded);
                    }
                }
                Content::Span(e)
                | Content::Block(e)
                | Content::ListItem(e)
                | Content::Rule(e)
                | Content::Header(e)
                | Content::Footer(e) => self.preload(&e.children),
                Content::List(l) => self.preload(&l.children),
                Content::Text(_) | Content::LineBreak | Content::Table(_) => {}
            }
        }
    }

    /// Settled entry for a source; loading failures come back as
    /// [`Error::AssetLoad`].
    pub fn get(&self, src: &str) -> Result<&ImageAsset> {
        match self.images.get(src) {
            Some(Ok(asset)) => Ok(asset),
            Some(Err(reason)) => Err(Error::AssetLoad {
                src: src.to_string(),
                reason: reason.clone(),
            }),
            None => Err(Error::AssetLoad {
                src: src.to_string(),
                reason: "not preloaded".to_string(),
            }),
        }
    }

    pub fn dimensions(&self, src: &str) -> Option<(u32, u32)> {
        match self.images.get(src) {
            Some(Ok(asset)) => Some((asset.px_width, asset.px_height)),
            _ => None,
        }
    }
}

/// Decode a `data:<mime>;base64,<data>` image source.
fn load_image(src: &str) -> Result<ImageAsset> {
    let bytes = parse_data_uri(src)?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| Error::AssetLoad {
        src: src.to_string(),
        reason: format!("decode error: {e}"),
    })?;
    Ok(ImageAsset {
        px_width: decoded.width(),
        px_height: decoded.height(),
        bytes,
    })
}

/// Parse a base64 data URI into raw bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>> {
    let fail = |reason: String| Error::AssetLoad {
        src: src.to_string(),
        reason,
    };
    if !src.starts_with("data:") {
        return Err(fail(
            "image src must be a base64 data URI (e.g. `data:image/png;base64,...`)".to_string(),
        ));
    }
    let rest = &src["data:".len()..];
    let comma = rest
        .find(',')
        .ok_or_else(|| fail("missing `,` separator between header and data".to_string()))?;
    let header = &rest[..comma];
    if !header.contains(";base64") {
        return Err(fail("only base64-encoded data URIs are supported".to_string()));
    }
    BASE64_STD
        .decode(rest[comma + 1..].trim())
        .map_err(|e| fail(format!("base64 decode error: {e}")))
}

/// Resolve the drawn pt dimensions of an image element: explicit px sizes
/// win, a single known dimension derives the other from the intrinsic
/// aspect ratio, and the result is clamped (aspect kept) to the frame.
pub fn resolve_dimensions(
    img: &ImageElement,
    store: &AssetStore,
    px_to_pt: f32,
    max_width: f32,
) -> (f32, f32) {
    let intrinsic = store.dimensions(&img.src);
    let aspect = intrinsic
        .filter(|(w, h)| *w > 0 && *h > 0)
        .map(|(w, h)| w as f32 / h as f32)
        .unwrap_or(1.0);

    let known_w = img.width.map(|w| w * px_to_pt);
    let known_h = img.height.map(|h| h * px_to_pt);

    let (mut w, mut h) = match (known_w, known_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w / aspect).max(1.0)),
        (None, Some(h)) => ((h * aspect).max(1.0), h),
        (None, None) => match intrinsic {
            Some((pw, ph)) => (pw as f32 * px_to_pt, ph as f32 * px_to_pt),
            // Nothing known: a visible placeholder-sized box.
            None => (120.0, 90.0),
        },
    };

    if w > max_width && w > 0.0 {
        let scale = max_width / w;
        w *= scale;
        h *= scale;
    }
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Style;

    /// 1×1 transparent PNG.
    pub(crate) const TINY_PNG_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn tiny_png_uri() -> String {
        format!("data:image/png;base64,{TINY_PNG_B64}")
    }

    #[test]
    fn preload_settles_good_and_bad_sources_independently() {
        let good = tiny_png_uri();
        let nodes = vec![
            Content::Image(ImageElement {
                style: Style::default(),
                src: good.clone(),
                width: None,
                height: None,
            }),
            Content::Image(ImageElement {
                style: Style::default(),
                src: "http://example.com/x.png".to_string(),
                width: None,
                height: None,
            }),
        ];
        let mut store = AssetStore::new();
        store.preload(&nodes);

        assert_eq!(store.dimensions(&good), Some((1, 1)));
        assert!(store.get("http://example.com/x.png").is_err());
    }

    #[test]
    fn rejects_non_base64_uris() {
        assert!(parse_data_uri("data:text/plain,hello").is_err());
        assert!(parse_data_uri("file.png").is_err());
    }

    #[test]
    fn aspect_completion_from_one_known_dimension() {
        let mut store = AssetStore::new();
        let src = tiny_png_uri();
        store.preload(&[Content::Image(ImageElement {
            style: Style::default(),
            src: src.clone(),
            width: None,
            height: None,
        })]);

        let img = ImageElement {
            style: Style::default(),
            src,
            width: Some(100.0),
            height: None,
        };
        // 1:1 aspect; width 100 px = 75 pt at the default scale.
        let (w, h) = resolve_dimensions(&img, &store, 0.75, 500.0);
        assert!((w - 75.0).abs() < 0.01);
        assert!((h - 75.0).abs() < 0.01);
    }

    #[test]
    fn oversized_images_clamp_to_frame_width() {
        let store = AssetStore::new();
        let img = ImageElement {
            style: Style::default(),
            src: "data:none".to_string(),
            width: Some(2000.0),
            height: Some(1000.0),
        };
        let (w, h) = resolve_dimensions(&img, &store, 0.75, 500.0);
        assert!((w - 500.0).abs() < 0.01);
        assert!((h - 500.0 / 1.5).abs() < 0.1);
    }
}
