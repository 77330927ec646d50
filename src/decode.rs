use std::io::Cursor;

use anyhow::Context as _;

use crate::{
    canvas::{PixelCanvas, PixelFormat, ScaleFilter},
    error::{CoverkitError, CoverkitResult},
};

/// How a decoded cover is fitted to a requested display size.
///
/// Mirrors the player's cover preferences: `keep_ratio` fits the image inside
/// `target` without distortion, `upscale` permits growing past native size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScalePolicy {
    pub target: (u32, u32),
    pub keep_ratio: bool,
    pub upscale: bool,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            target: (200, 200),
            keep_ratio: true,
            upscale: false,
        }
    }
}

/// Final dimensions for a `native`-sized image under `policy`.
///
/// With `keep_ratio`, the scale factor is `min(tw/nw, th/nh)`; it is applied
/// when it shrinks the image, or when it grows it and upscaling is allowed,
/// otherwise the native size is kept. Without `keep_ratio`, the exact target
/// is forced when upscaling is allowed; when it is not, the result is a
/// square of side `max(nw, nh)`.
pub fn resolve_target(native: (u32, u32), policy: &ScalePolicy) -> (u32, u32) {
    let (nw, nh) = native;
    let (tw, th) = policy.target;

    if policy.keep_ratio {
        let scale = (f64::from(tw) / f64::from(nw)).min(f64::from(th) / f64::from(nh));
        if scale <= 1.0 || policy.upscale {
            let w = (f64::from(nw) * scale).round().max(1.0) as u32;
            let h = (f64::from(nh) * scale).round().max(1.0) as u32;
            (w, h)
        } else {
            (nw, nh)
        }
    } else if policy.upscale {
        (tw, th)
    } else {
        let side = nw.max(nh);
        (side, side)
    }
}

/// Read the native dimensions from the stream header without decoding pixels.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn probe_dimensions(bytes: &[u8]) -> CoverkitResult<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("probe image format")?;
    let dims = reader
        .into_dimensions()
        .map_err(|e| CoverkitError::decode(format!("read image header: {e}")))?;
    Ok(dims)
}

/// Decode at native size. Sources carrying an alpha channel decode to
/// [`PixelFormat::Rgba8`], alpha-less sources to [`PixelFormat::Rgb8`].
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode_from_bytes(bytes: &[u8]) -> CoverkitResult<PixelCanvas> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| CoverkitError::decode(format!("decode image from memory: {e}")))?;

    if dyn_img.color().has_alpha() {
        let rgba = dyn_img.to_rgba8();
        let (w, h) = rgba.dimensions();
        PixelCanvas::from_raw(w, h, PixelFormat::Rgba8, rgba.into_raw())
    } else {
        let rgb = dyn_img.to_rgb8();
        let (w, h) = rgb.dimensions();
        PixelCanvas::from_raw(w, h, PixelFormat::Rgb8, rgb.into_raw())
    }
}

/// Decode with a size-hint step: `hint` is invoked exactly once with the
/// native dimensions read from the header, before pixel data is materialized.
/// Returning `Some(target)` yields a bilinear-scaled result; `None` keeps the
/// native size.
///
/// The `image` crate has no decode-time scaling, so a requested target still
/// costs a full native decode followed by a resize; the hint saves the caller
/// a round trip, not the intermediate buffer.
pub fn decode_with_size_hint(
    bytes: &[u8],
    hint: impl FnOnce(u32, u32) -> Option<(u32, u32)>,
) -> CoverkitResult<PixelCanvas> {
    let (nw, nh) = probe_dimensions(bytes)?;
    let target = hint(nw, nh);

    let canvas = decode_from_bytes(bytes)?;
    match target {
        Some((tw, th)) if (tw, th) != (nw, nh) => canvas.scale(tw, th, ScaleFilter::Bilinear),
        _ => Ok(canvas),
    }
}

/// Decode and fit in one pass: header probe, policy resolution, then a single
/// scaled decode.
pub fn decode_scaled(bytes: &[u8], policy: &ScalePolicy) -> CoverkitResult<PixelCanvas> {
    decode_with_size_hint(bytes, |nw, nh| {
        let target = resolve_target((nw, nh), policy);
        (target != (nw, nh)).then_some(target)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        let mut raw = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            raw.extend_from_slice(&px);
        }
        let img = image::RgbaImage::from_raw(width, height, raw).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn probe_reads_header_dimensions() {
        let bytes = png_bytes(7, 3, [1, 2, 3, 255]);
        assert_eq!(probe_dimensions(&bytes).unwrap(), (7, 3));
    }

    #[test]
    fn probe_rejects_garbage() {
        let err = probe_dimensions(b"not an image").unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn decode_picks_format_from_alpha() {
        let rgba = decode_from_bytes(&png_bytes(2, 2, [9, 9, 9, 128])).unwrap();
        assert_eq!(rgba.format(), PixelFormat::Rgba8);

        let mut buf = Vec::new();
        let img = image::RgbImage::from_raw(2, 2, vec![5u8; 12]).unwrap();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let rgb = decode_from_bytes(&buf).unwrap();
        assert_eq!(rgb.format(), PixelFormat::Rgb8);
    }

    #[test]
    fn decode_failure_is_a_decode_error() {
        let err = decode_from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, CoverkitError::Decode(_)));
    }

    #[test]
    fn size_hint_sees_native_dimensions_once() {
        let bytes = png_bytes(8, 4, [1, 2, 3, 255]);
        let mut calls = 0;
        let canvas = decode_with_size_hint(&bytes, |w, h| {
            calls += 1;
            assert_eq!((w, h), (8, 4));
            Some((4, 2))
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!((canvas.width(), canvas.height()), (4, 2));
    }

    #[test]
    fn size_hint_none_keeps_native_size() {
        let bytes = png_bytes(8, 4, [1, 2, 3, 255]);
        let canvas = decode_with_size_hint(&bytes, |_, _| None).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (8, 4));
    }

    #[test]
    fn resolve_target_keep_ratio_shrinks() {
        let policy = ScalePolicy {
            target: (200, 200),
            keep_ratio: true,
            upscale: false,
        };
        assert_eq!(resolve_target((400, 100), &policy), (200, 50));
    }

    #[test]
    fn resolve_target_keep_ratio_refuses_upscale() {
        let policy = ScalePolicy {
            target: (200, 200),
            keep_ratio: true,
            upscale: false,
        };
        assert_eq!(resolve_target((50, 80), &policy), (50, 80));
    }

    #[test]
    fn resolve_target_keep_ratio_upscales_when_allowed() {
        let policy = ScalePolicy {
            target: (200, 200),
            keep_ratio: true,
            upscale: true,
        };
        assert_eq!(resolve_target((50, 100), &policy), (100, 200));
    }

    #[test]
    fn resolve_target_exact_when_ratio_ignored_and_upscaling() {
        let policy = ScalePolicy {
            target: (200, 120),
            keep_ratio: false,
            upscale: true,
        };
        assert_eq!(resolve_target((30, 400), &policy), (200, 120));
    }

    #[test]
    fn resolve_target_square_when_ratio_ignored_without_upscale() {
        let policy = ScalePolicy {
            target: (200, 120),
            keep_ratio: false,
            upscale: false,
        };
        assert_eq!(resolve_target((30, 400), &policy), (400, 400));
    }

    #[test]
    fn decode_scaled_applies_policy() {
        let bytes = png_bytes(400, 100, [10, 20, 30, 255]);
        let canvas = decode_scaled(&bytes, &ScalePolicy::default()).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (200, 50));
    }

    #[test]
    fn policy_serde_round_trip_with_defaults() {
        let policy: ScalePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ScalePolicy::default());

        let json = serde_json::to_string(&ScalePolicy {
            target: (64, 64),
            keep_ratio: false,
            upscale: true,
        })
        .unwrap();
        let back: ScalePolicy = serde_json::from_str(&json).unwrap();
        assert!(!back.keep_ratio && back.upscale);
    }
}
