use std::io::Cursor;

use coverkit::{RatingIconCache, decode_from_bytes};

fn glyph_png(px: [u8; 4]) -> Vec<u8> {
    let mut raw = Vec::new();
    for _ in 0..16 * 16 {
        raw.extend_from_slice(&px);
    }
    let img = image::RgbaImage::from_raw(16, 16, raw).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn strips_built_from_decoded_glyphs() {
    let active = decode_from_bytes(&glyph_png([255, 190, 0, 255])).unwrap();
    let inactive = decode_from_bytes(&glyph_png([80, 80, 80, 255])).unwrap();

    let cache = RatingIconCache::build(active.clone(), inactive.clone(), 5).unwrap();

    assert_eq!(cache.get(0), &inactive.repeat_horizontal(5, 0).unwrap());
    assert_eq!(cache.get(5), &active.repeat_horizontal(5, 0).unwrap());

    let three = active
        .repeat_horizontal(3, 0)
        .unwrap()
        .concat_horizontal(&inactive.repeat_horizontal(2, 0).unwrap(), 0)
        .unwrap();
    assert_eq!(cache.get(3), &three);

    // Every strip spans the full row of glyphs.
    for rating in 0..=5 {
        assert_eq!(cache.get(rating).width(), 16 * 5);
        assert_eq!(cache.get(rating).height(), 16);
    }
}

#[test]
fn lookup_never_recomposes() {
    let active = decode_from_bytes(&glyph_png([255, 190, 0, 255])).unwrap();
    let inactive = decode_from_bytes(&glyph_png([80, 80, 80, 255])).unwrap();
    let cache = RatingIconCache::build(active, inactive, 5).unwrap();

    // Identical references come back for repeated lookups of one rating.
    let a = cache.get(2) as *const _;
    let b = cache.get(2) as *const _;
    assert_eq!(a, b);
}
