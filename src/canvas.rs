use std::{cmp::Ordering, sync::Arc};

use crate::error::{CoverkitError, CoverkitResult};

/// Pixel layout of a canvas: packed 8-bit channels, with or without alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8)
    }
}

/// Resampling filter for [`PixelCanvas::scale`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleFilter {
    Nearest,
    Bilinear,
}

impl ScaleFilter {
    fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Bilinear => image::imageops::FilterType::Triangle,
        }
    }
}

/// Mirror axis for [`PixelCanvas::flip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Counterclockwise rotation in 90-degree increments for
/// [`PixelCanvas::rotate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

// Fill for freshly allocated canvases: transparent white with alpha, white without.
const FILL_RGBA: [u8; 4] = [255, 255, 255, 0];

/// Immutable row-major raster buffer with pure composition operations.
///
/// Every transform returns a new canvas; no operation mutates the receiver.
/// Clones share the pixel buffer, so handing a canvas to a cache or a
/// displayed-frame slot is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    format: PixelFormat,
    bytes: Arc<Vec<u8>>,
}

impl PixelCanvas {
    /// Allocate a background-filled canvas. Zero dimensions are rejected.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> CoverkitResult<Self> {
        let bytes = filled_bytes(width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            bytes: Arc::new(bytes),
        })
    }

    /// Wrap an existing pixel buffer; the length must match the dimensions.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        bytes: Vec<u8>,
    ) -> CoverkitResult<Self> {
        let expected = buffer_len(width, height, format)?;
        if bytes.len() != expected {
            return Err(CoverkitError::validation(format!(
                "pixel buffer has {} bytes, {}x{} {:?} needs {}",
                bytes.len(),
                width,
                height,
                format,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            bytes: Arc::new(bytes),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes, row-major, tightly packed.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Order two canvases by total pixel count (width x height).
    ///
    /// Used by "keep the larger of two covers" policies; deliberately not an
    /// `Ord` impl because equality compares pixel data, not size.
    pub fn cmp_by_size(&self, other: &Self) -> Ordering {
        self.pixel_count().cmp(&other.pixel_count())
    }

    /// Append `other` to the right of `self` with `spacing` background pixels
    /// between them. Result height is the max of both heights, both inputs
    /// painted at y=0. The result takes `self`'s pixel format.
    pub fn concat_horizontal(&self, other: &Self, spacing: u32) -> CoverkitResult<Self> {
        let width = checked_dim(
            u64::from(self.width) + u64::from(spacing) + u64::from(other.width),
        )?;
        let height = self.height.max(other.height);

        let mut bytes = filled_bytes(width, height, self.format)?;
        blit(&mut bytes, width, height, self.format, self, 0, 0);
        blit(
            &mut bytes,
            width,
            height,
            self.format,
            other,
            i64::from(self.width) + i64::from(spacing),
            0,
        );

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Append `other` below `self`; the vertical counterpart of
    /// [`concat_horizontal`](Self::concat_horizontal).
    pub fn concat_vertical(&self, other: &Self, spacing: u32) -> CoverkitResult<Self> {
        let width = self.width.max(other.width);
        let height = checked_dim(
            u64::from(self.height) + u64::from(spacing) + u64::from(other.height),
        )?;

        let mut bytes = filled_bytes(width, height, self.format)?;
        blit(&mut bytes, width, height, self.format, self, 0, 0);
        blit(
            &mut bytes,
            width,
            height,
            self.format,
            other,
            0,
            i64::from(self.height) + i64::from(spacing),
        );

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Tile `self` horizontally: `count` copies with `count - 1` gaps of
    /// `spacing` background pixels. `count` must be >= 1.
    pub fn repeat_horizontal(&self, count: u32, spacing: u32) -> CoverkitResult<Self> {
        if count == 0 {
            return Err(CoverkitError::validation("repeat count must be >= 1"));
        }

        let width = checked_dim(
            u64::from(count) * u64::from(self.width)
                + u64::from(count - 1) * u64::from(spacing),
        )?;
        let height = self.height;

        let mut bytes = filled_bytes(width, height, self.format)?;
        let stride = i64::from(self.width) + i64::from(spacing);
        for n in 0..count {
            blit(
                &mut bytes,
                width,
                height,
                self.format,
                self,
                i64::from(n) * stride,
                0,
            );
        }

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Tile `self` vertically; the vertical counterpart of
    /// [`repeat_horizontal`](Self::repeat_horizontal).
    pub fn repeat_vertical(&self, count: u32, spacing: u32) -> CoverkitResult<Self> {
        if count == 0 {
            return Err(CoverkitError::validation("repeat count must be >= 1"));
        }

        let width = self.width;
        let height = checked_dim(
            u64::from(count) * u64::from(self.height)
                + u64::from(count - 1) * u64::from(spacing),
        )?;

        let mut bytes = filled_bytes(width, height, self.format)?;
        let stride = i64::from(self.height) + i64::from(spacing);
        for n in 0..count {
            blit(
                &mut bytes,
                width,
                height,
                self.format,
                self,
                0,
                i64::from(n) * stride,
            );
        }

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Alpha-blend `other` over a copy of `self` at (0, 0), scaling `other`'s
    /// contribution by `alpha`. The result is sized to the bounding box of
    /// both inputs. Per-pixel alpha must already be encoded in the operands;
    /// alpha-less canvases are treated as fully opaque.
    pub fn composite_over(&self, other: &Self, alpha: u8) -> CoverkitResult<Self> {
        let width = self.width.max(other.width);
        let height = self.height.max(other.height);

        let mut bytes = filled_bytes(width, height, self.format)?;
        blit(&mut bytes, width, height, self.format, self, 0, 0);
        blend_at_origin(&mut bytes, width, height, self.format, other, alpha);

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Shift the pixel content by (dx, dy). Content pushed outside the bounds
    /// is clipped unless `resize` is set, in which case the canvas dimensions
    /// become width+dx and height+dy (which must stay >= 1).
    pub fn translate(&self, dx: i32, dy: i32, resize: bool) -> CoverkitResult<Self> {
        let (width, height) = if resize {
            let w = i64::from(self.width) + i64::from(dx);
            let h = i64::from(self.height) + i64::from(dy);
            if w < 1 || h < 1 {
                return Err(CoverkitError::validation(
                    "translate resize would leave no canvas",
                ));
            }
            (checked_dim(w as u64)?, checked_dim(h as u64)?)
        } else {
            (self.width, self.height)
        };

        let mut bytes = filled_bytes(width, height, self.format)?;
        blit(
            &mut bytes,
            width,
            height,
            self.format,
            self,
            i64::from(dx),
            i64::from(dy),
        );

        Ok(Self {
            width,
            height,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Extract a copy of the rectangle (x, y, w, h).
    pub fn subregion(&self, x: u32, y: u32, w: u32, h: u32) -> CoverkitResult<Self> {
        if w == 0 || h == 0 {
            return Err(CoverkitError::validation(
                "subregion width/height must be > 0",
            ));
        }

        let x_end = x.checked_add(w);
        let y_end = y.checked_add(h);
        let in_bounds = match (x_end, y_end) {
            (Some(xe), Some(ye)) => xe <= self.width && ye <= self.height,
            _ => false,
        };
        if !in_bounds {
            return Err(CoverkitError::out_of_bounds(format!(
                "subregion {w}x{h}+{x}+{y} exceeds source {}x{}",
                self.width, self.height
            )));
        }

        let bpp = self.format.bytes_per_pixel();
        let row_len = (w as usize) * bpp;
        let mut bytes = Vec::with_capacity((h as usize) * row_len);
        for row in y..y + h {
            let start = ((row as usize) * (self.width as usize) + (x as usize)) * bpp;
            bytes.extend_from_slice(&self.bytes[start..start + row_len]);
        }

        Ok(Self {
            width: w,
            height: h,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Resample to exactly (target_w, target_h) with the given filter.
    pub fn scale(
        &self,
        target_w: u32,
        target_h: u32,
        filter: ScaleFilter,
    ) -> CoverkitResult<Self> {
        if target_w == 0 || target_h == 0 {
            return Err(CoverkitError::validation(
                "scale target width/height must be > 0",
            ));
        }
        if target_w == self.width && target_h == self.height {
            return Ok(self.clone());
        }

        let rgba = self.to_rgba_bytes();
        let img = image::RgbaImage::from_raw(self.width, self.height, rgba).ok_or_else(|| {
            CoverkitError::validation("canvas buffer does not match its dimensions")
        })?;
        let resized = image::imageops::resize(&img, target_w, target_h, filter.to_image_filter());

        let bytes = match self.format {
            PixelFormat::Rgba8 => resized.into_raw(),
            PixelFormat::Rgb8 => {
                let mut out = Vec::with_capacity((target_w as usize) * (target_h as usize) * 3);
                for px in resized.into_raw().chunks_exact(4) {
                    out.extend_from_slice(&px[..3]);
                }
                out
            }
        };

        Ok(Self {
            width: target_w,
            height: target_h,
            format: self.format,
            bytes: Arc::new(bytes),
        })
    }

    /// Mirror the content along the given axis.
    pub fn flip(&self, axis: FlipAxis) -> Self {
        let (w, h) = (self.width, self.height);
        match axis {
            FlipAxis::Horizontal => self.permuted(w, h, |x, y| (w - 1 - x, y)),
            FlipAxis::Vertical => self.permuted(w, h, |x, y| (x, h - 1 - y)),
        }
    }

    /// Rotate the content counterclockwise in 90-degree steps.
    pub fn rotate(&self, rotation: Rotation) -> Self {
        let (w, h) = (self.width, self.height);
        match rotation {
            Rotation::Deg90 => self.permuted(h, w, |x, y| (w - 1 - y, x)),
            Rotation::Deg180 => self.permuted(w, h, |x, y| (w - 1 - x, h - 1 - y)),
            Rotation::Deg270 => self.permuted(h, w, |x, y| (y, h - 1 - x)),
        }
    }

    /// Return an `Rgba8` copy. With `substitute` set, pixels whose RGB matches
    /// it become fully transparent; all other pixels keep their alpha (opaque
    /// for alpha-less sources).
    pub fn with_alpha(&self, substitute: Option<[u8; 3]>) -> Self {
        let mut bytes = Vec::with_capacity((self.width as usize) * (self.height as usize) * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut px = self.read_rgba(x, y);
                if let Some(key) = substitute
                    && px[..3] == key
                {
                    px[3] = 0;
                }
                bytes.extend_from_slice(&px);
            }
        }

        Self {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba8,
            bytes: Arc::new(bytes),
        }
    }

    fn read_rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        match self.format {
            PixelFormat::Rgb8 => [self.bytes[idx], self.bytes[idx + 1], self.bytes[idx + 2], 255],
            PixelFormat::Rgba8 => [
                self.bytes[idx],
                self.bytes[idx + 1],
                self.bytes[idx + 2],
                self.bytes[idx + 3],
            ],
        }
    }

    fn to_rgba_bytes(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.bytes.as_ref().clone(),
            PixelFormat::Rgb8 => {
                let mut out =
                    Vec::with_capacity((self.width as usize) * (self.height as usize) * 4);
                for px in self.bytes.chunks_exact(3) {
                    out.extend_from_slice(px);
                    out.push(255);
                }
                out
            }
        }
    }

    fn permuted(&self, out_w: u32, out_h: u32, src_xy: impl Fn(u32, u32) -> (u32, u32)) -> Self {
        let bpp = self.format.bytes_per_pixel();
        let mut bytes = vec![0u8; (out_w as usize) * (out_h as usize) * bpp];
        for y in 0..out_h {
            for x in 0..out_w {
                let (sx, sy) = src_xy(x, y);
                let src = ((sy as usize) * (self.width as usize) + (sx as usize)) * bpp;
                let dst = ((y as usize) * (out_w as usize) + (x as usize)) * bpp;
                bytes[dst..dst + bpp].copy_from_slice(&self.bytes[src..src + bpp]);
            }
        }

        Self {
            width: out_w,
            height: out_h,
            format: self.format,
            bytes: Arc::new(bytes),
        }
    }
}

fn buffer_len(width: u32, height: u32, format: PixelFormat) -> CoverkitResult<usize> {
    if width == 0 || height == 0 {
        return Err(CoverkitError::validation("canvas width/height must be > 0"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| CoverkitError::validation("canvas buffer size overflow"))
}

fn checked_dim(dim: u64) -> CoverkitResult<u32> {
    u32::try_from(dim).map_err(|_| CoverkitError::validation("canvas dimension overflow"))
}

fn filled_bytes(width: u32, height: u32, format: PixelFormat) -> CoverkitResult<Vec<u8>> {
    let len = buffer_len(width, height, format)?;
    let mut bytes = vec![0u8; len];
    match format {
        PixelFormat::Rgb8 => bytes.fill(255),
        PixelFormat::Rgba8 => {
            for px in bytes.chunks_exact_mut(4) {
                px.copy_from_slice(&FILL_RGBA);
            }
        }
    }
    Ok(bytes)
}

fn put_px(dst: &mut [u8], dst_w: u32, format: PixelFormat, x: u32, y: u32, px: [u8; 4]) {
    let bpp = format.bytes_per_pixel();
    let idx = ((y as usize) * (dst_w as usize) + (x as usize)) * bpp;
    dst[idx..idx + bpp].copy_from_slice(&px[..bpp]);
}

fn get_rgba(dst: &[u8], dst_w: u32, format: PixelFormat, x: u32, y: u32) -> [u8; 4] {
    let bpp = format.bytes_per_pixel();
    let idx = ((y as usize) * (dst_w as usize) + (x as usize)) * bpp;
    match format {
        PixelFormat::Rgb8 => [dst[idx], dst[idx + 1], dst[idx + 2], 255],
        PixelFormat::Rgba8 => [dst[idx], dst[idx + 1], dst[idx + 2], dst[idx + 3]],
    }
}

// Clipped pixel copy; converts between formats per pixel (alpha dropped on
// Rgba8 -> Rgb8, forced opaque on Rgb8 -> Rgba8).
fn blit(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    format: PixelFormat,
    src: &PixelCanvas,
    at_x: i64,
    at_y: i64,
) {
    for sy in 0..src.height() {
        let dy = at_y + i64::from(sy);
        if dy < 0 || dy >= i64::from(dst_h) {
            continue;
        }
        for sx in 0..src.width() {
            let dx = at_x + i64::from(sx);
            if dx < 0 || dx >= i64::from(dst_w) {
                continue;
            }
            put_px(dst, dst_w, format, dx as u32, dy as u32, src.read_rgba(sx, sy));
        }
    }
}

// Straight-alpha OVER of `src` onto the buffer at (0, 0), with `src` scaled by
// `overall_alpha` as a whole.
fn blend_at_origin(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    format: PixelFormat,
    src: &PixelCanvas,
    overall_alpha: u8,
) {
    let h = src.height().min(dst_h);
    let w = src.width().min(dst_w);
    for y in 0..h {
        for x in 0..w {
            let sp = src.read_rgba(x, y);
            let sa = mul_div255(u16::from(sp[3]), u16::from(overall_alpha));
            if sa == 0 {
                continue;
            }

            let dp = get_rgba(dst, dst_w, format, x, y);
            let w_src = u16::from(sa);
            let w_dst = u16::from(mul_div255(u16::from(dp[3]), 255 - w_src));
            let out_a = w_src + w_dst;

            let mut out = [0u8; 4];
            for i in 0..3 {
                let numer =
                    u32::from(sp[i]) * u32::from(w_src) + u32::from(dp[i]) * u32::from(w_dst);
                out[i] = ((numer + u32::from(out_a) / 2) / u32::from(out_a)) as u8;
            }
            out[3] = out_a as u8;

            put_px(dst, dst_w, format, x, y, out);
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
