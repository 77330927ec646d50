use crate::{
    canvas::PixelCanvas,
    error::{CoverkitError, CoverkitResult},
};

/// Pre-rendered "k active of m" rating strips, indexed by rating value.
///
/// All `maximum + 1` strips are composed once at build time; lookups are pure.
/// When the maximum-rating preference changes, the whole cache is rebuilt;
/// partial invalidation is not supported. The cache is an explicitly
/// constructed value owned by whoever composes the display layer, not a
/// process-wide singleton.
#[derive(Clone, Debug)]
pub struct RatingIconCache {
    active: PixelCanvas,
    inactive: PixelCanvas,
    maximum: u32,
    strips: Vec<PixelCanvas>,
}

impl RatingIconCache {
    /// Compose the strip family from one active and one inactive glyph.
    ///
    /// The glyphs must share identical dimensions; a mismatch is reported
    /// here, once, never at lookup time. `maximum` must be >= 1.
    pub fn build(
        active: PixelCanvas,
        inactive: PixelCanvas,
        maximum: u32,
    ) -> CoverkitResult<Self> {
        if maximum == 0 {
            return Err(CoverkitError::validation("maximum rating must be >= 1"));
        }
        if (active.width(), active.height()) != (inactive.width(), inactive.height()) {
            return Err(CoverkitError::validation(format!(
                "rating icons must share dimensions: active is {}x{}, inactive is {}x{}",
                active.width(),
                active.height(),
                inactive.width(),
                inactive.height()
            )));
        }

        let strips = compose_strips(&active, &inactive, maximum)?;
        Ok(Self {
            active,
            inactive,
            maximum,
            strips,
        })
    }

    /// The strip for `rating`, clamped to [0, maximum]. Pure lookup.
    pub fn get(&self, rating: i32) -> &PixelCanvas {
        let idx = rating.clamp(0, self.maximum as i32) as usize;
        &self.strips[idx]
    }

    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    /// Drop every strip and regenerate the family for a new maximum. The
    /// configuration-change hook; there is no partial update.
    pub fn rebuild(&mut self, maximum: u32) -> CoverkitResult<()> {
        if maximum == 0 {
            return Err(CoverkitError::validation("maximum rating must be >= 1"));
        }
        self.strips = compose_strips(&self.active, &self.inactive, maximum)?;
        self.maximum = maximum;
        Ok(())
    }
}

fn compose_strips(
    active: &PixelCanvas,
    inactive: &PixelCanvas,
    maximum: u32,
) -> CoverkitResult<Vec<PixelCanvas>> {
    let mut strips = Vec::with_capacity(maximum as usize + 1);
    for k in 0..=maximum {
        let strip = if k == 0 {
            inactive.repeat_horizontal(maximum, 0)?
        } else if k == maximum {
            active.repeat_horizontal(maximum, 0)?
        } else {
            active
                .repeat_horizontal(k, 0)?
                .concat_horizontal(&inactive.repeat_horizontal(maximum - k, 0)?, 0)?
        };
        strips.push(strip);
    }
    Ok(strips)
}
