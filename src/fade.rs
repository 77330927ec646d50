use std::time::Duration;

use tracing::debug;

use crate::{
    canvas::{PixelCanvas, ScaleFilter},
    error::{CoverkitError, CoverkitResult},
};

/// Opacity change applied on every fade-in/fade-out tick.
const FADE_STEP: f32 = 0.1;

/// Fade preferences, mirroring the player's cover-display settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    /// Animate show/hide/cross-fade; when off, requests apply instantly.
    pub fading: bool,
    /// Interval the host timer should use between ticks.
    pub tick_interval_ms: u64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fading: false,
            tick_interval_ms: 50,
        }
    }
}

/// Generation stamp tying a host timer to the transition that started it.
///
/// A token goes stale as soon as its transition completes, is cancelled, or is
/// superseded; ticking with a stale token is a silent no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickToken(u64);

/// Instruction to the host event loop: tick the scheduler with `token` at
/// `interval` until a tick reports [`Tick::Stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickRequest {
    pub token: TickToken,
    pub interval: Duration,
}

/// Outcome of a tick: keep the timer running or stop it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

#[derive(Clone, Debug)]
enum Phase {
    Idle,
    FadingIn,
    FadingOut,
    CrossFading {
        step: u32,
        total: u32,
        target: PixelCanvas,
    },
}

/// Single-threaded fade state machine for a cover display surface.
///
/// The scheduler owns no timer itself: each `request_*` call may return a
/// [`TickRequest`] asking the host event loop to start ticking, and every
/// [`tick`](Self::tick) tells the host whether to keep going. At most one
/// transition is active at a time; a new request of a different kind
/// supersedes the active one and continues from the current opacity and
/// frame, while a request of the same kind as the active transition is
/// dropped, so the host never ends up with two live timers.
#[derive(Debug)]
pub struct FadeScheduler {
    config: FadeConfig,
    phase: Phase,
    opacity: f32,
    visible: bool,
    frame: Option<PixelCanvas>,
    generation: u64,
}

impl FadeScheduler {
    pub fn new(config: FadeConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            opacity: 0.0,
            visible: false,
            frame: None,
            generation: 0,
        }
    }

    /// Current surface opacity in [0, 1].
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The frame the surface should display right now, if any.
    pub fn frame(&self) -> Option<&PixelCanvas> {
        self.frame.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Show `frame`, fading in from opacity zero. Dropped if a fade-in is
    /// already running; superseding an in-flight fade-out instead resumes
    /// upward from the current opacity.
    pub fn request_show(&mut self, frame: PixelCanvas) -> Option<TickRequest> {
        if !self.config.fading {
            self.supersede();
            self.frame = Some(frame);
            self.visible = true;
            self.opacity = 1.0;
            return None;
        }

        if matches!(self.phase, Phase::FadingIn) {
            return None;
        }

        let resuming = matches!(self.phase, Phase::FadingOut);
        self.supersede();
        if !resuming {
            self.opacity = 0.0;
        }
        self.visible = true;
        self.frame = Some(frame);
        self.phase = Phase::FadingIn;
        Some(self.tick_request())
    }

    /// Hide the surface, fading out from the current opacity. Dropped if a
    /// fade-out is already running; on a hidden idle surface this only clears
    /// any leftover frame.
    pub fn request_hide(&mut self) -> Option<TickRequest> {
        if !self.config.fading {
            self.supersede();
            self.visible = false;
            self.frame = None;
            return None;
        }

        if matches!(self.phase, Phase::FadingOut) {
            return None;
        }
        if !self.visible && matches!(self.phase, Phase::Idle) {
            self.frame = None;
            return None;
        }

        self.supersede();
        self.phase = Phase::FadingOut;
        Some(self.tick_request())
    }

    /// Cross-fade from the displayed frame to `next` over `steps` ticks.
    ///
    /// Dropped if a cross-fade is already running. Without a settled base (no
    /// frame, hidden surface, or a fade in flight) the request degrades: a
    /// running fade-in keeps its timer and simply swaps the pending frame,
    /// anything else behaves as [`request_show`](Self::request_show). The
    /// displayed frame is pre-scaled to `next`'s dimensions before the first
    /// blend; the final step composites at alpha 255, so the sequence ends
    /// pixel-equal to an opaque `next`.
    pub fn request_cross_fade(
        &mut self,
        next: PixelCanvas,
        steps: u32,
    ) -> CoverkitResult<Option<TickRequest>> {
        if steps == 0 {
            return Err(CoverkitError::validation("cross-fade steps must be > 0"));
        }
        if matches!(self.phase, Phase::CrossFading { .. }) {
            return Ok(None);
        }

        if !self.config.fading {
            self.supersede();
            self.frame = Some(next);
            self.visible = true;
            self.opacity = 1.0;
            return Ok(None);
        }

        if matches!(self.phase, Phase::FadingIn) {
            self.frame = Some(next);
            return Ok(None);
        }

        let settled = self.visible
            && self.opacity >= 1.0
            && matches!(self.phase, Phase::Idle)
            && self.frame.is_some();
        if !settled {
            return Ok(self.request_show(next));
        }

        let base = self
            .frame
            .take()
            .ok_or_else(|| CoverkitError::validation("cross-fade without a displayed frame"))?;
        self.frame = Some(base.scale(next.width(), next.height(), ScaleFilter::Bilinear)?);

        self.supersede();
        self.phase = Phase::CrossFading {
            step: 0,
            total: steps,
            target: next,
        };
        Ok(Some(self.tick_request()))
    }

    /// Advance the active transition by one step. Stale tokens (from a
    /// completed, superseded, or cancelled transition) are ignored and report
    /// [`Tick::Stop`] so the host tears its timer down.
    pub fn tick(&mut self, token: TickToken) -> Tick {
        if token.0 != self.generation {
            return Tick::Stop;
        }

        match &mut self.phase {
            Phase::Idle => Tick::Stop,
            Phase::FadingIn => {
                self.opacity = (self.opacity + FADE_STEP).min(1.0);
                // Snap against f32 accumulation so 10 steps of 0.1 land on 1.0.
                if self.opacity + 1e-6 >= 1.0 {
                    self.opacity = 1.0;
                    self.phase = Phase::Idle;
                    Tick::Stop
                } else {
                    Tick::Continue
                }
            }
            Phase::FadingOut => {
                self.opacity = (self.opacity - FADE_STEP).max(0.0);
                if self.opacity <= 1e-6 {
                    self.opacity = 0.0;
                    self.visible = false;
                    self.frame = None;
                    self.phase = Phase::Idle;
                    Tick::Stop
                } else {
                    Tick::Continue
                }
            }
            Phase::CrossFading { step, total, target } => {
                *step += 1;
                let alpha =
                    ((255.0 * f64::from(*step) / f64::from(*total)).round() as u32).min(255) as u8;

                let blended = match &self.frame {
                    Some(base) => base.composite_over(target, alpha),
                    None => Err(CoverkitError::validation(
                        "cross-fade lost its displayed frame",
                    )),
                };
                match blended {
                    Ok(canvas) => self.frame = Some(canvas),
                    Err(err) => {
                        debug!(%err, "cross-fade step failed, abandoning transition");
                        self.phase = Phase::Idle;
                        return Tick::Stop;
                    }
                }

                if *step >= *total {
                    self.phase = Phase::Idle;
                    Tick::Stop
                } else {
                    Tick::Continue
                }
            }
        }
    }

    /// Invalidate every outstanding token and return to idle. Opacity,
    /// visibility, and the displayed frame are left as they are.
    pub fn cancel(&mut self) {
        self.supersede();
    }

    fn supersede(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            debug!(phase = ?self.phase, "superseding active transition");
        }
        self.generation += 1;
        self.phase = Phase::Idle;
    }

    fn tick_request(&self) -> TickRequest {
        TickRequest {
            token: TickToken(self.generation),
            interval: Duration::from_millis(self.config.tick_interval_ms),
        }
    }
}
