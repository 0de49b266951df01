use std::time::{Duration, Instant};

use crate::scene::{XrFrame, XrSession};

/// Interval used when frames are paced by a timer instead of the display.
pub const FALLBACK_INTERVAL: Duration = Duration::from_millis(16);

/// What drives the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePacing {
    /// Redraw as soon as the display asks for a frame.
    #[default]
    Display,
    /// Redraw on a fixed interval.
    Timer(Duration),
}

impl FramePacing {
    #[must_use]
    pub fn fallback() -> Self {
        Self::Timer(FALLBACK_INTERVAL)
    }
}

/// Frame clock.
///
/// Produces the seconds elapsed between consecutive ticks while running.
/// An XR session can be attached; the clock then asks it for the stereo
/// pose each frame and ends it when stopped.
pub struct Clock {
    start_time: Instant,
    last_tick: Instant,
    running: bool,
    pacing: FramePacing,
    session: Option<Box<dyn XrSession>>,
    /// Time between the last two ticks
    pub delta: Duration,
    /// Time since `start`
    pub elapsed: Duration,
    /// Ticks since `start`
    pub frame_count: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FramePacing::Display)
    }
}

impl Clock {
    #[must_use]
    pub fn new(pacing: FramePacing) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_tick: now,
            running: false,
            pacing,
            session: None,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    #[must_use]
    pub fn pacing(&self) -> FramePacing {
        self.pacing
    }

    pub fn start(&mut self) {
        let now = Instant::now();
        self.start_time = now;
        self.last_tick = now;
        self.delta = Duration::ZERO;
        self.elapsed = Duration::ZERO;
        self.frame_count = 0;
        self.running = true;
    }

    /// Stops ticking and ends the attached XR session, if any.
    pub fn stop(&mut self) {
        self.running = false;
        if let Some(session) = self.session.as_mut()
            && session.is_active()
        {
            log::info!("Ending XR session");
            session.end();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances to now and returns the step in seconds, `None` while stopped.
    pub fn tick(&mut self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    /// Advances to `now`. A `now` earlier than the last tick counts as zero.
    pub fn tick_at(&mut self, now: Instant) -> Option<f32> {
        if !self.running {
            return None;
        }
        self.delta = now.saturating_duration_since(self.last_tick);
        self.elapsed = now.saturating_duration_since(self.start_time);
        self.last_tick = now;
        self.frame_count += 1;
        Some(self.dt_seconds())
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// When the next tick is due under timer pacing.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.pacing {
            FramePacing::Display => None,
            FramePacing::Timer(interval) => Some(self.last_tick + interval),
        }
    }

    pub fn attach_session(&mut self, session: Box<dyn XrSession>) {
        self.session = Some(session);
    }

    pub fn detach_session(&mut self) -> Option<Box<dyn XrSession>> {
        self.session.take()
    }

    #[must_use]
    pub fn session(&self) -> Option<&dyn XrSession> {
        self.session.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn XrSession + 'static)> {
        self.session.as_deref_mut()
    }

    /// Stereo pose for the current tick, if a session is attached and live.
    pub fn xr_frame(&mut self) -> Option<XrFrame> {
        let elapsed = self.elapsed_seconds();
        self.session
            .as_mut()
            .filter(|s| s.is_active())
            .and_then(|s| s.request_frame(elapsed))
    }
}
