use crate::core::fixed::FixedTime;
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/* ============================== Public API ============================== */

pub const SECTORS_PER_SECOND: u32 = 75;

// Output latency between the drive reporting a sector and it being audible.
pub const DEFAULT_LATENCY: FixedTime = FixedTime::from_f64(0.025);
// How far past the last report the local estimate is allowed to run.
pub const DEFAULT_EXTRAP_WINDOW: FixedTime = FixedTime::from_f64(1.5);

/// One packed BCD byte (`0x59` = 59).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bcd(pub u8);

impl Bcd {
    #[inline(always)]
    pub const fn dec(self) -> u32 {
        ((self.0 >> 4) as u32) * 10 + (self.0 & 0x0F) as u32
    }

    #[inline(always)]
    pub const fn from_dec(v: u8) -> Self {
        Self(((v / 10) << 4) | (v % 10))
    }
}

/// Position report as delivered by the drive while playing digital audio.
/// Bit 7 of the second byte flags an absolute position; without it the
/// report is not authoritative and gets dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaReport {
    pub minute: Bcd,
    pub second: Bcd,
    pub sector: Bcd,
}

impl DaReport {
    pub const ABSOLUTE_FLAG: u8 = 0x80;

    pub fn from_sectors(sectors: u32, absolute: bool) -> Self {
        let minute = (sectors / (60 * SECTORS_PER_SECOND)).min(99) as u8;
        let second = ((sectors / SECTORS_PER_SECOND) % 60) as u8;
        let sector = (sectors % SECTORS_PER_SECOND) as u8;
        let flag = if absolute { Self::ABSOLUTE_FLAG } else { 0 };
        Self {
            minute: Bcd::from_dec(minute),
            second: Bcd(Bcd::from_dec(second).0 | flag),
            sector: Bcd::from_dec(sector),
        }
    }

    #[inline(always)]
    pub const fn is_absolute(&self) -> bool {
        self.second.0 & Self::ABSOLUTE_FLAG != 0
    }

    pub const fn sectors(&self) -> u32 {
        let second = Bcd(self.second.0 & !Self::ABSOLUTE_FLAG);
        self.minute.dec() * 60 * SECTORS_PER_SECOND
            + second.dec() * SECTORS_PER_SECOND
            + self.sector.dec()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndAction {
    Stop,
    Loop,
}

/// Drive-side collaborator. Requests are fire-and-forget; the drive answers
/// asynchronously through [`AudioTimeTracker::report`] and
/// [`AudioTimeTracker::on_track_end`].
pub trait AudioControl {
    fn play_track(&mut self, track: u8);

    fn seek_track_start(&mut self, _track: u8) {}

    /// Gives a software drive the chance to deliver whatever it produced
    /// during the last `dt`. Hardware-backed drives deliver from their IRQ
    /// handler instead and leave this empty.
    fn poll(&mut self, _dt: FixedTime, _tracker: &AudioTimeTracker) {}
}

/// Silent drive: accepts requests, never reports.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct NullAudio;

#[cfg(test)]
impl AudioControl for NullAudio {
    fn play_track(&mut self, track: u8) {
        debug!("NullAudio: play track {track}");
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackTimes {
    pub raw: FixedTime,
    pub extrap: FixedTime,
    pub track: FixedTime,
}

/// Reconciles sparse drive reports with a locally extrapolated clock.
///
/// The three times are written from both the frame loop (`tick`) and the
/// report path (`report`, `on_track_end`), so every access happens under
/// the lock. Critical sections are a few field writes long.
#[derive(Debug)]
pub struct AudioTimeTracker {
    times: Mutex<TrackTimes>,
    cur_track: AtomicU8,
    looping: AtomicBool,
    ended: AtomicBool,
    latency: FixedTime,
    extrap_window: FixedTime,
}

impl Default for AudioTimeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY, DEFAULT_EXTRAP_WINDOW)
    }
}

impl AudioTimeTracker {
    pub fn new(latency: FixedTime, extrap_window: FixedTime) -> Self {
        Self {
            times: Mutex::new(TrackTimes::default()),
            cur_track: AtomicU8::new(0),
            looping: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            latency,
            extrap_window,
        }
    }

    #[inline(always)]
    fn lock(&self) -> MutexGuard<'_, TrackTimes> {
        self.times.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn play_track(&self, track: u8, end: EndAction, audio: &mut dyn AudioControl) {
        *self.lock() = TrackTimes::default();
        self.cur_track.store(track, Ordering::Relaxed);
        self.looping.store(end == EndAction::Loop, Ordering::Relaxed);
        self.ended.store(false, Ordering::Relaxed);
        info!("Playing track {track} ({end:?} at end).");
        audio.play_track(track);
    }

    /// Report handler. Returns whether the report was taken as authoritative.
    pub fn report(&self, report: &DaReport) -> bool {
        if !report.is_absolute() {
            trace!("Ignoring relative DA report {report:?}");
            return false;
        }
        let sectors = report.sectors();
        let raw = FixedTime::from_ratio(sectors as i32, SECTORS_PER_SECOND as i32) + self.latency;
        let mut times = self.lock();
        times.raw = raw;
        times.extrap = raw;
        true
    }

    pub fn tick(&self, dt: FixedTime) -> FixedTime {
        let mut times = self.lock();
        if times.extrap < times.raw + self.extrap_window {
            times.extrap += dt;
        }
        if times.track < times.extrap {
            times.track = times.extrap;
        }
        times.track
    }

    /// End-of-track handler. Looping tracks restart from zero; anything else
    /// is flagged as finished and left alone.
    pub fn on_track_end(&self, audio: &mut dyn AudioControl) {
        let track = self.current_track();
        if !self.looping.load(Ordering::Relaxed) {
            self.ended.store(true, Ordering::Relaxed);
            debug!("Track {track} ended.");
            return;
        }
        *self.lock() = TrackTimes::default();
        debug!("Track {track} looped.");
        audio.play_track(track);
    }

    pub fn times(&self) -> TrackTimes {
        *self.lock()
    }

    #[cfg(test)]
    pub fn track_time(&self) -> FixedTime {
        self.lock().track
    }

    /// Set once a non-looping track has played out.
    #[inline(always)]
    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn current_track(&self) -> u8 {
        self.cur_track.load(Ordering::Relaxed)
    }
}

/* ============================ Software drive ============================ */

pub const DEFAULT_REPORT_INTERVAL_SECTORS: u32 = 15;

/// Software stand-in for a CD drive streaming digital audio. Plays tracks in
/// real time against the frame clock and emits position reports every
/// `report_interval`, alternating relative and absolute ones.
#[derive(Debug)]
pub struct SimulatedDrive {
    track_lengths: Vec<FixedTime>,
    playing: Option<u8>,
    position: FixedTime,
    since_report: FixedTime,
    report_interval: FixedTime,
    next_absolute: bool,
}

impl SimulatedDrive {
    pub fn new(track_lengths: Vec<FixedTime>, report_interval_sectors: u32) -> Self {
        Self {
            track_lengths,
            playing: None,
            position: FixedTime::ZERO,
            since_report: FixedTime::ZERO,
            report_interval: FixedTime::from_ratio(
                report_interval_sectors.max(1) as i32,
                SECTORS_PER_SECOND as i32,
            ),
            next_absolute: true,
        }
    }

    #[cfg(test)]
    pub const fn playing(&self) -> Option<u8> {
        self.playing
    }

    fn track_length(&self, track: u8) -> FixedTime {
        self.track_lengths
            .get(track as usize)
            .copied()
            .unwrap_or(FixedTime::MAX)
    }
}

impl AudioControl for SimulatedDrive {
    fn play_track(&mut self, track: u8) {
        self.playing = Some(track);
        self.position = FixedTime::ZERO;
        self.since_report = FixedTime::ZERO;
        self.next_absolute = true;
    }

    fn seek_track_start(&mut self, track: u8) {
        debug!("SimulatedDrive: seek to start of track {track}");
    }

    fn poll(&mut self, dt: FixedTime, tracker: &AudioTimeTracker) {
        let Some(track) = self.playing else {
            return;
        };
        self.position += dt;
        self.since_report += dt;
        while self.since_report >= self.report_interval {
            self.since_report -= self.report_interval;
            let at = self.position - self.since_report;
            let sectors = (at.mul_int(SECTORS_PER_SECOND as i32)).floor_int().max(0) as u32;
            tracker.report(&DaReport::from_sectors(sectors, self.next_absolute));
            self.next_absolute = !self.next_absolute;
        }
        if self.position >= self.track_length(track) {
            self.playing = None;
            tracker.on_track_end(self);
        }
    }
}
