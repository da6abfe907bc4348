use crate::core::fixed::FixedTime;
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

pub const DEFAULT_TIMER_HZ: u32 = 100;

/// Tick counter bumped from interrupt context (a timer thread, or a test).
#[derive(Debug, Default)]
pub struct TickSource {
    tick: AtomicU32,
}

impl TickSource {
    pub const fn new() -> Self {
        Self {
            tick: AtomicU32::new(0),
        }
    }

    #[inline(always)]
    pub fn interrupt(&self) {
        self.tick.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    pub fn ticks(&self) -> u32 {
        self.tick.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.tick.store(0, Ordering::Release);
    }
}

/// Monotonic frame clock. `update()` is called exactly once per frame and
/// returns the time elapsed since the previous call.
#[derive(Debug)]
pub struct FixedClock {
    source: Arc<TickSource>,
    hz: u32,
    last_tick: u32,
}

impl FixedClock {
    pub fn new(hz: u32) -> Self {
        Self {
            source: Arc::new(TickSource::new()),
            hz: hz.max(1),
            last_tick: 0,
        }
    }

    pub fn source(&self) -> Arc<TickSource> {
        Arc::clone(&self.source)
    }

    pub fn start(&mut self) {
        self.source.reset();
        self.last_tick = 0;
    }

    pub fn get_time(&self) -> FixedTime {
        FixedTime::from_int(self.source.ticks() as i32) / self.hz as i32
    }

    pub fn update(&mut self) -> FixedTime {
        let now_tick = self.source.ticks();
        // Counter may wrap; the difference never goes negative.
        let delta_tick = now_tick.wrapping_sub(self.last_tick);
        self.last_tick = now_tick;
        FixedTime::from_ratio(delta_tick as i32, self.hz as i32)
    }
}

/// Handle to a background thread standing in for the hardware timer IRQ.
pub struct TimerThread {
    thread: Option<thread::JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl TimerThread {
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.halt();
    }
}

pub fn spawn_timer_thread(source: Arc<TickSource>, hz: u32) -> TimerThread {
    let stop_signal = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_signal);
    let period = Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)));
    let thread = thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(period);
            source.interrupt();
        }
    });
    info!("Timer thread started ({hz} Hz).");
    TimerThread {
        thread: Some(thread),
        stop_signal,
    }
}

#[cfg(test)]
mod tests {
    use super::FixedClock;
    use crate::core::fixed::FixedTime;

    #[test]
    fn update_reports_ticks_over_frequency() {
        let mut clock = FixedClock::new(100);
        clock.start();
        let source = clock.source();
        for _ in 0..3 {
            source.interrupt();
        }
        assert_eq!(clock.update(), FixedTime::from_ratio(3, 100));
        assert_eq!(clock.get_time(), FixedTime::from_int(3) / 100);
    }

    #[test]
    fn second_update_without_interrupt_is_zero() {
        let mut clock = FixedClock::new(100);
        clock.start();
        clock.source().interrupt();
        assert!(clock.update() > FixedTime::ZERO);
        assert_eq!(clock.update(), FixedTime::ZERO, "no tick in between must yield zero delta");
        assert_eq!(clock.update(), FixedTime::ZERO);
    }

    #[test]
    fn start_resets_counter() {
        let mut clock = FixedClock::new(50);
        let source = clock.source();
        source.interrupt();
        source.interrupt();
        clock.start();
        assert_eq!(source.ticks(), 0);
        assert_eq!(clock.update(), FixedTime::ZERO);
    }
}
