// Clock - Repeating sixteenth-note tick source
//
// The transport only talks to the Clock trait. ManualClock is advanced by hand (tests, offline
// rendering); ThreadClock ticks in real time on a worker thread driven over a control channel.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::timeline::TempoRamp;

/// Handle on a scheduled repeating callback
pub type ScheduleId = u64;

/// One clock tick: clock time in seconds and the rate at that time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    pub time: f64,
    pub bpm: f64,
}

pub type TickCallback = Box<dyn FnMut(ClockTick) + Send>;

/// Tick source driving the sequencer
///
/// Callbacks run once per sixteenth note at the (possibly ramping) rate, in strictly increasing
/// time order. After `clear` returns the cleared callback is never invoked again.
pub trait Clock: Send {
    fn schedule_repeat(&mut self, callback: TickCallback) -> ScheduleId;
    fn clear(&mut self, id: ScheduleId);
    fn start(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// Move the rate to `bpm` linearly over `ramp`
    fn ramp_to(&mut self, bpm: f64, ramp: Duration);
    fn bpm(&self) -> f64;
}

/// Cancellation flag shared between the transport and a scheduled callback
///
/// Checked at the top of every tick so that a callback the host still delivers after stop
/// does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ============================================================================
// ManualClock
// ============================================================================

/// Deterministic clock advanced tick by tick
pub struct ManualClock {
    callbacks: Vec<(ScheduleId, TickCallback)>,
    /// Cleared callbacks, kept so a late host delivery can be simulated
    stale: Vec<TickCallback>,
    next_id: ScheduleId,
    running: bool,
    time: f64,
    ramp: TempoRamp,
}

impl ManualClock {
    pub fn new(bpm: f64) -> Self {
        Self {
            callbacks: Vec::new(),
            stale: Vec::new(),
            next_id: 1,
            running: false,
            time: 0.0,
            ramp: TempoRamp::new(bpm),
        }
    }

    /// Fire up to `ticks` ticks; returns how many fired (none while not running)
    pub fn advance(&mut self, ticks: usize) -> usize {
        if !self.running {
            return 0;
        }
        for _ in 0..ticks {
            let tick = ClockTick {
                time: self.time,
                bpm: self.ramp.bpm_at(self.time),
            };
            for (_, callback) in self.callbacks.iter_mut() {
                callback(tick);
            }
            self.time += self.ramp.step_interval_at(self.time);
        }
        ticks
    }

    /// Invoke every cleared callback once more at the current time
    pub fn fire_stale(&mut self) -> usize {
        let tick = ClockTick {
            time: self.time,
            bpm: self.ramp.bpm_at(self.time),
        };
        for callback in self.stale.iter_mut() {
            callback(tick);
        }
        self.stale.len()
    }

    /// Clock time in seconds
    pub fn now(&self) -> f64 {
        self.time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn scheduled_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl Clock for ManualClock {
    fn schedule_repeat(&mut self, callback: TickCallback) -> ScheduleId {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    fn clear(&mut self, id: ScheduleId) {
        if let Some(index) = self.callbacks.iter().position(|(other, _)| *other == id) {
            let (_, callback) = self.callbacks.remove(index);
            self.stale.push(callback);
        }
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn pause(&mut self) {
        self.running = false;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn ramp_to(&mut self, bpm: f64, ramp: Duration) {
        self.ramp.ramp_to(bpm, self.time, ramp);
    }

    fn bpm(&self) -> f64 {
        self.ramp.bpm_at(self.time)
    }
}

// ============================================================================
// ThreadClock
// ============================================================================

enum Control {
    Schedule(ScheduleId, TickCallback),
    /// Carries the acknowledgement sender; answered once the callback is gone
    Clear(ScheduleId, Sender<()>),
    Start,
    Pause,
    Stop,
    Ramp(f64, Duration),
    Shutdown,
}

/// Real-time clock running its callbacks on a dedicated thread
pub struct ThreadClock {
    control: Sender<Control>,
    next_id: ScheduleId,
    /// Last reported rate, f64 bits
    bpm: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadClock {
    pub fn new(bpm: f64) -> Self {
        let (control, control_rx) = crossbeam_channel::unbounded();
        let shared_bpm = Arc::new(AtomicU64::new(bpm.to_bits()));

        let worker_bpm = Arc::clone(&shared_bpm);
        let handle = thread::Builder::new()
            .name("beatgrid-clock".to_string())
            .spawn(move || run_worker(control_rx, bpm, worker_bpm));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn clock thread: {}", e);
                None
            }
        };

        Self {
            control,
            next_id: 1,
            bpm: shared_bpm,
            handle,
        }
    }

    fn send(&self, message: Control) {
        if self.control.send(message).is_err() {
            warn!("Clock thread is gone, control message dropped");
        }
    }
}

impl Clock for ThreadClock {
    fn schedule_repeat(&mut self, callback: TickCallback) -> ScheduleId {
        let id = self.next_id;
        self.next_id += 1;
        self.send(Control::Schedule(id, callback));
        id
    }

    fn clear(&mut self, id: ScheduleId) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.send(Control::Clear(id, ack_tx));
        // Blocks until the worker has dropped the callback; an error means the worker is gone
        let _ = ack_rx.recv();
    }

    fn start(&mut self) {
        self.send(Control::Start);
    }

    fn pause(&mut self) {
        self.send(Control::Pause);
    }

    fn stop(&mut self) {
        self.send(Control::Stop);
    }

    fn ramp_to(&mut self, bpm: f64, ramp: Duration) {
        self.send(Control::Ramp(bpm, ramp));
    }

    fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(control: Receiver<Control>, bpm: f64, shared_bpm: Arc<AtomicU64>) {
    let origin = Instant::now();
    let seconds = |at: Instant| at.duration_since(origin).as_secs_f64();

    let mut callbacks: Vec<(ScheduleId, TickCallback)> = Vec::new();
    let mut ramp = TempoRamp::new(bpm);
    let mut next_tick: Option<Instant> = None;

    loop {
        let message = match next_tick {
            Some(at) => control.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => control.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match message {
            Ok(Control::Schedule(id, callback)) => callbacks.push((id, callback)),
            Ok(Control::Clear(id, ack)) => {
                callbacks.retain(|(other, _)| *other != id);
                let _ = ack.send(());
            }
            Ok(Control::Start) => {
                if next_tick.is_none() {
                    next_tick = Some(Instant::now());
                }
            }
            Ok(Control::Pause) | Ok(Control::Stop) => next_tick = None,
            Ok(Control::Ramp(target, duration)) => {
                let now = seconds(Instant::now());
                ramp.ramp_to(target, now, duration);
                shared_bpm.store(ramp.bpm_at(now).to_bits(), Ordering::Relaxed);
            }
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let Some(at) = next_tick else { continue };
                let time = seconds(at);
                let tick = ClockTick {
                    time,
                    bpm: ramp.bpm_at(time),
                };
                shared_bpm.store(tick.bpm.to_bits(), Ordering::Relaxed);

                for (_, callback) in callbacks.iter_mut() {
                    callback(tick);
                }
                next_tick = Some(at + Duration::from_secs_f64(ramp.step_interval_at(time)));
            }
        }
    }

    debug!("Clock thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<ClockTick>>>, TickCallback) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        (ticks, Box::new(move |tick| sink.lock().unwrap().push(tick)))
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }

    #[test]
    fn test_manual_clock_ticks_on_sixteenths() {
        let mut clock = ManualClock::new(120.0);
        let (ticks, callback) = recorder();
        clock.schedule_repeat(callback);

        // Not started yet
        assert_eq!(clock.advance(4), 0);

        clock.start();
        clock.advance(3);

        let times: Vec<f64> = ticks.lock().unwrap().iter().map(|t| t.time).collect();
        assert_eq!(times, vec![0.0, 0.125, 0.25]);
    }

    #[test]
    fn test_manual_clock_clear_and_stale() {
        let mut clock = ManualClock::new(120.0);
        let (ticks, callback) = recorder();
        let id = clock.schedule_repeat(callback);
        clock.start();
        clock.advance(1);

        clock.clear(id);
        assert_eq!(clock.scheduled_count(), 0);
        clock.advance(2);
        assert_eq!(ticks.lock().unwrap().len(), 1);

        assert_eq!(clock.fire_stale(), 1);
        assert_eq!(ticks.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_manual_clock_ramp() {
        let mut clock = ManualClock::new(120.0);
        clock.start();
        clock.ramp_to(60.0, Duration::ZERO);

        assert_eq!(clock.bpm(), 60.0);
        clock.advance(1);
        assert_eq!(clock.now(), 0.25);
    }

    #[test]
    fn test_thread_clock_ticks_and_clear_is_final() {
        let mut clock = ThreadClock::new(999.0);
        let (ticks, callback) = recorder();
        let id = clock.schedule_repeat(callback);
        clock.start();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.lock().unwrap().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        clock.clear(id);
        let count = ticks.lock().unwrap().len();
        assert!(count >= 3);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.lock().unwrap().len(), count);

        let recorded = ticks.lock().unwrap();
        assert!(recorded.windows(2).all(|w| w[0].time < w[1].time));
    }
}
