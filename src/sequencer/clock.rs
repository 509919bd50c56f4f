// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The step-sequencer clock.
//!
//! A dedicated thread walks the pattern and schedules every trigger at an
//! exact position on the mixer's sample clock; the thread only has to run
//! *ahead* of that position, so its own jitter never reaches the audio.
//! Step-boundary events for the UI go out on a separate channel that the
//! consumer drains (or drops) at its leisure.
//!
//! Tempo is read from the shared pattern every tick, so BPM changes take
//! effect at the next step without a rebuild. Step count and subdivision
//! are captured once at start: changing them is a stop-then-rebuild
//! operation, and the clock counts armed schedules so a rebuild can prove
//! the old schedule is fully torn down before the new one is armed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::audio::AudioMixer;
use crate::config::{SequencerPattern, Subdivision};
use crate::model::SampleId;
use crate::playsync::CancelHandle;

/// How far ahead of the mixer's clock the first step lands. Gives the
/// trigger path time to build chains before the frames are pulled.
const TRIGGER_LEAD_SAMPLES: u64 = 256;

/// The tail of each inter-step wait is spin-slept for precision; the
/// rest is a cancellable condvar wait.
const SPIN_WINDOW: Duration = Duration::from_millis(2);

/// Consumes trigger events from the clock. The deck routes these through
/// each sample's effects chain into the mixer.
pub trait TriggerTarget: Send + Sync {
    /// Triggers a sample at an exact position on the mixer sample clock.
    fn trigger_at(&self, sample: SampleId, at_sample: u64);
}

/// A step boundary, published for visual state only. Audio does not wait
/// for anyone to read these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    /// The step index that just fired.
    pub step: usize,
    /// Where on the sample clock its triggers land.
    pub at_sample: u64,
}

/// Sequencer clock states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

/// Errors from the clock lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("sequencer is already running")]
    AlreadyRunning,

    #[error("overlapping step schedules detected ({0} still armed)")]
    ScheduleOverlap(usize),
}

/// A running schedule: the step thread plus its teardown handle.
struct Schedule {
    cancel: CancelHandle,
    join: thread::JoinHandle<()>,
}

/// Drives a pattern, firing triggers at exact audio times.
pub struct SequencerClock {
    mixer: Arc<AudioMixer>,
    target: Arc<dyn TriggerTarget>,
    pattern: Arc<RwLock<SequencerPattern>>,
    schedule: Option<Schedule>,
    /// Number of armed step threads. The stop contract keeps this at
    /// zero or one; tests instrument it across rebuilds.
    armed: Arc<AtomicUsize>,
    /// Bumped on every successful start, for observability.
    generation: u64,
}

impl SequencerClock {
    pub fn new(
        mixer: Arc<AudioMixer>,
        target: Arc<dyn TriggerTarget>,
        pattern: Arc<RwLock<SequencerPattern>>,
    ) -> Self {
        Self {
            mixer,
            target,
            pattern,
            schedule: None,
            armed: Arc::new(AtomicUsize::new(0)),
            generation: 0,
        }
    }

    pub fn state(&self) -> ClockState {
        if self.schedule.is_some() {
            ClockState::Running
        } else {
            ClockState::Stopped
        }
    }

    /// Number of armed step schedules right now.
    pub fn armed_schedules(&self) -> usize {
        self.armed.load(Ordering::SeqCst)
    }

    /// The current start generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts the clock. Step count and subdivision are captured here;
    /// tempo and step assignments stay live through the shared pattern.
    /// Returns the UI step-event receiver.
    pub fn start(&mut self) -> Result<Receiver<StepEvent>, SequencerError> {
        if self.schedule.is_some() {
            return Err(SequencerError::AlreadyRunning);
        }
        let armed_before = self.armed.load(Ordering::SeqCst);
        if armed_before != 0 {
            // A schedule from a previous run is still alive. Arming a
            // second one would double-fire every step.
            return Err(SequencerError::ScheduleOverlap(armed_before));
        }

        let (step_count, subdivision, bpm) = {
            let pattern = self.pattern.read();
            (pattern.step_count(), pattern.subdivision(), pattern.bpm())
        };

        let cancel = CancelHandle::new();
        let (step_tx, step_rx) = crossbeam_channel::unbounded();

        let join = {
            let mixer = self.mixer.clone();
            let target = self.target.clone();
            let pattern = self.pattern.clone();
            let cancel = cancel.clone();
            let armed = self.armed.clone();
            thread::spawn(move || {
                armed.fetch_add(1, Ordering::SeqCst);
                run_schedule(mixer, target, pattern, step_count, subdivision, cancel, step_tx);
                armed.fetch_sub(1, Ordering::SeqCst);
            })
        };

        self.schedule = Some(Schedule { cancel, join });
        self.generation += 1;
        info!(
            step_count,
            ?subdivision,
            bpm,
            generation = self.generation,
            "Sequencer started"
        );
        Ok(step_rx)
    }

    /// Stops the clock and joins the step thread. Scheduling stops here,
    /// synchronously; voices already handed to the mixer ring out.
    pub fn stop(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            schedule.cancel.cancel();
            if schedule.join.join().is_err() {
                warn!("Step thread panicked during teardown");
            }
            info!("Sequencer stopped");
        }
    }

    /// Applies a structural change (step count, subdivision) by fully
    /// tearing down the current schedule and arming a fresh one. If the
    /// teardown cannot be proven complete the rebuild is fatal to the
    /// run: the clock stays stopped and the caller must restart.
    pub fn rebuild(&mut self) -> Result<Receiver<StepEvent>, SequencerError> {
        self.stop();
        debug!("Rebuilding step schedule");
        self.start()
    }
}

impl Drop for SequencerClock {
    fn drop(&mut self) {
        // Teardown is part of the stop contract; dropping a running
        // clock stops it rather than leaking the thread.
        self.stop();
    }
}

/// The step thread body. Walks steps, scheduling each step's triggers at
/// an exact sample position computed from the start anchor, then sleeps
/// until shortly before the next boundary.
fn run_schedule(
    mixer: Arc<AudioMixer>,
    target: Arc<dyn TriggerTarget>,
    pattern: Arc<RwLock<SequencerPattern>>,
    step_count: usize,
    subdivision: Subdivision,
    cancel: CancelHandle,
    step_tx: Sender<StepEvent>,
) {
    let sample_rate = mixer.sample_rate() as f64;
    let anchor_instant = Instant::now();
    let anchor_sample = mixer.current_sample() + TRIGGER_LEAD_SAMPLES;

    let mut step = 0usize;
    let mut at_sample = anchor_sample as f64;
    let mut at_instant = anchor_instant;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let trigger_sample = at_sample.round() as u64;
        let (active, bpm) = {
            let pattern = pattern.read();
            (pattern.active_samples_at(step), pattern.bpm())
        };
        for id in active {
            target.trigger_at(id, trigger_sample);
        }

        // Visual state rides a separate, never-blocking path. A dropped
        // receiver does not stop the schedule.
        let _ = step_tx.send(StepEvent {
            step,
            at_sample: trigger_sample,
        });

        // Tempo is re-read every tick: a BPM change shifts the very next
        // interval, no rebuild needed.
        let interval = subdivision.interval(bpm);
        at_instant += interval;
        at_sample += interval.as_secs_f64() * sample_rate;
        step = (step + 1) % step_count.max(1);

        let coarse_deadline = at_instant - SPIN_WINDOW;
        if cancel.wait_until(coarse_deadline) {
            return;
        }
        let now = Instant::now();
        if at_instant > now {
            spin_sleep::sleep(at_instant - now);
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records every trigger the clock fires.
    struct RecordingTarget {
        triggers: Mutex<Vec<(SampleId, u64)>>,
    }

    impl RecordingTarget {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                triggers: Mutex::new(Vec::new()),
            })
        }

        fn triggers(&self) -> Vec<(SampleId, u64)> {
            self.triggers.lock().clone()
        }
    }

    impl TriggerTarget for RecordingTarget {
        fn trigger_at(&self, sample: SampleId, at_sample: u64) {
            self.triggers.lock().push((sample, at_sample));
        }
    }

    fn clock_with(
        pattern: SequencerPattern,
    ) -> (SequencerClock, Arc<RecordingTarget>, Arc<RwLock<SequencerPattern>>) {
        let (mixer, _tx) = AudioMixer::new(44100);
        let target = RecordingTarget::new();
        let pattern = Arc::new(RwLock::new(pattern));
        let clock = SequencerClock::new(mixer, target.clone(), pattern.clone());
        (clock, target, pattern)
    }

    #[test]
    fn test_classic_four_on_the_floor_spacing() {
        // 120 bpm, 16 steps of sixteenths, one sample on steps 0/4/8/12:
        // four triggers per loop spaced exactly 0.5 s (22050 samples).
        let mut pattern = SequencerPattern::new(16, Subdivision::Sixteenth, 120.0);
        let kick = SampleId(1);
        for step in [0usize, 4, 8, 12] {
            pattern.set_step(kick, step, true);
        }
        let (mut clock, target, _) = clock_with(pattern);

        let _events = clock.start().expect("start");
        // One full loop is 2 s; leave margin for the fourth trigger.
        thread::sleep(Duration::from_millis(2100));
        clock.stop();

        let triggers = target.triggers();
        assert!(triggers.len() >= 4, "got {} triggers", triggers.len());
        for pair in triggers.windows(2).take(3) {
            assert_eq!(pair[1].1 - pair[0].1, 22050);
        }
    }

    #[test]
    fn test_step_events_are_published_independently() {
        let mut pattern = SequencerPattern::new(4, Subdivision::Sixteenth, 300.0);
        pattern.set_step(SampleId(1), 0, true);
        let (mut clock, _, _) = clock_with(pattern);

        let events = clock.start().expect("start");
        thread::sleep(Duration::from_millis(180));
        clock.stop();

        let events: Vec<StepEvent> = events.try_iter().collect();
        assert!(events.len() >= 3);
        assert_eq!(events[0].step, 0);
        assert_eq!(events[1].step, 1);
        // The UI sees the same schedule positions the audio got.
        assert!(events[0].at_sample < events[1].at_sample);
    }

    #[test]
    fn test_stop_interrupts_a_long_interval() {
        // 20 bpm quarters: a 3 s step interval. Stop must not wait it out.
        let pattern = SequencerPattern::new(8, Subdivision::Quarter, 20.0);
        let (mut clock, _, _) = clock_with(pattern);

        clock.start().expect("start");
        let started = Instant::now();
        thread::sleep(Duration::from_millis(50));
        clock.stop();

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.armed_schedules(), 0);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let pattern = SequencerPattern::new(8, Subdivision::Sixteenth, 120.0);
        let (mut clock, _, _) = clock_with(pattern);

        clock.start().expect("start");
        assert!(matches!(
            clock.start(),
            Err(SequencerError::AlreadyRunning)
        ));
        clock.stop();
    }

    #[test]
    fn test_rebuild_never_overlaps_schedules() {
        let pattern = SequencerPattern::new(16, Subdivision::Sixteenth, 300.0);
        let (mut clock, _, pattern_handle) = clock_with(pattern);

        clock.start().expect("start");
        for step_count in [8usize, 24, 32, 16, 8] {
            pattern_handle.write().set_step_count(step_count);
            clock.rebuild().expect("rebuild");
            // The old schedule is provably gone and exactly one new one
            // is armed.
            assert_eq!(clock.armed_schedules(), 1);
            assert_eq!(clock.state(), ClockState::Running);
        }
        clock.stop();
        assert_eq!(clock.armed_schedules(), 0);
    }

    #[test]
    fn test_bpm_change_does_not_rebuild() {
        let mut pattern = SequencerPattern::new(8, Subdivision::Sixteenth, 120.0);
        pattern.set_step(SampleId(1), 0, true);
        let (mut clock, target, pattern_handle) = clock_with(pattern);

        clock.start().expect("start");
        let generation = clock.generation();
        pattern_handle.write().set_bpm(240.0);
        thread::sleep(Duration::from_millis(150));
        clock.stop();

        assert_eq!(clock.generation(), generation);
        assert!(!target.triggers().is_empty());
    }

    #[test]
    fn test_live_step_toggles_are_picked_up() {
        // Step assignment is not structural: flipping a step while
        // running changes what fires, with no rebuild.
        let pattern = SequencerPattern::new(4, Subdivision::Sixteenth, 300.0);
        let (mut clock, target, pattern_handle) = clock_with(pattern);

        clock.start().expect("start");
        thread::sleep(Duration::from_millis(60));
        assert!(target.triggers().is_empty());

        pattern_handle.write().set_step(SampleId(9), 0, true);
        pattern_handle.write().set_step(SampleId(9), 1, true);
        pattern_handle.write().set_step(SampleId(9), 2, true);
        pattern_handle.write().set_step(SampleId(9), 3, true);
        thread::sleep(Duration::from_millis(150));
        clock.stop();

        assert!(!target.triggers().is_empty());
    }
}
