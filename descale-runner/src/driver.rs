//! The frame loop that drives a [`ParticleSimulation`].

use crate::control::ControlCommand;
use crate::error::RunnerError;
use crossbeam_channel::{Receiver, TryRecvError};
use descale_config::Config;
use descale_simulation::ParticleSimulation;
use descale_transport::{Sender, Serializer, TransportError};
use hdrhistogram::Histogram;
use log::{debug, info, warn};
use rand::Rng;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub frame_duration: Duration,
    pub max_frames: Option<u64>,
    pub log_interval: u64,
}

impl From<&Config> for DriverSettings {
    fn from(config: &Config) -> Self {
        Self {
            frame_duration: Duration::from_secs_f64(1.0 / f64::from(config.framerate)),
            max_frames: config.max_frames,
            log_interval: config.log_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Totals reported when the loop ends.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub ticks: u64,
    pub laps: u32,
    pub captured: usize,
    pub p50_micros: u64,
    pub p99_micros: u64,
    pub max_micros: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, tick {}, {} agent laps, {} particles captured; frame time p50 {}us, p99 {}us, max {}us",
            self.frames, self.ticks, self.laps, self.captured, self.p50_micros, self.p99_micros, self.max_micros
        )
    }
}

/// Owns the one simulation instance and feeds its frames to a sender.
pub struct Driver<R: Rng> {
    simulation: ParticleSimulation<R>,
    serializer: Box<dyn Serializer>,
    sender: Box<dyn Sender>,
    settings: DriverSettings,
    frames: u64,
    frame_times: Histogram<u64>,
}

impl<R: Rng> Driver<R> {
    pub fn new(
        simulation: ParticleSimulation<R>,
        serializer: Box<dyn Serializer>,
        sender: Box<dyn Sender>,
        settings: DriverSettings,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            simulation,
            serializer,
            sender,
            settings,
            frames: 0,
            frame_times: Histogram::new_with_bounds(1, 60_000_000, 3)?,
        })
    }

    pub fn simulation(&self) -> &ParticleSimulation<R> {
        &self.simulation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn apply(&mut self, command: ControlCommand) -> Flow {
        debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Start => self.simulation.start(),
            ControlCommand::Stop => self.simulation.stop(),
            ControlCommand::Restart => self.simulation.restart(),
            ControlCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Ticks once and sends the resulting frame. Does nothing while stopped.
    pub fn step(&mut self) -> Result<(), TransportError> {
        if !self.simulation.is_running() {
            return Ok(());
        }
        self.simulation.tick();
        self.frames += 1;
        let frame = self.simulation.frame();
        let data = self.serializer.serialize(&frame)?;
        self.sender.send(data.as_bytes())
    }

    /// Runs until a quit command arrives or the frame limit is reached.
    /// While stopped the loop blocks on `commands` instead of ticking.
    pub fn run(&mut self, commands: &Receiver<ControlCommand>) -> RunSummary {
        loop {
            if !self.simulation.is_running() {
                match commands.recv() {
                    Ok(command) => {
                        if self.apply(command) == Flow::Quit {
                            break;
                        }
                        continue;
                    }
                    Err(_) => break,
                }
            }

            if self.drain(commands) == Flow::Quit {
                break;
            }
            if !self.simulation.is_running() {
                continue;
            }

            if self.limit_reached() {
                info!("Reached frame limit of {}", self.frames);
                break;
            }

            let started = Instant::now();
            if let Err(e) = self.step() {
                warn!("Failed to deliver frame at tick {}: {}", self.simulation.ticks(), e);
            }
            self.log_progress();

            let elapsed = started.elapsed();
            self.frame_times
                .saturating_record(elapsed.as_micros().max(1) as u64);
            if self.limit_reached() {
                info!("Reached frame limit of {}", self.frames);
                break;
            }
            if elapsed < self.settings.frame_duration {
                spin_sleep::sleep(self.settings.frame_duration - elapsed);
            } else {
                debug!(
                    "Frame time exceeded budget: {:?} > {:?}",
                    elapsed, self.settings.frame_duration
                );
            }
        }
        self.summary()
    }

    fn drain(&mut self, commands: &Receiver<ControlCommand>) -> Flow {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if self.apply(command) == Flow::Quit {
                        return Flow::Quit;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Flow::Continue,
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.settings.max_frames.map_or(false, |max| self.frames >= max)
    }

    fn log_progress(&self) {
        if self.frames == 0 || self.settings.log_interval == 0 || self.frames % self.settings.log_interval != 0 {
            return;
        }
        info!(
            "Frame {}: tick {}, layer {:?} active, {}/{} particles captured",
            self.frames,
            self.simulation.ticks(),
            self.simulation.active_layer(),
            self.simulation.captured_count(),
            self.simulation.scale_particles().len()
        );
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.frames,
            ticks: self.simulation.ticks(),
            laps: self.simulation.agents().iter().map(|a| a.laps()).sum(),
            captured: self.simulation.captured_count(),
            p50_micros: self.frame_times.value_at_quantile(0.5),
            p99_micros: self.frame_times.value_at_quantile(0.99),
            max_micros: self.frame_times.max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descale_simulation::Frame;
    use descale_transport::JsonSerializer;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Collects every frame the driver sends.
    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Sender for Recorder {
        fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.0
                .borrow_mut()
                .push(String::from_utf8_lossy(data).into_owned());
            Ok(())
        }
    }

    struct Broken;

    impl Sender for Broken {
        fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::WebSocket("no route".to_string()))
        }
    }

    fn settings(max_frames: Option<u64>) -> DriverSettings {
        DriverSettings {
            frame_duration: Duration::from_millis(1),
            max_frames,
            log_interval: 600,
        }
    }

    fn driver(sender: Box<dyn Sender>, max_frames: Option<u64>) -> Driver<rand::rngs::StdRng> {
        let simulation = ParticleSimulation::seeded(1000.0, 400.0, 11);
        Driver::new(simulation, Box::new(JsonSerializer), sender, settings(max_frames)).unwrap()
    }

    fn ticks(recorder: &Recorder) -> Vec<u64> {
        recorder
            .0
            .borrow()
            .iter()
            .map(|line| frame_tick(line))
            .collect()
    }

    fn frame_tick(line: &str) -> u64 {
        let frame: Frame = serde_json::from_str(line).unwrap();
        frame.tick
    }

    #[test]
    fn settings_follow_the_config() {
        let config = Config {
            framerate: 50,
            max_frames: Some(10),
            ..Config::default()
        };
        let settings = DriverSettings::from(&config);
        assert_eq!(settings.frame_duration, Duration::from_millis(20));
        assert_eq!(settings.max_frames, Some(10));
    }

    #[test]
    fn run_ticks_then_sends_until_the_frame_limit() {
        let recorder = Recorder::default();
        let mut driver = driver(Box::new(recorder.clone()), Some(5));
        let (_tx, rx) = crossbeam_channel::unbounded();

        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.ticks, 5);
        assert_eq!(ticks(&recorder), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_frame_limit_sends_nothing() {
        let recorder = Recorder::default();
        let mut driver = driver(Box::new(recorder.clone()), Some(0));
        let (_tx, rx) = crossbeam_channel::unbounded();

        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 0);
        assert_eq!(summary.ticks, 0);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn every_sent_frame_is_timed() {
        let mut driver = driver(Box::new(Recorder::default()), Some(3));
        let (_tx, rx) = crossbeam_channel::unbounded();

        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 3);
        assert_eq!(driver.frame_times.len(), 3);
        assert!(summary.max_micros >= 1);
    }

    #[test]
    fn quit_ends_the_run_before_any_frame() {
        let recorder = Recorder::default();
        let mut driver = driver(Box::new(recorder.clone()), None);
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ControlCommand::Quit).unwrap();

        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 0);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn stopped_simulation_waits_for_start() {
        let recorder = Recorder::default();
        let mut driver = driver(Box::new(recorder.clone()), Some(2));
        driver.apply(ControlCommand::Stop);
        assert!(driver.step().is_ok());
        assert_eq!(driver.frames(), 0);

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ControlCommand::Start).unwrap();
        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 2);
        assert_eq!(ticks(&recorder), vec![1, 2]);
    }

    #[test]
    fn stopped_driver_quits_when_commands_hang_up() {
        let mut driver = driver(Box::new(Recorder::default()), None);
        driver.apply(ControlCommand::Stop);
        let (tx, rx) = crossbeam_channel::unbounded::<ControlCommand>();
        drop(tx);

        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn restart_command_resets_the_simulation() {
        let recorder = Recorder::default();
        let mut driver = driver(Box::new(recorder.clone()), None);
        for _ in 0..3 {
            driver.step().unwrap();
        }
        driver.apply(ControlCommand::Stop);

        assert_eq!(driver.apply(ControlCommand::Restart), Flow::Continue);
        assert!(driver.simulation().is_running());
        assert_eq!(driver.simulation().ticks(), 0);

        driver.step().unwrap();
        assert_eq!(ticks(&recorder), vec![1, 2, 3, 1]);
    }

    #[test]
    fn transport_failures_do_not_stop_the_loop() {
        let mut driver = driver(Box::new(Broken), Some(3));
        assert!(driver.step().is_err());

        let (_tx, rx) = crossbeam_channel::unbounded();
        let summary = driver.run(&rx);

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.ticks, 3);
    }
}
