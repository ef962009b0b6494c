//! Descaling-agent particle simulation.
//!
//! [`ParticleSimulation`] owns every agent and scale particle, advances them
//! one discrete step per [`ParticleSimulation::tick`] and describes the result
//! as a [`Frame`] of drawing primitives. It has no notion of wall-clock time
//! or scheduling: a driver calls `tick` then `frame` while
//! [`ParticleSimulation::is_running`] holds.

use std::f64::consts::TAU;

use glam::DVec2;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub mod bond;
pub mod frame;
pub mod particle;

pub use bond::{BondState, CohesionBond};
pub use frame::{Color, Fill, Frame, Primitive};
pub use particle::{Agent, AgentId, Layer, ScaleParticle, ScaleState};

// --- Constants ---

pub const AGENT_COUNT: usize = 2;
pub const AGENT_SPEED: f64 = 4.0;
pub const AGENT_RADIUS: f64 = 30.0;
pub const AGENT_GLOW_RADIUS: f64 = 40.0;
/// Horizontal band agents spawn in, left of the visible area.
pub const AGENT_SPAWN_X: (f64, f64) = (-200.0, -100.0);
pub const AGENT_SPAWN_Y: (f64, f64) = (150.0, 250.0);
/// Distance past the right edge at which an agent respawns.
pub const WRAP_MARGIN: f64 = 100.0;
pub const ATTRACT_RADIUS: f64 = 80.0;

pub const ORBIT_STEP: f64 = 0.05;
pub const ORBIT_BASE_RADIUS: f64 = 40.0;
pub const ORBIT_LAYER_STEP: f64 = 10.0;

pub const PULSE_FREQUENCY: f64 = 0.05;
pub const PULSE_AMPLITUDE: f64 = 5.0;

pub const SCALE_RADIUS: f64 = 4.0;
pub const SCALE_X_START: u32 = 100;
pub const SCALE_X_END: u32 = 900;
pub const SCALE_X_STEP: usize = 30;
pub const UPPER_DEPOSIT_Y: f64 = 100.0;
pub const LOWER_DEPOSIT_Y: f64 = 300.0;
/// Each deeper layer sits this much further from the wall.
pub const LAYER_INSET: f64 = 15.0;
pub const SCALE_JITTER: f64 = 5.0;

pub const PIPE_WALL_Y: [f64; 2] = [80.0, 300.0];
pub const PIPE_THICKNESS: f64 = 20.0;
pub const PIPE_COLOR: Color = Color::rgb(0x4a, 0x4a, 0x4a);
pub const AGENT_COLOR: Color = Color::rgb(0x00, 0xff, 0xff);
pub const AGENT_ALPHA: f32 = 0.6;
pub const GLOW_ALPHA: f32 = 0.3;

/// Number of scale particles a fresh simulation spawns.
pub fn scale_particle_count() -> usize {
    let steps = (SCALE_X_START..SCALE_X_END).step_by(SCALE_X_STEP).count();
    Layer::ALL.len() * steps * 2
}

pub struct ParticleSimulation<R: Rng = StdRng> {
    width: f64,
    height: f64,
    rng: R,
    agents: Vec<Agent>,
    scale_particles: Vec<ScaleParticle>,
    bonds: Vec<CohesionBond>,
    ticks: u64,
    running: bool,
}

impl ParticleSimulation<StdRng> {
    /// Deterministic simulation driven by a seeded [`StdRng`].
    pub fn seeded(width: f64, height: f64, seed: u64) -> Self {
        Self::new(width, height, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ParticleSimulation<R> {
    /// Creates an initialized, running simulation for a canvas of the given
    /// pixel size.
    pub fn new(width: f64, height: f64, rng: R) -> Self {
        let mut simulation = Self {
            width,
            height,
            rng,
            agents: Vec::with_capacity(AGENT_COUNT),
            scale_particles: Vec::with_capacity(scale_particle_count()),
            bonds: Vec::new(),
            ticks: 0,
            running: true,
        };
        simulation.initialize();
        simulation
    }

    fn initialize(&mut self) {
        for _ in 0..AGENT_COUNT {
            let position = self.spawn_point();
            self.agents.push(Agent::new(position));
        }

        for layer in Layer::ALL {
            let inset = layer.index() as f64 * LAYER_INSET;
            for x in (SCALE_X_START..SCALE_X_END).step_by(SCALE_X_STEP) {
                for y in [UPPER_DEPOSIT_Y + inset, LOWER_DEPOSIT_Y - inset] {
                    let base = DVec2::new(f64::from(x), y);
                    let position = base + self.jitter();
                    let origin = base + self.jitter();
                    self.scale_particles
                        .push(ScaleParticle::new(position, origin, layer));
                }
            }
        }

        self.bonds = bond::link(&mut self.scale_particles);
        debug!(
            "Initialized {} agents, {} scale particles, {} bonds",
            self.agents.len(),
            self.scale_particles.len(),
            self.bonds.len()
        );
    }

    fn spawn_point(&mut self) -> DVec2 {
        DVec2::new(
            self.rng.gen_range(AGENT_SPAWN_X.0..AGENT_SPAWN_X.1),
            self.rng.gen_range(AGENT_SPAWN_Y.0..AGENT_SPAWN_Y.1),
        )
    }

    fn jitter(&mut self) -> DVec2 {
        DVec2::new(
            self.rng.gen_range(-SCALE_JITTER..SCALE_JITTER),
            self.rng.gen_range(-SCALE_JITTER..SCALE_JITTER),
        )
    }

    // --- Update ---

    /// Advances the simulation by one step.
    pub fn tick(&mut self) {
        self.move_agents();

        let active = Layer::active_at(self.ticks);
        if self.ticks % Layer::PERIOD == 0 {
            debug!("Tick {}: layer {:?} is now capturable", self.ticks, active);
        }
        self.capture(active);
        self.orbit();

        for bond in &mut self.bonds {
            bond.advance();
        }

        self.ticks += 1;
    }

    fn move_agents(&mut self) {
        let right_bound = self.width + WRAP_MARGIN;
        for index in 0..self.agents.len() {
            self.agents[index].position.x += AGENT_SPEED;
            if self.agents[index].position.x > right_bound {
                let respawn = self.spawn_point();
                let agent = &mut self.agents[index];
                agent.position = respawn;
                agent.laps += 1;
                trace!("Agent {} wrapped (lap {})", index, agent.laps);
            }
        }
    }

    fn capture(&mut self, active: Layer) {
        let Self {
            agents,
            scale_particles,
            bonds,
            rng,
            ..
        } = self;

        for (agent_id, agent) in agents.iter_mut().enumerate() {
            for (index, particle) in scale_particles.iter_mut().enumerate() {
                if !particle.is_fixed() || particle.layer != active {
                    continue;
                }
                let offset = agent.position - particle.position;
                if offset.length() >= ATTRACT_RADIUS {
                    continue;
                }
                let angle = offset.y.atan2(offset.x) + rng.gen_range(0.0..TAU);
                if particle.capture(agent_id, angle) {
                    agent.attached.push(index);
                    for &bond in &particle.bonds {
                        bonds[bond].snap();
                    }
                    trace!("Agent {} captured scale particle {}", agent_id, index);
                }
            }
        }
    }

    fn orbit(&mut self) {
        for particle in &mut self.scale_particles {
            if let ScaleState::Captured { by } = particle.state {
                if let Some(agent) = self.agents.get(by) {
                    particle.advance_orbit(agent.position);
                }
            }
        }
    }

    // --- Render description ---

    /// Drawing primitives for the current state, back to front.
    pub fn frame(&self) -> Frame {
        let mut primitives = Vec::with_capacity(
            3 + self.bonds.len() + self.agents.len() * 2 + self.scale_particles.len(),
        );

        primitives.push(Primitive::Clear {
            width: self.width,
            height: self.height,
        });

        for y in PIPE_WALL_Y {
            primitives.push(Primitive::Rect {
                x: 0.0,
                y,
                width: self.width,
                height: PIPE_THICKNESS,
                color: PIPE_COLOR,
            });
        }

        for bond in &self.bonds {
            let Some(alpha) = bond.alpha() else { continue };
            let from = self.scale_particles[bond.a].position;
            let to = self.scale_particles[bond.b].position;
            primitives.push(Primitive::Line {
                from: from.to_array(),
                to: to.to_array(),
                width: bond::BOND_WIDTH,
                color: Color::WHITE.with_alpha(alpha),
            });
        }

        let pulse = (self.ticks as f64 * PULSE_FREQUENCY).sin() * PULSE_AMPLITUDE;
        for agent in &self.agents {
            primitives.push(Primitive::Circle {
                x: agent.position.x,
                y: agent.position.y,
                radius: agent.glow_radius + pulse,
                fill: Fill::RadialGradient {
                    inner: AGENT_COLOR.with_alpha(GLOW_ALPHA),
                    outer: AGENT_COLOR.with_alpha(0.0),
                },
            });
            primitives.push(Primitive::Circle {
                x: agent.position.x,
                y: agent.position.y,
                radius: agent.radius,
                fill: Fill::Solid {
                    color: AGENT_COLOR.with_alpha(AGENT_ALPHA),
                },
            });
        }

        for particle in &self.scale_particles {
            let visible = match particle.state {
                ScaleState::FixedToPipe => true,
                ScaleState::Captured { by } => by < self.agents.len(),
            };
            if !visible {
                continue;
            }
            primitives.push(Primitive::Circle {
                x: particle.position.x,
                y: particle.position.y,
                radius: particle.radius,
                fill: Fill::Solid {
                    color: particle.layer.color(),
                },
            });
        }

        Frame {
            tick: self.ticks,
            width: self.width,
            height: self.height,
            active_layer: self.active_layer(),
            primitives,
        }
    }

    // --- Lifecycle ---

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Discards all particle state and starts over from a fresh layout.
    pub fn restart(&mut self) {
        debug!("Restarting simulation after {} ticks", self.ticks);
        self.ticks = 0;
        self.agents.clear();
        self.scale_particles.clear();
        self.bonds.clear();
        self.initialize();
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // --- Accessors ---

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn active_layer(&self) -> Layer {
        Layer::active_at(self.ticks)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn scale_particles(&self) -> &[ScaleParticle] {
        &self.scale_particles
    }

    pub fn bonds(&self) -> &[CohesionBond] {
        &self.bonds
    }

    pub fn captured_count(&self) -> usize {
        self.scale_particles.iter().filter(|p| !p.is_fixed()).count()
    }
}
