use glam::DVec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::frame::Color;

/// Index of an agent inside [`crate::ParticleSimulation::agents`].
pub type AgentId = usize;

// --- Layers ---

/// Deposit generation of a scale particle. Only the active layer can be
/// captured; the active layer rotates every [`Layer::PERIOD`] ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Outer,
    Middle,
    Inner,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Outer, Layer::Middle, Layer::Inner];

    /// Ticks each layer stays active.
    pub const PERIOD: u64 = 600;

    /// The layer eligible for capture after `ticks` elapsed ticks.
    pub fn active_at(ticks: u64) -> Layer {
        Self::ALL[((ticks / Self::PERIOD) % 3) as usize]
    }

    pub fn index(self) -> usize {
        match self {
            Layer::Outer => 0,
            Layer::Middle => 1,
            Layer::Inner => 2,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Layer::Outer => Color::rgb(0xcd, 0x85, 0x3f),
            Layer::Middle => Color::rgb(0xb8, 0x86, 0x0b),
            Layer::Inner => Color::rgb(0x8b, 0x45, 0x13),
        }
    }

    /// Distance kept from the capturing agent while orbiting.
    pub fn orbit_radius(self) -> f64 {
        crate::ORBIT_BASE_RADIUS + self.index() as f64 * crate::ORBIT_LAYER_STEP
    }
}

// --- Scale particles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleState {
    FixedToPipe,
    Captured { by: AgentId },
}

#[derive(Debug, Clone)]
pub struct ScaleParticle {
    pub(crate) position: DVec2,
    pub(crate) origin: DVec2,
    pub(crate) radius: f64,
    pub(crate) layer: Layer,
    pub(crate) state: ScaleState,
    pub(crate) orbit_angle: f64,
    pub(crate) bonds: SmallVec<[usize; 4]>,
}

impl ScaleParticle {
    pub(crate) fn new(position: DVec2, origin: DVec2, layer: Layer) -> Self {
        Self {
            position,
            origin,
            radius: crate::SCALE_RADIUS,
            layer,
            state: ScaleState::FixedToPipe,
            orbit_angle: 0.0,
            bonds: SmallVec::new(),
        }
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Spawn position recorded at initialization.
    pub fn origin(&self) -> DVec2 {
        self.origin
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn state(&self) -> ScaleState {
        self.state
    }

    pub fn captured_by(&self) -> Option<AgentId> {
        match self.state {
            ScaleState::Captured { by } => Some(by),
            ScaleState::FixedToPipe => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.state == ScaleState::FixedToPipe
    }

    pub fn orbit_angle(&self) -> f64 {
        self.orbit_angle
    }

    /// Indices into [`crate::ParticleSimulation::bonds`].
    pub fn bonds(&self) -> &[usize] {
        &self.bonds
    }

    /// One-way transition to orbiting `agent`. A particle that is already
    /// captured keeps its agent and angle.
    pub(crate) fn capture(&mut self, agent: AgentId, angle: f64) -> bool {
        if !self.is_fixed() {
            return false;
        }
        self.state = ScaleState::Captured { by: agent };
        self.orbit_angle = angle;
        true
    }

    pub(crate) fn advance_orbit(&mut self, center: DVec2) {
        self.orbit_angle += crate::ORBIT_STEP;
        let direction = DVec2::new(self.orbit_angle.cos(), self.orbit_angle.sin());
        self.position = center + direction * self.layer.orbit_radius();
    }
}

// --- Agents ---

#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) position: DVec2,
    pub(crate) radius: f64,
    pub(crate) glow_radius: f64,
    pub(crate) attached: Vec<usize>,
    pub(crate) laps: u32,
}

impl Agent {
    pub(crate) fn new(position: DVec2) -> Self {
        Self {
            position,
            radius: crate::AGENT_RADIUS,
            glow_radius: crate::AGENT_GLOW_RADIUS,
            attached: Vec::new(),
            laps: 0,
        }
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn glow_radius(&self) -> f64 {
        self.glow_radius
    }

    /// Scale particle indices in capture order.
    pub fn attached(&self) -> &[usize] {
        &self.attached
    }

    /// Number of times the agent left the right edge and respawned.
    pub fn laps(&self) -> u32 {
        self.laps
    }
}
