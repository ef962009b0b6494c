use crate::particle::ScaleParticle;

/// Neighbouring same-layer deposits closer than this are linked.
pub const BOND_DISTANCE: f64 = 40.0;
pub const BOND_ALPHA: f32 = 0.2;
pub const BOND_WIDTH: f64 = 0.5;
/// Break progress added per tick once a bond starts breaking.
pub const BOND_FADE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BondState {
    Intact,
    Breaking { progress: f64 },
}

/// Van der Waals style link drawn between two deposit particles.
#[derive(Debug, Clone, PartialEq)]
pub struct CohesionBond {
    pub(crate) a: usize,
    pub(crate) b: usize,
    pub(crate) state: BondState,
}

impl CohesionBond {
    pub fn endpoints(&self) -> (usize, usize) {
        (self.a, self.b)
    }

    pub fn state(&self) -> BondState {
        self.state
    }

    pub fn is_intact(&self) -> bool {
        self.state == BondState::Intact
    }

    pub(crate) fn snap(&mut self) {
        if self.is_intact() {
            self.state = BondState::Breaking { progress: 0.0 };
        }
    }

    pub(crate) fn advance(&mut self) {
        if let BondState::Breaking { progress } = &mut self.state {
            *progress += BOND_FADE_STEP;
        }
    }

    /// Line opacity, `None` once the bond has faded out completely.
    pub fn alpha(&self) -> Option<f32> {
        let alpha = match self.state {
            BondState::Intact => BOND_ALPHA,
            BondState::Breaking { progress } => (BOND_ALPHA - progress as f32).max(0.0),
        };
        (alpha > 0.0).then_some(alpha)
    }
}

/// Links every pair of same-layer particles whose spawn positions are within
/// [`BOND_DISTANCE`], recording the bond index on both endpoints.
pub(crate) fn link(particles: &mut [ScaleParticle]) -> Vec<CohesionBond> {
    let mut bonds = Vec::new();
    for a in 0..particles.len() {
        for b in (a + 1)..particles.len() {
            if particles[a].layer != particles[b].layer {
                continue;
            }
            if particles[a].position.distance(particles[b].position) < BOND_DISTANCE {
                let index = bonds.len();
                bonds.push(CohesionBond {
                    a,
                    b,
                    state: BondState::Intact,
                });
                particles[a].bonds.push(index);
                particles[b].bonds.push(index);
            }
        }
    }
    bonds
}
