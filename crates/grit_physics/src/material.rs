//! Friction and restitution between interaction groups
//!
//! Every physical material belongs to an interaction group. When two
//! materials touch, the pair of groups selects one [`Interaction`] from a
//! square matrix owned by the physics world.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Contact response for one pair of interaction groups
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Friction coefficient (0.0 = ice)
    pub friction: f32,
    /// Restitution/bounciness (0.0 = no bounce, 1.0 = perfect bounce)
    pub restitution: f32,
}

impl Interaction {
    pub const fn new(friction: f32, restitution: f32) -> Self {
        Self { friction, restitution }
    }
}

/// One authored matrix cell
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub a: u32,
    pub b: u32,
    pub friction: f32,
    pub restitution: f32,
    /// Only set (a, b), leaving (b, a) alone
    #[serde(default)]
    pub one_way: bool,
}

/// On-disk shape of an interaction matrix
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InteractionFile {
    pub groups: u32,
    #[serde(default)]
    pub default: Interaction,
    #[serde(default)]
    pub pairs: Vec<InteractionEntry>,
}

/// Square groups × groups table of [`Interaction`]s
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionMatrix {
    groups: u32,
    cells: Vec<Interaction>,
}

impl Default for InteractionMatrix {
    /// A single frictionless, bounceless group
    fn default() -> Self {
        Self::new(1, Interaction::default())
    }
}

impl InteractionMatrix {
    /// Create a matrix with every cell set to `fill`
    pub fn new(groups: u32, fill: Interaction) -> Self {
        Self {
            groups,
            cells: vec![fill; (groups as usize) * (groups as usize)],
        }
    }

    pub fn groups(&self) -> u32 {
        self.groups
    }

    fn index(&self, a: u32, b: u32) -> Option<usize> {
        if a < self.groups && b < self.groups {
            Some(a as usize * self.groups as usize + b as usize)
        } else {
            None
        }
    }

    /// Set both (a, b) and (b, a)
    ///
    /// Returns false if either group is out of range.
    pub fn set(&mut self, a: u32, b: u32, interaction: Interaction) -> bool {
        self.set_one_way(a, b, interaction) && self.set_one_way(b, a, interaction)
    }

    /// Set only (a, b)
    pub fn set_one_way(&mut self, a: u32, b: u32, interaction: Interaction) -> bool {
        match self.index(a, b) {
            Some(i) => {
                self.cells[i] = interaction;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, a: u32, b: u32) -> Option<Interaction> {
        self.index(a, b).map(|i| self.cells[i])
    }

    /// Friction and restitution for a pair of groups
    ///
    /// Groups outside the matrix are logged and give (0, 0) rather than
    /// failing, since this runs inside contact resolution.
    pub fn get_friction_restitution(&self, a: u32, b: u32) -> (f32, f32) {
        match self.get(a, b) {
            Some(i) => (i.friction, i.restitution),
            None => {
                log::error!(
                    "Interaction groups ({}, {}) outside the {}x{} interaction matrix",
                    a,
                    b,
                    self.groups,
                    self.groups
                );
                (0.0, 0.0)
            }
        }
    }

    /// Whether every (a, b) equals (b, a)
    pub fn is_symmetric(&self) -> bool {
        (0..self.groups).all(|a| (0..a).all(|b| self.get(a, b) == self.get(b, a)))
    }

    pub fn from_file(file: &InteractionFile) -> Result<Self, InteractionError> {
        let mut m = Self::new(file.groups, file.default);
        for e in &file.pairs {
            let ok = if e.one_way {
                m.set_one_way(e.a, e.b, Interaction::new(e.friction, e.restitution))
            } else {
                m.set(e.a, e.b, Interaction::new(e.friction, e.restitution))
            };
            if !ok {
                return Err(InteractionError::GroupOutOfRange { a: e.a, b: e.b, groups: file.groups });
            }
        }
        Ok(m)
    }

    /// Parse a matrix from RON text
    pub fn from_ron_str(contents: &str) -> Result<Self, InteractionError> {
        let file: InteractionFile = ron::from_str(contents)?;
        Self::from_file(&file)
    }

    /// Load a matrix from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InteractionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }
}

/// Error loading an interaction matrix
#[derive(Debug)]
pub enum InteractionError {
    Io(io::Error),
    Parse(ron::error::SpannedError),
    GroupOutOfRange { a: u32, b: u32, groups: u32 },
}

impl From<io::Error> for InteractionError {
    fn from(e: io::Error) -> Self {
        InteractionError::Io(e)
    }
}

impl From<ron::error::SpannedError> for InteractionError {
    fn from(e: ron::error::SpannedError) -> Self {
        InteractionError::Parse(e)
    }
}

impl fmt::Display for InteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionError::Io(e) => write!(f, "IO error: {}", e),
            InteractionError::Parse(e) => write!(f, "Parse error: {}", e),
            InteractionError::GroupOutOfRange { a, b, groups } => {
                write!(f, "Interaction ({}, {}) outside {} groups", a, b, groups)
            }
        }
    }
}

impl std::error::Error for InteractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InteractionError::Io(e) => Some(e),
            InteractionError::Parse(e) => Some(e),
            InteractionError::GroupOutOfRange { .. } => None,
        }
    }
}
