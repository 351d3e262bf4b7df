use super::table::{GaussianParams, RestraintTable};
use crate::core::models::ids::PointId;
use crate::core::models::labels::SecondaryStructure;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestraintKind {
    /// Residues `separation` positions apart along the backbone (1 to 3).
    Adjacent { separation: usize },
    /// Explicit distribution supplied by the caller.
    Distance { mu: f64, sigma: f64 },
    /// Residues at graph distance 1.
    Contact,
    /// Residues of one helix or strand segment.
    SecondaryStructure {
        label: SecondaryStructure,
        separation: usize,
    },
    /// Contact between residues in two labelled regions.
    PairedContact {
        a: SecondaryStructure,
        b: SecondaryStructure,
    },
    DisulfideBond,
    /// Buried residue pulled towards the center of mass.
    Interior,
    /// Exposed residue pushed away from the center of mass.
    Exterior,
    /// Weak long-range term keeping distant residues apart.
    Repulsion,
}

impl RestraintKind {
    /// Looks up the distribution for this kind. `None` when the table has no
    /// entry, e.g. an adjacency separation above 3.
    pub fn params(&self, table: &RestraintTable) -> Option<GaussianParams> {
        match *self {
            Self::Adjacent { separation } => table.adjacent(separation),
            Self::Distance { mu, sigma } => Some(GaussianParams::new(mu, sigma)),
            Self::Contact => Some(table.contact),
            Self::SecondaryStructure { label, separation } => table.local(label, separation),
            Self::PairedContact { a, b } => table.paired(a, b),
            Self::DisulfideBond => Some(table.disulfide),
            Self::Interior => Some(table.interior),
            Self::Exterior => Some(table.exterior),
            Self::Repulsion => Some(table.repulsion),
        }
    }
}

impl fmt::Display for RestraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adjacent { separation } => write!(f, "adjacent(+{})", separation),
            Self::Distance { mu, sigma } => write!(f, "distance({:.2} +/- {:.2})", mu, sigma),
            Self::Contact => write!(f, "contact"),
            Self::SecondaryStructure { label, separation } => {
                write!(f, "local-{}(+{})", label, separation)
            }
            Self::PairedContact { a, b } => write!(f, "contact-{}{}", a, b),
            Self::DisulfideBond => write!(f, "disulfide"),
            Self::Interior => write!(f, "interior"),
            Self::Exterior => write!(f, "exterior"),
            Self::Repulsion => write!(f, "repulsion"),
        }
    }
}

/// One restraint between two points of the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Restraint {
    pub i: PointId,
    pub j: PointId,
    pub kind: RestraintKind,
    pub weight: f64,
}

impl Restraint {
    pub fn new(i: PointId, j: PointId, kind: RestraintKind) -> Self {
        Self {
            i,
            j,
            kind,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}
