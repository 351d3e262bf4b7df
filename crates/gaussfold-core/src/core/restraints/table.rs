use crate::core::models::labels::SecondaryStructure;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Mean and spread (Angstroms) of one Gaussian distance distribution.
///
/// `weighted` restraints take the per-pair confidence weight from the contact
/// graph; the others always use weight 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaussianParams {
    pub mu: f64,
    pub sigma: f64,
    #[serde(default)]
    pub weighted: bool,
}

impl GaussianParams {
    pub const fn new(mu: f64, sigma: f64) -> Self {
        Self {
            mu,
            sigma,
            weighted: false,
        }
    }

    pub const fn weighted(mu: f64, sigma: f64) -> Self {
        Self {
            mu,
            sigma,
            weighted: true,
        }
    }
}

/// Distance distribution for two residues of one secondary-structure segment
/// separated by `separation` positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalRule {
    pub separation: usize,
    pub mu: f64,
    pub sigma: f64,
    #[serde(default)]
    pub weighted: bool,
}

impl LocalRule {
    const fn new(separation: usize, params: GaussianParams) -> Self {
        Self {
            separation,
            mu: params.mu,
            sigma: params.sigma,
            weighted: params.weighted,
        }
    }

    pub fn params(&self) -> GaussianParams {
        GaussianParams {
            mu: self.mu,
            sigma: self.sigma,
            weighted: self.weighted,
        }
    }
}

/// Statistical distance distributions backing every restraint kind.
///
/// The defaults are the published C-alpha statistics. Any subset can be
/// overridden from a TOML file; missing keys keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestraintTable {
    /// Consecutive-residue distances for sequence separations 1, 2 and 3.
    pub adjacent: [GaussianParams; 3],
    pub contact: GaussianParams,
    pub helix: Vec<LocalRule>,
    pub strand: Vec<LocalRule>,
    pub strand_strand: GaussianParams,
    pub helix_strand: GaussianParams,
    pub helix_coil: GaussianParams,
    pub strand_coil: GaussianParams,
    /// Minimum sequence separation for paired secondary-structure contacts.
    pub min_paired_separation: usize,
    pub disulfide: GaussianParams,
    pub interior: GaussianParams,
    pub exterior: GaussianParams,
    pub repulsion: GaussianParams,
}

impl Default for RestraintTable {
    fn default() -> Self {
        Self {
            adjacent: [
                GaussianParams::new(3.81, 0.39),
                GaussianParams::new(5.20, 0.55),
                GaussianParams::new(7.00, 0.71),
            ],
            contact: GaussianParams::new(3.82, 0.35),
            helix: vec![
                LocalRule::new(2, GaussianParams::weighted(5.48, 0.14)),
                LocalRule::new(3, GaussianParams::weighted(5.20, 0.14)),
                LocalRule::new(4, GaussianParams::weighted(6.28, 0.26)),
                LocalRule::new(5, GaussianParams::new(8.75, 0.26)),
            ],
            strand: vec![
                LocalRule::new(2, GaussianParams::weighted(6.74, 0.28)),
                LocalRule::new(3, GaussianParams::weighted(10.10, 0.32)),
                LocalRule::new(4, GaussianParams::weighted(13.30, 1.41)),
            ],
            strand_strand: GaussianParams::new(4.54, 0.32),
            helix_strand: GaussianParams::weighted(6.05, 0.95),
            helix_coil: GaussianParams::weighted(6.60, 0.92),
            strand_coil: GaussianParams::weighted(6.44, 1.00),
            min_paired_separation: 4,
            disulfide: GaussianParams::new(5.50, 0.45),
            interior: GaussianParams::new(5.0, 3.16),
            exterior: GaussianParams::new(12.5, 3.87),
            repulsion: GaussianParams::new(20.0, 10.95),
        }
    }
}

impl RestraintTable {
    pub fn load(path: &Path) -> Result<Self, RestraintTableError> {
        let content = std::fs::read_to_string(path).map_err(|e| RestraintTableError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let table: Self = toml::from_str(&content).map_err(|e| RestraintTableError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), RestraintTableError> {
        let mut entries: Vec<(String, GaussianParams)> = vec![
            ("contact".into(), self.contact),
            ("strand-strand".into(), self.strand_strand),
            ("helix-strand".into(), self.helix_strand),
            ("helix-coil".into(), self.helix_coil),
            ("strand-coil".into(), self.strand_coil),
            ("disulfide".into(), self.disulfide),
            ("interior".into(), self.interior),
            ("exterior".into(), self.exterior),
            ("repulsion".into(), self.repulsion),
        ];
        for (k, p) in self.adjacent.iter().enumerate() {
            entries.push((format!("adjacent[{}]", k + 1), *p));
        }
        for rule in &self.helix {
            entries.push((format!("helix[{}]", rule.separation), rule.params()));
        }
        for rule in &self.strand {
            entries.push((format!("strand[{}]", rule.separation), rule.params()));
        }
        for (name, p) in entries {
            if !(p.sigma.is_finite() && p.sigma > 0.0 && p.mu.is_finite()) {
                return Err(RestraintTableError::InvalidEntry {
                    name,
                    mu: p.mu,
                    sigma: p.sigma,
                });
            }
        }
        Ok(())
    }

    /// Consecutive-residue distribution, for separations 1 to 3 only.
    pub fn adjacent(&self, separation: usize) -> Option<GaussianParams> {
        separation
            .checked_sub(1)
            .and_then(|k| self.adjacent.get(k))
            .copied()
    }

    /// Local distribution inside one helix or strand segment.
    pub fn local(&self, label: SecondaryStructure, separation: usize) -> Option<GaussianParams> {
        let rules = match label {
            SecondaryStructure::Helix => &self.helix,
            SecondaryStructure::Strand => &self.strand,
            SecondaryStructure::Coil => return None,
        };
        rules
            .iter()
            .find(|rule| rule.separation == separation)
            .map(LocalRule::params)
    }

    /// Distribution for a contact between residues labelled `a` and `b`.
    /// Coil/coil and helix/helix contacts have no dedicated entry.
    pub fn paired(&self, a: SecondaryStructure, b: SecondaryStructure) -> Option<GaussianParams> {
        use SecondaryStructure::*;
        match (a, b) {
            (Strand, Strand) => Some(self.strand_strand),
            (Helix, Strand) | (Strand, Helix) => Some(self.helix_strand),
            (Helix, Coil) | (Coil, Helix) => Some(self.helix_coil),
            (Strand, Coil) | (Coil, Strand) => Some(self.strand_coil),
            (Helix, Helix) | (Coil, Coil) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RestraintTableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid distribution '{name}': mu = {mu}, sigma = {sigma}")]
    InvalidEntry { name: String, mu: f64, sigma: f64 },
}
