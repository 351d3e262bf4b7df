use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LabelError {
    #[error("Unknown secondary structure code '{code}' at position {position}")]
    UnknownSecondaryStructure { code: char, position: usize },
    #[error("Unknown solvent accessibility code '{code}' at position {position}")]
    UnknownAccessibility { code: char, position: usize },
    #[error("Unknown amino acid code '{code}' at position {position}")]
    UnknownAminoAcid { code: char, position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryStructure {
    Helix,
    Strand,
    Coil,
}

// 8-state DSSP codes reduced to the 3-state alphabet. Plain H/E/C map onto themselves.
static DSSP_REDUCTION: Map<char, SecondaryStructure> = phf_map! {
    'H' => SecondaryStructure::Helix,
    'G' => SecondaryStructure::Helix,
    'I' => SecondaryStructure::Helix,
    'E' => SecondaryStructure::Strand,
    'B' => SecondaryStructure::Strand,
    'C' => SecondaryStructure::Coil,
    'T' => SecondaryStructure::Coil,
    'S' => SecondaryStructure::Coil,
    '-' => SecondaryStructure::Coil,
    '.' => SecondaryStructure::Coil,
};

impl SecondaryStructure {
    pub fn from_code(code: char) -> Option<Self> {
        DSSP_REDUCTION.get(&code.to_ascii_uppercase()).copied()
    }

    pub fn to_code(self) -> char {
        match self {
            Self::Helix => 'H',
            Self::Strand => 'E',
            Self::Coil => 'C',
        }
    }

    /// Parses a label string, one code per residue. Whitespace is ignored.
    pub fn parse_sequence(text: &str) -> Result<Vec<Self>, LabelError> {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .enumerate()
            .map(|(position, code)| {
                Self::from_code(code)
                    .ok_or(LabelError::UnknownSecondaryStructure { code, position })
            })
            .collect()
    }
}

impl fmt::Display for SecondaryStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolventAccessibility {
    Buried,
    Medium,
    Exposed,
}

impl SolventAccessibility {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'B' => Some(Self::Buried),
            'M' => Some(Self::Medium),
            'E' => Some(Self::Exposed),
            _ => None,
        }
    }

    pub fn parse_sequence(text: &str) -> Result<Vec<Self>, LabelError> {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .enumerate()
            .map(|(position, code)| {
                Self::from_code(code).ok_or(LabelError::UnknownAccessibility { code, position })
            })
            .collect()
    }
}

impl FromStr for SolventAccessibility {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => {
                Self::from_code(code).ok_or(LabelError::UnknownAccessibility { code, position: 0 })
            }
            _ => Err(LabelError::UnknownAccessibility {
                code: s.chars().next().unwrap_or(' '),
                position: 0,
            }),
        }
    }
}

/// Run-length encodes a label sequence: a new segment starts whenever the
/// label differs from the previous residue's.
pub fn segment_ids(labels: &[SecondaryStructure]) -> Vec<usize> {
    let mut ids = Vec::with_capacity(labels.len());
    let mut current = 0;
    for (i, label) in labels.iter().enumerate() {
        if i > 0 && *label != labels[i - 1] {
            current += 1;
        }
        ids.push(current);
    }
    ids
}
