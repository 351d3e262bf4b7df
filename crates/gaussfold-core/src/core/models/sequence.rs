use super::labels::LabelError;
use phf::{Map, phf_map};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AminoAcid {
    // --- Aliphatic, Nonpolar ---
    Alanine,
    Glycine,
    Isoleucine,
    Leucine,
    Proline,
    Valine,

    // --- Aromatic ---
    Phenylalanine,
    Tryptophan,
    Tyrosine,

    // --- Polar, Uncharged ---
    Asparagine,
    Cysteine,
    Glutamine,
    Serine,
    Threonine,
    Methionine,

    // --- Charged ---
    Arginine,
    Histidine,
    Lysine,
    AsparticAcid,
    GlutamicAcid,
}

static ONE_LETTER_CODES: Map<char, AminoAcid> = phf_map! {
    'A' => AminoAcid::Alanine,
    'G' => AminoAcid::Glycine,
    'I' => AminoAcid::Isoleucine,
    'L' => AminoAcid::Leucine,
    'P' => AminoAcid::Proline,
    'V' => AminoAcid::Valine,
    'F' => AminoAcid::Phenylalanine,
    'W' => AminoAcid::Tryptophan,
    'Y' => AminoAcid::Tyrosine,
    'N' => AminoAcid::Asparagine,
    'C' => AminoAcid::Cysteine,
    'Q' => AminoAcid::Glutamine,
    'S' => AminoAcid::Serine,
    'T' => AminoAcid::Threonine,
    'M' => AminoAcid::Methionine,
    'R' => AminoAcid::Arginine,
    'H' => AminoAcid::Histidine,
    'K' => AminoAcid::Lysine,
    'D' => AminoAcid::AsparticAcid,
    'E' => AminoAcid::GlutamicAcid,
};

impl AminoAcid {
    pub fn from_one_letter(code: char) -> Option<Self> {
        ONE_LETTER_CODES.get(&code.to_ascii_uppercase()).copied()
    }

    pub fn to_three_letter(self) -> &'static str {
        match self {
            Self::Alanine => "ALA",
            Self::Glycine => "GLY",
            Self::Isoleucine => "ILE",
            Self::Leucine => "LEU",
            Self::Proline => "PRO",
            Self::Valine => "VAL",
            Self::Phenylalanine => "PHE",
            Self::Tryptophan => "TRP",
            Self::Tyrosine => "TYR",
            Self::Asparagine => "ASN",
            Self::Cysteine => "CYS",
            Self::Glutamine => "GLN",
            Self::Serine => "SER",
            Self::Threonine => "THR",
            Self::Methionine => "MET",
            Self::Arginine => "ARG",
            Self::Histidine => "HIS",
            Self::Lysine => "LYS",
            Self::AsparticAcid => "ASP",
            Self::GlutamicAcid => "GLU",
        }
    }

    pub fn is_cysteine(self) -> bool {
        self == Self::Cysteine
    }

    /// Parses a one-letter primary structure. Whitespace is ignored.
    pub fn parse_sequence(text: &str) -> Result<Vec<Self>, LabelError> {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .enumerate()
            .map(|(position, code)| {
                Self::from_one_letter(code).ok_or(LabelError::UnknownAminoAcid { code, position })
            })
            .collect()
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_three_letter())
    }
}
