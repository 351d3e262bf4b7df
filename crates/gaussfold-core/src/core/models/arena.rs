use super::ids::PointId;
use super::sequence::AminoAcid;
use crate::core::utils::geometry::centroid;
use nalgebra::Point3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    /// Representative atom of a residue (C-alpha or C-beta), indexed along the chain.
    Residue {
        index: usize,
        amino_acid: Option<AminoAcid>,
    },
    /// Free dummy point that burial restraints pull residues towards.
    CenterOfMass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRecord {
    pub id: PointId,
    pub kind: PointKind,
}

/// Owns every modelled point and assigns their ids.
///
/// Ids come from the arena's own counter, so two arenas never share state and
/// a point's id is stable for the arena's lifetime.
#[derive(Debug, Clone, Default)]
pub struct PointArena {
    records: Vec<PointRecord>,
    residues: Vec<PointId>,
    center_of_mass: Option<PointId>,
    next_id: usize,
}

impl PointArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an arena with one point per residue, optionally annotated with the
    /// primary structure.
    pub fn for_chain(n_residues: usize, sequence: Option<&[AminoAcid]>) -> Self {
        let mut arena = Self::new();
        for i in 0..n_residues {
            let amino_acid = sequence.and_then(|seq| seq.get(i).copied());
            arena.add_residue(amino_acid);
        }
        arena
    }

    fn allocate(&mut self, kind: PointKind) -> PointId {
        let id = PointId::new(self.next_id);
        self.next_id += 1;
        self.records.push(PointRecord { id, kind });
        id
    }

    pub fn add_residue(&mut self, amino_acid: Option<AminoAcid>) -> PointId {
        let index = self.residues.len();
        let id = self.allocate(PointKind::Residue { index, amino_acid });
        self.residues.push(id);
        id
    }

    /// Returns the center-of-mass point, creating it on first use.
    pub fn add_center_of_mass(&mut self) -> PointId {
        if let Some(id) = self.center_of_mass {
            return id;
        }
        let id = self.allocate(PointKind::CenterOfMass);
        self.center_of_mass = Some(id);
        id
    }

    pub fn center_of_mass(&self) -> Option<PointId> {
        self.center_of_mass
    }

    pub fn residue(&self, index: usize) -> Option<PointId> {
        self.residues.get(index).copied()
    }

    pub fn get(&self, id: PointId) -> Option<&PointRecord> {
        self.records.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointRecord> {
        self.records.iter()
    }

    /// Residue indices of the cysteines in chain order.
    pub fn cysteines(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.iter().filter_map(|record| match record.kind {
            PointKind::Residue {
                index,
                amino_acid: Some(aa),
            } if aa.is_cysteine() => Some(index),
            _ => None,
        })
    }

    /// Expands per-residue coordinates into a full layout over every point in
    /// the arena. The center of mass starts at the residues' centroid.
    pub fn expand_layout(&self, residue_coords: &[Point3<f64>]) -> Option<Vec<Point3<f64>>> {
        if residue_coords.len() != self.residues.len() {
            return None;
        }
        let com = centroid(residue_coords);
        let layout = self
            .records
            .iter()
            .map(|record| match record.kind {
                PointKind::Residue { index, .. } => residue_coords[index],
                PointKind::CenterOfMass => com,
            })
            .collect();
        Some(layout)
    }

    /// Extracts per-residue coordinates from a full layout, dropping dummy points.
    pub fn residue_coords(&self, layout: &[Point3<f64>]) -> Option<Vec<Point3<f64>>> {
        if layout.len() != self.records.len() {
            return None;
        }
        Some(self.residues.iter().map(|id| layout[id.index()]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_assigned_in_insertion_order() {
        let mut arena = PointArena::new();
        let a = arena.add_residue(None);
        let b = arena.add_residue(Some(AminoAcid::Glycine));
        let com = arena.add_center_of_mass();
        assert_eq!((a.index(), b.index(), com.index()), (0, 1, 2));
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.n_residues(), 2);
        assert_eq!(arena.residue(1), Some(b));
        assert_eq!(arena.get(com).unwrap().kind, PointKind::CenterOfMass);
    }

    #[test]
    fn center_of_mass_is_created_once() {
        let mut arena = PointArena::for_chain(3, None);
        let first = arena.add_center_of_mass();
        let second = arena.add_center_of_mass();
        assert_eq!(first, second);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn separate_arenas_do_not_share_counters() {
        let mut a = PointArena::new();
        let mut b = PointArena::new();
        a.add_residue(None);
        a.add_residue(None);
        assert_eq!(b.add_residue(None).index(), 0);
    }

    #[test]
    fn cysteines_are_reported_by_residue_index() {
        let seq = AminoAcid::parse_sequence("ACGCC").unwrap();
        let arena = PointArena::for_chain(seq.len(), Some(&seq));
        assert_eq!(arena.cysteines().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn expand_layout_places_center_of_mass_at_centroid() {
        let mut arena = PointArena::for_chain(2, None);
        arena.add_center_of_mass();
        let coords = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)];
        let layout = arena.expand_layout(&coords).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout[2], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(arena.residue_coords(&layout).unwrap(), coords.to_vec());
    }

    #[test]
    fn expand_layout_rejects_wrong_length() {
        let arena = PointArena::for_chain(3, None);
        assert!(arena.expand_layout(&[Point3::origin()]).is_none());
        assert!(arena.residue_coords(&[Point3::origin()]).is_none());
    }
}
