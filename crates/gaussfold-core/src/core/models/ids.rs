/// Dense index of a modelled point.
///
/// Ids are handed out by [`PointArena`](super::arena::PointArena) in insertion
/// order, so `id.index()` is also the row/column of the point in every
/// restraint matrix and the position of its coordinates in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(usize);

impl PointId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
