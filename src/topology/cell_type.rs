//! Element shape tags and their reference-element tables.

/// Shape tag of a mesh element.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementTag {
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product cell.
    Quadrilateral,
    /// 3D simplex.
    Tetrahedron,
    /// 3D pyramid with a quadrilateral base (corners 0..4) and apex 4.
    Pyramid,
    /// 3D wedge with bottom triangle 0..3 and top triangle 3..6.
    Prism,
    /// 3D tensor-product cell with bottom face 0..4 and top face 4..8.
    Hexahedron,
}

const TRIANGLE_SIDES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUADRILATERAL_SIDES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_SIDES: &[&[usize]] = &[&[0, 1, 2], &[0, 1, 3], &[1, 2, 3], &[0, 2, 3]];
const PYRAMID_SIDES: &[&[usize]] = &[
    &[0, 1, 2, 3],
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
];
const PRISM_SIDES: &[&[usize]] = &[
    &[0, 1, 2],
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[2, 0, 3, 5],
    &[3, 4, 5],
];
const HEXAHEDRON_SIDES: &[&[usize]] = &[
    &[0, 1, 2, 3],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
    &[4, 5, 6, 7],
];

impl ElementTag {
    /// Spatial dimension of the element.
    pub fn dimension(self) -> usize {
        match self {
            ElementTag::Triangle | ElementTag::Quadrilateral => 2,
            ElementTag::Tetrahedron
            | ElementTag::Pyramid
            | ElementTag::Prism
            | ElementTag::Hexahedron => 3,
        }
    }

    /// Number of corners (3 to 8).
    pub fn corners(self) -> usize {
        match self {
            ElementTag::Triangle => 3,
            ElementTag::Quadrilateral | ElementTag::Tetrahedron => 4,
            ElementTag::Pyramid => 5,
            ElementTag::Prism => 6,
            ElementTag::Hexahedron => 8,
        }
    }

    /// Number of sides (edges in 2D, faces in 3D).
    pub fn sides(self) -> usize {
        self.side_table().len()
    }

    /// Local corner indices of side `side`.
    ///
    /// # Panics
    /// Panics if `side >= self.sides()`.
    pub fn side_corners(self, side: usize) -> &'static [usize] {
        self.side_table()[side]
    }

    fn side_table(self) -> &'static [&'static [usize]] {
        match self {
            ElementTag::Triangle => TRIANGLE_SIDES,
            ElementTag::Quadrilateral => QUADRILATERAL_SIDES,
            ElementTag::Tetrahedron => TETRAHEDRON_SIDES,
            ElementTag::Pyramid => PYRAMID_SIDES,
            ElementTag::Prism => PRISM_SIDES,
            ElementTag::Hexahedron => HEXAHEDRON_SIDES,
        }
    }
}
