// SPDX-License-Identifier: MIT OR Apache-2.0
//! Primitive collections flowing along links.

use glam::Vec3;

/// A set of unconnected points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// Point positions
    pub points: Vec<Vec3>,
}

impl PointCloud {
    /// Create a point cloud from positions
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }
}

/// A set of polylines, each running from its root to its tip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveSet {
    /// Points of every curve, root first
    pub curves: Vec<Vec<Vec3>>,
}

impl CurveSet {
    /// Create a curve set
    pub fn new(curves: Vec<Vec<Vec3>>) -> Self {
        Self { curves }
    }

    /// Total number of points over all curves
    pub fn point_count(&self) -> usize {
        self.curves.iter().map(Vec::len).sum()
    }
}

/// The kind of a primitive, used when an operator requires a specific one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// [`PointCloud`]
    Points,
    /// [`CurveSet`]
    Curves,
}

/// A geometric primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Point cloud
    Points(PointCloud),
    /// Curves
    Curves(CurveSet),
}

impl Primitive {
    /// Kind of this primitive
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Points(_) => PrimitiveKind::Points,
            Self::Curves(_) => PrimitiveKind::Curves,
        }
    }

    /// Visit every position mutably
    pub fn positions_mut(&mut self) -> Box<dyn Iterator<Item = &mut Vec3> + '_> {
        match self {
            Self::Points(cloud) => Box::new(cloud.points.iter_mut()),
            Self::Curves(set) => Box::new(set.curves.iter_mut().flatten()),
        }
    }

    /// Visit every position
    pub fn positions(&self) -> Box<dyn Iterator<Item = &Vec3> + '_> {
        match self {
            Self::Points(cloud) => Box::new(cloud.points.iter()),
            Self::Curves(set) => Box::new(set.curves.iter().flatten()),
        }
    }
}

/// The payload an operator reads and produces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Primitives in insertion order
    pub primitives: Vec<Primitive>,
}

impl Collection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a primitive and return its index
    pub fn push(&mut self, primitive: Primitive) -> usize {
        self.primitives.push(primitive);
        self.primitives.len() - 1
    }

    /// Index of the first primitive of a kind
    pub fn find(&self, kind: PrimitiveKind) -> Option<usize> {
        self.primitives.iter().position(|p| p.kind() == kind)
    }

    /// First point cloud and its index
    pub fn first_points(&self) -> Option<(usize, &PointCloud)> {
        self.primitives.iter().enumerate().find_map(|(i, p)| match p {
            Primitive::Points(cloud) => Some((i, cloud)),
            Primitive::Curves(_) => None,
        })
    }

    /// First curve set and its index
    pub fn first_curves(&self) -> Option<(usize, &CurveSet)> {
        self.primitives.iter().enumerate().find_map(|(i, p)| match p {
            Primitive::Curves(set) => Some((i, set)),
            Primitive::Points(_) => None,
        })
    }

    /// Point cloud at an index
    pub fn points_mut(&mut self, index: usize) -> Option<&mut PointCloud> {
        match self.primitives.get_mut(index)? {
            Primitive::Points(cloud) => Some(cloud),
            Primitive::Curves(_) => None,
        }
    }

    /// Curve set at an index
    pub fn curves_mut(&mut self, index: usize) -> Option<&mut CurveSet> {
        match self.primitives.get_mut(index)? {
            Primitive::Curves(set) => Some(set),
            Primitive::Points(_) => None,
        }
    }

    /// Total number of points over all primitives
    pub fn point_count(&self) -> usize {
        self.primitives.iter().map(|p| p.positions().count()).sum()
    }

    /// Whether the collection holds no primitive
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Axis-aligned bounds of all positions, `None` when there are none
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut positions = self.primitives.iter().flat_map(Primitive::positions);
        let first = *positions.next()?;
        Some(positions.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_bounds() {
        let mut collection = Collection::new();
        collection.push(Primitive::Curves(CurveSet::new(vec![vec![Vec3::ZERO, Vec3::X]])));
        let idx = collection.push(Primitive::Points(PointCloud::new(vec![Vec3::new(0.0, -2.0, 1.0)])));

        assert_eq!(collection.find(PrimitiveKind::Points), Some(idx));
        assert_eq!(collection.point_count(), 3);
        let (lo, hi) = collection.bounds().unwrap();
        assert_eq!(lo, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 0.0, 1.0));
        assert!(Collection::new().bounds().is_none());
    }
}
