use crate::error::{Error, Result};
use crate::shared::{Float, Vector};

/// Axis-aligned box. Octant geometry assumes it is a cube, which is what
/// [`BoundingBox::cube`] and [`BoundingBox::enclosing_cube`] produce.
///
/// Octants are numbered with bit 2 for X, bit 1 for Y and bit 0 for Z. A
/// coordinate equal to the center on some axis counts as the lower half on
/// that axis, and [`BoundingBox::octant`] gives the lower child the closed
/// upper face, so every point routed to a child is contained by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<F: Float> {
    min: Vector<F>,
    max: Vector<F>,
}

impl<F: Float> BoundingBox<F> {
    pub fn new(min: Vector<F>, max: Vector<F>) -> Self {
        Self { min, max }
    }

    pub fn cube(center: Vector<F>, side_length: F) -> Self {
        let half = Vector::repeat(side_length * nalgebra::convert::<f64, F>(0.5));
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest cube centered on the positions' extent, grown by
    /// `padding * side` so every position lies strictly inside it.
    ///
    /// A degenerate extent (one particle, or all of them coincident) gets a
    /// unit side before padding. Center and half-side are taken from halved
    /// coordinates, so extents wider than the largest float still work as
    /// long as the padded cube itself is representable. When it is not, the
    /// result is [`Error::BoundsOverflow`].
    pub fn enclosing_cube<'a, I>(positions: I, padding: F) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Vector<F>>,
        F: 'a,
    {
        let mut extent: Option<(Vector<F>, Vector<F>)> = None;
        for (index, position) in positions.into_iter().enumerate() {
            if !position.iter().all(|c| c.is_finite()) {
                return Err(Error::NonFinitePosition { index });
            }
            extent = Some(match extent {
                None => (*position, *position),
                Some((lo, hi)) => (lo.inf(position), hi.sup(position)),
            });
        }
        let (lo, hi) = extent.ok_or(Error::EmptyParticleSet)?;

        let half = nalgebra::convert::<f64, F>(0.5);
        let center = lo * half + hi * half;
        let reach = hi * half - lo * half;
        let mut half_side = reach.x.max(reach.y).max(reach.z);
        if !(half_side > F::zero()) {
            half_side = half;
        }
        let half_side = Vector::repeat(half_side * (F::one() + padding));
        let bounds = Self {
            min: center - half_side,
            max: center + half_side,
        };

        let finite = bounds.min.iter().chain(bounds.max.iter()).all(|c| c.is_finite());
        if !finite || !bounds.contains(&lo) || !bounds.contains(&hi) {
            return Err(Error::BoundsOverflow);
        }
        Ok(bounds)
    }

    pub fn min(&self) -> &Vector<F> {
        &self.min
    }

    pub fn max(&self) -> &Vector<F> {
        &self.max
    }

    pub fn center(&self) -> Vector<F> {
        let half = nalgebra::convert::<f64, F>(0.5);
        self.min * half + self.max * half
    }

    pub fn side_length(&self) -> F {
        self.max.x - self.min.x
    }

    pub fn volume(&self) -> F {
        let span = self.max - self.min;
        span.x * span.y * span.z
    }

    /// Inclusive on every face.
    pub fn contains(&self, point: &Vector<F>) -> bool {
        (0..3usize).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    pub fn octant_index(&self, point: &Vector<F>) -> usize {
        let center = self.center();
        let mut index = 0;
        if point.x > center.x {
            index |= 0b100;
        }
        if point.y > center.y {
            index |= 0b010;
        }
        if point.z > center.z {
            index |= 0b001;
        }
        index
    }

    /// The child cube for octant `index`.
    pub fn octant(&self, index: usize) -> Self {
        debug_assert!(index < 8);
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        for (axis, bit) in [(0usize, 0b100), (1, 0b010), (2, 0b001)] {
            if index & bit != 0 {
                min[axis] = center[axis];
            } else {
                max[axis] = center[axis];
            }
        }
        Self { min, max }
    }

    pub fn subdivide(&self) -> [Self; 8] {
        std::array::from_fn(|index| self.octant(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn unit_box() -> BoundingBox<f64> {
        BoundingBox::new(Vector::new(-1.0, -1.0, -1.0), Vector::new(1.0, 1.0, 1.0))
    }

    fn overlap_volume(a: &BoundingBox<f64>, b: &BoundingBox<f64>) -> f64 {
        (0..3usize)
            .map(|axis| (a.max()[axis].min(b.max()[axis]) - a.min()[axis].max(b.min()[axis])).max(0.0))
            .product()
    }

    #[test]
    fn test_center_and_side_length() {
        let bounds = BoundingBox::cube(Vector::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(bounds.center(), Vector::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.side_length(), 4.0);
        assert_eq!(bounds.volume(), 64.0);
        assert!(bounds.contains(&Vector::new(3.0, 0.0, 1.0)));
        assert!(!bounds.contains(&Vector::new(3.0001, 2.0, 3.0)));
    }

    #[test]
    fn test_subdivide_partitions_volume() {
        let bounds = unit_box();
        let children = bounds.subdivide();

        let total: f64 = children.iter().map(|c| c.volume()).sum();
        assert!((total - bounds.volume()).abs() < 1e-12);

        for (i, a) in children.iter().enumerate() {
            assert_eq!(a.side_length(), 1.0);
            for b in children.iter().skip(i + 1) {
                assert_eq!(overlap_volume(a, b), 0.0);
            }
        }
    }

    #[test]
    fn test_octant_index_matches_child() {
        let bounds = BoundingBox::cube(Vector::new(0.3, -7.0, 12.5), 3.0);
        let children = bounds.subdivide();
        let mut rng = StdRng::seed_from_u64(42);

        for (i, child) in children.iter().enumerate() {
            for _ in 0..200 {
                let t = Vector::new(
                    rng.random_range(0.01..0.99),
                    rng.random_range(0.01..0.99),
                    rng.random_range(0.01..0.99),
                );
                let point = child.min() + (child.max() - child.min()).component_mul(&t);
                assert_eq!(bounds.octant_index(&point), i);
            }
        }
    }

    #[test]
    fn test_routed_points_are_contained() {
        let bounds = BoundingBox::cube(Vector::new(0.1, 0.2, 0.3), 0.7);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let t = Vector::new(rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>());
            let point = bounds.min() + (bounds.max() - bounds.min()).component_mul(&t);
            let child = bounds.octant(bounds.octant_index(&point));
            assert!(child.contains(&point));
        }
    }

    #[test]
    fn test_center_plane_goes_lower() {
        let bounds = unit_box();
        assert_eq!(bounds.octant_index(&Vector::zeros()), 0);
        assert_eq!(bounds.octant_index(&Vector::new(0.0, 0.5, 0.0)), 0b010);
        assert_eq!(bounds.octant_index(&Vector::new(0.5, 0.0, 0.5)), 0b101);
        assert_eq!(bounds.octant_index(&Vector::new(1.0, 1.0, 1.0)), 7);
        assert_eq!(bounds.octant_index(&Vector::new(-1.0, -1.0, -1.0)), 0);

        // the center belongs to the lower child's closed face
        assert!(bounds.octant(0).contains(&Vector::zeros()));
        assert_eq!(bounds.octant(0).max(), &Vector::zeros());
        assert_eq!(bounds.octant(7).min(), &Vector::zeros());
    }

    #[test]
    fn test_enclosing_cube() {
        let positions = [
            Vector::<f64>::new(0.0, 0.0, 0.0),
            Vector::new(10.0, 1.0, -2.0),
            Vector::new(3.0, 4.0, 2.0),
        ];
        let bounds = BoundingBox::enclosing_cube(positions.iter(), 0.01).unwrap();
        assert!((bounds.side_length() - 10.1).abs() < 1e-12);
        assert_eq!(bounds.center(), Vector::new(5.0, 2.0, 0.0));
        for p in &positions {
            assert!(bounds.contains(p));
            assert!(p.x > bounds.min().x && p.x < bounds.max().x);
        }
        let span = bounds.max() - bounds.min();
        assert!((span.y - span.x).abs() < 1e-12 && (span.z - span.x).abs() < 1e-12);
    }

    #[test]
    fn test_enclosing_cube_degenerate_extent() {
        let positions = [Vector::new(2.0, 2.0, 2.0), Vector::new(2.0, 2.0, 2.0)];
        let bounds = BoundingBox::enclosing_cube(positions.iter(), 0.0).unwrap();
        assert_eq!(bounds.side_length(), 1.0);
        assert_eq!(bounds.center(), Vector::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_enclosing_cube_errors() {
        let empty: [Vector<f64>; 0] = [];
        assert_eq!(
            BoundingBox::enclosing_cube(empty.iter(), 0.01),
            Err(Error::EmptyParticleSet)
        );

        let positions = [Vector::new(0.0, 0.0, 0.0), Vector::new(f64::INFINITY, 0.0, 0.0)];
        assert_eq!(
            BoundingBox::enclosing_cube(positions.iter(), 0.01),
            Err(Error::NonFinitePosition { index: 1 })
        );
    }

    #[test]
    fn test_enclosing_cube_of_extreme_extent() {
        let positions = [Vector::<f64>::new(-1e308, 0.0, 0.0), Vector::new(1e308, 0.0, 0.0)];
        let bounds = BoundingBox::enclosing_cube(positions.iter(), 0.01).unwrap();
        assert_eq!(bounds.center(), Vector::zeros());
        assert!(bounds.min().iter().chain(bounds.max().iter()).all(|c| c.is_finite()));
        for p in &positions {
            assert!(bounds.contains(p));
        }
        assert_eq!(bounds.octant_index(&positions[0]), 0);
        assert_eq!(bounds.octant_index(&positions[1]), 0b100);

        let positions = [Vector::new(-1.7e308, 0.0, 0.0), Vector::new(1.7e308, 0.0, 0.0)];
        assert_eq!(
            BoundingBox::enclosing_cube(positions.iter(), 0.5),
            Err(Error::BoundsOverflow)
        );
    }
}
