//! Index Range Map
//!
//! Model vertices are stored as one flat, non-indexed vertex buffer. An
//! [`IndexRangeMap`] records which consecutive ranges of that buffer form
//! which primitive (triangle list, strip, fan, ...).
//!
//! Ranges are kept in the order they were added. Consecutive additions of
//! the same list primitive (points, lines, triangles, quads) are merged into
//! a single range since they can be drawn with one call.
//!
//! The [`IndexRangeMapBuilder`] accumulates vertices and ranges while a
//! parser walks the mesh records of a model file:
//!
//! ```rust,ignore
//! let mut size = Size::default();
//! size.inc(PrimType::TriangleFan);
//! let mut builder = IndexRangeMapBuilder::new(3, &size);
//! builder.add_triangle_fan(fan_vertices);
//! let (vertices, ranges) = builder.finish();
//! ```

use smallvec::SmallVec;

/// Primitive topology of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
}

impl PrimType {
    pub const ALL: [PrimType; 10] = [
        PrimType::Points,
        PrimType::Lines,
        PrimType::LineStrip,
        PrimType::LineLoop,
        PrimType::Triangles,
        PrimType::TriangleStrip,
        PrimType::TriangleFan,
        PrimType::Quads,
        PrimType::QuadStrip,
        PrimType::Polygon,
    ];

    /// List primitives are independent of each other and can be merged into one range.
    #[inline]
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(
            self,
            PrimType::Points | PrimType::Lines | PrimType::Triangles | PrimType::Quads
        )
    }

    /// Number of triangles a range of `count` vertices produces.
    #[must_use]
    pub fn triangle_count(self, count: usize) -> usize {
        match self {
            PrimType::Triangles => count / 3,
            PrimType::TriangleStrip | PrimType::TriangleFan | PrimType::Polygon => {
                count.saturating_sub(2)
            }
            PrimType::Quads => count / 4 * 2,
            PrimType::QuadStrip => count.saturating_sub(2) / 2 * 2,
            PrimType::Points | PrimType::Lines | PrimType::LineStrip | PrimType::LineLoop => 0,
        }
    }
}

/// A run of `count` vertices starting at `start` forming primitives of type `prim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub prim: PrimType,
    pub start: usize,
    pub count: usize,
}

impl IndexRange {
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.count
    }
}

// ============================================================================
// Size
// ============================================================================

/// Expected number of ranges per primitive type, used to pre-size a builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Size {
    counts: SmallVec<[(PrimType, usize); 4]>,
}

impl Size {
    /// Records one more range of `prim`.
    pub fn inc(&mut self, prim: PrimType) {
        self.inc_by(prim, 1);
    }

    pub fn inc_by(&mut self, prim: PrimType, count: usize) {
        match self.counts.iter_mut().find(|(p, _)| *p == prim) {
            Some((_, c)) => *c += count,
            None => self.counts.push((prim, count)),
        }
    }

    #[must_use]
    pub fn count(&self, prim: PrimType) -> usize {
        self.counts
            .iter()
            .find(|(p, _)| *p == prim)
            .map_or(0, |(_, c)| *c)
    }

    /// Upper bound on the number of ranges the map will hold.
    #[must_use]
    pub fn range_capacity(&self) -> usize {
        self.counts
            .iter()
            .map(|(prim, count)| if prim.is_list() { 1 } else { *count })
            .sum()
    }
}

// ============================================================================
// IndexRangeMap
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRangeMap {
    ranges: Vec<IndexRange>,
}

impl IndexRangeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_size(size: &Size) -> Self {
        Self {
            ranges: Vec::with_capacity(size.range_capacity()),
        }
    }

    /// Map with a single range covering `count` vertices.
    #[must_use]
    pub fn single(prim: PrimType, start: usize, count: usize) -> Self {
        let mut map = Self::new();
        map.add(prim, start, count);
        map
    }

    /// Records a range. Empty ranges are ignored.
    pub fn add(&mut self, prim: PrimType, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        if prim.is_list()
            && let Some(last) = self.ranges.last_mut()
            && last.prim == prim
            && last.end() == start
        {
            last.count += count;
            return;
        }
        self.ranges.push(IndexRange { prim, start, count });
    }

    #[inline]
    #[must_use]
    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    pub fn ranges_of(&self, prim: PrimType) -> impl Iterator<Item = &IndexRange> {
        self.ranges.iter().filter(move |r| r.prim == prim)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Sum of all range counts.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.ranges.iter().map(|r| r.count).sum()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| r.prim.triangle_count(r.count))
            .sum()
    }

    pub fn for_each_primitive(&self, mut visitor: impl FnMut(PrimType, usize, usize)) {
        for range in &self.ranges {
            visitor(range.prim, range.start, range.count);
        }
    }

    /// Shifts every range by `offset`, used when concatenating vertex buffers.
    pub fn offset(&mut self, offset: usize) {
        for range in &mut self.ranges {
            range.start += offset;
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates vertices and their primitive ranges.
#[derive(Debug, Clone)]
pub struct IndexRangeMapBuilder<V> {
    vertices: Vec<V>,
    map: IndexRangeMap,
}

impl<V> Default for IndexRangeMapBuilder<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            map: IndexRangeMap::new(),
        }
    }
}

impl<V> IndexRangeMapBuilder<V> {
    /// Builder pre-sized for `vertex_count` vertices and the ranges counted in `size`.
    #[must_use]
    pub fn new(vertex_count: usize, size: &Size) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            map: IndexRangeMap::with_size(size),
        }
    }

    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    #[inline]
    #[must_use]
    pub fn map(&self) -> &IndexRangeMap {
        &self.map
    }

    pub fn finish(self) -> (Vec<V>, IndexRangeMap) {
        (self.vertices, self.map)
    }

    fn add(&mut self, prim: PrimType, vertices: impl IntoIterator<Item = V>) {
        let start = self.vertices.len();
        self.vertices.extend(vertices);
        self.map.add(prim, start, self.vertices.len() - start);
    }

    pub fn add_point(&mut self, v: V) {
        self.add(PrimType::Points, [v]);
    }

    pub fn add_points(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::Points, vertices);
    }

    pub fn add_line(&mut self, v0: V, v1: V) {
        self.add(PrimType::Lines, [v0, v1]);
    }

    pub fn add_lines(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::Lines, vertices);
    }

    pub fn add_line_strip(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::LineStrip, vertices);
    }

    pub fn add_line_loop(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::LineLoop, vertices);
    }

    pub fn add_triangle(&mut self, v0: V, v1: V, v2: V) {
        self.add(PrimType::Triangles, [v0, v1, v2]);
    }

    pub fn add_triangles(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::Triangles, vertices);
    }

    pub fn add_triangle_strip(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::TriangleStrip, vertices);
    }

    pub fn add_triangle_fan(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::TriangleFan, vertices);
    }

    pub fn add_quad(&mut self, v0: V, v1: V, v2: V, v3: V) {
        self.add(PrimType::Quads, [v0, v1, v2, v3]);
    }

    pub fn add_quads(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::Quads, vertices);
    }

    pub fn add_quad_strip(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::QuadStrip, vertices);
    }

    pub fn add_polygon(&mut self, vertices: impl IntoIterator<Item = V>) {
        self.add(PrimType::Polygon, vertices);
    }

    /// Appends vertices as a primitive of the given type.
    pub fn add_primitive(&mut self, prim: PrimType, vertices: impl IntoIterator<Item = V>) {
        self.add(prim, vertices);
    }
}
