//! Material-keyed index ranges.
//!
//! Formats such as ASE, glTF and OBJ store one mesh whose faces reference
//! several materials. A [`MaterialIndexRangeMap`] is an [`IndexRangeMap`]
//! per skin index of the owning surface. `None` means "no material".

use crate::model::index_range_map::{IndexRangeMap, PrimType, Size};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialIndexRangeMap {
    groups: Vec<(Option<usize>, IndexRangeMap)>,
}

impl MaterialIndexRangeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn group_mut(&mut self, material: Option<usize>) -> &mut IndexRangeMap {
        let index = match self.groups.iter().position(|(m, _)| *m == material) {
            Some(index) => index,
            None => {
                self.groups.push((material, IndexRangeMap::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index].1
    }

    pub fn add(&mut self, material: Option<usize>, prim: PrimType, start: usize, count: usize) {
        if count > 0 {
            self.group_mut(material).add(prim, start, count);
        }
    }

    /// Groups in order of first use.
    #[must_use]
    pub fn groups(&self) -> &[(Option<usize>, IndexRangeMap)] {
        &self.groups
    }

    #[must_use]
    pub fn ranges_for(&self, material: Option<usize>) -> Option<&IndexRangeMap> {
        self.groups
            .iter()
            .find(|(m, _)| *m == material)
            .map(|(_, map)| map)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(|(_, map)| map.vertex_count()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, map)| map.is_empty())
    }

    pub fn for_each_primitive(&self, mut visitor: impl FnMut(Option<usize>, PrimType, usize, usize)) {
        for (material, map) in &self.groups {
            map.for_each_primitive(|prim, start, count| visitor(*material, prim, start, count));
        }
    }
}

/// Accumulates vertices whose ranges are keyed by material.
#[derive(Debug, Clone)]
pub struct MaterialIndexRangeMapBuilder<V> {
    vertices: Vec<V>,
    map: MaterialIndexRangeMap,
}

impl<V> Default for MaterialIndexRangeMapBuilder<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            map: MaterialIndexRangeMap::new(),
        }
    }
}

impl<V> MaterialIndexRangeMapBuilder<V> {
    #[must_use]
    pub fn new(vertex_count: usize, _size: &Size) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            map: MaterialIndexRangeMap::new(),
        }
    }

    #[must_use]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    pub fn finish(self) -> (Vec<V>, MaterialIndexRangeMap) {
        (self.vertices, self.map)
    }

    pub fn add_primitive(
        &mut self,
        material: Option<usize>,
        prim: PrimType,
        vertices: impl IntoIterator<Item = V>,
    ) {
        let start = self.vertices.len();
        self.vertices.extend(vertices);
        self.map.add(material, prim, start, self.vertices.len() - start);
    }

    pub fn add_triangle(&mut self, material: Option<usize>, v0: V, v1: V, v2: V) {
        self.add_primitive(material, PrimType::Triangles, [v0, v1, v2]);
    }

    pub fn add_triangles(&mut self, material: Option<usize>, vertices: impl IntoIterator<Item = V>) {
        self.add_primitive(material, PrimType::Triangles, vertices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_by_material() {
        let mut builder = MaterialIndexRangeMapBuilder::default();
        builder.add_triangle(Some(0), 0, 1, 2);
        builder.add_triangle(Some(1), 3, 4, 5);
        builder.add_triangle(Some(1), 6, 7, 8);
        builder.add_triangle(None, 9, 10, 11);
        let (vertices, map) = builder.finish();

        assert_eq!(map.groups().len(), 3);
        assert_eq!(map.ranges_for(Some(1)).unwrap().vertex_count(), 6);
        assert_eq!(map.ranges_for(Some(1)).unwrap().ranges().len(), 1);
        assert_eq!(map.vertex_count(), vertices.len());
    }

    #[test]
    fn test_interleaved_materials_keep_separate_ranges() {
        let mut builder = MaterialIndexRangeMapBuilder::default();
        builder.add_triangle(Some(0), 0, 1, 2);
        builder.add_triangle(Some(1), 3, 4, 5);
        builder.add_triangle(Some(0), 6, 7, 8);
        let (_, map) = builder.finish();

        let ranges = map.ranges_for(Some(0)).unwrap().ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].start, 6);
    }
}
