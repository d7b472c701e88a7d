/// Octree - dynamic block octree used to preselect meshes (or submeshes)
/// before the per-entry frustum test.
///
/// Layout follows a flat node array: nodes 0..8 are the top-level blocks
/// covering the world extents, children of a split block are appended as
/// 8 consecutive nodes (`first_child`, 0 = leaf).
///
/// An entry is stored in every leaf block its box intersects. Each block also
/// keeps a *content* box grown to cover the boxes of everything added to it,
/// so a block is rejected by the frustum only when all of its entries would be
/// rejected too: `select` returns a superset of the entries passing a linear
/// scan with the same per-entry test, never less.
///
/// Blocks split when they exceed `capacity` below `max_depth`. They never
/// merge; `update` with unchanged extents keeps the block structure.

use std::hash::Hash;
use rustc_hash::{FxHashMap, FxHashSet};
use glam::Vec3;
use super::aabb::Aabb;
use super::frustum::{Frustum, FrustumTest};

/// Number of top-level blocks
const TOP_BLOCKS: usize = 8;

/// A single block in the octree.
#[derive(Debug, Clone)]
struct OctreeBlock<T> {
    /// Fixed spatial region of this block
    extent: Aabb,
    /// `extent` grown by the boxes of every entry added to the block
    content: Aabb,
    /// Subdivision depth (top-level blocks are depth 0)
    depth: u32,
    /// Index of the first child in the flat array (0 = leaf)
    first_child: usize,
    /// Entries of a leaf block, in insertion order
    entries: Vec<T>,
}

impl<T> OctreeBlock<T> {
    fn new(extent: Aabb, depth: u32) -> Self {
        Self { extent, content: extent, depth, first_child: 0, entries: Vec::new() }
    }

    fn is_leaf(&self) -> bool {
        self.first_child == 0
    }
}

pub struct Octree<T> {
    blocks: Vec<OctreeBlock<T>>,
    capacity: usize,
    max_depth: u32,
    /// World extents the top-level blocks were built for
    world: Option<Aabb>,
    /// Box of every stored entry (used when blocks split)
    bounds: FxHashMap<T, Aabb>,
}

impl<T: Copy + Eq + Hash> Octree<T> {
    /// # Arguments
    ///
    /// * `capacity` - Entries a block holds before splitting
    /// * `max_depth` - Deepest block level; blocks at this depth overflow instead of splitting
    pub fn new(capacity: usize, max_depth: u32) -> Self {
        Self {
            blocks: Vec::new(),
            capacity: capacity.max(1),
            max_depth,
            world: None,
            bounds: FxHashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of blocks, split ones included
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of distinct stored entries
    pub fn entry_count(&self) -> usize {
        self.bounds.len()
    }

    /// Deepest depth actually reached by a block
    pub fn depth_reached(&self) -> u32 {
        self.blocks.iter().map(|b| b.depth).max().unwrap_or(0)
    }

    pub fn world_extents(&self) -> Option<Aabb> {
        self.world
    }

    /// Rebind all entries.
    ///
    /// The block structure is rebuilt only when the world extents change;
    /// otherwise blocks are emptied (not merged) and entries are added again.
    pub fn update<I>(&mut self, min: Vec3, max: Vec3, entries: I)
    where
        I: IntoIterator<Item = (T, Aabb)>,
    {
        let world = Aabb::new(min, max);
        if self.world == Some(world) && !self.blocks.is_empty() {
            for block in &mut self.blocks {
                block.entries.clear();
                block.content = block.extent;
            }
        } else {
            self.build_top_blocks(world);
        }

        self.bounds.clear();
        for (entry, bounds) in entries {
            self.add_entry(entry, bounds);
        }
    }

    fn build_top_blocks(&mut self, world: Aabb) {
        self.blocks.clear();
        let center = world.center();
        for octant in 0..TOP_BLOCKS as u8 {
            self.blocks.push(OctreeBlock::new(Self::octant_aabb(&world, &center, octant), 0));
        }
        self.world = Some(world);
    }

    /// Compute the AABB of a specific octant (0–7).
    ///
    /// Octant bit layout: bit0 = X, bit1 = Y, bit2 = Z.
    /// - 0 = low, 1 = high for each axis.
    fn octant_aabb(parent: &Aabb, center: &Vec3, octant: u8) -> Aabb {
        Aabb {
            min: Vec3::new(
                if octant & 1 == 0 { parent.min.x } else { center.x },
                if octant & 2 == 0 { parent.min.y } else { center.y },
                if octant & 4 == 0 { parent.min.z } else { center.z },
            ),
            max: Vec3::new(
                if octant & 1 == 0 { center.x } else { parent.max.x },
                if octant & 2 == 0 { center.y } else { parent.max.y },
                if octant & 4 == 0 { center.z } else { parent.max.z },
            ),
        }
    }

    /// Add (or re-add) an entry with its world box.
    ///
    /// Entries outside the world extents are stored in the closest top-level
    /// blocks so they are never lost.
    pub fn add_entry(&mut self, entry: T, bounds: Aabb) {
        if self.blocks.is_empty() {
            self.build_top_blocks(bounds);
        }
        if self.bounds.insert(entry, bounds).is_some() {
            self.remove_from_blocks(entry);
        }

        let world = self.world.unwrap_or(bounds);
        // Clamp the placement box into the world so outliers land somewhere
        let placement = Aabb::new(
            bounds.min.clamp(world.min, world.max),
            bounds.max.clamp(world.min, world.max),
        );

        for index in 0..TOP_BLOCKS {
            self.add_to_block(index, entry, &bounds, &placement);
        }
    }

    fn add_to_block(&mut self, index: usize, entry: T, bounds: &Aabb, placement: &Aabb) {
        if !self.blocks[index].extent.intersects(placement) {
            return;
        }

        let block = &mut self.blocks[index];
        block.content = block.content.union(bounds);

        if !block.is_leaf() {
            let first_child = block.first_child;
            for child in first_child..first_child + 8 {
                self.add_to_block(child, entry, bounds, placement);
            }
            return;
        }

        block.entries.push(entry);
        if block.entries.len() > self.capacity && block.depth < self.max_depth {
            self.split(index);
        }
    }

    /// Subdivide a leaf into 8 children and move its entries down
    fn split(&mut self, index: usize) {
        let extent = self.blocks[index].extent;
        let depth = self.blocks[index].depth + 1;
        let center = extent.center();

        let first_child = self.blocks.len();
        for octant in 0..8u8 {
            self.blocks.push(OctreeBlock::new(Self::octant_aabb(&extent, &center, octant), depth));
        }

        let world = self.world.unwrap_or(extent);
        let entries = std::mem::take(&mut self.blocks[index].entries);
        self.blocks[index].first_child = first_child;

        for entry in entries {
            let Some(bounds) = self.bounds.get(&entry).copied() else { continue };
            let placement = Aabb::new(
                bounds.min.clamp(world.min, world.max),
                bounds.max.clamp(world.min, world.max),
            );
            for child in first_child..first_child + 8 {
                self.add_to_block(child, entry, &bounds, &placement);
            }
        }
    }

    /// Box an entry was last added with
    pub fn entry_bounds(&self, entry: T) -> Option<Aabb> {
        self.bounds.get(&entry).copied()
    }

    /// Re-add `entry` when `bounds` left the box it was stored with.
    ///
    /// Returns `true` when the entry was relocated. Unknown entries are left
    /// out.
    pub fn refresh_entry(&mut self, entry: T, bounds: Aabb) -> bool {
        match self.bounds.get(&entry) {
            Some(stored) if !stored.contains(&bounds) => {
                self.add_entry(entry, bounds);
                true
            }
            _ => false,
        }
    }

    /// Remove an entry from every block (block contents are not shrunk)
    pub fn remove_entry(&mut self, entry: T) {
        if self.bounds.remove(&entry).is_some() {
            self.remove_from_blocks(entry);
        }
    }

    fn remove_from_blocks(&mut self, entry: T) {
        for block in &mut self.blocks {
            block.entries.retain(|e| *e != entry);
        }
    }

    /// Entries of every block whose content intersects the frustum,
    /// deduplicated, in block traversal order.
    pub fn select(&self, frustum: &Frustum) -> Vec<T> {
        let mut results = Vec::new();
        let mut seen = FxHashSet::default();
        for index in 0..self.blocks.len().min(TOP_BLOCKS) {
            let class = frustum.classify_aabb(&self.blocks[index].content);
            self.query_recursive(index, frustum, class, &mut seen, &mut results);
        }
        results
    }

    /// 3-way classification at each block:
    /// - `Outside` → skip entire subtree
    /// - `Inside` → collect everything below without further testing
    /// - `Partial` → collect leaf entries, classify children
    fn query_recursive(
        &self,
        index: usize,
        frustum: &Frustum,
        classification: FrustumTest,
        seen: &mut FxHashSet<T>,
        results: &mut Vec<T>,
    ) {
        let block = &self.blocks[index];
        match classification {
            FrustumTest::Outside => {}
            FrustumTest::Inside => self.collect_all(index, seen, results),
            FrustumTest::Partial => {
                if block.is_leaf() {
                    Self::push_unique(&block.entries, seen, results);
                    return;
                }
                for child in block.first_child..block.first_child + 8 {
                    let class = frustum.classify_aabb(&self.blocks[child].content);
                    self.query_recursive(child, frustum, class, seen, results);
                }
            }
        }
    }

    fn collect_all(&self, index: usize, seen: &mut FxHashSet<T>, results: &mut Vec<T>) {
        let block = &self.blocks[index];
        if block.is_leaf() {
            Self::push_unique(&block.entries, seen, results);
            return;
        }
        for child in block.first_child..block.first_child + 8 {
            self.collect_all(child, seen, results);
        }
    }

    fn push_unique(entries: &[T], seen: &mut FxHashSet<T>, results: &mut Vec<T>) {
        for &entry in entries {
            if seen.insert(entry) {
                results.push(entry);
            }
        }
    }

    /// Entries of every leaf whose content intersects a sphere
    pub fn intersects(&self, center: Vec3, radius: f32) -> Vec<T> {
        let mut results = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<usize> = (0..self.blocks.len().min(TOP_BLOCKS)).rev().collect();
        while let Some(index) = stack.pop() {
            let block = &self.blocks[index];
            if !block.content.intersects_sphere(center, radius) {
                continue;
            }
            if block.is_leaf() {
                Self::push_unique(&block.entries, &mut seen, &mut results);
            } else {
                stack.extend((block.first_child..block.first_child + 8).rev());
            }
        }
        results
    }

    /// Drop all blocks and entries
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.bounds.clear();
        self.world = None;
    }
}

#[cfg(test)]
#[path = "octree_tests.rs"]
mod tests;
