use std::cmp::Ordering;
use std::io::{
    Read,
    Write,
};

use hashbrown::HashMap;
use itertools::Itertools;

use crate::data_structs::coords::Contig;
use crate::data_structs::typedef::PosType;

/// Named, optionally sorted collection of genomic regions.
///
/// Used for mask sets (regions excluded from coverage extraction) and for
/// exporting bins of the training set.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    name:    String,
    regions: Vec<Contig>,
    sorted:  bool,
}

impl RegionSet {
    pub fn new(name: &str) -> Self {
        Self {
            name:    name.to_string(),
            regions: Vec::new(),
            sorted:  true,
        }
    }

    pub fn from_regions(
        name: &str,
        regions: Vec<Contig>,
    ) -> Self {
        let mut set = Self {
            name: name.to_string(),
            regions,
            sorted: false,
        };
        set.sort();
        set
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(
        &mut self,
        region: Contig,
    ) {
        self.regions.push(region);
        self.sorted = false;
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contig> {
        self.regions.iter()
    }

    pub fn regions(&self) -> &[Contig] {
        &self.regions
    }

    /// Extends every region by `left` upstream and `right` downstream.
    pub fn extend(
        &mut self,
        left: PosType,
        right: PosType,
    ) {
        for region in self.regions.iter_mut() {
            region.extend(left, right);
        }
        self.sorted = false;
    }

    /// Sorts regions by sequence name, start and end.
    pub fn sort(&mut self) {
        if !self.sorted {
            self.regions
                .sort_by(|a, b| a.cmp_position(b));
            self.sorted = true;
        }
    }

    fn sorted_regions(&self) -> Vec<Contig> {
        if self.sorted {
            self.regions.clone()
        }
        else {
            self.regions
                .iter()
                .cloned()
                .sorted_by(|a, b| a.cmp_position(b))
                .collect_vec()
        }
    }

    /// Returns the regions of `self` that overlap at least one region of
    /// `other`. Each region of `self` is reported once.
    pub fn intersect(
        &self,
        other: &RegionSet,
    ) -> RegionSet {
        let mut result = RegionSet::new(&format!("{}_{}", self.name, other.name));
        let left = self.sorted_regions();
        let right = other.sorted_regions();

        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            let (s, ss) = (&left[i], &right[j]);
            if s.overlaps(ss) {
                result.regions.push(s.clone());
                i += 1;
            }
            else if s.cmp_position(ss) != Ordering::Less {
                j += 1;
            }
            else {
                i += 1;
            }
        }
        result.sorted = true;
        result
    }

    /// Merges overlapping and book-ended regions into single regions.
    /// Strand information is dropped.
    pub fn merge(&self) -> RegionSet {
        let mut merged: Vec<Contig> = Vec::with_capacity(self.regions.len());
        for region in self.sorted_regions() {
            match merged.last_mut() {
                Some(last)
                    if last.seqname() == region.seqname()
                        && region.start() <= last.end() =>
                {
                    if region.end() > last.end() {
                        *last = Contig::new(
                            last.seqname().clone(),
                            last.start(),
                            region.end(),
                            Default::default(),
                        );
                    }
                },
                _ => {
                    merged.push(Contig::new(
                        region.seqname().clone(),
                        region.start(),
                        region.end(),
                        Default::default(),
                    ))
                },
            }
        }
        RegionSet {
            name:    self.name.clone(),
            regions: merged,
            sorted:  true,
        }
    }

    /// Reads regions from a BED file. Only the first three columns are
    /// required.
    pub fn read_bed<R: Read>(
        name: &str,
        handle: R,
    ) -> anyhow::Result<RegionSet> {
        let mut reader = bio::io::bed::Reader::new(handle);
        let regions = reader
            .records()
            .map(|record| record.map(Contig::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RegionSet::from_regions(name, regions))
    }

    pub fn write_bed<W: Write>(
        &self,
        handle: W,
    ) -> anyhow::Result<()> {
        let mut writer = bio::io::bed::Writer::new(handle);
        for region in self.regions.iter() {
            writer.write(&bio::io::bed::Record::from(region))?;
        }
        Ok(())
    }

    /// Builds an index for fast overlap queries.
    pub fn index(&self) -> RegionIndex {
        RegionIndex::new(&self.merge())
    }
}

/// Per-sequence sorted, non-overlapping intervals for point queries.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    intervals: HashMap<String, Vec<(PosType, PosType)>>,
}

impl RegionIndex {
    fn new(merged: &RegionSet) -> Self {
        let intervals = merged
            .iter()
            .map(|r| (r.seqname().clone(), (r.start(), r.end())))
            .into_group_map()
            .into_iter()
            .collect();
        Self { intervals }
    }

    /// Whether `[start, end)` on `seqname` touches any indexed interval.
    pub fn overlaps(
        &self,
        seqname: &str,
        start: PosType,
        end: PosType,
    ) -> bool {
        let Some(intervals) = self.intervals.get(seqname) else {
            return false;
        };
        // First interval ending after `start`.
        let idx = intervals.partition_point(|(_, e)| *e <= start);
        intervals
            .get(idx)
            .is_some_and(|(s, _)| *s < end)
    }
}
