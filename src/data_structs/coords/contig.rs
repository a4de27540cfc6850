use std::cmp::Ordering;
use std::fmt::Display;

use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::enums::Strand;
use crate::data_structs::typedef::{
    PosType,
    SeqNameStr,
    SeqPosNum,
};

/// Represents a contig with a sequence name, start position, end position, and
/// strand. Coordinates are zero-based, half-open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Contig<R = String, P = PosType>
where
    R: SeqNameStr,
    P: SeqPosNum, {
    seqname: R,
    start:   P,
    end:     P,
    strand:  Strand,
}

impl<R, P> Contig<R, P>
where
    R: SeqNameStr,
    P: SeqPosNum,
{
    /// Creates a new `Contig`. Reversed bounds are swapped.
    pub fn new(
        seqname: R,
        start: P,
        end: P,
        strand: Strand,
    ) -> Self {
        let (start, end) = if start <= end {
            (start, end)
        }
        else {
            (end, start)
        };
        Self {
            seqname,
            start,
            end,
            strand,
        }
    }

    pub fn start(&self) -> P {
        self.start
    }

    pub fn end(&self) -> P {
        self.end
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn seqname(&self) -> &R {
        &self.seqname
    }

    /// Returns the length of the contig.
    pub fn length(&self) -> P {
        self.end - self.start
    }

    /// Extends the contig by `left` upstream and `right` downstream.
    /// The start position saturates at zero.
    pub fn extend(
        &mut self,
        left: P,
        right: P,
    ) {
        self.start = self.start.saturating_sub(left);
        self.end = self.end.saturating_add(right);
    }

    /// Two contigs overlap when they share at least one position.
    pub fn overlaps(
        &self,
        other: &Self,
    ) -> bool {
        self.seqname.as_ref() == other.seqname.as_ref()
            && self.start < other.end
            && other.start < self.end
    }

    /// Checks if this contig is fully contained within another contig.
    pub fn is_in(
        &self,
        other: &Self,
    ) -> bool {
        self.seqname.as_ref() == other.seqname.as_ref()
            && self.start >= other.start
            && self.end <= other.end
    }

    /// Positional order: sequence name, then start, then end.
    pub fn cmp_position(
        &self,
        other: &Self,
    ) -> Ordering {
        self.seqname
            .as_ref()
            .cmp(other.seqname.as_ref())
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

impl<R, P> Display for Contig<R, P>
where
    R: SeqNameStr,
    P: SeqPosNum + Display,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.seqname.as_ref(),
            self.start,
            self.end
        )
    }
}

impl From<bio::io::bed::Record> for Contig {
    fn from(value: bio::io::bed::Record) -> Self {
        Contig::new(
            value.chrom().to_string(),
            value.start(),
            value.end(),
            Strand::from(value.strand()),
        )
    }
}

impl From<&Contig> for bio::io::bed::Record {
    fn from(value: &Contig) -> Self {
        let mut record = bio::io::bed::Record::new();
        record.set_chrom(value.seqname());
        record.set_start(value.start());
        record.set_end(value.end());
        record
    }
}
