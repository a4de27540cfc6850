use std::hash::Hash;

use num::{
    PrimInt,
    Unsigned,
};

/// Genomic coordinate.
pub type PosType = u64;
/// Raw read count in a single bin.
pub type CountType = u32;
/// Coverage value after normalization.
pub type CovType = f64;
/// Bin index along the concatenated genome.
pub type BinIndex = usize;

pub trait SeqNameStr:
    for<'a> From<&'a str> + AsRef<str> + Clone + Eq + PartialEq + Hash {
}

pub trait SeqPosNum: Unsigned + PrimInt {}

impl<T> SeqPosNum for T where T: Unsigned + PrimInt {}

impl<T> SeqNameStr for T where
    T: AsRef<str> + Clone + Eq + PartialEq + Hash + for<'a> From<&'a str>
{
}
