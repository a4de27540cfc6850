use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

/// One of the two biological conditions being compared.
#[derive(
    Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Condition {
    /// First condition (signal 1).
    First,
    /// Second condition (signal 2).
    Second,
}

impl Condition {
    pub const BOTH: [Condition; 2] = [Condition::First, Condition::Second];

    /// Zero-based position of the condition.
    pub fn index(&self) -> usize {
        match self {
            Condition::First => 0,
            Condition::Second => 1,
        }
    }
}

impl Display for Condition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // Conditions are reported one-based in file names and logs.
        write!(f, "{}", self.index() + 1)
    }
}

/// Training label of a region-of-interest bin.
#[derive(
    Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Label {
    /// No differential signal.
    Neutral,
    /// Higher coverage in the first condition.
    FirstUp,
    /// Higher coverage in the second condition.
    SecondUp,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Neutral, Label::FirstUp, Label::SecondUp];

    pub fn index(&self) -> usize {
        match self {
            Label::Neutral => 0,
            Label::FirstUp => 1,
            Label::SecondUp => 2,
        }
    }

    /// Label of the opposite biased class, neutral maps onto itself.
    pub fn mirrored(&self) -> Label {
        match self {
            Label::Neutral => Label::Neutral,
            Label::FirstUp => Label::SecondUp,
            Label::SecondUp => Label::FirstUp,
        }
    }
}

impl Display for Label {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", match self {
            Label::Neutral => "neutral",
            Label::FirstUp => "s1-up",
            Label::SecondUp => "s2-up",
        })
    }
}

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Default)]
pub enum Strand {
    /// Forward strand.
    Forward,
    /// Reverse strand.
    Reverse,
    /// No strand.
    #[default]
    None,
}

impl FromStr for Strand {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Ok(Strand::None),
        }
    }
}

impl From<Option<bio::bio_types::strand::Strand>> for Strand {
    fn from(value: Option<bio::bio_types::strand::Strand>) -> Self {
        match value {
            Some(bio::bio_types::strand::Strand::Forward) => Strand::Forward,
            Some(bio::bio_types::strand::Strand::Reverse) => Strand::Reverse,
            Some(bio::bio_types::strand::Strand::Unknown) | None => Strand::None,
        }
    }
}

impl From<Strand> for char {
    fn from(value: Strand) -> Self {
        match value {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::None => '.',
        }
    }
}

impl Display for Strand {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

impl Serialize for Strand {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer, {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Strand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>, {
        let s = String::deserialize(deserializer)?;
        std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}
