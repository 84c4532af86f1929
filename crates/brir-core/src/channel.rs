//! Speaker vocabulary and the per-speaker binaural channel map

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BrirError, BrirResult, ImpulseResponse};

/// Loudspeaker positions, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    Fl,
    Fr,
    Fc,
    Bl,
    Br,
    Sl,
    Sr,
    Wl,
    Wr,
    Tfl,
    Tfr,
    Tsl,
    Tsr,
    Tbl,
    Tbr,
}

impl Speaker {
    pub const ALL: [Speaker; 15] = [
        Speaker::Fl,
        Speaker::Fr,
        Speaker::Fc,
        Speaker::Bl,
        Speaker::Br,
        Speaker::Sl,
        Speaker::Sr,
        Speaker::Wl,
        Speaker::Wr,
        Speaker::Tfl,
        Speaker::Tfr,
        Speaker::Tsl,
        Speaker::Tsr,
        Speaker::Tbl,
        Speaker::Tbr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Speaker::Fl => "FL",
            Speaker::Fr => "FR",
            Speaker::Fc => "FC",
            Speaker::Bl => "BL",
            Speaker::Br => "BR",
            Speaker::Sl => "SL",
            Speaker::Sr => "SR",
            Speaker::Wl => "WL",
            Speaker::Wr => "WR",
            Speaker::Tfl => "TFL",
            Speaker::Tfr => "TFR",
            Speaker::Tsl => "TSL",
            Speaker::Tsr => "TSR",
            Speaker::Tbl => "TBL",
            Speaker::Tbr => "TBR",
        }
    }

    /// Speaker sits on the listener's left (name ends in `L`)
    #[inline]
    pub fn is_left(self) -> bool {
        self.name().ends_with('L')
    }

    /// Speaker sits on the listener's right (name ends in `R`)
    #[inline]
    pub fn is_right(self) -> bool {
        self.name().ends_with('R')
    }

    /// Ear facing the speaker. Centre speakers have none.
    pub fn near_ear(self) -> Option<Ear> {
        if self.is_left() {
            Some(Ear::Left)
        } else if self.is_right() {
            Some(Ear::Right)
        } else {
            None
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Speaker {
    type Err = BrirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Speaker::ALL
            .iter()
            .copied()
            .find(|sp| sp.name() == upper)
            .ok_or_else(|| BrirError::UnknownSpeaker(s.to_string()))
    }
}

/// Ear side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    pub const BOTH: [Ear; 2] = [Ear::Left, Ear::Right];

    pub fn opposite(self) -> Self {
        match self {
            Ear::Left => Ear::Right,
            Ear::Right => Ear::Left,
        }
    }
}

/// Left and right ear responses of one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarPair {
    pub left: ImpulseResponse,
    pub right: ImpulseResponse,
}

impl EarPair {
    pub fn new(left: ImpulseResponse, right: ImpulseResponse) -> Self {
        Self { left, right }
    }

    pub fn ear(&self, ear: Ear) -> &ImpulseResponse {
        match ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        }
    }

    pub fn ear_mut(&mut self, ear: Ear) -> &mut ImpulseResponse {
        match ear {
            Ear::Left => &mut self.left,
            Ear::Right => &mut self.right,
        }
    }

    pub fn max_len(&self) -> usize {
        self.left.len().max(self.right.len())
    }
}

/// Binaural responses keyed by speaker, iterated in canonical speaker order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMap {
    pairs: BTreeMap<Speaker, EarPair>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, returning the one it replaced
    pub fn insert(&mut self, speaker: Speaker, pair: EarPair) -> Option<EarPair> {
        self.pairs.insert(speaker, pair)
    }

    pub fn get(&self, speaker: Speaker) -> Option<&EarPair> {
        self.pairs.get(&speaker)
    }

    pub fn get_mut(&mut self, speaker: Speaker) -> Option<&mut EarPair> {
        self.pairs.get_mut(&speaker)
    }

    pub fn remove(&mut self, speaker: Speaker) -> Option<EarPair> {
        self.pairs.remove(&speaker)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn speakers(&self) -> impl Iterator<Item = Speaker> + '_ {
        self.pairs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Speaker, &EarPair)> {
        self.pairs.iter().map(|(sp, pair)| (*sp, pair))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Speaker, &mut EarPair)> {
        self.pairs.iter_mut().map(|(sp, pair)| (*sp, pair))
    }

    /// Underlying ordered storage, for parallel iteration
    pub fn pairs_mut(&mut self) -> &mut BTreeMap<Speaker, EarPair> {
        &mut self.pairs
    }

    /// Every buffer in speaker order, left before right
    pub fn responses(&self) -> impl Iterator<Item = &ImpulseResponse> {
        self.pairs.values().flat_map(|pair| [&pair.left, &pair.right])
    }

    /// Sample rate of the first buffer in the map
    pub fn sample_rate(&self) -> Option<u32> {
        self.responses().next().map(|ir| ir.sample_rate)
    }

    /// Longest buffer length in the map (0 when empty)
    pub fn max_len(&self) -> usize {
        self.pairs.values().map(EarPair::max_len).max().unwrap_or(0)
    }

    /// Zero-pad every buffer to the longest one. Returns the common length.
    pub fn pad_to_max_len(&mut self) -> usize {
        let n = self.max_len();
        for (speaker, pair) in self.pairs.iter_mut() {
            if pair.left.len() < n || pair.right.len() < n {
                log::debug!("{speaker}: padding to {n} samples");
            }
            pair.left.pad_to(n);
            pair.right.pad_to(n);
        }
        n
    }

    /// Check the cross-channel invariants the numeric core relies on
    pub fn validate(&self) -> BrirResult<()> {
        let expected = self.sample_rate().ok_or(BrirError::EmptyChannelMap)?;

        for (speaker, pair) in self.iter() {
            if pair.left.sample_rate != pair.right.sample_rate {
                return Err(BrirError::SampleRateMismatch {
                    speaker: speaker.to_string(),
                    left: pair.left.sample_rate,
                    right: pair.right.sample_rate,
                });
            }
            if pair.left.sample_rate != expected {
                return Err(BrirError::MixedSampleRates {
                    expected,
                    actual: pair.left.sample_rate,
                });
            }
        }

        Ok(())
    }
}

impl FromIterator<(Speaker, EarPair)> for ChannelMap {
    fn from_iter<I: IntoIterator<Item = (Speaker, EarPair)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
