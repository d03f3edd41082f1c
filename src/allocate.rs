use std::fmt::{Display, Formatter};

use tracing::{debug, info};

use crate::error::CapacityError;
#[cfg(feature = "serde")]
use crate::error::ConfigError;

/// Maximum safe working volume (µL) of a single reagent tube.
///
/// # Examples
///
/// ```
/// use liquids::TubeCapacity;
///
/// // A 15 mL conical tube is only ever filled to 90% of its rated volume
/// assert_eq!(TubeCapacity::from_rated_volume(15_000.0), TubeCapacity::FALCON_15ML);
/// assert_eq!(TubeCapacity::FALCON_15ML.volume(), 13_500.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TubeCapacity(f64);

impl TubeCapacity {
    /// Fraction of the rated volume that is never filled, guarding against spills and
    /// pipetting inaccuracy.
    pub const SAFETY_MARGIN: f64 = 0.1;

    /// Working capacity of a 15 mL conical tube.
    pub const FALCON_15ML: Self = Self(13_500.0);

    /// Working capacity of a 1.5 mL snap-cap tube.
    pub const EPPENDORF_1_5ML: Self = Self(1_350.0);

    /// Construct from a working volume that already includes any safety margin.
    #[must_use]
    pub const fn new(volume: f64) -> Self {
        Self(volume)
    }

    /// Construct from a tube's rated volume, applying [`Self::SAFETY_MARGIN`].
    #[must_use]
    pub fn from_rated_volume(rated_volume: f64) -> Self {
        Self(rated_volume * (1.0 - Self::SAFETY_MARGIN))
    }

    /// Working volume in µL
    #[must_use]
    pub const fn volume(self) -> f64 {
        self.0
    }
}

impl Display for TubeCapacity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} µL", self.0)
    }
}

/// How a reagent's reactions are spread over its tubes.
///
/// Reaction counts of any two tubes differ by at most one, and the first tubes get the
/// extra reactions.
///
/// # Features
///
/// * **`serde`:** Deserializing checks that there is at least one tube, that every tube
///   has a volume, that reaction counts are spread as [`allocate`] spreads them, and that
///   every tube's volume is its reaction count times one common per-reaction volume.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawTubePlan"))]
pub struct TubePlan {
    reactions_per_tube: Vec<usize>,
    volumes_per_tube: Vec<f64>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawTubePlan {
    reactions_per_tube: Vec<usize>,
    volumes_per_tube: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTubePlan> for TubePlan {
    type Error = ConfigError;

    #[allow(clippy::cast_precision_loss, reason = "reaction counts are tiny")]
    fn try_from(raw: RawTubePlan) -> Result<Self, Self::Error> {
        const KIND: &str = "tube plan";
        let RawTubePlan {
            reactions_per_tube,
            volumes_per_tube,
        } = raw;
        if reactions_per_tube.is_empty() || reactions_per_tube.len() != volumes_per_tube.len() {
            return Err(ConfigError::new(
                KIND,
                "every tube needs exactly one reaction count and one volume",
            ));
        }
        let first = reactions_per_tube[0];
        let evenly_spread = reactions_per_tube
            .iter()
            .all(|&r| r == first || r + 1 == first)
            && reactions_per_tube.windows(2).all(|w| w[0] >= w[1]);
        if !evenly_spread {
            return Err(ConfigError::new(
                KIND,
                "reactions must be spread evenly, extra reactions first",
            ));
        }
        let per_reaction = volumes_per_tube[0] / first.max(1) as f64;
        let fits = |r: usize, v: f64| {
            let expected = r as f64 * per_reaction;
            v.is_finite() && v >= 0.0 && (v - expected).abs() <= 1e-6 * v.max(1.0)
        };
        let consistent = reactions_per_tube
            .iter()
            .zip(&volumes_per_tube)
            .all(|(&r, &v)| fits(r, v));
        if !consistent {
            return Err(ConfigError::new(
                KIND,
                "volumes must be reaction counts times one per-reaction volume",
            ));
        }
        Ok(Self {
            reactions_per_tube,
            volumes_per_tube,
        })
    }
}

impl TubePlan {
    fn split(total_reactions: usize, tubes: usize, per_reaction_volume: f64) -> Self {
        let base = total_reactions / tubes;
        let remainder = total_reactions % tubes;
        let reactions_per_tube: Vec<usize> = (0..tubes)
            .map(|i| base + usize::from(i < remainder))
            .collect();
        #[allow(clippy::cast_precision_loss, reason = "reaction counts are tiny")]
        let volumes_per_tube = reactions_per_tube
            .iter()
            .map(|&reactions| reactions as f64 * per_reaction_volume)
            .collect();
        Self {
            reactions_per_tube,
            volumes_per_tube,
        }
    }

    /// Number of tubes the reagent has to be split into.
    #[must_use]
    pub fn number_of_tubes(&self) -> usize {
        self.reactions_per_tube.len()
    }

    /// Reactions supplied by each tube.
    #[must_use]
    pub fn reactions_per_tube(&self) -> &[usize] {
        &self.reactions_per_tube
    }

    /// Volume (µL) to put into each tube.
    #[must_use]
    pub fn volumes_per_tube(&self) -> &[f64] {
        &self.volumes_per_tube
    }

    /// Total reactions over all tubes.
    #[must_use]
    pub fn total_reactions(&self) -> usize {
        self.reactions_per_tube.iter().sum()
    }

    /// Iterate over `(reactions, volume)` per tube.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, f64)> + '_ {
        self.reactions_per_tube
            .iter()
            .copied()
            .zip(self.volumes_per_tube.iter().copied())
    }
}

/// Split `total_reactions` reactions of `per_reaction_volume` µL each over the fewest
/// tubes of the given capacity.
///
/// Zero reactions still yield a single, empty tube.
///
/// # Errors
///
/// Returns [`CapacityError`] if a single reaction doesn't fit into one tube.
///
/// # Panics
///
/// Panics if `per_reaction_volume` or the tube capacity isn't a finite, positive number.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use liquids::{TubeCapacity, allocate};
///
/// let plan = allocate(300.0, 50, TubeCapacity::new(13_500.0))?;
/// assert_eq!(plan.number_of_tubes(), 2);
/// assert_eq!(plan.reactions_per_tube(), [25, 25]);
/// assert_eq!(plan.volumes_per_tube(), [7500.0, 7500.0]);
///
/// assert!(allocate(14_000.0, 1, TubeCapacity::new(13_500.0)).is_err());
/// # Ok(())
/// # }
/// ```
#[track_caller]
#[allow(clippy::cast_precision_loss, reason = "reaction counts are tiny")]
pub fn allocate(
    per_reaction_volume: f64,
    total_reactions: usize,
    tube_capacity: TubeCapacity,
) -> Result<TubePlan, CapacityError> {
    assert!(
        per_reaction_volume.is_finite() && per_reaction_volume > 0.0,
        "per-reaction volume must be positive, got {per_reaction_volume}"
    );
    let capacity = tube_capacity.volume();
    assert!(
        capacity.is_finite() && capacity > 0.0,
        "tube capacity must be positive, got {capacity}"
    );
    if per_reaction_volume > capacity {
        return Err(CapacityError {
            per_reaction_volume,
            tube_capacity: capacity,
        });
    }

    // The fullest tube holds ceil(total / tubes) reactions; this terminates by the time
    // every tube holds a single reaction.
    let mut tubes = 1;
    while total_reactions.div_ceil(tubes) as f64 * per_reaction_volume > capacity {
        tubes += 1;
        debug!(tubes, total_reactions, "reagent doesn't fit, adding a tube");
    }

    let plan = TubePlan::split(total_reactions, tubes, per_reaction_volume);
    info!(
        tubes,
        total_reactions,
        per_reaction_volume,
        capacity,
        "allocated reagent tubes"
    );
    Ok(plan)
}
