use crate::error::ConfigError;

/// One step of a [`HeightProfile`]: liquid volumes up to and including `max_volume` µL
/// are aspirated `depth` mm above the tube bottom.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightBand {
    /// Inclusive upper volume limit (µL) of the band.
    pub max_volume: f64,
    /// Aspiration depth (mm from the tube bottom).
    pub depth: f64,
}

/// Step function from a tube's remaining volume to a safe aspiration depth.
///
/// The depths are calibrated for one specific tube geometry; a profile is labware
/// configuration, not a formula.
///
/// # Examples
///
/// ```
/// use liquids::HeightProfile;
///
/// let falcon = HeightProfile::falcon_15ml();
/// assert_eq!(falcon.safe_depth(100.0), 0.7);
/// assert_eq!(falcon.safe_depth(100.01), 1.0);
/// assert_eq!(falcon.safe_depth(9000.0), 45.0);
/// assert_eq!(falcon.safe_depth(9000.01), 65.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawHeightProfile"))]
pub struct HeightProfile {
    bands: Vec<HeightBand>,
    overflow_depth: f64,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawHeightProfile {
    bands: Vec<HeightBand>,
    overflow_depth: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawHeightProfile> for HeightProfile {
    type Error = ConfigError;

    fn try_from(raw: RawHeightProfile) -> Result<Self, Self::Error> {
        Self::new(raw.bands, raw.overflow_depth)
    }
}

const FALCON_15ML_BANDS: [HeightBand; 4] = [
    HeightBand {
        max_volume: 100.0,
        depth: 0.7,
    },
    HeightBand {
        max_volume: 3000.0,
        depth: 1.0,
    },
    HeightBand {
        max_volume: 6000.0,
        depth: 25.0,
    },
    HeightBand {
        max_volume: 9000.0,
        depth: 45.0,
    },
];

impl HeightProfile {
    /// Build a profile from bands sorted by volume, plus the depth used above the last band.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] unless every number is finite and non-negative, band
    /// limits strictly increase and depths never decrease with volume.
    pub fn new(bands: Vec<HeightBand>, overflow_depth: f64) -> Result<Self, ConfigError> {
        const KIND: &str = "height profile";
        let valid = |x: f64| x.is_finite() && x >= 0.0;
        if !bands.iter().all(|b| valid(b.max_volume) && valid(b.depth)) || !valid(overflow_depth)
        {
            return Err(ConfigError::new(
                KIND,
                "volumes and depths must be finite and non-negative",
            ));
        }
        if !bands.windows(2).all(|w| w[0].max_volume < w[1].max_volume) {
            return Err(ConfigError::new(
                KIND,
                "band volumes must be strictly increasing",
            ));
        }
        let depths = bands.iter().map(|b| b.depth).chain([overflow_depth]);
        if !depths.clone().zip(depths.skip(1)).all(|(a, b)| a <= b) {
            return Err(ConfigError::new(
                KIND,
                "depths must not decrease with volume",
            ));
        }
        Ok(Self {
            bands,
            overflow_depth,
        })
    }

    /// Profile of a 15 mL conical tube.
    #[must_use]
    pub fn falcon_15ml() -> Self {
        Self {
            bands: FALCON_15ML_BANDS.to_vec(),
            overflow_depth: 65.0,
        }
    }

    /// Bounded bands, in increasing volume order.
    #[must_use]
    pub fn bands(&self) -> &[HeightBand] {
        &self.bands
    }

    /// Depth used above the last band's volume limit.
    #[must_use]
    pub fn overflow_depth(&self) -> f64 {
        self.overflow_depth
    }

    /// Index of the band containing `volume`; `bands().len()` means above every band.
    #[must_use]
    pub fn band_index(&self, volume: f64) -> usize {
        self.bands.partition_point(|b| b.max_volume < volume)
    }

    /// Safe aspiration depth (mm from the tube bottom) for a tube holding `volume` µL.
    #[must_use]
    pub fn safe_depth(&self, volume: f64) -> f64 {
        self.bands
            .get(self.band_index(volume))
            .map_or(self.overflow_depth, |b| b.depth)
    }

    /// Number of consecutive aspirations of `per_reaction` µL, out of `available`, that
    /// leave the liquid level in the same band as the first aspiration does.
    ///
    /// Every aspiration of such a run can be made at the same depth, namely the depth
    /// of the level left behind.
    ///
    /// # Examples
    ///
    /// ```
    /// use liquids::HeightProfile;
    ///
    /// let falcon = HeightProfile::falcon_15ml();
    /// // 9450, 9400, ..., 9050 µL are left behind before dropping to 9000 µL
    /// assert_eq!(falcon.max_reactions_at_constant_depth(9500.0, 50.0, 40), 9);
    /// // 9000 µL down to 6050 µL share the next band
    /// assert_eq!(falcon.max_reactions_at_constant_depth(9050.0, 50.0, 100), 60);
    /// assert_eq!(falcon.max_reactions_at_constant_depth(9050.0, 50.0, 31), 31);
    /// ```
    #[must_use]
    pub fn max_reactions_at_constant_depth(
        &self,
        volume: f64,
        per_reaction: f64,
        available: usize,
    ) -> usize {
        self.constant_depth_run(volume, per_reaction, 0, available)
    }

    /// Like [`Self::max_reactions_at_constant_depth`], but starting after `done` of
    /// `total` aspirations from a tube that initially held `volume`.
    #[allow(clippy::cast_precision_loss, reason = "reaction counts are tiny")]
    pub(crate) fn constant_depth_run(
        &self,
        volume: f64,
        per_reaction: f64,
        done: usize,
        total: usize,
    ) -> usize {
        // Levels are always derived from the initial volume so they don't drift
        let left_after = |n: usize| volume - n as f64 * per_reaction;
        let band = self.band_index(left_after(done + 1));
        (done + 1..=total)
            .take_while(|&n| self.band_index(left_after(n)) == band)
            .count()
    }
}

impl Default for HeightProfile {
    fn default() -> Self {
        Self::falcon_15ml()
    }
}
