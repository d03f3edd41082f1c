use std::fmt::{Display, Formatter};

use crate::error::{ConfigError, NoSuitablePipetteError};

/// Side of the robot a pipette is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mount {
    /// Left mount
    Left,
    /// Right mount
    Right,
}

impl Mount {
    /// Both mounts, left first
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    /// Return lowercase string representation
    #[must_use]
    pub const fn to_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl Display for Mount {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        self.to_str().fmt(f)
    }
}

/// Capabilities of a single-channel pipette.
///
/// # Examples
///
/// ```
/// use liquids::{Mount, Pipette};
///
/// let p300 = Pipette::p300(Mount::Right);
/// assert_eq!((p300.min_volume(), p300.max_volume()), (20.0, 300.0));
/// assert!(Pipette::new(Mount::Left, 50.0, 10.0).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawPipette"))]
pub struct Pipette {
    mount: Mount,
    min_volume: f64,
    max_volume: f64,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawPipette {
    mount: Mount,
    min_volume: f64,
    max_volume: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawPipette> for Pipette {
    type Error = ConfigError;

    fn try_from(raw: RawPipette) -> Result<Self, Self::Error> {
        Self::new(raw.mount, raw.min_volume, raw.max_volume)
    }
}

impl Pipette {
    /// Describe a pipette by its working range (µL).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] unless `0 < min_volume <= max_volume` and both are finite.
    pub fn new(mount: Mount, min_volume: f64, max_volume: f64) -> Result<Self, ConfigError> {
        if min_volume.is_finite() && max_volume.is_finite() && 0.0 < min_volume {
            if min_volume <= max_volume {
                return Ok(Self {
                    mount,
                    min_volume,
                    max_volume,
                });
            }
            return Err(ConfigError::new(
                "pipette",
                "minimum volume exceeds maximum volume",
            ));
        }
        Err(ConfigError::new(
            "pipette",
            "volumes must be finite and positive",
        ))
    }

    /// GEN2 P20 single-channel (1-20 µL)
    #[must_use]
    pub const fn p20(mount: Mount) -> Self {
        Self {
            mount,
            min_volume: 1.0,
            max_volume: 20.0,
        }
    }

    /// GEN2 P300 single-channel (20-300 µL)
    #[must_use]
    pub const fn p300(mount: Mount) -> Self {
        Self {
            mount,
            min_volume: 20.0,
            max_volume: 300.0,
        }
    }

    /// GEN2 P1000 single-channel (100-1000 µL)
    #[must_use]
    pub const fn p1000(mount: Mount) -> Self {
        Self {
            mount,
            min_volume: 100.0,
            max_volume: 1000.0,
        }
    }

    /// Where the pipette is attached.
    #[must_use]
    pub const fn mount(&self) -> Mount {
        self.mount
    }

    /// Smallest volume (µL) the pipette moves accurately.
    #[must_use]
    pub const fn min_volume(&self) -> f64 {
        self.min_volume
    }

    /// Largest volume (µL) the pipette holds in one aspiration.
    #[must_use]
    pub const fn max_volume(&self) -> f64 {
        self.max_volume
    }

    /// Whether `volume` fits the pipette's working range in a single aspiration.
    #[must_use]
    pub fn covers(&self, volume: f64) -> bool {
        self.min_volume <= volume && volume <= self.max_volume
    }

    /// Number of equal aspirations needed to move `volume` without exceeding
    /// [`max_volume`](Self::max_volume).
    ///
    /// # Examples
    ///
    /// ```
    /// use liquids::{Mount, Pipette};
    ///
    /// let p300 = Pipette::p300(Mount::Right);
    /// assert_eq!(p300.strokes(300.0), 1);
    /// assert_eq!(p300.strokes(301.0), 2);
    /// assert_eq!(p300.strokes(0.0), 1);
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "volume / max_volume is a small positive number"
    )]
    pub fn strokes(&self, volume: f64) -> usize {
        ((volume / self.max_volume).ceil() as usize).max(1)
    }
}

/// Pick the pipette that should move `volume` µL.
///
/// A pipette qualifies when its minimum volume doesn't exceed `volume`. If both qualify,
/// the one with the larger minimum volume (the one intended for larger volumes) wins;
/// ties go to `a`. Maximum volumes are deliberately not considered: callers split
/// oversized volumes with [`Pipette::strokes`].
///
/// # Errors
///
/// Returns [`NoSuitablePipetteError`] if no present pipette qualifies.
///
/// # Examples
///
/// ```
/// use liquids::{Mount, Pipette, select};
///
/// let p300 = Pipette::p300(Mount::Right);
/// let p1000 = Pipette::p1000(Mount::Left);
///
/// assert!(select(15.0, Some(&p300), Some(&p1000)).is_err());
/// assert_eq!(select(50.0, Some(&p300), Some(&p1000)), Ok(&p300));
/// assert_eq!(select(150.0, Some(&p300), Some(&p1000)), Ok(&p1000));
/// assert_eq!(select(150.0, Some(&p300), None), Ok(&p300));
/// ```
pub fn select<'a>(
    volume: f64,
    a: Option<&'a Pipette>,
    b: Option<&'a Pipette>,
) -> Result<&'a Pipette, NoSuitablePipetteError> {
    let qualifies = |p: &&Pipette| p.min_volume <= volume;
    match (a.filter(qualifies), b.filter(qualifies)) {
        (Some(a), Some(b)) => Ok(if b.min_volume > a.min_volume { b } else { a }),
        (Some(p), None) | (None, Some(p)) => Ok(p),
        (None, None) => Err(NoSuitablePipetteError { volume }),
    }
}

/// Pipettes attached to the left and right mounts; either may be empty.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipetteMounts {
    /// Pipette on the left mount
    pub left: Option<Pipette>,
    /// Pipette on the right mount
    pub right: Option<Pipette>,
}

impl PipetteMounts {
    /// Attach pipettes, placing each on the mount it declares.
    ///
    /// A later pipette replaces an earlier one on the same mount.
    pub fn new(pipettes: impl IntoIterator<Item = Pipette>) -> Self {
        let mut mounts = Self::default();
        for pipette in pipettes {
            match pipette.mount {
                Mount::Left => mounts.left = Some(pipette),
                Mount::Right => mounts.right = Some(pipette),
            }
        }
        mounts
    }

    /// Pipette attached to `mount`, if any.
    #[must_use]
    pub fn get(&self, mount: Mount) -> Option<&Pipette> {
        match mount {
            Mount::Left => self.left.as_ref(),
            Mount::Right => self.right.as_ref(),
        }
    }

    /// [`select`] between the two mounts.
    ///
    /// # Errors
    ///
    /// Returns [`NoSuitablePipetteError`] if neither mount qualifies.
    pub fn select(&self, volume: f64) -> Result<&Pipette, NoSuitablePipetteError> {
        select(volume, self.left.as_ref(), self.right.as_ref())
    }
}
