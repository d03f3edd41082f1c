//! Error types
//!
//! Every error here aborts the operation that raised it; nothing is retried.

use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};

/// A single reaction's worth of reagent doesn't fit into one tube.
#[derive(Clone, Copy, PartialEq)]
pub struct CapacityError {
    pub(crate) per_reaction_volume: f64,
    pub(crate) tube_capacity: f64,
}

impl CapacityError {
    /// Volume (µL) needed by a single reaction.
    #[must_use]
    pub fn per_reaction_volume(&self) -> f64 {
        self.per_reaction_volume
    }

    /// Working capacity (µL) of the tube that was too small.
    #[must_use]
    pub fn tube_capacity(&self) -> f64 {
        self.tube_capacity
    }
}

impl Display for CapacityError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let Self {
            per_reaction_volume,
            tube_capacity,
        } = self;
        write!(
            f,
            "one reaction needs {per_reaction_volume} µL but a tube only holds {tube_capacity} µL"
        )
    }
}

impl Debug for CapacityError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("CapacityError")
            .field("per_reaction_volume", &self.per_reaction_volume)
            .field("tube_capacity", &self.tube_capacity)
            .finish()
    }
}

impl StdError for CapacityError {}

/// A tube was asked for more liquid than its tracked remaining volume.
///
/// This means the tube plan or the volume bookkeeping drifted; it's always detected
/// before any liquid is moved.
#[derive(Clone, Copy, PartialEq)]
pub struct InsufficientVolumeError {
    pub(crate) required: f64,
    pub(crate) available: f64,
}

impl InsufficientVolumeError {
    /// Volume (µL) the operation would have withdrawn.
    #[must_use]
    pub fn required(&self) -> f64 {
        self.required
    }

    /// Volume (µL) the tube actually had.
    #[must_use]
    pub fn available(&self) -> f64 {
        self.available
    }
}

impl Display for InsufficientVolumeError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let Self {
            required,
            available,
        } = self;
        write!(
            f,
            "insufficient volume: {required} µL required but only {available} µL available"
        )
    }
}

impl Debug for InsufficientVolumeError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("InsufficientVolumeError")
            .field("required", &self.required)
            .field("available", &self.available)
            .finish()
    }
}

impl StdError for InsufficientVolumeError {}

/// None of the attached pipettes can handle the requested volume.
#[derive(Clone, Copy, PartialEq)]
pub struct NoSuitablePipetteError {
    pub(crate) volume: f64,
}

impl NoSuitablePipetteError {
    /// The offending volume (µL).
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

impl Display for NoSuitablePipetteError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "no attached pipette can move {} µL", self.volume)
    }
}

impl Debug for NoSuitablePipetteError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("NoSuitablePipetteError")
            .field("volume", &self.volume)
            .finish()
    }
}

impl StdError for NoSuitablePipetteError {}

/// Source tubes ran out before every destination tube was filled.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SourcesExhaustedError {
    pub(crate) destination: usize,
    pub(crate) missing_reactions: usize,
}

impl SourcesExhaustedError {
    /// Index of the first destination that couldn't be completed.
    #[must_use]
    pub fn destination(&self) -> usize {
        self.destination
    }

    /// Reactions still missing across all destinations.
    #[must_use]
    pub fn missing_reactions(&self) -> usize {
        self.missing_reactions
    }
}

impl Display for SourcesExhaustedError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let Self {
            destination,
            missing_reactions,
        } = self;
        write!(
            f,
            "sources exhausted at destination {destination}: {missing_reactions} reactions short"
        )
    }
}

impl Debug for SourcesExhaustedError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("SourcesExhaustedError")
            .field("destination", &self.destination)
            .field("missing_reactions", &self.missing_reactions)
            .finish()
    }
}

impl StdError for SourcesExhaustedError {}

/// Invalid labware geometry, pipette description or tube plan.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub(crate) kind: &'static str,
    pub(crate) reason: &'static str,
}

impl ConfigError {
    pub(crate) const fn new(kind: &'static str, reason: &'static str) -> Self {
        ConfigError { kind, reason }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let Self { kind, reason } = self;
        write!(f, "invalid {kind}: {reason}")
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("ConfigError")
            .field("kind", &self.kind)
            .field("reason", &self.reason)
            .finish()
    }
}

impl StdError for ConfigError {}

/// The labware placement layer had no room for a requested piece of labware.
///
/// This crate never produces it on its own; it passes through from
/// [`LiquidHandler`](crate::LiquidHandler) implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct DeckSpaceError {
    labware: String,
}

impl DeckSpaceError {
    /// Construct for the labware that couldn't be placed.
    #[must_use]
    pub fn new(labware: impl Into<String>) -> Self {
        Self {
            labware: labware.into(),
        }
    }

    /// Name of the labware that couldn't be placed.
    #[must_use]
    pub fn labware(&self) -> &str {
        &self.labware
    }
}

impl Display for DeckSpaceError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "no deck slot left for {}", self.labware)
    }
}

impl Debug for DeckSpaceError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_tuple("DeckSpaceError").field(&self.labware).finish()
    }
}

impl StdError for DeckSpaceError {}

/// Opaque failure reported by a [`LiquidHandler`](crate::LiquidHandler).
#[derive(Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// Labware placement ran out of deck slots.
    DeckSpace(DeckSpaceError),
    /// Anything else the hardware layer reports.
    Other(Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary hardware-layer error.
    pub fn other(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::DeckSpace(err) => Display::fmt(err, f),
            Self::Other(err) => write!(f, "liquid handler failed: {err}"),
        }
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::DeckSpace(err) => Some(err),
            Self::Other(err) => Some(&**err),
        }
    }
}

impl From<DeckSpaceError> for HandlerError {
    fn from(err: DeckSpaceError) -> Self {
        Self::DeckSpace(err)
    }
}

/// Any error raised while dispensing or routing.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// See [`InsufficientVolumeError`].
    InsufficientVolume(InsufficientVolumeError),
    /// See [`NoSuitablePipetteError`].
    NoSuitablePipette(NoSuitablePipetteError),
    /// See [`SourcesExhaustedError`].
    SourcesExhausted(SourcesExhaustedError),
    /// See [`HandlerError`].
    Handler(HandlerError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::InsufficientVolume(err) => Display::fmt(err, f),
            Self::NoSuitablePipette(err) => Display::fmt(err, f),
            Self::SourcesExhausted(err) => Display::fmt(err, f),
            Self::Handler(err) => Display::fmt(err, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InsufficientVolume(err) => Some(err),
            Self::NoSuitablePipette(err) => Some(err),
            Self::SourcesExhausted(err) => Some(err),
            Self::Handler(err) => Some(err),
        }
    }
}

impl From<InsufficientVolumeError> for Error {
    fn from(err: InsufficientVolumeError) -> Self {
        Self::InsufficientVolume(err)
    }
}

impl From<NoSuitablePipetteError> for Error {
    fn from(err: NoSuitablePipetteError) -> Self {
        Self::NoSuitablePipette(err)
    }
}

impl From<SourcesExhaustedError> for Error {
    fn from(err: SourcesExhaustedError) -> Self {
        Self::SourcesExhausted(err)
    }
}

impl From<HandlerError> for Error {
    fn from(err: HandlerError) -> Self {
        Self::Handler(err)
    }
}
