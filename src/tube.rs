/// A physical tube and the liquid volume (µL) it's tracked to hold.
///
/// `L` is whatever the liquid handler uses to address the tube. Dispensing and routing
/// update [`remaining_volume`](Self::remaining_volume) in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Tube<L> {
    /// Handle the liquid handler understands.
    pub location: L,
    /// Liquid currently in the tube (µL).
    pub remaining_volume: f64,
}

impl<L> Tube<L> {
    /// Construct a tube holding `remaining_volume` µL.
    pub const fn new(location: L, remaining_volume: f64) -> Self {
        Self {
            location,
            remaining_volume,
        }
    }

    /// Construct an empty tube.
    pub const fn empty(location: L) -> Self {
        Self::new(location, 0.0)
    }
}

/// A tube paired with a count of reactions: reactions it can still supply (for
/// sources) or reactions it still needs (for destinations).
#[derive(Clone, Debug, PartialEq)]
pub struct Allotment<L> {
    /// The tube
    pub tube: Tube<L>,
    /// Reactions left to supply or receive
    pub reactions: usize,
}

impl<L> Allotment<L> {
    /// Construct from a tube and its reaction count.
    pub const fn new(tube: Tube<L>, reactions: usize) -> Self {
        Self { tube, reactions }
    }
}

/// Slack (µL) allowed when comparing tracked volumes, absorbing floating point drift.
pub(crate) const VOLUME_TOLERANCE: f64 = 1e-6;
