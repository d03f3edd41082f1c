//! Boundary to the hardware that actually moves liquid.
//!
//! Planning in this crate decides volumes, depths and pipettes; a [`LiquidHandler`]
//! turns those decisions into motion. [`DryRun`] is a handler that records instead of
//! moving, used to simulate a protocol before it touches the robot.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::HandlerError;
use crate::pipette::{Mount, Pipette};

/// Executes pipetting primitives on locations of type `L`.
///
/// Calls arrive strictly in protocol order, one at a time.
pub trait LiquidHandler<L> {
    /// Attach a fresh tip to `pipette`.
    ///
    /// # Errors
    ///
    /// Any failure of the hardware layer.
    fn pick_up_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError>;

    /// Discard the tip on `pipette`.
    ///
    /// # Errors
    ///
    /// Any failure of the hardware layer.
    fn drop_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError>;

    /// Aspirate `volume` µL from `source` and dispense all of it into `destination`,
    /// reusing the tip already attached.
    ///
    /// # Errors
    ///
    /// Any failure of the hardware layer.
    fn transfer(
        &mut self,
        pipette: &Pipette,
        volume: f64,
        source: &L,
        destination: &L,
    ) -> Result<(), HandlerError>;

    /// Aspirate from `source` at `depth` mm above its bottom and dispense `volume` µL
    /// into each of `targets`, in order, reusing the tip already attached.
    ///
    /// # Errors
    ///
    /// Any failure of the hardware layer.
    fn distribute(
        &mut self,
        pipette: &Pipette,
        volume: f64,
        source: &L,
        depth: f64,
        targets: &[L],
    ) -> Result<(), HandlerError>;
}

/// A call recorded by [`DryRun`].
#[derive(Clone, Debug, PartialEq)]
pub enum Step<L> {
    /// See [`LiquidHandler::pick_up_tip`].
    PickUpTip {
        /// Mount of the pipette
        mount: Mount,
    },
    /// See [`LiquidHandler::drop_tip`].
    DropTip {
        /// Mount of the pipette
        mount: Mount,
    },
    /// See [`LiquidHandler::transfer`].
    Transfer {
        /// Mount of the pipette
        mount: Mount,
        /// Volume moved (µL)
        volume: f64,
        /// Where liquid came from
        source: L,
        /// Where liquid went
        destination: L,
    },
    /// See [`LiquidHandler::distribute`].
    Distribute {
        /// Mount of the pipette
        mount: Mount,
        /// Volume per target (µL)
        volume: f64,
        /// Where liquid came from
        source: L,
        /// Aspiration depth (mm from the tube bottom)
        depth: f64,
        /// Where liquid went, in order
        targets: Vec<L>,
    },
}

/// [`LiquidHandler`] that records every call instead of moving anything.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use liquids::{DryRun, LiquidHandler, Mount, Pipette, Step};
///
/// let p300 = Pipette::p300(Mount::Right);
/// let mut robot = DryRun::<&str>::new();
/// robot.pick_up_tip(&p300)?;
/// robot.transfer(&p300, 100.0, &"A1", &"B1")?;
/// robot.drop_tip(&p300)?;
///
/// assert_eq!(robot.tips_used(Mount::Right), 1);
/// assert_eq!(robot.steps().len(), 3);
/// assert!(matches!(robot.steps()[1], Step::Transfer { destination: "B1", .. }));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DryRun<L> {
    steps: Vec<Step<L>>,
    tips: BTreeMap<Mount, usize>,
}

impl<L> DryRun<L> {
    /// Start with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            tips: BTreeMap::new(),
        }
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn steps(&self) -> &[Step<L>] {
        &self.steps
    }

    /// Consume the record, returning the calls.
    #[must_use]
    pub fn into_steps(self) -> Vec<Step<L>> {
        self.steps
    }

    /// Tips picked up on `mount` so far.
    #[must_use]
    pub fn tips_used(&self, mount: Mount) -> usize {
        self.tips.get(&mount).copied().unwrap_or(0)
    }

    /// Number of [`Step::Transfer`] and [`Step::Distribute`] calls, i.e. aspirations
    /// that moved liquid.
    #[must_use]
    pub fn liquid_operations(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Transfer { .. } | Step::Distribute { .. }))
            .count()
    }
}

impl<L> Default for DryRun<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Clone + std::fmt::Debug> LiquidHandler<L> for DryRun<L> {
    fn pick_up_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError> {
        let mount = pipette.mount();
        trace!(%mount, "pick up tip");
        *self.tips.entry(mount).or_default() += 1;
        self.steps.push(Step::PickUpTip { mount });
        Ok(())
    }

    fn drop_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError> {
        let mount = pipette.mount();
        trace!(%mount, "drop tip");
        self.steps.push(Step::DropTip { mount });
        Ok(())
    }

    fn transfer(
        &mut self,
        pipette: &Pipette,
        volume: f64,
        source: &L,
        destination: &L,
    ) -> Result<(), HandlerError> {
        let mount = pipette.mount();
        trace!(%mount, volume, ?source, ?destination, "transfer");
        self.steps.push(Step::Transfer {
            mount,
            volume,
            source: source.clone(),
            destination: destination.clone(),
        });
        Ok(())
    }

    fn distribute(
        &mut self,
        pipette: &Pipette,
        volume: f64,
        source: &L,
        depth: f64,
        targets: &[L],
    ) -> Result<(), HandlerError> {
        let mount = pipette.mount();
        trace!(%mount, volume, ?source, depth, targets = targets.len(), "distribute");
        self.steps.push(Step::Distribute {
            mount,
            volume,
            source: source.clone(),
            depth,
            targets: targets.to_vec(),
        });
        Ok(())
    }
}
