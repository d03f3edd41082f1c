use std::ops::Range;

use tracing::{debug, info};

use crate::error::{Error, InsufficientVolumeError, NoSuitablePipetteError};
use crate::handler::LiquidHandler;
use crate::height::HeightProfile;
use crate::pipette::Pipette;
use crate::tube::{Tube, VOLUME_TOLERANCE};

/// Consecutive targets served from one tube at a single aspiration depth.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Indices into the target list
    pub targets: Range<usize>,
    /// Aspiration depth (mm from the tube bottom)
    pub depth: f64,
    /// Volume (µL) left in the tube after this batch
    pub volume_after: f64,
}

/// Split dispensing `per_target_volume` µL into each of `targets` targets into batches
/// that can each be aspirated at a single depth.
///
/// A target joins the current batch as long as the liquid level left after its
/// aspiration stays in the same height band as the level left after the batch's first
/// target; the batch is aspirated at that band's depth. This yields one batch per band
/// the level passes through, never more.
///
/// # Errors
///
/// Returns [`InsufficientVolumeError`] if `volume` can't serve every target.
///
/// # Panics
///
/// Panics if `per_target_volume` isn't a finite, positive number.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use liquids::{HeightProfile, plan_dispense};
///
/// let falcon = HeightProfile::falcon_15ml();
/// let batches = plan_dispense(&falcon, 9500.0, 50.0, 40)?;
/// assert_eq!(batches.len(), 2);
/// assert_eq!((batches[0].targets.clone(), batches[0].depth), (0..9, 65.0));
/// assert_eq!((batches[1].targets.clone(), batches[1].depth), (9..40, 45.0));
/// assert_eq!(batches[1].volume_after, 7500.0);
/// # Ok(())
/// # }
/// ```
#[track_caller]
#[allow(clippy::cast_precision_loss, reason = "target counts are tiny")]
pub fn plan_dispense(
    profile: &HeightProfile,
    volume: f64,
    per_target_volume: f64,
    targets: usize,
) -> Result<Vec<Batch>, InsufficientVolumeError> {
    assert!(
        per_target_volume.is_finite() && per_target_volume > 0.0,
        "per-target volume must be positive, got {per_target_volume}"
    );
    let required = targets as f64 * per_target_volume;
    if required > volume + VOLUME_TOLERANCE {
        return Err(InsufficientVolumeError {
            required,
            available: volume,
        });
    }

    let left_after = |n: usize| (volume - n as f64 * per_target_volume).max(0.0);
    let mut batches = Vec::new();
    let mut start = 0;
    while start < targets {
        let len = profile.constant_depth_run(volume, per_target_volume, start, targets);
        let end = start + len;
        let batch = Batch {
            targets: start..end,
            depth: profile.safe_depth(volume - (start + 1) as f64 * per_target_volume),
            volume_after: left_after(end),
        };
        debug!(
            targets = ?batch.targets,
            depth = batch.depth,
            volume_after = batch.volume_after,
            "planned dispense batch"
        );
        batches.push(batch);
        start = end;
    }
    Ok(batches)
}

/// Dispense `per_target_volume` µL from `tube` into every target, in order, tracking
/// the aspiration depth as the tube empties.
///
/// The whole dispense is planned with [`plan_dispense`] before anything moves. One tip
/// is picked up for the run and dropped at the end; no targets means no tip. The tube's
/// remaining volume is updated after every batch, and the final value is returned.
///
/// # Errors
///
/// Returns [`Error::InsufficientVolume`] if the tube can't serve every target, or
/// [`Error::NoSuitablePipette`] if `per_target_volume` is outside the pipette's range.
/// Both are raised before any liquid moves. Returns [`Error::Handler`] if the liquid
/// handler fails.
///
/// # Panics
///
/// Panics if `per_target_volume` isn't a finite, positive number.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use liquids::{DryRun, HeightProfile, Mount, Pipette, Tube, dispense};
///
/// let mut robot = DryRun::<&str>::new();
/// let mut tube = Tube::new("falcon A1", 9500.0);
/// let wells: Vec<_> = (1..=40).map(|i| format!("well {i}")).collect();
/// let wells: Vec<&str> = wells.iter().map(String::as_str).collect();
///
/// let falcon = HeightProfile::falcon_15ml();
/// let p300 = Pipette::p300(Mount::Right);
/// let left = dispense(&mut robot, &p300, &falcon, &mut tube, 50.0, &wells)?;
/// assert_eq!(left, 7500.0);
/// assert_eq!(tube.remaining_volume, 7500.0);
/// assert_eq!(robot.liquid_operations(), 2);
///
/// // 50 µL is below what a P1000 moves accurately
/// let p1000 = Pipette::p1000(Mount::Left);
/// assert!(dispense(&mut robot, &p1000, &falcon, &mut tube, 50.0, &wells[..1]).is_err());
/// # Ok(())
/// # }
/// ```
#[track_caller]
pub fn dispense<L, H>(
    handler: &mut H,
    pipette: &Pipette,
    profile: &HeightProfile,
    tube: &mut Tube<L>,
    per_target_volume: f64,
    targets: &[L],
) -> Result<f64, Error>
where
    H: LiquidHandler<L> + ?Sized,
{
    let start_volume = tube.remaining_volume;
    let batches = plan_dispense(profile, start_volume, per_target_volume, targets.len())?;
    if !pipette.covers(per_target_volume) {
        return Err(NoSuitablePipetteError {
            volume: per_target_volume,
        }
        .into());
    }
    if batches.is_empty() {
        return Ok(start_volume);
    }

    handler.pick_up_tip(pipette)?;
    for batch in &batches {
        handler.distribute(
            pipette,
            per_target_volume,
            &tube.location,
            batch.depth,
            &targets[batch.targets.clone()],
        )?;
        tube.remaining_volume = batch.volume_after;
    }
    handler.drop_tip(pipette)?;

    info!(
        mount = %pipette.mount(),
        targets = targets.len(),
        batches = batches.len(),
        per_target_volume,
        start_volume,
        remaining_volume = tube.remaining_volume,
        "dispensed from tube"
    );
    Ok(tube.remaining_volume)
}
