use tracing::{debug, info, warn};

use crate::error::{Error, InsufficientVolumeError, NoSuitablePipetteError, SourcesExhaustedError};
use crate::handler::LiquidHandler;
use crate::pipette::{Mount, Pipette, PipetteMounts};
use crate::tube::{Allotment, VOLUME_TOLERANCE};

/// One tube-to-tube movement of whole reactions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transfer {
    /// Index of the source tube
    pub source: usize,
    /// Index of the destination tube
    pub destination: usize,
    /// Reactions moved
    pub reactions: usize,
    /// Total volume moved (µL)
    pub volume: f64,
    /// Mount of the pipette doing the move
    pub mount: Mount,
    /// Equal aspirations the volume is split into
    pub strokes: usize,
}

/// Outcome of [`route`].
#[derive(Clone, Debug, PartialEq)]
pub struct RouteReport {
    /// Transfers performed, in order
    pub transfers: Vec<Transfer>,
    /// Tips picked up
    pub tips_used: usize,
}

/// Plan moving reactions of `per_reaction_volume` µL from source tubes to destination
/// tubes, given how many reactions each source can supply and each destination needs.
///
/// Destinations are filled in order from the sources in order; a source is only left
/// behind once it's exhausted. Each transfer moves as many reactions as both the current
/// source and destination allow, using the pipette [`PipetteMounts::select`] picks for
/// its volume.
///
/// # Errors
///
/// Returns [`Error::SourcesExhausted`] if the sources can't supply every destination,
/// or [`Error::NoSuitablePipette`] if some transfer volume is too small for every
/// attached pipette or would split into strokes below the selected pipette's minimum.
///
/// # Panics
///
/// Panics if `per_reaction_volume` isn't a finite, positive number.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use liquids::{Mount, Pipette, PipetteMounts, plan_route};
///
/// let mounts = PipetteMounts::new([Pipette::p300(Mount::Right)]);
/// let transfers = plan_route(20.0, &[10, 10], &[6, 8], &mounts)?;
/// let moves: Vec<_> = transfers
///     .iter()
///     .map(|t| (t.source, t.destination, t.reactions))
///     .collect();
/// assert_eq!(moves, [(0, 0, 6), (0, 1, 4), (1, 1, 4)]);
///
/// assert!(plan_route(20.0, &[3], &[6], &mounts).is_err());
/// # Ok(())
/// # }
/// ```
#[track_caller]
#[allow(clippy::cast_precision_loss, reason = "reaction counts are tiny")]
pub fn plan_route(
    per_reaction_volume: f64,
    sources: &[usize],
    destinations: &[usize],
    pipettes: &PipetteMounts,
) -> Result<Vec<Transfer>, Error> {
    assert!(
        per_reaction_volume.is_finite() && per_reaction_volume > 0.0,
        "per-reaction volume must be positive, got {per_reaction_volume}"
    );
    let mut available = sources.to_vec();
    let mut source = 0;
    let mut transfers = Vec::new();

    for (destination, &needed) in destinations.iter().enumerate() {
        let mut needed = needed;
        while needed > 0 {
            while available.get(source) == Some(&0) {
                source += 1;
            }
            let Some(supply) = available.get_mut(source) else {
                let later: usize = destinations[destination + 1..].iter().sum();
                return Err(SourcesExhaustedError {
                    destination,
                    missing_reactions: needed + later,
                }
                .into());
            };

            let reactions = needed.min(*supply);
            let volume = reactions as f64 * per_reaction_volume;
            let pipette = pipettes.select(volume)?;
            let strokes = pipette.strokes(volume);
            // A narrow range can split into strokes smaller than the pipette's minimum
            if volume / (strokes as f64) < pipette.min_volume() {
                return Err(NoSuitablePipetteError { volume }.into());
            }
            let transfer = Transfer {
                source,
                destination,
                reactions,
                volume,
                mount: pipette.mount(),
                strokes,
            };
            debug!(
                source,
                destination,
                reactions,
                volume,
                mount = %transfer.mount,
                "planned transfer"
            );
            transfers.push(transfer);
            *supply -= reactions;
            needed -= reactions;
        }
    }
    Ok(transfers)
}

/// Move reactions of `per_reaction_volume` µL from source tubes into destination tubes.
///
/// Everything is planned with [`plan_route`] and every source is checked to hold the
/// liquid it's planned to give before anything moves. A tip is kept on the current
/// pipette until a transfer needs the other one; the last tip is dropped at the end.
/// Transfers larger than the pipette's maximum volume are split into equal strokes.
///
/// Tube volumes are updated after every stroke, and the `reactions` of every allotment
/// count down once a transfer completes: sources by what they gave, destinations to
/// zero. If the handler fails mid-transfer, the held tip is dropped before the error is
/// returned, and tube volumes reflect the strokes that did run.
///
/// # Errors
///
/// Returns [`Error::SourcesExhausted`], [`Error::NoSuitablePipette`] or
/// [`Error::InsufficientVolume`] before any liquid moves, or [`Error::Handler`] if the
/// liquid handler fails.
///
/// # Panics
///
/// Panics if `per_reaction_volume` isn't a finite, positive number.
#[track_caller]
#[allow(clippy::cast_precision_loss, reason = "stroke counts are tiny")]
pub fn route<L, H>(
    handler: &mut H,
    per_reaction_volume: f64,
    sources: &mut [Allotment<L>],
    destinations: &mut [Allotment<L>],
    pipettes: &PipetteMounts,
) -> Result<RouteReport, Error>
where
    H: LiquidHandler<L> + ?Sized,
{
    let supply: Vec<usize> = sources.iter().map(|s| s.reactions).collect();
    let demand: Vec<usize> = destinations.iter().map(|d| d.reactions).collect();
    let transfers = plan_route(per_reaction_volume, &supply, &demand, pipettes)?;

    for (i, source) in sources.iter().enumerate() {
        let required: f64 = transfers
            .iter()
            .filter(|t| t.source == i)
            .map(|t| t.volume)
            .sum();
        let available = source.tube.remaining_volume;
        if required > available + VOLUME_TOLERANCE {
            return Err(InsufficientVolumeError {
                required,
                available,
            }
            .into());
        }
    }

    let mut held: Option<&Pipette> = None;
    let mut tips_used = 0;
    for transfer in &transfers {
        let pipette = pipettes
            .get(transfer.mount)
            .ok_or(NoSuitablePipetteError {
                volume: transfer.volume,
            })?;
        if held.map(Pipette::mount) != Some(transfer.mount) {
            if let Some(previous) = held {
                debug!(from = %previous.mount(), to = %transfer.mount, "switching pipette");
                handler.drop_tip(previous)?;
            }
            handler.pick_up_tip(pipette)?;
            tips_used += 1;
            held = Some(pipette);
        }

        if transfer.strokes > 1 {
            warn!(
                volume = transfer.volume,
                strokes = transfer.strokes,
                max_volume = pipette.max_volume(),
                "transfer exceeds pipette capacity, splitting"
            );
        }
        let stroke_volume = transfer.volume / transfer.strokes as f64;
        for _ in 0..transfer.strokes {
            let from = &sources[transfer.source].tube.location;
            let to = &destinations[transfer.destination].tube.location;
            if let Err(err) = handler.transfer(pipette, stroke_volume, from, to) {
                warn!(%err, mount = %pipette.mount(), "transfer failed, dropping tip");
                if let Err(drop_err) = handler.drop_tip(pipette) {
                    warn!(err = %drop_err, "failed to drop tip");
                }
                return Err(err.into());
            }
            let source = &mut sources[transfer.source].tube;
            source.remaining_volume = (source.remaining_volume - stroke_volume).max(0.0);
            destinations[transfer.destination].tube.remaining_volume += stroke_volume;
        }
        sources[transfer.source].reactions -= transfer.reactions;
        destinations[transfer.destination].reactions -= transfer.reactions;
    }
    if let Some(pipette) = held {
        handler.drop_tip(pipette)?;
    }

    info!(
        transfers = transfers.len(),
        tips_used,
        sources = sources.len(),
        destinations = destinations.len(),
        "routed reactions between tubes"
    );
    Ok(RouteReport {
        transfers,
        tips_used,
    })
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::{ProptestConfig, any};
    use proptest::{prop_assume, proptest};

    use crate::error::HandlerError;
    use crate::handler::{DryRun, Step};
    use crate::tube::Tube;

    use super::*;

    fn allotments(tubes: &[(&'static str, f64, usize)]) -> Vec<Allotment<&'static str>> {
        tubes
            .iter()
            .map(|&(name, volume, reactions)| Allotment::new(Tube::new(name, volume), reactions))
            .collect()
    }

    fn p300_p1000() -> PipetteMounts {
        PipetteMounts::new([Pipette::p1000(Mount::Left), Pipette::p300(Mount::Right)])
    }

    // Records like `DryRun`, but every transfer after the first `transfers_left` fails
    struct Jamming {
        robot: DryRun<&'static str>,
        transfers_left: usize,
    }

    impl LiquidHandler<&'static str> for Jamming {
        fn pick_up_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError> {
            self.robot.pick_up_tip(pipette)
        }

        fn drop_tip(&mut self, pipette: &Pipette) -> Result<(), HandlerError> {
            self.robot.drop_tip(pipette)
        }

        fn transfer(
            &mut self,
            pipette: &Pipette,
            volume: f64,
            source: &&'static str,
            destination: &&'static str,
        ) -> Result<(), HandlerError> {
            if self.transfers_left == 0 {
                return Err(HandlerError::other("plunger jammed"));
            }
            self.transfers_left -= 1;
            self.robot.transfer(pipette, volume, source, destination)
        }

        fn distribute(
            &mut self,
            pipette: &Pipette,
            volume: f64,
            source: &&'static str,
            depth: f64,
            targets: &[&'static str],
        ) -> Result<(), HandlerError> {
            self.robot.distribute(pipette, volume, source, depth, targets)
        }
    }

    #[test]
    fn switches_pipettes_as_volumes_change() {
        let mut sources = allotments(&[("S1", 1000.0, 10), ("S2", 1000.0, 10)]);
        let mut destinations = allotments(&[("D1", 0.0, 6), ("D2", 0.0, 8)]);
        let mut robot = DryRun::new();

        let report = route(
            &mut robot,
            20.0,
            &mut sources,
            &mut destinations,
            &p300_p1000(),
        )
        .unwrap();
        assert_eq!(report.tips_used, 2);
        assert_eq!(robot.tips_used(Mount::Left), 1);
        assert_eq!(robot.tips_used(Mount::Right), 1);
        let transfer = |mount, volume, source, destination| Step::Transfer {
            mount,
            volume,
            source,
            destination,
        };
        assert_eq!(
            robot.steps(),
            [
                Step::PickUpTip { mount: Mount::Left },
                transfer(Mount::Left, 120.0, "S1", "D1"),
                Step::DropTip { mount: Mount::Left },
                Step::PickUpTip {
                    mount: Mount::Right
                },
                transfer(Mount::Right, 80.0, "S1", "D2"),
                transfer(Mount::Right, 80.0, "S2", "D2"),
                Step::DropTip {
                    mount: Mount::Right
                },
            ]
        );

        assert_eq!(sources[0].tube.remaining_volume, 800.0);
        assert_eq!(sources[1].tube.remaining_volume, 920.0);
        assert_eq!(sources[0].reactions, 0);
        assert_eq!(sources[1].reactions, 6);
        assert_eq!(destinations[0].tube.remaining_volume, 120.0);
        assert_eq!(destinations[1].tube.remaining_volume, 160.0);
        assert!(destinations.iter().all(|d| d.reactions == 0));
    }

    #[test]
    fn exhausted_sources_fail_before_moving() {
        let mut sources = allotments(&[("S1", 1000.0, 3), ("S2", 1000.0, 2)]);
        let mut destinations = allotments(&[("D1", 0.0, 4), ("D2", 0.0, 3), ("D3", 0.0, 1)]);
        let mut robot = DryRun::new();

        let err = route(
            &mut robot,
            20.0,
            &mut sources,
            &mut destinations,
            &p300_p1000(),
        )
        .unwrap_err();
        let Error::SourcesExhausted(err) = err else {
            panic!("expected exhausted sources");
        };
        assert_eq!(err.destination(), 1);
        assert_eq!(err.missing_reactions(), 3);
        assert!(robot.steps().is_empty());
        assert_eq!(sources[0].reactions, 3);
        assert_eq!(destinations[0].tube.remaining_volume, 0.0);
    }

    #[test]
    fn unsuitable_volume_fails_before_moving() {
        // The last transfer is a single 50 µL reaction, too little for a P1000
        let mounts = PipetteMounts::new([Pipette::p1000(Mount::Left)]);
        let mut sources = allotments(&[("S1", 1000.0, 3), ("S2", 1000.0, 3)]);
        let mut destinations = allotments(&[("D1", 0.0, 4)]);
        let mut robot = DryRun::new();

        let err = route(&mut robot, 50.0, &mut sources, &mut destinations, &mounts).unwrap_err();
        let Error::NoSuitablePipette(err) = err else {
            panic!("expected no suitable pipette");
        };
        assert_eq!(err.volume(), 50.0);
        assert!(robot.steps().is_empty());
    }

    #[test]
    fn short_source_tube_fails_before_moving() {
        let mut sources = allotments(&[("S1", 100.0, 10)]);
        let mut destinations = allotments(&[("D1", 0.0, 6)]);
        let mut robot = DryRun::new();

        let err = route(
            &mut robot,
            20.0,
            &mut sources,
            &mut destinations,
            &p300_p1000(),
        )
        .unwrap_err();
        let Error::InsufficientVolume(err) = err else {
            panic!("expected insufficient volume");
        };
        assert_eq!(err.required(), 120.0);
        assert_eq!(err.available(), 100.0);
        assert!(robot.steps().is_empty());
    }

    #[test]
    fn oversized_transfers_are_split() {
        let mounts = PipetteMounts::new([Pipette::p300(Mount::Right)]);
        let mut sources = allotments(&[("S1", 1000.0, 2)]);
        let mut destinations = allotments(&[("D1", 0.0, 2)]);
        let mut robot = DryRun::new();

        let report = route(&mut robot, 500.0, &mut sources, &mut destinations, &mounts).unwrap();
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].strokes, 4);
        let strokes: Vec<f64> = robot
            .steps()
            .iter()
            .filter_map(|step| match step {
                Step::Transfer { volume, .. } => Some(*volume),
                _ => None,
            })
            .collect();
        assert_eq!(strokes, [250.0; 4]);
        assert_eq!(destinations[0].tube.remaining_volume, 1000.0);
        assert_eq!(sources[0].tube.remaining_volume, 0.0);
    }

    #[test]
    fn strokes_never_go_below_the_pipette_minimum() {
        let narrow = Pipette::new(Mount::Left, 60.0, 100.0).unwrap();
        let mounts = PipetteMounts::new([narrow]);

        // 101 µL would need two strokes of 50.5 µL
        let err = plan_route(101.0, &[1], &[1], &mounts).unwrap_err();
        let Error::NoSuitablePipette(err) = err else {
            panic!("expected no suitable pipette");
        };
        assert_eq!(err.volume(), 101.0);

        let transfers = plan_route(90.0, &[2], &[2], &mounts).unwrap();
        assert_eq!(transfers[0].strokes, 2);
    }

    #[test]
    fn handler_failure_mid_transfer_drops_the_tip() {
        let mounts = PipetteMounts::new([Pipette::p300(Mount::Right)]);
        let mut sources = allotments(&[("S1", 1000.0, 2)]);
        let mut destinations = allotments(&[("D1", 0.0, 2)]);
        let mut robot = Jamming {
            robot: DryRun::new(),
            transfers_left: 2,
        };

        let err = route(&mut robot, 500.0, &mut sources, &mut destinations, &mounts).unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(err.to_string(), "liquid handler failed: plunger jammed");

        // Two of four 250 µL strokes ran
        assert_eq!(robot.robot.liquid_operations(), 2);
        assert_eq!(sources[0].tube.remaining_volume, 500.0);
        assert_eq!(destinations[0].tube.remaining_volume, 500.0);
        assert_eq!(sources[0].reactions, 2);
        assert_eq!(destinations[0].reactions, 2);
        assert_eq!(
            robot.robot.steps().last(),
            Some(&Step::DropTip {
                mount: Mount::Right
            })
        );
    }

    #[test]
    fn nothing_to_do() {
        let mut sources = allotments(&[("S1", 1000.0, 10)]);
        let mut destinations = allotments(&[("D1", 0.0, 0)]);
        let mut robot = DryRun::new();
        let report = route(
            &mut robot,
            20.0,
            &mut sources,
            &mut destinations,
            &p300_p1000(),
        )
        .unwrap();
        assert_eq!(report.tips_used, 0);
        assert!(report.transfers.is_empty());
        assert!(robot.steps().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. Default::default()
        })]

        #[test]
        fn destinations_get_exactly_what_they_need(
            per_reaction_volume in 1.0..200.0f64,
            supply in vec(0..30usize, 0..6),
            demand in vec(0..30usize, 0..6),
        ) {
            let mounts =
                PipetteMounts::new([Pipette::p20(Mount::Left), Pipette::p300(Mount::Right)]);
            let total_supply: usize = supply.iter().sum();
            let total_demand: usize = demand.iter().sum();
            let result = plan_route(per_reaction_volume, &supply, &demand, &mounts);
            if total_supply < total_demand {
                assert!(matches!(result, Err(Error::SourcesExhausted(_))));
                return Ok(());
            }
            let transfers = result.unwrap();

            let mut received = vec![0; demand.len()];
            let mut given = vec![0; supply.len()];
            let mut last = (0, 0);
            for t in &transfers {
                // Both cursors only ever move forward
                assert!((t.destination, t.source) >= last);
                last = (t.destination, t.source);
                assert!(t.reactions > 0);
                assert_eq!(t.volume, t.reactions as f64 * per_reaction_volume);
                received[t.destination] += t.reactions;
                given[t.source] += t.reactions;
            }
            assert_eq!(received, demand);
            assert!(given.iter().zip(&supply).all(|(g, s)| g <= s));
        }

        #[test]
        fn strokes_stay_within_the_pipette_range(
            pipette in any::<Pipette>(),
            per_reaction_volume in 1.0..500.0f64,
            reactions in 1..20usize,
        ) {
            let mounts = PipetteMounts::new([pipette]);
            let planned = plan_route(per_reaction_volume, &[reactions], &[reactions], &mounts);
            if let Ok(transfers) = planned {
                for t in &transfers {
                    let stroke = t.volume / t.strokes as f64;
                    assert!(stroke >= pipette.min_volume());
                    assert!(stroke <= pipette.max_volume() * (1.0 + 1e-12));
                }
            }
        }

        #[test]
        fn routing_conserves_volume(
            per_reaction_volume in 1.0..200.0f64,
            supply in vec(1..30usize, 1..6),
            share in 0.0..=1.0f64,
        ) {
            let total: usize = supply.iter().sum();
            let wanted = ((total as f64 * share) as usize).min(total);
            prop_assume!(wanted > 0);
            let mounts =
                PipetteMounts::new([Pipette::p20(Mount::Left), Pipette::p300(Mount::Right)]);
            let mut sources: Vec<_> = supply
                .iter()
                .enumerate()
                .map(|(i, &n)| Allotment::new(Tube::new(i, n as f64 * per_reaction_volume), n))
                .collect();
            let mut destinations = vec![
                Allotment::new(Tube::empty(100), wanted / 2),
                Allotment::new(Tube::empty(101), wanted - wanted / 2),
            ];
            let before: f64 = sources.iter().map(|s| s.tube.remaining_volume).sum();
            let mut robot = DryRun::new();
            route(
                &mut robot,
                per_reaction_volume,
                &mut sources,
                &mut destinations,
                &mounts,
            )
            .unwrap();

            let after: f64 = sources.iter().map(|s| s.tube.remaining_volume).sum();
            let delivered: f64 = destinations.iter().map(|d| d.tube.remaining_volume).sum();
            assert!((before - after - delivered).abs() < 1e-6);
            assert!((delivered - wanted as f64 * per_reaction_volume).abs() < 1e-6);
            assert!(destinations.iter().all(|d| d.reactions == 0));
            assert_eq!(sources.iter().map(|s| s.reactions).sum::<usize>(), total - wanted);
            assert_eq!(robot.steps().last().map(|s| matches!(s, Step::DropTip { .. })), Some(true));
        }
    }
}
