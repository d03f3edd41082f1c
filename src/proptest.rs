//! Helpers for working with [`proptest`]

use proptest::arbitrary::{Arbitrary, any};
use proptest::sample::Select;
use proptest::strategy::{SBoxedStrategy, Strategy};

use crate::{HeightBand, HeightProfile, Mount, Pipette, TubeCapacity};

impl Arbitrary for Mount {
    type Parameters = ();
    type Strategy = Select<Mount>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        proptest::sample::select(&Mount::ALL)
    }
}

impl Arbitrary for Pipette {
    type Parameters = ();
    type Strategy = SBoxedStrategy<Pipette>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<Mount>(), 0.5..200.0f64, 1.0..20.0f64)
            .prop_map(|(mount, min_volume, range)| {
                Pipette::new(mount, min_volume, min_volume * range)
                    .expect("BUG: generated an invalid pipette")
            })
            .sboxed()
    }
}

/// Helper for generating `(per_reaction_volume, total_reactions, tube_capacity)` where a
/// single reaction always fits into one tube
pub fn any_reaction_batch() -> impl Strategy<Value = (f64, usize, TubeCapacity)> {
    (100.0..20_000.0f64, 0.0001..1.0f64, 0..500usize).prop_map(
        |(capacity, fraction, total_reactions)| {
            (capacity * fraction, total_reactions, TubeCapacity::new(capacity))
        },
    )
}

/// Helper for generating valid [`HeightProfile`]s with up to five bands
pub fn any_height_profile() -> impl Strategy<Value = HeightProfile> {
    (
        proptest::collection::vec((1.0..5_000.0f64, 0.0..30.0f64), 0..6),
        0.0..30.0f64,
    )
        .prop_map(|(steps, overflow_step)| {
            let mut max_volume = 0.0;
            let mut depth = 0.0;
            let bands = steps
                .into_iter()
                .map(|(volume_step, depth_step)| {
                    max_volume += volume_step;
                    depth += depth_step;
                    HeightBand { max_volume, depth }
                })
                .collect();
            HeightProfile::new(bands, depth + overflow_step)
                .expect("BUG: generated an invalid height profile")
        })
}
