use crate::allocate::{TubeCapacity, TubePlan, allocate};
use crate::error::{CapacityError, NoSuitablePipetteError};
use crate::height::HeightProfile;
use crate::pipette::{Mount, Pipette, PipetteMounts};

/// Per-run labware and pipette settings shared by every step of a protocol.
///
/// # Features
///
/// * **`serde`:** When enabled, [`ProtocolConfig`] is (de)serializable. Missing fields
///   fall back to their [`Default`] values, and invalid height profiles or pipette
///   ranges are rejected while deserializing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProtocolConfig {
    /// Rated volume (µL) of the reagent tubes
    pub tube_rated_volume: f64,
    /// Aspiration depths of the reagent tubes
    pub height_profile: HeightProfile,
    /// Attached pipettes
    pub pipettes: PipetteMounts,
}

impl Default for ProtocolConfig {
    /// 15 mL conical reagent tubes, a P1000 on the left and a P300 on the right.
    fn default() -> Self {
        Self {
            tube_rated_volume: 15_000.0,
            height_profile: HeightProfile::falcon_15ml(),
            pipettes: PipetteMounts::new([
                Pipette::p1000(Mount::Left),
                Pipette::p300(Mount::Right),
            ]),
        }
    }
}

impl ProtocolConfig {
    /// Working capacity of one reagent tube.
    #[must_use]
    pub fn capacity(&self) -> TubeCapacity {
        TubeCapacity::from_rated_volume(self.tube_rated_volume)
    }

    /// [`allocate`] reagent tubes with this configuration's capacity.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if a single reaction doesn't fit into one tube.
    ///
    /// # Panics
    ///
    /// Panics if `per_reaction_volume` or the tube capacity isn't a finite, positive number.
    #[track_caller]
    pub fn allocate(
        &self,
        per_reaction_volume: f64,
        total_reactions: usize,
    ) -> Result<TubePlan, CapacityError> {
        allocate(per_reaction_volume, total_reactions, self.capacity())
    }

    /// Pick the attached pipette for `volume` µL.
    ///
    /// # Errors
    ///
    /// Returns [`NoSuitablePipetteError`] if no attached pipette qualifies.
    pub fn select(&self, volume: f64) -> Result<&Pipette, NoSuitablePipetteError> {
        self.pipettes.select(volume)
    }
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let json = r#"{
            "pipettes": {
                "left": null,
                "right": {"mount": "right", "min_volume": 1.0, "max_volume": 20.0}
            }
        }"#;
        let config: ProtocolConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipettes.right, Some(Pipette::p20(Mount::Right)));
        assert_eq!(config.pipettes.left, None);
        assert_eq!(config.height_profile, HeightProfile::falcon_15ml());
        assert_eq!(config.capacity(), TubeCapacity::FALCON_15ML);
    }

    #[test]
    fn roundtrip() {
        let config = ProtocolConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ProtocolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn invalid_geometry() {
        let json = r#"{
            "height_profile": {
                "bands": [{"max_volume": 500.0, "depth": 10.0}],
                "overflow_depth": 5.0
            }
        }"#;
        let err = serde_json::from_str::<ProtocolConfig>(json).unwrap_err();
        assert!(
            err.to_string()
                .contains("invalid height profile: depths must not decrease with volume")
        );

        let json = r#"{
            "pipettes": {"left": {"mount": "left", "min_volume": 300.0, "max_volume": 20.0}}
        }"#;
        let err = serde_json::from_str::<ProtocolConfig>(json).unwrap_err();
        assert!(err.to_string().contains("invalid pipette"));
    }
}
