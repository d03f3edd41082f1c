//! [`liquids`](crate) plans reagent tubes and pipetting for liquid-handling robots.
//!
//! Planning is pure: it decides how many tubes a run needs, which pipette moves a given
//! volume, and how deep to aspirate as a tube empties. Execution hands those decisions
//! to a [`LiquidHandler`], checking everything it can before the first motion.
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use liquids::{DryRun, Mount, ProtocolConfig, Tube, dispense};
//!
//! // 15 mL tubes, a P1000 on the left and a P300 on the right
//! let config = ProtocolConfig::default();
//!
//! // 100 reactions of 300 µL don't fit into one tube, so they're spread evenly
//! let plan = config.allocate(300.0, 100)?;
//! assert_eq!(plan.reactions_per_tube(), [34, 33, 33]);
//! assert_eq!(plan.volumes_per_tube(), [10_200.0, 9_900.0, 9_900.0]);
//!
//! // Fill the tubes, then dispense one reaction per well. `DryRun` records what a
//! // real robot would do.
//! let mut robot = DryRun::new();
//! let pipette = config.select(300.0)?;
//! assert_eq!(pipette.mount(), Mount::Left);
//! for (i, (reactions, volume)) in plan.iter().enumerate() {
//!     let mut tube = Tube::new(format!("reagent {i}"), volume);
//!     let wells: Vec<_> = (0..reactions).map(|w| format!("plate {i} well {w}")).collect();
//!     let left = dispense(&mut robot, pipette, &config.height_profile, &mut tube, 300.0, &wells)?;
//!     assert_eq!(left, 0.0);
//! }
//! assert_eq!(robot.tips_used(Mount::Left), 3);
//! # Ok(())
//! # }
//! ```
//!
//! Moving reactions between tubes is handled by [`route`], which switches pipettes as
//! transfer volumes change.
//!
//! # Logging
//!
//! Planning and execution emit [`tracing`] events: `debug` for every planned batch and
//! transfer, `info` for finished runs, and `warn` when a transfer has to be split into
//! several strokes. Nothing is printed unless the application installs a subscriber.
//!
//! # Features
//!
//! * **`serde`:** Enables (de)serializing [`ProtocolConfig`] and the types it's made of.
//!   Deserialization validates height profiles and pipette ranges.
//! * **`proptest`:** Enables `Arbitrary` for [`Mount`] and [`Pipette`], plus the
//!   strategies in the `proptest` module.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;

mod allocate;
mod config;
mod dispense;
mod height;
mod pipette;
mod route;
mod tube;

pub mod error;
pub mod handler;
#[cfg(any(feature = "proptest", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "proptest")))]
pub mod proptest;

pub use allocate::{TubeCapacity, TubePlan, allocate};
pub use config::ProtocolConfig;
pub use dispense::{Batch, dispense, plan_dispense};
pub use error::Error;
pub use handler::{DryRun, LiquidHandler, Step};
pub use height::{HeightBand, HeightProfile};
pub use pipette::{Mount, Pipette, PipetteMounts, select};
pub use route::{RouteReport, Transfer, plan_route, route};
pub use tube::{Allotment, Tube};
