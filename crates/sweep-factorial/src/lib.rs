//! Sweep Factorial - experiment designs over config parameters
//!
//! Layers, leaf first:
//! - [`ValueGenerator`]: discrete lists and numeric ranges
//! - [`FactorGenerator`]: a parameter locator plus values, yielding [`Factor`]s
//! - [`Factor`]: one change (top-level, block, composite, or the no-op baseline)
//! - [`SimulationGenerator`]: cross product or zip of generators into [`Simulation`]s
//!
//! # Example
//!
//! ```rust
//! use sweep_factorial::{FactorGenerator, SimulationGenerator, ValueGenerator};
//!
//! let generator = SimulationGenerator::new(
//!     vec![
//!         FactorGenerator::top_level("npatch", ValueGenerator::range(5_i64, 5_i64, 2)),
//!         FactorGenerator::block("pft", "TeBE", "sla", ValueGenerator::discrete([10.0, 12.5])),
//!     ],
//!     true,
//! );
//! let names: Vec<String> = generator.simulations()?.into_iter().map(|s| s.name).collect();
//! assert_eq!(names[0], "npatch-5_TeBE.sla-10");
//! assert_eq!(names.len(), 4);
//! # Ok::<(), sweep_factorial::FactorialError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod factor;
pub mod generator;
pub mod simulation;
pub mod value;

pub use error::{FactorialError, FactorialResult};
pub use factor::{join_names, short_value, Factor, BASELINE};
pub use generator::FactorGenerator;
pub use simulation::{Simulation, SimulationGenerator};
pub use value::{Number, NumericRange, Value, ValueGenerator, Values};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building experiment designs
    pub use crate::{
        Factor, FactorGenerator, FactorialError, FactorialResult, Simulation,
        SimulationGenerator, ValueGenerator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
