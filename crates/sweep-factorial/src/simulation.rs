//! Simulations and combinatorial expansion
//!
//! A [`Simulation`] is a named, ordered bundle of factors: one complete
//! experiment variant. [`SimulationGenerator`] expands a list of factor
//! generators into simulations:
//! - full factorial: cross product, first generator outermost (varies slowest)
//! - otherwise: generators zipped by position, which must all be the same length

use crate::error::{FactorialError, FactorialResult};
use crate::factor::{join_names, Factor, BASELINE};
use crate::generator::FactorGenerator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use sweep_document::ConfigDocument;

/// Named set of factors forming one run variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulation {
    pub name: String,
    pub factors: Vec<Factor>,
}

impl Simulation {
    /// Simulation named after its factors
    #[must_use]
    pub fn new(factors: Vec<Factor>) -> Self {
        Self {
            name: join_names(&factors),
            factors,
        }
    }

    /// Simulation with an explicit name
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>, factors: Vec<Factor>) -> Self {
        Self {
            name: name.into(),
            factors,
        }
    }

    /// The unmodified base configuration
    #[must_use]
    pub fn baseline() -> Self {
        Self::named(BASELINE, vec![Factor::Dummy])
    }

    /// Apply every factor, in order
    ///
    /// # Errors
    /// Returns the first document error encountered
    pub fn apply(&self, doc: &mut ConfigDocument) -> FactorialResult<()> {
        for factor in &self.factors {
            factor.apply(doc)?;
        }
        Ok(())
    }

    /// Write this variant's config file
    ///
    /// Loads the base config (imports flattened), applies the factors,
    /// restricts sub-components to `enabled` when that list is non-empty, and
    /// writes the result to `target`. The target directory must exist.
    ///
    /// # Errors
    /// Returns document errors from loading, editing or writing
    pub fn generate<S: AsRef<str>>(
        &self,
        base: &Path,
        target: &Path,
        enabled: &[S],
    ) -> FactorialResult<()> {
        let mut doc = ConfigDocument::load(base)?;
        self.apply(&mut doc)?;
        doc.restrict_sub_components(enabled)?;
        doc.write(target)?;
        tracing::debug!(
            simulation = %self.name,
            target = %target.display(),
            "generated simulation config"
        );
        Ok(())
    }
}

/// Expands factor generators into simulations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationGenerator {
    pub generators: Vec<FactorGenerator>,
    pub full_factorial: bool,
}

impl SimulationGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(generators: Vec<FactorGenerator>, full_factorial: bool) -> Self {
        Self {
            generators,
            full_factorial,
        }
    }

    /// Expand into simulations
    ///
    /// # Errors
    /// Returns [`FactorialError::Argument`] if there are no generators, a
    /// generator yields nothing or overflows, or (zip mode) generator
    /// lengths differ
    pub fn simulations(&self) -> FactorialResult<Vec<Simulation>> {
        if self.generators.is_empty() {
            return Err(FactorialError::argument("at least one factor generator is required"));
        }
        if let Some(empty) = self.generators.iter().find(|g| g.is_empty()) {
            return Err(FactorialError::argument(format!(
                "generator '{}' produces no values",
                empty.label()
            )));
        }
        self.generators.iter().try_for_each(FactorGenerator::validate)?;

        let levels: Vec<Vec<Factor>> = self.generators.iter().map(FactorGenerator::generate).collect();
        let combinations = if self.full_factorial {
            cross_product(&levels)
        } else {
            zip(&levels, &self.generators)?
        };

        tracing::debug!(
            generators = self.generators.len(),
            simulations = combinations.len(),
            full_factorial = self.full_factorial,
            "expanded simulations"
        );
        Ok(combinations.into_iter().map(Simulation::new).collect())
    }
}

/// Combine each new generator's levels with every partial combination so far
fn cross_product(levels: &[Vec<Factor>]) -> Vec<Vec<Factor>> {
    let mut combinations: Vec<Vec<Factor>> = vec![Vec::new()];
    for generator_levels in levels {
        combinations = combinations
            .iter()
            .flat_map(|partial| {
                generator_levels.iter().map(move |level| {
                    let mut next = partial.clone();
                    next.push(level.clone());
                    next
                })
            })
            .collect();
    }
    combinations
}

fn zip(levels: &[Vec<Factor>], generators: &[FactorGenerator]) -> FactorialResult<Vec<Vec<Factor>>> {
    let len = levels[0].len();
    if let Some(pos) = levels.iter().position(|l| l.len() != len) {
        return Err(FactorialError::argument(format!(
            "non-factorial generators must have equal lengths: '{}' has {} values, '{}' has {}",
            generators[0].label(),
            len,
            generators[pos].label(),
            levels[pos].len()
        )));
    }
    Ok((0..len)
        .map(|i| levels.iter().map(|l| l[i].clone()).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueGenerator;
    use pretty_assertions::assert_eq;

    fn discrete(name: &str, values: &[&str]) -> FactorGenerator {
        FactorGenerator::top_level(name, ValueGenerator::discrete(values.iter().copied()))
    }

    #[test]
    fn cross_product_first_generator_outermost() {
        let gen = SimulationGenerator::new(
            vec![discrete("a", &["1", "2"]), discrete("b", &["x", "y"]), discrete("c", &["p", "q"])],
            true,
        );
        let names: Vec<String> = gen.simulations().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "a-1_b-x_c-p",
                "a-1_b-x_c-q",
                "a-1_b-y_c-p",
                "a-1_b-y_c-q",
                "a-2_b-x_c-p",
                "a-2_b-x_c-q",
                "a-2_b-y_c-p",
                "a-2_b-y_c-q",
            ]
        );
    }

    #[test]
    fn cardinality_is_product_of_sizes() {
        let gen = SimulationGenerator::new(
            vec![
                FactorGenerator::top_level("a", ValueGenerator::range(0_i64, 1_i64, 3)),
                FactorGenerator::top_level("b", ValueGenerator::range(0.0_f64, 0.5_f64, 4)),
                discrete("c", &["u", "v"]),
            ],
            true,
        );
        assert_eq!(gen.simulations().unwrap().len(), 3 * 4 * 2);
    }

    #[test]
    fn single_generator_is_degree_one() {
        let gen = SimulationGenerator::new(vec![discrete("a", &["1", "2", "3"])], true);
        let sims = gen.simulations().unwrap();
        assert_eq!(sims.len(), 3);
        assert_eq!(sims[2].factors, vec![Factor::top_level("a", "3")]);
    }

    #[test]
    fn zip_pairs_by_position() {
        let gen = SimulationGenerator::new(
            vec![discrete("a", &["1", "2"]), discrete("b", &["x", "y"])],
            false,
        );
        let names: Vec<String> = gen.simulations().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a-1_b-x", "a-2_b-y"]);
    }

    #[test]
    fn zip_rejects_unequal_lengths() {
        let gen = SimulationGenerator::new(
            vec![discrete("a", &["1", "2"]), discrete("b", &["x"])],
            false,
        );
        assert!(matches!(gen.simulations(), Err(FactorialError::Argument(_))));
    }

    #[test]
    fn empty_generator_set_is_an_argument_error() {
        let gen = SimulationGenerator::new(Vec::new(), true);
        assert!(matches!(gen.simulations(), Err(FactorialError::Argument(_))));

        let gen = SimulationGenerator::new(vec![discrete("a", &[])], true);
        assert!(matches!(gen.simulations(), Err(FactorialError::Argument(_))));
    }

    #[test]
    fn overflowing_range_is_an_argument_error() {
        let gen = SimulationGenerator::new(
            vec![FactorGenerator::top_level("nyear", ValueGenerator::range(i64::MAX, 1_i64, 2))],
            true,
        );
        let err = gen.simulations().unwrap_err();
        assert!(matches!(&err, FactorialError::Argument(m) if m.starts_with("nyear:")));
    }

    #[test]
    fn baseline_is_dummy() {
        let base = Simulation::baseline();
        assert_eq!(base.name, "Baseline");
        assert_eq!(base.factors, vec![Factor::Dummy]);
    }
}
