//! Per-kind interpolation of synthetic feature values

use crate::dataset::{FeatureKind, FeatureValue};
use crate::error::{FairBalanceError, Result};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// How a synthetic record is derived from its anchor and neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisStrategy {
    /// `max(0, a + r * (a - n))` with one gap `r` drawn per record
    Smote,
    /// `|a + f * (n1 - n2)|` over the anchor's two nearest neighbors
    Crossover,
}

impl Default for SynthesisStrategy {
    fn default() -> Self {
        Self::Crossover
    }
}

/// Crossover probability and interpolation factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolationParams {
    /// Probability of keeping a boolean and of perturbing a list element
    pub crossover_probability: f64,
    /// Scale applied to the neighbor difference
    pub factor: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            crossover_probability: 0.8,
            factor: 0.8,
        }
    }
}

/// State shared by every feature of one synthetic record
#[derive(Debug, Clone, Copy)]
pub struct Interpolation<'p> {
    pub strategy: SynthesisStrategy,
    pub params: &'p InterpolationParams,
    /// Gap drawn once per record for [`SynthesisStrategy::Smote`]
    pub gap: f64,
}

/// Produces one synthetic value from an anchor value and two neighbor values.
///
/// Under [`SynthesisStrategy::Smote`] only `first` is consulted.
pub trait FeatureInterpolator: Send + Sync {
    fn interpolate(
        &self,
        anchor: &FeatureValue,
        first: &FeatureValue,
        second: &FeatureValue,
        ctx: &Interpolation<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureValue>;
}

fn kind_mismatch(expected: FeatureKind, found: &FeatureValue) -> FairBalanceError {
    FairBalanceError::DataError(format!(
        "Cannot interpolate a {} feature from a {} value",
        expected,
        found.kind()
    ))
}

/// Continuous values
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericInterpolator;

impl FeatureInterpolator for NumericInterpolator {
    fn interpolate(
        &self,
        anchor: &FeatureValue,
        first: &FeatureValue,
        second: &FeatureValue,
        ctx: &Interpolation<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<FeatureValue> {
        let numeric = |v: &FeatureValue| match v {
            FeatureValue::Numeric(x) => Ok(*x),
            other => Err(kind_mismatch(FeatureKind::Numeric, other)),
        };
        let a = numeric(anchor)?;
        let b = numeric(first)?;

        let value = match ctx.strategy {
            SynthesisStrategy::Smote => (a + ctx.gap * (a - b)).max(0.0),
            SynthesisStrategy::Crossover => {
                let c = numeric(second)?;
                (a + ctx.params.factor * (b - c)).abs()
            }
        };
        Ok(FeatureValue::Numeric(value))
    }
}

/// Flags: kept with the crossover probability, negated otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanInterpolator;

impl FeatureInterpolator for BooleanInterpolator {
    fn interpolate(
        &self,
        anchor: &FeatureValue,
        _first: &FeatureValue,
        _second: &FeatureValue,
        ctx: &Interpolation<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureValue> {
        let value = match anchor {
            FeatureValue::Boolean(b) => *b,
            other => return Err(kind_mismatch(FeatureKind::Boolean, other)),
        };
        let flip = rng.gen::<f64>() >= ctx.params.crossover_probability;
        Ok(FeatureValue::Boolean(value ^ flip))
    }
}

/// Categories: chosen uniformly among the participating records
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalInterpolator;

impl FeatureInterpolator for CategoricalInterpolator {
    fn interpolate(
        &self,
        anchor: &FeatureValue,
        first: &FeatureValue,
        second: &FeatureValue,
        ctx: &Interpolation<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureValue> {
        let mut candidates = vec![anchor, first];
        if ctx.strategy == SynthesisStrategy::Crossover {
            candidates.push(second);
        }
        for candidate in &candidates {
            if candidate.kind() != FeatureKind::Categorical {
                return Err(kind_mismatch(FeatureKind::Categorical, candidate));
            }
        }
        let pick = rng.gen_range(0..candidates.len());
        Ok(candidates[pick].clone())
    }
}

/// Numeric lists, interpolated element by element over the anchor's length.
///
/// Neighbor elements past the end of a shorter list count as 0. Crossover
/// elements are truncated toward zero and, unlike scalar numeric values, are
/// not clamped, so they may come out negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListInterpolator;

impl FeatureInterpolator for ListInterpolator {
    fn interpolate(
        &self,
        anchor: &FeatureValue,
        first: &FeatureValue,
        second: &FeatureValue,
        ctx: &Interpolation<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureValue> {
        let list = |v: &FeatureValue| match v {
            FeatureValue::List(items) => Ok(items.clone()),
            other => Err(kind_mismatch(FeatureKind::List, other)),
        };
        let a = list(anchor)?;
        let b = list(first)?;
        let at = |items: &[f64], i: usize| items.get(i).copied().unwrap_or(0.0);

        let items = match ctx.strategy {
            SynthesisStrategy::Smote => a
                .iter()
                .enumerate()
                .map(|(i, &ai)| (ai + ctx.gap * (ai - at(&b, i))).max(0.0))
                .collect(),
            SynthesisStrategy::Crossover => {
                let c = list(second)?;
                a.iter()
                    .enumerate()
                    .map(|(i, &ai)| {
                        if rng.gen::<f64>() < ctx.params.crossover_probability {
                            (ai + ctx.params.factor * (at(&b, i) - at(&c, i))).trunc()
                        } else {
                            ai
                        }
                    })
                    .collect()
            }
        };
        Ok(FeatureValue::List(items))
    }
}

impl FeatureKind {
    /// Interpolator responsible for values of this kind
    pub fn interpolator(self) -> &'static dyn FeatureInterpolator {
        match self {
            FeatureKind::Numeric => &NumericInterpolator,
            FeatureKind::Boolean => &BooleanInterpolator,
            FeatureKind::Categorical => &CategoricalInterpolator,
            FeatureKind::List => &ListInterpolator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx(strategy: SynthesisStrategy, params: &InterpolationParams, gap: f64) -> Interpolation<'_> {
        Interpolation { strategy, params, gap }
    }

    #[test]
    fn test_crossover_numeric_is_absolute() {
        let params = InterpolationParams::default();
        let mut rng = StdRng::seed_from_u64(0);
        let v = NumericInterpolator
            .interpolate(
                &FeatureValue::Numeric(0.1),
                &FeatureValue::Numeric(0.0),
                &FeatureValue::Numeric(1.0),
                &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                &mut rng,
            )
            .unwrap();
        // |0.1 + 0.8 * (0 - 1)| = 0.7
        assert!((v.as_f64().unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_smote_numeric_is_clamped() {
        let params = InterpolationParams::default();
        let mut rng = StdRng::seed_from_u64(0);
        let v = NumericInterpolator
            .interpolate(
                &FeatureValue::Numeric(0.2),
                &FeatureValue::Numeric(1.0),
                &FeatureValue::Numeric(1.0),
                &ctx(SynthesisStrategy::Smote, &params, 0.9),
                &mut rng,
            )
            .unwrap();
        assert_eq!(v, FeatureValue::Numeric(0.0));
    }

    #[test]
    fn test_boolean_always_kept_with_certain_crossover() {
        let params = InterpolationParams {
            crossover_probability: 1.0,
            factor: 0.8,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let v = BooleanInterpolator
                .interpolate(
                    &FeatureValue::Boolean(true),
                    &FeatureValue::Boolean(false),
                    &FeatureValue::Boolean(false),
                    &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                    &mut rng,
                )
                .unwrap();
            assert_eq!(v, FeatureValue::Boolean(true));
        }
    }

    #[test]
    fn test_boolean_always_flipped_with_zero_crossover() {
        let params = InterpolationParams {
            crossover_probability: 0.0,
            factor: 0.8,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let v = BooleanInterpolator
            .interpolate(
                &FeatureValue::Boolean(true),
                &FeatureValue::Boolean(true),
                &FeatureValue::Boolean(true),
                &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                &mut rng,
            )
            .unwrap();
        assert_eq!(v, FeatureValue::Boolean(false));
    }

    #[test]
    fn test_categorical_picks_participant() {
        let params = InterpolationParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let options = ["fha", "va", "conventional"];
        for _ in 0..30 {
            let v = CategoricalInterpolator
                .interpolate(
                    &FeatureValue::Categorical(options[0].into()),
                    &FeatureValue::Categorical(options[1].into()),
                    &FeatureValue::Categorical(options[2].into()),
                    &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                    &mut rng,
                )
                .unwrap();
            match v {
                FeatureValue::Categorical(s) => assert!(options.contains(&s.as_str())),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn test_list_keeps_anchor_length() {
        let params = InterpolationParams {
            crossover_probability: 1.0,
            factor: 0.5,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let v = ListInterpolator
            .interpolate(
                &FeatureValue::List(vec![4.0, 2.0, 1.0]),
                &FeatureValue::List(vec![3.0]),
                &FeatureValue::List(vec![1.0, 1.0]),
                &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                &mut rng,
            )
            .unwrap();
        // 4 + 0.5*(3-1) = 5; 2 + 0.5*(0-1) = 1.5 -> 1; 1 + 0.5*(0-0) = 1
        assert_eq!(v, FeatureValue::List(vec![5.0, 1.0, 1.0]));
    }

    #[test]
    fn test_list_crossover_is_not_clamped() {
        let params = InterpolationParams {
            crossover_probability: 1.0,
            factor: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(4);
        let v = ListInterpolator
            .interpolate(
                &FeatureValue::List(vec![1.0, 2.0]),
                &FeatureValue::List(vec![0.0, 0.0]),
                &FeatureValue::List(vec![3.5, 1.0]),
                &ctx(SynthesisStrategy::Crossover, &params, 0.0),
                &mut rng,
            )
            .unwrap();
        // 1 + (0 - 3.5) = -2.5 -> -2; 2 + (0 - 1) = 1
        assert_eq!(v, FeatureValue::List(vec![-2.0, 1.0]));
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let params = InterpolationParams::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = NumericInterpolator.interpolate(
            &FeatureValue::Numeric(1.0),
            &FeatureValue::Boolean(true),
            &FeatureValue::Numeric(1.0),
            &ctx(SynthesisStrategy::Smote, &params, 0.5),
            &mut rng,
        );
        assert!(result.is_err());
    }
}
