//! Per-cell predicate evaluation

use crate::error::Result;
use crate::rng::hash_unit;
use crate::spec::Predicate;

/// What a predicate can see while being evaluated.
pub trait EvalContext {
    /// Sampled layer value in `[0, 1]`.
    fn sample_layer(&mut self, name: &str, x: f64, y: f64) -> Result<f64>;

    /// Reference seed of the run.
    fn seed(&self) -> &str;
}

impl Predicate {
    /// Malformed predicates are `false`; only layer errors propagate.
    pub fn eval<C: EvalContext + ?Sized>(&self, x: f64, y: f64, ctx: &mut C) -> Result<bool> {
        Ok(match self {
            Predicate::Always => true,
            Predicate::Never => false,
            Predicate::All(preds) => {
                for p in preds {
                    if !p.eval(x, y, ctx)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Any(preds) => {
                for p in preds {
                    if p.eval(x, y, ctx)? {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::Not(inner) => !inner.eval(x, y, ctx)?,
            Predicate::LayerGt { layer, threshold } => ctx.sample_layer(layer, x, y)? > *threshold,
            Predicate::LayerLt { layer, threshold } => ctx.sample_layer(layer, x, y)? < *threshold,
            Predicate::LayerBetween { layer, lo, hi } => {
                let v = ctx.sample_layer(layer, x, y)?;
                v >= *lo && v <= *hi
            }
            Predicate::Shape(shape) => shape.contains(x, y),
            Predicate::Chance { chance, seed } => {
                let key = format!("{}|chance|{}|{},{}", ctx.seed(), seed, x, y);
                hash_unit(&key) < chance.clamp(0.0, 1.0)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    /// Layer "ramp" is x / 10; everything else is unknown.
    struct Ramp {
        seed: String,
        samples: usize,
    }

    impl EvalContext for Ramp {
        fn sample_layer(&mut self, name: &str, x: f64, _y: f64) -> Result<f64> {
            self.samples += 1;
            match name {
                "ramp" => Ok((x / 10.0).clamp(0.0, 1.0)),
                _ => Err(Error::UnknownLayer(name.to_string())),
            }
        }

        fn seed(&self) -> &str {
            &self.seed
        }
    }

    fn ctx() -> Ramp {
        Ramp { seed: "pred".to_string(), samples: 0 }
    }

    fn pred(v: serde_json::Value) -> Predicate {
        Predicate::from_json(Some(&v))
    }

    #[test]
    fn test_layer_thresholds() {
        let mut c = ctx();
        let gt = pred(json!({"layerGt": ["ramp", 0.5]}));
        assert!(!gt.eval(5.0, 0.0, &mut c).unwrap());
        assert!(gt.eval(6.0, 0.0, &mut c).unwrap());

        let lt = pred(json!({"layerLt": ["ramp", 0.5]}));
        assert!(lt.eval(4.0, 0.0, &mut c).unwrap());
        assert!(!lt.eval(5.0, 0.0, &mut c).unwrap());

        let between = pred(json!({"layerBetween": ["ramp", 0.2, 0.4]}));
        assert!(between.eval(2.0, 0.0, &mut c).unwrap());
        assert!(between.eval(4.0, 0.0, &mut c).unwrap());
        assert!(!between.eval(5.0, 0.0, &mut c).unwrap());
    }

    #[test]
    fn test_composition() {
        let mut c = ctx();
        let p = pred(json!({"all": [
            {"layerGt": ["ramp", 0.2]},
            {"not": {"shape": {"type": "rect", "x": 5, "y": 0, "w": 2, "h": 1}}}
        ]}));
        assert!(p.eval(3.0, 0.0, &mut c).unwrap());
        assert!(!p.eval(5.0, 0.0, &mut c).unwrap());
        assert!(!p.eval(1.0, 0.0, &mut c).unwrap());

        let any = pred(json!({"any": [{"bogus": 1}, {"layerLt": ["ramp", 0.3]}]}));
        assert!(any.eval(1.0, 0.0, &mut c).unwrap());
        assert!(!any.eval(8.0, 0.0, &mut c).unwrap());

        assert!(pred(json!({"all": []})).eval(0.0, 0.0, &mut c).unwrap());
        assert!(!pred(json!({"any": []})).eval(0.0, 0.0, &mut c).unwrap());
    }

    #[test]
    fn test_short_circuit() {
        let mut c = ctx();
        let p = pred(json!({"all": [{"layerGt": ["ramp", 0.9]}, {"layerGt": ["ramp", 0.1]}]}));
        assert!(!p.eval(1.0, 0.0, &mut c).unwrap());
        assert_eq!(c.samples, 1);
    }

    #[test]
    fn test_malformed_is_false() {
        let mut c = ctx();
        for bad in [json!({"layerGt": "ramp"}), json!({"not": 5}), json!({"all": {}})] {
            assert!(!pred(bad).eval(3.0, 3.0, &mut c).unwrap());
        }
        assert!(Predicate::from_json(None).eval(3.0, 3.0, &mut c).unwrap());
    }

    #[test]
    fn test_unknown_layer_is_fatal() {
        let mut c = ctx();
        let err = pred(json!({"layerGt": ["missing", 0.5]})).eval(0.0, 0.0, &mut c).unwrap_err();
        assert!(matches!(err, Error::UnknownLayer(name) if name == "missing"));
    }

    #[test]
    fn test_chance_is_per_cell_and_reproducible() {
        let mut c = ctx();
        let p = pred(json!({"chance": 0.5, "seed": "trees"}));
        let first: Vec<bool> = (0..200).map(|i| p.eval(i as f64, 7.0, &mut c).unwrap()).collect();
        // Reverse order gives the same answers
        let second: Vec<bool> = (0..200).rev().map(|i| p.eval(i as f64, 7.0, &mut c).unwrap()).collect();
        assert!(first.iter().eq(second.iter().rev()));

        let hits = first.iter().filter(|&&b| b).count();
        assert!(hits > 50 && hits < 150, "hits = {}", hits);

        let never = pred(json!({"chance": 0}));
        let always = pred(json!({"chance": 3}));
        for i in 0..50 {
            assert!(!never.eval(i as f64, 0.0, &mut c).unwrap());
            assert!(always.eval(i as f64, 0.0, &mut c).unwrap());
        }
    }
}
