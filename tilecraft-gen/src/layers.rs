//! Layer sampler
//!
//! Evaluates named layers at grid coordinates. One sampler is built per
//! generation run and owns every per-run cache: the shared noise field, lazily
//! derived per-layer offsets, and the in-progress set used to catch cycles.

use std::sync::Arc;

use ahash::AHashSet;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::predicate::EvalContext;
use crate::rng::{Rng, ValueNoise};
use crate::spec::{CombineOp, LayerDef, Operand};

pub const MAX_LAYERS: usize = 128;

/// Offsets are drawn from `[0, OFFSET_SPAN)` on both axes.
const OFFSET_SPAN: f64 = 10_000.0;

pub struct LayerSampler {
    seed: String,
    width: usize,
    height: usize,
    noise: ValueNoise,
    layers: Arc<IndexMap<String, LayerDef>>,
    offsets: Vec<Option<(f64, f64)>>,
    in_progress: AHashSet<(usize, u64, u64)>,
}

impl LayerSampler {
    /// Compile `layers` and check that every reference resolves and no
    /// reference chain loops back on itself.
    pub fn new(seed: &str, width: usize, height: usize, layers: &IndexMap<String, Value>) -> Result<Self> {
        if layers.len() > MAX_LAYERS {
            return Err(Error::LimitExceeded { what: "layers", count: layers.len(), max: MAX_LAYERS });
        }

        let layers = layers.iter()
            .map(|(name, def)| Ok((name.clone(), LayerDef::from_json(name, def)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        check_references(&layers)?;

        Ok(Self {
            seed: seed.to_string(),
            width,
            height,
            noise: ValueNoise::new(&mut Rng::new(seed)),
            offsets: vec![None; layers.len()],
            layers: Arc::new(layers),
            in_progress: AHashSet::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Sample `name` at `(x, y)`. Always in `[0, 1]`.
    pub fn sample(&mut self, name: &str, x: f64, y: f64) -> Result<f64> {
        let idx = self.layers
            .get_index_of(name)
            .ok_or_else(|| Error::UnknownLayer(name.to_string()))?;
        self.sample_index(idx, x, y)
    }

    fn sample_index(&mut self, idx: usize, x: f64, y: f64) -> Result<f64> {
        let key = (idx, x.to_bits(), y.to_bits());
        if !self.in_progress.insert(key) {
            let name = self.layers.get_index(idx).map(|(n, _)| n.as_str()).unwrap_or_default();
            return Err(Error::LayerCycle { key: format!("{}@{},{}", name, x, y) });
        }
        let value = self.evaluate(idx, x, y);
        self.in_progress.remove(&key);
        Ok(value?.clamp(0.0, 1.0))
    }

    fn evaluate(&mut self, idx: usize, x: f64, y: f64) -> Result<f64> {
        let layers = Arc::clone(&self.layers);
        let value = match &layers[idx] {
            LayerDef::Const(v) => *v,
            &LayerDef::Fbm { scale, octaves, persistence, .. } => {
                let (ox, oy) = self.offset(idx);
                self.noise.octaves((x + ox) * scale, (y + oy) * scale, octaves, persistence)
            }
            &LayerDef::ValueNoise { scale, .. } => {
                let (ox, oy) = self.offset(idx);
                self.noise.sample((x + ox) * scale, (y + oy) * scale)
            }
            &LayerDef::RadialGradient { center, radius, invert } => {
                let (cx, cy) = center.unwrap_or((self.width as f64 / 2.0, self.height as f64 / 2.0));
                let radius = radius
                    .unwrap_or(self.width.min(self.height) as f64 / 2.0)
                    .max(1e-6);
                let v = (1.0 - (x - cx).hypot(y - cy) / radius).clamp(0.0, 1.0);
                if invert { 1.0 - v } else { v }
            }
            LayerDef::Shape(shape) => match shape {
                Some(shape) if shape.contains(x, y) => 1.0,
                _ => 0.0,
            },
            LayerDef::Combine { op, a, b, t, edges } => {
                let a = self.operand(a, x, y)?;
                let b = self.operand(b, x, y)?;
                combine(*op, a, b, *t, *edges)
            }
        };
        Ok(value)
    }

    fn operand(&mut self, operand: &Operand, x: f64, y: f64) -> Result<f64> {
        match operand {
            Operand::Const(v) => Ok(*v),
            Operand::Ref(name) => self.sample(name, x, y),
        }
    }

    /// Stable per-layer offset from `seed|layer|<layer seed or name>`.
    fn offset(&mut self, idx: usize) -> (f64, f64) {
        if let Some(offset) = self.offsets[idx] {
            return offset;
        }
        let key = match self.layers.get_index(idx) {
            Some((name, def)) => def.seed().unwrap_or(name).to_string(),
            None => String::new(),
        };
        let mut rng = Rng::new(&format!("{}|layer|{}", self.seed, key));
        let offset = (rng.next_f64() * OFFSET_SPAN, rng.next_f64() * OFFSET_SPAN);
        self.offsets[idx] = Some(offset);
        offset
    }
}

impl EvalContext for LayerSampler {
    fn sample_layer(&mut self, name: &str, x: f64, y: f64) -> Result<f64> {
        self.sample(name, x, y)
    }

    fn seed(&self) -> &str {
        &self.seed
    }
}

fn combine(op: CombineOp, a: f64, b: f64, t: f64, (e0, e1): (f64, f64)) -> f64 {
    match op {
        CombineOp::Add => (a + b).clamp(0.0, 1.0),
        CombineOp::Sub => (a - b).clamp(0.0, 1.0),
        CombineOp::Mul => (a * b).clamp(0.0, 1.0),
        CombineOp::Min => a.min(b),
        CombineOp::Max => a.max(b),
        CombineOp::Lerp => a + (b - a) * t.clamp(0.0, 1.0),
        CombineOp::Threshold => if a >= t { 1.0 } else { 0.0 },
        CombineOp::Smoothstep => {
            if e1 == e0 {
                return if a >= e0 { 1.0 } else { 0.0 };
            }
            let s = ((a - e0) / (e1 - e0)).clamp(0.0, 1.0);
            s * s * (3.0 - 2.0 * s)
        }
    }
}

/// Depth-first walk over combine references.
fn check_references(layers: &IndexMap<String, LayerDef>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    fn visit(
        idx: usize,
        layers: &IndexMap<String, LayerDef>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = path.iter().position(|&p| p == idx).unwrap_or(0);
                let mut chain: Vec<&str> = path[start..]
                    .iter()
                    .filter_map(|&p| layers.get_index(p).map(|(n, _)| n.as_str()))
                    .collect();
                chain.extend(layers.get_index(idx).map(|(n, _)| n.as_str()));
                return Err(Error::LayerCycle { key: chain.join(" -> ") });
            }
            Mark::Unvisited => {}
        }

        marks[idx] = Mark::Active;
        path.push(idx);
        for name in layers[idx].references() {
            let next = layers
                .get_index_of(name)
                .ok_or_else(|| Error::UnknownLayer(name.to_string()))?;
            visit(next, layers, marks, path)?;
        }
        path.pop();
        marks[idx] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; layers.len()];
    let mut path = Vec::new();
    for idx in 0..layers.len() {
        visit(idx, layers, &mut marks, &mut path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sampler(layers: serde_json::Value) -> Result<LayerSampler> {
        let layers: IndexMap<String, Value> = serde_json::from_value(layers).unwrap();
        LayerSampler::new("layers-test", 64, 64, &layers)
    }

    #[test]
    fn test_threshold_combine() {
        let mut s = sampler(json!({
            "hi": {"type": "combine", "op": "threshold", "a": {"const": 0.6}, "b": {"const": 0}, "t": 0.5},
            "lo": {"type": "combine", "op": "threshold", "a": {"const": 0.4}, "b": {"const": 0}, "t": 0.5}
        })).unwrap();
        for (x, y) in [(0.0, 0.0), (13.0, 40.0), (63.0, 2.0)] {
            assert_eq!(s.sample("hi", x, y).unwrap(), 1.0);
            assert_eq!(s.sample("lo", x, y).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_combine_ops() {
        let mut s = sampler(json!({
            "a": {"type": "const", "value": 0.8},
            "sum": {"type": "combine", "op": "add", "a": {"ref": "a"}, "b": 0.5},
            "diff": {"type": "combine", "op": "sub", "a": 0.2, "b": {"ref": "a"}},
            "prod": {"type": "combine", "op": "mul", "a": {"ref": "a"}, "b": 0.5},
            "low": {"type": "combine", "op": "min", "a": {"ref": "a"}, "b": 0.3},
            "high": {"type": "combine", "op": "max", "a": {"ref": "a"}, "b": 0.3},
            "mix": {"type": "combine", "op": "lerp", "a": 0.0, "b": {"ref": "a"}, "t": 0.25},
            "smooth": {"type": "combine", "op": "smoothstep", "a": 0.5, "edges": [0.4, 0.6]}
        })).unwrap();
        let at = |s: &mut LayerSampler, n: &str| s.sample(n, 1.0, 1.0).unwrap();
        assert_eq!(at(&mut s, "sum"), 1.0);
        assert_eq!(at(&mut s, "diff"), 0.0);
        assert!((at(&mut s, "prod") - 0.4).abs() < 1e-12);
        assert_eq!(at(&mut s, "low"), 0.3);
        assert_eq!(at(&mut s, "high"), 0.8);
        assert!((at(&mut s, "mix") - 0.2).abs() < 1e-12);
        assert!((at(&mut s, "smooth") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_const_clamped() {
        let mut s = sampler(json!({"c": {"type": "const", "value": 4.0}})).unwrap();
        assert_eq!(s.sample("c", 0.0, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_radial_gradient() {
        let mut s = sampler(json!({
            "r": {"type": "radialGradient", "center": [10, 10], "radius": 10},
            "inv": {"type": "radialGradient", "center": [10, 10], "radius": 10, "invert": true},
            "default": {"type": "radialGradient"}
        })).unwrap();
        assert_eq!(s.sample("r", 10.0, 10.0).unwrap(), 1.0);
        assert!((s.sample("r", 15.0, 10.0).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(s.sample("r", 40.0, 10.0).unwrap(), 0.0);
        assert_eq!(s.sample("inv", 40.0, 10.0).unwrap(), 1.0);
        assert_eq!(s.sample("default", 32.0, 32.0).unwrap(), 1.0);
        assert_eq!(s.sample("default", 0.0, 32.0).unwrap(), 0.0);
    }

    #[test]
    fn test_shape_layer() {
        let mut s = sampler(json!({
            "lake": {"type": "shape", "shape": {"type": "circle", "cx": 5, "cy": 5, "r": 2}},
            "broken": {"type": "shape", "shape": {"type": "circle"}}
        })).unwrap();
        assert_eq!(s.sample("lake", 5.0, 6.0).unwrap(), 1.0);
        assert_eq!(s.sample("lake", 9.0, 9.0).unwrap(), 0.0);
        assert_eq!(s.sample("broken", 5.0, 5.0).unwrap(), 0.0);
    }

    #[test]
    fn test_noise_layers_deterministic_and_distinct() {
        let spec = json!({
            "a": {"type": "fbm", "scale": 0.1, "octaves": 4, "persistence": 0.5},
            "b": {"type": "fbm", "scale": 0.1, "octaves": 4, "persistence": 0.5},
            "v": {"type": "valueNoise", "scale": 0.2, "seed": "v"}
        });
        let mut s1 = sampler(spec.clone()).unwrap();
        let mut s2 = sampler(spec).unwrap();

        let mut differs = false;
        for i in 0..64 {
            let (x, y) = (i as f64, (i * 7 % 64) as f64);
            let a1 = s1.sample("a", x, y).unwrap();
            assert_eq!(a1, s2.sample("a", x, y).unwrap());
            assert!((0.0..=1.0).contains(&a1));
            let v = s1.sample("v", x, y).unwrap();
            assert!((0.0..=1.0).contains(&v));
            differs |= a1 != s1.sample("b", x, y).unwrap();
        }
        // Same parameters, different names => different fields
        assert!(differs);
    }

    #[test]
    fn test_different_seed_changes_noise() {
        let layers: IndexMap<String, Value> = serde_json::from_value(json!({
            "n": {"type": "valueNoise", "scale": 0.13}
        })).unwrap();
        let mut a = LayerSampler::new("one", 32, 32, &layers).unwrap();
        let mut b = LayerSampler::new("two", 32, 32, &layers).unwrap();
        let same = (0..32)
            .filter(|&i| a.sample("n", i as f64, 3.0).unwrap() == b.sample("n", i as f64, 3.0).unwrap())
            .count();
        assert!(same < 32);
    }

    #[test]
    fn test_self_reference_cycle() {
        let err = sampler(json!({
            "loop": {"type": "combine", "op": "add", "a": {"ref": "loop"}, "b": 0.1}
        })).err().unwrap();
        assert!(matches!(err, Error::LayerCycle { key } if key == "loop -> loop"));
    }

    #[test]
    fn test_transitive_cycle() {
        let err = sampler(json!({
            "ok": {"type": "const", "value": 0.5},
            "a": {"type": "combine", "op": "add", "a": {"ref": "b"}, "b": {"ref": "ok"}},
            "b": {"type": "combine", "op": "mul", "a": {"ref": "c"}, "b": 1},
            "c": {"type": "combine", "op": "max", "a": {"ref": "ok"}, "b": {"ref": "a"}}
        })).err().unwrap();
        assert!(matches!(err, Error::LayerCycle { key } if key == "a -> b -> c -> a"));
    }

    #[test]
    fn test_runtime_guard_catches_reentry() {
        let mut s = sampler(json!({"c": {"type": "const", "value": 0.5}})).unwrap();
        s.in_progress.insert((0, 1.0f64.to_bits(), 2.0f64.to_bits()));
        let err = s.sample("c", 1.0, 2.0).unwrap_err();
        assert!(matches!(err, Error::LayerCycle { key } if key == "c@1,2"));
        // Other coordinates are unaffected
        assert_eq!(s.sample("c", 2.0, 2.0).unwrap(), 0.5);
    }

    #[test]
    fn test_unknown_references() {
        let err = sampler(json!({
            "a": {"type": "combine", "op": "add", "a": {"ref": "ghost"}}
        })).err().unwrap();
        assert!(matches!(err, Error::UnknownLayer(name) if name == "ghost"));

        let mut s = sampler(json!({})).unwrap();
        assert!(matches!(s.sample("nope", 0.0, 0.0), Err(Error::UnknownLayer(_))));
    }

    #[test]
    fn test_layer_limit() {
        let layers: IndexMap<String, Value> = (0..=MAX_LAYERS)
            .map(|i| (format!("l{}", i), json!({"type": "const", "value": 0.1})))
            .collect();
        let err = LayerSampler::new("s", 8, 8, &layers).err().unwrap();
        assert!(matches!(err, Error::LimitExceeded { what: "layers", count: 129, max: 128 }));
    }
}
