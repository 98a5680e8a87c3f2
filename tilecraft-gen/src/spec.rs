//! World spec document model
//!
//! The input arrives as loosely typed JSON. Tile lists, layers and ops are kept
//! as raw values on [`WorldSpec`] and compiled into the closed enums below
//! (`LayerDef`, `Shape`, `Predicate`) before anything is evaluated.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The full input document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSpec {
    #[serde(default)]
    pub world: WorldDims,
    #[serde(default)]
    pub tiles: TileDocs,
    #[serde(default)]
    pub layers: IndexMap<String, Value>,
    #[serde(default)]
    pub ops: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDims {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_cell_size", alias = "metersPerCell")]
    pub cell_size: f64,
}

fn default_cell_size() -> f64 {
    1.0
}

impl Default for WorldDims {
    fn default() -> Self {
        Self { width: 64, height: 64, cell_size: default_cell_size() }
    }
}

/// Unvalidated tile lists, exactly as written in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileDocs {
    #[serde(default)]
    pub background: Value,
    #[serde(default)]
    pub foreground: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTile {
    pub id: String,
    pub name: String,
    pub color: String,
    pub walkable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForegroundTile {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub color: String,
    pub walkable: bool,
}

/// Validated tile palette, as echoed in the output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileSet {
    pub background: Vec<BackgroundTile>,
    pub foreground: Vec<ForegroundTile>,
}

/// `[backgroundId, foregroundId | null]`
pub type Cell = (String, Option<String>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Vec<Cell>>,
}

/// The generated world, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldOutput {
    pub tiles: TileSet,
    pub area: Area,
}

impl WorldOutput {
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.area.cells.get(y).and_then(|row| row.get(x))
    }
}

// ============================================================================
// Shapes
// ============================================================================

pub type Point = (f64, f64);

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { x: f64, y: f64, w: f64, h: f64 },
    RoundRect { x: f64, y: f64, w: f64, h: f64, r: f64 },
    Circle { cx: f64, cy: f64, r: f64 },
    Polygon { points: Vec<Point> },
    Line { a: Point, b: Point, thickness: f64 },
}

impl Shape {
    /// `None` when the value is not a recognizable shape.
    pub fn from_json(v: &Value) -> Option<Shape> {
        let kind = v.get("type")?.as_str()?;
        let shape = match kind {
            "rect" => Shape::Rect {
                x: num(v, "x")?,
                y: num(v, "y")?,
                w: num(v, "w")?,
                h: num(v, "h")?,
            },
            "roundRect" => Shape::RoundRect {
                x: num(v, "x")?,
                y: num(v, "y")?,
                w: num(v, "w")?,
                h: num(v, "h")?,
                r: num(v, "r").unwrap_or(0.0),
            },
            "circle" => Shape::Circle {
                cx: num(v, "cx")?,
                cy: num(v, "cy")?,
                r: num(v, "r")?,
            },
            "polygon" => Shape::Polygon {
                points: v.get("points")?
                    .as_array()?
                    .iter()
                    .map(point)
                    .collect::<Option<Vec<_>>>()?,
            },
            "line" => Shape::Line {
                a: point(v.get("a")?)?,
                b: point(v.get("b")?)?,
                thickness: num(v, "thickness").unwrap_or(1.0),
            },
            _ => return None,
        };
        Some(shape)
    }
}

// ============================================================================
// Layers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    Add,
    Sub,
    Mul,
    Min,
    Max,
    Lerp,
    Threshold,
    Smoothstep,
}

impl CombineOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "add" => Self::Add,
            "sub" => Self::Sub,
            "mul" => Self::Mul,
            "min" => Self::Min,
            "max" => Self::Max,
            "lerp" => Self::Lerp,
            "threshold" => Self::Threshold,
            "smoothstep" => Self::Smoothstep,
            _ => return None,
        })
    }
}

/// A combine operand: literal or reference to another layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(f64),
    Ref(String),
}

impl Operand {
    fn from_json(v: &Value) -> Option<Self> {
        if let Some(n) = v.as_f64() {
            return Some(Operand::Const(n));
        }
        if let Some(n) = v.get("const").and_then(Value::as_f64) {
            return Some(Operand::Const(n));
        }
        v.get("ref").and_then(Value::as_str).map(|s| Operand::Ref(s.to_string()))
    }
}

pub const SCALE_RANGE: (f64, f64) = (1e-6, 1.0);
pub const OCTAVE_RANGE: (u32, u32) = (1, 8);
pub const PERSISTENCE_RANGE: (f64, f64) = (0.05, 0.95);

#[derive(Debug, Clone, PartialEq)]
pub enum LayerDef {
    Const(f64),
    Fbm { scale: f64, octaves: u32, persistence: f64, seed: Option<String> },
    ValueNoise { scale: f64, seed: Option<String> },
    /// Center and radius default to the grid when absent.
    RadialGradient { center: Option<Point>, radius: Option<f64>, invert: bool },
    /// A malformed shape samples as empty.
    Shape(Option<Shape>),
    Combine { op: CombineOp, a: Operand, b: Operand, t: f64, edges: (f64, f64) },
}

impl LayerDef {
    pub fn from_json(name: &str, v: &Value) -> Result<Self> {
        let kind = v.get("type").and_then(Value::as_str).unwrap_or_default();
        let layer = match kind {
            "const" => LayerDef::Const(num(v, "value").unwrap_or(0.0).clamp(0.0, 1.0)),
            "fbm" => LayerDef::Fbm {
                scale: clamp_scale(num(v, "scale")),
                octaves: num(v, "octaves")
                    .map(|o| o.round().clamp(OCTAVE_RANGE.0 as f64, OCTAVE_RANGE.1 as f64) as u32)
                    .unwrap_or(4),
                persistence: num(v, "persistence")
                    .unwrap_or(0.5)
                    .clamp(PERSISTENCE_RANGE.0, PERSISTENCE_RANGE.1),
                seed: sub_seed(v),
            },
            "valueNoise" => LayerDef::ValueNoise {
                scale: clamp_scale(num(v, "scale")),
                seed: sub_seed(v),
            },
            "radialGradient" => LayerDef::RadialGradient {
                center: v.get("center").and_then(point),
                radius: num(v, "radius"),
                invert: v.get("invert").and_then(Value::as_bool).unwrap_or(false),
            },
            "shape" => LayerDef::Shape(v.get("shape").and_then(Shape::from_json)),
            "combine" => {
                let op_name = v.get("op").and_then(Value::as_str).unwrap_or_default();
                let op = CombineOp::parse(op_name).ok_or_else(|| Error::UnsupportedCombineOp {
                    layer: name.to_string(),
                    op: op_name.to_string(),
                })?;
                let operand = |key: &str| {
                    let parsed = match v.get(key) {
                        None | Some(Value::Null) => Some(Operand::Const(0.0)),
                        Some(o) => Operand::from_json(o),
                    };
                    parsed.ok_or_else(|| Error::SpecValidation(format!(
                        "layer {}: operand {} must be a number, {{\"const\": n}} or {{\"ref\": name}}",
                        name, key
                    )))
                };
                let edges = v.get("edges")
                    .and_then(point)
                    .unwrap_or((0.4, 0.6));
                LayerDef::Combine {
                    op,
                    a: operand("a")?,
                    b: operand("b")?,
                    t: num(v, "t").unwrap_or(0.5),
                    edges,
                }
            }
            other => {
                return Err(Error::UnsupportedLayerType {
                    layer: name.to_string(),
                    kind: other.to_string(),
                })
            }
        };
        Ok(layer)
    }

    /// Layer names this layer reads from.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        let operands = match self {
            LayerDef::Combine { a, b, .. } => [Some(a), Some(b)],
            _ => [None, None],
        };
        operands.into_iter().flatten().filter_map(|o| match o {
            Operand::Ref(name) => Some(name.as_str()),
            Operand::Const(_) => None,
        })
    }

    pub fn seed(&self) -> Option<&str> {
        match self {
            LayerDef::Fbm { seed, .. } | LayerDef::ValueNoise { seed, .. } => seed.as_deref(),
            _ => None,
        }
    }
}

fn clamp_scale(scale: Option<f64>) -> f64 {
    scale.unwrap_or(0.05).clamp(SCALE_RANGE.0, SCALE_RANGE.1)
}

// ============================================================================
// Predicates
// ============================================================================

/// Per-cell condition gating an op.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// No predicate given.
    Always,
    /// Malformed or unrecognized predicate. Fails closed.
    Never,
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    LayerGt { layer: String, threshold: f64 },
    LayerLt { layer: String, threshold: f64 },
    LayerBetween { layer: String, lo: f64, hi: f64 },
    Shape(Shape),
    Chance { chance: f64, seed: String },
}

impl Predicate {
    pub fn from_json(v: Option<&Value>) -> Self {
        match v {
            None | Some(Value::Null) => Predicate::Always,
            Some(v) => Self::parse(v).unwrap_or(Predicate::Never),
        }
    }

    fn parse(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;

        if let Some(list) = obj.get("all") {
            return Some(Predicate::All(Self::parse_list(list)?));
        }
        if let Some(list) = obj.get("any") {
            return Some(Predicate::Any(Self::parse_list(list)?));
        }
        if let Some(inner) = obj.get("not") {
            // not(<malformed>) must not turn into "always"
            return match Self::from_json(Some(inner)) {
                Predicate::Never => None,
                p => Some(Predicate::Not(Box::new(p))),
            };
        }
        if let Some(args) = obj.get("layerGt") {
            let (layer, threshold) = layer_args::<1>(args)?;
            return Some(Predicate::LayerGt { layer, threshold: threshold[0] });
        }
        if let Some(args) = obj.get("layerLt") {
            let (layer, threshold) = layer_args::<1>(args)?;
            return Some(Predicate::LayerLt { layer, threshold: threshold[0] });
        }
        if let Some(args) = obj.get("layerBetween") {
            let (layer, [lo, hi]) = layer_args::<2>(args)?;
            return Some(Predicate::LayerBetween { layer, lo, hi });
        }
        if let Some(shape) = obj.get("shape") {
            return Shape::from_json(shape).map(Predicate::Shape);
        }
        if let Some(chance) = obj.get("chance") {
            let seed = match obj.get("seed") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            return Some(Predicate::Chance { chance: chance.as_f64()?, seed });
        }
        None
    }

    /// Every layer name this predicate can sample, including behind
    /// short-circuits that a given cell may never reach.
    pub fn layer_refs(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_layer_refs(&mut names);
        names
    }

    fn collect_layer_refs<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Predicate::All(preds) | Predicate::Any(preds) => {
                for p in preds {
                    p.collect_layer_refs(names);
                }
            }
            Predicate::Not(inner) => inner.collect_layer_refs(names),
            Predicate::LayerGt { layer, .. }
            | Predicate::LayerLt { layer, .. }
            | Predicate::LayerBetween { layer, .. } => names.push(layer.as_str()),
            Predicate::Always | Predicate::Never | Predicate::Shape(_) | Predicate::Chance { .. } => {}
        }
    }

    /// Non-array lists fail closed; bad entries become `Never` in place.
    fn parse_list(v: &Value) -> Option<Vec<Predicate>> {
        Some(v.as_array()?
            .iter()
            .map(|p| Self::from_json(Some(p)))
            .collect())
    }
}

/// `[name, n0, n1, ...]`
fn layer_args<const N: usize>(v: &Value) -> Option<(String, [f64; N])> {
    let arr = v.as_array()?;
    if arr.len() != N + 1 {
        return None;
    }
    let name = arr[0].as_str()?.to_string();
    let mut nums = [0.0; N];
    for (slot, value) in nums.iter_mut().zip(&arr[1..]) {
        *slot = value.as_f64()?;
    }
    Some((name, nums))
}

// ============================================================================
// Value helpers
// ============================================================================

pub(crate) fn num(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_f64)
}

/// `[x, y]`
pub(crate) fn point(v: &Value) -> Option<Point> {
    match v.as_array()?.as_slice() {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

/// Sub-seeds may be written as strings or numbers.
pub(crate) fn sub_seed(v: &Value) -> Option<String> {
    match v.get("seed")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
