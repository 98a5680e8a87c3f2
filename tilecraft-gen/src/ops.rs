//! Operation compiler
//!
//! Turns the raw `ops` list into executable [`Op`]s with tile references
//! resolved to palette indices. The whole list is compiled before the grid is
//! touched, so one bad reference anywhere aborts the run with nothing painted.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::spec::{num, point, sub_seed, Predicate};
use crate::validate::TileIndex;

pub const MAX_PREFABS: usize = 128;
pub const MAX_PREFAB_SIDE: usize = 200;
pub const MAX_SCATTER_COUNT: usize = 4096;
pub const MAX_SCATTER_ATTEMPTS: usize = 200_000;
/// `maxAttempts` default is `count * DEFAULT_ATTEMPTS_PER_PLACEMENT`.
pub const DEFAULT_ATTEMPTS_PER_PLACEMENT: usize = 50;

pub const DEFAULT_ROAD_SPACING: i64 = 16;

/// What a paint does to the foreground layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FgAction {
    /// `fg` key absent.
    Keep,
    /// `fg: null`.
    Clear,
    Set(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadMarker {
    pub fg: u16,
    pub chance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prefab {
    pub w: usize,
    pub h: usize,
    pub bg: Option<u16>,
    pub fg: Option<u16>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Paint {
        gate: Predicate,
        bg: Option<u16>,
        fg: FgAction,
    },
    RoadsGrid {
        bg: u16,
        origin: (i64, i64),
        spacing: i64,
        thickness: i64,
        gate: Predicate,
        marker: Option<RoadMarker>,
    },
    Scatter {
        /// Sub-seed of the attempt stream.
        seed: String,
        gate: Predicate,
        count: usize,
        max_attempts: usize,
        prefabs: Vec<Prefab>,
    },
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Paint { .. } => "paint",
            Op::RoadsGrid { .. } => "roads.grid",
            Op::Scatter { .. } => "stamp.scatter",
        }
    }

    pub fn gate(&self) -> &Predicate {
        match self {
            Op::Paint { gate, .. } | Op::RoadsGrid { gate, .. } | Op::Scatter { gate, .. } => gate,
        }
    }
}

pub fn compile_ops(ops: &[Value], tiles: &TileIndex) -> Result<Vec<Op>> {
    ops.iter()
        .enumerate()
        .map(|(index, v)| OpCompiler { index, v, tiles }.compile())
        .collect()
}

struct OpCompiler<'a> {
    index: usize,
    v: &'a Value,
    tiles: &'a TileIndex,
}

impl OpCompiler<'_> {
    fn compile(&self) -> Result<Op> {
        let kind = self.v.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "paint" => self.paint(),
            "roads.grid" => self.roads(),
            "stamp.scatter" => self.scatter(),
            other => Err(Error::UnsupportedOp { index: self.index, kind: other.to_string() }),
        }
    }

    fn gate(&self) -> Predicate {
        Predicate::from_json(self.v.get("where"))
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidOp { index: self.index, reason: reason.into() }
    }

    fn bg_ref(&self, v: Option<&Value>) -> Result<Option<u16>> {
        self.tile_ref(v, "background", |id| self.tiles.background(id))
    }

    fn fg_ref(&self, v: Option<&Value>) -> Result<Option<u16>> {
        self.tile_ref(v, "foreground", |id| self.tiles.foreground(id))
    }

    fn tile_ref(
        &self,
        v: Option<&Value>,
        layer: &'static str,
        lookup: impl Fn(&str) -> Option<u16>,
    ) -> Result<Option<u16>> {
        match v {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => lookup(id.as_str())
                .map(Some)
                .ok_or_else(|| Error::UnknownTile { index: self.index, layer, id: id.clone() }),
            Some(other) => Err(Error::UnknownTile { index: self.index, layer, id: other.to_string() }),
        }
    }

    fn paint(&self) -> Result<Op> {
        let bg = self.bg_ref(self.v.get("bg"))?;
        let fg = match self.v.get("fg") {
            None => FgAction::Keep,
            Some(Value::Null) => FgAction::Clear,
            some => match self.fg_ref(some)? {
                Some(idx) => FgAction::Set(idx),
                None => FgAction::Keep,
            },
        };
        Ok(Op::Paint { gate: self.gate(), bg, fg })
    }

    fn roads(&self) -> Result<Op> {
        let bg = self.bg_ref(self.v.get("bg"))?
            .ok_or_else(|| self.invalid("roads.grid requires a background tile (bg)"))?;

        let origin = match self.v.get("origin") {
            None | Some(Value::Null) => (0.0, 0.0),
            Some(v) => point(v).ok_or_else(|| self.invalid("origin must be [x, y]"))?,
        };
        let spacing = num(self.v, "spacing").map_or(DEFAULT_ROAD_SPACING, |s| s.floor() as i64);
        if spacing < 1 {
            return Err(self.invalid(format!("spacing must be at least 1, got {}", spacing)));
        }
        let thickness = num(self.v, "thickness").map_or(1, |t| t.floor() as i64);
        if thickness < 1 {
            return Err(self.invalid(format!("thickness must be at least 1, got {}", thickness)));
        }

        let marker = match self.v.get("intersections") {
            None | Some(Value::Null) => None,
            Some(m) => {
                let fg = self.fg_ref(m.get("fg"))?
                    .ok_or_else(|| self.invalid("intersections requires a foreground tile (fg)"))?;
                let chance = num(m, "chance").unwrap_or(1.0).clamp(0.0, 1.0);
                Some(RoadMarker { fg, chance })
            }
        };

        Ok(Op::RoadsGrid {
            bg,
            origin: (origin.0.floor() as i64, origin.1.floor() as i64),
            spacing,
            thickness,
            gate: self.gate(),
            marker,
        })
    }

    fn scatter(&self) -> Result<Op> {
        let prefab_docs = self.v.get("prefabs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if prefab_docs.is_empty() || prefab_docs.len() > MAX_PREFABS {
            return Err(Error::InvalidPrefab {
                index: self.index,
                reason: format!("expected 1..={} prefabs, got {}", MAX_PREFABS, prefab_docs.len()),
            });
        }
        let prefabs = prefab_docs.iter()
            .enumerate()
            .map(|(i, p)| self.prefab(i, p))
            .collect::<Result<Vec<_>>>()?;

        let count = num(self.v, "count").map_or(1, |c| c.max(0.0) as usize).min(MAX_SCATTER_COUNT);
        let max_attempts = num(self.v, "maxAttempts")
            .map_or(count.saturating_mul(DEFAULT_ATTEMPTS_PER_PLACEMENT), |a| a.max(0.0) as usize)
            .min(MAX_SCATTER_ATTEMPTS);

        Ok(Op::Scatter {
            seed: sub_seed(self.v).unwrap_or_else(|| self.index.to_string()),
            gate: self.gate(),
            count,
            max_attempts,
            prefabs,
        })
    }

    fn prefab(&self, i: usize, p: &Value) -> Result<Prefab> {
        let bad = |reason: String| Error::InvalidPrefab { index: self.index, reason: format!("prefab {}: {}", i, reason) };
        let side = |key: &str| {
            num(p, key)
                .filter(|n| n.fract() == 0.0 && (1.0..=MAX_PREFAB_SIDE as f64).contains(n))
                .map(|n| n as usize)
                .ok_or_else(|| bad(format!("{} must be an integer in 1..={}", key, MAX_PREFAB_SIDE)))
        };
        let weight = num(p, "weight").unwrap_or(1.0);
        if !(weight >= 0.0 && weight.is_finite()) {
            return Err(bad(format!("weight must be non-negative, got {}", weight)));
        }
        Ok(Prefab {
            w: side("w")?,
            h: side("h")?,
            bg: self.bg_ref(p.get("bg"))?,
            fg: self.fg_ref(p.get("fg"))?,
            weight,
        })
    }
}
