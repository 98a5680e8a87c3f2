//! World builder
//!
//! Validates a spec, compiles its layers and ops, then runs the ops in order
//! over an in-memory grid.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::layers::LayerSampler;
use crate::ops::{compile_ops, FgAction, Op, Prefab, RoadMarker};
use crate::predicate::EvalContext;
use crate::rng::{hash_unit, Rng};
use crate::spec::{Area, Predicate, TileSet, WorldOutput, WorldSpec};
use crate::validate::{check_limits, check_world, validate_tiles, GlyphWhitelist, ValidatedTiles};

/// Background and foreground palette indices, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    background: Vec<u16>,
    foreground: Vec<Option<u16>>,
}

impl Grid {
    /// Filled with the first background tile and no foreground.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            background: vec![0; width * height],
            foreground: vec![None; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn background(&self, x: usize, y: usize) -> u16 {
        self.background[self.idx(x, y)]
    }

    pub fn foreground(&self, x: usize, y: usize) -> Option<u16> {
        self.foreground[self.idx(x, y)]
    }

    pub fn set_background(&mut self, x: usize, y: usize, tile: u16) {
        let i = self.idx(x, y);
        self.background[i] = tile;
    }

    pub fn set_foreground(&mut self, x: usize, y: usize, tile: Option<u16>) {
        let i = self.idx(x, y);
        self.foreground[i] = tile;
    }

    /// Resolve palette indices back to tile ids.
    pub fn to_area(&self, tiles: &TileSet) -> Area {
        let cells = (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let bg = tiles.background[self.background(x, y) as usize].id.clone();
                        let fg = self.foreground(x, y).map(|f| tiles.foreground[f as usize].id.clone());
                        (bg, fg)
                    })
                    .collect()
            })
            .collect();
        Area { width: self.width, height: self.height, cells }
    }
}

/// Outcome of one scatter op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScatterStats {
    pub placed: usize,
    pub attempts: usize,
}

/// Applies ops to a grid it owns exclusively for the run.
pub struct WorldBuilder {
    grid: Grid,
    sampler: LayerSampler,
}

impl WorldBuilder {
    pub fn new(grid: Grid, sampler: LayerSampler) -> Self {
        Self { grid, sampler }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }

    pub fn apply(&mut self, index: usize, op: &Op) -> Result<()> {
        match op {
            Op::Paint { gate, bg, fg } => {
                let painted = self.paint(gate, *bg, *fg)?;
                debug!(index, kind = op.kind(), painted, "op applied");
            }
            Op::RoadsGrid { bg, origin, spacing, thickness, gate, marker } => {
                let (road, markers) = self.roads(index, *bg, *origin, *spacing, *thickness, gate, marker.as_ref())?;
                debug!(index, kind = op.kind(), road, markers, "op applied");
            }
            Op::Scatter { seed, gate, count, max_attempts, prefabs } => {
                let stats = self.scatter(seed, gate, *count, *max_attempts, prefabs)?;
                debug!(
                    index,
                    kind = op.kind(),
                    placed = stats.placed,
                    attempts = stats.attempts,
                    wanted = *count,
                    "op applied"
                );
            }
        }
        Ok(())
    }

    fn paint(&mut self, gate: &Predicate, bg: Option<u16>, fg: FgAction) -> Result<usize> {
        let mut painted = 0;
        for y in 0..self.grid.height {
            for x in 0..self.grid.width {
                if !gate.eval(x as f64, y as f64, &mut self.sampler)? {
                    continue;
                }
                if let Some(bg) = bg {
                    self.grid.set_background(x, y, bg);
                }
                match fg {
                    FgAction::Keep => {}
                    FgAction::Clear => self.grid.set_foreground(x, y, None),
                    FgAction::Set(tile) => self.grid.set_foreground(x, y, Some(tile)),
                }
                painted += 1;
            }
        }
        Ok(painted)
    }

    #[allow(clippy::too_many_arguments)]
    fn roads(
        &mut self,
        index: usize,
        bg: u16,
        (ox, oy): (i64, i64),
        spacing: i64,
        thickness: i64,
        gate: &Predicate,
        marker: Option<&RoadMarker>,
    ) -> Result<(usize, usize)> {
        let (mut road, mut markers) = (0, 0);
        for y in 0..self.grid.height {
            let gy = (y as i64 - oy).rem_euclid(spacing);
            for x in 0..self.grid.width {
                let gx = (x as i64 - ox).rem_euclid(spacing);
                let (on_col, on_row) = (gx < thickness, gy < thickness);
                if !(on_col || on_row) || !gate.eval(x as f64, y as f64, &mut self.sampler)? {
                    continue;
                }
                self.grid.set_background(x, y, bg);
                road += 1;

                if let Some(m) = marker {
                    if on_col && on_row {
                        let key = format!("{}|roads|{}|{},{}", self.sampler.seed(), index, x, y);
                        if hash_unit(&key) < m.chance {
                            self.grid.set_foreground(x, y, Some(m.fg));
                            markers += 1;
                        }
                    }
                }
            }
        }
        Ok((road, markers))
    }

    /// Random non-overlapping placement. The gate is only tested at each
    /// candidate's center cell.
    fn scatter(
        &mut self,
        seed: &str,
        gate: &Predicate,
        count: usize,
        max_attempts: usize,
        prefabs: &[Prefab],
    ) -> Result<ScatterStats> {
        let (width, height) = (self.grid.width, self.grid.height);
        let mut rng = Rng::new(&format!("{}|scatter|{}", self.sampler.seed(), seed));
        let mut occupied = vec![0u8; width * height];
        let total_weight: f64 = prefabs.iter().map(|p| p.weight).sum();
        let mut stats = ScatterStats::default();

        while stats.attempts < max_attempts && stats.placed < count {
            stats.attempts += 1;

            let Some(prefab) = pick_weighted(&mut rng, prefabs, total_weight) else {
                break;
            };
            if prefab.w > width || prefab.h > height {
                continue;
            }
            let x0 = rng.below(width - prefab.w + 1);
            let y0 = rng.below(height - prefab.h + 1);
            let (cx, cy) = (x0 + prefab.w / 2, y0 + prefab.h / 2);

            if !gate.eval(cx as f64, cy as f64, &mut self.sampler)? {
                continue;
            }
            let blocked = (y0..y0 + prefab.h)
                .any(|y| occupied[y * width + x0..y * width + x0 + prefab.w].iter().any(|&o| o != 0));
            if blocked {
                trace!(x0, y0, w = prefab.w, h = prefab.h, "scatter overlap");
                continue;
            }

            for y in y0..y0 + prefab.h {
                for x in x0..x0 + prefab.w {
                    if let Some(bg) = prefab.bg {
                        self.grid.set_background(x, y, bg);
                    }
                    occupied[y * width + x] = 1;
                }
            }
            if let Some(fg) = prefab.fg {
                self.grid.set_foreground(cx, cy, Some(fg));
            }
            stats.placed += 1;
        }
        Ok(stats)
    }
}

/// Cumulative-weight scan. Falls back to the last prefab when the weights
/// sum to zero or rounding leaves a remainder.
fn pick_weighted<'p>(rng: &mut Rng, prefabs: &'p [Prefab], total: f64) -> Option<&'p Prefab> {
    let mut r = rng.next_f64() * total;
    for prefab in prefabs {
        if r < prefab.weight {
            return Some(prefab);
        }
        r -= prefab.weight;
    }
    prefabs.last()
}

/// Generate a world from `spec`, deriving all randomness from `seed`.
pub fn generate(spec: &WorldSpec, seed: &str) -> Result<WorldOutput> {
    generate_with_glyphs(spec, seed, &GlyphWhitelist::ascii())
}

pub fn generate_with_glyphs(spec: &WorldSpec, seed: &str, glyphs: &GlyphWhitelist) -> Result<WorldOutput> {
    plan(spec, seed, glyphs)?.run()
}

/// A fully checked spec: tiles validated, layers and ops compiled.
/// Nothing has touched the grid yet.
pub struct Plan {
    pub tiles: ValidatedTiles,
    pub ops: Vec<Op>,
    sampler: LayerSampler,
    width: usize,
    height: usize,
}

/// Runs every check `generate` would, without executing any op.
pub fn plan(spec: &WorldSpec, seed: &str, glyphs: &GlyphWhitelist) -> Result<Plan> {
    let (width, height) = (spec.world.width, spec.world.height);
    debug!(seed, width, height, layers = spec.layers.len(), ops = spec.ops.len(), "planning world");

    check_world(&spec.world)?;
    check_limits(spec)?;
    let tiles = validate_tiles(&spec.tiles, glyphs)?;
    let sampler = LayerSampler::new(seed, width, height, &spec.layers)?;
    let ops = compile_ops(&spec.ops, &tiles.index)?;
    check_gate_layers(&ops, &sampler)?;

    Ok(Plan { tiles, ops, sampler, width, height })
}

/// Gates may name layers on branches no cell ever reaches; those still
/// have to exist.
fn check_gate_layers(ops: &[Op], sampler: &LayerSampler) -> Result<()> {
    for op in ops {
        if let Some(name) = op.gate().layer_refs().into_iter().find(|name| !sampler.contains(name)) {
            return Err(Error::UnknownLayer(name.to_string()));
        }
    }
    Ok(())
}

impl Plan {
    pub fn layer_count(&self) -> usize {
        self.sampler.len()
    }

    pub fn run(self) -> Result<WorldOutput> {
        let Plan { tiles, ops, sampler, width, height } = self;
        let mut builder = WorldBuilder::new(Grid::new(width, height), sampler);
        for (index, op) in ops.iter().enumerate() {
            builder.apply(index, op)?;
        }

        let area = builder.grid().to_area(&tiles.tiles);
        Ok(WorldOutput { tiles: tiles.tiles, area })
    }
}
