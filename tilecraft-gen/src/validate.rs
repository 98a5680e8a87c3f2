//! Tile palette validation and hard limits
//!
//! Produces the validated [`TileSet`] together with the id lookup tables every
//! tile reference is checked against. Foreground symbols are normalized to a
//! single whitelisted glyph on the way through.

use ahash::{AHashMap, AHashSet};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::layers::MAX_LAYERS;
use crate::rng::fnv1a;
use crate::spec::{BackgroundTile, ForegroundTile, TileDocs, TileSet, WorldDims, WorldSpec};

pub const MAX_OPS: usize = 256;
pub const MAX_TILES: usize = 1024;
pub const MAX_WORLD_SIDE: usize = 4096;
pub const MAX_ID_LEN: usize = 16;
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_SYMBOL_CHARS: usize = 4;

/// Substitutes for symbols with no permitted character.
const FALLBACK_GLYPHS: [char; 8] = ['#', '*', '+', 'o', '%', '&', '@', 'x'];

/// Characters a foreground symbol may render as.
#[derive(Debug, Clone, Default)]
pub struct GlyphWhitelist {
    extra: AHashSet<char>,
}

impl GlyphWhitelist {
    /// Printable ASCII only.
    pub fn ascii() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.extra.extend(chars.into_iter().filter(|c| !c.is_whitespace() && !c.is_control()));
        self
    }

    pub fn allows(&self, c: char) -> bool {
        c.is_ascii_graphic() || self.extra.contains(&c)
    }

    /// First permitted character of `symbol`, else a fallback keyed by `id`.
    pub fn sanitize(&self, id: &str, symbol: &str) -> char {
        symbol.chars()
            .find(|&c| self.allows(c))
            .unwrap_or_else(|| FALLBACK_GLYPHS[fnv1a(id) as usize % FALLBACK_GLYPHS.len()])
    }
}

/// Id → palette index, one namespace per tile kind.
#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    background: AHashMap<String, u16>,
    foreground: AHashMap<String, u16>,
}

impl TileIndex {
    pub fn background(&self, id: &str) -> Option<u16> {
        self.background.get(id).copied()
    }

    pub fn foreground(&self, id: &str) -> Option<u16> {
        self.foreground.get(id).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedTiles {
    pub tiles: TileSet,
    pub index: TileIndex,
}

pub fn check_world(world: &WorldDims) -> Result<()> {
    for (axis, size) in [("width", world.width), ("height", world.height)] {
        if size == 0 || size > MAX_WORLD_SIDE {
            return Err(Error::SpecValidation(format!(
                "world {} must be in 1..={}, got {}",
                axis, MAX_WORLD_SIDE, size
            )));
        }
    }
    if !(world.cell_size.is_finite() && world.cell_size > 0.0) {
        return Err(Error::SpecValidation(format!("world cellSize must be positive, got {}", world.cell_size)));
    }
    Ok(())
}

/// Over-long layer or op lists are rejected, never truncated.
pub fn check_limits(spec: &WorldSpec) -> Result<()> {
    if spec.layers.len() > MAX_LAYERS {
        return Err(Error::LimitExceeded { what: "layers", count: spec.layers.len(), max: MAX_LAYERS });
    }
    if spec.ops.len() > MAX_OPS {
        return Err(Error::LimitExceeded { what: "ops", count: spec.ops.len(), max: MAX_OPS });
    }
    Ok(())
}

pub fn validate_tiles(docs: &TileDocs, glyphs: &GlyphWhitelist) -> Result<ValidatedTiles> {
    let background_docs = docs.background.as_array()
        .ok_or_else(|| Error::SpecValidation("tiles.background must be a list".to_string()))?;
    if background_docs.is_empty() {
        return Err(Error::SpecValidation("tiles.background must not be empty".to_string()));
    }
    let foreground_docs = docs.foreground.as_array()
        .ok_or_else(|| Error::SpecValidation("tiles.foreground must be a list".to_string()))?;

    for (kind, count) in [("background tiles", background_docs.len()), ("foreground tiles", foreground_docs.len())] {
        if count > MAX_TILES {
            return Err(Error::LimitExceeded { what: kind, count, max: MAX_TILES });
        }
    }

    let mut index = TileIndex::default();
    let mut tiles = TileSet::default();

    for (i, doc) in background_docs.iter().enumerate() {
        let f = TileFields::new("background", i, doc)?;
        let tile = BackgroundTile {
            id: f.id()?,
            name: f.name()?,
            color: f.color()?,
            walkable: f.walkable()?,
        };
        insert_unique(&mut index.background, &tile.id, "background")?;
        tiles.background.push(tile);
    }

    for (i, doc) in foreground_docs.iter().enumerate() {
        let f = TileFields::new("foreground", i, doc)?;
        let id = f.id()?;
        let symbol = glyphs.sanitize(&id, &f.symbol()?).to_string();
        let tile = ForegroundTile {
            name: f.name()?,
            symbol,
            color: f.color()?,
            walkable: f.walkable()?,
            id,
        };
        insert_unique(&mut index.foreground, &tile.id, "foreground")?;
        tiles.foreground.push(tile);
    }

    Ok(ValidatedTiles { tiles, index })
}

fn insert_unique(ids: &mut AHashMap<String, u16>, id: &str, kind: &str) -> Result<()> {
    if ids.contains_key(id) {
        return Err(Error::SpecValidation(format!("duplicate {} tile id {:?}", kind, id)));
    }
    // MAX_TILES keeps this in range
    let next = ids.len() as u16;
    ids.insert(id.to_string(), next);
    Ok(())
}

/// Field accessors with errors that point at the offending tile.
struct TileFields<'a> {
    kind: &'static str,
    position: usize,
    obj: &'a Map<String, Value>,
}

impl<'a> TileFields<'a> {
    fn new(kind: &'static str, position: usize, doc: &'a Value) -> Result<Self> {
        let obj = doc.as_object().ok_or_else(|| {
            Error::SpecValidation(format!("{} tile #{} must be an object", kind, position))
        })?;
        Ok(Self { kind, position, obj })
    }

    fn err(&self, msg: impl std::fmt::Display) -> Error {
        let label = match self.obj.get("id").and_then(Value::as_str) {
            Some(id) => format!("{} tile {:?}", self.kind, id),
            None => format!("{} tile #{}", self.kind, self.position),
        };
        Error::SpecValidation(format!("{}: {}", label, msg))
    }

    fn string(&self, key: &str) -> Result<&'a str> {
        match self.obj.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(self.err(format_args!("{} must be a string", key))),
            None => Err(self.err(format_args!("missing {}", key))),
        }
    }

    fn id(&self) -> Result<String> {
        let id = self.string("id")?;
        if !is_valid_id(id) {
            return Err(self.err(format_args!(
                "id {:?} must be 1-{} chars of a-z, 0-9, _ or -",
                id, MAX_ID_LEN
            )));
        }
        Ok(id.to_string())
    }

    fn name(&self) -> Result<String> {
        let name = self.string("name")?.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(self.err(format_args!("name must be 1-{} characters", MAX_NAME_LEN)));
        }
        Ok(name.to_string())
    }

    fn color(&self) -> Result<String> {
        let color = self.string("color")?;
        if !is_hex_color(color) {
            return Err(self.err(format_args!("color {:?} must be #RRGGBB", color)));
        }
        Ok(color.to_string())
    }

    fn walkable(&self) -> Result<bool> {
        match self.obj.get("walkable") {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.err("walkable must be a boolean")),
            None => Err(self.err("missing walkable")),
        }
    }

    fn symbol(&self) -> Result<String> {
        let symbol = self.string("symbol")?;
        let count = symbol.chars().count();
        if count == 0 || count > MAX_SYMBOL_CHARS {
            return Err(self.err(format_args!("symbol must be 1-{} characters", MAX_SYMBOL_CHARS)));
        }
        Ok(symbol.to_string())
    }
}

pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color.bytes().skip(1).all(|b| b.is_ascii_hexdigit())
}
