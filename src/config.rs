//! Run configuration shared by the CLI subcommands.

use std::path::PathBuf;

use clap::Args;

use tilecraft_gen::WorldSpec;

/// Square side applied to every generated world, overriding the document.
pub const WORLD_SIZE: usize = 96;

pub const DEFAULT_SEED: &str = "tilecraft";

const GLYPH_FILE: &str = "glyphs.txt";

#[derive(Debug, Clone, Args)]
pub struct RunConfig {
    /// Spec document, provider response, or "Wrote terrain JSON to <path>" text.
    /// The built-in fallback spec is used when omitted.
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Reference seed; the same seed and spec always produce the same world
    #[arg(long, default_value = DEFAULT_SEED)]
    pub seed: String,

    /// Side length of the square world
    #[arg(long, default_value_t = WORLD_SIZE)]
    pub size: usize,

    /// Keep the document's own world dimensions instead of --size
    #[arg(long)]
    pub keep_dims: bool,

    /// Extra glyphs allowed in tile symbols, one file of characters
    #[arg(long)]
    pub glyphs: Option<PathBuf>,

    /// Output path (stdout if absent)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub pretty: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: None,
            seed: DEFAULT_SEED.to_string(),
            size: WORLD_SIZE,
            keep_dims: false,
            glyphs: None,
            output: None,
            pretty: false,
        }
    }
}

impl RunConfig {
    /// Forces the configured world size onto the document.
    pub fn apply_dims(&self, spec: &mut WorldSpec) {
        if !self.keep_dims {
            spec.world.width = self.size;
            spec.world.height = self.size;
        }
    }

    /// Explicit `--glyphs`, else `<config dir>/tilecraft/glyphs.txt` if present.
    pub fn glyph_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.glyphs {
            return Some(path.clone());
        }
        let path = dirs::config_dir()?.join("tilecraft").join(GLYPH_FILE);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_dims_overrides_document() {
        let mut spec = WorldSpec::default();
        spec.world.width = 10;
        spec.world.height = 20;

        RunConfig::default().apply_dims(&mut spec);
        assert_eq!((spec.world.width, spec.world.height), (WORLD_SIZE, WORLD_SIZE));
    }

    #[test]
    fn test_keep_dims() {
        let mut spec = WorldSpec::default();
        spec.world.width = 10;
        spec.world.height = 20;

        let config = RunConfig { keep_dims: true, ..RunConfig::default() };
        config.apply_dims(&mut spec);
        assert_eq!((spec.world.width, spec.world.height), (10, 20));
    }

    #[test]
    fn test_explicit_glyph_path_wins() {
        let config = RunConfig { glyphs: Some(PathBuf::from("/tmp/g.txt")), ..RunConfig::default() };
        assert_eq!(config.glyph_path(), Some(PathBuf::from("/tmp/g.txt")));
    }
}
