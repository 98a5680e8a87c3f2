//! Tilecraft
//!
//! Generates tile worlds from declarative JSON specs. The engine lives in
//! `tilecraft-gen` (re-exported as `gen`); this crate handles where specs come
//! from, glyph extensions and run configuration.

pub mod config;
pub mod error;
pub mod glyphs;
pub mod source;
pub use tilecraft_gen as gen;

pub use config::{RunConfig, WORLD_SIZE};
pub use error::{Error, Result};
pub use source::{acquire, Acquired};

use tilecraft_gen::{Plan, WorldOutput, WorldSpec};

/// Spec named by `config.input` (or the fallback), with the configured dims applied.
/// Already generated worlds come back untouched.
pub fn load_spec(config: &RunConfig) -> Result<Acquired> {
    let acquired = match &config.input {
        Some(path) => source::acquire_path(path)?,
        None => Acquired::Spec(source::fallback_spec()?),
    };
    Ok(match acquired {
        Acquired::Spec(mut spec) => {
            config.apply_dims(&mut spec);
            Acquired::Spec(spec)
        }
        ready => ready,
    })
}

pub fn generate(config: &RunConfig) -> Result<WorldOutput> {
    match load_spec(config)? {
        Acquired::Ready(world) => {
            tracing::info!("input is already a generated world, passing through");
            Ok(world)
        }
        Acquired::Spec(spec) => Ok(plan(config, &spec)?.run()?),
    }
}

pub fn plan(config: &RunConfig, spec: &WorldSpec) -> Result<Plan> {
    let glyphs = glyphs::load(config.glyph_path().as_deref())?;
    Ok(tilecraft_gen::plan(spec, &config.seed, &glyphs)?)
}
