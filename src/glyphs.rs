//! Glyph whitelist extension files.

use std::path::Path;

use tilecraft_gen::GlyphWhitelist;

use crate::error::{Error, Result};

/// Every non-whitespace character in `text` extends the ASCII whitelist.
pub fn parse_extension(text: &str) -> GlyphWhitelist {
    GlyphWhitelist::ascii().with_extension(text.chars())
}

pub fn load(path: Option<&Path>) -> Result<GlyphWhitelist> {
    let Some(path) = path else {
        return Ok(GlyphWhitelist::ascii());
    };
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let glyphs = parse_extension(&text);
    tracing::debug!(path = %path.display(), "loaded glyph extension");
    Ok(glyphs)
}
