//! Format normalization.  ABC writes fragment headers in whatever shape
//! it likes (continued `.inputs` lines, comments, several declaration
//! blocks).  The canonical form is a `.model` line, one `.inputs` line,
//! one `.outputs` line, and then the body from the first `.names`
//! statement onward, copied verbatim.
//!
//! Port names are written in the order they are first seen, so the
//! output is reproducible and normalizing twice changes nothing.
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::blif::{write_header, Fragment};
use crate::error::Result;
use crate::fsio::write_atomic;

/// Canonical text of a fragment.
pub fn normalize_text(fragment: &Fragment) -> Result<String> {
    let split = fragment.split_point()?;
    let inputs = fragment.inputs()?;
    let outputs = fragment.outputs()?;

    let mut out = String::new();
    write_header(&mut out, &fragment.model_name(), &inputs, &outputs);
    for line in &fragment.lines[split..] {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Rewrites one fragment file in place.  Returns true if the contents
/// changed.
pub fn normalize_file(fragment: &Fragment) -> Result<bool> {
    let text = normalize_text(fragment)?;
    if text == fragment.text() {
        debug!("{} already canonical", fragment.path.display());
        return Ok(false);
    }
    write_atomic(&fragment.path, &text)?;
    debug!("Normalized {}", fragment.path.display());
    Ok(true)
}

/// Normalizes every fragment file.  Fragments share no state, so with
/// `parallel` set they are processed on the rayon pool.
pub fn normalize_all(paths: &[PathBuf], parallel: bool) -> Result<usize> {
    let one = |(i, p): (usize, &PathBuf)| -> Result<bool> {
        let f = Fragment::read(p, i)?;
        normalize_file(&f)
    };
    let changed: Vec<bool> = if parallel {
        paths.par_iter().enumerate().map(one).collect::<Result<_>>()?
    } else {
        paths.iter().enumerate().map(one).collect::<Result<_>>()?
    };
    let n = changed.iter().filter(|c| **c).count();
    info!("Normalized {} fragments ({} rewritten)", paths.len(), n);
    Ok(n)
}
