use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::Rng;

use crate::error::{ShortgenError, ShortgenResult};

/// Draw `count` distinct integers uniformly from `[min, max]`.
///
/// Distinctness is impossible when `count` exceeds the range size, so that is
/// rejected up front instead of looping forever on rejection sampling.
pub fn distinct_values(
    rng: &mut impl Rng,
    count: usize,
    min: u32,
    max: u32,
) -> ShortgenResult<Vec<u32>> {
    if min > max {
        return Err(ShortgenError::validation(format!(
            "value range is empty: min {min} > max {max}"
        )));
    }
    // Wider arithmetic: the range size itself overflows u32 when the bounds
    // span the full type.
    let range = u64::from(max) - u64::from(min) + 1;
    if count as u64 > range {
        return Err(ShortgenError::validation(format!(
            "cannot draw {count} distinct values from [{min}, {max}] ({range} possible)"
        )));
    }

    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let v = rng.gen_range(min..=max);
        if !values.contains(&v) {
            values.push(v);
        }
    }
    Ok(values)
}

/// Resolved mapping of template placeholders to randomized values.
///
/// Generated once per job and consumed exactly once to materialize the
/// rendered document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentBinding {
    values: Vec<u32>,
}

impl ContentBinding {
    /// Generate a binding of `count` distinct values from `[min, max]` using
    /// the thread RNG.
    pub fn generate(count: usize, min: u32, max: u32) -> ShortgenResult<Self> {
        Self::generate_with(&mut rand::thread_rng(), count, min, max)
    }

    /// Generate a binding using a caller-supplied RNG (deterministic tests).
    pub fn generate_with(
        rng: &mut impl Rng,
        count: usize,
        min: u32,
        max: u32,
    ) -> ShortgenResult<Self> {
        Ok(Self {
            values: distinct_values(rng, count, min, max)?,
        })
    }

    /// The bound values, in placeholder order.
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Substitute `{numero1}..{numeroN}` (1-based) in `template` with the
    /// bound values, each placeholder replaced exactly once.
    ///
    /// Placeholders beyond the supplied values are left verbatim. The page
    /// then renders the literal marker, which is visible in review rather
    /// than a hard failure here.
    pub fn bind(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (i, value) in self.values.iter().enumerate() {
            let marker = format!("{{numero{}}}", i + 1);
            out = out.replacen(&marker, &value.to_string(), 1);
        }
        out
    }
}

/// A per-job transient markup file on disk.
///
/// Removed on drop so the document cannot outlive its job on any exit path.
#[derive(Debug)]
pub struct RenderedDocument {
    path: PathBuf,
    removed: bool,
}

impl RenderedDocument {
    /// Bind `template_path` with `binding` and write the result to `path`.
    pub fn materialize(
        template_path: &Path,
        binding: &ContentBinding,
        path: PathBuf,
    ) -> ShortgenResult<Self> {
        let template = fs::read_to_string(template_path).map_err(|e| {
            ShortgenError::template(format!(
                "failed to read template '{}': {e}",
                template_path.display()
            ))
        })?;
        let bound = binding.bind(&template);
        fs::write(&path, bound).map_err(|e| {
            ShortgenError::template(format!(
                "failed to write rendered document '{}': {e}",
                path.display()
            ))
        })?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Location of the materialized document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the document from disk. Idempotent.
    pub fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove transient document"
                );
            }
        }
    }
}

impl Drop for RenderedDocument {
    fn drop(&mut self) {
        self.remove();
    }
}
