//! The merge pipeline: partition, resolve, normalize, aggregate.
//!
//! Each pass finishes over the whole fragment set before the next one
//! starts.  Resolution and aggregation depend on discovery order and run
//! on one thread; normalization has no cross-fragment state and may run
//! on the rayon pool.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::{MergeError, Result};
use crate::fsio::{discover, flatten, FragmentGroup};
use crate::normalize::normalize_all;
use crate::resolve::{ensure_unique, Resolver};
use crate::shard::{aggregate, ShardFile};

pub const DEFAULT_THRESHOLD: usize = 1000;

#[derive(Clone, Debug)]
pub struct MergeConfig {
    /// Statement count at which a shard is flushed.
    pub threshold: usize,
    /// Normalize fragments on the rayon pool.
    pub parallel: bool,
}

impl Default for MergeConfig {
    fn default() -> MergeConfig {
        MergeConfig {
            threshold: DEFAULT_THRESHOLD,
            parallel: true,
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(MergeError::InvalidConfig(
                "shard threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// How to run the ABC partitioner.
#[derive(Clone, Debug)]
pub struct PartitionerConfig {
    pub program: PathBuf,
    /// Cell library handed to the `pif` command.
    pub library: PathBuf,
}

impl Default for PartitionerConfig {
    fn default() -> PartitionerConfig {
        PartitionerConfig {
            program: PathBuf::from("abc"),
            library: PathBuf::from("lib9.dsd"),
        }
    }
}

impl PartitionerConfig {
    pub fn script(&self, input: &Path, outdir: &Path) -> String {
        format!(
            "read_blif {}; pif {} {}",
            input.display(),
            self.library.display(),
            outdir.display()
        )
    }
}

/// Runs the partitioner once over `input`, filling `outdir`.
pub fn run_partitioner(cfg: &PartitionerConfig, input: &Path, outdir: &Path) -> Result<()> {
    let script = cfg.script(input, outdir);
    info!("Running {} -c '{}'", cfg.program.display(), script);
    let status = Command::new(&cfg.program)
        .arg("-c")
        .arg(&script)
        .status()
        .map_err(|e| MergeError::tool(&cfg.program, format!("cannot start: {}", e)))?;
    if !status.success() {
        return Err(MergeError::tool(
            &cfg.program,
            format!("exited with {} on {}", status, input.display()),
        ));
    }
    Ok(())
}

/// What a merge run did.
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub fragments: usize,
    pub renamed: usize,
    pub normalized: usize,
    pub shards: Vec<ShardFile>,
}

/// Resolve, normalize and aggregate an already partitioned directory.
pub fn merge_directory(dir: &Path, cfg: &MergeConfig) -> Result<MergeReport> {
    cfg.validate()?;
    let groups: Vec<FragmentGroup> = discover(dir)?;
    let paths = flatten(&groups);
    if paths.is_empty() {
        return Err(MergeError::tool(dir, "no fragment files found"));
    }
    info!(
        "Found {} fragments in {} directories under {}",
        paths.len(),
        groups.len(),
        dir.display()
    );

    let mut resolver = Resolver::new();
    let (fragments, renames) = resolver.resolve_files(&paths)?;
    ensure_unique(&fragments)?;

    let normalized = normalize_all(&paths, cfg.parallel)?;
    let shards = aggregate(&groups, cfg.threshold)?;
    info!("Wrote {} shards", shards.len());

    Ok(MergeReport {
        fragments: paths.len(),
        renamed: renames.len(),
        normalized,
        shards,
    })
}

/// The whole command: create `outdir`, partition `input` into it, then
/// merge the fragments.
pub fn run(
    input: &Path,
    outdir: &Path,
    partitioner: Option<&PartitionerConfig>,
    cfg: &MergeConfig,
) -> Result<MergeReport> {
    cfg.validate()?;
    fs::create_dir_all(outdir).map_err(|e| MergeError::io(outdir, e))?;
    if let Some(p) = partitioner {
        run_partitioner(p, input, outdir)?;
    }
    merge_directory(outdir, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_rejected() {
        let cfg = MergeConfig {
            threshold: 0,
            parallel: false,
        };
        assert!(matches!(cfg.validate(), Err(MergeError::InvalidConfig(_))));
        assert!(MergeConfig::default().validate().is_ok());
    }

    #[test]
    fn partitioner_script() {
        let p = PartitionerConfig {
            program: PathBuf::from("/opt/abc"),
            library: PathBuf::from("lib/lib9.dsd"),
        };
        assert_eq!(
            p.script(Path::new("c.blif"), Path::new("out")),
            "read_blif c.blif; pif lib/lib9.dsd out"
        );
    }

    #[test]
    fn empty_directory_is_a_tool_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let e = merge_directory(tmp.path(), &MergeConfig::default()).unwrap_err();
        assert!(matches!(e, MergeError::ExternalToolFailure { .. }));
    }

    #[test]
    fn missing_partitioner_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let p = PartitionerConfig {
            program: tmp.path().join("no-such-abc"),
            library: PathBuf::from("lib9.dsd"),
        };
        let e = run(
            Path::new("c.blif"),
            &tmp.path().join("out"),
            Some(&p),
            &MergeConfig::default(),
        )
        .unwrap_err();
        assert!(e.to_string().contains("no-such-abc"));
    }
}
