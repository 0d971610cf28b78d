//! Shard aggregation.  The fragments of one directory are folded, in
//! discovery order, into consolidated files of bounded size.
//!
//! A ShardBuilder holds the running shard.  Before a fragment is folded
//! in, the running shard is flushed if its statement count has reached
//! the threshold.  So every shard but the last one in a directory holds
//! at least `threshold` statements, and a shard only goes over the
//! threshold by the size of the fragment that crossed it.
//!
//! Port sets are merged by union.  A net that one fragment outputs and
//! another reads shows up on both lines of the shard header.
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexSet;
use tracing::info;

use crate::blif::{write_header, Fragment, Statement, END};
use crate::error::Result;
use crate::fsio::{shard_file_name, write_atomic, FragmentGroup};

pub struct Shard {
    pub index: usize,
    pub inputs: IndexSet<String>,
    pub outputs: IndexSet<String>,
    pub statements: Vec<Statement>,
    /// Paths of the fragments folded in, in fold order.
    pub fragments: Vec<PathBuf>,
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "shard {}: {} fragments, {} statements, {} inputs, {} outputs",
            self.index,
            self.fragments.len(),
            self.statements.len(),
            self.inputs.len(),
            self.outputs.len()
        )
    }
}

impl Shard {
    pub fn new(index: usize) -> Shard {
        Shard {
            index,
            inputs: IndexSet::new(),
            outputs: IndexSet::new(),
            statements: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn model_name(&self) -> String {
        format!("merged{}", self.index)
    }

    pub fn file_name(&self) -> String {
        shard_file_name(self.index)
    }

    pub fn fold(&mut self, fragment: &Fragment) -> Result<()> {
        let statements = fragment.statements()?;
        self.inputs.extend(fragment.inputs()?);
        self.outputs.extend(fragment.outputs()?);
        self.statements.extend(statements);
        self.fragments.push(fragment.path.clone());
        Ok(())
    }

    /// Statement lines in fold order.
    pub fn body(&self) -> Vec<String> {
        self.statements
            .iter()
            .flat_map(|s| s.lines.iter().cloned())
            .collect()
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        write_header(&mut out, &self.model_name(), &self.inputs, &self.outputs);
        for s in &self.statements {
            for l in &s.lines {
                out.push_str(l);
                out.push('\n');
            }
        }
        out.push_str(END);
        out.push('\n');
        out
    }
}

/// Running accumulator for one directory's shards.
pub struct ShardBuilder {
    pub threshold: usize,
    pub current: Shard,
    pub done: Vec<Shard>,
}

impl ShardBuilder {
    pub fn new(threshold: usize) -> ShardBuilder {
        ShardBuilder {
            threshold,
            current: Shard::new(0),
            done: Vec::new(),
        }
    }

    pub fn push(&mut self, fragment: &Fragment) -> Result<()> {
        if !self.current.is_empty() && self.current.statement_count() >= self.threshold {
            self.flush();
        }
        self.current.fold(fragment)
    }

    fn flush(&mut self) {
        let next = Shard::new(self.current.index + 1);
        let full = std::mem::replace(&mut self.current, next);
        self.done.push(full);
    }

    /// All shards, the last (possibly partial) one included.
    pub fn finish(mut self) -> Vec<Shard> {
        if !self.current.is_empty() {
            self.flush();
        }
        self.done
    }
}

/// A shard file that was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardFile {
    pub path: PathBuf,
    pub fragments: usize,
    pub statements: usize,
}

/// Builds and writes the shards of one directory.  `first_index` is the
/// discovery index of the group's first fragment.
pub fn aggregate_group(
    group: &FragmentGroup,
    first_index: usize,
    threshold: usize,
) -> Result<Vec<ShardFile>> {
    let mut builder = ShardBuilder::new(threshold);
    for (i, p) in group.files.iter().enumerate() {
        let f = Fragment::read(p, first_index + i)?;
        builder.push(&f)?;
    }

    let mut written = Vec::new();
    for shard in builder.finish() {
        let path = group.dir.join(shard.file_name());
        write_atomic(&path, &shard.text())?;
        info!("Merged BLIF file created: {} ({})", path.display(), shard);
        written.push(ShardFile {
            path,
            fragments: shard.fragments.len(),
            statements: shard.statement_count(),
        });
    }
    Ok(written)
}

/// Aggregates every directory group independently.
pub fn aggregate(groups: &[FragmentGroup], threshold: usize) -> Result<Vec<ShardFile>> {
    let mut written = Vec::new();
    let mut first = 0;
    for g in groups {
        written.extend(aggregate_group(g, first, threshold)?);
        first += g.files.len();
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn single(i: usize) -> Fragment {
        Fragment::new(
            format!("d/f{}.blif", i),
            i,
            &format!(
                ".model f{i}\n.inputs a{i}\n.outputs n{i}\n.names a{i} n{i}\n1 1\n.end\n"
            ),
        )
    }

    #[test]
    fn threshold_boundary() {
        let mut b = ShardBuilder::new(1000);
        for i in 0..2500 {
            b.push(&single(i)).unwrap();
        }
        let shards = b.finish();
        let sizes: Vec<usize> = shards.iter().map(|s| s.statement_count()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        let idx: Vec<usize> = shards.iter().map(|s| s.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn crossing_fragment_stays_whole() {
        let big = Fragment::new(
            "d/big.blif",
            1,
            ".inputs a\n.outputs x y z\n.names a x\n1 1\n.names a y\n1 1\n.names a z\n0 1\n",
        );
        let mut b = ShardBuilder::new(2);
        b.push(&single(0)).unwrap();
        b.push(&big).unwrap();
        b.push(&single(2)).unwrap();
        let shards = b.finish();
        let sizes: Vec<usize> = shards.iter().map(|s| s.statement_count()).collect();
        assert_eq!(sizes, vec![4, 1]);
    }

    #[test]
    fn ports_merge_and_body_concatenates() {
        let frags: Vec<Fragment> = (0..3).map(single).collect();
        let mut b = ShardBuilder::new(10);
        for f in &frags {
            b.push(f).unwrap();
        }
        let shards = b.finish();
        assert_eq!(shards.len(), 1);
        let s = &shards[0];
        for f in &frags {
            assert!(f.inputs().unwrap().is_subset(&s.inputs));
            assert!(f.outputs().unwrap().is_subset(&s.outputs));
        }
        let expected: Vec<String> = frags
            .iter()
            .flat_map(|f| f.statement_body().unwrap())
            .collect();
        assert_eq!(s.body(), expected);
        assert_eq!(
            s.text(),
            "\
.model merged0
.inputs a0 a1 a2
.outputs n0 n1 n2
.names a0 n0
1 1
.names a1 n1
1 1
.names a2 n2
1 1
.end
"
        );
    }

    #[test]
    fn no_fragments_no_shards() {
        assert!(ShardBuilder::new(5).finish().is_empty());
    }

    #[test]
    fn groups_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut groups = Vec::new();
        for (d, n) in [("x", 3), ("y", 1)] {
            let dir = tmp.path().join(d);
            fs::create_dir(&dir).unwrap();
            let mut files = Vec::new();
            for i in 0..n {
                let p = dir.join(format!("f{}.blif", i));
                fs::write(&p, single(i).text()).unwrap();
                files.push(p);
            }
            groups.push(FragmentGroup { dir, files });
        }

        let written = aggregate(&groups, 2).unwrap();
        let names: Vec<PathBuf> = written.iter().map(|w| w.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                tmp.path().join("x/merged0.blif"),
                tmp.path().join("x/merged1.blif"),
                tmp.path().join("y/merged0.blif"),
            ]
        );
        let text = fs::read_to_string(tmp.path().join("x/merged1.blif")).unwrap();
        assert!(text.starts_with(".model merged1\n.inputs a2\n.outputs n2\n"));
        assert!(text.ends_with(".end\n"));
        // fragments are kept
        assert!(tmp.path().join("x/f0.blif").exists());
    }
}
