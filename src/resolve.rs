//! Port collision resolution.
//!
//! Fragments are produced independently, so two of them may use the same
//! internal signal name for unrelated nets.  The Resolver walks the
//! fragments in discovery order with one NameRegistry: the first
//! fragment to define a name keeps it, and any later fragment defining
//! the same name gets a new one, `<name>_<fragment index>`.  The rename
//! is applied to every whole-token occurrence on that fragment's
//! declaration and `.names` header lines, so its own references follow
//! the definition.  Cover rows are never touched: `11 1` is a pattern
//! even when `11` is also a net name.
//!
//! Only defined names (the last token of a `.names` header) take part.
//! A name that one fragment only reads is never renamed.
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::blif::{rename_line, tokens, Fragment};
use crate::error::{MergeError, Result};
use crate::fsio::write_atomic;
use crate::registry::{NameRegistry, Registration};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    pub fragment: usize,
    pub from: String,
    pub to: String,
}

#[derive(Default)]
pub struct Resolver {
    pub registry: NameRegistry,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            registry: NameRegistry::new(),
        }
    }

    /// Resolves one fragment in memory.  Returns the renames applied, in
    /// the order of the statements that triggered them.
    pub fn resolve(&mut self, fragment: &mut Fragment) -> Result<Vec<Rename>> {
        let statements = fragment.statements()?;
        let used: HashSet<&str> = fragment.lines.iter().flat_map(|l| tokens(l)).collect();

        let mut map: HashMap<String, String> = HashMap::new();
        let mut renames = Vec::new();
        for s in &statements {
            if map.contains_key(&s.defined) {
                continue;
            }
            if let Registration::Collision(owner) = self.registry.register(&s.defined, fragment.index)
            {
                let to = self.fresh_name(&s.defined, fragment.index, &used);
                debug!(
                    "{}: `{}` already defined by fragment {}, renamed to `{}`",
                    fragment.path.display(),
                    s.defined,
                    owner,
                    to
                );
                self.registry.register(&to, fragment.index);
                map.insert(s.defined.clone(), to.clone());
                renames.push(Rename {
                    fragment: fragment.index,
                    from: s.defined.clone(),
                    to,
                });
            }
        }

        if !map.is_empty() {
            let names = fragment.name_lines();
            for (line, _) in fragment.lines.iter_mut().zip(names).filter(|(_, n)| *n) {
                let new = match rename_line(line, &map) {
                    Cow::Owned(s) => Some(s),
                    Cow::Borrowed(_) => None,
                };
                if let Some(s) = new {
                    *line = s;
                }
            }
        }
        Ok(renames)
    }

    /// `<name>_<index>`, or with a further `_<n>` if that is taken by a
    /// registered name or by any token of the fragment.
    fn fresh_name(&self, name: &str, index: usize, used: &HashSet<&str>) -> String {
        let taken = |n: &str| self.registry.contains(n) || used.contains(n);
        let base = format!("{}_{}", name, index);
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Resolves fragments in order.  Each fragment's `index` must be its
    /// discovery position.
    pub fn resolve_all(&mut self, fragments: &mut [Fragment]) -> Result<Vec<Rename>> {
        let mut renames = Vec::new();
        for f in fragments.iter_mut() {
            renames.extend(self.resolve(f)?);
        }
        Ok(renames)
    }

    /// Reads every fragment, resolves them all in memory, then rewrites
    /// the files that changed.  A malformed fragment stops the pass
    /// before any file is touched.
    pub fn resolve_files(&mut self, paths: &[PathBuf]) -> Result<(Vec<Fragment>, Vec<Rename>)> {
        let mut fragments = paths
            .iter()
            .enumerate()
            .map(|(i, p)| Fragment::read(p, i))
            .collect::<Result<Vec<_>>>()?;

        let renames = self.resolve_all(&mut fragments)?;

        for f in &fragments {
            let dangling = f.dangling_references()?;
            if !dangling.is_empty() {
                warn!(
                    "{} references undeclared signals: {}",
                    f.path.display(),
                    dangling.join(" ")
                );
            }
        }

        let touched: HashSet<usize> = renames.iter().map(|r| r.fragment).collect();
        for f in &fragments {
            if touched.contains(&f.index) {
                write_atomic(&f.path, &f.text())?;
            }
        }
        info!(
            "Resolved {} fragments: {} names registered, {} renamed in {} fragments",
            fragments.len(),
            self.registry.len(),
            renames.len(),
            touched.len()
        );
        Ok((fragments, renames))
    }
}

/// Checks that no defined name is shared by two fragments.
pub fn ensure_unique(fragments: &[Fragment]) -> Result<()> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (pos, f) in fragments.iter().enumerate() {
        for s in f.statements()? {
            match seen.get(&s.defined) {
                Some(&other) if other != pos => {
                    return Err(MergeError::NameCollisionUnresolved {
                        name: s.defined,
                        first: fragments[other].path.clone(),
                        second: f.path.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(s.defined, pos);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frag(name: &str, index: usize, text: &str) -> Fragment {
        Fragment::new(format!("parts/{}.blif", name), index, text)
    }

    const A: &str = "\
.model a
.inputs x y
.outputs o
.names x y w3
11 1
.names w3 w30 o
1- 1
.names x w30
0 1
.end
";

    const B: &str = "\
.model b
.inputs p q
.outputs w3
.names p q t
11 1
.names t q w3
1- 1
.names w3 w30_b
1 1
.end
";

    #[test]
    fn later_definition_is_renamed() {
        let mut frags = vec![frag("a", 0, A), frag("b", 1, B)];
        let mut r = Resolver::new();
        let renames = r.resolve_all(&mut frags).unwrap();

        assert_eq!(
            renames,
            vec![Rename {
                fragment: 1,
                from: "w3".to_string(),
                to: "w3_1".to_string(),
            }]
        );
        // first definer untouched
        assert_eq!(frags[0].text(), A);
        assert_eq!(
            frags[1].text(),
            "\
.model b
.inputs p q
.outputs w3_1
.names p q t
11 1
.names t q w3_1
1- 1
.names w3_1 w30_b
1 1
.end
"
        );
        ensure_unique(&frags).unwrap();
        assert!(frags[1].dangling_references().unwrap().is_empty());
    }

    #[test]
    fn each_collider_gets_its_own_suffix() {
        let c = ".inputs a\n.outputs n\n.names a n\n1 1\n";
        let mut frags = vec![frag("f0", 0, c), frag("f1", 1, c), frag("f2", 2, c)];
        let mut r = Resolver::new();
        r.resolve_all(&mut frags).unwrap();
        let defined: Vec<String> = frags
            .iter()
            .map(|f| f.statements().unwrap()[0].defined.clone())
            .collect();
        assert_eq!(defined, vec!["n", "n_1", "n_2"]);
        assert_eq!(r.registry.owner("n_2"), Some(2));
    }

    #[test]
    fn generated_name_avoids_existing_ones() {
        let f0 = ".inputs a\n.outputs n\n.names a n\n1 1\n.names a n_1\n0 1\n";
        let f1 = ".inputs a\n.outputs n\n.names a n\n1 1\n";
        let mut frags = vec![frag("f0", 0, f0), frag("f1", 1, f1)];
        Resolver::new().resolve_all(&mut frags).unwrap();
        assert_eq!(frags[1].statements().unwrap()[0].defined, "n_1_1");
        ensure_unique(&frags).unwrap();
    }

    #[test]
    fn reference_only_names_are_left_alone() {
        let f0 = ".inputs a\n.outputs s\n.names a s\n1 1\n";
        let f1 = ".inputs s\n.outputs o\n.names s o\n1 1\n";
        let mut frags = vec![frag("f0", 0, f0), frag("f1", 1, f1)];
        let renames = Resolver::new().resolve_all(&mut frags).unwrap();
        assert!(renames.is_empty());
        assert_eq!(frags[1].text(), f1);
    }

    #[test]
    fn numeric_names_leave_cover_rows_alone() {
        let f0 = ".inputs 1 2\n.outputs 11\n.names 1 2 11\n11 1\n";
        let f1 = ".inputs 3 6\n.outputs 23\n.names 3 6 11\n11 1\n.names 11 23\n1 1\n";
        let mut frags = vec![frag("c17a", 0, f0), frag("c17b", 1, f1)];
        Resolver::new().resolve_all(&mut frags).unwrap();
        assert_eq!(
            frags[1].text(),
            ".inputs 3 6\n.outputs 23\n.names 3 6 11_1\n11 1\n.names 11_1 23\n1 1\n"
        );
        assert_eq!(frags[0].text(), f0);
        ensure_unique(&frags).unwrap();
    }

    #[test]
    fn continued_header_is_renamed() {
        let c = ".inputs a b\n.outputs o\n.names a \\\n b n\n11 1\n.names n o\n1 1\n";
        let mut frags = vec![frag("f0", 0, c), frag("f1", 1, c)];
        Resolver::new().resolve_all(&mut frags).unwrap();
        assert_eq!(frags[1].lines[3], " b n_1");
        assert_eq!(frags[1].lines[4], "11 1");
        assert_eq!(frags[1].lines[5], ".names n_1 o_1");
    }

    #[test]
    fn malformed_statement_is_reported() {
        let mut f = frag("bad", 0, ".inputs a\n.outputs o\n.names\n1\n");
        let e = Resolver::new().resolve(&mut f).unwrap_err();
        assert!(e.to_string().contains("parts/bad.blif"));
    }

    #[test]
    fn unique_check_catches_shared_names() {
        let c = ".inputs a\n.outputs n\n.names a n\n1 1\n";
        let frags = vec![frag("f0", 0, c), frag("f1", 1, c)];
        assert!(matches!(
            ensure_unique(&frags),
            Err(MergeError::NameCollisionUnresolved { .. })
        ));
    }

    #[test]
    fn files_are_rewritten_only_when_renamed() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.blif");
        let b = tmp.path().join("b.blif");
        // no trailing newline: an untouched file keeps its exact bytes
        std::fs::write(&a, A.trim_end()).unwrap();
        std::fs::write(&b, B).unwrap();

        let (frags, renames) = Resolver::new()
            .resolve_files(&[a.clone(), b.clone()])
            .unwrap();
        assert_eq!(frags.len(), 2);
        assert_eq!(renames.len(), 1);
        assert_eq!(std::fs::read_to_string(&a).unwrap(), A.trim_end());
        assert!(std::fs::read_to_string(&b).unwrap().contains(".names t q w3_1"));
    }
}
