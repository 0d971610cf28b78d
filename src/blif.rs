//! The blif module reads and writes partition fragments in the
//! Berkeley Logic Interchange Format, as emitted by the ABC
//! partitioner.  Only the structural subset is understood: the
//! `.model` line, the `.inputs` and `.outputs` declaration blocks,
//! `.names` statements, and the `.end` marker.
//!
//! A Fragment keeps the raw lines of its file.  Everything else
//! (ports, statements, the split point between header and body) is
//! derived from those lines on demand, so a pass can rewrite the
//! lines and then look at the result again without keeping two views
//! in sync.
//!
//! Names are compared as whole tokens.  A token is a maximal run of
//! non-blank characters in the code part of a line (everything before
//! a `#`), with a trailing continuation marker stripped.
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::error::{MergeError, Result};

pub const MODEL: &str = ".model";
pub const INPUTS: &str = ".inputs";
pub const OUTPUTS: &str = ".outputs";
pub const NAMES: &str = ".names";
pub const END: &str = ".end";

const CONTINUATION: char = '\\';
const COMMENT: char = '#';

/// Code part of a line, with any comment removed.
fn code(line: &str) -> &str {
    match line.find(COMMENT) {
        Some(at) => &line[..at],
        None => line,
    }
}

pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT)
}

/// True if the line ends with the continuation marker.
pub fn continues(line: &str) -> bool {
    code(line).trim_end().ends_with(CONTINUATION)
}

/// Whitespace separated tokens of a line, ignoring comments and the
/// continuation marker.
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    let c = code(line).trim_end();
    let c = c.strip_suffix(CONTINUATION).unwrap_or(c);
    c.split_whitespace()
}

/// The directive (`.names`, `.inputs`, ...) that starts a line, if any.
pub fn directive(line: &str) -> Option<&str> {
    tokens(line).next().filter(|t| t.starts_with('.'))
}

/// Rewrites every token of `line` found in `renames`.  Whitespace,
/// continuation markers and comments are kept as they are.  A token
/// only matches as a whole, so renaming `w3` leaves `w30` alone.
pub fn rename_line<'a>(line: &'a str, renames: &HashMap<String, String>) -> Cow<'a, str> {
    if renames.is_empty() {
        return Cow::Borrowed(line);
    }
    let c = code(line);
    let comment = &line[c.len()..];

    let mut out = String::with_capacity(line.len() + 8);
    let mut changed = false;
    let mut rest = c;
    while !rest.is_empty() {
        let ws = rest.len() - rest.trim_start().len();
        out.push_str(&rest[..ws]);
        rest = &rest[ws..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..end];
        let (name, tail) = match word.strip_suffix(CONTINUATION) {
            Some(n) => (n, &word[n.len()..]),
            None => (word, ""),
        };
        match renames.get(name) {
            Some(new) => {
                out.push_str(new);
                out.push_str(tail);
                changed = true;
            }
            None => out.push_str(word),
        }
        rest = &rest[end..];
    }

    if !changed {
        return Cow::Borrowed(line);
    }
    out.push_str(comment);
    Cow::Owned(out)
}

/// One `.names` block: the header line(s) and the cover lines that
/// follow it.  `start` is the line index of the header within its
/// fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub start: usize,
    pub defined: String,
    pub lines: Vec<String>,
}

impl Statement {
    /// Tokens of the (possibly continued) header, without `.names`.
    pub fn header(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for line in &self.lines {
            out.extend(tokens(line));
            if !continues(line) {
                break;
            }
        }
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    /// Signals the statement reads.
    pub fn references(&self) -> Vec<&str> {
        let mut h = self.header();
        h.pop();
        h
    }

    fn header_open(&self) -> bool {
        let mut open = false;
        for line in &self.lines {
            open = continues(line);
            if !open {
                break;
            }
        }
        open
    }
}

/// A partition fragment: one BLIF file, with its position in the
/// discovery order.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub path: PathBuf,
    pub index: usize,
    pub lines: Vec<String>,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fragment {} ({}), {} lines",
            self.index,
            self.path.display(),
            self.lines.len()
        )
    }
}

impl Fragment {
    pub fn new(path: impl Into<PathBuf>, index: usize, text: &str) -> Fragment {
        Fragment {
            path: path.into(),
            index,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn read(path: &Path, index: usize) -> Result<Fragment> {
        let text = fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
        Ok(Fragment::new(path, index, &text))
    }

    /// The file contents, one newline after every line.
    pub fn text(&self) -> String {
        let mut s = String::new();
        for l in &self.lines {
            s.push_str(l);
            s.push('\n');
        }
        s
    }

    /// For each line, whether its tokens are signal names: declaration
    /// and `.names` header lines, with their continuation lines.  Cover
    /// rows and the `.model` line are not.
    pub fn name_lines(&self) -> Vec<bool> {
        let mut out = Vec::with_capacity(self.lines.len());
        let mut open = false;
        for line in &self.lines {
            let names = open || directive(line).map_or(false, |d| d != MODEL);
            open = names && continues(line);
            out.push(names);
        }
        out
    }

    /// Name used on the `.model` line of the canonical form.
    pub fn model_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("fragment{}", self.index))
    }

    /// Collects the names of every `decl` block (`.inputs` or
    /// `.outputs`), following continuation lines.  Names keep the order
    /// in which they are first seen.  A missing block is an error.
    pub fn ports(&self, decl: &str) -> Result<IndexSet<String>> {
        let mut names = IndexSet::new();
        let mut found = false;
        let mut in_block = false;
        for line in &self.lines {
            let mut toks = tokens(line);
            if !in_block {
                if directive(line) != Some(decl) {
                    continue;
                }
                found = true;
                toks.next();
            }
            names.extend(toks.map(str::to_string));
            in_block = continues(line);
        }
        if !found {
            return Err(MergeError::malformed(
                &self.path,
                format!("no {} declaration", decl),
            ));
        }
        Ok(names)
    }

    pub fn inputs(&self) -> Result<IndexSet<String>> {
        self.ports(INPUTS)
    }

    pub fn outputs(&self) -> Result<IndexSet<String>> {
        self.ports(OUTPUTS)
    }

    /// Index of the first `.names` line.  Everything before it is
    /// header; everything from it onward is body.
    pub fn split_point(&self) -> Result<usize> {
        self.lines
            .iter()
            .position(|l| directive(l) == Some(NAMES))
            .ok_or_else(|| MergeError::malformed(&self.path, "no .names statement"))
    }

    /// Parses the body into statements.  Comment lines are dropped,
    /// parsing stops at `.end`, and any other line (cover rows, or a
    /// directive this crate does not interpret) belongs to the
    /// statement above it.
    pub fn statements(&self) -> Result<Vec<Statement>> {
        let split = self.split_point()?;
        let mut out: Vec<Statement> = Vec::new();
        for (i, line) in self.lines.iter().enumerate().skip(split) {
            let continued = out.last().map_or(false, |s| s.header_open());
            if !continued {
                if is_comment(line) {
                    continue;
                }
                match directive(line) {
                    Some(END) => break,
                    Some(NAMES) => {
                        out.push(Statement {
                            start: i,
                            defined: String::new(),
                            lines: vec![line.clone()],
                        });
                        continue;
                    }
                    _ => {}
                }
            }
            // split points at a .names line, so there is always a statement
            if let Some(s) = out.last_mut() {
                s.lines.push(line.clone());
            }
        }

        for s in &mut out {
            let defined = s.header().last().map(|t| t.to_string());
            match defined {
                Some(d) => s.defined = d,
                None => {
                    return Err(MergeError::malformed(
                        &self.path,
                        format!("statement at line {} defines no signal", s.start + 1),
                    ))
                }
            }
        }
        Ok(out)
    }

    /// Statement lines in file order, without comments or `.end`.
    /// Concatenating the bodies of a set of fragments gives exactly the
    /// statements a shard built from them holds.
    pub fn statement_body(&self) -> Result<Vec<String>> {
        Ok(self
            .statements()?
            .into_iter()
            .flat_map(|s| s.lines)
            .collect())
    }

    /// Referenced signals that are neither declared ports nor defined by
    /// a statement of this fragment.
    pub fn dangling_references(&self) -> Result<Vec<String>> {
        let statements = self.statements()?;
        let mut known: HashSet<String> = statements.iter().map(|s| s.defined.clone()).collect();
        known.extend(self.inputs()?);
        known.extend(self.outputs()?);

        let mut dangling = IndexSet::new();
        for s in &statements {
            for r in s.references() {
                if !known.contains(r) {
                    dangling.insert(r.to_string());
                }
            }
        }
        Ok(dangling.into_iter().collect())
    }
}

/// Canonical three-line header: model, inputs, outputs.
pub fn write_header(
    out: &mut String,
    model: &str,
    inputs: &IndexSet<String>,
    outputs: &IndexSet<String>,
) {
    out.push_str(MODEL);
    out.push(' ');
    out.push_str(model);
    out.push('\n');
    write_ports(out, INPUTS, inputs);
    write_ports(out, OUTPUTS, outputs);
}

fn write_ports(out: &mut String, decl: &str, names: &IndexSet<String>) {
    out.push_str(decl);
    for n in names {
        out.push(' ');
        out.push_str(n);
    }
    out.push('\n');
}
