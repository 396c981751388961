//! Rendering of clustering results.
//!
//! The layout is plain text meant for inspection:
//!
//! ```text
//! Class: the
//! 	the	a	this
//!
//! Class: cat
//! 	cat	dog
//! ```
//!
//! Writers take any [`std::io::Write`]; I/O errors are returned to the
//! caller and never touch the clustering state.

use crate::class_map::ClassMap;
use crate::history::MergeHistory;
use core::fmt;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};

/// One class and its member tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassGroup {
    /// Class label.
    pub label: String,
    /// Member tokens in first-appearance order.
    pub members: Vec<String>,
}

impl fmt::Display for ClassGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Class: {}", self.label)?;
        write!(f, "\t")?;
        for member in &self.members {
            write!(f, "{member}\t")?;
        }
        writeln!(f)?;
        writeln!(f)
    }
}

/// Group the filtered tokens of `class_map` by class.
///
/// Classes are ordered by their first member's appearance in the corpus.
pub fn group_by_class(class_map: &ClassMap) -> Vec<ClassGroup> {
    let mut groups: Vec<ClassGroup> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for (token, label) in class_map.filtered_entries() {
        let idx = *slot.entry(label).or_insert_with(|| {
            groups.push(ClassGroup {
                label: label.to_string(),
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].members.push(token.to_string());
    }

    groups
}

/// Render every class of `class_map`.
pub fn render_classes(class_map: &ClassMap) -> String {
    group_by_class(class_map)
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Render one `(survivor, absorbed)` line per merge.
pub fn render_history(history: &MergeHistory) -> String {
    history.iter().map(|m| format!("{m}\n")).collect()
}

/// Write [`render_classes`] output to `out`.
pub fn write_classes<W: Write>(out: &mut W, class_map: &ClassMap) -> io::Result<()> {
    for group in group_by_class(class_map) {
        write!(out, "{group}")?;
    }
    out.flush()
}

/// Write [`render_history`] output to `out`.
pub fn write_history<W: Write>(out: &mut W, history: &MergeHistory) -> io::Result<()> {
    for merge in history.iter() {
        writeln!(out, "{merge}")?;
    }
    out.flush()
}
