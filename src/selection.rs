// src/selection.rs
//! Which outline rows are picked for export.
//!
//! Only leaf rows are stored: Subjects, Sections without Subjects, and
//! Subjects that precede the first Section. A Section with Subjects is
//! selected exactly when all of its Subjects are.

use crate::extractors::Outline;
use crate::utils::AppError;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct SelectionState {
    /// `members[i]` is `Some` for a Section row that has Subjects.
    members: Vec<Option<Vec<usize>>>,
    selected: BTreeSet<usize>,
}

impl SelectionState {
    pub fn new(outline: &Outline) -> Self {
        let members = (0..outline.len())
            .map(|i| {
                let subjects = outline.section_members(i);
                if subjects.is_empty() {
                    None
                } else {
                    Some(subjects)
                }
            })
            .collect();
        Self {
            members,
            selected: BTreeSet::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.members.len()
    }

    /// Leaf rows that stand in for `index`.
    fn leaves(&self, index: usize) -> Vec<usize> {
        match self.members.get(index) {
            Some(Some(subjects)) => subjects.clone(),
            Some(None) => vec![index],
            None => Vec::new(),
        }
    }

    /// Selects a row. On a Section this selects all of its Subjects.
    pub fn select(&mut self, index: usize) {
        self.selected.extend(self.leaves(index));
    }

    /// Deselects a row. On a Section this deselects all of its Subjects.
    pub fn deselect(&mut self, index: usize) {
        for leaf in self.leaves(index) {
            self.selected.remove(&leaf);
        }
    }

    /// True when `index` is a Section with Subjects, all of them selected.
    pub fn section_fully_selected(&self, index: usize) -> bool {
        match self.members.get(index) {
            Some(Some(subjects)) => subjects.iter().all(|s| self.selected.contains(s)),
            _ => false,
        }
    }

    pub fn is_selected(&self, index: usize) -> bool {
        match self.members.get(index) {
            Some(Some(_)) => self.section_fully_selected(index),
            Some(None) => self.selected.contains(&index),
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        for index in 0..self.row_count() {
            self.select(index);
        }
    }

    /// Selected rows in outline order, derived Section rows included.
    pub fn selected_rows(&self) -> Vec<usize> {
        (0..self.row_count()).filter(|&i| self.is_selected(i)).collect()
    }
}

/// Parses a row list such as `0,3-7,12` into indices.
pub fn parse_row_list(list: &str, row_count: usize) -> Result<Vec<usize>, AppError> {
    let parse_index = |s: &str| -> Result<usize, AppError> {
        let index: usize = s
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid row index '{}'", s.trim())))?;
        if index >= row_count {
            return Err(AppError::Config(format!(
                "Row {} out of range (outline has {} rows)",
                index, row_count
            )));
        }
        Ok(index)
    };

    let mut rows = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (parse_index(from)?, parse_index(to)?);
                if from > to {
                    return Err(AppError::Config(format!("Reversed row range '{}'", part)));
                }
                rows.extend(from..=to);
            }
            None => rows.push(parse_index(part)?),
        }
    }
    Ok(rows)
}
