//! Edit session for one open model.
//!
//! # Responsibility
//! Holds the current model snapshot together with its label and view
//! definitions, and the undo/redo history of model edits.
//!
//! # Invariants
//! - every model change goes through [`apply_batch`], so it is hash checked,
//!   atomic and acyclic
//! - at most [`MAX_UNDO`] entries are kept; the oldest is dropped first
//! - a new submit clears the redo stack
//!
//! Label and view edits replace the definition lists; when a label edit
//! implies node label rewrites those are submitted as one model commit.

use super::{ApplyError, Change, EditBatch, apply_batch, model_hash};
use crate::Result;
use crate::diagnostics;
use crate::labels::{self, Label};
use crate::model::Model;
use crate::view::{self, View};

use anyhow::{Context, bail};
use std::collections::VecDeque;

pub const MAX_UNDO: usize = 50;

/// One committed model edit.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub message: String,
    pub before: Model,
    pub after: Model,
}

#[derive(Debug, Clone)]
pub struct Session {
    model: Model,
    labels: Vec<Label>,
    views: Vec<View>,
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
}

impl Session {
    pub fn new(model: Model, labels: Vec<Label>, views: Vec<View>) -> Self {
        Self {
            model,
            labels,
            views,
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn model_hash(&self) -> String {
        model_hash(&self.model)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Messages of the undoable commits, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.undo.iter().map(|e| e.message.as_str()).collect()
    }

    /// Apply a batch prepared against the current model and record it.
    pub fn submit(&mut self, batch: &EditBatch, message: Option<&str>) -> std::result::Result<&Model, ApplyError> {
        let next = apply_batch(&self.model, batch)?;

        let message = match message {
            Some(m) => m.to_string(),
            None => default_message(&batch.changes),
        };
        tracing::debug!(%message, changes = batch.changes.len(), "commit");

        let before = std::mem::replace(&mut self.model, next);
        self.undo.push_back(UndoEntry {
            message,
            before,
            after: self.model.clone(),
        });
        if self.undo.len() > MAX_UNDO {
            tracing::debug!("undo queue full at {} entries, removing oldest", MAX_UNDO);
            self.undo.pop_front();
        }
        self.redo.clear();

        Ok(&self.model)
    }

    /// Submit changes computed against the current model.
    pub fn submit_changes(&mut self, changes: Vec<Change>) -> std::result::Result<&Model, ApplyError> {
        let batch = EditBatch::new(&self.model, changes);
        self.submit(&batch, None)
    }

    /// Restore the model before the last commit; returns its message.
    pub fn undo(&mut self) -> Result<String> {
        let Some(entry) = self.undo.pop_back() else {
            bail!("Nothing in undo-queue - cannot undo");
        };
        self.model = entry.before.clone();
        let message = entry.message.clone();
        self.redo.push(entry);
        Ok(message)
    }

    /// Re-apply the last undone commit; returns its message.
    pub fn redo(&mut self) -> Result<String> {
        let Some(entry) = self.redo.pop() else {
            bail!("Nothing in redo-queue - cannot redo");
        };
        self.model = entry.after.clone();
        let message = entry.message.clone();
        self.undo.push_back(entry);
        Ok(message)
    }

    pub fn add_label(&mut self, label: Label) -> Result<()> {
        let check = labels::is_valid_label_name(&label.name);
        if !check.valid {
            bail!(
                "{}",
                diagnostics::with_hint(format!("invalid label name \"{}\"", label.name), &check.hint)
            );
        }
        if self.labels.iter().any(|l| l.name == label.name) {
            bail!("label \"{}\" already exists", label.name);
        }
        if let Some(parent) = &label.parent {
            if labels::would_create_group_cycle(&self.labels, &label.name, parent) {
                bail!("group \"{}\" cannot have parent \"{}\"", label.name, parent);
            }
        }
        self.labels.insert(0, label);
        Ok(())
    }

    /// Delete a label or group; nodes carrying a deleted label lose it.
    pub fn delete_label(&mut self, name: &str) -> Result<()> {
        let new_labels = labels::labels_after_deletion(&self.labels, name)?;

        let is_group = self.labels.iter().any(|l| l.name == name && l.is_group);
        if !is_group {
            let changes = labels::delete_label_implications(self.model.nodes(), name);
            if !changes.is_empty() {
                let batch = EditBatch::new(&self.model, changes);
                self.submit(&batch, Some(&format!("Deleted label {}.", name)))
                    .with_context(|| format!("remove label {} from nodes", name))?;
            }
        }

        self.labels = new_labels;
        Ok(())
    }

    /// Replace the definition of `old_name`, following a rename into nodes,
    /// group parents and group members.
    pub fn update_label(&mut self, old_name: &str, new_label: Label) -> Result<()> {
        if let Some(parent) = &new_label.parent {
            // Check against the definitions with the rename applied.
            let renamed = labels::labels_after_renaming(&self.labels, &new_label, old_name)?;
            if labels::would_create_group_cycle(&renamed, &new_label.name, parent) {
                bail!("group \"{}\" cannot have parent \"{}\"", new_label.name, parent);
            }
        }

        if new_label.name == old_name {
            let Some(slot) = self.labels.iter_mut().find(|l| l.name == old_name) else {
                bail!("label \"{}\" is not defined", old_name);
            };
            *slot = new_label;
            return Ok(());
        }

        let check = labels::is_valid_label_name(&new_label.name);
        if !check.valid {
            bail!(
                "{}",
                diagnostics::with_hint(format!("invalid label name \"{}\"", new_label.name), &check.hint)
            );
        }

        let new_labels = labels::labels_after_renaming(&self.labels, &new_label, old_name)?;
        if !new_label.is_group {
            let changes = labels::rename_label_implications(self.model.nodes(), &new_label.name, old_name);
            if !changes.is_empty() {
                let batch = EditBatch::new(&self.model, changes);
                self.submit(
                    &batch,
                    Some(&format!("Renamed label {} to {}.", old_name, new_label.name)),
                )
                .with_context(|| format!("rename label {} on nodes", old_name))?;
            }
        }
        self.labels = new_labels;
        Ok(())
    }

    /// Add a view in front of the others. A view without id gets one.
    pub fn add_view(&mut self, mut view: View) -> Result<&View> {
        let check = view::check_view_expression(&view.expression, &self.labels);
        if !check.valid {
            bail!(
                "{}",
                diagnostics::with_hint(format!("invalid view expression \"{}\"", view.expression), &check.hint)
            );
        }
        if view.id.is_none() {
            view.id = Some(uuid::Uuid::new_v4().to_string());
        }
        self.views.insert(0, view);
        Ok(&self.views[0])
    }

    pub fn delete_view(&mut self, view_id: &str) -> bool {
        let before = self.views.len();
        self.views.retain(|v| v.id.as_deref() != Some(view_id));
        self.views.len() != before
    }

    pub fn rename_view(&mut self, view_id: &str, name: &str) -> bool {
        match self.views.iter_mut().find(|v| v.id.as_deref() == Some(view_id)) {
            Some(view) => {
                view.name = Some(name.to_string());
                true
            }
            None => false,
        }
    }
}

fn default_message(changes: &[Change]) -> String {
    match changes {
        [] => "No changes.".to_string(),
        [single] => single.describe(),
        many => format!("Applied {} changes.", many.len()),
    }
}
