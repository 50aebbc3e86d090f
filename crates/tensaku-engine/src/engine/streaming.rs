//! Applying streamed agent edits.
//!
//! The agent addresses either one cell or the whole document. Cell-scoped
//! text edits go straight into that cell's buffer. Document-scoped text
//! edits are buffered in a [`DocumentEditPlan`] and compiled into structural
//! cell edits when the plan is flushed: on the last batch, or as soon as the
//! agent switches to cell-scoped edits. The two modes never overlap.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tensaku_types::{CellEdit, CellId, EditOrigin, TextEdit, text};
use tracing::debug;

use super::Reconciler;
use crate::error::Result;
use crate::plan::DocumentEditPlan;
use crate::tracker::{TrackerEvent, TrackerState};

/// What a batch of agent edits is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditTarget {
    /// The whole document, as text or as structural cell edits.
    Document,
    /// The cell at this position of the modified document.
    Cell(usize),
}

/// One agent edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEdit {
    /// Line edit against the target's text.
    Text(TextEdit),
    /// Structural or attribute edit of the modified document.
    Cell(CellEdit),
}

/// Which kind of streaming is in progress.
#[derive(Debug, Default)]
pub(super) enum StreamMode {
    #[default]
    Idle,
    /// Document text is being buffered.
    Document {
        plan: DocumentEditPlan,
        touched_lines: u32,
    },
    /// Edits are being applied cell by cell.
    Cells { touched: HashSet<CellId> },
}

impl Reconciler {
    /// Apply one batch of streamed agent edits.
    ///
    /// Marks the session as processing until the last batch. The rewrite
    /// ratio grows with each batch but stays below the configured cap until
    /// `is_last_batch`, which finalizes every pending plan, ends streaming
    /// for every cell, and sets the ratio to 1. The processing flag is
    /// cleared on the last batch even when applying it fails.
    pub async fn apply_agent_edits(&mut self, target: EditTarget, edits: Vec<AgentEdit>, is_last_batch: bool) -> Result<()> {
        if !self.processing {
            self.rewrite_ratio = 0.0;
            self.set_processing(true);
        }

        let result = self.apply_agent_batch(target, edits).await;
        if result.is_ok() {
            self.update_rewrite_ratio();
        }

        if is_last_batch {
            let flushed = self.finish_stream().await;
            return result.and(flushed);
        }
        result
    }

    async fn apply_agent_batch(&mut self, target: EditTarget, edits: Vec<AgentEdit>) -> Result<()> {
        match target {
            EditTarget::Document => {
                for edit in edits {
                    match edit {
                        AgentEdit::Text(edit) => self.buffer_document_text(edit)?,
                        AgentEdit::Cell(edit) => {
                            self.flush_plan().await?;
                            self.apply_agent_cell_edits(vec![edit]).await?;
                        }
                    }
                }
                Ok(())
            }
            EditTarget::Cell(index) => {
                self.flush_plan().await?;

                let mut cell_edits = Vec::new();
                let mut pending_text = Vec::new();
                for edit in edits {
                    match edit {
                        AgentEdit::Text(edit) => pending_text.push(edit),
                        AgentEdit::Cell(edit) => {
                            if !pending_text.is_empty() {
                                cell_edits.push(CellEdit::Content {
                                    index,
                                    edits: std::mem::take(&mut pending_text),
                                });
                            }
                            cell_edits.push(edit);
                        }
                    }
                }
                if !pending_text.is_empty() {
                    cell_edits.push(CellEdit::Content {
                        index,
                        edits: pending_text,
                    });
                }
                self.apply_agent_cell_edits(cell_edits).await
            }
        }
    }

    fn buffer_document_text(&mut self, edit: TextEdit) -> Result<()> {
        if !matches!(self.stream, StreamMode::Document { .. }) {
            debug!(session = %self.session, "buffering document text edits");
            self.stream = StreamMode::Document {
                plan: DocumentEditPlan::from_document(&self.modified, &self.config.cell_separator),
                touched_lines: 0,
            };
        }
        if let StreamMode::Document { plan, touched_lines } = &mut self.stream {
            plan.apply(std::slice::from_ref(&edit))?;
            *touched_lines += edit.touched_lines();
        }
        Ok(())
    }

    /// Compile and apply a buffered document plan, if there is one.
    async fn flush_plan(&mut self) -> Result<()> {
        match std::mem::take(&mut self.stream) {
            StreamMode::Document { plan, .. } => {
                let edits = plan.compile(&self.modified);
                debug!(
                    session = %self.session,
                    text_edits = plan.edits_applied(),
                    cell_edits = edits.len(),
                    "flushing document plan"
                );
                self.stream = StreamMode::Cells {
                    touched: HashSet::new(),
                };
                if edits.is_empty() {
                    return Ok(());
                }
                self.apply_agent_cell_edits(edits).await
            }
            StreamMode::Idle => {
                self.stream = StreamMode::Cells {
                    touched: HashSet::new(),
                };
                Ok(())
            }
            cells @ StreamMode::Cells { .. } => {
                self.stream = cells;
                Ok(())
            }
        }
    }

    async fn apply_agent_cell_edits(&mut self, edits: Vec<CellEdit>) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        let changes = self.modified.apply(edits, EditOrigin::Agent)?;
        let refresh = self.mirror_changes(&changes);

        if let StreamMode::Cells { touched } = &mut self.stream {
            touched.extend(changes.iter().flat_map(|c| super::mirror::touched_cells(&c.kind)));
        }

        for cell in refresh {
            self.refresh_cell(cell, false).await;
        }
        self.resort();
        Ok(())
    }

    fn update_rewrite_ratio(&mut self) {
        let estimate = match &self.stream {
            StreamMode::Idle => return,
            StreamMode::Document { plan, touched_lines } => {
                let total = text::line_count(plan.text()).max(1);
                f64::from(*touched_lines) / f64::from(total)
            }
            StreamMode::Cells { touched } => touched.len() as f64 / self.modified.len().max(1) as f64,
        };
        let capped = estimate.min(self.config.streaming_ratio_cap);
        if capped > self.rewrite_ratio {
            self.set_rewrite_ratio(capped);
        }
    }

    /// End the streaming session. Always clears the processing flag.
    async fn finish_stream(&mut self) -> Result<()> {
        let flushed = self.flush_plan().await;
        self.stream = StreamMode::Idle;

        for tracker in self.trackers.values_mut() {
            if tracker.state() == TrackerState::StreamingAgentEdit {
                tracker.handle(TrackerEvent::LastAgentEdit);
            }
        }

        self.set_rewrite_ratio(1.0);
        self.set_processing(false);
        self.resort();
        debug!(session = %self.session, changes = self.navigator.total(), "agent stream finished");
        flushed
    }
}
