//! Replace a Quip document's body using only prepend and delete edits.
//!
//! Quip has no "replace body" call. A run goes through four steps:
//!
//! 1. **Mark**: prepend the new content followed by a uniquely named
//!    `<h1>` marker. The edit response holds the resulting body.
//! 2. **Plan**: scan the top-level headings of that body. Every heading
//!    after the marker belongs to the old content. An old heading without
//!    a section id can only be deleted by its text; if the new content has
//!    a heading with the same text, the run stops here with the marker in
//!    place.
//! 3. **Execute**: delete each old section concurrently, then delete the
//!    marker's own range.
//! 4. **Terminal**: succeed, or report every deletion that failed. Nothing
//!    is rolled back; the new content is already in place.
//!
//! The new content is at the top of the document from step 1 on, so a
//! reader never sees the document without it.

use crate::error::{DeletionFailure, SyncError};
use crate::html::{heading_level, Document};
use async_trait::async_trait;
use futures::future::join_all;
use quip_api::{DocumentHandle, EditOperation, EditResponse, QuipClient, ThreadInfo};
use std::collections::HashSet;
use std::time::Duration;

/// The edit primitives reconciliation needs.
#[async_trait]
pub trait RemoteDocuments: Send + Sync {
    async fn fetch_full_html(&self, handle: &DocumentHandle) -> quip_api::Result<String>;

    async fn edit_document(
        &self,
        handle: &DocumentHandle,
        operation: EditOperation,
    ) -> quip_api::Result<EditResponse>;
}

#[async_trait]
impl RemoteDocuments for QuipClient {
    async fn fetch_full_html(&self, handle: &DocumentHandle) -> quip_api::Result<String> {
        QuipClient::fetch_full_html(self, handle).await
    }

    async fn edit_document(
        &self,
        handle: &DocumentHandle,
        operation: EditOperation,
    ) -> quip_api::Result<EditResponse> {
        QuipClient::edit_document(self, handle, operation).await
    }
}

/// Bounded re-read used when the prepend response does not include the marker.
#[derive(Debug, Clone, Copy)]
pub struct ReadAfterWrite {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for ReadAfterWrite {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub marker: String,
    /// Old top-level sections removed
    pub removed_sections: usize,
    pub thread: ThreadInfo,
    /// Document body after the final deletion
    pub html: String,
}

pub struct Reconciler<'a> {
    remote: &'a dyn RemoteDocuments,
    read_after_write: ReadAfterWrite,
}

impl<'a> Reconciler<'a> {
    pub fn new(remote: &'a dyn RemoteDocuments) -> Self {
        Self {
            remote,
            read_after_write: ReadAfterWrite::default(),
        }
    }

    pub fn with_read_after_write(mut self, policy: ReadAfterWrite) -> Self {
        self.read_after_write = policy;
        self
    }

    /// Make the document's body equal `content`.
    pub async fn reconcile(
        &self,
        handle: &DocumentHandle,
        content: &str,
    ) -> Result<ReconcileReport, SyncError> {
        let marker = format!("DELETE{}", chrono::Utc::now().timestamp_millis());
        self.reconcile_with_marker(handle, content, &marker).await
    }

    pub async fn reconcile_with_marker(
        &self,
        handle: &DocumentHandle,
        content: &str,
        marker: &str,
    ) -> Result<ReconcileReport, SyncError> {
        // Mark
        let prepend = format!(
            "{}<h1>{}</h1><p><em>Delete after this marker</em></p>",
            content, marker
        );
        let marked = self
            .remote
            .edit_document(handle, EditOperation::Prepend(prepend))
            .await?;
        let link = if marked.thread.link.is_empty() {
            handle.to_string()
        } else {
            marked.thread.link.clone()
        };

        // Plan
        let plan = match plan_deletions(&marked.html, marker) {
            Some(plan) => plan,
            None => self.reread_until_marked(handle, marker, &link).await?,
        };
        tracing::debug!(handle = %handle, old_sections = plan.deletions.len(), "Planned reconciliation");
        if !plan.ambiguous.is_empty() {
            tracing::warn!(
                handle = %handle,
                headings = ?plan.ambiguous,
                "Old sections share headings with the new content, skipping deletions"
            );
            return Err(SyncError::AmbiguousSection {
                link,
                headings: plan.ambiguous,
            });
        }
        let plan = plan.deletions;

        // Execute
        let attempted = plan.len() + 1;
        let results = join_all(plan.iter().map(|op| self.remote.edit_document(handle, op.clone()))).await;
        let failures: Vec<DeletionFailure> = plan
            .iter()
            .zip(results)
            .filter_map(|(op, result)| {
                result.err().map(|error| DeletionFailure {
                    target: operation_target(op),
                    error,
                })
            })
            .collect();

        if !failures.is_empty() {
            // Leave the marker in place so the stale content stays visible
            tracing::warn!(
                handle = %handle,
                failed = failures.len(),
                "Skipping marker cleanup after failed deletions"
            );
            return Err(SyncError::PartialFailure {
                link,
                failures,
                attempted,
            });
        }

        let cleaned = self
            .remote
            .edit_document(handle, EditOperation::DeleteRange(marker.to_string()))
            .await
            .map_err(|error| SyncError::PartialFailure {
                link: link.clone(),
                failures: vec![DeletionFailure {
                    target: marker.to_string(),
                    error,
                }],
                attempted,
            })?;

        Ok(ReconcileReport {
            marker: marker.to_string(),
            removed_sections: plan.len(),
            thread: cleaned.thread,
            html: cleaned.html,
        })
    }

    async fn reread_until_marked(
        &self,
        handle: &DocumentHandle,
        marker: &str,
        link: &str,
    ) -> Result<DeletionPlan, SyncError> {
        let mut delay = self.read_after_write.initial_delay;
        for attempt in 1..=self.read_after_write.attempts {
            tokio::time::sleep(delay).await;
            let body = self.remote.fetch_full_html(handle).await?;
            if let Some(plan) = plan_deletions(&body, marker) {
                return Ok(plan);
            }
            tracing::debug!(attempt, "Marker not visible yet");
            delay *= 2;
        }
        Err(SyncError::MarkerNotFound {
            link: link.to_string(),
            marker: marker.to_string(),
        })
    }
}

/// What Plan decided for the body after the marker was prepended.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionPlan {
    pub deletions: Vec<EditOperation>,
    /// Old headings without a section id whose text also appears as a
    /// heading at or before the marker. Deleting them by text would hit
    /// the new copy first.
    pub ambiguous: Vec<String>,
}

/// Deletions for every top-level section after `marker`, or `None` when the
/// marker heading is not among the top-level headings.
///
/// Top level is the smallest heading level present in the body.
pub fn plan_deletions(body: &str, marker: &str) -> Option<DeletionPlan> {
    let doc = Document::parse(body);
    let headings: Vec<(u8, usize)> = doc
        .descendants(doc.root())
        .into_iter()
        .filter_map(|id| doc.tag_name(id).and_then(heading_level).map(|level| (level, id)))
        .collect();
    let top = headings.iter().map(|(level, _)| *level).min()?;

    let marker_at = headings
        .iter()
        .position(|&(level, id)| level == top && doc.text_content(id).trim() == marker)?;
    let (before, after) = headings.split_at(marker_at + 1);
    let new_texts: HashSet<String> = before
        .iter()
        .map(|&(_, id)| doc.text_content(id).trim().to_string())
        .collect();

    let mut plan = DeletionPlan {
        deletions: Vec::new(),
        ambiguous: Vec::new(),
    };
    for &(_, id) in after.iter().filter(|(level, _)| *level == top) {
        match doc.attr(id, "id").filter(|v| !v.is_empty()) {
            Some(section_id) => plan
                .deletions
                .push(EditOperation::DeleteSection(section_id.to_string())),
            None => {
                let text = doc.text_content(id).trim().to_string();
                if new_texts.contains(&text) {
                    plan.ambiguous.push(text);
                } else {
                    plan.deletions.push(EditOperation::DeleteRange(text));
                }
            }
        }
    }
    Some(plan)
}

fn operation_target(op: &EditOperation) -> String {
    match op {
        EditOperation::DeleteSection(s) | EditOperation::DeleteRange(s) => s.clone(),
        EditOperation::Append(_) | EditOperation::Prepend(_) => String::new(),
        EditOperation::Custom { anchor, .. } => anchor.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted stand-in for a Quip document.
    //!
    //! The body is a list of top-level blocks. Headings get section ids on
    //! insert (unless disabled). Deleting a heading's section or range removes
    //! it and everything up to the next heading of the same or higher level.

    use super::*;
    use quip_api::ApiError;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    #[derive(Debug, Clone)]
    struct Block {
        html: String,
        heading: Option<(u8, String, Option<String>)>,
    }

    pub struct FakeQuip {
        blocks: Mutex<Vec<Block>>,
        next_id: Mutex<usize>,
        assign_ids: bool,
        omit_html_in_prepend: bool,
        /// Fetches leave out the marker heading
        hide_marker: bool,
        /// Deletions wait here before applying, so they only complete if
        /// issued concurrently
        delete_barrier: Option<Barrier>,
        failing_targets: Mutex<HashSet<String>>,
        calls: Mutex<Vec<EditOperation>>,
        pub snapshots: Mutex<Vec<String>>,
        pub fetches: Mutex<usize>,
    }

    impl FakeQuip {
        pub fn new(initial_html: &str) -> Self {
            let fake = Self {
                blocks: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
                assign_ids: true,
                omit_html_in_prepend: false,
                hide_marker: false,
                delete_barrier: None,
                failing_targets: Mutex::new(HashSet::new()),
                calls: Mutex::new(Vec::new()),
                snapshots: Mutex::new(Vec::new()),
                fetches: Mutex::new(0),
            };
            let blocks = fake.to_blocks(initial_html);
            *fake.blocks.lock().unwrap() = blocks;
            fake
        }

        pub fn without_section_ids(initial_html: &str) -> Self {
            let mut fake = Self::new("");
            fake.assign_ids = false;
            let blocks = fake.to_blocks(initial_html);
            *fake.blocks.lock().unwrap() = blocks;
            fake
        }

        pub fn with_delete_barrier(mut self, parties: usize) -> Self {
            self.delete_barrier = Some(Barrier::new(parties));
            self
        }

        pub fn failing(mut self, target: &str) -> Self {
            self.failing_targets.get_mut().unwrap().insert(target.to_string());
            self
        }

        /// Let every target succeed from now on.
        pub fn recover(&self) {
            self.failing_targets.lock().unwrap().clear();
        }

        pub fn lagging_prepend_response(mut self) -> Self {
            self.omit_html_in_prepend = true;
            self
        }

        pub fn marker_never_visible(mut self) -> Self {
            self.omit_html_in_prepend = true;
            self.hide_marker = true;
            self
        }

        pub fn body(&self) -> String {
            self.blocks.lock().unwrap().iter().map(|b| b.html.as_str()).collect()
        }

        pub fn calls(&self) -> Vec<EditOperation> {
            self.calls.lock().unwrap().clone()
        }

        fn to_blocks(&self, html: &str) -> Vec<Block> {
            let mut doc = Document::parse(html);
            let top = doc.element_children(doc.root());
            top.into_iter()
                .map(|id| {
                    let heading = doc.tag_name(id).and_then(heading_level).map(|level| {
                        let existing = doc.attr(id, "id").map(str::to_string);
                        let section = match existing {
                            Some(id) => Some(id),
                            None if self.assign_ids => {
                                let mut next = self.next_id.lock().unwrap();
                                *next += 1;
                                Some(format!("temp:s:{}", *next))
                            }
                            None => None,
                        };
                        (level, doc.text_content(id).trim().to_string(), section)
                    });
                    if let Some((_, _, Some(section))) = &heading {
                        doc.set_attr(id, "id", section);
                    }
                    Block {
                        html: doc.outer_html(id),
                        heading,
                    }
                })
                .collect()
        }

        fn thread(&self) -> ThreadInfo {
            ThreadInfo {
                id: "THREAD1".to_string(),
                title: "Doc".to_string(),
                link: "https://acme.quip.com/AbC123".to_string(),
                updated_usec: 0,
                secret_path: None,
            }
        }

        fn remove_section<F>(&self, matches: F) -> bool
        where
            F: Fn(&(u8, String, Option<String>)) -> bool,
        {
            let mut blocks = self.blocks.lock().unwrap();
            let Some(start) = blocks
                .iter()
                .position(|b| b.heading.as_ref().is_some_and(&matches))
            else {
                return false;
            };
            let level = blocks[start].heading.as_ref().map(|h| h.0).unwrap_or(1);
            let end = blocks[start + 1..]
                .iter()
                .position(|b| b.heading.as_ref().is_some_and(|h| h.0 <= level))
                .map(|p| start + 1 + p)
                .unwrap_or(blocks.len());
            blocks.drain(start..end);
            true
        }
    }

    #[async_trait]
    impl RemoteDocuments for FakeQuip {
        async fn fetch_full_html(&self, _handle: &DocumentHandle) -> quip_api::Result<String> {
            *self.fetches.lock().unwrap() += 1;
            if !self.hide_marker {
                return Ok(self.body());
            }
            Ok(self
                .blocks
                .lock()
                .unwrap()
                .iter()
                .filter(|b| !b.heading.as_ref().is_some_and(|h| h.1.starts_with("DELETE")))
                .map(|b| b.html.as_str())
                .collect())
        }

        async fn edit_document(
            &self,
            _handle: &DocumentHandle,
            operation: EditOperation,
        ) -> quip_api::Result<EditResponse> {
            self.calls.lock().unwrap().push(operation.clone());

            let is_delete = matches!(
                operation,
                EditOperation::DeleteSection(_) | EditOperation::DeleteRange(_)
            );
            let is_marker = matches!(&operation, EditOperation::DeleteRange(r) if r.starts_with("DELETE"));
            if is_delete && !is_marker {
                if let Some(barrier) = &self.delete_barrier {
                    barrier.wait().await;
                }
            }

            let target = operation_target(&operation);
            if self.failing_targets.lock().unwrap().contains(&target) {
                return Err(ApiError::from_status(500, "/1/threads/edit-document", "boom".to_string()));
            }

            let mut html_in_response = true;
            match &operation {
                EditOperation::Prepend(html) => {
                    let new_blocks = self.to_blocks(html);
                    self.blocks.lock().unwrap().splice(0..0, new_blocks);
                    html_in_response = !self.omit_html_in_prepend;
                }
                EditOperation::Append(html) => {
                    let new_blocks = self.to_blocks(html);
                    self.blocks.lock().unwrap().extend(new_blocks);
                }
                EditOperation::DeleteSection(id) => {
                    if !self.remove_section(|h| h.2.as_deref() == Some(id.as_str())) {
                        return Err(ApiError::from_status(400, "/1/threads/edit-document", "no such section".to_string()));
                    }
                }
                EditOperation::DeleteRange(text) => {
                    if !self.remove_section(|h| h.1 == *text) {
                        return Err(ApiError::from_status(400, "/1/threads/edit-document", "no such range".to_string()));
                    }
                }
                EditOperation::Custom { .. } => {}
            }

            let body = self.body();
            self.snapshots.lock().unwrap().push(body.clone());
            Ok(EditResponse {
                thread: self.thread(),
                html: if html_in_response { body } else { String::new() },
            })
        }
    }
}
