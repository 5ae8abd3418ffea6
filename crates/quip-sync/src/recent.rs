//! Recently viewed documents and the import picker's suggestions.

use async_trait::async_trait;
use quip_api::{QuipClient, ThreadInfo, RECENT_THREAD_COUNT};
use tokio::sync::RwLock;

/// Listing endpoints used to suggest documents to import.
#[async_trait]
pub trait ThreadDirectory: Send + Sync {
    async fn recent_threads(&self) -> quip_api::Result<Vec<ThreadInfo>>;

    async fn search_titles(&self, query: &str) -> quip_api::Result<Vec<ThreadInfo>>;
}

#[async_trait]
impl ThreadDirectory for QuipClient {
    async fn recent_threads(&self) -> quip_api::Result<Vec<ThreadInfo>> {
        let threads = QuipClient::recent_threads(self, RECENT_THREAD_COUNT).await?;
        Ok(threads.into_values().map(|r| r.thread).collect())
    }

    async fn search_titles(&self, query: &str) -> quip_api::Result<Vec<ThreadInfo>> {
        let results = QuipClient::search_titles(self, query).await?;
        Ok(results.into_iter().map(|r| r.thread).collect())
    }
}

/// Most recently updated threads, newest first.
///
/// Loading is best-effort: a failed refresh keeps whatever was cached.
#[derive(Default)]
pub struct RecentThreadCache {
    threads: RwLock<Vec<ThreadInfo>>,
}

impl RecentThreadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(&self, directory: &dyn ThreadDirectory) {
        match directory.recent_threads().await {
            Ok(mut threads) => {
                threads.sort_by(|a, b| b.updated_usec.cmp(&a.updated_usec));
                tracing::debug!(count = threads.len(), "Loaded recent documents");
                *self.threads.write().await = threads;
            }
            Err(e) => tracing::warn!(error = %e, "Could not load recent documents"),
        }
    }

    pub async fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.read().await.clone()
    }

    pub async fn clear(&self) {
        self.threads.write().await.clear();
    }
}

/// One entry offered by the import picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub link: String,
    /// None when the entry is the user's own input
    pub title: Option<String>,
}

impl From<&ThreadInfo> for Suggestion {
    fn from(thread: &ThreadInfo) -> Self {
        Self {
            link: thread.link.clone(),
            title: Some(thread.title.clone()),
        }
    }
}

/// Suggests documents for the import prompt as the user types.
///
/// Queries are matched case-insensitively against title and link. A title
/// search only runs when neither the previous search results nor the recent
/// documents match, and its results are reused while the query keeps
/// extending the searched text.
pub struct ImportPicker<'a> {
    directory: &'a dyn ThreadDirectory,
    recent: &'a RecentThreadCache,
    last_search: Option<(String, Vec<ThreadInfo>)>,
}

impl<'a> ImportPicker<'a> {
    pub fn new(directory: &'a dyn ThreadDirectory, recent: &'a RecentThreadCache) -> Self {
        Self {
            directory,
            recent,
            last_search: None,
        }
    }

    pub async fn suggest(&mut self, query: &str) -> Vec<Suggestion> {
        let recent = self.recent.threads().await;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return recent.iter().map(Suggestion::from).collect();
        }

        if let Some((searched, results)) = &self.last_search {
            if needle.contains(searched.as_str()) {
                let matches = matching(results, &needle);
                if !matches.is_empty() {
                    return matches;
                }
            }
        }

        let matches = matching(&recent, &needle);
        if !matches.is_empty() {
            return matches;
        }

        match self.directory.search_titles(query.trim()).await {
            Ok(results) => {
                let matches = matching(&results, &needle);
                self.last_search = Some((needle, results));
                if !matches.is_empty() {
                    return matches;
                }
            }
            Err(e) => tracing::warn!(error = %e, query, "Document search failed"),
        }

        vec![Suggestion {
            link: query.trim().to_string(),
            title: None,
        }]
    }
}

fn matching(threads: &[ThreadInfo], needle: &str) -> Vec<Suggestion> {
    threads
        .iter()
        .filter(|t| {
            t.title.to_lowercase().contains(needle) || t.link.to_lowercase().contains(needle)
        })
        .map(Suggestion::from)
        .collect()
}
