use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::pack::ModpackDescriptor;
use crate::mod_site::Slug;
use crate::resolve::search::SearchChain;
use crate::uwu_colors::{ErrStyle, PROJECT_ID_STYLE, SLUG_STYLE};

pub mod search;

/// What to do with entries no search provider could resolve.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum UnresolvedPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Leave them without a URL, they won't be acquired.
    Skip,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Could not resolve a page for project IDs: {}", .0.iter().join(", "))]
    Unresolved(Vec<u32>),
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct ResolutionSummary {
    /// Entries resolved from the link list.
    pub paired: usize,
    /// Entries resolved by searching.
    pub searched: usize,
    /// Project IDs left without a URL. Only non-empty under [UnresolvedPolicy::Skip].
    pub unresolved: Vec<u32>,
}

pub struct Resolver {
    chain: Arc<SearchChain>,
    concurrency: usize,
    policy: UnresolvedPolicy,
}

impl Resolver {
    pub fn new(chain: SearchChain, concurrency: usize, policy: UnresolvedPolicy) -> Self {
        Self {
            chain: Arc::new(chain),
            concurrency: concurrency.max(1),
            policy,
        }
    }

    /// Fills in `resolved_url` and `display_mask` on every entry: first by position from the
    /// link list, then by searching for whatever is left.
    pub async fn resolve(
        &self,
        descriptor: &mut ModpackDescriptor,
        links: &[String],
    ) -> Result<ResolutionSummary, ResolveError> {
        let paired = pair_links(descriptor, links);

        let limiter = Arc::new(Semaphore::new(self.concurrency));
        let lookups = descriptor
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_resolved())
            .map(|(i, e)| {
                (
                    i,
                    submit_lookup(limiter.clone(), self.chain.clone(), e.project_id),
                )
            })
            .collect::<Vec<_>>();

        let mut searched = 0;
        for (i, lookup) in lookups {
            let entry = &mut descriptor.entries[i];
            let slug = match lookup.await {
                Ok(slug) => slug,
                Err(e) => {
                    log::error!("Search task for project {} failed: {}", entry.project_id, e);
                    None
                }
            };
            if let Some(slug) = slug {
                entry.resolve_slug(&slug);
                searched += 1;
                log::info!(
                    "Resolved project {} to {}",
                    entry.project_id.errstyle(PROJECT_ID_STYLE),
                    entry.label().errstyle(SLUG_STYLE)
                );
            }
        }

        let unresolved = descriptor.unresolved_ids();
        if !unresolved.is_empty() && self.policy == UnresolvedPolicy::Abort {
            return Err(ResolveError::Unresolved(unresolved));
        }

        Ok(ResolutionSummary {
            paired,
            searched,
            unresolved,
        })
    }
}

/// Assigns `links[i]` to `entries[i]`. The pairing is purely positional: the link list must
/// list mods in manifest order. Extra links or extra entries are ignored with a warning.
pub fn pair_links(descriptor: &mut ModpackDescriptor, links: &[String]) -> usize {
    if links.is_empty() {
        return 0;
    }
    if links.len() != descriptor.entries.len() {
        log::warn!(
            "Link list has {} links but the manifest has {} files, pairing the first {}",
            links.len(),
            descriptor.entries.len(),
            links.len().min(descriptor.entries.len())
        );
    }

    let mut paired = 0;
    for (entry, link) in descriptor.entries.iter_mut().zip(links) {
        if link.is_empty() {
            continue;
        }
        entry.resolve_url(link.clone());
        paired += 1;
    }
    paired
}

fn submit_lookup(
    limiter: Arc<Semaphore>,
    chain: Arc<SearchChain>,
    project_id: u32,
) -> JoinHandle<Option<Slug>> {
    tokio::task::spawn(async move {
        if chain.is_empty() {
            return None;
        }
        let _guard = limiter.acquire().await.ok()?;
        chain.lookup(project_id).await
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::pack::ModEntry;
    use crate::mod_site::Category;
    use crate::resolve::search::{SearchError, SearchProvider};

    /// Answers from a fixed table and counts how often it was asked.
    struct TableSearch {
        name: &'static str,
        answers: HashMap<String, Slug>,
        calls: Arc<AtomicUsize>,
    }

    impl TableSearch {
        fn new(name: &'static str, answers: &[(&str, Slug)]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    answers: answers
                        .iter()
                        .map(|(q, s)| (q.to_string(), s.clone()))
                        .collect(),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for TableSearch {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, query: &str) -> Result<Option<Slug>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers.get(query).cloned())
        }
    }

    struct FailingSearch;

    #[async_trait::async_trait]
    impl SearchProvider for FailingSearch {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(&self, query: &str) -> Result<Option<Slug>, SearchError> {
            Err(SearchError::BadQuery(query.to_string()))
        }
    }

    struct SlowSearch;

    #[async_trait::async_trait]
    impl SearchProvider for SlowSearch {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _query: &str) -> Result<Option<Slug>, SearchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(Slug::new(Category::Mod, "too-late")))
        }
    }

    fn descriptor(ids: &[u32]) -> ModpackDescriptor {
        ModpackDescriptor {
            minecraft: serde_json::Value::Null,
            manifest_type: None,
            manifest_version: None,
            name: "Test Pack".to_string(),
            version: "1.0".to_string(),
            author: None,
            entries: ids.iter().map(|id| ModEntry::new(*id, id * 2)).collect(),
            overrides: None,
        }
    }

    fn chain(providers: Vec<Box<dyn SearchProvider>>) -> SearchChain {
        SearchChain::new(providers, Duration::from_millis(200))
    }

    #[test]
    fn pairing_is_positional() {
        let mut d = descriptor(&[1, 2, 3]);
        let paired = pair_links(&mut d, &["urlA".to_string(), "urlB".to_string()]);
        assert_eq!(paired, 2);
        assert_eq!(d.entries[0].resolved_url.as_deref(), Some("urlA"));
        assert_eq!(d.entries[1].resolved_url.as_deref(), Some("urlB"));
        assert_eq!(d.entries[2].resolved_url, None);
        assert_eq!(d.unresolved_ids(), vec![3]);
    }

    #[test]
    fn pairing_ignores_identifiers() {
        // The link for project 2 comes first; it is still assigned to project 1.
        let mut d = descriptor(&[1, 2]);
        pair_links(
            &mut d,
            &[
                "https://www.curseforge.com/minecraft/mc-mods/two".to_string(),
                "https://www.curseforge.com/minecraft/mc-mods/one".to_string(),
            ],
        );
        assert_eq!(d.entries[0].display_mask.as_deref(), Some("two"));
        assert_eq!(d.entries[1].display_mask.as_deref(), Some("one"));
    }

    #[test]
    fn extra_links_are_truncated() {
        let mut d = descriptor(&[1]);
        let paired = pair_links(&mut d, &["a".to_string(), "b".to_string()]);
        assert_eq!(paired, 1);
        assert_eq!(d.entries.len(), 1);
        assert_eq!(d.entries[0].resolved_url.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn unpaired_entries_fall_through_to_search() {
        let (provider, calls) = TableSearch::new("a", &[("3", Slug::new(Category::Mod, "third-mod"))]);
        let resolver = Resolver::new(chain(vec![Box::new(provider)]), 2, UnresolvedPolicy::Abort);
        let mut d = descriptor(&[1, 2, 3]);

        let summary = resolver
            .resolve(&mut d, &["urlA".to_string(), "urlB".to_string()])
            .await
            .unwrap();

        assert_eq!(summary.paired, 2);
        assert_eq!(summary.searched, 1);
        assert!(summary.unresolved.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            d.entries[2].resolved_url.as_deref(),
            Some("https://www.curseforge.com/minecraft/mc-mods/third-mod")
        );
        assert_eq!(d.entries[2].display_mask.as_deref(), Some("third mod"));
    }

    #[tokio::test]
    async fn first_provider_hit_short_circuits() {
        let (first, first_calls) = TableSearch::new("a", &[("1", Slug::new(Category::Mod, "from-a"))]);
        let (second, second_calls) = TableSearch::new("b", &[("1", Slug::new(Category::Mod, "from-b"))]);
        let resolver = Resolver::new(
            chain(vec![Box::new(first), Box::new(second)]),
            1,
            UnresolvedPolicy::Abort,
        );
        let mut d = descriptor(&[1]);

        resolver.resolve(&mut d, &[]).await.unwrap();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.entries[0].display_mask.as_deref(), Some("from a"));
    }

    #[tokio::test]
    async fn failing_and_slow_providers_are_skipped() {
        let (last, last_calls) = TableSearch::new(
            "c",
            &[("1", Slug::new(Category::ResourcePack, "faithful-32x"))],
        );
        let resolver = Resolver::new(
            chain(vec![Box::new(FailingSearch), Box::new(SlowSearch), Box::new(last)]),
            1,
            UnresolvedPolicy::Abort,
        );
        let mut d = descriptor(&[1]);

        resolver.resolve(&mut d, &[]).await.unwrap();

        assert_eq!(last_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            d.entries[0].resolved_url.as_deref(),
            Some("https://www.curseforge.com/minecraft/texture-packs/faithful-32x")
        );
        assert_eq!(d.entries[0].category(), Some(Category::ResourcePack));
    }

    #[tokio::test]
    async fn abort_policy_reports_every_miss() {
        let (provider, _) = TableSearch::new("a", &[("2", Slug::new(Category::Mod, "two"))]);
        let resolver = Resolver::new(chain(vec![Box::new(provider)]), 4, UnresolvedPolicy::Abort);
        let mut d = descriptor(&[1, 2, 3]);

        match resolver.resolve(&mut d, &[]).await {
            Err(ResolveError::Unresolved(ids)) => assert_eq!(ids, vec![1, 3]),
            other => panic!("expected unresolved error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn skip_policy_leaves_misses_unresolved() {
        let (provider, _) = TableSearch::new("a", &[("2", Slug::new(Category::Mod, "two"))]);
        let resolver = Resolver::new(chain(vec![Box::new(provider)]), 4, UnresolvedPolicy::Skip);
        let mut d = descriptor(&[1, 2, 3]);

        let summary = resolver.resolve(&mut d, &[]).await.unwrap();

        assert_eq!(summary.unresolved, vec![1, 3]);
        assert_eq!(summary.searched, 1);
        assert!(!d.entries[0].is_resolved());
        assert!(d.entries[1].is_resolved());
        assert!(!d.entries[2].is_resolved());
    }

    #[tokio::test]
    async fn empty_chain_with_full_link_list_resolves() {
        let resolver = Resolver::new(SearchChain::empty(), 1, UnresolvedPolicy::Abort);
        let mut d = descriptor(&[1]);
        let summary = resolver
            .resolve(&mut d, &["https://www.curseforge.com/minecraft/mc-mods/jei".to_string()])
            .await
            .unwrap();
        assert_eq!(
            summary,
            ResolutionSummary {
                paired: 1,
                searched: 0,
                unresolved: vec![]
            }
        );
    }
}
