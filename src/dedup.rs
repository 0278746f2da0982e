// Deduplication and ranking engine
//
// Collapses exact (same normalized URL) and near (similar title) duplicates
// into clusters, then orders the cluster representatives by
// influence-weighted engagement.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::model::NewsItem;

/// Normalized title similarity at or above which two items merge.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Query parameters that only carry tracking information.
const TRACKING_PARAMS: &[&str] = &["ref", "source", "fbclid", "gclid", "mc_cid", "mc_eid", "si"];

/// A cluster representative in final report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub item: NewsItem,
    /// Number of collected items this entry stands for (1 = no duplicates).
    pub cluster_size: usize,
    pub combined_engagement: u64,
    pub score: f64,
}

impl RankedItem {
    pub fn duplicates(&self) -> usize {
        self.cluster_size.saturating_sub(1)
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Normalize a URL into an exact-dedup key: scheme, `www.`, fragment,
/// tracking parameters and trailing slash are dropped, and the result is
/// lowercased. Empty input gives an empty key.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let parsed = url::Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| url::Url::parse(&format!("https://{}", url)).ok());

    let Some(parsed) = parsed.filter(|u| u.has_host()) else {
        return fallback_normalize_url(url);
    };

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut key = host.to_string();
    if let Some(port) = parsed.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(parsed.path().trim_end_matches('/'));

    let query: Vec<String> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| {
            if v.is_empty() {
                k.into_owned()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();
    if !query.is_empty() {
        key.push('?');
        key.push_str(&query.join("&"));
    }

    key.to_lowercase()
}

fn fallback_normalize_url(url: &str) -> String {
    let url = url.to_lowercase();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);
    let url = url.split('#').next().unwrap_or_default();
    let (base, query) = url.split_once('?').unwrap_or((url, ""));

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| !is_tracking_param(pair.split('=').next().unwrap_or_default()))
        .collect();

    let base = base.trim_end_matches('/');
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}

/// Normalize a title for comparison: lowercase, every non-alphanumeric
/// character turned into a space, whitespace collapsed. CJK characters count as alphanumeric and are kept.
pub fn normalize_title(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity ratio between two titles (0.0 - 1.0).
/// Uses normalized Levenshtein distance over normalized titles. A title that
/// normalizes to nothing is similar to nothing.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_title(a), &normalize_title(b))
}

fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(a, b)
}

/// Items judged equivalent. Indices refer to the ranker's input slice.
#[derive(Debug, Clone)]
struct DuplicateCluster {
    representative: usize,
    members: Vec<usize>,
    combined_engagement: u64,
}

impl DuplicateCluster {
    fn singleton(index: usize, item: &NewsItem) -> Self {
        Self {
            representative: index,
            members: vec![index],
            combined_engagement: item.engagement,
        }
    }

    /// Earliest collection position among members.
    fn order(&self) -> usize {
        self.members.iter().copied().min().unwrap_or(self.representative)
    }

    fn tags(&self, items: &[NewsItem]) -> BTreeSet<String> {
        self.members
            .iter()
            .flat_map(|&i| items[i].tags.iter().cloned())
            .collect()
    }

    fn absorb(&mut self, other: DuplicateCluster) {
        self.members.extend(other.members);
        self.combined_engagement = self
            .combined_engagement
            .saturating_add(other.combined_engagement);
    }
}

/// Union-find over candidate positions.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Pass-1 cluster as seen by the fuzzy pass.
struct Candidate {
    cluster: DuplicateCluster,
    title: String,
    title_len: usize,
    tags: BTreeSet<String>,
}

/// Deduplicates and orders collected items.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    threshold: f64,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Ranker {
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_nan() {
            DEFAULT_SIMILARITY_THRESHOLD
        } else {
            threshold.clamp(0.0, 1.0)
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Collapse duplicates and return representatives, best first, capped to
    /// `max_items` when given.
    pub fn rank(&self, mut items: Vec<NewsItem>, max_items: Option<usize>) -> Vec<RankedItem> {
        if items.is_empty() {
            debug!("Ranking: no items");
            return Vec::new();
        }

        for item in items.iter_mut() {
            if !item.weight.is_finite() || item.weight <= 0.0 {
                item.weight = 1.0;
            }
        }

        let input_count = items.len();
        let exact = exact_clusters(&items);
        let exact_count = exact.len();
        let clusters = self.fuzzy_clusters(&items, exact);
        let cluster_count = clusters.len();

        let mut slots: Vec<Option<NewsItem>> = items.iter().cloned().map(Some).collect();
        let mut ranked: Vec<(usize, RankedItem)> = clusters
            .into_iter()
            .filter_map(|cluster| {
                let mut item = slots[cluster.representative].take()?;
                if item.tags.is_empty() {
                    item.tags = cluster.tags(&items);
                }
                let score = cluster.combined_engagement as f64 * item.weight;
                Some((
                    cluster.order(),
                    RankedItem {
                        item,
                        cluster_size: cluster.members.len(),
                        combined_engagement: cluster.combined_engagement,
                        score,
                    },
                ))
            })
            .collect();

        ranked.sort_by(|(order_a, a), (order_b, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.item.timestamp.cmp(&a.item.timestamp))
                .then_with(|| b.cluster_size.cmp(&a.cluster_size))
                .then_with(|| order_a.cmp(order_b))
        });

        let mut ranked: Vec<RankedItem> = ranked.into_iter().map(|(_, r)| r).collect();
        if let Some(max) = max_items {
            ranked.truncate(max);
        }

        info!(
            "Ranking: {} items -> {} clusters ({} exact, {} fuzzy merges, threshold {:.2}), {} kept",
            input_count,
            cluster_count,
            input_count - exact_count,
            exact_count - cluster_count,
            self.threshold,
            ranked.len()
        );

        ranked
    }

    fn fuzzy_clusters(
        &self,
        items: &[NewsItem],
        exact: Vec<DuplicateCluster>,
    ) -> Vec<DuplicateCluster> {
        let candidates: Vec<Candidate> = exact
            .into_iter()
            .map(|cluster| {
                let title = normalize_title(&items[cluster.representative].title);
                Candidate {
                    title_len: title.chars().count(),
                    tags: cluster.tags(items),
                    title,
                    cluster,
                }
            })
            .collect();

        let similar = self.similar_pairs(&candidates);

        let mut components = DisjointSet::new(candidates.len());
        for &(a, b) in &similar {
            components.union(a, b);
        }
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..candidates.len() {
            groups.entry(components.find(i)).or_default().push(i);
        }

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut result = Vec::new();

        for (_, mut group) in groups {
            if group.len() == 1 {
                if let Some(c) = slots[group[0]].take() {
                    result.push(c.cluster);
                }
                continue;
            }

            group.sort_by(|&a, &b| compare_priority(items, &slots, a, b));

            // Leaders are candidate positions; every member is similar to its leader.
            let mut leaders: Vec<(usize, DuplicateCluster)> = Vec::new();
            for position in group {
                let Some(candidate) = slots[position].take() else {
                    continue;
                };
                let leader = leaders
                    .iter_mut()
                    .find(|(lead, _)| similar.contains(&pair_key(*lead, position)));
                match leader {
                    Some((_, cluster)) => cluster.absorb(candidate.cluster),
                    None => leaders.push((position, candidate.cluster)),
                }
            }
            result.extend(leaders.into_iter().map(|(_, cluster)| cluster));
        }

        result
    }

    /// All candidate pairs whose titles meet the threshold. Candidates are
    /// bucketed by title length: normalized Levenshtein can only reach the
    /// threshold when `shorter >= threshold * longer`, so pairs outside that
    /// window are skipped without changing the result.
    fn similar_pairs(&self, candidates: &[Candidate]) -> HashSet<(usize, usize)> {
        let mut by_len: Vec<usize> = (0..candidates.len()).collect();
        by_len.sort_by_key(|&i| (candidates[i].title_len, i));

        let mut pairs = HashSet::new();
        for (pos, &i) in by_len.iter().enumerate() {
            let short = &candidates[i];
            if short.title.is_empty() {
                continue;
            }
            for &j in &by_len[pos + 1..] {
                let long = &candidates[j];
                if (short.title_len as f64) + 1e-9 < self.threshold * long.title_len as f64 {
                    break;
                }
                if !products_compatible(&short.tags, &long.tags) {
                    continue;
                }
                let sim = normalized_similarity(&short.title, &long.title);
                if sim >= self.threshold {
                    debug!(
                        "Near duplicate: '{}' ~ '{}' (similarity: {:.2})",
                        short.title, long.title, sim
                    );
                    pairs.insert(pair_key(i, j));
                }
            }
        }
        pairs
    }
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Items tagged with different tracked products never merge.
fn products_compatible(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    a.is_empty() || b.is_empty() || !a.is_disjoint(b)
}

/// Fuzzy-pass priority: weighted engagement of the pass-1 representative,
/// then recency, then collection order.
fn compare_priority(
    items: &[NewsItem],
    slots: &[Option<Candidate>],
    a: usize,
    b: usize,
) -> Ordering {
    let (Some(ca), Some(cb)) = (&slots[a], &slots[b]) else {
        return a.cmp(&b);
    };
    let ia = &items[ca.cluster.representative];
    let ib = &items[cb.cluster.representative];
    ib.weighted_engagement()
        .total_cmp(&ia.weighted_engagement())
        .then_with(|| ib.timestamp.cmp(&ia.timestamp))
        .then_with(|| ca.cluster.order().cmp(&cb.cluster.order()))
}

/// Pass 1: merge items sharing a normalized URL. The member with the highest
/// engagement represents the cluster; earlier items win ties. Items without
/// a URL stay on their own.
fn exact_clusters(items: &[NewsItem]) -> Vec<DuplicateCluster> {
    let mut clusters: Vec<DuplicateCluster> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        let key = normalize_url(&item.url);
        if key.is_empty() {
            clusters.push(DuplicateCluster::singleton(index, item));
            continue;
        }
        match by_key.get(&key) {
            Some(&c) => {
                let cluster = &mut clusters[c];
                if item.engagement > items[cluster.representative].engagement {
                    cluster.representative = index;
                }
                cluster.absorb(DuplicateCluster::singleton(index, item));
            }
            None => {
                by_key.insert(key, clusters.len());
                clusters.push(DuplicateCluster::singleton(index, item));
            }
        }
    }

    clusters
}

/// Rank with the default similarity threshold.
pub fn rank(items: Vec<NewsItem>, max_items: Option<usize>) -> Vec<RankedItem> {
    Ranker::default().rank(items, max_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KolTier, Source};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(title: &str, url: &str, engagement: u64) -> NewsItem {
        NewsItem::new(title, Source::Hackernews, url, base_time()).with_engagement(engagement)
    }

    fn tagged(mut item: NewsItem, tag: &str) -> NewsItem {
        item.tags.insert(tag.to_string());
        item
    }

    fn titles(ranked: &[RankedItem]) -> Vec<&str> {
        ranked.iter().map(|r| r.item.title.as_str()).collect()
    }

    #[test]
    fn test_normalize_url_strips_tracking_and_scheme() {
        assert_eq!(
            normalize_url("http://x.com/a?utm_source=x"),
            normalize_url("https://x.com/a/")
        );
        assert_eq!(normalize_url("https://x.com/a/"), "x.com/a");
        assert_eq!(
            normalize_url("https://www.Example.com/Post?id=5&fbclid=abc#comments"),
            "example.com/post?id=5"
        );
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn test_normalize_url_keeps_meaningful_query() {
        assert_ne!(
            normalize_url("https://news.ycombinator.com/item?id=1"),
            normalize_url("https://news.ycombinator.com/item?id=2")
        );
    }

    #[test]
    fn test_normalize_url_without_scheme() {
        assert_eq!(normalize_url("x.com/a/?ref=hn"), "x.com/a");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Claude Code Adds   New Agent Mode! "),
            "claude code adds new agent mode"
        );
        assert_eq!(normalize_title("Claude Code 新功能！"), "claude code 新功能");
        assert_eq!(normalize_title("!!!"), "");
    }

    #[test]
    fn test_similarity() {
        assert!((similarity("Hello World", "hello world!") - 1.0).abs() < 1e-9);
        assert!(similarity("OpenAI releases GPT-5", "Anthropic announces Claude 4") < 0.5);
        assert_eq!(similarity("???", "!!!"), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(Vec::new(), None).is_empty());
        assert!(rank(Vec::new(), Some(5)).is_empty());
    }

    #[test]
    fn test_url_variants_merge() {
        let ranked = rank(
            vec![
                item("Copilot agent ships today", "http://x.com/a?utm_source=x", 10),
                item("Totally different headline here", "https://x.com/a/", 40),
            ],
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.title, "Totally different headline here");
        assert_eq!(ranked[0].cluster_size, 2);
        assert_eq!(ranked[0].combined_engagement, 50);
        assert_eq!(ranked[0].score, 50.0);
    }

    #[test]
    fn test_exact_ties_keep_first_collected() {
        let ranked = rank(
            vec![
                item("First copy of the story", "https://x.com/a", 10),
                item("Second copy of the story", "https://x.com/a", 10),
            ],
            None,
        );
        assert_eq!(ranked[0].item.title, "First copy of the story");
    }

    #[test]
    fn test_punctuation_and_case_variants_merge() {
        let ranked = rank(
            vec![
                item("Claude Code adds new agent mode", "https://a.com/1", 30),
                item("Claude Code Adds New Agent Mode!", "https://b.com/2", 50),
            ],
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.url, "https://b.com/2");
        assert_eq!(ranked[0].combined_engagement, 80);
        assert_eq!(ranked[0].duplicates(), 1);
    }

    #[test]
    fn test_different_products_never_merge() {
        let ranked = Ranker::new(0.7).rank(
            vec![
                tagged(
                    item("Claude Code adds new agent mode", "https://a.com/1", 30),
                    "Claude",
                ),
                tagged(
                    item("Cursor adds new agent mode", "https://b.com/2", 30),
                    "Cursor",
                ),
            ],
            None,
        );
        assert_eq!(ranked.len(), 2);

        // Even identical titles stay apart when their products differ.
        let ranked = Ranker::new(0.5).rank(
            vec![
                tagged(item("Agent mode is here", "", 1), "Claude"),
                tagged(item("Agent mode is here", "", 1), "Cursor"),
            ],
            None,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_untagged_item_can_merge_with_tagged() {
        let ranked = rank(
            vec![
                tagged(item("Windsurf launches wave 9", "", 5), "Windsurf"),
                item("Windsurf launches Wave 9!", "", 3),
            ],
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].item.tags.contains("Windsurf"));
    }

    #[test]
    fn test_representative_tags_filled_from_members() {
        let ranked = rank(
            vec![
                item("Big launch post", "https://x.com/p", 100),
                tagged(item("Codex mention", "https://x.com/p?ref=tw", 1), "Codex"),
            ],
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.title, "Big launch post");
        assert!(ranked[0].item.tags.contains("Codex"));
    }

    #[test]
    fn test_fuzzy_representative_uses_weighted_engagement() {
        let mut kol = item("Claude Code adds new agent mode!", "https://t.co/1", 40);
        kol.kol_tier = Some(KolTier::S);
        kol.weight = 3.0;
        let plain = item("Claude Code adds new agent mode", "https://h.com/2", 100);

        let ranked = rank(vec![plain, kol], None);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.url, "https://t.co/1");
        assert_eq!(ranked[0].combined_engagement, 140);
        // Representative's own weight applies to the combined engagement.
        assert_eq!(ranked[0].score, 420.0);
    }

    #[test]
    fn test_fuzzy_sums_exact_cluster_sums() {
        let ranked = rank(
            vec![
                item("Copilot workspace is now GA", "https://a.com/x", 10),
                item("Copilot workspace is now GA", "https://a.com/x/", 5),
                item("Copilot Workspace is now GA!", "https://b.com/y", 7),
            ],
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].combined_engagement, 22);
        assert_eq!(ranked[0].cluster_size, 3);
    }

    #[test]
    fn test_chain_does_not_merge_unrelated_ends() {
        // a ~ b and b ~ c, but a and c are too far apart to share a cluster.
        let a = "claude code agent mode release notes";
        let b = "claude code agent mode release today";
        let c = "claude code agent mode launches today";
        let threshold = 0.8;
        assert!(similarity(a, b) >= threshold);
        assert!(similarity(b, c) >= threshold);
        assert!(similarity(a, c) < threshold);

        let ranked = Ranker::new(threshold).rank(
            vec![item(a, "", 30), item(b, "", 20), item(c, "", 10)],
            None,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item.title, a);
        assert_eq!(ranked[0].cluster_size, 2);
        assert_eq!(ranked[1].item.title, c);
        for r in &ranked {
            assert!(r.cluster_size <= 2);
        }
    }

    #[test]
    fn test_kol_weight_boundaries() {
        let mut s_tier = item("Thoughts on agentic coding", "https://t.co/s", 100);
        s_tier.weight = KolTier::S.multiplier();
        let plain = item("Copilot pricing changes announced", "https://h.com/p", 250);
        let ranked = rank(vec![plain.clone(), s_tier], None);
        assert_eq!(ranked[0].item.url, "https://t.co/s"); // 300 > 250

        let mut b_tier = item("Windsurf review after a month", "https://t.co/b", 166);
        b_tier.weight = KolTier::B.multiplier();
        let ranked = rank(vec![b_tier, plain.clone()], None);
        assert_eq!(ranked[0].item.url, "https://h.com/p"); // 249 < 250
    }

    #[test]
    fn test_equal_scores_prefer_recent() {
        let mut a_tier = item("Thoughts on agentic coding", "https://t.co/a", 125);
        a_tier.weight = KolTier::A.multiplier();
        a_tier.timestamp = base_time() - Duration::hours(2);
        let plain = item("Copilot pricing changes announced", "https://h.com/p", 250);

        let ranked = rank(vec![a_tier, plain], None);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].item.url, "https://h.com/p");
    }

    #[test]
    fn test_equal_scores_and_time_prefer_larger_cluster() {
        let ranked = rank(
            vec![
                item("Lonely post about Codex", "https://a.com/1", 20),
                item("Shared post about Cursor", "https://b.com/2", 10),
                item("Shared post about Cursor", "https://b.com/2?utm_medium=x", 10),
            ],
            None,
        );
        assert_eq!(ranked[0].item.url, "https://b.com/2");
        assert_eq!(ranked[0].cluster_size, 2);
    }

    #[test]
    fn test_full_tie_falls_back_to_collection_order() {
        let ranked = rank(
            vec![
                item("Alpha story on Codex", "https://a.com/1", 10),
                item("Bravo story on Cursor", "https://b.com/2", 10),
                item("Charlie story on Claude", "https://c.com/3", 10),
            ],
            None,
        );
        assert_eq!(
            titles(&ranked),
            vec![
                "Alpha story on Codex",
                "Bravo story on Cursor",
                "Charlie story on Claude"
            ]
        );
    }

    fn mixed_items() -> Vec<NewsItem> {
        let headlines = [
            ("Claude Code adds new agent mode", "https://anthropic.com/news/agents", 120),
            ("Copilot pricing changes announced", "https://github.blog/pricing", 95),
            ("Cursor raises another round of funding", "https://tc.com/cursor?utm_source=rss", 80),
            ("Windsurf review after a month", "https://blog.dev/windsurf", 44),
            ("Claude Code Adds New Agent Mode!", "https://news.ycombinator.com/item?id=7", 61),
            ("Codex CLI goes open source", "https://github.com/openai/codex", 73),
            ("Cursor raises another round of funding", "https://tc.com/cursor/", 19),
            ("Thoughts on agentic coding", "", 28),
            ("Copilot workspace is now GA", "https://github.blog/workspace", 36),
            ("Why I switched editors", "", 3),
        ];
        headlines
            .iter()
            .enumerate()
            .map(|(i, (title, url, engagement))| {
                let mut it = item(title, url, *engagement);
                it.timestamp = base_time() - Duration::minutes(i as i64);
                if i % 4 == 0 {
                    it.weight = 2.0;
                }
                it
            })
            .collect()
    }

    #[test]
    fn test_rank_is_deterministic() {
        let first = rank(mixed_items(), None);
        let second = rank(mixed_items(), None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rerank_of_output_is_stable() {
        let first = rank(mixed_items(), None);
        let singletons: Vec<NewsItem> = first
            .iter()
            .map(|r| {
                let mut it = r.item.clone();
                it.engagement = r.combined_engagement;
                it
            })
            .collect();
        let second = rank(singletons, None);
        assert_eq!(titles(&first), titles(&second));
        assert!(second.iter().all(|r| r.cluster_size == 1));
    }

    #[test]
    fn test_truncation_returns_top_clusters() {
        let all = rank(mixed_items(), None);
        let top = rank(mixed_items(), Some(5));
        assert_eq!(top.len(), 5.min(all.len()));
        assert_eq!(top[..], all[..5]);

        let few = rank(vec![item("Only one", "", 1)], Some(5));
        assert_eq!(few.len(), 1);
    }

    #[test]
    fn test_length_pruning_matches_exhaustive_comparison() {
        let titles = [
            "Claude Code adds new agent mode",
            "Claude Code adds a new agent mode",
            "Claude Code adds agent mode",
            "Copilot",
            "Copilot!",
            "",
            "Cursor raises another round of funding",
            "Cursor raises another funding round",
            "Claude",
        ];
        let items: Vec<NewsItem> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| item(t, "", 10 + i as u64))
            .collect();

        for threshold in [0.0, 0.5, 0.7, 0.85, 1.0] {
            let ranker = Ranker::new(threshold);
            let candidates: Vec<Candidate> = exact_clusters(&items)
                .into_iter()
                .map(|cluster| {
                    let title = normalize_title(&items[cluster.representative].title);
                    Candidate {
                        title_len: title.chars().count(),
                        tags: BTreeSet::new(),
                        title,
                        cluster,
                    }
                })
                .collect();

            let mut exhaustive = HashSet::new();
            for i in 0..candidates.len() {
                for j in i + 1..candidates.len() {
                    if candidates[i].title.is_empty() || candidates[j].title.is_empty() {
                        continue;
                    }
                    let sim = normalized_similarity(&candidates[i].title, &candidates[j].title);
                    if sim >= threshold {
                        exhaustive.insert((i, j));
                    }
                }
            }
            assert_eq!(ranker.similar_pairs(&candidates), exhaustive);
        }
    }

    #[test]
    fn test_representatives_are_pairwise_distinct() {
        let items = mixed_items();
        let count = items.len();
        let ranked = rank(items, None);
        for (i, a) in ranked.iter().enumerate() {
            for b in &ranked[i + 1..] {
                assert!(similarity(&a.item.title, &b.item.title) < DEFAULT_SIMILARITY_THRESHOLD);
            }
        }
        let total: usize = ranked.iter().map(|r| r.cluster_size).sum();
        assert_eq!(total, count);
    }

    #[test]
    fn test_invalid_weight_treated_as_neutral() {
        let mut it = item("Weightless", "", 10);
        it.weight = f64::NAN;
        let ranked = rank(vec![it], None);
        assert_eq!(ranked[0].score, 10.0);
        assert_eq!(ranked[0].item.weight, 1.0);
    }

    #[test]
    fn test_threshold_clamped() {
        assert_eq!(Ranker::new(1.7).threshold(), 1.0);
        assert_eq!(Ranker::new(-1.0).threshold(), 0.0);
        assert_eq!(Ranker::new(f64::NAN).threshold(), DEFAULT_SIMILARITY_THRESHOLD);
    }
}
