//! Scope resolution: which channels a mass move empties.
//!
//! The scope is the target, every ancestor up to the root, and the full
//! subtree below the target and below each of those ancestors. Lookup
//! failures prune the branch that hit them and never fail the resolution;
//! only running out of memory does.

use std::collections::{HashMap, HashSet};

use {
    massmover_channels::{ChannelDirectory, Error, Result},
    massmover_common::{ChannelId, ConnectionId},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use massmover_metrics::{counter, directory as dir_metrics, labels};

/// How children are discovered during subtree expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// Fetch the channel listing and every parent once per expansion.
    Refetch,
    /// Build a parent → children index on the first successful fetch and reuse
    /// it for the rest of the resolution. A failed fetch is retried by the
    /// next expansion.
    #[default]
    Cached,
}

/// Knobs for [`resolve_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeOptions {
    pub include_ancestors: bool,
    pub listing: ListingMode,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            include_ancestors: true,
            listing: ListingMode::Cached,
        }
    }
}

/// Ordered, duplicate-free set of channels in scope.
///
/// Insertion order is discovery order and carries no meaning beyond
/// determinism.
#[derive(Debug, Clone, Default)]
pub struct ScopeSet {
    channels: Vec<ChannelId>,
    seen: HashSet<ChannelId>,
}

impl ScopeSet {
    /// Append `channel` unless already present. Returns whether it was new.
    pub fn insert(&mut self, channel: ChannelId) -> Result<bool> {
        if self.seen.contains(&channel) {
            return Ok(false);
        }
        self.channels
            .try_reserve(1)
            .map_err(|e| Error::allocation("scope channel list", e))?;
        self.seen
            .try_reserve(1)
            .map_err(|e| Error::allocation("scope channel index", e))?;
        self.channels.push(channel);
        self.seen.insert(channel);
        Ok(true)
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.seen.contains(&channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn as_slice(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().copied()
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, ChannelId>>;
    type Item = ChannelId;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter().copied()
    }
}

fn note_lookup_failure(err: &Error) {
    #[cfg(feature = "metrics")]
    if let Error::Directory { lookup, .. } = err {
        counter!(dir_metrics::ERRORS_TOTAL, labels::OPERATION => lookup.label()).increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = err;
}

/// Compute the channels in scope for a mass move into `target`.
///
/// `target` always comes first. Ancestors follow in walk order, then
/// descendants in depth-first pre-order, expanding the target before each
/// ancestor. A channel reachable along several paths appears once. Its
/// children are listed once, unless that listing failed, in which case the
/// next path reaching it lists them again.
pub fn resolve_scope<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    target: ChannelId,
    options: ScopeOptions,
) -> Result<ScopeSet> {
    let mut scope = ScopeSet::default();
    scope.insert(target)?;

    if options.include_ancestors {
        collect_ancestors(directory, connection, target, &mut scope)?;
    }

    let roots: Vec<ChannelId> = scope.iter().collect();
    let mut children = ChildSource::new(options.listing);
    let mut expanded = HashSet::new();
    for root in roots {
        collect_subtree(
            directory,
            connection,
            root,
            &mut children,
            &mut expanded,
            &mut scope,
        )?;
    }

    debug!(
        connection = %connection,
        target = %target,
        channels = scope.len(),
        "scope resolved"
    );
    Ok(scope)
}

/// Walk parent links from `start` up to the root, appending each ancestor.
///
/// A failed lookup ends the walk as if the root had been reached. So does a
/// parent that is already in scope, which only a cyclic topology produces.
fn collect_ancestors<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    start: ChannelId,
    scope: &mut ScopeSet,
) -> Result<()> {
    let mut current = start;
    loop {
        let parent = match directory.parent_of(connection, current) {
            Ok(parent) => parent,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                note_lookup_failure(&e);
                warn!(channel = %current, error = %e, "parent lookup failed, ancestor walk stopped");
                return Ok(());
            },
        };
        if parent.is_root() {
            return Ok(());
        }
        if !scope.insert(parent)? {
            warn!(channel = %current, parent = %parent, "parent already in scope, ancestor walk stopped");
            return Ok(());
        }
        current = parent;
    }
}

/// Append every not-yet-seen descendant of `root` in depth-first pre-order.
///
/// A descendant already in scope is not appended again, but is still
/// expanded unless its children were already listed. `expanded` is shared
/// across roots and only records successful listings, which also bounds the
/// walk on a cyclic topology.
fn collect_subtree<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    root: ChannelId,
    children: &mut ChildSource,
    expanded: &mut HashSet<ChannelId>,
    scope: &mut ScopeSet,
) -> Result<()> {
    let mut stack = Vec::new();
    push_children(directory, connection, root, children, expanded, &mut stack)?;
    while let Some(node) = stack.pop() {
        scope.insert(node)?;
        push_children(directory, connection, node, children, expanded, &mut stack)?;
    }
    Ok(())
}

/// Push the children of `node` so that the first child is popped first.
///
/// Does nothing when `node` was already expanded.
fn push_children<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    node: ChannelId,
    children: &mut ChildSource,
    expanded: &mut HashSet<ChannelId>,
    stack: &mut Vec<ChannelId>,
) -> Result<()> {
    if expanded.contains(&node) {
        return Ok(());
    }
    let found = match children.children_of(directory, connection, node) {
        Ok(found) => found,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            note_lookup_failure(&e);
            warn!(channel = %node, error = %e, "channel listing failed, subtree skipped");
            return Ok(());
        },
    };
    expanded
        .try_reserve(1)
        .map_err(|e| Error::allocation("expanded channel index", e))?;
    expanded.insert(node);
    stack
        .try_reserve(found.len())
        .map_err(|e| Error::allocation("subtree expansion stack", e))?;
    stack.extend(found.into_iter().rev());
    Ok(())
}

/// Source of parent → children relations for subtree expansion.
enum ChildSource {
    Refetch,
    Cached(Option<HashMap<ChannelId, Vec<ChannelId>>>),
}

impl ChildSource {
    fn new(mode: ListingMode) -> Self {
        match mode {
            ListingMode::Refetch => Self::Refetch,
            ListingMode::Cached => Self::Cached(None),
        }
    }

    fn children_of<D: ChannelDirectory + ?Sized>(
        &mut self,
        directory: &D,
        connection: ConnectionId,
        node: ChannelId,
    ) -> Result<Vec<ChannelId>> {
        match self {
            Self::Refetch => {
                let listing = directory.list_channels(connection)?;
                let mut found = Vec::new();
                for channel in listing.into_iter().filter(|c| !c.is_root()) {
                    if parent_of_or_skip(directory, connection, channel)? == Some(node) {
                        found
                            .try_reserve(1)
                            .map_err(|e| Error::allocation("child channel list", e))?;
                        found.push(channel);
                    }
                }
                Ok(found)
            },
            Self::Cached(index) => {
                if index.is_none() {
                    *index = Some(build_index(directory, connection)?);
                }
                Ok(index
                    .as_ref()
                    .and_then(|idx| idx.get(&node))
                    .cloned()
                    .unwrap_or_default())
            },
        }
    }
}

/// Parent of `channel`, or `None` when the lookup fails. Such a channel is
/// left out of the expansion that asked for it.
fn parent_of_or_skip<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
    channel: ChannelId,
) -> Result<Option<ChannelId>> {
    match directory.parent_of(connection, channel) {
        Ok(parent) => Ok(Some(parent)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            note_lookup_failure(&e);
            debug!(channel = %channel, error = %e, "parent lookup failed, channel skipped");
            Ok(None)
        },
    }
}

fn build_index<D: ChannelDirectory + ?Sized>(
    directory: &D,
    connection: ConnectionId,
) -> Result<HashMap<ChannelId, Vec<ChannelId>>> {
    let listing = directory.list_channels(connection)?;
    let mut index: HashMap<ChannelId, Vec<ChannelId>> = HashMap::new();
    for channel in listing.into_iter().filter(|c| !c.is_root()) {
        if let Some(parent) = parent_of_or_skip(directory, connection, channel)? {
            index.entry(parent).or_default().push(channel);
        }
    }
    Ok(index)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use {
        massmover_channels::{DirectoryCall, FaultPlan, MemoryDirectory},
        massmover_common::OccupantId,
        rstest::rstest,
    };

    use super::*;

    const CONN: ConnectionId = ConnectionId(1);

    fn ids(scope: &ScopeSet) -> Vec<u64> {
        scope.iter().map(ChannelId::get).collect()
    }

    fn sorted(scope: &ScopeSet) -> BTreeSet<u64> {
        scope.iter().map(ChannelId::get).collect()
    }

    fn options(listing: ListingMode) -> ScopeOptions {
        ScopeOptions {
            include_ancestors: true,
            listing,
        }
    }

    /// ```text
    /// 1 ── 2 ── 3 ── 4
    /// │    └─ 5
    /// └─ 6
    /// 7
    /// ```
    fn tree() -> MemoryDirectory {
        MemoryDirectory::new(CONN, Some(OccupantId(1)))
            .with_channel(1u64, 0u64, &[])
            .with_channel(2u64, 1u64, &[])
            .with_channel(3u64, 2u64, &[])
            .with_channel(4u64, 3u64, &[])
            .with_channel(5u64, 2u64, &[])
            .with_channel(6u64, 1u64, &[])
            .with_channel(7u64, 0u64, &[])
    }

    #[rstest]
    #[case(ListingMode::Refetch)]
    #[case(ListingMode::Cached)]
    fn target_comes_first_then_ancestors(#[case] listing: ListingMode) {
        let scope = resolve_scope(&tree(), CONN, ChannelId(3), options(listing)).unwrap();
        assert_eq!(&ids(&scope)[..3], &[3, 2, 1]);
    }

    #[rstest]
    #[case(ListingMode::Refetch)]
    #[case(ListingMode::Cached)]
    fn includes_subtrees_of_every_ancestor(#[case] listing: ListingMode) {
        let scope = resolve_scope(&tree(), CONN, ChannelId(3), options(listing)).unwrap();
        assert_eq!(sorted(&scope), BTreeSet::from([1, 2, 3, 4, 5, 6]));
        assert_eq!(scope.len(), 6);
        assert!(!scope.contains(ChannelId(7)));
    }

    #[rstest]
    #[case(ListingMode::Refetch)]
    #[case(ListingMode::Cached)]
    fn descendants_follow_in_pre_order(#[case] listing: ListingMode) {
        let scope = resolve_scope(&tree(), CONN, ChannelId(1), options(listing)).unwrap();
        assert_eq!(ids(&scope), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn without_ancestors_only_the_target_subtree_is_used() {
        let opts = ScopeOptions {
            include_ancestors: false,
            listing: ListingMode::Cached,
        };
        let scope = resolve_scope(&tree(), CONN, ChannelId(2), opts).unwrap();
        assert_eq!(sorted(&scope), BTreeSet::from([2, 3, 4, 5]));
    }

    #[test]
    fn leaf_at_root_is_alone() {
        let scope = resolve_scope(&tree(), CONN, ChannelId(7), ScopeOptions::default()).unwrap();
        assert_eq!(ids(&scope), vec![7]);
    }

    #[test]
    fn unknown_target_still_yields_the_target() {
        let scope =
            resolve_scope(&tree(), CONN, ChannelId(99), ScopeOptions::default()).unwrap();
        assert_eq!(ids(&scope), vec![99]);
    }

    #[test]
    fn refetch_lists_channels_once_per_expanded_node() {
        let dir = tree();
        let scope = resolve_scope(&dir, CONN, ChannelId(3), options(ListingMode::Refetch)).unwrap();
        let listings = dir
            .journal()
            .iter()
            .filter(|c| **c == DirectoryCall::ListChannels)
            .count();
        assert_eq!(listings, scope.len());
    }

    #[test]
    fn cached_lists_channels_once() {
        let dir = tree();
        resolve_scope(&dir, CONN, ChannelId(3), options(ListingMode::Cached)).unwrap();
        let listings = dir
            .journal()
            .iter()
            .filter(|c| **c == DirectoryCall::ListChannels)
            .count();
        assert_eq!(listings, 1);
    }

    #[test]
    fn cached_listing_retries_after_a_failed_fetch() {
        let dir = tree().with_faults(FaultPlan {
            list_channels_calls: BTreeSet::from([1]),
            ..FaultPlan::default()
        });
        // Expanding 3 fails; expanding 2 reaches 3 again and lists it.
        let scope = resolve_scope(&dir, CONN, ChannelId(3), options(ListingMode::Cached)).unwrap();
        assert_eq!(sorted(&scope), BTreeSet::from([1, 2, 3, 4, 5, 6]));
        assert_eq!(scope.len(), 6);
    }

    #[test]
    fn failed_ancestor_listing_is_recovered_from_a_higher_ancestor() {
        // Listings run for 3, 4, then 2, which fails; 1 reaches 2 again.
        let dir = tree().with_faults(FaultPlan {
            list_channels_calls: BTreeSet::from([3]),
            ..FaultPlan::default()
        });
        let scope = resolve_scope(&dir, CONN, ChannelId(3), options(ListingMode::Refetch)).unwrap();
        assert_eq!(ids(&scope), vec![3, 2, 1, 4, 5, 6]);
    }

    #[test]
    fn every_listing_failing_keeps_target_and_ancestors() {
        let dir = tree().with_faults(FaultPlan {
            list_channels: true,
            ..FaultPlan::default()
        });
        let scope = resolve_scope(&dir, CONN, ChannelId(3), options(ListingMode::Refetch)).unwrap();
        assert_eq!(ids(&scope), vec![3, 2, 1]);
    }

    #[test]
    fn failed_parent_lookup_drops_that_channel_from_expansion() {
        let dir = tree().with_faults(FaultPlan {
            parent_of: BTreeSet::from([ChannelId(5)]),
            ..FaultPlan::default()
        });
        let scope = resolve_scope(&dir, CONN, ChannelId(1), ScopeOptions::default()).unwrap();
        assert_eq!(sorted(&scope), BTreeSet::from([1, 2, 3, 4, 6]));
    }

    #[test]
    fn parent_cycle_terminates() {
        let dir = MemoryDirectory::new(CONN, None)
            .with_channel(1u64, 2u64, &[])
            .with_channel(2u64, 1u64, &[]);
        let scope = resolve_scope(&dir, CONN, ChannelId(1), ScopeOptions::default()).unwrap();
        assert_eq!(ids(&scope), vec![1, 2]);
    }

    #[test]
    fn scope_set_ignores_duplicates() {
        let mut scope = ScopeSet::default();
        assert!(scope.insert(ChannelId(4)).unwrap());
        assert!(!scope.insert(ChannelId(4)).unwrap());
        assert_eq!(scope.as_slice(), &[ChannelId(4)]);
    }
}
