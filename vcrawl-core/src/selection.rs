use std::collections::HashSet;
use vcrawl_client::LinkRecord;

use crate::tree::LinkTreeNode;

/// Hrefs chosen by the user within one result set.
///
/// List and sitemap views share a single set; group and subtree operations
/// are expressed as bulk adds and removes over explicit href collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: HashSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `href` and returns whether it is now selected.
    pub fn toggle(&mut self, href: &str) -> bool {
        if self.selected.remove(href) {
            false
        } else {
            self.selected.insert(href.to_string());
            true
        }
    }

    pub fn set_group<I, S>(&mut self, hrefs: I, select: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for href in hrefs {
            let href = href.as_ref();
            if select {
                if !self.selected.contains(href) {
                    self.selected.insert(href.to_string());
                }
            } else {
                self.selected.remove(href);
            }
        }
    }

    pub fn is_selected(&self, href: &str) -> bool {
        self.selected.contains(href)
    }

    /// (selected, total) over the distinct hrefs of a group.
    pub fn group_counts<I, S>(&self, hrefs: I) -> (usize, usize)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut selected = 0;
        for href in hrefs {
            let href = href.as_ref();
            if seen.insert(href.to_string()) && self.selected.contains(href) {
                selected += 1;
            }
        }
        (selected, seen.len())
    }

    /// False for an empty group.
    pub fn is_all_selected<I, S>(&self, hrefs: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (selected, total) = self.group_counts(hrefs);
        total > 0 && selected == total
    }

    /// Some but not all of the group is selected. False for an empty group.
    pub fn is_partially_selected<I, S>(&self, hrefs: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (selected, total) = self.group_counts(hrefs);
        selected > 0 && selected < total
    }

    pub fn select_subtree(&mut self, node: &LinkTreeNode, select: bool) {
        self.set_group(node.hrefs(), select);
    }

    /// Selected hrefs in `node` and all of its descendants. Recomputed on
    /// every call.
    pub fn subtree_selected(&self, node: &LinkTreeNode) -> usize {
        let own = usize::from(self.is_selected(node.href()));
        own + node
            .children
            .iter()
            .map(|child| self.subtree_selected(child))
            .sum::<usize>()
    }

    pub fn is_subtree_all_selected(&self, node: &LinkTreeNode) -> bool {
        self.subtree_selected(node) == node.node_count()
    }

    pub fn is_subtree_partially_selected(&self, node: &LinkTreeNode) -> bool {
        let selected = self.subtree_selected(node);
        selected > 0 && selected < node.node_count()
    }

    /// Records of `records` that are selected, in their original order.
    pub fn filter<'a>(&self, records: &'a [LinkRecord]) -> Vec<&'a LinkRecord> {
        records
            .iter()
            .filter(|record| self.is_selected(&record.href))
            .collect()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }
}
