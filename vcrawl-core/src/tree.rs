//! Link hierarchy reconstruction.
//!
//! The collaborator reports every link with the URL of the page it was found
//! on. [`build_forest`] turns that flat list back into a forest.

use std::collections::{HashMap, HashSet};
use tracing::debug;
use vcrawl_client::LinkRecord;
use vcrawl_client::result::dedup_by_href;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkTreeNode {
    pub record: LinkRecord,
    pub children: Vec<LinkTreeNode>,
}

impl LinkTreeNode {
    pub fn href(&self) -> &str {
        &self.record.href
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// This node plus all descendants.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(LinkTreeNode::node_count).sum::<usize>()
    }

    /// Hrefs of this node and every descendant, pre-order.
    pub fn hrefs(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_hrefs(&mut out);
        out
    }

    fn collect_hrefs(&self, out: &mut Vec<String>) {
        out.push(self.record.href.clone());
        for child in &self.children {
            child.collect_hrefs(out);
        }
    }

    pub fn find(&self, href: &str) -> Option<&LinkTreeNode> {
        if self.record.href == href {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(href))
    }
}

/// Looks up a node anywhere in a forest.
pub fn find_node<'a>(forest: &'a [LinkTreeNode], href: &str) -> Option<&'a LinkTreeNode> {
    forest.iter().find_map(|root| root.find(href))
}

pub fn forest_size(forest: &[LinkTreeNode]) -> usize {
    forest.iter().map(LinkTreeNode::node_count).sum()
}

/// Builds the link forest for one result set.
///
/// A record is a root when its parent URL is empty, equals `seed_url`, or
/// names an href that is not in the set. Every other record becomes a child
/// of the record whose href it names, in encounter order. Records whose
/// parent chain loops back on itself never reach a root; the first such
/// record is promoted to a root so every record is placed exactly once.
pub fn build_forest(records: &[LinkRecord], seed_url: &str) -> Vec<LinkTreeNode> {
    let records = dedup_by_href(records.iter().cloned());
    let known: HashSet<&str> = records.iter().map(|r| r.href.as_str()).collect();

    let is_root = |record: &LinkRecord| {
        record.parent_url.is_empty()
            || record.parent_url == seed_url
            || !known.contains(record.parent_url.as_str())
    };

    let mut children_of: HashMap<&str, Vec<&LinkRecord>> = HashMap::new();
    for record in records.iter().filter(|&r| !is_root(r)) {
        children_of
            .entry(record.parent_url.as_str())
            .or_default()
            .push(record);
    }

    let mut placed: HashSet<&str> = HashSet::with_capacity(records.len());
    let mut forest: Vec<LinkTreeNode> = records
        .iter()
        .filter(|&r| is_root(r))
        .map(|root| build_node(root, &children_of, &mut placed))
        .collect();

    if placed.len() < records.len() {
        for record in &records {
            if !placed.contains(record.href.as_str()) {
                debug!(href = %record.href, "Promoting record with cyclic parent chain to root");
                forest.push(build_node(record, &children_of, &mut placed));
            }
        }
    }

    forest
}

fn build_node<'a>(
    record: &'a LinkRecord,
    children_of: &HashMap<&str, Vec<&'a LinkRecord>>,
    placed: &mut HashSet<&'a str>,
) -> LinkTreeNode {
    placed.insert(record.href.as_str());

    let mut children = Vec::new();
    if let Some(kids) = children_of.get(record.href.as_str()) {
        for child in kids {
            if !placed.contains(child.href.as_str()) {
                children.push(build_node(child, children_of, placed));
            }
        }
    }

    LinkTreeNode {
        record: record.clone(),
        children,
    }
}
