use crate::file_id::FileId;
use std::collections::BTreeSet;

pub type DuplicateGroup = BTreeSet<FileId>;

/// Ordered duplicate groups. Element 0 is reserved for the luminance
/// catch-all; later elements are match groups and may overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroups {
    groups: Vec<DuplicateGroup>,
}

impl Default for DuplicateGroups {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateGroups {
    pub fn new() -> Self {
        Self {
            groups: vec![DuplicateGroup::new()],
        }
    }

    pub fn add_to_catch_all(&mut self, id: FileId) {
        self.groups[0].insert(id);
    }

    /// Append a match group. A group equal to one already present is dropped,
    /// so two mutual matches do not report the same pair twice.
    pub fn push(&mut self, group: DuplicateGroup) {
        if !self.groups[1..].contains(&group) {
            self.groups.push(group);
        }
    }

    pub fn catch_all(&self) -> &DuplicateGroup {
        &self.groups[0]
    }

    /// Match groups, without the catch-all.
    pub fn matches(&self) -> &[DuplicateGroup] {
        &self.groups[1..]
    }

    /// Every group including the catch-all at index 0.
    pub fn all(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Number of match groups.
    pub fn len(&self) -> usize {
        self.groups.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sort_matches(&mut self) {
        self.groups[1..].sort();
    }
}

/// Merge groups sharing a member into disjoint clusters.
///
/// Groups are visited in order. A group joins the first existing cluster that
/// already holds one of its members, otherwise it starts a new cluster; members
/// already placed in some cluster stay where they are.
pub fn recluster(groups: &[DuplicateGroup]) -> Vec<DuplicateGroup> {
    let mut clusters: Vec<DuplicateGroup> = Vec::new();

    for group in groups {
        let target = group
            .iter()
            .find_map(|id| clusters.iter().position(|cl| cl.contains(id)));
        let target = match target {
            Some(i) => i,
            None => {
                clusters.push(DuplicateGroup::new());
                clusters.len() - 1
            }
        };

        for id in group {
            if !clusters.iter().any(|cl| cl.contains(id)) {
                clusters[target].insert(id.clone());
            }
        }
    }

    clusters.retain(|cl| !cl.is_empty());
    clusters
}
