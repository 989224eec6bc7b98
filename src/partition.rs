use crate::error::{PathError, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type SeqId = String;

/// A non-empty group of sequence identifiers, kept in the order it was given.
pub type Cluster = Vec<SeqId>;

pub const CLUSTER_SEPARATOR: &str = ";";
pub const ID_SEPARATOR: &str = ":";

/// Disjoint clusters covering every identifier considered at one step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Cluster>", into = "Vec<Cluster>")]
pub struct Partition {
    clusters: Vec<Cluster>,
}

impl TryFrom<Vec<Cluster>> for Partition {
    type Error = PathError;

    fn try_from(clusters: Vec<Cluster>) -> Result<Self> {
        Self::new(clusters)
    }
}

impl From<Partition> for Vec<Cluster> {
    fn from(partition: Partition) -> Self {
        partition.clusters
    }
}

impl Partition {
    pub fn new(clusters: Vec<Cluster>) -> Result<Self> {
        let ret = Self { clusters };
        ret.validate()?;
        Ok(ret)
    }

    /// Every identifier in its own cluster.
    pub fn singletons<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<SeqId>,
    {
        Self::new(ids.into_iter().map(|id| vec![id.into()]).collect())
    }

    /// Parses `a:b;c` into `[[a, b], [c]]`.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(
            text.split(CLUSTER_SEPARATOR)
                .map(|cluster| cluster.split(ID_SEPARATOR).map(str::to_string).collect())
                .collect(),
        )
    }

    pub fn to_field_string(&self) -> String {
        self.clusters
            .iter()
            .map(|cluster| cluster.join(ID_SEPARATOR))
            .join(CLUSTER_SEPARATOR)
    }

    fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for cluster in &self.clusters {
            if cluster.is_empty() {
                return Err(PathError::InvalidPartition("empty cluster".to_string()));
            }
            for id in cluster {
                if id.is_empty() {
                    return Err(PathError::InvalidPartition(
                        "empty sequence identifier".to_string(),
                    ));
                }
                if !seen.insert(id.as_str()) {
                    return Err(PathError::InvalidPartition(format!(
                        "identifier '{id}' appears in more than one place"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SeqId> {
        self.clusters.iter().flatten()
    }

    pub fn n_ids(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    pub fn cluster_of(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.iter().any(|x| x == id))
    }

    /// Membership comparison, ignoring identifier order within the cluster.
    pub fn contains_cluster(&self, cluster: &[SeqId]) -> bool {
        let wanted: HashSet<&SeqId> = cluster.iter().collect();
        self.clusters
            .iter()
            .any(|c| c.len() == cluster.len() && c.iter().all(|id| wanted.contains(id)))
    }

    /// Clusters largest first; equal sizes keep their stored order.
    pub fn sorted_by_size(&self) -> Vec<&Cluster> {
        let mut ret = self.clusters.iter().collect::<Vec<_>>();
        ret.sort_by(|a, b| b.len().cmp(&a.len()));
        ret
    }

    /// Number of ways this partition could have been reached by one merge,
    /// counted as `sum(2^(n-1) - 1)` over clusters and floored to one.
    pub fn potential_parents(&self) -> f64 {
        let combifactor: f64 = self
            .clusters
            .iter()
            .map(|c| 2f64.powi(c.len() as i32 - 1) - 1.0)
            .sum();
        if combifactor == 0.0 { 1.0 } else { combifactor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() -> Result<()> {
        let partition = Partition::parse("a:b;c;d:e:f")?;
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.n_ids(), 6);
        assert_eq!(partition.clusters()[2], vec!["d", "e", "f"]);
        assert_eq!(partition.to_field_string(), "a:b;c;d:e:f");
        Ok(())
    }

    #[test]
    fn test_rejects_duplicates_and_blanks() {
        assert!(matches!(
            Partition::parse("a:b;b"),
            Err(PathError::InvalidPartition(_))
        ));
        assert!(Partition::parse("").is_err());
        assert!(Partition::parse("a;;b").is_err());
        assert!(Partition::new(vec![vec![]]).is_err());
    }

    #[test]
    fn test_sorted_by_size_is_stable() -> Result<()> {
        let partition = Partition::parse("x;a:b;y;c:d:e;z")?;
        let sizes = partition
            .sorted_by_size()
            .into_iter()
            .map(|c| c[0].as_str())
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec!["c", "a", "x", "y", "z"]);
        Ok(())
    }

    #[test]
    fn test_potential_parents() -> Result<()> {
        for k in 1..6 {
            let partition = Partition::singletons((0..k).map(|i| format!("s{i}")))?;
            assert_eq!(partition.potential_parents(), 1.0);
        }
        // 2^(3-1)-1 + 2^(2-1)-1 + 0
        assert_eq!(Partition::parse("a:b:c;d:e;f")?.potential_parents(), 4.0);
        Ok(())
    }

    #[test]
    fn test_contains_cluster_ignores_order() -> Result<()> {
        let partition = Partition::parse("a:b;c")?;
        assert!(partition.contains_cluster(&["b".to_string(), "a".to_string()]));
        assert!(!partition.contains_cluster(&["a".to_string()]));
        assert_eq!(partition.cluster_of("c"), Some(&vec!["c".to_string()]));
        Ok(())
    }
}
