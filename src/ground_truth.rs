use crate::error::{PathError, Result};
use crate::partition::{Cluster, Partition, SeqId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TruthEntry {
    /// Identifier of the true cluster (rearrangement event) this sequence came from.
    pub true_cluster: String,
    #[serde(default)]
    pub sequences: Vec<String>,
}

/// Answers which true cluster each sequence identifier belongs to.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    entries: HashMap<SeqId, TruthEntry>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(filename: &str) -> Result<Self> {
        let file = std::fs::File::open(filename)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn insert(&mut self, id: &str, true_cluster: &str, sequences: Vec<String>) {
        self.entries.insert(
            id.to_string(),
            TruthEntry {
                true_cluster: true_cluster.to_string(),
                sequences,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&TruthEntry> {
        self.entries.get(id)
    }

    pub fn true_cluster_of(&self, id: &str) -> Result<&str> {
        self.entries
            .get(id)
            .map(|e| e.true_cluster.as_str())
            .ok_or_else(|| PathError::UnknownIdentifier(id.to_string()))
    }

    /// True if every identifier in `cluster` comes from the same true cluster.
    pub fn from_same_event(&self, cluster: &[SeqId]) -> Result<bool> {
        let Some(first) = cluster.first() else {
            return Ok(true);
        };
        let reference = self.true_cluster_of(first)?;
        for id in &cluster[1..] {
            if self.true_cluster_of(id)? != reference {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The true partition restricted to `ids`, clusters in order of first appearance.
    pub fn true_partition<'a, I>(&self, ids: I) -> Result<Partition>
    where
        I: IntoIterator<Item = &'a SeqId>,
    {
        let mut order: Vec<&str> = vec![];
        let mut groups: HashMap<&str, Cluster> = HashMap::new();
        for id in ids {
            let key = self.true_cluster_of(id)?;
            groups
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    vec![]
                })
                .push(id.clone());
        }
        let clusters = order
            .into_iter()
            .filter_map(|key| groups.remove(key))
            .collect();
        Partition::new(clusters)
    }
}

/// External scoring of a candidate partition against the truth, returning the
/// (under-merge, over-merge) pair.
pub trait QualityMetric {
    fn quality(
        &self,
        partition: &Partition,
        true_partition: &Partition,
        ground_truth: &GroundTruth,
        seed_id: Option<&str>,
    ) -> Result<(f64, f64)>;
}

impl<F> QualityMetric for F
where
    F: Fn(&Partition, &Partition, &GroundTruth, Option<&str>) -> Result<(f64, f64)>,
{
    fn quality(
        &self,
        partition: &Partition,
        true_partition: &Partition,
        ground_truth: &GroundTruth,
        seed_id: Option<&str>,
    ) -> Result<(f64, f64)> {
        self(partition, true_partition, ground_truth, seed_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth() -> GroundTruth {
        let mut ret = GroundTruth::new();
        ret.insert("a", "e1", vec!["ACGT".to_string()]);
        ret.insert("b", "e1", vec![]);
        ret.insert("c", "e2", vec![]);
        ret.insert("d", "e1", vec![]);
        ret
    }

    #[test]
    fn test_true_partition_restricted_to_ids() -> Result<()> {
        let truth = truth();
        let ids = ["c", "a", "d"].map(String::from);
        let partition = truth.true_partition(ids.iter())?;
        assert_eq!(partition, Partition::parse("c;a:d")?);
        Ok(())
    }

    #[test]
    fn test_from_same_event() -> Result<()> {
        let truth = truth();
        assert!(truth.from_same_event(&["a".to_string(), "b".to_string()])?);
        assert!(!truth.from_same_event(&["a".to_string(), "c".to_string()])?);
        assert!(matches!(
            truth.from_same_event(&["zz".to_string()]),
            Err(PathError::UnknownIdentifier(_))
        ));
        Ok(())
    }

    #[test]
    fn test_json_layout() {
        let truth: GroundTruth =
            serde_json::from_str(r#"{"x": {"true_cluster": "e9", "sequences": ["AC"]}}"#).unwrap();
        assert_eq!(truth.true_cluster_of("x").unwrap(), "e9");
        assert_eq!(truth.get("x").unwrap().sequences, vec!["AC"]);
    }
}
