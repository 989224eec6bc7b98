use crate::error::{PathError, Result};
use crate::ground_truth::{GroundTruth, QualityMetric};
use crate::partition::{Cluster, ID_SEPARATOR, Partition, SeqId};
use crate::settings::PathSettings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Under-merge and over-merge scores of one step.
pub type QualityPair = (Option<f64>, Option<f64>);

/// One candidate partition found during the search.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub partition: Partition,
    pub log_prob: f64,
    pub n_procs: usize,
    pub log_weight: Option<f64>,
    pub quality: QualityPair,
}

impl Step {
    pub fn has_quality(&self) -> bool {
        self.quality.0.is_some() && self.quality.1.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    #[default]
    None,
    All,
    Best,
}

impl FromStr for QualityMode {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "best" => Ok(Self::Best),
            other => Err(PathError::Shape(format!(
                "quality mode '{other}' is not one of none, all, best"
            ))),
        }
    }
}

/// Ground truth plus the metric used to score steps against it.
#[derive(Clone, Copy)]
pub struct QualitySource<'a> {
    pub ground_truth: &'a GroundTruth,
    pub metric: &'a dyn QualityMetric,
}

/// Append-only log of the partitions visited by one clustering run.
#[derive(Clone, Debug, Default)]
pub struct PartitionPath {
    steps: Vec<Step>,
    seed_id: Option<SeqId>,
    settings: PathSettings,
    best: Option<usize>,
    best_minus_margin: Option<usize>,
    best_is_stale: bool,
    has_quality_data: bool,
}

impl PartitionPath {
    pub fn new(settings: PathSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_seed_id(settings: PathSettings, seed_id: Option<SeqId>) -> Self {
        Self {
            settings,
            seed_id,
            ..Self::default()
        }
    }

    /// Starts from `partition` at log probability zero with a single process.
    pub fn from_partition(settings: PathSettings, partition: Partition) -> Result<Self> {
        let mut ret = Self::new(settings);
        ret.append_partition(partition, 0.0, 1)?;
        Ok(ret)
    }

    /// Each identifier in its own cluster.
    pub fn trivial<I, S>(settings: PathSettings, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<SeqId>,
    {
        Self::from_partition(settings, Partition::singletons(ids)?)
    }

    pub fn settings(&self) -> &PathSettings {
        &self.settings
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn seed_id(&self) -> Option<&str> {
        self.seed_id.as_deref()
    }

    pub(crate) fn set_seed_id(&mut self, seed_id: SeqId) {
        self.seed_id = Some(seed_id);
    }

    pub fn has_quality_data(&self) -> bool {
        self.has_quality_data
    }

    pub(crate) fn mark_quality_data(&mut self) {
        self.has_quality_data = true;
    }

    pub fn append_partition(
        &mut self,
        partition: Partition,
        log_prob: f64,
        n_procs: usize,
    ) -> Result<usize> {
        self.append(partition, log_prob, n_procs, None, &[None, None])
    }

    /// Appends a step and updates the best and best-minus-margin pointers.
    /// While the pointers are stale they are left alone; `recompute_best()`
    /// picks the new step up. Returns the new step's index.
    pub fn append(
        &mut self,
        partition: Partition,
        log_prob: f64,
        n_procs: usize,
        log_weight: Option<f64>,
        quality: &[Option<f64>],
    ) -> Result<usize> {
        let &[under, over] = quality else {
            return Err(PathError::Shape(format!(
                "quality pair must have two entries, got {}",
                quality.len()
            )));
        };
        if n_procs == 0 {
            return Err(PathError::Shape("parallelism must be positive".to_string()));
        }
        if under.is_some() || over.is_some() {
            self.has_quality_data = true;
        }
        // Duplicate log probabilities are fine, they can differ in n_procs.
        self.steps.push(Step {
            partition,
            log_prob,
            n_procs,
            log_weight,
            quality: (under, over),
        });
        let index = self.steps.len() - 1;
        if !self.best_is_stale {
            self.consider_for_best(index);
        }
        Ok(index)
    }

    fn consider_for_best(&mut self, index: usize) {
        let candidate = &self.steps[index];
        let take = match self.best {
            None => true,
            Some(best) => {
                let best = &self.steps[best];
                candidate.log_prob > best.log_prob
                    || candidate.n_procs < best.n_procs
                    || candidate.log_prob.is_infinite()
            }
        };
        if take {
            self.best = Some(index);
        }
        self.update_best_minus_margin();
    }

    fn update_best_minus_margin(&mut self) {
        let Some(best) = self.best else {
            return;
        };
        let best = &self.steps[best];
        if best.log_prob.is_infinite() {
            self.best_minus_margin = self.best;
            return;
        }
        let threshold = best.log_prob - self.settings.rewind_margin;
        if let Some(index) = self
            .steps
            .iter()
            .position(|s| s.n_procs == best.n_procs && s.log_prob > threshold)
        {
            self.best_minus_margin = Some(index);
        }
    }

    /// Replays the incremental best rule over every step, in order.
    pub fn recompute_best(&mut self) {
        self.best = None;
        self.best_minus_margin = None;
        self.best_is_stale = false;
        for index in 0..self.steps.len() {
            self.consider_for_best(index);
        }
    }

    pub fn best_index(&self) -> Result<usize> {
        if self.best_is_stale {
            return Err(PathError::StaleBest);
        }
        self.best.ok_or(PathError::NoBest)
    }

    pub fn best_minus_margin_index(&self) -> Result<usize> {
        if self.best_is_stale {
            return Err(PathError::StaleBest);
        }
        self.best_minus_margin.ok_or(PathError::NoBest)
    }

    pub fn best_step(&self) -> Result<&Step> {
        Ok(&self.steps[self.best_index()?])
    }

    /// Drops step zero. Legacy; the best pointers are unusable afterwards
    /// until `recompute_best()` is called.
    pub fn remove_first_step(&mut self) -> Option<Step> {
        if self.steps.is_empty() {
            return None;
        }
        self.best_is_stale = true;
        Some(self.steps.remove(0))
    }

    /// Indices to show: all of them for `None`, otherwise a contiguous run of
    /// `n` indices around the best step. Negative or oversized `n` means all.
    pub fn surrounding_window(&self, n: Option<isize>) -> Result<Vec<usize>> {
        let total = self.steps.len();
        let Some(n) = n else {
            return Ok((0..total).collect());
        };
        if total == 0 {
            return Ok(vec![]);
        }
        let n = if n < 0 || n as usize >= total {
            total
        } else {
            n as usize
        };
        let best = self.best_index()?;
        let (mut first, mut last) = (best, best);
        while last - first + 1 < n {
            if first > 0 {
                first -= 1;
            }
            if last - first + 1 < n && last < total - 1 {
                last += 1;
            }
        }
        Ok((first..=last).collect())
    }

    /// Fills in path log weights assuming each step was reached by one merge
    /// drawn uniformly from its possible parents.
    pub fn recompute_log_weights(&mut self) {
        let mut last = 0.0;
        for (index, step) in self.steps.iter_mut().enumerate() {
            let base = if index == 0 { 0.0 } else { last };
            let weight = base + (1.0 / step.partition.potential_parents()).ln();
            step.log_weight = Some(weight);
            last = weight;
        }
    }

    /// Scores every step (or only `only_index`) that doesn't have both
    /// quality values yet.
    pub fn compute_quality(
        &mut self,
        source: QualitySource<'_>,
        only_index: Option<usize>,
    ) -> Result<()> {
        for index in 0..self.steps.len() {
            if only_index.is_some_and(|only| only != index) {
                continue;
            }
            let step = &self.steps[index];
            if step.has_quality() {
                continue;
            }
            let true_partition = source.ground_truth.true_partition(step.partition.ids())?;
            let (under, over) = source.metric.quality(
                &step.partition,
                &true_partition,
                source.ground_truth,
                self.seed_id.as_deref(),
            )?;
            self.steps[index].quality = (Some(under), Some(over));
            self.has_quality_data = true;
        }
        Ok(())
    }

    /// The two clusters of step `index - 1` that merged into step `index`, or
    /// `None` if the step didn't reduce the cluster count (a rewind between
    /// processes).
    pub fn parent_clusters(&self, index: usize) -> Result<Option<Vec<&Cluster>>> {
        if index == 0 || index >= self.steps.len() {
            return Err(PathError::Shape(format!(
                "no parent clusters for step {index} of {}",
                self.steps.len()
            )));
        }
        let previous = &self.steps[index - 1].partition;
        let current = &self.steps[index].partition;
        if previous.len() <= current.len() {
            return Ok(None);
        }
        let parents = previous
            .clusters()
            .iter()
            .filter(|c| !current.contains_cluster(c))
            .collect::<Vec<_>>();
        if parents.len() != 2 {
            return Err(PathError::InvalidPartition(format!(
                "step {index} should merge exactly two clusters, found {}",
                parents.len()
            )));
        }
        Ok(Some(parents))
    }

    /// Clusters of step `index` that either mix true clusters or are only part
    /// of one.
    pub fn bad_clusters(
        &self,
        index: usize,
        ground_truth: &GroundTruth,
        true_partition: &Partition,
    ) -> Result<Vec<String>> {
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| PathError::Shape(format!("no step {index}")))?;
        let mut ret = vec![];
        for cluster in step.partition.clusters() {
            let complete = ground_truth.from_same_event(cluster)?
                && Self::covers_true_cluster(cluster, ground_truth, true_partition)?;
            if !complete {
                ret.push(cluster.join(ID_SEPARATOR));
            }
        }
        if ret.len() > 25 {
            ret = vec!["too".to_string(), "long".to_string()];
        }
        Ok(ret)
    }

    fn covers_true_cluster(
        cluster: &Cluster,
        ground_truth: &GroundTruth,
        true_partition: &Partition,
    ) -> Result<bool> {
        let Some(first) = cluster.first() else {
            return Ok(false);
        };
        let event = ground_truth.true_cluster_of(first)?;
        let mut matching = vec![];
        for true_cluster in true_partition.clusters() {
            if let Some(id) = true_cluster.first() {
                if ground_truth.true_cluster_of(id)? == event {
                    matching.push(true_cluster);
                }
            }
        }
        let [true_cluster] = matching.as_slice() else {
            return Err(PathError::InvalidPartition(format!(
                "expected one true cluster for event '{event}', found {}",
                matching.len()
            )));
        };
        Ok(true_cluster.iter().all(|id| cluster.contains(id)))
    }
}
