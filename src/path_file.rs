use crate::cluster_path::{PartitionPath, QualityMode, QualitySource};
use crate::error::{PathError, Result};
use crate::partition::{Partition, SeqId};
use crate::settings::PathSettings;
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

pub const REQUIRED_HEADERS: [&str; 4] = ["logprob", "n_clusters", "n_procs", "partition"];
pub const QUALITY_HEADERS: [&str; 3] = ["n_true_clusters", "ccf_under", "ccf_over"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathFileFormat {
    Csv,
    Yaml,
}

impl PathFileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Ok(Self::Csv),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(PathError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// One step as it appears in a partition file. `n_clusters` and `n_procs`
/// are always written but default when read (`n_procs` to 1); the remaining
/// columns beyond `logprob` and `partition` are optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathRow {
    pub logprob: f64,
    #[serde(default)]
    pub n_clusters: Option<usize>,
    #[serde(default)]
    pub n_procs: Option<usize>,
    pub partition: Partition,
    #[serde(default)]
    pub n_true_clusters: Option<usize>,
    #[serde(default)]
    pub ccf_under: Option<f64>,
    #[serde(default)]
    pub ccf_over: Option<f64>,
    #[serde(default)]
    pub seed_unique_id: Option<SeqId>,
    #[serde(default)]
    pub path_index: Option<i64>,
    #[serde(default)]
    pub logweight: Option<f64>,
}

impl PathRow {
    fn field(&self, column: &str) -> String {
        fn opt<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(T::to_string).unwrap_or_default()
        }
        fn float(value: f64) -> String {
            format!("{value:?}")
        }
        match column {
            "logprob" => float(self.logprob),
            "n_clusters" => opt(&self.n_clusters),
            "n_procs" => opt(&self.n_procs),
            "partition" => self.partition.to_field_string(),
            "n_true_clusters" => opt(&self.n_true_clusters),
            "ccf_under" => self.ccf_under.map(float).unwrap_or_default(),
            "ccf_over" => self.ccf_over.map(float).unwrap_or_default(),
            "seed_unique_id" => opt(&self.seed_unique_id),
            "path_index" => opt(&self.path_index),
            "logweight" => self.logweight.map(float).unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// The CSV form of a row: the partition is still `a:b;c` text, and blank
/// fields come in as `None`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    logprob: String,
    #[serde(default)]
    n_clusters: Option<String>,
    #[serde(default)]
    n_procs: Option<String>,
    partition: String,
    #[serde(default)]
    n_true_clusters: Option<String>,
    #[serde(default)]
    ccf_under: Option<String>,
    #[serde(default)]
    ccf_over: Option<String>,
    #[serde(default)]
    seed_unique_id: Option<String>,
    #[serde(default)]
    path_index: Option<String>,
    #[serde(default)]
    logweight: Option<String>,
}

fn parse_field<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| PathError::InvalidField {
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn parse_optional<T: std::str::FromStr>(column: &str, value: Option<String>) -> Result<Option<T>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_field(column, text).map(Some),
    }
}

impl TryFrom<CsvRow> for PathRow {
    type Error = PathError;

    fn try_from(row: CsvRow) -> Result<Self> {
        Ok(Self {
            logprob: parse_field("logprob", &row.logprob)?,
            n_clusters: parse_optional("n_clusters", row.n_clusters)?,
            n_procs: parse_optional("n_procs", row.n_procs)?,
            partition: Partition::parse(&row.partition)?,
            n_true_clusters: parse_optional("n_true_clusters", row.n_true_clusters)?,
            ccf_under: parse_optional("ccf_under", row.ccf_under)?,
            ccf_over: parse_optional("ccf_over", row.ccf_over)?,
            seed_unique_id: row.seed_unique_id.filter(|s| !s.is_empty()),
            path_index: parse_optional("path_index", row.path_index)?,
            logweight: parse_optional("logweight", row.logweight)?,
        })
    }
}

/// Block-oriented layout: a mapping with a `partitions` list.
#[derive(Debug, Serialize, Deserialize)]
struct PathDocument {
    partitions: Vec<PathRow>,
}

#[derive(Clone, Copy, Default)]
pub struct WriteOptions<'a> {
    /// Real data, so no truth columns are written.
    pub is_data: bool,
    pub quality: Option<QualitySource<'a>>,
    pub true_partition: Option<&'a Partition>,
    /// Number of steps around the best one; `None` writes all.
    pub window: Option<isize>,
    pub compute_quality: QualityMode,
    /// Adds `path_index` and `logweight` columns for multi-path interchange.
    pub path_index: Option<i64>,
}

impl PartitionPath {
    pub fn from_file(settings: PathSettings, filename: &Path) -> Result<Self> {
        let mut ret = Self::new(settings);
        ret.read_file(filename)?;
        Ok(ret)
    }

    pub fn from_rows(settings: PathSettings, rows: Vec<PathRow>) -> Result<Self> {
        let mut ret = Self::new(settings);
        ret.load(rows, false)?;
        Ok(ret)
    }

    pub fn read_file(&mut self, filename: &Path) -> Result<()> {
        let name = filename.display().to_string();
        let format = PathFileFormat::from_path(filename)?;
        if std::fs::metadata(filename)?.len() == 0 {
            return Err(PathError::EmptyFile(name));
        }
        let (rows, quality_columns) = match format {
            PathFileFormat::Csv => Self::read_csv_rows(filename)?,
            PathFileFormat::Yaml => {
                let document: PathDocument = serde_yaml::from_reader(File::open(filename)?)?;
                (document.partitions, false)
            }
        };
        debug!(file = %name, rows = rows.len(), "read partition path");
        self.load(rows, quality_columns)
    }

    fn read_csv_rows(filename: &Path) -> Result<(Vec<PathRow>, bool)> {
        let mut reader = csv::ReaderBuilder::new().from_path(filename)?;
        let headers = reader.headers()?.clone();
        let has = |column: &str| headers.iter().any(|h| h == column);
        if !has("partition") {
            return Err(PathError::MissingColumn {
                file: filename.display().to_string(),
                column: "partition".to_string(),
            });
        }
        let quality_columns = has("ccf_under") && has("ccf_over");
        let mut rows = vec![];
        for record in reader.deserialize::<CsvRow>() {
            rows.push(PathRow::try_from(record?)?);
        }
        Ok((rows, quality_columns))
    }

    /// Appends parsed rows in order. Nothing is appended if any row carries a
    /// foreign path index or is otherwise unusable. `quality_columns` records
    /// that the source had quality columns even if every value is blank.
    pub fn load(&mut self, rows: Vec<PathRow>, quality_columns: bool) -> Result<()> {
        for row in &rows {
            if let (Some(found), Some(expected)) = (row.path_index, self.settings().initial_path_index)
            {
                if found != expected {
                    return Err(PathError::PathMismatch { found, expected });
                }
            }
            if row.n_procs == Some(0) {
                return Err(PathError::Shape("parallelism must be positive".to_string()));
            }
        }

        for row in rows {
            if let Some(seed) = row.seed_unique_id.filter(|s| !s.is_empty()) {
                match self.seed_id() {
                    None => self.set_seed_id(seed),
                    Some(adopted) if adopted != seed => {
                        warn!(found = %seed, adopted = %adopted, "seed ids differ between rows");
                    }
                    Some(_) => {}
                }
            }
            if quality_columns {
                self.mark_quality_data();
            }
            let quality = match (row.ccf_under, row.ccf_over) {
                (Some(under), Some(over)) => [Some(under), Some(over)],
                _ => [None, None],
            };
            self.append(
                row.partition,
                row.logprob,
                row.n_procs.unwrap_or(1),
                Some(row.logweight.unwrap_or(0.0)),
                &quality,
            )?;
        }
        Ok(())
    }

    pub fn headers(&self, is_data: bool, with_path_index: bool) -> Vec<&'static str> {
        let mut ret = REQUIRED_HEADERS.to_vec();
        if !is_data {
            ret.extend(QUALITY_HEADERS);
        }
        if self.seed_id().is_some() {
            ret.push("seed_unique_id");
        }
        if with_path_index {
            ret.extend(["path_index", "logweight"]);
        }
        ret
    }

    /// Rows for the windowed steps, computing quality first as `options` asks.
    pub fn rows(&mut self, options: &WriteOptions<'_>) -> Result<Vec<PathRow>> {
        if let (Some(source), QualityMode::All) = (options.quality, options.compute_quality) {
            self.compute_quality(source, None)?;
        }
        let n_true_clusters = match (options.is_data, options.true_partition) {
            (true, _) => None,
            (false, Some(true_partition)) => Some(true_partition.len()),
            (false, None) => {
                return Err(PathError::Shape(
                    "a true partition is needed unless writing data".to_string(),
                ));
            }
        };

        let best = self.best_index().ok();
        let mut ret = vec![];
        for index in self.surrounding_window(options.window)? {
            if !options.is_data && options.compute_quality == QualityMode::Best && Some(index) == best {
                if let Some(source) = options.quality {
                    self.compute_quality(source, Some(index))?;
                }
            }
            let step = &self.steps()[index];
            let (ccf_under, ccf_over) = match step.quality {
                (Some(under), Some(over)) if !options.is_data => (Some(under), Some(over)),
                _ => (None, None),
            };
            ret.push(PathRow {
                logprob: step.log_prob,
                n_clusters: Some(step.partition.len()),
                n_procs: Some(step.n_procs),
                partition: step.partition.clone(),
                n_true_clusters,
                ccf_under,
                ccf_over,
                seed_unique_id: self.seed_id().map(str::to_string),
                path_index: options.path_index,
                logweight: options.path_index.and(step.log_weight),
            });
        }
        Ok(ret)
    }

    /// Writes the windowed steps as CSV. The file is only touched once every
    /// row has been produced.
    pub fn write(&mut self, destination: &Path, options: &WriteOptions<'_>) -> Result<()> {
        if PathFileFormat::from_path(destination)? != PathFileFormat::Csv {
            return Err(PathError::UnsupportedFormat(destination.display().to_string()));
        }
        let rows = self.rows(options)?;
        let headers = self.headers(options.is_data, options.path_index.is_some());

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(headers.iter().map(|h| row.field(h)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PathError::Io(e.into_error()))?;
        std::fs::write(destination, bytes)?;
        debug!(file = %destination.display(), rows = rows.len(), "wrote partition path");
        Ok(())
    }

    /// FASTA with one record per identifier of the best step, named
    /// `uid|CLONE=k` where `k` is the cluster's position in that step.
    pub fn write_clone_fasta(
        &self,
        destination: &Path,
        sequences: &HashMap<SeqId, Vec<String>>,
    ) -> Result<()> {
        let best = self.best_step()?;
        let mut records = vec![];
        for (iclust, cluster) in best.partition.clusters().iter().enumerate() {
            for uid in cluster {
                let seqs = sequences
                    .get(uid)
                    .ok_or_else(|| PathError::MissingSequence(uid.clone()))?;
                let [seq] = seqs.as_slice() else {
                    return Err(PathError::MultipleSequences {
                        uid: uid.clone(),
                        count: seqs.len(),
                    });
                };
                records.push((format!("{uid}|CLONE={iclust}"), seq));
            }
        }
        let mut writer = fasta::Writer::to_file(destination)?;
        for (id, seq) in records {
            writer.write(&id, None, seq.as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}
