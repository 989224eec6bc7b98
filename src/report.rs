use crate::cluster_path::{PartitionPath, QualityMode, QualitySource, Step};
use crate::error::Result;
use crate::partition::{Cluster, ID_SEPARATOR};

#[derive(Clone, Copy, Default)]
pub struct ReportOptions<'a> {
    /// Printed after the best / best-minus-margin mark on every line.
    pub extra: &'a str,
    pub print_header: bool,
    /// Number of steps around the best one; `None` shows all.
    pub window: Option<isize>,
    pub quality: Option<QualitySource<'a>>,
    pub compute_quality: QualityMode,
    /// Positions, after sorting by size, of clusters to flag with `!`.
    pub highlight_clusters: &'a [usize],
}

/// Renders the windowed steps as a text table, one line per step.
pub fn format_steps(path: &mut PartitionPath, options: &ReportOptions<'_>) -> Result<String> {
    if let (Some(source), QualityMode::All) = (options.quality, options.compute_quality) {
        path.compute_quality(source, None)?;
    }

    let mut ret = String::new();
    if options.print_header {
        ret += &format!(
            "    {:>7} {:>10}   {:<7} {:>5}  {:>4}",
            "", "logprob", "delta", "clusters", "n_procs"
        );
        if options.quality.is_some() || path.has_quality_data() {
            ret += &format!(" {:>5} {:>5}", "purity", "completeness");
        }
        ret.push('\n');
    }

    let window = path.surrounding_window(options.window)?;
    let best = path.best_index().ok();
    let best_minus_margin = path.best_minus_margin_index().ok();
    for index in window {
        if options.compute_quality == QualityMode::Best && Some(index) == best {
            if let Some(source) = options.quality {
                path.compute_quality(source, Some(index))?;
            }
        }
        let mut mark = if Some(index) == best { "best  " } else { "      " }.to_string();
        if Some(index) == best_minus_margin {
            mark.truncate(4);
            mark += "* ";
        }
        let extra = format!("{mark}{}", options.extra);
        ret += &format_step(path, index, &extra, options)?;
        ret.push('\n');
    }
    Ok(ret)
}

fn format_step(
    path: &PartitionPath,
    index: usize,
    extra: &str,
    options: &ReportOptions<'_>,
) -> Result<String> {
    let steps = path.steps();
    let step = &steps[index];
    let delta = match index {
        0 => String::new(),
        _ => format!("{:.1}", step.log_prob - steps[index - 1].log_prob),
    };
    let mut ret = format!(
        "      {extra}  {:<12.2}{delta:<7}   {:<5}  {:>4}    {}",
        step.log_prob,
        step.partition.len(),
        step.n_procs,
        quality_text(path, step)
    );

    let abbreviate = path.settings().abbreviate_ids;
    // Largest first makes merges easy to follow down the table.
    for (iclust, cluster) in step.partition.sorted_by_size().into_iter().enumerate() {
        let mut text = cluster_text(cluster, abbreviate);
        let impure = match options.quality {
            Some(source) => !source.ground_truth.from_same_event(cluster)?,
            None => false,
        };
        if impure || options.highlight_clusters.contains(&iclust) {
            text = format!("!{text}");
        }
        if path.seed_id().is_some_and(|seed| cluster.iter().any(|id| id == seed)) {
            text = format!("[{text}]");
        }
        ret += if abbreviate { " " } else { "   " };
        ret += &text;
    }
    Ok(ret)
}

fn quality_text(path: &PartitionPath, step: &Step) -> String {
    if !path.has_quality_data() {
        return "   -  -    ".to_string();
    }
    let value = |v: Option<f64>| match v {
        Some(v) => format!("{v:5.2}"),
        None => format!("{:>5}", "-"),
    };
    format!(" {} {} ", value(step.quality.0), value(step.quality.1))
}

fn cluster_text(cluster: &Cluster, abbreviate: bool) -> String {
    if !abbreviate {
        return cluster.join(ID_SEPARATOR);
    }
    cluster
        .iter()
        .map(|id| if id.len() > 3 { "o" } else { id.as_str() })
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_truth::GroundTruth;
    use crate::partition::Partition;
    use crate::settings::PathSettings;

    fn part(text: &str) -> Partition {
        Partition::parse(text).unwrap()
    }

    #[test]
    fn test_marks_and_sorted_clusters() -> Result<()> {
        let mut path = PartitionPath::with_seed_id(PathSettings::default(), Some("c".to_string()));
        path.append_partition(part("a;b;c;d"), -10.0, 1)?;
        path.append_partition(part("a;b;c:d"), -9.0, 1)?;
        path.append_partition(part("a;b:c:d"), -50.0, 1)?;
        let text = format_steps(
            &mut path,
            &ReportOptions {
                print_header: true,
                ..Default::default()
            },
        )?;
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("logprob"));
        assert!(!lines[0].contains("purity"));
        assert!(lines[1].starts_with("          * "));
        assert!(lines[1].contains("   -  -    "));
        assert!(lines[2].starts_with("      best  "));
        assert!(lines[2].contains("-9.00"));
        assert!(lines[2].contains("1.0"));
        assert!(lines[3].ends_with(" [b:c:d] a"));
        Ok(())
    }

    #[test]
    fn test_best_and_margin_marks_differ() -> Result<()> {
        let mut path = PartitionPath::new(PathSettings::default());
        path.append_partition(part("a;b;c"), -20.0, 1)?;
        path.append_partition(part("a:b;c"), -5.0, 1)?;
        let text = format_steps(&mut path, &ReportOptions::default())?;
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("          * "));
        assert!(lines[1].starts_with("      best  "));
        Ok(())
    }

    #[test]
    fn test_best_that_is_also_best_minus_margin() -> Result<()> {
        let mut path = PartitionPath::new(PathSettings::default());
        path.append_partition(part("a;b;c"), -50.0, 1)?;
        path.append_partition(part("a:b;c"), -5.0, 1)?;
        assert_eq!(path.best_index()?, 1);
        assert_eq!(path.best_minus_margin_index()?, 1);
        let text = format_steps(&mut path, &ReportOptions::default())?;
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("              "));
        assert!(lines[1].starts_with("      best* "));
        Ok(())
    }

    #[test]
    fn test_abbreviation_and_quality_columns() -> Result<()> {
        let mut truth = GroundTruth::new();
        for (id, event) in [("seq1", "e1"), ("seq2", "e2"), ("x", "e2")] {
            truth.insert(id, event, vec![]);
        }
        let metric = |_: &Partition, _: &Partition, _: &GroundTruth, _: Option<&str>| {
            Ok::<_, crate::error::PathError>((0.5, 0.25))
        };
        let mut path = PartitionPath::new(PathSettings::default());
        path.append_partition(part("seq1;seq2;x"), -3.0, 1)?;
        path.append_partition(part("seq1:x;seq2"), -2.0, 1)?;
        let text = format_steps(
            &mut path,
            &ReportOptions {
                print_header: true,
                quality: Some(QualitySource {
                    ground_truth: &truth,
                    metric: &metric,
                }),
                compute_quality: QualityMode::Best,
                ..Default::default()
            },
        )?;
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].contains("purity"));
        // quality data only exists once the best step has been scored
        assert!(lines[1].contains("   -  -    "));
        assert!(lines[2].contains(" 0.50  0.25 "));
        assert!(lines[2].ends_with(" !o:x o"));
        Ok(())
    }
}
