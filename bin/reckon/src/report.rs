//! Plain-text reports.
use std::{
    fmt::{self, Write as _},
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use reckon_core::{BoundedSet, FrequencyTable, Results, ResultsMap};
use tracing::info;

/// Entries accounting for this share of a table's observations, or less, are left out of the report.
const SUMMARY_THRESHOLD: f64 = 0.01;

/// Renders a report for a single bucket.
///
/// Example sets are trimmed to their capacity before rendering. Sections are only rendered for value types that were
/// observed at least once.
pub fn render(results: &Results) -> String {
    let mut results = results.clone();
    results.trim_examples();

    let mut out = String::new();
    // Writing into a `String` cannot fail.
    let _ = write_report(&mut out, &results);
    out
}

fn write_report(out: &mut String, results: &Results) -> fmt::Result {
    writeln!(out, "# of keys sampled: {}", results.key_count())?;

    let strings = &results.strings;
    if !strings.keys.is_empty() {
        writeln!(out, "\n--- Strings ({}) ---", strings.sizes.total())?;
        write_examples(out, "Example Keys", &strings.keys)?;
        write_examples(out, "Example Values", &strings.values)?;
        write_sizes(out, "Sizes", &strings.sizes)?;
    }

    for (title, collection) in [
        ("Sets", &results.sets),
        ("Sorted Sets", &results.sorted_sets),
        ("Lists", &results.lists),
    ] {
        if collection.keys.is_empty() {
            continue;
        }
        writeln!(out, "\n--- {} ({}) ---", title, collection.sizes.total())?;
        write_examples(out, "Example Keys", &collection.keys)?;
        write_sizes(out, "Sizes", &collection.sizes)?;
        write_examples(out, "Example Elements", &collection.elements)?;
        write_sizes(out, "Element Sizes", &collection.element_sizes)?;
    }

    let hashes = &results.hashes;
    if !hashes.keys.is_empty() {
        writeln!(out, "\n--- Hashes ({}) ---", hashes.sizes.total())?;
        write_examples(out, "Example Keys", &hashes.keys)?;
        write_sizes(out, "Sizes", &hashes.sizes)?;
        write_examples(out, "Example Fields", &hashes.fields)?;
        write_sizes(out, "Field Sizes", &hashes.field_sizes)?;
        write_examples(out, "Example Values", &hashes.values)?;
        write_sizes(out, "Value Sizes", &hashes.value_sizes)?;
    }

    Ok(())
}

fn write_examples(out: &mut String, title: &str, examples: &BoundedSet) -> fmt::Result {
    writeln!(out, "{}:", title)?;
    for example in examples.iter() {
        writeln!(out, " {}", example)?;
    }
    Ok(())
}

fn write_sizes(out: &mut String, title: &str, sizes: &FrequencyTable) -> fmt::Result {
    let stats = sizes.statistics();
    writeln!(
        out,
        "{} (min: {} max: {} mean: {:.2} std dev: {:.2}):",
        title, stats.min, stats.max, stats.mean, stats.std_dev
    )?;
    write_frequencies(out, sizes)?;

    writeln!(out, "{} ^2:", title)?;
    write_frequencies(out, &sizes.power_of_two())
}

fn write_frequencies(out: &mut String, table: &FrequencyTable) -> fmt::Result {
    let mut shown = table.clone();
    let total = shown.trim_and_sum(SUMMARY_THRESHOLD);
    for (size, count) in shown.iter() {
        writeln!(out, " {}: {} ({:.2})", size, count, 100.0 * count as f64 / total as f64)?;
    }
    Ok(())
}

/// Writes a report for every bucket, either to standard output or to one file per bucket in `output_dir`.
///
/// # Errors
///
/// If a report cannot be written, an error is returned.
pub fn write_all(totals: &ResultsMap, output_dir: Option<&Path>) -> Result<(), anyhow::Error> {
    match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory '{}'.", dir.display()))?;
            for (bucket, results) in totals {
                let path = report_path(dir, bucket);
                info!(bucket = %bucket, path = %path.display(), "Writing report.");
                fs::write(&path, render(results))
                    .with_context(|| format!("Failed to write report '{}'.", path.display()))?;
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            for (bucket, results) in totals {
                writeln!(stdout, "=== {} ===\n{}", bucket, render(results)).context("Failed to write report.")?;
            }
        }
    }

    Ok(())
}

/// Returns the path of the report file for `bucket`, replacing characters that are not safe in file names.
fn report_path(dir: &Path, bucket: &str) -> PathBuf {
    let name = bucket
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect::<String>();
    dir.join(format!("output-{}.txt", name))
}

#[cfg(test)]
mod tests {
    use reckon_core::KeySample;

    use super::*;

    fn string(value: &str) -> KeySample {
        KeySample::String {
            value: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn renders_only_observed_types() {
        let mut results = Results::new();
        results.observe(b"greeting", &string("hello"));
        results.observe(b"farewell", &string("bye"));

        let report = render(&results);
        assert!(report.starts_with("# of keys sampled: 2\n"));
        assert!(report.contains("--- Strings (2) ---"));
        assert!(report.contains(" greeting\n"));
        assert!(report.contains(" hello\n"));
        assert!(report.contains("Sizes (min: 3 max: 5 mean: 4.00 std dev: 1.41):"));
        assert!(report.contains(" 3: 1 (50.00)\n"));
        assert!(report.contains("Sizes ^2:\n 4: 1 (50.00)\n 8: 1 (50.00)\n"));
        assert!(!report.contains("Hashes"));
        assert!(!report.contains("Lists"));
    }

    #[test]
    fn hides_rare_sizes_but_keeps_the_full_total() {
        let mut results = Results::new();
        for i in 0..200 {
            results.observe(format!("k{}", i).as_bytes(), &string("xx"));
        }
        results.observe(b"outlier", &string("a much longer value"));

        let report = render(&results);
        assert!(report.contains("--- Strings (201) ---"));
        assert!(report.contains(" 2: 200 (99.50)\n"));
        assert!(!report.contains(" 19: 1 "));
        assert!(report.contains("max: 19"));
    }

    #[test]
    fn trims_merged_examples() {
        let mut a = Results::new();
        let mut b = Results::new();
        for i in 0..10 {
            a.observe(format!("a{}", i).as_bytes(), &string("v"));
            b.observe(format!("b{}", i).as_bytes(), &string("v"));
        }
        a.merge(&b);

        let report = render(&a);
        let example_keys = report
            .lines()
            .skip_while(|line| *line != "Example Keys:")
            .skip(1)
            .take_while(|line| line.starts_with(' '))
            .count();
        assert_eq!(example_keys, 10);
        assert_eq!(a.strings.keys.len(), 20);
    }

    #[test]
    fn hash_sections() {
        let mut results = Results::new();
        results.observe(
            b"user:1",
            &KeySample::Hash {
                length: 3,
                field: b"email".to_vec(),
                value: b"a@example.com".to_vec(),
            },
        );

        let report = render(&results);
        assert!(report.contains("--- Hashes (1) ---"));
        assert!(report.contains("Example Fields:\n email\n"));
        assert!(report.contains("Value Sizes (min: 13 max: 13 mean: 13.00 std dev: 0.00):"));
    }

    #[test]
    fn writes_one_file_per_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut totals = ResultsMap::new();
        totals.entry("any-key".to_string()).or_default().observe(b"k", &string("v"));
        totals.entry("odd/name".to_string()).or_default().observe(b"k", &string("v"));

        write_all(&totals, Some(dir.path())).unwrap();

        let report = fs::read_to_string(dir.path().join("output-any-key.txt")).unwrap();
        assert!(report.starts_with("# of keys sampled: 1"));
        assert!(dir.path().join("output-odd_name.txt").exists());
    }
}
