use crate::config::{CSV_BUFFER_SIZE, RULES_CSV_HEADER};
use crate::models::{ContextType, Rule};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes the header and one row per rule. Returns the number of rules written.
///
/// Value-less contexts leave `qid1` empty; confidence is written unrounded.
pub fn write_rules<W, I>(writer: W, rules: I) -> Result<u64, csv::Error>
where
    W: Write,
    I: IntoIterator<Item = Rule>,
{
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(RULES_CSV_HEADER)?;

    let mut count = 0u64;
    for rule in rules {
        let row: (u32, Option<u64>, u32, u64, f64, ContextType) = (
            rule.context_property,
            rule.context_value,
            rule.target_property,
            rule.count,
            rule.confidence,
            rule.context_type,
        );
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Writes rules to `path`. The file only appears once every row has been written.
pub fn write_rules_csv<I>(path: &Path, rules: I) -> Result<u64>
where
    I: IntoIterator<Item = Rule>,
{
    let partial = partial_path(path);
    let file = File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let written = write_rules(BufWriter::with_capacity(CSV_BUFFER_SIZE, file), rules)
        .with_context(|| format!("Failed to write rules to {}", partial.display()));
    let count = match written {
        Ok(count) => count,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    fs::rename(&partial, path)
        .with_context(|| format!("Failed to move rules into place at {}", path.display()))?;
    info!(rules = count, path = %path.display(), "Rules written");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn render(rules: Vec<Rule>) -> (String, u64) {
        let mut out = Vec::new();
        let count = write_rules(&mut out, rules).unwrap();
        (String::from_utf8(out).unwrap(), count)
    }

    #[test]
    fn header_only_for_no_rules() {
        let (out, count) = render(vec![]);
        assert_eq!(out, "pid1,qid1,pid2,count,probability,context\n");
        assert_eq!(count, 0);
    }

    #[test]
    fn rows_leave_missing_values_empty() {
        let (out, count) = render(vec![
            Rule::new(31, Some(5107), 373, 1, 0.5, ContextType::Item),
            Rule::new(373, None, 31, 1, 1.0, ContextType::Item),
            Rule::new(31, None, 580, 2, 0.25, ContextType::Qualifier),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "pid1,qid1,pid2,count,probability,context",
                "31,5107,373,1,0.5,item",
                "373,,31,1,1.0,item",
                "31,,580,2,0.25,qualifier",
            ]
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn confidence_is_not_rounded() {
        let (out, _) = render(vec![Rule::new(1, None, 2, 1, 1.0 / 3.0, ContextType::Reference)]);
        let row = out.lines().nth(1).unwrap();
        let probability: f64 = row.split(',').nth(4).unwrap().parse().unwrap();
        assert_eq!(probability, 1.0 / 3.0);
        assert!(row.ends_with(",reference"));
    }

    #[test]
    fn file_appears_after_complete_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.csv");
        let count = write_rules_csv(
            &path,
            vec![Rule::new(373, None, 31, 1, 1.0, ContextType::Item)],
        )
        .unwrap();

        assert_eq!(count, 1);
        assert!(!partial_path(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("rules.csv");
        assert!(write_rules_csv(&path, Vec::<Rule>::new()).is_err());
        assert!(!path.exists());
    }
}
