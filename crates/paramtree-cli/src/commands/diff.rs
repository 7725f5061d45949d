//! Diff command implementation
//!
//! Both files are normalized through the cstyle exporter first, so only
//! differences in content show up, not in layout or format.

use std::path::Path;

use colored::Colorize;
use paramtree_formats::ExporterFactory;
use paramtree_meta::ConfigFormat;
use similar::{ChangeTag, TextDiff};

use super::load_data;
use crate::error::Result;

fn normalized(path: &Path) -> Result<String> {
    let data = load_data(path)?;
    Ok(ExporterFactory::from_env().exporter(ConfigFormat::Cstyle).export(&data)?)
}

/// Run the diff command
pub fn run_diff(a: &Path, b: &Path) -> Result<()> {
    let left = normalized(a)?;
    let right = normalized(b)?;
    if left == right {
        println!("{} The configs have the same content.", "OK".green().bold());
        return Ok(());
    }

    println!("{} {}", "---".red(), a.display());
    println!("{} {}", "+++".green(), b.display());
    let diff = TextDiff::from_lines(&left, &right);
    for group in diff.grouped_ops(3) {
        println!("{}", "@@".cyan());
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = change.to_string_lossy();
                let line = line.trim_end_matches('\n');
                match change.tag() {
                    ChangeTag::Delete => println!("{}", format!("-{line}").red()),
                    ChangeTag::Insert => println!("{}", format!("+{line}").green()),
                    ChangeTag::Equal => println!(" {line}"),
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Unified diff of the normalized exports, empty when the configs agree.
    fn diff_text(a: &Path, b: &Path) -> Result<String> {
        let left = normalized(a)?;
        let right = normalized(b)?;
        if left == right {
            return Ok(String::new());
        }
        let diff = TextDiff::from_lines(&left, &right);
        Ok(diff
            .unified_diff()
            .context_radius(3)
            .header(&a.display().to_string(), &b.display().to_string())
            .to_string())
    }

    #[test]
    fn test_layout_differences_are_ignored() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.pt");
        let b = temp.path().join("b.json");
        fs::write(&a, "namespace ports {\nint cmd = 1;\n}\n").unwrap();
        super::super::run_convert(&crate::settings::Settings::default(), &a, &b).unwrap();

        assert_eq!(diff_text(&a, &b).unwrap(), "");
    }

    #[test]
    fn test_changed_value_shows_up() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.pt");
        let b = temp.path().join("b.pt");
        fs::write(&a, "namespace ports {\nint cmd = 1;\nint data = 2;\n}\n").unwrap();
        fs::write(&b, "namespace ports {\nint cmd = 5;\nint data = 2;\n}\n").unwrap();

        let text = diff_text(&a, &b).unwrap();

        assert!(text.contains("-    int cmd = 1;"));
        assert!(text.contains("+    int cmd = 5;"));
        assert!(text.contains(" int data = 2;"));
    }
}
