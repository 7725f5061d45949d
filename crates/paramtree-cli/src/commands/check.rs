//! Check command implementation
//!
//! Loads configs the way an application would and reports what would go
//! wrong at runtime: configs that could not be found, parameters defined
//! in more than one file, references that lead nowhere and command line
//! overrides naming nothing.

use colored::Colorize;
use paramtree_core::{CheckingMode, Container};
use paramtree_fs::NormalizedPath;
use serde::Serialize;

use super::load_config;
use crate::error::{CliError, Result};
use crate::settings::Settings;

/// What to check.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub configs: Vec<String>,
    pub facts: Vec<String>,
    pub search: Vec<NormalizedPath>,
    pub mode: Option<CheckingMode>,
    pub cmdline: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub resolved: usize,
    pub missing_configs: Vec<String>,
    pub duplicates: Vec<String>,
    pub unresolved: Vec<String>,
    pub unknown_overrides: Vec<String>,
    pub extra_cmdline: Vec<String>,
}

impl CheckReport {
    pub fn problem_count(&self) -> usize {
        self.missing_configs.len() + self.duplicates.len() + self.unresolved.len() + self.unknown_overrides.len()
    }
}

/// Load and resolve, collecting every problem. Fatal load errors (parse
/// errors, cycles, conflicts) are returned as errors.
pub fn check_configs(settings: &Settings, options: &CheckOptions) -> Result<CheckReport> {
    let mut container = Container::new(settings.container_options(&options.search, options.mode));
    settings.apply_facts(&mut container, &options.facts)?;
    container.set_cmdline(&options.cmdline)?;

    for config in &options.configs {
        load_config(&mut container, config)?;
    }

    let resolved = container.resolve_loaded()?;
    let unknown_overrides = container
        .cmdline()
        .overrides()
        .filter(|(name, _)| !resolved.values.iter().any(|(n, _)| n == name))
        .map(|(name, _)| format!("--{name} does not name a loaded parameter"))
        .collect();

    Ok(CheckReport {
        resolved: resolved.values.len(),
        missing_configs: container.missing_configs().to_vec(),
        duplicates: container.loaded_data().duplicates().to_vec(),
        unresolved: resolved.unresolved,
        unknown_overrides,
        extra_cmdline: container.extra_cmdline().to_vec(),
    })
}

/// Run the check command
pub fn run_check(settings: &Settings, options: &CheckOptions) -> Result<()> {
    let report = check_configs(settings, options)?;
    print_report(&report);

    match report.problem_count() {
        0 => Ok(()),
        count => Err(CliError::Problems { count }),
    }
}

fn print_report(report: &CheckReport) {
    let blocks: [(&str, &[String]); 4] = [
        ("Missing configs", &report.missing_configs),
        ("Parameters loaded more than once", &report.duplicates),
        ("Unresolved references", &report.unresolved),
        ("Command line errors", &report.unknown_overrides),
    ];
    for (title, entries) in blocks {
        if entries.is_empty() {
            continue;
        }
        println!("{}", format!("{title}:").red().bold());
        for entry in entries {
            println!("  {} {}", "!".red(), entry);
        }
        println!();
    }

    if !report.extra_cmdline.is_empty() {
        println!(
            "{} {}",
            "Extra command line:".bold(),
            report.extra_cmdline.join(" ").dimmed()
        );
    }

    if report.problem_count() == 0 {
        println!("{} {} parameters resolved", "OK".green().bold(), report.resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn options_in(dir: &TempDir, configs: &[&str]) -> CheckOptions {
        CheckOptions {
            configs: configs.iter().map(|c| c.to_string()).collect(),
            search: vec![NormalizedPath::new(dir.path())],
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_config() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("ports.pt"),
            "namespace ports {\nint cmd = 1;\nint & data = ports.cmd;\n}\n",
        )
        .unwrap();

        let report = check_configs(&Settings::default(), &options_in(&temp, &["ports"])).unwrap();

        assert_eq!(report.problem_count(), 0);
        assert_eq!(report.resolved, 2);
    }

    #[test]
    fn test_problems_are_collected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("main.pt"),
            "#include \"absent\"\nnamespace a {\nint & x = b.y;\n}\n",
        )
        .unwrap();
        let mut options = options_in(&temp, &["main"]);
        options.cmdline = vec!["--a.nothing".to_string(), "1".to_string(), "stray".to_string()];

        let report = check_configs(&Settings::default(), &options).unwrap();

        assert_eq!(report.unresolved, vec!["a.x -> b.y"]);
        assert_eq!(report.missing_configs.len(), 1);
        assert!(report.missing_configs[0].starts_with("absent"));
        assert_eq!(report.unknown_overrides, vec!["--a.nothing does not name a loaded parameter"]);
        assert_eq!(report.extra_cmdline, vec!["stray"]);
        assert_eq!(report.problem_count(), 3);
        assert!(matches!(
            run_check(&Settings::default(), &options),
            Err(CliError::Problems { count: 3 })
        ));
    }

    #[test]
    fn test_facts_from_settings_and_flags() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("site.pt"),
            "#if site == tower\nnamespace a {\nint x = 1;\n}\n#endif\n\
             #if site == lab\nnamespace a {\nint & x = nowhere.y;\n}\n#endif\n",
        )
        .unwrap();
        let mut settings = Settings::default();
        settings.facts.insert("site".to_string(), "lab".to_string());

        let report = check_configs(&settings, &options_in(&temp, &["site"])).unwrap();
        assert_eq!(report.unresolved.len(), 1);

        let mut options = options_in(&temp, &["site"]);
        options.facts = vec!["site=tower".to_string()];
        let report = check_configs(&settings, &options).unwrap();
        assert_eq!(report.problem_count(), 0);
    }

    #[test]
    fn test_unknown_config_is_fatal() {
        let temp = TempDir::new().unwrap();
        let result = check_configs(&Settings::default(), &options_in(&temp, &["absent"]));
        assert!(matches!(result, Err(CliError::Core(paramtree_core::Error::ConfigNotFound { .. }))));
    }
}
