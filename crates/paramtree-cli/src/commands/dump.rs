//! Dump command implementation

use colored::Colorize;
use paramtree_core::Container;
use paramtree_meta::LoadedElement;

use super::load_config;
use crate::error::Result;
use crate::settings::Settings;

/// Run the dump command
pub fn run_dump(settings: &Settings, config: &str, facts: &[String], json: bool, resolved: bool) -> Result<()> {
    let mut container = Container::new(settings.container_options(&[], None));
    settings.apply_facts(&mut container, facts)?;
    load_config(&mut container, config)?;

    if resolved {
        let data = container.resolve_loaded()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&data)?);
            return Ok(());
        }
        for (name, value) in &data.values {
            println!("{} = {}  {}", name.bold(), value.value, format!("({})", value.source).dimmed());
        }
        for entry in &data.unresolved {
            println!("{} {}", "unresolved".red(), entry);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(container.loaded_data().elements())?);
        return Ok(());
    }
    for element in container.loaded_data().iter() {
        println!("{}", describe(element));
    }
    Ok(())
}

/// One line per element: kind, name, content and where it was loaded from.
pub(crate) fn describe(element: &LoadedElement) -> String {
    let body = match element {
        LoadedElement::Parameter(p) => format!("{} = {}", p.metadata.name, p.value),
        LoadedElement::Reference(r) => format!("{} -> {}", r.metadata.name, r.target),
        LoadedElement::Override(o) => format!("{} = {}", o.name, o.value),
        LoadedElement::Define(d) => format!("{} {}", d.name, d.value),
        LoadedElement::Include(i) => i.path.clone(),
        LoadedElement::SearchPath(s) => s.path.clone(),
        LoadedElement::Mapping(m) => format!("{} : {}", m.from, m.full_mapping()),
        LoadedElement::Inheritance(i) => format!("{} : {}", i.section, i.parent),
        LoadedElement::TemplateParameter(t) => format!("{} = {}", t.metadata.name, t.value),
    };
    let location = element.location();
    let facts = location.facts_string();
    let mut line = format!("{:<18} {body}", format!("{:?}", element.kind()));
    if !facts.is_empty() {
        line.push_str(&format!("  [{facts}]"));
    }
    line.push_str(&format!("  ({})", location.describe()));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramtree_meta::{ConfigFormat, LoadedData, StorageLocation};

    #[test]
    fn test_describe_lines() {
        let mut data = LoadedData::new();
        paramtree_formats::import_str(
            ConfigFormat::Cstyle,
            "#define site tower\nnamespace a {\nint x = 1;\nint & y = a.x;\n}\n",
            StorageLocation::file("/cfg", "main", ConfigFormat::Cstyle),
            &mut data,
        )
        .unwrap();

        let lines: Vec<String> = data.iter().map(describe).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Define"));
        assert!(lines[0].contains("site tower"));
        assert!(lines[1].contains("a.x = 1"));
        assert!(lines[2].contains("a.y -> a.x"));
    }
}
