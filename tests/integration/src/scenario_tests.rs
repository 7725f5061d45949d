//! End-to-end scenarios: files on disk, registered sections, refresh and
//! save.

use std::fs;

use paramtree_core::{
    CheckingMode, ConfigSection, Container, ContainerOptions, Error, Param, ParamSpec, Registrar,
    SaveOptions, Saver, SubconfigMap,
};
use paramtree_fs::NormalizedPath;
use paramtree_meta::{ConfigFormat, ElementKind, LoadedData, ParameterSource, StorageLocation};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Default)]
struct Ports {
    cmd: Param<i32>,
}

impl ConfigSection for Ports {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.add(ParamSpec::new("cmd", &self.cmd).help("Command port"));
    }
}

#[derive(Default)]
struct Daq {
    fdp_cmd: Param<i32>,
    label: Param<String>,
}

impl ConfigSection for Daq {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.add(ParamSpec::new("fdp_cmd", &self.fdp_cmd));
        reg.add(
            ParamSpec::new("label", &self.label)
                .optional("default_value".to_string())
                .cmdline("label"),
        );
    }
}

#[derive(Default)]
struct Filter {
    port: Param<i32>,
}

impl ConfigSection for Filter {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.add(ParamSpec::new("port", &self.port));
    }
}

#[derive(Default)]
struct Checker {
    filters: SubconfigMap<Filter>,
}

impl ConfigSection for Checker {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.subconfig("filters", &self.filters);
    }
}

fn container_in(temp: &TempDir) -> Container {
    Container::new(ContainerOptions::new().with_config_dir(NormalizedPath::new(temp.path())))
}

fn value_names(data: &LoadedData) -> Vec<&str> {
    data.iter().filter(|e| e.is_value_bearing()).map(|e| e.name()).collect()
}

#[test]
fn test_reference_chain_across_files() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("main.pt"),
        "#include \"ports\"\n#include \"fdp2\"\nnamespace daq {\nint & fdp_cmd = fdp2.cmd;\n}\n",
    )
    .unwrap();
    fs::write(temp.path().join("ports.pt"), "namespace ports {\nint cmd = 123;\n}\n").unwrap();
    fs::write(temp.path().join("fdp2.pt"), "namespace fdp2 {\nint & cmd = ports.cmd;\n}\n").unwrap();

    let mut container = container_in(&temp);
    container.load("main").unwrap();
    let daq = Daq::default();
    container.register("daq", &daq).unwrap();
    container.refresh().unwrap();

    assert_eq!(daq.fdp_cmd.get(), 123);
    assert_eq!(
        container.resolve("daq.fdp_cmd").unwrap().map(|v| v.value),
        Some("123".to_string())
    );
}

#[test]
fn test_optional_default_then_command_line() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("daq.pt"), "namespace daq {\nint fdp_cmd = 1;\n}\n").unwrap();
    let mut container = container_in(&temp);
    container.load("daq").unwrap();
    let daq = Daq::default();
    container.register("daq", &daq).unwrap();

    container.refresh().unwrap();
    assert_eq!(daq.label.get(), "default_value");
    assert_eq!(container.parameter_source("daq.label"), Some(ParameterSource::DefaultOptional));

    container.set_cmdline(["-label", "from_cmdline"]).unwrap();
    container.refresh().unwrap();
    assert_eq!(daq.label.get(), "from_cmdline");
    assert_eq!(container.parameter_source("daq.label"), Some(ParameterSource::CmdlineParam));
}

#[test]
fn test_cycle_names_both_parameters() {
    let mut container = Container::default();
    container
        .load_str(
            ConfigFormat::Cstyle,
            "namespace a {\nint & x = b.x;\n}\nnamespace b {\nint & x = a.x;\n}\n",
            StorageLocation::default(),
        )
        .unwrap();

    let err = container.resolve_loaded().unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, Error::ReferenceCycle { .. }));
    assert!(message.contains("a.x"));
    assert!(message.contains("b.x"));
}

#[test]
fn test_include_cycle_is_fatal() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.pt"), "#include \"b\"\n").unwrap();
    fs::write(temp.path().join("b.pt"), "#include \"a\"\n").unwrap();

    let mut container = container_in(&temp);
    let err = container.load("a").unwrap_err();

    let Error::IncludeCycle { chain } = err else {
        panic!("expected an include cycle, got {err}");
    };
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.first(), chain.last());
}

#[test]
fn test_removed_instance_leaves_the_others_in_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("checker.pt");
    fs::write(
        &path,
        "namespace checker {\nnamespace filters {\n\
         namespace first {\nint port = 1;\n}\n\
         namespace second {\nint port = 2;\n}\n\
         namespace third {\nint port = 3;\n}\n\
         }\n}\n",
    )
    .unwrap();

    let mut container = container_in(&temp);
    container.load("checker").unwrap();
    let checker = Checker::default();
    container.register("checker", &checker).unwrap();
    container.refresh().unwrap();
    assert_eq!(checker.filters.names(), vec!["first", "second", "third"]);

    drop(checker.filters.remove("second"));
    Saver::new(SaveOptions::new()).unwrap().save(&mut container).unwrap();

    let saved = paramtree_formats::load_file(&NormalizedPath::new(&path)).unwrap();
    assert_eq!(
        value_names(&saved),
        vec!["checker.filters.first.port", "checker.filters.third.port"]
    );
    assert_eq!(saved.parameter("checker.filters.third.port").unwrap().value, "3");
}

#[test]
fn test_values_are_saved_to_the_file_they_came_from() {
    let temp = TempDir::new().unwrap();
    let main = "#include \"ports\"\nnamespace daq {\nint fdp_cmd = 5;\n}\n";
    fs::write(temp.path().join("main.pt"), main).unwrap();
    fs::write(temp.path().join("ports.pt"), "namespace ports {\nint cmd = 123;\n}\n").unwrap();

    let mut container = container_in(&temp);
    container.load("main").unwrap();
    let ports = Ports::default();
    let daq = Daq::default();
    container.register("ports", &ports).unwrap();
    container.register("daq", &daq).unwrap();
    container.refresh().unwrap();

    ports.cmd.set(124);
    let written = Saver::new(SaveOptions::new()).unwrap().save(&mut container).unwrap();
    assert_eq!(written.len(), 2);

    let ports_file = paramtree_formats::load_file(&NormalizedPath::new(temp.path().join("ports.pt"))).unwrap();
    assert_eq!(ports_file.parameter("ports.cmd").unwrap().value, "124");
    let main_file = paramtree_formats::load_file(&NormalizedPath::new(temp.path().join("main.pt"))).unwrap();
    assert!(main_file.parameter("ports.cmd").is_none());
    assert!(main_file.contains(ElementKind::Include, "ports"));
    assert_eq!(main_file.parameter("daq.fdp_cmd").unwrap().value, "5");
}

#[test]
fn test_template_instantiation_is_idempotent() {
    let mut container = Container::default();
    container
        .load_str(
            ConfigFormat::Cstyle,
            "subconfig_template x {\nint y = 7;\n}\n",
            StorageLocation::default(),
        )
        .unwrap();
    let spec = container.list_templates("x").remove(0);

    assert_eq!(container.instantiate_template(&spec, &["a"]).unwrap(), 1);
    assert_eq!(container.instantiate_template(&spec, &["a"]).unwrap(), 0);

    let concrete: Vec<&str> = value_names(container.loaded_data());
    assert_eq!(concrete, vec!["x.a.y"]);
}

#[test]
fn test_lenient_refresh_reports_without_failing() {
    let mut container = Container::new(ContainerOptions::new().with_checking_mode(CheckingMode::Lenient));
    container
        .load_str(
            ConfigFormat::Cstyle,
            "namespace daq {\nint & fdp_cmd = ports.cmd;\n}\n",
            StorageLocation::default(),
        )
        .unwrap();
    let daq = Daq::default();
    container.register("daq", &daq).unwrap();

    let report = container.refresh().unwrap();

    assert_eq!(report.unresolved_references, vec!["daq.fdp_cmd -> ports.cmd"]);
    assert!(report.missing_parameters.is_empty());
    assert!(report.has_errors());
    assert!(report.error_message().contains("daq.fdp_cmd -> ports.cmd"));
}
