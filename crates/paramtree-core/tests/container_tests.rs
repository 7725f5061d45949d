//! Tests for loading, registration and refresh through the public API

use paramtree_core::{
    CheckingMode, ConfigSection, Container, ContainerOptions, Error, Param, ParamSpec, Registrar,
    SubconfigMap,
};
use paramtree_fs::NormalizedPath;
use paramtree_meta::{ConfigFormat, ParameterSource, StorageLocation};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use tempfile::TempDir;

#[derive(Default)]
struct Ports {
    cmd: Param<i32>,
    data: Param<i32>,
}

impl ConfigSection for Ports {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.add(ParamSpec::new("cmd", &self.cmd).cmdline("cmd_port").help("Command port"));
        reg.add(ParamSpec::new("data", &self.data).optional(4000));
    }
}

#[derive(Default)]
struct Daq {
    fdp_cmd: Param<i32>,
    verbose: Param<bool>,
}

impl ConfigSection for Daq {
    fn declare(&self, reg: &mut Registrar<'_>) {
        reg.add(ParamSpec::new("fdp_cmd", &self.fdp_cmd));
        reg.add(ParamSpec::new("verbose", &self.verbose).pure_cmdline(false).cmdline("v"));
    }
}

const PORTS_AND_DAQ: &str = "namespace ports {\nint cmd = 123;\n}\n\
                             namespace fdp2 {\nint & cmd = ports.cmd;\n}\n\
                             namespace daq {\nint & fdp_cmd = fdp2.cmd;\n}\n";

fn load(container: &mut Container, text: &str) {
    container
        .load_str(ConfigFormat::Cstyle, text, StorageLocation::default())
        .expect("Should load config text");
}

mod resolution_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_chain_reaches_registered_slot() {
        let mut container = Container::default();
        load(&mut container, PORTS_AND_DAQ);
        let daq = Daq::default();
        container.register("daq", &daq).unwrap();

        let report = container.refresh().expect("Refresh should succeed");

        assert!(report.is_clean());
        assert_eq!(daq.fdp_cmd.get(), 123);
        assert_eq!(
            container.parameter_source("daq.fdp_cmd"),
            Some(ParameterSource::ResolvedReference)
        );
    }

    #[rstest]
    #[case::load_then_register(true)]
    #[case::register_then_load(false)]
    fn test_load_and_registration_order_do_not_matter(#[case] load_first: bool) {
        let mut container = Container::default();
        let ports = Ports::default();
        let daq = Daq::default();

        if load_first {
            load(&mut container, PORTS_AND_DAQ);
            container.register("daq", &daq).unwrap();
            container.register("ports", &ports).unwrap();
        } else {
            container.register("ports", &ports).unwrap();
            container.register("daq", &daq).unwrap();
            load(&mut container, PORTS_AND_DAQ);
        }
        container.refresh().unwrap();

        assert_eq!(ports.cmd.get(), 123);
        assert_eq!(daq.fdp_cmd.get(), 123);
    }

    #[test]
    fn test_optional_default_until_given_on_command_line() {
        let mut container = Container::default();
        load(&mut container, "namespace ports {\nint cmd = 1;\n}\n");
        let ports = Ports::default();
        container.register("ports", &ports).unwrap();

        container.refresh().unwrap();
        assert_eq!(ports.data.get(), 4000);
        assert_eq!(
            container.parameter_source("ports.data"),
            Some(ParameterSource::DefaultOptional)
        );

        container.set_cmdline(["--ports.data", "4100"]).unwrap();
        container.refresh().unwrap();
        assert_eq!(ports.data.get(), 4100);
        assert_eq!(
            container.parameter_source("ports.data"),
            Some(ParameterSource::CmdlineOverride)
        );
    }

    #[test]
    fn test_switch_beats_file_value() {
        let mut container = Container::default();
        load(&mut container, "namespace ports {\nint cmd = 1;\n}\n");
        container.set_cmdline(["-cmd_port", "9"]).unwrap();
        let ports = Ports::default();
        container.register("ports", &ports).unwrap();

        container.refresh().unwrap();

        assert_eq!(ports.cmd.get(), 9);
        assert_eq!(container.parameter_source("ports.cmd"), Some(ParameterSource::CmdlineParam));
    }

    #[test]
    fn test_pure_command_line_parameter_ignores_files() {
        let mut container = Container::default();
        load(&mut container, PORTS_AND_DAQ);
        load(&mut container, "namespace daq {\nbool verbose = true;\n}\n");
        let daq = Daq::default();
        container.register("daq", &daq).unwrap();

        container.refresh().unwrap();
        assert!(!daq.verbose.get());
        assert_eq!(container.parameter_source("daq.verbose"), Some(ParameterSource::DefaultPure));

        container.set_cmdline(["-v"]).unwrap();
        container.refresh().unwrap();
        assert!(daq.verbose.get());
    }

    #[test]
    fn test_reference_cycle_aborts_refresh() {
        let mut container = Container::new(ContainerOptions::new().with_checking_mode(CheckingMode::Lenient));
        load(
            &mut container,
            "namespace daq {\nint & fdp_cmd = ports.cmd;\n}\nnamespace ports {\nint & cmd = daq.fdp_cmd;\n}\n",
        );
        let daq = Daq::default();
        container.register("daq", &daq).unwrap();

        let err = container.refresh().unwrap_err();

        let Error::ReferenceCycle { chain } = err else {
            panic!("expected a reference cycle, got {err}");
        };
        assert_eq!(chain, vec!["daq.fdp_cmd", "ports.cmd", "daq.fdp_cmd"]);
    }

    #[test]
    fn test_legacy_registration_reads_old_prefix() {
        let mut container = Container::new(ContainerOptions::new().with_checking_mode(CheckingMode::Lenient));
        load(&mut container, "namespace old_ports {\nint cmd = 77;\n}\n");
        let ports = Ports::default();
        container.register_legacy("ports", "old_ports", &ports).unwrap();

        let report = container.refresh().unwrap();

        assert_eq!(ports.cmd.get(), 77);
        assert_eq!(report.loaded_deprecated_names, vec!["old_ports.cmd -> ports.cmd"]);
    }

    #[test]
    fn test_strict_refresh_reports_every_missing_parameter() {
        let mut container = Container::default();
        let ports = Ports::default();
        let daq = Daq::default();
        container.register("ports", &ports).unwrap();
        container.register("daq", &daq).unwrap();

        let err = container.refresh().unwrap_err();

        let Error::RefreshFailed { report } = err else {
            panic!("expected a failed refresh, got {err}");
        };
        assert_eq!(report.missing_parameters, vec!["ports.cmd", "daq.fdp_cmd"]);
        assert!(report.error_message().contains("ports.cmd"));
    }

    #[test]
    fn test_facts_select_conditional_blocks() {
        let mut container = Container::default();
        container.set_fact("site", "tower").unwrap();
        load(
            &mut container,
            "#if site == tower\nnamespace ports {\nint cmd = 1;\n}\n#endif\n\
             #if site == lab\nnamespace ports {\nint cmd = 2;\n}\n#endif\n",
        );
        let ports = Ports::default();
        container.register("ports", &ports).unwrap();

        container.refresh().unwrap();

        assert_eq!(ports.cmd.get(), 1);
    }
}

mod subconfig_tests {
    use super::*;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn test_loaded_instances_are_created_and_filled() {
        let mut container = Container::default();
        load(
            &mut container,
            "namespace checker {\nnamespace filters {\n\
             namespace a {\nint port = 1;\n}\nnamespace b {\nint port = 2;\n}\n}\n}\n",
        );
        let checker = Checker::default();
        container.register("checker", &checker).unwrap();

        container.refresh().unwrap();

        assert_eq!(checker.filters.names(), vec!["a", "b"]);
        assert_eq!(checker.filters.get("b").map(|f| f.port.get()), Some(2));
        assert!(container.is_registered("checker.filters.a.port"));
    }

    #[test]
    fn test_removed_instance_is_unregistered() {
        let mut container = Container::default();
        load(
            &mut container,
            "namespace checker {\nnamespace filters {\nnamespace a {\nint port = 1;\n}\n}\n}\n",
        );
        let checker = Checker::default();
        container.register("checker", &checker).unwrap();
        container.refresh().unwrap();

        checker.filters.remove("a");
        container.refresh().unwrap();

        assert!(!container.is_registered("checker.filters.a.port"));
    }

    #[test]
    fn test_dropped_section_is_unregistered() {
        let mut container = Container::default();
        load(&mut container, "namespace ports {\nint cmd = 1;\n}\n");
        {
            let ports = Ports::default();
            container.register("ports", &ports).unwrap();
            container.refresh().unwrap();
            assert!(container.is_registered("ports.cmd"));
        }
        container.refresh().unwrap();
        assert!(!container.is_registered("ports.cmd"));
    }
}

mod file_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_by_name_through_search_path() {
        let temp = TempDir::new().unwrap();
        let site = temp.path().join("site");
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("ports.pt"), "namespace ports {\nint cmd = 5;\n}\n").unwrap();

        let mut container = Container::new(ContainerOptions::new().with_search_path(NormalizedPath::new(&site)));
        container.load("ports").expect("Should find ports.pt");
        let ports = Ports::default();
        container.register("ports", &ports).unwrap();
        container.refresh().unwrap();

        assert_eq!(ports.cmd.get(), 5);
    }

    #[test]
    fn test_unknown_config_name() {
        let temp = TempDir::new().unwrap();
        let mut container = Container::new(ContainerOptions::new().with_config_dir(NormalizedPath::new(temp.path())));

        let err = container.load("absent").unwrap_err();

        assert!(matches!(err, Error::ConfigNotFound { ref name } if name == "absent"));
    }
}

mod nested_section_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Site {
        ports: Ports,
        label: Param<String>,
    }

    impl ConfigSection for Site {
        fn declare(&self, reg: &mut Registrar<'_>) {
            reg.section("ports", &self.ports);
            reg.add(ParamSpec::new("label", &self.label));
        }
    }

    #[test]
    fn test_nested_section_names_and_prefix_restore() {
        let mut container = Container::default();
        load(
            &mut container,
            "namespace site {\nstring label = \"tower\";\n\
             namespace ports {\nint cmd = 7;\n}\n}\n",
        );
        let site = Site::default();
        container.register("site", &site).unwrap();

        container.refresh().unwrap();

        assert_eq!(
            container.registered_names(),
            vec!["site.ports.cmd", "site.ports.data", "site.label"]
        );
        assert_eq!(site.ports.cmd.get(), 7);
        assert_eq!(site.label.get(), "tower");
    }
}

proptest! {
    #[test]
    fn prop_namespace_order_does_not_change_resolution(
        blocks in Just(vec![
            "namespace ports {\nint cmd = 123;\n}\n",
            "namespace fdp2 {\nint & cmd = ports.cmd;\n}\n",
            "namespace daq {\nint & fdp_cmd = fdp2.cmd;\n}\n",
        ]).prop_shuffle()
    ) {
        let mut container = Container::default();
        load(&mut container, &blocks.concat());
        let resolved = container.resolve("daq.fdp_cmd").unwrap().map(|v| v.value);
        prop_assert_eq!(resolved, Some("123".to_string()));
    }

    #[test]
    fn prop_integer_values_reach_the_slot(value in any::<i32>()) {
        let mut container = Container::default();
        load(&mut container, &format!("namespace ports {{\nint cmd = {value};\n}}\n"));
        let ports = Ports::default();
        container.register("ports", &ports).unwrap();
        container.refresh().unwrap();
        prop_assert_eq!(ports.cmd.get(), value);
    }
}
