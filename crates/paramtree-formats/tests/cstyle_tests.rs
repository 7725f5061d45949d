//! Export layout and round trips of the cstyle format

use paramtree_formats::{CstyleExporter, Exporter, ExporterFactory, import_str};
use paramtree_meta::{ConfigFormat, ElementKind, LoadedData, StorageLocation};
use pretty_assertions::assert_eq;

fn location() -> StorageLocation {
    StorageLocation::file("/etc/app", "ports", ConfigFormat::Cstyle)
}

fn import(text: &str) -> LoadedData {
    let mut data = LoadedData::new();
    import_str(ConfigFormat::Cstyle, text, location(), &mut data).unwrap();
    data
}

const PORTS: &str = r#"#config_version 3
#define site tower
#include "common"
namespace ports {
    //! Command port
    //!
    //! \cmdline cmd_port
    int cmd = 123;
    int & fdp = ports.cmd;
}
#if site == tower
namespace tower {
    string label = "north";
}
#endif
"#;

#[test]
fn test_export_layout() {
    let output = CstyleExporter::new().export(&import(PORTS)).unwrap();
    insta::assert_snapshot!(output, @r#"
    #config_version 3

    #define site tower
    #include "common"

    // -----------------------------------------------------------------------------
    namespace ports {
        //! Command port
        //!
        //! \cmdline cmd_port
        int cmd = 123;
        int & fdp = ports.cmd;
    } // namespace ports

    #if site == tower
    // -----------------------------------------------------------------------------
    namespace tower {
        string label = "north";
    } // namespace tower
    #endif // site == tower

    // EOF
    "#);
}

#[test]
fn test_export_groups_shared_conditions() {
    let data = import(
        "namespace a {\n\
         #if site == x\n\
         int one = 1;\n\
         #endif\n\
         int two = 2;\n\
         #if site == x\n\
         int three = 3;\n\
         #endif\n\
         }\n",
    );
    let output = CstyleExporter::new().export(&data).unwrap();
    insta::assert_snapshot!(output, @r"
    #config_version 3

    // -----------------------------------------------------------------------------
    namespace a {
        #if site == x
        int one = 1;
        int three = 3;
        #endif // site == x
        int two = 2;
    } // namespace a

    // EOF
    ");
}

#[test]
fn test_header_reuses_open_conditions() {
    let data = import(
        "#if site == a\n\
         #define zone north\n\
         #search \"north\"\n\
         #endif\n\
         #map \"mapped\"\n\
         alpha : beta\n\
         gamma\n\
         #endmap\n",
    );
    let output = CstyleExporter::new().export(&data).unwrap();
    insta::assert_snapshot!(output, @r#"
    #config_version 3

    #if site == a
    #define zone north
    #endif // site == a
    #map "mapped"
    alpha : beta
    gamma
    #endmap
    #if site == a
    #search "north"
    #endif // site == a

    // EOF
    "#);
}

#[test]
fn test_round_trip_keeps_elements() {
    let original = import(PORTS);
    let exported = CstyleExporter::new().export(&original).unwrap();
    let reimported = import(&exported);
    assert!(original.same_elements(&reimported));

    let again = CstyleExporter::new().export(&reimported).unwrap();
    assert_eq!(exported, again);
}

#[test]
fn test_round_trip_templates_and_inheritance() {
    let text = r#"#config_version 3
subconfig_template alertchecker.filters {
    int port = 10;
    namespace limits {
        int max = 3;
    }
}
subconfig_template alertchecker.filters.*.regions {
    double radius = 1.5;
}
namespace base {
    int x = 1;
}
// child sees base
namespace child : base {
    int y = 2;
}
"#;
    let original = import(text);
    assert_eq!(original.of_kind(ElementKind::TemplateParameter).count(), 3);
    let exported = CstyleExporter::new().export(&original).unwrap();
    assert!(exported.contains("subconfig_template alertchecker.filters.*.regions {"));
    assert!(exported.contains("// child sees base\nnamespace child : base {"));
    assert!(original.same_elements(&import(&exported)));
}

#[test]
fn test_pinned_version_omits_templates() {
    let data = import("subconfig_template t {\n    int a = 1;\n}\nnamespace n {\n    int b = 2;\n}\n");
    let factory = ExporterFactory::with_cstyle_version(2);
    let exporter = factory.exporter(ConfigFormat::Cstyle);
    let output = exporter.export(&data).unwrap();

    assert!(output.starts_with("#config_version 2\n"));
    assert!(!output.contains("subconfig_template"));
    assert_eq!(exporter.diagnostics(&data).len(), 1);
    assert!(exporter.diagnostics(&data)[0].contains("'t'"));
}

#[test]
fn test_version_one_uses_section_keyword() {
    let data = import("namespace n {\n    int b = 2;\n}\n");
    let output = CstyleExporter::with_version(1).export(&data).unwrap();
    assert!(output.contains("section n {"));
    assert!(data.same_elements(&import(&output)));
}

#[test]
fn test_multiline_values_survive() {
    let data = import("namespace n {\n    list v = [1,\n        2,\n        3];\n}\n");
    let output = CstyleExporter::new().export(&data).unwrap();
    assert!(output.contains("    list v = [1,\n        2,\n        3];\n"));
    assert!(data.same_elements(&import(&output)));
}
