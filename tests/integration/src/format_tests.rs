//! Round trips through both storage formats

use paramtree_formats::{ExporterFactory, import_str};
use paramtree_meta::{ConfigFormat, ElementKind, LoadedData, StorageLocation};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

const SAMPLE: &str = r#"#config_version 3
#define site tower
#search "site"
ports.cmd = 7;
namespace base {
    int timeout = 5;
}
namespace ports : base {
    //! Command port
    //!
    //! \cmdline cmd_port
    int cmd = 123;
    int & fdp = ports.cmd;
    string & url = [$(ports.host);":";$(ports.cmd)];
    string host = "tower";
}
#if site == tower || site == lab
namespace tower {
    string label = "north";
}
#endif
subconfig_template checker.filters {
    int port = 80;
    namespace limits {
        double max = 1.5;
    }
}
"#;

fn import(format: ConfigFormat, text: &str) -> LoadedData {
    let mut data = LoadedData::new();
    import_str(format, text, StorageLocation::file("/cfg", "sample", format), &mut data)
        .expect("Import should succeed");
    data
}

fn round_trip(format: ConfigFormat, data: &LoadedData) -> LoadedData {
    let text = ExporterFactory::default()
        .exporter(format)
        .export(data)
        .expect("Export should succeed");
    import(format, &text)
}

#[rstest]
#[case(ConfigFormat::Cstyle)]
#[case(ConfigFormat::Json)]
fn test_sample_survives_export(#[case] format: ConfigFormat) {
    let original = import(ConfigFormat::Cstyle, SAMPLE);
    let back = round_trip(format, &original);

    assert!(original.same_elements(&back));
    assert_eq!(original.template_specs().len(), back.template_specs().len());
    assert_eq!(back.of_kind(ElementKind::Inheritance).count(), 1);
}

#[test]
fn test_cstyle_via_json_and_back() {
    let original = import(ConfigFormat::Cstyle, SAMPLE);
    let through_json = round_trip(ConfigFormat::Json, &original);
    let back = round_trip(ConfigFormat::Cstyle, &through_json);

    assert!(original.same_elements(&back));
}

fn section_text(index: usize, values: &[i64], fact: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(fact) = fact {
        text.push_str(&format!("#if site == {fact}\n"));
    }
    text.push_str(&format!("namespace s{index} {{\n"));
    for (idx, value) in values.iter().enumerate() {
        text.push_str(&format!("int64 p{idx} = {value};\n"));
    }
    text.push_str("}\n");
    if fact.is_some() {
        text.push_str("#endif\n");
    }
    text
}

proptest! {
    #[test]
    fn prop_generated_configs_round_trip(
        sections in prop::collection::vec(
            (
                prop::collection::vec(any::<i64>(), 1..4),
                prop::option::of(prop::sample::select(vec!["tower", "lab"])),
            ),
            1..5,
        ),
        json in any::<bool>(),
    ) {
        let text: String = sections
            .iter()
            .enumerate()
            .map(|(idx, (values, fact))| section_text(idx, values, *fact))
            .collect();
        let original = import(ConfigFormat::Cstyle, &text);
        let format = if json { ConfigFormat::Json } else { ConfigFormat::Cstyle };

        let back = round_trip(format, &original);

        prop_assert!(original.same_elements(&back));
    }
}
