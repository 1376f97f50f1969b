use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use vocsync::codec::model_to_tables;
use vocsync::convert::{
    check, convert, join_vocab, load_model, make_ids, split_vocab, CheckOptions, ConvertOptions,
};
use vocsync::mint::MintRequest;
use vocsync::model::Agent;
use vocsync::xlsx::write_workbook;
use vocsync::{
    Collection, Concept, ConceptScheme, Config, Model, Overrides, Severity, SourceFormat,
    SplitLayout, ViolationKind, VocabContext,
};

const NS: &str = "https://example.org/birds_";

const CONFIG: &str = r#"
[vocabs.birds]
id_length = 7
permanent_iri_part = "https://example.org/birds_"
prefix = "bird"
vocabulary_iri = "https://example.org/birds/"
title = "Birds"
description = "Birds seen in the garden."
created_date = "2025-04-01"
creator = "Jane Doe https://orcid.org/0000-0002-1825-0097"
publisher = "Example Org https://example.org"
license = "https://creativecommons.org/licenses/by/4.0/"

[[vocabs.birds.id_range]]
first_id = 1
last_id = 49
gh_name = "jdoe"
"#;

fn context() -> VocabContext {
    let config = Config::from_toml_str(CONFIG).unwrap();
    VocabContext::new("birds", &config, Overrides::default()).unwrap()
}

fn lang(text: &str) -> std::collections::BTreeMap<String, String> {
    [("en".to_string(), text.to_string())].into()
}

fn concept(local: &str, label: &str, parents: &[&str]) -> Concept {
    Concept {
        iri: format!("{}{}", NS, local),
        pref_labels: lang(label),
        definitions: lang(&format!("A {}", label.to_lowercase())),
        parents: parents.iter().map(|p| format!("{}{}", NS, p)).collect(),
        ..Default::default()
    }
}

fn birds() -> Model {
    let mut model = Model {
        scheme: ConceptScheme {
            iri: "https://example.org/birds/".into(),
            titles: lang("Birds"),
            definitions: lang("Birds seen in the garden."),
            created: Some("2025-04-01".into()),
            creators: vec![Agent::parse_line(
                "Jane Doe https://orcid.org/0000-0002-1825-0097",
            )],
            publishers: vec![Agent::parse_line("Example Org https://example.org")],
            ..Default::default()
        },
        ..Default::default()
    };
    for c in [
        concept("0000001", "Bird", &[]),
        concept("0000002", "Songbird", &["0000001"]),
        concept("0000003", "Robin", &["0000002"]),
        concept("0000004", "Raptor", &["0000001"]),
    ] {
        model.concepts.insert(c.iri.clone(), c);
    }
    let garden = Collection {
        iri: format!("{}0000020", NS),
        pref_labels: lang("Garden birds"),
        definitions: lang("Birds that visit gardens"),
        members: vec![format!("{}0000003", NS)],
        ..Default::default()
    };
    model.collections.insert(garden.iri.clone(), garden);
    model
}

fn write_ttl(dir: &Path, model: &Model) -> PathBuf {
    let path = dir.join("birds.ttl");
    fs::write(&path, model.to_rdf_text(&context())).unwrap();
    path
}

fn convert_to(input: &Path, output: PathBuf) -> PathBuf {
    let options = ConvertOptions {
        output: Some(output),
        format: SourceFormat::Current,
        today: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
    };
    convert(input, &context(), &options).unwrap()
}

#[test]
fn test_workbook_round_trip_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let ttl = write_ttl(dir.path(), &birds());

    let first_xlsx = convert_to(&ttl, dir.path().join("first").join("birds.xlsx"));
    let first_ttl = convert_to(&first_xlsx, dir.path().join("first").join("birds.ttl"));
    let second_xlsx = convert_to(&first_ttl, dir.path().join("second").join("birds.xlsx"));
    let second_ttl = convert_to(&second_xlsx, dir.path().join("second").join("birds.ttl"));

    assert_eq!(
        fs::read_to_string(&first_ttl).unwrap(),
        fs::read_to_string(&second_ttl).unwrap()
    );
    let model = load_model(&second_ttl, &context(), SourceFormat::Current).unwrap();
    assert_eq!(model.concepts.len(), 4);
    assert_eq!(model.scheme.modified.as_deref(), Some("2026-01-10"));
}

#[test]
fn test_check_split_tree() {
    let dir = tempfile::tempdir().unwrap();
    let ttl = write_ttl(dir.path(), &birds());
    let tree = split_vocab(&ttl, None, &context(), SplitLayout::default()).unwrap();

    let report = check(&tree, &context(), &CheckOptions::default()).unwrap();
    assert!(!report.fails_at(Severity::Violation), "{}", report);

    let joined = join_vocab(&tree, Some(&dir.path().join("joined.ttl")), &context()).unwrap();
    let from_join = load_model(&joined, &context(), SourceFormat::Current).unwrap();
    let original = load_model(&ttl, &context(), SourceFormat::Current).unwrap();
    assert_eq!(from_join.concepts, original.concepts);
    assert_eq!(from_join.collections, original.collections);
}

#[test]
fn test_minted_workbook_passes_check() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let mut model = birds();
    let owl = concept("owl", "Owl", &["0000004"]);
    model.concepts.insert(owl.iri.clone(), owl);
    let xlsx = dir.path().join("birds.xlsx");
    write_workbook(&model_to_tables(&model, &ctx), &xlsx).unwrap();

    let before = check(&xlsx, &ctx, &CheckOptions::default()).unwrap();
    assert!(before
        .iter()
        .any(|v| v.kind == ViolationKind::Placeholder && v.severity == Severity::Info));

    let request = MintRequest::parse("bird", 5).unwrap();
    let minted = make_ids(&xlsx, None, &ctx, &request).unwrap();
    assert_eq!(
        minted.assigned.values().collect::<Vec<_>>(),
        vec![&format!("{}0000005", NS)]
    );

    let after = check(&xlsx, &ctx, &CheckOptions::default()).unwrap();
    assert!(!after.has_kind(ViolationKind::Placeholder));
    assert!(!after.fails_at(Severity::Violation), "{}", after);
}

#[test]
fn test_wrong_width_id_fails_check() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = birds();
    let wide = concept("00012345", "Wren", &["0000002"]);
    model.concepts.insert(wide.iri.clone(), wide);
    let ttl = write_ttl(dir.path(), &model);

    let report = check(&ttl, &context(), &CheckOptions::default()).unwrap();
    assert!(report.has_kind(ViolationKind::IdWidth));
    assert!(report.fails_at(Severity::Violation));
}
