//! End-to-end pipelines behind the command line
//!
//! Each function takes paths plus an explicit [`VocabContext`] and does one
//! complete job: read, transform, validate where needed, write atomically.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::allocator::RangeUsage;
use crate::checks::check_removed;
use crate::codec::{model_to_tables, tables_to_model};
use crate::config::{Config, Overrides, VocabContext};
use crate::error::{ConfigError, VocabError};
use crate::format::SourceFormat;
use crate::mint::{mint_ids, MintRequest, Minted};
use crate::model::Model;
use crate::shapes::{BuiltinShapes, ShapeSet};
use crate::split::{join, split, SplitLayout};
use crate::staging::write_file_atomic;
use crate::turtle;
use crate::validate::{Orchestrator, Severity, ValidationReport};
use crate::xlsx::{read_workbook, write_workbook};

/// What kind of vocabulary source a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Workbook,
    Turtle,
    SplitTree,
}

impl InputKind {
    pub fn detect(path: &Path) -> Result<Self, VocabError> {
        if path.is_dir() {
            return Ok(InputKind::SplitTree);
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") => Ok(InputKind::Workbook),
            Some("ttl") => Ok(InputKind::Turtle),
            _ => Err(VocabError::InvalidArgument(format!(
                "{} is neither an .xlsx workbook, a .ttl file nor a split directory",
                path.display()
            ))),
        }
    }
}

/// Vocabulary name of a file or split tree: its file stem
pub fn vocab_name(path: &Path) -> Result<String, VocabError> {
    let stem = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    stem.map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            VocabError::InvalidArgument(format!("cannot derive a vocabulary name from {}", path.display()))
        })
}

/// Context for the vocabulary at `path`
pub fn context_for(
    path: &Path,
    config: Option<&Config>,
    overrides: Overrides,
) -> Result<VocabContext, VocabError> {
    let name = vocab_name(path)?;
    match config {
        Some(config) => Ok(VocabContext::new(&name, config, overrides)?),
        None => {
            let mut ctx = VocabContext::unconfigured(&name);
            ctx.overrides = overrides;
            Ok(ctx)
        }
    }
}

fn require_configured(ctx: &VocabContext) -> Result<(), VocabError> {
    if ctx.vocab.is_none() {
        return Err(ConfigError::UnknownVocab(ctx.name.clone()).into());
    }
    Ok(())
}

/// Load a model from a workbook, a Turtle file or a split tree
pub fn load_model(
    path: &Path,
    ctx: &VocabContext,
    format: SourceFormat,
) -> Result<Model, VocabError> {
    let source_name = path.display().to_string();
    match InputKind::detect(path)? {
        InputKind::Workbook => tables_to_model(&read_workbook(path)?, ctx),
        InputKind::Turtle => Model::load(&fs::read_to_string(path)?, &source_name, ctx, format),
        InputKind::SplitTree => Model::from_graph(join(path)?, &source_name, ctx, format),
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output: Option<PathBuf>,
    pub format: SourceFormat,
    /// Written as the scheme's modified date when producing Turtle
    pub today: NaiveDate,
}

/// What `convert` writes, chosen by the output file's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Workbook,
    Turtle,
}

impl OutputKind {
    pub fn detect(path: &Path) -> Result<Self, VocabError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") => Ok(OutputKind::Workbook),
            Some("ttl") => Ok(OutputKind::Turtle),
            _ => Err(VocabError::InvalidArgument(format!(
                "cannot write {}: the output must end in .xlsx or .ttl",
                path.display()
            ))),
        }
    }
}

/// Convert a workbook to Turtle, or Turtle (file or split tree) to a
/// workbook or to canonical Turtle.
///
/// Without an explicit output a workbook becomes Turtle and Turtle becomes a
/// workbook. Reading legacy Turtle and writing `.ttl` upgrades it in one
/// step. Returns the path written.
pub fn convert(
    input: &Path,
    ctx: &VocabContext,
    options: &ConvertOptions,
) -> Result<PathBuf, VocabError> {
    let kind = InputKind::detect(input)?;
    let output = match &options.output {
        Some(output) => output.clone(),
        None if kind == InputKind::Workbook => input.with_extension("ttl"),
        None => input.with_extension("xlsx"),
    };

    match (kind, OutputKind::detect(&output)?) {
        (InputKind::Workbook, OutputKind::Turtle) => {
            let mut model = tables_to_model(&read_workbook(input)?, ctx)?;
            model.apply_config_metadata(ctx);
            model.set_modified(options.today);
            write_file_atomic(&output, model.to_rdf_text(ctx).as_bytes())?;
            info!(
                "Converted {} to {} ({} concepts, {} collections)",
                input.display(),
                output.display(),
                model.concepts.len(),
                model.collections.len()
            );
        }
        (InputKind::Workbook, OutputKind::Workbook) => {
            return Err(VocabError::InvalidArgument(format!(
                "{} is already a workbook; convert it to .ttl",
                input.display()
            )));
        }
        (_, OutputKind::Workbook) => {
            let mut model = load_graph_model(input, ctx, options.format)?;
            model.apply_config_metadata(ctx);
            write_workbook(&model_to_tables(&model, ctx), &output)?;
            info!("Converted {} to {}", input.display(), output.display());
        }
        (_, OutputKind::Turtle) => {
            let mut model = load_graph_model(input, ctx, options.format)?;
            model.apply_config_metadata(ctx);
            write_file_atomic(&output, model.to_rdf_text(ctx).as_bytes())?;
            info!("Rewrote {} as {}", input.display(), output.display());
        }
    }
    Ok(output)
}

/// Turtle file or split tree, with a warning when it has load problems
fn load_graph_model(
    input: &Path,
    ctx: &VocabContext,
    format: SourceFormat,
) -> Result<Model, VocabError> {
    let model = load_model(input, ctx, format)?;
    if !model.load_issues.is_empty() {
        warn!(
            "{} has {} problems; run check for details",
            input.display(),
            model.load_issues.len()
        );
    }
    Ok(model)
}

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub shapes: ShapeSet,
    pub fail_at: Severity,
    /// Earlier version of the vocabulary for the delete guard and committer check
    pub previous: Option<PathBuf>,
    pub format: SourceFormat,
}

/// Validate a vocabulary and return the complete report.
///
/// Whether the report fails is left to the caller. Removed concepts or
/// collections fail right away unless deletion is allowed.
pub fn check(
    input: &Path,
    ctx: &VocabContext,
    options: &CheckOptions,
) -> Result<ValidationReport, VocabError> {
    let model = match load_model(input, ctx, options.format) {
        Ok(model) => model,
        // the workbook codec already collected everything it found
        Err(VocabError::Validation(report)) => return Ok(report),
        Err(e) => return Err(e),
    };

    if ctx.overrides.committer.is_some() && !committer_check_active(ctx, options) {
        info!(
            "No previous version of {}: the committer ID range check is skipped",
            input.display()
        );
    }

    let mut ctx = ctx.clone();
    if let Some(previous) = &options.previous {
        let previous = load_model(previous, &ctx, options.format)?;
        check_removed(&previous, &model, &ctx)?;
        let baseline = previous.used_ids(&ctx);
        ctx = ctx.with_baseline(baseline);
    }

    let validator = BuiltinShapes::new();
    let orchestrator = Orchestrator::new(&ctx, &validator, options.shapes.clone(), options.fail_at);
    Ok(orchestrator.run(&model))
}

/// The committer check compares new IDs against a baseline, so it needs both
/// a committer and a previous version
pub fn committer_check_active(ctx: &VocabContext, options: &CheckOptions) -> bool {
    ctx.overrides.committer.is_some() && options.previous.is_some()
}

/// Replace placeholder IRIs in a workbook with permanent IDs
pub fn make_ids(
    input: &Path,
    output: Option<&Path>,
    ctx: &VocabContext,
    request: &MintRequest,
) -> Result<Minted, VocabError> {
    require_configured(ctx)?;
    if InputKind::detect(input)? != InputKind::Workbook {
        return Err(VocabError::InvalidArgument(format!(
            "make-ids works on .xlsx workbooks, got {}",
            input.display()
        )));
    }
    let minted = mint_ids(&read_workbook(input)?, request, ctx)?;
    for (placeholder, iri) in &minted.assigned {
        info!("{} -> {}", placeholder, iri);
    }
    write_workbook(&minted.tables, output.unwrap_or(input))?;
    Ok(minted)
}

/// Split a Turtle file into a tree; defaults to a directory named after the file
pub fn split_vocab(
    input: &Path,
    target: Option<&Path>,
    ctx: &VocabContext,
    layout: SplitLayout,
) -> Result<PathBuf, VocabError> {
    let graph = turtle::parse(&fs::read_to_string(input)?, &input.display().to_string())?;
    let target = target.map_or_else(|| input.with_extension(""), Path::to_path_buf);
    split(&graph, &target, layout, ctx.id_pattern.as_ref(), &ctx.prefixes)?;
    Ok(target)
}

/// Join a split tree into one Turtle file
pub fn join_vocab(
    input: &Path,
    output: Option<&Path>,
    ctx: &VocabContext,
) -> Result<PathBuf, VocabError> {
    let graph = join(input)?;
    let output = output.map_or_else(|| input.with_extension("ttl"), Path::to_path_buf);
    write_file_atomic(&output, turtle::write(&graph, &ctx.prefixes).as_bytes())?;
    Ok(output)
}

/// Usage of every configured ID range, optionally against a vocabulary's IDs
pub fn ranges(
    input: Option<&Path>,
    ctx: &VocabContext,
    format: SourceFormat,
) -> Result<Vec<RangeUsage>, VocabError> {
    require_configured(ctx)?;
    let used = match input {
        Some(path) => load_model(path, ctx, format)?.used_ids(ctx),
        None => Default::default(),
    };
    Ok(ctx.allocator.usage(&used))
}

/// One line per range: owner, bounds and what is left
pub fn format_ranges(ctx: &VocabContext, usage: &[RangeUsage]) -> String {
    let mut out = format!("ID ranges of \"{}\":\n", ctx.name);
    for entry in usage {
        out.push_str(&format!(
            "  {}: {} ({} used) {}\n",
            entry.range.owner(),
            ctx.allocator.range_label(&entry.range),
            entry.used,
            ctx.allocator.usage_label(entry)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample_config, sample_context};
    use crate::model::tests::{sample_model, VOC};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn write_sample_ttl(dir: &Path) -> PathBuf {
        let ctx = sample_context();
        let path = dir.join("myvocab.ttl");
        fs::write(&path, sample_model().to_rdf_text(&ctx)).unwrap();
        path
    }

    #[test]
    fn test_detect_and_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(InputKind::detect(dir.path()).unwrap(), InputKind::SplitTree);
        assert_eq!(
            InputKind::detect(Path::new("a/myvocab.xlsx")).unwrap(),
            InputKind::Workbook
        );
        assert_eq!(
            InputKind::detect(Path::new("myvocab.TTL")).unwrap(),
            InputKind::Turtle
        );
        assert!(InputKind::detect(Path::new("myvocab.csv")).is_err());
        assert_eq!(vocab_name(Path::new("voc/myvocab.ttl")).unwrap(), "myvocab");
    }

    #[test]
    fn test_context_for_known_and_unknown() {
        let config = sample_config();
        let ctx = context_for(Path::new("MyVocab.xlsx"), Some(&config), Overrides::default())
            .unwrap();
        assert!(ctx.vocab.is_some());

        let ctx = context_for(Path::new("other.xlsx"), Some(&config), Overrides::default())
            .unwrap();
        assert!(ctx.vocab.is_none());
        assert!(matches!(
            ranges(None, &ctx, SourceFormat::Current),
            Err(VocabError::Config(ConfigError::UnknownVocab(_)))
        ));
    }

    #[test]
    fn test_turtle_to_workbook_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let ttl = write_sample_ttl(dir.path());
        let options = ConvertOptions {
            output: None,
            format: SourceFormat::Current,
            today: today(),
        };

        let xlsx = convert(&ttl, &ctx, &options).unwrap();
        assert_eq!(xlsx, dir.path().join("myvocab.xlsx"));

        let back = ConvertOptions {
            output: Some(dir.path().join("out.ttl")),
            ..options
        };
        let out = convert(&xlsx, &ctx, &back).unwrap();
        let model = load_model(&out, &ctx, SourceFormat::Current).unwrap();

        let mut expected = sample_model();
        expected.apply_config_metadata(&ctx);
        assert_eq!(model.concepts, expected.concepts);
        assert_eq!(model.scheme.modified.as_deref(), Some("2026-03-01"));
    }

    #[test]
    fn test_legacy_turtle_to_current_turtle() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let animal = format!("{}0000001", VOC);
        let mut text = sample_model().to_rdf_text(&ctx);
        text.push_str(&format!(
            "\n<{}> <http://purl.org/dc/terms/provenance> \"Added in 2020\"@en ;\n    \
             <http://www.w3.org/2000/01/rdf-schema#isDefinedBy> <https://other.org/voc> .\n",
            animal
        ));
        let legacy = dir.path().join("myvocab.ttl");
        fs::write(&legacy, text).unwrap();

        let options = ConvertOptions {
            output: Some(dir.path().join("upgraded").join("myvocab.ttl")),
            format: SourceFormat::Current,
            today: today(),
        };
        assert!(convert(&legacy, &ctx, &options).is_err());

        let options = ConvertOptions {
            format: SourceFormat::Legacy,
            ..options
        };
        let out = convert(&legacy, &ctx, &options).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("skos:changeNote"), "{}", written);
        assert!(written.contains("prov:hadPrimarySource"), "{}", written);
        assert!(!written.contains("rdfs:isDefinedBy"), "{}", written);

        let model = load_model(&out, &ctx, SourceFormat::Current).unwrap();
        let concept = &model.concepts[&animal];
        assert_eq!(concept.change_note.as_deref(), Some("Added in 2020"));
        assert_eq!(concept.source.source.as_deref(), Some("https://other.org/voc"));
    }

    #[test]
    fn test_convert_rejects_unknown_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let ttl = write_sample_ttl(dir.path());
        let options = ConvertOptions {
            output: Some(dir.path().join("myvocab.csv")),
            format: SourceFormat::Current,
            today: today(),
        };
        assert!(matches!(
            convert(&ttl, &ctx, &options),
            Err(VocabError::InvalidArgument(_))
        ));
        assert!(!dir.path().join("myvocab.csv").exists());
    }

    #[test]
    fn test_check_sample_passes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let ttl = write_sample_ttl(dir.path());
        let report = check(&ttl, &ctx, &CheckOptions::default()).unwrap();
        assert!(!report.fails_at(Severity::Violation), "{}", report);
    }

    #[test]
    fn test_committer_check_needs_previous() {
        let mut ctx = sample_context();
        let mut options = CheckOptions::default();
        assert!(!committer_check_active(&ctx, &options));

        ctx.overrides.committer = Some("alice".into());
        assert!(!committer_check_active(&ctx, &options));

        options.previous = Some(PathBuf::from("previous/myvocab.ttl"));
        assert!(committer_check_active(&ctx, &options));
    }

    #[test]
    fn test_check_rejects_removed_concept() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let previous = write_sample_ttl(dir.path());

        let mut model = sample_model();
        model.concepts.remove(&format!("{}0000003", VOC));
        for collection in model.collections.values_mut() {
            collection.members.retain(|m| !m.ends_with("0000003"));
        }
        let current = dir.path().join("current").join("myvocab.ttl");
        fs::create_dir_all(current.parent().unwrap()).unwrap();
        fs::write(&current, model.to_rdf_text(&ctx)).unwrap();

        let options = CheckOptions {
            previous: Some(previous),
            ..Default::default()
        };
        assert!(matches!(
            check(&current, &ctx, &options),
            Err(VocabError::RemovedEntities(_))
        ));
    }

    #[test]
    fn test_split_and_join_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let ttl = write_sample_ttl(dir.path());

        let tree = split_vocab(&ttl, None, &ctx, SplitLayout::default()).unwrap();
        assert_eq!(tree, dir.path().join("myvocab"));
        assert!(tree.join("0000000-0000999").join("0000002.ttl").exists());

        let from_tree = load_model(&tree, &ctx, SourceFormat::Current).unwrap();
        let from_file = load_model(&ttl, &ctx, SourceFormat::Current).unwrap();
        assert_eq!(from_tree.concepts, from_file.concepts);
        assert_eq!(from_tree.collections, from_file.collections);

        let joined = join_vocab(&tree, Some(&dir.path().join("joined.ttl")), &ctx).unwrap();
        let rejoined = load_model(&joined, &ctx, SourceFormat::Current).unwrap();
        assert_eq!(rejoined.concepts, from_file.concepts);
    }

    #[test]
    fn test_make_ids_rewrites_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let mut tables = model_to_tables(&sample_model(), &ctx);
        tables.concepts.push(vec![
            "myv:horse".into(),
            "en".into(),
            "Horse".into(),
            "A horse".into(),
            String::new(),
            "myv:0000001".into(),
        ]);
        let xlsx = dir.path().join("myvocab.xlsx");
        write_workbook(&tables, &xlsx).unwrap();

        let request = MintRequest::parse("myv", 4).unwrap();
        let minted = make_ids(&xlsx, None, &ctx, &request).unwrap();
        assert_eq!(minted.assigned.len(), 1);

        let model = load_model(&xlsx, &ctx, SourceFormat::Current).unwrap();
        assert!(model.concepts.contains_key(&format!("{}0000004", VOC)));
        assert!(!model.concepts.contains_key(&format!("{}horse", VOC)));
    }

    #[test]
    fn test_ranges_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sample_context();
        let ttl = write_sample_ttl(dir.path());
        let usage = ranges(Some(&ttl), &ctx, SourceFormat::Current).unwrap();
        assert_eq!(usage[0].used, 4);
        assert_eq!(usage[1].used, 0);

        let text = format_ranges(&ctx, &usage);
        assert!(text.contains("0000001 - 0000099 (4 used) next unused: 0000011"), "{}", text);
    }
}
