//! Per-entity provenance
//!
//! Where an entity came from is answered by a [`ProvenanceSource`]. The
//! built-in [`TemplateProvenance`] only knows how to build a reference URL
//! (by default a git blame view); sources backed by version control can also
//! supply dates.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::VocabContext;
use crate::iri::IdMatch;

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}"));

/// What a source knows about one entity file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityProvenance {
    pub created: Option<NaiveDate>,
    pub modified: Option<NaiveDate>,
    pub url: Option<String>,
}

pub trait ProvenanceSource {
    /// Provenance of `{vocab_name}/{entity_id}`, if the source knows it
    fn lookup(&self, vocab_name: &str, entity_id: &str) -> Option<EntityProvenance>;
}

/// Builds reference URLs from a template with `{{ github_repo }}`,
/// `{{ version }}`, `{{ vocab_name }}` and `{{ entity_id }}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateProvenance {
    pub template: String,
    pub github_repo: String,
    pub version: String,
}

impl TemplateProvenance {
    /// `None` when no repository is known for the vocabulary
    pub fn from_context(ctx: &VocabContext) -> Option<Self> {
        Some(TemplateProvenance {
            template: ctx.provenance_template().to_string(),
            github_repo: ctx.repository()?,
            version: ctx.provenance_version(),
        })
    }

    pub fn render(&self, vocab_name: &str, entity_id: &str) -> String {
        let Ok(re) = PLACEHOLDER.as_ref() else {
            return self.template.clone();
        };
        re.replace_all(&self.template, |caps: &regex::Captures| {
            match &caps[1] {
                "github_repo" => self.github_repo.clone(),
                "version" => self.version.clone(),
                "vocab_name" => vocab_name.to_string(),
                "entity_id" => entity_id.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
    }
}

impl ProvenanceSource for TemplateProvenance {
    fn lookup(&self, vocab_name: &str, entity_id: &str) -> Option<EntityProvenance> {
        Some(EntityProvenance {
            url: Some(self.render(vocab_name, entity_id)),
            ..Default::default()
        })
    }
}

/// Look up an entity and warn when the source has nothing for it
pub fn lookup_or_warn(
    source: &dyn ProvenanceSource,
    vocab_name: &str,
    entity_id: &str,
) -> Option<EntityProvenance> {
    let found = source.lookup(vocab_name, entity_id);
    if found.is_none() {
        warn!("No provenance found for {}/{}", vocab_name, entity_id);
    }
    found
}

/// Reference URL for an entity with a permanent ID
pub fn entity_url(ctx: &VocabContext, iri: &str) -> Option<String> {
    let pattern = ctx.id_pattern.as_ref()?;
    let IdMatch::Permanent(id) = pattern.classify(iri) else {
        return None;
    };
    let Some(source) = TemplateProvenance::from_context(ctx) else {
        debug!("No repository configured for \"{}\", skipping provenance URL", ctx.name);
        return None;
    };
    lookup_or_warn(&source, &ctx.name, &pattern.format_id(id))?.url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_context;
    use crate::config::Overrides;

    #[test]
    fn test_render_default_template() {
        let source = TemplateProvenance::from_context(&sample_context()).unwrap();
        assert_eq!(
            source.render("myvocab", "0000042"),
            "https://github.com/example/myvocab/blame/main/vocabularies/myvocab/0000042.ttl"
        );
    }

    #[test]
    fn test_release_version_is_used() {
        let mut ctx = sample_context();
        ctx.overrides = Overrides {
            version: Some("2024-06-01".into()),
            ..Default::default()
        };
        let url = entity_url(&ctx, "https://example.org/myvocab_0000002").unwrap();
        assert!(url.contains("/blame/2024-06-01/"), "{}", url);

        ctx.overrides.version = Some("v_feature-x".into());
        let url = entity_url(&ctx, "https://example.org/myvocab_0000002").unwrap();
        assert!(url.contains("/blame/main/"), "{}", url);
    }

    #[test]
    fn test_no_url_for_placeholders_or_foreign() {
        let ctx = sample_context();
        assert!(entity_url(&ctx, "https://example.org/myvocab_horse").is_none());
        assert!(entity_url(&ctx, "https://other.org/0000002").is_none());
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let source = TemplateProvenance {
            template: "https://x.org/{{ branch }}/{{entity_id}}".into(),
            github_repo: "a/b".into(),
            version: "main".into(),
        };
        assert_eq!(source.render("v", "1"), "https://x.org/{{ branch }}/1");
    }

    struct Silent;

    impl ProvenanceSource for Silent {
        fn lookup(&self, _: &str, _: &str) -> Option<EntityProvenance> {
            None
        }
    }

    #[test]
    fn test_missing_provenance_is_none() {
        assert!(lookup_or_warn(&Silent, "myvocab", "0000001").is_none());
    }
}
