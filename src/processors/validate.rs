//! Read-only checks over a translated tree
//!
//! Nothing here modifies files; every finding is a warning.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::errors::{DocsError, Result};
use crate::processors::links::{
    self, normalize_site_path, parent_dir, LinkIssueKind, LinkRewriter, PathResolver,
};
use crate::processors::protector::find_leftover_placeholders;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static LINK_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).unwrap());

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// A mask token survived into the output
    LeftoverPlaceholder,
    /// Absolute site URL that should have become relative
    UnresolvedUrl,
    /// Anchor that still has an entry in the anchor table
    UntranslatedAnchor,
    /// Relative link to a page that does not exist
    BrokenLink,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::LeftoverPlaceholder => write!(f, "leftover placeholder"),
            IssueKind::UnresolvedUrl => write!(f, "unresolved site URL"),
            IssueKind::UntranslatedAnchor => write!(f, "untranslated anchor"),
            IssueKind::BrokenLink => write!(f, "broken link"),
        }
    }
}

/// One finding in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path relative to the docs root
    pub file: String,
    /// Category
    pub kind: IssueKind,
    /// The offending token, URL or link target
    pub detail: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.file, self.kind, self.detail)
    }
}

/// Findings for a whole tree
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Markdown files read
    pub files_checked: usize,
    /// Findings in walk order
    pub issues: Vec<ValidationIssue>,
    /// Site URLs deliberately kept (examples, assets, excluded files)
    pub kept_urls: usize,
}

impl ValidationReport {
    /// No findings
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Findings of one kind
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checked {} files: {} leftover placeholders, {} unresolved URLs, {} untranslated anchors, {} broken links ({} site URLs kept on purpose)",
            self.files_checked,
            self.count(IssueKind::LeftoverPlaceholder),
            self.count(IssueKind::UnresolvedUrl),
            self.count(IssueKind::UntranslatedAnchor),
            self.count(IssueKind::BrokenLink),
            self.kept_urls
        )
    }
}

/// Checks translated documents for conversion leftovers
#[derive(Debug, Clone)]
pub struct Validator {
    rewriter: LinkRewriter,
    resolver: Arc<dyn PathResolver>,
}

impl Validator {
    /// `resolver` answers for the tree being validated
    pub fn new(rewriter: LinkRewriter, resolver: Arc<dyn PathResolver>) -> Self {
        Self { rewriter, resolver }
    }

    /// Issues in one document and the number of site URLs kept on purpose
    pub fn check_document(&self, text: &str, file: &str) -> (Vec<ValidationIssue>, usize) {
        let mut issues = Vec::new();
        let issue = |kind, detail: String| ValidationIssue {
            file: file.to_string(),
            kind,
            detail,
        };

        for token in find_leftover_placeholders(text) {
            issues.push(issue(IssueKind::LeftoverPlaceholder, token));
        }

        let mut kept = 0;
        for remaining in self.rewriter.classify_remaining(text, file) {
            match remaining.kind {
                LinkIssueKind::Unresolved => {
                    issues.push(issue(IssueKind::UnresolvedUrl, remaining.url));
                }
                _ => kept += 1,
            }
        }

        let prose = FENCED_BLOCK.replace_all(text, "");
        for caps in LINK_TARGET.captures_iter(&prose) {
            let target = &caps[1];
            if is_external(target) {
                continue;
            }

            let (path, anchor) = match target.split_once('#') {
                Some((path, anchor)) => (path, Some(anchor)),
                None => (target, None),
            };

            if let Some(anchor) = anchor {
                if self.is_untranslated_anchor(anchor) {
                    issues.push(issue(IssueKind::UntranslatedAnchor, format!("#{}", anchor)));
                }
            }

            let path = path.split('?').next().unwrap_or(path);
            if path.is_empty() || (links::is_asset(path) && path.starts_with('/')) {
                continue;
            }
            if !self.link_exists(path, file) {
                issues.push(issue(IssueKind::BrokenLink, target.to_string()));
            }
        }

        (issues, kept)
    }

    /// Walk every Markdown file under `root`
    pub fn validate_tree(&self, root: &Path) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| DocsError::file(root, e))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown(path) {
                continue;
            }

            let text = std::fs::read_to_string(path).map_err(|e| DocsError::file(path, e))?;
            let relative = site_relative(root, path);
            let (issues, kept) = self.check_document(&text, &relative);

            for issue in &issues {
                warn!("{}", issue);
            }
            report.files_checked += 1;
            report.kept_urls += kept;
            report.issues.extend(issues);
        }

        debug!("{}", report);
        Ok(report)
    }

    /// English anchor whose translation was never applied
    fn is_untranslated_anchor(&self, anchor: &str) -> bool {
        matches!(self.rewriter.mappings().anchors.get(anchor), Some(mapped) if mapped != anchor)
    }

    fn link_exists(&self, path: &str, file: &str) -> bool {
        let site_path = if path.starts_with('/') {
            Some(path.trim_start_matches('/').to_string())
        } else {
            normalize_site_path(&Path::new(parent_dir(file)).join(path))
        };

        match site_path {
            Some(site_path) => links::page_exists(self.resolver.as_ref(), &site_path),
            None => false,
        }
    }
}

fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("mailto:") || target.starts_with("//")
}

/// `.md` or `.markdown`, any case
pub(crate) fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "md" || ext == "markdown"
        })
        .unwrap_or(false)
}

/// `/`-separated path of `path` below `root`
pub(crate) fn site_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
