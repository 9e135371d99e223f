//! Cross-reference rewriting: site URLs to relative paths, English anchors
//! to their translated form

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::core::config::RunOptions;
use crate::core::errors::Result;
use crate::core::mappings::MappingConfig;

static ROOT_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\((/[^)\s]*)\)").unwrap());
static ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z0-9_-]+)").unwrap());
static ASSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(png|jpe?g|gif|svg|ico|webp|css|js)$").unwrap());
static EXAMPLE_CONTEXTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"@Redirect\(\s*['"`]https?://"#,
        r#"return\s*\{\s*url:\s*['"`]https?://"#,
        r#"pingCheck\(\s*['"`][^'"`]*['"`],\s*['"`]https?://"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Bytes inspected on each side of a URL when looking for example code
const CONTEXT_WINDOW: usize = 50;
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Answers whether a file exists at a `/`-separated path relative to the
/// documentation root
pub trait PathResolver: Send + Sync + fmt::Debug {
    fn exists(&self, site_path: &str) -> bool;
}

/// Resolver backed by one or more directory trees
#[derive(Debug, Clone)]
pub struct FsResolver {
    roots: Vec<PathBuf>,
}

impl FsResolver {
    /// Look pages up under each of `roots`, first match wins
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl PathResolver for FsResolver {
    fn exists(&self, site_path: &str) -> bool {
        self.roots.iter().any(|root| root.join(site_path).exists())
    }
}

/// Resolver over a fixed set of paths
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashSet<String>,
}

impl MemoryResolver {
    /// Resolver that knows exactly `files`, given as site-relative paths
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl PathResolver for MemoryResolver {
    fn exists(&self, site_path: &str) -> bool {
        self.files.contains(site_path)
    }
}

/// Why a site reference was left as it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkIssueKind {
    /// File is exempt from absolute URL rewriting
    Excluded,
    /// Static asset
    Asset,
    /// Illustrative URL inside example code
    Example,
    /// No local page matches
    Unresolved,
}

impl fmt::Display for LinkIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkIssueKind::Excluded => write!(f, "excluded"),
            LinkIssueKind::Asset => write!(f, "asset"),
            LinkIssueKind::Example => write!(f, "example"),
            LinkIssueKind::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// A reference that was left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssue {
    /// The reference as it appears in the text
    pub url: String,
    /// Why it was left alone
    pub kind: LinkIssueKind,
}

/// Outcome of rewriting one document
#[derive(Debug, Clone, Default)]
pub struct LinkRewrite {
    /// Rewritten document
    pub text: String,
    /// Number of references replaced
    pub rewritten: usize,
    /// References left untouched
    pub issues: Vec<LinkIssue>,
}

impl LinkRewrite {
    /// Issues for references no candidate page matched
    pub fn unresolved(&self) -> impl Iterator<Item = &LinkIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.kind == LinkIssueKind::Unresolved)
    }
}

/// Rewrites absolute site references and anchors using the mapping tables
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    mappings: Arc<MappingConfig>,
    resolver: Arc<dyn PathResolver>,
    site_url: Option<Regex>,
    excluded_files: Vec<String>,
    section_dirs: Vec<String>,
}

impl LinkRewriter {
    /// Build the site URL pattern from `options.site_domains`
    ///
    /// With no domains configured only root-relative links are rewritten.
    pub fn new(
        mappings: Arc<MappingConfig>,
        resolver: Arc<dyn PathResolver>,
        options: &RunOptions,
    ) -> Result<Self> {
        let site_url = if options.site_domains.is_empty() {
            None
        } else {
            let domains = options
                .site_domains
                .iter()
                .map(|d| regex::escape(d))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r#"https?://(?:{})(/[^\s)\]}}"'<>`]*)?"#,
                domains
            ))?)
        };

        Ok(Self {
            mappings,
            resolver,
            site_url,
            excluded_files: options.excluded_files.clone(),
            section_dirs: options.section_dirs.clone(),
        })
    }

    /// Tables this rewriter maps anchors and paths with
    pub fn mappings(&self) -> &MappingConfig {
        &self.mappings
    }

    /// Whether `current_file` is exempt from absolute URL rewriting
    pub fn is_excluded(&self, current_file: &str) -> bool {
        let name = current_file.rsplit('/').next().unwrap_or(current_file);
        self.excluded_files.iter().any(|excluded| excluded == name)
    }

    /// Whether a page exists at `site_path` as a file, a `.md` file, or a
    /// directory with an `index.md`
    pub fn page_exists(&self, site_path: &str) -> bool {
        page_exists(self.resolver.as_ref(), site_path)
    }

    /// Rewrite site URLs and root-relative link targets in `text`
    ///
    /// `current_file` is the document's path relative to the docs root.
    pub fn rewrite_links(&self, text: &str, current_file: &str) -> LinkRewrite {
        let mut result = LinkRewrite::default();
        let current_dir = parent_dir(current_file);

        if self.is_excluded(current_file) {
            result.issues = self
                .site_urls(text)
                .into_iter()
                .map(|url| LinkIssue {
                    url,
                    kind: LinkIssueKind::Excluded,
                })
                .collect();
            result.text = text.to_string();
            return result;
        }

        let mut rewritten = 0;
        let mut issues = Vec::new();

        let text = match &self.site_url {
            Some(site_url) => site_url
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    let whole = caps.get(0).map_or("", |m| m.as_str());
                    let start = caps.get(0).map_or(0, |m| m.start());
                    let url = whole.trim_end_matches(TRAILING_PUNCTUATION);
                    let suffix = &whole[url.len()..];

                    if let Some(kind) = skip_reason(text, start, url) {
                        debug!("Leaving {} link {}", kind, url);
                        issues.push(LinkIssue {
                            url: url.to_string(),
                            kind,
                        });
                        return whole.to_string();
                    }

                    let path = url
                        .split_once("://")
                        .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
                        .unwrap_or("");

                    match self.resolve_reference(path, current_dir) {
                        Some(local) => {
                            rewritten += 1;
                            debug!("{} -> {}", url, local);
                            format!("{}{}", local, suffix)
                        }
                        None => {
                            issues.push(LinkIssue {
                                url: url.to_string(),
                                kind: LinkIssueKind::Unresolved,
                            });
                            whole.to_string()
                        }
                    }
                })
                .into_owned(),
            None => text.to_string(),
        };

        let text = ROOT_LINK
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let target = &caps[1];
                if target.starts_with("//") {
                    return caps[0].to_string();
                }
                if is_asset(target) {
                    return caps[0].to_string();
                }

                match self.resolve_reference(target, current_dir) {
                    Some(local) => {
                        if local != target {
                            rewritten += 1;
                        }
                        format!("]({})", local)
                    }
                    None => {
                        issues.push(LinkIssue {
                            url: target.to_string(),
                            kind: LinkIssueKind::Unresolved,
                        });
                        caps[0].to_string()
                    }
                }
            })
            .into_owned();

        result.text = text;
        result.rewritten = rewritten;
        result.issues = issues;
        result
    }

    /// Replace every `#anchor` that has a mapping with its translation
    pub fn rewrite_anchors(&self, text: &str) -> String {
        ANCHOR
            .replace_all(text, |caps: &regex::Captures<'_>| {
                match self.mappings.anchors.get(&caps[1]) {
                    Some(mapped) => format!("#{}", mapped),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Site URLs present in `text`, with trailing punctuation removed
    pub fn site_urls(&self, text: &str) -> Vec<String> {
        match &self.site_url {
            Some(site_url) => site_url
                .find_iter(text)
                .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Classify the site URLs still present in a rewritten document
    pub fn classify_remaining(&self, text: &str, current_file: &str) -> Vec<LinkIssue> {
        let excluded = self.is_excluded(current_file);
        let Some(site_url) = &self.site_url else {
            return Vec::new();
        };

        site_url
            .find_iter(text)
            .map(|m| {
                let url = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
                let kind = if excluded {
                    LinkIssueKind::Excluded
                } else {
                    skip_reason(text, m.start(), url).unwrap_or(LinkIssueKind::Unresolved)
                };
                LinkIssue {
                    url: url.to_string(),
                    kind,
                }
            })
            .collect()
    }

    /// Map a site path (optionally with `#anchor`) to a reference relative to
    /// `current_dir`, or `None` when no local page matches
    fn resolve_reference(&self, reference: &str, current_dir: &str) -> Option<String> {
        let (path, anchor) = match reference.split_once('#') {
            Some((path, anchor)) => (path, Some(anchor)),
            None => (reference, None),
        };
        let path = path.split('?').next().unwrap_or(path);
        let anchor_part = anchor
            .filter(|a| !a.is_empty())
            .map(|a| format!("#{}", self.mappings.anchors.get(a).unwrap_or(a)))
            .unwrap_or_default();

        let clean = path.trim_matches('/');
        if clean.is_empty() {
            return Some(format!("/{}", anchor_part));
        }

        let single_segment = !clean.contains('/');
        let mut candidates = Vec::new();

        if let Some(mapped) = self.mappings.paths.get(clean) {
            candidates.push(mapped.to_string());
        }
        if single_segment {
            candidates.extend(self.section_dirs.iter().map(|dir| format!("{}/{}", dir, clean)));
        }
        candidates.push(clean.to_string());
        if single_segment && !current_dir.is_empty() {
            candidates.push(format!("{}/{}", current_dir, clean));
        }

        candidates
            .into_iter()
            .find(|candidate| self.page_exists(candidate))
            .map(|target| format!("{}{}", relative_reference(current_dir, &target), anchor_part))
    }
}

/// Whether a page exists at `site_path` as a file, a `.md` file, or a
/// directory with an `index.md`
pub fn page_exists(resolver: &dyn PathResolver, site_path: &str) -> bool {
    let path = site_path.trim_matches('/');
    if path.is_empty() {
        return resolver.exists("index.md");
    }
    resolver.exists(path)
        || resolver.exists(&format!("{}.md", path))
        || resolver.exists(&format!("{}/index.md", path))
}

pub(crate) fn is_asset(path: &str) -> bool {
    let path = path.split(['#', '?']).next().unwrap_or(path);
    path.contains("/assets/") || ASSET.is_match(path)
}

/// Reason to leave a matched URL alone, if any
fn skip_reason(text: &str, start: usize, url: &str) -> Option<LinkIssueKind> {
    let path = url
        .split_once("://")
        .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or("");
    if is_asset(path) {
        return Some(LinkIssueKind::Asset);
    }

    let context = context_window(text, start, start + url.len());
    if EXAMPLE_CONTEXTS.iter().any(|pattern| pattern.is_match(context)) {
        return Some(LinkIssueKind::Example);
    }

    None
}

/// Slice of `text` extending `CONTEXT_WINDOW` bytes around `start..end`,
/// widened to char boundaries
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let mut from = start.saturating_sub(CONTEXT_WINDOW);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_WINDOW).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}

/// Directory part of a `/`-separated relative path
pub(crate) fn parent_dir(file: &str) -> &str {
    match file.rfind('/') {
        Some(i) => &file[..i],
        None => "",
    }
}

/// Reference to `target` from a document in `from_dir`, both relative to
/// the docs root
pub fn relative_reference(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let rest = to[common..].join("/");

    match from.len() - common {
        0 => format!("./{}", rest),
        ups => format!("{}{}", "../".repeat(ups), rest),
    }
}

/// Resolve `.` and `..` in a `/`-separated path relative to the docs root;
/// `None` when it climbs above the root
pub fn normalize_site_path(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter_with(files: &[&str], domains: &[&str]) -> LinkRewriter {
        let mappings = MappingConfig {
            anchors: [
                ("route-parameters", "路由参数"),
                ("services", "服务"),
                ("provider-scope", "提供者作用域"),
            ]
            .into_iter()
            .collect(),
            paths: [
                ("controllers", "overview/controllers"),
                ("fundamentals/injection-scopes", "fundamentals/provider-scopes"),
                ("techniques/database", "techniques/sql"),
            ]
            .into_iter()
            .collect(),
        };
        let options = RunOptions {
            site_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..RunOptions::default()
        };

        LinkRewriter::new(
            Arc::new(mappings),
            Arc::new(MemoryResolver::new(files.iter().copied())),
            &options,
        )
        .unwrap()
    }

    fn rewriter() -> LinkRewriter {
        rewriter_with(
            &[
                "index.md",
                "overview/controllers.md",
                "overview/pipes.md",
                "overview/providers.md",
                "fundamentals/provider-scopes.md",
                "fundamentals/testing.md",
                "techniques/sql.md",
                "recipes/index.md",
                "migration-guide.md",
            ],
            &["docs.example.com", "docs.example.cn"],
        )
    }

    #[test]
    fn test_root_relative_link_with_anchor() {
        let out = rewriter().rewrite_links(
            "See [text](/controllers#route-parameters).",
            "fundamentals/testing.md",
        );

        assert_eq!(out.text, "See [text](../overview/controllers#路由参数).");
        assert_eq!(out.rewritten, 1);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn test_domain_urls() {
        let rewriter = rewriter();
        let input = "A https://docs.example.com/fundamentals/injection-scopes#provider-scope \
                     B http://docs.example.cn/techniques/database. \
                     C https://docs.example.com \
                     D https://docs.example.com/migration-guide";
        let out = rewriter.rewrite_links(input, "overview/pipes.md");

        assert_eq!(
            out.text,
            "A ../fundamentals/provider-scopes#提供者作用域 \
             B ../techniques/sql. \
             C / \
             D ../migration-guide"
        );
        assert_eq!(out.rewritten, 4);
    }

    #[test]
    fn test_heuristic_resolution() {
        let rewriter = rewriter();

        let out = rewriter.rewrite_links("[p](https://docs.example.com/pipes)", "fundamentals/testing.md");
        assert_eq!(out.text, "[p](../overview/pipes)");

        let out = rewriter.rewrite_links("[r](https://docs.example.com/recipes)", "overview/pipes.md");
        assert_eq!(out.text, "[r](../recipes)");

        let out = rewriter.rewrite_links("[p](https://docs.example.com/providers)", "overview/pipes.md");
        assert_eq!(out.text, "[p](./providers)");
    }

    #[test]
    fn test_mapping_target_must_exist() {
        let rewriter = rewriter_with(&["controllers.md"], &["docs.example.com"]);
        let out = rewriter.rewrite_links("[c](https://docs.example.com/controllers)", "guide/intro.md");

        assert_eq!(out.text, "[c](../controllers)");
    }

    #[test]
    fn test_unresolved_left_untouched() {
        let input = "[x](https://docs.example.com/graphql/quick-start)";
        let out = rewriter().rewrite_links(input, "overview/pipes.md");

        assert_eq!(out.text, input);
        assert_eq!(out.unresolved().count(), 1);
        assert_eq!(out.issues[0].url, "https://docs.example.com/graphql/quick-start");
    }

    #[test]
    fn test_assets_are_skipped() {
        let input = "![logo](https://docs.example.com/assets/logo.png) ![x](/img/x.svg)";
        let out = rewriter().rewrite_links(input, "overview/pipes.md");

        assert_eq!(out.text, input);
        assert_eq!(out.issues[0].kind, LinkIssueKind::Asset);
    }

    #[test]
    fn test_example_code_is_skipped() {
        let input = "```typescript\n@Get('docs')\n@Redirect('https://docs.example.com', 302)\ngetDocs() {}\n```\n\
                     and `return { url: 'https://docs.example.com/v5/' }`";
        let out = rewriter().rewrite_links(input, "overview/controllers.md");

        assert_eq!(out.text, input);
        assert!(out.issues.iter().all(|i| i.kind == LinkIssueKind::Example));
        assert_eq!(out.issues.len(), 2);
    }

    #[test]
    fn test_excluded_files_keep_urls_but_translate_anchors() {
        let rewriter = rewriter();
        let input = "[c](https://docs.example.com/controllers#services)";
        let out = rewriter.rewrite_links(input, "awesome.md");

        assert_eq!(out.text, input);
        assert_eq!(out.issues[0].kind, LinkIssueKind::Excluded);
        assert_eq!(
            rewriter.rewrite_anchors(&out.text),
            "[c](https://docs.example.com/controllers#服务)"
        );

        let out = rewriter.rewrite_links(input, "recipes/index.md");
        assert_eq!(out.text, input);
    }

    #[test]
    fn test_anchor_rewriting() {
        let rewriter = rewriter();
        let input = "[a](#services) [b](./pipes#route-parameters) plain #provider-scope #unknown";

        assert_eq!(
            rewriter.rewrite_anchors(input),
            "[a](#服务) [b](./pipes#路由参数) plain #提供者作用域 #unknown"
        );
    }

    #[test]
    fn test_rewriting_is_rerun_safe() {
        let rewriter = rewriter();
        let input = "[a](/controllers#route-parameters) https://docs.example.com/pipes \
                     [u](https://docs.example.com/nowhere) [r](/) #services";

        let once = rewriter.rewrite_anchors(&rewriter.rewrite_links(input, "fundamentals/testing.md").text);
        let twice = rewriter.rewrite_anchors(&rewriter.rewrite_links(&once, "fundamentals/testing.md").text);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_relative_reference() {
        assert_eq!(relative_reference("fundamentals", "overview/controllers"), "../overview/controllers");
        assert_eq!(relative_reference("overview", "overview/controllers"), "./controllers");
        assert_eq!(relative_reference("", "overview/controllers"), "./overview/controllers");
        assert_eq!(relative_reference("a/b", "c"), "../../c");
    }

    #[test]
    fn test_normalize_site_path() {
        assert_eq!(
            normalize_site_path(Path::new("fundamentals/../overview/./pipes.md")).as_deref(),
            Some("overview/pipes.md")
        );
        assert!(normalize_site_path(Path::new("../outside.md")).is_none());
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let text = format!("{}https://docs.example.com/x", "中".repeat(40));
        let start = text.find("https").unwrap();
        let window = context_window(&text, start, text.len());
        assert!(window.ends_with("/x"));
    }
}
