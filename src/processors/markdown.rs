//! Markdown tree processor: source tree in, translated and rewritten tree out

use chrono::Utc;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::cache::{write_atomic, CacheKey, TranslationCache};
use crate::core::client::{AsyncTranslator, TranslationResult};
use crate::core::config::{RunOptions, TranslatorConfig};
use crate::core::errors::{DocsError, Result, TranslationError};
use crate::core::mappings::{Glossary, MappingConfig};
use crate::core::models::{FailureKind, FileFailure, RunSummary, TaskOutcome, TranslationTask};
use crate::processors::links::{FsResolver, LinkRewriter, PathResolver};
use crate::processors::normalizer;
use crate::processors::protector;
use crate::processors::validate::{is_markdown, site_relative, ValidationReport, Validator};

const TIMESTAMP_PREFIX: &str = "<!-- 生成时间:";

/// Counters shared by the tasks of one run
#[derive(Debug, Default)]
struct RunState {
    processed: AtomicUsize,
    changed: AtomicUsize,
    skipped: AtomicUsize,
    errors: Mutex<Vec<FileFailure>>,
}

impl RunState {
    fn record(&self, file: &str, kind: FailureKind, message: String) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(FileFailure {
                file: file.to_string(),
                kind,
                message,
            });
        }
    }

    fn into_summary(self) -> RunSummary {
        RunSummary {
            processed: self.processed.into_inner(),
            changed: self.changed.into_inner(),
            skipped: self.skipped.into_inner(),
            errors: self.errors.into_inner().unwrap_or_default(),
            ..RunSummary::default()
        }
    }
}

/// Drives translation, normalization and link rewriting over a Markdown tree
#[derive(Debug, Clone)]
pub struct MarkdownProcessor {
    options: Arc<RunOptions>,
    translator: Option<AsyncTranslator>,
    cache: Arc<TranslationCache>,
    rewriter: Arc<LinkRewriter>,
    progress: Option<ProgressBar>,
}

impl MarkdownProcessor {
    /// Create a processor from already-built parts
    pub fn new(
        options: RunOptions,
        translator: Option<AsyncTranslator>,
        cache: TranslationCache,
        rewriter: LinkRewriter,
    ) -> Self {
        Self {
            options: Arc::new(options),
            translator,
            cache: Arc::new(cache),
            rewriter: Arc::new(rewriter),
            progress: None,
        }
    }

    /// Load tables, glossary and cache for `options`
    ///
    /// The translator is only built when `options.use_ai` is set, so missing
    /// credentials are fatal there and ignored otherwise.
    pub fn from_options(options: RunOptions, config: TranslatorConfig) -> Result<Self> {
        let mappings = Arc::new(MappingConfig::load(options.mappings_file.as_deref())?);
        let glossary = Glossary::load(options.glossary_file.as_deref())?;

        let translator = if options.use_ai {
            Some(AsyncTranslator::new(config, &glossary)?)
        } else {
            info!("AI translation disabled, formatting only");
            None
        };

        let resolver: Arc<dyn PathResolver> = Arc::new(FsResolver::new(vec![
            options.docs_dir.clone(),
            options.content_dir.clone(),
        ]));
        let rewriter = LinkRewriter::new(mappings, resolver, &options)?;
        let cache = TranslationCache::load(options.cache_file.clone());

        Ok(Self::new(options, translator, cache, rewriter))
    }

    /// Report per-file progress on `progress`
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Find Markdown files recursively, sorted by path
    pub fn find_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(DocsError::file(dir, "Not a directory"));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && self.is_markdown_file(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Check if file is Markdown
    fn is_markdown_file(&self, path: &Path) -> bool {
        is_markdown(path)
    }

    /// One task per source file, with staleness already decided
    pub fn plan(&self) -> Result<Vec<TranslationTask>> {
        let content_dir = &self.options.content_dir;
        let tasks = self
            .find_files_recursive(content_dir)?
            .into_iter()
            .map(|source| {
                let relative = site_relative(content_dir, &source);
                let destination = self.options.docs_dir.join(&relative);
                let mut task = TranslationTask::new(source, destination, relative);
                task.stale = is_stale(&task.source, &task.destination);
                task
            })
            .collect();

        Ok(tasks)
    }

    /// Process the whole source tree
    pub async fn run(&self) -> Result<RunSummary> {
        self.options.validate()?;

        let tasks = self.plan()?;
        info!(
            "Found {} Markdown files in {}",
            tasks.len(),
            self.options.content_dir.display()
        );
        if let Some(progress) = &self.progress {
            progress.set_length(tasks.len() as u64);
        }

        let state = Arc::new(RunState::default());
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent.max(1)));
        let mut set = JoinSet::new();

        for task in tasks {
            let processor = self.clone();
            let state = state.clone();
            let semaphore = semaphore.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                processor.process_task(task, &state).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(task) => debug!("{}: {:?}", task.relative, task.outcome),
                Err(e) => error!("File task aborted: {}", e),
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_with_message("Completed");
        }

        let state = Arc::try_unwrap(state).unwrap_or_default();
        let mut summary = state.into_summary();
        summary.cache_entries = self.cache.len().await;

        if self.cache.is_dirty() {
            if let Err(e) = self.cache.persist().await {
                warn!("Failed to save translation cache: {}", e);
                summary.cache_error = Some(e.to_string());
            }
        }

        if summary.has_changes() {
            summary.validation = Some(self.validate(&self.options.docs_dir).await?);
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }

    async fn process_task(&self, mut task: TranslationTask, state: &RunState) -> TranslationTask {
        if let Some(progress) = &self.progress {
            progress.set_message(task.relative.clone());
        }

        let outcome = if !task.stale {
            debug!("Up to date: {}", task.relative);
            state.skipped.fetch_add(1, Ordering::SeqCst);
            TaskOutcome::Skipped
        } else {
            state.processed.fetch_add(1, Ordering::SeqCst);
            match self.process_file(&task, state).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Error processing {}: {}", task.relative, e);
                    state.record(&task.relative, FailureKind::Io, e.to_string());
                    TaskOutcome::Failed
                }
            }
        };

        if outcome == TaskOutcome::Translated {
            state.changed.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }

        task.outcome = Some(outcome);
        task
    }

    async fn process_file(&self, task: &TranslationTask, state: &RunState) -> Result<TaskOutcome> {
        let source = tokio::fs::read_to_string(&task.source)
            .await
            .map_err(|e| DocsError::file(&task.source, e))?;

        let mut translated_ok = true;
        let translated = match &self.translator {
            Some(translator) => match self.translate_document(translator, &task.relative, &source).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Translation failed for {}, keeping source text: {}", task.relative, e);
                    state.record(&task.relative, FailureKind::Translation, e.to_string());
                    translated_ok = false;
                    source.clone()
                }
            },
            None => source.clone(),
        };

        let body = self.render(&translated, &task.relative);
        let document = if body.starts_with("<!--") {
            body
        } else {
            format!("{}{}", self.provenance_header(&task.relative), body)
        };

        // A fallback copy stays older than its source so the next run retries it
        let lag = if translated_ok {
            Duration::ZERO
        } else {
            Duration::from_secs(1)
        };
        let modified = modified_time(&task.source)
            .await?
            .checked_sub(lag)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let outcome = match tokio::fs::read_to_string(&task.destination).await {
            Ok(existing) if same_document(&existing, &document) => {
                set_mtime(&task.destination, modified).await?;
                TaskOutcome::Unchanged
            }
            _ => {
                write_document(&task.destination, document, modified).await?;
                info!("Wrote {}", task.destination.display());
                TaskOutcome::Translated
            }
        };

        Ok(outcome)
    }

    /// Cached translation of `source`, or a fresh one from the model
    async fn translate_document(
        &self,
        translator: &AsyncTranslator,
        relative: &str,
        source: &str,
    ) -> TranslationResult<String> {
        let key = CacheKey::new(relative, source);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("Cache hit: {}", relative);
            return Ok(hit);
        }

        let masked = protector::mask(source);
        debug!("Translating {} ({} protected spans)", relative, masked.spans.len());
        let response = translator.translate(&masked.text).await?;

        let restored = protector::unmask(&response, &masked.spans);
        if !restored.is_complete() {
            return Err(TranslationError::InvalidResponseError {
                message: format!(
                    "model dropped {} of {} placeholders",
                    restored.missing.len(),
                    masked.spans.len()
                ),
            });
        }

        self.cache.put(&key, restored.text.clone()).await;
        Ok(restored.text)
    }

    /// Normalize syntax, then rewrite links and anchors
    pub fn render(&self, text: &str, relative: &str) -> String {
        let normalized = normalizer::normalize(text);
        let rewrite = self.rewriter.rewrite_links(&normalized, relative);

        for issue in rewrite.unresolved() {
            warn!("{}: no local page for {}", relative, issue.url);
        }
        if rewrite.rewritten > 0 {
            debug!("{}: rewrote {} links", relative, rewrite.rewritten);
        }

        self.rewriter.rewrite_anchors(&rewrite.text)
    }

    fn provenance_header(&self, relative: &str) -> String {
        let origin = format!("{}/{}", self.options.source_label(), relative);
        format!(
            "<!-- 此文件从 {} 自动生成，请勿直接修改此文件 -->\n{} {} -->\n<!-- 源文件: {} -->\n\n",
            origin,
            TIMESTAMP_PREFIX,
            Utc::now().to_rfc3339(),
            origin
        )
    }

    /// Re-apply normalization and rewriting in place over an existing docs tree
    ///
    /// Changed files keep their modification time so staleness checks against
    /// the source tree are unaffected.
    pub async fn post_process(&self, docs_root: &Path) -> Result<RunSummary> {
        let state = RunState::default();
        let files = self.find_files_recursive(docs_root)?;
        if let Some(progress) = &self.progress {
            progress.set_length(files.len() as u64);
        }

        for path in files {
            let relative = site_relative(docs_root, &path);
            state.processed.fetch_add(1, Ordering::SeqCst);

            match self.post_process_file(&path, &relative).await {
                Ok(true) => {
                    state.changed.fetch_add(1, Ordering::SeqCst);
                    info!("Updated {}", relative);
                }
                Ok(false) => debug!("Unchanged {}", relative),
                Err(e) => {
                    error!("Error processing {}: {}", relative, e);
                    state.record(&relative, FailureKind::Io, e.to_string());
                }
            }

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_with_message("Completed");
        }

        let mut summary = state.into_summary();
        if summary.has_changes() {
            summary.validation = Some(self.validate(docs_root).await?);
        }
        Ok(summary)
    }

    async fn post_process_file(&self, path: &Path, relative: &str) -> Result<bool> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocsError::file(path, e))?;
        let rendered = self.render(&text, relative);
        if rendered == text {
            return Ok(false);
        }

        let modified = modified_time(path).await?;
        write_document(path, rendered, modified).await?;
        Ok(true)
    }

    /// Run the read-only checks over `docs_root`
    pub async fn validate(&self, docs_root: &Path) -> Result<ValidationReport> {
        let resolver: Arc<dyn PathResolver> = Arc::new(FsResolver::new(vec![docs_root.to_path_buf()]));
        let validator = Validator::new((*self.rewriter).clone(), resolver);
        let root = docs_root.to_path_buf();

        let report = tokio::task::spawn_blocking(move || validator.validate_tree(&root))
            .await
            .map_err(|e| DocsError::file(docs_root, e))??;

        if report.is_clean() {
            info!("{}", report);
        } else {
            warn!("{}", report);
        }
        Ok(report)
    }
}

/// Destination missing, or older than its source
fn is_stale(source: &Path, destination: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(destination)) {
        (Some(source), Some(destination)) => destination < source,
        _ => true,
    }
}

/// Equal apart from the generation timestamp line
fn same_document(a: &str, b: &str) -> bool {
    fn content(text: &str) -> Vec<&str> {
        text.lines()
            .filter(|line| !line.starts_with(TIMESTAMP_PREFIX))
            .collect()
    }
    content(a) == content(b) && a.ends_with('\n') == b.ends_with('\n')
}

/// Replace `path` with `document` already carrying `modified`, so an
/// interrupted write never leaves a fresh-looking partial file
async fn write_document(path: &Path, document: String, modified: SystemTime) -> Result<()> {
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&target, document.as_bytes(), Some(modified)))
        .await
        .map_err(|e| DocsError::file(path, e))?
}

async fn modified_time(path: &Path) -> Result<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| DocsError::file(path, e))
}

/// Set the modification time of `path`
async fn set_mtime(path: &Path, modified: SystemTime) -> Result<()> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| DocsError::file(&path, e))?;
        file.set_modified(modified)
            .map_err(|e| DocsError::file(&path, e))
    })
    .await
    .map_err(|e| DocsError::config(format!("mtime task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::testing::{test_config, FakeBackend};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        options: RunOptions,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        for (name, text) in files {
            let path = content.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }

        let options = RunOptions {
            content_dir: content,
            docs_dir: dir.path().join("docs"),
            cache_file: dir.path().join("cache.json"),
            site_domains: vec!["docs.example.com".to_string()],
            max_concurrent: 3,
            ..RunOptions::default()
        };
        Fixture { _dir: dir, options }
    }

    fn processor(options: &RunOptions, backend: Arc<FakeBackend>) -> MarkdownProcessor {
        let translator = AsyncTranslator::with_backend(test_config(3), &Glossary::default(), backend);
        let resolver: Arc<dyn PathResolver> = Arc::new(FsResolver::new(vec![
            options.docs_dir.clone(),
            options.content_dir.clone(),
        ]));
        let mappings = Arc::new(MappingConfig::builtin().unwrap());
        let rewriter = LinkRewriter::new(mappings, resolver, options).unwrap();

        MarkdownProcessor::new(
            options.clone(),
            Some(translator),
            TranslationCache::load(options.cache_file.clone()),
            rewriter,
        )
    }

    #[test]
    fn test_is_markdown_file() {
        let fixture = fixture(&[]);
        let processor = processor(&fixture.options, Arc::new(FakeBackend::default()));

        assert!(processor.is_markdown_file(Path::new("test.md")));
        assert!(processor.is_markdown_file(Path::new("test.MD")));
        assert!(processor.is_markdown_file(Path::new("test.markdown")));
        assert!(!processor.is_markdown_file(Path::new("test.txt")));
    }

    #[tokio::test]
    async fn test_run_writes_translated_tree() {
        let fixture = fixture(&[
            ("overview/controllers.md", "# Controllers\n\nSee `@Get()`.\n"),
            ("fundamentals/testing.md", "Read [this](/controllers#route-parameters).\n"),
        ]);
        let backend = Arc::new(FakeBackend::default());
        let summary = processor(&fixture.options, backend.clone()).run().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.error_count(), 0);
        assert_eq!(summary.cache_entries, 2);
        assert_eq!(backend.calls(), 2);

        let controllers =
            std::fs::read_to_string(fixture.options.docs_dir.join("overview/controllers.md")).unwrap();
        assert!(controllers.starts_with("<!-- 此文件从 content/overview/controllers.md 自动生成"));
        assert!(controllers.contains("<!-- 源文件: content/overview/controllers.md -->\n\n[zh] # Controllers"));
        assert!(controllers.contains("`@Get()`"));

        let testing =
            std::fs::read_to_string(fixture.options.docs_dir.join("fundamentals/testing.md")).unwrap();
        assert!(testing.contains("[this](../overview/controllers#路由参数)"));
        assert!(fixture.options.cache_file.exists());
    }

    #[tokio::test]
    async fn test_second_run_skips_up_to_date_files() {
        let fixture = fixture(&[("a.md", "Alpha\n"), ("b.md", "Beta\n")]);
        let backend = Arc::new(FakeBackend::default());

        processor(&fixture.options, backend.clone()).run().await.unwrap();
        let before = std::fs::read_to_string(fixture.options.docs_dir.join("a.md")).unwrap();
        let summary = processor(&fixture.options, backend.clone()).run().await.unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.changed, 0);
        assert!(summary.validation.is_none());
        assert_eq!(backend.calls(), 2);
        assert_eq!(
            std::fs::read_to_string(fixture.options.docs_dir.join("a.md")).unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_cache_save_failure_keeps_run() {
        let mut fixture = fixture(&[("a.md", "Alpha\n")]);
        let blocked = fixture.options.docs_dir.with_file_name("cache-dir");
        std::fs::create_dir_all(&blocked).unwrap();
        fixture.options.cache_file = blocked;

        let summary = processor(&fixture.options, Arc::new(FakeBackend::default()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.changed, 1);
        assert!(summary.cache_error.is_some());
        assert!(summary.validation.is_some());
        assert!(fixture.options.docs_dir.join("a.md").exists());
    }

    #[tokio::test]
    async fn test_output_is_replaced_with_source_mtime() {
        let fixture = fixture(&[("guide/a.md", "Alpha\n")]);
        let backend = Arc::new(FakeBackend::default());
        let destination = fixture.options.docs_dir.join("guide/a.md");
        std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
        std::fs::write(&destination, "partial").unwrap();
        let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        std::fs::File::options()
            .write(true)
            .open(&destination)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let summary = processor(&fixture.options, backend).run().await.unwrap();
        assert_eq!(summary.changed, 1);

        let source_mtime = std::fs::metadata(fixture.options.content_dir.join("guide/a.md"))
            .unwrap()
            .modified()
            .unwrap();
        let written = std::fs::metadata(&destination).unwrap().modified().unwrap();
        assert_eq!(written, source_mtime);
        assert!(std::fs::read_to_string(&destination).unwrap().contains("[zh] Alpha"));

        let entries: Vec<_> = std::fs::read_dir(destination.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_and_miss() {
        let fixture = fixture(&[("a.md", "Alpha\n")]);
        let backend = Arc::new(FakeBackend::default());
        processor(&fixture.options, backend.clone()).run().await.unwrap();

        // Same content, destination removed: served from cache
        std::fs::remove_file(fixture.options.docs_dir.join("a.md")).unwrap();
        processor(&fixture.options, backend.clone()).run().await.unwrap();
        assert_eq!(backend.calls(), 1);

        // One character changed: new request
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(fixture.options.content_dir.join("a.md"), "Alphb\n").unwrap();
        std::fs::remove_file(fixture.options.docs_dir.join("a.md")).unwrap();
        let summary = processor(&fixture.options, backend.clone()).run().await.unwrap();
        assert_eq!(backend.calls(), 2);
        assert_eq!(summary.cache_entries, 2);
    }

    #[tokio::test]
    async fn test_translation_failure_falls_back_to_source() {
        let fixture = fixture(&[("ok.md", "Fine\n"), ("bad.md", "BROKEN text\n")]);
        let backend = Arc::new(FakeBackend::failing_on("BROKEN"));
        let summary = processor(&fixture.options, backend).run().await.unwrap();

        assert_eq!(summary.changed, 2);
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.errors[0].file, "bad.md");
        assert_eq!(summary.errors[0].kind, FailureKind::Translation);

        let bad = std::fs::read_to_string(fixture.options.docs_dir.join("bad.md")).unwrap();
        assert!(bad.ends_with("\n\nBROKEN text\n"));
        assert!(is_stale(
            &fixture.options.content_dir.join("bad.md"),
            &fixture.options.docs_dir.join("bad.md")
        ));
    }

    #[tokio::test]
    async fn test_format_only_run() {
        let fixture = fixture(&[(
            "overview/pipes.md",
            "```ts\n@@filename(pipe.ts)\nconst a = 1;\n@@switch\nvar a = 1;\n```\n",
        )]);
        let mut options = fixture.options.clone();
        options.use_ai = false;

        let resolver: Arc<dyn PathResolver> = Arc::new(FsResolver::new(vec![options.docs_dir.clone()]));
        let rewriter =
            LinkRewriter::new(Arc::new(MappingConfig::default()), resolver, &options).unwrap();
        let processor = MarkdownProcessor::new(
            options.clone(),
            None,
            TranslationCache::new(options.cache_file.clone()),
            rewriter,
        );
        let summary = processor.run().await.unwrap();

        assert_eq!(summary.changed, 1);
        let output = std::fs::read_to_string(options.docs_dir.join("overview/pipes.md")).unwrap();
        assert!(output.ends_with("```ts title=\"pipe.ts\"\nconst a = 1;\n```\n"));
        assert!(!options.cache_file.exists());
    }

    #[tokio::test]
    async fn test_missing_source_root_is_config_error() {
        let fixture = fixture(&[]);
        let result = processor(&fixture.options, Arc::new(FakeBackend::default())).run().await;

        assert!(matches!(result, Err(DocsError::Config { .. })));
    }

    #[tokio::test]
    async fn test_post_process_is_rerun_safe() {
        let fixture = fixture(&[("overview/controllers.md", "# C\n")]);
        let docs = &fixture.options.docs_dir;
        std::fs::create_dir_all(docs.join("overview")).unwrap();
        std::fs::write(docs.join("overview/controllers.md"), "# 控制器\n").unwrap();
        std::fs::write(
            docs.join("overview/pipes.md"),
            "See https://docs.example.com/controllers#route-parameters.\n\n\n\nEnd &#125;\n",
        )
        .unwrap();

        let processor = processor(&fixture.options, Arc::new(FakeBackend::default()));
        let first = processor.post_process(docs).await.unwrap();
        assert_eq!(first.changed, 1);
        assert_eq!(
            std::fs::read_to_string(docs.join("overview/pipes.md")).unwrap(),
            "See ./controllers#路由参数.\n\nEnd }\n"
        );

        let second = processor.post_process(docs).await.unwrap();
        assert_eq!(second.changed, 0);
    }

    #[test]
    fn test_same_document_ignores_timestamp() {
        let a = "<!-- h -->\n<!-- 生成时间: 2024-01-01T00:00:00+00:00 -->\nbody\n";
        let b = "<!-- h -->\n<!-- 生成时间: 2025-06-01T00:00:00+00:00 -->\nbody\n";

        assert!(same_document(a, b));
        assert!(!same_document(a, "<!-- h -->\nother\n"));
    }
}
