//! Rewrites source pseudo-syntax into the target site's code-block syntax
//!
//! Each pass is a pure `&str -> String` function that handles one input
//! shape and leaves anything it does not recognize alone.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

static FENCE_OPEN_LANG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```(\w+)\s*$").unwrap());
static FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*@@filename\(([^)]*)\)\s*$").unwrap());
static OPEN_BRACE_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(?:123|[xX]7[bB]);").unwrap());
static CLOSE_BRACE_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(?:125|[xX]7[dD]);").unwrap());
static ESCAPED_EXPR_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\{\s*['"]\s*\$\{\{\s*['"]\s*\}\}"#).unwrap());
static ESCAPED_EXPR_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\{\s*['"]\s*\}\}\s*['"]\s*\}\}"#).unwrap());
static ESCAPED_OPEN_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\{\s*['"]\s*\{\s*['"]\s*\}\}"#).unwrap());
static ESCAPED_CLOSE_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\{\s*['"]\s*\}\s*['"]\s*\}\}"#).unwrap());
static ESCAPED_SHELL_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\+)(\$\{[^}\n]+\})").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(lt|gt|amp);").unwrap());
static SCRIPT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:export|import|class|function)\b").unwrap());
static ENGLISH_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"// ((?:Create|Update|Delete|Get|Set|Initialize|Configuration|Import|Export|Example|Usage)\b|(?:Note|TODO|FIXME):)",
    )
    .unwrap()
});

const SWITCH_MARKER: &str = "@@switch";
const ORPHAN_LANGUAGE: &str = "typescript";

/// Stock English comment openers and their translations
const COMMENT_TERMS: [(&str, &str); 14] = [
    ("Create", "创建"),
    ("Update", "更新"),
    ("Delete", "删除"),
    ("Get", "获取"),
    ("Set", "设置"),
    ("Initialize", "初始化"),
    ("Configuration", "配置"),
    ("Import", "导入"),
    ("Export", "导出"),
    ("Example", "示例"),
    ("Usage", "用法"),
    ("Note:", "注意："),
    ("TODO:", "待办："),
    ("FIXME:", "修复："),
];

/// A single normalization pass
pub type Pass = fn(&str) -> String;

/// Passes in the order they run
pub const PASSES: [Pass; 10] = [
    collapse_filename_blocks,
    wrap_orphan_filenames,
    strip_switch_markers,
    collapse_duplicate_fences,
    infer_fence_language,
    decode_code_entities,
    translate_code_comments,
    decode_brace_entities,
    unescape_template_placeholders,
    collapse_blank_lines,
];

/// Run every pass in order until the text stops changing
///
/// A later pass can expose work for an earlier one (dropping a stray fence
/// can turn a nested annotation into an orphan). Each changing round strictly
/// reduces the markup left to rewrite, so the loop ends.
pub fn normalize(text: &str) -> String {
    let mut current = run_passes(text);
    loop {
        let next = run_passes(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn run_passes(text: &str) -> String {
    PASSES.iter().fold(text.to_string(), |acc, pass| pass(&acc))
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_bare_fence(line: &str) -> bool {
    line.trim() == "```"
}

fn is_switch(line: &str) -> bool {
    line.trim_start().starts_with(SWITCH_MARKER)
}

fn filename_of(line: &str) -> Option<&str> {
    FILENAME
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn open_fence(indent: &str, lang: &str, filename: &str) -> String {
    let filename = filename.trim();
    if filename.is_empty() {
        format!("{}```{}", indent, lang)
    } else {
        format!("{}```{} title=\"{}\"", indent, lang, filename)
    }
}

/// Drop blank lines at both ends
fn trim_blank<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

/// Apply a line transformation, keeping a single trailing newline intact
fn map_lines<F>(text: &str, f: F) -> String
where
    F: FnOnce(&[&str]) -> Vec<String>,
{
    let (body, trailing) = match text.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (text, false),
    };
    let lines: Vec<&str> = body.split('\n').collect();
    let mut out = f(&lines).join("\n");
    if trailing {
        out.push('\n');
    }
    out
}

/// Skip a run of `@@filename(...)` lines, blank lines between them
/// included. Returns the first non-empty name and the index after the run.
fn annotation_run<'a>(lines: &[&'a str], start: usize) -> (&'a str, usize) {
    let mut name = "";
    let mut j = start;

    while j < lines.len() {
        match filename_of(lines[j]) {
            Some(found) => {
                if name.is_empty() {
                    name = found.trim();
                }
            }
            None if lines[j].trim().is_empty() => {}
            None => break,
        }
        j += 1;
    }

    (name, j)
}

/// Collect code lines from `start` up to the next fence or switch marker;
/// when a switch marker ends the code, skip through the following fence
/// line if `consume_close` accepts it. Returns the code and the index after
/// the consumed region.
fn take_primary_code<'a>(
    lines: &[&'a str],
    start: usize,
    consume_close: fn(&str) -> bool,
) -> (Vec<&'a str>, usize) {
    let mut j = start;
    let mut code = Vec::new();

    while j < lines.len() && !is_fence(lines[j]) && !is_switch(lines[j]) {
        code.push(lines[j]);
        j += 1;
    }

    if j < lines.len() && is_switch(lines[j]) {
        j += 1;
        while j < lines.len() && !is_fence(lines[j]) {
            j += 1;
        }
    }

    if j < lines.len() && consume_close(lines[j]) {
        j += 1;
    }

    (trim_blank(&code), j)
}

/// Fenced block whose first line is `@@filename(name)`: keep the primary
/// code, title the fence with the first file name, drop any further
/// annotations and any `@@switch` variant
pub fn collapse_filename_blocks(text: &str) -> String {
    map_lines(text, |lines| {
        let mut out = Vec::with_capacity(lines.len());
        let mut in_fence = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if !in_fence && is_fence(line) {
                let lang = FENCE_OPEN_LANG
                    .captures(line)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str());
                let first = (i + 1..lines.len()).find(|&k| !lines[k].trim().is_empty());
                let annotated = first.filter(|&k| filename_of(lines[k]).is_some());

                if let (Some(lang), Some(k)) = (lang, annotated) {
                    let indent = indent_of(line);
                    let (name, start) = annotation_run(lines, k);
                    let (code, next) = take_primary_code(lines, start, is_fence);
                    out.push(open_fence(indent, lang, name));
                    out.extend(code.iter().map(|l| l.to_string()));
                    out.push(format!("{}```", indent));
                    i = next;
                    continue;
                }

                in_fence = true;
            } else if in_fence && is_fence(line) {
                in_fence = false;
            }

            out.push(line.to_string());
            i += 1;
        }

        out
    })
}

/// `@@filename(name)` outside any fence: wrap the code that follows in a
/// titled block
pub fn wrap_orphan_filenames(text: &str) -> String {
    map_lines(text, |lines| {
        let mut out = Vec::with_capacity(lines.len());
        let mut in_fence = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if is_fence(line) {
                in_fence = !in_fence;
            } else if !in_fence {
                if filename_of(line).is_some() {
                    let indent = indent_of(line);
                    let (name, start) = annotation_run(lines, i);
                    let (code, next) = take_primary_code(lines, start, is_bare_fence);
                    out.push(open_fence(indent, ORPHAN_LANGUAGE, name));
                    out.extend(code.iter().map(|l| l.to_string()));
                    out.push(format!("{}```", indent));
                    i = next;
                    continue;
                }
            }

            out.push(line.to_string());
            i += 1;
        }

        out
    })
}

/// Delete any remaining `@@switch` marker and the lines after it up to the
/// next fence line
pub fn strip_switch_markers(text: &str) -> String {
    if !text.contains(SWITCH_MARKER) {
        return text.to_string();
    }

    map_lines(text, |lines| {
        let mut out = Vec::with_capacity(lines.len());
        let mut dropping = false;

        for line in lines {
            if dropping {
                if is_fence(line) {
                    dropping = false;
                } else {
                    continue;
                }
            }

            if let Some(pos) = line.find(SWITCH_MARKER) {
                let before = line[..pos].trim_end();
                if !before.trim().is_empty() {
                    out.push(before.to_string());
                }
                dropping = true;
                continue;
            }

            out.push(line.to_string());
        }

        out
    })
}

/// Remove a bare fence that directly follows a closing fence when it cannot
/// open a balanced block of its own
pub fn collapse_duplicate_fences(text: &str) -> String {
    map_lines(text, |lines| {
        // next_fence[i]: index of the first fence line after i
        let mut next_fence = vec![None; lines.len()];
        let mut upcoming = None;
        for i in (0..lines.len()).rev() {
            next_fence[i] = upcoming;
            if is_fence(lines[i]) {
                upcoming = Some(i);
            }
        }

        let mut out = Vec::with_capacity(lines.len());
        let mut in_fence = false;
        let mut after_close = false;

        for (i, line) in lines.iter().enumerate() {
            if !is_fence(line) {
                after_close = false;
                out.push(line.to_string());
                continue;
            }

            if in_fence {
                in_fence = false;
                after_close = true;
                out.push(line.to_string());
                continue;
            }

            if after_close && is_bare_fence(line) {
                let can_open = next_fence[i].map_or(false, |k| is_bare_fence(lines[k]));
                if !can_open {
                    continue;
                }
            }

            in_fence = true;
            after_close = false;
            out.push(line.to_string());
        }

        out
    })
}

/// Untagged fence whose body looks like script or JSON gets a language tag
pub fn infer_fence_language(text: &str) -> String {
    map_lines(text, |lines| {
        let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        let mut i = 0;

        while i < lines.len() {
            if !is_fence(lines[i]) {
                i += 1;
                continue;
            }
            let close = match (i + 1..lines.len()).find(|&k| is_fence(lines[k])) {
                Some(close) => close,
                None => break,
            };
            if is_bare_fence(lines[i]) {
                if let Some(lang) = guess_language(&lines[i + 1..close]) {
                    out[i] = format!("{}```{}", indent_of(lines[i]), lang);
                }
            }
            i = close + 1;
        }

        out
    })
}

fn guess_language(body: &[&str]) -> Option<&'static str> {
    let code = body.join("\n");
    let trimmed = code.trim();
    if trimmed.is_empty() || code.contains('`') {
        return None;
    }

    if SCRIPT_KEYWORD.is_match(&code) {
        Some("typescript")
    } else if trimmed.starts_with('{') && trimmed.ends_with('}') {
        Some("json")
    } else {
        None
    }
}

/// Apply `inside` to lines within fences and `outside` to the rest
fn map_by_fence<F, G>(text: &str, inside: F, outside: G) -> String
where
    F: Fn(&str) -> String,
    G: Fn(&str) -> String,
{
    map_lines(text, |lines| {
        let mut in_fence = false;
        lines
            .iter()
            .map(|&line| {
                if is_fence(line) {
                    in_fence = !in_fence;
                    line.to_string()
                } else if in_fence {
                    inside(line)
                } else {
                    outside(line)
                }
            })
            .collect()
    })
}

fn decode_html_entities(text: &str) -> String {
    HTML_ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| match &caps[1] {
            "lt" => "<",
            "gt" => ">",
            _ => "&",
        })
        .into_owned()
}

/// `&lt;` / `&gt;` / `&amp;` back to literal characters inside fenced blocks
/// and inline code; prose keeps its entities
pub fn decode_code_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    map_by_fence(text, decode_html_entities, |line| {
        INLINE_CODE
            .replace_all(line, |caps: &regex::Captures<'_>| decode_html_entities(&caps[0]))
            .into_owned()
    })
}

/// Stock English comment openers inside fenced blocks (`// Create`,
/// `// Note:`) to Chinese
pub fn translate_code_comments(text: &str) -> String {
    if !text.contains("// ") {
        return text.to_string();
    }

    map_by_fence(
        text,
        |line| {
            ENGLISH_COMMENT
                .replace_all(line, |caps: &regex::Captures<'_>| {
                    match COMMENT_TERMS.iter().find(|(english, _)| *english == &caps[1]) {
                        Some((_, chinese)) => format!("// {}", chinese),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned()
        },
        |line| line.to_string(),
    )
}

/// `&#123;` / `&#125;` (and hex forms) back to literal braces
pub fn decode_brace_entities(text: &str) -> String {
    let text = OPEN_BRACE_ENTITY.replace_all(text, NoExpand("{"));
    CLOSE_BRACE_ENTITY.replace_all(&text, NoExpand("}")).into_owned()
}

/// Escaped template placeholders (`{{ '{' }}`, `{{ '${{' }}`, `\${VAR}`)
/// back to their literal form
pub fn unescape_template_placeholders(text: &str) -> String {
    let text = ESCAPED_EXPR_OPEN.replace_all(text, NoExpand("${{"));
    let text = ESCAPED_EXPR_CLOSE.replace_all(&text, NoExpand("}}"));
    let text = ESCAPED_OPEN_BRACE.replace_all(&text, NoExpand("{"));
    let text = ESCAPED_CLOSE_BRACE.replace_all(&text, NoExpand("}"));
    ESCAPED_SHELL_VAR
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            // a doubled backslash is a deliberate escape
            if caps[1].len() == 1 {
                caps[2].to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Three or more consecutive newlines become one blank line
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN.replace_all(text, NoExpand("\n\n")).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_block_with_switch() {
        let input = "```ts\n@@filename(cats.controller.ts)\nexport class CatsController {}\n@@switch\nexport class CatsController {\n  constructor() {}\n}\n";
        let output = normalize(input);

        assert_eq!(
            output,
            "```ts title=\"cats.controller.ts\"\nexport class CatsController {}\n```\n"
        );
    }

    #[test]
    fn test_filename_block_with_close_fence() {
        let input = "Intro\n\n```typescript\n@@filename(app.module.ts)\n\nimport { Module } from '@nestjs/common';\n\n@@switch\nimport { Module } from '@nestjs/common';\n```\n\nAfter";
        let expected = "Intro\n\n```typescript title=\"app.module.ts\"\nimport { Module } from '@nestjs/common';\n```\n\nAfter";

        assert_eq!(collapse_filename_blocks(input), expected);
    }

    #[test]
    fn test_filename_block_without_switch_or_name() {
        let input = "```js\n@@filename()\nconst a = 1;\n```\n";
        assert_eq!(collapse_filename_blocks(input), "```js\nconst a = 1;\n```\n");
    }

    #[test]
    fn test_orphan_filename() {
        let input = "Text\n@@filename(main.ts)\nconst app = await NestFactory.create(AppModule);\n@@switch\nconst app = await NestFactory.create(AppModule);\n```\n\nMore text\n";
        let expected = "Text\n```typescript title=\"main.ts\"\nconst app = await NestFactory.create(AppModule);\n```\n\nMore text\n";

        assert_eq!(wrap_orphan_filenames(input), expected);
    }

    #[test]
    fn test_filename_inside_fence_is_not_orphan() {
        let input = "```bash\n$ npm i\n@@filename(x.ts)\n```\n";
        assert_eq!(wrap_orphan_filenames(input), input);
    }

    #[test]
    fn test_bare_switch_marker() {
        let input = "```typescript\nconst a = 1;\n@@switch\nvar a = 1;\n```\nText after\n";
        assert_eq!(
            strip_switch_markers(input),
            "```typescript\nconst a = 1;\n```\nText after\n"
        );

        let tail = "Some prose\n@@switch\ndropped\nalso dropped";
        assert_eq!(strip_switch_markers(tail), "Some prose");
    }

    #[test]
    fn test_duplicate_fences() {
        let input = "```ts\nconst a = 1;\n```\n```\n\nText\n";
        assert_eq!(collapse_duplicate_fences(input), "```ts\nconst a = 1;\n```\n\nText\n");

        let legit = "```ts\nconst a = 1;\n```\n```\nplain block\n```\n";
        assert_eq!(collapse_duplicate_fences(legit), legit);

        let before_tagged = "```ts\na\n```\n```\n```bash\nnpm i\n```\n";
        assert_eq!(
            collapse_duplicate_fences(before_tagged),
            "```ts\na\n```\n```bash\nnpm i\n```\n"
        );
    }

    #[test]
    fn test_stacked_filename_annotations() {
        let input = "```ts\n@@filename(a.ts)\n@@filename(b.ts)\nconst b = 1;\n```\n";
        assert_eq!(
            collapse_filename_blocks(input),
            "```ts title=\"a.ts\"\nconst b = 1;\n```\n"
        );

        let orphan = "@@filename()\n\n@@filename(main.ts)\nbootstrap();\n```\n";
        assert_eq!(
            wrap_orphan_filenames(orphan),
            "```typescript title=\"main.ts\"\nbootstrap();\n```\n"
        );
    }

    #[test]
    fn test_annotation_chain_settles_in_one_call() {
        let input = "@@filename()\n".repeat(5);
        let once = normalize(&input);

        assert_eq!(once, "```typescript\n```\n");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_infer_fence_language() {
        let input = "```\nexport class A {}\n```\n\n```\n{ \"a\": 1 }\n```\n\n```\nplain text\n```\n\n```bash\nimport x\n```\n";
        let expected = "```typescript\nexport class A {}\n```\n\n```json\n{ \"a\": 1 }\n```\n\n```\nplain text\n```\n\n```bash\nimport x\n```\n";

        assert_eq!(infer_fence_language(input), expected);
        assert_eq!(infer_fence_language("```\n\n```\n"), "```\n\n```\n");
    }

    #[test]
    fn test_code_entities() {
        let input = "Prose &lt;b&gt; and `a &lt; b`\n```ts\nif (a &amp;&amp; b) {}\n```\n";
        assert_eq!(
            decode_code_entities(input),
            "Prose &lt;b&gt; and `a < b`\n```ts\nif (a && b) {}\n```\n"
        );
        assert_eq!(decode_code_entities("`&amp;lt;`"), "`&lt;`");
    }

    #[test]
    fn test_code_comments() {
        let input = "```ts\n// Create a cat\nconst cat = {}; // Note: required\n// Setup stays\n```\n// Create outside\n";
        assert_eq!(
            translate_code_comments(input),
            "```ts\n// 创建 a cat\nconst cat = {}; // 注意： required\n// Setup stays\n```\n// Create outside\n"
        );
    }

    #[test]
    fn test_brace_entities() {
        assert_eq!(
            decode_brace_entities("{ a: 1 &#125; &#123; b &#x7D;"),
            "{ a: 1 } { b }"
        );
    }

    #[test]
    fn test_template_placeholders() {
        assert_eq!(unescape_template_placeholders("{{ '{' }} a {{ \"}\" }}"), "{ a }");
        assert_eq!(
            unescape_template_placeholders("run: {{ '${{' }} secrets.TOKEN {{ '}}' }}"),
            "run: ${{ secrets.TOKEN }}"
        );
        assert_eq!(unescape_template_placeholders(r"echo \${HOME}"), "echo ${HOME}");
        assert_eq!(unescape_template_placeholders(r"echo \\${HOME}"), r"echo \\${HOME}");
        assert_eq!(unescape_template_placeholders(r"\${A}\${B}"), "${A}${B}");
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_unrecognized_markdown_passes_through() {
        let input = "# Title\n\nSome `code` and a [link](./x).\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "```ts\n@@filename(a.ts)\nA\n@@switch\nB\n```\n```\n",
            "@@filename(b.ts)\nB\n```\n\n\n\nText &#125;\n",
            "```\n```\n```\n",
            "x\n@@switch\n```ts\n@@filename()\n\n```\n",
            "```ts\ncode\n```\n@@switch\nalt\n```\n",
            r"{{ '{' }} \${X} \\${Y}",
            "@@filename(a.ts)\n@@filename(b.ts)\n@@filename()\nA\n",
            "```\n// Create it\nexport const a = `&lt;`;\n```\n",
            "",
            "\n",
        ];

        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    use proptest::prelude::*;

    const FRAGMENTS: [&str; 12] = [
        "```ts",
        "```",
        "@@filename(a.ts)",
        "@@filename()",
        "@@switch",
        "const a = 1;",
        "",
        "export class A {}",
        "{ \"a\": 1 }",
        "// Create a cat",
        "`x &amp;lt; y`",
        "&#125;",
    ];

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            picks in proptest::collection::vec(proptest::sample::select(FRAGMENTS.to_vec()), 0..24),
            trailing in any::<bool>(),
        ) {
            let mut input = picks.join("\n");
            if trailing {
                input.push('\n');
            }
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
