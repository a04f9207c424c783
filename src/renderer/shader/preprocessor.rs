// renderer/shader/preprocessor.rs
//! Source-level directives understood on top of GLSL:
//!
//! * `#pragma type <stage>` selects the pipeline stage of the file.
//! * `#include "name"` (or `<name>`) splices another registered source.

use crate::renderer::device::ShaderStage;
use crate::renderer::error::ShaderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedSource {
    pub stage: ShaderStage,
    pub source: String,
}

/// Expands `source` (registered as `name`). Included files are looked up
/// through `resolve`.
pub fn preprocess(
    name: &str,
    source: &str,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<PreprocessedSource, ShaderError> {
    let mut stage = None;
    let mut stack = vec![name.to_owned()];
    let mut out = String::with_capacity(source.len());

    expand(name, source, resolve, &mut stack, &mut stage, &mut out)?;

    let stage = stage.ok_or_else(|| ShaderError::MissingStage(name.to_owned()))?;
    Ok(PreprocessedSource { stage, source: out })
}

fn expand(
    name: &str,
    source: &str,
    resolve: &dyn Fn(&str) -> Option<String>,
    stack: &mut Vec<String>,
    stage: &mut Option<ShaderStage>,
    out: &mut String,
) -> Result<(), ShaderError> {
    for line in source.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("#pragma") {
            let mut words = rest.split_whitespace();
            if words.next() == Some("type") {
                let keyword = words.next().unwrap_or_default();
                let parsed =
                    ShaderStage::from_keyword(keyword).ok_or_else(|| ShaderError::UnknownStage {
                        shader: name.to_owned(),
                        stage: keyword.to_owned(),
                    })?;
                stage.get_or_insert(parsed);
                out.push('\n');
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix("#include") {
            let include = include_target(rest).ok_or_else(|| ShaderError::MalformedInclude {
                shader: name.to_owned(),
                line: line.to_owned(),
            })?;

            if stack.iter().any(|s| s == include) {
                return Err(ShaderError::IncludeCycle(include.to_owned()));
            }
            let text = resolve(include).ok_or_else(|| ShaderError::UnresolvedInclude {
                shader: name.to_owned(),
                include: include.to_owned(),
            })?;

            stack.push(include.to_owned());
            expand(include, &text, resolve, stack, stage, out)?;
            stack.pop();
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    Ok(())
}

fn include_target(rest: &str) -> Option<&str> {
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')))?;
    (!inner.is_empty()).then_some(inner)
}
