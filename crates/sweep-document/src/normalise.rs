//! Import flattening for config files on disk
//!
//! Base configs are usually split across files with `import "other.ins"`
//! lines. Before a base config is edited and written into a run directory:
//! - every import line is replaced by the (recursively flattened) file it names
//! - relative paths in well-known file parameters are made absolute
//!
//! Both are resolved against the directory of the file the line came from.

use crate::document::code_part;
use crate::error::{DocumentError, DocumentResult};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Top-level parameters holding input file paths
pub const FILE_PARAMETERS: &[&str] = &[
    "file_gridlist",
    "file_met_forcing",
    "file_met_spinup",
    "file_soildata",
    "file_co2",
];

struct Patterns {
    import: Regex,
    file_parameter: Regex,
    param_block: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            import: Regex::new(r#"^\s*import\s+"([^"]+)""#)?,
            file_parameter: Regex::new(r#"^(\s*(\w+)\s+")([^"]*)(".*)$"#)?,
            param_block: Regex::new(r#"^(\s*param\s+"file_\w+"\s*\(\s*str\s+")([^"]*)(".*)$"#)?,
        })
    }
}

/// Read a config file with imports inlined and file paths made absolute
///
/// # Errors
/// - IO error if any file in the import graph cannot be read
/// - [`DocumentError::Format`] for an import cycle, naming the importing line
pub fn flatten(path: &Path) -> DocumentResult<String> {
    let patterns = Patterns::compile()?;
    let mut out = String::new();
    let mut stack = Vec::new();
    inline_file(path, &patterns, &mut stack, &mut out)?;
    Ok(out)
}

fn inline_file(
    path: &Path,
    patterns: &Patterns,
    stack: &mut Vec<PathBuf>,
    out: &mut String,
) -> DocumentResult<()> {
    let canonical = path.canonicalize().map_err(|e| DocumentError::io(path, e))?;
    let text = std::fs::read_to_string(&canonical).map_err(|e| DocumentError::io(path, e))?;
    let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    tracing::debug!(path = %canonical.display(), "flattening config file");
    stack.push(canonical);

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let Some(caps) = patterns.import.captures(code_part(line)) else {
            out.push_str(&absolutise(line, &dir, patterns));
            continue;
        };

        let target = dir.join(&caps[1]);
        let resolved = target
            .canonicalize()
            .map_err(|e| DocumentError::io(&target, e))?;
        if stack.contains(&resolved) {
            return Err(DocumentError::format(
                idx + 1,
                format!("import cycle through {}", resolved.display()),
            ));
        }
        inline_file(&resolved, patterns, stack, out)?;
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    stack.pop();
    Ok(())
}

fn absolutise(line: &str, dir: &Path, patterns: &Patterns) -> String {
    let content = line.trim_end_matches(['\r', '\n']);
    let eol = &line[content.len()..];

    let rewrite = |prefix: &str, value: &str, suffix: &str| {
        let path = Path::new(value);
        if value.is_empty() || path.is_absolute() {
            return None;
        }
        Some(format!("{prefix}{}{suffix}{eol}", dir.join(path).display()))
    };

    if let Some(caps) = patterns.param_block.captures(content) {
        if let Some(line) = rewrite(&caps[1], &caps[2], &caps[3]) {
            return line;
        }
    } else if let Some(caps) = patterns.file_parameter.captures(content) {
        if FILE_PARAMETERS.contains(&&caps[2]) {
            if let Some(line) = rewrite(&caps[1], &caps[3], &caps[4]) {
                return line;
            }
        }
    }
    line.to_string()
}
