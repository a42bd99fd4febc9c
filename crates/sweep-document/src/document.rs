//! Format-preserving config document
//!
//! A document is an arena of line fragments addressed by index. The
//! render order is a list of nodes, each either a loose top-level line or a
//! block (a run of lines from the `type "name" (` header to the line that
//! balances its parentheses).
//!
//! - Unmodified fragments render byte-for-byte, including their own line ending
//! - Editing a parameter swaps in a new fragment at the same index
//! - New parameters are pushed onto the arena and spliced into the layout
//!
//! Lookups return the *last* occurrence of a name, so later lines override
//! earlier ones.

use crate::error::{DocumentError, DocumentResult};
use crate::normalise;
use crate::value::{quote_if_needed, Parameter};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Comment marker; runs to end of line
pub const COMMENT_MARKER: char = '!';

/// Block type of sub-components (plant functional types)
pub const SUB_COMPONENT_BLOCK: &str = "pft";

/// Parameter toggling a sub-component on or off
pub const INCLUDE_PARAMETER: &str = "include";

const DEFAULT_BLOCK_INDENT: &str = "    ";
const DEFAULT_SEPARATOR: &str = " ";

/// Index of a line fragment in the document arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FragmentId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
    None,
}

impl LineEnding {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

/// A `name value` line split into its spans
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParameterLine {
    indent: String,
    name: String,
    separator: String,
    value: String,
    /// Everything after the value: spacing, closing parens, comment
    trailer: String,
}

impl ParameterLine {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start();
        let indent = &line[..line.len() - rest.len()];
        if rest.is_empty() || rest.starts_with(COMMENT_MARKER) {
            return None;
        }

        let name_end = rest.find(char::is_whitespace)?;
        let name = &rest[..name_end];
        if !is_identifier(name) {
            return None;
        }

        let after_name = &rest[name_end..];
        let tail = after_name.trim_start();
        let separator = &after_name[..after_name.len() - tail.len()];

        let mut in_quotes = false;
        let mut value_end = tail.len();
        for (idx, c) in tail.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                COMMENT_MARKER | ')' if !in_quotes => {
                    value_end = idx;
                    break;
                }
                _ => {}
            }
        }

        let value = tail[..value_end].trim_end();
        if value.is_empty() {
            return None;
        }

        Some(Self {
            indent: indent.to_string(),
            name: name.to_string(),
            separator: separator.to_string(),
            value: value.to_string(),
            trailer: tail[value.len()..].to_string(),
        })
    }

    fn with_value(&self, value: String) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&self.indent);
        out.push_str(&self.name);
        out.push_str(&self.separator);
        out.push_str(&self.value);
        out.push_str(&self.trailer);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Verbatim(String),
    Parameter(ParameterLine),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    kind: LineKind,
    eol: LineEnding,
}

impl Fragment {
    fn render_into(&self, out: &mut String) {
        match &self.kind {
            LineKind::Verbatim(text) => out.push_str(text),
            LineKind::Parameter(line) => line.render_into(out),
        }
        out.push_str(self.eol.as_str());
    }

    fn parameter(&self) -> Option<&ParameterLine> {
        match &self.kind {
            LineKind::Parameter(line) => Some(line),
            LineKind::Verbatim(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    block_type: String,
    name: String,
    /// Every line of the block, header and closing line included
    lines: Vec<FragmentId>,
    /// Parameter occurrences in file order
    parameters: Vec<FragmentId>,
}

impl Block {
    fn is(&self, block_type: &str, name: &str) -> bool {
        self.block_type == block_type && self.name == name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Line(FragmentId),
    Block(usize),
}

/// Parsed, editable config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    fragments: Vec<Fragment>,
    layout: Vec<Node>,
    blocks: Vec<Block>,
    top_level: Vec<FragmentId>,
    default_eol: LineEnding,
}

impl ConfigDocument {
    /// Parse config text
    ///
    /// # Errors
    /// Returns [`DocumentError::Format`] if a block's parentheses are not
    /// balanced before end of input
    pub fn parse(text: &str) -> DocumentResult<Self> {
        let default_eol = if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let mut doc = Self {
            fragments: Vec::new(),
            layout: Vec::new(),
            blocks: Vec::new(),
            top_level: Vec::new(),
            default_eol,
        };

        let lines: Vec<(&str, LineEnding)> = text.split_inclusive('\n').map(split_eol).collect();
        let mut idx = 0;
        while idx < lines.len() {
            let (content, eol) = lines[idx];
            let Some((block_type, name, rest)) = parse_block_header(code_part(content)) else {
                let id = match ParameterLine::parse(content) {
                    Some(param) => {
                        let id = doc.push(LineKind::Parameter(param), eol);
                        doc.top_level.push(id);
                        id
                    }
                    None => doc.push(LineKind::Verbatim(content.to_string()), eol),
                };
                doc.layout.push(Node::Line(id));
                idx += 1;
                continue;
            };

            let header_line = idx + 1;
            let mut block = Block {
                block_type: block_type.to_string(),
                name: name.to_string(),
                lines: vec![doc.push(LineKind::Verbatim(content.to_string()), eol)],
                parameters: Vec::new(),
            };
            let mut depth = 1 + paren_balance(rest);
            idx += 1;

            while depth > 0 {
                let Some(&(content, eol)) = lines.get(idx) else {
                    return Err(DocumentError::format(
                        header_line,
                        format!("unterminated {} block '{}'", block.block_type, block.name),
                    ));
                };
                depth += paren_balance(code_part(content));
                let id = match ParameterLine::parse(content) {
                    Some(param) => {
                        let id = doc.push(LineKind::Parameter(param), eol);
                        block.parameters.push(id);
                        id
                    }
                    None => doc.push(LineKind::Verbatim(content.to_string()), eol),
                };
                block.lines.push(id);
                idx += 1;
            }

            doc.layout.push(Node::Block(doc.blocks.len()));
            doc.blocks.push(block);
        }

        tracing::trace!(
            fragments = doc.fragments.len(),
            blocks = doc.blocks.len(),
            "parsed config document"
        );
        Ok(doc)
    }

    /// Read and parse a file as-is
    ///
    /// # Errors
    /// Returns IO or format errors
    pub fn read(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::io(path, e))?;
        Self::parse(&text)
    }

    /// Read a file with imports flattened and file parameters made absolute
    ///
    /// # Errors
    /// Returns IO or format errors, including import cycles
    pub fn load(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let text = normalise::flatten(path.as_ref())?;
        Self::parse(&text)
    }

    /// Render and write to a file
    ///
    /// The text goes to a staging file beside `path` first and is renamed
    /// into place, so readers never see a partial config.
    ///
    /// # Errors
    /// Returns IO error if the file cannot be written
    pub fn write(&self, path: impl AsRef<Path>) -> DocumentResult<()> {
        let path = path.as_ref();
        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        std::fs::write(&staging, self.render()).map_err(|e| DocumentError::io(&staging, e))?;
        std::fs::rename(&staging, path).map_err(|e| DocumentError::io(path, e))
    }

    /// Regenerate the document text
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.layout {
            match *node {
                Node::Line(id) => self.fragments[id.0].render_into(&mut out),
                Node::Block(b) => {
                    for id in &self.blocks[b].lines {
                        self.fragments[id.0].render_into(&mut out);
                    }
                }
            }
        }
        out
    }

    /// Last occurrence of a top-level parameter
    #[must_use]
    pub fn top_level_parameter(&self, name: &str) -> Option<Parameter<'_>> {
        self.last_occurrence(&self.top_level, name)
            .and_then(|id| self.view(id))
    }

    /// Last occurrence of a parameter inside any block with this type and name
    #[must_use]
    pub fn block_parameter(
        &self,
        block_type: &str,
        block_name: &str,
        name: &str,
    ) -> Option<Parameter<'_>> {
        self.last_block_occurrence(block_type, block_name, name)
            .and_then(|id| self.view(id))
    }

    /// Names of blocks of a given type, in file order, without repeats
    #[must_use]
    pub fn block_names(&self, block_type: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for block in self.blocks.iter().filter(|b| b.block_type == block_type) {
            if !names.contains(&block.name.as_str()) {
                names.push(&block.name);
            }
        }
        names
    }

    /// Whether any block has this type and name
    #[must_use]
    pub fn has_block(&self, block_type: &str, block_name: &str) -> bool {
        self.blocks.iter().any(|b| b.is(block_type, block_name))
    }

    /// Set a top-level parameter
    ///
    /// Rewrites the last occurrence's value, or appends a new line at the end
    /// of the document using the spacing of the first top-level parameter.
    pub fn set_top_level_parameter(&mut self, name: &str, value: &str) {
        let value = quote_if_needed(value).into_owned();
        if let Some(id) = self.last_occurrence(&self.top_level, name) {
            self.replace_value(id, value);
            return;
        }

        let (indent, separator) = self
            .top_level
            .first()
            .and_then(|id| self.fragments[id.0].parameter())
            .map_or((String::new(), DEFAULT_SEPARATOR.to_string()), |p| {
                (p.indent.clone(), p.separator.clone())
            });
        let line = ParameterLine {
            indent,
            name: name.to_string(),
            separator,
            value,
            trailer: String::new(),
        };

        // Keep a missing final newline missing
        let eol = match self.last_fragment() {
            Some(last) if self.fragments[last.0].eol == LineEnding::None => {
                self.fragments[last.0].eol = self.default_eol;
                LineEnding::None
            }
            _ => self.default_eol,
        };
        let id = self.push(LineKind::Parameter(line), eol);
        self.layout.push(Node::Line(id));
        self.top_level.push(id);
        tracing::debug!(parameter = name, "appended top-level parameter");
    }

    /// Set a parameter inside a block
    ///
    /// Rewrites the last occurrence across matching blocks, or inserts a new
    /// line before the closing line of the last matching block.
    ///
    /// # Errors
    /// - [`DocumentError::BlockNotFound`] if no block has this type and name
    /// - [`DocumentError::InlineBlock`] if the block is a single header line
    pub fn set_block_parameter(
        &mut self,
        block_type: &str,
        block_name: &str,
        name: &str,
        value: &str,
    ) -> DocumentResult<()> {
        let value = quote_if_needed(value).into_owned();
        let target = self
            .blocks
            .iter()
            .rposition(|b| b.is(block_type, block_name))
            .ok_or_else(|| DocumentError::block_not_found(block_type, block_name))?;

        if let Some(id) = self.last_block_occurrence(block_type, block_name, name) {
            self.replace_value(id, value);
            return Ok(());
        }

        if self.blocks[target].lines.len() < 2 {
            return Err(DocumentError::InlineBlock {
                block_type: block_type.to_string(),
                name: block_name.to_string(),
            });
        }

        let indent = self.blocks[target]
            .parameters
            .first()
            .and_then(|id| self.fragments[id.0].parameter())
            .map_or_else(|| DEFAULT_BLOCK_INDENT.to_string(), |p| p.indent.clone());
        let line = ParameterLine {
            indent,
            name: name.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            value,
            trailer: String::new(),
        };
        let id = self.push(LineKind::Parameter(line), self.default_eol);

        let block = &mut self.blocks[target];
        let closing = block.lines.len() - 1;
        block.lines.insert(closing, id);
        block.parameters.push(id);
        tracing::debug!(block_type, block_name, parameter = name, "added block parameter");
        Ok(())
    }

    /// Apply a `name` or `block.param` change
    ///
    /// For the dotted form the block type is taken from the first block with
    /// that name.
    ///
    /// # Errors
    /// - [`DocumentError::InvalidParameterName`] for more than one `.` or empty parts
    /// - [`DocumentError::BlockNotFound`] if no block has that name
    pub fn apply_change(&mut self, name: &str, value: &str) -> DocumentResult<()> {
        let Some((block_name, param)) = name.split_once('.') else {
            self.set_top_level_parameter(name, value);
            return Ok(());
        };
        if block_name.is_empty() || param.is_empty() || param.contains('.') {
            return Err(DocumentError::InvalidParameterName(name.to_string()));
        }
        let block_type = self
            .blocks
            .iter()
            .find(|b| b.name == block_name)
            .map(|b| b.block_type.clone())
            .ok_or_else(|| DocumentError::block_not_found("matching", block_name))?;
        self.set_block_parameter(&block_type, block_name, param, value)
    }

    /// Names of all sub-component blocks
    #[must_use]
    pub fn sub_components(&self) -> Vec<&str> {
        self.block_names(SUB_COMPONENT_BLOCK)
    }

    /// Set `include 0` on every sub-component
    ///
    /// # Errors
    /// Returns [`DocumentError::InlineBlock`] if a sub-component cannot be edited
    pub fn disable_all_sub_components(&mut self) -> DocumentResult<()> {
        let names: Vec<String> = self.sub_components().into_iter().map(str::to_string).collect();
        for name in names {
            self.set_block_parameter(SUB_COMPONENT_BLOCK, &name, INCLUDE_PARAMETER, "0")?;
        }
        Ok(())
    }

    /// Set `include 1` on one sub-component
    ///
    /// # Errors
    /// Returns [`DocumentError::BlockNotFound`] if the sub-component is not defined
    pub fn enable_sub_component(&mut self, name: &str) -> DocumentResult<()> {
        self.set_block_parameter(SUB_COMPONENT_BLOCK, name, INCLUDE_PARAMETER, "1")
    }

    /// Enable exactly the listed sub-components
    ///
    /// An empty list leaves the document untouched. Every name is checked
    /// before anything is modified.
    ///
    /// # Errors
    /// Returns [`DocumentError::BlockNotFound`] naming the first unknown sub-component
    pub fn restrict_sub_components<S: AsRef<str>>(&mut self, enabled: &[S]) -> DocumentResult<()> {
        if enabled.is_empty() {
            return Ok(());
        }
        if let Some(missing) = enabled
            .iter()
            .find(|name| !self.has_block(SUB_COMPONENT_BLOCK, name.as_ref()))
        {
            return Err(DocumentError::block_not_found(SUB_COMPONENT_BLOCK, missing.as_ref()));
        }
        self.disable_all_sub_components()?;
        for name in enabled {
            self.enable_sub_component(name.as_ref())?;
        }
        Ok(())
    }

    fn push(&mut self, kind: LineKind, eol: LineEnding) -> FragmentId {
        self.fragments.push(Fragment { kind, eol });
        FragmentId(self.fragments.len() - 1)
    }

    fn view(&self, id: FragmentId) -> Option<Parameter<'_>> {
        self.fragments[id.0]
            .parameter()
            .map(|p| Parameter::new(&p.name, &p.value))
    }

    fn last_occurrence(&self, ids: &[FragmentId], name: &str) -> Option<FragmentId> {
        ids.iter()
            .rev()
            .copied()
            .find(|id| self.fragments[id.0].parameter().is_some_and(|p| p.name == name))
    }

    fn last_block_occurrence(
        &self,
        block_type: &str,
        block_name: &str,
        name: &str,
    ) -> Option<FragmentId> {
        self.blocks
            .iter()
            .rev()
            .filter(|b| b.is(block_type, block_name))
            .find_map(|b| self.last_occurrence(&b.parameters, name))
    }

    fn replace_value(&mut self, id: FragmentId, value: String) {
        let fragment = &self.fragments[id.0];
        let Some(line) = fragment.parameter() else {
            return;
        };
        if line.value == value {
            return;
        }
        let replacement = Fragment {
            kind: LineKind::Parameter(line.with_value(value)),
            eol: fragment.eol,
        };
        self.fragments[id.0] = replacement;
    }

    fn last_fragment(&self) -> Option<FragmentId> {
        match *self.layout.last()? {
            Node::Line(id) => Some(id),
            Node::Block(b) => self.blocks[b].lines.last().copied(),
        }
    }
}

impl FromStr for ConfigDocument {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ConfigDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn split_eol(line: &str) -> (&str, LineEnding) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, LineEnding::CrLf)
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, LineEnding::Lf)
    } else {
        (line, LineEnding::None)
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Portion of a line before any comment marker outside quotes
pub(crate) fn code_part(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            COMMENT_MARKER if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Net parenthesis depth change of a comment-free span, ignoring quoted text
fn paren_balance(code: &str) -> isize {
    let mut in_quotes = false;
    let mut balance = 0;
    for c in code.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => balance += 1,
            ')' if !in_quotes => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// Split `type "name" ( rest` into its parts
fn parse_block_header(code: &str) -> Option<(&str, &str, &str)> {
    let code = code.trim_start();
    let type_end = code.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    let block_type = &code[..type_end];
    let after_type = &code[type_end..];
    let quoted = after_type.trim_start();
    if block_type.is_empty() || quoted.len() == after_type.len() {
        return None;
    }

    let name_and_rest = quoted.strip_prefix('"')?;
    let name_end = name_and_rest.find('"')?;
    let name = &name_and_rest[..name_end];
    if name.is_empty() {
        return None;
    }

    let rest = name_and_rest[name_end + 1..].trim_start().strip_prefix('(')?;
    Some((block_type, name, rest))
}
