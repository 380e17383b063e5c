//! YAML parser that builds source-tracked document streams.

use crate::{
    DocumentStream, Error, LineIndex, ParseOptions, ParsedDocument, Problem, Result, SourceInfo,
    TagKind, YamlHashEntry, YamlNode, YamlVersion,
};
use std::borrow::Cow;
use std::collections::HashMap;
use yaml_rust2::Yaml;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Parse every `---`-separated document in `content`.
///
/// Never fails: syntax errors are recorded on the document they occur in,
/// which keeps whatever structure was built up to the error. Parsing then
/// resumes at the next `---` or `...` marker line. Empty documents have no
/// root.
///
/// # Example
///
/// ```rust
/// use yamlscope_yaml::{parse_stream, ParseOptions};
///
/// let stream = parse_stream("---\nname: a\n---\nage: 1", &ParseOptions::default());
/// assert_eq!(stream.len(), 2);
/// assert!(stream.documents()[1].root().unwrap().get_hash_value("age").is_some());
/// ```
pub fn parse_stream(content: &str, options: &ParseOptions) -> DocumentStream {
    let mut builder = YamlBuilder::new(content, options);
    let mut resume = 0;

    loop {
        // Blanking what precedes `resume` keeps markers aligned with `content`.
        let text = if resume == 0 {
            Cow::Borrowed(content)
        } else {
            Cow::Owned(blank_before(content, resume))
        };
        let mut parser = Parser::new_from_str(&text);
        let Err(err) = parser.load(&mut builder, true) else {
            break;
        };
        let offset = builder.byte_offset(err.marker());
        let length = usize::from(offset < content.len());
        let document_start = builder.document_start;
        builder.fail(Problem::error(offset, length, err.info()));

        match next_document_start(content, document_start.max(resume)) {
            Some(next) if next > resume => resume = next,
            _ => break,
        }
    }

    DocumentStream::new(builder.documents)
}

/// `content` with every char before `end` other than line breaks replaced
/// by a space.
fn blank_before(content: &str, end: usize) -> String {
    content
        .char_indices()
        .map(|(at, c)| {
            if at < end && c != '\n' && c != '\r' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

/// Where parsing can restart after a syntax error in the document starting
/// at `after`: the first `---` line past it, or the line following the
/// first `...` line.
fn next_document_start(content: &str, after: usize) -> Option<usize> {
    let mut line_start = 0;
    for line in content.split_inclusive('\n') {
        let start = line_start;
        line_start += line.len();
        if start <= after {
            continue;
        }
        if is_marker_line(line, "---") {
            return Some(start);
        }
        if is_marker_line(line, "...") {
            return (line_start < content.len()).then_some(line_start);
        }
    }
    None
}

fn is_marker_line(line: &str, marker: &str) -> bool {
    line.strip_prefix(marker)
        .is_some_and(|rest| rest.chars().next().is_none_or(char::is_whitespace))
}

/// Parse the first YAML document in `content`.
///
/// # Example
///
/// ```rust
/// use yamlscope_yaml::parse;
///
/// let yaml = parse("title: My Document").unwrap();
/// assert!(yaml.is_hash());
/// ```
///
/// # Errors
///
/// Returns an error if the first document has a syntax error or if the
/// input holds no document at all.
pub fn parse(content: &str) -> Result<YamlNode> {
    let stream = parse_stream(content, &ParseOptions::default());
    let Some(doc) = stream.documents().first() else {
        return Err(Error::Empty);
    };
    if let Some(problem) = doc.errors().first() {
        let index = LineIndex::new(content);
        let loc = index.location_at(problem.offset);
        return Err(Error::ParseError {
            message: problem.message.clone(),
            location: Some(SourceInfo::new(
                problem.offset,
                problem.length,
                loc.row,
                loc.column,
            )),
        });
    }
    doc.root().cloned().ok_or(Error::Empty)
}

/// Builder that implements MarkedEventReceiver to construct document streams.
struct YamlBuilder<'a> {
    source: &'a str,
    options: &'a ParseOptions,
    line_index: LineIndex,

    /// Byte offset of every char, present only for non-ASCII input
    /// (yaml-rust2 markers count chars).
    char_offsets: Option<Vec<usize>>,

    /// Stack of collections being constructed
    stack: Vec<BuildNode>,

    /// Anchored nodes of the current document, for alias expansion
    anchors: HashMap<usize, YamlNode>,

    /// Document being built, if inside one
    current: Option<ParsedDocument>,

    /// Byte offset of the latest document start
    document_start: usize,

    documents: Vec<ParsedDocument>,
}

/// A collection being constructed during parsing.
enum BuildNode {
    Sequence {
        start: usize,
        flow: bool,
        anchor: usize,
        tag: Option<(String, SourceInfo)>,
        items: Vec<YamlNode>,
    },
    Mapping {
        start: usize,
        flow: bool,
        anchor: usize,
        tag: Option<(String, SourceInfo)>,
        entries: Vec<(YamlNode, Option<YamlNode>)>,
    },
}

impl<'a> YamlBuilder<'a> {
    fn new(source: &'a str, options: &'a ParseOptions) -> Self {
        let char_offsets = if source.is_ascii() {
            None
        } else {
            let mut offsets: Vec<usize> = source.char_indices().map(|(b, _)| b).collect();
            offsets.push(source.len());
            Some(offsets)
        };
        Self {
            source,
            options,
            line_index: LineIndex::new(source),
            char_offsets,
            stack: Vec::new(),
            anchors: HashMap::new(),
            current: None,
            document_start: 0,
            documents: Vec::new(),
        }
    }

    fn byte_offset(&self, marker: &Marker) -> usize {
        let index = marker.index();
        match &self.char_offsets {
            None => index.min(self.source.len()),
            Some(offsets) => offsets.get(index).copied().unwrap_or(self.source.len()),
        }
    }

    fn source_info(&self, offset: usize, len: usize) -> SourceInfo {
        let loc = self.line_index.location_at(offset);
        SourceInfo::new(offset, len, loc.row, loc.column)
    }

    fn rest(&self, offset: usize) -> &'a str {
        self.source.get(offset..).unwrap_or("")
    }

    fn begin_document(&mut self) {
        self.stack.clear();
        self.anchors.clear();
        self.current = Some(ParsedDocument::default());
    }

    fn finish_document(&mut self) {
        // Only non-empty after a syntax error: close what is still open.
        while let Some(frame) = self.stack.pop() {
            let node = self.complete_frame(frame, None);
            self.push_complete(node, 0);
        }
        if let Some(doc) = self.current.take() {
            self.documents.push(doc);
        }
    }

    fn fail(&mut self, problem: Problem) {
        if self.current.is_none() {
            self.begin_document();
        }
        if let Some(doc) = self.current.as_mut() {
            doc.push_error(problem);
        }
        self.finish_document();
    }

    fn warn(&mut self, problem: Problem) {
        if let Some(doc) = self.current.as_mut() {
            doc.push_warning(problem);
        }
    }

    fn push_complete(&mut self, node: YamlNode, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }

        match self.stack.last_mut() {
            None => {
                if let Some(doc) = self.current.as_mut()
                    && doc.root.is_none()
                {
                    doc.root = Some(node);
                }
            }
            Some(BuildNode::Sequence { items, .. }) => items.push(node),
            Some(BuildNode::Mapping { entries, .. }) => match entries.last_mut() {
                Some((_, value @ None)) => *value = Some(node),
                _ => entries.push((node, None)),
            },
        }
    }

    /// Skip `!tag` and `&anchor` properties in front of a node.
    ///
    /// Returns the byte offset where the node content starts and the tag in
    /// display form with its span.
    fn node_properties(
        &self,
        offset: usize,
        tag: Option<&Tag>,
    ) -> (usize, Option<(String, SourceInfo)>) {
        let mut cursor = offset;
        let mut tag_span = None;
        loop {
            let rest = self.rest(cursor);
            let Some(first) = rest.chars().next() else {
                break;
            };
            if first != '!' && first != '&' {
                break;
            }
            let token_len = rest
                .find(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']' | '{' | '}'))
                .unwrap_or(rest.len());
            if first == '!' {
                tag_span = Some(self.source_info(cursor, token_len));
            }
            let after = &rest[token_len..];
            let trimmed = after.trim_start_matches([' ', '\t']);
            cursor += token_len + (after.len() - trimmed.len());
        }

        // Scalars carry the marker of their content, so the tag sits before it.
        let tag = tag.map(|t| {
            let display = display_tag(t);
            let span = tag_span
                .or_else(|| {
                    self.source[..offset.min(self.source.len())]
                        .rfind(display.as_str())
                        .map(|at| self.source_info(at, display.len()))
                })
                .unwrap_or_else(|| self.source_info(offset, 0));
            (display, span)
        });
        (cursor, tag)
    }

    /// Record an unresolved-tag warning unless `tag` is standard or declared.
    fn check_tag(&mut self, tag: &Option<(String, SourceInfo)>, kind: TagKind) {
        let Some((name, span)) = tag else {
            return;
        };
        if name == "!" || name.starts_with("!!") || self.options.allows_tag(name, kind) {
            return;
        }
        self.warn(Problem::warning(
            span.offset,
            span.len,
            format!("Unresolved tag: {name}"),
        ));
    }

    fn scalar_len(&self, start: usize, value: &str, style: TScalarStyle) -> usize {
        let rest = self.rest(start);
        match style {
            TScalarStyle::SingleQuoted => quoted_len(rest, '\''),
            TScalarStyle::DoubleQuoted => quoted_len(rest, '"'),
            TScalarStyle::Literal | TScalarStyle::Folded => self.block_scalar_len(start),
            _ => plain_len(rest, value),
        }
    }

    /// Header line plus every following line indented deeper than the
    /// header line, trailing blank lines excluded.
    fn block_scalar_len(&self, start: usize) -> usize {
        let line_start = self.source[..start.min(self.source.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        let header_indent = indent_of(&self.source[line_start..]);

        let rest = self.rest(start);
        let mut end = rest.find('\n').unwrap_or(rest.len());
        let mut cursor = end;
        while cursor < rest.len() {
            let line_begin = cursor + 1;
            let line = &rest[line_begin.min(rest.len())..];
            let line_len = line.find('\n').unwrap_or(line.len());
            let text = &line[..line_len];
            if text.trim().is_empty() {
                cursor = line_begin + line_len;
                continue;
            }
            if indent_of(text) <= header_indent {
                break;
            }
            end = line_begin + line_len;
            cursor = end;
        }
        end
    }

    fn scalar_value(&self, value: &str, style: TScalarStyle, tag: Option<&Tag>) -> Yaml {
        if let Some(tag) = tag {
            if tag.handle == CORE_TAG_PREFIX || tag.handle == "!!" {
                return core_tagged_scalar(value, &tag.suffix);
            }
            if self.options.allows_tag(&display_tag(tag), TagKind::Scalar) {
                return Yaml::String(value.to_string());
            }
        }
        match style {
            TScalarStyle::Plain => parse_scalar_value(value, self.options.yaml_version),
            _ => Yaml::String(value.to_string()),
        }
    }

    fn complete_frame(&self, frame: BuildNode, end_marker: Option<usize>) -> YamlNode {
        match frame {
            BuildNode::Sequence {
                start,
                flow,
                tag,
                items,
                ..
            } => {
                let end = collection_end(start, flow, end_marker, items.last());
                YamlNode::new_array(self.source_info(start, end - start), items).with_tag(tag)
            }
            BuildNode::Mapping {
                start,
                flow,
                tag,
                entries,
                ..
            } => {
                let entries: Vec<YamlHashEntry> = entries
                    .into_iter()
                    .map(|(key, value)| {
                        let value = value.unwrap_or_else(|| {
                            let end = key.source_info.end_offset();
                            YamlNode::new_scalar(Yaml::Null, self.source_info(end, 0))
                        });
                        YamlHashEntry::new(key, value)
                    })
                    .collect();
                let last = entries.last().map(|e| &e.value);
                let end = collection_end(start, flow, end_marker, last);
                YamlNode::new_hash(self.source_info(start, end - start), entries).with_tag(tag)
            }
        }
    }
}

impl MarkedEventReceiver for YamlBuilder<'_> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::Nothing | Event::StreamStart | Event::StreamEnd => {}

            Event::DocumentStart => {
                self.document_start = self.byte_offset(&marker);
                self.begin_document();
            }
            Event::DocumentEnd => self.finish_document(),

            Event::Scalar(value, style, anchor, tag) => {
                let offset = self.byte_offset(&marker);
                let (start, tag_info) = self.node_properties(offset, tag.as_ref());
                self.check_tag(&tag_info, TagKind::Scalar);

                let len = self.scalar_len(start, &value, style);
                // The parser reports an empty document as a null scalar with no text
                if self.stack.is_empty() && anchor == 0 && tag_info.is_none() && len == 0 {
                    return;
                }
                let yaml = self.scalar_value(&value, style, tag.as_ref());
                let node = YamlNode::new_scalar(yaml, self.source_info(start, len)).with_tag(tag_info);
                self.push_complete(node, anchor);
            }

            Event::SequenceStart(anchor, tag) => {
                let offset = self.byte_offset(&marker);
                let (start, tag_info) = self.node_properties(offset, tag.as_ref());
                self.check_tag(&tag_info, TagKind::Sequence);
                self.stack.push(BuildNode::Sequence {
                    start,
                    flow: self.rest(start).starts_with('['),
                    anchor,
                    tag: tag_info,
                    items: Vec::new(),
                });
            }

            Event::MappingStart(anchor, tag) => {
                let offset = self.byte_offset(&marker);
                let (start, tag_info) = self.node_properties(offset, tag.as_ref());
                self.check_tag(&tag_info, TagKind::Mapping);
                self.stack.push(BuildNode::Mapping {
                    start,
                    flow: self.rest(start).starts_with('{'),
                    anchor,
                    tag: tag_info,
                    entries: Vec::new(),
                });
            }

            Event::SequenceEnd | Event::MappingEnd => {
                let Some(frame) = self.stack.pop() else {
                    return;
                };
                let anchor = match &frame {
                    BuildNode::Sequence { anchor, .. } | BuildNode::Mapping { anchor, .. } => *anchor,
                };
                let end = self.byte_offset(&marker);
                let node = self.complete_frame(frame, Some(end));
                self.push_complete(node, anchor);
            }

            Event::Alias(anchor) => {
                let offset = self.byte_offset(&marker);
                let rest = self.rest(offset);
                let len = rest
                    .find(|c: char| c.is_whitespace() || matches!(c, ',' | ']' | '}'))
                    .unwrap_or(rest.len());
                let info = self.source_info(offset, len);
                let node = match self.anchors.get(&anchor) {
                    Some(target) => {
                        let mut node = target.clone();
                        node.source_info = info;
                        node
                    }
                    None => YamlNode::new_scalar(Yaml::Null, info),
                };
                self.push_complete(node, 0);
            }
        }
    }
}

fn display_tag(tag: &Tag) -> String {
    if tag.handle == CORE_TAG_PREFIX {
        format!("!!{}", tag.suffix)
    } else {
        format!("{}{}", tag.handle, tag.suffix)
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn collection_end(
    start: usize,
    flow: bool,
    end_marker: Option<usize>,
    last: Option<&YamlNode>,
) -> usize {
    let last_end = last.map_or(start, |n| n.source_info.end_offset());
    match end_marker {
        Some(end) if flow => (end + 1).max(last_end),
        _ => last_end.max(start),
    }
}

/// Length of a quoted scalar including both quotes.
fn quoted_len(rest: &str, quote: char) -> usize {
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.peek().is_some_and(|&(_, n)| n == '\'') {
                chars.next();
                continue;
            }
            return i + 1;
        }
    }
    rest.len()
}

/// Length of a plain scalar, following its words across line folds.
fn plain_len(rest: &str, value: &str) -> usize {
    if rest.starts_with(value) {
        return value.len();
    }
    let mut words = value.split(' ').filter(|w| !w.is_empty());
    let Some(first) = words.next() else {
        return 0;
    };
    if !rest.starts_with(first) {
        return 0;
    }
    let mut cursor = first.len();
    for word in words {
        match rest[cursor..].find(word) {
            Some(pos) => cursor += pos + word.len(),
            None => break,
        }
    }
    cursor
}

fn core_tagged_scalar(value: &str, suffix: &str) -> Yaml {
    match suffix {
        "null" => Yaml::Null,
        "bool" => match value {
            "true" | "True" | "TRUE" => Yaml::Boolean(true),
            "false" | "False" | "FALSE" => Yaml::Boolean(false),
            _ => Yaml::String(value.to_string()),
        },
        "int" => parse_int(value).map_or_else(|| Yaml::String(value.to_string()), Yaml::Integer),
        "float" => Yaml::Real(value.to_string()),
        _ => Yaml::String(value.to_string()),
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn is_float(value: &str) -> bool {
    match value {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf" | "-.INF"
        | ".nan" | ".NaN" | ".NAN" => return true,
        _ => {}
    }
    value.bytes().any(|b| b.is_ascii_digit())
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && value.parse::<f64>().is_ok()
}

/// Resolve a plain scalar to its typed value.
fn parse_scalar_value(value: &str, version: YamlVersion) -> Yaml {
    match value {
        "null" | "Null" | "NULL" | "~" | "" => return Yaml::Null,
        "true" | "True" | "TRUE" => return Yaml::Boolean(true),
        "false" | "False" | "FALSE" => return Yaml::Boolean(false),
        _ => {}
    }

    if version == YamlVersion::V1_1 {
        match value {
            "yes" | "Yes" | "YES" | "on" | "On" | "ON" => return Yaml::Boolean(true),
            "no" | "No" | "NO" | "off" | "Off" | "OFF" => return Yaml::Boolean(false),
            _ => {}
        }
    }

    if let Some(i) = parse_int(value) {
        return Yaml::Integer(i);
    }

    if is_float(value) {
        return Yaml::Real(value.to_string());
    }

    Yaml::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeKind, ProblemSeverity};

    fn stream(content: &str) -> DocumentStream {
        parse_stream(content, &ParseOptions::default())
    }

    #[test]
    fn test_parse_scalar() {
        let yaml = parse("hello").unwrap();
        assert!(yaml.is_scalar());
        assert_eq!(yaml.yaml.as_str(), Some("hello"));
        assert_eq!(yaml.source_info.len, 5);
    }

    #[test]
    fn test_parse_integer_and_float() {
        assert_eq!(parse("42").unwrap().yaml.as_i64(), Some(42));
        assert_eq!(parse("0x1f").unwrap().yaml.as_i64(), Some(31));
        assert_eq!(parse("1.5").unwrap().kind(), NodeKind::Number);
        assert_eq!(parse("inf").unwrap().kind(), NodeKind::String);
        assert_eq!(parse(".inf").unwrap().kind(), NodeKind::Number);
    }

    #[test]
    fn test_booleans_depend_on_version() {
        assert_eq!(parse("true").unwrap().yaml.as_bool(), Some(true));
        assert_eq!(parse("yes").unwrap().yaml.as_str(), Some("yes"));

        let opts = ParseOptions {
            yaml_version: YamlVersion::V1_1,
            ..Default::default()
        };
        let stream = parse_stream("yes", &opts);
        let root = stream.documents()[0].root().unwrap();
        assert_eq!(root.yaml.as_bool(), Some(true));
    }

    #[test]
    fn test_quoted_scalars_stay_strings() {
        let yaml = parse("a: \"42\"\nb: 'it''s'").unwrap();
        let a = yaml.get_hash_value("a").unwrap();
        assert_eq!(a.yaml.as_str(), Some("42"));
        assert_eq!(a.source_info.offset, 3);
        assert_eq!(a.source_info.len, 4);

        let b = yaml.get_hash_value("b").unwrap();
        assert_eq!(b.yaml.as_str(), Some("it's"));
        assert_eq!(b.source_info.len, 7);
    }

    #[test]
    fn test_parse_hash_offsets() {
        let yaml = parse("title: My Document\nauthor: John Doe").unwrap();
        assert!(yaml.is_hash());
        assert_eq!(yaml.len(), 2);

        let author = yaml.get_hash_entry("author").unwrap();
        assert_eq!(author.key.source_info.offset, 19);
        assert_eq!(author.key.source_info.row, 1);
        assert_eq!(author.value.source_info.offset, 27);
        assert_eq!(author.value.source_info.len, 8);
        assert_eq!(yaml.source_info.end_offset(), 35);
    }

    #[test]
    fn test_flow_collections_span_brackets() {
        let yaml = parse("[1, 2, 3]").unwrap();
        assert!(yaml.is_array());
        assert_eq!(yaml.len(), 3);
        assert_eq!(yaml.source_info.offset, 0);
        assert_eq!(yaml.source_info.len, 9);

        let yaml = parse("{a: 1}").unwrap();
        assert_eq!(yaml.source_info.len, 6);
    }

    #[test]
    fn test_nested_structure() {
        let yaml = parse(
            r#"
project:
  title: My Project
  authors:
    - Alice
    - Bob
"#,
        )
        .unwrap();

        let project = yaml.get_hash_value("project").unwrap();
        let authors = project.get_hash_value("authors").unwrap();
        assert!(authors.is_array());
        assert_eq!(authors.len(), 2);
        assert_eq!(authors.get_array_item(1).unwrap().source_info.row, 5);
    }

    #[test]
    fn test_empty_value_is_null() {
        let yaml = parse("a:\nb: 1").unwrap();
        let a = yaml.get_hash_value("a").unwrap();
        assert_eq!(a.kind(), NodeKind::Null);
        assert_eq!(a.source_info.len, 0);
    }

    #[test]
    fn test_multi_document_stream() {
        let stream = stream("---\nname: a\n---\nage: 1");
        assert_eq!(stream.len(), 2);
        let second = stream.documents()[1].root().unwrap();
        assert_eq!(second.source_info.offset, 16);
        assert_eq!(stream.document_at_offset(17).unwrap().0, 1);
        assert_eq!(stream.document_at_offset(5).unwrap().0, 0);
    }

    #[test]
    fn test_parsing_resumes_after_syntax_error() {
        let stream = stream("p: x\n---\np: [\n---\np: y\n");
        assert_eq!(stream.len(), 3);
        assert!(stream.documents()[0].errors().is_empty());
        assert_eq!(stream.documents()[1].errors().len(), 1);

        let last = &stream.documents()[2];
        assert!(last.errors().is_empty());
        let p = last.root().unwrap().get_hash_value("p").unwrap();
        assert_eq!(p.yaml.as_str(), Some("y"));
        assert_eq!(p.source_info.offset, 21);
        assert_eq!(p.source_info.row, 4);
    }

    #[test]
    fn test_resume_after_document_end_marker() {
        let stream = stream("a: {\n...\nb: 1\n");
        let last = stream.documents().last().unwrap();
        assert!(last.errors().is_empty());
        assert_eq!(last.root().unwrap().get_hash_value("b").unwrap().yaml.as_i64(), Some(1));
    }

    #[test]
    fn test_next_document_start() {
        let content = "a: 1\n--- x\n----\n...\nb";
        assert_eq!(next_document_start(content, 0), Some(5));
        assert_eq!(next_document_start(content, 5), Some(20));
        assert_eq!(next_document_start("a\n...\n", 0), None);
    }

    #[test]
    fn test_empty_documents_have_no_root() {
        let stream = stream("---\n---\n");
        assert_eq!(stream.len(), 2);
        assert!(stream.iter().all(|doc| doc.root().is_none()));
        assert!(parse("---").is_err());
        assert_eq!(parse("~").unwrap().kind(), NodeKind::Null);
    }

    #[test]
    fn test_syntax_error_keeps_earlier_documents() {
        let stream = stream("a: 1\n---\nb: [1, 2\n");
        assert_eq!(stream.len(), 2);
        assert!(stream.documents()[0].errors().is_empty());
        let broken = &stream.documents()[1];
        assert_eq!(broken.errors().len(), 1);
        assert_eq!(broken.errors()[0].severity, ProblemSeverity::Error);
    }

    #[test]
    fn test_parse_reports_error() {
        let err = parse("key: [unclosed").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
        assert!(err.location().is_some());
        assert_eq!(parse("").unwrap_err(), Error::Empty);
    }

    #[test]
    fn test_unknown_tag_warns() {
        let stream = stream("a: !Ref foo\n");
        let doc = &stream.documents()[0];
        assert_eq!(doc.warnings().len(), 1);
        assert_eq!(doc.warnings()[0].message, "Unresolved tag: !Ref");
        assert_eq!(doc.warnings()[0].offset, 3);

        let value = doc.root().unwrap().get_hash_value("a").unwrap();
        assert_eq!(value.yaml.as_str(), Some("foo"));
        assert_eq!(value.source_info.offset, 8);
    }

    #[test]
    fn test_declared_tag_is_silent() {
        let opts = ParseOptions::from_settings(&["!Ref sequence", "!Test"], YamlVersion::V1_2);
        let stream = parse_stream("a: !Ref [x]\nb: !Test 12\n", &opts);
        let doc = &stream.documents()[0];
        assert!(doc.warnings().is_empty());
        let b = doc.root().unwrap().get_hash_value("b").unwrap();
        assert_eq!(b.yaml.as_str(), Some("12"));
        assert_eq!(b.tag.as_ref().unwrap().0, "!Test");
    }

    #[test]
    fn test_core_str_tag_forces_string() {
        let yaml = parse("a: !!str 12").unwrap();
        let a = yaml.get_hash_value("a").unwrap();
        assert_eq!(a.yaml.as_str(), Some("12"));
    }

    #[test]
    fn test_alias_expands_anchor() {
        let yaml = parse("base: &b {x: 1}\nother: *b").unwrap();
        let other = yaml.get_hash_value("other").unwrap();
        assert!(other.is_hash());
        assert_eq!(other.source_info.offset, 23);
        assert_eq!(other.source_info.len, 2);
    }

    #[test]
    fn test_non_ascii_offsets_are_bytes() {
        let yaml = parse("é: ü\nk: v").unwrap();
        let k = yaml.get_hash_entry("k").unwrap();
        assert_eq!(k.key.source_info.offset, 7);
        assert_eq!(k.value.source_info.offset, 10);
    }

    #[test]
    fn test_block_scalar_span() {
        let text = "a: |\n  one\n  two\nb: 1\n";
        let yaml = parse(text).unwrap();
        let a = yaml.get_hash_value("a").unwrap();
        assert_eq!(a.yaml.as_str(), Some("one\ntwo\n"));
        assert_eq!(&text[a.source_info.offset..a.source_info.end_offset()], "|\n  one\n  two");
    }
}
