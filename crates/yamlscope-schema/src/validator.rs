//! Structural validation and schema matching.

use crate::problem::{ProblemKind, ValidationProblem};
use crate::resolver::ResolvedSchema;
use crate::tree::{Keyword, NodeId, SchemaNode, SchemaTree};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use yamlscope_yaml::{DocumentStream, NodeKind, ParsedDocument, YamlHashEntry, YamlNode};

/// Knobs for one validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Rank `anyOf`/`oneOf` alternatives by matched properties first.
    pub kubernetes: bool,
}

/// A schema node that structurally applies to a document node.
#[derive(Debug, Clone, Copy)]
pub struct MatchedSchema<'d> {
    pub node: &'d YamlNode,
    pub schema: NodeId,
    /// Found under a `not`; describes what the value must not be.
    pub inverted: bool,
}

/// Validates one document against `schema_node` of a resolved schema
pub fn validate(
    document: &ParsedDocument,
    schema: &ResolvedSchema,
    schema_node: NodeId,
    options: ValidationOptions,
) -> Vec<ValidationProblem> {
    let Some(root) = document.root() else {
        return Vec::new();
    };
    let mut context = ValidationContext::new(schema.tree(), options);
    let mut result = ValidationResult::default();
    let mut collector = Collector::noop();
    validate_node(root, Parent::None, schema_node, &mut context, &mut result, &mut collector);
    result.problems
}

/// Validates every document of a stream, aligning document `i` with
/// `schemaSequence[i]` when the schema declares one
pub fn validate_stream(
    stream: &DocumentStream,
    schema: &ResolvedSchema,
    options: ValidationOptions,
) -> Vec<Vec<ValidationProblem>> {
    stream
        .iter()
        .enumerate()
        .map(|(index, document)| {
            validate(document, schema, schema.schema_for_document(index), options)
        })
        .collect()
}

/// Every `(node, schema)` pair that applies while validating `document`.
///
/// With an `offset`, only nodes whose range contains it (end inclusive)
/// are walked and reported.
pub fn matching_schemas<'d>(
    document: &'d ParsedDocument,
    schema: &ResolvedSchema,
    schema_node: NodeId,
    offset: Option<usize>,
    options: ValidationOptions,
) -> Vec<MatchedSchema<'d>> {
    let Some(root) = document.root() else {
        return Vec::new();
    };
    let mut context = ValidationContext::new(schema.tree(), options);
    let mut result = ValidationResult::default();
    let mut collector = Collector::new(offset);
    validate_node(root, Parent::None, schema_node, &mut context, &mut result, &mut collector);
    collector.matches
}

/// Validation context tracks state during validation
struct ValidationContext<'t> {
    tree: &'t SchemaTree,
    options: ValidationOptions,
    regexes: HashMap<String, Option<Regex>>,
    /// `(node address, schema)` pairs currently on the stack. Re-entering
    /// one means the schema graph is cyclic at this node; it is skipped.
    active: HashSet<(usize, NodeId)>,
}

impl<'t> ValidationContext<'t> {
    fn new(tree: &'t SchemaTree, options: ValidationOptions) -> Self {
        Self {
            tree,
            options,
            regexes: HashMap::new(),
            active: HashSet::new(),
        }
    }

    fn regex(&mut self, pattern: &str) -> Option<Regex> {
        self.regexes
            .entry(pattern.to_string())
            .or_insert_with(|| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    debug!(pattern, error = %err, "skipping schema pattern that does not compile");
                    None
                }
            })
            .clone()
    }

    fn error_message(&self, schema: NodeId) -> Option<&'t str> {
        self.tree.str_value(schema, "errorMessage")
    }

    fn usize_value(&self, schema: NodeId, name: &str) -> Option<usize> {
        self.tree
            .value(schema, name)?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
    }

    fn f64_value(&self, schema: NodeId, name: &str) -> Option<f64> {
        self.tree.value(schema, name)?.as_f64()
    }

    fn compare(&self, a: &ValidationResult, b: &ValidationResult) -> Ordering {
        if self.options.kubernetes {
            a.compare_kubernetes(b)
        } else {
            a.compare(b)
        }
    }
}

/// Outcome of validating one node against one schema, with the counters
/// used to pick the best `anyOf`/`oneOf` alternative.
#[derive(Debug, Default)]
struct ValidationResult {
    problems: Vec<ValidationProblem>,
    properties_matches: usize,
    properties_value_matches: usize,
    primary_value_matches: usize,
    enum_value_match: bool,
    enum_values: Option<Vec<Value>>,
}

impl ValidationResult {
    fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    fn push(&mut self, problem: ValidationProblem) {
        self.problems.push(problem);
    }

    /// Take over the problems and property counters of a subschema result.
    fn merge(&mut self, other: ValidationResult) {
        self.problems.extend(other.problems);
        self.properties_matches += other.properties_matches;
        self.properties_value_matches += other.properties_value_matches;
    }

    fn merge_property_match(&mut self, other: ValidationResult) {
        self.properties_matches += 1;
        if other.enum_value_match || (!other.has_problems() && other.properties_matches > 0) {
            self.properties_value_matches += 1;
        }
        if other.enum_value_match && other.enum_values.as_ref().is_some_and(|v| v.len() == 1) {
            self.primary_value_matches += 1;
        }
        self.problems.extend(other.problems);
    }

    /// Two equally good alternatives that both missed their enum report the
    /// union of allowed values.
    fn merge_enum_values(&mut self, other: &ValidationResult) {
        if self.enum_value_match || other.enum_value_match {
            return;
        }
        let (Some(mine), Some(theirs)) = (&mut self.enum_values, &other.enum_values) else {
            return;
        };
        mine.extend(theirs.iter().cloned());
        let allowed = mine.clone();
        for problem in &mut self.problems {
            if let ProblemKind::EnumMismatch { .. } = problem.kind {
                problem.kind = ProblemKind::EnumMismatch {
                    allowed: allowed.clone(),
                };
                problem.message = problem.kind.message();
            }
        }
    }

    fn compare(&self, other: &ValidationResult) -> Ordering {
        let has_problems = self.has_problems();
        if has_problems != other.has_problems() {
            return if has_problems { Ordering::Less } else { Ordering::Greater };
        }
        if self.enum_value_match != other.enum_value_match {
            return if other.enum_value_match { Ordering::Less } else { Ordering::Greater };
        }
        self.primary_value_matches
            .cmp(&other.primary_value_matches)
            .then(self.properties_value_matches.cmp(&other.properties_value_matches))
            .then(self.properties_matches.cmp(&other.properties_matches))
    }

    fn compare_kubernetes(&self, other: &ValidationResult) -> Ordering {
        if self.properties_matches != other.properties_matches {
            return self.properties_matches.cmp(&other.properties_matches);
        }
        if self.enum_value_match != other.enum_value_match {
            return if other.enum_value_match { Ordering::Less } else { Ordering::Greater };
        }
        let has_problems = self.has_problems();
        self.primary_value_matches
            .cmp(&other.primary_value_matches)
            .then(self.properties_value_matches.cmp(&other.properties_value_matches))
            .then_with(|| match (has_problems, other.has_problems()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            })
    }
}

/// Gathers matched schemas, limited to nodes around a focus offset.
struct Collector<'d> {
    focus: Option<usize>,
    enabled: bool,
    matches: Vec<MatchedSchema<'d>>,
}

impl<'d> Collector<'d> {
    fn new(focus: Option<usize>) -> Self {
        Self {
            focus,
            enabled: true,
            matches: Vec::new(),
        }
    }

    fn noop() -> Self {
        Self {
            focus: None,
            enabled: false,
            matches: Vec::new(),
        }
    }

    fn sub(&self) -> Self {
        Self {
            focus: self.focus,
            enabled: self.enabled,
            matches: Vec::new(),
        }
    }

    fn include(&self, node: &YamlNode) -> bool {
        self.focus.is_none_or(|offset| node.contains(offset))
    }

    fn add(&mut self, matched: MatchedSchema<'d>) {
        if self.enabled {
            self.matches.push(matched);
        }
    }

    fn merge(&mut self, other: Collector<'d>) {
        self.matches.extend(other.matches);
    }
}

/// What a node hangs off, for problem locations.
#[derive(Clone, Copy)]
enum Parent<'d> {
    None,
    Entry(&'d YamlHashEntry),
    Item(&'d YamlNode),
}

fn problem_at(node: &YamlNode, kind: ProblemKind) -> ValidationProblem {
    ValidationProblem::new(node.source_info.offset, node.source_info.len, kind)
}

fn validate_node<'d>(
    node: &'d YamlNode,
    parent: Parent<'d>,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    if !collector.include(node) {
        return;
    }
    let key = (node as *const YamlNode as usize, schema);
    if !context.active.insert(key) {
        return;
    }

    let tree = context.tree;
    match tree.node(schema) {
        SchemaNode::Bool(false) => result.push(problem_at(node, ProblemKind::MatchesNot)),
        SchemaNode::Bool(true) | SchemaNode::Literal(_) => {}
        SchemaNode::Object(_) => {
            validate_keywords(node, parent, schema, context, result, collector);
            match node.kind() {
                NodeKind::Object => validate_object(node, parent, schema, context, result, collector),
                NodeKind::Array => validate_array(node, schema, context, result, collector),
                NodeKind::String => validate_string(node, schema, context, result),
                NodeKind::Integer | NodeKind::Number => validate_number(node, schema, context, result),
                NodeKind::Null | NodeKind::Boolean => {}
            }
        }
    }

    context.active.remove(&key);
    collector.add(MatchedSchema {
        node,
        schema,
        inverted: false,
    });
}

fn matches_type(node: &YamlNode, expected: &str) -> bool {
    let kind = node.kind();
    match expected {
        "number" => matches!(kind, NodeKind::Integer | NodeKind::Number),
        "integer" => {
            kind == NodeKind::Integer
                || (kind == NodeKind::Number && node.as_f64().is_some_and(|n| n.fract() == 0.0))
        }
        other => kind.type_name() == other,
    }
}

/// Keywords that apply to every node kind.
fn validate_keywords<'d>(
    node: &'d YamlNode,
    parent: Parent<'d>,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    let tree = context.tree;

    let expected: Option<Vec<String>> = match tree.value(schema, "type") {
        Some(Value::String(single)) => Some(vec![single.clone()]),
        Some(Value::Array(types)) => Some(
            types
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    };
    if let Some(expected) = expected
        && !expected.iter().any(|t| matches_type(node, t))
    {
        result.push(
            problem_at(node, ProblemKind::TypeMismatch { expected })
                .with_message(context.error_message(schema)),
        );
    }

    if let Some(all_of) = tree.keyword(schema, "allOf").and_then(Keyword::as_list) {
        for &sub in all_of {
            validate_node(node, parent, sub, context, result, collector);
        }
    }

    if let Some(not) = tree.schema(schema, "not") {
        let mut sub_result = ValidationResult::default();
        let mut sub_collector = collector.sub();
        validate_node(node, parent, not, context, &mut sub_result, &mut sub_collector);
        if !sub_result.has_problems() {
            result.push(problem_at(node, ProblemKind::MatchesNot));
        }
        for mut matched in sub_collector.matches {
            matched.inverted = !matched.inverted;
            collector.add(matched);
        }
    }

    if let Some(any_of) = tree.keyword(schema, "anyOf").and_then(Keyword::as_list) {
        test_alternatives(node, parent, any_of, false, context, result, collector);
    }
    if let Some(one_of) = tree.keyword(schema, "oneOf").and_then(Keyword::as_list) {
        test_alternatives(node, parent, one_of, true, context, result, collector);
    }

    if let Some(condition) = tree.schema(schema, "if") {
        let mut sub_result = ValidationResult::default();
        let mut sub_collector = collector.sub();
        validate_node(node, parent, condition, context, &mut sub_result, &mut sub_collector);
        collector.merge(sub_collector);
        let branch = if sub_result.has_problems() {
            tree.schema(schema, "else")
        } else {
            tree.schema(schema, "then")
        };
        if let Some(branch) = branch {
            let mut branch_result = ValidationResult::default();
            let mut branch_collector = collector.sub();
            validate_node(node, parent, branch, context, &mut branch_result, &mut branch_collector);
            result.merge(branch_result);
            collector.merge(branch_collector);
        }
    }

    if let Some(Value::Array(allowed)) = tree.value(schema, "enum") {
        let value = node.to_json();
        let matched = allowed.iter().any(|candidate| json_equals(&value, candidate));
        result.enum_values = Some(allowed.clone());
        result.enum_value_match = matched;
        if !matched {
            result.push(
                problem_at(
                    node,
                    ProblemKind::EnumMismatch {
                        allowed: allowed.clone(),
                    },
                )
                .with_message(context.error_message(schema)),
            );
        }
    }

    if let Some(expected) = tree.value(schema, "const") {
        let matched = json_equals(&node.to_json(), expected);
        if !matched {
            result.push(
                problem_at(
                    node,
                    ProblemKind::ConstMismatch {
                        expected: expected.clone(),
                    },
                )
                .with_message(context.error_message(schema)),
            );
        }
        result.enum_value_match = matched;
        result.enum_values = Some(vec![expected.clone()]);
    }

    if let Some(message) = tree.str_value(schema, "deprecationMessage") {
        let span = match parent {
            Parent::Entry(entry) => Some(entry.entry_span),
            Parent::Item(array) => Some(array.source_info),
            Parent::None => None,
        };
        if let Some(span) = span {
            result.push(ValidationProblem::new(
                span.offset,
                span.len,
                ProblemKind::Deprecated {
                    message: message.to_string(),
                },
            ));
        }
    }
}

/// Validates `anyOf` (`max_one_match == false`) or `oneOf`, keeping the
/// problems and matches of the best alternative
fn test_alternatives<'d>(
    node: &'d YamlNode,
    parent: Parent<'d>,
    alternatives: &[NodeId],
    max_one_match: bool,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    let mut matches = 0;
    let mut best: Option<(ValidationResult, Collector<'d>)> = None;

    for &alternative in alternatives {
        let mut sub_result = ValidationResult::default();
        let mut sub_collector = collector.sub();
        validate_node(node, parent, alternative, context, &mut sub_result, &mut sub_collector);
        if !sub_result.has_problems() {
            matches += 1;
        }

        best = Some(match best.take() {
            None => (sub_result, sub_collector),
            Some((mut best_result, mut best_collector)) => {
                if !max_one_match && !sub_result.has_problems() && !best_result.has_problems() {
                    best_collector.merge(sub_collector);
                    best_result.properties_matches += sub_result.properties_matches;
                    best_result.properties_value_matches += sub_result.properties_value_matches;
                    (best_result, best_collector)
                } else {
                    match context.compare(&sub_result, &best_result) {
                        Ordering::Greater => (sub_result, sub_collector),
                        Ordering::Equal => {
                            best_collector.merge(sub_collector);
                            best_result.merge_enum_values(&sub_result);
                            (best_result, best_collector)
                        }
                        Ordering::Less => (best_result, best_collector),
                    }
                }
            }
        });
    }

    if matches > 1 && max_one_match {
        result.push(ValidationProblem::new(
            node.source_info.offset,
            1,
            ProblemKind::MultipleOneOfMatches,
        ));
    }
    if let Some((best_result, best_collector)) = best {
        result.merge(best_result);
        collector.merge(best_collector);
    }
}

fn validate_object<'d>(
    node: &'d YamlNode,
    parent: Parent<'d>,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    let tree = context.tree;
    let entries = node.as_hash().unwrap_or_default();

    let mut seen: HashMap<String, &'d YamlHashEntry> = HashMap::new();
    let mut unprocessed: Vec<String> = Vec::new();
    for entry in entries {
        if let Some(key) = entry.key.key_text() {
            seen.insert(key.to_string(), entry);
            unprocessed.push(key.into_owned());
        }
    }

    if let Some(Value::Array(required)) = tree.value(schema, "required") {
        for property in required.iter().filter_map(Value::as_str) {
            if seen.contains_key(property) {
                continue;
            }
            let (offset, length) = match parent {
                Parent::Entry(entry) => (entry.key.source_info.offset, entry.key.source_info.len),
                _ => (node.source_info.offset, 1),
            };
            result.push(ValidationProblem::new(
                offset,
                length,
                ProblemKind::MissingProperty {
                    property: property.to_string(),
                },
            ));
        }
    }

    if let Some(properties) = tree.keyword(schema, "properties").and_then(Keyword::as_map) {
        for (name, &property_schema) in properties {
            unprocessed.retain(|key| key != name);
            if let Some(&entry) = seen.get(name.as_str()) {
                validate_property(entry, name, property_schema, schema, context, result, collector);
            }
        }
    }

    if let Some(patterns) = tree
        .keyword(schema, "patternProperties")
        .and_then(Keyword::as_map)
    {
        for (pattern, &property_schema) in patterns {
            let Some(regex) = context.regex(pattern) else {
                continue;
            };
            for name in unprocessed.clone() {
                if !regex.is_match(&name) {
                    continue;
                }
                unprocessed.retain(|key| key != &name);
                if let Some(&entry) = seen.get(name.as_str()) {
                    validate_property(entry, &name, property_schema, schema, context, result, collector);
                }
            }
        }
    }

    if let Some(additional) = tree.schema(schema, "additionalProperties") {
        match tree.node(additional) {
            SchemaNode::Object(_) => {
                for name in &unprocessed {
                    if let Some(&entry) = seen.get(name.as_str()) {
                        let mut property_result = ValidationResult::default();
                        validate_node(
                            &entry.value,
                            Parent::Entry(entry),
                            additional,
                            context,
                            &mut property_result,
                            collector,
                        );
                        result.merge_property_match(property_result);
                    }
                }
            }
            SchemaNode::Bool(false) => {
                for name in &unprocessed {
                    if let Some(&entry) = seen.get(name.as_str()) {
                        result.push(
                            problem_at(
                                &entry.key,
                                ProblemKind::PropertyNotAllowed {
                                    property: name.clone(),
                                },
                            )
                            .with_message(context.error_message(schema)),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(limit) = context.usize_value(schema, "maxProperties")
        && entries.len() > limit
    {
        result.push(problem_at(node, ProblemKind::TooManyProperties { limit }));
    }
    if let Some(limit) = context.usize_value(schema, "minProperties")
        && entries.len() < limit
    {
        result.push(problem_at(node, ProblemKind::TooFewProperties { limit }));
    }

    if let Some(dependencies) = tree.keyword(schema, "dependencies").and_then(Keyword::as_map) {
        for (key, &dependency) in dependencies {
            if !seen.contains_key(key.as_str()) {
                continue;
            }
            match tree.node(dependency) {
                SchemaNode::Literal(Value::Array(required)) => {
                    for property in required.iter().filter_map(Value::as_str) {
                        if seen.contains_key(property) {
                            result.properties_value_matches += 1;
                        } else {
                            result.push(problem_at(
                                node,
                                ProblemKind::MissingDependency {
                                    property: property.to_string(),
                                    required_by: key.clone(),
                                },
                            ));
                        }
                    }
                }
                SchemaNode::Object(_) | SchemaNode::Bool(_) => {
                    let mut dependency_result = ValidationResult::default();
                    validate_node(node, parent, dependency, context, &mut dependency_result, collector);
                    result.merge_property_match(dependency_result);
                }
                SchemaNode::Literal(_) => {}
            }
        }
    }

    if let Some(names) = tree.schema(schema, "propertyNames") {
        let mut noop = Collector::noop();
        for entry in entries {
            validate_node(&entry.key, Parent::Entry(entry), names, context, result, &mut noop);
        }
    }
}

fn validate_property<'d>(
    entry: &'d YamlHashEntry,
    name: &str,
    property_schema: NodeId,
    owner: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    let tree = context.tree;
    match tree.node(property_schema) {
        SchemaNode::Bool(false) => result.push(
            problem_at(
                &entry.key,
                ProblemKind::PropertyNotAllowed {
                    property: name.to_string(),
                },
            )
            .with_message(context.error_message(owner)),
        ),
        SchemaNode::Bool(true) => {
            result.properties_matches += 1;
            result.properties_value_matches += 1;
        }
        _ => {
            let mut property_result = ValidationResult::default();
            validate_node(
                &entry.value,
                Parent::Entry(entry),
                property_schema,
                context,
                &mut property_result,
                collector,
            );
            result.merge_property_match(property_result);
        }
    }
}

fn validate_array<'d>(
    node: &'d YamlNode,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
    collector: &mut Collector<'d>,
) {
    let tree = context.tree;
    let items = node.as_array().unwrap_or_default();

    match tree.keyword(schema, "items") {
        Some(Keyword::SchemaList(tuple)) => {
            for (item, &item_schema) in items.iter().zip(tuple) {
                let mut item_result = ValidationResult::default();
                validate_node(item, Parent::Item(node), item_schema, context, &mut item_result, collector);
                result.merge_property_match(item_result);
            }
            if items.len() > tuple.len()
                && let Some(additional) = tree.schema(schema, "additionalItems")
            {
                match tree.node(additional) {
                    SchemaNode::Object(_) => {
                        for item in &items[tuple.len()..] {
                            let mut item_result = ValidationResult::default();
                            validate_node(item, Parent::Item(node), additional, context, &mut item_result, collector);
                            result.merge_property_match(item_result);
                        }
                    }
                    SchemaNode::Bool(false) => result.push(problem_at(
                        node,
                        ProblemKind::TooManyTupleItems { limit: tuple.len() },
                    )),
                    _ => {}
                }
            }
        }
        Some(Keyword::Schema(item_schema)) => {
            for item in items {
                let mut item_result = ValidationResult::default();
                validate_node(item, Parent::Item(node), *item_schema, context, &mut item_result, collector);
                result.merge_property_match(item_result);
            }
        }
        _ => {}
    }

    if let Some(contains) = tree.schema(schema, "contains") {
        let found = items.iter().any(|item| {
            let mut item_result = ValidationResult::default();
            let mut noop = Collector::noop();
            validate_node(item, Parent::Item(node), contains, context, &mut item_result, &mut noop);
            !item_result.has_problems()
        });
        if !found {
            result.push(problem_at(node, ProblemKind::MissingContainedItem));
        }
    }

    if let Some(limit) = context.usize_value(schema, "minItems")
        && items.len() < limit
    {
        result.push(problem_at(node, ProblemKind::TooFewItems { limit }));
    }
    if let Some(limit) = context.usize_value(schema, "maxItems")
        && items.len() > limit
    {
        result.push(problem_at(node, ProblemKind::TooManyItems { limit }));
    }

    if tree.value(schema, "uniqueItems") == Some(&Value::Bool(true)) {
        let values: Vec<Value> = items.iter().map(YamlNode::to_json).collect();
        let duplicated = values
            .iter()
            .enumerate()
            .any(|(i, a)| values[i + 1..].iter().any(|b| json_equals(a, b)));
        if duplicated {
            result.push(problem_at(node, ProblemKind::DuplicateItems));
        }
    }
}

fn validate_string(
    node: &YamlNode,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
) {
    let Some(text) = node.yaml.as_str() else {
        return;
    };
    let length = text.chars().count();

    if let Some(limit) = context.usize_value(schema, "minLength")
        && length < limit
    {
        result.push(problem_at(node, ProblemKind::StringTooShort { limit }));
    }
    if let Some(limit) = context.usize_value(schema, "maxLength")
        && length > limit
    {
        result.push(problem_at(node, ProblemKind::StringTooLong { limit }));
    }

    let tree = context.tree;
    if let Some(pattern) = tree.str_value(schema, "pattern")
        && let Some(regex) = context.regex(pattern)
        && !regex.is_match(text)
    {
        let message = tree
            .str_value(schema, "patternErrorMessage")
            .or_else(|| context.error_message(schema));
        result.push(
            problem_at(
                node,
                ProblemKind::PatternMismatch {
                    pattern: pattern.to_string(),
                },
            )
            .with_message(message),
        );
    }
}

fn validate_number(
    node: &YamlNode,
    schema: NodeId,
    context: &mut ValidationContext<'_>,
    result: &mut ValidationResult,
) {
    let Some(value) = node.as_f64() else {
        return;
    };
    let tree = context.tree;

    if let Some(divisor) = context.f64_value(schema, "multipleOf")
        && divisor != 0.0
        && !is_multiple_of(value, divisor)
    {
        result.push(problem_at(node, ProblemKind::NotMultipleOf { divisor }));
    }

    // Draft-4 booleans turn `minimum`/`maximum` exclusive; later drafts
    // carry the limit in the `exclusive*` keyword itself.
    let bounds = |limit: &str, exclusive: &str| -> (Option<f64>, Option<f64>) {
        let limit = tree.value(schema, limit).and_then(Value::as_f64);
        match tree.value(schema, exclusive) {
            Some(Value::Bool(true)) => (None, limit),
            Some(Value::Number(n)) => (limit, n.as_f64()),
            _ => (limit, None),
        }
    };

    let (minimum, exclusive_minimum) = bounds("minimum", "exclusiveMinimum");
    let (maximum, exclusive_maximum) = bounds("maximum", "exclusiveMaximum");

    if let Some(limit) = exclusive_minimum
        && value <= limit
    {
        result.push(problem_at(node, ProblemKind::BelowExclusiveMinimum { limit }));
    }
    if let Some(limit) = exclusive_maximum
        && value >= limit
    {
        result.push(problem_at(node, ProblemKind::AboveExclusiveMaximum { limit }));
    }
    if let Some(limit) = minimum
        && value < limit
    {
        result.push(problem_at(node, ProblemKind::BelowMinimum { limit }));
    }
    if let Some(limit) = maximum
        && value > limit
    {
        result.push(problem_at(node, ProblemKind::AboveMaximum { limit }));
    }
}

fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if value.fract() == 0.0 && divisor.fract() == 0.0 {
        return value % divisor == 0.0;
    }
    let quotient = value / divisor;
    (quotient - quotient.round()).abs() < 1e-9
}

/// JSON equality that treats `1` and `1.0` as the same number.
fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equals(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SchemaDocument, SchemaStore};
    use crate::{SchemaId, resolver};
    use serde_json::json;
    use yamlscope_yaml::{ParseOptions, parse_stream};

    async fn resolved(schema: Value) -> ResolvedSchema {
        let store = SchemaStore::new(None);
        let document = SchemaDocument::new(SchemaId::new("inmemory://test.json"), schema);
        resolver::resolve(&store, &document).await
    }

    async fn problems(schema: Value, text: &str) -> Vec<ValidationProblem> {
        problems_with(schema, text, ValidationOptions::default()).await
    }

    async fn problems_with(schema: Value, text: &str, options: ValidationOptions) -> Vec<ValidationProblem> {
        let schema = resolved(schema).await;
        let stream = parse_stream(text, &ParseOptions::default());
        validate_stream(&stream, &schema, options)
            .into_iter()
            .flatten()
            .collect()
    }

    fn messages(problems: &[ValidationProblem]) -> Vec<&str> {
        problems.iter().map(|p| p.message.as_str()).collect()
    }

    #[tokio::test]
    async fn test_validate_type_mismatch() {
        let found = problems(
            json!({"type": "object", "properties": {"p": {"type": "number"}}}),
            "p: hello",
        )
        .await;
        assert_eq!(messages(&found), vec!["Incorrect type. Expected \"number\"."]);
        assert_eq!((found[0].offset, found[0].length), (3, 5));
    }

    #[tokio::test]
    async fn test_validate_integer_accepts_integral_reals() {
        let schema = json!({"properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}});
        let found = problems(schema, "a: 2.0\nb: 2.5\n").await;
        assert_eq!(messages(&found), vec!["Incorrect type. Expected \"integer\"."]);
        assert_eq!(found[0].offset, 10);
    }

    #[tokio::test]
    async fn test_validate_required_at_parent_key() {
        let schema = json!({
            "required": ["name"],
            "properties": {"spec": {"type": "object", "required": ["image"]}}
        });
        let found = problems(schema, "spec:\n  tag: x\n").await;
        assert_eq!(messages(&found), vec!["Missing property \"name\".", "Missing property \"image\"."]);
        assert_eq!((found[0].offset, found[0].length), (0, 1));
        assert_eq!((found[1].offset, found[1].length), (0, 4));
    }

    #[tokio::test]
    async fn test_validate_additional_properties() {
        let schema = json!({"properties": {"a": {}}, "patternProperties": {"^x-": {}}, "additionalProperties": false});
        let found = problems(schema, "a: 1\nx-y: 2\nb: 3\n").await;
        assert_eq!(messages(&found), vec!["Property b is not allowed."]);
        assert_eq!((found[0].offset, found[0].length), (12, 1));
    }

    #[tokio::test]
    async fn test_validate_enum_and_const() {
        let schema = json!({"properties": {"e": {"enum": ["v1", "v2"]}, "c": {"const": 3}}});
        let found = problems(schema, "e: v3\nc: 3.0\n").await;
        assert_eq!(messages(&found), vec!["Value is not accepted. Valid values: \"v1\", \"v2\"."]);
    }

    #[tokio::test]
    async fn test_validate_error_message_override() {
        let schema = json!({"properties": {"port": {"type": "integer", "errorMessage": "Port must be a number"}}});
        let found = problems(schema, "port: http").await;
        assert_eq!(messages(&found), vec!["Port must be a number"]);
    }

    #[tokio::test]
    async fn test_validate_number_limits() {
        let schema = json!({"properties": {
            "a": {"minimum": 1},
            "b": {"maximum": 10, "exclusiveMaximum": true},
            "c": {"exclusiveMinimum": 0},
            "d": {"multipleOf": 0.5}
        }});
        let found = problems(schema, "a: 0\nb: 10\nc: 0\nd: 1.25\n").await;
        assert_eq!(
            messages(&found),
            vec![
                "Value is below the minimum of 1.",
                "Value is above the exclusive maximum of 10.",
                "Value is below the exclusive minimum of 0.",
                "Value is not divisible by 0.5.",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_strings() {
        let schema = json!({"properties": {
            "s": {"minLength": 3, "maxLength": 4},
            "id": {"pattern": "^[a-z]+$", "patternErrorMessage": "lowercase only"}
        }});
        let found = problems(schema, "s: ab\nid: Abc\n").await;
        assert_eq!(
            messages(&found),
            vec!["String is shorter than the minimum length of 3.", "lowercase only"]
        );
    }

    #[tokio::test]
    async fn test_validate_arrays() {
        let schema = json!({"properties": {
            "t": {"items": [{"type": "string"}], "additionalItems": false},
            "u": {"uniqueItems": true, "maxItems": 2, "contains": {"const": 9}}
        }});
        let found = problems(schema, "t: [a, b]\nu: [1, 1.0, 2]\n").await;
        assert_eq!(
            messages(&found),
            vec![
                "Array has too many items according to schema. Expected 1 or fewer.",
                "Array does not contain required item.",
                "Array has too many items. Expected 2 or fewer.",
                "Array has duplicate items.",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_object_counts_and_dependencies() {
        let schema = json!({
            "maxProperties": 1,
            "dependencies": {"card": ["billing"]},
            "propertyNames": {"maxLength": 4}
        });
        let found = problems(schema, "card: 1\nother: 2\n").await;
        assert_eq!(
            messages(&found),
            vec![
                "Object has more properties than limit of 1.",
                "Object is missing property billing required by property card.",
                "String is longer than the maximum length of 4.",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_any_of_reports_best_alternative() {
        let schema = json!({"anyOf": [
            {"properties": {"kind": {"const": "a"}, "size": {"type": "number"}}, "required": ["kind"]},
            {"properties": {"kind": {"const": "b"}, "name": {"type": "string"}}, "required": ["kind"]}
        ]});
        let found = problems(schema, "kind: b\nname: 3\n").await;
        assert_eq!(messages(&found), vec!["Incorrect type. Expected \"string\"."]);
    }

    #[tokio::test]
    async fn test_validate_any_of_merges_enum_values() {
        let schema = json!({"anyOf": [{"enum": ["a"]}, {"enum": ["b"]}]});
        let found = problems(schema, "c").await;
        assert_eq!(messages(&found), vec!["Value is not accepted. Valid values: \"a\", \"b\"."]);
    }

    #[tokio::test]
    async fn test_validate_one_of_multiple_matches() {
        let schema = json!({"oneOf": [{"type": "string"}, {"minLength": 1}]});
        let found = problems(schema, "abc").await;
        assert_eq!(messages(&found), vec!["Matches multiple schemas when only one must validate."]);
        assert_eq!(found[0].length, 1);
    }

    #[tokio::test]
    async fn test_validate_not_and_conditionals() {
        let schema = json!({
            "properties": {"mode": {"not": {"const": "off"}}},
            "if": {"properties": {"mode": {"const": "tls"}}},
            "then": {"required": ["cert"]},
            "else": {"required": ["port"]}
        });
        assert_eq!(
            messages(&problems(schema.clone(), "mode: tls\n").await),
            vec!["Missing property \"cert\"."]
        );
        assert_eq!(
            messages(&problems(schema, "mode: off\nport: 1\n").await),
            vec!["Matches a schema that is not allowed."]
        );
    }

    #[tokio::test]
    async fn test_validate_deprecation_warning() {
        let schema = json!({"properties": {"old": {"deprecationMessage": "Use new instead"}}});
        let found = problems(schema, "old: 1\n").await;
        assert_eq!(messages(&found), vec!["Use new instead"]);
        assert_eq!(found[0].severity, yamlscope_yaml::ProblemSeverity::Warning);
        assert_eq!((found[0].offset, found[0].length), (0, 6));
    }

    #[tokio::test]
    async fn test_validate_recursive_schema() {
        let schema = json!({
            "definitions": {"node": {"type": "object", "properties": {"next": {"$ref": "#/definitions/node"}, "v": {"type": "number"}}}},
            "$ref": "#/definitions/node"
        });
        let found = problems(schema, "next:\n  next:\n    v: x\n").await;
        assert_eq!(messages(&found), vec!["Incorrect type. Expected \"number\"."]);
    }

    #[tokio::test]
    async fn test_kubernetes_ranking_prefers_recognized_keys() {
        let schema = json!({"oneOf": [
            {"properties": {"kind": {}, "apiVersion": {}, "spec": {"type": "object"}}},
            {"properties": {"other": {}}}
        ]});
        let text = "kind: Pod\napiVersion: v1\nspec: 1\n";
        let normal = problems_with(schema.clone(), text, ValidationOptions::default()).await;
        let k8s = problems_with(schema, text, ValidationOptions { kubernetes: true }).await;
        assert!(normal.is_empty());
        assert_eq!(messages(&k8s), vec!["Incorrect type. Expected \"object\"."]);
    }

    #[tokio::test]
    async fn test_matching_schemas_at_offset() {
        let schema = resolved(json!({
            "properties": {"a": {"properties": {"b": {"title": "B"}}}, "c": {"title": "C"}},
            "not": {"properties": {"a": {"title": "NotA"}}}
        }))
        .await;
        let stream = parse_stream("a:\n  b: 1\nc: 2\n", &ParseOptions::default());
        let document = &stream.documents()[0];
        let matches = matching_schemas(document, &schema, schema.root(), Some(8), ValidationOptions::default());

        let titles: Vec<(&str, bool)> = matches
            .iter()
            .filter_map(|m| Some((schema.tree().str_value(m.schema, "title")?, m.inverted)))
            .collect();
        assert_eq!(titles, vec![("NotA", true), ("B", false)]);
        assert!(matches.iter().all(|m| m.node.contains(8)));
    }
}
