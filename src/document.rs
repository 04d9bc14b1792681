//! Arena-indexed document tree built from a `mitex_parser` syntax tree.
//!
//! A `Document` is an immutable snapshot. The rowan tree is walked once and
//! projected into nodes that live in one `Vec` and refer to each other by
//! `NodeId`, so any number of readers can walk it while the host prepares the
//! next snapshot.

use std::ops::Range;
use std::path::{Path, PathBuf};

use mitex_parser::CommandSpec;
use mitex_parser::syntax::{CmdItem, EnvItem, SyntaxElement, SyntaxKind, SyntaxNode};
use rowan::ast::AstNode as _;

use crate::catalog::CommandCatalog;
use crate::error::Error;

/// Stable index of a node inside its `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One node of the tree. Ranges are byte offsets into the document source.
#[derive(Debug, Clone)]
pub struct Node {
    /// Child nodes in source order.
    pub children: Vec<NodeId>,
    /// What the node is.
    pub kind: NodeKind,
    /// Enclosing node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Byte range covered by the node.
    pub range: Range<usize>,
}

/// Node variants of the markup tree.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A command token with its arguments. Commands nested in arguments are children.
    Command(Command),
    /// A `%` comment up to the end of the line, or a block comment.
    Comment,
    /// `\begin{name} ... \end{name}`; the begin and end commands are children.
    Environment(Environment),
    /// A `{...}` group in running text.
    Group,
    /// The whole document.
    Root,
    /// Plain text.
    Text,
}

/// A parsed command occurrence.
#[derive(Debug, Clone)]
pub struct Command {
    /// Arguments in source order, optional and required interleaved as written.
    pub arguments: Vec<Argument>,
    /// Range of the command token, backslash included.
    pub name: Range<usize>,
}

impl Command {
    /// The first required argument, if any.
    pub fn first_required_argument(&self) -> Option<&Argument> {
        return self.required_arguments().next();
    }

    /// Optional (`[...]`) arguments in source order.
    pub fn optional_arguments(&self) -> impl Iterator<Item = &Argument> {
        return self.arguments.iter().filter(|a| return a.kind == ArgumentKind::Optional);
    }

    /// Required (`{...}`) arguments in source order.
    pub fn required_arguments(&self) -> impl Iterator<Item = &Argument> {
        return self.arguments.iter().filter(|a| return a.kind == ArgumentKind::Required);
    }
}

/// Whether an argument is bracketed or braced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// `[...]`
    Optional,
    /// `{...}`
    Required,
}

/// A bracketed or braced argument attached to a command.
#[derive(Debug, Clone)]
pub struct Argument {
    /// Top-level content between the delimiters.
    pub content: Vec<Fragment>,
    /// Bracketed or braced.
    pub kind: ArgumentKind,
    /// Range including both delimiters.
    pub range: Range<usize>,
}

impl Argument {
    /// Range between the delimiters.
    pub const fn inner(&self) -> Range<usize> {
        return self.range.start.saturating_add(1)..self.range.end.saturating_sub(1);
    }
}

/// A piece of argument content.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// A nested command; the node is a child of the owning command.
    Command(NodeId),
    /// A nested `{...}` group, braces included in `range`.
    Group {
        /// Content between the braces.
        content: Vec<Self>,
        /// Range including both braces.
        range: Range<usize>,
    },
    /// Literal text.
    Text(Range<usize>),
}

/// A `\begin{name} ... \end{name}` block.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The `\begin` command node.
    pub begin: NodeId,
    /// The `\end` command node; `None` when the block was closed implicitly.
    pub end: Option<NodeId>,
    /// Environment name as written in the `\begin` argument.
    pub name: String,
}

/// Parsed, read-only view of one source file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
    /// Node arena; index 0 is the root.
    nodes: Vec<Node>,
    /// Path the document was loaded from, relative to the project root.
    path: PathBuf,
    /// Full source text.
    source: String,
}

impl Document {
    /// Parse `source` into a tree.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if a `{` group or argument is never closed.
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self, Error> {
        let path = path.into();
        let source = source.into();
        let line_starts = compute_line_starts(&source);

        let masked = mask_raw_regions(&source);
        let tree = mitex_parser::parse(&masked, command_spec());

        let mut builder = Builder {
            line_starts: &line_starts,
            nodes: Vec::new(),
            path: &path,
            source: &source,
        };
        let covered = span(&tree).end;
        if covered != source.len() {
            return Err(builder.error_at(covered, "syntax tree does not cover the source"));
        }
        let root = builder.alloc(NodeKind::Root, 0..source.len(), None);
        builder.build_children(root, &elements_of(&tree))?;
        let nodes = builder.nodes;

        return Ok(Self {
            line_starts,
            nodes,
            path,
            source,
        });
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        return std::iter::successors(self.parent(id), |current| return self.parent(*current));
    }

    /// The command at `id`, if the node is a command.
    pub fn command(&self, id: NodeId) -> Option<&Command> {
        return match &self.node(id).kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        };
    }

    /// Command token text (`\label`), or empty when `id` is not a command.
    pub fn command_name(&self, id: NodeId) -> &str {
        return self.command(id).map_or("", |c| return self.text(&c.name));
    }

    /// Every command occurrence in document order.
    pub fn commands(&self) -> impl Iterator<Item = NodeId> + '_ {
        return self.descendants(self.root()).filter(|id| return self.command(*id).is_some());
    }

    /// Preorder walk of the subtree below `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        return Descendants {
            document: self,
            stack: vec![id],
        };
    }

    /// The nearest environment enclosing `id`.
    pub fn enclosing_environment(&self, id: NodeId) -> Option<NodeId> {
        return self.ancestors(id).find(|a| return self.environment(*a).is_some());
    }

    /// The environment at `id`, if the node is one.
    pub fn environment(&self, id: NodeId) -> Option<&Environment> {
        return match &self.node(id).kind {
            NodeKind::Environment(environment) => Some(environment),
            _ => None,
        };
    }

    /// One-based line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> u32 {
        return line_number(&self.line_starts, offset);
    }

    /// The node at `id`.
    #[allow(clippy::indexing_slicing, reason = "NodeIds are only minted by this document's parser")]
    pub fn node(&self, id: NodeId) -> &Node {
        return &self.nodes[id.0];
    }

    /// The parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        return self.node(id).parent;
    }

    /// Path the document was loaded from.
    pub fn path(&self) -> &Path {
        return &self.path;
    }

    /// Siblings before `id`, nearest first.
    pub fn previous_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let siblings = match self.parent(id) {
            Some(parent) => self.node(parent).children.as_slice(),
            None => &[],
        };
        let position = siblings.iter().position(|s| return *s == id).unwrap_or(0);
        return siblings.iter().take(position).rev().copied();
    }

    /// The root node.
    pub const fn root(&self) -> NodeId {
        return NodeId(0);
    }

    /// Full source text.
    pub fn source(&self) -> &str {
        return &self.source;
    }

    /// Source text of `range`; empty when the range does not fit the source.
    pub fn text(&self, range: &Range<usize>) -> &str {
        return self.source.get(range.clone()).unwrap_or("");
    }
}

/// Preorder iterator over a subtree.
pub struct Descendants<'a> {
    /// Document being walked.
    document: &'a Document,
    /// Pending nodes, next on top.
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.document.node(id).children.iter().rev().copied());
        return Some(id);
    }
}

/// Walks a syntax tree once and fills the node arena.
struct Builder<'a> {
    /// Line table for error positions.
    line_starts: &'a [usize],
    /// Arena under construction.
    nodes: Vec<Node>,
    /// File name for error messages.
    path: &'a Path,
    /// Original source; the tree was parsed from a masked copy of equal length.
    source: &'a str,
}

impl Builder<'_> {
    /// Push a node covering `range` and link it under `parent`.
    fn alloc(&mut self, kind: NodeKind, range: Range<usize>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            children: Vec::new(),
            kind,
            parent,
            range,
        });
        if let Some(parent) = parent {
            self.node_mut(parent).children.push(id);
        }
        return id;
    }

    /// Attach the arguments that start exactly at `*end`, moving it past each one.
    ///
    /// Elements that end at or before `*end` are skipped. Returns the arguments
    /// and how many leading `elements` were used up.
    fn attach_arguments(
        &mut self,
        owner: NodeId,
        elements: &[SyntaxElement],
        end: &mut usize,
    ) -> Result<(Vec<Argument>, usize), Error> {
        let mut arguments = Vec::new();
        let mut index = 0_usize;
        while let Some(element) = elements.get(index) {
            let range = byte_range(element.text_range());
            if range.end <= *end {
                index = index.saturating_add(1);
                continue;
            }
            if range.start != *end {
                break;
            }
            let (argument, last) = match element {
                SyntaxElement::Node(node) => {
                    let Some(item) = argument_item(node) else {
                        break;
                    };
                    (self.node_argument(owner, &item)?, index)
                },
                SyntaxElement::Token(token) => {
                    let Some(found) = self.token_argument(owner, elements, index, token.kind())? else {
                        break;
                    };
                    found
                },
            };
            *end = argument.range.end;
            arguments.push(argument);
            index = last.saturating_add(1);
        }
        return Ok((arguments, index));
    }

    /// A `{...}` argument read from the source at `from`, ending before `limit`.
    fn braced_text(&self, from: usize, limit: usize) -> Option<Argument> {
        let body = self.source.get(from..limit)?.strip_prefix('{')?;
        let close = body.find('}')?;
        let inner_start = from.saturating_add(1);
        let inner = inner_start..inner_start.saturating_add(close);
        return Some(Argument {
            content: vec![Fragment::Text(inner.clone())],
            kind: ArgumentKind::Required,
            range: from..inner.end.saturating_add(1),
        });
    }

    /// Project running content under `parent`.
    fn build_children(&mut self, parent: NodeId, elements: &[SyntaxElement]) -> Result<(), Error> {
        let mut index = 0_usize;
        while let Some(element) = elements.get(index) {
            index = index.saturating_add(1);
            let node = match element {
                SyntaxElement::Token(token) => {
                    let range = byte_range(token.text_range());
                    if token.kind() == SyntaxKind::TokenComment {
                        self.alloc(NodeKind::Comment, range, Some(parent));
                    } else {
                        self.text_node(parent, range);
                    }
                    continue;
                },
                SyntaxElement::Node(node) => node,
            };
            match node.kind() {
                SyntaxKind::ItemCmd => {
                    let Some(name) = self.control_word(node) else {
                        self.text_node(parent, span(node));
                        continue;
                    };
                    let rest = elements.get(index..).unwrap_or(&[]);
                    let (_, consumed) = self.build_command(parent, node, name, rest)?;
                    index = index.saturating_add(consumed);
                },
                SyntaxKind::ItemEnv => self.build_environment(parent, node)?,
                SyntaxKind::ItemCurly => {
                    self.ensure_closed(node)?;
                    let group = self.alloc(NodeKind::Group, span(node), Some(parent));
                    self.build_children(group, &delimited_content(node))?;
                },
                SyntaxKind::ItemBlockComment => {
                    self.alloc(NodeKind::Comment, span(node), Some(parent));
                },
                _ => self.build_children(parent, &elements_of(node))?,
            }
        }
        return Ok(());
    }

    /// Build a command from its name plus the arguments attached to it, first
    /// inside `node`, then among the `following` siblings.
    ///
    /// Returns the node and how many of `following` it used up.
    fn build_command(
        &mut self,
        parent: NodeId,
        node: &SyntaxNode,
        name: Range<usize>,
        following: &[SyntaxElement],
    ) -> Result<(NodeId, usize), Error> {
        let command = Command {
            arguments: Vec::new(),
            name: name.clone(),
        };
        let id = self.alloc(NodeKind::Command(command), name.clone(), Some(parent));
        let mut end = name.end;
        let (mut arguments, _) = self.attach_arguments(id, &elements_of(node), &mut end)?;
        let (trailing, consumed) = self.attach_arguments(id, following, &mut end)?;
        arguments.extend(trailing);
        self.finish_command(id, arguments, end);
        return Ok((id, consumed));
    }

    /// Build an environment: its `\begin` marker, the body, then the `\end` marker.
    fn build_environment(&mut self, parent: NodeId, node: &SyntaxNode) -> Result<(), Error> {
        let elements = elements_of(node);
        let Some((begin_index, begin_item)) = elements
            .iter()
            .enumerate()
            .find_map(|(i, e)| return item_of_kind(e, SyntaxKind::ItemBegin).map(|item| return (i, item)))
        else {
            return self.build_children(parent, &elements);
        };
        let range = span(node);
        let placeholder = Environment {
            begin: NodeId(0),
            end: None,
            name: String::new(),
        };
        let id = self.alloc(NodeKind::Environment(placeholder), range.clone(), Some(parent));

        let after_begin = begin_index.saturating_add(1);
        let following = elements.get(after_begin..).unwrap_or(&[]);
        let (begin, consumed) = self.build_marker(id, &begin_item, "\\begin", following)?;

        let body_start = after_begin.saturating_add(consumed);
        let end_index = elements
            .iter()
            .rposition(|e| return e.kind() == SyntaxKind::ItemEnd)
            .filter(|i| return *i >= body_start);
        let body = elements.get(body_start..end_index.unwrap_or(elements.len())).unwrap_or(&[]);
        self.build_children(id, body)?;

        let end = end_index
            .and_then(|i| return elements.get(i))
            .and_then(|e| return item_of_kind(e, SyntaxKind::ItemEnd))
            .map(|item| return self.build_marker(id, &item, "\\end", &[]).map(|(marker, _)| return marker))
            .transpose()?;

        let name = self.environment_name(node, begin);
        let finish = end.map_or(range.end, |marker| return self.node(marker).range.end);
        let environment = self.node_mut(id);
        environment.range = range.start..finish;
        environment.kind = NodeKind::Environment(Environment { begin, end, name });
        return Ok(());
    }

    /// Build the `\begin` or `\end` command of an environment from its marker item.
    fn build_marker(
        &mut self,
        parent: NodeId,
        item: &SyntaxNode,
        keyword: &str,
        following: &[SyntaxElement],
    ) -> Result<(NodeId, usize), Error> {
        let range = span(item);
        let offset = self
            .source
            .get(range.clone())
            .and_then(|text| return text.find(keyword))
            .unwrap_or(0);
        let start = range.start.saturating_add(offset);
        let name = start..start.saturating_add(keyword.len());
        let command = Command {
            arguments: Vec::new(),
            name: name.clone(),
        };
        let id = self.alloc(NodeKind::Command(command), name.clone(), Some(parent));

        let mut end = name.end;
        let (mut arguments, _) = self.attach_arguments(id, &elements_of(item), &mut end)?;
        if arguments.is_empty()
            && let Some(argument) = self.braced_text(end, range.end)
        {
            end = argument.range.end;
            arguments.push(argument);
        }
        let (trailing, consumed) = self.attach_arguments(id, following, &mut end)?;
        arguments.extend(trailing);
        self.finish_command(id, arguments, end);
        return Ok((id, consumed));
    }

    /// The command at `id`, if the node is one.
    fn command_at(&self, id: NodeId) -> Option<&Command> {
        return match &self.node(id).kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        };
    }

    /// Name range of `node` when it is a control word (`\name`), star included.
    fn control_word(&self, node: &SyntaxNode) -> Option<Range<usize>> {
        let token = CmdItem::cast(node.clone())?.name_tok()?;
        let range = byte_range(token.text_range());
        let name = self.source.get(range.clone())?;
        if !name
            .as_bytes()
            .get(1)
            .is_some_and(|b| return b.is_ascii_alphabetic() || *b == b'@')
        {
            return None;
        }
        if self.source.as_bytes().get(range.end) == Some(&b'*') {
            return Some(range.start..range.end.saturating_add(1));
        }
        return Some(range);
    }

    /// Fail on a `{` or `[` item the parser closed at the end of input.
    fn ensure_closed(&self, item: &SyntaxNode) -> Result<(), Error> {
        let closed = elements_of(item)
            .iter()
            .any(|e| return matches!(e.kind(), SyntaxKind::TokenRBrace | SyntaxKind::TokenRBracket));
        if closed {
            return Ok(());
        }
        let reason = if item.kind() == SyntaxKind::ItemBracket {
            "unclosed `[`"
        } else {
            "unclosed `{`"
        };
        return Err(self.error_at(span(item).start, reason));
    }

    /// Environment name from the `\begin` argument, else from the parser's name token.
    fn environment_name(&self, node: &SyntaxNode, begin: NodeId) -> String {
        let written = self
            .command_at(begin)
            .and_then(Command::first_required_argument)
            .map(|argument| return self.source.get(argument.inner()).unwrap_or("").trim().to_string())
            .filter(|name| return !name.is_empty());
        return written
            .or_else(|| {
                return EnvItem::cast(node.clone())
                    .and_then(|env| return env.name_tok())
                    .map(|token| return token.text().trim().to_string());
            })
            .unwrap_or_default();
    }

    /// A `ParseFailed` error pointing at `offset`.
    fn error_at(&self, offset: usize, reason: &str) -> Error {
        return Error::ParseFailed {
            file: self.path.to_path_buf(),
            line: line_number(self.line_starts, offset),
            reason: reason.to_string(),
        };
    }

    /// Store the arguments of command `id` and end its range at `end`.
    fn finish_command(&mut self, id: NodeId, arguments: Vec<Argument>, end: usize) {
        let node = self.node_mut(id);
        node.range.end = end;
        if let NodeKind::Command(command) = &mut node.kind {
            command.arguments = arguments;
        }
    }

    /// Argument content of `elements`; nested commands become children of `owner`.
    fn fragments(&mut self, owner: NodeId, elements: &[SyntaxElement]) -> Result<Vec<Fragment>, Error> {
        let mut fragments = Vec::new();
        let mut index = 0_usize;
        while let Some(element) = elements.get(index) {
            index = index.saturating_add(1);
            let node = match element {
                SyntaxElement::Token(token) => {
                    if token.kind() != SyntaxKind::TokenComment {
                        push_text(&mut fragments, byte_range(token.text_range()));
                    }
                    continue;
                },
                SyntaxElement::Node(node) => node,
            };
            match node.kind() {
                SyntaxKind::ItemCmd => {
                    let Some(name) = self.control_word(node) else {
                        push_text(&mut fragments, span(node));
                        continue;
                    };
                    let rest = elements.get(index..).unwrap_or(&[]);
                    let (id, consumed) = self.build_command(owner, node, name, rest)?;
                    index = index.saturating_add(consumed);
                    fragments.push(Fragment::Command(id));
                },
                SyntaxKind::ItemCurly => {
                    self.ensure_closed(node)?;
                    let content = self.fragments(owner, &delimited_content(node))?;
                    fragments.push(Fragment::Group {
                        content,
                        range: span(node),
                    });
                },
                SyntaxKind::ItemEnv => self.build_environment(owner, node)?,
                SyntaxKind::ItemBlockComment => {},
                _ => {
                    for fragment in self.fragments(owner, &elements_of(node))? {
                        match fragment {
                            Fragment::Text(range) => push_text(&mut fragments, range),
                            other => fragments.push(other),
                        }
                    }
                },
            }
        }
        return Ok(fragments);
    }

    /// The node at `id`.
    #[allow(clippy::indexing_slicing, reason = "NodeIds are only minted by alloc")]
    fn node(&self, id: NodeId) -> &Node {
        return &self.nodes[id.0];
    }

    /// Mutable access to a node this builder allocated.
    #[allow(clippy::indexing_slicing, reason = "NodeIds are only minted by alloc")]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        return &mut self.nodes[id.0];
    }

    /// Record a text node, merging it into a directly preceding text sibling.
    fn text_node(&mut self, parent: NodeId, range: Range<usize>) {
        if let Some(last) = self.node(parent).children.last().copied() {
            let previous = self.node_mut(last);
            if matches!(previous.kind, NodeKind::Text) && previous.range.end == range.start {
                previous.range.end = range.end;
                return;
            }
        }
        self.alloc(NodeKind::Text, range, Some(parent));
    }

    /// An argument written as loose delimiter tokens, opening at `elements[open]`.
    ///
    /// Returns the argument and the index of its closing token, or `None`
    /// when the delimiter is never balanced.
    fn token_argument(
        &mut self,
        owner: NodeId,
        elements: &[SyntaxElement],
        open: usize,
        kind: SyntaxKind,
    ) -> Result<Option<(Argument, usize)>, Error> {
        let (close, argument_kind) = match kind {
            SyntaxKind::TokenLBracket => (SyntaxKind::TokenRBracket, ArgumentKind::Optional),
            SyntaxKind::TokenLBrace => (SyntaxKind::TokenRBrace, ArgumentKind::Required),
            _ => return Ok(None),
        };
        let start = elements.get(open).map_or(0, |e| return byte_range(e.text_range()).start);
        let mut depth = 0_usize;
        for (index, element) in elements.iter().enumerate().skip(open) {
            if element.kind() == kind {
                depth = depth.saturating_add(1);
            } else if element.kind() == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let inner = elements.get(open.saturating_add(1)..index).unwrap_or(&[]);
                    let content = self.fragments(owner, inner)?;
                    let argument = Argument {
                        content,
                        kind: argument_kind,
                        range: start..byte_range(element.text_range()).end,
                    };
                    return Ok(Some((argument, index)));
                }
            }
        }
        return Ok(None);
    }
}

/// Byte offsets of every line start.
fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(source.match_indices('\n').map(|(i, _)| return i.saturating_add(1)));
    return starts;
}

/// One-based line containing `offset`.
fn line_number(line_starts: &[usize], offset: usize) -> u32 {
    let index = line_starts.partition_point(|start| return *start <= offset);
    return u32::try_from(index).unwrap_or(u32::MAX);
}

/// Command table handed to the parser.
///
/// No command carries an argument shape. Arguments are attached by adjacency
/// while the arena is built, so `\ref \url` stays two bare commands.
fn command_spec() -> CommandSpec {
    return CommandSpec::new(Default::default());
}

/// Byte range of a rowan text range.
fn byte_range(range: rowan::TextRange) -> Range<usize> {
    return usize::from(range.start())..usize::from(range.end());
}

/// Byte range covered by `node`.
fn span(node: &SyntaxNode) -> Range<usize> {
    return byte_range(node.text_range());
}

/// Children of `node` with `ItemText` runs inlined, so loose brackets are
/// siblings of the command before them.
fn elements_of(node: &SyntaxNode) -> Vec<SyntaxElement> {
    let mut elements = Vec::new();
    for child in node.children_with_tokens() {
        match child {
            SyntaxElement::Node(inner) if inner.kind() == SyntaxKind::ItemText => elements.extend(elements_of(&inner)),
            other => elements.push(other),
        }
    }
    return elements;
}

/// Children of a `{...}` or `[...]` item without its delimiters.
fn delimited_content(item: &SyntaxNode) -> Vec<SyntaxElement> {
    let mut elements = elements_of(item);
    if elements
        .first()
        .is_some_and(|e| return matches!(e.kind(), SyntaxKind::TokenLBrace | SyntaxKind::TokenLBracket))
    {
        elements.remove(0);
    }
    if elements
        .last()
        .is_some_and(|e| return matches!(e.kind(), SyntaxKind::TokenRBrace | SyntaxKind::TokenRBracket))
    {
        elements.pop();
    }
    return elements;
}

/// The `{...}` or `[...]` item an argument-like node stands for.
fn argument_item(node: &SyntaxNode) -> Option<SyntaxNode> {
    return match node.kind() {
        SyntaxKind::ItemCurly | SyntaxKind::ItemBracket => Some(node.clone()),
        SyntaxKind::ClauseArgument => node
            .children()
            .find(|c| return matches!(c.kind(), SyntaxKind::ItemCurly | SyntaxKind::ItemBracket)),
        _ => None,
    };
}

/// `element` as a node of `kind`.
fn item_of_kind(element: &SyntaxElement, kind: SyntaxKind) -> Option<SyntaxNode> {
    return element.as_node().filter(|n| return n.kind() == kind).cloned();
}

/// Append a text range, merging with a directly preceding text fragment.
fn push_text(fragments: &mut Vec<Fragment>, range: Range<usize>) {
    if let Some(Fragment::Text(last)) = fragments.last_mut()
        && last.end == range.start
    {
        last.end = range.end;
        return;
    }
    fragments.push(Fragment::Text(range));
}

/// Copy of `source` with raw regions blanked out byte for byte.
///
/// Verbatim environment bodies, `\verb` bodies and the `*` of starred
/// commands become spaces (newlines stay), so offsets into the copy are
/// offsets into `source`.
fn mask_raw_regions(source: &str) -> String {
    let mut bytes = source.as_bytes().to_vec();
    for region in raw_regions(source) {
        if let Some(slice) = bytes.get_mut(region) {
            for byte in slice.iter_mut().filter(|b| return **b != b'\n') {
                *byte = b' ';
            }
        }
    }
    return String::from_utf8(bytes).unwrap_or_else(|_| return source.to_string());
}

/// Ranges of `source` the parser must not interpret.
fn raw_regions(source: &str) -> Vec<Range<usize>> {
    let verbatim = verbatim_bodies(source);
    let mut regions = Vec::new();
    let mut pos = 0_usize;
    while let Some(found) = source.get(pos..).and_then(|rest| return rest.find('\\')) {
        let start = pos.saturating_add(found);
        if let Some(body) = verbatim.iter().find(|body| return body.contains(&start)) {
            pos = body.end;
            continue;
        }
        let after = start.saturating_add(1);
        let letters = source.get(after..).map_or(0, |rest| {
            return rest
                .bytes()
                .take_while(|b| return b.is_ascii_alphabetic() || *b == b'@')
                .count();
        });
        if letters == 0 {
            // Control symbol: skip the escaped character.
            let width = source.get(after..).and_then(|rest| return rest.chars().next()).map_or(1, char::len_utf8);
            pos = after.saturating_add(width);
            continue;
        }
        let name_end = after.saturating_add(letters);
        pos = name_end;
        if source.as_bytes().get(name_end) == Some(&b'*') {
            regions.push(name_end..name_end.saturating_add(1));
            pos = name_end.saturating_add(1);
        }
        if source.get(start..name_end) == Some("\\verb")
            && !in_comment(source, start)
            && let Some(delimiter) = source.get(pos..).and_then(|rest| return rest.chars().next())
        {
            let body_start = pos.saturating_add(delimiter.len_utf8());
            let body_end = source
                .get(body_start..)
                .and_then(|rest| return rest.find(delimiter))
                .map_or(source.len(), |p| return body_start.saturating_add(p));
            regions.push(body_start..body_end);
            pos = body_end;
        }
    }
    regions.extend(verbatim);
    return regions;
}

/// Bodies of verbatim environments, after the `\begin` line's arguments.
fn verbatim_bodies(source: &str) -> Vec<Range<usize>> {
    const BEGIN: &str = "\\begin{";
    let mut bodies = Vec::new();
    let mut pos = 0_usize;
    while let Some(found) = source.get(pos..).and_then(|rest| return rest.find(BEGIN)) {
        let begin = pos.saturating_add(found);
        let name_start = begin.saturating_add(BEGIN.len());
        pos = name_start;
        let Some(close) = source.get(name_start..).and_then(|rest| return rest.find('}')) else {
            break;
        };
        let name_end = name_start.saturating_add(close);
        let name = source.get(name_start..name_end).unwrap_or("").trim();
        if !CommandCatalog::is_verbatim_environment(name) || in_comment(source, begin) {
            continue;
        }
        let body_start = skip_arguments(source, name_end.saturating_add(1));
        let terminator = format!("\\end{{{name}}}");
        let body_end = source
            .get(body_start..)
            .and_then(|rest| return rest.find(&terminator))
            .map_or(source.len(), |p| return body_start.saturating_add(p));
        bodies.push(body_start..body_end);
        pos = body_end;
    }
    return bodies;
}

/// Offset after the `[...]` and `{...}` groups directly at `from`.
fn skip_arguments(source: &str, from: usize) -> usize {
    let bytes = source.as_bytes();
    let mut pos = from;
    while let Some(&open) = bytes.get(pos) {
        if open != b'[' && open != b'{' {
            break;
        }
        let mut braces = 0_usize;
        let mut brackets = 0_usize;
        let mut close = None;
        for (offset, byte) in bytes.iter().enumerate().skip(pos) {
            match byte {
                b'{' => braces = braces.saturating_add(1),
                b'}' => {
                    braces = braces.saturating_sub(1);
                    if open == b'{' && braces == 0 {
                        close = Some(offset);
                        break;
                    }
                },
                b'[' if braces == 0 => brackets = brackets.saturating_add(1),
                b']' if braces == 0 && open == b'[' => {
                    brackets = brackets.saturating_sub(1);
                    if brackets == 0 {
                        close = Some(offset);
                        break;
                    }
                },
                _ => {},
            }
        }
        let Some(close) = close else {
            break;
        };
        pos = close.saturating_add(1);
    }
    return pos;
}

/// Whether `offset` sits after an unescaped `%` on its line.
fn in_comment(source: &str, offset: usize) -> bool {
    let line_start = source
        .get(..offset)
        .and_then(|before| return before.rfind('\n'))
        .map_or(0, |i| return i.saturating_add(1));
    let mut escaped = false;
    for byte in source.as_bytes().get(line_start..offset).unwrap_or(&[]) {
        match byte {
            b'\\' => escaped = !escaped,
            b'%' if !escaped => return true,
            _ => escaped = false,
        }
    }
    return false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        return Document::parse("test.tex", source).unwrap();
    }

    fn names(document: &Document) -> Vec<&str> {
        return document.commands().map(|c| return document.command_name(c)).collect();
    }

    fn command_named<'a>(document: &'a Document, name: &str) -> (NodeId, &'a Command) {
        let id = document.commands().find(|c| return document.command_name(*c) == name).unwrap();
        return (id, document.command(id).unwrap());
    }

    #[test]
    fn commands_are_listed_in_document_order() {
        let doc = parse("\\section{Intro}\n\\label{sec:intro} see \\ref{sec:intro}.");
        assert_eq!(names(&doc), vec!["\\section", "\\label", "\\ref"]);
    }

    #[test]
    fn optional_and_required_arguments_are_split() {
        let doc = parse("\\includegraphics[width=3cm]{img.png}");
        let (_, command) = command_named(&doc, "\\includegraphics");
        assert_eq!(command.optional_arguments().count(), 1);
        let required = command.first_required_argument().unwrap();
        assert_eq!(doc.text(&required.range), "{img.png}");
        assert_eq!(doc.text(&required.inner()), "img.png");
    }

    #[test]
    fn arguments_must_be_adjacent() {
        let doc = parse("\\item [x] text");
        let (_, command) = command_named(&doc, "\\item");
        assert!(command.arguments.is_empty());
    }

    #[test]
    fn unbalanced_bracket_is_not_an_argument() {
        let doc = parse("\\item[oops {text}");
        let (_, command) = command_named(&doc, "\\item");
        assert!(command.arguments.is_empty());
    }

    #[test]
    fn environments_own_their_body() {
        let doc = parse("\\begin{figure}\n  \\label{fig:a}\n\\end{figure}");
        let (label, _) = command_named(&doc, "\\label");
        let env = doc.enclosing_environment(label).unwrap();
        let environment = doc.environment(env).unwrap();
        assert_eq!(environment.name, "figure");
        assert!(environment.end.is_some());
        assert_eq!(doc.text(&doc.node(env).range), doc.source());
    }

    #[test]
    fn begin_options_are_begin_arguments() {
        let doc = parse("\\begin{lstlisting}[language=Rust]\nfn main() {}\n\\end{lstlisting}");
        let (begin, command) = command_named(&doc, "\\begin");
        assert_eq!(doc.text(&command.first_required_argument().unwrap().inner()), "lstlisting");
        let options = command.optional_arguments().next().unwrap();
        assert_eq!(doc.text(&options.range), "[language=Rust]");
        assert!(doc.environment(doc.parent(begin).unwrap()).is_some());
    }

    #[test]
    fn nested_commands_in_arguments_are_children() {
        let doc = parse("\\section{Intro \\label{sec:intro}}");
        let (label, _) = command_named(&doc, "\\label");
        let parent = doc.parent(label).unwrap();
        assert_eq!(doc.command_name(parent), "\\section");
    }

    #[test]
    fn starred_commands_keep_their_arguments() {
        let doc = parse("\\section*{Intro}\\label{x}");
        let (_, command) = command_named(&doc, "\\section*");
        assert_eq!(doc.text(&command.first_required_argument().unwrap().inner()), "Intro");
        assert_eq!(names(&doc), vec!["\\section*", "\\label"]);
    }

    #[test]
    fn verbatim_bodies_are_not_parsed() {
        let doc = parse("\\begin{lstlisting}[label=code]\n\\label{nope} { \n\\end{lstlisting}");
        assert_eq!(names(&doc), vec!["\\begin", "\\end"]);
    }

    #[test]
    fn masking_keeps_offsets() {
        let source = "\\begin{verbatim}\\x{\n\\end{verbatim} \\verb|\\y| \\section*{A}";
        let masked = mask_raw_regions(source);
        assert_eq!(masked.len(), source.len());
        assert_eq!(masked, "\\begin{verbatim}   \n\\end{verbatim} \\verb|  | \\section {A}");
    }

    #[test]
    fn commented_begin_opens_no_verbatim_body() {
        let doc = parse("% \\begin{verbatim}\n\\label{x}");
        assert_eq!(names(&doc), vec!["\\label"]);
    }

    #[test]
    fn comments_hide_commands() {
        let doc = parse("% \\label{hidden}\n\\label{shown}");
        assert_eq!(names(&doc), vec!["\\label"]);
    }

    #[test]
    fn unclosed_brace_reports_line() {
        let err = Document::parse("bad.tex", "ok\n\\section{never closed").unwrap_err();
        assert!(matches!(err, Error::ParseFailed { line: 2, .. }));
    }

    #[test]
    fn control_symbols_are_not_commands() {
        let doc = parse("a\\\\[2pt] \\%b \\label{x}");
        assert_eq!(names(&doc), vec!["\\label"]);
    }

    #[test]
    fn verb_body_is_skipped() {
        let doc = parse("\\verb|\\label{x}| \\ref{y}");
        assert_eq!(names(&doc), vec!["\\verb", "\\ref"]);
    }

    #[test]
    fn previous_siblings_are_nearest_first() {
        let doc = parse("\\section{A}\\section{B}\\label{x}");
        let label = doc.commands().last().unwrap();
        let sections: Vec<_> = doc
            .previous_siblings(label)
            .filter(|s| return doc.command(*s).is_some())
            .collect();
        assert_eq!(sections.len(), 2);
        let nearest = doc.command(sections[0]).unwrap();
        assert_eq!(doc.text(&nearest.first_required_argument().unwrap().inner()), "B");
    }

    #[test]
    fn line_numbers_are_one_based() {
        let doc = parse("a\nb\n\\label{x}");
        let label = doc.commands().next().unwrap();
        assert_eq!(doc.line_of(doc.node(label).range.start), 3);
    }
}
