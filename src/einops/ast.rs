//! Pattern AST: an arena of tagged nodes referenced by index, avoiding a
//! boxed tree for a structure that is built once and never mutated.

/// Index into an [`Ast`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Byte-offset span into the original pattern string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

impl Position {
    pub fn new(start: usize, end: usize) -> Self {
        Position { start, end }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single AST node. Composites reference their children by [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    Simple(String),
    Composite(Vec<NodeId>),
    Ellipsis,
    Singleton,
}

/// Metadata about how the pattern was parsed, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct AstMeta {
    pub source: String,
    pub arrow_pos: usize,
    pub input_token_count: usize,
    pub output_token_count: usize,
}

/// A fully parsed einops pattern: an arena of nodes plus the input/output
/// token sequences referencing it.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<(AstNode, Position)>,
    pub input: Vec<NodeId>,
    pub output: Vec<NodeId>,
    pub meta: AstMeta,
}

impl Ast {
    pub fn new(meta: AstMeta) -> Self {
        Ast {
            nodes: Vec::new(),
            input: Vec::new(),
            output: Vec::new(),
            meta,
        }
    }

    pub fn push(&mut self, node: AstNode, pos: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push((node, pos));
        id
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize].0
    }

    pub fn position(&self, id: NodeId) -> Position {
        self.nodes[id.0 as usize].1
    }

    /// Flattens a composite node to its leaf simple-axis names, in order.
    /// Non-composite nodes flatten to themselves.
    pub fn flatten_simple_names(&self, id: NodeId) -> Vec<&str> {
        let mut out = Vec::new();
        self.flatten_into(id, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, id: NodeId, out: &mut Vec<&'a str>) {
        match self.node(id) {
            AstNode::Simple(name) => out.push(name.as_str()),
            AstNode::Composite(children) => {
                for &child in children {
                    self.flatten_into(child, out);
                }
            }
            AstNode::Ellipsis | AstNode::Singleton => {}
        }
    }
}
