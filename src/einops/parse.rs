//! Parses a scanned token stream into a pattern [`Ast`].

use crate::einops::ast::{Ast, AstMeta, AstNode, NodeId, Position};
use crate::einops::scan::{scan, Token, TokenKind};
use crate::error::{CoreError, CoreResult};

/// Parses a full `"side -> side"` pattern string.
pub fn parse(source: &str) -> CoreResult<Ast> {
    let tokens = scan(source)?;

    let arrow_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Arrow)
        .map(|(i, _)| i)
        .collect();

    match arrow_positions.len() {
        0 => {
            return Err(CoreError::pattern_parse(
                "pattern is missing '->'",
                Position::new(0, source.len()),
            ))
        }
        1 => {}
        _ => {
            let pos = tokens[arrow_positions[1]].pos;
            return Err(CoreError::pattern_parse(
                "pattern has more than one '->'",
                pos,
            ));
        }
    }

    let arrow_idx = arrow_positions[0];
    let (input_tokens, rest) = tokens.split_at(arrow_idx);
    let output_tokens = &rest[1..];
    let arrow_pos = tokens[arrow_idx].pos.start;

    let mut ast = Ast::new(AstMeta {
        source: source.to_string(),
        arrow_pos,
        input_token_count: input_tokens.len(),
        output_token_count: output_tokens.len(),
    });

    let input = parse_side(&mut ast, input_tokens)?;
    let output = parse_side(&mut ast, output_tokens)?;
    ast.input = input;
    ast.output = output;
    Ok(ast)
}

/// Parses one side (a flat, possibly-nested sequence of tokens) into a list
/// of top-level node ids.
fn parse_side(ast: &mut Ast, tokens: &[Token]) -> CoreResult<Vec<NodeId>> {
    let mut pos = 0usize;
    let nodes = parse_token_list(ast, tokens, &mut pos, false)?;
    if pos != tokens.len() {
        let bad = &tokens[pos];
        return Err(CoreError::pattern_parse(
            format!("unexpected token after pattern side: {:?}", bad.kind),
            bad.pos,
        ));
    }
    Ok(nodes)
}

/// Parses a sequence of tokens up to (but not consuming) a closing paren
/// when `in_group` is true, or end-of-slice otherwise.
fn parse_token_list(
    ast: &mut Ast,
    tokens: &[Token],
    pos: &mut usize,
    in_group: bool,
) -> CoreResult<Vec<NodeId>> {
    let mut nodes = Vec::new();
    while *pos < tokens.len() {
        if in_group && tokens[*pos].kind == TokenKind::RParen {
            break;
        }
        let node = parse_token(ast, tokens, pos)?;
        nodes.push(node);
    }
    Ok(nodes)
}

fn parse_token(ast: &mut Ast, tokens: &[Token], pos: &mut usize) -> CoreResult<NodeId> {
    let tok = &tokens[*pos];
    match &tok.kind {
        TokenKind::Axis(name) => {
            let id = ast.push(AstNode::Simple(name.clone()), tok.pos);
            *pos += 1;
            Ok(id)
        }
        TokenKind::Singleton => {
            let id = ast.push(AstNode::Singleton, tok.pos);
            *pos += 1;
            Ok(id)
        }
        TokenKind::Ellipsis => {
            let id = ast.push(AstNode::Ellipsis, tok.pos);
            *pos += 1;
            Ok(id)
        }
        TokenKind::LParen => {
            let start = tok.pos.start;
            *pos += 1;
            let children = parse_token_list(ast, tokens, pos, true)?;
            if *pos >= tokens.len() || tokens[*pos].kind != TokenKind::RParen {
                return Err(CoreError::pattern_parse(
                    "unbalanced '(' with no matching ')'",
                    Position::new(start, start + 1),
                ));
            }
            let end = tokens[*pos].pos.end;
            *pos += 1;
            Ok(ast.push(AstNode::Composite(children), Position::new(start, end)))
        }
        TokenKind::RParen => Err(CoreError::pattern_parse(
            "unmatched ')' with no opening '('",
            tok.pos,
        )),
        TokenKind::Arrow => Err(CoreError::pattern_parse(
            "unexpected '->' inside pattern side",
            tok.pos,
        )),
    }
}

/// NumPy-style implicit-output inference: indices appearing exactly once
/// across all input sides, sorted alphabetically. Used when a pattern
/// omits `-> output` entirely (not reachable via [`parse`], which requires
/// an explicit arrow, but kept for callers building AST nodes directly,
/// e.g. a future chained-notation entry point).
pub fn infer_output(ast: &Ast) -> Vec<String> {
    use hashbrown::HashMap;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for &id in &ast.input {
        for name in ast.flatten_simple_names(id) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    let mut once: Vec<String> = counts
        .into_iter()
        .filter(|(_, c)| *c == 1)
        .map(|(name, _)| name)
        .collect();
    once.sort();
    once
}
