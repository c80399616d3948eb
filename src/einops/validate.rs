//! Validates a parsed pattern against the rules for a specific operation
//! kind: rearrange, reduce, or repeat.

use hashbrown::{HashMap, HashSet};

use crate::einops::ast::{Ast, AstNode, NodeId};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Rearrange,
    Reduce,
    Repeat,
}

/// Runs the rules common to every operation kind, then the kind-specific
/// rules. `axes` is the caller-provided size map (used by `repeat` to
/// check new output axes and provided-size positivity).
pub fn validate(ast: &Ast, kind: OpKind, axes: Option<&HashMap<String, usize>>) -> CoreResult<()> {
    validate_single_ellipsis(ast, &ast.input)?;
    validate_single_ellipsis(ast, &ast.output)?;
    validate_unique_names(ast, &ast.input, "input")?;
    validate_unique_names(ast, &ast.output, "output")?;

    match kind {
        OpKind::Rearrange => {
            validate_no_empty_composite(ast)?;
            validate_rearrange(ast)
        }
        OpKind::Reduce => {
            validate_no_empty_composite(ast)?;
            validate_reduce(ast)
        }
        OpKind::Repeat => validate_repeat(ast, axes),
    }
}

/// Rejects an empty composite `()`, which has no axis to factor a
/// dimension across and would otherwise be silently treated as a unit
/// dimension by the resolver.
fn validate_no_empty_composite(ast: &Ast) -> CoreResult<()> {
    for &id in ast.input.iter().chain(ast.output.iter()) {
        check_not_empty_composite(ast, id)?;
    }
    Ok(())
}

fn check_not_empty_composite(ast: &Ast, id: NodeId) -> CoreResult<()> {
    if let AstNode::Composite(children) = ast.node(id) {
        if children.is_empty() {
            return Err(CoreError::pattern_validation(
                "composite axis group '()' must contain at least one axis",
            ));
        }
        for &child in children {
            check_not_empty_composite(ast, child)?;
        }
    }
    Ok(())
}

fn validate_single_ellipsis(ast: &Ast, side: &[NodeId]) -> CoreResult<()> {
    let mut count = 0;
    for &id in side {
        if matches!(ast.node(id), AstNode::Ellipsis) {
            count += 1;
        }
    }
    if count > 1 {
        return Err(CoreError::pattern_validation(
            "at most one ellipsis is allowed per side",
        ));
    }
    Ok(())
}

fn validate_unique_names(ast: &Ast, side: &[NodeId], which: &str) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for &id in side {
        for name in ast.flatten_simple_names(id) {
            if !seen.insert(name.to_string()) {
                return Err(CoreError::pattern_validation(format!(
                    "axis '{name}' appears more than once in the {which} pattern"
                )));
            }
        }
    }
    Ok(())
}

fn input_names(ast: &Ast) -> HashSet<String> {
    ast.input
        .iter()
        .flat_map(|&id| ast.flatten_simple_names(id))
        .map(|s| s.to_string())
        .collect()
}

fn output_names(ast: &Ast) -> HashSet<String> {
    ast.output
        .iter()
        .flat_map(|&id| ast.flatten_simple_names(id))
        .map(|s| s.to_string())
        .collect()
}

fn validate_rearrange(ast: &Ast) -> CoreResult<()> {
    let input = input_names(ast);
    let output = output_names(ast);
    if input != output {
        let only_output: Vec<_> = output.difference(&input).cloned().collect();
        let only_input: Vec<_> = input.difference(&output).cloned().collect();
        return Err(CoreError::pattern_validation(format!(
            "rearrange input and output axis sets must match; only in output: {only_output:?}, only in input: {only_input:?}"
        )));
    }
    Ok(())
}

fn validate_reduce(ast: &Ast) -> CoreResult<()> {
    let input = input_names(ast);
    let output = output_names(ast);
    let extra: Vec<_> = output.difference(&input).cloned().collect();
    if !extra.is_empty() {
        return Err(CoreError::pattern_validation(format!(
            "reduce output axes must be a subset of input axes; unknown: {extra:?}"
        )));
    }
    Ok(())
}

fn validate_repeat(ast: &Ast, axes: Option<&HashMap<String, usize>>) -> CoreResult<()> {
    for &id in &ast.input {
        if matches!(ast.node(id), AstNode::Composite(_)) {
            return Err(CoreError::pattern_validation(
                "repeat does not allow composite axes on the input side",
            ));
        }
    }

    let input = input_names(ast);
    let output = output_names(ast);
    for name in output.difference(&input) {
        let has_size = axes.and_then(|m| m.get(name)).is_some();
        if !has_size {
            return Err(CoreError::axis(format!(
                "repeat output axis '{name}' is new but has no provided size"
            )));
        }
    }

    if let Some(axes) = axes {
        for (name, &size) in axes {
            if size < 1 {
                return Err(CoreError::axis(format!(
                    "provided size for axis '{name}' must be a positive integer, got {size}"
                )));
            }
        }
    }

    Ok(())
}
