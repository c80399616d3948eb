//! Axis resolver: binds pattern axes to concrete dimensions against an
//! input shape, factoring composites and tracking the ellipsis span.

use hashbrown::HashMap;

use crate::einops::ast::{Ast, AstNode, NodeId};
use crate::error::{CoreError, CoreResult};
use crate::layout::DimVec;

/// Binding of pattern axes to sizes, plus the resolved output shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPattern {
    pub axis_dims: HashMap<String, usize>,
    pub output_shape: DimVec,
    pub ellipsis_dims: Option<DimVec>,
}

/// Resolves `ast` against `input_shape`, optionally seeded with caller
/// `provided` sizes (used by `repeat` for new output axes, and by
/// `rearrange`/`reduce` callers that want to assert a composite factor).
pub fn resolve(
    ast: &Ast,
    input_shape: &[usize],
    provided: Option<&HashMap<String, usize>>,
) -> CoreResult<ResolvedPattern> {
    let mut axis_dims: HashMap<String, usize> = provided.cloned().unwrap_or_default();

    let non_ellipsis_count = ast
        .input
        .iter()
        .filter(|&&id| !matches!(ast.node(id), AstNode::Ellipsis))
        .count();
    let has_ellipsis = ast
        .input
        .iter()
        .any(|&id| matches!(ast.node(id), AstNode::Ellipsis));

    let rank = input_shape.len();
    let ellipsis_span = if has_ellipsis {
        if rank < non_ellipsis_count {
            return Err(CoreError::shape(format!(
                "input rank {rank} is too small for pattern with {non_ellipsis_count} named axes"
            )));
        }
        rank - non_ellipsis_count
    } else {
        if rank != non_ellipsis_count {
            return Err(CoreError::shape(format!(
                "input rank {rank} does not match pattern with {non_ellipsis_count} axes"
            )));
        }
        0
    };

    let mut dim_idx = 0usize;
    let mut ellipsis_dims: Option<DimVec> = None;

    for &id in &ast.input {
        match ast.node(id) {
            AstNode::Ellipsis => {
                let dims: DimVec = input_shape[dim_idx..dim_idx + ellipsis_span]
                    .iter()
                    .copied()
                    .collect();
                dim_idx += ellipsis_span;
                ellipsis_dims = Some(dims);
            }
            AstNode::Simple(name) => {
                let current = input_shape[dim_idx];
                dim_idx += 1;
                bind_simple(&mut axis_dims, name, current)?;
            }
            AstNode::Singleton => {
                let current = input_shape[dim_idx];
                dim_idx += 1;
                if current != 1 {
                    return Err(CoreError::shape(format!(
                        "singleton axis expected dimension 1, found {current}"
                    )));
                }
            }
            AstNode::Composite(_) => {
                let current = input_shape[dim_idx];
                dim_idx += 1;
                resolve_composite(ast, id, current, &mut axis_dims)?;
            }
        }
    }

    debug_assert_eq!(dim_idx, rank);

    let output_shape = build_output_shape(ast, &axis_dims, ellipsis_dims.as_deref())?;

    Ok(ResolvedPattern {
        axis_dims,
        output_shape,
        ellipsis_dims,
    })
}

fn bind_simple(axis_dims: &mut HashMap<String, usize>, name: &str, current: usize) -> CoreResult<()> {
    match axis_dims.get(name) {
        Some(&known) if known != current => Err(CoreError::shape(format!(
            "axis '{name}' bound to {known} but observed dimension {current}"
        ))),
        Some(_) => Ok(()),
        None => {
            axis_dims.insert(name.to_string(), current);
            Ok(())
        }
    }
}

/// Flattens a composite to its simple axis names and factors `current`
/// across them: at most one name may be unknown.
fn resolve_composite(
    ast: &Ast,
    id: NodeId,
    current: usize,
    axis_dims: &mut HashMap<String, usize>,
) -> CoreResult<()> {
    let names = ast.flatten_simple_names(id);
    if names.is_empty() {
        // Empty composite `()`: validator rejects this for rearrange/reduce;
        // here it is simply treated as a unit dimension.
        if current != 1 {
            return Err(CoreError::shape(format!(
                "empty composite expected dimension 1, found {current}"
            )));
        }
        return Ok(());
    }

    let mut unknown: Option<&str> = None;
    let mut known_product: usize = 1;
    for &name in &names {
        match axis_dims.get(name) {
            Some(&v) => known_product *= v,
            None => {
                if unknown.is_some() {
                    return Err(CoreError::shape(format!(
                        "composite has more than one unknown axis among {names:?}"
                    )));
                }
                unknown = Some(name);
            }
        }
    }

    match unknown {
        None => {
            if known_product != current {
                return Err(CoreError::shape(format!(
                    "composite {names:?} product {known_product} does not match observed dimension {current}"
                )));
            }
        }
        Some(name) => {
            if known_product == 0 || current % known_product != 0 {
                return Err(CoreError::shape(format!(
                    "composite {names:?}: dimension {current} is not evenly divisible by known product {known_product}"
                )));
            }
            axis_dims.insert(name.to_string(), current / known_product);
        }
    }
    Ok(())
}

fn build_output_shape(
    ast: &Ast,
    axis_dims: &HashMap<String, usize>,
    ellipsis_dims: Option<&[usize]>,
) -> CoreResult<DimVec> {
    let mut shape = DimVec::new();
    for &id in &ast.output {
        match ast.node(id) {
            AstNode::Ellipsis => {
                let dims = ellipsis_dims.ok_or_else(|| {
                    CoreError::shape("output references '...' but input had no ellipsis")
                })?;
                shape.extend(dims.iter().copied());
            }
            _ => shape.push(node_dim_product(ast, id, axis_dims, ellipsis_dims)?),
        }
    }
    Ok(shape)
}

/// Resolves a single output node to one dimension: the bound size for a
/// simple axis, 1 for a singleton, the product of the captured ellipsis
/// span, or the product of a composite's children (recursively).
fn node_dim_product(
    ast: &Ast,
    id: NodeId,
    axis_dims: &HashMap<String, usize>,
    ellipsis_dims: Option<&[usize]>,
) -> CoreResult<usize> {
    match ast.node(id) {
        AstNode::Simple(name) => axis_dims
            .get(name.as_str())
            .copied()
            .ok_or_else(|| CoreError::shape(format!("output axis '{name}' is not bound"))),
        AstNode::Singleton => Ok(1),
        AstNode::Ellipsis => Ok(ellipsis_dims
            .ok_or_else(|| CoreError::shape("output references '...' but input had no ellipsis"))?
            .iter()
            .product()),
        AstNode::Composite(children) => {
            let mut product = 1usize;
            for &child in children {
                product *= node_dim_product(ast, child, axis_dims, ellipsis_dims)?;
            }
            Ok(product)
        }
    }
}
