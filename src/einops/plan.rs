//! Lowers a validated, resolved pattern into a flat sequence of primitive
//! plan steps: reshape, permute, reduce, tile/expand, or a materializing
//! slice. No tree of steps — just a `Vec<PlanStep>`, mirroring the flat
//! execution-plan shape used elsewhere in this crate's lineage.

use hashbrown::HashMap;

use crate::einops::ast::{Ast, AstNode, NodeId};
use crate::einops::resolve::ResolvedPattern;
use crate::error::{CoreError, CoreResult};
use crate::kernel::ReduceOp;
use crate::layout::DimVec;

/// One split-out axis slot, used only while building a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Named(String),
    Singleton(u32),
    EllipsisSlot(usize),
}

/// A primitive operation against the strided kernel core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    Reshape(DimVec),
    Permute(Vec<usize>),
    /// Broadcast-expands the current layout's size-1 axes to `target`.
    Expand(DimVec),
    Reduce {
        axes: Vec<usize>,
        op: ReduceOp,
        keep_dims: bool,
    },
    Identity,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub output_shape: DimVec,
}

/// Builds the shared rearrange/reduce plan. `reduce_op` is `None` for a
/// pure rearrange.
pub fn plan_rearrange_or_reduce(
    ast: &Ast,
    resolved: &ResolvedPattern,
    reduce_op: Option<ReduceOp>,
    keep_dims: bool,
) -> CoreResult<Plan> {
    let mut singleton_counter = 0u32;
    let split: Vec<(Label, usize)> =
        flatten_side_with_sizes(ast, &ast.input, &resolved.axis_dims, resolved.ellipsis_dims.as_deref(), &mut singleton_counter);
    let split_shape: DimVec = split.iter().map(|(_, size)| *size).collect();
    let split_labels: Vec<Label> = split.iter().map(|(l, _)| l.clone()).collect();

    let mut singleton_counter_out = 0u32;
    let output_flat: Vec<Label> = flatten_side_labels(
        ast,
        &ast.output,
        resolved.ellipsis_dims.as_deref(),
        &mut singleton_counter_out,
    );

    // Output labels with no counterpart in the input split (e.g. a newly
    // inserted trailing `1`) don't participate in the permute step at all;
    // the final reshape to `resolved.output_shape` accounts for them since
    // a literal-1 axis never changes the element count.
    let kept_positions: Vec<usize> = output_flat
        .iter()
        .filter_map(|label| split_labels.iter().position(|l| l == label))
        .collect();

    let reduced_positions: Vec<usize> = (0..split_labels.len())
        .filter(|i| !kept_positions.contains(i))
        .collect();

    if reduce_op.is_none() && !reduced_positions.is_empty() {
        return Err(CoreError::pattern_validation(
            "rearrange output must reference every input axis",
        ));
    }

    let mut perm: Vec<usize> = kept_positions.clone();
    perm.extend(reduced_positions.iter().copied());

    let mut steps = Vec::new();
    steps.push(PlanStep::Reshape(split_shape.clone()));

    let is_identity_perm = perm.iter().enumerate().all(|(i, &p)| i == p);
    if !is_identity_perm {
        steps.push(PlanStep::Permute(perm.clone()));
    }

    let permuted_shape: DimVec = perm.iter().map(|&i| split_shape[i]).collect();

    let mut final_intermediate_shape = permuted_shape.clone();
    if let Some(op) = reduce_op {
        let axes: Vec<usize> = (kept_positions.len()..perm.len()).collect();
        if !axes.is_empty() {
            steps.push(PlanStep::Reduce {
                axes: axes.clone(),
                op,
                keep_dims,
            });
            final_intermediate_shape = permuted_shape
                .iter()
                .enumerate()
                .filter_map(|(i, &d)| {
                    if axes.contains(&i) {
                        if keep_dims {
                            Some(1)
                        } else {
                            None
                        }
                    } else {
                        Some(d)
                    }
                })
                .collect();
        }
    }

    if final_intermediate_shape != resolved.output_shape {
        steps.push(PlanStep::Reshape(resolved.output_shape.clone()));
    }

    if steps.len() == 1 && matches!(steps[0], PlanStep::Reshape(ref s) if *s == split_shape)
        && split_shape == resolved.output_shape
    {
        steps = vec![PlanStep::Identity];
    }

    Ok(Plan {
        steps,
        output_shape: resolved.output_shape.clone(),
    })
}

/// Builds the `repeat` plan: permute existing axes into output order,
/// splice in new singleton axes, expand them to their target sizes, then
/// reshape to the final (possibly composite-merged) output shape.
pub fn plan_repeat(ast: &Ast, resolved: &ResolvedPattern) -> CoreResult<Plan> {
    let mut counter = 0u32;
    let input_flat: Vec<Label> = flatten_side_labels(
        ast,
        &ast.input,
        resolved.ellipsis_dims.as_deref(),
        &mut counter,
    );
    let input_shape: DimVec = input_flat
        .iter()
        .map(|label| dim_for_label(label, &resolved.axis_dims, resolved.ellipsis_dims.as_deref()))
        .collect::<CoreResult<Vec<_>>>()?
        .into();

    let mut counter_out = 0u32;
    let output_flat: Vec<Label> = flatten_side_labels(
        ast,
        &ast.output,
        resolved.ellipsis_dims.as_deref(),
        &mut counter_out,
    );

    let existing_order: Vec<&Label> = output_flat
        .iter()
        .filter(|label| input_flat.contains(label))
        .collect();
    let perm: Vec<usize> = existing_order
        .iter()
        .map(|label| input_flat.iter().position(|l| l == *label).unwrap())
        .collect();

    let mut steps = Vec::new();
    steps.push(PlanStep::Reshape(input_shape.clone()));
    let is_identity_perm = perm.iter().enumerate().all(|(i, &p)| i == p) && perm.len() == input_flat.len();
    if !is_identity_perm {
        steps.push(PlanStep::Permute(perm.clone()));
    }
    let permuted_shape: DimVec = perm.iter().map(|&i| input_shape[i]).collect();

    // Splice singleton slots for new axes at their output position, then
    // expand them to their target size.
    let mut with_ones: DimVec = DimVec::new();
    let mut target: DimVec = DimVec::new();
    let mut permuted_iter = permuted_shape.iter();
    for label in &output_flat {
        if input_flat.contains(label) {
            with_ones.push(*permuted_iter.next().unwrap());
            target.push(dim_for_label(label, &resolved.axis_dims, resolved.ellipsis_dims.as_deref())?);
        } else {
            with_ones.push(1);
            target.push(dim_for_label(label, &resolved.axis_dims, resolved.ellipsis_dims.as_deref())?);
        }
    }

    if with_ones != permuted_shape {
        steps.push(PlanStep::Reshape(with_ones.clone()));
    }
    if target != with_ones {
        steps.push(PlanStep::Expand(target.clone()));
    }
    if target != resolved.output_shape {
        steps.push(PlanStep::Reshape(resolved.output_shape.clone()));
    }

    if steps.is_empty() {
        steps.push(PlanStep::Identity);
    }

    Ok(Plan {
        steps,
        output_shape: resolved.output_shape.clone(),
    })
}

fn dim_for_label(
    label: &Label,
    axis_dims: &HashMap<String, usize>,
    ellipsis_dims: Option<&[usize]>,
) -> CoreResult<usize> {
    match label {
        Label::Named(name) => axis_dims
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::axis(format!("axis '{name}' has no known size"))),
        Label::Singleton(_) => Ok(1),
        Label::EllipsisSlot(i) => Ok(ellipsis_dims.and_then(|d| d.get(*i).copied()).unwrap_or(1)),
    }
}

fn flatten_side_with_sizes(
    ast: &Ast,
    side: &[NodeId],
    axis_dims: &HashMap<String, usize>,
    ellipsis_dims: Option<&[usize]>,
    singleton_counter: &mut u32,
) -> Vec<(Label, usize)> {
    let mut out = Vec::new();
    for &id in side {
        flatten_node_with_sizes(ast, id, axis_dims, ellipsis_dims, singleton_counter, &mut out);
    }
    out
}

fn flatten_node_with_sizes(
    ast: &Ast,
    id: NodeId,
    axis_dims: &HashMap<String, usize>,
    ellipsis_dims: Option<&[usize]>,
    singleton_counter: &mut u32,
    out: &mut Vec<(Label, usize)>,
) {
    match ast.node(id) {
        AstNode::Simple(name) => {
            let size = axis_dims.get(name).copied().unwrap_or(1);
            out.push((Label::Named(name.clone()), size));
        }
        AstNode::Singleton => {
            out.push((Label::Singleton(*singleton_counter), 1));
            *singleton_counter += 1;
        }
        AstNode::Ellipsis => {
            if let Some(dims) = ellipsis_dims {
                for (i, &d) in dims.iter().enumerate() {
                    out.push((Label::EllipsisSlot(i), d));
                }
            }
        }
        AstNode::Composite(children) => {
            for &child in children {
                flatten_node_with_sizes(ast, child, axis_dims, ellipsis_dims, singleton_counter, out);
            }
        }
    }
}

fn flatten_side_labels(
    ast: &Ast,
    side: &[NodeId],
    ellipsis_dims: Option<&[usize]>,
    singleton_counter: &mut u32,
) -> Vec<Label> {
    let mut out = Vec::new();
    for &id in side {
        flatten_node_labels(ast, id, ellipsis_dims, singleton_counter, &mut out);
    }
    out
}

fn flatten_node_labels(
    ast: &Ast,
    id: NodeId,
    ellipsis_dims: Option<&[usize]>,
    singleton_counter: &mut u32,
    out: &mut Vec<Label>,
) {
    match ast.node(id) {
        AstNode::Simple(name) => out.push(Label::Named(name.clone())),
        AstNode::Singleton => {
            out.push(Label::Singleton(*singleton_counter));
            *singleton_counter += 1;
        }
        AstNode::Ellipsis => {
            let span = ellipsis_dims.map(|d| d.len()).unwrap_or(0);
            for i in 0..span {
                out.push(Label::EllipsisSlot(i));
            }
        }
        AstNode::Composite(children) => {
            for &child in children {
                flatten_node_labels(ast, child, ellipsis_dims, singleton_counter, out);
            }
        }
    }
}
