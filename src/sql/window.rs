use std::collections::HashMap;

use crate::{
    sql::{
        aggregate::{Accum, AggKind},
        ast::{Expr, Frame, FrameBound, OrderSpec},
        eval::{eval, key_atom, Env, InSet, KeyAtom},
        exec::Rows,
    },
    value::Value,
    Error, Result,
};

// rows of one partition in ORDER BY order, with each row's original
// position.
fn sort_partition(
    rows: &Rows,
    members: &mut Vec<usize>,
    order_by: &[OrderSpec],
    sets: &[InSet],
) -> Result<()> {
    if order_by.is_empty() {
        return Ok(());
    }

    let mut keys: HashMap<usize, Vec<Value>> = HashMap::with_capacity(members.len());
    for row in members.iter() {
        let env = Env::plain(rows, *row, sets);
        let mut vals = Vec::with_capacity(order_by.len());
        for spec in order_by {
            vals.push(eval(&spec.expr, &env)?);
        }
        keys.insert(*row, vals);
    }

    members.sort_by(|a, b| {
        let (ka, kb) = (&keys[a], &keys[b]);
        for (i, spec) in order_by.iter().enumerate() {
            let ord = ka[i].sort_cmp(&kb[i]);
            let ord = if spec.desc { ord.reverse() } else { ord };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(())
}

// frame of row positions [start, end] within a sorted partition of `len`
// rows. Default with ORDER BY is unbounded-preceding..current-row, without
// it the whole partition.
fn frame_range(
    frame: Option<&Frame>,
    has_order: bool,
    pos: usize,
    len: usize,
) -> (usize, usize) {
    match frame {
        Some(frame) => {
            let start = match &frame.start {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::Preceding(n) => pos.saturating_sub(*n as usize),
                FrameBound::CurrentRow => pos,
                FrameBound::Following(n) => std::cmp::min(pos + *n as usize, len - 1),
                FrameBound::UnboundedFollowing => len - 1,
            };
            let end = match &frame.end {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::Preceding(n) => pos.saturating_sub(*n as usize),
                FrameBound::CurrentRow => pos,
                FrameBound::Following(n) => std::cmp::min(pos + *n as usize, len - 1),
                FrameBound::UnboundedFollowing => len - 1,
            };
            (start, end)
        }
        None if has_order => (0, pos),
        None => (0, len - 1),
    }
}

/// Compute every window-call in `exprs` over `rows`, returning per-call
/// value columns aligned with the input rows. Partitions are keyed by the
/// PARTITION BY expressions, each partition ordered by its ORDER BY, and
/// the function evaluated per row over its frame.
pub(crate) fn compute_windows(
    rows: &Rows,
    exprs: &[Expr],
    sets: &[InSet],
) -> Result<Vec<(Expr, Vec<Value>)>> {
    let mut out = vec![];

    for expr in exprs {
        let (name, args, star, spec) = match expr {
            Expr::Function { name, args, star, window: Some(spec) } => {
                (name, args, *star, spec)
            }
            _ => err_at!(Fatal, msg: "not a window call")?,
        };

        // partition by key, preserving scan order within each partition.
        let mut partitions: Vec<Vec<usize>> = vec![];
        let mut by_key: HashMap<Vec<KeyAtom>, usize> = HashMap::new();
        for row in 0..rows.len() {
            let env = Env::plain(rows, row, sets);
            let mut key = Vec::with_capacity(spec.partition_by.len());
            for expr in &spec.partition_by {
                key.push(key_atom(&eval(expr, &env)?));
            }
            let at = match by_key.get(&key) {
                Some(at) => *at,
                None => {
                    by_key.insert(key, partitions.len());
                    partitions.push(vec![]);
                    partitions.len() - 1
                }
            };
            partitions[at].push(row);
        }

        let mut vals = vec![Value::Null; rows.len()];
        for members in partitions.iter_mut() {
            sort_partition(rows, members, &spec.order_by, sets)?;

            if name == "ROW_NUMBER" {
                for (pos, row) in members.iter().enumerate() {
                    vals[*row] = Value::I64(pos as i64 + 1);
                }
                continue;
            }

            let kind = match AggKind::from_name(name) {
                Some(kind) => kind,
                None => err_at!(PlanSQL, msg: "unknown window function {}", name)?,
            };

            // argument value per partition row, in sorted order.
            let mut arg_vals = Vec::with_capacity(members.len());
            for row in members.iter() {
                let env = Env::plain(rows, *row, sets);
                let val = match (star, args.first()) {
                    (true, _) => Value::I64(1),
                    (false, Some(arg)) => eval(arg, &env)?,
                    (false, None) => {
                        err_at!(PlanSQL, msg: "{} needs an argument", name)?
                    }
                };
                arg_vals.push(val);
            }

            let has_order = !spec.order_by.is_empty();
            for (pos, row) in members.iter().enumerate() {
                let (start, end) =
                    frame_range(spec.frame.as_ref(), has_order, pos, members.len());
                let mut accum = Accum::new(kind);
                for val in arg_vals[start..=end].iter() {
                    accum.push(val);
                }
                vals[*row] = accum.value();
            }
        }

        out.push((expr.clone(), vals));
    }

    Ok(out)
}

#[cfg(test)]
#[path = "window_test.rs"]
mod window_test;
