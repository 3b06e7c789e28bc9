use log::debug;

use std::collections::BTreeMap;

use crate::{
    index::{ColumnPred, IndexKey, RowSet},
    sql::ast::{BinaryOp, Expr, InList},
    table::ColumnarTable,
    value::Value,
    Result,
};

// a WHERE factor the index planner understands.
#[derive(Clone, Debug)]
enum FactorPred {
    Cmp { column: String, op: BinaryOp, val: Value },
    Between { column: String, lo: Value, hi: Value },
    In { column: String, vals: Vec<Value> },
}

impl FactorPred {
    fn column(&self) -> &str {
        match self {
            FactorPred::Cmp { column, .. } => column,
            FactorPred::Between { column, .. } => column,
            FactorPred::In { column, .. } => column,
        }
    }
}

fn literal(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Literal(val) if !val.is_null() => Some(val),
        _ => None,
    }
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column { name, .. } => Some(name),
        _ => None,
    }
}

// recognize one AND-factor; anything else stays a residual filter.
fn factor_pred(expr: &Expr) -> Option<FactorPred> {
    match expr {
        Expr::Binary { op, left, right } => {
            let op = *op;
            if !matches!(
                op,
                BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
            ) {
                return None;
            }
            if let (Some(column), Some(val)) = (column_name(left), literal(right)) {
                return Some(FactorPred::Cmp {
                    column: column.to_string(),
                    op,
                    val: val.clone(),
                });
            }
            // literal on the left, flip the comparison.
            if let (Some(val), Some(column)) = (literal(left), column_name(right)) {
                let op = match op {
                    BinaryOp::Lt => BinaryOp::Gt,
                    BinaryOp::Le => BinaryOp::Ge,
                    BinaryOp::Gt => BinaryOp::Lt,
                    BinaryOp::Ge => BinaryOp::Le,
                    op => op,
                };
                return Some(FactorPred::Cmp {
                    column: column.to_string(),
                    op,
                    val: val.clone(),
                });
            }
            None
        }
        Expr::Between { expr, lo, hi, negated: false } => {
            let column = column_name(expr)?;
            Some(FactorPred::Between {
                column: column.to_string(),
                lo: literal(lo)?.clone(),
                hi: literal(hi)?.clone(),
            })
        }
        Expr::In { exprs, list, negated: false } => {
            let column = match exprs.as_slice() {
                [expr] => column_name(expr)?,
                _ => return None,
            };
            let rows = match list {
                InList::Exprs(rows) => rows,
                _ => return None,
            };
            let mut vals = vec![];
            for row in rows {
                match row.as_slice() {
                    [expr] => vals.push(literal(expr)?.clone()),
                    _ => return None,
                }
            }
            Some(FactorPred::In { column: column.to_string(), vals })
        }
        _ => None,
    }
}

// tightest-bound merge of comparison factors into a per-column predicate.
fn merge_preds(factors: &[(usize, FactorPred)]) -> Result<BTreeMap<String, ColumnPred>> {
    // effective bounds per column: (key, inclusive)
    struct Bounds {
        eq: Option<IndexKey>,
        lo: Option<(IndexKey, bool)>,
        hi: Option<(IndexKey, bool)>,
    }

    let mut map: BTreeMap<String, Bounds> = BTreeMap::new();
    for (_, factor) in factors {
        let entry = map.entry(factor.column().to_string()).or_insert(Bounds {
            eq: None,
            lo: None,
            hi: None,
        });
        match factor {
            FactorPred::Cmp { op: BinaryOp::Eq, val, .. } => {
                entry.eq = Some(IndexKey::from_value(val)?);
            }
            FactorPred::Cmp { op, val, .. } => {
                let key = IndexKey::from_value(val)?;
                match op {
                    BinaryOp::Ge => tighten_lo(&mut entry.lo, key, true),
                    BinaryOp::Gt => tighten_lo(&mut entry.lo, key, false),
                    BinaryOp::Le => tighten_hi(&mut entry.hi, key, true),
                    BinaryOp::Lt => tighten_hi(&mut entry.hi, key, false),
                    _ => unreachable!(),
                }
            }
            FactorPred::Between { lo, hi, .. } => {
                tighten_lo(&mut entry.lo, IndexKey::from_value(lo)?, true);
                tighten_hi(&mut entry.hi, IndexKey::from_value(hi)?, true);
            }
            FactorPred::In { .. } => (),
        }
    }

    let mut preds = BTreeMap::new();
    for (column, bounds) in map {
        let mut pred = ColumnPred::default();
        pred.eq = bounds.eq;
        match bounds.lo {
            Some((key, true)) => pred.gte = Some(key),
            Some((key, false)) => pred.gt = Some(key),
            None => (),
        }
        match bounds.hi {
            Some((key, true)) => pred.lte = Some(key),
            Some((key, false)) => pred.lt = Some(key),
            None => (),
        }
        preds.insert(column, pred);
    }
    Ok(preds)
}

fn tighten_lo(slot: &mut Option<(IndexKey, bool)>, key: IndexKey, incl: bool) {
    let tighter = match slot {
        Some((cur, cur_incl)) => key > *cur || (key == *cur && *cur_incl && !incl),
        None => true,
    };
    if tighter {
        *slot = Some((key, incl));
    }
}

fn tighten_hi(slot: &mut Option<(IndexKey, bool)>, key: IndexKey, incl: bool) {
    let tighter = match slot {
        Some((cur, cur_incl)) => key < *cur || (key == *cur && *cur_incl && !incl),
        None => true,
    };
    if tighter {
        *slot = Some((key, incl));
    }
}

/// Outcome of index planning: the candidate row set, the factor ordinals
/// the index fully answered, and a human-readable name for the chosen
/// index.
#[derive(Debug)]
pub(crate) struct IndexPlan {
    pub candidate: RowSet,
    pub consumed: Vec<usize>,
    pub chosen: String,
}

/// Decompose `factors` (the WHERE clause's AND-factors) and pick the best
/// index on `table`: composite indexes by longest covered prefix, then
/// single-column ordered indexes, then `IN` literal lists unioned through
/// the ordered index into a bitmap. When several indexes apply, most
/// factors covered wins, ties broken by the smaller candidate set.
/// `None` means full scan.
pub(crate) fn try_use_index(
    table: &ColumnarTable,
    factors: &[&Expr],
) -> Result<Option<IndexPlan>> {
    let recognized: Vec<(usize, FactorPred)> = factors
        .iter()
        .enumerate()
        .filter_map(|(i, expr)| factor_pred(expr).map(|p| (i, p)))
        .collect();
    if recognized.is_empty() {
        return Ok(None);
    }

    let preds = merge_preds(&recognized)?;
    let mut plans: Vec<IndexPlan> = vec![];

    // composite indexes, prefix coverage.
    for index in table.composite_indexes() {
        let (eqs, range) = index.coverage(&preds);
        if eqs == 0 && !range {
            continue;
        }
        let covered: Vec<&String> = index.as_columns()[..eqs + (range as usize)]
            .iter()
            .collect();
        let consumed: Vec<usize> = recognized
            .iter()
            .filter(|(_, f)| {
                !matches!(f, FactorPred::In { .. })
                    && covered.iter().any(|c| c.as_str() == f.column())
            })
            .map(|(i, _)| *i)
            .collect();
        let rows = index.query(&preds)?;
        plans.push(IndexPlan {
            candidate: RowSet::from_slice(&rows),
            consumed,
            chosen: format!("composite({})", index.as_columns().join(",")),
        });
    }

    // single-column ordered indexes.
    for (column, pred) in preds.iter() {
        let index = match table.ordered_index(column) {
            Some(index) => index,
            None => continue,
        };
        if !pred.is_eq() && !pred.has_range() {
            continue;
        }

        let rows = match &pred.eq {
            Some(key) => index.query_eq(key),
            None => {
                let lo = pred.gte.as_ref().map(|k| (k, true));
                let lo = lo.or_else(|| pred.gt.as_ref().map(|k| (k, false)));
                let hi = pred.lte.as_ref().map(|k| (k, true));
                let hi = hi.or_else(|| pred.lt.as_ref().map(|k| (k, false)));
                index.query_bounds(lo, hi)
            }
        };
        let consumed: Vec<usize> = recognized
            .iter()
            .filter(|(_, f)| {
                !matches!(f, FactorPred::In { .. }) && f.column() == column.as_str()
            })
            .map(|(i, _)| *i)
            .collect();
        plans.push(IndexPlan {
            candidate: RowSet::from_slice(&rows),
            consumed,
            chosen: format!("ordered({})", column),
        });
    }

    // IN (literals) through an ordered index, unioned into a bitmap.
    for (i, factor) in recognized.iter() {
        let (column, vals) = match factor {
            FactorPred::In { column, vals } => (column, vals),
            _ => continue,
        };
        let index = match table.ordered_index(column) {
            Some(index) => index,
            None => continue,
        };

        let mut candidate = RowSet::new();
        for val in vals {
            for row in index.query_eq(&IndexKey::from_value(val)?) {
                candidate.add(row);
            }
        }
        plans.push(IndexPlan {
            candidate,
            consumed: vec![*i],
            chosen: format!("bitmap({})", column),
        });
    }

    if plans.is_empty() {
        return Ok(None);
    }

    plans.sort_by(|a, b| {
        b.consumed
            .len()
            .cmp(&a.consumed.len())
            .then(a.candidate.len().cmp(&b.candidate.len()))
    });
    let plan = plans.remove(0);
    debug!(
        target: "sql",
        "index plan {} covers {} factors, {} candidate rows",
        plan.chosen, plan.consumed.len(), plan.candidate.len()
    );
    Ok(Some(plan))
}

/// Recover a closed `[lo, hi]` range for `column` from the AND-chained
/// comparisons of `expr`. Strict integer bounds are folded inward; a
/// missing side is returned as `i64::MIN`/`i64::MAX`. Used for partition
/// pruning.
pub fn extract_time_range(expr: &Expr, column: &str) -> Option<(i64, i64)> {
    let (mut lo, mut hi) = (None::<i64>, None::<i64>);
    let mut raise = |slot: &mut Option<i64>, v: i64, max: bool| {
        *slot = Some(match *slot {
            Some(cur) if max => std::cmp::max(cur, v),
            Some(cur) => std::cmp::min(cur, v),
            None => v,
        });
    };

    for factor in expr.and_factors() {
        let pred = match factor_pred(factor) {
            Some(pred) if pred.column() == column => pred,
            _ => continue,
        };
        match pred {
            FactorPred::Cmp { op, val, .. } => {
                let v = val.as_i64()?;
                match op {
                    BinaryOp::Eq => {
                        raise(&mut lo, v, true);
                        raise(&mut hi, v, false);
                    }
                    BinaryOp::Ge => raise(&mut lo, v, true),
                    BinaryOp::Gt => raise(&mut lo, v.saturating_add(1), true),
                    BinaryOp::Le => raise(&mut hi, v, false),
                    BinaryOp::Lt => raise(&mut hi, v.saturating_sub(1), false),
                    _ => (),
                }
            }
            FactorPred::Between { lo: a, hi: b, .. } => {
                raise(&mut lo, a.as_i64()?, true);
                raise(&mut hi, b.as_i64()?, false);
            }
            FactorPred::In { .. } => (),
        }
    }

    match (lo, hi) {
        (None, None) => None,
        (lo, hi) => Some((lo.unwrap_or(i64::MIN), hi.unwrap_or(i64::MAX))),
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod plan_test;
