use std::{cmp::Ordering, collections::HashSet};

use crate::{
    index::RowSet,
    sql::{
        aggregate::AggKind,
        ast::{BinaryOp, Expr, InList, UnaryOp},
        exec::Rows,
    },
    value::Value,
    Error, Result,
};

/// Hashable, normalized form of a value, used for group keys and IN-set
/// membership. Integral floats collapse onto the integer they equal, so
/// `1` and `1.0` group and match together.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum KeyAtom {
    Null,
    Int(i64),
    Bits(u64),
    Str(String),
}

pub(crate) fn key_atom(val: &Value) -> KeyAtom {
    match val {
        Value::Null => KeyAtom::Null,
        Value::I32(v) => KeyAtom::Int(*v as i64),
        Value::I64(v) => KeyAtom::Int(*v),
        Value::F32(v) => float_atom(*v as f64),
        Value::F64(v) => float_atom(*v),
        Value::Str(s) => KeyAtom::Str(s.clone()),
    }
}

fn float_atom(v: f64) -> KeyAtom {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        KeyAtom::Int(v as i64)
    } else {
        KeyAtom::Bits(v.to_bits())
    }
}

/// Materialized IN-subquery result. Integer-only single-column children
/// additionally carry a roaring bitmap for the u32 range.
pub(crate) struct InSet {
    pub tuples: HashSet<Vec<KeyAtom>>,
    pub bitmap: Option<RowSet>,
}

impl InSet {
    pub(crate) fn contains(&self, tuple: &[KeyAtom]) -> bool {
        if let (Some(bitmap), [KeyAtom::Int(v)]) = (&self.bitmap, tuple) {
            if *v >= 0 && *v <= u32::MAX as i64 {
                return bitmap.contains(*v as u32);
            }
            return false;
        }
        self.tuples.contains(tuple)
    }
}

/// Evaluation context: one row of a bound row-set, plus whatever computed
/// state the pipeline stage carries - group aggregates, window columns,
/// materialized IN-sets.
pub(crate) struct Env<'a> {
    pub rows: &'a Rows,
    pub row: usize,
    pub agg_specs: &'a [Expr],
    pub aggs: Option<&'a [Value]>,
    pub windows: &'a [(Expr, Vec<Value>)],
    pub sets: &'a [InSet],
}

impl<'a> Env<'a> {
    pub(crate) fn plain(rows: &'a Rows, row: usize, sets: &'a [InSet]) -> Env<'a> {
        Env { rows, row, agg_specs: &[], aggs: None, windows: &[], sets }
    }
}

/// A value is truthy when it is a non-null number other than zero.
/// Comparison operators return `1`/`0`, so filters compose naturally.
pub(crate) fn truthy(val: &Value) -> bool {
    match val {
        Value::Null | Value::Str(_) => false,
        val => val.as_f64().map_or(false, |v| v != 0.0),
    }
}

pub(crate) fn eval(expr: &Expr, env: &Env) -> Result<Value> {
    match expr {
        Expr::Literal(val) => Ok(val.clone()),
        Expr::Column { table, name } => {
            let col = env.rows.resolve(table.as_deref(), name)?;
            Ok(env.rows.value(env.row, col))
        }
        Expr::Tuple(_) => err_at!(TypeSQL, msg: "tuple outside IN"),
        Expr::Unary { op, expr } => {
            let val = eval(expr, env)?;
            match op {
                UnaryOp::Neg => match val {
                    Value::Null => Ok(Value::Null),
                    Value::I32(v) => Ok(Value::I32(-v)),
                    Value::I64(v) => Ok(Value::I64(-v)),
                    Value::F32(v) => Ok(Value::F32(-v)),
                    Value::F64(v) => Ok(Value::F64(-v)),
                    val => err_at!(TypeSQL, msg: "cannot negate {}", val),
                },
                UnaryOp::Not => match val {
                    Value::Null => Ok(Value::Null),
                    val => Ok(Value::I64(!truthy(&val) as i64)),
                },
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, env),
        Expr::In { exprs, list, negated } => {
            let mut tuple = Vec::with_capacity(exprs.len());
            for expr in exprs {
                let val = eval(expr, env)?;
                if val.is_null() {
                    return Ok(Value::I64(0));
                }
                tuple.push(key_atom(&val));
            }

            let found = match list {
                InList::Exprs(rows) => {
                    let mut found = false;
                    for row in rows {
                        if row.len() != exprs.len() {
                            err_at!(
                                TypeSQL, msg: "IN arity {} != {}", row.len(), exprs.len()
                            )?;
                        }
                        let mut matches = true;
                        for (expr, atom) in row.iter().zip(tuple.iter()) {
                            let val = eval(expr, env)?;
                            if key_atom(&val) != *atom {
                                matches = false;
                                break;
                            }
                        }
                        if matches {
                            found = true;
                            break;
                        }
                    }
                    found
                }
                InList::Set(i) => env.sets[*i].contains(&tuple),
                InList::Subquery(_) => err_at!(Fatal, msg: "unprepared IN subquery")?,
            };
            Ok(Value::I64((found ^ negated) as i64))
        }
        Expr::Like { expr, pattern, negated } => {
            let (val, pat) = (eval(expr, env)?, eval(pattern, env)?);
            match (val, pat) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::I64(0)),
                (Value::Str(s), Value::Str(p)) => {
                    Ok(Value::I64((like_match(&s, &p) ^ negated) as i64))
                }
                (val, _) => err_at!(TypeSQL, msg: "LIKE on {}", val),
            }
        }
        Expr::IsNull { expr, negated } => {
            let val = eval(expr, env)?;
            Ok(Value::I64((val.is_null() ^ negated) as i64))
        }
        Expr::Between { expr, lo, hi, negated } => {
            let val = eval(expr, env)?;
            let (lo, hi) = (eval(lo, env)?, eval(hi, env)?);
            if val.is_null() || lo.is_null() || hi.is_null() {
                return Ok(Value::I64(0));
            }
            let inside = cmp_ordering(&val, &lo)? != Ordering::Less
                && cmp_ordering(&val, &hi)? != Ordering::Greater;
            Ok(Value::I64((inside ^ negated) as i64))
        }
        Expr::Case { operand, branches, else_ } => {
            for (when, then) in branches {
                let hit = match operand {
                    Some(operand) => {
                        let lhs = eval(operand, env)?;
                        let rhs = eval(when, env)?;
                        !lhs.is_null() && !rhs.is_null() && key_atom(&lhs) == key_atom(&rhs)
                    }
                    None => truthy(&eval(when, env)?),
                };
                if hit {
                    return eval(then, env);
                }
            }
            match else_ {
                Some(expr) => eval(expr, env),
                None => Ok(Value::Null),
            }
        }
        Expr::Function { name, args, star, window } => {
            if window.is_some() {
                for (spec, vals) in env.windows {
                    if spec == expr {
                        return Ok(vals[env.row].clone());
                    }
                }
                return err_at!(PlanSQL, msg: "window {} outside projection", name);
            }
            if AggKind::from_name(name).is_some() {
                let aggs = match env.aggs {
                    Some(aggs) => aggs,
                    None => err_at!(PlanSQL, msg: "{} requires GROUP BY context", name)?,
                };
                for (i, spec) in env.agg_specs.iter().enumerate() {
                    if spec == expr {
                        return Ok(aggs[i].clone());
                    }
                }
                return err_at!(Fatal, msg: "uncollected aggregate {}", name);
            }
            scalar_function(name, args, *star, env)
        }
        Expr::Subquery(_) => err_at!(Fatal, msg: "unprepared scalar subquery"),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, env: &Env) -> Result<Value> {
    // logical operators get short-circuit treatment, nulls act false.
    match op {
        BinaryOp::And => {
            let lhs = truthy(&eval(left, env)?);
            if !lhs {
                return Ok(Value::I64(0));
            }
            return Ok(Value::I64(truthy(&eval(right, env)?) as i64));
        }
        BinaryOp::Or => {
            let lhs = truthy(&eval(left, env)?);
            if lhs {
                return Ok(Value::I64(1));
            }
            return Ok(Value::I64(truthy(&eval(right, env)?) as i64));
        }
        _ => (),
    }

    let (lhs, rhs) = (eval(left, env)?, eval(right, env)?);
    match op {
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
        | BinaryOp::Ge => {
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                let eq = match (&lhs, &rhs) {
                    (a, b) if a.is_numeric() && b.is_numeric() => {
                        cmp_ordering(a, b)? == Ordering::Equal
                    }
                    (Value::Str(a), Value::Str(b)) => a == b,
                    _ => false, // cross-kind equality is simply false
                };
                let hit = if op == BinaryOp::Eq { eq } else { !eq };
                return Ok(Value::I64(hit as i64));
            }

            let ord = cmp_ordering(&lhs, &rhs)?;
            let hit = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::Ge => ord != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(Value::I64(hit as i64))
        }
        BinaryOp::Concat => match (&lhs, &rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (lhs, rhs) => Ok(Value::Str(format!("{}{}", lhs, rhs))),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Rem | BinaryOp::Div => {
            arith(op, &lhs, &rhs)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

fn arith(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if !lhs.is_numeric() || !rhs.is_numeric() {
        err_at!(TypeSQL, msg: "arithmetic on {} and {}", lhs, rhs)?;
    }

    // division is always float; other operators stay integral when both
    // operands are integers.
    if op == BinaryOp::Div {
        let (a, b) = (lhs.as_f64().unwrap(), rhs.as_f64().unwrap());
        return Ok(match b == 0.0 {
            true => Value::Null,
            false => Value::F64(a / b),
        });
    }

    if lhs.is_integer() && rhs.is_integer() {
        let (a, b) = (lhs.as_i64().unwrap(), rhs.as_i64().unwrap());
        let val = match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Rem if b == 0 => return Ok(Value::Null),
            BinaryOp::Rem => a.wrapping_rem(b),
            _ => unreachable!(),
        };
        return Ok(Value::I64(val));
    }

    let (a, b) = (lhs.as_f64().unwrap(), rhs.as_f64().unwrap());
    let val = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Rem if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Rem => a % b,
        _ => unreachable!(),
    };
    Ok(Value::F64(val))
}

// ordering between two non-null values; mixed number/string ordering is a
// type error, unlike equality which is simply false.
pub(crate) fn cmp_ordering(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(a.sort_cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (a, b) => err_at!(TypeSQL, msg: "cannot compare {} with {}", a, b),
    }
}

// SQL LIKE with % (any run) and _ (one char), classic two-pointer with
// star backtracking.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pat: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0_usize, 0_usize);
    let (mut star, mut star_t) = (None, 0_usize);

    while t < text.len() {
        if p < pat.len() && (pat[p] == '_' || pat[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pat.len() && pat[p] == '%' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '%' {
        p += 1;
    }
    p == pat.len()
}

fn scalar_function(name: &str, args: &[Expr], star: bool, env: &Env) -> Result<Value> {
    if star {
        err_at!(PlanSQL, msg: "{}(*) is not a scalar function", name)?;
    }

    let arity = |want: usize| -> Result<()> {
        if args.len() != want {
            err_at!(PlanSQL, msg: "{} takes {} arguments, got {}", name, want, args.len())
        } else {
            Ok(())
        }
    };

    match name {
        "ROUND" => {
            if args.is_empty() || args.len() > 2 {
                err_at!(PlanSQL, msg: "ROUND takes 1 or 2 arguments")?;
            }
            let val = eval(&args[0], env)?;
            if val.is_null() {
                return Ok(Value::Null);
            }
            let v = match val.as_f64() {
                Some(v) => v,
                None => err_at!(TypeSQL, msg: "ROUND on {}", val)?,
            };
            let digits = match args.get(1) {
                Some(expr) => match eval(expr, env)?.as_i64() {
                    Some(d) => d,
                    None => err_at!(TypeSQL, msg: "ROUND digits")?,
                },
                None => 0,
            };
            let scale = 10_f64.powi(digits as i32);
            Ok(Value::F64((v * scale).round() / scale))
        }
        "SQRT" => {
            arity(1)?;
            let val = eval(&args[0], env)?;
            if val.is_null() {
                return Ok(Value::Null);
            }
            match val.as_f64() {
                Some(v) => Ok(Value::F64(v.sqrt())),
                None => err_at!(TypeSQL, msg: "SQRT on {}", val),
            }
        }
        "ABS" => {
            arity(1)?;
            let val = eval(&args[0], env)?;
            match val {
                Value::Null => Ok(Value::Null),
                Value::I32(v) => Ok(Value::I32(v.wrapping_abs())),
                Value::I64(v) => Ok(Value::I64(v.wrapping_abs())),
                Value::F32(v) => Ok(Value::F32(v.abs())),
                Value::F64(v) => Ok(Value::F64(v.abs())),
                val => err_at!(TypeSQL, msg: "ABS on {}", val),
            }
        }
        "COALESCE" => {
            for expr in args {
                let val = eval(expr, env)?;
                if !val.is_null() {
                    return Ok(val);
                }
            }
            Ok(Value::Null)
        }
        "LOWER" => {
            arity(1)?;
            match eval(&args[0], env)? {
                Value::Null => Ok(Value::Null),
                Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
                val => err_at!(TypeSQL, msg: "LOWER on {}", val),
            }
        }
        "UPPER" => {
            arity(1)?;
            match eval(&args[0], env)? {
                Value::Null => Ok(Value::Null),
                Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
                val => err_at!(TypeSQL, msg: "UPPER on {}", val),
            }
        }
        name => err_at!(PlanSQL, msg: "unknown function {}", name),
    }
}

#[cfg(test)]
#[path = "eval_test.rs"]
mod eval_test;
