use log::debug;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering as AtomicOrdering},
        Arc,
    },
};

use crate::{
    sql::{
        aggregate::{Accum, AggKind},
        ast::{
            BinaryOp, Expr, InList, Insert, Join, JoinKind, Projection, Select,
            Statement, TableRef,
        },
        eval::{eval, key_atom, truthy, Env, InSet, KeyAtom},
        parse,
        plan::try_use_index,
        window::compute_windows,
    },
    table::{ColumnarTable, Record},
    value::Value,
    Result,
};

/// Cooperative cancellation token, checked between pipeline stages.
#[derive(Clone, Default)]
pub struct Cancel {
    flag: Arc<AtomicBool>,
}

impl Cancel {
    pub fn new() -> Cancel {
        Cancel::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            err_at!(Fatal, msg: "query cancelled")
        } else {
            Ok(())
        }
    }
}

/// Query result: output column names and row-major values.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// Index the planner picked for the outermost scan, if any.
    pub chosen_index: Option<String>,
}

impl ResultSet {
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ColMeta {
    pub qualifier: Option<String>,
    pub name: String,
}

/// Intermediate row set flowing through the pipeline. Columns carry an
/// optional qualifier (table name or alias) for resolving `t.col`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Rows {
    pub meta: Vec<ColMeta>,
    pub data: Vec<Vec<Value>>,
}

impl Rows {
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn value(&self, row: usize, col: usize) -> Value {
        self.data[row][col].clone()
    }

    /// Resolve a column reference, erroring on unknown and on ambiguous
    /// unqualified names.
    pub(crate) fn resolve(&self, qualifier: Option<&str>, name: &str) -> Result<usize> {
        let matches: Vec<usize> = self
            .meta
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                m.name == name
                    && match qualifier {
                        Some(q) => m.qualifier.as_deref() == Some(q),
                        None => true,
                    }
            })
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [col] => Ok(*col),
            [] => match qualifier {
                Some(q) => err_at!(PlanSQL, msg: "unknown column {}.{}", q, name),
                None => err_at!(PlanSQL, msg: "unknown column {}", name),
            },
            _ => err_at!(PlanSQL, msg: "ambiguous column {}", name),
        }
    }
}

// result of one (sub)select.
#[derive(Clone, Debug, Default)]
struct SelectOut {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    chosen_index: Option<String>,
}

impl SelectOut {
    fn into_rows(self, qualifier: &str) -> Rows {
        let meta = self
            .columns
            .into_iter()
            .map(|name| ColMeta { qualifier: Some(qualifier.to_string()), name })
            .collect();
        Rows { meta, data: self.rows }
    }
}

type CteMap = HashMap<String, SelectOut>;

/// Interpretive SQL executor over registered in-memory tables.
///
/// Tables are registered by name; [crate::partition::PartitionedTable]
/// integrates by materializing a pruned [ColumnarTable] first. INSERT
/// statements append to the registered table, keeping its indexes fresh.
#[derive(Default)]
pub struct Executor {
    tables: HashMap<String, ColumnarTable>,
}

impl Executor {
    pub fn new() -> Executor {
        Executor::default()
    }

    /// Register `table` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: &str, table: ColumnarTable) {
        self.tables.insert(name.to_string(), table);
    }

    pub fn unregister(&mut self, name: &str) -> Option<ColumnarTable> {
        self.tables.remove(name)
    }

    pub fn table(&self, name: &str) -> Option<&ColumnarTable> {
        self.tables.get(name)
    }

    /// Parse and execute one statement.
    pub fn execute(&mut self, text: &str) -> Result<ResultSet> {
        self.execute_with(text, &Cancel::new())
    }

    pub fn execute_with(&mut self, text: &str, cancel: &Cancel) -> Result<ResultSet> {
        let stmt = parse(text)?;
        self.execute_stmt(&stmt, cancel)
    }

    pub fn execute_stmt(&mut self, stmt: &Statement, cancel: &Cancel) -> Result<ResultSet> {
        match stmt {
            Statement::Select(select) => {
                let out = self.run_select(select, &CteMap::new(), cancel)?;
                Ok(ResultSet {
                    row_count: out.rows.len(),
                    columns: out.columns,
                    rows: out.rows,
                    chosen_index: out.chosen_index,
                })
            }
            Statement::Insert(insert) => self.run_insert(insert, cancel),
        }
    }

    fn run_insert(&mut self, insert: &Insert, cancel: &Cancel) -> Result<ResultSet> {
        cancel.check()?;

        let empty = Rows { meta: vec![], data: vec![vec![]] };
        let sets = vec![];
        let env = Env::plain(&empty, 0, &sets);

        let columns: Vec<String> = if insert.columns.is_empty() {
            match self.tables.get(&insert.table) {
                Some(table) => {
                    table.as_schema().fields().iter().map(|f| f.name.clone()).collect()
                }
                None => err_at!(PlanSQL, msg: "unknown table {}", insert.table)?,
            }
        } else {
            insert.columns.clone()
        };

        let mut records = vec![];
        for row in insert.values.iter() {
            if row.len() != columns.len() {
                err_at!(
                    PlanSQL, msg: "INSERT arity {} != {} columns", row.len(), columns.len()
                )?;
            }
            let mut record = Record::new();
            for (column, expr) in columns.iter().zip(row.iter()) {
                record.set(column, eval(expr, &env)?);
            }
            records.push(record);
        }

        let table = match self.tables.get_mut(&insert.table) {
            Some(table) => table,
            None => err_at!(PlanSQL, msg: "unknown table {}", insert.table)?,
        };
        table.append_batch(&records)?;

        Ok(ResultSet { row_count: records.len(), ..ResultSet::default() })
    }

    fn run_select(
        &self,
        select: &Select,
        outer_ctes: &CteMap,
        cancel: &Cancel,
    ) -> Result<SelectOut> {
        cancel.check()?;

        // bind CTEs, applying the last-row-per-partition fast path when
        // the outer query keeps only `rn = 1` rows.
        let mut ctes = outer_ctes.clone();
        for (name, child) in select.with.iter() {
            let out = match self.cte_fast_path(name, child, select, &ctes, cancel)? {
                Some(out) => out,
                None => self.run_select(child, &ctes, cancel)?,
            };
            ctes.insert(name.clone(), out);
        }

        // materialize subqueries once, per select level.
        let mut select = {
            let mut copy = select.clone();
            copy.with = vec![];
            copy
        };
        let mut sets: Vec<InSet> = vec![];
        self.prepare_select(&mut select, &ctes, cancel, &mut sets)?;

        // bind and scan the primary source.
        let mut chosen_index = None;
        let mut rows = match &select.from {
            None => Rows { meta: vec![], data: vec![vec![]] },
            Some(table_ref) => {
                let binding = table_ref.binding().to_string();
                match table_ref {
                    TableRef::Named { name, .. } => match ctes.get(name) {
                        Some(out) => out.clone().into_rows(&binding),
                        None => match self.tables.get(name) {
                            Some(table) => {
                                let (rows, chosen) = self.scan_base(
                                    table, &binding, &select, cancel, &sets,
                                )?;
                                chosen_index = chosen;
                                rows
                            }
                            None => err_at!(PlanSQL, msg: "unknown table {}", name)?,
                        },
                    },
                    TableRef::Derived { select: child, .. } => {
                        self.run_select(child, &ctes, cancel)?.into_rows(&binding)
                    }
                }
            }
        };

        // residual or full WHERE filtering. scan_base already applied the
        // whole WHERE for indexed base-table scans (chosen or not); other
        // sources filter here, joins filter after joining.
        let filter_where = match (&select.from, chosen_index.is_some()) {
            (Some(TableRef::Named { name, .. }), false)
                if !ctes.contains_key(name) && self.tables.contains_key(name) =>
            {
                // scan_base handled it.
                false
            }
            (Some(TableRef::Named { name, .. }), true) if !ctes.contains_key(name) => false,
            _ => true,
        };

        for join in select.joins.iter() {
            cancel.check()?;
            rows = self.join_rows(rows, join, &ctes, cancel, &sets)?;
        }

        if filter_where || !select.joins.is_empty() {
            if let Some(where_) = &select.where_ {
                rows = filter_rows(&rows, where_, &sets)?;
            }
        }
        cancel.check()?;

        // grouped or plain pipeline.
        let aggregated = collect_aggregates(&select);
        if select.having.is_some() && select.group_by.is_empty() {
            err_at!(PlanSQL, msg: "HAVING requires GROUP BY")?;
        }

        let out = if !select.group_by.is_empty() || !aggregated.is_empty() {
            self.grouped_output(&select, rows, aggregated, cancel, &sets)?
        } else {
            self.plain_output(&select, rows, cancel, &sets)?
        };

        Ok(SelectOut { chosen_index, ..out })
    }

    // scan a registered base table, going through the index planner. The
    // full WHERE clause is applied here: consumed factors via the
    // candidate set, the rest as residual filters. Joins bypass this.
    fn scan_base(
        &self,
        table: &ColumnarTable,
        binding: &str,
        select: &Select,
        cancel: &Cancel,
        sets: &[InSet],
    ) -> Result<(Rows, Option<String>)> {
        cancel.check()?;

        let joined = !select.joins.is_empty();
        let factors: Vec<&Expr> = match (&select.where_, joined) {
            (Some(where_), false) => where_.and_factors(),
            _ => vec![],
        };

        let plan = match factors.is_empty() {
            true => None,
            false => try_use_index(table, &factors)?,
        };

        let (candidate, consumed, chosen) = match plan {
            Some(plan) => {
                let mut rows = plan.candidate.to_vec();
                rows.sort_unstable();
                (Some(rows), plan.consumed, Some(plan.chosen))
            }
            None => (None, vec![], None),
        };

        let row_indices: Vec<usize> = match candidate {
            Some(rows) => rows.into_iter().map(|r| r as usize).collect(),
            None => (0..table.len()).collect(),
        };

        let meta: Vec<ColMeta> = table
            .as_schema()
            .fields()
            .iter()
            .map(|f| ColMeta { qualifier: Some(binding.to_string()), name: f.name.clone() })
            .collect();

        let residual: Vec<&Expr> = factors
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, e)| *e)
            .collect();

        let ncols = table.as_schema().len();
        let data: Vec<Vec<Value>> = row_indices
            .into_iter()
            .map(|row| {
                (0..ncols)
                    .map(|col| table.value_at(col, row).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        let mut rows = Rows { meta, data };

        if !residual.is_empty() {
            let mut kept = vec![];
            for row in 0..rows.len() {
                let env = Env::plain(&rows, row, sets);
                let mut keep = true;
                for factor in residual.iter() {
                    if !truthy(&eval(factor, &env)?) {
                        keep = false;
                        break;
                    }
                }
                if keep {
                    kept.push(rows.data[row].clone());
                }
            }
            rows.data = kept;
        }

        Ok((rows, chosen))
    }

    fn materialize_ref(
        &self,
        table_ref: &TableRef,
        ctes: &CteMap,
        cancel: &Cancel,
    ) -> Result<Rows> {
        let binding = table_ref.binding().to_string();
        match table_ref {
            TableRef::Named { name, .. } => match ctes.get(name) {
                Some(out) => Ok(out.clone().into_rows(&binding)),
                None => match self.tables.get(name) {
                    Some(table) => {
                        let meta = table
                            .as_schema()
                            .fields()
                            .iter()
                            .map(|f| ColMeta {
                                qualifier: Some(binding.clone()),
                                name: f.name.clone(),
                            })
                            .collect();
                        let ncols = table.as_schema().len();
                        let data = (0..table.len())
                            .map(|row| {
                                (0..ncols)
                                    .map(|col| {
                                        table.value_at(col, row).unwrap_or(Value::Null)
                                    })
                                    .collect()
                            })
                            .collect();
                        Ok(Rows { meta, data })
                    }
                    None => err_at!(PlanSQL, msg: "unknown table {}", name),
                },
            },
            TableRef::Derived { select, .. } => {
                Ok(self.run_select(select, ctes, cancel)?.into_rows(&binding))
            }
        }
    }

    // INNER and LEFT joins; hash join on a single equi-predicate over
    // disjoint sides, nested loop otherwise.
    fn join_rows(
        &self,
        left: Rows,
        join: &Join,
        ctes: &CteMap,
        cancel: &Cancel,
        sets: &[InSet],
    ) -> Result<Rows> {
        let right = self.materialize_ref(&join.table, ctes, cancel)?;

        let mut meta = left.meta.clone();
        meta.extend(right.meta.iter().cloned());

        // single equi-predicate with one side in each input?
        let equi = match &join.on {
            Expr::Binary { op: BinaryOp::Eq, left: a, right: b } => {
                let sides = |expr: &Expr| -> Option<(bool, usize)> {
                    let (q, name) = match expr {
                        Expr::Column { table, name } => (table.as_deref(), name),
                        _ => return None,
                    };
                    match (left.resolve(q, name), right.resolve(q, name)) {
                        (Ok(col), Err(_)) => Some((true, col)),
                        (Err(_), Ok(col)) => Some((false, col)),
                        _ => None,
                    }
                };
                match (sides(a), sides(b)) {
                    (Some((true, l)), Some((false, r)))
                    | (Some((false, r)), Some((true, l))) => Some((l, r)),
                    _ => None,
                }
            }
            _ => None,
        };

        let mut data = vec![];
        match equi {
            Some((lcol, rcol)) => {
                debug!(target: "sql", "hash join on columns {} = {}", lcol, rcol);
                let mut built: HashMap<KeyAtom, Vec<usize>> = HashMap::new();
                for (row, vals) in right.data.iter().enumerate() {
                    if vals[rcol].is_null() {
                        continue;
                    }
                    built.entry(key_atom(&vals[rcol])).or_insert_with(Vec::new).push(row);
                }

                for lvals in left.data.iter() {
                    let matches = match lvals[lcol].is_null() {
                        true => None,
                        false => built.get(&key_atom(&lvals[lcol])),
                    };
                    match matches {
                        Some(rrows) if !rrows.is_empty() => {
                            for rrow in rrows {
                                let mut vals = lvals.clone();
                                vals.extend(right.data[*rrow].iter().cloned());
                                data.push(vals);
                            }
                        }
                        _ if join.kind == JoinKind::Left => {
                            let mut vals = lvals.clone();
                            vals.extend(std::iter::repeat(Value::Null).take(right.meta.len()));
                            data.push(vals);
                        }
                        _ => (),
                    }
                }
            }
            None => {
                debug!(target: "sql", "nested-loop join");
                let probe = Rows { meta: meta.clone(), data: vec![] };
                for lvals in left.data.iter() {
                    let mut matched = false;
                    for rvals in right.data.iter() {
                        let mut vals = lvals.clone();
                        vals.extend(rvals.iter().cloned());
                        let one = Rows { meta: probe.meta.clone(), data: vec![vals] };
                        let env = Env::plain(&one, 0, sets);
                        if truthy(&eval(&join.on, &env)?) {
                            matched = true;
                            data.push(one.data.into_iter().next().unwrap());
                        }
                    }
                    if !matched && join.kind == JoinKind::Left {
                        let mut vals = lvals.clone();
                        vals.extend(std::iter::repeat(Value::Null).take(right.meta.len()));
                        data.push(vals);
                    }
                }
            }
        }

        Ok(Rows { meta, data })
    }

    // plain (non-grouped) tail of the pipeline: windows, projection,
    // order, limit.
    fn plain_output(
        &self,
        select: &Select,
        rows: Rows,
        cancel: &Cancel,
        sets: &[InSet],
    ) -> Result<SelectOut> {
        let window_exprs = collect_windows(select);
        let windows = match window_exprs.is_empty() {
            true => vec![],
            false => compute_windows(&rows, &window_exprs, sets)?,
        };
        cancel.check()?;

        let (columns, proj) = project(select, &rows, None, &[], &windows, sets)?;
        let ordered = order_rows(select, &rows, proj, &columns, None, &[], &windows, sets)?;
        Ok(SelectOut {
            columns,
            rows: truncate(ordered, select.limit, select.offset),
            chosen_index: None,
        })
    }

    // GROUP BY pipeline: hash-group, aggregate, HAVING, project, order,
    // limit.
    fn grouped_output(
        &self,
        select: &Select,
        rows: Rows,
        agg_specs: Vec<Expr>,
        cancel: &Cancel,
        sets: &[InSet],
    ) -> Result<SelectOut> {
        if !collect_windows(select).is_empty() {
            err_at!(PlanSQL, msg: "window functions cannot mix with GROUP BY")?;
        }

        let agg_args: Vec<Option<Expr>> = agg_specs
            .iter()
            .map(|spec| match spec {
                Expr::Function { args, star, name, .. } => match (*star, args.len()) {
                    (true, _) | (false, 0) if name == "COUNT" => Ok(None),
                    (false, 1) => Ok(Some(args[0].clone())),
                    (false, 0) => err_at!(PlanSQL, msg: "{} needs an argument", name),
                    (_, n) => err_at!(PlanSQL, msg: "{} takes 1 argument, got {}", name, n),
                },
                _ => err_at!(Fatal, msg: "not an aggregate"),
            })
            .collect::<Result<Vec<Option<Expr>>>>()?;
        let agg_kinds: Vec<AggKind> = agg_specs
            .iter()
            .map(|spec| match spec {
                Expr::Function { name, .. } => AggKind::from_name(name).unwrap(),
                _ => unreachable!(),
            })
            .collect();

        // hash group by the GROUP BY keys; a query with aggregates and no
        // GROUP BY folds into one group. The first member row represents
        // its group for non-aggregate expressions.
        let mut order: Vec<Vec<KeyAtom>> = vec![];
        let mut groups: HashMap<Vec<KeyAtom>, (usize, Vec<Accum>)> = HashMap::new();
        for row in 0..rows.len() {
            let env = Env::plain(&rows, row, sets);
            let mut key = Vec::with_capacity(select.group_by.len());
            for expr in select.group_by.iter() {
                key.push(key_atom(&eval(expr, &env)?));
            }

            let entry = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                (row, agg_kinds.iter().map(|k| Accum::new(*k)).collect())
            });
            for (accum, arg) in entry.1.iter_mut().zip(agg_args.iter()) {
                match arg {
                    Some(expr) => accum.push(&eval(expr, &env)?),
                    None => accum.push(&Value::I64(1)),
                }
            }
        }
        cancel.check()?;

        let mut grouped = Rows { meta: rows.meta.clone(), data: vec![] };
        let mut aggs: Vec<Vec<Value>> = vec![];
        for key in order.iter() {
            let (rep_row, accums) = &groups[key];
            grouped.data.push(rows.data[*rep_row].clone());
            aggs.push(accums.iter().map(|a| a.value()).collect());
        }

        // HAVING over group rows with aggregate context.
        let mut kept_rows = Rows { meta: grouped.meta.clone(), data: vec![] };
        let mut kept_aggs = vec![];
        for g in 0..grouped.len() {
            let keep = match &select.having {
                Some(having) => {
                    let env = Env {
                        rows: &grouped,
                        row: g,
                        agg_specs: &agg_specs,
                        aggs: Some(&aggs[g]),
                        windows: &[],
                        sets,
                    };
                    truthy(&eval(having, &env)?)
                }
                None => true,
            };
            if keep {
                kept_rows.data.push(grouped.data[g].clone());
                kept_aggs.push(aggs[g].clone());
            }
        }
        cancel.check()?;

        let (columns, proj) =
            project(select, &kept_rows, Some(&kept_aggs), &agg_specs, &[], sets)?;
        let ordered = order_rows(
            select, &kept_rows, proj, &columns, Some(&kept_aggs), &agg_specs, &[], sets,
        )?;
        Ok(SelectOut {
            columns,
            rows: truncate(ordered, select.limit, select.offset),
            chosen_index: None,
        })
    }

    // rewrite IN-subqueries into materialized sets and scalar subqueries
    // into literals, each child executed exactly once.
    fn prepare_select(
        &self,
        select: &mut Select,
        ctes: &CteMap,
        cancel: &Cancel,
        sets: &mut Vec<InSet>,
    ) -> Result<()> {
        let mut exprs: Vec<&mut Expr> = vec![];
        for proj in select.projections.iter_mut() {
            if let Projection::Expr { expr, .. } = proj {
                exprs.push(expr);
            }
        }
        if let Some(where_) = select.where_.as_mut() {
            exprs.push(where_);
        }
        for join in select.joins.iter_mut() {
            exprs.push(&mut join.on);
        }
        exprs.extend(select.group_by.iter_mut());
        if let Some(having) = select.having.as_mut() {
            exprs.push(having);
        }
        for spec in select.order_by.iter_mut() {
            exprs.push(&mut spec.expr);
        }

        for expr in exprs {
            self.prepare_expr(expr, ctes, cancel, sets)?;
        }
        Ok(())
    }

    fn prepare_expr(
        &self,
        expr: &mut Expr,
        ctes: &CteMap,
        cancel: &Cancel,
        sets: &mut Vec<InSet>,
    ) -> Result<()> {
        match expr {
            Expr::Subquery(child) => {
                let out = self.run_select(child, ctes, cancel)?;
                let val = out
                    .rows
                    .first()
                    .and_then(|row| row.first())
                    .cloned()
                    .unwrap_or(Value::Null);
                *expr = Expr::Literal(val);
            }
            Expr::In { list, exprs, .. } => {
                for e in exprs.iter_mut() {
                    self.prepare_expr(e, ctes, cancel, sets)?;
                }
                match list {
                    InList::Subquery(child) => {
                        let out = self.run_select(child, ctes, cancel)?;
                        let arity = exprs.len();

                        let mut tuples = std::collections::HashSet::new();
                        let mut ints: Option<Vec<u32>> = Some(vec![]);
                        for row in out.rows.iter() {
                            if row.len() != arity {
                                err_at!(
                                    PlanSQL, msg: "IN subquery arity {} != {}",
                                    row.len(), arity
                                )?;
                            }
                            if row.iter().any(|v| v.is_null()) {
                                continue;
                            }
                            let tuple: Vec<KeyAtom> = row.iter().map(key_atom).collect();
                            if let (Some(acc), [KeyAtom::Int(v)]) =
                                (ints.as_mut(), tuple.as_slice())
                            {
                                if *v >= 0 && *v <= u32::MAX as i64 {
                                    acc.push(*v as u32);
                                } else {
                                    ints = None;
                                }
                            } else {
                                ints = None;
                            }
                            tuples.insert(tuple);
                        }

                        let bitmap = match (arity, ints) {
                            (1, Some(vals)) => {
                                Some(crate::index::RowSet::from_slice(&vals))
                            }
                            _ => None,
                        };
                        debug!(
                            target: "sql",
                            "materialized IN subquery, {} tuples, bitmap:{}",
                            tuples.len(), bitmap.is_some()
                        );
                        sets.push(InSet { tuples, bitmap });
                        *list = InList::Set(sets.len() - 1);
                    }
                    InList::Exprs(rows) => {
                        for row in rows.iter_mut() {
                            for e in row.iter_mut() {
                                self.prepare_expr(e, ctes, cancel, sets)?;
                            }
                        }
                    }
                    InList::Set(_) => (),
                }
            }
            Expr::Literal(_) | Expr::Column { .. } => (),
            Expr::Tuple(exprs) => {
                for e in exprs.iter_mut() {
                    self.prepare_expr(e, ctes, cancel, sets)?;
                }
            }
            Expr::Unary { expr, .. } => self.prepare_expr(expr, ctes, cancel, sets)?,
            Expr::Binary { left, right, .. } => {
                self.prepare_expr(left, ctes, cancel, sets)?;
                self.prepare_expr(right, ctes, cancel, sets)?;
            }
            Expr::Like { expr, pattern, .. } => {
                self.prepare_expr(expr, ctes, cancel, sets)?;
                self.prepare_expr(pattern, ctes, cancel, sets)?;
            }
            Expr::IsNull { expr, .. } => self.prepare_expr(expr, ctes, cancel, sets)?,
            Expr::Between { expr, lo, hi, .. } => {
                self.prepare_expr(expr, ctes, cancel, sets)?;
                self.prepare_expr(lo, ctes, cancel, sets)?;
                self.prepare_expr(hi, ctes, cancel, sets)?;
            }
            Expr::Case { operand, branches, else_ } => {
                if let Some(operand) = operand {
                    self.prepare_expr(operand, ctes, cancel, sets)?;
                }
                for (when, then) in branches.iter_mut() {
                    self.prepare_expr(when, ctes, cancel, sets)?;
                    self.prepare_expr(then, ctes, cancel, sets)?;
                }
                if let Some(else_) = else_ {
                    self.prepare_expr(else_, ctes, cancel, sets)?;
                }
            }
            Expr::Function { args, window, .. } => {
                for e in args.iter_mut() {
                    self.prepare_expr(e, ctes, cancel, sets)?;
                }
                if let Some(window) = window {
                    for e in window.partition_by.iter_mut() {
                        self.prepare_expr(e, ctes, cancel, sets)?;
                    }
                    for spec in window.order_by.iter_mut() {
                        self.prepare_expr(&mut spec.expr, ctes, cancel, sets)?;
                    }
                }
            }
        }
        Ok(())
    }

    // last-row-per-partition fast path: the outer query filters a CTE of
    // shape `SELECT *, ROW_NUMBER() OVER (PARTITION BY p ORDER BY o) rn`
    // down to `rn = 1`; only each partition's winning row is computed.
    fn cte_fast_path(
        &self,
        name: &str,
        child: &Select,
        outer: &Select,
        ctes: &CteMap,
        cancel: &Cancel,
    ) -> Result<Option<SelectOut>> {
        // outer must scan this CTE directly and keep rn = 1.
        match &outer.from {
            Some(TableRef::Named { name: from, .. }) if from == name => (),
            _ => return Ok(None),
        }
        if !outer.joins.is_empty() {
            return Ok(None);
        }

        // child shape: SELECT *, ROW_NUMBER() OVER (...) rn FROM t
        let simple = child.with.is_empty()
            && child.joins.is_empty()
            && child.group_by.is_empty()
            && child.having.is_none()
            && child.order_by.is_empty()
            && child.limit.is_none()
            && child.projections.len() == 2;
        if !simple {
            return Ok(None);
        }

        let (rn_alias, spec) = {
            let window_proj = child.projections.iter().find_map(|p| match p {
                Projection::Expr {
                    expr: Expr::Function { name, window: Some(spec), .. },
                    alias: Some(alias),
                } if name == "ROW_NUMBER" => Some((alias.clone(), spec.clone())),
                _ => None,
            });
            let has_star = child.projections.iter().any(|p| matches!(p, Projection::Star));
            match (window_proj, has_star) {
                (Some(found), true) => found,
                _ => return Ok(None),
            }
        };
        if spec.order_by.is_empty() {
            return Ok(None);
        }

        // rn = 1 among the outer WHERE factors?
        let filtered = match &outer.where_ {
            Some(where_) => where_.and_factors().iter().any(|f| match f {
                Expr::Binary { op: BinaryOp::Eq, left, right } => {
                    let (col, lit) = (&**left, &**right);
                    let is_rn = matches!(
                        col, Expr::Column { name, .. } if *name == rn_alias
                    );
                    is_rn && matches!(lit, Expr::Literal(Value::I64(1)))
                }
                _ => false,
            }),
            None => false,
        };
        if !filtered {
            return Ok(None);
        }

        // no subqueries in the child, they are prepared per level.
        let mut has_subquery = false;
        if let Some(where_) = &child.where_ {
            where_.walk(&mut |e| {
                if matches!(e, Expr::Subquery(_))
                    || matches!(e, Expr::In { list: InList::Subquery(_), .. })
                {
                    has_subquery = true;
                }
            });
        }
        if has_subquery {
            return Ok(None);
        }

        debug!(target: "sql", "window fast path for cte {}", name);

        // base rows: the child without its window projection.
        let base = {
            let mut base = child.clone();
            base.projections = vec![Projection::Star];
            self.run_select(&base, ctes, cancel)?
        };
        let rows = base.clone().into_rows(name);
        let sets = vec![];

        // winner per partition: the row that sorts first, stable on ties.
        let mut order: Vec<Vec<KeyAtom>> = vec![];
        let mut best: HashMap<Vec<KeyAtom>, (usize, Vec<Value>)> = HashMap::new();
        for row in 0..rows.len() {
            let env = Env::plain(&rows, row, &sets);
            let mut key = Vec::with_capacity(spec.partition_by.len());
            for expr in spec.partition_by.iter() {
                key.push(key_atom(&eval(expr, &env)?));
            }
            let mut sort_key = Vec::with_capacity(spec.order_by.len());
            for ospec in spec.order_by.iter() {
                sort_key.push(eval(&ospec.expr, &env)?);
            }

            match best.get_mut(&key) {
                None => {
                    order.push(key.clone());
                    best.insert(key, (row, sort_key));
                }
                Some((best_row, best_key)) => {
                    let mut better = false;
                    for (i, ospec) in spec.order_by.iter().enumerate() {
                        let ord = sort_key[i].sort_cmp(&best_key[i]);
                        let ord = if ospec.desc { ord.reverse() } else { ord };
                        match ord {
                            std::cmp::Ordering::Less => {
                                better = true;
                                break;
                            }
                            std::cmp::Ordering::Greater => break,
                            std::cmp::Ordering::Equal => (),
                        }
                    }
                    if better {
                        *best_row = row;
                        *best_key = sort_key;
                    }
                }
            }
        }

        let mut columns = base.columns.clone();
        columns.push(rn_alias);
        let mut data = vec![];
        for key in order {
            let (row, _) = &best[&key];
            let mut vals = rows.data[*row].clone();
            vals.push(Value::I64(1));
            data.push(vals);
        }

        Ok(Some(SelectOut { columns, rows: data, chosen_index: None }))
    }
}

fn filter_rows(rows: &Rows, where_: &Expr, sets: &[InSet]) -> Result<Rows> {
    let mut data = vec![];
    for row in 0..rows.len() {
        let env = Env::plain(rows, row, sets);
        if truthy(&eval(where_, &env)?) {
            data.push(rows.data[row].clone());
        }
    }
    Ok(Rows { meta: rows.meta.clone(), data })
}

// aggregate call expressions referenced anywhere in the select, deduped.
fn collect_aggregates(select: &Select) -> Vec<Expr> {
    let mut specs: Vec<Expr> = vec![];
    let mut visit = |expr: &Expr| {
        if let Expr::Function { name, window: None, .. } = expr {
            if AggKind::from_name(name).is_some() && !specs.contains(expr) {
                specs.push(expr.clone());
            }
        }
    };

    for proj in select.projections.iter() {
        if let Projection::Expr { expr, .. } = proj {
            expr.walk(&mut visit);
        }
    }
    if let Some(having) = &select.having {
        having.walk(&mut visit);
    }
    for spec in select.order_by.iter() {
        spec.expr.walk(&mut visit);
    }
    specs
}

// window call expressions in the projections and order keys, deduped.
fn collect_windows(select: &Select) -> Vec<Expr> {
    let mut specs: Vec<Expr> = vec![];
    let mut visit = |expr: &Expr| {
        if let Expr::Function { window: Some(_), .. } = expr {
            if !specs.contains(expr) {
                specs.push(expr.clone());
            }
        }
    };

    for proj in select.projections.iter() {
        if let Projection::Expr { expr, .. } = proj {
            expr.walk(&mut visit);
        }
    }
    for spec in select.order_by.iter() {
        spec.expr.walk(&mut visit);
    }
    specs
}

fn projection_name(proj: &Projection, ordinal: usize) -> String {
    match proj {
        Projection::Star => unreachable!(),
        Projection::Expr { alias: Some(alias), .. } => alias.clone(),
        Projection::Expr { expr, .. } => match expr {
            Expr::Column { name, .. } => name.clone(),
            Expr::Function { name, .. } => name.to_lowercase(),
            _ => format!("col_{}", ordinal),
        },
    }
}

// evaluate the projection list over every row; returns output column
// names and row-major values.
#[allow(clippy::too_many_arguments)]
fn project(
    select: &Select,
    rows: &Rows,
    aggs: Option<&Vec<Vec<Value>>>,
    agg_specs: &[Expr],
    windows: &[(Expr, Vec<Value>)],
    sets: &[InSet],
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut columns = vec![];
    for (i, proj) in select.projections.iter().enumerate() {
        match proj {
            Projection::Star => {
                columns.extend(rows.meta.iter().map(|m| m.name.clone()));
            }
            proj => columns.push(projection_name(proj, i)),
        }
    }

    let mut data = vec![];
    for row in 0..rows.len() {
        let env = Env {
            rows,
            row,
            agg_specs,
            aggs: aggs.map(|a| a[row].as_slice()),
            windows,
            sets,
        };
        let mut vals = Vec::with_capacity(columns.len());
        for proj in select.projections.iter() {
            match proj {
                Projection::Star => {
                    vals.extend(rows.data[row].iter().cloned());
                }
                Projection::Expr { expr, .. } => vals.push(eval(expr, &env)?),
            }
        }
        data.push(vals);
    }

    Ok((columns, data))
}

// stable multi-key sort; ORDER BY keys resolve against output aliases
// first, then the input row.
#[allow(clippy::too_many_arguments)]
fn order_rows(
    select: &Select,
    rows: &Rows,
    proj: Vec<Vec<Value>>,
    columns: &[String],
    aggs: Option<&Vec<Vec<Value>>>,
    agg_specs: &[Expr],
    windows: &[(Expr, Vec<Value>)],
    sets: &[InSet],
) -> Result<Vec<Vec<Value>>> {
    if select.order_by.is_empty() {
        return Ok(proj);
    }

    // sort keys per row.
    let mut keys: Vec<Vec<Value>> = Vec::with_capacity(proj.len());
    for row in 0..proj.len() {
        let mut row_keys = Vec::with_capacity(select.order_by.len());
        for spec in select.order_by.iter() {
            let val = match &spec.expr {
                Expr::Column { table: None, name } => {
                    match columns.iter().position(|c| c == name) {
                        Some(col) => proj[row][col].clone(),
                        None => {
                            let env = Env {
                                rows,
                                row,
                                agg_specs,
                                aggs: aggs.map(|a| a[row].as_slice()),
                                windows,
                                sets,
                            };
                            eval(&spec.expr, &env)?
                        }
                    }
                }
                expr => {
                    let env = Env {
                        rows,
                        row,
                        agg_specs,
                        aggs: aggs.map(|a| a[row].as_slice()),
                        windows,
                        sets,
                    };
                    eval(expr, &env)?
                }
            };
            row_keys.push(val);
        }
        keys.push(row_keys);
    }

    let mut indices: Vec<usize> = (0..proj.len()).collect();
    indices.sort_by(|a, b| {
        for (i, spec) in select.order_by.iter().enumerate() {
            let ord = keys[*a][i].sort_cmp(&keys[*b][i]);
            let ord = if spec.desc { ord.reverse() } else { ord };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });

    Ok(indices.into_iter().map(|i| proj[i].clone()).collect())
}

fn truncate(
    mut rows: Vec<Vec<Value>>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Vec<Vec<Value>> {
    let start = std::cmp::min(offset.unwrap_or(0), rows.len());
    rows.drain(..start);
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

#[cfg(test)]
#[path = "exec_test.rs"]
mod exec_test;
