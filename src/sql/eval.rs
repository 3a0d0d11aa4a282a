//! Program evaluator
//!
//! Executes a parsed program against an operand stack, resolving data
//! expressions through the tag index and materialising every surviving
//! presentation into styled, context-aligned series.
//!
//! # Execution pipeline
//!
//! ```text
//! Program → stack machine → Presentations → fetch/group/reduce → StyledLine
//! ```
//!
//! Identical data expressions within one program hit the index once; the
//! fetch result is cached for the lifetime of the evaluation.

use crate::chart::{Color, LineStyle};
use crate::index::{group_by, reduce_all, Query, Reducer, TagIndex, TagRegex};
use crate::model::{EvalContext, TagMap, TimeSeq, TimeSeries};
use crate::sql::error::{EvalError, EvalResult};
use crate::sql::expr::{
    fmt_const, BinaryOp, DataExpr, Presentation, TimeSeriesExpr, UnaryOp,
};
use crate::sql::token::{Program, Tok};
use std::collections::HashMap;

/// One operand on the evaluation stack
#[derive(Debug, Clone)]
pub enum Operand {
    Str(String),
    Num(f64),
    Query(Query),
    Data(DataExpr),
    Series(TimeSeriesExpr),
    Pres(Presentation),
    List(Vec<String>),
}

impl Operand {
    /// Discriminant name for error reporting
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Str(_) => "string",
            Operand::Num(_) => "number",
            Operand::Query(_) => "query",
            Operand::Data(_) => "data expression",
            Operand::Series(_) => "time series expression",
            Operand::Pres(_) => "presentation",
            Operand::List(_) => "word list",
        }
    }
}

/// A fully evaluated, decorated series ready for the graph builder
#[derive(Debug, Clone, PartialEq)]
pub struct StyledLine {
    pub label: String,
    pub data: TimeSeq,
    pub style: LineStyle,
    pub color: Option<Color>,
    pub line_width: u32,
    pub alpha: u8,
    pub axis: u8,
}

/// Stack-machine evaluator for one request
pub struct Evaluator<'a> {
    ctx: &'a EvalContext,
    index: &'a dyn TagIndex,
    cache: HashMap<DataExpr, Vec<TimeSeries>>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator over a context and corpus
    pub fn new(ctx: &'a EvalContext, index: &'a dyn TagIndex) -> Self {
        Self {
            ctx,
            index,
            cache: HashMap::new(),
        }
    }

    /// Run a program to completion and materialise its presentations
    pub fn execute(&mut self, program: &Program) -> EvalResult<Vec<StyledLine>> {
        tracing::debug!(tokens = program.len(), "executing program");
        let mut stack: Vec<Operand> = Vec::new();

        for token in program {
            match &token.tok {
                Tok::Str(s) => stack.push(Operand::Str(s.clone())),
                Tok::Num(n) => stack.push(Operand::Num(*n)),
                Tok::List(words) => stack.push(Operand::List(words.clone())),
                Tok::Op(name) => self.apply_op(&mut stack, name, token.offset)?,
            }
        }

        let mut lines = Vec::new();
        for operand in stack {
            let pres = match operand {
                Operand::Pres(p) => p,
                Operand::Series(e) => Presentation::new(e),
                Operand::Data(d) => Presentation::new(TimeSeriesExpr::Data(d)),
                Operand::Query(q) => Presentation::new(TimeSeriesExpr::Data(DataExpr::Aggregate {
                    query: q,
                    reducer: Reducer::Sum,
                })),
                other => {
                    return Err(EvalError::TrailingOperand {
                        kind: other.kind(),
                    })
                }
            };
            lines.extend(self.materialize_presentation(&pres)?);
        }
        tracing::debug!(lines = lines.len(), "program produced lines");
        Ok(lines)
    }

    /// Dispatch a single operator against the stack
    fn apply_op(&mut self, stack: &mut Vec<Operand>, name: &str, offset: usize) -> EvalResult<()> {
        match name {
            // Predicate constructors
            "true" => stack.push(Operand::Query(Query::True)),
            "false" => stack.push(Operand::Query(Query::False)),
            "eq" => {
                let b = pop(stack, name)?;
                let a = pop(stack, name)?;
                match (a, b) {
                    (Operand::Str(k), Operand::Str(v)) => {
                        stack.push(Operand::Query(Query::Equal(k, v)))
                    }
                    // Numeric tag values tokenise as numbers; a string key
                    // on the left still means a predicate.
                    (Operand::Str(k), Operand::Num(v)) => {
                        stack.push(Operand::Query(Query::Equal(k, fmt_const(v))))
                    }
                    (a, b) => self.push_binop(stack, name, BinaryOp::Eq, a, b)?,
                }
            }
            "re" => {
                let pattern = pop_str(stack, name)?;
                let key = pop_str(stack, name)?;
                let re = TagRegex::new(&pattern).map_err(|source| EvalError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
                stack.push(Operand::Query(Query::Regex(key, re)));
            }
            "has" => {
                let key = pop_str(stack, name)?;
                stack.push(Operand::Query(Query::HasKey(key)));
            }
            "in" => {
                let values = pop_list(stack, name)?;
                if values.is_empty() {
                    return Err(EvalError::ArityMismatch {
                        op: name.to_string(),
                        expected: 1,
                        found: 0,
                    });
                }
                let key = pop_str(stack, name)?;
                stack.push(Operand::Query(Query::In(key, values)));
            }
            "and" => {
                let b = pop_query(stack, name)?;
                let a = pop_query(stack, name)?;
                stack.push(Operand::Query(a.and(b)));
            }
            "or" => {
                let b = pop_query(stack, name)?;
                let a = pop_query(stack, name)?;
                stack.push(Operand::Query(a.or(b)));
            }
            "not" => {
                let q = pop_query(stack, name)?;
                stack.push(Operand::Query(q.not()));
            }

            // Data-expression constructors
            "by" => {
                let keys = pop_list(stack, name)?;
                if keys.is_empty() {
                    return Err(EvalError::ArityMismatch {
                        op: name.to_string(),
                        expected: 1,
                        found: 0,
                    });
                }
                let target = pop(stack, name)?;
                let expr = match target {
                    Operand::Query(query) => DataExpr::GroupBy {
                        query,
                        keys,
                        reducer: Reducer::Sum,
                    },
                    Operand::Data(d) => DataExpr::GroupBy {
                        reducer: d.reducer(),
                        query: d.query().clone(),
                        keys,
                    },
                    other => {
                        return Err(type_mismatch(name, "query or data expression", &other))
                    }
                };
                stack.push(Operand::Data(expr));
            }
            "sum" => self.apply_reducer(stack, name, Reducer::Sum)?,
            "count" => self.apply_reducer(stack, name, Reducer::Count)?,
            "min" => self.apply_reducer(stack, name, Reducer::Min)?,
            "max" => self.apply_reducer(stack, name, Reducer::Max)?,
            "avg" => self.apply_reducer(stack, name, Reducer::Avg)?,

            // Arithmetic and comparisons
            "add" => self.binop(stack, name, BinaryOp::Add)?,
            "sub" => self.binop(stack, name, BinaryOp::Sub)?,
            "mul" => self.binop(stack, name, BinaryOp::Mul)?,
            "div" => self.binop(stack, name, BinaryOp::Div)?,
            "gt" => self.binop(stack, name, BinaryOp::Gt)?,
            "ge" => self.binop(stack, name, BinaryOp::Ge)?,
            "lt" => self.binop(stack, name, BinaryOp::Lt)?,
            "le" => self.binop(stack, name, BinaryOp::Le)?,
            "neg" => self.unop(stack, name, UnaryOp::Neg)?,
            "abs" => self.unop(stack, name, UnaryOp::Abs)?,
            "sqrt" => self.unop(stack, name, UnaryOp::Sqrt)?,
            "per-step" => self.unop(stack, name, UnaryOp::PerStep)?,

            // Constants and generators
            "const" => {
                let value = match pop(stack, name)? {
                    Operand::Num(v) => v,
                    Operand::Str(s) => s.parse::<f64>().map_err(|_| EvalError::InvalidArgument {
                        op: name.to_string(),
                        message: format!("expected a number, got {:?}", s),
                    })?,
                    other => return Err(type_mismatch(name, "number", &other)),
                };
                stack.push(Operand::Series(TimeSeriesExpr::Const { value }));
            }
            "time" => stack.push(Operand::Series(TimeSeriesExpr::Time)),

            // Stack manipulation
            "dup" => {
                let top = stack.last().cloned().ok_or(EvalError::StackUnderflow {
                    op: name.to_string(),
                })?;
                stack.push(top);
            }
            "drop" => {
                pop(stack, name)?;
            }
            "swap" => {
                let b = pop(stack, name)?;
                let a = pop(stack, name)?;
                stack.push(b);
                stack.push(a);
            }
            "rot" => {
                let c = pop(stack, name)?;
                let b = pop(stack, name)?;
                let a = pop(stack, name)?;
                stack.push(b);
                stack.push(c);
                stack.push(a);
            }
            "2over" => {
                if stack.len() < 3 {
                    return Err(EvalError::StackUnderflow {
                        op: name.to_string(),
                    });
                }
                let copy = stack[stack.len() - 3].clone();
                stack.push(copy);
            }

            // Visual decorators
            "line" => self.restyle(stack, name, LineStyle::Line)?,
            "area" => self.restyle(stack, name, LineStyle::Area)?,
            "stack" => self.restyle(stack, name, LineStyle::Stack)?,
            "vspan" => self.restyle(stack, name, LineStyle::Vspan)?,
            "color" => {
                let spec = pop_str(stack, name)?;
                let color = Color::parse(&spec).ok_or_else(|| EvalError::InvalidArgument {
                    op: name.to_string(),
                    message: format!("unrecognized color {:?}", spec),
                })?;
                let mut pres = pop_pres(stack, name)?;
                pres.color = Some(color);
                stack.push(Operand::Pres(pres));
            }
            "lw" => {
                let width = pop_int(stack, name, 1, 100)?;
                let mut pres = pop_pres(stack, name)?;
                pres.line_width = width as u32;
                stack.push(Operand::Pres(pres));
            }
            "alpha" => {
                let alpha = pop_int(stack, name, 0, 100)?;
                let mut pres = pop_pres(stack, name)?;
                pres.alpha = alpha as u8;
                stack.push(Operand::Pres(pres));
            }
            "axis" => {
                let axis = pop_int(stack, name, 0, 1)?;
                let mut pres = pop_pres(stack, name)?;
                pres.axis = axis as u8;
                stack.push(Operand::Pres(pres));
            }
            "legend" => {
                let label = pop_str(stack, name)?;
                let mut pres = pop_pres(stack, name)?;
                pres.legend = Some(label);
                stack.push(Operand::Pres(pres));
            }

            _ => {
                return Err(EvalError::UnknownOperator {
                    op: format!(":{}", name),
                    offset,
                })
            }
        }
        Ok(())
    }

    fn apply_reducer(
        &mut self,
        stack: &mut Vec<Operand>,
        name: &str,
        reducer: Reducer,
    ) -> EvalResult<()> {
        let target = pop(stack, name)?;
        let expr = match target {
            Operand::Query(query) => DataExpr::Aggregate { query, reducer },
            // Aggregating an existing data expression folds its groups
            // back together; group reducers are chosen before :by.
            Operand::Data(d) => DataExpr::Aggregate {
                query: d.query().clone(),
                reducer,
            },
            other => return Err(type_mismatch(name, "query or data expression", &other)),
        };
        stack.push(Operand::Data(expr));
        Ok(())
    }

    fn binop(&mut self, stack: &mut Vec<Operand>, name: &str, op: BinaryOp) -> EvalResult<()> {
        let b = pop(stack, name)?;
        let a = pop(stack, name)?;
        self.push_binop(stack, name, op, a, b)
    }

    fn push_binop(
        &mut self,
        stack: &mut Vec<Operand>,
        name: &str,
        op: BinaryOp,
        a: Operand,
        b: Operand,
    ) -> EvalResult<()> {
        let lhs = coerce_series(name, a)?;
        let rhs = coerce_series(name, b)?;
        stack.push(Operand::Series(TimeSeriesExpr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }));
        Ok(())
    }

    fn unop(&mut self, stack: &mut Vec<Operand>, name: &str, op: UnaryOp) -> EvalResult<()> {
        let a = pop(stack, name)?;
        let expr = coerce_series(name, a)?;
        stack.push(Operand::Series(TimeSeriesExpr::Unary {
            op,
            expr: Box::new(expr),
        }));
        Ok(())
    }

    fn restyle(&mut self, stack: &mut Vec<Operand>, name: &str, style: LineStyle) -> EvalResult<()> {
        let mut pres = pop_pres(stack, name)?;
        pres.style = style;
        stack.push(Operand::Pres(pres));
        Ok(())
    }

    /// Materialise a presentation into styled lines
    fn materialize_presentation(&mut self, pres: &Presentation) -> EvalResult<Vec<StyledLine>> {
        let series = self.materialize(&pres.expr)?;
        Ok(series
            .into_iter()
            .map(|s| StyledLine {
                label: pres
                    .legend
                    .clone()
                    .unwrap_or_else(|| s.label().to_string()),
                data: s.into_data(),
                style: pres.style,
                color: pres.color,
                line_width: pres.line_width,
                alpha: pres.alpha,
                axis: pres.axis,
            })
            .collect())
    }

    /// Materialise an expression into context-aligned series
    fn materialize(&mut self, expr: &TimeSeriesExpr) -> EvalResult<Vec<TimeSeries>> {
        match expr {
            TimeSeriesExpr::Data(d) => self.eval_data(d),
            TimeSeriesExpr::Const { value } => Ok(vec![TimeSeries::with_label(
                TagMap::new(),
                fmt_const(*value),
                self.ctx.constant_seq(*value),
            )]),
            TimeSeriesExpr::Time => {
                let values = self
                    .ctx
                    .timestamps()
                    .map(|t| (t / 1000) as f64)
                    .collect::<Vec<_>>();
                let seq = TimeSeq::new(self.ctx.start(), self.ctx.step(), values)?;
                Ok(vec![TimeSeries::with_label(TagMap::new(), "time", seq)])
            }
            TimeSeriesExpr::Unary { op, expr } => {
                let step = self.ctx.step();
                let inner = self.materialize(expr)?;
                Ok(inner
                    .into_iter()
                    .map(|s| {
                        let label = format!("{}({})", op, s.label());
                        let data = s.data().map(|v| op.apply(v, step));
                        TimeSeries::with_label(s.tags().clone(), label, data)
                    })
                    .collect())
            }
            TimeSeriesExpr::BinOp { op, lhs, rhs } => {
                let l = self.materialize(lhs)?;
                let r = self.materialize(rhs)?;
                self.combine_lists(*op, l, r)
            }
        }
    }

    /// Pair up the operand series lists of a binary operator
    ///
    /// A singleton side broadcasts across the other; two multi-series
    /// sides join on identical tag maps, dropping unmatched series.
    fn combine_lists(
        &self,
        op: BinaryOp,
        l: Vec<TimeSeries>,
        r: Vec<TimeSeries>,
    ) -> EvalResult<Vec<TimeSeries>> {
        if l.is_empty() || r.is_empty() {
            return Ok(Vec::new());
        }

        let combined = |a: &TimeSeries, b: &TimeSeries, tags: &TagMap| -> EvalResult<TimeSeries> {
            let data = a.data().combine(b.data(), |x, y| op.apply(x, y))?;
            let label = format!("({} {} {})", a.label(), op.symbol(), b.label());
            Ok(TimeSeries::with_label(tags.clone(), label, data))
        };

        if r.len() == 1 {
            let rhs = &r[0];
            return l.iter().map(|a| combined(a, rhs, a.tags())).collect();
        }
        if l.len() == 1 {
            let lhs = &l[0];
            return r.iter().map(|b| combined(lhs, b, b.tags())).collect();
        }
        l.iter()
            .filter_map(|a| {
                r.iter()
                    .find(|b| b.tags() == a.tags())
                    .map(|b| combined(a, b, a.tags()))
            })
            .collect()
    }

    /// Fetch and reduce a data expression, caching repeats
    fn eval_data(&mut self, expr: &DataExpr) -> EvalResult<Vec<TimeSeries>> {
        if let Some(hit) = self.cache.get(expr) {
            tracing::debug!(%expr, "data expression cache hit");
            return Ok(hit.clone());
        }

        let found = self
            .index
            .find(expr.query(), self.ctx.start(), self.ctx.end())?;
        tracing::debug!(%expr, series = found.len(), "fetched from tag index");
        let aligned: Vec<TimeSeries> = found
            .iter()
            .map(|s| self.ctx.normalize(s))
            .collect::<Result<_, _>>()?;

        let out = match expr {
            DataExpr::Aggregate { query, reducer } => reduce_all(&aligned, *reducer)
                .map(|seq| TimeSeries::with_label(query.exact_tags(), expr.to_string(), seq))
                .into_iter()
                .collect(),
            DataExpr::GroupBy { keys, reducer, .. } => group_by(&aligned, keys, *reducer),
        };

        self.cache.insert(expr.clone(), out.clone());
        Ok(out)
    }
}

fn pop(stack: &mut Vec<Operand>, op: &str) -> EvalResult<Operand> {
    stack.pop().ok_or(EvalError::StackUnderflow {
        op: op.to_string(),
    })
}

fn pop_str(stack: &mut Vec<Operand>, op: &str) -> EvalResult<String> {
    match pop(stack, op)? {
        Operand::Str(s) => Ok(s),
        other => Err(type_mismatch(op, "string", &other)),
    }
}

fn pop_num(stack: &mut Vec<Operand>, op: &str) -> EvalResult<f64> {
    match pop(stack, op)? {
        Operand::Num(n) => Ok(n),
        other => Err(type_mismatch(op, "number", &other)),
    }
}

/// Pop an integer in `[lo, hi]`
fn pop_int(stack: &mut Vec<Operand>, op: &str, lo: i64, hi: i64) -> EvalResult<i64> {
    let n = pop_num(stack, op)?;
    if n.fract() != 0.0 || n < lo as f64 || n > hi as f64 {
        return Err(EvalError::InvalidArgument {
            op: op.to_string(),
            message: format!("expected an integer in [{}, {}], got {}", lo, hi, n),
        });
    }
    Ok(n as i64)
}

fn pop_list(stack: &mut Vec<Operand>, op: &str) -> EvalResult<Vec<String>> {
    match pop(stack, op)? {
        Operand::List(l) => Ok(l),
        other => Err(type_mismatch(op, "word list", &other)),
    }
}

fn pop_query(stack: &mut Vec<Operand>, op: &str) -> EvalResult<Query> {
    match pop(stack, op)? {
        Operand::Query(q) => Ok(q),
        other => Err(type_mismatch(op, "query", &other)),
    }
}

/// Pop anything presentable, wrapping bare expressions in defaults
fn pop_pres(stack: &mut Vec<Operand>, op: &str) -> EvalResult<Presentation> {
    match pop(stack, op)? {
        Operand::Pres(p) => Ok(p),
        Operand::Series(e) => Ok(Presentation::new(e)),
        Operand::Data(d) => Ok(Presentation::new(TimeSeriesExpr::Data(d))),
        Operand::Query(q) => Ok(Presentation::new(TimeSeriesExpr::Data(DataExpr::Aggregate {
            query: q,
            reducer: Reducer::Sum,
        }))),
        other => Err(type_mismatch(op, "presentation", &other)),
    }
}

/// Coerce an operand into a time-series expression
fn coerce_series(op: &str, operand: Operand) -> EvalResult<TimeSeriesExpr> {
    match operand {
        Operand::Series(e) => Ok(e),
        Operand::Data(d) => Ok(TimeSeriesExpr::Data(d)),
        Operand::Query(q) => Ok(TimeSeriesExpr::Data(DataExpr::Aggregate {
            query: q,
            reducer: Reducer::Sum,
        })),
        Operand::Num(v) => Ok(TimeSeriesExpr::Const { value: v }),
        other => Err(type_mismatch(op, "series or number", &other)),
    }
}

fn type_mismatch(op: &str, expected: &'static str, found: &Operand) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryTagIndex;
    use crate::sql::parser::parse_program;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: i64 = 60_000;

    fn ctx() -> EvalContext {
        EvalContext::new(0, 6 * MINUTE, MINUTE, "UTC").unwrap()
    }

    fn series(pairs: &[(&str, &str)], values: &[f64]) -> TimeSeries {
        let tags: TagMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TimeSeries::new(tags, TimeSeq::new(0, MINUTE, values.to_vec()).unwrap())
    }

    fn corpus() -> MemoryTagIndex {
        MemoryTagIndex::new(vec![
            series(
                &[("name", "sps"), ("nf.cluster", "silver")],
                &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
            ),
            series(
                &[("name", "sps"), ("nf.cluster", "gold")],
                &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            ),
            series(&[("name", "cpu"), ("host", "h1")], &[0.5, 0.5, 0.5, 0.5, 0.5, 0.5]),
        ])
    }

    fn run(program: &str) -> EvalResult<Vec<StyledLine>> {
        let ctx = ctx();
        let index = corpus();
        let mut evaluator = Evaluator::new(&ctx, &index);
        evaluator.execute(&parse_program(program).unwrap())
    }

    #[test]
    fn test_bare_query_implies_sum() {
        let lines = run("name,sps,:eq").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label, "sum(name=sps)");
        assert_eq!(lines[0].data.get(0), 11.0);
        assert_eq!(lines[0].data.get(5), 66.0);
    }

    #[test]
    fn test_group_by_sorted_output() {
        let lines = run("name,sps,:eq,(,nf.cluster,),:by").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label, "nf.cluster=gold");
        assert_eq!(lines[1].label, "nf.cluster=silver");
        assert_eq!(lines[0].data.get(1), 2.0);
        assert_eq!(lines[1].data.get(1), 20.0);
    }

    #[test]
    fn test_group_by_carries_preceding_reducer() {
        let lines = run("name,sps,:eq,:max,(,nf.cluster,),:by").unwrap();
        assert_eq!(lines.len(), 2);
        // Each cluster holds one member, so max equals the member
        assert_eq!(lines[1].data.get(5), 60.0);
    }

    #[test]
    fn test_aggregating_grouped_expr_folds_groups() {
        let lines = run("name,sps,:eq,(,nf.cluster,),:by,:sum").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].data.get(0), 11.0);
    }

    #[test]
    fn test_threshold_comparison_broadcast() {
        let lines = run("name,sps,:eq,30,:gt").unwrap();
        assert_eq!(lines.len(), 1);
        // sum = 11,22,33,44,55,66: strictly above 30 from index 2 on
        assert_eq!(lines[0].data.values(), &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_scenario_threshold_vspan_styles() {
        let lines = run(
            "name,sps,:eq,:sum,30,:gt,:vspan,40,:alpha,triggered,:legend,\
             name,sps,:eq,(,nf.cluster,),:by,input,:legend,\
             30,:const,threshold,:legend",
        )
        .unwrap();
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0].style, LineStyle::Vspan);
        assert_eq!(lines[0].alpha, 40);
        assert_eq!(lines[0].label, "triggered");

        assert_eq!(lines[1].style, LineStyle::Line);
        assert_eq!(lines[1].label, "input");
        assert_eq!(lines[2].label, "input");

        assert_eq!(lines[3].label, "threshold");
        assert!(lines[3].data.values().iter().all(|v| *v == 30.0));
    }

    #[test]
    fn test_const_materialises_at_context_step() {
        let lines = run("50000,:const").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label, "50000");
        assert_eq!(lines[0].data.len(), 6);
        assert_eq!(lines[0].data.step(), MINUTE);
    }

    #[test]
    fn test_series_arithmetic() {
        let lines = run("name,sps,:eq,:sum,name,sps,:eq,:sum,:add").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].data.get(0), 22.0);
    }

    #[test]
    fn test_time_operator_seconds() {
        let lines = run(":time").unwrap();
        assert_eq!(lines[0].data.get(0), 0.0);
        assert_eq!(lines[0].data.get(2), 120.0);
    }

    #[test]
    fn test_unary_ops_compose() {
        let lines = run("name,sps,:eq,:sum,:neg,:abs").unwrap();
        assert_eq!(lines[0].data.get(0), 11.0);
        assert_eq!(lines[0].label, "abs(neg(sum(name=sps)))");
    }

    #[test]
    fn test_stack_manipulation() {
        // dup produces two presentations of the same expression
        assert_eq!(run("name,sps,:eq,:dup").unwrap().len(), 2);
        // drop leaves nothing
        assert!(run("name,sps,:eq,:drop").unwrap().is_empty());
        // swap flips order
        let lines = run("name,sps,:eq,a,:legend,name,cpu,:eq,b,:legend,:swap").unwrap();
        assert_eq!(lines[0].label, "b");
        assert_eq!(lines[1].label, "a");
        // rot cycles three
        let lines = run(
            "name,sps,:eq,a,:legend,name,sps,:eq,b,:legend,name,sps,:eq,c,:legend,:rot",
        )
        .unwrap();
        assert_eq!(
            lines.iter().map(|l| l.label.as_str()).collect::<Vec<_>>(),
            vec!["b", "c", "a"]
        );
        // 2over copies the third element to the top
        let lines = run(
            "name,sps,:eq,a,:legend,name,sps,:eq,b,:legend,name,sps,:eq,c,:legend,:2over",
        )
        .unwrap();
        assert_eq!(
            lines.iter().map(|l| l.label.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c", "a"]
        );
    }

    #[test]
    fn test_decorators_apply() {
        let lines = run("name,sps,:eq,:area,ff0000,:color,3,:lw,1,:axis,50,:alpha").unwrap();
        let line = &lines[0];
        assert_eq!(line.style, LineStyle::Area);
        assert_eq!(line.color, Some(Color::rgb(255, 0, 0)));
        assert_eq!(line.line_width, 3);
        assert_eq!(line.axis, 1);
        assert_eq!(line.alpha, 50);
    }

    #[test]
    fn test_empty_result_is_valid() {
        let lines = run("name,nonexistent,:eq,:sum").unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_empty_program() {
        assert!(run("").unwrap().is_empty());
    }

    #[test]
    fn test_stack_underflow() {
        assert!(matches!(
            run(":sum"),
            Err(EvalError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn test_unknown_operator_offset() {
        match run("name,sps,:eq,:frobnicate") {
            Err(EvalError::UnknownOperator { op, offset }) => {
                assert_eq!(op, ":frobnicate");
                assert_eq!(offset, 13);
            }
            other => panic!("expected unknown operator, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch() {
        // :lw needs a number on top
        assert!(matches!(
            run("name,sps,:eq,wide,:lw"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_alpha_range_validated() {
        assert!(matches!(
            run("name,sps,:eq,150,:alpha"),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_trailing_literal_rejected() {
        assert!(matches!(
            run("name,sps,:eq,orphan"),
            Err(EvalError::TrailingOperand { kind: "string" })
        ));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            run("name,[,:re"),
            Err(EvalError::InvalidRegex { .. })
        ));
    }

    /// Index wrapper that counts fetches, for cache assertions
    struct CountingIndex {
        inner: MemoryTagIndex,
        calls: AtomicUsize,
    }

    impl TagIndex for CountingIndex {
        fn find(&self, query: &Query, start: i64, end: i64) -> io::Result<Vec<TimeSeries>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find(query, start, end)
        }

        fn all_tag_keys(&self) -> Vec<String> {
            self.inner.all_tag_keys()
        }
    }

    #[test]
    fn test_repeated_data_expr_fetches_once() {
        let ctx = ctx();
        let index = CountingIndex {
            inner: corpus(),
            calls: AtomicUsize::new(0),
        };
        let mut evaluator = Evaluator::new(&ctx, &index);
        let program =
            parse_program("name,sps,:eq,:sum,:dup,:add,name,sps,:eq,:sum,:mul").unwrap();
        evaluator.execute(&program).unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }
}
