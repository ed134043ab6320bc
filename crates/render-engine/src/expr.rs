//! Piecewise expression compilation.
//!
//! The compositing engine evaluates filter parameters once per output
//! frame, so a cursor path recorded as sparse samples has to become a
//! single closed-form expression of `t`. This module compiles a sorted
//! `(time, value)` sequence into a balanced tree of nested `if(lt(t,..))`
//! conditionals with two leaf kinds:
//!
//! - **linear** leaves interpolate between two adjacent samples
//!   (`v1 + slope * (t - t1)`), used for positions;
//! - **step** leaves hold one sample's value as a constant, used for
//!   pointer identities, where each sample owns the half-open interval
//!   `[times[i], times[i+1])`.
//!
//! Balanced bisection keeps the tree `O(log N)` deep and the emitted
//! text `O(N)` long, which matters because the engine re-parses the
//! expression for every frame. Literals are emitted with fixed
//! precision (2 decimals for values, 4 for times and slopes); the tree
//! stores the rounded coefficients so [`PiecewiseExpr::eval`] agrees
//! with what the engine will compute from the emitted text.

use std::fmt;

use castweld_common::error::{CastweldError, CastweldResult};

#[derive(Debug, Clone, PartialEq)]
enum ExprNode {
    /// A fixed value, covering the node's whole time range.
    Constant(f64),
    /// Linear interpolation anchored at `start`: `value + slope * (t - start)`.
    Segment { value: f64, slope: f64, start: f64 },
    /// `if(lt(t, threshold), below, above)`.
    Branch {
        threshold: f64,
        below: Box<ExprNode>,
        above: Box<ExprNode>,
    },
}

impl ExprNode {
    fn eval(&self, t: f64) -> f64 {
        match self {
            ExprNode::Constant(v) => *v,
            ExprNode::Segment { value, slope, start } => value + slope * (t - start),
            ExprNode::Branch {
                threshold,
                below,
                above,
            } => {
                if t < *threshold {
                    below.eval(t)
                } else {
                    above.eval(t)
                }
            }
        }
    }

    /// Nested conditionals on the deepest path; leaves count zero.
    fn depth(&self) -> usize {
        match self {
            ExprNode::Constant(_) | ExprNode::Segment { .. } => 0,
            ExprNode::Branch { below, above, .. } => 1 + below.depth().max(above.depth()),
        }
    }

    fn leaf_count(&self) -> usize {
        match self {
            ExprNode::Constant(_) | ExprNode::Segment { .. } => 1,
            ExprNode::Branch { below, above, .. } => below.leaf_count() + above.leaf_count(),
        }
    }

    fn branch_count(&self) -> usize {
        match self {
            ExprNode::Constant(_) | ExprNode::Segment { .. } => 0,
            ExprNode::Branch { below, above, .. } => {
                1 + below.branch_count() + above.branch_count()
            }
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Constant(v) => write!(f, "{v:.2}"),
            ExprNode::Segment { value, slope, start } => {
                write!(f, "({value:.2}+{slope:.4}*(t-{start:.4}))")
            }
            ExprNode::Branch {
                threshold,
                below,
                above,
            } => write!(f, "if(lt(t,{threshold:.4}),{below},{above})"),
        }
    }
}

/// A compiled time-varying expression, ready to be spliced into a
/// filter graph. Built once per render and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseExpr {
    root: ExprNode,
}

impl PiecewiseExpr {
    /// Compile a continuous quantity with linear interpolation between
    /// adjacent samples. Input must be sorted by time (the sample
    /// loader establishes this); co-timed adjacent samples degenerate
    /// to the first value instead of dividing by zero.
    pub fn linear(times: &[f64], values: &[f64]) -> CastweldResult<Self> {
        validate_series(times, values)?;
        Ok(Self {
            root: linear_node(times, values, 0, times.len() - 1),
        })
    }

    /// Compile a discrete quantity with nearest-left step selection:
    /// sample `i` is returned for all `t` in `[times[i], times[i+1])`,
    /// the first sample also covers earlier times and the last extends
    /// to infinity.
    pub fn step(times: &[f64], values: &[f64]) -> CastweldResult<Self> {
        validate_series(times, values)?;
        Ok(Self {
            root: step_node(times, values, 0, times.len() - 1),
        })
    }

    /// Evaluate at time `t`, using the same rounded coefficients the
    /// emitted text carries.
    pub fn eval(&self, t: f64) -> f64 {
        self.root.eval(t)
    }

    /// Maximum number of conditionals evaluated for any `t`.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    pub fn branch_count(&self) -> usize {
        self.root.branch_count()
    }
}

impl fmt::Display for PiecewiseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

fn validate_series(times: &[f64], values: &[f64]) -> CastweldResult<()> {
    if times.is_empty() {
        return Err(CastweldError::expression(
            "cannot compile an empty sample series",
        ));
    }
    if times.len() != values.len() {
        return Err(CastweldError::expression(format!(
            "times and values differ in length ({} vs {})",
            times.len(),
            values.len()
        )));
    }
    Ok(())
}

/// Bisect `[start, end]` (inclusive sample indices); the halves share
/// the midpoint sample so interpolation segments stay contiguous.
fn linear_node(times: &[f64], values: &[f64], start: usize, end: usize) -> ExprNode {
    if start == end {
        return ExprNode::Constant(round2(values[start]));
    }
    if end - start == 1 {
        let (t1, t2) = (times[start], times[end]);
        if t2 <= t1 {
            return ExprNode::Constant(round2(values[start]));
        }
        let slope = (values[end] - values[start]) / (t2 - t1);
        return ExprNode::Segment {
            value: round2(values[start]),
            slope: round4(slope),
            start: round4(t1),
        };
    }
    let mid = (start + end) / 2;
    ExprNode::Branch {
        threshold: round4(times[mid]),
        below: Box::new(linear_node(times, values, start, mid)),
        above: Box::new(linear_node(times, values, mid, end)),
    }
}

/// Bisect `[start, end]` into disjoint halves. The threshold is the
/// first time of the upper half, so each sample keeps ownership of the
/// interval from its own timestamp up to (not including) the next.
fn step_node(times: &[f64], values: &[f64], start: usize, end: usize) -> ExprNode {
    if start == end {
        return ExprNode::Constant(round2(values[start]));
    }
    let mid = (start + end) / 2;
    ExprNode::Branch {
        threshold: round4(times[mid + 1]),
        below: Box::new(step_node(times, values, start, mid)),
        above: Box::new(step_node(times, values, mid + 1, end)),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
