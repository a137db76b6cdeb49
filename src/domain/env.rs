//! The composition root: asset/derivative tree and recompute orchestration.
//!
//! Nodes live in an arena and are referenced by [`NodeId`]; derivatives hold
//! non-owning handles, so one leaf may sit under several derivatives and a
//! single append is visible to all of them. Recompute runs bottom-up and
//! rebuilds only the suffix invalidated by the earliest merged timestamp;
//! recomputing a suffix must equal recomputing from scratch, which the
//! weight strategies guarantee by treating `idx` as an output trim.

use std::collections::HashMap;

use super::bar::{Bar, Schema};
use super::error::TreefolioError;
use super::series::{BarFrame, Series, Timestamp};
use super::signal::{PeriodReturn, Signal};
use super::weights::{ChildWindow, WeightStrategy};

pub type NodeId = usize;

pub struct DerivativeState {
    children: Vec<NodeId>,
    strategy: Box<dyn WeightStrategy>,
    weights: Series<Vec<Signal>>,
    returns: Series<PeriodReturn>,
}

enum NodeKind {
    Asset,
    Derivative(DerivativeState),
}

struct Node {
    name: String,
    frame: BarFrame,
    kind: NodeKind,
}

pub struct Environment {
    name: String,
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    portfolio: Option<NodeId>,
}

impl Environment {
    pub fn new(name: &str) -> Self {
        Environment {
            name: name.to_string(),
            nodes: Vec::new(),
            by_name: HashMap::new(),
            portfolio: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self, name: &str, frame: BarFrame, kind: NodeKind) -> Result<NodeId, TreefolioError> {
        if self.by_name.contains_key(name) {
            return Err(TreefolioError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            frame,
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a raw asset with the schema its feed declares.
    pub fn create_asset(&mut self, name: &str, schema: Schema) -> Result<NodeId, TreefolioError> {
        self.register(name, BarFrame::new(schema), NodeKind::Asset)
    }

    /// Register a derivative owning `strategy`. Its value series is
    /// synthesized from child returns, starting at 1.0.
    pub fn create_derivative(
        &mut self,
        name: &str,
        strategy: Box<dyn WeightStrategy>,
    ) -> Result<NodeId, TreefolioError> {
        self.register(
            name,
            BarFrame::new(Schema::OPEN_CLOSE),
            NodeKind::Derivative(DerivativeState {
                children: Vec::new(),
                strategy,
                weights: Series::new(),
                returns: Series::new(),
            }),
        )
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id].name
    }

    /// Attach `child` under `parent`. Rejects edges that would make a node
    /// its own ancestor; sharing a child between parents is fine.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreefolioError> {
        if parent == child || self.subtree_contains(child, parent) {
            return Err(TreefolioError::CycleDetected {
                parent: self.nodes[parent].name.clone(),
                child: self.nodes[child].name.clone(),
            });
        }
        match &mut self.nodes[parent].kind {
            NodeKind::Derivative(state) => {
                state.children.push(child);
                Ok(())
            }
            NodeKind::Asset => Err(TreefolioError::NotADerivative {
                name: self.nodes[parent].name.clone(),
            }),
        }
    }

    fn subtree_contains(&self, root: NodeId, target: NodeId) -> bool {
        if root == target {
            return true;
        }
        match &self.nodes[root].kind {
            NodeKind::Asset => false,
            NodeKind::Derivative(state) => state
                .children
                .iter()
                .any(|&c| self.subtree_contains(c, target)),
        }
    }

    pub fn set_portfolio(&mut self, id: NodeId) -> Result<(), TreefolioError> {
        match &self.nodes[id].kind {
            NodeKind::Derivative(_) => {
                self.portfolio = Some(id);
                Ok(())
            }
            NodeKind::Asset => Err(TreefolioError::NotADerivative {
                name: self.nodes[id].name.clone(),
            }),
        }
    }

    pub fn portfolio(&self) -> Option<NodeId> {
        self.portfolio
    }

    /// Merge `incoming` into the named leaf asset. With `refresh_portfolio`,
    /// every derivative whose subtree contains the leaf is recomputed
    /// bottom-up from the earliest merged timestamp.
    pub fn append(
        &mut self,
        name: &str,
        incoming: &BarFrame,
        refresh_portfolio: bool,
    ) -> Result<(), TreefolioError> {
        let id = self
            .node_id(name)
            .ok_or_else(|| TreefolioError::UnknownNode {
                name: name.to_string(),
            })?;
        if matches!(self.nodes[id].kind, NodeKind::Derivative(_)) {
            return Err(TreefolioError::NotAnAsset {
                name: name.to_string(),
            });
        }
        let earliest = self.nodes[id].frame.merge(incoming)?;
        if refresh_portfolio {
            let root = self.portfolio.ok_or(TreefolioError::NoPortfolio)?;
            if let Some(from) = earliest {
                self.refresh_node(root, Some(from), Some(id))?;
            }
        }
        Ok(())
    }

    /// Full batch recompute of the portfolio tree from position 0.
    pub fn refresh(&mut self) -> Result<(), TreefolioError> {
        let root = self.portfolio.ok_or(TreefolioError::NoPortfolio)?;
        self.refresh_node(root, None, None)?;
        Ok(())
    }

    /// Post-order recompute. `touched` restricts the walk to derivatives
    /// whose subtree contains the updated leaf; `None` means recompute
    /// everything. Returns whether this subtree changed.
    fn refresh_node(
        &mut self,
        id: NodeId,
        from: Option<Timestamp>,
        touched: Option<NodeId>,
    ) -> Result<bool, TreefolioError> {
        let children = match &self.nodes[id].kind {
            NodeKind::Asset => return Ok(touched == Some(id)),
            NodeKind::Derivative(state) => state.children.clone(),
        };
        let mut dirty = touched.is_none();
        for child in children {
            if self.refresh_node(child, from, touched)? {
                dirty = true;
            }
        }
        if dirty {
            self.recompute(id, from)?;
        }
        Ok(dirty)
    }

    /// Rebuild a derivative's weights, returns and value series from the
    /// first position with timestamp >= `from` (everything with `None`).
    /// Children must already be up to date.
    fn recompute(&mut self, id: NodeId, from: Option<Timestamp>) -> Result<(), TreefolioError> {
        let child_ids = match &self.nodes[id].kind {
            NodeKind::Derivative(state) => state.children.clone(),
            NodeKind::Asset => return Ok(()),
        };
        let windows: Vec<ChildWindow> = child_ids
            .iter()
            .map(|&child| self.child_window(child))
            .collect();

        let mut union: Vec<Timestamp> = windows
            .iter()
            .flat_map(|w| w.stamps.iter().copied())
            .collect();
        union.sort_unstable();
        union.dedup();
        let from_pos = match from {
            Some(ts) => union.partition_point(|s| *s < ts),
            None => 0,
        };

        let node = &mut self.nodes[id];
        let state = match &mut node.kind {
            NodeKind::Derivative(state) => state,
            NodeKind::Asset => unreachable!("checked above"),
        };
        let new_weights = state.strategy.weights(&windows, &union, from_pos)?;

        // Entries strictly before `from` are untouched by the merge, so the
        // stored prefix stays valid; the suffix is rebuilt wholesale.
        let keep = match from {
            Some(ts) => state.weights.lower_bound(ts),
            None => 0,
        };
        state.weights.truncate(keep);
        state.returns.truncate(keep);
        let frame_keep = match from {
            Some(ts) => node.frame.series().lower_bound(ts),
            None => 0,
        };
        node.frame.truncate(frame_keep);

        let mut prev_close = if frame_keep > 0 {
            node.frame.series().at(frame_keep - 1).1.close
        } else {
            1.0
        };

        for (row, &ts) in new_weights.iter().zip(&union[from_pos..]) {
            let mut bar_ret = 0.0;
            let mut gap_ret = 0.0;
            for (ci, window) in windows.iter().enumerate() {
                if let Some(ret) = window.period_return(ts) {
                    bar_ret += row[ci].bar * ret.bar;
                    gap_ret += row[ci].gap * ret.gap;
                }
            }
            let open = prev_close * (1.0 + bar_ret);
            let close = open * (1.0 + gap_ret);
            state.weights.upsert(ts, row.clone());
            state.returns.upsert(
                ts,
                PeriodReturn {
                    bar: bar_ret,
                    gap: gap_ret,
                },
            );
            node.frame.upsert(ts, Bar::open_close(open, close));
            prev_close = close;
        }
        Ok(())
    }

    /// Precomputed per-child view: opens fall back to the close (whole
    /// close-to-close move on the bar leg), returns use strict previous-row
    /// closes so a partial bar poisons exactly the rows that depend on it.
    fn child_window(&self, id: NodeId) -> ChildWindow {
        let series = self.nodes[id].frame.series();
        let n = series.len();
        let stamps = series.stamps().to_vec();
        let mut opens = Vec::with_capacity(n);
        let mut closes = Vec::with_capacity(n);
        for bar in series.values() {
            let close = bar.close;
            opens.push(if bar.open.is_finite() { bar.open } else { close });
            closes.push(close);
        }
        let mut bar_returns = Vec::with_capacity(n);
        let mut gap_returns = Vec::with_capacity(n);
        for i in 0..n {
            if i == 0 {
                bar_returns.push(f64::NAN);
                gap_returns.push(f64::NAN);
                continue;
            }
            bar_returns.push(opens[i] / closes[i - 1] - 1.0);
            gap_returns.push(closes[i] / opens[i] - 1.0);
        }
        ChildWindow {
            stamps,
            opens,
            closes,
            bar_returns,
            gap_returns,
        }
    }

    /// Value series of any node: raw bars for assets, the synthesized
    /// unit-base series for derivatives.
    pub fn values(&self, id: NodeId) -> &BarFrame {
        &self.nodes[id].frame
    }

    pub fn weights(&self, id: NodeId) -> Option<&Series<Vec<Signal>>> {
        match &self.nodes[id].kind {
            NodeKind::Derivative(state) => Some(&state.weights),
            NodeKind::Asset => None,
        }
    }

    pub fn returns(&self, id: NodeId) -> Option<&Series<PeriodReturn>> {
        match &self.nodes[id].kind {
            NodeKind::Derivative(state) => Some(&state.returns),
            NodeKind::Asset => None,
        }
    }

    /// Scalar period returns: stored two-leg returns for derivatives,
    /// close-to-close ratios for raw assets (missing data reads as flat).
    pub fn period_returns(&self, id: NodeId) -> Vec<f64> {
        match &self.nodes[id].kind {
            NodeKind::Derivative(state) => state
                .returns
                .values()
                .iter()
                .map(|r| r.compounded())
                .collect(),
            NodeKind::Asset => {
                let series = self.nodes[id].frame.series();
                let closes: Vec<f64> = series.values().iter().map(|b| b.close).collect();
                closes
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| {
                        if i == 0 || !c.is_finite() || !closes[i - 1].is_finite() {
                            0.0
                        } else {
                            c / closes[i - 1] - 1.0
                        }
                    })
                    .collect()
            }
        }
    }

    /// Product of (1 + period return): the growth of one unit invested.
    pub fn compounded_return(&self, id: NodeId) -> f64 {
        self.period_returns(id).iter().map(|r| 1.0 + r).product()
    }
}
