//! Per-execution scheduler: ready queue, dependency counters, and
//! predecessor-contribution aggregation.
//!
//! A fresh `Task` is allocated by every [`super::Executor::execute`] call;
//! the `Executor` itself stays immutable so concurrent `execute` calls on
//! the same compiled graph never interfere with each other.
//!
//! State lives in a plain local (the scheduling loop is single-threaded);
//! completed workers report back through a `tokio::task::JoinSet`, which
//! doubles as the wake-up mechanism a condition variable would otherwise
//! provide.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::GraphError;
use crate::state::State;

use super::compiled::{select_edges, EdgeDecision, Executor, NodeInfo};
use super::context::NodeContext;
use super::handler::compose;
use super::logging;

/// Synthetic predecessor name carrying the initial state into the entry
/// node, so the entry participates in the aggregation protocol like any
/// other node.
pub(crate) const GRAPH_ENTRY: &str = "graph_entry";

struct TaskInner {
    ready: VecDeque<String>,
    remaining: HashMap<String, usize>,
    contributions: HashMap<String, HashMap<String, State>>,
    received: HashMap<String, usize>,
    in_flight: HashSet<String>,
    visited: HashSet<String>,
    processed_edges: HashSet<(String, String)>,
    finished: bool,
    finish_state: Option<State>,
    err: Option<GraphError>,
}

pub(crate) struct Task;

impl Task {
    pub(crate) async fn run(
        executor: &Executor,
        cancellation: CancellationToken,
        initial: State,
    ) -> Result<State, GraphError> {
        logging::log_graph_start();

        let mut inner = TaskInner {
            ready: VecDeque::new(),
            remaining: executor
                .infos
                .iter()
                .map(|(k, v)| (k.clone(), v.dependency_count))
                .collect(),
            contributions: executor
                .infos
                .keys()
                .map(|k| (k.clone(), HashMap::new()))
                .collect(),
            received: executor.infos.keys().map(|k| (k.clone(), 0)).collect(),
            in_flight: HashSet::new(),
            visited: HashSet::new(),
            processed_edges: HashSet::new(),
            finished: false,
            finish_state: None,
            err: None,
        };

        // Seed the entry node with the synthetic graph_entry contribution.
        inner
            .contributions
            .get_mut(&executor.entry)
            .expect("entry node has a contributions slot")
            .insert(GRAPH_ENTRY.to_string(), initial);
        inner.received.insert(executor.entry.clone(), 1);
        decrement_remaining_and_maybe_enqueue(&mut inner, &executor.entry);

        let mut workers: JoinSet<(String, Result<State, GraphError>)> = JoinSet::new();

        let result = loop {
            if let Some(err) = &inner.err {
                break Err(err.clone());
            }
            if inner.finished {
                break Ok(inner
                    .finish_state
                    .clone()
                    .expect("finished implies finish_state is set"));
            }

            if let Some(name) = inner.ready.pop_front() {
                let info = executor
                    .infos
                    .get(&name)
                    .expect("ready node has compiled info")
                    .clone();
                let state_in = aggregate_contributions(&mut inner, &info);
                debug_assert!(
                    !inner.in_flight.contains(&name),
                    "invariant: a node is scheduled at most once concurrently"
                );
                inner.in_flight.insert(name.clone());
                logging::log_node_start(&name);

                let ctx = NodeContext::new(name.clone(), cancellation.clone());
                let node = executor
                    .nodes
                    .get(&name)
                    .expect("compiled node exists")
                    .clone();
                let wrapped = compose(&executor.middleware, node.handler.clone());

                if executor.parallel {
                    workers.spawn(async move {
                        let result = wrapped.call(&ctx, state_in).await;
                        (name, result)
                    });
                } else {
                    let result = wrapped.call(&ctx, state_in).await;
                    if let Err(stop) = handle_completion(&mut inner, executor, name, result) {
                        break Err(stop);
                    }
                }
                continue;
            }

            if workers.is_empty() {
                break Err(GraphError::FinishNotReachable);
            }

            tokio::select! {
                Some(joined) = workers.join_next() => {
                    let (name, result) = joined.expect("worker task does not panic");
                    if let Err(stop) = handle_completion(&mut inner, executor, name, result) {
                        break Err(stop);
                    }
                }
                _ = cancellation.cancelled() => {
                    if inner.err.is_none() {
                        inner.err = Some(GraphError::Canceled);
                    }
                }
            }
        };

        // Drain any still-running workers before returning to the caller.
        // Their outcomes no longer affect scheduling once a terminal
        // result has been latched.
        while workers.join_next().await.is_some() {}

        match &result {
            Ok(_) => logging::log_graph_complete(),
            Err(e) => logging::log_graph_error(e),
        }
        result
    }
}

/// Handles one node's completion: marks it visited, and either publishes
/// the finish state or evaluates its outgoing edges. Returns `Err` only
/// to signal the scheduler loop should stop with that error (the first
/// error always wins — subsequent ones are dropped).
fn handle_completion(
    inner: &mut TaskInner,
    executor: &Executor,
    name: String,
    result: Result<State, GraphError>,
) -> Result<(), GraphError> {
    inner.in_flight.remove(&name);
    inner.visited.insert(name.clone());
    logging::log_node_complete(&name);

    let state = match result {
        Ok(s) => s,
        Err(e) => {
            let wrapped = GraphError::from_handler(&name, e);
            if inner.err.is_none() {
                inner.err = Some(wrapped.clone());
            }
            return Err(wrapped);
        }
    };

    let info = executor
        .infos
        .get(&name)
        .expect("completed node has compiled info");

    if info.is_finish {
        if inner.finished {
            // Finish state, once set, is never overwritten.
            return Ok(());
        }
        inner.finished = true;
        inner.finish_state = Some(state);
        return Ok(());
    }

    let ctx = NodeContext::new(name.clone(), CancellationToken::new());
    let decisions = match select_edges(info, &ctx, &state) {
        Ok(d) => d,
        Err(e) => {
            if inner.err.is_none() {
                inner.err = Some(e.clone());
            }
            return Err(e);
        }
    };

    apply_edge_decisions(inner, executor, &name, decisions, &state);
    Ok(())
}

fn apply_edge_decisions(
    inner: &mut TaskInner,
    executor: &Executor,
    from: &str,
    decisions: Vec<EdgeDecision>,
    state: &State,
) {
    let mut skip_worklist: VecDeque<String> = VecDeque::new();

    for decision in decisions {
        if decision.propagate {
            propagate_contribution(inner, from, &decision.edge.to, state.clone());
        } else {
            skip_edge(inner, from, &decision.edge.to, &mut skip_worklist);
        }
    }

    while let Some(skipped) = skip_worklist.pop_front() {
        logging::log_node_skipped(&skipped);
        if let Some(info) = executor.infos.get(&skipped) {
            for edge in &info.outgoing {
                skip_edge(inner, &skipped, &edge.to, &mut skip_worklist);
            }
        }
    }
}

fn propagate_contribution(inner: &mut TaskInner, from: &str, to: &str, state: State) {
    if !mark_edge_processed(inner, from, to) {
        // Duplicate (parent, target) contributions are ignored.
        return;
    }
    inner
        .contributions
        .entry(to.to_string())
        .or_default()
        .insert(from.to_string(), state);
    *inner.received.entry(to.to_string()).or_insert(0) += 1;
    decrement_remaining_and_maybe_enqueue(inner, to);
}

fn skip_edge(inner: &mut TaskInner, from: &str, to: &str, skip_worklist: &mut VecDeque<String>) {
    if !mark_edge_processed(inner, from, to) {
        return;
    }
    let became_ready_or_skipped = decrement_remaining(inner, to);
    if became_ready_or_skipped {
        let received = inner.received.get(to).copied().unwrap_or(0);
        if received > 0 {
            inner.ready.push_back(to.to_string());
        } else if inner.visited.insert(to.to_string()) {
            skip_worklist.push_back(to.to_string());
        }
    }
}

fn mark_edge_processed(inner: &mut TaskInner, from: &str, to: &str) -> bool {
    inner
        .processed_edges
        .insert((from.to_string(), to.to_string()))
}

/// Decrements `remaining[node]`, enqueuing it if it is now ready
/// (`remaining == 0 && received > 0`). Used for the contribution path,
/// where `received` was already bumped by the caller.
fn decrement_remaining_and_maybe_enqueue(inner: &mut TaskInner, node: &str) {
    if decrement_remaining(inner, node) {
        let received = inner.received.get(node).copied().unwrap_or(0);
        if received > 0 {
            inner.ready.push_back(node.to_string());
        }
    }
}

/// Decrements `remaining[node]` and returns `true` iff it just reached
/// zero (the caller decides what "ready" means from `received`).
fn decrement_remaining(inner: &mut TaskInner, node: &str) -> bool {
    let Some(rem) = inner.remaining.get_mut(node) else {
        return false;
    };
    if *rem == 0 {
        return false;
    }
    *rem -= 1;
    *rem == 0
}

fn aggregate_contributions(inner: &mut TaskInner, info: &NodeInfo) -> State {
    let mut contribs = inner.contributions.remove(&info.name).unwrap_or_default();
    let mut acc = State::new();
    for parent in &info.predecessors {
        if let Some(s) = contribs.remove(parent) {
            acc.merge(&s);
        }
    }
    // Secondary deterministic pass over any contributions from parents
    // outside the compiled predecessor list.
    let mut extra: Vec<String> = contribs.keys().cloned().collect();
    extra.sort();
    for parent in extra {
        if let Some(s) = contribs.remove(&parent) {
            acc.merge(&s);
        }
    }
    acc
}
