use lineup_core::config::SequencerConfig;
use lineup_core::sequencer::readiness;
use lineup_core::{BlockingEdge, SequenceError, Sequencer, State};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn item_id(index: usize) -> String {
    format!("t{index:02}")
}

/// Random DAG: edges only run from a lower index to a higher one.
fn arb_dag() -> impl Strategy<Value = (Vec<String>, Vec<BlockingEdge>)> {
    (1_usize..12).prop_flat_map(|n| {
        let pairs = prop::collection::vec((0..n, 0..n), 0..(n * 2));
        (Just(n), pairs).prop_map(|(n, pairs)| {
            let ids: Vec<String> = (0..n).map(item_id).collect();
            let edges = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| {
                    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                    BlockingEdge::new(item_id(lo), item_id(hi))
                })
                .collect();
            (ids, edges)
        })
    })
}

/// A DAG with one extra edge that closes a loop along an existing chain.
fn arb_cyclic() -> impl Strategy<Value = (Vec<String>, Vec<BlockingEdge>)> {
    (arb_dag(), 2_usize..6).prop_map(|((mut ids, mut edges), len)| {
        let base = ids.len();
        for offset in 0..len {
            ids.push(item_id(base + offset));
        }
        for offset in 1..len {
            edges.push(BlockingEdge::new(
                item_id(base + offset - 1),
                item_id(base + offset),
            ));
        }
        edges.push(BlockingEdge::new(item_id(base + len - 1), item_id(base)));
        (ids, edges)
    })
}

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Complete(usize),
    Fail(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0_usize..12).prop_map(Op::Start),
            (0_usize..12).prop_map(Op::Complete),
            (0_usize..12).prop_map(Op::Fail),
        ],
        0..80,
    )
}

fn load(ids: &[String], edges: &[BlockingEdge], max_attempts: u32) -> Sequencer {
    Sequencer::load(ids.iter().cloned(), edges, &SequencerConfig { max_attempts })
        .expect("acyclic input loads")
}

fn apply(seq: &mut Sequencer, op: &Op) {
    // Errors are expected for most random ops; only the resulting state matters.
    let _ = match op {
        Op::Start(i) => seq.start(&item_id(*i)).map(|_| ()),
        Op::Complete(i) => seq.complete(&item_id(*i)).map(|_| ()),
        Op::Fail(i) => seq.fail(&item_id(*i), "boom").map(|_| ()),
    };
}

fn states(seq: &Sequencer) -> HashMap<String, (State, u32)> {
    seq.store()
        .items()
        .map(|item| (item.id.clone(), (item.state, item.attempts)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn acyclic_input_always_loads((ids, edges) in arb_dag()) {
        let seq = Sequencer::load(ids.iter().cloned(), &edges, &SequencerConfig::default());
        prop_assert!(seq.is_ok());
        let seq = seq.expect("checked above");

        // The stored order respects every edge.
        let order = seq.store().topological_order();
        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        for edge in &edges {
            prop_assert!(position[edge.blocker.as_str()] < position[edge.blocked.as_str()]);
        }
    }

    #[test]
    fn cyclic_input_is_rejected((ids, edges) in arb_cyclic()) {
        let result = Sequencer::load(ids.iter().cloned(), &edges, &SequencerConfig::default());
        let is_cycle = matches!(result, Err(SequenceError::Cycle { ref cycles }) if !cycles.is_empty());
        prop_assert!(is_cycle);
    }

    #[test]
    fn ready_items_are_pending_with_done_blockers(
        (ids, edges) in arb_dag(),
        ops in arb_ops(),
    ) {
        let mut seq = load(&ids, &edges, 2);
        for op in &ops {
            apply(&mut seq, op);
            for id in seq.ready_items() {
                let item = seq.item(id).expect("ready item exists");
                prop_assert_eq!(item.state, State::Pending);
                prop_assert!(readiness::blockers_done(seq.store(), id));
            }
            for id in seq.retryable_items() {
                prop_assert_eq!(seq.item(id).map(|item| item.state), Some(State::Blocked));
            }
        }
    }

    #[test]
    fn ready_items_is_idempotent((ids, edges) in arb_dag(), ops in arb_ops()) {
        let mut seq = load(&ids, &edges, 3);
        for op in &ops {
            apply(&mut seq, op);
        }
        let first: Vec<String> = seq.ready_items().into_iter().map(str::to_string).collect();
        let second: Vec<String> = seq.ready_items().into_iter().map(str::to_string).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn terminal_states_never_change((ids, edges) in arb_dag(), ops in arb_ops()) {
        let mut seq = load(&ids, &edges, 2);
        let mut terminal: HashMap<String, (State, u32)> = HashMap::new();
        for op in &ops {
            apply(&mut seq, op);
            for (id, (state, attempts)) in states(&seq) {
                if let Some(&frozen) = terminal.get(&id) {
                    prop_assert_eq!((state, attempts), frozen);
                } else if state.is_terminal() {
                    terminal.insert(id, (state, attempts));
                }
            }
        }
    }

    #[test]
    fn attempts_never_exceed_max(
        (ids, edges) in arb_dag(),
        ops in arb_ops(),
        max_attempts in 1_u32..5,
    ) {
        let mut seq = load(&ids, &edges, max_attempts);
        for op in &ops {
            apply(&mut seq, op);
            for item in seq.store().items() {
                prop_assert!(item.attempts <= max_attempts);
                if item.state == State::Blocked {
                    prop_assert!(item.attempts < max_attempts);
                }
                prop_assert!(item.error_matches_state());
            }
        }
    }

    #[test]
    fn failing_every_attempt_ends_failed(max_attempts in 1_u32..8) {
        let mut seq = Sequencer::load(["a"], &[], &SequencerConfig { max_attempts })
            .expect("load");
        for _ in 0..max_attempts {
            seq.start("a").expect("start");
            seq.fail("a", "x").expect("fail");
        }
        let item = seq.item("a").expect("exists");
        prop_assert_eq!(item.state, State::Failed);
        prop_assert_eq!(item.attempts, max_attempts);
        prop_assert!(seq.start("a").is_err());
    }

    #[test]
    fn dependents_of_failures_are_reported((ids, edges) in arb_dag()) {
        // Fail the roots permanently, finish nothing else.
        let mut seq = load(&ids, &edges, 1);
        let roots: Vec<String> = seq.ready_items().into_iter().map(str::to_string).collect();
        for id in &roots {
            seq.start(id).expect("start");
            seq.fail(id, "x").expect("fail");
        }

        let unterminated: BTreeSet<String> = seq
            .store()
            .items()
            .filter(|item| !item.state.is_terminal())
            .map(|item| item.id.clone())
            .collect();

        match seq.check_deadlock() {
            Ok(()) => prop_assert!(unterminated.is_empty()),
            Err(SequenceError::Deadlock(report)) => {
                let stuck: BTreeSet<String> =
                    report.items.iter().map(|item| item.id.clone()).collect();
                prop_assert_eq!(stuck, unterminated);
                for item in &report.items {
                    prop_assert!(!item.unmet_blockers.is_empty());
                }
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
