//! # Undo Log Property Tests
//!
//! Randomized append/pop interleavings against a reference stack model,
//! across tiny budgets and mixed spill eligibility. Whatever the
//! interleaving, pops must return exactly what a plain LIFO stack would.

use std::borrow::Cow;

use proptest::prelude::*;
use smallvec::smallvec;
use versodb::{
    BinaryRowCodec, MemAllocator, RowImage, SessionContext, UndoKind, UndoLog, UndoRecord, Value,
};

#[derive(Debug, Clone)]
enum Op {
    Append { tag: i64, eligible: bool },
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..1_000_000, prop::bool::weighted(0.8))
            .prop_map(|(tag, eligible)| Op::Append { tag, eligible }),
        2 => Just(Op::Pop),
    ]
}

fn row_for(tag: i64, eligible: bool) -> RowImage {
    if eligible {
        smallvec![
            Value::Int(tag),
            Value::Text(Cow::Owned(format!("v{}", tag))),
        ]
    } else {
        smallvec![Value::Int(tag), Value::Stream { handle: tag as u64 }]
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pops_match_reference_stack(
        budget in 0usize..6,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let ctx = SessionContext::new(budget, true);
        let mut log = UndoLog::new(ctx, BinaryRowCodec, MemAllocator);
        let mut model: Vec<(i64, bool)> = Vec::new();

        for op in ops {
            match op {
                Op::Append { tag, eligible } => {
                    let record = UndoRecord::new(UndoKind::Insert, 1, row_for(tag, eligible));
                    log.append(record).unwrap();
                    model.push((tag, eligible));
                }
                Op::Pop => {
                    match model.pop() {
                        Some((tag, eligible)) => {
                            let resident_before = log.resident_count();
                            let record = log.pop_last().unwrap();
                            // Property: one pop rehydrates at most a
                            // half-budget window of stored records.
                            let restored = (log.resident_count() + 1)
                                .saturating_sub(resident_before);
                            prop_assert!(restored <= budget / 2 + 1);
                            let (_, _, row) = record.into_parts().unwrap();
                            prop_assert_eq!(row, row_for(tag, eligible));
                        }
                        None => {
                            prop_assert!(log.pop_last().is_err());
                        }
                    }
                }
            }
            prop_assert_eq!(log.size(), model.len());
        }

        // Drain: every remaining record comes back in reverse order.
        while let Some((tag, eligible)) = model.pop() {
            let (_, _, row) = log.pop_last().unwrap().into_parts().unwrap();
            prop_assert_eq!(row, row_for(tag, eligible));
        }
        prop_assert!(log.is_empty());
    }
}
