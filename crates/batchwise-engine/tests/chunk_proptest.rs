use batchwise_engine::config::{parser, validator};
use batchwise_engine::{
    FaultInjectingProcessor, FaultPlan, IterReader, RetryPolicy, Step, StepBuilder, VecWriter,
};
use batchwise_types::error::{BatchError, ErrorKind};
use batchwise_types::state::StepStatus;
use proptest::prelude::*;

fn negate(n: &i64) -> Result<i64, BatchError> {
    Ok(n.wrapping_neg())
}

proptest! {
    #[test]
    fn flushes_are_full_except_a_nonempty_last(
        items in proptest::collection::vec(any::<i64>(), 0..200),
        chunk_size in 1_usize..17,
    ) {
        let writer = VecWriter::new();
        let log = writer.log();
        let mut step = StepBuilder::<i64, i64>::new("prop")
            .chunk(chunk_size)
            .reader(IterReader::new(items.clone()))
            .processor(negate)
            .writer(writer)
            .build()
            .unwrap();

        prop_assert!(step.execute().is_completed());
        let sizes = log.chunk_sizes();
        prop_assert_eq!(sizes.len(), items.len().div_ceil(chunk_size));
        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|&s| s == chunk_size));
            prop_assert!((1..=chunk_size).contains(last));
        }
    }

    #[test]
    fn flushed_records_match_processed_source_order(
        items in proptest::collection::vec(any::<i64>(), 0..100),
        chunk_size in 1_usize..9,
    ) {
        let writer = VecWriter::new();
        let log = writer.log();
        let mut step = StepBuilder::<i64, i64>::new("prop")
            .chunk(chunk_size)
            .reader(IterReader::new(items.clone()))
            .processor(negate)
            .writer(writer)
            .build()
            .unwrap();

        prop_assert!(step.execute().is_completed());
        let expected: Vec<i64> = items.iter().map(|n| n.wrapping_neg()).collect();
        prop_assert_eq!(log.items(), expected);
    }

    #[test]
    fn persistent_failure_consumes_exactly_limit_plus_one(retry_limit in 0_u32..6) {
        let plan = FaultPlan::always();
        let observer = plan.clone();
        let mut step = StepBuilder::<i64, i64>::new("prop")
            .chunk(3)
            .reader(IterReader::new([1, 2, 3]))
            .processor(FaultInjectingProcessor::new(negate, plan))
            .writer(VecWriter::new())
            .fault_tolerant(RetryPolicy::new(retry_limit).retry_on(ErrorKind::Processing))
            .build()
            .unwrap();

        prop_assert_eq!(step.execute().status, StepStatus::Failed);
        prop_assert_eq!(observer.invocations(), u64::from(retry_limit) + 1);
    }

    #[test]
    fn chunk_size_must_be_positive(chunk_size in 0_usize..4) {
        let yaml = format!(
            r#"
version: "1.0"
job: prop_chunk_size
steps:
  - name: step1
    chunk_size: {chunk_size}
    reader: {{ use: delimited }}
    processor: user_profile
    writer: {{ use: delimited }}
"#
        );

        let config = parser::parse_job_str(&yaml).expect("generated yaml must parse");
        let result = validator::validate_job(&config);

        if chunk_size == 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
