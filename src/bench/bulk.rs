//! Sequential batched insertion.

use tracing::debug;

use crate::backend::BackendAdapter;
use crate::error::{BenchError, Result};
use crate::record::RecordGenerator;

/// Split of `total` records into `batch_size` chunks; the final chunk carries
/// the remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    total: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Fails when `batch_size` is zero.
    pub fn new(total: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(BenchError::Configuration(
                "insert batch size must be greater than zero".into(),
            ));
        }
        Ok(Self { total, batch_size })
    }

    /// Number of `insert_batch` calls.
    pub fn batch_count(&self) -> usize {
        self.total.div_ceil(self.batch_size)
    }

    /// Records in each batch, in call order.
    pub fn sizes(&self) -> impl Iterator<Item = usize> {
        let Self { total, batch_size } = *self;
        (0..self.batch_count()).map(move |idx| (total - idx * batch_size).min(batch_size))
    }
}

/// Inserts a fixed number of records through `insert_batch`.
#[derive(Clone, Copy, Debug)]
pub struct BulkInsertBenchmark {
    batch_size: usize,
}

impl BulkInsertBenchmark {
    /// Benchmark issuing batches of `batch_size` records.
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Writes `total` generated records on one pooled connection. Returns the
    /// number of records written. No call is made when `total` is zero.
    pub fn run(
        &self,
        adapter: &dyn BackendAdapter,
        generator: &mut RecordGenerator,
        total: usize,
    ) -> Result<usize> {
        let plan = BatchPlan::new(total, self.batch_size)?;
        let batches = plan.batch_count();
        if batches == 0 {
            return Ok(0);
        }
        let mut written = 0usize;
        adapter.with_connection(&mut |session| {
            for (idx, size) in plan.sizes().enumerate() {
                debug!(batch = idx + 1, batches, size, "bulk_insert.batch");
                let batch: Vec<_> = generator.generate(size).collect();
                session.insert_batch(&batch)?;
                written += size;
            }
            Ok(())
        })?;
        Ok(written)
    }
}
