//! Chunked batch writes.
//!
//! A batch is split into consecutive chunks of at most `batch_size`
//! entities. Every chunk runs on its own session as a single batch
//! statement. Chunks are not atomic with each other: when chunk K fails,
//! chunks before it stay written and the error is returned.

use std::any::type_name;

use sqlmapper_core::{
    Entity, Error, PreconditionKind, Result, SessionProvider, SqlMethod, StatementId,
};

use crate::db::Db;

#[allow(clippy::result_large_err)]
fn check_batch(len: usize, batch_size: usize, operation: &'static str) -> Result<()> {
    if len == 0 {
        return Err(Error::precondition(
            PreconditionKind::EmptyCollection,
            operation,
            "entity list cannot be empty",
        ));
    }
    if batch_size == 0 {
        return Err(Error::precondition(
            PreconditionKind::InvalidBatchSize,
            operation,
            "batch size must be at least 1",
        ));
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
impl<P> Db<P>
where
    P: SessionProvider,
    P::Session: 'static,
{
    /// Insert `entities` in chunks of the configured batch size.
    pub fn save_batch<M: Entity>(&self, entities: &mut [M]) -> Result<bool> {
        self.save_batch_with_size(entities, self.config().batch_size)
    }

    /// Insert `entities` in chunks of `batch_size`.
    ///
    /// Generated keys are stored back into the entities.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = type_name::<M>(), count = entities.len(), batch_size = batch_size)
    )]
    pub fn save_batch_with_size<M: Entity>(
        &self,
        entities: &mut [M],
        batch_size: usize,
    ) -> Result<bool> {
        check_batch(entities.len(), batch_size, "save_batch")?;
        let statement = self.metadata::<M>()?.statement(SqlMethod::Insert);
        let chunks = entities.len().div_ceil(batch_size);
        for (index, chunk) in entities.chunks_mut(batch_size).enumerate() {
            let len = chunk.len();
            self.execute::<M, _>(|mapper| mapper.insert_batch(&statement, chunk))
                .inspect_err(|e| log_chunk_failure(&statement, index, chunks, e))?;
            tracing::debug!(%statement, chunk = index + 1, of = chunks, len, "Flushed chunk");
        }
        Ok(true)
    }

    /// Update `entities` by key in chunks of the configured batch size.
    pub fn update_batch_by_id<M: Entity>(&self, entities: &[M]) -> Result<bool> {
        self.update_batch_by_id_with_size(entities, self.config().batch_size)
    }

    /// Update `entities` by key in chunks of `batch_size`.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = type_name::<M>(), count = entities.len(), batch_size = batch_size)
    )]
    pub fn update_batch_by_id_with_size<M: Entity>(
        &self,
        entities: &[M],
        batch_size: usize,
    ) -> Result<bool> {
        check_batch(entities.len(), batch_size, "update_batch_by_id")?;
        let statement = self.metadata::<M>()?.statement(SqlMethod::UpdateById);
        let chunks = entities.len().div_ceil(batch_size);
        for (index, chunk) in entities.chunks(batch_size).enumerate() {
            self.execute::<M, _>(|mapper| mapper.update_batch_by_id(&statement, chunk))
                .inspect_err(|e| log_chunk_failure(&statement, index, chunks, e))?;
            tracing::debug!(
                %statement,
                chunk = index + 1,
                of = chunks,
                len = chunk.len(),
                "Flushed chunk"
            );
        }
        Ok(true)
    }
}

fn log_chunk_failure(statement: &StatementId, index: usize, chunks: usize, error: &Error) {
    tracing::warn!(
        %statement,
        chunk = index + 1,
        of = chunks,
        error = %error,
        "Batch chunk failed; earlier chunks remain committed"
    );
}
