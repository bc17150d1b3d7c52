//! Async transaction handle.

use super::factory::AsyncConnection;
use super::DbResult;
use log::warn;

/// Transaction opened on an [`AsyncConnection`].
///
/// The caller owns both the transaction and its connection. Repository calls
/// that receive this handle run on [`AsyncTransaction::connection`] and never
/// close it.
///
/// Finish with [`AsyncTransaction::commit`] or [`AsyncTransaction::rollback`].
/// An unfinished transaction is rolled back in the background on drop when a
/// Tokio runtime is available.
pub struct AsyncTransaction {
    conn: AsyncConnection,
    finished: bool,
}

impl AsyncTransaction {
    /// Begins a deferred transaction on `conn`.
    pub async fn begin(conn: &AsyncConnection) -> DbResult<Self> {
        conn.call(|conn| {
            conn.execute_batch("BEGIN DEFERRED;")?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn: conn.clone(),
            finished: false,
        })
    }

    pub fn connection(&self) -> &AsyncConnection {
        &self.conn
    }

    pub async fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn
            .call(|conn| {
                conn.execute_batch("COMMIT;")?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn
            .call(|conn| {
                conn.execute_batch("ROLLBACK;")?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

impl Drop for AsyncTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("event=transaction_drop module=db status=error error=no_runtime_for_rollback");
            return;
        };

        let conn = self.conn.clone();
        runtime.spawn(async move {
            let result = conn
                .call(|conn| {
                    if !conn.is_autocommit() {
                        conn.execute_batch("ROLLBACK;")?;
                    }
                    Ok(())
                })
                .await;
            if let Err(err) = result {
                warn!("event=transaction_drop module=db status=error error={err}");
            }
        });
    }
}
