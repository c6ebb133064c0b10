//! Connection lifecycle: bounded-retry initialization, handle accessors,
//! readiness latch and teardown.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──init_pool──► Initializing ──connected──► Ready
//!       ▲                           │                         │
//!       └────── failed / cancelled ─┘          close ─────────┘
//! ```
//!
//! Only the holder of the context's [`StartupToken`] may run
//! [`StorageContext::init_pool`]. Other tasks either call the lock-free
//! accessors ([`StorageContext::cluster`], [`StorageContext::bucket`]), which
//! fail fast until the handles are published, or block on
//! [`StorageContext::wait_until_ready`].
//!
//! # Retries
//!
//! Only "database not accepting connections yet" failures are retried (see
//! [`StorageError::is_not_yet_reachable`]). Retries happen at a fixed
//! interval until `max_wait` has elapsed since the first attempt. Every other
//! failure aborts initialization immediately.

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use authstore_storage::{Bucket, Cluster, StorageError, StorageResult};
use fail::fail_point;
use tokio::time::Instant;

use crate::{
    context::{InitializationState, PoolHandles, StartupToken, StorageContext},
    error::{DocumentStorageError, Result},
    retry::{InitRetryState, RetryDecision, format_minutes},
};

const LONG_NOTICE: &str = "Error connecting to the document store instance. Please make sure that \
     the database is running and that you have specified the correct value for 'connection_uri' \
     in your config file. Retrying until the configured maximum wait elapses.";

impl StorageContext {
    /// Connects to the database and publishes the cluster and bucket handles.
    ///
    /// Returns immediately if the handles are already published. Otherwise
    /// attempts to connect and wait for the bucket, retrying refused
    /// connections every `retry_interval` until `max_wait` has elapsed.
    ///
    /// A missing bucket counts as a successful connection; the bucket is
    /// expected to be created out of band, and queries fail until it is.
    ///
    /// # Errors
    ///
    /// - [`DocumentStorageError::Initialization`] if `token` belongs to another context and the
    ///   handles are not yet published, the failure is not retryable, or
    ///   [`shutdown`](Self::shutdown) was called while waiting
    /// - [`DocumentStorageError::InitializationTimeout`] if the database was still refusing
    ///   connections when `max_wait` elapsed
    #[tracing::instrument(skip(self, token), fields(context_id = self.id))]
    pub async fn init_pool(&self, token: &StartupToken) -> Result<()> {
        if self.handles.load().is_some() {
            return Ok(());
        }

        if token.context_id != self.id {
            return Err(DocumentStorageError::Initialization {
                message: format!(
                    "init_pool called with the startup token of context {} on context {}",
                    token.context_id, self.id
                ),
                source: None,
            });
        }

        let _guard = self.lifecycle_lock.lock().await;
        if self.handles.load().is_some() {
            return Ok(());
        }

        self.set_state(InitializationState::Initializing);
        tracing::info!(bucket = self.config.bucket_name(), "Setting up document store connection");

        match self.connect_with_retry().await {
            Ok(handles) => {
                self.handles.store(Some(Arc::new(handles)));
                self.set_state(InitializationState::Ready);
                tracing::info!("Document store connection ready");
                Ok(())
            },
            Err(err) => {
                self.abort_lifecycle();
                tracing::error!(error = %err, "Document store initialization failed");
                Err(err)
            },
        }
    }

    async fn connect_with_retry(&self) -> Result<PoolHandles> {
        let retry = self.config.retry();
        let mut schedule = InitRetryState::new(retry, Instant::now().into_std());

        loop {
            let err = match self.connect_once().await {
                Ok(handles) => return Ok(handles),
                Err(err) => err,
            };

            if !err.is_not_yet_reachable() {
                return Err(DocumentStorageError::initialization(
                    "Error connecting to the document store",
                    err,
                ));
            }

            match schedule.on_transient_failure(Instant::now().into_std()) {
                RetryDecision::GiveUp => {
                    return Err(DocumentStorageError::InitializationTimeout {
                        waited: retry.max_wait(),
                        message: format!(
                            "Error connecting to the document store instance: {err}. Please \
                             make sure the database is running and that 'connection_uri' is \
                             correct."
                        ),
                    });
                },
                RetryDecision::Retry { delay, minutes_remaining, emit_long_notice } => {
                    if emit_long_notice {
                        tracing::info!(error = %err, "{LONG_NOTICE}");
                    }
                    tracing::info!(
                        minutes_remaining,
                        "Trying again in a few seconds for {} mins...",
                        format_minutes(minutes_remaining)
                    );
                    self.sleep_or_cancelled(delay, err).await?;
                },
            }
        }
    }

    async fn sleep_or_cancelled(&self, delay: Duration, last_error: StorageError) -> Result<()> {
        fail_point!("init-pool-before-sleep");

        tokio::select! {
            () = self.shutdown.cancelled() => {
                tracing::warn!("Document store initialization cancelled");
                Err(DocumentStorageError::initialization(
                    "Initialization cancelled while waiting to retry",
                    last_error,
                ))
            },
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// One connect-and-verify attempt.
    async fn connect_once(&self) -> StorageResult<PoolHandles> {
        fail_point!("init-pool-connect", |_| {
            Err(StorageError::connection_refused("injected by fail point"))
        });

        if !self.is_enabled() {
            return Err(StorageError::connection_refused("storage is disabled"));
        }

        let cluster = self.connector.connect(&self.config.connection_settings()).await?;
        let bucket = cluster.bucket(self.config.bucket_name());

        match bucket.wait_until_ready(self.config.retry().readiness_timeout()).await {
            Ok(()) => {},
            Err(StorageError::BucketNotFound { bucket: name }) => {
                tracing::warn!(bucket = %name, "Bucket does not exist yet; continuing");
            },
            Err(err) => {
                if let Err(close_err) = cluster.close().await {
                    tracing::debug!(error = %close_err, "Failed to close cluster after readiness error");
                }
                return Err(err);
            },
        }

        Ok(PoolHandles { cluster, bucket })
    }

    /// Returns the shared cluster handle.
    ///
    /// # Errors
    ///
    /// - [`DocumentStorageError::NotInitialized`] before a successful [`init_pool`](Self::init_pool)
    /// - [`DocumentStorageError::Disabled`] while storage is disabled
    pub fn cluster(&self) -> Result<Arc<dyn Cluster>> {
        self.with_handles(|handles| Arc::clone(&handles.cluster))
    }

    /// Returns the shared bucket handle.
    ///
    /// # Errors
    ///
    /// Same as [`cluster`](Self::cluster).
    pub fn bucket(&self) -> Result<Arc<dyn Bucket>> {
        self.with_handles(|handles| Arc::clone(&handles.bucket))
    }

    fn with_handles<T>(&self, f: impl FnOnce(&PoolHandles) -> T) -> Result<T> {
        let guard = self.handles.load();
        let Some(handles) = guard.as_deref() else {
            return Err(DocumentStorageError::NotInitialized);
        };
        if !self.is_enabled() {
            return Err(DocumentStorageError::Disabled);
        }
        Ok(f(handles))
    }

    /// Blocks until the handles are published.
    ///
    /// Returns immediately if they already are.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStorageError::NotInitialized`] if initialization
    /// fails or the pool is closed while waiting.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let mut receiver = self.lifecycle.subscribe();
        let aborts_at_start = receiver.borrow().aborts;

        let settled = receiver
            .wait_for(|lifecycle| {
                lifecycle.state == InitializationState::Ready || lifecycle.aborts != aborts_at_start
            })
            .await
            .map_err(|_| DocumentStorageError::NotInitialized)?;

        if settled.state == InitializationState::Ready {
            Ok(())
        } else {
            Err(DocumentStorageError::NotInitialized)
        }
    }

    /// Releases the cluster handle and resets the context.
    ///
    /// Does nothing if the context is not initialized. Waits for a running
    /// [`init_pool`](Self::init_pool) to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStorageError::Storage`] if the client fails to close
    /// the connection. The context is reset either way.
    #[tracing::instrument(skip(self), fields(context_id = self.id))]
    pub async fn close(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        let Some(handles) = self.handles.swap(None) else {
            return Ok(());
        };

        self.abort_lifecycle();
        handles.cluster.close().await?;
        tracing::info!("Document store connection closed");
        Ok(())
    }

    /// Aborts a running or future [`init_pool`](Self::init_pool) retry loop.
    ///
    /// Already-published handles stay usable until [`close`](Self::close).
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Enables or disables storage access.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns the current initialization state.
    #[must_use]
    pub fn state(&self) -> InitializationState {
        self.lifecycle.borrow().state
    }
}
