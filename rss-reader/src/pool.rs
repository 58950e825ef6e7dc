use crate::rss_utils::url::host_key;
use crate::types::{AggregatorError, FetchConfig, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{AcquireError, Mutex, OnceCell, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Shared HTTP session plus the connection caps every fetch has to respect.
///
/// The underlying client is built on first use and lives as long as the pool.
/// Slots are handed out as [`ConnectionSlot`] guards and return to the pool
/// when the guard drops, including when the owning future is cancelled.
pub struct ConnectionPool {
    client: OnceCell<Client>,
    total: Arc<Semaphore>,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    config: FetchConfig,
}

pub struct ConnectionSlot {
    _total: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            client: OnceCell::new(),
            total: Arc::new(Semaphore::new(config.max_connections.max(1))),
            per_host: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                info!(
                    "Creating HTTP session (max {} connections, {} per host)",
                    self.config.max_connections, self.config.max_connections_per_host
                );
                let mut builder = Client::builder();
                if !self.config.use_system_proxy {
                    builder = builder.no_proxy();
                }
                builder
                    .user_agent(&self.config.user_agent)
                    .connect_timeout(self.config.connect_timeout())
                    .timeout(self.config.fetch_timeout())
                    .gzip(true)
                    .deflate(true)
                    .brotli(true)
                    .redirect(reqwest::redirect::Policy::limited(self.config.max_redirects))
                    .pool_max_idle_per_host(self.config.max_connections_per_host.max(1))
                    .build()
                    .map_err(AggregatorError::from)
            })
            .await
    }

    /// Wait for a free slot for `url`, both globally and on its host.
    pub async fn acquire(&self, url: &str) -> std::result::Result<ConnectionSlot, AcquireError> {
        let host = host_key(url);

        let host_semaphore = {
            let mut map = self.per_host.lock().await;
            map.entry(host.clone())
                .or_insert_with(|| {
                    Arc::new(Semaphore::new(self.config.max_connections_per_host.max(1)))
                })
                .clone()
        };

        // Host first, so a busy host does not hold global slots while it waits.
        let host_permit = host_semaphore.acquire_owned().await?;
        let total_permit = self.total.clone().acquire_owned().await?;

        debug!(
            "Acquired connection slot for {} ({} free overall)",
            host,
            self.total.available_permits()
        );

        Ok(ConnectionSlot {
            _total: total_permit,
            _host: host_permit,
        })
    }

    pub fn available(&self) -> usize {
        self.total.available_permits()
    }

    pub fn is_open(&self) -> bool {
        self.client.initialized()
    }

    /// Refuse new slots. Waiters fail instead of hanging on a dying pool.
    pub fn close(&self) {
        self.total.close();
    }
}
