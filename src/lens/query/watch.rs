//! Live query view
//!
//! [`QueryWatch`] remembers the last read query a context ran and re-runs it
//! every time another context announces a data change. Each refreshed page is
//! published on a `watch` channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{QueryArgs, QueryLens, QueryPage};
use crate::database::SessionManager;
use crate::lens::error::RegistryResult;
use crate::notify::{ChangeNotifier, Subscription};

pub struct QueryWatch {
    sessions: Arc<SessionManager>,
    notifier: ChangeNotifier,
    default_page_size: u32,
    last: Arc<Mutex<Option<QueryArgs>>>,
    pages: Arc<watch::Sender<Option<QueryPage>>>,
    _subscription: Subscription,
    refresher: JoinHandle<()>,
}

impl QueryWatch {
    pub fn new(
        sessions: Arc<SessionManager>,
        notifier: ChangeNotifier,
        default_page_size: u32,
    ) -> Self {
        let (pages, _) = watch::channel(None);
        let pages = Arc::new(pages);
        let last: Arc<Mutex<Option<QueryArgs>>> = Arc::new(Mutex::new(None));

        let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<()>();
        let subscription = notifier.on_data_changed(move || {
            let _ = refresh_tx.send(());
        });

        let refresher = {
            let sessions = Arc::clone(&sessions);
            let notifier = notifier.clone();
            let last = Arc::clone(&last);
            let pages = Arc::clone(&pages);
            tokio::spawn(async move {
                while refresh_rx.recv().await.is_some() {
                    // collapse a burst of notifications into one refresh
                    while refresh_rx.try_recv().is_ok() {}

                    let Some(args) = last.lock().await.clone() else {
                        continue;
                    };
                    debug!("{} refreshing last query", notifier.context());
                    match QueryLens::new(&sessions, &notifier)
                        .execute(&args, default_page_size)
                        .await
                    {
                        Ok(page) => {
                            pages.send_replace(Some(page));
                        }
                        Err(e) => warn!("failed to refresh query: {}", e),
                    }
                }
            })
        };

        Self {
            sessions,
            notifier,
            default_page_size,
            last,
            pages,
            _subscription: subscription,
            refresher,
        }
    }

    /// Run a query and, if it only reads, keep it as the one to refresh
    pub async fn run(&self, args: QueryArgs) -> RegistryResult<QueryPage> {
        let page = QueryLens::new(&self.sessions, &self.notifier)
            .execute(&args, self.default_page_size)
            .await?;

        if !page.mutated {
            *self.last.lock().await = Some(args);
        }
        self.pages.send_replace(Some(page.clone()));
        Ok(page)
    }

    /// The query that will be re-run on the next change
    pub async fn last_query(&self) -> Option<QueryArgs> {
        self.last.lock().await.clone()
    }

    /// Receive every page this watch produces
    pub fn subscribe(&self) -> watch::Receiver<Option<QueryPage>> {
        self.pages.subscribe()
    }
}

impl Drop for QueryWatch {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}
