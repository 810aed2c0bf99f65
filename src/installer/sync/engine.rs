use super::context::SyncContext;
use super::poll::PollPolicy;
use super::result::SyncResult;
use super::{SyncError, SyncOptions, HOOK_ANNOTATIONS};
use crate::installer::cache::ClusterCache;
use crate::installer::cluster::ClusterClient;
use crate::installer::reconcile::{normalize_targets, reconcile};
use crate::installer::resource::{GroupKind, ResourceKey};
use crate::observability::metrics;
use kube::api::DynamicObject;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

/// Runs sync operations against one cluster
#[derive(Clone)]
pub struct SyncEngine {
    client: Arc<dyn ClusterClient>,
    cache: Arc<ClusterCache>,
    policy: PollPolicy,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("policy", &self.policy)
            .field("active", &self.active_contexts())
            .finish_non_exhaustive()
    }
}

fn is_hook(obj: &DynamicObject) -> bool {
    obj.metadata
        .annotations
        .as_ref()
        .is_some_and(|a| HOOK_ANNOTATIONS.iter().any(|h| a.contains_key(*h)))
}

impl SyncEngine {
    pub fn new(client: Arc<dyn ClusterClient>, cache: Arc<ClusterCache>, policy: PollPolicy) -> Self {
        Self {
            client,
            cache,
            policy,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ClusterCache> {
        &self.cache
    }

    /// Sync contexts currently alive
    #[must_use]
    pub fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Converge the objects selected by `options.selector` in `namespace` to `targets`
    ///
    /// Relists the kinds involved, then runs one step immediately and one step
    /// per poll interval until the run completes, `cancel` fires, or the
    /// policy's `max_wait` elapses. A step in flight is abandoned on cancel.
    pub async fn run(
        &self,
        namespace: &str,
        targets: Vec<DynamicObject>,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            info!(%namespace, "Sync cancelled before it started");
            return Err(SyncError::Cancelled {
                last: SyncResult::default(),
            });
        }
        self.cache.ensure_synced().await?;

        let targets: Vec<DynamicObject> = if options.skip_hooks {
            targets
                .into_iter()
                .filter(|obj| {
                    let hook = is_hook(obj);
                    if hook {
                        debug!(resource = %ResourceKey::from_object(obj), "Skipping hook manifest");
                    }
                    !hook
                })
                .collect()
        } else {
            targets
        };
        let targets = normalize_targets(targets, namespace, &self.cache).await;

        // Out-of-band changes are only seen by listing again
        let mut kinds: HashSet<GroupKind> = targets
            .iter()
            .map(|obj| ResourceKey::from_object(obj).group_kind())
            .collect();
        kinds.extend(self.cache.managed_kinds(&options.selector).await);
        kinds.insert(GroupKind::new("", "Namespace"));
        self.cache.relist(&kinds).await?;

        let live = self
            .cache
            .managed_live_objects(&targets, &options.selector)
            .await;
        let plan = reconcile(&targets, live, namespace);

        let mut context = SyncContext::new(
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
            options.clone(),
            plan,
            Arc::clone(&self.active),
        );
        let span = info_span!("sync", sync_id = %context.id(), namespace = %namespace);
        info!(parent: &span, targets = targets.len(), "Starting sync");

        self.poll(&mut context, started, cancel).instrument(span).await
    }

    async fn poll(
        &self,
        context: &mut SyncContext,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let deadline = self.policy.max_wait.map(|wait| started + wait);
        let expired = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        loop {
            // Biased so a token cancelled between steps wins before any call
            let stepped = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = context.sync() => true,
            };
            if !stepped {
                info!("Sync cancelled");
                return Err(SyncError::Cancelled { last: context.state().clone() });
            }

            let state = context.state();
            if state.phase.completed() {
                metrics::observe_sync_duration(started.elapsed().as_secs_f64());
                return Ok(state.clone());
            }
            debug!(message = %state.message, "Sync still running");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Sync cancelled");
                    return Err(SyncError::Cancelled { last: context.state().clone() });
                }
                () = &mut expired => {
                    return Err(SyncError::Timeout {
                        waited: started.elapsed(),
                        last: context.state().clone(),
                    });
                }
                () = sleep(self.policy.next_delay()) => {}
            }
        }
    }
}
