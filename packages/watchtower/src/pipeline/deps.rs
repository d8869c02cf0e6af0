use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::config::WatchConfig;
use crate::notify::Notifier;
use crate::security::UrlValidator;
use crate::traits::fetcher::PageFetcher;
use crate::traits::queue::JobQueue;
use crate::traits::store::MonitorStore;

/// Service context handed to every pipeline entry point.
///
/// Built once at startup; there are no global store or queue handles.
#[derive(Clone, TypedBuilder)]
pub struct WatchDeps {
    pub store: Arc<dyn MonitorStore>,
    pub queue: Arc<dyn JobQueue>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub notifier: Arc<Notifier>,
    #[builder(default)]
    pub validator: UrlValidator,
    #[builder(default)]
    pub config: WatchConfig,
}
