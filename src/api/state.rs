use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::links::IdentityLinkStore;
use crate::stats::StatsAggregator;

#[derive(Clone)]
pub struct AppState {
    pub links: Arc<IdentityLinkStore>,
    pub stats: Arc<StatsAggregator>,
    pub dispatcher: Arc<Dispatcher>,
}
