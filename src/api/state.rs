use std::sync::Arc;

use derive_new::new;

use crate::config::Config;
use crate::service::access::AccessGate;
use crate::service::api::ApiClient;
use crate::service::progress::ProgressSessions;
use crate::service::replicator::Replicator;

#[derive(Debug, Clone, new)]
pub struct App {
    pub client: ApiClient,
    pub progress: ProgressSessions,
    pub access: AccessGate,
    pub secure_cookies: bool,
}

impl App {
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

pub fn create_app(config: &Config, client: ApiClient, replicator: Replicator) -> App {
    let progress = ProgressSessions::new(replicator, &config.progress);
    let access = AccessGate::new(Arc::new(client.clone()), &config.access);

    App::new(client, progress, access, config.secure_cookies)
}
