//! Application Startup
//!
//! Wires the coordination components together and runs the server. Every
//! component receives its collaborators explicitly; nothing is a module
//! global, so tests can stand up isolated instances.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::application::auth::{JwtVerifier, TokenVerifier};
use crate::application::presence::PresenceTracker;
use crate::application::registry::ConnectionRegistry;
use crate::application::services::calls::CallSignaling;
use crate::application::services::messaging::MessagingCoordinator;
use crate::application::services::notifications::NotificationFanout;
use crate::config::Settings;
use crate::domain::ConversationRepository;
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    PgCallRepository, PgConversationRepository, PgMessageRepository, PgNotificationRepository,
};
use crate::presentation::http::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<dyn TokenVerifier>,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub messaging: Arc<MessagingCoordinator>,
    pub notifications: Arc<NotificationFanout>,
    pub calls: Arc<CallSignaling>,
    pub conversations: Arc<dyn ConversationRepository>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        let conversations: Arc<dyn ConversationRepository> =
            Arc::new(PgConversationRepository::new(db.clone()));
        let messages = Arc::new(PgMessageRepository::new(db.clone()));
        let notifications_repo = Arc::new(PgNotificationRepository::new(db.clone()));
        let calls_repo = Arc::new(PgCallRepository::new(db.clone()));

        let registry = Arc::new(ConnectionRegistry::new());
        let presence = Arc::new(PresenceTracker::new(registry.clone()));
        let notifications = Arc::new(NotificationFanout::new(
            notifications_repo,
            registry.clone(),
        ));
        let messaging = Arc::new(MessagingCoordinator::new(
            conversations.clone(),
            messages,
            notifications.clone(),
            registry.clone(),
            settings.messaging.clone(),
        ));
        let calls = Arc::new(CallSignaling::new(
            calls_repo,
            registry.clone(),
            Duration::from_secs(settings.call.ring_timeout_secs),
        ));
        let auth: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(&settings.jwt.secret));

        let state = AppState {
            settings: Arc::new(settings.clone()),
            auth,
            registry,
            presence,
            messaging,
            notifications,
            calls,
            conversations,
        };

        let router = routes::create_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
