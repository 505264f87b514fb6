//! Commerce transaction core
//!
//! Shopping carts, wish lists, checkout, default payment method and address
//! selection, the post-purchase review gate and the order lifecycle, on top of
//! a sea-orm backed store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DbErr};
use tokio::sync::mpsc;

pub use errors::{CapacityKind, ServiceError};
pub use services::CommerceServices;

/// Shared application state: the pool, the loaded configuration and the services.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: CommerceServices,
}

impl AppState {
    /// Wires services over an existing pool. Returns the receiving end of the
    /// event channel, to be handed to [`events::process_events`] or a test.
    pub fn new(
        db: DatabaseConnection,
        config: config::AppConfig,
    ) -> (Self, mpsc::Receiver<events::Event>) {
        let (sender, rx) = events::EventSender::channel(config.event_channel_capacity);
        let db = Arc::new(db);
        let config = Arc::new(config);
        let event_sender = Arc::new(sender);
        let services = CommerceServices::new(db.clone(), event_sender.clone(), config.clone());
        (
            Self {
                db,
                config,
                event_sender,
                services,
            },
            rx,
        )
    }

    /// Connects using `config` (running migrations when `auto_migrate` is set)
    /// and wires the services.
    pub async fn connect(
        config: config::AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::Event>), DbErr> {
        let db = db::establish_connection_from_app_config(&config).await?;
        Ok(Self::new(db, config))
    }
}
