// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup: build every subsystem from the configuration, wire the
//! subscriptions, recover persisted state, and serve the Web UI.
//!
//! Shutdown order is the reverse of the data flow: producers stop first
//! (detector, recorder, broadcaster), then the managers, then the
//! northbound binding, and finally connectors and the HTTP listener.

use super::GatewayError;
use crate::alarm_detector::AlarmDetector;
use crate::auth::AuthState;
use crate::broadcast::Broadcaster;
use crate::history_recorder::HistoryRecorder;
use crate::webui::{self, AppState};
use crate::ws::WsManager;
use mtpgw_adapters::Connector;
use mtpgw_config::GatewayConfig;
use mtpgw_engine::{Safety, ServiceManager, ServiceManagerConfig, TagManager};
use mtpgw_northbound::{build_address_space, NorthboundBinding};
use mtpgw_storage::{
    AlarmRepository, AuditLog, HistoryStore, JsonlAlarmRepository, SnapshotStore,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running gateway instance.
pub struct Gateway {
    pub config: GatewayConfig,
    pub tag_manager: TagManager,
    pub service_manager: ServiceManager,
    pub binding: NorthboundBinding,
    pub broadcaster: Broadcaster,
    pub detector: AlarmDetector,
    pub recorder: HistoryRecorder,
    pub ws: Arc<WsManager>,
    pub alarms: Arc<dyn AlarmRepository>,
    pub history: Arc<HistoryStore>,
    pub audit: Arc<AuditLog>,
    connectors: HashMap<String, Arc<dyn Connector>>,
    server_task: Option<JoinHandle<()>>,
    server_cancel: CancellationToken,
    /// Actual bound address (useful when port 0 was configured).
    pub local_addr: Option<std::net::SocketAddr>,
}

impl Gateway {
    /// Build, wire, recover, and start everything.
    pub async fn start(config: GatewayConfig) -> Result<Gateway, GatewayError> {
        let data_dir = PathBuf::from(&config.storage.data_dir);
        std::fs::create_dir_all(&data_dir)?;

        // Persistence
        let snapshots = Arc::new(SnapshotStore::open(data_dir.join("service_state.json"))?);
        let history = Arc::new(HistoryStore::open(data_dir.join("history.jsonl"))?);
        let audit = Arc::new(AuditLog::open(data_dir.join("audit.jsonl"))?);
        let alarms: Arc<dyn AlarmRepository> =
            Arc::new(JsonlAlarmRepository::open(data_dir.join("alarms.jsonl"))?);

        // Safety & interlocks
        let safety = Arc::new(Safety::new(config.safety.to_safety_config()));
        let interlocks = config.interlock_evaluator();

        // Southbound connectors; connection failures are retried by the
        // tag manager's reconnect path, never fatal here
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        let mut poll_intervals = HashMap::new();
        for connector_config in &config.connectors {
            let connector = mtpgw_adapters::create_connector(connector_config);
            if let Err(e) = connector.connect().await {
                tracing::warn!(
                    connector = %connector_config.name,
                    error = %e,
                    "initial connect failed; will retry in background"
                );
            }
            poll_intervals.insert(
                connector_config.name.clone(),
                Duration::from_millis(connector_config.poll_interval_ms),
            );
            connectors.insert(connector_config.name.clone(), connector);
        }

        // Application core
        let tag_manager = TagManager::new(
            connectors.clone(),
            config.tag_definitions(),
            poll_intervals,
            Some(Arc::clone(&safety)),
            Some(Arc::clone(&audit)),
        );
        let service_manager = ServiceManager::new(
            tag_manager.clone(),
            config.service_definitions(),
            ServiceManagerConfig {
                snapshots: Some(Arc::clone(&snapshots)),
                audit: Some(Arc::clone(&audit)),
                safety: Some(Arc::clone(&safety)),
                interlocks: Some(interlocks),
            },
        );
        service_manager.recover().await;

        // Northbound address space + runtime wiring
        let space = Arc::new(build_address_space(&config));
        let binding =
            NorthboundBinding::wire(space, tag_manager.clone(), service_manager.clone());

        // Web UI fan-out
        let ws = Arc::new(WsManager::new());
        let broadcaster = Broadcaster::new(
            Arc::clone(&ws),
            Duration::from_millis(config.webui.min_update_interval_ms),
        );
        {
            let b = broadcaster.clone();
            tag_manager.subscribe(Arc::new(move |tag_name, value| {
                b.on_tag_change(tag_name, value);
            }));
            let b = broadcaster.clone();
            service_manager.subscribe(Arc::new(move |service, from, to| {
                b.on_state_change(service, &from.to_string(), &to.to_string());
            }));
        }

        let detector =
            AlarmDetector::from_config(&config, Arc::clone(&alarms), Some(broadcaster.clone()));
        let recorder = HistoryRecorder::new(
            Arc::clone(&history),
            Duration::from_millis(config.webui.history.flush_interval_ms),
            config.webui.history.max_buffer_size,
            config.webui.history.include_tags.clone(),
            config.webui.history.exclude_tags.clone(),
        );

        // Start the loops
        tag_manager.start();
        service_manager.start();
        broadcaster.start();
        detector.start(&tag_manager);
        recorder.start(&tag_manager);

        // Web server
        let server_cancel = CancellationToken::new();
        let mut server_task = None;
        let mut local_addr = None;
        if config.webui.enabled {
            let state = AppState {
                tag_manager: tag_manager.clone(),
                service_manager: service_manager.clone(),
                alarms: Arc::clone(&alarms),
                history: Arc::clone(&history),
                ws: Arc::clone(&ws),
                auth: Arc::new(AuthState::new(config.webui.auth.clone())),
                started_at: Instant::now(),
            };
            let router = webui::router(state);
            let addr = format!("{}:{}", config.webui.bind, config.webui.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|source| GatewayError::Bind { addr: addr.clone(), source })?;
            local_addr = listener.local_addr().ok();
            tracing::info!(addr = %addr, "web ui listening");

            let cancel = server_cancel.clone();
            server_task = Some(tokio::spawn(async move {
                let shutdown = async move { cancel.cancelled().await };
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    tracing::error!(error = %e, "web server exited with error");
                }
            }));
        }

        tracing::info!(gateway = %config.gateway.name, "gateway started");
        Ok(Gateway {
            config,
            tag_manager,
            service_manager,
            binding,
            broadcaster,
            detector,
            recorder,
            ws,
            alarms,
            history,
            audit,
            connectors,
            server_task,
            server_cancel,
            local_addr,
        })
    }

    /// Ordered cooperative shutdown.
    pub async fn shutdown(mut self) {
        tracing::info!("shutting down gateway");

        self.detector.stop(&self.tag_manager).await;
        self.recorder.stop(&self.tag_manager).await;
        self.broadcaster.stop().await;

        self.service_manager.stop().await;
        self.tag_manager.stop().await;

        self.binding.unwire();

        for (name, connector) in &self.connectors {
            tracing::debug!(connector = %name, "disconnecting");
            connector.disconnect().await;
        }

        self.server_cancel.cancel();
        if let Some(task) = self.server_task.take() {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("web server did not stop in time");
            }
        }
        tracing::info!("gateway shutdown complete");
    }
}
