//! Background Services Module
//!
//! Long-running pollers that feed the debounce gate and keep the status
//! board current, plus cache maintenance.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ GameStatusPoller │────▶│ DebounceGate │────▶│  EventSink  │
//! └──────────────────┘     └──────────────┘     └─────────────┘
//!         │                       ▲
//!         │   ┌────────────────┐  │
//!         │   │ EndpointPoller │──┘
//!         │   └────────────────┘
//!         ▼           │
//! ┌──────────────────────────────┐     ┌──────────────┐
//! │         StatusBoard          │     │ CacheJanitor │
//! └──────────────────────────────┘     └──────────────┘
//! ```
//!
//! # Services
//!
//! - **ServiceManager**: Coordinates lifecycle of all background services
//! - **GameStatusPoller**: Polls the status document, aggregate gate key
//! - **EndpointPoller**: Probes one endpoint, per-endpoint gate key
//! - **CacheJanitor**: Reclaims expired cache entries
//!
//! # Example
//!
//! ```rust,ignore
//! use hitmanstat::services::{ServiceManager, GameStatusPoller};
//!
//! let manager = ServiceManager::new();
//! manager.register(Arc::new(poller));
//! manager.start_all();
//!
//! // Graceful shutdown
//! manager.shutdown().await;
//! ```

pub mod board;
pub mod endpoint;
pub mod framework;
pub mod game_status;
pub mod janitor;

pub use board::{EndpointBoard, GameBoard, Outage, StatusBoard};
pub use endpoint::EndpointPoller;
pub use framework::{RestartPolicy, Service, ServiceError, ServiceManager, ServiceStatus};
pub use game_status::{GameStatusConfig, GameStatusPoller};
pub use janitor::CacheJanitor;
