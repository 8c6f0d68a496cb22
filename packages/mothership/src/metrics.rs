//! In-process server counters
//!
//! Cheap atomics bumped from the hub, router, and registries. Nothing is
//! exported over HTTP; a snapshot is logged when the server shuts down.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Sprite metrics
    pub sprites_spawned: AtomicU64,
    pub sprites_killed: AtomicU64,

    // Frame metrics
    /// Frames received from clients
    pub frames_received: AtomicU64,
    /// Frames queued for delivery to clients
    pub frames_sent: AtomicU64,
    /// Frames dropped because a client's queue was full
    pub frames_dropped: AtomicU64,

    // Error metrics
    pub protocol_errors: AtomicU64,
    pub adapter_errors: AtomicU64,

    /// Skills (re)loaded from disk
    pub skills_loaded: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Sprite tracking
    pub fn sprite_spawned(&self) {
        self.sprites_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sprite_killed(&self) {
        self.sprites_killed.fetch_add(1, Ordering::Relaxed);
    }

    // Frame tracking
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn adapter_error(&self) {
        self.adapter_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skills_loaded(&self, count: u64) {
        self.skills_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            sprites: SpriteMetrics {
                spawned: self.sprites_spawned.load(Ordering::Relaxed),
                killed: self.sprites_killed.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                received: self.frames_received.load(Ordering::Relaxed),
                sent: self.frames_sent.load(Ordering::Relaxed),
                dropped: self.frames_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                protocol: self.protocol_errors.load(Ordering::Relaxed),
                adapter: self.adapter_errors.load(Ordering::Relaxed),
            },
            skills_loaded: self.skills_loaded.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub sprites: SpriteMetrics,
    pub frames: FrameMetrics,
    pub errors: ErrorMetrics,
    pub skills_loaded: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteMetrics {
    pub spawned: u64,
    pub killed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub protocol: u64,
    pub adapter: u64,
}
