//! Event topics and the events published under them
//!
//! Producers (system, storage, docker and VM monitors) publish [`Event`]s on
//! the [`EventBus`] under one of the [`EventType`] topics. The socket server
//! forwards them to clients that subscribed to the topic.
//!
//! # Topic Catalog
//!
//! | Domain         | Topics                                                              |
//! |----------------|---------------------------------------------------------------------|
//! | system         | `system.stats`, `system.health`, `system.load`, `cpu.stats`, `memory.stats`, `network.stats` |
//! | storage        | `storage.status`, `disk.stats`, `array.status`, `parity.status`, `disk.smart.warning`, `cache.status` |
//! | container      | `docker.events`, `container.stats`, `container.health`, `image.events` |
//! | vm             | `vm.events`, `vm.stats`, `vm.health`                                |
//! | alerts         | `temperature.alert`, `resource.alert`, `security.alert`, `system.alert` |
//! | infrastructure | `ups.status`, `fan.status`, `power.status`                          |
//! | operational    | `task.progress`, `backup.status`, `update.status`                   |

pub mod bus;

pub use bus::{EventBus, Subscription};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::StormonError;

/// Closed catalog of topics events are published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    // System
    SystemStats,
    SystemHealth,
    SystemLoad,
    CpuStats,
    MemoryStats,
    NetworkStats,

    // Storage
    StorageStatus,
    DiskStats,
    ArrayStatus,
    ParityStatus,
    DiskSmartWarning,
    CacheStatus,

    // Container
    DockerEvents,
    ContainerStats,
    ContainerHealth,
    ImageEvents,

    // VM
    VmEvents,
    VmStats,
    VmHealth,

    // Alerts
    TemperatureAlert,
    ResourceAlert,
    SecurityAlert,
    SystemAlert,

    // Infrastructure
    UpsStatus,
    FanStatus,
    PowerStatus,

    // Operational
    TaskProgress,
    BackupStatus,
    UpdateStatus,
}

impl EventType {
    /// Every topic in the catalog, grouped by domain
    pub const ALL: [EventType; 29] = [
        EventType::SystemStats,
        EventType::SystemHealth,
        EventType::SystemLoad,
        EventType::CpuStats,
        EventType::MemoryStats,
        EventType::NetworkStats,
        EventType::StorageStatus,
        EventType::DiskStats,
        EventType::ArrayStatus,
        EventType::ParityStatus,
        EventType::DiskSmartWarning,
        EventType::CacheStatus,
        EventType::DockerEvents,
        EventType::ContainerStats,
        EventType::ContainerHealth,
        EventType::ImageEvents,
        EventType::VmEvents,
        EventType::VmStats,
        EventType::VmHealth,
        EventType::TemperatureAlert,
        EventType::ResourceAlert,
        EventType::SecurityAlert,
        EventType::SystemAlert,
        EventType::UpsStatus,
        EventType::FanStatus,
        EventType::PowerStatus,
        EventType::TaskProgress,
        EventType::BackupStatus,
        EventType::UpdateStatus,
    ];

    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemStats => "system.stats",
            Self::SystemHealth => "system.health",
            Self::SystemLoad => "system.load",
            Self::CpuStats => "cpu.stats",
            Self::MemoryStats => "memory.stats",
            Self::NetworkStats => "network.stats",
            Self::StorageStatus => "storage.status",
            Self::DiskStats => "disk.stats",
            Self::ArrayStatus => "array.status",
            Self::ParityStatus => "parity.status",
            Self::DiskSmartWarning => "disk.smart.warning",
            Self::CacheStatus => "cache.status",
            Self::DockerEvents => "docker.events",
            Self::ContainerStats => "container.stats",
            Self::ContainerHealth => "container.health",
            Self::ImageEvents => "image.events",
            Self::VmEvents => "vm.events",
            Self::VmStats => "vm.stats",
            Self::VmHealth => "vm.health",
            Self::TemperatureAlert => "temperature.alert",
            Self::ResourceAlert => "resource.alert",
            Self::SecurityAlert => "security.alert",
            Self::SystemAlert => "system.alert",
            Self::UpsStatus => "ups.status",
            Self::FanStatus => "fan.status",
            Self::PowerStatus => "power.status",
            Self::TaskProgress => "task.progress",
            Self::BackupStatus => "backup.status",
            Self::UpdateStatus => "update.status",
        }
    }

    /// Parse a wire name; `None` for names outside the catalog
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = StormonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| StormonError::UnknownEventType {
            topic: s.to_string(),
        })
    }
}

/// A published event. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}
