/// Lifecycle state of one controller connection.
///
/// Held behind a `std::sync::Mutex` by the device handle; every method here is
/// synchronous and cheap so the lock is never held across an await.
use tokio::sync::watch;
use uuid::Uuid;

use crate::protocol::framer::FrameWriter;
use crate::protocol::xml::{DeviceInfo, GUID_PLACEHOLDER};
use crate::services::heartbeat::Heartbeat;

#[derive(Default)]
pub struct Session {
    /// Blank until handshake phase 2 completes, then fixed for the connection.
    pub guid: String,
    pub live: bool,
    pub transport_version: u32,
    pub device_info: Option<DeviceInfo>,
    pub writer: Option<FrameWriter>,
    stop: Option<watch::Sender<bool>>,
    heartbeat: Option<Heartbeat>,
}

/// Everything that must be released when a connection goes away.
pub struct Teardown {
    pub writer: Option<FrameWriter>,
    pub heartbeat: Option<Heartbeat>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh transport. The session is live from here on, but has no
    /// GUID until [`Session::assign_guid`].
    pub fn attach(&mut self, writer: FrameWriter, stop: watch::Sender<bool>) {
        self.guid.clear();
        self.transport_version = 0;
        self.device_info = None;
        self.writer = Some(writer);
        self.stop = Some(stop);
        self.live = true;
    }

    /// Adopt the GUID from the SDK version reply, or generate one when the
    /// device returned nothing usable.
    pub fn assign_guid(&mut self, reply_guid: &str) -> &str {
        self.guid = if reply_guid.is_empty() || reply_guid == GUID_PLACEHOLDER {
            Uuid::new_v4().to_string()
        } else {
            reply_guid.to_string()
        };
        &self.guid
    }

    pub fn set_heartbeat(&mut self, heartbeat: Heartbeat) {
        self.heartbeat = Some(heartbeat);
    }

    /// Mark the connection dead and wake anything blocked on the stop signal.
    pub fn mark_dead(&mut self) {
        self.live = false;
        if let Some(stop) = &self.stop {
            stop.send_replace(true);
        }
    }

    /// Drop the transport. The caller finishes the async part of the teardown.
    pub fn detach(&mut self) -> Teardown {
        self.mark_dead();
        self.stop = None;
        self.guid.clear();
        Teardown {
            writer: self.writer.take(),
            heartbeat: self.heartbeat.take(),
        }
    }
}
