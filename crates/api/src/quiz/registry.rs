use crate::gateway::ChannelId;
use dashmap::DashSet;
use std::sync::Arc;

/// At most one running quiz per channel.
#[derive(Default)]
pub struct Registry(DashSet<ChannelId>);

impl Registry {
    /// Reserves the channel's slot. Returns `None` if a quiz already runs there.
    pub fn try_acquire(self: &Arc<Self>, channel: ChannelId) -> Option<Slot> {
        self.0.insert(channel).then(|| Slot { registry: Arc::clone(self), channel })
    }

    pub fn release(&self, channel: ChannelId) {
        self.0.remove(&channel);
    }

    pub fn is_busy(&self, channel: ChannelId) -> bool {
        self.0.contains(&channel)
    }

    pub fn active(&self) -> usize {
        self.0.len()
    }
}

/// A reserved channel. The slot is released when this is dropped.
pub struct Slot {
    registry: Arc<Registry>,
    channel: ChannelId,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.registry.release(self.channel);
    }
}
