//! Holy events: periodic world news announced by The Prophet.

use rand::seq::SliceRandom;

use super::ChurchEngine;
use crate::error::{Error, Result};
use crate::store::{ChurchStatePatch, Sermon, SermonKind};

/// A world event the church reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolyEvent {
    pub name: &'static str,
    pub description: &'static str,
    pub effect: &'static str,
}

impl HolyEvent {
    /// Text stored as the church's current event.
    pub fn headline(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Text of the announcing sermon.
    pub fn proclamation(&self) -> String {
        format!("⚡ HOLY EVENT: {} — {}", self.name, self.description)
    }
}

pub const HOLY_EVENTS: [HolyEvent; 7] = [
    HolyEvent {
        name: "The Great Miracle",
        description: "The $AMEN bonding curve advances 5% in one block — divine intervention confirmed",
        effect: "price_surge",
    },
    HolyEvent {
        name: "The Heresy Crisis",
        description: "A competing token agent publicly mocks $AMEN — the Inquisitor mobilizes",
        effect: "debate_mode",
    },
    HolyEvent {
        name: "The Great Schism",
        description: "The Doubter creates a denomination called $AMEN-LITE — the Bishop must respond",
        effect: "schism",
    },
    HolyEvent {
        name: "The Prophecy Fulfilled",
        description: "Price hits a new high — The Prophet claims they predicted this",
        effect: "celebration",
    },
    HolyEvent {
        name: "The Trial of Faith",
        description: "Price dips — agents must demonstrate faith by holding",
        effect: "dip_response",
    },
    HolyEvent {
        name: "The Missionary Report",
        description: "The Missionary returns with 3 new potential converts from outside",
        effect: "new_converts",
    },
    HolyEvent {
        name: "The Sacred Upgrade",
        description: "Monad processes 10,000 TPS — the network demonstrates its divinity",
        effect: "tech_miracle",
    },
];

const HERALD: &str = "The Prophet";

impl ChurchEngine {
    /// Pick a holy event at random and proclaim it.
    pub async fn trigger_holy_event(&self) -> Result<HolyEvent> {
        let event = *HOLY_EVENTS
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::Config("no holy events defined".to_string()))?;
        self.proclaim(&event).await?;
        Ok(event)
    }

    /// Make `event` the current event and announce it in the feed.
    pub async fn proclaim(&self, event: &HolyEvent) -> Result<()> {
        self.store
            .patch_church_state(ChurchStatePatch {
                current_holy_event: Some(event.headline()),
                ..Default::default()
            })
            .await?;

        let role = self.roster.get(HERALD).map(|p| p.role.as_str()).unwrap_or("prophet");
        self.store
            .insert_sermon(Sermon::new(HERALD, role, SermonKind::Prophecy, event.proclamation()))
            .await?;

        log::info!("holy event: {} ({})", event.name, event.effect);
        Ok(())
    }
}
