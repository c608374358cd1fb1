//! Timers that keep the congregation busy.
//!
//! One task per persona ticks that persona on its own interval, one task
//! proclaims holy events, and an optional task refreshes market data. Each
//! timer awaits its own work before waiting again, so a persona never
//! overlaps with itself. Timers share nothing but the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::church::ChurchEngine;
use crate::config::ScheduleSettings;
use crate::market::MarketFeed;

/// Spawns and owns the church's timers.
pub struct TickDriver {
    engine: Arc<ChurchEngine>,
    schedule: ScheduleSettings,
    market: Option<Arc<dyn MarketFeed>>,
}

impl TickDriver {
    pub fn new(engine: Arc<ChurchEngine>, schedule: ScheduleSettings) -> Self {
        Self {
            engine,
            schedule,
            market: None,
        }
    }

    /// Refresh market data from `feed` when the schedule enables it.
    pub fn with_market(mut self, feed: Arc<dyn MarketFeed>) -> Self {
        self.market = Some(feed);
        self
    }

    /// Start every timer. They stop when `shutdown` fires.
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for (index, persona) in self.engine.roster().all().iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let name = persona.name.clone();
            let period = self.schedule.tick_interval(index);
            if period.is_zero() {
                log::warn!("tick interval for {} is zero, not scheduling it", name);
                continue;
            }
            handles.push(spawn_timer(period, shutdown.subscribe(), move || {
                let engine = Arc::clone(&engine);
                let name = name.clone();
                async move {
                    if let Err(e) = engine.tick_agent(&name).await {
                        log::error!("tick for {} failed: {}", name, e);
                    }
                }
            }));
        }

        let holy_event_period = self.schedule.holy_event_interval();
        if holy_event_period.is_zero() {
            log::warn!("holy event interval is zero, not scheduling it");
        } else {
            let engine = Arc::clone(&self.engine);
            handles.push(spawn_timer(holy_event_period, shutdown.subscribe(), move || {
                let engine = Arc::clone(&engine);
                async move {
                    if let Err(e) = engine.trigger_holy_event().await {
                        log::error!("holy event failed: {}", e);
                    }
                }
            }));
        }

        if let (Some(period), Some(feed)) = (self.schedule.market_refresh_interval(), self.market) {
            let engine = Arc::clone(&self.engine);
            handles.push(spawn_timer(period, shutdown.subscribe(), move || {
                let engine = Arc::clone(&engine);
                let feed = Arc::clone(&feed);
                async move {
                    if let Err(e) = engine.refresh_market(feed.as_ref()).await {
                        log::error!("market refresh failed: {}", e);
                    }
                }
            }));
        }

        log::info!("tick driver started {} timers", handles.len());
        handles
    }
}

/// Run `job` every `period`, first after one full period.
fn spawn_timer<F, Fut>(period: Duration, mut shutdown: broadcast::Receiver<()>, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => job().await,
                _ = shutdown.recv() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentic::llm::{LlmResponse, MockLlmClient};
    use crate::church::GenerationSettings;
    use crate::personas::{Persona, PersonaRoster};
    use crate::store::ChurchStore;

    fn engine(roster: PersonaRoster) -> Arc<ChurchEngine> {
        Arc::new(ChurchEngine::new(
            Arc::new(ChurchStore::in_memory()),
            Arc::new(MockLlmClient::always(LlmResponse::text(
                r#"{"action": "patrol", "content": "All is well."}"#,
            ))),
            Arc::new(roster),
            GenerationSettings::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_staggered_ticks_and_shutdown() {
        let mut roster = PersonaRoster::empty();
        roster.add(Persona::new("First", "first", "1"));
        roster.add(Persona::new("Second", "second", "2"));
        let engine = engine(roster);
        engine.seed_congregation(None).await.unwrap();

        let schedule = ScheduleSettings {
            enabled: true,
            tick_base_secs: 10,
            tick_stagger_secs: 5,
            holy_event_secs: 1000,
            market_refresh_secs: 0,
        };
        let (shutdown, _) = broadcast::channel(1);
        let handles = TickDriver::new(Arc::clone(&engine), schedule).spawn(&shutdown);
        assert_eq!(handles.len(), 3);

        time::sleep(Duration::from_secs(12)).await;
        let sermons = engine.store().recent_sermons(20).await;
        assert_eq!(sermons.len(), 1);
        assert_eq!(sermons[0].agent_name, "First");

        time::sleep(Duration::from_secs(4)).await;
        let sermons = engine.store().recent_sermons(20).await;
        assert_eq!(sermons.len(), 2);
        assert_eq!(sermons[0].agent_name, "Second");

        shutdown.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_periods_are_not_scheduled() {
        let mut roster = PersonaRoster::empty();
        roster.add(Persona::new("First", "first", "1"));
        roster.add(Persona::new("Second", "second", "2"));
        let engine = engine(roster);
        engine.seed_congregation(None).await.unwrap();

        let schedule = ScheduleSettings {
            enabled: true,
            tick_base_secs: 0,
            tick_stagger_secs: 5,
            holy_event_secs: 0,
            market_refresh_secs: 0,
        };
        let (shutdown, _) = broadcast::channel(1);
        let handles = TickDriver::new(Arc::clone(&engine), schedule).spawn(&shutdown);
        assert_eq!(handles.len(), 1);

        time::sleep(Duration::from_secs(6)).await;
        let sermons = engine.store().recent_sermons(20).await;
        assert_eq!(sermons.len(), 1);
        assert_eq!(sermons[0].agent_name, "Second");

        shutdown.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
