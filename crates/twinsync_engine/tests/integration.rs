//! Integration tests for links running against an in-memory platform.
//!
//! Every test runs on a paused tokio clock, so the settle delay, cooldown
//! and health interval elapse instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;
use twinsync_engine::{
    ActionPhase, Direction, EngineConfig, HealthStatus, LinkConfig, LinkError, LinkId,
    LinkManager, ProgressiveMode, RetryConfig, SkipReason, SyncOutcome,
};
use proptest::prelude::*;
use twinsync_model::{attrs, services, EntityState, Value};
use twinsync_testkit::generators::{cover_burst_strategy, light_strategy};
use twinsync_testkit::{
    cover, fast_engine, light_hs, light_off, light_on, link, unavailable, wait, wait_ms,
    MemoryPlatform,
};

async fn start(
    states: Vec<EntityState>,
    engine: EngineConfig,
    config: LinkConfig,
) -> (Arc<MemoryPlatform>, LinkManager, LinkId) {
    let platform = Arc::new(MemoryPlatform::with_states(states));
    let manager = LinkManager::new(platform.clone(), engine);
    let id = manager.add_link(config).await.unwrap();
    (platform, manager, id)
}

async fn lights(a: EntityState, b: EntityState) -> (Arc<MemoryPlatform>, LinkManager, LinkId) {
    start(vec![a, b], fast_engine(), link("light.a", "light.b")).await
}

async fn covers(
    engine: EngineConfig,
    config: LinkConfig,
) -> (Arc<MemoryPlatform>, LinkManager, LinkId) {
    start(
        vec![cover("cover.a", 40.0), cover("cover.b", 40.0)],
        engine,
        config,
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn light_turned_on_is_mirrored_once() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    assert_eq!(platform.subscription_count(), 2);

    platform.set_state(light_hs("light.a", 180.0, 30.0, 80.0));
    wait_ms(50).await;

    let calls = platform.invocations_for("light.b");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, services::TURN_ON);
    assert_eq!(calls[0].param(attrs::BRIGHTNESS), Some(&Value::Number(180.0)));
    assert_eq!(
        calls[0].param(attrs::HS_COLOR),
        Some(&Value::numbers(&[30.0, 80.0]))
    );

    // The confirmation from light.b is an echo, not a new change
    assert!(platform.invocations_for("light.a").is_empty());

    let status = manager.get_sync_status(id).unwrap();
    assert_eq!(status.stats.succeeded, 1);
    assert_eq!(status.stats.failed, 0);
    assert!(status.stats.last_sync_time.is_some());
}

#[tokio::test(start_paused = true)]
async fn matching_target_is_not_actuated() {
    let (platform, manager, id) = lights(light_off("light.a"), light_on("light.b", 180.0)).await;

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(50).await;
    assert!(platform.invocations().is_empty());

    let outcome = manager.manual_sync(id, Direction::BToA).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::AlreadyInSync));
    assert!(platform.invocations().is_empty());
    assert_eq!(manager.get_sync_status(id).unwrap().stats.skipped, 2);
}

#[tokio::test(start_paused = true)]
async fn late_confirmation_is_not_echoed_back() {
    let (platform, _manager, _id) = lights(light_off("light.a"), light_off("light.b")).await;
    platform.set_auto_apply(false);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(700).await;
    assert_eq!(platform.invocations_for("light.b").len(), 1);

    // The device confirms well after the direction lock has passed
    platform.set_state(light_on("light.b", 180.0));
    wait_ms(500).await;
    assert!(platform.invocations_for("light.a").is_empty());

    // A genuine change on light.b after the cooldown still travels back
    platform.insert(light_on("light.a", 180.0));
    wait(Duration::from_secs(2)).await;
    platform.set_state(light_on("light.b", 60.0));
    wait_ms(500).await;

    let back = platform.invocations_for("light.a");
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].param(attrs::BRIGHTNESS), Some(&Value::Number(60.0)));
}

#[tokio::test(start_paused = true)]
async fn reverse_change_inside_direction_lock_is_dropped() {
    let (platform, _manager, _id) = lights(light_off("light.a"), light_off("light.b")).await;

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(100).await;
    assert_eq!(platform.state("light.b").unwrap().state, "on");

    platform.set_state(light_on("light.b", 50.0));
    wait_ms(1000).await;

    assert!(platform.invocations_for("light.a").is_empty());
    assert_eq!(platform.state("light.a").unwrap().number(attrs::BRIGHTNESS), Some(180.0));
}

#[tokio::test(start_paused = true)]
async fn cover_burst_sends_only_the_final_position() {
    let (platform, manager, id) =
        covers(EngineConfig::default(), link("cover.a", "cover.b")).await;

    // 40 -> 42 is within tolerance, the rest is one burst
    for position in [42.0, 45.0, 50.0] {
        platform.set_state(cover("cover.a", position));
        wait_ms(50).await;
    }
    wait(Duration::from_secs(1)).await;

    let calls = platform.invocations_for("cover.b");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, services::SET_COVER_POSITION);
    assert_eq!(calls[0].param(attrs::POSITION), Some(&Value::Number(50.0)));
    assert!(platform.invocations_for("cover.a").is_empty());

    let status = manager.get_sync_status(id).unwrap();
    assert_eq!(status.a_to_b, ActionPhase::Idle);
    assert_eq!(status.b_to_a, ActionPhase::Idle);
}

fn positions(platform: &MemoryPlatform, entity: &str) -> Vec<f64> {
    platform
        .invocations_for(entity)
        .iter()
        .filter_map(|call| call.param(attrs::POSITION).and_then(Value::as_f64))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn cover_opening_from_closed_sends_only_the_final_position() {
    let (platform, manager, id) = start(
        vec![cover("cover.a", 0.0), cover("cover.b", 0.0)],
        EngineConfig::default(),
        link("cover.a", "cover.b"),
    )
    .await;

    // The state token changes at both ends of the motion
    for (state, position) in [("opening", 10.0), ("opening", 30.0), ("opening", 60.0), ("open", 100.0)] {
        platform.set_state(
            EntityState::new("cover.a", state).with_attribute(attrs::CURRENT_POSITION, position),
        );
        wait_ms(50).await;
    }
    wait(Duration::from_secs(1)).await;

    let calls = platform.invocations_for("cover.b");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, services::SET_COVER_POSITION);
    assert_eq!(positions(&platform, "cover.b"), vec![100.0]);
    assert!(platform.invocations_for("cover.a").is_empty());
    assert_eq!(manager.get_sync_status(id).unwrap().stats.succeeded, 1);
}

async fn brightness_burst(steps: usize) -> Vec<f64> {
    let (platform, _manager, _id) =
        lights(light_on("light.a", 100.0), light_on("light.b", 100.0)).await;

    for step in 1..=steps {
        platform.set_state(light_on("light.a", 100.0 + 10.0 * step as f64));
        wait_ms(20).await;
    }
    wait(Duration::from_secs(1)).await;

    platform
        .invocations_for("light.b")
        .iter()
        .filter_map(|call| call.param(attrs::BRIGHTNESS).and_then(Value::as_f64))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn progressive_burst_supersedes_earlier_steps() {
    for steps in [1, 2, 5, 10] {
        let sent = brightness_burst(steps).await;
        assert_eq!(sent, vec![100.0 + 10.0 * steps as f64], "burst of {steps}");
    }
}

#[tokio::test(start_paused = true)]
async fn realtime_mode_sends_every_step() {
    let (platform, _manager, _id) = covers(
        EngineConfig::default(),
        link("cover.a", "cover.b").with_progressive_mode(ProgressiveMode::Realtime),
    )
    .await;

    platform.set_state(cover("cover.a", 45.0));
    wait_ms(50).await;
    platform.set_state(cover("cover.a", 50.0));
    wait_ms(50).await;

    assert_eq!(positions(&platform, "cover.b"), vec![45.0, 50.0]);
}

#[tokio::test(start_paused = true)]
async fn instant_change_cancels_pending_ramp() {
    let (platform, _manager, _id) =
        lights(light_on("light.a", 100.0), light_on("light.b", 100.0)).await;

    platform.set_state(light_on("light.a", 150.0));
    wait_ms(100).await;
    platform.set_state(light_off("light.a"));
    wait(Duration::from_secs(1)).await;

    let calls = platform.invocations_for("light.b");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, services::TURN_OFF);
    assert_eq!(platform.state("light.b").unwrap().state, "off");
}

#[tokio::test(start_paused = true)]
async fn slave_progress_is_absorbed_until_timeout() {
    let (platform, manager, id) =
        covers(EngineConfig::default(), link("cover.a", "cover.b")).await;
    platform.set_auto_apply(false);

    platform.set_state(cover("cover.a", 50.0));
    wait_ms(400).await;
    assert_eq!(platform.invocations_for("cover.b").len(), 1);
    assert_eq!(
        manager.get_sync_status(id).unwrap().a_to_b,
        ActionPhase::InProgress
    );

    // cover.b reports travel towards 50 without arriving
    wait_ms(1100).await;
    platform.set_state(cover("cover.b", 45.0));
    wait_ms(100).await;
    assert!(platform.invocations_for("cover.a").is_empty());

    wait(Duration::from_secs(2)).await;
    assert_eq!(manager.get_sync_status(id).unwrap().a_to_b, ActionPhase::Idle);
    assert!(platform.invocations_for("cover.a").is_empty());
}

#[tokio::test(start_paused = true)]
async fn master_slave_locks_the_slave_while_starting() {
    let engine = EngineConfig::default().with_direction_lock(Duration::ZERO);
    let config = link("cover.a", "cover.b")
        .with_progressive_mode(ProgressiveMode::MasterSlave)
        .with_cooldown(Duration::from_millis(50));
    let (platform, _manager, _id) = covers(engine, config).await;

    platform.set_state(cover("cover.a", 50.0));
    wait_ms(100).await;
    platform.set_state(cover("cover.b", 20.0));
    wait(Duration::from_secs(1)).await;

    assert!(platform.invocations_for("cover.a").is_empty());
    let calls = platform.invocations_for("cover.b");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].param(attrs::POSITION), Some(&Value::Number(50.0)));
}

#[tokio::test(start_paused = true)]
async fn unavailable_entity_keeps_subscriptions() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;

    platform.set_state(unavailable("light.b"));
    wait_ms(100).await;
    platform.set_state(light_on("light.a", 180.0));
    wait_ms(100).await;
    assert!(platform.invocations().is_empty());

    let report = manager.health_check(id).await.unwrap();
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(report.subscribed);

    // Recovery itself is not mirrored
    platform.set_state(light_off("light.b"));
    wait(Duration::from_secs(61)).await;
    assert!(platform.invocations().is_empty());

    let report = manager.health_check(id).await.unwrap();
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(platform.subscribe_calls(), 2);
    assert_eq!(platform.unsubscribe_calls(), 0);
    assert_eq!(platform.subscription_count(), 2);

    let outcome = manager.manual_sync(id, Direction::AToB).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(platform.state("light.b").unwrap().state, "on");
}

#[tokio::test(start_paused = true)]
async fn missing_entity_is_reacquired_by_the_monitor() {
    let engine = fast_engine()
        .with_health_check_interval(Duration::from_secs(10))
        .with_reacquire(RetryConfig::new(3).with_initial_delay(Duration::from_secs(1)));
    let (platform, manager, id) = start(
        vec![light_off("light.a"), light_off("light.b")],
        engine,
        link("light.a", "light.b"),
    )
    .await;

    platform.remove(&"light.b".into());
    wait_ms(10_500).await;
    assert_eq!(platform.subscription_count(), 0);
    assert!(!manager.get_sync_status(id).unwrap().subscribed);

    platform.insert(light_off("light.b"));
    wait(Duration::from_secs(2)).await;
    assert_eq!(platform.subscription_count(), 2);
    assert_eq!(platform.subscribe_calls(), 4);
    assert!(manager.get_sync_status(id).unwrap().subscribed);

    platform.set_state(light_on("light.a", 120.0));
    wait_ms(50).await;
    assert_eq!(platform.invocations_for("light.b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn health_check_reports_missing_then_recovered() {
    let engine = fast_engine()
        .with_health_check_interval(Duration::from_secs(3600))
        .with_reacquire(RetryConfig::fixed(2, Duration::from_secs(1)));
    let (platform, manager, id) = start(
        vec![light_off("light.a"), light_off("light.b")],
        engine,
        link("light.a", "light.b"),
    )
    .await;

    platform.remove(&"light.a".into());
    let report = manager.health_check(id).await.unwrap();
    assert_eq!(report.status, HealthStatus::Missing);
    assert!(!report.subscribed);
    assert_eq!(platform.unsubscribe_calls(), 2);

    platform.insert(light_off("light.a"));
    let report = manager.health_check(id).await.unwrap();
    assert_eq!(report.status, HealthStatus::Recovered);
    assert!(report.subscribed);
    assert_eq!(platform.subscription_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_invocation_is_retried_and_recorded() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    platform.fail_next("light.b", 5);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(200).await;

    assert_eq!(platform.invocations_for("light.b").len(), 3);
    let stats = manager.get_sync_status(id).unwrap().stats;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 0);
    assert!(stats.last_error.as_ref().unwrap().contains("injected failure"));
    assert_eq!(stats.success_rate(), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_within_retries() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    platform.fail_next("light.b", 2);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(200).await;

    assert_eq!(platform.invocations_for("light.b").len(), 3);
    assert_eq!(platform.state("light.b").unwrap().state, "on");
    let stats = manager.get_sync_status(id).unwrap().stats;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn busy_critical_section_times_out() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    platform.set_latency(Duration::from_secs(10));
    platform.set_auto_apply(false);

    platform.set_state(light_on("light.a", 180.0));
    wait(Duration::from_secs(2)).await;
    platform.set_state(light_off("light.a"));
    wait(Duration::from_secs(10)).await;

    let stats = manager.get_sync_status(id).unwrap().stats;
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        stats.last_error.as_deref(),
        Some(LinkError::LockAcquisitionTimeout.to_string().as_str())
    );
    assert_eq!(platform.invocations_for("light.b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsupported_domain_is_skipped() {
    let (platform, manager, id) = start(
        vec![
            EntityState::new("sensor.a", "21.5"),
            EntityState::new("sensor.b", "19.0"),
        ],
        fast_engine(),
        link("sensor.a", "sensor.b"),
    )
    .await;

    platform.set_state(EntityState::new("sensor.a", "22.0"));
    wait_ms(50).await;

    assert!(platform.invocations().is_empty());
    let stats = manager.get_sync_status(id).unwrap().stats;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn disabled_link_drops_subscriptions() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;

    manager.set_enabled(id, false).unwrap();
    assert_eq!(platform.subscription_count(), 0);
    assert!(!manager.get_sync_status(id).unwrap().enabled);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(50).await;
    assert!(platform.invocations().is_empty());

    let report = manager.health_check(id).await.unwrap();
    assert_eq!(report.status, HealthStatus::Disabled);

    manager.set_enabled(id, true).unwrap();
    assert_eq!(platform.subscription_count(), 2);
    platform.set_state(light_on("light.a", 90.0));
    wait_ms(500).await;
    assert_eq!(platform.invocations_for("light.b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reload_resubscribes() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;

    manager.reload(id).unwrap();
    assert_eq!(platform.subscribe_calls(), 4);
    assert_eq!(platform.unsubscribe_calls(), 2);
    assert_eq!(platform.subscription_count(), 2);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(50).await;
    assert_eq!(platform.invocations_for("light.b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_sync_bypasses_cooldown() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    platform.set_auto_apply(false);

    platform.set_state(light_on("light.a", 180.0));
    wait_ms(50).await;
    assert_eq!(platform.invocations_for("light.b").len(), 1);

    // Within cooldown, but forced
    platform.set_auto_apply(true);
    let outcome = manager.manual_sync(id, Direction::AToB).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(platform.invocations_for("light.b").len(), 2);
    assert_eq!(platform.state("light.b").unwrap().number(attrs::BRIGHTNESS), Some(180.0));
    assert!(platform.invocations_for("light.a").is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_sync_of_missing_source_is_recorded() {
    let (platform, manager, id) = lights(light_on("light.a", 180.0), light_off("light.b")).await;
    platform.remove(&"light.a".into());

    let result = manager.manual_sync(id, Direction::AToB).await;
    assert!(matches!(result, Err(LinkError::EntityNotFound(missing)) if missing.as_str() == "light.a"));
    assert!(platform.invocations().is_empty());

    let stats = manager.get_sync_status(id).unwrap().stats;
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.failed, 1);
    assert!(stats.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn removed_link_is_forgotten() {
    let (platform, manager, id) = lights(light_off("light.a"), light_off("light.b")).await;
    assert_eq!(manager.link_ids(), vec![id]);

    manager.remove_link(id).unwrap();
    assert_eq!(platform.subscription_count(), 0);
    assert!(manager.link_ids().is_empty());
    assert!(matches!(
        manager.get_sync_status(id),
        Err(LinkError::LinkNotFound(missing)) if missing == id
    ));
    assert!(matches!(
        manager.manual_sync(id, Direction::AToB).await,
        Err(LinkError::LinkNotFound(_))
    ));
    assert!(matches!(manager.remove_link(id), Err(LinkError::LinkNotFound(_))));
}

#[tokio::test]
async fn invalid_link_is_rejected() {
    let platform = Arc::new(MemoryPlatform::new());
    let manager = LinkManager::new(platform.clone(), EngineConfig::default());

    let err = manager
        .add_link(LinkConfig::new("light.a", "light.a"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::InvalidConfig(_)));
    assert!(manager.link_ids().is_empty());
    assert_eq!(platform.subscribe_calls(), 0);
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_cover_burst_sends_its_last_position(burst in cover_burst_strategy(0.0)) {
        let sent = paused_runtime().block_on(async {
            let (platform, _manager, _id) = start(
                vec![cover("cover.a", 0.0), cover("cover.b", 0.0)],
                EngineConfig::default(),
                link("cover.a", "cover.b"),
            )
            .await;
            for position in &burst {
                platform.set_state(cover("cover.a", *position));
                wait_ms(50).await;
            }
            wait(Duration::from_secs(1)).await;
            positions(&platform, "cover.b")
        });
        prop_assert_eq!(sent, vec![*burst.last().unwrap()]);
    }

    #[test]
    fn any_light_is_mirrored_with_one_color_model(state in light_strategy("light.a")) {
        let calls = paused_runtime().block_on(async {
            let (platform, _manager, _id) =
                lights(light_off("light.a"), light_off("light.b")).await;
            platform.set_state(state.clone());
            wait_ms(100).await;
            platform.invocations_for("light.b")
        });

        prop_assert_eq!(calls.len(), 1);
        prop_assert_eq!(calls[0].action.as_str(), services::TURN_ON);
        prop_assert_eq!(
            calls[0].param(attrs::BRIGHTNESS).and_then(Value::as_f64),
            state.number(attrs::BRIGHTNESS)
        );
        let colors = [attrs::HS_COLOR, attrs::RGB_COLOR, attrs::XY_COLOR, attrs::COLOR_TEMP_KELVIN]
            .iter()
            .filter(|key| calls[0].param(key).is_some())
            .count();
        prop_assert!(colors <= 1);
    }
}
