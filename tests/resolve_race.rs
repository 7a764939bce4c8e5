mod support;

use jersey::branding::BrandingSlotKind;
use jersey::compose::DecalLayer;
use jersey::controls::ControlValue;
use jersey::layers::{LayerKind, LayerPhase};
use jersey::panels::Panel;
use jersey::schema::{Region, RegionGroup};
use jersey::session::{Configurator, ResolvePolicy};

use support::{pump_until, settled_session, ScriptedLoader};

const SLOW: &str = "/textures/design/texture1.jpg";
const FAST: &str = "/textures/design/texture2.png";

fn active_source(session: &Configurator) -> Option<String> {
    session
        .layer(LayerKind::Pattern)
        .active
        .as_ref()
        .map(|handle| handle.source.clone())
}

/// Dispatches a slow load then a fast one, lets the fast one land first and
/// then releases the slow one.
async fn race(policy: ResolvePolicy) -> Configurator {
    let loader = ScriptedLoader::new();
    let mut session = settled_session(&loader).await.with_policy(policy);
    let slow = loader.gate(SLOW);

    session.apply_control(
        Panel::TextureBranding,
        "Texture",
        ControlValue::Image(SLOW.to_owned()),
    );
    session.apply_control(
        Panel::TextureBranding,
        "Texture",
        ControlValue::Image(FAST.to_owned()),
    );
    assert_eq!(session.in_flight(), 2);

    pump_until(&mut session, |session| session.in_flight() == 1).await;
    assert_eq!(session.layer(LayerKind::Pattern).phase(), LayerPhase::Loading);

    slow.notify_one();
    session.settle().await;
    session.tick();
    session
}

#[tokio::test]
async fn last_completion_wins_by_default() {
    let session = race(ResolvePolicy::default()).await;
    assert_eq!(session.policy(), ResolvePolicy::LastCompletionWins);

    let pattern = session.layer(LayerKind::Pattern);
    assert_eq!(pattern.pending_load.as_deref(), Some(FAST));
    assert_eq!(pattern.phase(), LayerPhase::Ready);
    assert_eq!(active_source(&session).as_deref(), Some(SLOW));
    let decal = session
        .region(Region::Front)
        .and_then(|state| state.decal(DecalLayer::Pattern))
        .expect("pattern decal");
    assert_eq!(decal.texture.texture.source, SLOW);
}

#[tokio::test]
async fn latest_dispatch_wins_when_opted_in() {
    let session = race(ResolvePolicy::LatestDispatchWins).await;

    assert_eq!(active_source(&session).as_deref(), Some(FAST));
    assert_eq!(session.layer(LayerKind::Pattern).phase(), LayerPhase::Ready);
    let decal = session
        .region(Region::Back)
        .and_then(|state| state.decal(DecalLayer::Pattern))
        .expect("pattern decal");
    assert_eq!(decal.texture.texture.source, FAST);
}

#[tokio::test]
async fn failed_loads_keep_the_previous_resource() {
    let loader = ScriptedLoader::new();
    let mut session = settled_session(&loader).await;
    session.apply_control(
        Panel::TextureBranding,
        "Texture",
        ControlValue::Image(FAST.to_owned()),
    );
    session.settle().await;
    session.tick();

    let broken = "/textures/design/missing.png";
    loader.fail(broken);
    session.apply_control(
        Panel::TextureBranding,
        "Texture",
        ControlValue::Image(broken.to_owned()),
    );
    session.settle().await;
    session.tick();

    let pattern = session.layer(LayerKind::Pattern);
    assert_eq!(pattern.phase(), LayerPhase::Ready);
    assert_eq!(pattern.pending_load.as_deref(), Some(broken));
    assert_eq!(active_source(&session).as_deref(), Some(FAST));
}

#[tokio::test]
async fn repeated_paths_resolve_from_cache() {
    let loader = ScriptedLoader::new();
    let mut session = settled_session(&loader).await;
    for path in [FAST, SLOW, FAST] {
        session.apply_control(
            Panel::TextureBranding,
            "Texture",
            ControlValue::Image(path.to_owned()),
        );
        session.settle().await;
    }
    session.tick();
    assert_eq!(loader.calls_for(FAST), 1);
    assert_eq!(active_source(&session).as_deref(), Some(FAST));
}

#[tokio::test]
async fn branding_images_ignore_superseded_loads() {
    let loader = ScriptedLoader::new();
    let mut session = settled_session(&loader).await;
    let slow_logo = "/assets/logo/slow.png";
    let fast_logo = "/assets/logo/fast.png";
    let gate = loader.gate(slow_logo);

    session.apply_control(
        Panel::LeftSleeve,
        "Logo",
        ControlValue::Image(slow_logo.to_owned()),
    );
    session.apply_control(
        Panel::LeftSleeve,
        "Logo",
        ControlValue::Image(fast_logo.to_owned()),
    );
    pump_until(&mut session, |session| session.in_flight() == 1).await;
    gate.notify_one();
    session.settle().await;
    session.tick();

    let slot = session
        .branding(RegionGroup::LeftSleeve)
        .and_then(|group| group.slot(BrandingSlotKind::Logo))
        .expect("sleeve logo slot");
    assert_eq!(
        slot.resource.as_ref().map(|handle| handle.source.as_str()),
        Some(fast_logo)
    );
    let decal = session
        .region(Region::LeftSleeve)
        .and_then(|state| state.decal(DecalLayer::Logo))
        .expect("sleeve logo decal");
    assert_eq!(decal.texture.texture.source, fast_logo);
    let other = session
        .region(Region::RightSleeve)
        .and_then(|state| state.decal(DecalLayer::Logo))
        .expect("right sleeve logo decal");
    assert_ne!(other.texture.texture.source, fast_logo);
}
