use bundle_manager::mock::{RecordingSceneHost, SceneEvent};
use bundle_manager::prelude::*;
use bundle_manager::{WEB_BYTES_KEY, WEB_GROUP_KEY};
use parking_lot::Mutex;
use std::sync::Arc;

const ROOT: &str = "bundles";
const AVATAR: &str = "https://cdn.example.com/avatar.png";

fn scene_source() -> MemorySource {
    let source = MemorySource::new();
    source
        .add_asset(ROOT, "level1.bundle", "scenes/level1.scene", 1u8)
        .add_scene(ROOT, "level1.bundle", "scenes/level1.scene")
        .add_asset(ROOT, "level2.bundle", "scenes/level2.scene", 2u8)
        .add_scene(ROOT, "level2.bundle", "scenes/level2.scene")
        .add_asset(ROOT, "hud.bundle", "hud/minimap.prefab", 3u8)
        .add_asset(ROOT, "fonts.bundle", "fonts/main.ttf", 4u8);
    source
}

fn manager(source: &MemorySource) -> AssetManager {
    let mut manager = AssetManager::new(Arc::new(source.clone()), AssetConfig::default()).unwrap();
    manager.add_root(ROOT, RootConfig::new()).unwrap();
    manager
}

#[test]
fn test_scene_load_drives_host() {
    let source = scene_source();
    let mut manager = manager(&source);
    let mut host = RecordingSceneHost::default();

    let scene = manager.load_scene("scenes/level1", false, &mut host).unwrap();
    assert_eq!(scene.as_deref(), Some("scenes/level1.scene"));
    assert_eq!(
        host.events,
        vec![SceneEvent::Empty, SceneEvent::Loaded("scenes/level1.scene".to_string())]
    );
    // The scene bundle lives in the weak scope
    assert!(manager.has_any_reference("bundles/level1.bundle"));
    assert_eq!(manager.stats().weak_refs, 1);
}

#[test]
fn test_weak_scope_released_on_scene_transition() {
    let source = scene_source();
    let mut manager = manager(&source);
    let mut host = RecordingSceneHost::default();

    manager.load_scene("scenes/level1", false, &mut host).unwrap();
    let hud = manager.load("hud/minimap", None, None).unwrap();
    let fonts = manager.load("fonts/main", None, None).unwrap();
    assert!(manager.weak_cache(&hud));
    assert!(manager.strong_cache(&fonts));
    assert!(!manager.weak_cache(&hud), "already held");

    manager.load_scene("scenes/level2", true, &mut host).unwrap();
    assert!(!manager.is_bundle_resident("bundles/level1.bundle"));
    assert!(!manager.is_bundle_resident("bundles/hud.bundle"));
    assert!(manager.is_bundle_resident("bundles/fonts.bundle"));
    assert!(manager.is_bundle_resident("bundles/level2.bundle"));

    assert!(manager.release_strong_cache(&fonts));
    manager.unload_unused(true);
    assert!(!manager.is_bundle_resident("bundles/fonts.bundle"));
}

#[test]
fn test_weak_release_leaves_bundle_to_reclaimer() {
    let source = scene_source();
    let mut manager = manager(&source);
    let mut host = RecordingSceneHost::default();

    let hud = manager.preload_bundle("bundles/hud.bundle");
    assert!(hud.is_valid());
    manager.load_scene("scenes/level1", false, &mut host).unwrap();

    // Unreferenced but too recent for the policy sweep
    assert!(!manager.has_any_reference("bundles/hud.bundle"));
    assert!(manager.is_bundle_resident("bundles/hud.bundle"));
}

#[test]
fn test_scene_load_failure_reports_none() {
    let source = scene_source();
    let mut manager = manager(&source);
    let mut host = RecordingSceneHost::default();

    // hud.bundle packages no scene
    assert_eq!(manager.load_scene("hud/minimap", false, &mut host).unwrap(), None);
    assert_eq!(manager.load_scene("scenes/none", false, &mut host).unwrap(), None);
    assert!(host.events.iter().all(|event| *event == SceneEvent::Empty));
}

#[test]
fn test_web_load_requires_async_priority() {
    let fetcher = MockFetcher::new();
    fetcher.respond_object(AVATAR, String::from("pixels"));
    let mut manager = manager(&scene_source());
    manager.add_web_loader("cdn", Arc::new(fetcher.clone()), 8).unwrap();
    assert!(matches!(
        manager.add_web_loader("cdn", Arc::new(fetcher.clone()), 8),
        Err(AssetError::DuplicateWebGroup(_))
    ));

    let rejected = manager.load_web("cdn", AVATAR, None, PRIORITY_FAST, |_| {});
    assert!(matches!(rejected, Err(AssetError::InvalidOperation(_))));
    assert_eq!(fetcher.fetch_count(AVATAR), 0);
}

#[test]
fn test_web_requests_share_fetch_and_cache() {
    let fetcher = MockFetcher::new();
    fetcher.respond_object(AVATAR, String::from("pixels")).set_latency(2);
    let mut manager = manager(&scene_source());
    manager.add_web_loader("cdn", Arc::new(fetcher.clone()), 8).unwrap();

    let results = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let results = results.clone();
        manager
            .load_web("cdn", AVATAR, None, PRIORITY_COMMON, move |request| {
                results.lock().push(request.is_valid());
            })
            .unwrap();
    }
    manager.tick();
    assert!(results.lock().is_empty());
    manager.tick();
    assert_eq!(*results.lock(), vec![true, true]);
    assert_eq!(fetcher.fetch_count(AVATAR), 1);
}

#[test]
fn test_web_raw_bytes_and_unknown_group() {
    let fetcher = MockFetcher::new();
    fetcher.respond_bytes(AVATAR, vec![0x89, 0x50]);
    let mut manager = manager(&scene_source());
    manager.add_web_loader("cdn", Arc::new(fetcher), 0).unwrap();

    let mut request = manager.request(AVATAR);
    request.is_url = true;
    request.priority = PRIORITY_COMMON;
    request.auto_release = false;
    request.set_data(WEB_GROUP_KEY, "cdn".to_string());
    let raw = manager.start_load(request).unwrap();

    let lost = Arc::new(Mutex::new(None));
    let seen = lost.clone();
    manager
        .load_web("missing", AVATAR, None, PRIORITY_COMMON, move |request| {
            *seen.lock() = Some(request.is_valid());
        })
        .unwrap();

    manager.tick();
    let finished = manager.take_completed(raw).unwrap();
    assert!(!finished.is_valid());
    assert_eq!(finished.data::<Vec<u8>>(WEB_BYTES_KEY), Some(&vec![0x89, 0x50]));
    assert_eq!(*lost.lock(), Some(false));
}

#[test]
fn test_editor_resolution_bypasses_bundles() {
    let source = scene_source();
    let editor = MemoryEditor::new();
    editor.add("Assets/UI/Panel.prefab", String::from("panel"));
    let mut manager = manager(&source);
    manager.set_editor_resolver(Some(Arc::new(editor)));

    let owner = RefList::shared();
    let panel = manager.load("Assets/UI/Panel", None, Some(&owner)).unwrap();
    assert!(panel.is_valid());
    assert!(source.open_log().is_empty());
    assert_eq!(
        manager.asset_ref(panel.object().unwrap()).as_ref(),
        panel.asset_ref()
    );

    // Scene paths pass straight through to the host
    let mut host = RecordingSceneHost::default();
    let scene = manager
        .load_scene("Assets/Scenes/Intro.scene", false, &mut host)
        .unwrap();
    assert_eq!(scene.as_deref(), Some("Assets/Scenes/Intro.scene"));

    manager.set_editor_resolver(None);
    assert!(manager.load("hud/minimap", None, None).unwrap().is_valid());
    assert!(!owner.lock().iter().any(AssetRef::is_valid));
}
