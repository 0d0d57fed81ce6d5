#![allow(dead_code, unused_imports)]

use bundle_manager::prelude::*;
use std::{fs::File, sync::Arc, time::Instant};

#[cfg(feature = "profiling")]
use tracing_subscriber::{self, prelude::*};

const ROOT: &str = "bundles";

fn populate(source: &MemorySource, count: usize) {
    for i in 0..count {
        let bundle = format!("b{i}.bundle");
        source.add_asset(ROOT, &bundle, &format!("b{i}/item.asset"), i);
        // Every tenth bundle pulls in a shared dependency
        if i % 10 == 0 && i > 0 {
            source.add_dependency(ROOT, &bundle, "b0.bundle");
        }
    }
}

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(manager))]
fn profile_reclaim(manager: &mut AssetManager, ticks: usize) {
    let _span = tracing::info_span!("reclaim_loop", ticks = ticks).entered();
    for i in 0..ticks {
        if i % 100 == 0 {
            tracing::info!(
                "Tick {}/{}: {} bundles resident",
                i,
                ticks,
                manager.stats().resident_bundles
            );
        }
        manager.tick();
    }
}

#[cfg(feature = "profiling")]
fn main() -> Result<()> {
    // Set up tracing subscriber to write to a file
    let file = File::create("trace.json")?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .init();

    let source = MemorySource::new();
    populate(&source, 5_000);
    let mut manager = AssetManager::new(Arc::new(source), AssetConfig::default())?;
    manager.add_root(ROOT, RootConfig::new().with_cache_capacity(64))?;

    println!("Loading...");
    {
        let _span = tracing::info_span!("load").entered();
        for i in 0..5_000 {
            manager.load(&format!("b{i}/item"), None, None)?;
        }
    }

    println!("Profiling reclaim of 5k unreferenced bundles...");
    let start = Instant::now();
    profile_reclaim(&mut manager, 1_000);
    println!(
        "Reclaim complete in: {:?}, {} bundles left",
        start.elapsed(),
        manager.stats().resident_bundles
    );
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_reclaim binary requires --features profiling");
}
