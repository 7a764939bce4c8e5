#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;

use jersey::config::Catalog;
use jersey::materials::{FabricLibrary, FabricProfile};
use jersey::mesh::{MeshSource, NodeTable};
use jersey::resources::{AssetSource, Bitmap, ImageLoader, LoadFuture, ResolveError, Texture};
use jersey::schema::Vec2;
use jersey::session::Configurator;
use jersey::text::{Coverage, GlyphSource};

/// In-memory loader. Every path decodes to a 2x2 bitmap colored from the
/// path; gated paths wait until released, failing paths return a fetch error.
#[derive(Default)]
pub struct ScriptedLoader {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds loads of `path` until the returned handle is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("gates lock")
            .insert(path.to_owned(), Arc::clone(&gate));
        gate
    }

    pub fn fail(&self, path: &str) {
        self.failing
            .lock()
            .expect("failing lock")
            .insert(path.to_owned());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == path).count()
    }
}

impl ImageLoader for ScriptedLoader {
    fn load(&self, source: &AssetSource) -> LoadFuture {
        let path = source.to_string();
        self.calls.lock().expect("calls lock").push(path.clone());
        let gate = self.gates.lock().expect("gates lock").get(&path).cloned();
        let failing = self.failing.lock().expect("failing lock").contains(&path);
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if failing {
                return Err(ResolveError::Fetch {
                    path,
                    message: "scripted failure".to_owned(),
                });
            }
            Ok(solid_bitmap(&path))
        })
    }
}

pub fn solid_bitmap(seed: &str) -> Bitmap {
    let shade = seed.bytes().fold(17u8, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte));
    let pixels = [shade, shade.wrapping_add(64), shade.wrapping_add(128), 255].repeat(4);
    Bitmap::from_rgba(2, 2, pixels).expect("2x2 bitmap")
}

/// Every character is a solid block `px / 2` wide and `px` tall.
pub struct Blocks;

impl GlyphSource for Blocks {
    fn shape_line(&self, text: &str, _family: &str, px: f32) -> Result<Coverage> {
        let advance = (px / 2.0) as u32;
        let width = advance * text.chars().count() as u32;
        let height = px as u32;
        Ok(Coverage {
            width,
            height,
            alpha: vec![255; width as usize * height as usize],
        })
    }
}

pub fn polyster() -> FabricProfile {
    let map = |name: &str| {
        Some(Arc::new(
            Texture::new(name, solid_bitmap(name)).tiled(Vec2::splat(3.0)),
        ))
    };
    FabricProfile {
        name: "polyster".to_owned(),
        normal_map: map("normal"),
        roughness_map: map("roughness"),
        ao_map: map("ao"),
        normal_scale: Vec2::splat(0.5),
        metalness: Some(0.1),
        roughness: Some(0.6),
    }
}

pub fn fabrics() -> FabricLibrary {
    FabricLibrary::from_profiles([polyster(), FabricProfile::plain()])
}

/// A mounted session over the default catalog. Must run inside a tokio runtime.
pub fn session(loader: &Arc<ScriptedLoader>) -> Configurator {
    let catalog = Arc::new(Catalog::default());
    let mesh = NodeTable::new(catalog.mesh.clone())
        .load_mesh(&catalog.mesh.path)
        .expect("default mesh loads");
    let loader: Arc<dyn ImageLoader> = loader.clone();
    Configurator::new(catalog, &mesh, fabrics(), loader, Box::new(Blocks))
        .expect("session mounts")
}

/// A session with every mount-time load applied and one frame composed.
pub async fn settled_session(loader: &Arc<ScriptedLoader>) -> Configurator {
    let mut session = session(loader);
    session.settle().await;
    session.tick();
    session
}

/// Pumps completions until `done` holds, yielding to the runtime in between.
pub async fn pump_until(session: &mut Configurator, done: impl Fn(&Configurator) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            session.pump();
            if done(session) {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition reached before timeout");
}
