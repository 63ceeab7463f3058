//! Resource loading pipeline
//!
//! Two text resources are fetched strictly one after the other: the texture
//! list (manifest), then the map. The map request is issued only from the
//! manifest's completion. Images are issued alongside, all at once, and are
//! never waited for.

use crate::table::{AssetTable, ImageSet};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use spark_core::Result;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// What to load, relative to the transport's base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPlan {
    /// Texture list
    pub manifest: String,
    /// Level to play
    pub map: String,
    pub assets: AssetTable,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            manifest: "assets/texture_list.txt".to_string(),
            map: "maps/Atrium.map".to_string(),
            assets: AssetTable::default(),
        }
    }
}

/// One of the two sequential fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Manifest,
    Map,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Manifest => write!(f, "manifest"),
            Stage::Map => write!(f, "map"),
        }
    }
}

/// Progress of the sequential fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Pending,
    FetchingManifest,
    FetchingMap,
    Ready,
    Failed { stage: Stage },
}

/// Loads the resources the engine is constructed from.
pub struct ResourcePipeline<T: Transport> {
    transport: Rc<T>,
    plan: LoadPlan,
    status: Rc<Cell<PipelineStatus>>,
}

impl<T: Transport + 'static> ResourcePipeline<T> {
    pub fn new(transport: T, plan: LoadPlan) -> Self {
        Self {
            transport: Rc::new(transport),
            plan,
            status: Rc::new(Cell::new(PipelineStatus::Pending)),
        }
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.get()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start loading.
    ///
    /// `on_ready(manifest, map)` runs exactly once, after both text fetches
    /// succeed. If either fails the pipeline stops for good and `on_ready` is
    /// dropped uncalled. The returned handles are filled in as images arrive.
    pub fn load(&self, on_ready: impl FnOnce(String, String) + 'static) -> ImageSet {
        if self.status() != PipelineStatus::Pending {
            log::warn!("resource pipeline already started ({:?}), loading again", self.status());
        }

        log::info!("loading manifest {}", self.transport.locate(&self.plan.manifest));
        self.status.set(PipelineStatus::FetchingManifest);

        let transport = self.transport.clone();
        let status = self.status.clone();
        let map_path = self.plan.map.clone();
        self.transport.fetch_text(
            &self.plan.manifest,
            Box::new(move |result| {
                let Some(manifest) = finish_stage(&status, Stage::Manifest, result) else {
                    return;
                };
                log::info!("loading map {}", transport.locate(&map_path));
                status.set(PipelineStatus::FetchingMap);

                let map_status = status.clone();
                transport.fetch_text(
                    &map_path,
                    Box::new(move |result| {
                        let Some(map) = finish_stage(&map_status, Stage::Map, result) else {
                            return;
                        };
                        map_status.set(PipelineStatus::Ready);
                        log::info!("resources ready");
                        on_ready(manifest, map);
                    }),
                );
            }),
        );

        let images = self.plan.assets.handles();
        for image in images.iter() {
            self.transport.fetch_image(image);
        }
        log::debug!("issued {} image loads", self.plan.assets.image_count());
        images
    }
}

fn finish_stage(
    status: &Cell<PipelineStatus>,
    stage: Stage,
    result: Result<String>,
) -> Option<String> {
    match result {
        Ok(text) => {
            log::debug!("{stage} loaded ({} bytes)", text.len());
            Some(text)
        }
        Err(e) => {
            log::error!("failed to load {stage}, startup halted: {e}");
            status.set(PipelineStatus::Failed { stage });
            None
        }
    }
}
