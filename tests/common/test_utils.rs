use std::{cell::RefCell, collections::HashMap};

use vibe_ngin::{
    error::Result,
    resources::{AssetSource, MemorySource},
};

/// A triangle with per-vertex colors packed into `vt` and a material library
/// one directory down.
pub const TRIANGLE_OBJ: &str = "\
mtllib mtl/triangle.mtl
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.0 0.5 0.0
vt 1.0 0.0 0.0
vt 0.0 1.0 0.0
vt 0.0 0.0 1.0
usemtl painted
f 1/1 2/2 3/3
";

pub const TRIANGLE_MTL: &str = "\
newmtl plain
Kd 0.8 0.8 0.8

newmtl painted
map_Kd ../paint.png
";

/// Wraps a [`MemorySource`] and counts fetches per path. Every fetch yields
/// once so concurrent loads really overlap.
#[derive(Default)]
pub struct CountingSource {
    inner: MemorySource,
    fetches: RefCell<HashMap<String, usize>>,
}

impl CountingSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            fetches: RefCell::default(),
        }
    }

    pub fn triangle() -> Self {
        Self::new(
            MemorySource::new()
                .with("models/triangle.obj", TRIANGLE_OBJ)
                .with("models/mtl/triangle.mtl", TRIANGLE_MTL),
        )
    }

    pub fn fetches(&self, path: &str) -> usize {
        self.fetches.borrow().get(path).copied().unwrap_or(0)
    }
}

impl AssetSource for CountingSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        *self.fetches.borrow_mut().entry(path.to_string()).or_default() += 1;
        tokio::task::yield_now().await;
        self.inner.fetch(path).await
    }
}
