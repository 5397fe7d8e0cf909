//=========================================================================
// Simulated Host
//=========================================================================
//
// Deterministic in-process SceneHost.
//
// Every registered scene carries a scripted progress curve. Each call to
// update() advances every in-flight request by one curve entry, so a scene
// registered with [0.1, 0.4, 0.7, 1.0] finishes loading on the fourth tick
// after the request was issued.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{HostProgress, RequestId, SceneHost, SceneId};

//=== Request Bookkeeping =================================================

#[derive(Debug)]
enum RequestKind {
    Load(SceneId),
    Unload(u64),
}

#[derive(Debug)]
struct Request {
    kind: RequestKind,
    steps: usize,
    finished: Option<HostProgress<u64>>,
}

//=== SimulatedHost =======================================================

/// Scene host driven entirely by scripted curves.
///
/// Handles are plain `u64` values, unique for the lifetime of the host.
#[derive(Debug)]
pub struct SimulatedHost {
    curves: HashMap<SceneId, Vec<f32>>,
    unload_steps: usize,
    requests: HashMap<RequestId, Request>,
    loaded: Vec<(u64, SceneId)>,
    next_request: u64,
    next_handle: u64,
    load_log: Vec<SceneId>,
    unload_log: Vec<SceneId>,
}

impl SimulatedHost {
    /// Creates a host that knows no scenes and unloads in one tick.
    pub fn new() -> Self {
        Self {
            curves: HashMap::new(),
            unload_steps: 1,
            requests: HashMap::new(),
            loaded: Vec::new(),
            next_request: 1,
            next_handle: 1,
            load_log: Vec::new(),
            unload_log: Vec::new(),
        }
    }

    /// Sets how many ticks an unload takes. Clamped to at least one.
    pub fn with_unload_steps(mut self, steps: usize) -> Self {
        self.unload_steps = steps.max(1);
        self
    }

    //--- Registration -----------------------------------------------------

    /// Registers a scene that loads in a single tick.
    pub fn register_scene(&mut self, scene: impl Into<SceneId>) {
        self.register_scene_with_curve(scene, vec![1.0]);
    }

    /// Registers a scene with an explicit per-tick progress curve.
    ///
    /// The load completes on the tick that consumes the last entry. An
    /// empty curve behaves like `[1.0]`.
    pub fn register_scene_with_curve(&mut self, scene: impl Into<SceneId>, curve: Vec<f32>) {
        let curve = if curve.is_empty() { vec![1.0] } else { curve };
        self.curves.insert(scene.into(), curve);
    }

    //--- External Interference ---------------------------------------------

    /// Destroys a loaded scene behind the scheduler's back.
    ///
    /// Returns `true` if the handle was live.
    pub fn destroy(&mut self, handle: u64) -> bool {
        let before = self.loaded.len();
        self.loaded.retain(|(h, _)| *h != handle);
        before != self.loaded.len()
    }

    //--- Inspection -------------------------------------------------------

    /// Scenes for which a load was requested, in request order.
    pub fn load_requests(&self) -> &[SceneId] {
        &self.load_log
    }

    /// Scenes for which an unload was requested, in request order.
    pub fn unload_requests(&self) -> &[SceneId] {
        &self.unload_log
    }

    /// Ids of currently loaded scenes, in load order.
    pub fn loaded_scenes(&self) -> Vec<SceneId> {
        self.loaded.iter().map(|(_, id)| id.clone()).collect()
    }

    /// Looks up the handle of a loaded scene.
    pub fn handle_of(&self, scene: &SceneId) -> Option<u64> {
        self.loaded.iter().find(|(_, id)| id == scene).map(|(h, _)| *h)
    }

    /// Number of requests not yet observed as finished.
    pub fn in_flight(&self) -> usize {
        self.requests.values().filter(|r| r.finished.is_none()).count()
    }

    //--- Internal Helpers -------------------------------------------------

    fn issue(&mut self, kind: RequestKind) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.requests.insert(
            id,
            Request {
                kind,
                steps: 0,
                finished: None,
            },
        );
        id
    }

    fn advance(&mut self, id: RequestId) {
        let Some(request) = self.requests.get_mut(&id) else {
            return;
        };
        if request.finished.is_some() {
            return;
        }
        request.steps += 1;

        let finished = match &request.kind {
            RequestKind::Load(scene) => {
                let len = self.curves.get(scene).map_or(1, Vec::len);
                if request.steps >= len {
                    let handle = self.next_handle;
                    self.next_handle += 1;
                    self.loaded.push((handle, scene.clone()));
                    debug!("Simulated host loaded {} as handle {}", scene, handle);
                    Some(HostProgress::Loaded(handle))
                } else {
                    None
                }
            }
            RequestKind::Unload(handle) => {
                let handle = *handle;
                if !self.loaded.iter().any(|(h, _)| *h == handle) {
                    Some(HostProgress::Lost)
                } else if request.steps >= self.unload_steps {
                    self.loaded.retain(|(h, _)| *h != handle);
                    debug!("Simulated host unloaded handle {}", handle);
                    Some(HostProgress::Unloaded)
                } else {
                    None
                }
            }
        };

        if let Some(request) = self.requests.get_mut(&id) {
            request.finished = finished;
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

//=== SceneHost Implementation ============================================

impl SceneHost for SimulatedHost {
    type Handle = u64;

    fn load_async(&mut self, scene: &SceneId) -> Option<RequestId> {
        if !self.curves.contains_key(scene) {
            warn!("Simulated host has no scene {}", scene);
            return None;
        }
        self.load_log.push(scene.clone());
        Some(self.issue(RequestKind::Load(scene.clone())))
    }

    fn unload_async(&mut self, handle: &u64) -> Option<RequestId> {
        let scene = self
            .loaded
            .iter()
            .find(|(h, _)| h == handle)
            .map(|(_, id)| id.clone())?;
        self.unload_log.push(scene);
        Some(self.issue(RequestKind::Unload(*handle)))
    }

    fn poll(&mut self, request: RequestId) -> HostProgress<u64> {
        let Some(entry) = self.requests.get(&request) else {
            return HostProgress::Lost;
        };
        if entry.finished.is_some() {
            return self
                .requests
                .remove(&request)
                .and_then(|entry| entry.finished)
                .unwrap_or(HostProgress::Lost);
        }
        match &entry.kind {
            RequestKind::Load(scene) => {
                let progress = match entry.steps {
                    0 => 0.0,
                    n => self
                        .curves
                        .get(scene)
                        .and_then(|curve| curve.get(n - 1))
                        .copied()
                        .unwrap_or(0.0),
                };
                HostProgress::Pending(progress)
            }
            RequestKind::Unload(_) => {
                HostProgress::Pending(entry.steps as f32 / self.unload_steps as f32)
            }
        }
    }

    fn is_valid(&self, handle: &u64) -> bool {
        self.loaded.iter().any(|(h, _)| h == handle)
    }

    fn active_scenes(&self) -> Vec<u64> {
        self.loaded.iter().map(|(h, _)| *h).collect()
    }

    fn update(&mut self, _delta: Duration) {
        let mut pending: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|(_, r)| r.finished.is_none())
            .map(|(id, _)| *id)
            .collect();
        pending.sort_by_key(|id| id.0);
        for id in pending {
            self.advance(id);
        }
    }
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_until_done(host: &mut SimulatedHost, request: RequestId) -> (Vec<f32>, HostProgress<u64>) {
        let mut seen = Vec::new();
        for _ in 0..16 {
            match host.poll(request) {
                HostProgress::Pending(p) => seen.push(p),
                other => return (seen, other),
            }
            host.update(Duration::ZERO);
        }
        panic!("request never finished");
    }

    #[test]
    fn unknown_scene_cannot_load() {
        let mut host = SimulatedHost::new();
        assert!(host.load_async(&SceneId::from("missing")).is_none());
        assert!(host.load_requests().is_empty());
    }

    #[test]
    fn load_follows_curve() {
        let mut host = SimulatedHost::new();
        host.register_scene_with_curve("level", vec![0.1, 0.4, 0.7, 1.0]);

        let request = host.load_async(&SceneId::from("level")).unwrap();
        let (seen, done) = poll_until_done(&mut host, request);

        assert_eq!(seen, vec![0.0, 0.1, 0.4, 0.7]);
        assert_eq!(done, HostProgress::Loaded(1));
        assert_eq!(host.loaded_scenes(), vec![SceneId::from("level")]);
    }

    #[test]
    fn finished_request_is_forgotten_after_poll() {
        let mut host = SimulatedHost::new();
        host.register_scene("level");
        let request = host.load_async(&SceneId::from("level")).unwrap();
        host.update(Duration::ZERO);

        assert_eq!(host.poll(request), HostProgress::Loaded(1));
        assert!(host.requests.is_empty());
        assert_eq!(host.poll(request), HostProgress::Lost);
    }

    #[test]
    fn unload_removes_scene() {
        let mut host = SimulatedHost::new().with_unload_steps(2);
        host.register_scene("menu");
        let load = host.load_async(&SceneId::from("menu")).unwrap();
        host.update(Duration::ZERO);
        let HostProgress::Loaded(handle) = host.poll(load) else {
            panic!("menu should load in one tick");
        };

        let unload = host.unload_async(&handle).unwrap();
        let (seen, done) = poll_until_done(&mut host, unload);

        assert_eq!(seen, vec![0.0, 0.5]);
        assert_eq!(done, HostProgress::Unloaded);
        assert!(!host.is_valid(&handle));
        assert_eq!(host.unload_requests(), &[SceneId::from("menu")]);
    }

    #[test]
    fn destroyed_scene_loses_unload() {
        let mut host = SimulatedHost::new().with_unload_steps(3);
        host.register_scene("menu");
        let load = host.load_async(&SceneId::from("menu")).unwrap();
        host.update(Duration::ZERO);
        let HostProgress::Loaded(handle) = host.poll(load) else {
            panic!("menu should load in one tick");
        };

        let unload = host.unload_async(&handle).unwrap();
        assert!(host.destroy(handle));
        host.update(Duration::ZERO);

        assert_eq!(host.poll(unload), HostProgress::Lost);
        assert!(host.unload_async(&handle).is_none());
    }
}
