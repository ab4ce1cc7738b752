//! Scripted drive scenario.
//!
//! Wires a real location session to a simulated positioning feed and a
//! scripted routing engine, then walks the whole cycle: acquire a fix, plan,
//! build, navigate, arrive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use waymark::config::Settings;
use waymark::location::{
    current_timestamp_ms, CoreLocationSink, Fix, FixSource, LocationError, LocationSession,
    NativeProvider, PermissionGateway, ProviderTag, ResolutionIntent, SourcePoll,
    event_channel, spawn_event_pump,
};
use waymark::routing::{
    BuildCode, BuildState, Generation, Phase, RoutePoint, RouterKind, RoutingDelegate,
    RoutingEngine, RoutingSession,
};

/// Scenario parameters from the command line.
pub struct ScenarioConfig {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub router: RouterKind,
    pub steps: usize,
}

/// Positioning feed replaying fixes interpolated along the drive.
///
/// After the scripted fixes run out the feed keeps repeating the final
/// position, the way a real receiver keeps reporting a stationary device.
struct DriveFeed {
    fixes: Mutex<VecDeque<Fix>>,
    last: Mutex<Option<Fix>>,
    exhausted: AtomicBool,
}

impl DriveFeed {
    fn new(config: &ScenarioConfig) -> Self {
        let (from_lat, from_lon) = config.from;
        let (to_lat, to_lon) = config.to;
        let steps = config.steps.max(1);

        let mut fixes = VecDeque::with_capacity(steps + 1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let lat = from_lat + (to_lat - from_lat) * t;
            let lon = from_lon + (to_lon - from_lon) * t;
            let bearing = (to_lon - from_lon)
                .atan2(to_lat - from_lat)
                .to_degrees()
                .rem_euclid(360.0);
            fixes.push_back(
                Fix::new(ProviderTag::NativeGps, 0, lat, lon)
                    .with_accuracy(8.0)
                    .with_speed(12.0)
                    .with_bearing(bearing),
            );
        }

        Self {
            fixes: Mutex::new(fixes),
            last: Mutex::new(None),
            exhausted: AtomicBool::new(false),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

impl FixSource for DriveFeed {
    fn poll_fix(&self) -> SourcePoll {
        let next = self.fixes.lock().ok().and_then(|mut fixes| {
            let fix = fixes.pop_front();
            if fixes.is_empty() {
                self.exhausted.store(true, Ordering::SeqCst);
            }
            fix
        });

        let mut fix = match next {
            Some(fix) => {
                if let Ok(mut last) = self.last.lock() {
                    *last = Some(fix.clone());
                }
                fix
            }
            None => match self.last.lock().ok().and_then(|last| last.clone()) {
                Some(fix) => fix,
                None => return SourcePoll::Pending,
            },
        };

        // Stamp at poll time so the arbiter sees real elapsed time.
        fix.timestamp_ms = current_timestamp_ms();
        SourcePoll::Fix(fix)
    }
}

/// Routing engine answering through the session's callback entry points.
#[derive(Default)]
struct ScriptedEngine {
    request: Mutex<Option<Generation>>,
    finished: AtomicBool,
}

impl ScriptedEngine {
    fn take_request(&self) -> Option<Generation> {
        self.request.lock().ok().and_then(|mut r| r.take())
    }
}

impl RoutingEngine for ScriptedEngine {
    fn build_route(
        &self,
        origin: &RoutePoint,
        destination: &RoutePoint,
        router: RouterKind,
        generation: Generation,
    ) {
        info!(%origin, %destination, %router, generation, "engine: build requested");
        if let Ok(mut request) = self.request.lock() {
            *request = Some(generation);
        }
    }

    fn follow_route(&self) {
        info!("engine: following route");
    }

    fn close_routing(&self) {
        info!("engine: routing context closed");
    }

    fn is_route_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

struct OpenGateway;

impl PermissionGateway for OpenGateway {
    fn is_location_granted(&self) -> bool {
        true
    }
    fn are_services_enabled(&self) -> bool {
        true
    }
    fn request_permission(&self) {}
    fn launch_resolution(&self, _intent: &ResolutionIntent) {}
}

struct ConsoleSink;

impl CoreLocationSink for ConsoleSink {
    fn location_updated(&self, fix: &Fix) {
        info!(
            lat = format!("{:.5}", fix.latitude),
            lon = format!("{:.5}", fix.longitude),
            provider = %fix.provider,
            "core: position updated"
        );
    }

    fn location_error(&self, error: LocationError) {
        warn!(%error, "core: location error");
    }
}

struct ConsoleDelegate;

impl RoutingDelegate for ConsoleDelegate {
    fn on_phase_changed(&self, phase: Phase) {
        info!(%phase, "routing: phase changed");
    }

    fn on_build_state_changed(&self, state: BuildState) {
        info!(%state, "routing: build state changed");
    }

    fn on_build_progress(&self, percent: u8, router: RouterKind) {
        info!(percent, %router, "routing: build progress");
    }

    fn on_build_failed(&self, code: BuildCode, missing: &[String], downloadable: bool) {
        warn!(%code, ?missing, downloadable, "routing: build failed");
    }

    fn on_route_completed(&self) {
        info!("routing: destination reached");
    }

    fn on_navigation_cancelled(&self) {
        info!("routing: navigation ended");
    }
}

/// Run the scripted drive. Returns true when navigation completed.
pub async fn run(config: ScenarioConfig) -> bool {
    let feed = Arc::new(DriveFeed::new(&config));
    let (events_tx, events_rx) = event_channel();
    let native = Arc::new(NativeProvider::new(
        Arc::clone(&feed) as Arc<dyn FixSource>,
        events_tx,
    ));

    let location = Arc::new(LocationSession::new(
        native,
        None,
        Arc::new(OpenGateway),
        Arc::new(ConsoleSink),
    ));
    let pump = spawn_event_pump(Arc::clone(&location), events_rx);

    let settings = Arc::new(Settings::in_memory());
    let engine = Arc::new(ScriptedEngine::default());
    let routing = Arc::new(RoutingSession::new(
        Arc::clone(&engine) as Arc<dyn RoutingEngine>,
        Arc::clone(&location),
        Arc::clone(&settings),
    ));
    routing.attach_delegate(Arc::new(ConsoleDelegate));

    // First launch: accept the disclaimer and pick the router.
    routing.accept_disclaimer();
    routing.set_router_kind(config.router);

    // Acquire the first fix.
    location.start();
    if !wait_until(Duration::from_secs(10), || location.last_fix().is_some()).await {
        warn!("no fix acquired from the simulated feed");
        return false;
    }

    // Plan and build.
    let destination = RoutePoint::user_pick(config.to.0, config.to.1);
    if !routing.prepare(Some(destination)) {
        return false;
    }
    let Some(generation) = engine.take_request() else {
        warn!("engine saw no build request");
        return false;
    };
    for percent in [20, 45, 70, 90] {
        routing.on_build_progress(generation, percent);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    routing.on_build_result(generation, BuildCode::NoError, Vec::new());

    // Navigate until the feed runs out, then let the engine report arrival.
    if !routing.start() {
        return false;
    }
    let arrived = wait_until(Duration::from_secs(60), || {
        if feed.is_exhausted() {
            engine.finished.store(true, Ordering::SeqCst);
        }
        !routing.is_navigating()
    })
    .await;

    location.stop();
    pump.abort();

    if arrived {
        info!("scenario complete");
    }
    arrived
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
