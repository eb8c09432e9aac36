//! The controller behind the interactive shell.
//!
//! A [`Session`] owns everything the shell knows: the current camera list, what the view is
//! showing, whether a refresh is in flight, and the open preview. It is created when the
//! shell starts and stops any running preview when dropped.
//!
//! Refreshing is split in two so discovery can run off the UI thread:
//! [`Session::begin_refresh`] hands out a [`RefreshJob`], the job is [run](RefreshJob::run)
//! anywhere, and the outcome goes back through [`Session::finish_refresh`]. Only one job can
//! be outstanding; asking again while one is in flight does nothing.

use std::sync::Arc;

use crate::{
    discovery::Discovery,
    ipc::{HostEvent, ListResponse},
    lister::UsbSource,
    media::{MediaDevices, StreamRequest, VideoStream},
    preview::{Overlay, Preview},
    CameraDevice, Result,
};

/// What the camera view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    CameraList,
    Empty,
    /// Discovery failed; holds the message shown to the user.
    Error(String),
}

/// Snapshot of the session for rendering.
#[derive(Debug, Clone)]
pub struct ViewModel {
    pub state: ViewState,
    pub cameras: Vec<CameraDevice>,
    pub refreshing: bool,
    /// The camera being previewed and its overlay.
    pub preview: Option<(CameraDevice, Overlay)>,
    /// Why the last preview could not be opened or stopped on its own.
    pub preview_error: Option<String>,
}

impl ViewModel {
    pub fn is_previewing(&self, camera: &CameraDevice) -> bool {
        self.preview.as_ref().map_or(false, |(cam, _)| cam == camera)
    }
}

/// A pending discovery request.
pub struct RefreshJob<S, M> {
    discovery: Arc<Discovery<S, M>>,
}

impl<S: UsbSource, M: MediaDevices> RefreshJob<S, M> {
    pub fn run(self) -> RefreshOutcome {
        RefreshOutcome(self.discovery.unified_list())
    }
}

/// Result of a [`RefreshJob`], to be handed to [`Session::finish_refresh`].
#[derive(Debug)]
pub struct RefreshOutcome(Result<Vec<CameraDevice>>);

/// Answer to a list request while discovery is running.
pub const DISCOVERY_PENDING: &str = "camera discovery is still running";

struct ActivePreview {
    camera: CameraDevice,
    preview: Preview,
}

impl ActivePreview {
    fn is_alive(&self) -> bool {
        self.preview.is_running()
    }

    fn ended_message(&self) -> String {
        match self.preview.failure() {
            Some(e) => format!("preview of {} stopped: {}", self.camera.name(), e),
            None => format!("preview of {} stopped", self.camera.name()),
        }
    }
}

pub struct Session<S, M> {
    discovery: Arc<Discovery<S, M>>,
    state: ViewState,
    cameras: Vec<CameraDevice>,
    refreshing: bool,
    preview: Option<ActivePreview>,
    preview_error: Option<String>,
}

impl<S: UsbSource, M: MediaDevices> Session<S, M> {
    /// Creates a session in the `Loading` state without starting discovery.
    pub fn new(discovery: Arc<Discovery<S, M>>) -> Self {
        Self {
            discovery,
            state: ViewState::Loading,
            cameras: Vec::new(),
            refreshing: false,
            preview: None,
            preview_error: None,
        }
    }

    /// Creates a session and runs the startup refresh inline.
    pub fn open(discovery: Arc<Discovery<S, M>>) -> Self {
        let mut session = Self::new(discovery);
        session.refresh();
        session
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn cameras(&self) -> &[CameraDevice] {
        &self.cameras
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// The camera being previewed, if any. A preview whose stream died doesn't count.
    pub fn previewing(&self) -> Option<&CameraDevice> {
        self.live_preview().map(|p| &p.camera)
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.live_preview().map(|p| p.preview.overlay())
    }

    /// Why the last preview failed to open or ended, if it did.
    pub fn preview_error(&self) -> Option<String> {
        match &self.preview {
            Some(active) if !active.is_alive() => Some(active.ended_message()),
            _ => self.preview_error.clone(),
        }
    }

    /// Releases a preview whose stream ended on its own and records why.
    pub fn reap_preview(&mut self) {
        if self.preview.as_ref().map_or(false, |p| !p.is_alive()) {
            if let Some(active) = self.preview.take() {
                let message = active.ended_message();
                log::warn!("{}", message);
                active.preview.stop();
                self.preview_error = Some(message);
            }
        }
    }

    fn live_preview(&self) -> Option<&ActivePreview> {
        self.preview.as_ref().filter(|p| p.is_alive())
    }

    /// Enters `Loading` and returns the discovery job, or `None` if one is already running.
    pub fn begin_refresh(&mut self) -> Option<RefreshJob<S, M>> {
        if self.refreshing {
            log::debug!("refresh already in flight, ignoring request");
            return None;
        }
        self.refreshing = true;
        self.state = ViewState::Loading;
        self.cameras.clear();
        Some(RefreshJob {
            discovery: self.discovery.clone(),
        })
    }

    pub fn finish_refresh(&mut self, outcome: RefreshOutcome) {
        self.refreshing = false;
        match outcome.0 {
            Ok(cameras) => {
                log::debug!("refresh found {} camera(s)", cameras.len());
                self.state = if cameras.is_empty() {
                    ViewState::Empty
                } else {
                    ViewState::CameraList
                };
                self.cameras = cameras;
            }
            Err(e) => {
                log::warn!("refresh failed: {}", e);
                self.cameras.clear();
                self.state = ViewState::Error(e.to_string());
            }
        }
    }

    /// Runs a refresh inline. Does nothing while another refresh is in flight.
    pub fn refresh(&mut self) {
        if let Some(job) = self.begin_refresh() {
            let outcome = job.run();
            self.finish_refresh(outcome);
        }
    }

    /// Starts previewing the camera at `index` in the current list.
    pub fn select_camera(&mut self, index: usize) {
        match self.cameras.get(index) {
            Some(camera) => {
                let camera = camera.clone();
                self.preview_camera(camera);
            }
            None => log::warn!("no camera at index {}", index),
        }
    }

    /// Starts previewing `camera`, replacing any running preview.
    ///
    /// The stream is opened through the camera's OS handle if one was recorded; otherwise
    /// through the first OS device whose label contains the camera's name. If that fails,
    /// the default video device is used. When nothing can be opened the error is kept in
    /// [`preview_error`](Self::preview_error); the camera list stays as it is.
    pub fn preview_camera(&mut self, camera: CameraDevice) {
        // the old stream has to be released before the device can be opened again
        if let Some(active) = self.preview.take() {
            log::debug!("stopping preview of {:?}", active.camera);
            active.preview.stop();
        }

        match self.open_stream(&camera) {
            Ok(stream) => {
                log::info!("previewing {:?}", camera);
                self.preview_error = None;
                self.preview = Some(ActivePreview {
                    camera,
                    preview: Preview::start(stream),
                });
            }
            Err(e) => {
                log::warn!("cannot preview {:?}: {}", camera, e);
                self.preview_error = Some(e.to_string());
            }
        }
    }

    pub fn close_preview(&mut self) {
        self.preview_error = None;
        if let Some(active) = self.preview.take() {
            active.preview.stop();
        }
    }

    /// Applies a host notification. A refresh request returns the job to run.
    pub fn handle(&mut self, event: HostEvent) -> Option<RefreshJob<S, M>> {
        match event {
            HostEvent::RefreshRequested => self.begin_refresh(),
            HostEvent::CameraSelected { camera } => {
                let camera = self.resolve_selection(camera);
                self.preview_camera(camera);
                None
            }
        }
    }

    pub fn view_model(&self) -> ViewModel {
        ViewModel {
            state: self.state.clone(),
            cameras: self.cameras.clone(),
            refreshing: self.refreshing,
            preview: self
                .live_preview()
                .map(|p| (p.camera.clone(), p.preview.overlay())),
            preview_error: self.preview_error(),
        }
    }

    /// The current list as an IPC answer.
    pub fn list_response(&self) -> ListResponse {
        match &self.state {
            ViewState::Loading => ListResponse {
                success: false,
                cameras: Vec::new(),
                error: Some(DISCOVERY_PENDING.to_string()),
            },
            ViewState::Error(message) => ListResponse {
                success: false,
                cameras: Vec::new(),
                error: Some(message.clone()),
            },
            _ => ListResponse {
                success: true,
                cameras: self.cameras.clone(),
                error: None,
            },
        }
    }

    /// Looks a host-selected record up in the current list, which carries the OS handle
    /// recorded by the merge. Records not in the list are used as they are.
    fn resolve_selection(&self, camera: CameraDevice) -> CameraDevice {
        let listed = self.cameras.iter().find(|cam| {
            cam.matches_ids(camera.vendor(), camera.product()) && cam.name() == camera.name()
        });
        match listed {
            // the host's record wins only if it knows a handle the list doesn't
            Some(cam) if cam.device_id().is_some() || camera.device_id().is_none() => cam.clone(),
            _ => camera,
        }
    }

    fn open_stream(&self, camera: &CameraDevice) -> Result<Box<dyn VideoStream>> {
        let media = self.discovery.media();

        let handle = match camera.device_id() {
            Some(id) => Some(id.to_string()),
            None => self.find_handle_by_name(camera.name()),
        };
        if let Some(handle) = handle {
            match media.open(&StreamRequest::Device(handle.clone())) {
                Ok(stream) => return Ok(stream),
                Err(e) => log::warn!("{}: {}, falling back to the default device", handle, e),
            }
        }

        media.open(&StreamRequest::Default)
    }

    fn find_handle_by_name(&self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        match self.discovery.media().enumerate() {
            Ok(devices) => devices
                .into_iter()
                .find(|info| info.label.to_lowercase().contains(&name))
                .map(|info| info.device_id),
            Err(e) => {
                log::warn!("OS video device list unavailable: {}", e);
                None
            }
        }
    }
}
