//! Capture-device mute gateway: directory trait + WASAPI / PulseAudio backends.
//!
//! Every [`MuteGateway`] call re-enumerates the active input endpoints, so
//! hot-plugged microphones are picked up on the next toggle. A failure on one
//! device never stops the attempt on the others.

use std::fmt;

#[derive(Debug)]
pub enum AudioError {
    /// Audio subsystem could not be initialized (COM, PulseAudio context).
    InitFailed(String),
    /// Listing the active capture endpoints failed.
    EnumerationFailed(String),
    /// A single device operation failed.
    OperationFailed(String),
    /// Mute was applied to `applied` devices but failed on the listed ones.
    PartialFailure {
        applied: usize,
        failed: Vec<DeviceFailure>,
    },
}

/// One device that rejected a mute change.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFailure {
    pub device: String,
    pub reason: String,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::InitFailed(e) => write!(f, "Audio init failed: {e}"),
            AudioError::EnumerationFailed(e) => write!(f, "Capture device enumeration failed: {e}"),
            AudioError::OperationFailed(e) => write!(f, "Audio operation failed: {e}"),
            AudioError::PartialFailure { applied, failed } => {
                write!(f, "Mute applied to {applied} device(s), failed on ")?;
                for (i, d) in failed.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} ({})", d.device, d.reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AudioError {}

pub type Result<T> = std::result::Result<T, AudioError>;

/// One active capture endpoint, valid for a single enumerate/apply cycle.
pub trait CaptureDevice {
    /// Human-readable device name.
    fn name(&self) -> String;
    fn set_muted(&self, muted: bool) -> Result<()>;
    fn is_muted(&self) -> Result<bool>;
}

/// Source of active capture endpoints.
pub trait CaptureDirectory {
    /// Enumerate the currently active input endpoints. Never cached.
    fn active_devices(&self) -> Result<Vec<Box<dyn CaptureDevice>>>;
}

/// Mute flag of one device as read by [`MuteGateway::read_mute`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMuteState {
    pub name: String,
    pub muted: bool,
}

/// Applies and reads the mute flag across every active capture device.
pub struct MuteGateway {
    directory: Box<dyn CaptureDirectory>,
}

impl MuteGateway {
    pub fn new(directory: Box<dyn CaptureDirectory>) -> Self {
        MuteGateway { directory }
    }

    /// Set the mute flag on every active capture device.
    ///
    /// Returns the number of devices changed. When some devices fail, the
    /// others are still attempted and the result is
    /// [`AudioError::PartialFailure`] naming the failed ones.
    pub fn set_mute(&self, muted: bool) -> Result<usize> {
        let devices = self.directory.active_devices()?;
        let mut applied = 0;
        let mut failed = Vec::new();

        for device in &devices {
            match device.set_muted(muted) {
                Ok(()) => applied += 1,
                Err(e) => {
                    let name = device.name();
                    log::warn!("[audio] set_mute({muted}) failed on {name}: {e}");
                    failed.push(DeviceFailure {
                        device: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failed.is_empty() {
            log::debug!("[audio] mute={muted} applied to {applied} device(s)");
            Ok(applied)
        } else {
            Err(AudioError::PartialFailure { applied, failed })
        }
    }

    /// Read the current mute flag of every active capture device.
    pub fn read_mute(&self) -> Result<Vec<DeviceMuteState>> {
        self.directory
            .active_devices()?
            .iter()
            .map(|d| {
                Ok(DeviceMuteState {
                    name: d.name(),
                    muted: d.is_muted()?,
                })
            })
            .collect()
    }
}

/// `true` when at least one device exists and every device is muted.
pub fn all_muted(states: &[DeviceMuteState]) -> bool {
    !states.is_empty() && states.iter().all(|s| s.muted)
}

// ── Windows WASAPI implementation ──

#[cfg(windows)]
mod wasapi {
    use super::*;

    use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
    use windows::Win32::Media::Audio::Endpoints::*;
    use windows::Win32::Media::Audio::*;
    use windows::Win32::System::Com::STGM_READ;
    use windows::Win32::System::Com::*;
    use windows::Win32::System::Variant::VT_LPWSTR;

    pub struct WasapiDirectory {
        enumerator: IMMDeviceEnumerator,
    }

    impl WasapiDirectory {
        /// Caller must ensure COM is initialized on this thread.
        pub fn new() -> Result<Self> {
            let enumerator: IMMDeviceEnumerator =
                unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                    .map_err(|e| AudioError::InitFailed(format!("MMDeviceEnumerator: {e}")))?;
            Ok(WasapiDirectory { enumerator })
        }
    }

    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let prop = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            if prop.Anonymous.Anonymous.vt == VT_LPWSTR {
                prop.Anonymous.Anonymous.Anonymous.pwszVal.to_string().ok()
            } else {
                None
            }
        }
    }

    struct WasapiDevice {
        name: String,
        volume: IAudioEndpointVolume,
    }

    impl CaptureDevice for WasapiDevice {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn set_muted(&self, muted: bool) -> Result<()> {
            unsafe {
                self.volume
                    .SetMute(muted, std::ptr::null())
                    .map_err(|e| AudioError::OperationFailed(format!("SetMute: {e}")))
            }
        }

        fn is_muted(&self) -> Result<bool> {
            unsafe {
                self.volume
                    .GetMute()
                    .map(|b| b.as_bool())
                    .map_err(|e| AudioError::OperationFailed(format!("GetMute: {e}")))
            }
        }
    }

    impl CaptureDirectory for WasapiDirectory {
        fn active_devices(&self) -> Result<Vec<Box<dyn CaptureDevice>>> {
            unsafe {
                let collection = self
                    .enumerator
                    .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                    .map_err(|e| AudioError::EnumerationFailed(format!("EnumAudioEndpoints: {e}")))?;
                let count = collection
                    .GetCount()
                    .map_err(|e| AudioError::EnumerationFailed(format!("GetCount: {e}")))?;

                let mut devices: Vec<Box<dyn CaptureDevice>> = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let device = match collection.Item(i) {
                        Ok(d) => d,
                        Err(e) => {
                            log::warn!("[audio] endpoint {i} unavailable: {e}");
                            continue;
                        }
                    };
                    let name = friendly_name(&device).unwrap_or_else(|| format!("Capture device {i}"));
                    match device.Activate::<IAudioEndpointVolume>(CLSCTX_ALL, None) {
                        Ok(volume) => devices.push(Box::new(WasapiDevice { name, volume })),
                        Err(e) => log::warn!("[audio] {name}: IAudioEndpointVolume: {e}"),
                    }
                }
                Ok(devices)
            }
        }
    }

    /// Initialize COM for the current thread (apartment-threaded).
    pub fn com_init() -> Result<()> {
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(|e| AudioError::InitFailed(format!("CoInitializeEx: {e}")))
        }
    }
}

#[cfg(windows)]
pub use wasapi::{WasapiDirectory, com_init};

// ── Linux PulseAudio implementation ──

#[cfg(target_os = "linux")]
mod pulse {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use libpulse_binding::callbacks::ListResult;
    use libpulse_binding::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
    use libpulse_binding::mainloop::threaded::Mainloop;
    use libpulse_binding::operation::{Operation, State as OperationState};

    /// Upper bound on a single introspection round trip.
    const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

    struct PulseInner {
        mainloop: Mainloop,
        context: Context,
    }

    impl PulseInner {
        /// Poll an operation until it leaves the Running state.
        fn wait<F: ?Sized>(&mut self, op: &Operation<F>) -> Result<()> {
            let deadline = Instant::now() + OPERATION_TIMEOUT;
            loop {
                self.mainloop.lock();
                let state = op.get_state();
                self.mainloop.unlock();
                match state {
                    OperationState::Done => return Ok(()),
                    OperationState::Cancelled => {
                        return Err(AudioError::OperationFailed(
                            "PulseAudio operation cancelled".into(),
                        ));
                    }
                    OperationState::Running if Instant::now() >= deadline => {
                        return Err(AudioError::OperationFailed(
                            "PulseAudio operation timed out".into(),
                        ));
                    }
                    OperationState::Running => std::thread::sleep(Duration::from_millis(5)),
                }
            }
        }
    }

    /// PulseAudio/PipeWire source directory. Monitor sources are excluded.
    pub struct PulseDirectory {
        inner: Rc<RefCell<PulseInner>>,
    }

    #[derive(Debug, Clone)]
    struct SourceEntry {
        index: u32,
        name: String,
        muted: bool,
    }

    impl PulseDirectory {
        pub fn new() -> Result<Self> {
            let mut mainloop = Mainloop::new().ok_or_else(|| {
                AudioError::InitFailed("PulseAudio mainloop creation failed".into())
            })?;

            let mut context = Context::new(&mainloop, "hushkey").ok_or_else(|| {
                AudioError::InitFailed("PulseAudio context creation failed".into())
            })?;

            context
                .connect(None, ContextFlagSet::NOFLAGS, None)
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio connect: {e}")))?;

            mainloop
                .start()
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio mainloop start: {e}")))?;

            // Wait for context to be ready
            loop {
                mainloop.lock();
                let state = context.get_state();
                mainloop.unlock();
                match state {
                    ContextState::Ready => break,
                    ContextState::Failed | ContextState::Terminated => {
                        return Err(AudioError::InitFailed(
                            "PulseAudio context connection failed".into(),
                        ));
                    }
                    _ => {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            Ok(PulseDirectory {
                inner: Rc::new(RefCell::new(PulseInner { mainloop, context })),
            })
        }

        fn list_sources(&self) -> Result<Vec<SourceEntry>> {
            let mut inner = self.inner.borrow_mut();
            let entries: Arc<Mutex<Vec<SourceEntry>>> = Arc::new(Mutex::new(Vec::new()));

            inner.mainloop.lock();
            let sink = Arc::clone(&entries);
            let op = inner
                .context
                .introspect()
                .get_source_info_list(move |result| {
                    if let ListResult::Item(info) = result {
                        if info.monitor_of_sink.is_some() {
                            return;
                        }
                        let name = info
                            .description
                            .as_ref()
                            .or(info.name.as_ref())
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| format!("Source {}", info.index));
                        if let Ok(mut list) = sink.lock() {
                            list.push(SourceEntry {
                                index: info.index,
                                name,
                                muted: info.mute,
                            });
                        }
                    }
                });
            inner.mainloop.unlock();

            inner
                .wait(&op)
                .map_err(|e| AudioError::EnumerationFailed(e.to_string()))?;

            entries
                .lock()
                .map(|list| list.clone())
                .map_err(|e| AudioError::EnumerationFailed(format!("source list poisoned: {e}")))
        }
    }

    struct PulseSource {
        entry: SourceEntry,
        inner: Rc<RefCell<PulseInner>>,
    }

    impl CaptureDevice for PulseSource {
        fn name(&self) -> String {
            self.entry.name.clone()
        }

        fn set_muted(&self, muted: bool) -> Result<()> {
            let mut inner = self.inner.borrow_mut();
            let success = Arc::new(Mutex::new(false));

            inner.mainloop.lock();
            let flag = Arc::clone(&success);
            let op = inner.context.introspect().set_source_mute_by_index(
                self.entry.index,
                muted,
                Some(Box::new(move |ok| {
                    if let Ok(mut f) = flag.lock() {
                        *f = ok;
                    }
                })),
            );
            inner.mainloop.unlock();

            inner.wait(&op)?;
            if success.lock().map(|f| *f).unwrap_or(false) {
                Ok(())
            } else {
                Err(AudioError::OperationFailed(format!(
                    "set_source_mute_by_index({}) rejected",
                    self.entry.index
                )))
            }
        }

        fn is_muted(&self) -> Result<bool> {
            Ok(self.entry.muted)
        }
    }

    impl CaptureDirectory for PulseDirectory {
        fn active_devices(&self) -> Result<Vec<Box<dyn CaptureDevice>>> {
            Ok(self
                .list_sources()?
                .into_iter()
                .map(|entry| {
                    Box::new(PulseSource {
                        entry,
                        inner: Rc::clone(&self.inner),
                    }) as Box<dyn CaptureDevice>
                })
                .collect())
        }
    }

    impl Drop for PulseDirectory {
        fn drop(&mut self) {
            if let Ok(mut inner) = self.inner.try_borrow_mut() {
                inner.mainloop.lock();
                inner.context.disconnect();
                inner.mainloop.unlock();
                inner.mainloop.stop();
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use pulse::PulseDirectory;

/// The capture directory for the current platform.
///
/// On Windows the caller must have initialized COM (see `com_init`).
pub fn platform_directory() -> Result<Box<dyn CaptureDirectory>> {
    #[cfg(windows)]
    {
        Ok(Box::new(WasapiDirectory::new()?))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(PulseDirectory::new()?))
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        Err(AudioError::InitFailed(
            "no audio backend for this platform".into(),
        ))
    }
}

// ── Test stub ──

/// Scriptable [`CaptureDirectory`] for unit and integration tests.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the gateway owns another. Devices can be hot-plugged and told to fail.
pub mod stub {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    struct StubDeviceState {
        name: String,
        muted: bool,
        fail: bool,
    }

    #[derive(Debug, Default)]
    struct StubState {
        devices: Vec<StubDeviceState>,
        fail_enumeration: bool,
        enumerations: usize,
    }

    #[derive(Debug, Clone, Default)]
    pub struct StubDirectory {
        state: Rc<RefCell<StubState>>,
    }

    impl StubDirectory {
        /// A directory with the named devices, all unmuted.
        pub fn with_devices(names: &[&str]) -> Self {
            let dir = Self::default();
            for name in names {
                dir.add_device(name);
            }
            dir
        }

        pub fn add_device(&self, name: &str) {
            self.state.borrow_mut().devices.push(StubDeviceState {
                name: name.to_string(),
                muted: false,
                fail: false,
            });
        }

        pub fn remove_device(&self, name: &str) {
            self.state.borrow_mut().devices.retain(|d| d.name != name);
        }

        /// Make `set_muted` fail on the named device.
        pub fn fail_device(&self, name: &str, fail: bool) {
            if let Some(d) = self
                .state
                .borrow_mut()
                .devices
                .iter_mut()
                .find(|d| d.name == name)
            {
                d.fail = fail;
            }
        }

        pub fn fail_enumeration(&self, fail: bool) {
            self.state.borrow_mut().fail_enumeration = fail;
        }

        /// Mute flag of the named device, `None` if absent.
        pub fn muted(&self, name: &str) -> Option<bool> {
            self.state
                .borrow()
                .devices
                .iter()
                .find(|d| d.name == name)
                .map(|d| d.muted)
        }

        /// Mute flags of all devices in insertion order.
        pub fn flags(&self) -> Vec<bool> {
            self.state.borrow().devices.iter().map(|d| d.muted).collect()
        }

        /// How many times `active_devices` has been called.
        pub fn enumerations(&self) -> usize {
            self.state.borrow().enumerations
        }
    }

    struct StubDevice {
        index: usize,
        name: String,
        state: Rc<RefCell<StubState>>,
    }

    impl CaptureDevice for StubDevice {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn set_muted(&self, muted: bool) -> Result<()> {
            let mut state = self.state.borrow_mut();
            let device = state
                .devices
                .get_mut(self.index)
                .ok_or_else(|| AudioError::OperationFailed("device removed".into()))?;
            if device.fail {
                return Err(AudioError::OperationFailed("injected failure".into()));
            }
            device.muted = muted;
            Ok(())
        }

        fn is_muted(&self) -> Result<bool> {
            self.state
                .borrow()
                .devices
                .get(self.index)
                .map(|d| d.muted)
                .ok_or_else(|| AudioError::OperationFailed("device removed".into()))
        }
    }

    impl CaptureDirectory for StubDirectory {
        fn active_devices(&self) -> Result<Vec<Box<dyn CaptureDevice>>> {
            let mut state = self.state.borrow_mut();
            state.enumerations += 1;
            if state.fail_enumeration {
                return Err(AudioError::EnumerationFailed("injected failure".into()));
            }
            Ok(state
                .devices
                .iter()
                .enumerate()
                .map(|(index, d)| {
                    Box::new(StubDevice {
                        index,
                        name: d.name.clone(),
                        state: Rc::clone(&self.state),
                    }) as Box<dyn CaptureDevice>
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubDirectory;
    use super::*;

    fn gateway(dir: &StubDirectory) -> MuteGateway {
        MuteGateway::new(Box::new(dir.clone()))
    }

    #[test]
    fn set_mute_applies_to_every_device() {
        let dir = StubDirectory::with_devices(&["Headset", "Webcam", "USB Mic"]);
        let gw = gateway(&dir);
        assert_eq!(gw.set_mute(true).unwrap(), 3);
        assert_eq!(dir.flags(), vec![true, true, true]);
        assert_eq!(gw.set_mute(false).unwrap(), 3);
        assert_eq!(dir.flags(), vec![false, false, false]);
    }

    #[test]
    fn set_mute_with_no_devices_is_ok() {
        let dir = StubDirectory::default();
        assert_eq!(gateway(&dir).set_mute(true).unwrap(), 0);
    }

    #[test]
    fn partial_failure_continues_and_names_failed_device() {
        let dir = StubDirectory::with_devices(&["Headset", "Webcam", "USB Mic"]);
        dir.fail_device("Webcam", true);
        let err = gateway(&dir).set_mute(true).unwrap_err();

        match err {
            AudioError::PartialFailure { applied, ref failed } => {
                assert_eq!(applied, 2);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].device, "Webcam");
            }
            ref other => panic!("expected PartialFailure, got {other:?}"),
        }
        assert_eq!(dir.muted("Headset"), Some(true));
        assert_eq!(dir.muted("Webcam"), Some(false));
        assert_eq!(dir.muted("USB Mic"), Some(true));
        assert!(err.to_string().contains("Webcam (Audio operation failed: injected failure)"));
    }

    #[test]
    fn enumeration_failure_is_reported() {
        let dir = StubDirectory::with_devices(&["Headset"]);
        dir.fail_enumeration(true);
        let err = gateway(&dir).set_mute(true).unwrap_err();
        assert!(matches!(err, AudioError::EnumerationFailed(_)));
    }

    #[test]
    fn every_call_re_enumerates() {
        let dir = StubDirectory::with_devices(&["Headset"]);
        let gw = gateway(&dir);
        gw.set_mute(true).unwrap();
        dir.add_device("Hot-plugged");
        assert_eq!(gw.set_mute(true).unwrap(), 2);
        assert_eq!(dir.muted("Hot-plugged"), Some(true));
        dir.remove_device("Headset");
        assert_eq!(gw.set_mute(false).unwrap(), 1);
        assert_eq!(dir.enumerations(), 3);
    }

    #[test]
    fn read_mute_reports_each_device() {
        let dir = StubDirectory::with_devices(&["A", "B"]);
        let gw = gateway(&dir);
        dir.fail_device("B", true);
        let _ = gw.set_mute(true);
        let states = gw.read_mute().unwrap();
        assert_eq!(
            states,
            vec![
                DeviceMuteState { name: "A".into(), muted: true },
                DeviceMuteState { name: "B".into(), muted: false },
            ]
        );
        assert!(!all_muted(&states));
    }

    #[test]
    fn all_muted_requires_devices() {
        assert!(!all_muted(&[]));
        assert!(all_muted(&[DeviceMuteState { name: "A".into(), muted: true }]));
    }
}
