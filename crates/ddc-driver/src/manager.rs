//! Device registry and lifetime
//!
//! The [`DeviceManager`] owns every registered [`DdcDevice`] under a
//! `ddc:N` identifier, always the smallest free one. Handles are
//! [`DeviceRef`]s: each clone bumps an explicit reference count and the last
//! drop runs the release hook, which returns the identifier to the pool.
//! The registry itself holds one reference per device until the device is
//! unregistered or the manager is torn down.
//!
//! [`DeviceManager::open`] hands out a [`DeviceSession`], an exclusive
//! claim on a device; a second open while one is held fails with
//! `DeviceBusy`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use crate::device::DdcDevice;
use crate::error::{DdcError, Result};
use crate::topology::{ClockGraph, ClockTopology};

type ReleaseHook = Box<dyn FnOnce(usize) + Send>;

#[derive(Debug, Default)]
struct Registry {
    live: bool,
    ids: BTreeSet<usize>,
    devices: BTreeMap<usize, DeviceRef>,
}

struct Shared {
    id: usize,
    device: DdcDevice,
    refs: AtomicUsize,
    busy: AtomicBool,
    release: Mutex<Option<ReleaseHook>>,
}

/// Registry of live devices
#[derive(Debug)]
pub struct DeviceManager {
    capacity: usize,
    clocks: ClockGraph,
    registry: Arc<Mutex<Registry>>,
}

impl DeviceManager {
    /// Create a registry for up to `capacity` devices and resolve the clock
    /// topology they share.
    ///
    /// # Errors
    ///
    /// Topology resolution errors (see [`ClockTopology::resolve`]).
    pub fn init(capacity: usize, topology: &ClockTopology) -> Result<Self> {
        let clocks = topology.resolve()?;
        info!(
            "Device manager ready: {capacity} slots, {} clock edges",
            clocks.edges().len()
        );
        Ok(Self {
            capacity,
            clocks,
            registry: Arc::new(Mutex::new(Registry {
                live: true,
                ..Registry::default()
            })),
        })
    }

    /// Resolved clock topology
    #[must_use]
    pub const fn clocks(&self) -> &ClockGraph {
        &self.clocks
    }

    /// Maximum number of devices
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a device under the smallest free identifier.
    ///
    /// # Errors
    ///
    /// `RegistryFull` if every identifier is taken, `InvalidArgument` after
    /// [`teardown`](Self::teardown).
    pub fn register(&self, device: DdcDevice) -> Result<DeviceRef> {
        let mut registry = lock(&self.registry);
        if !registry.live {
            return Err(DdcError::invalid_argument("device manager torn down"));
        }

        let id = (0..self.capacity)
            .find(|id| !registry.ids.contains(id))
            .ok_or(DdcError::RegistryFull {
                capacity: self.capacity,
            })?;
        registry.ids.insert(id);

        let pool = Arc::downgrade(&self.registry);
        let handle = DeviceRef::new(id, device, Box::new(move |id| release_id(&pool, id)));
        registry.devices.insert(id, handle.clone());

        info!("Registered ddc:{id} ({})", handle.backend_type());
        Ok(handle)
    }

    /// Shared handle to a registered device.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if `id` is not registered.
    pub fn get(&self, id: usize) -> Result<DeviceRef> {
        lock(&self.registry)
            .devices
            .get(&id)
            .cloned()
            .ok_or(DdcError::DeviceNotFound { id })
    }

    /// Claim a device exclusively.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if `id` is not registered, `DeviceBusy` if a session
    /// is already open.
    pub fn open(&self, id: usize) -> Result<DeviceSession> {
        self.get(id)?.claim()
    }

    /// First registered device, claimed exclusively.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if nothing is registered, `DeviceBusy` as for
    /// [`open`](Self::open).
    pub fn open_first(&self) -> Result<DeviceSession> {
        let first = lock(&self.registry).devices.keys().next().copied();
        self.open(first.ok_or(DdcError::DeviceNotFound { id: 0 })?)
    }

    /// Identifiers of registered devices, ascending
    #[must_use]
    pub fn devices(&self) -> Vec<usize> {
        lock(&self.registry).devices.keys().copied().collect()
    }

    /// Drop the registry's reference to `id`. The identifier is freed once
    /// every outstanding handle is gone.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if `id` is not registered.
    pub fn unregister(&self, id: usize) -> Result<()> {
        let removed = lock(&self.registry).devices.remove(&id);
        match removed {
            Some(handle) => {
                debug!("Unregistered ddc:{id}, {} handles remain", handle.ref_count() - 1);
                drop(handle);
                Ok(())
            }
            None => Err(DdcError::DeviceNotFound { id }),
        }
    }

    /// Unregister every device and refuse further registrations.
    pub fn teardown(&self) {
        let devices = {
            let mut registry = lock(&self.registry);
            if !registry.live {
                return;
            }
            registry.live = false;
            std::mem::take(&mut registry.devices)
        };
        info!("Device manager teardown: {} devices", devices.len());
        // Handles drop here, outside the registry lock the release hooks take.
        drop(devices);
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn release_id(pool: &Weak<Mutex<Registry>>, id: usize) {
    if let Some(registry) = pool.upgrade() {
        lock(&registry).ids.remove(&id);
    }
    info!("Released ddc:{id}");
}

/// Counted handle to a registered device
pub struct DeviceRef {
    shared: Arc<Shared>,
}

impl DeviceRef {
    fn new(id: usize, device: DdcDevice, release: ReleaseHook) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                device,
                refs: AtomicUsize::new(1),
                busy: AtomicBool::new(false),
                release: Mutex::new(Some(release)),
            }),
        }
    }

    /// Device identifier
    #[must_use]
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// `ddc:N` name
    #[must_use]
    pub fn name(&self) -> String {
        format!("ddc:{}", self.shared.id)
    }

    /// Live handles, including the registry's own
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }

    /// True while a [`DeviceSession`] is open
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Claim this device exclusively.
    ///
    /// # Errors
    ///
    /// `DeviceBusy` if a session is already open.
    pub fn claim(self) -> Result<DeviceSession> {
        self.shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DdcError::DeviceBusy { id: self.id() })?;
        debug!("Opened ddc:{}", self.id());
        Ok(DeviceSession { device: self })
    }
}

impl Clone for DeviceRef {
    fn clone(&self) -> Self {
        self.shared.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for DeviceRef {
    fn drop(&mut self) {
        if self.shared.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let hook = self
            .shared
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook(self.shared.id);
        }
    }
}

impl Deref for DeviceRef {
    type Target = DdcDevice;

    fn deref(&self) -> &DdcDevice {
        &self.shared.device
    }
}

impl fmt::Debug for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRef")
            .field("id", &self.shared.id)
            .field("refs", &self.ref_count())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Exclusive claim on a device, released on drop
#[derive(Debug)]
pub struct DeviceSession {
    device: DeviceRef,
}

impl DeviceSession {
    /// Shared handle behind this session
    #[must_use]
    pub const fn handle(&self) -> &DeviceRef {
        &self.device
    }
}

impl Deref for DeviceSession {
    type Target = DdcDevice;

    fn deref(&self) -> &DdcDevice {
        &self.device
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.device.shared.busy.store(false, Ordering::Release);
        debug!("Closed ddc:{}", self.device.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareRegisters;
    use crate::config::DeviceConfig;
    use crate::error::ErrorKind;

    fn device() -> DdcDevice {
        DdcDevice::attach(Arc::new(SoftwareRegisters::new()), DeviceConfig::default())
    }

    fn manager(capacity: usize) -> DeviceManager {
        DeviceManager::init(capacity, &ClockTopology::new()).unwrap()
    }

    #[test]
    fn smallest_free_id() {
        let mgr = manager(4);
        let a = mgr.register(device()).unwrap();
        let b = mgr.register(device()).unwrap();
        assert_eq!((a.id(), b.id()), (0, 1));
        assert_eq!(b.name(), "ddc:1");

        drop(a);
        mgr.unregister(0).unwrap();
        let c = mgr.register(device()).unwrap();
        assert_eq!(c.id(), 0);
        assert_eq!(mgr.devices(), vec![0, 1]);
    }

    #[test]
    fn id_held_until_last_handle_drops() {
        let mgr = manager(1);
        let a = mgr.register(device()).unwrap();
        let extra = a.clone();
        assert_eq!(a.ref_count(), 3);
        mgr.unregister(0).unwrap();
        drop(a);

        let err = mgr.register(device()).unwrap_err();
        assert!(matches!(err, DdcError::RegistryFull { capacity: 1 }));

        drop(extra);
        assert_eq!(mgr.register(device()).unwrap().id(), 0);
    }

    #[test]
    fn release_hook_fires_once() {
        use std::sync::atomic::AtomicU32;
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let handle = DeviceRef::new(
            7,
            device(),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let clones: Vec<DeviceRef> = (0..3).map(|_| handle.clone()).collect();
        drop(handle);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        drop(clones);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exclusive_open() {
        let mgr = manager(2);
        let _dev = mgr.register(device()).unwrap();
        let session = mgr.open(0).unwrap();
        assert!(session.handle().is_busy());
        let err = mgr.open(0).unwrap_err();
        assert!(matches!(err, DdcError::DeviceBusy { id: 0 }));
        drop(session);
        assert!(mgr.open_first().is_ok());
    }

    #[test]
    fn unknown_ids() {
        let mgr = manager(2);
        assert!(matches!(mgr.get(5), Err(DdcError::DeviceNotFound { id: 5 })));
        assert!(mgr.open_first().is_err());
        assert!(mgr.unregister(0).is_err());
    }

    #[test]
    fn teardown_refuses_registration() {
        let mgr = manager(2);
        let kept = mgr.register(device()).unwrap();
        mgr.teardown();
        assert!(mgr.devices().is_empty());
        assert_eq!(
            mgr.register(device()).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        // outstanding handles stay usable
        assert_eq!(kept.read_profile(0), b"TBD");
        assert_eq!(kept.ref_count(), 1);
    }
}
