use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use core_graphics::display::{CGDirectDisplayID, CGDisplayBounds, CGMainDisplayID};
use objc2::MainThreadMarker;
use objc2_app_kit::NSScreen;

pub type DisplayId = u32;

/// Opaque CGDisplayConfigRef
pub type DisplayConfigRef = *mut c_void;

/// CGConfigureOption values
pub const CONFIGURE_FOR_SESSION: u32 = 1;
pub const CONFIGURE_PERMANENTLY: u32 = 2;

/// kCGErrorFailure
pub const CG_ERROR_FAILURE: i32 = 1000;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGDisplayRegisterReconfigurationCallback(
        callback: unsafe extern "C" fn(CGDirectDisplayID, u32, *mut c_void),
        user_info: *mut c_void,
    ) -> i32;
    fn CGDisplayRemoveReconfigurationCallback(
        callback: unsafe extern "C" fn(CGDirectDisplayID, u32, *mut c_void),
        user_info: *mut c_void,
    ) -> i32;
    fn CGGetOnlineDisplayList(
        max_displays: u32,
        online_displays: *mut CGDirectDisplayID,
        display_count: *mut u32,
    ) -> i32;
    fn CGDisplayIsBuiltin(display: CGDirectDisplayID) -> u32;
    fn CGDisplayIsInMirrorSet(display: CGDirectDisplayID) -> u32;
    fn CGDisplayVendorNumber(display: CGDirectDisplayID) -> u32;
    fn CGDisplayModelNumber(display: CGDirectDisplayID) -> u32;
    fn CGBeginDisplayConfiguration(config: *mut DisplayConfigRef) -> i32;
    fn CGConfigureDisplayOrigin(
        config: DisplayConfigRef,
        display: CGDirectDisplayID,
        x: i32,
        y: i32,
    ) -> i32;
    fn CGCompleteDisplayConfiguration(config: DisplayConfigRef, option: u32) -> i32;
    fn CGCancelDisplayConfiguration(config: DisplayConfigRef) -> i32;
}

#[derive(Debug, Clone)]
pub struct DisplayReconfigEvent {
    pub display_id: DisplayId,
    pub flags: u32,
}

// CoreGraphics gives the callback no typed context, so the sender lives here.
// Cleared by unregister so late callbacks are dropped.
static DISPLAY_RECONFIG_TX: Mutex<Option<Sender<DisplayReconfigEvent>>> = Mutex::new(None);

extern "C" fn display_reconfig_callback(
    display_id: CGDirectDisplayID,
    flags: u32,
    _user_info: *mut c_void,
) {
    let Ok(slot) = DISPLAY_RECONFIG_TX.lock() else {
        return;
    };
    if let Some(tx) = slot.as_ref() {
        let _ = tx.send(DisplayReconfigEvent { display_id, flags });
    }
}

pub fn register_display_callback(tx: Sender<DisplayReconfigEvent>) -> anyhow::Result<()> {
    {
        let mut slot = DISPLAY_RECONFIG_TX
            .lock()
            .map_err(|_| anyhow::anyhow!("Display callback slot poisoned"))?;
        if slot.is_some() {
            anyhow::bail!("Display callback already registered");
        }
        *slot = Some(tx);
    }

    let result = unsafe {
        CGDisplayRegisterReconfigurationCallback(display_reconfig_callback, std::ptr::null_mut())
    };

    if result != 0 {
        if let Ok(mut slot) = DISPLAY_RECONFIG_TX.lock() {
            slot.take();
        }
        anyhow::bail!("Failed to register display callback: {}", result);
    }

    tracing::info!("Display reconfiguration callback registered");
    Ok(())
}

pub fn unregister_display_callback() {
    let result = unsafe {
        CGDisplayRemoveReconfigurationCallback(display_reconfig_callback, std::ptr::null_mut())
    };
    if result != 0 {
        tracing::warn!("Failed to remove display callback: {}", result);
    }
    if let Ok(mut slot) = DISPLAY_RECONFIG_TX.lock() {
        slot.take();
    }
    tracing::info!("Display reconfiguration callback removed");
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub name: String,
    pub frame: Bounds,
    pub is_main: bool,
    pub is_builtin: bool,
    pub vendor: u32,
    pub model: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub fn get_all_displays() -> Vec<DisplayInfo> {
    let display_ids = get_active_display_ids();
    if display_ids.is_empty() {
        return Vec::new();
    }

    let main_display_id = unsafe { CGMainDisplayID() };

    // Get display names from NSScreen (names don't change with resolution)
    let display_names = get_display_names();

    display_ids
        .iter()
        .map(|&display_id| {
            let name = display_names
                .get(&display_id)
                .cloned()
                .unwrap_or_else(|| format!("Display {}", display_id));

            DisplayInfo {
                id: display_id,
                name,
                frame: get_display_bounds(display_id),
                is_main: display_id == main_display_id,
                is_builtin: unsafe { CGDisplayIsBuiltin(display_id) } != 0,
                vendor: unsafe { CGDisplayVendorNumber(display_id) },
                model: unsafe { CGDisplayModelNumber(display_id) },
            }
        })
        .collect()
}

/// Whether any online display is part of a mirror set.
/// Uses the online list because mirrored secondaries are not reported as active.
pub fn is_mirroring_active() -> bool {
    get_online_display_ids()
        .iter()
        .any(|&id| unsafe { CGDisplayIsInMirrorSet(id) } != 0)
}

/// Get display names from NSScreen (best effort, may be cached but names don't change)
fn get_display_names() -> HashMap<DisplayId, String> {
    let Some(mtm) = MainThreadMarker::new() else {
        return HashMap::new();
    };
    let screens = NSScreen::screens(mtm);

    screens
        .iter()
        .filter_map(|screen| {
            let display_id = get_display_id_for_screen(&screen)?;
            let name = screen.localizedName().to_string();
            Some((display_id, name))
        })
        .collect()
}

fn get_display_id_for_screen(screen: &NSScreen) -> Option<DisplayId> {
    use objc2_foundation::NSNumber;

    let desc = screen.deviceDescription();
    let key = objc2_foundation::ns_string!("NSScreenNumber");
    let value = desc.objectForKey(key)?;

    // The value is an NSNumber containing the CGDirectDisplayID
    let number: &NSNumber = unsafe { &*(&*value as *const _ as *const NSNumber) };
    Some(number.unsignedIntValue())
}

const MAX_DISPLAYS: u32 = 16;

/// Get active display IDs using Core Graphics directly.
/// Unlike NSScreen::screens(), this doesn't depend on NSApplication's event loop.
pub fn get_active_display_ids() -> Vec<DisplayId> {
    use core_graphics::display::CGGetActiveDisplayList;

    let mut display_ids: [u32; MAX_DISPLAYS as usize] = [0; MAX_DISPLAYS as usize];
    let mut display_count: u32 = 0;

    let result = unsafe {
        CGGetActiveDisplayList(MAX_DISPLAYS, display_ids.as_mut_ptr(), &mut display_count)
    };

    if result != 0 {
        tracing::warn!("CGGetActiveDisplayList failed: {}", result);
        return Vec::new();
    }

    display_ids[..display_count as usize].to_vec()
}

fn get_online_display_ids() -> Vec<DisplayId> {
    let mut display_ids: [u32; MAX_DISPLAYS as usize] = [0; MAX_DISPLAYS as usize];
    let mut display_count: u32 = 0;

    let result = unsafe {
        CGGetOnlineDisplayList(MAX_DISPLAYS, display_ids.as_mut_ptr(), &mut display_count)
    };

    if result != 0 {
        tracing::warn!("CGGetOnlineDisplayList failed: {}", result);
        return Vec::new();
    }

    display_ids[..display_count as usize].to_vec()
}

/// Get display bounds in Core Graphics coordinates using CGDisplayBounds.
fn get_display_bounds(display_id: DisplayId) -> Bounds {
    let rect = unsafe { CGDisplayBounds(display_id) };
    Bounds {
        x: rect.origin.x,
        y: rect.origin.y,
        width: rect.size.width,
        height: rect.size.height,
    }
}

pub fn begin_configuration() -> Result<DisplayConfigRef, i32> {
    let mut config: DisplayConfigRef = std::ptr::null_mut();
    let result = unsafe { CGBeginDisplayConfiguration(&mut config) };
    if result != 0 {
        return Err(result);
    }
    if config.is_null() {
        return Err(CG_ERROR_FAILURE);
    }
    Ok(config)
}

pub fn configure_display_origin(
    config: DisplayConfigRef,
    display_id: DisplayId,
    x: i32,
    y: i32,
) -> Result<(), i32> {
    match unsafe { CGConfigureDisplayOrigin(config, display_id, x, y) } {
        0 => Ok(()),
        err => Err(err),
    }
}

pub fn complete_configuration(config: DisplayConfigRef, option: u32) -> Result<(), i32> {
    match unsafe { CGCompleteDisplayConfiguration(config, option) } {
        0 => Ok(()),
        err => Err(err),
    }
}

pub fn cancel_configuration(config: DisplayConfigRef) {
    let result = unsafe { CGCancelDisplayConfiguration(config) };
    if result != 0 {
        tracing::warn!("CGCancelDisplayConfiguration failed: {}", result);
    }
}
