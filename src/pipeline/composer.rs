//! Hardware composition of surface layers through the HDI device.
//!
//! Every HDI call is synchronous. A non-success status means the operation
//! did not happen; the adapter gives up on that screen for the frame and
//! returns the status to its caller without retrying.

use std::collections::HashMap;

use thiserror::Error;

use crate::common::{NodeId, RectI};

use super::render_node::SurfaceBuffer;

/// Non-success HDI status.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("display operation failed")]
    Failure,
    #[error("display file handle error")]
    FdErr,
    #[error("invalid display parameter")]
    ParamErr,
    #[error("null display object")]
    NullPtr,
    #[error("display operation not supported")]
    NotSupport,
    #[error("display out of memory")]
    NoMem,
    #[error("display system busy")]
    SysBusy,
    #[error("display operation not permitted")]
    NotPerm,
}

impl DisplayError {
    /// Integer status as reported by the device.
    pub fn code(self) -> i32 {
        match self {
            DisplayError::Failure => -1,
            DisplayError::FdErr => -2,
            DisplayError::ParamErr => -3,
            DisplayError::NullPtr => -4,
            DisplayError::NotSupport => -5,
            DisplayError::NoMem => -6,
            DisplayError::SysBusy => -7,
            DisplayError::NotPerm => -8,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -2 => DisplayError::FdErr,
            -3 => DisplayError::ParamErr,
            -4 => DisplayError::NullPtr,
            -5 => DisplayError::NotSupport,
            -6 => DisplayError::NoMem,
            -7 => DisplayError::SysBusy,
            -8 => DisplayError::NotPerm,
            _ => DisplayError::Failure,
        }
    }

    /// Map a raw device status to a result; `0` is success.
    pub fn check(status: i32) -> Result<(), DisplayError> {
        if status == 0 {
            Ok(())
        } else {
            Err(DisplayError::from_code(status))
        }
    }
}

/// Release fence returned by a commit; `-1` when there is nothing to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence(pub i32);

impl Fence {
    pub const NONE: Fence = Fence(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionType {
    /// Drawn by the drawing backend into the client framebuffer.
    Client,
    /// Scanned out directly by the display hardware.
    Device,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenCapability {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Hardware layers the screen can scan out at once.
    pub max_layers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMode {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

/// One surface to place on a screen.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub node: NodeId,
    pub zorder: u32,
    /// Absolute rectangle the layer covers.
    pub crop: RectI,
    pub buffer: Option<SurfaceBuffer>,
    pub composition_type: CompositionType,
}

/// Surface layers collected for one display node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenLayers {
    pub screen_id: u64,
    pub display_node: NodeId,
    pub layers: Vec<LayerInfo>,
}

/// The display hardware interface.
pub trait HdiDevice: Send {
    fn get_screen_capability(&self, screen_id: u64) -> Result<ScreenCapability, DisplayError>;
    fn get_screen_supported_modes(&self, screen_id: u64) -> Result<Vec<ScreenMode>, DisplayError>;
    /// Validate the layers set for this frame. Returns whether client
    /// composition into the framebuffer is needed.
    fn prepare_screen_layers(&mut self, screen_id: u64) -> Result<bool, DisplayError>;
    fn set_layer_buffer(
        &mut self,
        screen_id: u64,
        layer_id: u32,
        buffer: &SurfaceBuffer,
    ) -> Result<(), DisplayError>;
    fn set_layer_crop(&mut self, screen_id: u64, layer_id: u32, crop: RectI) -> Result<(), DisplayError>;
    fn set_layer_zorder(&mut self, screen_id: u64, layer_id: u32, zorder: u32) -> Result<(), DisplayError>;
    fn set_layer_composition_type(
        &mut self,
        screen_id: u64,
        layer_id: u32,
        composition_type: CompositionType,
    ) -> Result<(), DisplayError>;
    fn commit(&mut self, screen_id: u64) -> Result<Fence, DisplayError>;
}

/// Drives an [`HdiDevice`] with the layers of each frame.
pub struct ComposerAdapter {
    device: Box<dyn HdiDevice>,
    capabilities: HashMap<u64, ScreenCapability>,
}

impl ComposerAdapter {
    pub fn new(device: Box<dyn HdiDevice>) -> Self {
        Self {
            device,
            capabilities: HashMap::new(),
        }
    }

    pub fn device(&self) -> &dyn HdiDevice {
        self.device.as_ref()
    }

    /// Capability of a screen, queried once and cached.
    pub fn screen_capability(&mut self, screen_id: u64) -> Result<&ScreenCapability, DisplayError> {
        if !self.capabilities.contains_key(&screen_id) {
            let capability = self.device.get_screen_capability(screen_id)?;
            log::info!(
                "screen {screen_id} \"{}\": {}x{}, {} hardware layers",
                capability.name,
                capability.width,
                capability.height,
                capability.max_layers
            );
            self.capabilities.insert(screen_id, capability);
        }
        self.capabilities.get(&screen_id).ok_or(DisplayError::Failure)
    }

    /// Submit one screen's layers and commit. Layers beyond the screen's
    /// hardware layer count fall back to client composition.
    pub fn compose(&mut self, screen: &ScreenLayers) -> Result<Fence, DisplayError> {
        let screen_id = screen.screen_id;
        let max_layers = self.screen_capability(screen_id)?.max_layers as usize;

        for (layer_id, layer) in screen.layers.iter().enumerate() {
            let layer_id = layer_id as u32;
            let composition_type = if layer_id as usize >= max_layers {
                CompositionType::Client
            } else {
                layer.composition_type
            };
            if let Some(buffer) = &layer.buffer {
                self.device.set_layer_buffer(screen_id, layer_id, buffer)?;
            }
            self.device.set_layer_crop(screen_id, layer_id, layer.crop)?;
            self.device.set_layer_zorder(screen_id, layer_id, layer.zorder)?;
            self.device
                .set_layer_composition_type(screen_id, layer_id, composition_type)?;
        }

        let need_flush = self.device.prepare_screen_layers(screen_id)?;
        if need_flush {
            log::trace!("screen {screen_id} needs client composition");
        }
        self.device.commit(screen_id)
    }

    /// Compose every screen. A failing screen does not stop the others;
    /// results are returned per screen in input order.
    pub fn compose_all(&mut self, screens: &[ScreenLayers]) -> Vec<Result<Fence, DisplayError>> {
        screens
            .iter()
            .map(|screen| {
                let result = self.compose(screen);
                if let Err(err) = result {
                    log::error!(
                        "composition of screen {} failed with status {}: {err}",
                        screen.screen_id,
                        err.code()
                    );
                }
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeDevice {
        calls: Arc<Mutex<Vec<String>>>,
        fail_commit: Option<i32>,
    }

    impl FakeDevice {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl HdiDevice for FakeDevice {
        fn get_screen_capability(&self, _screen_id: u64) -> Result<ScreenCapability, DisplayError> {
            Ok(ScreenCapability {
                name: "fake".into(),
                width: 100,
                height: 100,
                max_layers: 1,
            })
        }

        fn get_screen_supported_modes(&self, _screen_id: u64) -> Result<Vec<ScreenMode>, DisplayError> {
            Ok(Vec::new())
        }

        fn prepare_screen_layers(&mut self, screen_id: u64) -> Result<bool, DisplayError> {
            self.record(format!("prepare {screen_id}"));
            Ok(false)
        }

        fn set_layer_buffer(&mut self, _: u64, layer_id: u32, _: &SurfaceBuffer) -> Result<(), DisplayError> {
            self.record(format!("buffer {layer_id}"));
            Ok(())
        }

        fn set_layer_crop(&mut self, _: u64, layer_id: u32, _: RectI) -> Result<(), DisplayError> {
            self.record(format!("crop {layer_id}"));
            Ok(())
        }

        fn set_layer_zorder(&mut self, _: u64, layer_id: u32, zorder: u32) -> Result<(), DisplayError> {
            self.record(format!("zorder {layer_id} {zorder}"));
            Ok(())
        }

        fn set_layer_composition_type(
            &mut self,
            _: u64,
            layer_id: u32,
            composition_type: CompositionType,
        ) -> Result<(), DisplayError> {
            self.record(format!("type {layer_id} {composition_type:?}"));
            Ok(())
        }

        fn commit(&mut self, screen_id: u64) -> Result<Fence, DisplayError> {
            self.record(format!("commit {screen_id}"));
            match self.fail_commit {
                Some(code) => Err(DisplayError::from_code(code)),
                None => Ok(Fence(7)),
            }
        }
    }

    fn layer(node: NodeId, zorder: u32) -> LayerInfo {
        LayerInfo {
            node,
            zorder,
            crop: RectI::new(0, 0, 10, 10),
            buffer: Some(SurfaceBuffer {
                width: 10,
                height: 10,
                sequence: 1,
                timestamp: 0,
                acquire_fence: -1,
            }),
            composition_type: CompositionType::Device,
        }
    }

    #[test]
    fn test_error_codes_round_trip() {
        for code in -8..=-1 {
            assert_eq!(DisplayError::from_code(code).code(), code);
        }
        assert_eq!(DisplayError::check(0), Ok(()));
        assert_eq!(DisplayError::check(-7), Err(DisplayError::SysBusy));
    }

    #[test]
    fn test_compose_sets_layers_then_prepares_and_commits() {
        let device = FakeDevice::default();
        let calls = Arc::clone(&device.calls);
        let mut adapter = ComposerAdapter::new(Box::new(device));
        let screen = ScreenLayers {
            screen_id: 3,
            display_node: 1,
            layers: vec![layer(10, 0), layer(11, 1)],
        };
        assert_eq!(adapter.compose(&screen), Ok(Fence(7)));
        assert_eq!(
            *calls.lock().unwrap(),
            [
                "buffer 0",
                "crop 0",
                "zorder 0 0",
                "type 0 Device",
                "buffer 1",
                "crop 1",
                "zorder 1 1",
                "type 1 Client",
                "prepare 3",
                "commit 3",
            ]
        );
    }

    #[test]
    fn test_commit_failure_is_returned() {
        let device = FakeDevice {
            fail_commit: Some(-1),
            ..Default::default()
        };
        let mut adapter = ComposerAdapter::new(Box::new(device));
        let screen = ScreenLayers {
            screen_id: 0,
            display_node: 1,
            layers: vec![layer(10, 0)],
        };
        let results = adapter.compose_all(&[screen]);
        assert_eq!(results, vec![Err(DisplayError::Failure)]);
        assert_eq!(results[0].unwrap_err().code(), -1);
    }
}
