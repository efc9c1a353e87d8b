//! Shared test fixtures: a scripted in-memory camera that speaks the vendor
//! transaction grammar, plus a raw status-block builder.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::proto::frame::ReplyFrame;
use crate::proto::ops;
use crate::proto::status::offset;
use crate::proto::STATUS_BUFFER_LEN;
use crate::scsi::{DataTransfer, DeviceDescriptor, ScsiHandle, ScsiPassThrough, TransportError};

/// Wire-level status fields served by the fake camera; encoded on demand
/// with [`StatusFixture::encode`].
#[derive(Debug, Clone)]
pub(crate) struct StatusFixture {
    pub(crate) buffer_mask: u32,
    pub(crate) exposure_mode: u32,
    pub(crate) ae_metering: u32,
    pub(crate) af_mode: u32,
    pub(crate) af_point_selection: u32,
    pub(crate) selected_af_mask: u32,
    pub(crate) focused_af_mask: u32,
    pub(crate) current_iso: u32,
    pub(crate) fixed_iso: u32,
    pub(crate) auto_iso_min: u32,
    pub(crate) auto_iso_max: u32,
    pub(crate) aperture: (u32, u32),
    pub(crate) lens_min_aperture: (u32, u32),
    pub(crate) lens_max_aperture: (u32, u32),
    pub(crate) shutter: (u32, u32),
    pub(crate) ec: (u32, u32),
    pub(crate) flash_ec: u32,
    pub(crate) white_balance: u32,
    pub(crate) wb_adjust_mg: u32,
    pub(crate) wb_adjust_ba: u32,
    pub(crate) flash_mode: u32,
    pub(crate) zoom: (u32, u32),
    pub(crate) image_format: u32,
    pub(crate) jpeg_quality: u32,
    pub(crate) jpeg_resolution: u32,
    pub(crate) jpeg_image_tone: u32,
    pub(crate) jpeg_saturation: u32,
    pub(crate) jpeg_hue: u32,
    pub(crate) jpeg_contrast: u32,
    pub(crate) jpeg_sharpness: u32,
    pub(crate) lens_id: (u32, u32),
    pub(crate) battery: [u32; 4],
    pub(crate) shake_reduction: u32,
    pub(crate) custom_ev_steps: u32,
    pub(crate) custom_sensitivity_steps: u32,
    pub(crate) release_mode: u32,
}

impl Default for StatusFixture {
    fn default() -> Self {
        Self {
            buffer_mask: 0b0001,
            exposure_mode: 6, // manual
            ae_metering: 0,
            af_mode: 1,
            af_point_selection: 1,
            selected_af_mask: 0b10,
            focused_af_mask: 0,
            current_iso: 400,
            fixed_iso: 400,
            auto_iso_min: 0,
            auto_iso_max: 0,
            aperture: (40, 10),
            lens_min_aperture: (18, 10),
            lens_max_aperture: (220, 10),
            shutter: (1, 125),
            ec: (0, 3),
            flash_ec: 0,
            white_balance: 0,
            wb_adjust_mg: 7,
            wb_adjust_ba: 7,
            flash_mode: 5,
            zoom: (50, 1),
            image_format: 2,
            jpeg_quality: 4,
            jpeg_resolution: 0,
            jpeg_image_tone: 0,
            jpeg_saturation: 4,
            jpeg_hue: 4,
            jpeg_contrast: 4,
            jpeg_sharpness: 4,
            lens_id: (4, 250),
            battery: [780, 0, 0, 0],
            shake_reduction: 1,
            custom_ev_steps: 1,         // third-stop EV
            custom_sensitivity_steps: 0, // whole-stop sensitivity
            release_mode: 0,
        }
    }
}

impl StatusFixture {
    /// Encodes the fixture into a raw status block.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; STATUS_BUFFER_LEN];
        let mut put = |at: usize, word: u32| {
            buf[at..at + 4].copy_from_slice(&word.to_be_bytes());
        };
        put(offset::BUFFER_MASK, self.buffer_mask);
        put(offset::EXPOSURE_MODE, self.exposure_mode);
        put(offset::AE_METERING, self.ae_metering);
        put(offset::AF_MODE, self.af_mode);
        put(offset::AF_POINT_SELECTION, self.af_point_selection);
        put(offset::SELECTED_AF_MASK, self.selected_af_mask);
        put(offset::FOCUSED_AF_MASK, self.focused_af_mask);
        put(offset::CURRENT_ISO, self.current_iso);
        put(offset::FIXED_ISO, self.fixed_iso);
        put(offset::AUTO_ISO_MIN, self.auto_iso_min);
        put(offset::AUTO_ISO_MAX, self.auto_iso_max);
        put(offset::CURRENT_APERTURE_NOM, self.aperture.0);
        put(offset::CURRENT_APERTURE_DEN, self.aperture.1);
        put(offset::LENS_MIN_APERTURE_NOM, self.lens_min_aperture.0);
        put(offset::LENS_MIN_APERTURE_DEN, self.lens_min_aperture.1);
        put(offset::LENS_MAX_APERTURE_NOM, self.lens_max_aperture.0);
        put(offset::LENS_MAX_APERTURE_DEN, self.lens_max_aperture.1);
        put(offset::SHUTTER_NOM, self.shutter.0);
        put(offset::SHUTTER_DEN, self.shutter.1);
        put(offset::EC_NOM, self.ec.0);
        put(offset::EC_DEN, self.ec.1);
        put(offset::FLASH_EC, self.flash_ec);
        put(offset::WHITE_BALANCE, self.white_balance);
        put(offset::WB_ADJUST_MG, self.wb_adjust_mg);
        put(offset::WB_ADJUST_BA, self.wb_adjust_ba);
        put(offset::FLASH_MODE, self.flash_mode);
        put(offset::ZOOM_NOM, self.zoom.0);
        put(offset::ZOOM_DEN, self.zoom.1);
        put(offset::IMAGE_FORMAT, self.image_format);
        put(offset::JPEG_QUALITY, self.jpeg_quality);
        put(offset::JPEG_RESOLUTION, self.jpeg_resolution);
        put(offset::JPEG_IMAGE_TONE, self.jpeg_image_tone);
        put(offset::JPEG_SATURATION, self.jpeg_saturation);
        put(offset::JPEG_HUE, self.jpeg_hue);
        put(offset::JPEG_CONTRAST, self.jpeg_contrast);
        put(offset::JPEG_SHARPNESS, self.jpeg_sharpness);
        put(offset::LENS_ID_1, self.lens_id.0);
        put(offset::LENS_ID_2, self.lens_id.1);
        put(offset::BATTERY_1, self.battery[0]);
        put(offset::BATTERY_2, self.battery[1]);
        put(offset::BATTERY_3, self.battery[2]);
        put(offset::BATTERY_4, self.battery[3]);
        put(offset::SHAKE_REDUCTION, self.shake_reduction);
        put(offset::CUSTOM_EV_STEPS, self.custom_ev_steps);
        put(offset::CUSTOM_SENSITIVITY_STEPS, self.custom_sensitivity_steps);
        put(offset::RELEASE_MODE, self.release_mode);
        buf
    }
}

/// One vendor operation the fake camera saw, with its argument words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoggedCommand {
    pub(crate) group: u8,
    pub(crate) code: u8,
    pub(crate) args: Vec<u32>,
}

/// Mutable state of the fake camera, shared between the provider, its open
/// handles and the test body.
#[derive(Debug)]
pub(crate) struct BusState {
    /// Whether enumeration reports the camera at all.
    pub(crate) online: bool,
    /// Wire model tag served by the identify operation.
    pub(crate) model_id: u32,
    /// Status block served by full-status reads.
    pub(crate) status: StatusFixture,
    /// Every vendor operation issued, in order.
    pub(crate) log: Vec<LoggedCommand>,
    /// When set, every transfer fails with device-gone.
    pub(crate) device_gone: bool,
    /// Busy frames to serve before the next ready frame.
    pub(crate) busy_polls: u32,
    /// Result code of the next ready frame.
    pub(crate) result_code: u8,
    /// Payload served for buffer downloads.
    pub(crate) image: Vec<u8>,
    /// Base address reported by the segment query.
    pub(crate) buffer_address: u32,
    /// Focused-point bitmap latched by a half press.
    pub(crate) focus_result_mask: u32,
    /// Buffer bitmap latched by a full press.
    pub(crate) post_shutter_buffer_mask: Option<u32>,
    /// Download commands to serve before the device disappears; `None`
    /// never fails.
    pub(crate) downloads_before_loss: Option<u32>,
    downloads: u32,
    pending: Vec<u8>,
    args: Vec<u32>,
}

impl BusState {
    /// Operations issued against the setting group.
    pub(crate) fn setting_writes(&self) -> Vec<&LoggedCommand> {
        self.log.iter().filter(|c| c.group == ops::group::SETTING).collect()
    }

    /// Operations issued against the action group.
    pub(crate) fn action_commands(&self) -> Vec<&LoggedCommand> {
        self.log.iter().filter(|c| c.group == ops::group::ACTION).collect()
    }

    fn apply_command(&mut self, group: u8, code: u8, args: &[u32]) -> Result<(), TransportError> {
        self.pending.clear();
        match (group, code) {
            (ops::group::SYSTEM, ops::system::SET_MODE) => {}
            (ops::group::SYSTEM, ops::system::SHORT_STATUS) => {
                self.pending = vec![0u8; 28];
            }
            (ops::group::SYSTEM, ops::system::IDENTIFY) => {
                self.pending = [self.model_id.to_be_bytes(), 0u32.to_be_bytes()].concat();
            }
            (ops::group::SYSTEM, ops::system::FULL_STATUS) => {
                self.pending = self.status.encode();
            }
            (ops::group::DSP, ops::dsp::INFO) => {
                let mut fw = b"1.05".to_vec();
                fw.resize(16, 0);
                self.pending = fw;
            }
            (ops::group::SETTING, code) => self.apply_setting(code, args),
            (ops::group::ACTION, ops::action::PRESS_SHUTTER) => match args.first() {
                Some(&ops::PRESS_HALF) => {
                    self.status.focused_af_mask = self.focus_result_mask;
                }
                Some(&ops::PRESS_FULL) => {
                    if let Some(mask) = self.post_shutter_buffer_mask {
                        self.status.buffer_mask = mask;
                    }
                }
                _ => {}
            },
            (ops::group::ACTION, ops::action::DUST_REMOVAL) => {}
            (ops::group::BUFFER, _) => {}
            (ops::group::SEGMENT, ops::buffer::SEGMENT_INFO) => {
                self.pending = [
                    0u32.to_be_bytes(),
                    self.buffer_address.to_be_bytes(),
                    (self.image.len() as u32).to_be_bytes(),
                    0u32.to_be_bytes(),
                ]
                .concat();
            }
            (ops::group::DOWNLOAD, ops::buffer::DOWNLOAD_BLOCK) => {
                if let Some(limit) = self.downloads_before_loss {
                    if self.downloads >= limit {
                        self.device_gone = true;
                        return Err(TransportError::DeviceGone);
                    }
                }
                self.downloads += 1;
                let (address, length) = (args[0] as usize, args[1] as usize);
                let start = address - self.buffer_address as usize;
                self.pending = self.image[start..(start + length).min(self.image.len())].to_vec();
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_setting(&mut self, code: u8, args: &[u32]) {
        // Only the sensitivity write mutates the fixture; the other writes
        // are verified through the command log.
        if code == ops::SettingOp::Iso.code() {
            match args {
                [fixed, 0, 0] if *fixed > 0 => {
                    self.status.fixed_iso = *fixed;
                    self.status.current_iso = *fixed;
                    self.status.auto_iso_min = 0;
                    self.status.auto_iso_max = 0;
                }
                [0, min, max] => {
                    self.status.fixed_iso = 0;
                    self.status.auto_iso_min = *min;
                    self.status.auto_iso_max = *max;
                }
                _ => {}
            }
        }
    }
}

/// A scripted in-memory camera.
#[derive(Debug, Clone)]
pub(crate) struct FakeBus {
    state: Arc<Mutex<BusState>>,
}

impl FakeBus {
    pub(crate) fn new(model_id: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                online: true,
                model_id,
                status: StatusFixture::default(),
                log: Vec::new(),
                device_gone: false,
                busy_polls: 0,
                result_code: 0,
                image: Vec::new(),
                buffer_address: 0x1000,
                focus_result_mask: 0,
                post_shutter_buffer_mask: None,
                downloads_before_loss: None,
                downloads: 0,
                pending: Vec::new(),
                args: Vec::new(),
            })),
        }
    }

    /// Locks the scripted state for inspection or mutation.
    pub(crate) fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap()
    }

    /// A pass-through provider serving this fake camera.
    pub(crate) fn provider(&self) -> Box<dyn ScsiPassThrough> {
        Box::new(FakeProvider { state: Arc::clone(&self.state) })
    }

    /// An already-open handle to this fake camera, bypassing enumeration.
    pub(crate) fn handle(&self) -> Box<dyn ScsiHandle> {
        Box::new(FakeHandle { state: Arc::clone(&self.state) })
    }
}

/// Decodes a fixture the way the gateway would.
pub(crate) fn snapshot_of(fixture: &StatusFixture, af_point_count: u32) -> crate::proto::StatusSnapshot {
    crate::proto::decode_status(&fixture.encode(), af_point_count).unwrap()
}

#[derive(Debug)]
struct FakeProvider {
    state: Arc<Mutex<BusState>>,
}

impl ScsiPassThrough for FakeProvider {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let state = self.state.lock().unwrap();
        if !state.online {
            return Ok(Vec::new());
        }
        Ok(vec![DeviceDescriptor {
            path: "/dev/fake0".into(),
            vendor_id: "PENTAX".into(),
            product_id: "DIGITAL_CAMERA".into(),
        }])
    }

    fn open(&self, _device: &DeviceDescriptor) -> Result<Box<dyn ScsiHandle>, TransportError> {
        let state = self.state.lock().unwrap();
        if !state.online || state.device_gone {
            return Err(TransportError::DeviceGone);
        }
        Ok(Box::new(FakeHandle { state: Arc::clone(&self.state) }))
    }
}

#[derive(Debug)]
struct FakeHandle {
    state: Arc<Mutex<BusState>>,
}

impl ScsiHandle for FakeHandle {
    fn execute(
        &mut self,
        cdb: &[u8],
        data: DataTransfer<'_>,
        _timeout: Duration,
    ) -> Result<u32, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.device_gone {
            return Err(TransportError::DeviceGone);
        }
        match (cdb[0], cdb[1]) {
            // argument words
            (0xf0, 0x4f) => {
                let DataTransfer::Out(payload) = data else {
                    return Err(TransportError::Parameter {
                        message: "argument write without payload".into(),
                    });
                };
                state.args = payload
                    .chunks_exact(4)
                    .map(|w| u32::from_be_bytes(w.try_into().unwrap()))
                    .collect();
                Ok(payload.len() as u32)
            }
            // command
            (0xf0, 0x24) => {
                let (group, code) = (cdb[2], cdb[3]);
                let args = std::mem::take(&mut state.args);
                state.log.push(LoggedCommand { group, code, args: args.clone() });
                state.apply_command(group, code, &args)?;
                Ok(0)
            }
            // reply frame
            (0xf0, 0x26) => {
                let DataTransfer::In(buf) = data else {
                    return Err(TransportError::Parameter {
                        message: "reply poll without buffer".into(),
                    });
                };
                let frame = if state.busy_polls > 0 {
                    state.busy_polls -= 1;
                    ReplyFrame { length: 0, result: 0, busy: true }
                } else {
                    ReplyFrame {
                        length: state.pending.len() as u32,
                        result: state.result_code,
                        busy: false,
                    }
                };
                buf[..8].copy_from_slice(&frame.to_raw());
                Ok(8)
            }
            // result read
            (0xf0, 0x49) => {
                let DataTransfer::In(buf) = data else {
                    return Err(TransportError::Parameter {
                        message: "result read without buffer".into(),
                    });
                };
                let n = buf.len().min(state.pending.len());
                buf[..n].copy_from_slice(&state.pending[..n]);
                Ok(n as u32)
            }
            _ => Err(TransportError::Parameter {
                message: format!("unknown CDB {:02x} {:02x}", cdb[0], cdb[1]),
            }),
        }
    }
}
